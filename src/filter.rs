use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::entry::{Category, Entry};

/// Режим списка: все, избранное или конкретная категория.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    All,
    Favorites,
    Category(Category),
}

impl FilterMode {
    fn accepts(&self, entry: &Entry) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Favorites => entry.is_favorite,
            FilterMode::Category(cat) => entry.category == Some(*cat),
        }
    }
}

/// Совпадает ли запрос (без учёта регистра, подстрока) с сервисом,
/// логином или заметкой.
pub fn matches_query(entry: &Entry, query: &str) -> bool {
    let needle = query.to_lowercase();
    entry.service.to_lowercase().contains(&needle)
        || entry.username.to_lowercase().contains(&needle)
        || entry
            .notes
            .as_deref()
            .is_some_and(|n| n.to_lowercase().contains(&needle))
}

/// Стабильный фильтр: порядок коллекции сохраняется.
/// Пустой запрос пропускает всё. Рядом с каждой записью — её позиция в коллекции.
pub fn filter<'a>(entries: &'a [Entry], query: &str, mode: FilterMode) -> Vec<(usize, &'a Entry)> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, e)| mode.accepts(e) && matches_query(e, query))
        .collect()
}

/// Поиск с главного экрана: пустой запрос не даёт результатов.
pub fn search<'a>(entries: &'a [Entry], query: &str) -> Vec<(usize, &'a Entry)> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    filter(entries, query, FilterMode::All)
}

/// Последние добавленные: сначала самые новые по `createdAt`, записи без
/// даты (или с битой датой) считаются самыми старыми, при равенстве
/// сохраняется порядок коллекции.
pub fn recent(entries: &[Entry], limit: usize) -> Vec<(usize, &Entry)> {
    let mut indexed: Vec<(usize, &Entry, Option<OffsetDateTime>)> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let ts = e
                .created_at
                .as_deref()
                .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok());
            (i, e, ts)
        })
        .collect();

    // sort_by стабильный; None < Some, поэтому сравниваем b с a
    indexed.sort_by(|a, b| b.2.cmp(&a.2));
    indexed
        .into_iter()
        .take(limit)
        .map(|(i, e, _)| (i, e))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryDraft;

    fn entry(service: &str, username: &str, category: Option<Category>) -> Entry {
        EntryDraft {
            service: service.into(),
            username: username.into(),
            secret: "pw".into(),
            category,
            ..Default::default()
        }
        .into_entry(None)
        .unwrap()
    }

    fn sample() -> Vec<Entry> {
        let mut fav = entry("Instagram", "ayse", None);
        fav.is_favorite = true;
        vec![
            fav,
            entry("Bank of Rust", "insta_fan", Some(Category::Bank)),
            entry("Steam", "gamer", Some(Category::Game)),
            entry("INSTAcart", "me", Some(Category::Shopping)),
        ]
    }

    fn services(found: &[(usize, &Entry)]) -> Vec<String> {
        found.iter().map(|(_, e)| e.service.clone()).collect()
    }

    #[test]
    fn query_matches_service_or_username_in_order() {
        let entries = sample();
        let found = filter(&entries, "insta", FilterMode::All);
        assert_eq!(
            services(&found),
            vec!["Instagram", "Bank of Rust", "INSTAcart"]
        );
        assert_eq!(found[1].0, 1);
    }

    #[test]
    fn mode_is_anded_with_query() {
        let entries = sample();
        assert_eq!(
            services(&filter(&entries, "insta", FilterMode::Favorites)),
            vec!["Instagram"]
        );
        assert_eq!(
            services(&filter(&entries, "", FilterMode::Category(Category::Game))),
            vec!["Steam"]
        );
        assert!(filter(&entries, "steam", FilterMode::Category(Category::Bank)).is_empty());
    }

    #[test]
    fn notes_are_searched_when_present() {
        let mut entries = sample();
        entries[2].notes = Some("Family account".into());
        assert_eq!(services(&search(&entries, "family")), vec!["Steam"]);
    }

    #[test]
    fn blank_search_returns_nothing() {
        let entries = sample();
        assert!(search(&entries, "   ").is_empty());
        assert_eq!(filter(&entries, "", FilterMode::All).len(), 4);
    }

    #[test]
    fn recent_puts_undated_last() {
        let mut entries = sample();
        entries[1].created_at = Some("2024-03-15T10:00:00Z".into());
        entries[3].created_at = Some("2025-01-01T00:00:00Z".into());
        entries[2].created_at = Some("not a date".into());

        let top = recent(&entries, 3);
        assert_eq!(services(&top), vec!["INSTAcart", "Bank of Rust", "Instagram"]);
        assert_eq!(top[0].0, 3);
    }
}
