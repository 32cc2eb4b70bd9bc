//! Коллекция записей в корзине `passwords`.
//!
//! Каждая мутация — это чтение всей коллекции, изменение в памяти и запись
//! всей коллекции обратно. Параллельных писателей не предполагается: при
//! гонке последняя запись выигрывает. Отката при сбое записи нет.

use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::entry::{Entry, EntryDraft, EntryError, EntryPatch};
use crate::store::{KvStore, PASSWORDS_KEY, StoreError};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Invalid(#[from] EntryError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no entry with id {0}")]
    NotFound(Uuid),
    #[error("no entry matches `{0}`")]
    NoMatch(String),
    #[error("`{0}` matches more than one entry, use more characters")]
    Ambiguous(String),
}

pub struct Vault<S: KvStore> {
    store: S,
}

impl<S: KvStore> Vault<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Открыть коллекцию. Записям старого формата без `id` выдаётся id,
    /// и коллекция сразу переписывается: иначе id менялся бы при каждой
    /// загрузке и запись нельзя было бы найти повторно.
    pub fn open(store: S) -> Result<Self, VaultError> {
        let mut vault = Self::new(store);
        let mut entries = vault.load_all()?;
        let mut assigned = 0usize;
        for entry in entries.iter_mut().filter(|e| e.id.is_nil()) {
            entry.id = Uuid::new_v4();
            assigned += 1;
        }
        if assigned > 0 {
            vault.save_all(&entries)?;
            tracing::info!(assigned, "assigned ids to entries stored without one");
        }
        Ok(vault)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Вся коллекция, самые новые первыми.
    pub fn load_all(&self) -> Result<Vec<Entry>, VaultError> {
        let entries: Option<Vec<Entry>> = self.store.get_json(PASSWORDS_KEY)?;
        Ok(entries.unwrap_or_default())
    }

    fn save_all(&mut self, entries: &[Entry]) -> Result<(), VaultError> {
        self.store.set_json(PASSWORDS_KEY, &entries)?;
        tracing::debug!(count = entries.len(), "persisted collection");
        Ok(())
    }

    /// Новая запись вставляется в начало.
    pub fn add(&mut self, draft: EntryDraft) -> Result<Entry, VaultError> {
        let created_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        let entry = draft.into_entry(created_at)?;

        let mut entries = self.load_all()?;
        entries.insert(0, entry.clone());
        self.save_all(&entries)?;
        tracing::info!(id = %entry.id, service = %entry.service, "added entry");
        Ok(entry)
    }

    pub fn update(&mut self, id: Uuid, patch: &EntryPatch) -> Result<Entry, VaultError> {
        let mut entries = self.load_all()?;
        let pos = position_of(&entries, id)?;
        let updated = patch.apply(&entries[pos])?;
        entries[pos] = updated.clone();
        self.save_all(&entries)?;
        tracing::info!(id = %id, "updated entry");
        Ok(updated)
    }

    /// Удалить запись; позиции следующих записей сдвигаются на одну вниз.
    pub fn delete(&mut self, id: Uuid) -> Result<Entry, VaultError> {
        let mut entries = self.load_all()?;
        let pos = position_of(&entries, id)?;
        let removed = entries.remove(pos);
        self.save_all(&entries)?;
        tracing::info!(id = %id, "deleted entry");
        Ok(removed)
    }

    /// Переключить "избранное", вернуть новое значение.
    pub fn toggle_favorite(&mut self, id: Uuid) -> Result<bool, VaultError> {
        let mut entries = self.load_all()?;
        let pos = position_of(&entries, id)?;
        entries[pos].is_favorite = !entries[pos].is_favorite;
        let now = entries[pos].is_favorite;
        self.save_all(&entries)?;
        Ok(now)
    }
}

fn position_of(entries: &[Entry], id: Uuid) -> Result<usize, VaultError> {
    entries
        .iter()
        .position(|e| e.id == id)
        .ok_or(VaultError::NotFound(id))
}

/// Перевести то, что ввёл пользователь, в id записи: номер позиции в
/// списке или начало id (как в `passbook ls`).
pub fn resolve_selector(entries: &[Entry], selector: &str) -> Result<Uuid, VaultError> {
    let selector = selector.trim();
    if let Ok(pos) = selector.parse::<usize>() {
        if let Some(entry) = entries.get(pos) {
            return Ok(entry.id);
        }
    }

    let needle = selector.to_lowercase().replace('-', "");
    if needle.is_empty() {
        return Err(VaultError::NoMatch(selector.to_string()));
    }
    let mut found = entries
        .iter()
        .filter(|e| e.id.simple().to_string().starts_with(&needle));
    match (found.next(), found.next()) {
        (Some(entry), None) => Ok(entry.id),
        (Some(_), Some(_)) => Err(VaultError::Ambiguous(selector.to_string())),
        (None, _) => Err(VaultError::NoMatch(selector.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Category;
    use crate::store::MemoryStore;

    fn draft(service: &str) -> EntryDraft {
        EntryDraft {
            service: service.into(),
            username: format!("{service}-user"),
            secret: format!("{service}-secret"),
            ..Default::default()
        }
    }

    fn vault_with(services: &[&str]) -> Vault<MemoryStore> {
        let mut vault = Vault::new(MemoryStore::default());
        for s in services {
            vault.add(draft(s)).unwrap();
        }
        vault
    }

    #[test]
    fn empty_store_has_no_entries() {
        let vault = Vault::new(MemoryStore::default());
        assert!(vault.load_all().unwrap().is_empty());
    }

    #[test]
    fn add_prepends_and_round_trips() {
        let mut vault = vault_with(&["first"]);
        let saved = vault.add(draft("second")).unwrap();

        let all = vault.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], saved);
        assert_eq!(all[1].service, "first");
        assert!(saved.created_at.is_some());
    }

    #[test]
    fn invalid_draft_writes_nothing() {
        let mut vault = vault_with(&["keep"]);
        let mut bad = draft("x");
        bad.username = "  ".into();
        assert!(matches!(vault.add(bad), Err(VaultError::Invalid(_))));
        assert_eq!(vault.load_all().unwrap().len(), 1);
    }

    #[test]
    fn update_in_place() {
        let mut vault = vault_with(&["a", "b", "c"]);
        let target = vault.load_all().unwrap()[1].clone();
        let patch = EntryPatch {
            username: Some("new-user".into()),
            category: Some(Some(Category::Food)),
            ..Default::default()
        };
        let updated = vault.update(target.id, &patch).unwrap();

        let all = vault.load_all().unwrap();
        assert_eq!(all[1], updated);
        assert_eq!(all[1].username, "new-user");
        assert_eq!(all[1].icon_key, "utensils");
        assert_eq!(all[1].created_at, target.created_at);
    }

    #[test]
    fn delete_shifts_following_positions() {
        let mut vault = vault_with(&["a", "b", "c"]);
        let all = vault.load_all().unwrap();
        let removed = vault.delete(all[0].id).unwrap();
        assert_eq!(removed.service, "c");

        let rest = vault.load_all().unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].id, all[1].id);
        assert!(matches!(
            vault.delete(removed.id),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn favorite_toggles_the_right_duplicate() {
        let mut vault = Vault::new(MemoryStore::default());
        vault.add(draft("same")).unwrap();
        let second = vault.add(draft("same")).unwrap();
        let first_id = vault.load_all().unwrap()[1].id;

        assert!(vault.toggle_favorite(first_id).unwrap());
        let all = vault.load_all().unwrap();
        assert!(!all[0].is_favorite);
        assert_eq!(all[0].id, second.id);
        assert!(all[1].is_favorite);

        assert!(!vault.toggle_favorite(first_id).unwrap());
    }

    #[test]
    fn failed_write_surfaces_store_error() {
        let mut vault = vault_with(&["a"]);
        vault.store_mut().fail_writes = true;
        assert!(matches!(vault.add(draft("b")), Err(VaultError::Store(_))));
        assert_eq!(vault.load_all().unwrap().len(), 1);
    }

    #[test]
    fn entries_stored_without_id_stay_addressable() {
        let mut store = MemoryStore::default();
        store
            .set_item(
                PASSWORDS_KEY,
                r##"[
                    {"service":"instagram","username":"bob","password":"pw1","icon":"instagram",
                     "useBiometric":false,"category":null,"categoryColor":"#0A84FF","isFavorite":false},
                    {"service":"bank","username":"alice","password":"pw2","icon":"university",
                     "useBiometric":true,"category":"bank","categoryColor":"#34C759","isFavorite":false}
                ]"##,
            )
            .unwrap();

        let vault = Vault::open(store).unwrap();
        let first = vault.load_all().unwrap();
        assert!(first.iter().all(|e| !e.id.is_nil()));
        assert_ne!(first[0].id, first[1].id);
        // id записан в хранилище и не меняется между загрузками
        let again = vault.load_all().unwrap();
        assert_eq!(first, again);
        let mut vault = Vault::open(vault.store).unwrap();
        assert_eq!(vault.load_all().unwrap(), first);

        let id = resolve_selector(&again, "0").unwrap();
        assert!(vault.toggle_favorite(id).unwrap());
        let patch = EntryPatch {
            username: Some("bobby".into()),
            ..Default::default()
        };
        assert_eq!(vault.update(id, &patch).unwrap().username, "bobby");
        let removed = vault.delete(id).unwrap();
        assert_eq!(removed.service, "instagram");
        assert!(removed.is_favorite);

        let rest = vault.load_all().unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, first[1].id);
    }

    #[test]
    fn open_leaves_stored_ids_alone() {
        let vault = vault_with(&["a", "b"]);
        let before = vault.load_all().unwrap();
        let vault = Vault::open(vault.store).unwrap();
        assert_eq!(vault.load_all().unwrap(), before);
    }

    #[test]
    fn selectors_accept_position_or_id_prefix() {
        let vault = vault_with(&["a", "b"]);
        let all = vault.load_all().unwrap();

        assert_eq!(resolve_selector(&all, "1").unwrap(), all[1].id);
        let prefix = &all[0].id.simple().to_string()[..8];
        assert_eq!(resolve_selector(&all, prefix).unwrap(), all[0].id);
        assert_eq!(
            resolve_selector(&all, &all[0].id.to_string()).unwrap(),
            all[0].id
        );
        assert!(matches!(
            resolve_selector(&all, "zzzz"),
            Err(VaultError::NoMatch(_))
        ));
        assert!(matches!(
            resolve_selector(&all, ""),
            Err(VaultError::NoMatch(_))
        ));
    }
}
