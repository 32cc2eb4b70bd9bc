use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Акцентный цвет по умолчанию.
pub const DEFAULT_COLOR: &str = "#0A84FF";
pub const DEFAULT_ICON: &str = "key";

/// Известные сервисы и их иконки (ключ — имя сервиса в нижнем регистре).
const SERVICE_ICONS: &[(&str, &str)] = &[
    ("instagram", "instagram"),
    ("facebook", "facebook"),
    ("google", "google"),
    ("gmail", "google"),
    ("youtube", "youtube"),
    ("twitter", "twitter"),
    ("linkedin", "linkedin"),
    ("github", "github"),
    ("whatsapp", "whatsapp"),
    ("telegram", "telegram"),
    ("snapchat", "snapchat"),
    ("amazon", "amazon"),
    ("apple", "apple"),
    ("microsoft", "windows"),
    ("outlook", "envelope"),
    ("netflix", "netflix"),
    ("spotify", "spotify"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Shopping,
    Bank,
    Food,
    Game,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Shopping,
        Category::Bank,
        Category::Food,
        Category::Game,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Category::Shopping => "shopping",
            Category::Bank => "bank",
            Category::Food => "food",
            Category::Game => "game",
        }
    }

    pub fn from_id(id: &str) -> Option<Category> {
        Category::ALL.into_iter().find(|c| c.id() == id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Shopping => "Shopping site",
            Category::Bank => "Bank",
            Category::Food => "Food app",
            Category::Game => "Game",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Category::Shopping => "shopping-cart",
            Category::Bank => "university",
            Category::Food => "utensils",
            Category::Game => "gamepad",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Category::Shopping => "#FF9500",
            Category::Bank => "#34C759",
            Category::Food => "#FF3B30",
            Category::Game => "#5856D6",
        }
    }
}

/// Иконка и цвет записи.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appearance {
    pub icon: &'static str,
    pub color: &'static str,
}

/// Порядок: известный сервис -> категория -> дефолт.
/// Известный сервис получает свою иконку, но цвет остаётся дефолтным.
pub fn resolve_appearance(service: &str, category: Option<Category>) -> Appearance {
    let key = service.trim().to_lowercase();
    if let Some((_, icon)) = SERVICE_ICONS.iter().find(|(name, _)| *name == key) {
        return Appearance {
            icon: *icon,
            color: DEFAULT_COLOR,
        };
    }

    match category {
        Some(cat) => Appearance {
            icon: cat.icon(),
            color: cat.color(),
        },
        None => Appearance {
            icon: DEFAULT_ICON,
            color: DEFAULT_COLOR,
        },
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
}

/// Одна сохранённая запись. Имена JSON-полей совпадают с форматом
/// хранилища `passwords`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Нулевой id у записей старого формата; настоящий выдаёт `Vault::open`.
    #[serde(default)]
    pub id: Uuid,
    pub service: String,
    pub username: String,
    #[serde(rename = "password")]
    pub secret: String,
    #[serde(rename = "icon", default = "default_icon")]
    pub icon_key: String,
    #[serde(rename = "useBiometric", default)]
    pub requires_auth_to_reveal: bool,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Option<Category>,
    #[serde(default = "default_color")]
    pub category_color: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

// Неизвестная категория в старых данных не должна ломать загрузку всей коллекции.
fn lenient_category<'de, D>(deserializer: D) -> Result<Option<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(|id| {
        let cat = Category::from_id(id);
        if cat.is_none() {
            tracing::warn!(category = id, "dropping unknown category");
        }
        cat
    }))
}

impl Entry {
    /// Пересчитать иконку и цвет из сервиса и категории.
    pub fn refresh_appearance(&mut self) {
        let look = resolve_appearance(&self.service, self.category);
        self.icon_key = look.icon.to_string();
        self.category_color = look.color.to_string();
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

/// Данные для новой записи (то, что вводит пользователь).
#[derive(Debug, Clone, Default)]
pub struct EntryDraft {
    pub service: String,
    pub username: String,
    pub secret: String,
    pub category: Option<Category>,
    pub requires_auth_to_reveal: bool,
    pub notes: Option<String>,
}

impl EntryDraft {
    pub fn validate(&self) -> Result<(), EntryError> {
        validate_fields(&self.service, &self.username, &self.secret)
    }

    /// Собрать запись: проверка полей, новый id, иконка/цвет.
    pub fn into_entry(self, created_at: Option<String>) -> Result<Entry, EntryError> {
        self.validate()?;
        let mut entry = Entry {
            id: Uuid::new_v4(),
            service: self.service,
            username: self.username,
            secret: self.secret,
            icon_key: String::new(),
            requires_auth_to_reveal: self.requires_auth_to_reveal,
            category: self.category,
            category_color: String::new(),
            is_favorite: false,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            created_at,
        };
        entry.refresh_appearance();
        Ok(entry)
    }
}

/// Частичное изменение записи: `None` — поле не трогаем.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub service: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub category: Option<Option<Category>>,
    pub requires_auth_to_reveal: Option<bool>,
    pub notes: Option<Option<String>>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self.service.is_none()
            && self.username.is_none()
            && self.secret.is_none()
            && self.category.is_none()
            && self.requires_auth_to_reveal.is_none()
            && self.notes.is_none()
    }

    /// Меняет ли патч флаг защиты записи.
    pub fn changes_protection(&self, entry: &Entry) -> bool {
        self.requires_auth_to_reveal
            .is_some_and(|flag| flag != entry.requires_auth_to_reveal)
    }

    /// Применить к копии записи; исходная не меняется, если проверка не прошла.
    pub fn apply(&self, entry: &Entry) -> Result<Entry, EntryError> {
        let mut updated = entry.clone();
        if let Some(ref service) = self.service {
            updated.service = service.clone();
        }
        if let Some(ref username) = self.username {
            updated.username = username.clone();
        }
        if let Some(ref secret) = self.secret {
            updated.secret = secret.clone();
        }
        if let Some(category) = self.category {
            updated.category = category;
        }
        if let Some(flag) = self.requires_auth_to_reveal {
            updated.requires_auth_to_reveal = flag;
        }
        if let Some(ref notes) = self.notes {
            updated.notes = notes.clone().filter(|n| !n.trim().is_empty());
        }

        validate_fields(&updated.service, &updated.username, &updated.secret)?;
        updated.refresh_appearance();
        Ok(updated)
    }
}

fn validate_fields(service: &str, username: &str, secret: &str) -> Result<(), EntryError> {
    if service.trim().is_empty() {
        return Err(EntryError::EmptyField("service"));
    }
    if username.trim().is_empty() {
        return Err(EntryError::EmptyField("username"));
    }
    if secret.trim().is_empty() {
        return Err(EntryError::EmptyField("password"));
    }
    Ok(())
}
