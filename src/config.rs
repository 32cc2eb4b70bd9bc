use serde::{Deserialize, Serialize};

use crate::store::{KvStore, SETTINGS_KEY, StoreError};

/// Настройки приложения (корзина `settings`). Грузятся один раз на команду
/// и передаются дальше явно.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(rename = "biometricAuth", alias = "biometricAuthEnabled")]
    pub biometric_auth_enabled: bool,
    pub auto_lock: bool,
    pub dark_mode: bool,
    pub notifications: bool,
    pub auto_backup: bool,
    pub password_expiry: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            biometric_auth_enabled: false,
            auto_lock: true,
            dark_mode: false,
            notifications: true,
            auto_backup: false,
            password_expiry: true,
        }
    }
}

/// Имена настроек для `passbook settings set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SettingKey {
    DarkMode,
    BiometricAuth,
    AutoLock,
    Notifications,
    AutoBackup,
    PasswordExpiry,
}

impl Settings {
    pub fn load<S: KvStore>(store: &S) -> Result<Self, StoreError> {
        Ok(store.get_json(SETTINGS_KEY)?.unwrap_or_default())
    }

    pub fn save<S: KvStore>(&self, store: &mut S) -> Result<(), StoreError> {
        store.set_json(SETTINGS_KEY, self)
    }

    pub fn get(&self, key: SettingKey) -> bool {
        match key {
            SettingKey::DarkMode => self.dark_mode,
            SettingKey::BiometricAuth => self.biometric_auth_enabled,
            SettingKey::AutoLock => self.auto_lock,
            SettingKey::Notifications => self.notifications,
            SettingKey::AutoBackup => self.auto_backup,
            SettingKey::PasswordExpiry => self.password_expiry,
        }
    }

    pub fn set(&mut self, key: SettingKey, value: bool) {
        let slot = match key {
            SettingKey::DarkMode => &mut self.dark_mode,
            SettingKey::BiometricAuth => &mut self.biometric_auth_enabled,
            SettingKey::AutoLock => &mut self.auto_lock,
            SettingKey::Notifications => &mut self.notifications,
            SettingKey::AutoBackup => &mut self.auto_backup,
            SettingKey::PasswordExpiry => &mut self.password_expiry,
        };
        *slot = value;
    }

    pub fn entries(&self) -> [(&'static str, bool); 6] {
        [
            ("dark-mode", self.dark_mode),
            ("biometric-auth", self.biometric_auth_enabled),
            ("auto-lock", self.auto_lock),
            ("notifications", self.notifications),
            ("auto-backup", self.auto_backup),
            ("password-expiry", self.password_expiry),
        ]
    }
}
