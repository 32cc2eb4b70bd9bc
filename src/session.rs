//! Разблокировка приложения при запуске (биометрия или PIN) и кэш
//! разблокировки между командами.

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::Settings;
use crate::gate::{BiometricOutcome, BiometricProvider, GateError};
use crate::pin::{PinEntry, PinError, PinSetup, SetupStep, load_pin, save_pin, verify};
use crate::store::{KvStore, WELCOME_KEY, set_perms_restrictive};

const SESSION_TTL_SECS: u64 = 5 * 60;

/// Пауза с сообщением, если биометрия пропала к моменту запроса.
pub const FALLBACK_DELAY: Duration = Duration::from_secs(3);

#[derive(Serialize, Deserialize)]
struct SessionFile {
    /// `None` — без автоблокировки, до `passbook lock`.
    expires_at: Option<u64>,
}

/// Что спросить у пользователя при вводе PIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinPrompt {
    Create,
    Confirm,
    Enter,
}

impl PinPrompt {
    pub fn label(&self) -> &'static str {
        match self {
            PinPrompt::Create => "Choose a 4-digit PIN: ",
            PinPrompt::Confirm => "Repeat the PIN: ",
            PinPrompt::Enter => "PIN: ",
        }
    }
}

pub fn session_path(store_root: &Path) -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(dir).join("passbook-session.json")
    } else {
        store_root.join("session.json")
    }
}

fn now_unix() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| anyhow!("system time error: {e}"))?
        .as_secs())
}

/// Отметить, что приветствие показано. Возвращает `true` при первом запуске.
pub fn mark_welcome_seen<S: KvStore>(store: &mut S) -> Result<bool> {
    if store.get_item(WELCOME_KEY)?.is_some() {
        return Ok(false);
    }
    store.set_item(WELCOME_KEY, "true")?;
    Ok(true)
}

/// Первичная установка PIN: спрашиваем, пока два ввода не совпадут.
pub fn setup_pin<S, F>(store: &mut S, mut ask_pin: F) -> Result<()>
where
    S: KvStore,
    F: FnMut(PinPrompt) -> Result<PinEntry>,
{
    let mut setup = PinSetup::new();
    loop {
        let prompt = if setup.is_confirming() {
            PinPrompt::Confirm
        } else {
            PinPrompt::Create
        };
        // неразборчивый ввод переспрашиваем на том же шаге
        let mut entry = match ask_pin(prompt) {
            Ok(entry) => entry,
            Err(e) if e.downcast_ref::<PinError>().is_some() => {
                eprintln!("{e}");
                continue;
            }
            Err(e) => return Err(e),
        };
        match setup.submit(&mut entry) {
            Ok(SetupStep::ConfirmRequested) => continue,
            Ok(SetupStep::Completed) => break,
            Err(e) => eprintln!("{e}"),
        }
    }

    let pin = setup.pin().ok_or_else(|| anyhow!("PIN setup did not complete"))?;
    save_pin(store, pin)?;
    Ok(())
}

pub struct AppLock {
    session_path: PathBuf,
    fallback_delay: Duration,
}

impl AppLock {
    pub fn new(session_path: PathBuf) -> Self {
        Self {
            session_path,
            fallback_delay: FALLBACK_DELAY,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        let Ok(now) = now_unix() else {
            return false;
        };
        let Ok(data) = fs::read_to_string(&self.session_path) else {
            return false;
        };
        match serde_json::from_str::<SessionFile>(&data) {
            Ok(SessionFile { expires_at: None }) => true,
            Ok(SessionFile {
                expires_at: Some(t),
            }) if now <= t => true,
            _ => {
                let _ = fs::remove_file(&self.session_path);
                false
            }
        }
    }

    /// Разблокировать, если ещё не разблокировано.
    ///
    /// Биометрия — только если она включена в настройках и доступна;
    /// иначе PIN (а если его нет, сначала установка PIN).
    pub fn unlock<S, B, F>(
        &self,
        store: &mut S,
        settings: &Settings,
        biometrics: &B,
        mut ask_pin: F,
    ) -> Result<()>
    where
        S: KvStore,
        B: BiometricProvider + ?Sized,
        F: FnMut(PinPrompt) -> Result<PinEntry>,
    {
        if self.is_unlocked() {
            tracing::debug!("session still valid");
            return Ok(());
        }

        if settings.biometric_auth_enabled && biometrics.is_available() {
            match biometrics.authenticate("Unlock passbook") {
                BiometricOutcome::Success => {}
                BiometricOutcome::Cancelled => bail!("passbook stays locked"),
                BiometricOutcome::NotAvailable => {
                    eprintln!("No biometrics found on this device, continuing...");
                    std::thread::sleep(self.fallback_delay);
                }
                BiometricOutcome::Failed(reason) => {
                    tracing::warn!(%reason, "biometric unlock failed");
                    return Err(GateError::AuthenticationFailed.into());
                }
            }
        } else {
            match load_pin(store)? {
                None => setup_pin(store, &mut ask_pin)?,
                Some(stored) => {
                    let mut entry = ask_pin(PinPrompt::Enter)?;
                    let ok = verify(&entry, &stored);
                    entry.clear();
                    if !ok {
                        return Err(GateError::WrongPin.into());
                    }
                }
            }
        }

        self.remember(settings)?;
        tracing::info!("unlocked");
        Ok(())
    }

    fn remember(&self, settings: &Settings) -> Result<()> {
        let expires_at = if settings.auto_lock {
            Some(now_unix()? + SESSION_TTL_SECS)
        } else {
            None
        };
        let json = serde_json::to_string(&SessionFile { expires_at })?;
        // не удалось сохранить сессию — просто спросим в следующий раз
        let saved = fs::write(&self.session_path, json)
            .and_then(|()| set_perms_restrictive(&self.session_path));
        if let Err(e) = saved {
            tracing::warn!(
                path = %self.session_path.display(),
                error = %e,
                "could not save unlock session"
            );
        }
        Ok(())
    }

    pub fn lock(&self) -> Result<()> {
        match fs::remove_file(&self.session_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
