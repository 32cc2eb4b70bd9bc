//! Кто может увидеть пароль открытым текстом.
//!
//! ```text
//! Hidden --reveal, без защиты-------------------> Revealed
//! Hidden --reveal, защита, биометрия есть-------> AwaitingBiometric
//! Hidden --reveal, защита, биометрии нет--------> AwaitingPin
//! AwaitingBiometric --успех--> Revealed, --отмена/ошибка--> Hidden
//! AwaitingPin --верный PIN--> Revealed, --неверный--> Hidden
//! Revealed --reveal/hide--> Hidden
//! ```

use thiserror::Error;

use crate::entry::Entry;
use crate::pin::{PinEntry, verify};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BiometricOutcome {
    Success,
    /// Пользователь сам отменил запрос.
    Cancelled,
    /// Датчик пропал или не настроен к моменту запроса.
    NotAvailable,
    Failed(String),
}

/// Платформенная биометрия (отпечаток, лицо).
pub trait BiometricProvider {
    fn has_hardware(&self) -> bool;
    fn is_enrolled(&self) -> bool;
    fn authenticate(&self, prompt: &str) -> BiometricOutcome;

    /// Есть датчик и хотя бы один зарегистрированный отпечаток/лицо.
    fn is_available(&self) -> bool {
        self.has_hardware() && self.is_enrolled()
    }
}

/// Биометрия для терминала: датчика нет.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBiometrics;

impl BiometricProvider for NoBiometrics {
    fn has_hardware(&self) -> bool {
        false
    }

    fn is_enrolled(&self) -> bool {
        false
    }

    fn authenticate(&self, _prompt: &str) -> BiometricOutcome {
        BiometricOutcome::NotAvailable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealState {
    Hidden,
    AwaitingBiometric,
    AwaitingPin,
    Revealed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("wrong PIN, please try again")]
    WrongPin,
    #[error("PIN must be exactly 4 digits")]
    IncompletePin,
    #[error("no authentication challenge is pending")]
    NotAwaiting,
}

/// Состояние показа одного пароля на время жизни "экрана" (одной команды).
#[derive(Debug)]
pub struct RevealGate {
    state: RevealState,
    requires_auth: bool,
    // проверяется один раз при создании и потом не перепроверяется
    biometric_available: bool,
}

impl RevealGate {
    pub fn mount<B: BiometricProvider + ?Sized>(entry: &Entry, biometrics: &B) -> Self {
        Self::new(entry.requires_auth_to_reveal, biometrics.is_available())
    }

    pub fn new(requires_auth: bool, biometric_available: bool) -> Self {
        Self {
            state: RevealState::Hidden,
            requires_auth,
            biometric_available,
        }
    }

    pub fn state(&self) -> RevealState {
        self.state
    }

    pub fn is_revealed(&self) -> bool {
        self.state == RevealState::Revealed
    }

    /// Нажатие "показать". Это переключатель: повторное нажатие прячет пароль.
    /// Пока ждём подтверждения, нажатие ничего не меняет.
    pub fn request_reveal(&mut self) -> RevealState {
        self.state = match self.state {
            RevealState::Hidden if !self.requires_auth => RevealState::Revealed,
            RevealState::Hidden if self.biometric_available => RevealState::AwaitingBiometric,
            RevealState::Hidden => RevealState::AwaitingPin,
            RevealState::Revealed => RevealState::Hidden,
            pending => pending,
        };
        tracing::debug!(state = ?self.state, "reveal requested");
        self.state
    }

    /// Спрятать без всяких проверок.
    pub fn hide(&mut self) {
        self.state = RevealState::Hidden;
    }

    /// Результат биометрии. Отмена молча возвращает в Hidden,
    /// любая другая неудача — тоже Hidden, но с ошибкой.
    pub fn complete_biometric(&mut self, outcome: BiometricOutcome) -> Result<RevealState, GateError> {
        if self.state != RevealState::AwaitingBiometric {
            return Err(GateError::NotAwaiting);
        }
        match outcome {
            BiometricOutcome::Success => {
                self.state = RevealState::Revealed;
                Ok(self.state)
            }
            BiometricOutcome::Cancelled => {
                self.state = RevealState::Hidden;
                Ok(self.state)
            }
            BiometricOutcome::NotAvailable | BiometricOutcome::Failed(_) => {
                tracing::warn!(?outcome, "biometric challenge failed");
                self.state = RevealState::Hidden;
                Err(GateError::AuthenticationFailed)
            }
        }
    }

    /// Проверка PIN. Если PIN ещё не задан, проверка проходит сразу.
    /// При несовпадении поле ввода очищается; попыток сколько угодно.
    pub fn submit_pin(&mut self, entry: &mut PinEntry, stored: Option<&str>) -> Result<RevealState, GateError> {
        if self.state != RevealState::AwaitingPin {
            return Err(GateError::NotAwaiting);
        }
        let Some(stored) = stored else {
            self.state = RevealState::Revealed;
            return Ok(self.state);
        };
        if !entry.is_complete() {
            return Err(GateError::IncompletePin);
        }

        let ok = verify(entry, stored);
        entry.clear();
        if ok {
            self.state = RevealState::Revealed;
            Ok(self.state)
        } else {
            tracing::warn!("wrong PIN entered");
            self.state = RevealState::Hidden;
            Err(GateError::WrongPin)
        }
    }
}

/// Довести одно нажатие "показать" до конца: один запрос биометрии или
/// один ввод PIN. PIN спрашивается только если он вообще задан.
pub fn run_reveal<B, F>(
    gate: &mut RevealGate,
    biometrics: &B,
    stored_pin: Option<&str>,
    mut ask_pin: F,
) -> anyhow::Result<RevealState>
where
    B: BiometricProvider + ?Sized,
    F: FnMut() -> anyhow::Result<PinEntry>,
{
    match gate.request_reveal() {
        RevealState::AwaitingBiometric => {
            let outcome = biometrics.authenticate("Confirm it's you to reveal the password");
            Ok(gate.complete_biometric(outcome)?)
        }
        RevealState::AwaitingPin => {
            let asked = match stored_pin {
                Some(_) => ask_pin(),
                None => Ok(PinEntry::new()),
            };
            // неразборчивый ввод — та же неудача, что и неверный PIN
            let mut entry = match asked {
                Ok(entry) => entry,
                Err(e) => {
                    gate.hide();
                    return Err(e);
                }
            };
            Ok(gate.submit_pin(&mut entry, stored_pin)?)
        }
        state => Ok(state),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pin::PinError;
    use std::cell::Cell;

    /// Биометрия с заранее заданным ответом; считает вызовы authenticate.
    pub(crate) struct FakeBiometrics {
        pub available: bool,
        pub outcome: BiometricOutcome,
        pub calls: Cell<u32>,
    }

    impl FakeBiometrics {
        pub(crate) fn new(available: bool, outcome: BiometricOutcome) -> Self {
            Self {
                available,
                outcome,
                calls: Cell::new(0),
            }
        }
    }

    impl BiometricProvider for FakeBiometrics {
        fn has_hardware(&self) -> bool {
            self.available
        }

        fn is_enrolled(&self) -> bool {
            self.available
        }

        fn authenticate(&self, _prompt: &str) -> BiometricOutcome {
            self.calls.set(self.calls.get() + 1);
            self.outcome.clone()
        }
    }

    #[test]
    fn unprotected_entry_reveals_without_challenge() {
        let mut gate = RevealGate::new(false, true);
        assert_eq!(gate.request_reveal(), RevealState::Revealed);
        assert!(gate.is_revealed());
    }

    #[test]
    fn reveal_is_a_toggle() {
        let mut gate = RevealGate::new(false, false);
        gate.request_reveal();
        assert_eq!(gate.request_reveal(), RevealState::Hidden);
        gate.request_reveal();
        gate.hide();
        assert_eq!(gate.state(), RevealState::Hidden);
    }

    #[test]
    fn protected_entry_with_biometrics_awaits_biometric() {
        let mut gate = RevealGate::new(true, true);
        assert_eq!(gate.request_reveal(), RevealState::AwaitingBiometric);
        assert_eq!(
            gate.complete_biometric(BiometricOutcome::Success),
            Ok(RevealState::Revealed)
        );
    }

    #[test]
    fn biometric_cancel_is_silent_and_failure_is_reported() {
        let mut gate = RevealGate::new(true, true);
        gate.request_reveal();
        assert_eq!(
            gate.complete_biometric(BiometricOutcome::Cancelled),
            Ok(RevealState::Hidden)
        );

        gate.request_reveal();
        assert_eq!(
            gate.complete_biometric(BiometricOutcome::Failed("lockout".into())),
            Err(GateError::AuthenticationFailed)
        );
        assert_eq!(gate.state(), RevealState::Hidden);
    }

    #[test]
    fn protected_entry_without_biometrics_awaits_pin() {
        let mut gate = RevealGate::new(true, false);
        assert_eq!(gate.request_reveal(), RevealState::AwaitingPin);

        let mut entry = PinEntry::from_input("1234").unwrap();
        assert_eq!(
            gate.submit_pin(&mut entry, Some("1234")),
            Ok(RevealState::Revealed)
        );
        assert_eq!(entry.len(), 0);
    }

    #[test]
    fn wrong_pin_hides_and_clears_input() {
        let mut gate = RevealGate::new(true, false);
        for _ in 0..10 {
            gate.request_reveal();
            let mut entry = PinEntry::from_input("9999").unwrap();
            assert_eq!(
                gate.submit_pin(&mut entry, Some("1234")),
                Err(GateError::WrongPin)
            );
            assert_eq!(gate.state(), RevealState::Hidden);
            assert_eq!(entry.len(), 0);
        }
        // блокировки нет
        gate.request_reveal();
        assert!(gate.submit_pin(&mut PinEntry::from_input("1234").unwrap(), Some("1234")).is_ok());
    }

    #[test]
    fn incomplete_pin_keeps_waiting() {
        let mut gate = RevealGate::new(true, false);
        gate.request_reveal();
        let mut entry = PinEntry::from_input("12").unwrap();
        assert_eq!(
            gate.submit_pin(&mut entry, Some("1234")),
            Err(GateError::IncompletePin)
        );
        assert_eq!(gate.state(), RevealState::AwaitingPin);
        // нажатие "показать" во время ожидания ничего не меняет
        assert_eq!(gate.request_reveal(), RevealState::AwaitingPin);
    }

    #[test]
    fn missing_stored_pin_lets_reveal_through() {
        let mut gate = RevealGate::new(true, false);
        gate.request_reveal();
        assert_eq!(
            gate.submit_pin(&mut PinEntry::new(), None),
            Ok(RevealState::Revealed)
        );
    }

    #[test]
    fn events_out_of_turn_are_rejected() {
        let mut gate = RevealGate::new(true, false);
        assert_eq!(
            gate.complete_biometric(BiometricOutcome::Success),
            Err(GateError::NotAwaiting)
        );
        assert_eq!(
            gate.submit_pin(&mut PinEntry::from_input("1234").unwrap(), Some("1234")),
            Err(GateError::NotAwaiting)
        );
    }

    #[test]
    fn availability_is_captured_at_mount() {
        use crate::entry::EntryDraft;
        let entry = EntryDraft {
            service: "bank".into(),
            username: "me".into(),
            secret: "s3cret".into(),
            requires_auth_to_reveal: true,
            ..Default::default()
        }
        .into_entry(None)
        .unwrap();

        let bio = FakeBiometrics::new(false, BiometricOutcome::Success);
        let mut gate = RevealGate::mount(&entry, &bio);
        assert_eq!(gate.request_reveal(), RevealState::AwaitingPin);
        assert_eq!(bio.calls.get(), 0);

        let gate_bio = RevealGate::mount(&entry, &NoBiometrics);
        assert_eq!(gate_bio.state(), RevealState::Hidden);
    }

    #[test]
    fn run_reveal_uses_biometrics_once() {
        let bio = FakeBiometrics::new(true, BiometricOutcome::Success);
        let mut gate = RevealGate::new(true, bio.is_available());
        let state = run_reveal(&mut gate, &bio, Some("1234"), || {
            panic!("PIN must not be asked when biometrics succeed")
        })
        .unwrap();
        assert_eq!(state, RevealState::Revealed);
        assert_eq!(bio.calls.get(), 1);
    }

    #[test]
    fn run_reveal_cancel_stays_hidden_without_error() {
        let bio = FakeBiometrics::new(true, BiometricOutcome::Cancelled);
        let mut gate = RevealGate::new(true, true);
        let state = run_reveal(&mut gate, &bio, None, || Ok(PinEntry::new())).unwrap();
        assert_eq!(state, RevealState::Hidden);
    }

    #[test]
    fn run_reveal_rejects_overlong_and_mixed_pin() {
        for typed in ["12349", "1x2y3z4", "123456"] {
            let mut gate = RevealGate::new(true, false);
            let err = run_reveal(&mut gate, &NoBiometrics, Some("1234"), || {
                Ok(PinEntry::from_input(typed)?)
            })
            .unwrap_err();
            assert_eq!(err.downcast_ref::<PinError>(), Some(&PinError::Malformed));
            assert_eq!(gate.state(), RevealState::Hidden);
            assert!(!gate.is_revealed());
        }
    }

    #[test]
    fn run_reveal_wrong_pin_is_an_error() {
        let mut gate = RevealGate::new(true, false);
        let err = run_reveal(&mut gate, &NoBiometrics, Some("1234"), || {
            Ok(PinEntry::from_input("4321")?)
        })
        .unwrap_err();
        assert_eq!(err.downcast_ref::<GateError>(), Some(&GateError::WrongPin));
        assert_eq!(gate.state(), RevealState::Hidden);
    }
}
