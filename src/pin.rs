//! 4-значный PIN: ввод, первичная установка, хранение.
//!
//! PIN хранится как есть (без хэша) и сравнивается посимвольно.
//! Счётчика попыток и блокировки нет.

use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::store::{KvStore, PIN_KEY, StoreError};

pub const PIN_LEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PinError {
    #[error("PIN must be exactly 4 digits")]
    Incomplete,
    #[error("PIN codes do not match, start again")]
    Mismatch,
    #[error("PIN must contain only digits, at most 4")]
    Malformed,
}

/// Набираемый PIN: не больше четырёх цифр, при сбросе память затирается.
pub struct PinEntry {
    digits: Zeroizing<String>,
}

impl Default for PinEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl PinEntry {
    pub fn new() -> Self {
        Self {
            digits: Zeroizing::new(String::with_capacity(PIN_LEN)),
        }
    }

    /// Взять введённую строку целиком. Не-цифры и пятая цифра — ошибка,
    /// а не молча отброшенный хвост; короткий ввод принимается как неполный.
    pub fn from_input(input: &str) -> Result<Self, PinError> {
        let mut entry = Self::new();
        for c in input.chars() {
            if !entry.push_digit(c) {
                entry.clear();
                return Err(PinError::Malformed);
            }
        }
        Ok(entry)
    }

    /// Добавить цифру; когда набрано четыре, остальные нажатия не принимаются.
    fn push_digit(&mut self, c: char) -> bool {
        if !c.is_ascii_digit() || self.is_complete() {
            return false;
        }
        self.digits.push(c);
        true
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_complete(&self) -> bool {
        self.digits.len() == PIN_LEN
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }

    pub fn clear(&mut self) {
        self.digits.zeroize();
    }
}

impl std::fmt::Debug for PinEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PinEntry({} digits)", self.len())
    }
}

#[derive(Default)]
enum SetupState {
    #[default]
    NoPinSet,
    ConfirmPending(Zeroizing<String>),
    PinSet(Zeroizing<String>),
}

/// Что произошло после очередного ввода при установке PIN.
#[derive(Debug, PartialEq, Eq)]
pub enum SetupStep {
    /// Первый ввод принят, нужно повторить.
    ConfirmRequested,
    /// PIN подтверждён.
    Completed,
}

/// Первичная установка PIN: ввести, повторить.
/// Несовпадение сбрасывает всё к началу.
#[derive(Default)]
pub struct PinSetup {
    state: SetupState,
}

impl PinSetup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_confirming(&self) -> bool {
        matches!(self.state, SetupState::ConfirmPending(_))
    }

    /// Готовый PIN, если установка завершена.
    pub fn pin(&self) -> Option<&str> {
        match &self.state {
            SetupState::PinSet(pin) => Some(pin.as_str()),
            _ => None,
        }
    }

    /// Отправить набранный код. Поле ввода очищается в любом случае,
    /// кроме неполного ввода.
    pub fn submit(&mut self, entry: &mut PinEntry) -> Result<SetupStep, PinError> {
        if !entry.is_complete() {
            return Err(PinError::Incomplete);
        }
        let typed = Zeroizing::new(entry.as_str().to_string());
        entry.clear();

        match std::mem::take(&mut self.state) {
            SetupState::NoPinSet => {
                self.state = SetupState::ConfirmPending(typed);
                Ok(SetupStep::ConfirmRequested)
            }
            SetupState::ConfirmPending(first) => {
                if *first == *typed {
                    self.state = SetupState::PinSet(first);
                    Ok(SetupStep::Completed)
                } else {
                    self.state = SetupState::NoPinSet;
                    Err(PinError::Mismatch)
                }
            }
            SetupState::PinSet(pin) => {
                self.state = SetupState::PinSet(pin);
                Ok(SetupStep::Completed)
            }
        }
    }
}

pub fn load_pin<S: KvStore>(store: &S) -> Result<Option<Zeroizing<String>>, StoreError> {
    Ok(store.get_item(PIN_KEY)?.map(Zeroizing::new))
}

pub fn save_pin<S: KvStore>(store: &mut S, pin: &str) -> Result<(), StoreError> {
    store.set_item(PIN_KEY, pin)?;
    tracing::info!("PIN saved");
    Ok(())
}

/// Сравнение с сохранённым PIN, дословно.
pub fn verify(entry: &PinEntry, stored: &str) -> bool {
    entry.as_str() == stored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn entry_takes_up_to_four_digits() {
        let mut entry = PinEntry::from_input("1234").unwrap();
        assert!(entry.is_complete());
        entry.clear();
        assert_eq!(entry.len(), 0);

        let short = PinEntry::from_input("12").unwrap();
        assert_eq!(short.as_str(), "12");
        assert!(!short.is_complete());
    }

    #[test]
    fn overlong_or_mixed_input_is_rejected() {
        for bad in ["12345", "12349", "123456", "1x2y3z4", "12a3", "12 34", "١٢٣٤"] {
            assert_eq!(
                PinEntry::from_input(bad).map(|e| e.len()),
                Err(PinError::Malformed),
                "{bad}"
            );
        }
    }

    #[test]
    fn setup_confirms_matching_codes() {
        let mut setup = PinSetup::new();
        let mut entry = PinEntry::from_input("4821").unwrap();
        assert_eq!(setup.submit(&mut entry), Ok(SetupStep::ConfirmRequested));
        assert_eq!(entry.len(), 0);
        assert!(setup.is_confirming());

        let mut entry = PinEntry::from_input("4821").unwrap();
        assert_eq!(setup.submit(&mut entry), Ok(SetupStep::Completed));
        assert!(!setup.is_confirming());
        assert_eq!(setup.pin(), Some("4821"));
    }

    #[test]
    fn mismatch_restarts_from_scratch() {
        let mut setup = PinSetup::new();
        setup.submit(&mut PinEntry::from_input("1111").unwrap()).unwrap();
        assert_eq!(
            setup.submit(&mut PinEntry::from_input("2222").unwrap()),
            Err(PinError::Mismatch)
        );
        assert!(!setup.is_confirming());
        assert_eq!(setup.pin(), None);

        // снова первый шаг, а не подтверждение
        assert_eq!(
            setup.submit(&mut PinEntry::from_input("2222").unwrap()),
            Ok(SetupStep::ConfirmRequested)
        );
    }

    #[test]
    fn short_code_is_rejected_without_state_change() {
        let mut setup = PinSetup::new();
        let mut entry = PinEntry::from_input("12").unwrap();
        assert_eq!(setup.submit(&mut entry), Err(PinError::Incomplete));
        assert_eq!(entry.as_str(), "12");
        assert!(!setup.is_confirming());
    }

    #[test]
    fn stored_pin_round_trip_and_verify() {
        let mut store = MemoryStore::default();
        assert!(load_pin(&store).unwrap().is_none());

        save_pin(&mut store, "0420").unwrap();
        let stored = load_pin(&store).unwrap().unwrap();
        assert!(verify(&PinEntry::from_input("0420").unwrap(), &stored));
        assert!(!verify(&PinEntry::from_input("0421").unwrap(), &stored));
    }
}
