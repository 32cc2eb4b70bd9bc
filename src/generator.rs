use rand::Rng;

pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const DIGITS: &str = "0123456789";

/// Спецсимволы генератора в окне добавления/редактирования записи.
pub const ENTRY_SYMBOLS: &str = "!@#$%^&*()_+-=";
/// Спецсимволы отдельного генератора (`passbook gen`).
pub const STANDALONE_SYMBOLS: &str = "!@#$%^&*()-_=+[]{}|;:,.<>?";

/// Границы длины, которые выставляет интерфейс. Сам генератор их не проверяет.
pub const MIN_LENGTH: usize = 6;
pub const MAX_LENGTH: usize = 32;
pub const DEFAULT_LENGTH: usize = 12;

/// Какой набор спецсимволов использовать: у каждого места вызова свой.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolSet {
    Entry,
    Standalone,
}

impl SymbolSet {
    pub fn alphabet(&self) -> &'static str {
        match self {
            SymbolSet::Entry => ENTRY_SYMBOLS,
            SymbolSet::Standalone => STANDALONE_SYMBOLS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GeneratorOptions {
    pub length: usize,
    pub upper: bool,
    pub lower: bool,
    pub digits: bool,
    pub symbols: bool,
    pub symbol_set: SymbolSet,
}

impl GeneratorOptions {
    /// Всё включено, длина 12.
    pub fn new(symbol_set: SymbolSet) -> Self {
        Self {
            length: DEFAULT_LENGTH,
            upper: true,
            lower: true,
            digits: true,
            symbols: true,
            symbol_set,
        }
    }

    /// Пул символов: строчные, заглавные, цифры, спецсимволы.
    pub fn pool(&self) -> Vec<char> {
        let mut chars = String::new();
        if self.lower {
            chars.push_str(LOWERCASE);
        }
        if self.upper {
            chars.push_str(UPPERCASE);
        }
        if self.digits {
            chars.push_str(DIGITS);
        }
        if self.symbols {
            chars.push_str(self.symbol_set.alphabet());
        }
        chars.chars().collect()
    }
}

/// Зажать длину в границы интерфейса.
pub fn clamp_length(length: usize) -> usize {
    length.clamp(MIN_LENGTH, MAX_LENGTH)
}

pub fn generate(opts: &GeneratorOptions) -> String {
    generate_with(opts, &mut rand::thread_rng())
}

/// Каждый символ выбирается независимо и равновероятно из пула.
/// Наличие каждого включённого класса в результате не гарантируется.
/// Пустой пул даёт пустую строку: это ошибка пользователя, а не паника.
pub fn generate_with<R: Rng + ?Sized>(opts: &GeneratorOptions, rng: &mut R) -> String {
    let pool = opts.pool();
    if pool.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(opts.length);
    for _ in 0..opts.length {
        let idx = rng.gen_range(0..pool.len());
        out.push(pool[idx]);
    }
    out
}
