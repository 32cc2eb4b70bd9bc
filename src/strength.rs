//! Оценка сложности пароля "на лету" (подсказка при вводе/генерации).

/// Какие классы символов встречаются в пароле.
///
/// Классы считаются по ASCII: `A-Z`, `a-z`, `0-9`, всё остальное (включая
/// не-ASCII буквы) идёт в "символы".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharClasses {
    pub upper: bool,
    pub lower: bool,
    pub digit: bool,
    pub symbol: bool,
}

impl CharClasses {
    pub fn of(password: &str) -> Self {
        let mut classes = CharClasses::default();
        for c in password.chars() {
            match c {
                'A'..='Z' => classes.upper = true,
                'a'..='z' => classes.lower = true,
                '0'..='9' => classes.digit = true,
                _ => classes.symbol = true,
            }
        }
        classes
    }

    pub fn count(&self) -> u8 {
        [self.upper, self.lower, self.digit, self.symbol]
            .iter()
            .filter(|present| **present)
            .count() as u8
    }
}

/// Длина пароля в символах (а не в байтах).
pub fn char_len(password: &str) -> usize {
    password.chars().count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrengthLabel {
    Weak,
    Medium,
    Strong,
}

impl StrengthLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrengthLabel::Weak => "Weak",
            StrengthLabel::Medium => "Medium",
            StrengthLabel::Strong => "Strong",
        }
    }

    /// Цвет полоски индикатора.
    pub fn color(&self) -> &'static str {
        match self {
            StrengthLabel::Weak => "#FF3B30",
            StrengthLabel::Medium => "#FF9500",
            StrengthLabel::Strong => "#34C759",
        }
    }

    /// Заполненность индикатора в процентах.
    pub fn fill_percent(&self) -> u8 {
        match self {
            StrengthLabel::Weak => 33,
            StrengthLabel::Medium => 66,
            StrengthLabel::Strong => 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strength {
    pub label: StrengthLabel,
    /// Сырой балл 0..=6.
    pub raw_score: u8,
}

impl Strength {
    pub fn fill_percent(&self) -> u8 {
        self.label.fill_percent()
    }

    pub fn color(&self) -> &'static str {
        self.label.color()
    }
}

/// Шесть независимых проверок, каждая даёт один балл:
/// длина >= 8, длина >= 12, заглавная, строчная, цифра, спецсимвол.
pub fn classify(password: &str) -> Strength {
    let len = char_len(password);
    let classes = CharClasses::of(password);

    let mut raw_score = classes.count();
    if len >= 8 {
        raw_score += 1;
    }
    if len >= 12 {
        raw_score += 1;
    }

    Strength {
        label: label_for(raw_score),
        raw_score,
    }
}

fn label_for(raw_score: u8) -> StrengthLabel {
    match raw_score {
        0..=2 => StrengthLabel::Weak,
        3..=4 => StrengthLabel::Medium,
        _ => StrengthLabel::Strong,
    }
}
