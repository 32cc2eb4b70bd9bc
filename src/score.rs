//! Числовая оценка безопасности паролей (0..=100) и сводка по всей коллекции.
//!
//! Это эвристика для дашборда, а не оценка энтропии: ни словарей, ни
//! проверки по утечкам здесь нет.

use std::collections::HashSet;

use crate::entry::{Category, Entry};
use crate::strength::{CharClasses, char_len};

const CLASS_POINTS: i32 = 15;
const REPEAT_PENALTY: i32 = 2;
const SEQUENCE_PENALTY: i32 = 2;

/// Балл одного пароля.
pub fn score(password: &str) -> u8 {
    let chars: Vec<char> = password.chars().collect();
    let len = chars.len();

    let mut total: i32 = if len >= 16 {
        30
    } else if len >= 12 {
        25
    } else if len >= 8 {
        15
    } else {
        5
    };

    total += CLASS_POINTS * CharClasses::of(password).count() as i32;

    // каждый повтор уже встречавшегося символа
    let distinct = chars.iter().collect::<HashSet<_>>().len();
    total -= REPEAT_PENALTY * (len - distinct) as i32;

    // пары вида "ab", "12"
    let ascending = chars
        .windows(2)
        .filter(|w| (w[1] as u32).checked_sub(w[0] as u32) == Some(1))
        .count();
    total -= SEQUENCE_PENALTY * ascending as i32;

    total.clamp(0, 100) as u8
}

/// Средний балл по коллекции, округлённый до целого. Пустая коллекция — 0.
pub fn aggregate<'a, I>(passwords: I) -> u8
where
    I: IntoIterator<Item = &'a str>,
{
    let (sum, count) = passwords
        .into_iter()
        .fold((0u32, 0u32), |(sum, count), p| (sum + score(p) as u32, count + 1));
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round() as u8
}

/// "Сильный": длина >= 12 и все четыре класса символов.
pub fn is_strong(password: &str) -> bool {
    let c = CharClasses::of(password);
    char_len(password) >= 12 && c.upper && c.lower && c.digit && c.symbol
}

/// "Слабый": короче 8 или нет заглавной, строчной или цифры.
///
/// Отсутствие спецсимвола сюда не входит, в отличие от [`is_strong`].
/// Асимметрия сохранена намеренно: пароль может не быть ни сильным, ни слабым.
pub fn is_weak(password: &str) -> bool {
    let c = CharClasses::of(password);
    char_len(password) < 8 || !c.upper || !c.lower || !c.digit
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    Low,
    Medium,
    High,
}

impl ScoreTier {
    pub fn of(score: u8) -> Self {
        if score >= 75 {
            ScoreTier::High
        } else if score >= 50 {
            ScoreTier::Medium
        } else {
            ScoreTier::Low
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            ScoreTier::High => "Great! Your passwords are quite strong.",
            ScoreTier::Medium => "Good! Some of your passwords could be stronger.",
            ScoreTier::Low => "You need to strengthen your passwords.",
        }
    }
}

/// Сводка для дашборда / профиля.
#[derive(Debug, Clone)]
pub struct HealthReport<'a> {
    pub total: usize,
    pub score: u8,
    pub tier: ScoreTier,
    pub strong: Vec<&'a Entry>,
    pub weak: Vec<&'a Entry>,
    pub by_category: Vec<(Option<Category>, usize)>,
}

impl<'a> HealthReport<'a> {
    pub fn of(entries: &'a [Entry]) -> Self {
        let score = aggregate(entries.iter().map(|e| e.secret.as_str()));

        let strong = entries.iter().filter(|e| is_strong(&e.secret)).collect();
        let weak = entries.iter().filter(|e| is_weak(&e.secret)).collect();

        let mut by_category: Vec<(Option<Category>, usize)> = Category::ALL
            .into_iter()
            .map(|cat| {
                let n = entries.iter().filter(|e| e.category == Some(cat)).count();
                (Some(cat), n)
            })
            .collect();
        by_category.push((None, entries.iter().filter(|e| e.category.is_none()).count()));

        HealthReport {
            total: entries.len(),
            score,
            tier: ScoreTier::of(score),
            strong,
            weak,
            by_category,
        }
    }
}
