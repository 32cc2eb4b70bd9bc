use anyhow::Result;
use std::io::{self, Write};

use crate::pin::PinEntry;

pub fn prompt_string(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(trim_newline(s))
}

/// Как `prompt_string`, но пустой ответ превращается в `None`.
pub fn prompt_optional(prompt: &str) -> Result<Option<String>> {
    let s = prompt_string(prompt)?;
    Ok(if s.trim().is_empty() { None } else { Some(s) })
}

pub fn prompt_password_hidden(prompt: &str) -> Result<String> {
    let pw = rpassword::prompt_password(prompt)?;
    Ok(pw)
}

/// PIN без эха. Всё, кроме цифр (и больше четырёх цифр), — ошибка.
pub fn prompt_pin(prompt: &str) -> Result<PinEntry> {
    let raw = zeroize::Zeroizing::new(rpassword::prompt_password(prompt)?);
    Ok(PinEntry::from_input(raw.trim())?)
}

/// Вопрос "да/нет", по умолчанию — нет.
pub fn confirm(prompt: &str) -> Result<bool> {
    let answer = prompt_string(&format!("{prompt} [y/N]: "))?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn trim_newline(mut s: String) -> String {
    if s.ends_with('\n') {
        s.pop();
        if s.ends_with('\r') {
            s.pop();
        }
    }
    s
}
