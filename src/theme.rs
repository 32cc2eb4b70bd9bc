use std::io::IsTerminal;

use crate::config::Settings;
use crate::score::ScoreTier;

/// Цвета светлой и тёмной темы.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub primary: &'static str,
    pub high_security: &'static str,
    pub medium_security: &'static str,
    pub low_security: &'static str,
    pub secondary_text: &'static str,
}

pub const LIGHT: Palette = Palette {
    primary: "#007AFF",
    high_security: "#34C759",
    medium_security: "#FFCC00",
    low_security: "#FF3B30",
    secondary_text: "#8E8E93",
};

pub const DARK: Palette = Palette {
    primary: "#3B82F6",
    high_security: "#16C784",
    medium_security: "#EAB308",
    low_security: "#EF4444",
    secondary_text: "#A1A1AA",
};

pub struct Theme {
    pub palette: Palette,
    color: bool,
}

impl Theme {
    pub fn from_settings(settings: &Settings) -> Self {
        let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self {
            palette: if settings.dark_mode { DARK } else { LIGHT },
            color,
        }
    }

    pub fn tier_color(&self, tier: ScoreTier) -> &'static str {
        match tier {
            ScoreTier::High => self.palette.high_security,
            ScoreTier::Medium => self.palette.medium_security,
            ScoreTier::Low => self.palette.low_security,
        }
    }

    /// Покрасить текст цветом `#RRGGBB` (truecolor), если вывод в терминал.
    pub fn paint(&self, hex: &str, text: &str) -> String {
        match (self.color, parse_hex(hex)) {
            (true, Some((r, g, b))) => format!("\x1b[38;2;{r};{g};{b}m{text}\x1b[0m"),
            _ => text.to_string(),
        }
    }
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Полоска вида `[######----]` для процента.
pub fn bar(percent: u8, width: usize) -> String {
    let filled = (percent.min(100) as usize * width + 50) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}
