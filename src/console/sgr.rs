// src/console/sgr.rs

//! Select Graphic Rendition (SGR) escape sequences.
//!
//! Only the subset the console needs: foreground/background colours and one
//! text effect. Everything the console measures goes through
//! [`visual_width`], which ignores these sequences.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Matches any SGR sequence (`ESC [ params m`).
static SGR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("SGR pattern is a valid regex"));

pub const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    fn offset(self) -> u8 {
        match self {
            Color::Black => 0,
            Color::Red => 1,
            Color::Green => 2,
            Color::Yellow => 3,
            Color::Blue => 4,
            Color::Magenta => 5,
            Color::Cyan => 6,
            Color::White => 7,
        }
    }

    fn foreground_code(self) -> u8 {
        30 + self.offset()
    }

    fn background_code(self) -> u8 {
        40 + self.offset()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Bold,
    Dim,
    Italic,
    Underline,
    Blink,
    Reverse,
    Strikethrough,
}

impl Effect {
    fn code(self) -> u8 {
        match self {
            Effect::Bold => 1,
            Effect::Dim => 2,
            Effect::Italic => 3,
            Effect::Underline => 4,
            Effect::Blink => 5,
            Effect::Reverse => 7,
            Effect::Strikethrough => 9,
        }
    }
}

/// A combination of text colour, background colour and effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sgr {
    pub text_color: Option<Color>,
    pub background_color: Option<Color>,
    pub effect: Option<Effect>,
}

impl Sgr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, color: Color) -> Self {
        self.text_color = Some(color);
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn effect(mut self, effect: Effect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Combine two renditions; attributes set on `other` win.
    pub fn merge(self, other: Sgr) -> Sgr {
        Sgr {
            text_color: other.text_color.or(self.text_color),
            background_color: other.background_color.or(self.background_color),
            effect: other.effect.or(self.effect),
        }
    }

    pub fn is_plain(&self) -> bool {
        self.text_color.is_none() && self.background_color.is_none() && self.effect.is_none()
    }

    /// Wrap `text` in this rendition followed by a reset.
    pub fn paint(&self, text: &str) -> String {
        if self.is_plain() || text.is_empty() {
            return text.to_string();
        }
        format!("{self}{text}{RESET}")
    }
}

impl fmt::Display for Sgr {
    /// Parameters are written background, effect, text colour.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codes: Vec<String> = [
            self.background_color.map(Color::background_code),
            self.effect.map(Effect::code),
            self.text_color.map(Color::foreground_code),
        ]
        .into_iter()
        .flatten()
        .map(|c| c.to_string())
        .collect();

        write!(f, "\x1b[{}m", codes.join(";"))
    }
}

/// Remove every SGR sequence from `text`.
pub fn strip_sgr(text: &str) -> Cow<'_, str> {
    SGR_PATTERN.replace_all(text, "")
}

/// Number of visible characters in `text`.
pub fn visual_width(text: &str) -> usize {
    strip_sgr(text).chars().count()
}
