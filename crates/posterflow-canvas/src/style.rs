//! Mapping free-form text styles onto the drawing surface's style tokens.

use serde::{Deserialize, Serialize};

use posterflow_core::types::TextStyle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    S,
    M,
    L,
    Xl,
}

/// The fixed 13-color palette of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorToken {
    Black,
    Grey,
    LightViolet,
    Violet,
    Blue,
    LightBlue,
    Yellow,
    Orange,
    Green,
    LightGreen,
    LightRed,
    Red,
    White,
}

impl ColorToken {
    pub const ALL: [ColorToken; 13] = [
        Self::Black,
        Self::Grey,
        Self::LightViolet,
        Self::Violet,
        Self::Blue,
        Self::LightBlue,
        Self::Yellow,
        Self::Orange,
        Self::Green,
        Self::LightGreen,
        Self::LightRed,
        Self::Red,
        Self::White,
    ];

    /// Used whenever a color cannot be resolved.
    pub const DEFAULT: ColorToken = ColorToken::White;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Grey => "grey",
            Self::LightViolet => "light-violet",
            Self::Violet => "violet",
            Self::Blue => "blue",
            Self::LightBlue => "light-blue",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Green => "green",
            Self::LightGreen => "light-green",
            Self::LightRed => "light-red",
            Self::Red => "red",
            Self::White => "white",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontClass {
    Serif,
    Mono,
    #[default]
    Sans,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalStyle {
    pub size: SizeClass,
    pub color: ColorToken,
    pub font: FontClass,
}

pub fn to_canonical_style(style: &TextStyle) -> CanonicalStyle {
    CanonicalStyle {
        size: size_class(style.font_size),
        color: color_token(style.color.as_deref()),
        font: font_class(style.font_family.as_deref()),
    }
}

/// Bucket a font size: ≤16 S, ≤24 M, ≤48 L, else XL. Missing sizes are M.
pub fn size_class(font_size: Option<f64>) -> SizeClass {
    match font_size {
        Some(px) if px.is_nan() => SizeClass::M,
        Some(px) if px <= 16.0 => SizeClass::S,
        Some(px) if px <= 24.0 => SizeClass::M,
        Some(px) if px <= 48.0 => SizeClass::L,
        Some(_) => SizeClass::Xl,
        None => SizeClass::M,
    }
}

const EXACT_COLORS: &[(&str, ColorToken)] = &[
    ("black", ColorToken::Black),
    ("000", ColorToken::Black),
    ("000000", ColorToken::Black),
    ("grey", ColorToken::Grey),
    ("gray", ColorToken::Grey),
    ("808080", ColorToken::Grey),
    ("888888", ColorToken::Grey),
    ("light-violet", ColorToken::LightViolet),
    ("lightviolet", ColorToken::LightViolet),
    ("lavender", ColorToken::LightViolet),
    ("e6e6fa", ColorToken::LightViolet),
    ("violet", ColorToken::Violet),
    ("purple", ColorToken::Violet),
    ("800080", ColorToken::Violet),
    ("ee82ee", ColorToken::Violet),
    ("blue", ColorToken::Blue),
    ("00f", ColorToken::Blue),
    ("0000ff", ColorToken::Blue),
    ("light-blue", ColorToken::LightBlue),
    ("lightblue", ColorToken::LightBlue),
    ("add8e6", ColorToken::LightBlue),
    ("87ceeb", ColorToken::LightBlue),
    ("yellow", ColorToken::Yellow),
    ("ff0", ColorToken::Yellow),
    ("ffff00", ColorToken::Yellow),
    ("ffd700", ColorToken::Yellow),
    ("orange", ColorToken::Orange),
    ("ffa500", ColorToken::Orange),
    ("ff8c00", ColorToken::Orange),
    ("green", ColorToken::Green),
    ("0f0", ColorToken::Green),
    ("00ff00", ColorToken::Green),
    ("008000", ColorToken::Green),
    ("light-green", ColorToken::LightGreen),
    ("lightgreen", ColorToken::LightGreen),
    ("90ee90", ColorToken::LightGreen),
    ("light-red", ColorToken::LightRed),
    ("lightred", ColorToken::LightRed),
    ("pink", ColorToken::LightRed),
    ("ffc0cb", ColorToken::LightRed),
    ("red", ColorToken::Red),
    ("f00", ColorToken::Red),
    ("ff0000", ColorToken::Red),
    ("white", ColorToken::White),
    ("fff", ColorToken::White),
    ("ffffff", ColorToken::White),
];

/// Color stems checked by containment, in order, after the `light-*` rules.
const COLOR_STEMS: &[(&str, ColorToken)] = &[
    ("black", ColorToken::Black),
    ("white", ColorToken::White),
    ("grey", ColorToken::Grey),
    ("gray", ColorToken::Grey),
    ("silver", ColorToken::Grey),
    ("pink", ColorToken::LightRed),
    ("violet", ColorToken::Violet),
    ("purple", ColorToken::Violet),
    ("magenta", ColorToken::Violet),
    ("orange", ColorToken::Orange),
    ("yellow", ColorToken::Yellow),
    ("gold", ColorToken::Yellow),
    ("green", ColorToken::Green),
    ("lime", ColorToken::Green),
    ("blue", ColorToken::Blue),
    ("cyan", ColorToken::Blue),
    ("navy", ColorToken::Blue),
    ("teal", ColorToken::Blue),
    ("red", ColorToken::Red),
    ("crimson", ColorToken::Red),
    ("maroon", ColorToken::Red),
];

/// Resolve any color string to a palette token. Never fails.
pub fn color_token(raw: Option<&str>) -> ColorToken {
    let Some(raw) = raw else {
        return ColorToken::DEFAULT;
    };
    let key: String = raw
        .chars()
        .filter(|c| *c != '#' && !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();

    if let Some((_, token)) = EXACT_COLORS.iter().find(|(name, _)| *name == key) {
        return *token;
    }

    if key.contains("light") {
        if key.contains("red") || key.contains("pink") {
            return ColorToken::LightRed;
        }
        if key.contains("green") {
            return ColorToken::LightGreen;
        }
        if key.contains("blue") {
            return ColorToken::LightBlue;
        }
        if key.contains("violet") || key.contains("purple") {
            return ColorToken::LightViolet;
        }
    }

    COLOR_STEMS
        .iter()
        .find(|(stem, _)| key.contains(stem))
        .map(|(_, token)| *token)
        .unwrap_or(ColorToken::DEFAULT)
}

pub fn font_class(raw: Option<&str>) -> FontClass {
    match raw.map(|f| f.trim().to_ascii_lowercase()).as_deref() {
        Some("serif") => FontClass::Serif,
        Some("mono") => FontClass::Mono,
        _ => FontClass::Sans,
    }
}
