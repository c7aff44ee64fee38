use std::collections::HashMap;

use crate::client::HighlightKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Visual attributes used when painting a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStyle {
    pub color: Rgb,
    pub bold: bool,
    pub italic: bool,
}

impl RunStyle {
    pub const fn plain(color: Rgb) -> Self {
        Self {
            color,
            bold: false,
            italic: false,
        }
    }
}

impl Default for RunStyle {
    fn default() -> Self {
        Self::plain(Rgb::BLACK)
    }
}

/// 样式表：把高亮类别映射到打印样式 / Maps highlight kinds to print styles.
///
/// Kinds without an entry use the plain style.
#[derive(Debug, Clone, PartialEq)]
pub struct StylePalette {
    plain: RunStyle,
    styles: HashMap<HighlightKind, RunStyle>,
}

impl StylePalette {
    pub fn empty() -> Self {
        Self {
            plain: RunStyle::default(),
            styles: HashMap::new(),
        }
    }

    pub fn style_for(&self, kind: &HighlightKind) -> RunStyle {
        if *kind == HighlightKind::Plain {
            return self.plain;
        }
        self.styles.get(kind).copied().unwrap_or(self.plain)
    }

    pub fn insert(&mut self, kind: HighlightKind, style: RunStyle) {
        if kind == HighlightKind::Plain {
            self.plain = style;
        } else {
            self.styles.insert(kind, style);
        }
    }
}

impl Default for StylePalette {
    /// Light palette suited to white paper.
    fn default() -> Self {
        let mut palette = Self::empty();
        palette.insert(
            HighlightKind::Keyword,
            RunStyle {
                color: Rgb::new(0x00, 0x00, 0xC0),
                bold: true,
                italic: false,
            },
        );
        palette.insert(
            HighlightKind::Comment,
            RunStyle {
                color: Rgb::new(0x00, 0x80, 0x00),
                bold: false,
                italic: true,
            },
        );
        palette.insert(HighlightKind::String, RunStyle::plain(Rgb::new(0xA3, 0x15, 0x15)));
        palette.insert(HighlightKind::Number, RunStyle::plain(Rgb::new(0x09, 0x86, 0x58)));
        palette.insert(HighlightKind::Operator, RunStyle::plain(Rgb::new(0x40, 0x40, 0x40)));
        palette
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ThemeParseError {
    #[error("palette must be an object")]
    InvalidPalette,
    #[error("palette entry '{0}' must be an object")]
    InvalidEntry(String),
    #[error("invalid color '{value}': {reason}")]
    InvalidColor {
        value: String,
        reason: ColorParseError,
    },
    #[error("palette entry '{0}' must contain a foreground color")]
    MissingForeground(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorParseError {
    MissingHash,
    InvalidLength,
    InvalidHex,
}

impl std::fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorParseError::MissingHash => write!(f, "missing leading '#'"),
            ColorParseError::InvalidLength => write!(f, "expected 6 hex digits"),
            ColorParseError::InvalidHex => write!(f, "contains non-hex digits"),
        }
    }
}

/// Overlays the entries of a JSON object onto the default palette.
///
/// ```json
/// { "keyword": { "foreground": "#0000C0", "bold": true }, "plain": { "foreground": "#202020" } }
/// ```
pub fn parse_style_palette(value: &serde_json::Value) -> Result<StylePalette, ThemeParseError> {
    let map = value.as_object().ok_or(ThemeParseError::InvalidPalette)?;
    let mut palette = StylePalette::default();
    for (name, entry) in map {
        let style = parse_style(name, entry)?;
        palette.insert(HighlightKind::from_tag(name), style);
    }
    Ok(palette)
}

fn parse_style(name: &str, value: &serde_json::Value) -> Result<RunStyle, ThemeParseError> {
    let map = value
        .as_object()
        .ok_or_else(|| ThemeParseError::InvalidEntry(name.to_string()))?;

    let foreground = map
        .get("foreground")
        .and_then(|value| value.as_str())
        .ok_or_else(|| ThemeParseError::MissingForeground(name.to_string()))?;
    let color = parse_color(foreground).map_err(|reason| ThemeParseError::InvalidColor {
        value: foreground.to_string(),
        reason,
    })?;

    let flag = |key: &str| map.get(key).and_then(|value| value.as_bool()).unwrap_or(false);

    Ok(RunStyle {
        color,
        bold: flag("bold"),
        italic: flag("italic"),
    })
}

fn parse_color(input: &str) -> Result<Rgb, ColorParseError> {
    let hex = input
        .trim()
        .strip_prefix('#')
        .ok_or(ColorParseError::MissingHash)?;
    if !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return Err(ColorParseError::InvalidHex);
    }
    if hex.len() != 6 {
        return Err(ColorParseError::InvalidLength);
    }
    let component = |index: usize| {
        u8::from_str_radix(&hex[index * 2..index * 2 + 2], 16)
            .map_err(|_| ColorParseError::InvalidHex)
    };
    Ok(Rgb::new(component(0)?, component(1)?, component(2)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_palette_over_defaults() {
        let value = json!({
            "keyword": { "foreground": "#FFAA00", "bold": true },
            "plain": { "foreground": "#202020" },
            "attr-name": { "foreground": "#CCCCCC", "italic": true }
        });

        let palette = parse_style_palette(&value).unwrap();
        let keyword = palette.style_for(&HighlightKind::Keyword);
        assert_eq!(keyword.color, Rgb::new(0xFF, 0xAA, 0x00));
        assert!(keyword.bold);

        let custom = palette.style_for(&HighlightKind::Custom("attr-name".into()));
        assert!(custom.italic);

        // Untouched entries keep the defaults; unknown kinds use plain.
        assert_eq!(
            palette.style_for(&HighlightKind::Comment),
            StylePalette::default().style_for(&HighlightKind::Comment)
        );
        assert_eq!(
            palette.style_for(&HighlightKind::Identifier).color,
            Rgb::new(0x20, 0x20, 0x20)
        );
    }

    #[test]
    fn rejects_bad_colors() {
        let err = parse_style_palette(&json!({ "string": { "foreground": "red" } })).unwrap_err();
        assert!(matches!(
            err,
            ThemeParseError::InvalidColor {
                reason: ColorParseError::MissingHash,
                ..
            }
        ));

        let err = parse_style_palette(&json!({ "string": { "foreground": "#12é4" } })).unwrap_err();
        assert!(matches!(
            err,
            ThemeParseError::InvalidColor {
                reason: ColorParseError::InvalidHex,
                ..
            }
        ));

        let err = parse_style_palette(&json!({ "string": {} })).unwrap_err();
        assert!(matches!(err, ThemeParseError::MissingForeground(name) if name == "string"));
    }
}
