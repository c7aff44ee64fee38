use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_FONT_FAMILY: &str = "Cascadia Mono";
const DEFAULT_FONT_SIZE_PT: f32 = 10.0;
const DEFAULT_MARGIN_PT: f32 = 36.0;
const MAX_MARGIN_PT: f32 = 288.0;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize settings: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },
}

/// 列印字型與其度量。 / Print font and the metrics pagination relies on.
///
/// Line height and character advance follow `size_pt` unless an explicit
/// override is stored; read them through [`FontSpec::line_height`] and
/// [`FontSpec::char_width`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    #[serde(default = "default_family")]
    pub family: String,
    #[serde(default = "default_size")]
    pub size_pt: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height_pt: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_width_pt: Option<f32>,
}

fn default_family() -> String {
    DEFAULT_FONT_FAMILY.to_string()
}

fn default_size() -> f32 {
    DEFAULT_FONT_SIZE_PT
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: default_family(),
            size_pt: DEFAULT_FONT_SIZE_PT,
            line_height_pt: None,
            char_width_pt: None,
        }
    }
}

impl FontSpec {
    /// Vertical distance between baselines in points.
    pub fn line_height(&self) -> f32 {
        self.line_height_pt.unwrap_or(self.size_pt * 6.0 / 5.0)
    }

    /// Horizontal advance of one column in points.
    pub fn char_width(&self) -> f32 {
        self.char_width_pt.unwrap_or(self.size_pt * 3.0 / 5.0)
    }

    fn sanitize(&mut self) {
        if self.family.trim().is_empty() {
            self.family = default_family();
        }
        self.size_pt = sanitize_positive(self.size_pt, DEFAULT_FONT_SIZE_PT).clamp(4.0, 144.0);
        let size = self.size_pt;
        // A line must at least hold the glyphs it carries.
        self.line_height_pt = self
            .line_height_pt
            .filter(|value| value.is_finite() && *value > 0.0)
            .map(|value| value.max(size * 0.8));
        self.char_width_pt = self
            .char_width_pt
            .filter(|value| value.is_finite() && *value > 0.0)
            .map(|value| value.clamp(1.0, 144.0));
    }
}

/// Page margins in points (1/72").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    #[serde(default = "default_margin")]
    pub top: f32,
    #[serde(default = "default_margin")]
    pub bottom: f32,
    #[serde(default = "default_margin")]
    pub left: f32,
    #[serde(default = "default_margin")]
    pub right: f32,
}

fn default_margin() -> f32 {
    DEFAULT_MARGIN_PT
}

impl Margins {
    pub const fn uniform(value: f32) -> Self {
        Self {
            top: value,
            bottom: value,
            left: value,
            right: value,
        }
    }

    pub const fn zero() -> Self {
        Self::uniform(0.0)
    }

    fn sanitize(&mut self) {
        for value in [
            &mut self.top,
            &mut self.bottom,
            &mut self.left,
            &mut self.right,
        ] {
            *value = if value.is_finite() {
                value.clamp(0.0, MAX_MARGIN_PT)
            } else {
                DEFAULT_MARGIN_PT
            };
        }
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(DEFAULT_MARGIN_PT)
    }
}

/// 單次排版所使用的設定快照。 / Immutable bundle of options captured for one render.
///
/// Snapshots are never edited once published; the provider swaps in a new
/// value instead, see [`crate::SettingsProvider`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    #[serde(default)]
    pub font: FontSpec,
    #[serde(default)]
    pub margins: Margins,
    #[serde(default)]
    pub line_numbers: bool,
    #[serde(default = "default_true")]
    pub wrap: bool,
    #[serde(default = "default_header")]
    pub header: String,
    #[serde(default = "default_footer")]
    pub footer: String,
}

fn default_true() -> bool {
    true
}

fn default_header() -> String {
    "&l&f".to_string()
}

fn default_footer() -> String {
    "&cPage &p of &P".to_string()
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            font: FontSpec::default(),
            margins: Margins::default(),
            line_numbers: false,
            wrap: true,
            header: default_header(),
            footer: default_footer(),
        }
    }
}

impl SettingsSnapshot {
    /// Parses a JSON document and sanitizes the result.
    pub fn from_json_str(input: &str) -> Result<Self, SettingsError> {
        let mut snapshot: SettingsSnapshot =
            serde_json::from_str(input).map_err(|source| SettingsError::Parse { source })?;
        snapshot.sanitize();
        Ok(snapshot)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(|source| SettingsError::Serialize { source })
    }

    /// 從 JSON 檔案載入設定。 / Reads and sanitizes a JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Like [`SettingsSnapshot::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        match Self::load(path) {
            Err(SettingsError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Writes the snapshot as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, self.to_json_string()?).map_err(io_error)
    }

    /// Clamps out-of-range values back into something pagination can use.
    pub fn sanitize(&mut self) {
        self.font.sanitize();
        self.margins.sanitize();
    }

    pub fn has_header(&self) -> bool {
        !self.header.trim().is_empty()
    }

    pub fn has_footer(&self) -> bool {
        !self.footer.trim().is_empty()
    }
}

fn sanitize_positive(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let snapshot = SettingsSnapshot::from_json_str(r#"{ "lineNumbers": true }"#).unwrap();
        assert_eq!(snapshot, SettingsSnapshot::default());

        let snapshot = SettingsSnapshot::from_json_str(r#"{ "line_numbers": true }"#).unwrap();
        assert!(snapshot.line_numbers);
        assert!(snapshot.wrap);
        assert_eq!(snapshot.font.line_height(), 12.0);
        assert_eq!(snapshot.font.char_width(), 6.0);
    }

    #[test]
    fn metrics_follow_font_size_unless_overridden() {
        let snapshot =
            SettingsSnapshot::from_json_str(r#"{ "font": { "size_pt": 20 } }"#).unwrap();
        assert_eq!(snapshot.font.line_height(), 24.0);
        assert_eq!(snapshot.font.char_width(), 12.0);

        let snapshot = SettingsSnapshot::from_json_str(
            r#"{ "font": { "size_pt": 20, "line_height_pt": 30, "char_width_pt": 9 } }"#,
        )
        .unwrap();
        assert_eq!(snapshot.font.line_height(), 30.0);
        assert_eq!(snapshot.font.char_width(), 9.0);

        let json = SettingsSnapshot::default().to_json_string().unwrap();
        assert!(!json.contains("line_height_pt"));
    }

    #[test]
    fn sanitize_clamps_invalid_metrics() {
        let mut snapshot = SettingsSnapshot::default();
        snapshot.font.size_pt = -3.0;
        snapshot.font.line_height_pt = Some(0.0);
        snapshot.font.char_width_pt = Some(f32::NAN);
        snapshot.font.family = "  ".into();
        snapshot.margins.left = 10_000.0;
        snapshot.margins.top = f32::INFINITY;
        snapshot.sanitize();

        assert_eq!(snapshot.font.size_pt, DEFAULT_FONT_SIZE_PT);
        assert_eq!(snapshot.font.line_height_pt, None);
        assert_eq!(snapshot.font.char_width_pt, None);
        assert_eq!(snapshot.font.line_height(), 12.0);
        assert_eq!(snapshot.font.char_width(), 6.0);

        snapshot.font.size_pt = 20.0;
        snapshot.font.line_height_pt = Some(2.0);
        snapshot.sanitize();
        assert_eq!(snapshot.font.line_height(), 16.0);
        assert_eq!(snapshot.font.family, DEFAULT_FONT_FAMILY);
        assert_eq!(snapshot.margins.left, MAX_MARGIN_PT);
        assert_eq!(snapshot.margins.top, DEFAULT_MARGIN_PT);
    }

    #[test]
    fn json_roundtrip_preserves_values() {
        let mut snapshot = SettingsSnapshot::default();
        snapshot.header = String::new();
        snapshot.margins = Margins::uniform(18.0);
        let json = snapshot.to_json_string().unwrap();
        let parsed = SettingsSnapshot::from_json_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
        assert!(!parsed.has_header());
        assert!(parsed.has_footer());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = SettingsSnapshot::from_json_str("{ wrap: ").unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }
}
