use serde::Serialize;

const MM_PER_INCH: f32 = 25.4;
pub(crate) const POINTS_PER_INCH: f32 = 72.0;

/// Orientation of a print page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Supported paper identifiers for quick selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperId {
    A4,
    Letter,
    Legal,
    A3,
    Custom,
}

/// Represents a paper size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub id: PaperId,
    pub width_mm: f32,
    pub height_mm: f32,
}

impl PaperSize {
    pub const A4: PaperSize = PaperSize::new(PaperId::A4, 210.0, 297.0);
    pub const LETTER: PaperSize = PaperSize::new(PaperId::Letter, 215.9, 279.4);
    pub const LEGAL: PaperSize = PaperSize::new(PaperId::Legal, 215.9, 355.6);
    pub const A3: PaperSize = PaperSize::new(PaperId::A3, 297.0, 420.0);

    pub const fn new(id: PaperId, width_mm: f32, height_mm: f32) -> Self {
        Self {
            id,
            width_mm,
            height_mm,
        }
    }

    /// Looks up a named paper size (`a4`, `letter`, `legal`, `a3`).
    pub fn named(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a4" => Some(Self::A4),
            "letter" => Some(Self::LETTER),
            "legal" => Some(Self::LEGAL),
            "a3" => Some(Self::A3),
            _ => None,
        }
    }

    pub fn to_points(&self, orientation: Orientation) -> (f32, f32) {
        let width_pt = self.width_mm / MM_PER_INCH * POINTS_PER_INCH;
        let height_pt = self.height_mm / MM_PER_INCH * POINTS_PER_INCH;
        match orientation {
            Orientation::Portrait => (width_pt, height_pt),
            Orientation::Landscape => (height_pt, width_pt),
        }
    }
}

/// Device resolution in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Resolution {
    pub x_dpi: f32,
    pub y_dpi: f32,
}

impl Resolution {
    pub const fn uniform(dpi: f32) -> Self {
        Self {
            x_dpi: dpi,
            y_dpi: dpi,
        }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::uniform(300.0)
    }
}

/// 输出设备的页面几何信息 / Page size in points plus device resolution.
///
/// Supplied by the caller on every render; engines never cache it beyond
/// the page index they derive from it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceGeometry {
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub resolution: Resolution,
}

impl DeviceGeometry {
    pub fn new(page_width_pt: f32, page_height_pt: f32, resolution: Resolution) -> Self {
        Self {
            page_width_pt: sanitize_extent(page_width_pt),
            page_height_pt: sanitize_extent(page_height_pt),
            resolution: Resolution {
                x_dpi: sanitize_dpi(resolution.x_dpi),
                y_dpi: sanitize_dpi(resolution.y_dpi),
            },
        }
    }

    pub fn from_paper(paper: PaperSize, orientation: Orientation, resolution: Resolution) -> Self {
        let (width, height) = paper.to_points(orientation);
        Self::new(width, height, resolution)
    }

    /// Converts a vertical distance in points to whole device pixels.
    pub fn points_to_device_y(&self, points: f32) -> f32 {
        points * self.resolution.y_dpi / POINTS_PER_INCH
    }

    pub fn device_to_points_y(&self, pixels: f32) -> f32 {
        pixels * POINTS_PER_INCH / self.resolution.y_dpi
    }
}

impl Default for DeviceGeometry {
    fn default() -> Self {
        Self::from_paper(PaperSize::A4, Orientation::Portrait, Resolution::default())
    }
}

fn sanitize_extent(value: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn sanitize_dpi(value: f32) -> f32 {
    if value.is_finite() && value >= 1.0 {
        value
    } else {
        POINTS_PER_INCH
    }
}
