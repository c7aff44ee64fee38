use chrono::{DateTime, Local};
use printflow_highlight::RunStyle;
use printflow_settings::SettingsSnapshot;

use crate::display::{Color, DisplayCommand, DrawSurface, GlyphRun, Point};
use crate::document::Document;
use crate::geometry::DeviceGeometry;
use crate::lines::display_width;
use crate::template::{Alignment, HeaderFooterContext, HeaderFooterTemplate};

/// Absorbs float noise so that e.g. `24.0 / 12.0` never floors to 1.
pub(crate) const FIT_EPSILON: f32 = 1e-3;

/// How many whole `unit`s fit into `extent`, never less than one.
pub(crate) fn fit(extent: f32, unit: f32) -> usize {
    if unit <= 0.0 {
        return 1;
    }
    ((extent / unit) + FIT_EPSILON).floor().max(1.0) as usize
}

/// Printable regions of a page derived from geometry and settings.
///
/// The header and footer each take one line when their template is not
/// blank; the body gets whatever remains inside the margins.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFrame {
    pub page_width: f32,
    pub page_height: f32,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub header_top: Option<f32>,
    pub footer_top: Option<f32>,
    pub line_height: f32,
    pub char_width: f32,
    pub font_size: f32,
    pub font_family: String,
}

impl PageFrame {
    pub fn new(geometry: &DeviceGeometry, settings: &SettingsSnapshot) -> Self {
        let line_height = snap_to_device(settings.font.line_height(), geometry);
        let margins = settings.margins;

        let header_height = if settings.has_header() { line_height } else { 0.0 };
        let footer_height = if settings.has_footer() { line_height } else { 0.0 };

        let inner_height = (geometry.page_height_pt - margins.top - margins.bottom).max(0.0);
        let height = (inner_height - header_height - footer_height).max(0.0);
        let width = (geometry.page_width_pt - margins.left - margins.right).max(0.0);

        Self {
            page_width: geometry.page_width_pt,
            page_height: geometry.page_height_pt,
            left: margins.left,
            top: margins.top + header_height,
            width,
            height,
            header_top: settings.has_header().then_some(margins.top),
            footer_top: settings
                .has_footer()
                .then(|| geometry.page_height_pt - margins.bottom - line_height),
            line_height,
            char_width: settings.font.char_width(),
            font_size: settings.font.size_pt,
            font_family: settings.font.family.clone(),
        }
    }

    /// Body lines per page, at least one.
    pub fn lines_per_page(&self) -> usize {
        fit(self.height, self.line_height)
    }

    /// Body columns per line, at least one.
    pub fn columns(&self) -> usize {
        fit(self.width, self.char_width)
    }

    pub(crate) fn glyph(&self, text: &str, x: f32, y: f32, style: RunStyle) -> DisplayCommand {
        glyph_run(
            text,
            &self.font_family,
            self.font_size,
            self.char_width,
            Point::new(x, y),
            style,
        )
    }

    /// Paints the header and footer for `page`.
    pub(crate) fn paint_decorations(
        &self,
        surface: &mut dyn DrawSurface,
        settings: &SettingsSnapshot,
        document: &Document,
        page: u32,
        page_count: u32,
    ) {
        let stamp = document.modified().map(DateTime::<Local>::from);
        let date = stamp.map(|stamp| stamp.format("%Y-%m-%d").to_string());
        let time = stamp.map(|stamp| stamp.format("%H:%M").to_string());
        let context = HeaderFooterContext {
            file_name: Some(document.file_name()),
            file_path: Some(document.source()),
            page_number: page,
            page_count: Some(page_count),
            date: date.as_deref(),
            time: time.as_deref(),
        };

        let bands = [
            (self.header_top, settings.header.as_str()),
            (self.footer_top, settings.footer.as_str()),
        ];
        for (top, template) in bands {
            let Some(y) = top else {
                continue;
            };
            let rendered = HeaderFooterTemplate::render_or_literal(template, &context);
            for (alignment, text) in rendered.slots() {
                if text.is_empty() {
                    continue;
                }
                let text_width = display_width(text) as f32 * self.char_width;
                let x = match alignment {
                    Alignment::Left => self.left,
                    Alignment::Center => self.left + (self.width - text_width) / 2.0,
                    Alignment::Right => self.left + self.width - text_width,
                };
                surface.draw(self.glyph(text, x.max(0.0), y, RunStyle::default()));
            }
        }
    }

    /// Right-aligned line number inside a gutter of `gutter` columns.
    pub(crate) fn paint_line_number(
        &self,
        surface: &mut dyn DrawSurface,
        number: usize,
        gutter: usize,
        y: f32,
    ) {
        let label = number.to_string();
        let pad = gutter.saturating_sub(label.len() + 1);
        let x = self.left + pad as f32 * self.char_width;
        let style = RunStyle {
            color: printflow_highlight::Rgb::new(0x80, 0x80, 0x80),
            bold: false,
            italic: false,
        };
        surface.draw(self.glyph(&label, x, y, style));
    }
}

pub(crate) fn glyph_run(
    text: &str,
    font_family: &str,
    font_size: f32,
    advance: f32,
    position: Point,
    style: RunStyle,
) -> DisplayCommand {
    DisplayCommand::GlyphRun(GlyphRun {
        text: text.to_string(),
        font_family: font_family.to_string(),
        font_size_pt: font_size,
        advance_pt: advance,
        position,
        color: Color::from_rgb8(style.color),
        bold: style.bold,
        italic: style.italic,
    })
}

/// Rounds a vertical distance to whole device pixels so every line lands on
/// the same pixel grid.
fn snap_to_device(points: f32, geometry: &DeviceGeometry) -> f32 {
    let pixels = geometry.points_to_device_y(points).round();
    if pixels >= 1.0 {
        geometry.device_to_points_y(pixels)
    } else {
        points
    }
}
