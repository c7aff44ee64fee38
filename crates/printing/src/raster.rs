use image::{codecs::png::PngEncoder, ColorType, ImageBuffer, ImageEncoder, ImageResult, Rgba};

use crate::display::{Color, DisplayCommand, DrawSurface, GlyphRun, Rectangle, Stroke};
use crate::geometry::{DeviceGeometry, POINTS_PER_INCH};
use crate::lines::char_columns;

const MIN_DPI: f32 = 18.0;
const MAX_DPI: f32 = 1200.0;

type Canvas = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// 栅格预览表面 / Rasterizes display commands into an RGBA page image.
///
/// Text is greeked: every visible glyph becomes a filled cell sized from the
/// run's column advance, which is enough to judge layout in a preview.
pub struct RasterSurface {
    image: Canvas,
    scale: f32,
}

impl RasterSurface {
    /// Blank white page of `width_pt` x `height_pt` rendered at `dpi`.
    pub fn new(width_pt: f32, height_pt: f32, dpi: f32) -> Self {
        let dpi = if dpi.is_finite() {
            dpi.clamp(MIN_DPI, MAX_DPI)
        } else {
            POINTS_PER_INCH
        };
        let scale = dpi / POINTS_PER_INCH;
        let width_px = (width_pt * scale).ceil().max(1.0) as u32;
        let height_px = (height_pt * scale).ceil().max(1.0) as u32;
        Self {
            image: ImageBuffer::from_pixel(width_px, height_px, Rgba([255, 255, 255, 255])),
            scale,
        }
    }

    pub fn from_geometry(geometry: &DeviceGeometry, dpi: f32) -> Self {
        Self::new(geometry.page_width_pt, geometry.page_height_pt, dpi)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        (x < self.width() && y < self.height()).then(|| self.image.get_pixel(x, y).0)
    }

    pub fn image(&self) -> &Canvas {
        &self.image
    }

    /// Encodes the page as PNG.
    pub fn into_png(self) -> ImageResult<Vec<u8>> {
        let mut data = Vec::new();
        PngEncoder::new(&mut data).write_image(
            self.image.as_raw(),
            self.image.width(),
            self.image.height(),
            ColorType::Rgba8,
        )?;
        Ok(data)
    }

    fn px(&self, points: f32) -> i32 {
        (points * self.scale).round() as i32
    }

    fn extent(&self, points: f32) -> i32 {
        (points * self.scale).ceil() as i32
    }

    fn rectangle(&mut self, rect: &Rectangle) {
        let (x, y) = (self.px(rect.origin.x), self.px(rect.origin.y));
        let (w, h) = (self.extent(rect.size.width), self.extent(rect.size.height));
        fill_rect(&mut self.image, x, y, w, h, rect.color);
    }

    fn glyph_run(&mut self, run: &GlyphRun) {
        let size = run.font_size_pt.max(1.0);
        let cell_top = run.position.y + size * 0.25;
        let cell_height = if run.bold { size * 0.7 } else { size * 0.6 };
        let mut x = run.position.x;
        for ch in run.text.chars() {
            let width = char_columns(ch) as f32 * run.advance_pt;
            if !ch.is_whitespace() && width > 0.0 {
                let left = self.px(x + width * 0.1);
                let top = self.px(cell_top);
                let w = self.extent(width * 0.8).max(1);
                let h = self.extent(cell_height).max(1);
                fill_rect(&mut self.image, left, top, w, h, run.color);
            }
            x += width;
        }
    }

    fn rule(&mut self, x0: f32, x1: f32, y: f32, stroke: &Stroke) {
        let thickness = self.extent(stroke.width).max(1);
        let (x0, x1, y) = (self.px(x0), self.px(x1), self.px(y));
        for offset in 0..thickness {
            draw_horizontal_line(&mut self.image, x0, x1, y + offset, stroke.color);
        }
    }
}

impl DrawSurface for RasterSurface {
    fn draw(&mut self, command: DisplayCommand) {
        match command {
            DisplayCommand::BackgroundRect(rect) => self.rectangle(&rect),
            DisplayCommand::GlyphRun(run) => self.glyph_run(&run),
            DisplayCommand::HorizontalRule { start, end, stroke } => {
                self.rule(start.x, end.x, start.y, &stroke)
            }
        }
    }
}

fn fill_rect(buffer: &mut Canvas, x: i32, y: i32, width: i32, height: i32, color: Color) {
    if width <= 0 || height <= 0 {
        return;
    }
    let width_px = buffer.width() as i32;
    let height_px = buffer.height() as i32;
    let x0 = x.clamp(0, width_px);
    let y0 = y.clamp(0, height_px);
    let x1 = x.saturating_add(width).clamp(0, width_px);
    let y1 = y.saturating_add(height).clamp(0, height_px);
    if x0 >= x1 || y0 >= y1 {
        return;
    }
    let rgba = color_to_rgba(color);
    for yy in y0..y1 {
        for xx in x0..x1 {
            buffer.put_pixel(xx as u32, yy as u32, rgba);
        }
    }
}

fn draw_horizontal_line(buffer: &mut Canvas, x0: i32, x1: i32, y: i32, color: Color) {
    if y < 0 || y >= buffer.height() as i32 {
        return;
    }
    let start = x0.min(x1).max(0) as u32;
    let end = x0.max(x1).min(buffer.width() as i32).max(0) as u32;
    let rgba = color_to_rgba(color);
    for xx in start..end {
        buffer.put_pixel(xx, y as u32, rgba);
    }
}

fn color_to_rgba(color: Color) -> Rgba<u8> {
    Rgba([
        clamp_to_u8(color.r),
        clamp_to_u8(color.g),
        clamp_to_u8(color.b),
        clamp_to_u8(color.a),
    ])
}

fn clamp_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
