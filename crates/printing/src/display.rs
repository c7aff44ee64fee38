use std::fmt;

use printflow_highlight::Rgb;

#[cfg(test)]
use serde::Serialize;

/// Receives the drawing commands an engine emits for one page.
///
/// Coordinates are in points from the top-left corner of the page.
pub trait DrawSurface {
    fn draw(&mut self, command: DisplayCommand);
}

/// Records the drawing commands of a page so they can be replayed later.
#[cfg_attr(test, derive(Serialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrintDisplayList {
    pub commands: Vec<DisplayCommand>,
}

impl PrintDisplayList {
    /// Append a command to the display list.
    pub fn push(&mut self, command: DisplayCommand) {
        self.commands.push(command);
    }

    /// Returns true if the display list is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterates over the glyph runs only.
    pub fn glyph_runs(&self) -> impl Iterator<Item = &GlyphRun> {
        self.commands.iter().filter_map(|command| match command {
            DisplayCommand::GlyphRun(run) => Some(run),
            _ => None,
        })
    }

    /// Concatenated text of every glyph run, one entry per run.
    pub fn texts(&self) -> Vec<&str> {
        self.glyph_runs().map(|run| run.text.as_str()).collect()
    }

    pub fn replay(&self, surface: &mut dyn DrawSurface) {
        for command in &self.commands {
            surface.draw(command.clone());
        }
    }
}

impl DrawSurface for PrintDisplayList {
    fn draw(&mut self, command: DisplayCommand) {
        self.push(command);
    }
}

/// Low-level drawing commands emitted by the engines.
#[cfg_attr(test, derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCommand {
    GlyphRun(GlyphRun),
    BackgroundRect(Rectangle),
    HorizontalRule {
        start: Point,
        end: Point,
        stroke: Stroke,
    },
}

/// A run of text drawn with a single style.
///
/// `position` is the top-left corner of the line box; `advance_pt` is the
/// width of one display column.
#[cfg_attr(test, derive(Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRun {
    pub text: String,
    pub font_family: String,
    pub font_size_pt: f32,
    pub advance_pt: f32,
    pub position: Point,
    pub color: Color,
    pub bold: bool,
    pub italic: bool,
}

/// Represents a rectangular region (e.g. for line background).
#[cfg_attr(test, derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rectangle {
    pub origin: Point,
    pub size: Size,
    pub color: Color,
}

/// 2D size representation.
#[cfg_attr(test, derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// 2D coordinate.
#[cfg_attr(test, derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// RGBA color stored in normalized floating-point form.
#[cfg_attr(test, derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0, 1.0);
    pub const GRAY: Color = Color::new(0.5, 0.5, 0.5, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgb8(rgb: Rgb) -> Self {
        Self::new(
            f32::from(rgb.r) / 255.0,
            f32::from(rgb.g) / 255.0,
            f32::from(rgb.b) / 255.0,
            1.0,
        )
    }
}

/// Stroke descriptor for simple line drawing.
#[cfg_attr(test, derive(Serialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub color: Color,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rgba({:.3}, {:.3}, {:.3}, {:.3})",
            self.r, self.g, self.b, self.a
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_list_records_and_replays() {
        let mut list = PrintDisplayList::default();
        list.draw(DisplayCommand::HorizontalRule {
            start: Point::new(0.0, 10.0),
            end: Point::new(100.0, 10.0),
            stroke: Stroke {
                width: 0.5,
                color: Color::GRAY,
            },
        });
        list.draw(DisplayCommand::GlyphRun(GlyphRun {
            text: "hello".into(),
            font_family: "Mono".into(),
            font_size_pt: 10.0,
            advance_pt: 6.0,
            position: Point::new(0.0, 0.0),
            color: Color::from_rgb8(Rgb::new(255, 0, 0)),
            bold: false,
            italic: false,
        }));

        let mut copy = PrintDisplayList::default();
        list.replay(&mut copy);
        assert_eq!(copy, list);
        assert_eq!(copy.texts(), vec!["hello"]);
        assert_eq!(copy.glyph_runs().next().map(|run| run.color.r), Some(1.0));

        let snapshot = ron::ser::to_string(&copy).unwrap();
        assert!(snapshot.contains("HorizontalRule"));
    }
}
