//! Content-type engines that paginate documents for printing.
//!
//! A [`ContentTypeResolver`] picks a [`ContentKind`] for a path, the
//! [`create_engine`] factory builds the matching engine, and a
//! [`PaginationController`] keeps its page index in step with settings and
//! page geometry.

pub mod code;
pub mod controller;
pub mod display;
pub mod document;
pub mod engine;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod lines;
pub mod markup;
pub mod plain;
pub mod raster;
pub mod resolver;
pub mod template;

pub use code::HighlightedCodeEngine;
pub use controller::{OpenError, PaginationController, RenderOutcome, RenderState};
pub use display::{
    Color, DisplayCommand, DrawSurface, GlyphRun, Point, PrintDisplayList, Rectangle, Size,
    Stroke,
};
pub use document::{Document, DocumentError};
pub use engine::{
    create_engine, BlockPosition, CancelToken, ContentKind, ContentTypeEngine, LineRange,
    PageIndex, PageSpan, ProgressFn, RenderContext, RenderProgress,
};
pub use error::EngineError;
pub use geometry::{DeviceGeometry, Orientation, PaperId, PaperSize, Resolution};
pub use markup::MarkupEngine;
pub use plain::PlainTextEngine;
pub use raster::RasterSurface;
pub use resolver::{ContentTypeResolver, Resolution as ContentResolution};
pub use template::{
    Alignment, HeaderFooterContext, HeaderFooterTemplate, RenderedHeaderFooter, TemplateError,
    TemplateSegment, TemplateToken,
};
