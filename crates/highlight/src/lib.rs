//! Syntax highlighting collaborators consumed by the code engine.
//!
//! The engine only sees the [`Highlighter`] contract: a capability probe and
//! a tokenizer returning styled runs. [`ProcessHighlighter`] talks to an
//! external tokenizer process; [`RegistryHighlighter`] tokenizes in-process
//! with regex-based language definitions.

mod client;
mod language;
mod process;
mod theme;

pub use client::{HighlightError, HighlightKind, Highlighter, StyledRun};
pub use language::{
    builtin, LanguageDefinition, LanguageId, LanguageRegistry, LanguageSpec, RegistryHighlighter,
};
pub use process::ProcessHighlighter;
pub use theme::{parse_style_palette, Rgb, RunStyle, StylePalette, ThemeParseError};
