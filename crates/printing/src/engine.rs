use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use printflow_highlight::Highlighter;
use printflow_settings::{SettingsProvider, SettingsSnapshot, HTML, PLAIN_TEXT};
use serde::Serialize;
use tracing::warn;

use crate::code::HighlightedCodeEngine;
use crate::display::DrawSurface;
use crate::document::Document;
use crate::error::EngineError;
use crate::geometry::DeviceGeometry;
use crate::markup::MarkupEngine;
use crate::plain::PlainTextEngine;

/// Closed set of document kinds an engine can paginate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContentKind {
    PlainText,
    Markup,
    HighlightedCode(String),
}

impl ContentKind {
    /// Content-type string this kind is dispatched from.
    pub fn content_type(&self) -> &str {
        match self {
            ContentKind::PlainText => PLAIN_TEXT,
            ContentKind::Markup => HTML,
            ContentKind::HighlightedCode(language) => language,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::PlainText => f.write_str("plain text"),
            ContentKind::Markup => f.write_str("markup"),
            ContentKind::HighlightedCode(language) => write!(f, "highlighted code ({language})"),
        }
    }
}

/// Coarse, advisory render progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderProgress {
    pub percent: u8,
}

pub type ProgressFn<'a> = dyn Fn(RenderProgress) + Send + Sync + 'a;

/// Cooperative cancellation for a render in flight.
///
/// A token bound to a settings generation reports cancellation as soon as
/// the provider publishes a newer snapshot.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    generation: Option<(SettingsProvider, u64)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_generation(provider: &SettingsProvider, generation: u64) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            generation: Some((provider.clone(), generation)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Acquire) {
            return true;
        }
        match &self.generation {
            Some((provider, generation)) => provider.generation() != *generation,
            None => false,
        }
    }

    pub fn check(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            Err(EngineError::Superseded)
        } else {
            Ok(())
        }
    }
}

/// Inputs of a single render pass.
pub struct RenderContext<'a> {
    pub geometry: DeviceGeometry,
    pub settings: Arc<SettingsSnapshot>,
    pub progress: Option<&'a ProgressFn<'a>>,
    pub cancel: CancelToken,
}

impl<'a> RenderContext<'a> {
    pub fn new(geometry: DeviceGeometry, settings: Arc<SettingsSnapshot>) -> Self {
        Self {
            geometry,
            settings,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_progress(mut self, progress: &'a ProgressFn<'a>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn report(&self, done: usize, total: usize) {
        if let Some(progress) = self.progress {
            let percent = if total == 0 {
                100
            } else {
                (done.min(total) * 100 / total) as u8
            };
            progress(RenderProgress { percent });
        }
    }
}

/// Half-open range of visual lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Creates a new range with inclusive `start` and exclusive `end`.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A line within a laid-out markup block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BlockPosition {
    pub block: usize,
    pub line: usize,
}

impl BlockPosition {
    pub const fn new(block: usize, line: usize) -> Self {
        Self { block, line }
    }
}

/// Portion of the document drawn on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageSpan {
    Lines(LineRange),
    Blocks {
        start: BlockPosition,
        end: BlockPosition,
    },
}

/// 页码到文档范围的映射 / Page number to document range mapping.
///
/// Rebuilt in full on every render and shared read-only afterwards.
/// Page totals beyond `u32::MAX` pin to the maximum.
fn saturating_page_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageIndex {
    pages: Vec<PageSpan>,
}

impl PageIndex {
    pub(crate) fn new(pages: Vec<PageSpan>) -> Self {
        Self { pages }
    }

    pub fn page_count(&self) -> u32 {
        saturating_page_count(self.pages.len())
    }

    /// Span of the 1-based `page`.
    pub fn span(&self, page: u32) -> Option<&PageSpan> {
        let slot = page.checked_sub(1)? as usize;
        self.pages.get(slot)
    }

    pub fn spans(&self) -> &[PageSpan] {
        &self.pages
    }
}

/// Polymorphic pagination pipeline, one implementation per [`ContentKind`].
#[async_trait]
pub trait ContentTypeEngine: Send + Sync {
    fn kind(&self) -> &ContentKind;

    fn document(&self) -> Option<&Document>;

    /// Loads or replaces the document. Returns `false` for empty text.
    fn set_document(&mut self, document: Document) -> bool;

    /// Decodes `bytes` and loads the result. Returns `false` when the bytes
    /// are not text or decode to nothing.
    fn set_document_bytes(&mut self, source: &str, bytes: &[u8]) -> bool {
        match Document::decode(source, bytes) {
            Ok(document) => self.set_document(document),
            Err(err) => {
                warn!(target: "engine", source, error = %err, "document_rejected");
                false
            }
        }
    }

    /// Reflows the document and returns the page count.
    async fn render(&mut self, context: RenderContext<'_>) -> Result<u32, EngineError>;

    /// Draws the 1-based `page` from the current page index.
    fn paint_page(&self, surface: &mut dyn DrawSurface, page: u32) -> Result<(), EngineError>;

    /// Drops the page index after settings or geometry changed.
    fn invalidate(&mut self);

    fn page_count(&self) -> Option<u32>;

    fn page_index(&self) -> Option<Arc<PageIndex>>;
}

/// Instantiates the engine for `kind`.
pub fn create_engine(
    kind: ContentKind,
    highlighter: Arc<dyn Highlighter>,
) -> Box<dyn ContentTypeEngine> {
    match kind {
        ContentKind::PlainText => Box::new(PlainTextEngine::new()),
        ContentKind::Markup => Box::new(MarkupEngine::new()),
        ContentKind::HighlightedCode(language) => {
            Box::new(HighlightedCodeEngine::new(language, highlighter))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use printflow_highlight::RegistryHighlighter;

    #[test]
    fn factory_dispatches_on_kind() {
        let highlighter: Arc<dyn Highlighter> = Arc::new(RegistryHighlighter::default());
        for kind in [
            ContentKind::PlainText,
            ContentKind::Markup,
            ContentKind::HighlightedCode("rust".into()),
        ] {
            let engine = create_engine(kind.clone(), Arc::clone(&highlighter));
            assert_eq!(engine.kind(), &kind);
            assert!(engine.page_count().is_none());
            assert!(engine.document().is_none());
        }
        assert_eq!(ContentKind::Markup.content_type(), "text/html");
        assert_eq!(
            ContentKind::HighlightedCode("rust".into()).content_type(),
            "rust"
        );
    }

    #[test]
    fn cancel_token_follows_settings_generation() {
        let provider = SettingsProvider::default();
        let token = CancelToken::for_generation(&provider, provider.generation());
        assert!(token.check().is_ok());

        provider.update(|settings| settings.wrap = false);
        assert_eq!(token.check(), Err(EngineError::Superseded));

        let manual = CancelToken::new();
        let shared = manual.clone();
        shared.cancel();
        assert!(manual.is_cancelled());
    }

    #[test]
    fn page_index_lookup_is_one_based() {
        let index = PageIndex::new(vec![
            PageSpan::Lines(LineRange::new(0, 2)),
            PageSpan::Lines(LineRange::new(2, 3)),
        ]);
        assert_eq!(index.page_count(), 2);
        assert!(index.span(0).is_none());
        assert_eq!(index.span(2), Some(&PageSpan::Lines(LineRange::new(2, 3))));
        assert!(index.span(3).is_none());
    }

    #[test]
    fn oversized_page_totals_saturate() {
        assert_eq!(saturating_page_count(0), 0);
        assert_eq!(saturating_page_count(7), 7);
        assert_eq!(saturating_page_count(usize::MAX), u32::MAX);
    }

    #[test]
    fn set_document_bytes_rejects_binary() {
        let mut engine = PlainTextEngine::new();
        assert!(!engine.set_document_bytes("blob.bin", b"\x00\x01"));
        assert!(engine.set_document_bytes("ok.txt", b"hello"));
        assert_eq!(engine.document().map(Document::text), Some("hello"));
    }
}
