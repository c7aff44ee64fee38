use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use printflow_highlight::{Highlighter, StylePalette, StyledRun};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::display::DrawSurface;
use crate::document::Document;
use crate::engine::{ContentKind, ContentTypeEngine, PageIndex, RenderContext};
use crate::error::EngineError;
use crate::lines::{StyleSpan, TextLayout};

pub const DEFAULT_TOKENIZE_TIMEOUT: Duration = Duration::from_secs(15);

/// Source code painted with highlighter styles; paginated like plain text.
pub struct HighlightedCodeEngine {
    kind: ContentKind,
    language: String,
    highlighter: Arc<dyn Highlighter>,
    palette: StylePalette,
    timeout: Duration,
    document: Option<Document>,
    rendered: Option<RenderedCode>,
}

struct RenderedCode {
    layout: TextLayout,
    styles: Vec<StyleSpan>,
}

impl HighlightedCodeEngine {
    pub fn new(language: impl Into<String>, highlighter: Arc<dyn Highlighter>) -> Self {
        let language = language.into();
        Self {
            kind: ContentKind::HighlightedCode(language.clone()),
            language,
            highlighter,
            palette: StylePalette::default(),
            timeout: DEFAULT_TOKENIZE_TIMEOUT,
            document: None,
            rendered: None,
        }
    }

    pub fn with_palette(mut self, palette: StylePalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Tokenizes `text`; `None` means this pass paints without styles.
    async fn tokenize(&self, text: &str) -> Option<Vec<StyledRun>> {
        let name = self.highlighter.name();
        let result = timeout(self.timeout, self.highlighter.tokenize(text, &self.language)).await;
        match result {
            Ok(Ok(runs)) if reproduces(&runs, text) => Some(runs),
            Ok(Ok(_)) => {
                warn!(target: "engine", highlighter = name, language = %self.language, "token_stream_mismatch_falling_back");
                None
            }
            Ok(Err(err)) => {
                warn!(target: "engine", highlighter = name, language = %self.language, error = %err, "highlighter_failed_falling_back");
                None
            }
            Err(_) => {
                warn!(target: "engine", highlighter = name, language = %self.language, timeout = ?self.timeout, "highlighter_timed_out_falling_back");
                None
            }
        }
    }

    fn style_spans(&self, runs: &[StyledRun]) -> Vec<StyleSpan> {
        let mut spans = Vec::with_capacity(runs.len());
        let mut offset = 0;
        for run in runs {
            let end = offset + run.text.len();
            if end > offset {
                spans.push(StyleSpan {
                    range: offset..end,
                    style: self.palette.style_for(&run.style),
                });
            }
            offset = end;
        }
        spans
    }
}

/// The runs must concatenate back into exactly the document text.
fn reproduces(runs: &[StyledRun], text: &str) -> bool {
    let mut rest = text;
    for run in runs {
        match rest.strip_prefix(run.text.as_str()) {
            Some(tail) => rest = tail,
            None => return false,
        }
    }
    rest.is_empty()
}

#[async_trait]
impl ContentTypeEngine for HighlightedCodeEngine {
    fn kind(&self) -> &ContentKind {
        &self.kind
    }

    fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    fn set_document(&mut self, document: Document) -> bool {
        if document.is_empty() {
            return false;
        }
        self.rendered = None;
        self.document = Some(document);
        true
    }

    async fn render(&mut self, context: RenderContext<'_>) -> Result<u32, EngineError> {
        let text = self
            .document
            .as_ref()
            .ok_or(EngineError::NoDocument)?
            .shared_text();

        let runs = self.tokenize(&text).await;
        context.cancel.check()?;

        let styles = runs
            .as_deref()
            .map(|runs| self.style_spans(runs))
            .unwrap_or_default();
        let layout = TextLayout::build(&text, &context)?;
        let page_count = layout.page_count();
        debug!(
            target: "engine",
            kind = %self.kind,
            styled = !styles.is_empty(),
            page_count,
            "rendered"
        );
        self.rendered = Some(RenderedCode { layout, styles });
        Ok(page_count)
    }

    fn paint_page(&self, surface: &mut dyn DrawSurface, page: u32) -> Result<(), EngineError> {
        let document = self.document.as_ref().ok_or(EngineError::NoDocument)?;
        let rendered = self.rendered.as_ref().ok_or(EngineError::NotRendered)?;
        rendered
            .layout
            .paint(surface, page, document, &rendered.styles)
    }

    fn invalidate(&mut self) {
        self.rendered = None;
    }

    fn page_count(&self) -> Option<u32> {
        self.rendered
            .as_ref()
            .map(|rendered| rendered.layout.page_count())
    }

    fn page_index(&self) -> Option<Arc<PageIndex>> {
        self.rendered
            .as_ref()
            .map(|rendered| Arc::clone(rendered.layout.index()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Color, PrintDisplayList};
    use crate::geometry::{DeviceGeometry, Resolution};
    use printflow_highlight::{HighlightError, HighlightKind, RegistryHighlighter};
    use printflow_settings::{Margins, SettingsSnapshot};

    struct BrokenHighlighter;

    #[async_trait]
    impl Highlighter for BrokenHighlighter {
        fn name(&self) -> &str {
            "broken"
        }

        async fn is_installed(&self) -> bool {
            true
        }

        async fn tokenize(
            &self,
            _text: &str,
            _language: &str,
        ) -> Result<Vec<StyledRun>, HighlightError> {
            Ok(vec![StyledRun::new("not the document", HighlightKind::Keyword)])
        }
    }

    struct SlowHighlighter;

    #[async_trait]
    impl Highlighter for SlowHighlighter {
        fn name(&self) -> &str {
            "slow"
        }

        async fn is_installed(&self) -> bool {
            true
        }

        async fn tokenize(
            &self,
            text: &str,
            _language: &str,
        ) -> Result<Vec<StyledRun>, HighlightError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![StyledRun::new(text, HighlightKind::Plain)])
        }
    }

    fn context<'a>() -> RenderContext<'a> {
        let mut settings = SettingsSnapshot::default();
        settings.margins = Margins::zero();
        settings.header.clear();
        settings.footer.clear();
        let geometry = DeviceGeometry::new(480.0, 240.0, Resolution::uniform(72.0));
        RenderContext::new(geometry, Arc::new(settings))
    }

    fn document() -> Document {
        Document::new("main.rs", "fn main() {\n    // hi\n}\n")
    }

    #[test]
    fn reproduces_requires_exact_concatenation() {
        let runs = vec![
            StyledRun::new("fn", HighlightKind::Keyword),
            StyledRun::new(" x", HighlightKind::Plain),
        ];
        assert!(reproduces(&runs, "fn x"));
        assert!(!reproduces(&runs, "fn xy"));
        assert!(!reproduces(&runs, "fn"));
    }

    #[tokio::test]
    async fn paints_keyword_runs_with_palette_colors() {
        let highlighter: Arc<dyn Highlighter> = Arc::new(RegistryHighlighter::default());
        let mut engine = HighlightedCodeEngine::new("rust", highlighter);
        assert!(engine.set_document(document()));
        assert_eq!(engine.render(context()).await.unwrap(), 1);

        let mut page = PrintDisplayList::default();
        engine.paint_page(&mut page, 1).unwrap();
        let keyword = page.glyph_runs().find(|run| run.text == "fn").unwrap();
        let expected = StylePalette::default().style_for(&HighlightKind::Keyword);
        assert_eq!(keyword.color, Color::from_rgb8(expected.color));
        assert!(keyword.bold);

        let comment = page.glyph_runs().find(|run| run.text == "// hi").unwrap();
        assert!(comment.italic);
        assert_eq!(comment.position.x, 4.0 * 6.0);
    }

    #[tokio::test]
    async fn mismatched_tokens_fall_back_to_plain_styling() {
        let mut engine = HighlightedCodeEngine::new("rust", Arc::new(BrokenHighlighter));
        assert!(engine.set_document(document()));
        engine.render(context()).await.unwrap();

        let mut page = PrintDisplayList::default();
        engine.paint_page(&mut page, 1).unwrap();
        assert_eq!(page.texts(), vec!["fn main() {", "    // hi", "}"]);
        assert!(page.glyph_runs().all(|run| run.color == Color::BLACK));
        assert_eq!(engine.kind(), &ContentKind::HighlightedCode("rust".into()));
    }

    #[tokio::test]
    async fn slow_highlighter_times_out_to_plain_styling() {
        let mut engine = HighlightedCodeEngine::new("rust", Arc::new(SlowHighlighter))
            .with_timeout(Duration::from_millis(50));
        assert!(engine.set_document(document()));
        assert_eq!(engine.render(context()).await.unwrap(), 1);

        let mut page = PrintDisplayList::default();
        engine.paint_page(&mut page, 1).unwrap();
        assert_eq!(page.texts().len(), 3);
    }

    #[tokio::test]
    async fn unsupported_language_still_renders() {
        let highlighter: Arc<dyn Highlighter> = Arc::new(RegistryHighlighter::default());
        let mut engine = HighlightedCodeEngine::new("cobol", highlighter);
        assert!(engine.set_document(document()));
        assert_eq!(engine.render(context()).await.unwrap(), 1);
    }
}
