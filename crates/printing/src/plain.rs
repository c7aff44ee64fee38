use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::display::DrawSurface;
use crate::document::Document;
use crate::engine::{ContentKind, ContentTypeEngine, PageIndex, RenderContext};
use crate::error::EngineError;
use crate::lines::TextLayout;

/// Paginates plain text by logical line with optional word wrap.
#[derive(Debug)]
pub struct PlainTextEngine {
    kind: ContentKind,
    document: Option<Document>,
    layout: Option<TextLayout>,
}

impl PlainTextEngine {
    pub fn new() -> Self {
        Self {
            kind: ContentKind::PlainText,
            document: None,
            layout: None,
        }
    }
}

impl Default for PlainTextEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentTypeEngine for PlainTextEngine {
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
        self.layout = None;
        self.document = Some(document);
        true
    }

    async fn render(&mut self, context: RenderContext<'_>) -> Result<u32, EngineError> {
        let document = self.document.as_ref().ok_or(EngineError::NoDocument)?;
        let layout = TextLayout::build(document.text(), &context)?;
        let page_count = layout.page_count();
        debug!(target: "engine", kind = %self.kind, source = document.source(), page_count, "rendered");
        self.layout = Some(layout);
        Ok(page_count)
    }

    fn paint_page(&self, surface: &mut dyn DrawSurface, page: u32) -> Result<(), EngineError> {
        let document = self.document.as_ref().ok_or(EngineError::NoDocument)?;
        let layout = self.layout.as_ref().ok_or(EngineError::NotRendered)?;
        layout.paint(surface, page, document, &[])
    }

    fn invalidate(&mut self) {
        self.layout = None;
    }

    fn page_count(&self) -> Option<u32> {
        self.layout.as_ref().map(TextLayout::page_count)
    }

    fn page_index(&self) -> Option<Arc<PageIndex>> {
        self.layout.as_ref().map(|layout| Arc::clone(layout.index()))
    }
}
