use std::path::Path;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use printflow_highlight::Highlighter;
use printflow_settings::{FileAssociations, SettingsChanged, SettingsProvider};
use thiserror::Error;
use tracing::debug;

use crate::display::DrawSurface;
use crate::document::{Document, DocumentError};
use crate::engine::{
    create_engine, CancelToken, ContentKind, ContentTypeEngine, PageIndex, ProgressFn,
    RenderContext,
};
use crate::error::EngineError;
use crate::geometry::DeviceGeometry;
use crate::resolver::{ContentTypeResolver, Resolution};

/// Lifecycle of the page index owned by a [`PaginationController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Unrendered,
    Rendered,
    Stale,
}

/// Result of a controller render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered { page_count: u32 },
    /// Settings changed while rendering; the result was discarded.
    Superseded,
}

/// Errors raised while opening a document for printing.
/// 開啟待列印文件時可能發生的錯誤。
#[derive(Debug, Error)]
pub enum OpenError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// 分頁控制器 / Owns one engine and tracks whether its pages are current.
///
/// The controller never re-renders on its own: settings notifications and
/// geometry changes only mark it stale, and the owner decides when to call
/// [`PaginationController::render`] again.
pub struct PaginationController {
    engine: Box<dyn ContentTypeEngine>,
    provider: SettingsProvider,
    changes: Receiver<SettingsChanged>,
    geometry: DeviceGeometry,
    state: RenderState,
    /// Settings generation the current pages were built from.
    rendered_generation: Option<u64>,
}

impl PaginationController {
    pub fn new(
        engine: Box<dyn ContentTypeEngine>,
        provider: SettingsProvider,
        geometry: DeviceGeometry,
    ) -> Self {
        let changes = provider.subscribe();
        Self {
            engine,
            provider,
            changes,
            geometry,
            state: RenderState::Unrendered,
            rendered_generation: None,
        }
    }

    /// Creates the engine for `kind` and hands it `document`.
    pub fn with_document(
        kind: ContentKind,
        highlighter: Arc<dyn Highlighter>,
        document: Document,
        provider: SettingsProvider,
        geometry: DeviceGeometry,
    ) -> Result<Self, EngineError> {
        let source = document.source().to_string();
        let mut engine = create_engine(kind, highlighter);
        if !engine.set_document(document) {
            return Err(EngineError::DocumentRejected(source));
        }
        Ok(Self::new(engine, provider, geometry))
    }

    /// Resolves, loads and attaches the file at `path`.
    pub async fn open(
        path: impl AsRef<Path>,
        associations: &FileAssociations,
        highlighter: Arc<dyn Highlighter>,
        provider: SettingsProvider,
        geometry: DeviceGeometry,
    ) -> Result<(Self, Resolution), OpenError> {
        let path = path.as_ref();
        let resolution = ContentTypeResolver::new(associations, highlighter.as_ref())
            .resolve_path(path)
            .await;
        let document = Document::load(path)?;
        let controller = Self::with_document(
            resolution.kind.clone(),
            highlighter,
            document,
            provider,
            geometry,
        )?;
        debug!(target: "controller", path = %path.display(), kind = %resolution.kind, "opened");
        Ok((controller, resolution))
    }

    pub fn kind(&self) -> &ContentKind {
        self.engine.kind()
    }

    pub fn document(&self) -> Option<&Document> {
        self.engine.document()
    }

    pub fn geometry(&self) -> DeviceGeometry {
        self.geometry
    }

    pub fn provider(&self) -> &SettingsProvider {
        &self.provider
    }

    /// Current state, after applying any pending settings notifications.
    pub fn state(&mut self) -> RenderState {
        let notified = self.drain_changes().is_some();
        if notified || self.generation_moved() {
            self.mark_stale();
        }
        self.state
    }

    /// Replaces the document. Returns `false` when the engine rejects it.
    pub fn set_document(&mut self, document: Document) -> bool {
        if !self.engine.set_document(document) {
            return false;
        }
        self.mark_stale();
        true
    }

    /// Updates the page geometry; only an actual change marks the pages stale.
    pub fn set_geometry(&mut self, geometry: DeviceGeometry) {
        if geometry != self.geometry {
            self.geometry = geometry;
            self.mark_stale();
        }
    }

    /// Re-paginates against the current settings snapshot and geometry.
    pub async fn render(
        &mut self,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<RenderOutcome, EngineError> {
        self.drain_changes();
        // Generation before snapshot, so a replacement in between is detected.
        let generation = self.provider.generation();
        let settings = self.provider.snapshot();

        let mut context = RenderContext::new(self.geometry, settings)
            .with_cancel(CancelToken::for_generation(&self.provider, generation));
        if let Some(progress) = progress {
            context = context.with_progress(progress);
        }

        let result = self.engine.render(context).await;
        self.finish_render(generation, result)
    }

    /// Publishes a finished render unless settings moved past `generation`.
    fn finish_render(
        &mut self,
        generation: u64,
        result: Result<u32, EngineError>,
    ) -> Result<RenderOutcome, EngineError> {
        // Drain first, then compare: a change published after the drain
        // stays queued or has already bumped the generation.
        let newer_seen = self
            .drain_changes()
            .is_some_and(|newest| newest > generation);
        let superseded = newer_seen || self.provider.generation() != generation;

        match result {
            Ok(page_count) if !superseded => {
                self.state = RenderState::Rendered;
                self.rendered_generation = Some(generation);
                debug!(target: "controller", kind = %self.engine.kind(), generation, page_count, "render_complete");
                Ok(RenderOutcome::Rendered { page_count })
            }
            Ok(_) | Err(EngineError::Superseded) => {
                debug!(target: "controller", kind = %self.engine.kind(), generation, "render_superseded");
                self.mark_stale();
                Ok(RenderOutcome::Superseded)
            }
            Err(err) => {
                if superseded {
                    self.mark_stale();
                }
                Err(err)
            }
        }
    }

    /// Paints `page` (1-based); requires a current render.
    pub fn paint_page(&self, surface: &mut dyn DrawSurface, page: u32) -> Result<(), EngineError> {
        if !self.is_current() {
            return Err(EngineError::NotRendered);
        }
        self.engine.paint_page(surface, page)
    }

    pub fn page_count(&self) -> Option<u32> {
        self.is_current()
            .then(|| self.engine.page_count())
            .flatten()
    }

    pub fn page_index(&self) -> Option<Arc<PageIndex>> {
        self.is_current()
            .then(|| self.engine.page_index())
            .flatten()
    }

    /// Releases the engine and its document.
    pub fn close(self) {
        debug!(target: "controller", kind = %self.engine.kind(), "closed");
    }

    fn is_current(&self) -> bool {
        self.state == RenderState::Rendered
            && self.changes.is_empty()
            && self.rendered_generation == Some(self.provider.generation())
    }

    fn generation_moved(&self) -> bool {
        self.rendered_generation
            .is_some_and(|rendered| rendered != self.provider.generation())
    }

    /// Empties the notification queue, returning the newest generation seen.
    fn drain_changes(&self) -> Option<u64> {
        let mut newest = None;
        while let Ok(change) = self.changes.try_recv() {
            debug!(target: "controller", generation = change.generation, "settings_changed");
            newest = newest.max(Some(change.generation));
        }
        newest
    }

    fn mark_stale(&mut self) {
        if self.state == RenderState::Rendered {
            self.state = RenderState::Stale;
        }
        self.rendered_generation = None;
        self.engine.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::PrintDisplayList;
    use crate::geometry::{Orientation, PaperSize, Resolution};
    use async_trait::async_trait;
    use printflow_highlight::{HighlightError, HighlightKind, RegistryHighlighter, StyledRun};
    use printflow_settings::SettingsSnapshot;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn controller(text: &str) -> PaginationController {
        PaginationController::with_document(
            ContentKind::PlainText,
            Arc::new(RegistryHighlighter::default()),
            Document::new("notes.txt", text),
            SettingsProvider::default(),
            DeviceGeometry::default(),
        )
        .unwrap()
    }

    /// Publishes a settings change from inside the first tokenize call.
    struct MeddlingHighlighter {
        provider: SettingsProvider,
        fired: AtomicBool,
    }

    #[async_trait]
    impl Highlighter for MeddlingHighlighter {
        fn name(&self) -> &str {
            "meddling"
        }

        async fn is_installed(&self) -> bool {
            true
        }

        async fn tokenize(
            &self,
            text: &str,
            _language: &str,
        ) -> Result<Vec<StyledRun>, HighlightError> {
            if !self.fired.swap(true, Ordering::SeqCst) {
                self.provider
                    .update(|settings| settings.line_numbers = !settings.line_numbers);
            }
            Ok(vec![StyledRun::new(text, HighlightKind::Plain)])
        }
    }

    #[tokio::test]
    async fn paint_requires_a_render() {
        let mut controller = controller("hello\nworld");
        assert_eq!(controller.state(), RenderState::Unrendered);
        let mut page = PrintDisplayList::default();
        assert_eq!(
            controller.paint_page(&mut page, 1),
            Err(EngineError::NotRendered)
        );

        let outcome = controller.render(None).await.unwrap();
        assert_eq!(outcome, RenderOutcome::Rendered { page_count: 1 });
        assert_eq!(controller.state(), RenderState::Rendered);
        controller.paint_page(&mut page, 1).unwrap();
        assert!(controller.paint_page(&mut page, 0).unwrap_err().is_illegal_argument());
        assert!(controller.paint_page(&mut page, 2).unwrap_err().is_illegal_argument());
    }

    #[tokio::test]
    async fn settings_change_marks_stale_until_rerender() {
        let mut controller = controller("hello");
        controller.render(None).await.unwrap();

        assert!(controller.provider().update(|settings| settings.wrap = !settings.wrap));
        let mut page = PrintDisplayList::default();
        assert_eq!(
            controller.paint_page(&mut page, 1),
            Err(EngineError::NotRendered)
        );
        assert_eq!(controller.state(), RenderState::Stale);
        assert!(controller.page_count().is_none());

        controller.render(None).await.unwrap();
        assert_eq!(controller.state(), RenderState::Rendered);
        controller.paint_page(&mut page, 1).unwrap();
    }

    #[tokio::test]
    async fn identical_settings_keep_pages_current() {
        let mut controller = controller("hello");
        controller.render(None).await.unwrap();
        let before = controller.page_index().unwrap();

        let same = SettingsSnapshot::clone(&controller.provider().snapshot());
        assert!(!controller.provider().replace(same));
        assert_eq!(controller.state(), RenderState::Rendered);

        controller.render(None).await.unwrap();
        assert_eq!(controller.page_index().unwrap(), before);
    }

    #[tokio::test]
    async fn geometry_changes_only_when_different() {
        let mut controller = controller("hello");
        controller.render(None).await.unwrap();

        controller.set_geometry(DeviceGeometry::default());
        assert_eq!(controller.state(), RenderState::Rendered);

        controller.set_geometry(DeviceGeometry::from_paper(
            PaperSize::A4,
            Orientation::Landscape,
            Resolution::default(),
        ));
        assert_eq!(controller.state(), RenderState::Stale);
    }

    #[tokio::test]
    async fn new_document_marks_stale() {
        let mut controller = controller("hello");
        controller.render(None).await.unwrap();

        assert!(!controller.set_document(Document::new("empty.txt", "")));
        assert_eq!(controller.state(), RenderState::Rendered);

        assert!(controller.set_document(Document::new("other.txt", "other")));
        assert_eq!(controller.state(), RenderState::Stale);
    }

    #[tokio::test]
    async fn superseded_render_is_discarded() {
        let provider = SettingsProvider::default();
        let highlighter = Arc::new(MeddlingHighlighter {
            provider: provider.clone(),
            fired: AtomicBool::new(false),
        });
        let mut controller = PaginationController::with_document(
            ContentKind::HighlightedCode("rust".into()),
            highlighter,
            Document::new("main.rs", "fn main() {}\n"),
            provider,
            DeviceGeometry::default(),
        )
        .unwrap();

        assert_eq!(controller.render(None).await.unwrap(), RenderOutcome::Superseded);
        assert_eq!(controller.state(), RenderState::Unrendered);
        assert!(controller.page_index().is_none());

        let outcome = controller.render(None).await.unwrap();
        assert_eq!(outcome, RenderOutcome::Rendered { page_count: 1 });
    }

    #[tokio::test]
    async fn update_landing_as_render_finishes_is_not_lost() {
        let mut controller = controller("hello");
        let generation = controller.provider().generation();
        let background = controller.provider().clone();
        std::thread::spawn(move || background.update(|settings| settings.wrap = !settings.wrap))
            .join()
            .unwrap();

        let outcome = controller.finish_render(generation, Ok(1)).unwrap();
        assert_eq!(outcome, RenderOutcome::Superseded);
        assert!(controller.page_index().is_none());
        assert_ne!(controller.state(), RenderState::Rendered);

        let outcome = controller.render(None).await.unwrap();
        assert_eq!(outcome, RenderOutcome::Rendered { page_count: 1 });
    }

    #[tokio::test]
    async fn pages_go_stale_even_if_the_notification_is_consumed() {
        let mut controller = controller("hello");
        controller.render(None).await.unwrap();

        let background = controller.provider().clone();
        std::thread::spawn(move || background.update(|settings| settings.line_numbers = true))
            .join()
            .unwrap();
        while controller.changes.try_recv().is_ok() {}

        let mut page = PrintDisplayList::default();
        assert_eq!(
            controller.paint_page(&mut page, 1),
            Err(EngineError::NotRendered)
        );
        assert!(controller.page_count().is_none());
        assert_eq!(controller.state(), RenderState::Stale);
    }

    #[tokio::test]
    async fn empty_documents_are_rejected() {
        let result = PaginationController::with_document(
            ContentKind::Markup,
            Arc::new(RegistryHighlighter::default()),
            Document::new("blank.html", ""),
            SettingsProvider::default(),
            DeviceGeometry::default(),
        );
        assert!(matches!(result, Err(EngineError::DocumentRejected(source)) if source == "blank.html"));
    }

    #[tokio::test]
    async fn open_resolves_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.rs");
        std::fs::write(&path, "fn main() {}\n").unwrap();

        let (mut controller, resolution) = PaginationController::open(
            &path,
            &FileAssociations::with_defaults(),
            Arc::new(RegistryHighlighter::default()),
            SettingsProvider::default(),
            DeviceGeometry::default(),
        )
        .await
        .unwrap();
        assert_eq!(resolution.kind, ContentKind::HighlightedCode("rust".into()));
        assert_eq!(controller.kind(), &resolution.kind);
        assert_eq!(
            controller.render(None).await.unwrap(),
            RenderOutcome::Rendered { page_count: 1 }
        );
        controller.close();

        let missing = PaginationController::open(
            dir.path().join("missing.txt"),
            &FileAssociations::with_defaults(),
            Arc::new(RegistryHighlighter::default()),
            SettingsProvider::default(),
            DeviceGeometry::default(),
        )
        .await;
        assert!(matches!(missing, Err(OpenError::Document(DocumentError::Io { .. }))));
    }
}
