use std::path::Path;
use std::time::Duration;

use printflow_highlight::Highlighter;
use printflow_settings::{associations::path_key, FileAssociations, HTML, PLAIN_TEXT};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::engine::ContentKind;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Outcome of resolving a path or content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub content_type: String,
    pub kind: ContentKind,
    /// Set when the resolved language had to fall back to plain text.
    pub warning: Option<String>,
}

/// 内容类型解析器 / Maps paths and content types to a [`ContentKind`].
///
/// Holds nothing but borrowed collaborators, so it is cheap to create per
/// call site.
pub struct ContentTypeResolver<'a> {
    associations: &'a FileAssociations,
    highlighter: &'a dyn Highlighter,
    probe_timeout: Duration,
}

impl<'a> ContentTypeResolver<'a> {
    pub fn new(associations: &'a FileAssociations, highlighter: &'a dyn Highlighter) -> Self {
        Self {
            associations,
            highlighter,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Resolves a recognised MIME string directly and anything else as a path.
    pub async fn resolve(&self, path_or_content_type: &str) -> Resolution {
        match path_or_content_type {
            PLAIN_TEXT | HTML => self.resolve_content_type(path_or_content_type).await,
            path => self.resolve_path(Path::new(path)).await,
        }
    }

    /// Looks the path up in the association table; unknown paths are plain text.
    pub async fn resolve_path(&self, path: &Path) -> Resolution {
        let content_type = self
            .associations
            .lookup_path(path)
            .unwrap_or(PLAIN_TEXT)
            .to_string();
        debug!(
            target: "resolver",
            path = %path.display(),
            key = path_key(path).as_deref().unwrap_or(""),
            content_type = %content_type,
            "path_resolved"
        );
        self.resolve_content_type(&content_type).await
    }

    /// Maps an explicit content type or language id to a kind.
    pub async fn resolve_content_type(&self, content_type: &str) -> Resolution {
        let content_type = content_type.trim();
        if content_type.is_empty() || content_type.eq_ignore_ascii_case(PLAIN_TEXT) {
            return Resolution {
                content_type: PLAIN_TEXT.to_string(),
                kind: ContentKind::PlainText,
                warning: None,
            };
        }
        if content_type.eq_ignore_ascii_case(HTML) {
            return Resolution {
                content_type: HTML.to_string(),
                kind: ContentKind::Markup,
                warning: None,
            };
        }

        let language = content_type.to_ascii_lowercase();
        let installed = timeout(self.probe_timeout, self.highlighter.is_installed())
            .await
            .unwrap_or(false);
        if installed {
            return Resolution {
                content_type: language.clone(),
                kind: ContentKind::HighlightedCode(language),
                warning: None,
            };
        }

        let warning = format!(
            "highlighter '{}' is not available; printing {language} as plain text",
            self.highlighter.name()
        );
        warn!(target: "resolver", language = %language, highlighter = self.highlighter.name(), "highlighter_unavailable_plain_text");
        Resolution {
            content_type: language,
            kind: ContentKind::PlainText,
            warning: Some(warning),
        }
    }
}
