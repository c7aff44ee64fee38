use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Style tag attached to a run of source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HighlightKind {
    Plain,
    Keyword,
    Comment,
    String,
    Number,
    Operator,
    Identifier,
    Custom(String),
}

impl HighlightKind {
    pub fn as_tag(&self) -> &str {
        match self {
            HighlightKind::Plain => "plain",
            HighlightKind::Keyword => "keyword",
            HighlightKind::Comment => "comment",
            HighlightKind::String => "string",
            HighlightKind::Number => "number",
            HighlightKind::Operator => "operator",
            HighlightKind::Identifier => "identifier",
            HighlightKind::Custom(name) => name,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "" | "plain" | "text" => HighlightKind::Plain,
            "keyword" => HighlightKind::Keyword,
            "comment" => HighlightKind::Comment,
            "string" => HighlightKind::String,
            "number" => HighlightKind::Number,
            "operator" | "punctuation" => HighlightKind::Operator,
            "identifier" | "variable" => HighlightKind::Identifier,
            other => HighlightKind::Custom(other.to_string()),
        }
    }
}

impl From<String> for HighlightKind {
    fn from(value: String) -> Self {
        HighlightKind::from_tag(&value)
    }
}

impl From<HighlightKind> for String {
    fn from(value: HighlightKind) -> Self {
        value.as_tag().to_string()
    }
}

/// A contiguous piece of the document together with its style tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRun {
    pub text: String,
    pub style: HighlightKind,
}

impl StyledRun {
    pub fn new(text: impl Into<String>, style: HighlightKind) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("highlighter '{0}' is not installed")]
    NotInstalled(String),
    #[error("language '{0}' is not supported")]
    UnsupportedLanguage(String),
    #[error("highlighter timed out after {0:?}")]
    Timeout(Duration),
    #[error("highlighter process failed: {0}")]
    Process(String),
    #[error("highlighter I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("highlighter output could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Contract for the external tokenizer service.
///
/// Every failure is recoverable: callers fall back to unstyled text.
#[async_trait]
pub trait Highlighter: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Capability probe. May spawn a process or perform IPC.
    async fn is_installed(&self) -> bool;

    /// Splits `text` into ordered runs whose concatenation reproduces `text`.
    async fn tokenize(&self, text: &str, language: &str)
        -> Result<Vec<StyledRun>, HighlightError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip_through_strings() {
        for kind in [
            HighlightKind::Plain,
            HighlightKind::Keyword,
            HighlightKind::Comment,
            HighlightKind::String,
            HighlightKind::Number,
            HighlightKind::Operator,
            HighlightKind::Identifier,
            HighlightKind::Custom("attr-name".into()),
        ] {
            let tag: String = kind.clone().into();
            assert_eq!(HighlightKind::from(tag), kind);
        }
    }

    #[test]
    fn runs_deserialize_from_tokenizer_json() {
        let runs: Vec<StyledRun> = serde_json::from_str(
            r#"[{"text":"fn","style":"Keyword"},{"text":" main","style":""},{"text":"()","style":"punctuation"}]"#,
        )
        .unwrap();
        assert_eq!(
            runs,
            vec![
                StyledRun::new("fn", HighlightKind::Keyword),
                StyledRun::new(" main", HighlightKind::Plain),
                StyledRun::new("()", HighlightKind::Operator),
            ]
        );
    }
}
