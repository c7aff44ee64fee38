use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;
use unicode_width::UnicodeWidthChar;

const TAB_STOP: usize = 4;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("content of {0} could not be decoded as text")]
    Undecodable(String),
}

/// 待排版的文件内容 / Text blob plus the name it was loaded from.
///
/// Line endings are normalised to `\n` and tabs are expanded, so every
/// engine measures the same characters it later paints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    source: String,
    text: Arc<str>,
    modified: Option<SystemTime>,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl AsRef<str>) -> Self {
        Self {
            source: source.into(),
            text: Arc::from(normalize(text.as_ref()).as_ref()),
            modified: None,
        }
    }

    /// Decodes raw bytes: BOM first, then strict UTF-8, then a legacy guess.
    pub fn decode(source: impl Into<String>, bytes: &[u8]) -> Result<Self, DocumentError> {
        let source = source.into();
        match decode_bytes(bytes) {
            Some(text) => Ok(Self::new(source, text)),
            None => Err(DocumentError::Undecodable(source)),
        }
    }

    /// Reads and decodes a file, remembering its modification time.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let io_error = |source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        };
        let bytes = fs::read(path).map_err(io_error)?;
        let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok();
        let document = Self::decode(path.display().to_string(), &bytes)?;
        Ok(document.with_modified(modified))
    }

    pub fn with_modified(mut self, modified: Option<SystemTime>) -> Self {
        self.modified = modified;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Last path component of the source, or the whole source for logical names.
    pub fn file_name(&self) -> &str {
        Path::new(&self.source)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.source)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }

    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

fn decode_bytes(bytes: &[u8]) -> Option<String> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(encoding, &bytes[bom_len..]);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return reject_binary(text.to_owned());
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);
    if guess == UTF_8 {
        return None;
    }
    decode_with(guess, bytes)
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        return None;
    }
    reject_binary(text.into_owned())
}

fn reject_binary(text: String) -> Option<String> {
    if text.contains('\0') {
        None
    } else {
        Some(text)
    }
}

fn normalize(text: &str) -> Cow<'_, str> {
    if !text.contains(&['\r', '\t'][..]) {
        return Cow::Borrowed(text);
    }

    let mut output = String::with_capacity(text.len());
    let mut column = 0usize;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                output.push('\n');
                column = 0;
            }
            '\n' => {
                output.push('\n');
                column = 0;
            }
            '\t' => {
                let spaces = TAB_STOP - column % TAB_STOP;
                output.extend(std::iter::repeat(' ').take(spaces));
                column += spaces;
            }
            other => {
                output.push(other);
                column += other.width().unwrap_or(0);
            }
        }
    }
    Cow::Owned(output)
}
