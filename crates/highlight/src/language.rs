use std::borrow::Cow;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::client::{HighlightError, HighlightKind, Highlighter, StyledRun};

const NUMBER_PATTERN: &str = r"(?x)
    \b
    (?:
        0[xX][0-9A-Fa-f_]+ |
        0[bB][01_]+ |
        0[oO][0-7_]+ |
        [0-9][0-9_]*(?:\.[0-9_]+)?(?:[eE][+-]?[0-9_]+)?
    )
";

static BUILTIN_REGISTRY: Lazy<Arc<LanguageRegistry>> =
    Lazy::new(|| Arc::new(LanguageRegistry::with_defaults()));

/// Identifier for a registered language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageId(Cow<'static, str>);

impl LanguageId {
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for LanguageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for LanguageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Declarative description of a language, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_comment: Option<(String, String)>,
    #[serde(default)]
    pub quotes: Vec<char>,
    #[serde(default = "default_escape")]
    pub escape: Option<char>,
    #[serde(default)]
    pub operators: Vec<String>,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_escape() -> Option<char> {
    Some('\\')
}

fn default_case_sensitive() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightToken {
    pub range: Range<usize>,
    pub kind: HighlightKind,
}

#[derive(Debug, Clone)]
pub struct LanguageDefinition {
    pub id: LanguageId,
    line_comment: Option<String>,
    block_comment: Option<(String, String)>,
    quotes: Vec<char>,
    escape: Option<char>,
    keyword_regex: Option<Regex>,
    operator_regex: Option<Regex>,
    number_regex: Regex,
}

impl LanguageDefinition {
    pub fn from_spec(spec: LanguageSpec) -> Result<Self, HighlightError> {
        let keyword_regex = build_keyword_regex(&spec.keywords, spec.case_sensitive)?;
        let operator_regex = build_operator_regex(&spec.operators)?;
        let number_regex = Regex::new(NUMBER_PATTERN).map_err(|err| {
            HighlightError::Process(format!("number regex compile error: {err}"))
        })?;

        Ok(Self {
            id: LanguageId::new(spec.id.to_ascii_lowercase()),
            line_comment: spec.line_comment.filter(|marker| !marker.is_empty()),
            block_comment: spec
                .block_comment
                .filter(|(open, close)| !open.is_empty() && !close.is_empty()),
            quotes: spec.quotes,
            escape: spec.escape,
            keyword_regex,
            operator_regex,
            number_regex,
        })
    }

    /// Classifies `input` into non-overlapping tokens sorted by offset.
    pub fn highlight(&self, input: &str) -> Vec<HighlightToken> {
        let mut tokens = Vec::new();
        if input.is_empty() {
            return tokens;
        }
        let mut occupied = vec![false; input.len()];

        self.scan_literals(input, &mut tokens, &mut occupied);

        if let Some(regex) = &self.keyword_regex {
            mark_matches(regex, HighlightKind::Keyword, input, &mut tokens, &mut occupied);
        }
        mark_matches(
            &self.number_regex,
            HighlightKind::Number,
            input,
            &mut tokens,
            &mut occupied,
        );
        if let Some(regex) = &self.operator_regex {
            mark_matches(regex, HighlightKind::Operator, input, &mut tokens, &mut occupied);
        }

        tokens.sort_by_key(|token| token.range.start);
        tokens
    }

    /// Like [`Self::highlight`], but fills the gaps with plain runs so the
    /// concatenated run text equals `input`.
    pub fn runs(&self, input: &str) -> Vec<StyledRun> {
        let mut runs = Vec::new();
        let mut cursor = 0;
        for token in self.highlight(input) {
            if token.range.start > cursor {
                runs.push(StyledRun::new(
                    &input[cursor..token.range.start],
                    HighlightKind::Plain,
                ));
            }
            runs.push(StyledRun::new(&input[token.range.clone()], token.kind));
            cursor = token.range.end;
        }
        if cursor < input.len() {
            runs.push(StyledRun::new(&input[cursor..], HighlightKind::Plain));
        }
        runs
    }

    // Comments and strings in one left-to-right pass, so a quote inside a
    // comment (or a comment marker inside a string) is never misread.
    fn scan_literals(
        &self,
        input: &str,
        tokens: &mut Vec<HighlightToken>,
        occupied: &mut [bool],
    ) {
        let mut index = 0;
        while index < input.len() {
            let rest = &input[index..];

            if let Some((open, close)) = &self.block_comment {
                if rest.starts_with(open.as_str()) {
                    let body = index + open.len();
                    let end = input[body..]
                        .find(close.as_str())
                        .map(|pos| body + pos + close.len())
                        .unwrap_or(input.len());
                    push_token(tokens, occupied, index..end, HighlightKind::Comment);
                    index = end;
                    continue;
                }
            }

            if let Some(marker) = &self.line_comment {
                if rest.starts_with(marker.as_str()) {
                    let end = rest.find('\n').map(|pos| index + pos).unwrap_or(input.len());
                    push_token(tokens, occupied, index..end, HighlightKind::Comment);
                    index = end;
                    continue;
                }
            }

            let Some(ch) = rest.chars().next() else {
                break;
            };
            if self.quotes.contains(&ch) {
                let end = scan_string(input, index, ch, self.escape);
                push_token(tokens, occupied, index..end, HighlightKind::String);
                index = end;
                continue;
            }
            index += ch.len_utf8();
        }
    }
}

/// Strings end at the matching quote or, when unterminated, at the line end.
fn scan_string(input: &str, start: usize, quote: char, escape: Option<char>) -> usize {
    let body = start + quote.len_utf8();
    let mut chars = input[body..].char_indices();
    while let Some((offset, ch)) = chars.next() {
        if Some(ch) == escape {
            chars.next();
            continue;
        }
        if ch == quote {
            return body + offset + ch.len_utf8();
        }
        if ch == '\n' {
            return body + offset;
        }
    }
    input.len()
}

fn push_token(
    tokens: &mut Vec<HighlightToken>,
    occupied: &mut [bool],
    range: Range<usize>,
    kind: HighlightKind,
) {
    if range.is_empty() {
        return;
    }
    for slot in &mut occupied[range.clone()] {
        *slot = true;
    }
    tokens.push(HighlightToken { range, kind });
}

fn mark_matches(
    regex: &Regex,
    kind: HighlightKind,
    input: &str,
    tokens: &mut Vec<HighlightToken>,
    occupied: &mut [bool],
) {
    for found in regex.find_iter(input) {
        let range = found.start()..found.end();
        if occupied[range.clone()].iter().any(|taken| *taken) {
            continue;
        }
        push_token(tokens, occupied, range, kind.clone());
    }
}

fn build_keyword_regex(
    keywords: &[String],
    case_sensitive: bool,
) -> Result<Option<Regex>, HighlightError> {
    if keywords.is_empty() {
        return Ok(None);
    }
    let pattern = keywords
        .iter()
        .map(|keyword| regex::escape(keyword))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"\b(?:{pattern})\b");
    RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map(Some)
        .map_err(|err| HighlightError::Process(format!("keyword regex compile error: {err}")))
}

fn build_operator_regex(operators: &[String]) -> Result<Option<Regex>, HighlightError> {
    if operators.is_empty() {
        return Ok(None);
    }
    // Longest first so `::` wins over `:`.
    let mut sorted: Vec<&String> = operators.iter().collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()));
    let pattern = sorted
        .into_iter()
        .map(|operator| regex::escape(operator))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&pattern)
        .map(Some)
        .map_err(|err| HighlightError::Process(format!("operator regex compile error: {err}")))
}

#[derive(Default)]
pub struct LanguageRegistry {
    languages: HashMap<String, LanguageDefinition>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for language in builtin::builtins() {
            registry.register(language);
        }
        registry
    }

    pub fn register(&mut self, language: LanguageDefinition) {
        self.languages
            .insert(language.id.as_ref().to_string(), language);
    }

    pub fn register_spec(&mut self, spec: LanguageSpec) -> Result<(), HighlightError> {
        let definition = LanguageDefinition::from_spec(spec)?;
        self.register(definition);
        Ok(())
    }

    pub fn get(&self, id: impl AsRef<str>) -> Option<&LanguageDefinition> {
        self.languages.get(&id.as_ref().to_ascii_lowercase())
    }

    pub fn contains(&self, id: impl AsRef<str>) -> bool {
        self.get(id).is_some()
    }
}

/// In-process [`Highlighter`] backed by a [`LanguageRegistry`].
#[derive(Clone)]
pub struct RegistryHighlighter {
    registry: Arc<LanguageRegistry>,
}

impl RegistryHighlighter {
    pub fn new(registry: LanguageRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }
}

impl Default for RegistryHighlighter {
    fn default() -> Self {
        Self {
            registry: BUILTIN_REGISTRY.clone(),
        }
    }
}

#[async_trait]
impl Highlighter for RegistryHighlighter {
    fn name(&self) -> &str {
        "builtin"
    }

    async fn is_installed(&self) -> bool {
        true
    }

    async fn tokenize(
        &self,
        text: &str,
        language: &str,
    ) -> Result<Vec<StyledRun>, HighlightError> {
        let definition = self
            .registry
            .get(language)
            .ok_or_else(|| HighlightError::UnsupportedLanguage(language.to_string()))?;
        Ok(definition.runs(text))
    }
}

pub mod builtin {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|word| word.to_string()).collect()
    }

    pub fn specs() -> Vec<LanguageSpec> {
        vec![rust(), json(), python(), toml()]
    }

    pub fn builtins() -> Vec<LanguageDefinition> {
        specs()
            .into_iter()
            .map(|spec| {
                LanguageDefinition::from_spec(spec).expect("built-in language spec must compile")
            })
            .collect()
    }

    fn rust() -> LanguageSpec {
        LanguageSpec {
            id: "rust".into(),
            keywords: words(&[
                "fn", "let", "mut", "pub", "impl", "trait", "struct", "enum", "match", "if",
                "else", "loop", "while", "for", "in", "move", "async", "await", "use", "crate",
                "mod", "const", "static", "where", "return", "break", "continue", "Self", "self",
                "ref", "type", "unsafe", "extern", "dyn", "true", "false",
            ]),
            line_comment: Some("//".into()),
            block_comment: Some(("/*".into(), "*/".into())),
            quotes: vec!['"'],
            escape: Some('\\'),
            operators: words(&[
                "::", "->", "=>", "==", "!=", ">=", "<=", "+=", "-=", "*=", "/=", "&&", "||",
                "+", "-", "*", "/", "%", ">", "<", "&", "|", "^", "=",
            ]),
            case_sensitive: true,
        }
    }

    fn json() -> LanguageSpec {
        LanguageSpec {
            id: "json".into(),
            keywords: words(&["true", "false", "null"]),
            line_comment: None,
            block_comment: None,
            quotes: vec!['"'],
            escape: Some('\\'),
            operators: words(&[":", ",", "{", "}", "[", "]"]),
            case_sensitive: true,
        }
    }

    fn python() -> LanguageSpec {
        LanguageSpec {
            id: "python".into(),
            keywords: words(&[
                "def", "class", "return", "if", "elif", "else", "for", "while", "in", "import",
                "from", "as", "with", "try", "except", "finally", "raise", "pass", "lambda",
                "yield", "None", "True", "False", "and", "or", "not", "is",
            ]),
            line_comment: Some("#".into()),
            block_comment: None,
            quotes: vec!['"', '\''],
            escape: Some('\\'),
            operators: words(&["==", "!=", ">=", "<=", "**", "//", "+", "-", "*", "/", "=", ":"]),
            case_sensitive: true,
        }
    }

    fn toml() -> LanguageSpec {
        LanguageSpec {
            id: "toml".into(),
            keywords: words(&["true", "false"]),
            line_comment: Some("#".into()),
            block_comment: None,
            quotes: vec!['"', '\''],
            escape: Some('\\'),
            operators: words(&["=", "[", "]", "{", "}", ","]),
            case_sensitive: true,
        }
    }
}
