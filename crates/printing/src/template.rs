use std::fmt::Write;

use thiserror::Error;

/// Tokens recognised by the header/footer parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateToken {
    FileName,
    FilePath,
    PageNumber,
    PageCount,
    Date,
    Time,
}

impl TemplateToken {
    fn from_code(code: char) -> Option<Self> {
        let token = match code {
            'f' => TemplateToken::FileName,
            'F' => TemplateToken::FilePath,
            'p' => TemplateToken::PageNumber,
            'P' => TemplateToken::PageCount,
            'd' | 'D' => TemplateToken::Date,
            't' | 'T' => TemplateToken::Time,
            _ => return None,
        };
        Some(token)
    }
}

/// Template segments per alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSegment {
    Literal(String),
    Token(TemplateToken),
}

/// Horizontal slot a segment is printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    fn from_code(code: char) -> Option<Self> {
        match code {
            'l' | 'L' => Some(Alignment::Left),
            'c' | 'C' => Some(Alignment::Center),
            'r' | 'R' => Some(Alignment::Right),
            _ => None,
        }
    }
}

/// Parsed representation of a header/footer template.
///
/// `&l`, `&c` and `&r` switch the slot that following text lands in;
/// `&&` is a literal ampersand.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderFooterTemplate {
    pub left: Vec<TemplateSegment>,
    pub center: Vec<TemplateSegment>,
    pub right: Vec<TemplateSegment>,
}

impl HeaderFooterTemplate {
    pub fn parse(input: &str) -> Result<Self, TemplateError> {
        let mut template = Self::default();
        let mut alignment = Alignment::Left;
        let mut buffer = String::new();

        let mut chars = input.chars();
        while let Some(ch) = chars.next() {
            if ch != '&' {
                buffer.push(ch);
                continue;
            }

            let Some(code) = chars.next() else {
                buffer.push('&');
                break;
            };

            if code == '&' {
                buffer.push('&');
            } else if let Some(next) = Alignment::from_code(code) {
                template.flush(&mut buffer, alignment);
                alignment = next;
            } else if let Some(token) = TemplateToken::from_code(code) {
                template.flush(&mut buffer, alignment);
                template
                    .slot_mut(alignment)
                    .push(TemplateSegment::Token(token));
            } else {
                return Err(TemplateError::UnknownToken(code));
            }
        }

        template.flush(&mut buffer, alignment);
        Ok(template)
    }

    /// Renders `input`, printing it literally when it does not parse.
    pub fn render_or_literal(input: &str, context: &HeaderFooterContext<'_>) -> RenderedHeaderFooter {
        match Self::parse(input) {
            Ok(template) => template.render(context),
            Err(_) => RenderedHeaderFooter {
                left: input.to_string(),
                center: String::new(),
                right: String::new(),
            },
        }
    }

    pub fn render(&self, context: &HeaderFooterContext<'_>) -> RenderedHeaderFooter {
        RenderedHeaderFooter {
            left: render_segments(&self.left, context),
            center: render_segments(&self.center, context),
            right: render_segments(&self.right, context),
        }
    }

    fn slot_mut(&mut self, alignment: Alignment) -> &mut Vec<TemplateSegment> {
        match alignment {
            Alignment::Left => &mut self.left,
            Alignment::Center => &mut self.center,
            Alignment::Right => &mut self.right,
        }
    }

    fn flush(&mut self, buffer: &mut String, alignment: Alignment) {
        if buffer.is_empty() {
            return;
        }
        let literal = TemplateSegment::Literal(std::mem::take(buffer));
        self.slot_mut(alignment).push(literal);
    }
}

fn render_segments(segments: &[TemplateSegment], context: &HeaderFooterContext<'_>) -> String {
    let mut output = String::new();
    for segment in segments {
        match segment {
            TemplateSegment::Literal(text) => output.push_str(text),
            TemplateSegment::Token(token) => context.append(*token, &mut output),
        }
    }
    output
}

/// Runtime context for header/footer rendering.
#[derive(Debug, Clone, Default)]
pub struct HeaderFooterContext<'a> {
    pub file_name: Option<&'a str>,
    pub file_path: Option<&'a str>,
    pub page_number: u32,
    pub page_count: Option<u32>,
    pub date: Option<&'a str>,
    pub time: Option<&'a str>,
}

impl HeaderFooterContext<'_> {
    fn append(&self, token: TemplateToken, buffer: &mut String) {
        let value = match token {
            TemplateToken::FileName => self.file_name,
            TemplateToken::FilePath => self.file_path,
            TemplateToken::Date => self.date,
            TemplateToken::Time => self.time,
            TemplateToken::PageNumber => {
                let _ = write!(buffer, "{}", self.page_number);
                return;
            }
            TemplateToken::PageCount => {
                if let Some(total) = self.page_count {
                    let _ = write!(buffer, "{total}");
                }
                return;
            }
        };
        if let Some(value) = value {
            buffer.push_str(value);
        }
    }
}

/// Rendered header/footer strings for each alignment slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHeaderFooter {
    pub left: String,
    pub center: String,
    pub right: String,
}

impl RenderedHeaderFooter {
    pub fn slots(&self) -> [(Alignment, &str); 3] {
        [
            (Alignment::Left, self.left.as_str()),
            (Alignment::Center, self.center.as_str()),
            (Alignment::Right, self.right.as_str()),
        ]
    }
}

/// Errors raised while parsing header/footer templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown header/footer token '&{0}'")]
    UnknownToken(char),
}
