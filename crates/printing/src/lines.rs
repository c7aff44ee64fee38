use std::ops::Range;
use std::sync::Arc;

use printflow_highlight::RunStyle;
use printflow_settings::SettingsSnapshot;
use unicode_width::UnicodeWidthChar;

use crate::display::DrawSurface;
use crate::document::Document;
use crate::engine::{LineRange, PageIndex, PageSpan, RenderContext};
use crate::error::{page_slot, EngineError};
use crate::frame::PageFrame;

/// Logical lines between cancellation checks.
const CHUNK_LINES: usize = 256;

/// Display columns taken by `ch`; wide glyphs count two.
pub fn char_columns(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

pub fn display_width(text: &str) -> usize {
    text.chars().map(char_columns).sum()
}

/// Longest prefix of `text` that fits into `columns`.
pub fn clip_to_columns(text: &str, columns: usize) -> &str {
    let mut width = 0;
    for (index, ch) in text.char_indices() {
        width += char_columns(ch);
        if width > columns {
            return &text[..index];
        }
    }
    text
}

/// Byte ranges of the logical lines of `text`.
///
/// A trailing line break does not open another line.
pub fn logical_line_ranges(text: &str) -> Vec<Range<usize>> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    let mut ranges = Vec::new();
    let mut start = 0;
    for (index, _) in body.match_indices('\n') {
        ranges.push(start..index);
        start = index + 1;
    }
    ranges.push(start..body.len());
    ranges
}

pub fn logical_lines(text: &str) -> Vec<&str> {
    logical_line_ranges(text)
        .into_iter()
        .map(|range| &text[range])
        .collect()
}

/// Splits `line` into byte ranges no wider than `columns`.
///
/// Breaks at the last whitespace run that fits and drops that run; a word
/// longer than a whole line is broken mid-word.
pub fn wrap_line(line: &str, columns: usize) -> Vec<Range<usize>> {
    let columns = columns.max(1);
    if line.is_empty() {
        return vec![0..0];
    }

    let mut segments = Vec::new();
    let mut start = 0;
    while start < line.len() {
        let rest = &line[start..];
        if display_width(rest) <= columns {
            segments.push(start..line.len());
            break;
        }

        let mut fit_end = start + clip_to_columns(rest, columns).len();
        if fit_end == start {
            // A single glyph wider than the line still has to go somewhere.
            fit_end += rest.chars().next().map_or(1, char::len_utf8);
        }

        let search_end = match line[fit_end..].chars().next() {
            Some(ch) if ch.is_whitespace() => fit_end + ch.len_utf8(),
            _ => fit_end,
        };
        let space = line[start..search_end]
            .char_indices()
            .rev()
            .find(|(_, ch)| ch.is_whitespace())
            .map(|(offset, _)| start + offset);

        if let Some(space) = space {
            let end = start + line[start..space].trim_end().len();
            if end > start {
                segments.push(start..end);
                let tail = &line[space..];
                start = space + (tail.len() - tail.trim_start().len());
                continue;
            }
            // Only indentation precedes the break: move the next word down whole if it fits.
            let word_start = start + (rest.len() - rest.trim_start().len());
            let word = line[word_start..]
                .split(char::is_whitespace)
                .next()
                .unwrap_or_default();
            if word_start <= fit_end && display_width(word) <= columns {
                segments.push(start..word_start);
                start = word_start;
                continue;
            }
        }

        segments.push(start..fit_end);
        start = fit_end;
    }
    segments
}

/// One printed row: a slice of a logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VisualLine {
    pub logical: usize,
    pub range: Range<usize>,
    pub first: bool,
}

/// A style applied to a byte range of the document text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StyleSpan {
    pub range: Range<usize>,
    pub style: RunStyle,
}

/// Line-oriented layout shared by the plain-text and code engines.
#[derive(Debug, Clone)]
pub(crate) struct TextLayout {
    frame: PageFrame,
    settings: Arc<SettingsSnapshot>,
    lines: Vec<VisualLine>,
    gutter: usize,
    columns: usize,
    index: Arc<PageIndex>,
}

impl TextLayout {
    pub fn build(text: &str, context: &RenderContext<'_>) -> Result<Self, EngineError> {
        let settings = Arc::clone(&context.settings);
        let frame = PageFrame::new(&context.geometry, &settings);
        let logical = logical_line_ranges(text);

        let gutter = if settings.line_numbers {
            digits(logical.len()) + 1
        } else {
            0
        };
        let columns = frame.columns().saturating_sub(gutter).max(1);
        let lines_per_page = frame.lines_per_page();

        let mut lines = Vec::with_capacity(logical.len());
        for (number, range) in logical.iter().enumerate() {
            if number % CHUNK_LINES == 0 {
                context.cancel.check()?;
                context.report(number, logical.len());
            }
            if settings.wrap {
                let line = &text[range.clone()];
                for (piece, segment) in wrap_line(line, columns).into_iter().enumerate() {
                    lines.push(VisualLine {
                        logical: number,
                        range: range.start + segment.start..range.start + segment.end,
                        first: piece == 0,
                    });
                }
            } else {
                lines.push(VisualLine {
                    logical: number,
                    range: range.clone(),
                    first: true,
                });
            }
        }
        context.cancel.check()?;
        context.report(logical.len(), logical.len());

        let pages = (0..lines.len())
            .step_by(lines_per_page)
            .map(|start| {
                PageSpan::Lines(LineRange::new(start, (start + lines_per_page).min(lines.len())))
            })
            .collect();

        Ok(Self {
            frame,
            settings,
            lines,
            gutter,
            columns,
            index: Arc::new(PageIndex::new(pages)),
        })
    }

    pub fn index(&self) -> &Arc<PageIndex> {
        &self.index
    }

    pub fn page_count(&self) -> u32 {
        self.index.page_count()
    }

    #[cfg(test)]
    pub fn lines(&self) -> &[VisualLine] {
        &self.lines
    }

    /// Draws one page. Without `styles` the text is painted in the plain style.
    pub fn paint(
        &self,
        surface: &mut dyn DrawSurface,
        page: u32,
        document: &Document,
        styles: &[StyleSpan],
    ) -> Result<(), EngineError> {
        let page_count = self.page_count();
        let slot = page_slot(page, page_count)?;
        let range = match self.index.spans().get(slot) {
            Some(PageSpan::Lines(range)) => *range,
            _ => return Err(EngineError::NotRendered),
        };

        self.frame
            .paint_decorations(surface, &self.settings, document, page, page_count);

        let text = document.text();
        let origin_x = self.frame.left + self.gutter as f32 * self.frame.char_width;
        for (row, line) in self.lines[range.start..range.end].iter().enumerate() {
            let y = self.frame.top + row as f32 * self.frame.line_height;
            if self.gutter > 0 && line.first {
                self.frame
                    .paint_line_number(surface, line.logical + 1, self.gutter, y);
            }

            let mut visible = &text[line.range.clone()];
            if !self.settings.wrap {
                visible = clip_to_columns(visible, self.columns);
            }
            let end = line.range.start + visible.len();
            self.paint_segment(surface, origin_x, y, text, line.range.start..end, styles);
        }
        Ok(())
    }

    fn paint_segment(
        &self,
        surface: &mut dyn DrawSurface,
        origin_x: f32,
        y: f32,
        text: &str,
        range: Range<usize>,
        styles: &[StyleSpan],
    ) {
        if range.is_empty() {
            return;
        }
        if styles.is_empty() {
            let piece = &text[range];
            if !piece.trim().is_empty() {
                surface.draw(self.frame.glyph(piece, origin_x, y, RunStyle::default()));
            }
            return;
        }

        let mut column = 0;
        let first = styles.partition_point(|span| span.range.end <= range.start);
        for span in &styles[first..] {
            if span.range.start >= range.end {
                break;
            }
            let start = span.range.start.max(range.start);
            let end = span.range.end.min(range.end);
            if start >= end {
                continue;
            }
            let piece = &text[start..end];
            if !piece.trim().is_empty() {
                let x = origin_x + column as f32 * self.frame.char_width;
                surface.draw(self.frame.glyph(piece, x, y, span.style));
            }
            column += display_width(piece);
        }
    }
}

fn digits(mut value: usize) -> usize {
    let mut count = 1;
    while value >= 10 {
        value /= 10;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pieces<'a>(line: &'a str, columns: usize) -> Vec<&'a str> {
        wrap_line(line, columns)
            .into_iter()
            .map(|range| &line[range])
            .collect()
    }

    #[test]
    fn logical_lines_ignore_trailing_break() {
        assert_eq!(logical_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(logical_lines("a\n\nb"), vec!["a", "", "b"]);
        assert_eq!(logical_lines("\n"), vec![""]);
        assert_eq!(logical_lines("solo"), vec!["solo"]);
    }

    #[test]
    fn wraps_at_word_boundaries() {
        assert_eq!(
            pieces("the quick brown fox", 10),
            vec!["the quick", "brown fox"]
        );
        assert_eq!(pieces("aaaa bbbb", 4), vec!["aaaa", "bbbb"]);
        assert_eq!(pieces("short", 10), vec!["short"]);
        assert_eq!(pieces("", 10), vec![""]);
    }

    #[test]
    fn hard_breaks_words_longer_than_the_line() {
        assert_eq!(pieces("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(pieces("ab abcdefgh", 4), vec!["ab", "abcd", "efgh"]);
    }

    #[test]
    fn indentation_never_splits_a_word_that_fits() {
        assert_eq!(pieces("    indented text", 10), vec!["    ", "indented", "text"]);
        assert_eq!(pieces("  short words", 20), vec!["  short words"]);
        assert_eq!(pieces("  abcdefghijkl", 10), vec!["  abcdefgh", "ijkl"]);
        assert_eq!(pieces("      ab", 4), vec!["    ", "  ab"]);
    }

    #[test]
    fn wide_glyphs_count_two_columns() {
        assert_eq!(display_width("日本語"), 6);
        assert_eq!(pieces("日本語テキスト", 4), vec!["日本", "語テ", "キス", "ト"]);
        assert_eq!(clip_to_columns("日本語", 5), "日本");
        assert_eq!(pieces("日", 1), vec!["日"]);
    }

    #[test]
    fn wrapped_pieces_never_exceed_columns() {
        let line = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod";
        for columns in 1..20 {
            for piece in pieces(line, columns) {
                assert!(
                    display_width(piece) <= columns,
                    "{piece:?} wider than {columns}"
                );
            }
        }
    }

    #[test]
    fn digits_counts_decimal_places() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(1234), 4);
    }
}
