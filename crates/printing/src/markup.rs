use std::borrow::Cow;
use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use printflow_highlight::{Rgb, RunStyle};
use printflow_settings::SettingsSnapshot;
use quick_xml::escape::unescape_with;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::display::{Color, DisplayCommand, DrawSurface, Point, Stroke};
use crate::document::Document;
use crate::engine::{
    BlockPosition, ContentKind, ContentTypeEngine, PageIndex, PageSpan, RenderContext,
};
use crate::error::{page_slot, EngineError};
use crate::frame::{fit, glyph_run, PageFrame, FIT_EPSILON};
use crate::lines::{clip_to_columns, display_width, wrap_line};

const QUOTE_INDENT_COLUMNS: usize = 4;
const BLOCK_SPACING_LINES: f32 = 0.5;
const CHUNK_BLOCKS: usize = 64;
const CODE_COLOR: Rgb = Rgb::new(0x80, 0x00, 0x00);

/// Kind of a block-level element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    Preformatted,
    ListItem,
    Rule,
}

impl BlockKind {
    fn scale(self) -> f32 {
        match self {
            BlockKind::Heading(1) => 2.0,
            BlockKind::Heading(2) => 1.5,
            BlockKind::Heading(3) => 1.25,
            BlockKind::Heading(4) => 1.1,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Emphasis {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
}

/// Emphasis over a byte range of a block's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSpan {
    pub range: Range<usize>,
    pub emphasis: Emphasis,
}

/// A block of flowed text. Line breaks inside `text` are hard breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub quote_depth: usize,
    pub text: String,
    pub spans: Vec<InlineSpan>,
}

impl Block {
    fn new(kind: BlockKind, quote_depth: usize) -> Self {
        Self {
            kind,
            quote_depth,
            text: String::new(),
            spans: Vec::new(),
        }
    }

    fn push(&mut self, text: &str, emphasis: Emphasis) {
        if text.is_empty() {
            return;
        }
        let start = self.text.len();
        self.text.push_str(text);
        let end = self.text.len();
        match self.spans.last_mut() {
            Some(last) if last.range.end == start && last.emphasis == emphasis => {
                last.range.end = end;
            }
            _ => self.spans.push(InlineSpan {
                range: start..end,
                emphasis,
            }),
        }
    }

    fn truncate(&mut self, len: usize) {
        self.text.truncate(len);
        self.spans.retain_mut(|span| {
            span.range.end = span.range.end.min(len);
            span.range.start < span.range.end
        });
    }
}

/// Parses HTML leniently into a flat list of blocks.
///
/// Unknown tags are transparent, `head`/`script`/`style` are skipped and
/// the unparsed remainder after a syntax error is kept as a literal
/// paragraph.
pub fn parse_blocks(input: &str) -> Vec<Block> {
    let mut reader = Reader::from_str(input);
    reader.trim_text(false);
    reader.check_end_names(false);
    reader.check_comments(false);

    let mut builder = BlockBuilder::default();
    loop {
        let position = reader.buffer_position();
        match reader.read_event() {
            Ok(Event::Start(tag)) => builder.start(&tag_name(tag.local_name().as_ref())),
            Ok(Event::Empty(tag)) => {
                let name = tag_name(tag.local_name().as_ref());
                builder.start(&name);
                builder.end(&name);
            }
            Ok(Event::End(tag)) => builder.end(&tag_name(tag.local_name().as_ref())),
            Ok(Event::Text(text)) => {
                let raw = String::from_utf8_lossy(&text);
                builder.text(&decode_entities(&raw));
            }
            Ok(Event::CData(data)) => builder.text(&String::from_utf8_lossy(&data)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(target: "markup", position, error = %err, "markup_parse_error_literal_remainder");
                builder.literal(input.get(position..).unwrap_or_default());
                break;
            }
        }
    }
    builder.finish()
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Resolves character references; unknown entities stay as written.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    if let Ok(decoded) = unescape_with(raw, html_entity) {
        return decoded;
    }

    let mut output = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        output.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let candidate = rest
            .char_indices()
            .take(32)
            .find(|(_, ch)| *ch == ';')
            .map(|(semi, _)| &rest[..=semi]);
        match candidate.and_then(|entity| unescape_with(entity, html_entity).ok()) {
            Some(decoded) => {
                output.push_str(&decoded);
                rest = &rest[candidate.map_or(1, str::len)..];
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }
    output.push_str(rest);
    Cow::Owned(output)
}

fn html_entity(name: &str) -> Option<&'static str> {
    let value = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{a0}",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        "mdash" => "—",
        "ndash" => "–",
        "hellip" => "…",
        "laquo" => "«",
        "raquo" => "»",
        "lsquo" => "‘",
        "rsquo" => "’",
        "ldquo" => "“",
        "rdquo" => "”",
        "bull" => "•",
        "middot" => "·",
        "deg" => "°",
        "euro" => "€",
        _ => return None,
    };
    Some(value)
}

#[derive(Default)]
struct BlockBuilder {
    blocks: Vec<Block>,
    current: Option<Block>,
    quote_depth: usize,
    skip_depth: usize,
    bold: usize,
    italic: usize,
    code: usize,
    lists: Vec<Option<usize>>,
    pending_space: bool,
}

impl BlockBuilder {
    fn emphasis(&self) -> Emphasis {
        Emphasis {
            bold: self.bold > 0,
            italic: self.italic > 0,
            code: self.code > 0,
        }
    }

    fn start(&mut self, name: &str) {
        if matches!(name, "head" | "script" | "style") {
            self.skip_depth += 1;
            return;
        }
        if self.skip_depth > 0 {
            return;
        }
        match name {
            "p" | "div" | "section" | "article" | "header" | "footer" | "dt" | "dd" => {
                self.open(BlockKind::Paragraph)
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name.as_bytes()[1] - b'0';
                self.open(BlockKind::Heading(level));
            }
            "pre" => self.open(BlockKind::Preformatted),
            "ul" => {
                self.flush();
                self.lists.push(None);
            }
            "ol" => {
                self.flush();
                self.lists.push(Some(0));
            }
            "li" => {
                self.open(BlockKind::ListItem);
                let marker = match self.lists.last_mut() {
                    Some(Some(counter)) => {
                        *counter += 1;
                        format!("{counter}. ")
                    }
                    _ => "• ".to_string(),
                };
                let emphasis = self.emphasis();
                if let Some(block) = self.current.as_mut() {
                    block.push(&marker, emphasis);
                }
            }
            "blockquote" => {
                self.flush();
                self.quote_depth += 1;
            }
            "hr" => {
                self.flush();
                self.blocks.push(Block::new(BlockKind::Rule, self.quote_depth));
            }
            "br" => {
                let emphasis = self.emphasis();
                self.ensure_block().push("\n", emphasis);
                self.pending_space = false;
            }
            "b" | "strong" => self.bold += 1,
            "i" | "em" => self.italic += 1,
            "code" | "tt" | "kbd" => self.code += 1,
            _ => {}
        }
    }

    fn end(&mut self, name: &str) {
        if matches!(name, "head" | "script" | "style") {
            self.skip_depth = self.skip_depth.saturating_sub(1);
            return;
        }
        if self.skip_depth > 0 {
            return;
        }
        match name {
            "p" | "div" | "section" | "article" | "header" | "footer" | "dt" | "dd" | "h1"
            | "h2" | "h3" | "h4" | "h5" | "h6" | "pre" | "li" => self.flush(),
            "ul" | "ol" => {
                self.flush();
                self.lists.pop();
            }
            "blockquote" => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            "b" | "strong" => self.bold = self.bold.saturating_sub(1),
            "i" | "em" => self.italic = self.italic.saturating_sub(1),
            "code" | "tt" | "kbd" => self.code = self.code.saturating_sub(1),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.skip_depth > 0 || text.is_empty() {
            return;
        }
        let emphasis = self.emphasis();
        let preformatted = matches!(
            self.current.as_ref().map(|block| block.kind),
            Some(BlockKind::Preformatted)
        );
        if preformatted {
            self.ensure_block().push(text, emphasis);
            return;
        }
        if text.trim().is_empty() && self.current.is_none() {
            return;
        }

        let mut collapsed = String::with_capacity(text.len());
        for ch in text.chars() {
            if ch.is_whitespace() && ch != '\u{a0}' {
                self.pending_space = true;
                continue;
            }
            if self.pending_space {
                self.pending_space = false;
                if collapsed.is_empty() {
                    self.separate();
                } else {
                    collapsed.push(' ');
                }
            }
            collapsed.push(ch);
        }
        if !collapsed.is_empty() {
            self.ensure_block().push(&collapsed, emphasis);
        }
    }

    /// Inserts the collapsed space between two text nodes, unstyled.
    fn separate(&mut self) {
        if let Some(block) = self.current.as_mut() {
            if !block.text.is_empty() && !block.text.ends_with(&[' ', '\n'][..]) {
                block.push(" ", Emphasis::default());
            }
        }
    }

    /// Keeps unparsed input verbatim as its own block.
    fn literal(&mut self, remainder: &str) {
        self.flush();
        if remainder.trim().is_empty() {
            return;
        }
        let mut block = Block::new(BlockKind::Preformatted, self.quote_depth);
        block.push(remainder, Emphasis::default());
        self.current = Some(block);
        self.flush();
    }

    fn open(&mut self, kind: BlockKind) {
        self.flush();
        self.current = Some(Block::new(kind, self.quote_depth));
    }

    fn ensure_block(&mut self) -> &mut Block {
        let quote_depth = self.quote_depth;
        self.current
            .get_or_insert_with(|| Block::new(BlockKind::Paragraph, quote_depth))
    }

    fn flush(&mut self) {
        self.pending_space = false;
        let Some(mut block) = self.current.take() else {
            return;
        };
        let trimmed = if block.kind == BlockKind::Preformatted {
            block.text.trim_end_matches('\n').len()
        } else {
            block.text.trim_end().len()
        };
        block.truncate(trimmed);
        if block.kind == BlockKind::Preformatted && block.text.starts_with('\n') {
            block.text.remove(0);
            for span in &mut block.spans {
                span.range.start = span.range.start.saturating_sub(1);
                span.range.end = span.range.end.saturating_sub(1);
            }
            block.spans.retain(|span| span.range.start < span.range.end);
        }
        if !block.text.trim().is_empty() {
            self.blocks.push(block);
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

/// Position of one laid-out line.
#[derive(Debug, Clone, PartialEq)]
struct LaidLine {
    page: usize,
    block: usize,
    y: f32,
    indent: f32,
    range: Range<usize>,
}

#[derive(Debug, Clone)]
struct MarkupLayout {
    frame: PageFrame,
    settings: Arc<SettingsSnapshot>,
    lines: Vec<LaidLine>,
    index: Arc<PageIndex>,
}

impl MarkupLayout {
    fn build(blocks: &[Block], context: &RenderContext<'_>) -> Result<Self, EngineError> {
        let settings = Arc::clone(&context.settings);
        let frame = PageFrame::new(&context.geometry, &settings);
        let spacing = frame.line_height * BLOCK_SPACING_LINES;

        let mut lines = Vec::new();
        let mut spans = Vec::new();
        let mut page = 0usize;
        let mut page_start = BlockPosition::new(0, 0);
        let mut y = 0.0f32;

        for (number, block) in blocks.iter().enumerate() {
            if number % CHUNK_BLOCKS == 0 {
                context.cancel.check()?;
                context.report(number, blocks.len());
            }
            let scale = block.kind.scale();
            let line_height = frame.line_height * scale;
            let char_width = frame.char_width * scale;
            let base_indent = (block.quote_depth * QUOTE_INDENT_COLUMNS) as f32 * frame.char_width;

            if y > 0.0 {
                y += spacing;
            }
            let pieces = layout_block(block, &frame, &settings, base_indent, char_width);
            for (line_number, (range, hanging)) in pieces.into_iter().enumerate() {
                if y > 0.0 && y + line_height > frame.height + FIT_EPSILON {
                    let here = BlockPosition::new(number, line_number);
                    spans.push(PageSpan::Blocks {
                        start: page_start,
                        end: here,
                    });
                    page_start = here;
                    page += 1;
                    y = 0.0;
                }
                lines.push(LaidLine {
                    page,
                    block: number,
                    y,
                    indent: base_indent + hanging as f32 * char_width,
                    range,
                });
                y += line_height;
            }
        }
        context.cancel.check()?;
        context.report(blocks.len(), blocks.len());

        spans.push(PageSpan::Blocks {
            start: page_start,
            end: BlockPosition::new(blocks.len(), 0),
        });

        Ok(Self {
            frame,
            settings,
            lines,
            index: Arc::new(PageIndex::new(spans)),
        })
    }

    fn paint(
        &self,
        surface: &mut dyn DrawSurface,
        page: u32,
        document: &Document,
        blocks: &[Block],
    ) -> Result<(), EngineError> {
        let page_count = self.index.page_count();
        let slot = page_slot(page, page_count)?;
        self.frame
            .paint_decorations(surface, &self.settings, document, page, page_count);

        let first = self.lines.partition_point(|line| line.page < slot);
        for line in self.lines[first..].iter().take_while(|line| line.page == slot) {
            let Some(block) = blocks.get(line.block) else {
                continue;
            };
            let scale = block.kind.scale();
            let x = self.frame.left + line.indent;
            let y = self.frame.top + line.y;

            if block.kind == BlockKind::Rule {
                let mid = y + self.frame.line_height / 2.0;
                surface.draw(DisplayCommand::HorizontalRule {
                    start: Point::new(x, mid),
                    end: Point::new(self.frame.left + self.frame.width, mid),
                    stroke: Stroke {
                        width: 0.5,
                        color: Color::GRAY,
                    },
                });
                continue;
            }

            let mut column = 0;
            for span in &block.spans {
                let start = span.range.start.max(line.range.start);
                let end = span.range.end.min(line.range.end);
                if start >= end {
                    continue;
                }
                let piece = &block.text[start..end];
                if !piece.trim().is_empty() {
                    let style = RunStyle {
                        color: if span.emphasis.code {
                            CODE_COLOR
                        } else {
                            Rgb::BLACK
                        },
                        bold: span.emphasis.bold || matches!(block.kind, BlockKind::Heading(_)),
                        italic: span.emphasis.italic,
                    };
                    let advance = self.frame.char_width * scale;
                    surface.draw(glyph_run(
                        piece,
                        &self.frame.font_family,
                        self.frame.font_size * scale,
                        advance,
                        Point::new(x + column as f32 * advance, y),
                        style,
                    ));
                }
                column += display_width(piece);
            }
        }
        Ok(())
    }
}

/// Splits a block into line ranges of its text plus a hanging indent in
/// columns for each line.
fn layout_block(
    block: &Block,
    frame: &PageFrame,
    settings: &SettingsSnapshot,
    indent: f32,
    char_width: f32,
) -> Vec<(Range<usize>, usize)> {
    if block.kind == BlockKind::Rule {
        return vec![(0..0, 0)];
    }

    let columns = fit(frame.width - indent, char_width);
    let hanging = if block.kind == BlockKind::ListItem {
        block
            .text
            .find(' ')
            .map(|space| display_width(&block.text[..=space]))
            .unwrap_or(0)
            .min(columns.saturating_sub(1))
    } else {
        0
    };
    let preformatted = block.kind == BlockKind::Preformatted;

    let mut pieces = Vec::new();
    let mut offset = 0;
    for line in block.text.split('\n') {
        if preformatted && !settings.wrap {
            let visible = clip_to_columns(line, columns);
            pieces.push((offset..offset + visible.len(), 0));
        } else if hanging > 0 {
            let first = wrap_line(line, columns);
            let head = first.first().cloned().unwrap_or(0..0);
            pieces.push((offset + head.start..offset + head.end, 0));
            let rest_start = line[head.end..].len() - line[head.end..].trim_start().len() + head.end;
            let rest = &line[rest_start..];
            if !rest.is_empty() {
                for segment in wrap_line(rest, columns - hanging) {
                    pieces.push((
                        offset + rest_start + segment.start..offset + rest_start + segment.end,
                        hanging,
                    ));
                }
            }
        } else {
            for segment in wrap_line(line, columns) {
                pieces.push((offset + segment.start..offset + segment.end, 0));
            }
        }
        offset += line.len() + 1;
    }
    pieces
}

/// Lightweight flow layout over HTML, paginated by vertical offset.
#[derive(Debug)]
pub struct MarkupEngine {
    kind: ContentKind,
    document: Option<Document>,
    blocks: Option<Arc<Vec<Block>>>,
    layout: Option<MarkupLayout>,
}

impl MarkupEngine {
    pub fn new() -> Self {
        Self {
            kind: ContentKind::Markup,
            document: None,
            blocks: None,
            layout: None,
        }
    }

    /// Parsed blocks of the current document, if it has been rendered once.
    pub fn blocks(&self) -> Option<&[Block]> {
        self.blocks.as_deref().map(Vec::as_slice)
    }
}

impl Default for MarkupEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentTypeEngine for MarkupEngine {
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
        self.blocks = None;
        self.layout = None;
        self.document = Some(document);
        true
    }

    async fn render(&mut self, context: RenderContext<'_>) -> Result<u32, EngineError> {
        let document = self.document.as_ref().ok_or(EngineError::NoDocument)?;
        // Parsing only depends on the document, so it survives re-renders.
        let blocks = match &self.blocks {
            Some(blocks) => Arc::clone(blocks),
            None => Arc::new(parse_blocks(document.text())),
        };
        let layout = MarkupLayout::build(&blocks, &context)?;
        let page_count = layout.index.page_count();
        debug!(
            target: "engine",
            kind = %self.kind,
            source = document.source(),
            blocks = blocks.len(),
            page_count,
            "rendered"
        );
        self.blocks = Some(blocks);
        self.layout = Some(layout);
        Ok(page_count)
    }

    fn paint_page(&self, surface: &mut dyn DrawSurface, page: u32) -> Result<(), EngineError> {
        let document = self.document.as_ref().ok_or(EngineError::NoDocument)?;
        let layout = self.layout.as_ref().ok_or(EngineError::NotRendered)?;
        let blocks = self.blocks.as_deref().ok_or(EngineError::NotRendered)?;
        layout.paint(surface, page, document, blocks)
    }

    fn invalidate(&mut self) {
        self.layout = None;
    }

    fn page_count(&self) -> Option<u32> {
        self.layout.as_ref().map(|layout| layout.index.page_count())
    }

    fn page_index(&self) -> Option<Arc<PageIndex>> {
        self.layout.as_ref().map(|layout| Arc::clone(&layout.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::PrintDisplayList;
    use crate::geometry::{DeviceGeometry, Resolution};
    use printflow_settings::Margins;

    fn texts(blocks: &[Block]) -> Vec<&str> {
        blocks.iter().map(|block| block.text.as_str()).collect()
    }

    fn context<'a>(lines: f32, columns: f32) -> RenderContext<'a> {
        let mut settings = SettingsSnapshot::default();
        settings.margins = Margins::zero();
        settings.header.clear();
        settings.footer.clear();
        let geometry = DeviceGeometry::new(
            columns * settings.font.char_width(),
            lines * settings.font.line_height(),
            Resolution::uniform(72.0),
        );
        RenderContext::new(geometry, Arc::new(settings))
    }

    #[test]
    fn parses_block_structure() {
        let blocks = parse_blocks(
            "<html><head><title>skip me</title><style>p { color: red }</style></head>\
             <body><h1>Title</h1><p>First   paragraph\n  with <b>bold</b> text.</p>\
             <ul><li>one</li><li>two</li></ul><ol><li>first</li></ol><hr/>\
             <blockquote><p>quoted</p></blockquote>tail text</body></html>",
        );
        assert_eq!(
            texts(&blocks),
            vec![
                "Title",
                "First paragraph with bold text.",
                "• one",
                "• two",
                "1. first",
                "",
                "quoted",
                "tail text",
            ]
        );
        assert_eq!(blocks[0].kind, BlockKind::Heading(1));
        assert_eq!(blocks[5].kind, BlockKind::Rule);
        assert_eq!(blocks[6].quote_depth, 1);
        assert_eq!(blocks[7].quote_depth, 0);

        let bold = blocks[1]
            .spans
            .iter()
            .find(|span| span.emphasis.bold)
            .unwrap();
        assert_eq!(&blocks[1].text[bold.range.clone()], "bold");
    }

    #[test]
    fn preformatted_text_keeps_whitespace_and_breaks() {
        let blocks = parse_blocks("<pre>\nfn main() {\n    x();\n}\n</pre><p>a<br>b</p>");
        assert_eq!(texts(&blocks), vec!["fn main() {\n    x();\n}", "a\nb"]);
    }

    #[test]
    fn entities_resolve_or_stay_literal() {
        let blocks = parse_blocks("<p>a &amp; b&nbsp;c &bogus; &#65;</p>");
        assert_eq!(texts(&blocks), vec!["a & b\u{a0}c &bogus; A"]);
    }

    #[test]
    fn unknown_tags_are_transparent() {
        let blocks = parse_blocks("<p>see <widget>this</widget> <span>text</span></p>");
        assert_eq!(texts(&blocks), vec!["see this text"]);
    }

    #[test]
    fn plain_text_without_tags_is_one_paragraph() {
        let blocks = parse_blocks("just some words");
        assert_eq!(texts(&blocks), vec!["just some words"]);
    }

    #[tokio::test]
    async fn paginates_by_vertical_offset() {
        let html: String = (0..10).map(|n| format!("<p>paragraph {n}</p>")).collect();
        let mut engine = MarkupEngine::new();
        assert!(engine.set_document(Document::new("page.html", html)));

        // Each paragraph is 12pt plus 6pt spacing; 72pt pages hold 4 of them.
        let pages = engine.render(context(6.0, 40.0)).await.unwrap();
        assert_eq!(pages, 3);

        let index = engine.page_index().unwrap();
        assert_eq!(
            index.span(1),
            Some(&PageSpan::Blocks {
                start: BlockPosition::new(0, 0),
                end: BlockPosition::new(4, 0),
            })
        );
        assert_eq!(
            index.span(3),
            Some(&PageSpan::Blocks {
                start: BlockPosition::new(8, 0),
                end: BlockPosition::new(10, 0),
            })
        );

        let mut page = PrintDisplayList::default();
        engine.paint_page(&mut page, 2).unwrap();
        assert_eq!(
            page.texts(),
            vec!["paragraph 4", "paragraph 5", "paragraph 6", "paragraph 7"]
        );
        assert_eq!(page.glyph_runs().next().map(|run| run.position.y), Some(0.0));
    }

    #[tokio::test]
    async fn long_paragraph_splits_between_lines() {
        let words = vec!["word"; 30].join(" ");
        let mut engine = MarkupEngine::new();
        assert!(engine.set_document(Document::new("long.html", format!("<p>{words}</p>"))));

        // 20 columns fit four words per line: 8 lines over pages of 3.
        let pages = engine.render(context(3.0, 20.0)).await.unwrap();
        assert_eq!(pages, 3);
        let index = engine.page_index().unwrap();
        assert_eq!(
            index.span(2),
            Some(&PageSpan::Blocks {
                start: BlockPosition::new(0, 3),
                end: BlockPosition::new(0, 6),
            })
        );
    }

    #[tokio::test]
    async fn headings_scale_and_embolden() {
        let mut engine = MarkupEngine::new();
        assert!(engine.set_document(Document::new("h.html", "<h2>Big</h2><p>small</p>")));
        engine.render(context(20.0, 40.0)).await.unwrap();

        let mut page = PrintDisplayList::default();
        engine.paint_page(&mut page, 1).unwrap();
        let runs: Vec<_> = page.glyph_runs().collect();
        assert_eq!(runs[0].font_size_pt, 15.0);
        assert!(runs[0].bold);
        assert!(!runs[1].bold);
        // 18pt heading line plus 6pt spacing.
        assert_eq!(runs[1].position.y, 24.0);
    }

    #[tokio::test]
    async fn empty_markup_still_yields_a_page() {
        let mut engine = MarkupEngine::new();
        assert!(engine.set_document(Document::new("e.html", "<html><body></body></html>")));
        assert_eq!(engine.render(context(5.0, 40.0)).await.unwrap(), 1);
        let mut page = PrintDisplayList::default();
        engine.paint_page(&mut page, 1).unwrap();
        assert!(page.is_empty());
    }
}
