//! services/api/src/adapters/pdf_layout.rs
//!
//! Page layout for the PDF report, kept separate from drawing: `layout` decides
//! where every line goes and where pages break, `stamp_page_numbers` adds the
//! footers once the page count is known. Nothing here touches `lopdf`.

/// A4 in PDF points.
pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    Heading,
    Body,
    Caption,
}

impl TextStyle {
    pub fn font_size(&self) -> f32 {
        match self {
            TextStyle::Title => 20.0,
            TextStyle::Heading => 14.0,
            TextStyle::Body => 11.0,
            TextStyle::Caption => 9.0,
        }
    }

    /// Vertical advance after a line of this style.
    pub fn leading(&self) -> f32 {
        self.font_size() * 1.4
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, TextStyle::Title | TextStyle::Heading)
    }
}

/// Advance width of a Helvetica glyph in thousandths of an em.
fn glyph_width(c: char) -> u16 {
    match c {
        ' ' | '.' | ',' | ':' | ';' | '!' | '/' | 'f' | 't' | 'I' | '[' | ']' | '|' => 278,
        'i' | 'j' | 'l' | '\'' => 222,
        '(' | ')' | '-' | 'r' | '`' => 333,
        '"' => 355,
        'c' | 'k' | 's' | 'v' | 'x' | 'y' | 'z' | 'J' => 500,
        'L' => 556,
        'F' | 'T' | 'Z' => 611,
        'A' | 'B' | 'E' | 'K' | 'P' | 'S' | 'V' | 'X' | 'Y' | '&' => 667,
        'w' | 'C' | 'D' | 'H' | 'N' | 'R' | 'U' => 722,
        'G' | 'O' | 'Q' => 778,
        'm' | 'M' => 833,
        '%' => 889,
        'W' => 944,
        '@' => 1015,
        '\u{2026}' | '\u{2014}' | '\u{2030}' => 1000,
        _ => 556,
    }
}

/// Rendered width of `text` in points. Bold glyphs are taken as 10% wider.
pub fn text_width(text: &str, style: TextStyle) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(glyph_width(c))).sum();
    let scale = if style.is_bold() { 1.1 } else { 1.0 };
    units as f32 * style.font_size() / 1000.0 * scale
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub style: TextStyle,
    pub indent: f32,
}

impl Line {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        Self { text: text.into(), style, indent: 0.0 }
    }

    pub fn indented(mut self, indent: f32) -> Self {
        self.indent = indent;
        self
    }
}

/// A logical unit that should start together: a section heading with its
/// first rows, or one insight with its body.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub lines: Vec<Line>,
    pub space_before: f32,
}

impl Block {
    pub fn new(space_before: f32) -> Self {
        Self { lines: Vec::new(), space_before }
    }

    pub fn line(mut self, line: Line) -> Self {
        self.lines.push(line);
        self
    }

    pub fn lines(mut self, lines: impl IntoIterator<Item = Line>) -> Self {
        self.lines.extend(lines);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    /// A block never starts below this y position; it moves to a fresh page.
    pub break_threshold: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            margin: 50.0,
            break_threshold: 150.0,
        }
    }
}

impl PageGeometry {
    fn top(&self) -> f32 {
        self.height - self.margin
    }

    fn bottom(&self) -> f32 {
        self.margin
    }

    /// Horizontal space between the margins, less `indent`.
    pub fn line_width(&self, indent: f32) -> f32 {
        self.width - 2.0 * self.margin - indent
    }
}

/// A line with its final baseline position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub style: TextStyle,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub lines: Vec<PlacedLine>,
}

/// Places blocks top to bottom. A block that would start past the break
/// threshold starts a new page; a block longer than the remaining space
/// continues onto the next page line by line. Always yields at least one page.
pub fn layout(blocks: &[Block], geometry: &PageGeometry) -> Vec<Page> {
    let mut pages = vec![Page::default()];
    let mut y = geometry.top();

    for block in blocks {
        let on_fresh_page = pages.last().is_some_and(|page| page.lines.is_empty());
        if !on_fresh_page {
            y -= block.space_before;
            if y < geometry.break_threshold {
                pages.push(Page::default());
                y = geometry.top();
            }
        }

        for line in &block.lines {
            let advance = line.style.leading();
            if y - advance < geometry.bottom() {
                pages.push(Page::default());
                y = geometry.top();
            }
            y -= advance;
            if let Some(page) = pages.last_mut() {
                page.lines.push(PlacedLine {
                    text: line.text.clone(),
                    style: line.style,
                    x: geometry.margin + line.indent,
                    y,
                });
            }
        }
    }
    pages
}

/// Adds a centred "Page i of n" caption inside the bottom margin of every page.
pub fn stamp_page_numbers(pages: &mut [Page], geometry: &PageGeometry) {
    let total = pages.len();
    for (index, page) in pages.iter_mut().enumerate() {
        let text = format!("Page {} of {}", index + 1, total);
        let approx_width = text.len() as f32 * TextStyle::Caption.font_size() * 0.5;
        page.lines.push(PlacedLine {
            x: (geometry.width - approx_width) / 2.0,
            y: geometry.margin / 2.0,
            style: TextStyle::Caption,
            text,
        });
    }
}

/// Greedy word wrap to `max_width` points. Words wider than a line are
/// hard-split; every piece holds at least one char.
pub fn wrap(text: &str, style: TextStyle, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word = word.to_string();
            while text_width(&word, style) > max_width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let split = fitting_prefix(&word, style, max_width);
                let rest = word.split_off(split);
                lines.push(word);
                word = rest;
            }
            if current.is_empty() {
                current = word;
                continue;
            }
            let candidate = format!("{} {}", current, word);
            if text_width(&candidate, style) > max_width {
                lines.push(std::mem::replace(&mut current, word));
            } else {
                current = candidate;
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }
    lines
}

/// Byte length of the longest prefix of `word` that fits, never less than one char.
fn fitting_prefix(word: &str, style: TextStyle, max_width: f32) -> usize {
    let mut end = 0;
    for (index, c) in word.char_indices() {
        let next = index + c.len_utf8();
        if end > 0 && text_width(&word[..next], style) > max_width {
            break;
        }
        end = next;
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body_block(lines: usize) -> Block {
        Block::new(12.0).lines((0..lines).map(|i| Line::new(format!("row {}", i), TextStyle::Body)))
    }

    #[test]
    fn short_documents_fit_on_one_page() {
        let pages = layout(&[body_block(3), body_block(3)], &PageGeometry::default());
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].lines.len(), 6);
    }

    #[test]
    fn empty_input_still_has_a_page() {
        assert_eq!(layout(&[], &PageGeometry::default()).len(), 1);
    }

    #[test]
    fn a_block_past_the_threshold_starts_a_new_page() {
        let geometry = PageGeometry::default();
        // Fill the page until the cursor sits just below the threshold.
        let leading = TextStyle::Body.leading();
        let rows = ((geometry.top() - geometry.break_threshold) / leading) as usize + 1;
        let pages = layout(
            &[body_block(rows), Block::new(12.0).line(Line::new("Heading", TextStyle::Heading))],
            &geometry,
        );
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].lines[0].text, "Heading");
        assert_eq!(pages[1].lines[0].y, geometry.top() - TextStyle::Heading.leading());
    }

    #[test]
    fn long_blocks_flow_across_pages_without_crossing_the_margin() {
        let geometry = PageGeometry::default();
        let pages = layout(&[body_block(120)], &geometry);
        assert!(pages.len() >= 3);
        let placed: usize = pages.iter().map(|p| p.lines.len()).sum();
        assert_eq!(placed, 120);
        assert!(pages
            .iter()
            .flat_map(|p| &p.lines)
            .all(|line| line.y >= geometry.margin));
    }

    #[test]
    fn footers_are_stamped_on_every_page() {
        let geometry = PageGeometry::default();
        let mut pages = layout(&[body_block(120)], &geometry);
        let total = pages.len();
        stamp_page_numbers(&mut pages, &geometry);
        for (i, page) in pages.iter().enumerate() {
            let footer = page.lines.last().unwrap();
            assert_eq!(footer.text, format!("Page {} of {}", i + 1, total));
            assert!(footer.y < geometry.margin);
        }
    }

    #[test]
    fn wrap_respects_the_width() {
        let width = 60.0;
        let text = "the quick brown fox jumps over the lazy dog";
        let lines = wrap(text, TextStyle::Body, width);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|line| text_width(line, TextStyle::Body) <= width));
        assert_eq!(lines.join(" "), text);
        assert!(wrap("", TextStyle::Body, width).is_empty());
    }

    #[test]
    fn capitals_wrap_sooner_than_lower_case() {
        let geometry = PageGeometry::default();
        let width = geometry.line_width(20.0);
        let shout = "WE RECOMMEND FOLLOWING UP WITH EVERY COMPANY WHO HAS NOT RESPONDED WITHIN TWO WEEKS";
        let lines = wrap(shout, TextStyle::Body, width);
        assert!(lines.iter().all(|line| text_width(line, TextStyle::Body) <= width));
        assert!(lines.len() > wrap(&shout.to_lowercase(), TextStyle::Body, width).len());
    }

    #[test]
    fn long_words_are_split_by_width() {
        // Eleven-point M is 9.163pt wide, so three fit in 30pt.
        let lines = wrap("MMMMMMMMMM", TextStyle::Body, 30.0);
        assert_eq!(lines, vec!["MMM", "MMM", "MMM", "M"]);
    }
}
