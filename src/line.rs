//! Logical line splitting and tab-aware column tracking.

/// Splits input into logical lines on `\n`, `\r`, or `\r\n`.
///
/// A trailing line without a terminator still yields a line. `U+0000` is
/// replaced with `U+FFFD` as lines are produced.
pub struct LineSource<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> LineSource<'a> {
    pub fn new(input: &'a str) -> Self {
        LineSource { input, pos: 0 }
    }

    pub fn next_line(&mut self) -> Option<String> {
        if self.pos >= self.input.len() {
            return None;
        }
        let rest = &self.input[self.pos..];
        let (line, consumed) = match rest.find(['\n', '\r']) {
            Some(idx) => {
                let mut end = idx + 1;
                if rest[idx..].starts_with("\r\n") {
                    end += 1;
                }
                (&rest[..idx], end)
            }
            None => (rest, rest.len()),
        };
        self.pos += consumed;
        Some(line.replace('\u{0}', "\u{FFFD}"))
    }
}

impl Iterator for LineSource<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.next_line()
    }
}

/// A line is blank iff it contains only spaces and tabs.
pub fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c == ' ' || c == '\t')
}

const TAB_STOP: usize = 4;

/// Saved scanner position, see [`Scanner::snapshot`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct Snapshot {
    offset: usize,
    column: usize,
    partially_consumed_tab: bool,
}

/// Cursor over one logical line with tab-aware columns (tab stop = 4).
///
/// Container markers may consume part of a tab; the remainder of that tab is
/// handed to leaf content as spaces, so tabs are never expanded in literal
/// output unless a marker split one.
pub struct Scanner {
    chars: Vec<char>,
    offset: usize,
    column: usize,
    partially_consumed_tab: bool,
    next_nonspace: usize,
    next_nonspace_column: usize,
    blank: bool,
    indent: usize,
}

impl Scanner {
    pub fn new(line: &str) -> Self {
        let mut s = Scanner {
            chars: line.chars().collect(),
            offset: 0,
            column: 0,
            partially_consumed_tab: false,
            next_nonspace: 0,
            next_nonspace_column: 0,
            blank: false,
            indent: 0,
        };
        s.find_next_nonspace();
        s
    }

    /// Recompute the position/column of the next non-space character and the
    /// indentation relative to the current offset.
    pub fn find_next_nonspace(&mut self) {
        let mut i = self.offset;
        let mut col = self.column;
        loop {
            match self.chars.get(i) {
                Some(' ') => {
                    i += 1;
                    col += 1;
                }
                Some('\t') => {
                    i += 1;
                    col += TAB_STOP - (col % TAB_STOP);
                }
                _ => break,
            }
        }
        self.blank = i >= self.chars.len();
        self.next_nonspace = i;
        self.next_nonspace_column = col;
        self.indent = col - self.column;
    }

    pub fn advance_next_nonspace(&mut self) {
        self.offset = self.next_nonspace;
        self.column = self.next_nonspace_column;
        self.partially_consumed_tab = false;
    }

    /// Advance by `count` characters, or by `count` columns when `columns` is
    /// true (in which case a tab may be consumed partially).
    pub fn advance_offset(&mut self, mut count: usize, columns: bool) {
        while count > 0 {
            match self.chars.get(self.offset) {
                Some('\t') => {
                    let chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
                    if columns {
                        self.partially_consumed_tab = chars_to_tab > count;
                        let advance = chars_to_tab.min(count);
                        self.column += advance;
                        if !self.partially_consumed_tab {
                            self.offset += 1;
                        }
                        count -= advance;
                    } else {
                        self.partially_consumed_tab = false;
                        self.column += chars_to_tab;
                        self.offset += 1;
                        count -= 1;
                    }
                }
                Some(_) => {
                    self.partially_consumed_tab = false;
                    self.offset += 1;
                    self.column += 1;
                    count -= 1;
                }
                None => break,
            }
        }
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    /// Capture the current position so a speculative scan can back out.
    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            offset: self.offset,
            column: self.column,
            partially_consumed_tab: self.partially_consumed_tab,
        }
    }

    pub(crate) fn restore(&mut self, snap: Snapshot) {
        self.offset = snap.offset;
        self.column = snap.column;
        self.partially_consumed_tab = snap.partially_consumed_tab;
    }

    pub fn peek_at(&self, pos: usize) -> Option<char> {
        self.chars.get(pos).copied()
    }

    pub fn char_at_nonspace(&self) -> Option<char> {
        self.chars.get(self.next_nonspace).copied()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn next_nonspace(&self) -> usize {
        self.next_nonspace
    }

    pub fn next_nonspace_column(&self) -> usize {
        self.next_nonspace_column
    }

    pub fn blank(&self) -> bool {
        self.blank
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    /// Indentation of 4+ columns means indented code.
    pub fn indented(&self) -> bool {
        self.indent >= 4
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Characters from `from` to the end of the line.
    pub fn slice_from(&self, from: usize) -> &[char] {
        &self.chars[from.min(self.chars.len())..]
    }

    /// Characters from the next non-space to the end of the line.
    pub fn rest(&self) -> &[char] {
        &self.chars[self.next_nonspace..]
    }

    /// The remainder of the line from the current offset, as leaf content.
    /// A partially consumed tab contributes its remaining columns as spaces.
    pub fn remainder(&self) -> String {
        let mut out = String::new();
        let mut start = self.offset;
        if self.partially_consumed_tab {
            start += 1;
            let chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
            for _ in 0..chars_to_tab {
                out.push(' ');
            }
        }
        out.extend(&self.chars[start.min(self.chars.len())..]);
        out
    }
}
