//! Phase 1: building the block tree line by line.
//!
//! Each line is matched against the path of open blocks from the document
//! down to the tip. Blocks that stop matching are finalized; new block
//! starts may then open further blocks; whatever text remains is added to
//! the deepest open leaf. Leaf raw text is parsed into inlines only after
//! the whole tree is built, so every reference definition is known first.

use crate::ast::{ListKind, MAX_DEPTH, Node};
use crate::entities::unescape_string;
use crate::extension::{ContinueResult, Pipeline, priority};
use crate::inline::{parse_inlines, scan_html_inline};
use crate::line::{LineSource, Scanner};
use crate::refdef::{RefMap, parse_reference};

pub(crate) type BlockId = usize;

#[derive(Debug, Clone, PartialEq)]
enum BlockKind {
    Document,
    BlockQuote,
    List {
        kind: ListKind,
        tight: bool,
    },
    Item {
        marker_offset: usize,
        padding: usize,
    },
    Paragraph,
    AtxHeading {
        level: u8,
    },
    SetextHeading {
        level: u8,
    },
    IndentedCode,
    FencedCode {
        ch: char,
        len: usize,
        offset: usize,
    },
    HtmlBlock {
        html_type: u8,
    },
    ThematicBreak,
    Custom {
        name: String,
        attributes: Vec<(String, String)>,
        container: bool,
    },
}

impl BlockKind {
    fn can_contain(&self, child: &BlockKind) -> bool {
        match self {
            BlockKind::Document | BlockKind::BlockQuote | BlockKind::Item { .. } => {
                !matches!(child, BlockKind::Item { .. })
            }
            BlockKind::Custom {
                container: true, ..
            } => !matches!(child, BlockKind::Item { .. }),
            BlockKind::List { .. } => matches!(child, BlockKind::Item { .. }),
            _ => false,
        }
    }

    /// Leaf blocks that accumulate raw text lines.
    fn accepts_lines(&self) -> bool {
        matches!(
            self,
            BlockKind::Paragraph
                | BlockKind::IndentedCode
                | BlockKind::FencedCode { .. }
                | BlockKind::HtmlBlock { .. }
                | BlockKind::Custom {
                    container: false,
                    ..
                }
        )
    }

    fn name(&self) -> &str {
        match self {
            BlockKind::Document => "document",
            BlockKind::BlockQuote => "block_quote",
            BlockKind::List { .. } => "list",
            BlockKind::Item { .. } => "item",
            BlockKind::Paragraph => "paragraph",
            BlockKind::AtxHeading { .. } | BlockKind::SetextHeading { .. } => "heading",
            BlockKind::IndentedCode | BlockKind::FencedCode { .. } => "code_block",
            BlockKind::HtmlBlock { .. } => "html_block",
            BlockKind::ThematicBreak => "thematic_break",
            BlockKind::Custom { name, .. } => name,
        }
    }
}

#[derive(Debug)]
struct BlockData {
    kind: BlockKind,
    parent: Option<BlockId>,
    children: Vec<BlockId>,
    open: bool,
    last_line_blank: bool,
    removed: bool,
    /// Raw text lines for leaves; cooked into the final literal at finalize.
    content: String,
    /// Fence info string, set when a fenced code block is finalized.
    info: String,
    start_line: usize,
}

impl BlockData {
    fn new(kind: BlockKind, parent: Option<BlockId>, start_line: usize) -> Self {
        BlockData {
            kind,
            parent,
            children: Vec::new(),
            open: true,
            last_line_blank: false,
            removed: false,
            content: String::new(),
            info: String::new(),
            start_line,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartOutcome {
    None,
    Container,
    Leaf,
}

pub(crate) struct Builder<'p> {
    pipeline: &'p Pipeline,
    arena: Vec<BlockData>,
    doc: BlockId,
    tip: BlockId,
    oldtip: BlockId,
    last_matched: BlockId,
    all_closed: bool,
    refmap: RefMap,
    line_number: usize,
}

impl<'p> Builder<'p> {
    pub(crate) fn new(pipeline: &'p Pipeline) -> Self {
        let arena = vec![BlockData::new(BlockKind::Document, None, 1)];
        Builder {
            pipeline,
            arena,
            doc: 0,
            tip: 0,
            oldtip: 0,
            last_matched: 0,
            all_closed: true,
            refmap: RefMap::new(),
            line_number: 0,
        }
    }

    pub(crate) fn run(mut self, input: &str) -> Node {
        for line in LineSource::new(input) {
            self.incorporate_line(&line);
        }
        while self.tip != self.doc {
            self.finalize(self.tip);
        }
        self.finalize(self.doc);
        self.build_node(self.doc)
    }

    fn incorporate_line(&mut self, line: &str) {
        self.line_number += 1;
        self.oldtip = self.tip;
        let mut scanner = Scanner::new(line);

        // Match the line against each open block on the path from the
        // document to the tip, consuming container markers as we go.
        let mut container = self.doc;
        loop {
            let Some(&last) = self.arena[container].children.last() else {
                break;
            };
            if !self.arena[last].open {
                break;
            }
            container = last;
            scanner.find_next_nonspace();
            match self.check_continue(last, &mut scanner) {
                ContinueResult::Matched => {}
                ContinueResult::NotMatched => {
                    container = self.arena[container].parent.unwrap_or(self.doc);
                    break;
                }
                // The line closed the block (e.g. a closing code fence)
                ContinueResult::MatchedAndDone => return,
            }
        }

        self.all_closed = container == self.oldtip;
        self.last_matched = container;

        let mut matched_leaf = !matches!(self.arena[container].kind, BlockKind::Paragraph)
            && self.arena[container].kind.accepts_lines();

        // Try to open new blocks until we hit a leaf
        while !matched_leaf {
            scanner.find_next_nonspace();
            match self.try_block_starts(&mut scanner, container) {
                StartOutcome::Container => container = self.tip,
                StartOutcome::Leaf => {
                    container = self.tip;
                    matched_leaf = true;
                }
                StartOutcome::None => {
                    scanner.advance_next_nonspace();
                    break;
                }
            }
        }

        // Lazy continuation: an unmatched paragraph still takes the line
        if !self.all_closed
            && !scanner.blank()
            && matches!(self.arena[self.tip].kind, BlockKind::Paragraph)
        {
            self.add_line(&scanner);
            return;
        }
        self.close_unmatched();

        if scanner.blank()
            && let Some(&last) = self.arena[container].children.last()
        {
            self.arena[last].last_line_blank = true;
        }

        // A blank line counts for list tightness unless it sits inside a
        // block quote or fenced code, or directly after a list marker.
        let last_line_blank = scanner.blank()
            && !matches!(
                self.arena[container].kind,
                BlockKind::BlockQuote | BlockKind::FencedCode { .. }
            )
            && !(matches!(self.arena[container].kind, BlockKind::Item { .. })
                && self.arena[container].children.is_empty()
                && self.arena[container].start_line == self.line_number);
        let mut cont = Some(container);
        while let Some(c) = cont {
            self.arena[c].last_line_blank = last_line_blank;
            cont = self.arena[c].parent;
        }

        if self.arena[container].kind.accepts_lines() {
            self.add_line(&scanner);
            if let BlockKind::HtmlBlock { html_type } = self.arena[container].kind
                && (1..=5).contains(&html_type)
                && html_end_condition(html_type, &scanner.remainder())
            {
                self.finalize(container);
            }
        } else if scanner.offset() < scanner.len() && !scanner.blank() {
            self.add_child(BlockKind::Paragraph);
            scanner.advance_next_nonspace();
            self.add_line(&scanner);
        }
    }

    fn check_continue(&mut self, id: BlockId, scanner: &mut Scanner) -> ContinueResult {
        match self.arena[id].kind.clone() {
            BlockKind::Document | BlockKind::List { .. } => ContinueResult::Matched,
            BlockKind::BlockQuote => {
                if !scanner.indented() && scanner.char_at_nonspace() == Some('>') {
                    scanner.advance_next_nonspace();
                    scanner.advance_offset(1, false);
                    if matches!(scanner.peek(), Some(' ' | '\t')) {
                        scanner.advance_offset(1, true);
                    }
                    ContinueResult::Matched
                } else {
                    ContinueResult::NotMatched
                }
            }
            BlockKind::Item {
                marker_offset,
                padding,
            } => {
                if scanner.blank() {
                    if self.arena[id].children.is_empty() {
                        // Blank line directly after an empty item
                        ContinueResult::NotMatched
                    } else {
                        scanner.advance_next_nonspace();
                        ContinueResult::Matched
                    }
                } else if scanner.indent() >= marker_offset + padding {
                    scanner.advance_offset(marker_offset + padding, true);
                    ContinueResult::Matched
                } else {
                    ContinueResult::NotMatched
                }
            }
            BlockKind::Paragraph => {
                if scanner.blank() {
                    ContinueResult::NotMatched
                } else {
                    ContinueResult::Matched
                }
            }
            BlockKind::AtxHeading { .. }
            | BlockKind::SetextHeading { .. }
            | BlockKind::ThematicBreak => ContinueResult::NotMatched,
            BlockKind::IndentedCode => {
                if scanner.indent() >= 4 {
                    scanner.advance_offset(4, true);
                    ContinueResult::Matched
                } else if scanner.blank() {
                    scanner.advance_next_nonspace();
                    ContinueResult::Matched
                } else {
                    ContinueResult::NotMatched
                }
            }
            BlockKind::FencedCode { ch, len, offset } => {
                if !scanner.indented() && scanner.char_at_nonspace() == Some(ch) {
                    let rest = scanner.rest();
                    let mut n = 0;
                    while rest.get(n) == Some(&ch) {
                        n += 1;
                    }
                    if n >= len && rest[n..].iter().all(|c| matches!(*c, ' ' | '\t')) {
                        self.finalize(id);
                        return ContinueResult::MatchedAndDone;
                    }
                }
                // Skip up to the opening fence's indentation
                let mut i = offset;
                while i > 0 && matches!(scanner.peek(), Some(' ' | '\t')) {
                    scanner.advance_offset(1, true);
                    i -= 1;
                }
                ContinueResult::Matched
            }
            BlockKind::HtmlBlock { html_type } => {
                if scanner.blank() && (html_type == 6 || html_type == 7) {
                    ContinueResult::NotMatched
                } else {
                    ContinueResult::Matched
                }
            }
            BlockKind::Custom {
                name, container, ..
            } => match self.pipeline.continue_rule(&name) {
                Some(rule) => match rule.try_continue(scanner) {
                    ContinueResult::MatchedAndDone => {
                        self.finalize(id);
                        ContinueResult::MatchedAndDone
                    }
                    other => other,
                },
                // Without a continuation rule, leaves scoop lines until the
                // next blank line and containers stay open
                None => {
                    if scanner.blank() && !container {
                        ContinueResult::NotMatched
                    } else {
                        ContinueResult::Matched
                    }
                }
            },
        }
    }

    fn try_block_starts(&mut self, scanner: &mut Scanner, container: BlockId) -> StartOutcome {
        let pipeline = self.pipeline;
        let builtins: [(i32, fn(&mut Self, &mut Scanner, BlockId) -> StartOutcome); 8] = [
            (priority::BLOCK_QUOTE, Self::start_block_quote),
            (priority::ATX_HEADING, Self::start_atx_heading),
            (priority::FENCED_CODE, Self::start_fenced_code),
            (priority::HTML_BLOCK, Self::start_html_block),
            (priority::SETEXT_HEADING, Self::start_setext_heading),
            (priority::THEMATIC_BREAK, Self::start_thematic_break),
            (priority::LIST_ITEM, Self::start_list_item),
            (priority::INDENTED_CODE, Self::start_indented_code),
        ];

        let mut ext = pipeline.block_starts.iter().peekable();
        for (prio, builtin) in builtins {
            while let Some(rule) = ext.next_if(|r| r.priority() < prio) {
                let out = self.try_extension_start(rule.as_ref(), scanner, container);
                if out != StartOutcome::None {
                    return out;
                }
            }
            let out = builtin(self, scanner, container);
            if out != StartOutcome::None {
                return out;
            }
        }
        for rule in ext {
            let out = self.try_extension_start(rule.as_ref(), scanner, container);
            if out != StartOutcome::None {
                return out;
            }
        }
        StartOutcome::None
    }

    fn try_extension_start(
        &mut self,
        rule: &dyn crate::extension::BlockStartRule,
        scanner: &mut Scanner,
        container: BlockId,
    ) -> StartOutcome {
        if self.depth_of(self.tip) >= MAX_DEPTH {
            return StartOutcome::None;
        }
        let in_paragraph = matches!(self.arena[container].kind, BlockKind::Paragraph);
        let snap = scanner.snapshot();
        match rule.try_start(scanner, in_paragraph) {
            Some(started) => {
                self.close_unmatched();
                self.add_child(BlockKind::Custom {
                    name: started.name,
                    attributes: started.attributes,
                    container: started.container,
                });
                if started.container {
                    StartOutcome::Container
                } else {
                    StartOutcome::Leaf
                }
            }
            None => {
                scanner.restore(snap);
                StartOutcome::None
            }
        }
    }

    /// Nesting depth of a block, counted from the document root. Container
    /// starts refuse to open past [`MAX_DEPTH`]; their markers read as text.
    fn depth_of(&self, mut id: BlockId) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.arena[id].parent {
            depth += 1;
            id = parent;
        }
        depth
    }

    fn start_block_quote(&mut self, scanner: &mut Scanner, _container: BlockId) -> StartOutcome {
        if scanner.indented() || scanner.char_at_nonspace() != Some('>') {
            return StartOutcome::None;
        }
        if self.depth_of(self.tip) >= MAX_DEPTH {
            return StartOutcome::None;
        }
        scanner.advance_next_nonspace();
        scanner.advance_offset(1, false);
        if matches!(scanner.peek(), Some(' ' | '\t')) {
            scanner.advance_offset(1, true);
        }
        self.close_unmatched();
        self.add_child(BlockKind::BlockQuote);
        StartOutcome::Container
    }

    fn start_atx_heading(&mut self, scanner: &mut Scanner, _container: BlockId) -> StartOutcome {
        if scanner.indented() {
            return StartOutcome::None;
        }
        let rest = scanner.rest();
        let mut level = 0;
        while rest.get(level) == Some(&'#') {
            level += 1;
        }
        if level == 0 || level > 6 {
            return StartOutcome::None;
        }
        // The marker needs a space, tab, or line end after it
        if !matches!(rest.get(level).copied(), None | Some(' ') | Some('\t')) {
            return StartOutcome::None;
        }
        scanner.advance_next_nonspace();
        scanner.advance_offset(level, false);
        while matches!(scanner.peek(), Some(' ' | '\t')) {
            scanner.advance_offset(1, false);
        }
        self.close_unmatched();
        let id = self.add_child(BlockKind::AtxHeading { level: level as u8 });
        let text: String = scanner.slice_from(scanner.offset()).iter().collect();
        self.arena[id].content = strip_atx_closing(&text);
        let remaining = scanner.len() - scanner.offset();
        scanner.advance_offset(remaining, false);
        StartOutcome::Leaf
    }

    fn start_fenced_code(&mut self, scanner: &mut Scanner, _container: BlockId) -> StartOutcome {
        if scanner.indented() {
            return StartOutcome::None;
        }
        let rest = scanner.rest();
        let ch = match rest.first().copied() {
            Some(c @ ('`' | '~')) => c,
            _ => return StartOutcome::None,
        };
        let mut len = 0;
        while rest.get(len) == Some(&ch) {
            len += 1;
        }
        if len < 3 {
            return StartOutcome::None;
        }
        // A backtick fence's info string may not contain backticks
        if ch == '`' && rest[len..].contains(&'`') {
            return StartOutcome::None;
        }
        let offset = scanner.indent();
        self.close_unmatched();
        self.add_child(BlockKind::FencedCode { ch, len, offset });
        scanner.advance_next_nonspace();
        scanner.advance_offset(len, false);
        StartOutcome::Leaf
    }

    fn start_html_block(&mut self, scanner: &mut Scanner, container: BlockId) -> StartOutcome {
        if scanner.indented() || scanner.char_at_nonspace() != Some('<') {
            return StartOutcome::None;
        }
        let in_paragraph = matches!(self.arena[container].kind, BlockKind::Paragraph);
        let Some(html_type) = html_block_type(scanner.rest(), in_paragraph) else {
            return StartOutcome::None;
        };
        self.close_unmatched();
        self.add_child(BlockKind::HtmlBlock { html_type });
        // The whole line, leading indentation included, becomes content
        StartOutcome::Leaf
    }

    fn start_setext_heading(&mut self, scanner: &mut Scanner, container: BlockId) -> StartOutcome {
        if scanner.indented() || !matches!(self.arena[container].kind, BlockKind::Paragraph) {
            return StartOutcome::None;
        }
        let rest = scanner.rest();
        let ch = match rest.first().copied() {
            Some(c @ ('=' | '-')) => c,
            _ => return StartOutcome::None,
        };
        let mut i = 0;
        while rest.get(i) == Some(&ch) {
            i += 1;
        }
        if !rest[i..].iter().all(|c| matches!(*c, ' ' | '\t')) {
            return StartOutcome::None;
        }
        self.close_unmatched();
        // Reference definitions at the front of the paragraph still count
        let content = std::mem::take(&mut self.arena[container].content);
        let remaining = self.extract_references(&content);
        if remaining.is_empty() {
            // The paragraph held only definitions; the line is not a heading
            return StartOutcome::None;
        }
        self.arena[container].content = remaining;
        self.arena[container].kind = BlockKind::SetextHeading {
            level: if ch == '=' { 1 } else { 2 },
        };
        let rest_len = scanner.len() - scanner.offset();
        scanner.advance_offset(rest_len, false);
        StartOutcome::Leaf
    }

    fn start_thematic_break(&mut self, scanner: &mut Scanner, _container: BlockId) -> StartOutcome {
        if scanner.indented() {
            return StartOutcome::None;
        }
        let rest = scanner.rest();
        let ch = match rest.first().copied() {
            Some(c @ ('*' | '-' | '_')) => c,
            _ => return StartOutcome::None,
        };
        let mut count = 0;
        for &c in rest {
            if c == ch {
                count += 1;
            } else if !matches!(c, ' ' | '\t') {
                return StartOutcome::None;
            }
        }
        if count < 3 {
            return StartOutcome::None;
        }
        self.close_unmatched();
        self.add_child(BlockKind::ThematicBreak);
        let rest_len = scanner.len() - scanner.offset();
        scanner.advance_offset(rest_len, false);
        StartOutcome::Leaf
    }

    fn start_list_item(&mut self, scanner: &mut Scanner, container: BlockId) -> StartOutcome {
        if scanner.indented() && !matches!(self.arena[container].kind, BlockKind::List { .. }) {
            return StartOutcome::None;
        }
        if self.depth_of(self.tip) >= MAX_DEPTH {
            return StartOutcome::None;
        }
        let in_paragraph = matches!(self.arena[container].kind, BlockKind::Paragraph);
        let Some((kind, marker_offset, padding)) = parse_list_marker(scanner, in_paragraph) else {
            return StartOutcome::None;
        };
        self.close_unmatched();
        // Open a new list unless the tip is a compatible one
        let needs_list = match &self.arena[self.tip].kind {
            BlockKind::List { kind: existing, .. } => !existing.matches(&kind),
            _ => true,
        };
        if needs_list {
            self.add_child(BlockKind::List { kind, tight: true });
        }
        self.add_child(BlockKind::Item {
            marker_offset,
            padding,
        });
        StartOutcome::Container
    }

    fn start_indented_code(&mut self, scanner: &mut Scanner, _container: BlockId) -> StartOutcome {
        if !scanner.indented()
            || matches!(self.arena[self.tip].kind, BlockKind::Paragraph)
            || scanner.blank()
        {
            return StartOutcome::None;
        }
        scanner.advance_offset(4, true);
        self.close_unmatched();
        self.add_child(BlockKind::IndentedCode);
        StartOutcome::Leaf
    }

    /// Append a new block as a child of the tip, finalizing blocks that
    /// cannot contain it first.
    fn add_child(&mut self, kind: BlockKind) -> BlockId {
        while !self.arena[self.tip].kind.can_contain(&kind) {
            self.finalize(self.tip);
        }
        tracing::trace!(line = self.line_number, kind = kind.name(), "open block");
        let id = self.arena.len();
        self.arena
            .push(BlockData::new(kind, Some(self.tip), self.line_number));
        self.arena[self.tip].children.push(id);
        self.tip = id;
        id
    }

    fn add_line(&mut self, scanner: &Scanner) {
        let text = scanner.remainder();
        let block = &mut self.arena[self.tip];
        block.content.push_str(&text);
        block.content.push('\n');
    }

    fn close_unmatched(&mut self) {
        if self.all_closed {
            return;
        }
        let mut t = self.oldtip;
        while t != self.last_matched {
            let parent = self.arena[t].parent;
            self.finalize(t);
            match parent {
                Some(p) => t = p,
                None => break,
            }
        }
        self.all_closed = true;
    }

    fn finalize(&mut self, id: BlockId) {
        tracing::trace!(
            line = self.line_number,
            kind = self.arena[id].kind.name(),
            "close block"
        );
        self.arena[id].open = false;
        let parent = self.arena[id].parent;
        match self.arena[id].kind {
            BlockKind::Paragraph => self.finalize_paragraph(id),
            BlockKind::IndentedCode => {
                let content = std::mem::take(&mut self.arena[id].content);
                self.arena[id].content = trim_trailing_blank_lines(&content, true);
            }
            BlockKind::FencedCode { .. } => self.finalize_fenced_code(id),
            BlockKind::HtmlBlock { .. } => {
                let content = std::mem::take(&mut self.arena[id].content);
                self.arena[id].content = trim_trailing_blank_lines(&content, false);
            }
            BlockKind::List { .. } => self.finalize_list(id),
            _ => {}
        }
        self.tip = parent.unwrap_or(id);
    }

    /// Strip leading reference definitions from raw paragraph text, recording
    /// them, and return what is left.
    fn extract_references(&mut self, content: &str) -> String {
        let chars: Vec<char> = content.chars().collect();
        let mut start = 0;
        while chars.get(start) == Some(&'[') {
            let consumed = parse_reference(&chars[start..], &mut self.refmap);
            if consumed == 0 {
                break;
            }
            start += consumed;
        }
        chars[start..].iter().collect()
    }

    fn finalize_paragraph(&mut self, id: BlockId) {
        let content = std::mem::take(&mut self.arena[id].content);
        let remaining = self.extract_references(&content);
        if remaining.chars().all(char::is_whitespace) {
            // Nothing but reference definitions; drop the paragraph
            self.arena[id].removed = true;
            if let Some(p) = self.arena[id].parent {
                self.arena[p].children.retain(|&c| c != id);
            }
        } else {
            self.arena[id].content = remaining;
        }
    }

    fn finalize_fenced_code(&mut self, id: BlockId) {
        let content = std::mem::take(&mut self.arena[id].content);
        // The first "line" is the rest of the fence line: the info string
        let (first, rest) = match content.find('\n') {
            Some(p) => (&content[..p], &content[p + 1..]),
            None => (content.as_str(), ""),
        };
        self.arena[id].info = unescape_string(first.trim());
        self.arena[id].content = rest.to_string();
    }

    fn finalize_list(&mut self, id: BlockId) {
        let items = self.arena[id].children.clone();
        let mut tight = true;
        'items: for (i, &item) in items.iter().enumerate() {
            let has_next_item = i + 1 < items.len();
            if self.ends_with_blank_line(item) && has_next_item {
                tight = false;
                break;
            }
            // A blank line between blocks inside an item also loosens
            let subs = self.arena[item].children.clone();
            for (j, &sub) in subs.iter().enumerate() {
                if self.ends_with_blank_line(sub) && (has_next_item || j + 1 < subs.len()) {
                    tight = false;
                    break 'items;
                }
            }
        }
        if let BlockKind::List { tight: t, .. } = &mut self.arena[id].kind {
            *t = tight;
        }
    }

    fn ends_with_blank_line(&self, start: BlockId) -> bool {
        let mut id = start;
        loop {
            if self.arena[id].last_line_blank {
                return true;
            }
            if !matches!(
                self.arena[id].kind,
                BlockKind::List { .. } | BlockKind::Item { .. }
            ) {
                return false;
            }
            match self.arena[id].children.last() {
                Some(&child) => id = child,
                None => return false,
            }
        }
    }

    fn build_node(&self, id: BlockId) -> Node {
        let data = &self.arena[id];
        match &data.kind {
            BlockKind::Document => Node::Document(self.child_nodes(id)),
            BlockKind::BlockQuote => Node::BlockQuote(self.child_nodes(id)),
            BlockKind::List { kind, tight } => Node::List {
                kind: *kind,
                tight: *tight,
                children: self.child_nodes(id),
            },
            BlockKind::Item { .. } => Node::ListItem(self.child_nodes(id)),
            BlockKind::Paragraph => Node::Paragraph(self.parse_content(id)),
            BlockKind::AtxHeading { level } | BlockKind::SetextHeading { level } => Node::Heading {
                level: *level,
                children: self.parse_content(id),
            },
            BlockKind::IndentedCode => Node::CodeBlock {
                info: String::new(),
                literal: data.content.clone(),
            },
            BlockKind::FencedCode { .. } => Node::CodeBlock {
                info: data.info.clone(),
                literal: data.content.clone(),
            },
            BlockKind::HtmlBlock { .. } => Node::HtmlBlock(data.content.clone()),
            BlockKind::ThematicBreak => Node::ThematicBreak,
            BlockKind::Custom {
                name,
                attributes,
                container,
            } => Node::Custom {
                name: name.clone(),
                attributes: attributes.clone(),
                children: if *container {
                    self.child_nodes(id)
                } else {
                    Vec::new()
                },
                literal: if *container {
                    String::new()
                } else {
                    data.content.clone()
                },
            },
        }
    }

    fn child_nodes(&self, id: BlockId) -> Vec<Node> {
        self.arena[id]
            .children
            .iter()
            .filter(|&&c| !self.arena[c].removed)
            .map(|&c| self.build_node(c))
            .collect()
    }

    fn parse_content(&self, id: BlockId) -> Vec<Node> {
        parse_inlines(
            &self.arena[id].content,
            &self.refmap,
            &self.pipeline.inline_rules,
        )
    }
}

/// Parse a list marker at the next non-space position. On success consumes
/// the marker and its trailing spaces and returns the list kind, the marker
/// offset (indentation before the marker), and the content padding.
fn parse_list_marker(
    scanner: &mut Scanner,
    in_paragraph: bool,
) -> Option<(ListKind, usize, usize)> {
    if scanner.indent() >= 4 {
        return None;
    }
    let rest = scanner.rest();
    let (kind, marker_len) = match rest.first().copied() {
        Some(c @ ('*' | '+' | '-')) => (ListKind::Bullet { marker: c }, 1),
        Some(c) if c.is_ascii_digit() => {
            let mut n = 0;
            while n < 10 && rest.get(n).is_some_and(|d| d.is_ascii_digit()) {
                n += 1;
            }
            // At most nine digits, so the start number cannot overflow
            if n > 9 {
                return None;
            }
            let delimiter = rest.get(n).copied()?;
            if delimiter != '.' && delimiter != ')' {
                return None;
            }
            let digits: String = rest[..n].iter().collect();
            let start: u64 = digits.parse().ok()?;
            // Only a list starting at 1 may interrupt a paragraph
            if in_paragraph && start != 1 {
                return None;
            }
            (ListKind::Ordered { start, delimiter }, n + 1)
        }
        _ => return None,
    };
    if !matches!(rest.get(marker_len).copied(), None | Some(' ') | Some('\t')) {
        return None;
    }
    // An empty item cannot interrupt a paragraph
    if in_paragraph && rest[marker_len..].iter().all(|c| matches!(*c, ' ' | '\t')) {
        return None;
    }

    let marker_offset = scanner.indent();
    scanner.advance_next_nonspace();
    scanner.advance_offset(marker_len, true);
    let spaces_start = scanner.snapshot();
    let spaces_start_col = scanner.column();
    loop {
        scanner.advance_offset(1, true);
        if scanner.column() - spaces_start_col >= 5 || !matches!(scanner.peek(), Some(' ' | '\t')) {
            break;
        }
    }
    let blank_item = scanner.peek().is_none();
    let spaces_after = scanner.column() - spaces_start_col;
    let padding = if spaces_after >= 5 || spaces_after < 1 || blank_item {
        // Content indented 5+ columns (or absent) counts as one space of
        // padding; the rest belongs to the content
        scanner.restore(spaces_start);
        if matches!(scanner.peek(), Some(' ' | '\t')) {
            scanner.advance_offset(1, true);
        }
        marker_len + 1
    } else {
        marker_len + spaces_after
    };
    Some((kind, marker_offset, padding))
}

/// Remove an ATX heading's optional closing sequence and surrounding spaces.
fn strip_atx_closing(content: &str) -> String {
    let no_trailing_space = content.trim_end_matches([' ', '\t']);
    let no_hashes = no_trailing_space.trim_end_matches('#');
    if no_hashes.len() == no_trailing_space.len() {
        return no_trailing_space.to_string();
    }
    if no_hashes.is_empty() {
        return String::new();
    }
    if no_hashes.ends_with([' ', '\t']) {
        no_hashes.trim_end_matches([' ', '\t']).to_string()
    } else {
        // Hashes attached to text are content, not a closing sequence
        no_trailing_space.to_string()
    }
}

/// Drop trailing blank lines. Indented code keeps a single final newline;
/// HTML blocks lose it too.
fn trim_trailing_blank_lines(text: &str, keep_newline: bool) -> String {
    let bytes = text.as_bytes();
    let mut end = bytes.len();
    let mut cut = None;
    loop {
        let mut j = end;
        while j > 0 && bytes[j - 1] == b' ' {
            j -= 1;
        }
        if j > 0 && bytes[j - 1] == b'\n' {
            cut = Some(j - 1);
            end = j - 1;
        } else {
            break;
        }
    }
    match cut {
        Some(start) if keep_newline => format!("{}\n", &text[..start]),
        Some(start) => text[..start].to_string(),
        None => text.to_string(),
    }
}

const HTML_BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "base",
    "basefont",
    "blockquote",
    "body",
    "caption",
    "center",
    "col",
    "colgroup",
    "dd",
    "details",
    "dialog",
    "dir",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "frame",
    "frameset",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "head",
    "header",
    "hr",
    "html",
    "iframe",
    "legend",
    "li",
    "link",
    "main",
    "menu",
    "menuitem",
    "nav",
    "noframes",
    "ol",
    "optgroup",
    "option",
    "p",
    "param",
    "section",
    "source",
    "summary",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "title",
    "tr",
    "track",
    "ul",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "pre", "style", "textarea"];

/// Classify an HTML block start at `rest[0] == '<'`, returning the block
/// type (1-7). Type 7 never interrupts a paragraph.
fn html_block_type(rest: &[char], in_paragraph: bool) -> Option<u8> {
    if rest.first() != Some(&'<') {
        return None;
    }
    let line: String = rest.iter().collect();
    let lower = line.to_lowercase();

    for tag in RAW_TEXT_TAGS {
        let open = format!("<{tag}");
        if lower.starts_with(&open) {
            let after = lower[open.len()..].chars().next();
            if matches!(after, None | Some(' ') | Some('\t') | Some('>')) {
                return Some(1);
            }
        }
    }
    if line.starts_with("<!--") {
        return Some(2);
    }
    if line.starts_with("<?") {
        return Some(3);
    }
    if line.starts_with("<![CDATA[") {
        return Some(5);
    }
    if line.starts_with("<!")
        && line[2..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
    {
        return Some(4);
    }

    let closing = rest.get(1) == Some(&'/');
    let name_start = if closing { 2 } else { 1 };
    let mut i = name_start;
    while rest
        .get(i)
        .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '-')
    {
        i += 1;
    }
    if i > name_start {
        let name: String = rest[name_start..i]
            .iter()
            .collect::<String>()
            .to_lowercase();
        if HTML_BLOCK_TAGS.contains(&name.as_str()) {
            let ok = match rest.get(i).copied() {
                None | Some(' ') | Some('\t') | Some('>') => true,
                Some('/') => rest.get(i + 1) == Some(&'>'),
                _ => false,
            };
            if ok {
                return Some(6);
            }
        }
        // Type 7: any complete tag alone on its line
        if !in_paragraph
            && !(RAW_TEXT_TAGS.contains(&name.as_str()) && !closing)
            && let Some(end) = scan_html_inline(rest, 0)
            && rest[end..].iter().all(|c| matches!(*c, ' ' | '\t'))
        {
            return Some(7);
        }
    }
    None
}

/// End-of-block test for HTML block types 1-5, applied to each content line.
fn html_end_condition(html_type: u8, text: &str) -> bool {
    match html_type {
        1 => {
            let lower = text.to_lowercase();
            ["</script>", "</pre>", "</style>", "</textarea>"]
                .iter()
                .any(|t| lower.contains(t))
        }
        2 => text.contains("-->"),
        3 => text.contains("?>"),
        4 => text.contains('>'),
        5 => text.contains("]]>"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Node {
        Pipeline::new().parse(input)
    }

    fn doc_children(doc: Node) -> Vec<Node> {
        match doc {
            Node::Document(children) => children,
            other => panic!("expected document, got {:?}", other),
        }
    }

    #[test]
    fn test_paragraph_lines_merge() {
        let blocks = doc_children(parse("hello\nworld\n"));
        assert_eq!(
            blocks,
            vec![Node::Paragraph(vec![
                Node::Text("hello".to_string()),
                Node::SoftBreak,
                Node::Text("world".to_string()),
            ])]
        );
    }

    #[test]
    fn test_blank_line_splits_paragraphs() {
        let blocks = doc_children(parse("one\n\ntwo\n"));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_atx_heading() {
        let blocks = doc_children(parse("## Title ##\n"));
        assert_eq!(
            blocks,
            vec![Node::Heading {
                level: 2,
                children: vec![Node::Text("Title".to_string())],
            }]
        );
    }

    #[test]
    fn test_atx_needs_space_after_marker() {
        let blocks = doc_children(parse("#5 bolt\n"));
        assert!(matches!(blocks[0], Node::Paragraph(_)));
    }

    #[test]
    fn test_setext_heading_beats_thematic_break() {
        let blocks = doc_children(parse("Foo\n---\n"));
        assert_eq!(
            blocks,
            vec![Node::Heading {
                level: 2,
                children: vec![Node::Text("Foo".to_string())],
            }]
        );
    }

    #[test]
    fn test_thematic_break() {
        let blocks = doc_children(parse(" * * *\n"));
        assert_eq!(blocks, vec![Node::ThematicBreak]);
    }

    #[test]
    fn test_indented_code_trims_trailing_blanks() {
        let blocks = doc_children(parse("    code\n\n    more\n\n\n"));
        assert_eq!(
            blocks,
            vec![Node::CodeBlock {
                info: String::new(),
                literal: "code\n\nmore\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_indented_code_cannot_interrupt_paragraph() {
        let blocks = doc_children(parse("text\n    still text\n"));
        assert_eq!(blocks.len(), 1);
        assert!(matches!(blocks[0], Node::Paragraph(_)));
    }

    #[test]
    fn test_fenced_code_with_info() {
        let blocks = doc_children(parse("```rust ignore\nfn main() {}\n```\n"));
        assert_eq!(
            blocks,
            vec![Node::CodeBlock {
                info: "rust ignore".to_string(),
                literal: "fn main() {}\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_unclosed_fence_runs_to_end() {
        let blocks = doc_children(parse("```\ncode\n"));
        assert_eq!(
            blocks,
            vec![Node::CodeBlock {
                info: String::new(),
                literal: "code\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_fence_close_needs_matching_length() {
        let blocks = doc_children(parse("````\n```\n````\n"));
        assert_eq!(
            blocks,
            vec![Node::CodeBlock {
                info: String::new(),
                literal: "```\n".to_string(),
            }]
        );
    }

    #[test]
    fn test_block_quote_with_lazy_continuation() {
        let blocks = doc_children(parse("> quoted\nlazy\n"));
        assert_eq!(
            blocks,
            vec![Node::BlockQuote(vec![Node::Paragraph(vec![
                Node::Text("quoted".to_string()),
                Node::SoftBreak,
                Node::Text("lazy".to_string()),
            ])])]
        );
    }

    #[test]
    fn test_blank_line_ends_lazy_continuation() {
        let blocks = doc_children(parse("> quoted\n\nafter\n"));
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0], Node::BlockQuote(_)));
        assert!(matches!(blocks[1], Node::Paragraph(_)));
    }

    #[test]
    fn test_tight_bullet_list() {
        let blocks = doc_children(parse("- a\n- b\n"));
        match &blocks[0] {
            Node::List {
                kind,
                tight,
                children,
            } => {
                assert_eq!(*kind, ListKind::Bullet { marker: '-' });
                assert!(*tight);
                assert_eq!(children.len(), 2);
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_loose_list() {
        let blocks = doc_children(parse("- a\n\n- b\n"));
        match &blocks[0] {
            Node::List { tight, .. } => assert!(!tight),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_ordered_list_start() {
        let blocks = doc_children(parse("3. c\n4. d\n"));
        match &blocks[0] {
            Node::List { kind, .. } => {
                assert_eq!(
                    *kind,
                    ListKind::Ordered {
                        start: 3,
                        delimiter: '.'
                    }
                );
            }
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_changed_bullet_starts_new_list() {
        let blocks = doc_children(parse("- a\n+ b\n"));
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0], Node::List { .. }));
        assert!(matches!(blocks[1], Node::List { .. }));
    }

    #[test]
    fn test_ordered_list_interrupting_paragraph_must_start_at_one() {
        let blocks = doc_children(parse("text\n2. not a list\n"));
        assert_eq!(blocks.len(), 1);
        let blocks = doc_children(parse("text\n1. a list\n"));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_nested_list_content_indent() {
        let blocks = doc_children(parse("- outer\n  - inner\n"));
        match &blocks[0] {
            Node::List { children, .. } => match &children[0] {
                Node::ListItem(item_children) => {
                    assert_eq!(item_children.len(), 2);
                    assert!(matches!(item_children[1], Node::List { .. }));
                }
                other => panic!("expected item, got {:?}", other),
            },
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_item_starting_with_indented_content() {
        // Five spaces after the marker: one space of padding, rest is code
        let blocks = doc_children(parse("-     code\n"));
        match &blocks[0] {
            Node::List { children, .. } => match &children[0] {
                Node::ListItem(item_children) => {
                    assert!(matches!(item_children[0], Node::CodeBlock { .. }));
                }
                other => panic!("expected item, got {:?}", other),
            },
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_definition_consumed_and_used() {
        let blocks = doc_children(parse("[foo]: /url \"t\"\n\n[foo]\n"));
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            Node::Paragraph(children) => {
                assert_eq!(
                    children[0],
                    Node::Link {
                        destination: "/url".to_string(),
                        title: Some("t".to_string()),
                        children: vec![Node::Text("foo".to_string())],
                    }
                );
            }
            other => panic!("expected paragraph, got {:?}", other),
        }
    }

    #[test]
    fn test_setext_over_reference_only_paragraph_is_thematic_break() {
        let blocks = doc_children(parse("[foo]: /url\n---\n[foo]\n"));
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0], Node::ThematicBreak));
    }

    #[test]
    fn test_html_block_type_six_ends_at_blank() {
        let blocks = doc_children(parse("<div>\n*raw*\n\ntext\n"));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], Node::HtmlBlock("<div>\n*raw*".to_string()));
    }

    #[test]
    fn test_html_comment_block_ends_on_marker() {
        let blocks = doc_children(parse("<!-- note\n-->\nafter\n"));
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], Node::HtmlBlock("<!-- note\n-->".to_string()));
    }

    #[test]
    fn test_tab_expands_in_list_context() {
        let blocks = doc_children(parse("- foo\n\n\tbar\n"));
        match &blocks[0] {
            Node::List { children, .. } => match &children[0] {
                Node::ListItem(item_children) => {
                    assert_eq!(item_children.len(), 2);
                    assert!(matches!(item_children[1], Node::Paragraph(_)));
                }
                other => panic!("expected item, got {:?}", other),
            },
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse(""), Node::Document(vec![]));
        assert_eq!(parse("\n\n"), Node::Document(vec![]));
    }

    #[test]
    fn test_strip_atx_closing() {
        assert_eq!(strip_atx_closing("foo ###"), "foo");
        assert_eq!(strip_atx_closing("foo###"), "foo###");
        assert_eq!(strip_atx_closing("###"), "");
        assert_eq!(strip_atx_closing("foo # bar"), "foo # bar");
    }
}
