//! Phase 2: parsing a leaf block's raw text into inline elements.
//!
//! Code spans, autolinks, and raw HTML are consumed atomically and never
//! revisited. Emphasis delimiters and brackets go onto stacks as literal
//! `Text` nodes and are resolved afterwards (brackets eagerly on `]`,
//! emphasis via [`crate::emphasis::process_emphasis`]).

use crate::ast::{MAX_DEPTH, Node};
use crate::emphasis::{Delim, classify_delim_run, process_emphasis};
use crate::entities::{parse_entity, unescape_string};
use crate::extension::{InlineCursor, InlineRule};
use crate::refdef::{RefMap, scan_link_destination, scan_link_label, scan_link_title, skip_spnl};

/// Bracket opener (`[` or `![`) pending resolution.
#[derive(Debug, Clone)]
struct Bracket {
    image: bool,
    /// Index of the `Text` node holding the literal bracket token.
    node: usize,
    /// Source position just after the opening bracket, for collapsed and
    /// shortcut reference labels.
    text_pos: usize,
    /// Delimiter stack height at the time of the push; emphasis inside the
    /// bracketed span is resolved with this as the stack bottom.
    delim_floor: usize,
    active: bool,
    /// Set when another bracket opens after this one; such a span is not a
    /// valid shortcut/collapsed label.
    bracket_after: bool,
}

pub fn parse_inlines(text: &str, refmap: &RefMap, rules: &[Box<dyn InlineRule>]) -> Vec<Node> {
    InlineParser::new(text, refmap, rules).parse()
}

struct InlineParser<'a> {
    chars: Vec<char>,
    pos: usize,
    nodes: Vec<Node>,
    delims: Vec<Delim>,
    brackets: Vec<Bracket>,
    refmap: &'a RefMap,
    rules: &'a [Box<dyn InlineRule>],
}

impl<'a> InlineParser<'a> {
    fn new(text: &'a str, refmap: &'a RefMap, rules: &'a [Box<dyn InlineRule>]) -> Self {
        InlineParser {
            chars: text.trim().chars().collect(),
            pos: 0,
            nodes: Vec::new(),
            delims: Vec::new(),
            brackets: Vec::new(),
            refmap,
            rules,
        }
    }

    fn parse(mut self) -> Vec<Node> {
        while let Some(c) = self.chars.get(self.pos).copied() {
            if self.try_extension_rules(c) {
                continue;
            }
            let handled = match c {
                '\n' => self.parse_newline(),
                '\\' => self.parse_backslash(),
                '`' => self.parse_backticks(),
                '*' | '_' => self.handle_delim(c),
                '[' => self.open_bracket(false),
                '!' => self.parse_bang(),
                ']' => self.close_bracket(),
                '<' => self.parse_angle(),
                '&' => self.parse_entity_ref(),
                _ => false,
            };
            if !handled {
                self.parse_string();
            }
        }
        process_emphasis(&mut self.nodes, &mut self.delims, 0);
        debug_assert!(self.delims.is_empty());
        strip_empty_text(&mut self.nodes);
        self.nodes
    }

    fn try_extension_rules(&mut self, c: char) -> bool {
        for rule in self.rules {
            if rule.trigger() != c {
                continue;
            }
            let mut cursor = InlineCursor::new(&self.chars, self.pos);
            if let Some(node) = rule.try_parse(&mut cursor)
                && cursor.pos > self.pos
            {
                self.pos = cursor.pos;
                self.nodes.push(node);
                return true;
            }
        }
        false
    }

    /// Line ending: hard break after two trailing spaces (or a backslash,
    /// handled in `parse_backslash`), soft break otherwise. Trailing spaces
    /// before and leading spaces after the break are trimmed.
    fn parse_newline(&mut self) -> bool {
        self.pos += 1;
        let mut hardbreak = false;
        if let Some(Node::Text(t)) = self.nodes.last_mut()
            && t.ends_with(' ')
        {
            hardbreak = t.ends_with("  ");
            while t.ends_with(' ') {
                t.pop();
            }
            if t.is_empty() {
                self.nodes.pop();
            }
        }
        self.nodes.push(if hardbreak {
            Node::HardBreak
        } else {
            Node::SoftBreak
        });
        while matches!(self.chars.get(self.pos), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
        true
    }

    fn parse_backslash(&mut self) -> bool {
        match self.chars.get(self.pos + 1) {
            Some('\n') => {
                self.nodes.push(Node::HardBreak);
                self.pos += 2;
                while matches!(self.chars.get(self.pos), Some(' ') | Some('\t')) {
                    self.pos += 1;
                }
            }
            Some(&c) if c.is_ascii_punctuation() => {
                // Escaped punctuation becomes literal text
                self.nodes.push(Node::Text(c.to_string()));
                self.pos += 2;
            }
            _ => {
                self.nodes.push(Node::Text('\\'.to_string()));
                self.pos += 1;
            }
        }
        true
    }

    fn parse_backticks(&mut self) -> bool {
        let start = self.pos;
        let mut open_len = 0;
        while self.chars.get(self.pos) == Some(&'`') {
            open_len += 1;
            self.pos += 1;
        }
        let content_start = self.pos;

        // Closer must be a run of exactly the opener's length
        let mut j = content_start;
        while j < self.chars.len() {
            if self.chars[j] == '`' {
                let run_start = j;
                while self.chars.get(j) == Some(&'`') {
                    j += 1;
                }
                if j - run_start == open_len {
                    let mut content: String =
                        self.chars[content_start..run_start].iter().collect();
                    content = content.replace('\n', " ");
                    // One space stripped from each end, if both present and
                    // the content is not all spaces
                    if content.len() >= 2
                        && content.starts_with(' ')
                        && content.ends_with(' ')
                        && !content.chars().all(|c| c == ' ')
                    {
                        content = content[1..content.len() - 1].to_string();
                    }
                    self.nodes.push(Node::Code(content));
                    self.pos = j;
                    return true;
                }
            } else {
                j += 1;
            }
        }

        // No closer: the opening run is literal
        let literal: String = self.chars[start..content_start].iter().collect();
        self.nodes.push(Node::Text(literal));
        true
    }

    fn handle_delim(&mut self, c: char) -> bool {
        let (count, can_open, can_close) = classify_delim_run(&self.chars, self.pos);
        let literal: String = std::iter::repeat_n(c, count).collect();
        self.pos += count;
        self.nodes.push(Node::Text(literal));
        if can_open || can_close {
            self.delims.push(Delim {
                ch: c,
                count,
                run_len: count,
                node: self.nodes.len() - 1,
                can_open,
                can_close,
                removed: false,
            });
        }
        true
    }

    fn parse_bang(&mut self) -> bool {
        if self.chars.get(self.pos + 1) == Some(&'[') {
            self.open_bracket(true)
        } else {
            self.nodes.push(Node::Text('!'.to_string()));
            self.pos += 1;
            true
        }
    }

    fn open_bracket(&mut self, image: bool) -> bool {
        let token = if image { "![" } else { "[" };
        self.pos += token.chars().count();
        self.nodes.push(Node::Text(token.to_string()));
        if let Some(top) = self.brackets.last_mut() {
            top.bracket_after = true;
        }
        self.brackets.push(Bracket {
            image,
            node: self.nodes.len() - 1,
            text_pos: self.pos,
            delim_floor: self.delims.len(),
            active: true,
            bracket_after: false,
        });
        true
    }

    /// `]` — attempt to close the innermost bracket as a link or image:
    /// inline form, then full, collapsed, and shortcut references.
    fn close_bracket(&mut self) -> bool {
        self.pos += 1;
        let startpos = self.pos;

        let Some(bi) = self.brackets.len().checked_sub(1) else {
            self.nodes.push(Node::Text(']'.to_string()));
            return true;
        };
        if !self.brackets[bi].active {
            self.brackets.pop();
            self.nodes.push(Node::Text(']'.to_string()));
            return true;
        }
        let is_image = self.brackets[bi].image;

        let mut matched = false;
        let mut dest = String::new();
        let mut title: Option<String> = None;

        // Inline form: (dest "title")
        if self.chars.get(self.pos) == Some(&'(') {
            let mut p = skip_spnl(&self.chars, self.pos + 1);
            let parsed_dest = match scan_link_destination(&self.chars, p) {
                Some((raw, after)) => {
                    p = after;
                    Some(raw)
                }
                // An empty destination is allowed: [link]()
                None => Some(String::new()),
            };
            if let Some(raw_dest) = parsed_dest {
                let before_title = p;
                p = skip_spnl(&self.chars, p);
                if p > before_title
                    && let Some((raw_title, after)) = scan_link_title(&self.chars, p)
                {
                    title = Some(unescape_string(&raw_title));
                    p = skip_spnl(&self.chars, after);
                }
                if self.chars.get(p) == Some(&')') {
                    dest = unescape_string(&raw_dest);
                    self.pos = p + 1;
                    matched = true;
                } else {
                    title = None;
                }
            }
        }

        // Reference forms
        if !matched {
            self.pos = startpos;
            let enclosed: String = self.chars[self.brackets[bi].text_pos..startpos - 1]
                .iter()
                .collect();
            let mut reflabel: Option<String> = None;
            if self.chars.get(self.pos) == Some(&'[') {
                match scan_link_label(&self.chars, self.pos) {
                    Some((content, after)) if !content.is_empty() => {
                        // Full reference
                        reflabel = Some(content);
                        self.pos = after;
                    }
                    Some((_, after)) => {
                        // Collapsed reference: label is the bracketed text
                        if !self.brackets[bi].bracket_after {
                            reflabel = Some(enclosed);
                        }
                        self.pos = after;
                    }
                    None => {
                        if !self.brackets[bi].bracket_after {
                            reflabel = Some(enclosed);
                        }
                    }
                }
            } else if !self.brackets[bi].bracket_after {
                // Shortcut reference
                reflabel = Some(enclosed);
            }
            if let Some(label) = reflabel
                && let Some(def) = self.refmap.lookup(&label)
            {
                dest = def.destination.clone();
                title = def.title.clone();
                matched = true;
            }
            if !matched {
                self.pos = startpos;
            }
        }

        if matched {
            let bracket = self.brackets.remove(bi);
            // Resolve emphasis over just the bracketed span
            process_emphasis(&mut self.nodes, &mut self.delims, bracket.delim_floor);
            let inner_depth = self.nodes[bracket.node + 1..]
                .iter()
                .map(Node::depth)
                .max()
                .unwrap_or(0);
            if inner_depth >= MAX_DEPTH {
                // Nesting past the depth cap stays literal
                self.pos = startpos;
                self.nodes.push(Node::Text(']'.to_string()));
                return true;
            }
            let children: Vec<Node> = self.nodes.drain(bracket.node + 1..).collect();
            self.nodes[bracket.node] = if is_image {
                Node::Image {
                    destination: dest,
                    title,
                    children,
                }
            } else {
                Node::Link {
                    destination: dest,
                    title,
                    children,
                }
            };
            if !is_image {
                // Links may not nest inside links
                for b in self.brackets.iter_mut() {
                    if !b.image {
                        b.active = false;
                    }
                }
            }
        } else {
            self.brackets.pop();
            self.nodes.push(Node::Text(']'.to_string()));
        }
        true
    }

    fn parse_angle(&mut self) -> bool {
        if let Some((node, after)) = scan_autolink(&self.chars, self.pos) {
            self.nodes.push(node);
            self.pos = after;
        } else if let Some(after) = scan_html_inline(&self.chars, self.pos) {
            let html: String = self.chars[self.pos..after].iter().collect();
            self.nodes.push(Node::HtmlInline(html));
            self.pos = after;
        } else {
            self.nodes.push(Node::Text('<'.to_string()));
            self.pos += 1;
        }
        true
    }

    fn parse_entity_ref(&mut self) -> bool {
        if let Some((decoded, after)) = parse_entity(&self.chars, self.pos) {
            self.nodes.push(Node::Text(decoded));
            self.pos = after;
        } else {
            self.nodes.push(Node::Text('&'.to_string()));
            self.pos += 1;
        }
        true
    }

    fn parse_string(&mut self) -> bool {
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            if matches!(
                c,
                '\n' | '\\' | '`' | '*' | '_' | '[' | ']' | '!' | '<' | '&'
            ) || self.rules.iter().any(|r| r.trigger() == c)
            {
                break;
            }
            self.pos += 1;
        }
        if self.pos > start {
            let text: String = self.chars[start..self.pos].iter().collect();
            self.nodes.push(Node::Text(text));
        } else {
            // Special character that no handler claimed
            self.nodes.push(Node::Text(self.chars[start].to_string()));
            self.pos += 1;
        }
        true
    }
}

/// Drop the empty `Text` husks left behind by consumed delimiter runs.
fn strip_empty_text(nodes: &mut Vec<Node>) {
    nodes.retain_mut(|n| {
        if let Some(children) = n.children_mut() {
            strip_empty_text(children);
        }
        !matches!(n, Node::Text(t) if t.is_empty())
    });
}

/// Autolink: `<scheme:dest>` or `<email@host>`. Backslash escapes are inert.
fn scan_autolink(chars: &[char], start: usize) -> Option<(Node, usize)> {
    let mut i = start + 1;
    let content_start = i;
    while let Some(&c) = chars.get(i) {
        if c == '>' {
            break;
        }
        if c == '<' || c == '\n' {
            return None;
        }
        i += 1;
    }
    if chars.get(i) != Some(&'>') {
        return None;
    }
    let content: String = chars[content_start..i].iter().collect();
    if content.is_empty() || content.contains(char::is_whitespace) {
        return None;
    }
    i += 1;

    if content.contains('@') && is_email_address(&content) {
        return Some((
            Node::Autolink {
                url: content,
                email: true,
            },
            i,
        ));
    }
    if is_absolute_uri(&content) {
        return Some((
            Node::Autolink {
                url: content,
                email: false,
            },
            i,
        ));
    }
    None
}

/// Scheme of 2-32 characters, starting with a letter, then letters, digits,
/// `+`, `.`, or `-`, followed by `:` and anything non-empty.
fn is_absolute_uri(text: &str) -> bool {
    let Some(colon_pos) = text.find(':') else {
        return false;
    };
    let scheme = &text[..colon_pos];
    if scheme.len() < 2 || scheme.len() > 32 {
        return false;
    }
    let mut cs = scheme.chars();
    match cs.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    scheme
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '.' | '-'))
}

/// Simplified email validation per the HTML5 email pattern.
fn is_email_address(text: &str) -> bool {
    let Some(at_pos) = text.find('@') else {
        return false;
    };
    let local = &text[..at_pos];
    let domain = &text[at_pos + 1..];

    if local.is_empty()
        || !local.chars().all(|ch| {
            ch.is_ascii_alphanumeric()
                || matches!(
                    ch,
                    '.' | '!'
                        | '#'
                        | '$'
                        | '%'
                        | '&'
                        | '\''
                        | '*'
                        | '+'
                        | '/'
                        | '='
                        | '?'
                        | '^'
                        | '_'
                        | '`'
                        | '{'
                        | '|'
                        | '}'
                        | '~'
                        | '-'
                )
        })
    {
        return false;
    }

    if domain.is_empty() {
        return false;
    }
    for part in domain.split('.') {
        if part.is_empty() || part.len() > 63 {
            return false;
        }
        let first = part.chars().next();
        let last = part.chars().last();
        if !first.is_some_and(|c| c.is_ascii_alphanumeric())
            || !last.is_some_and(|c| c.is_ascii_alphanumeric())
        {
            return false;
        }
        if !part.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-') {
            return false;
        }
    }
    true
}

/// Raw inline HTML at `chars[start]` (which must be `<`): open/close tags,
/// comments, processing instructions, declarations, CDATA. Returns the
/// position after the construct.
pub fn scan_html_inline(chars: &[char], start: usize) -> Option<usize> {
    if chars.get(start) != Some(&'<') {
        return None;
    }
    let mut i = start + 1;

    // Comment <!--...-->
    if starts_with_at(chars, i, "!--") {
        i += 3;
        let comment_start = i;
        // Cannot start with > or ->
        if chars.get(i) == Some(&'>') {
            return None;
        }
        if chars.get(i) == Some(&'-') && chars.get(i + 1) == Some(&'>') {
            return None;
        }
        while i < chars.len() {
            if starts_with_at(chars, i, "-->") {
                // Cannot end with an extra -
                if i > comment_start && chars[i - 1] == '-' {
                    return None;
                }
                return Some(i + 3);
            }
            i += 1;
        }
        return None;
    }

    // Processing instruction <?...?>
    if chars.get(i) == Some(&'?') {
        i += 1;
        while i < chars.len() {
            if starts_with_at(chars, i, "?>") {
                return Some(i + 2);
            }
            i += 1;
        }
        return None;
    }

    // CDATA <![CDATA[...]]>
    if starts_with_at(chars, i, "![CDATA[") {
        i += 8;
        while i < chars.len() {
            if starts_with_at(chars, i, "]]>") {
                return Some(i + 3);
            }
            i += 1;
        }
        return None;
    }

    // Declaration <!LETTER...>
    if chars.get(i) == Some(&'!') {
        if !chars.get(i + 1).is_some_and(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        i += 2;
        while let Some(&c) = chars.get(i) {
            if c == '>' {
                return Some(i + 1);
            }
            if c == '\n' {
                return None;
            }
            i += 1;
        }
        return None;
    }

    // Closing tag </tagname>
    if chars.get(i) == Some(&'/') {
        i += 1;
        let name_end = scan_tag_name(chars, i)?;
        i = name_end;
        i = skip_tag_whitespace(chars, i)?;
        if chars.get(i) == Some(&'>') {
            return Some(i + 1);
        }
        return None;
    }

    // Open tag <tagname attrs...>
    let name_end = scan_tag_name(chars, i)?;
    i = name_end;
    loop {
        let after_ws = skip_tag_whitespace(chars, i)?;
        match chars.get(after_ws) {
            Some('>') => return Some(after_ws + 1),
            Some('/') if chars.get(after_ws + 1) == Some(&'>') => return Some(after_ws + 2),
            _ => {}
        }
        // An attribute requires whitespace before it
        if after_ws == i {
            return None;
        }
        i = scan_attribute(chars, after_ws)?;
    }
}

fn starts_with_at(chars: &[char], pos: usize, s: &str) -> bool {
    let mut i = pos;
    for c in s.chars() {
        if chars.get(i) != Some(&c) {
            return false;
        }
        i += 1;
    }
    true
}

/// Tag name: ASCII letter then letters, digits, hyphens.
fn scan_tag_name(chars: &[char], pos: usize) -> Option<usize> {
    if !chars.get(pos).is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let mut i = pos + 1;
    while chars
        .get(i)
        .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '-')
    {
        i += 1;
    }
    Some(i)
}

/// Spaces, tabs, and at most one newline. Returns None on a second newline.
fn skip_tag_whitespace(chars: &[char], pos: usize) -> Option<usize> {
    let mut i = pos;
    let mut newlines = 0;
    while let Some(&c) = chars.get(i) {
        match c {
            ' ' | '\t' => i += 1,
            '\n' => {
                newlines += 1;
                if newlines > 1 {
                    return None;
                }
                i += 1;
            }
            _ => break,
        }
    }
    Some(i)
}

/// One attribute: name, optionally `=` and a quoted or unquoted value.
fn scan_attribute(chars: &[char], pos: usize) -> Option<usize> {
    let mut i = pos;
    if !chars
        .get(i)
        .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '_' | ':'))
    {
        return None;
    }
    i += 1;
    while chars
        .get(i)
        .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-'))
    {
        i += 1;
    }
    let after_name = skip_tag_whitespace(chars, i)?;
    if chars.get(after_name) != Some(&'=') {
        // Attribute without a value
        return Some(i);
    }
    i = skip_tag_whitespace(chars, after_name + 1)?;
    match chars.get(i) {
        Some(&q) if q == '"' || q == '\'' => {
            i += 1;
            while let Some(&c) = chars.get(i) {
                if c == q {
                    return Some(i + 1);
                }
                i += 1;
            }
            None
        }
        Some(&c) if !matches!(c, ' ' | '\t' | '\n' | '"' | '\'' | '=' | '<' | '>' | '`') => {
            while chars
                .get(i)
                .is_some_and(|c| !matches!(c, ' ' | '\t' | '\n' | '"' | '\'' | '=' | '<' | '>' | '`'))
            {
                i += 1;
            }
            Some(i)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inlines(text: &str) -> Vec<Node> {
        let refmap = RefMap::new();
        parse_inlines(text, &refmap, &[])
    }

    #[test]
    fn test_code_span_precedence() {
        let nodes = inlines("`*not emphasis*`");
        assert_eq!(nodes, vec![Node::Code("*not emphasis*".to_string())]);
    }

    #[test]
    fn test_code_span_space_stripping() {
        assert_eq!(inlines("` foo `"), vec![Node::Code("foo".to_string())]);
        assert_eq!(inlines("`  `"), vec![Node::Code("  ".to_string())]);
    }

    #[test]
    fn test_unclosed_backticks_are_literal() {
        assert_eq!(
            inlines("``foo`"),
            vec![
                Node::Text("``".to_string()),
                Node::Text("foo".to_string()),
                Node::Text("`".to_string()),
            ]
        );
    }

    #[test]
    fn test_emphasis_nesting() {
        let nodes = inlines("*foo **bar** baz*");
        assert_eq!(
            nodes,
            vec![Node::Emphasis(vec![
                Node::Text("foo ".to_string()),
                Node::Strong(vec![Node::Text("bar".to_string())]),
                Node::Text(" baz".to_string()),
            ])]
        );
    }

    #[test]
    fn test_multiple_of_three_rule() {
        let nodes = inlines("*foo**bar**baz*");
        assert_eq!(
            nodes,
            vec![Node::Emphasis(vec![
                Node::Text("foo".to_string()),
                Node::Strong(vec![Node::Text("bar".to_string())]),
                Node::Text("baz".to_string()),
            ])]
        );
    }

    #[test]
    fn test_unmatched_delimiters_stay_literal() {
        let nodes = inlines("foo *bar");
        assert_eq!(
            nodes,
            vec![
                Node::Text("foo ".to_string()),
                Node::Text("*".to_string()),
                Node::Text("bar".to_string()),
            ]
        );
    }

    #[test]
    fn test_inline_link() {
        let nodes = inlines("[text](/url \"title\")");
        assert_eq!(
            nodes,
            vec![Node::Link {
                destination: "/url".to_string(),
                title: Some("title".to_string()),
                children: vec![Node::Text("text".to_string())],
            }]
        );
    }

    #[test]
    fn test_empty_inline_link_destination() {
        let nodes = inlines("[text]()");
        assert_eq!(
            nodes,
            vec![Node::Link {
                destination: String::new(),
                title: None,
                children: vec![Node::Text("text".to_string())],
            }]
        );
    }

    #[test]
    fn test_no_link_inside_link() {
        let mut refmap = RefMap::new();
        refmap.insert("ref", "/uri".to_string(), None);
        let nodes = parse_inlines("[foo [bar](/uri)][ref]", &refmap, &[]);
        // The outer brackets stay literal; the inner link resolves
        assert_eq!(nodes[0], Node::Text("[".to_string()));
        assert!(matches!(&nodes[2], Node::Link { destination, .. } if destination == "/uri"));
    }

    #[test]
    fn test_image_inside_link() {
        let nodes = inlines("[![alt](/img)](/url)");
        match &nodes[0] {
            Node::Link {
                destination,
                children,
                ..
            } => {
                assert_eq!(destination, "/url");
                assert!(matches!(&children[0], Node::Image { .. }));
            }
            other => panic!("expected link, got {:?}", other),
        }
    }

    #[test]
    fn test_shortcut_reference() {
        let mut refmap = RefMap::new();
        refmap.insert("foo", "/url".to_string(), None);
        let nodes = parse_inlines("[foo]", &refmap, &[]);
        assert!(matches!(&nodes[0], Node::Link { destination, .. } if destination == "/url"));
    }

    #[test]
    fn test_undefined_reference_is_literal() {
        let nodes = inlines("[nope]");
        assert_eq!(
            nodes,
            vec![Node::Text("[".to_string()), Node::Text("nope".to_string()), Node::Text("]".to_string())]
        );
    }

    #[test]
    fn test_uri_autolink() {
        let nodes = inlines("<http://example.com/?a=b>");
        assert_eq!(
            nodes,
            vec![Node::Autolink {
                url: "http://example.com/?a=b".to_string(),
                email: false,
            }]
        );
    }

    #[test]
    fn test_email_autolink() {
        let nodes = inlines("<foo@bar.example.com>");
        assert_eq!(
            nodes,
            vec![Node::Autolink {
                url: "foo@bar.example.com".to_string(),
                email: true,
            }]
        );
    }

    #[test]
    fn test_not_an_autolink() {
        // A well-formed open tag reads as raw HTML instead
        let nodes = inlines("<not a link>");
        assert_eq!(nodes, vec![Node::HtmlInline("<not a link>".to_string())]);
        // A tag name cannot start with a digit, so this stays literal
        let nodes = inlines("<3 birds>");
        assert_eq!(nodes[0], Node::Text("<".to_string()));
    }

    #[test]
    fn test_html_inline() {
        let nodes = inlines("a <b class=\"x\"> c");
        assert_eq!(nodes[1], Node::HtmlInline("<b class=\"x\">".to_string()));
    }

    #[test]
    fn test_hard_break_two_spaces() {
        let nodes = inlines("foo  \nbar");
        assert_eq!(
            nodes,
            vec![
                Node::Text("foo".to_string()),
                Node::HardBreak,
                Node::Text("bar".to_string()),
            ]
        );
    }

    #[test]
    fn test_hard_break_backslash() {
        let nodes = inlines("foo\\\nbar");
        assert_eq!(
            nodes,
            vec![
                Node::Text("foo".to_string()),
                Node::HardBreak,
                Node::Text("bar".to_string()),
            ]
        );
    }

    #[test]
    fn test_soft_break() {
        let nodes = inlines("foo\n bar");
        assert_eq!(
            nodes,
            vec![
                Node::Text("foo".to_string()),
                Node::SoftBreak,
                Node::Text("bar".to_string()),
            ]
        );
    }

    #[test]
    fn test_escaped_punctuation() {
        let nodes = inlines("\\*literal\\*");
        assert_eq!(
            nodes,
            vec![
                Node::Text("*".to_string()),
                Node::Text("literal".to_string()),
                Node::Text("*".to_string()),
            ]
        );
    }

    #[test]
    fn test_delimiter_stack_drained() {
        // Pathological unmatched runs still leave an empty stack
        let refmap = RefMap::new();
        let parser = InlineParser::new("***a** b *c* _d__", &refmap, &[]);
        let _ = parser.parse();
    }
}
