//! Link reference definitions and the Link Reference Table.
//!
//! Definitions are extracted greedily from the front of a paragraph's raw
//! text when the paragraph closes. The scanners here (label, destination,
//! title) are shared with inline link parsing.

use std::collections::HashMap;

use unicode_casefold::UnicodeCaseFold;

/// Labels longer than this never match or define a reference.
pub const MAX_LABEL_LENGTH: usize = 999;

#[derive(Debug, Clone, PartialEq)]
pub struct RefDef {
    pub destination: String,
    pub title: Option<String>,
}

/// Map from normalized label to (destination, title). First definition for a
/// given label wins; later duplicates are ignored but still consume input.
#[derive(Debug, Default)]
pub struct RefMap {
    map: HashMap<String, RefDef>,
}

impl RefMap {
    pub fn new() -> Self {
        RefMap::default()
    }

    pub fn insert(&mut self, label: &str, destination: String, title: Option<String>) {
        let normalized = normalize_label(label);
        if normalized.is_empty() {
            return;
        }
        if self.map.contains_key(&normalized) {
            tracing::debug!(label = %normalized, "duplicate reference definition ignored");
            return;
        }
        tracing::debug!(label = %normalized, %destination, "reference definition");
        self.map.insert(normalized, RefDef { destination, title });
    }

    pub fn lookup(&self, label: &str) -> Option<&RefDef> {
        if label.chars().count() > MAX_LABEL_LENGTH {
            return None;
        }
        self.map.get(&normalize_label(label))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Normalize a label for matching: Unicode case fold, trim, and collapse
/// internal whitespace runs to a single space.
pub fn normalize_label(label: &str) -> String {
    let folded: String = label.chars().case_fold().collect();
    folded.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Scan a link label starting at `chars[pos]`, which must be `[`. Returns the
/// raw label content (brackets excluded) and the position after the closing
/// `]`. The content may be empty; labels over the length cap fail.
pub fn scan_link_label(chars: &[char], pos: usize) -> Option<(String, usize)> {
    if chars.get(pos) != Some(&'[') {
        return None;
    }
    let mut i = pos + 1;
    let mut content = String::new();
    let mut count = 0;
    while let Some(&c) = chars.get(i) {
        match c {
            ']' => return Some((content, i + 1)),
            '[' => return None, // no unescaped brackets inside a label
            '\\' => {
                content.push('\\');
                if let Some(&next) = chars.get(i + 1) {
                    content.push(next);
                    i += 2;
                    count += 2;
                } else {
                    i += 1;
                    count += 1;
                }
            }
            _ => {
                content.push(c);
                i += 1;
                count += 1;
            }
        }
        if count > MAX_LABEL_LENGTH {
            return None;
        }
    }
    None
}

/// Scan a link destination at `chars[pos]`: either `<...>` with no unescaped
/// angle brackets or newlines inside, or a bare run with balanced parentheses
/// and no whitespace or control characters. Returns the raw destination
/// (escapes and entities unresolved) and the position after it.
pub fn scan_link_destination(chars: &[char], pos: usize) -> Option<(String, usize)> {
    if chars.get(pos) == Some(&'<') {
        let mut i = pos + 1;
        let mut dest = String::new();
        while let Some(&c) = chars.get(i) {
            match c {
                '>' => return Some((dest, i + 1)),
                '<' | '\n' => return None,
                '\\' => {
                    dest.push('\\');
                    if let Some(&next) = chars.get(i + 1) {
                        dest.push(next);
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                _ => {
                    dest.push(c);
                    i += 1;
                }
            }
        }
        return None;
    }

    let mut i = pos;
    let mut dest = String::new();
    let mut paren_depth: i32 = 0;
    while let Some(&c) = chars.get(i) {
        if c == '\\' && chars.get(i + 1).is_some_and(|n| n.is_ascii_punctuation()) {
            dest.push('\\');
            dest.push(chars[i + 1]);
            i += 2;
            continue;
        }
        if c.is_whitespace() || c.is_control() {
            break;
        }
        if c == '(' {
            paren_depth += 1;
        } else if c == ')' {
            if paren_depth == 0 {
                break;
            }
            paren_depth -= 1;
        }
        dest.push(c);
        i += 1;
    }
    if dest.is_empty() || paren_depth != 0 {
        return None;
    }
    Some((dest, i))
}

/// Scan a link title at `chars[pos]`: `"..."`, `'...'`, or `(...)`. The
/// paren form may not contain unescaped parentheses. Returns raw content and
/// the position after the closing delimiter.
pub fn scan_link_title(chars: &[char], pos: usize) -> Option<(String, usize)> {
    let opener = *chars.get(pos)?;
    let closer = match opener {
        '"' => '"',
        '\'' => '\'',
        '(' => ')',
        _ => return None,
    };
    let mut i = pos + 1;
    let mut title = String::new();
    while let Some(&c) = chars.get(i) {
        if c == closer {
            return Some((title, i + 1));
        }
        if c == '(' && opener == '(' {
            return None;
        }
        if c == '\\' {
            title.push('\\');
            if let Some(&next) = chars.get(i + 1) {
                title.push(next);
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        title.push(c);
        i += 1;
    }
    None
}

/// Skip spaces and tabs plus at most one line ending. Returns the new
/// position (never fails; may consume nothing).
pub fn skip_spnl(chars: &[char], pos: usize) -> usize {
    let mut i = pos;
    let mut seen_newline = false;
    while let Some(&c) = chars.get(i) {
        match c {
            ' ' | '\t' => i += 1,
            '\n' if !seen_newline => {
                seen_newline = true;
                i += 1;
            }
            _ => break,
        }
    }
    i
}

/// Attempt to parse one reference definition at the start of `chars`
/// (a closing paragraph's remaining raw text). On success the definition is
/// recorded (first-wins) and the number of characters consumed is returned;
/// on failure returns 0 and consumes nothing.
pub fn parse_reference(chars: &[char], refmap: &mut RefMap) -> usize {
    let Some((raw_label, after_label)) = scan_link_label(chars, 0) else {
        return 0;
    };
    if normalize_label(&raw_label).is_empty() {
        return 0;
    }
    if chars.get(after_label) != Some(&':') {
        return 0;
    }
    let mut pos = skip_spnl(chars, after_label + 1);

    let Some((raw_dest, after_dest)) = scan_link_destination(chars, pos) else {
        return 0;
    };
    pos = after_dest;

    let before_title = pos;
    pos = skip_spnl(chars, pos);
    let mut title = None;
    if pos > before_title
        && let Some((raw_title, after_title)) = scan_link_title(chars, pos)
    {
        title = Some(raw_title);
        pos = after_title;
    } else {
        pos = before_title;
    }

    // The rest of the line must be whitespace. If a title was parsed but
    // leaves junk on its last line, retry without the title.
    match scan_to_line_end(chars, pos) {
        Some(end) => pos = end,
        None => {
            if title.is_none() {
                return 0;
            }
            title = None;
            pos = before_title;
            match scan_to_line_end(chars, pos) {
                Some(end) => pos = end,
                None => return 0,
            }
        }
    }

    refmap.insert(
        &raw_label,
        crate::entities::unescape_string(&raw_dest),
        title.map(|t| crate::entities::unescape_string(&t)),
    );
    pos
}

/// Spaces/tabs up to a line ending or end of input; consumes the line ending.
fn scan_to_line_end(chars: &[char], pos: usize) -> Option<usize> {
    let mut i = pos;
    while let Some(&c) = chars.get(i) {
        match c {
            ' ' | '\t' => i += 1,
            '\n' => return Some(i + 1),
            _ => return None,
        }
    }
    Some(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Foo\t Bar\n"), "foo bar");
        assert_eq!(normalize_label("ΑΓΩ"), normalize_label("αγω"));
    }

    #[test]
    fn test_simple_reference() {
        let mut refmap = RefMap::new();
        let input = chars("[foo]: /url \"title\"\n");
        let consumed = parse_reference(&input, &mut refmap);
        assert_eq!(consumed, input.len());
        let def = refmap.lookup("FOO").unwrap();
        assert_eq!(def.destination, "/url");
        assert_eq!(def.title.as_deref(), Some("title"));
    }

    #[test]
    fn test_multiline_reference() {
        let mut refmap = RefMap::new();
        let input = chars("[foo]:\n/url\n'the title'\n");
        let consumed = parse_reference(&input, &mut refmap);
        assert_eq!(consumed, input.len());
        let def = refmap.lookup("foo").unwrap();
        assert_eq!(def.destination, "/url");
        assert_eq!(def.title.as_deref(), Some("the title"));
    }

    #[test]
    fn test_first_definition_wins() {
        let mut refmap = RefMap::new();
        refmap.insert("foo", "/url1".into(), None);
        refmap.insert("foo", "/url2".into(), None);
        assert_eq!(refmap.lookup("foo").unwrap().destination, "/url1");
    }

    #[test]
    fn test_trailing_junk_rejects_definition() {
        let mut refmap = RefMap::new();
        let input = chars("[foo]: /url \"title\" extra\n");
        assert_eq!(parse_reference(&input, &mut refmap), 0);
        assert!(refmap.is_empty());
    }

    #[test]
    fn test_junk_after_title_falls_back_to_bare_destination() {
        // The title candidate spans onto a line with trailing junk, so the
        // definition is taken without the title and stops at the line end.
        let mut refmap = RefMap::new();
        let input = chars("[foo]: /url\n\"title\" extra\n");
        let consumed = parse_reference(&input, &mut refmap);
        assert_eq!(consumed, "[foo]: /url\n".chars().count());
        let def = refmap.lookup("foo").unwrap();
        assert_eq!(def.destination, "/url");
        assert_eq!(def.title, None);
    }

    #[test]
    fn test_escaped_brackets_in_label() {
        let mut refmap = RefMap::new();
        let input = chars("[foo\\]bar]: /url\n");
        assert!(parse_reference(&input, &mut refmap) > 0);
        assert!(refmap.lookup("foo\\]bar").is_some());
    }

    #[test]
    fn test_angle_destination() {
        let (dest, end) = scan_link_destination(&chars("<my url>"), 0).unwrap();
        assert_eq!(dest, "my url");
        assert_eq!(end, 8);
        assert!(scan_link_destination(&chars("<a\nb>"), 0).is_none());
    }

    #[test]
    fn test_balanced_paren_destination() {
        let (dest, end) = scan_link_destination(&chars("/url(a(b))x more"), 0).unwrap();
        assert_eq!(dest, "/url(a(b))x");
        assert_eq!(end, 11);
    }
}
