//! Entity and numeric character references, plus backslash-escape removal
//! for link destinations, titles, and code fence info strings.

/// Decode a named HTML5 entity. Covers the common names rather than the
/// full HTML5 table; unknown names decode to `None` and stay literal.
pub fn decode_named_entity(name: &str) -> Option<&'static str> {
    let decoded = match name {
        "nbsp" => "\u{00A0}",
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "copy" => "©",
        "reg" => "®",
        "trade" => "™",
        "hellip" => "…",
        "mdash" => "—",
        "ndash" => "–",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        "laquo" => "«",
        "raquo" => "»",
        "auml" => "ä",
        "ouml" => "ö",
        "uuml" => "ü",
        "eacute" => "é",
        "egrave" => "è",
        "agrave" => "à",
        "ccedil" => "ç",
        "AElig" => "Æ",
        "aelig" => "æ",
        "Dcaron" => "Ď",
        "frac12" => "½",
        "frac34" => "¾",
        "plusmn" => "±",
        "times" => "×",
        "divide" => "÷",
        "deg" => "°",
        "micro" => "µ",
        "para" => "¶",
        "sect" => "§",
        "middot" => "·",
        "pound" => "£",
        "euro" => "€",
        "yen" => "¥",
        "cent" => "¢",
        "szlig" => "ß",
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "pi" => "π",
        "infin" => "∞",
        "ne" => "≠",
        "le" => "≤",
        "ge" => "≥",
        "rarr" => "→",
        "larr" => "←",
        "uarr" => "↑",
        "darr" => "↓",
        "bull" => "•",
        "dagger" => "†",
        "Dagger" => "‡",
        "permil" => "‰",
        "prime" => "′",
        "Prime" => "″",
        "oline" => "‾",
        "frasl" => "⁄",
        "HilbertSpace" => "ℋ",
        "DifferentialD" => "ⅆ",
        "ClockwiseContourIntegral" => "∲",
        "ngE" => "≧̸",
        _ => return None,
    };
    Some(decoded)
}

/// Try to parse an entity or numeric character reference at `chars[start]`
/// (which must be `&`). Returns the decoded text and the position after the
/// terminating `;`.
pub fn parse_entity(chars: &[char], start: usize) -> Option<(String, usize)> {
    if chars.get(start) != Some(&'&') {
        return None;
    }
    let mut i = start + 1;

    if chars.get(i) == Some(&'#') {
        i += 1;
        // Hexadecimal reference: &#x / &#X, 1-6 digits
        if matches!(chars.get(i), Some('x') | Some('X')) {
            i += 1;
            let hex_start = i;
            while i - hex_start < 6 && chars.get(i).is_some_and(|c| c.is_ascii_hexdigit()) {
                i += 1;
            }
            if i > hex_start && chars.get(i) == Some(&';') {
                let hex_str: String = chars[hex_start..i].iter().collect();
                let code_point = u32::from_str_radix(&hex_str, 16).ok()?;
                return Some((decode_code_point(code_point), i + 1));
            }
        }
        // Decimal reference: 1-7 digits
        else {
            let dec_start = i;
            while i - dec_start < 7 && chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                i += 1;
            }
            if i > dec_start && chars.get(i) == Some(&';') {
                let dec_str: String = chars[dec_start..i].iter().collect();
                let code_point: u32 = dec_str.parse().ok()?;
                return Some((decode_code_point(code_point), i + 1));
            }
        }
        return None;
    }

    // Named entity: letters and digits up to 32 chars
    let name_start = i;
    while i - name_start < 32 && chars.get(i).is_some_and(|c| c.is_ascii_alphanumeric()) {
        i += 1;
    }
    if i > name_start && chars.get(i) == Some(&';') {
        let name: String = chars[name_start..i].iter().collect();
        if let Some(decoded) = decode_named_entity(&name) {
            return Some((decoded.to_string(), i + 1));
        }
    }
    None
}

/// Invalid code points and U+0000 decode to the replacement character.
fn decode_code_point(code_point: u32) -> String {
    if code_point == 0 {
        return '\u{FFFD}'.to_string();
    }
    char::from_u32(code_point)
        .unwrap_or('\u{FFFD}')
        .to_string()
}

/// Resolve backslash escapes and entity references in a raw string. Used for
/// link destinations, link titles, and fence info strings, which are not
/// parsed as inlines but still honor both.
pub fn unescape_string(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && chars.get(i + 1).is_some_and(|c| c.is_ascii_punctuation()) {
            out.push(chars[i + 1]);
            i += 2;
        } else if chars[i] == '&'
            && let Some((decoded, next)) = parse_entity(&chars, i)
        {
            out.push_str(&decoded);
            i = next;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(s: &str) -> Option<(String, usize)> {
        let chars: Vec<char> = s.chars().collect();
        parse_entity(&chars, 0)
    }

    #[test]
    fn test_named_entity() {
        assert_eq!(entity("&amp;"), Some(("&".to_string(), 5)));
        assert_eq!(entity("&nosuchentity;"), None);
        assert_eq!(entity("&amp"), None); // missing semicolon
    }

    #[test]
    fn test_numeric_references() {
        assert_eq!(entity("&#35;"), Some(("#".to_string(), 5)));
        assert_eq!(entity("&#X22;"), Some(("\"".to_string(), 6)));
        assert_eq!(entity("&#0;"), Some(("\u{FFFD}".to_string(), 4)));
        assert_eq!(entity("&#1234567;"), Some(("\u{FFFD}".to_string(), 10)));
        assert_eq!(entity("&#;"), None);
        assert_eq!(entity("&#87654321;"), None); // too many digits
    }

    #[test]
    fn test_unescape_string() {
        assert_eq!(unescape_string("foo\\*bar"), "foo*bar");
        assert_eq!(unescape_string("a\\b"), "a\\b"); // 'b' is not punctuation
        assert_eq!(unescape_string("x &amp; y"), "x & y");
    }
}
