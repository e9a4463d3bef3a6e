//! Emphasis and strong emphasis resolution over the delimiter stack.
//!
//! The stack is a growable vector with tombstones rather than a linked list,
//! so entry indices stay stable while the nested scan removes delimiters.

use crate::ast::{MAX_DEPTH, Node};

/// One delimiter run on the stack.
#[derive(Debug, Clone)]
pub struct Delim {
    pub ch: char,
    /// Remaining (unconsumed) delimiter characters.
    pub count: usize,
    /// Original run length, used by the multiple-of-3 rule.
    pub run_len: usize,
    /// Index of the `Text` node holding the literal run.
    pub node: usize,
    pub can_open: bool,
    pub can_close: bool,
    pub removed: bool,
}

/// Flanking classification of a delimiter run: (run length, can_open,
/// can_close). `pos` is the first character of the run.
pub fn classify_delim_run(chars: &[char], pos: usize) -> (usize, bool, bool) {
    let ch = chars[pos];
    let mut count = 0;
    while chars.get(pos + count) == Some(&ch) {
        count += 1;
    }

    // Start and end of input count as whitespace
    let before = if pos == 0 { '\n' } else { chars[pos - 1] };
    let after = *chars.get(pos + count).unwrap_or(&'\n');

    let before_is_whitespace = is_unicode_whitespace(before);
    let before_is_punctuation = is_unicode_punctuation(before);
    let after_is_whitespace = is_unicode_whitespace(after);
    let after_is_punctuation = is_unicode_punctuation(after);

    let left_flanking = !after_is_whitespace
        && (!after_is_punctuation || before_is_whitespace || before_is_punctuation);
    let right_flanking = !before_is_whitespace
        && (!before_is_punctuation || after_is_whitespace || after_is_punctuation);

    let (can_open, can_close) = if ch == '_' {
        // Underscores may not open or close intraword emphasis
        (
            left_flanking && (!right_flanking || before_is_punctuation),
            right_flanking && (!left_flanking || after_is_punctuation),
        )
    } else {
        (left_flanking, right_flanking)
    };
    (count, can_open, can_close)
}

pub fn is_unicode_whitespace(c: char) -> bool {
    c.is_whitespace()
}

/// Unicode punctuation for the flanking rules: ASCII punctuation plus the
/// general punctuation and symbol categories, approximated as anything that
/// is neither alphanumeric, whitespace, nor a control character.
pub fn is_unicode_punctuation(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_punctuation();
    }
    !c.is_alphanumeric() && !c.is_whitespace() && !c.is_control()
}

fn delim_index(ch: char) -> usize {
    if ch == '*' { 0 } else { 1 }
}

/// Resolve emphasis and strong emphasis over `delims[stack_bottom..]`,
/// wrapping node ranges in `Emphasis`/`Strong` in place. Consumed delimiter
/// characters are chopped from their `Text` nodes; fully consumed nodes are
/// left as empty text for the caller to sweep. All stack entries at or above
/// `stack_bottom` are dead after this returns.
pub fn process_emphasis(nodes: &mut Vec<Node>, delims: &mut Vec<Delim>, stack_bottom: usize) {
    // Lower bound for opener searches, per (delimiter char, closer run
    // length mod 3). Avoids rescanning ranges known to hold no opener.
    let mut openers_bottom = [[stack_bottom; 3]; 2];

    // Subtree heights, kept in sync with `nodes` so a wrap that would
    // nest past the depth cap can be refused.
    let mut depths: Vec<usize> = nodes.iter().map(Node::depth).collect();

    let mut closer_ix = stack_bottom;
    while closer_ix < delims.len() {
        if delims[closer_ix].removed || !delims[closer_ix].can_close {
            closer_ix += 1;
            continue;
        }
        let cc = delims[closer_ix].ch;
        let closer_run = delims[closer_ix].run_len;
        let floor = openers_bottom[delim_index(cc)][closer_run % 3].max(stack_bottom);

        // Search backward for the nearest matching opener above the floor
        let mut opener_ix = None;
        let mut j = closer_ix;
        while j > floor {
            j -= 1;
            let op = &delims[j];
            if op.removed || !op.can_open || op.ch != cc {
                continue;
            }
            // Multiple-of-3 rule: when either run can both open and close,
            // reject a match whose combined length is a multiple of 3,
            // unless both lengths are themselves multiples of 3.
            let odd_match = (delims[closer_ix].can_open || op.can_close)
                && closer_run % 3 != 0
                && (op.run_len + closer_run) % 3 == 0;
            if !odd_match {
                opener_ix = Some(j);
                break;
            }
        }

        match opener_ix {
            Some(oi) => {
                let use_delims = if delims[closer_ix].count >= 2 && delims[oi].count >= 2 {
                    2
                } else {
                    1
                };
                let opener_node = delims[oi].node;
                let closer_node = delims[closer_ix].node;

                let inner_depth = depths[opener_node + 1..closer_node]
                    .iter()
                    .copied()
                    .max()
                    .unwrap_or(0);
                if inner_depth >= MAX_DEPTH {
                    // Nesting past the depth cap stays literal
                    openers_bottom[delim_index(cc)][closer_run % 3] = closer_ix;
                    if !delims[closer_ix].can_open {
                        delims[closer_ix].removed = true;
                    }
                    closer_ix += 1;
                    continue;
                }

                chop_delims(nodes, opener_node, use_delims);
                chop_delims(nodes, closer_node, use_delims);
                delims[oi].count -= use_delims;
                delims[closer_ix].count -= use_delims;

                // Wrap everything strictly between the two runs
                let inner: Vec<Node> = nodes.drain(opener_node + 1..closer_node).collect();
                let removed_count = closer_node - opener_node - 1;
                let wrapped = if use_delims == 2 {
                    Node::Strong(inner)
                } else {
                    Node::Emphasis(inner)
                };
                nodes.insert(opener_node + 1, wrapped);
                depths.drain(opener_node + 1..closer_node);
                depths.insert(opener_node + 1, inner_depth + 1);

                // Keep stack indices in sync with the node vector
                let shift = 1_isize - removed_count as isize;
                for d in delims.iter_mut() {
                    if !d.removed && d.node > opener_node {
                        d.node = (d.node as isize + shift) as usize;
                    }
                }

                // Delimiters between opener and closer are dropped
                for k in oi + 1..closer_ix {
                    delims[k].removed = true;
                }
                if delims[oi].count == 0 {
                    delims[oi].removed = true;
                }
                if delims[closer_ix].count == 0 {
                    delims[closer_ix].removed = true;
                    closer_ix += 1;
                }
            }
            None => {
                // No opener: floor future searches just below this closer
                openers_bottom[delim_index(cc)][closer_run % 3] = closer_ix;
                if !delims[closer_ix].can_open {
                    delims[closer_ix].removed = true;
                }
                closer_ix += 1;
            }
        }
    }

    // Everything above the bottom is spent
    delims.truncate(stack_bottom);
}

fn chop_delims(nodes: &mut [Node], ix: usize, count: usize) {
    if let Node::Text(literal) = &mut nodes[ix] {
        let new_len = literal.len().saturating_sub(count);
        literal.truncate(new_len);
    }
}
