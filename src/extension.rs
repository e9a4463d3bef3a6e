//! Extension hooks and the immutable parse/render pipeline.
//!
//! Extensions are registered on a [`PipelineBuilder`] before any parsing
//! happens; the built [`Pipeline`] never mutates, so the parse and render
//! paths carry no process-wide state. Block start rules interleave with the
//! built-in recognizers by integer priority; claiming an occupied slot is a
//! construction-time error.

use crate::ast::Node;
use crate::block::Builder;
use crate::line::Scanner;
use crate::renderer;
use thiserror::Error;

/// Priorities of the built-in block start rules. Extensions position
/// themselves relative to these.
pub mod priority {
    pub const BLOCK_QUOTE: i32 = 100;
    pub const ATX_HEADING: i32 = 200;
    pub const FENCED_CODE: i32 = 300;
    pub const HTML_BLOCK: i32 = 400;
    pub const SETEXT_HEADING: i32 = 500;
    pub const THEMATIC_BREAK: i32 = 600;
    pub const LIST_ITEM: i32 = 700;
    pub const INDENTED_CODE: i32 = 800;
}

/// Outcome of a block continuation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueResult {
    Matched,
    NotMatched,
    /// The line belongs to the block and also closes it (nothing further on
    /// the line is processed).
    MatchedAndDone,
}

/// Description of an extension block opened by a start rule.
#[derive(Debug, Clone)]
pub struct StartedBlock {
    /// Name used to match the continuation rule and the render rule, and
    /// carried on the resulting `Node::Custom`.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    /// Containers hold child blocks; leaves accumulate raw text lines.
    pub container: bool,
}

/// Tried during new-block-start detection at the rule's priority. The rule
/// consumes its marker from the scanner on success.
pub trait BlockStartRule {
    fn priority(&self) -> i32;
    fn try_start(&self, line: &mut Scanner, in_paragraph: bool) -> Option<StartedBlock>;
}

/// Tried during continuation matching for open extension blocks with the
/// matching name.
pub trait BlockContinueRule {
    fn name(&self) -> &str;
    fn try_continue(&self, line: &mut Scanner) -> ContinueResult;
}

/// Cursor handed to inline rules during tokenization.
pub struct InlineCursor<'a> {
    chars: &'a [char],
    pub pos: usize,
}

impl<'a> InlineCursor<'a> {
    pub(crate) fn new(chars: &'a [char], pos: usize) -> Self {
        InlineCursor { chars, pos }
    }

    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    pub fn peek_ahead(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.chars.len());
    }

    /// Consume `s` if the cursor is sitting on it.
    pub fn eat(&mut self, s: &str) -> bool {
        let mut i = self.pos;
        for c in s.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        self.pos = i;
        true
    }

    /// Consume and return characters while `pred` holds.
    pub fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }
}

/// Tried during inline tokenization, before built-in handling, whenever the
/// cursor sits on the rule's trigger character.
pub trait InlineRule {
    fn trigger(&self) -> char;
    fn try_parse(&self, cursor: &mut InlineCursor<'_>) -> Option<Node>;
}

/// Runs over the finished document after phase 2.
pub trait Postprocess {
    fn run(&self, doc: &mut Node);
}

/// Renders `Node::Custom` blocks/inlines with the matching name.
pub trait RenderRule {
    fn name(&self) -> &str;
    fn render(&self, attributes: &[(String, String)], inner_html: &str, literal: &str) -> String;
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("two block start rules registered at priority {0}")]
    PriorityConflict(i32),
}

/// An immutable parse/render configuration. Construct once, reuse freely.
#[derive(Default)]
pub struct Pipeline {
    pub(crate) block_starts: Vec<Box<dyn BlockStartRule>>,
    pub(crate) block_continues: Vec<Box<dyn BlockContinueRule>>,
    pub(crate) inline_rules: Vec<Box<dyn InlineRule>>,
    pub(crate) postprocessors: Vec<Box<dyn Postprocess>>,
    pub(crate) render_rules: Vec<Box<dyn RenderRule>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline::default()
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Parse a document. Never fails: every input produces a tree.
    pub fn parse(&self, input: &str) -> Node {
        let mut doc = Builder::new(self).run(input);
        for hook in &self.postprocessors {
            hook.run(&mut doc);
        }
        doc
    }

    /// Render a finished tree to HTML.
    pub fn render_html(&self, doc: &Node) -> String {
        renderer::render_with(doc, &self.render_rules)
    }

    pub(crate) fn continue_rule(&self, name: &str) -> Option<&dyn BlockContinueRule> {
        self.block_continues
            .iter()
            .find(|r| r.name() == name)
            .map(|r| r.as_ref())
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    block_starts: Vec<Box<dyn BlockStartRule>>,
    block_continues: Vec<Box<dyn BlockContinueRule>>,
    inline_rules: Vec<Box<dyn InlineRule>>,
    postprocessors: Vec<Box<dyn Postprocess>>,
    render_rules: Vec<Box<dyn RenderRule>>,
}

impl PipelineBuilder {
    pub fn block_start(mut self, rule: Box<dyn BlockStartRule>) -> Self {
        self.block_starts.push(rule);
        self
    }

    pub fn block_continue(mut self, rule: Box<dyn BlockContinueRule>) -> Self {
        self.block_continues.push(rule);
        self
    }

    pub fn inline_rule(mut self, rule: Box<dyn InlineRule>) -> Self {
        self.inline_rules.push(rule);
        self
    }

    pub fn postprocess(mut self, hook: Box<dyn Postprocess>) -> Self {
        self.postprocessors.push(hook);
        self
    }

    pub fn render_rule(mut self, rule: Box<dyn RenderRule>) -> Self {
        self.render_rules.push(rule);
        self
    }

    /// Validate priority slots and produce the immutable pipeline.
    pub fn build(mut self) -> Result<Pipeline, PipelineError> {
        let builtin = [
            priority::BLOCK_QUOTE,
            priority::ATX_HEADING,
            priority::FENCED_CODE,
            priority::HTML_BLOCK,
            priority::SETEXT_HEADING,
            priority::THEMATIC_BREAK,
            priority::LIST_ITEM,
            priority::INDENTED_CODE,
        ];
        let mut seen: Vec<i32> = builtin.to_vec();
        for rule in &self.block_starts {
            let p = rule.priority();
            if seen.contains(&p) {
                return Err(PipelineError::PriorityConflict(p));
            }
            seen.push(p);
        }
        self.block_starts.sort_by_key(|r| r.priority());
        Ok(Pipeline {
            block_starts: self.block_starts,
            block_continues: self.block_continues,
            inline_rules: self.inline_rules,
            postprocessors: self.postprocessors,
            render_rules: self.render_rules,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy(i32);

    impl BlockStartRule for Dummy {
        fn priority(&self) -> i32 {
            self.0
        }
        fn try_start(&self, _line: &mut Scanner, _in_paragraph: bool) -> Option<StartedBlock> {
            None
        }
    }

    #[test]
    fn test_priority_conflict_with_builtin() {
        let result = Pipeline::builder()
            .block_start(Box::new(Dummy(priority::LIST_ITEM)))
            .build();
        assert!(matches!(
            result,
            Err(PipelineError::PriorityConflict(p)) if p == priority::LIST_ITEM
        ));
    }

    #[test]
    fn test_priority_conflict_between_extensions() {
        let result = Pipeline::builder()
            .block_start(Box::new(Dummy(50)))
            .block_start(Box::new(Dummy(50)))
            .build();
        assert!(matches!(result, Err(PipelineError::PriorityConflict(50))));
    }

    #[test]
    fn test_empty_pipeline_builds() {
        assert!(Pipeline::builder().build().is_ok());
    }
}
