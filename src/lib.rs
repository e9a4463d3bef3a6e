//! A CommonMark-compliant Markdown parser and HTML renderer with extension
//! hooks for custom block, inline, and rendering rules.

pub mod ast;
pub mod block;
pub mod emphasis;
pub mod entities;
pub mod extension;
pub mod inline;
pub mod line;
pub mod refdef;
pub mod renderer;

pub use ast::{ListKind, Node};
pub use extension::{
    BlockContinueRule, BlockStartRule, ContinueResult, InlineCursor, InlineRule, Pipeline,
    PipelineBuilder, PipelineError, Postprocess, RenderRule, StartedBlock,
};

/// Parse markdown text and render to HTML with the default pipeline.
pub fn markdown_to_html(markdown: &str) -> String {
    let pipeline = Pipeline::new();
    let doc = pipeline.parse(markdown);
    pipeline.render_html(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(markdown_to_html(""), "");
    }

    #[test]
    fn test_basic_image() {
        let result = markdown_to_html("![foo](/url \"title\")\n");
        assert_eq!(
            result,
            "<p><img src=\"/url\" alt=\"foo\" title=\"title\" /></p>\n"
        );
    }

    #[test]
    fn test_image_without_title() {
        let result = markdown_to_html("![bar](/path)\n");
        assert_eq!(result, "<p><img src=\"/path\" alt=\"bar\" /></p>\n");
    }

    #[test]
    fn test_every_input_parses() {
        // Parsing never fails; odd inputs still produce a document
        let _ = markdown_to_html("[([*_`\\");
        let _ = markdown_to_html("> - ``` \n\t\t\u{0}");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let input = "# h\n\n> *a* [x][y]\n\n- 1\n- 2\n\n[y]: /u\n";
        let pipeline = Pipeline::new();
        assert_eq!(pipeline.parse(input), pipeline.parse(input));
    }

    #[test]
    fn test_label_matching_ignores_case_and_whitespace() {
        assert_eq!(
            markdown_to_html("[Foo][]\n\n[foo]: /url\n"),
            "<p><a href=\"/url\">Foo</a></p>\n"
        );
    }

    #[test]
    fn test_first_definition_wins() {
        assert_eq!(
            markdown_to_html("[foo]\n\n[foo]: /url1\n[foo]: /url2\n"),
            "<p><a href=\"/url1\">foo</a></p>\n"
        );
    }

    #[test]
    fn test_indented_code_needs_blank_after_paragraph() {
        assert_eq!(markdown_to_html("Foo\n    bar\n"), "<p>Foo\nbar</p>\n");
        assert_eq!(
            markdown_to_html("Foo\n\n    bar\n"),
            "<p>Foo</p>\n<pre><code>bar\n</code></pre>\n"
        );
    }

    #[test]
    fn test_blank_between_items_makes_list_loose() {
        assert_eq!(
            markdown_to_html("- a\n- b\n\n- c\n"),
            "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n<li>\n<p>c</p>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_deeply_nested_input_terminates() {
        // Nesting past the depth cap degrades to literal text instead of
        // building a tree too deep for recursive consumers
        let quotes = format!("{}x", "> ".repeat(3000));
        assert!(markdown_to_html(&quotes).starts_with("<blockquote>"));
        let images = format!("{}x{}", "![".repeat(3000), "](/u)".repeat(3000));
        assert!(!markdown_to_html(&images).is_empty());
        let stars = format!("{}x{}", "*".repeat(3000), "*".repeat(3000));
        assert!(markdown_to_html(&stars).contains('x'));
    }

    #[test]
    fn test_setext_line_is_not_lazy() {
        // The underline never reaches the paragraph inside the quote
        assert_eq!(
            markdown_to_html("> foo\n---\n"),
            "<blockquote>\n<p>foo</p>\n</blockquote>\n<hr />\n"
        );
    }
}
