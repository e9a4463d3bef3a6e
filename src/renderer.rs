//! HTML rendering.
//!
//! Blocks own their surrounding newlines; `cr` inserts one only when the
//! output does not already end with one, so tight list items render as
//! `<li>inline</li>` while loose items get block children on their own lines.

use crate::ast::{ListKind, Node};
use crate::extension::RenderRule;

/// Render a document tree to HTML, dispatching `Custom` nodes to the given
/// render rules by name.
pub fn render_with(doc: &Node, rules: &[Box<dyn RenderRule>]) -> String {
    let mut r = Renderer {
        out: String::new(),
        rules,
    };
    r.block(doc, false);
    r.out
}

struct Renderer<'a> {
    out: String,
    rules: &'a [Box<dyn RenderRule>],
}

impl Renderer<'_> {
    fn cr(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn blocks(&mut self, children: &[Node], tight: bool) {
        for child in children {
            self.block(child, tight);
        }
    }

    /// `tight` is set when rendering the children of a tight list item:
    /// paragraphs then emit their inline content without `<p>` tags.
    fn block(&mut self, node: &Node, tight: bool) {
        match node {
            Node::Document(children) => self.blocks(children, false),
            Node::Paragraph(children) => {
                if tight {
                    self.inlines(children);
                } else {
                    self.cr();
                    self.out.push_str("<p>");
                    self.inlines(children);
                    self.out.push_str("</p>\n");
                }
            }
            Node::Heading { level, children } => {
                self.cr();
                self.out.push_str(&format!("<h{}>", level));
                self.inlines(children);
                self.out.push_str(&format!("</h{}>\n", level));
            }
            Node::CodeBlock { info, literal } => {
                self.cr();
                match info.split_whitespace().next() {
                    Some(lang) => self.out.push_str(&format!(
                        "<pre><code class=\"language-{}\">",
                        escape_html(lang)
                    )),
                    None => self.out.push_str("<pre><code>"),
                }
                self.out.push_str(&escape_html(literal));
                self.out.push_str("</code></pre>\n");
            }
            Node::ThematicBreak => {
                self.cr();
                self.out.push_str("<hr />\n");
            }
            Node::BlockQuote(children) => {
                self.cr();
                self.out.push_str("<blockquote>\n");
                self.blocks(children, false);
                self.cr();
                self.out.push_str("</blockquote>\n");
            }
            Node::List {
                kind,
                tight,
                children,
            } => {
                self.cr();
                let close = match kind {
                    ListKind::Bullet { .. } => {
                        self.out.push_str("<ul>\n");
                        "</ul>\n"
                    }
                    ListKind::Ordered { start, .. } => {
                        if *start == 1 {
                            self.out.push_str("<ol>\n");
                        } else {
                            self.out.push_str(&format!("<ol start=\"{}\">\n", start));
                        }
                        "</ol>\n"
                    }
                };
                for item in children {
                    self.render_item(item, *tight);
                }
                self.cr();
                self.out.push_str(close);
            }
            // An item outside a list can only come from a postprocessor
            Node::ListItem(_) => self.render_item(node, tight),
            Node::HtmlBlock(html) => {
                self.cr();
                self.out.push_str(html);
                self.out.push('\n');
            }
            Node::Custom {
                name,
                attributes,
                children,
                literal,
            } => {
                self.cr();
                self.custom(name, attributes, children, literal);
                self.cr();
            }
            inline => self.inline(inline),
        }
    }

    fn render_item(&mut self, item: &Node, tight: bool) {
        let Node::ListItem(children) = item else {
            self.block(item, tight);
            return;
        };
        self.out.push_str("<li>");
        self.blocks(children, tight);
        // Loose items close on their own line; tight and empty ones hug
        // the content
        if !tight && !children.is_empty() {
            self.cr();
        }
        self.out.push_str("</li>\n");
    }

    fn inlines(&mut self, children: &[Node]) {
        for child in children {
            self.inline(child);
        }
    }

    fn inline(&mut self, node: &Node) {
        match node {
            Node::Text(text) => self.out.push_str(&escape_html(text)),
            Node::SoftBreak => self.out.push('\n'),
            Node::HardBreak => self.out.push_str("<br />\n"),
            Node::Code(code) => {
                self.out.push_str("<code>");
                self.out.push_str(&escape_html(code));
                self.out.push_str("</code>");
            }
            Node::Emphasis(children) => {
                self.out.push_str("<em>");
                self.inlines(children);
                self.out.push_str("</em>");
            }
            Node::Strong(children) => {
                self.out.push_str("<strong>");
                self.inlines(children);
                self.out.push_str("</strong>");
            }
            Node::Link {
                destination,
                title,
                children,
            } => {
                self.out
                    .push_str(&format!("<a href=\"{}\"", escape_href(destination)));
                if let Some(title) = title {
                    self.out
                        .push_str(&format!(" title=\"{}\"", escape_html(title)));
                }
                self.out.push('>');
                self.inlines(children);
                self.out.push_str("</a>");
            }
            Node::Image {
                destination,
                title,
                children,
            } => {
                self.out
                    .push_str(&format!("<img src=\"{}\" alt=\"", escape_href(destination)));
                let mut alt = String::new();
                collect_plain_text(children, &mut alt);
                self.out.push_str(&escape_html(&alt));
                self.out.push('"');
                if let Some(title) = title {
                    self.out
                        .push_str(&format!(" title=\"{}\"", escape_html(title)));
                }
                self.out.push_str(" />");
            }
            Node::Autolink { url, email } => {
                let href = if *email {
                    format!("mailto:{}", url)
                } else {
                    url.clone()
                };
                self.out.push_str(&format!(
                    "<a href=\"{}\">{}</a>",
                    escape_href(&href),
                    escape_html(url)
                ));
            }
            Node::HtmlInline(html) => self.out.push_str(html),
            Node::Custom {
                name,
                attributes,
                children,
                literal,
            } => self.custom(name, attributes, children, literal),
            block => self.block(block, false),
        }
    }

    fn custom(
        &mut self,
        name: &str,
        attributes: &[(String, String)],
        children: &[Node],
        literal: &str,
    ) {
        match self.rules.iter().find(|r| r.name() == name) {
            Some(rule) => {
                let inner = render_with_rules(children, self.rules);
                self.out.push_str(&rule.render(attributes, &inner, literal));
            }
            None => {
                tracing::warn!(name, "no render rule registered; emitting content only");
                if children.is_empty() {
                    self.out.push_str(&escape_html(literal));
                } else {
                    self.blocks(children, false);
                }
            }
        }
    }
}

fn render_with_rules(children: &[Node], rules: &[Box<dyn RenderRule>]) -> String {
    let mut r = Renderer {
        out: String::new(),
        rules,
    };
    r.blocks(children, false);
    r.out
}

/// Image alt text: the inline content flattened to plain text.
fn collect_plain_text(children: &[Node], out: &mut String) {
    for child in children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Code(code) => out.push_str(code),
            Node::SoftBreak | Node::HardBreak => out.push('\n'),
            Node::Autolink { url, .. } => out.push_str(url),
            other => {
                if let Some(nested) = other.children() {
                    collect_plain_text(nested, out);
                }
            }
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Percent-encode the bytes a URL attribute may not carry, leaving existing
/// percent escapes and URL syntax alone.
pub fn escape_href(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for &b in url.as_bytes() {
        match b {
            b'&' => out.push_str("&amp;"),
            b'\'' => out.push_str("&#x27;"),
            _ if b.is_ascii_alphanumeric() => out.push(b as char),
            b'-' | b'_' | b'.' | b'+' | b'!' | b'*' | b'(' | b')' | b',' | b'%' | b'#' | b'@'
            | b'?' | b'=' | b';' | b':' | b'/' | b'$' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::Pipeline;

    fn render(input: &str) -> String {
        let pipeline = Pipeline::new();
        let doc = pipeline.parse(input);
        pipeline.render_html(&doc)
    }

    #[test]
    fn test_paragraph() {
        assert_eq!(render("hello\n"), "<p>hello</p>\n");
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(render("# a\n\n###### b\n"), "<h1>a</h1>\n<h6>b</h6>\n");
    }

    #[test]
    fn test_code_block_language_class() {
        assert_eq!(
            render("```rust ignore\nlet x = 1;\n```\n"),
            "<pre><code class=\"language-rust\">let x = 1;\n</code></pre>\n"
        );
    }

    #[test]
    fn test_text_is_escaped() {
        assert_eq!(render("a < b & c\n"), "<p>a &lt; b &amp; c</p>\n");
    }

    #[test]
    fn test_code_span_escaped() {
        assert_eq!(render("`<div>`\n"), "<p><code>&lt;div&gt;</code></p>\n");
    }

    #[test]
    fn test_tight_list_items_hug_content() {
        assert_eq!(
            render("- a\n- b\n"),
            "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_loose_list_items_wrap_paragraphs() {
        assert_eq!(
            render("- a\n\n- b\n"),
            "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_empty_item_in_loose_list() {
        assert_eq!(
            render("- a\n-\n\n- b\n"),
            "<ul>\n<li>\n<p>a</p>\n</li>\n<li></li>\n<li>\n<p>b</p>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_tight_item_with_sublist() {
        assert_eq!(
            render("- a\n  - b\n"),
            "<ul>\n<li>a\n<ul>\n<li>b</li>\n</ul>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_ordered_list_start_attribute() {
        assert_eq!(
            render("3. c\n"),
            "<ol start=\"3\">\n<li>c</li>\n</ol>\n"
        );
        assert_eq!(render("1. c\n"), "<ol>\n<li>c</li>\n</ol>\n");
    }

    #[test]
    fn test_block_quote() {
        assert_eq!(
            render("> quoted\n"),
            "<blockquote>\n<p>quoted</p>\n</blockquote>\n"
        );
    }

    #[test]
    fn test_link_with_title() {
        assert_eq!(
            render("[x](/url \"t\")\n"),
            "<p><a href=\"/url\" title=\"t\">x</a></p>\n"
        );
    }

    #[test]
    fn test_href_percent_encoding() {
        assert_eq!(
            render("[x](</my uri>)\n"),
            "<p><a href=\"/my%20uri\">x</a></p>\n"
        );
        assert_eq!(
            render("[x](/url?a=b&c=d)\n"),
            "<p><a href=\"/url?a=b&amp;c=d\">x</a></p>\n"
        );
    }

    #[test]
    fn test_image_alt_is_plain_text() {
        assert_eq!(
            render("![*em* alt](/img.png)\n"),
            "<p><img src=\"/img.png\" alt=\"em alt\" /></p>\n"
        );
    }

    #[test]
    fn test_email_autolink_gets_mailto() {
        assert_eq!(
            render("<a@b.example>\n"),
            "<p><a href=\"mailto:a@b.example\">a@b.example</a></p>\n"
        );
    }

    #[test]
    fn test_html_passthrough() {
        assert_eq!(render("<div>\nraw\n</div>\n"), "<div>\nraw\n</div>\n");
        assert_eq!(render("a <b>c</b>\n"), "<p>a <b>c</b></p>\n");
    }

    #[test]
    fn test_hard_break() {
        assert_eq!(render("a  \nb\n"), "<p>a<br />\nb</p>\n");
    }
}
