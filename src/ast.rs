/// AST node types for CommonMark documents
use serde::{Deserialize, Serialize};

/// Deepest tree the parser will build. Markers that would nest containers,
/// emphasis, or brackets past this depth are kept as literal text, so
/// recursive consumers of the tree stay within stack limits.
pub const MAX_DEPTH: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Document(Vec<Node>),
    // Block-level nodes
    Paragraph(Vec<Node>),
    Heading {
        level: u8,
        children: Vec<Node>,
    },
    CodeBlock {
        info: String,
        literal: String,
    },
    ThematicBreak,
    BlockQuote(Vec<Node>),
    List {
        kind: ListKind,
        tight: bool,
        children: Vec<Node>, // Contains ListItem nodes
    },
    ListItem(Vec<Node>),
    HtmlBlock(String), // Raw HTML block (passed through unchanged)
    // Inline nodes
    Text(String),
    SoftBreak,
    HardBreak,           // <br /> tag
    Code(String),        // Inline code span
    Emphasis(Vec<Node>), // <em> tag
    Strong(Vec<Node>),   // <strong> tag
    Link {
        destination: String,
        title: Option<String>,
        children: Vec<Node>,
    },
    Image {
        destination: String,
        title: Option<String>,
        children: Vec<Node>, // Alt text can contain inline elements
    },
    Autolink {
        url: String,
        email: bool,
    },
    HtmlInline(String), // Raw HTML inline (passed through unchanged)
    // Extension-contributed nodes. Kept as data rather than a trait object so
    // the tree stays serializable; renderer hooks decide the output per name.
    Custom {
        name: String,
        attributes: Vec<(String, String)>,
        children: Vec<Node>,
        literal: String,
    },
}

impl Node {
    /// Child list of a container node, if it has one.
    pub fn children(&self) -> Option<&[Node]> {
        match self {
            Node::Document(children)
            | Node::Paragraph(children)
            | Node::BlockQuote(children)
            | Node::ListItem(children)
            | Node::Emphasis(children)
            | Node::Strong(children) => Some(children),
            Node::Heading { children, .. }
            | Node::List { children, .. }
            | Node::Link { children, .. }
            | Node::Image { children, .. }
            | Node::Custom { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Height of the subtree under this node: 0 for a childless node.
    pub fn depth(&self) -> usize {
        match self.children() {
            Some(children) => 1 + children.iter().map(Node::depth).max().unwrap_or(0),
            None => 0,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Document(children)
            | Node::Paragraph(children)
            | Node::BlockQuote(children)
            | Node::ListItem(children)
            | Node::Emphasis(children)
            | Node::Strong(children) => Some(children),
            Node::Heading { children, .. }
            | Node::List { children, .. }
            | Node::Link { children, .. }
            | Node::Image { children, .. }
            | Node::Custom { children, .. } => Some(children),
            _ => None,
        }
    }
}

/// Marker classification for a list: bullet character, or ordered start
/// number plus delimiter (`.` or `)`). A marker continues an existing list
/// only if this matches; otherwise it starts a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListKind {
    Bullet { marker: char },
    Ordered { start: u64, delimiter: char },
}

impl ListKind {
    pub fn matches(&self, other: &ListKind) -> bool {
        match (self, other) {
            (ListKind::Bullet { marker: a }, ListKind::Bullet { marker: b }) => a == b,
            (ListKind::Ordered { delimiter: a, .. }, ListKind::Ordered { delimiter: b, .. }) => {
                a == b
            }
            _ => false,
        }
    }
}
