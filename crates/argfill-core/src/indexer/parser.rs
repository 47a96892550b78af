//! tree-sitter wrapper used by the extraction passes.

use tree_sitter::{Node, Parser, Tree};

use crate::errors::{ArgfillError, ArgfillResult};

/// A parsed Python source file.
pub struct ParsedSource {
    pub path: String,
    pub source: String,
    pub tree: Tree,
}

impl ParsedSource {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: Node<'_>) -> &str {
        node_text(node, &self.source)
    }
}

pub fn parse_python(path: &str, source: String) -> ArgfillResult<ParsedSource> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ArgfillError::Parse(format!("Failed to set language: {e}")))?;
    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or_else(|| ArgfillError::Parse(format!("Failed to parse {path}")))?;
    Ok(ParsedSource {
        path: path.to_string(),
        source,
        tree,
    })
}

/// Source text covered by `node`. Invalid UTF-8 boundaries yield "".
pub fn node_text<'s>(node: Node<'_>, source: &'s str) -> &'s str {
    source.get(node.start_byte()..node.end_byte()).unwrap_or("")
}

/// Named children of `node`, skipping comments.
pub fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    let children = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    children
}
