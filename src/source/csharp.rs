use std::path::Path;

use log::debug;
use tree_sitter::{Node, Parser};

use super::{Classifier, NodeRole, SourceNode, StructuralUnit};
use crate::errors::ParseError;

/// Node roles of the C# grammar
#[derive(Debug, Default, Clone, Copy)]
pub struct CSharpClassifier;

impl Classifier for CSharpClassifier {
    fn classify(&self, kind: &str) -> NodeRole {
        match kind {
            "compilation_unit" | "namespace_declaration" | "class_declaration" | "declaration_list" => {
                NodeRole::Recurse
            }
            "method_declaration" => NodeRole::Member,
            "{" | "}" => NodeRole::BraceToken,
            _ => NodeRole::Verbatim,
        }
    }
}

/// Turns C# files into structural units with tree-sitter
#[derive(Debug, Clone)]
pub struct CSharpParser {
    convert_macros_to_comments: bool,
}

impl CSharpParser {
    pub fn new(convert_macros_to_comments: bool) -> Self {
        Self {
            convert_macros_to_comments,
        }
    }

    /// Read, parse and split one file
    pub fn parse_file(&self, path: &Path) -> Result<StructuralUnit, ParseError> {
        if !path.is_file() {
            return Err(ParseError::NotFound(path.to_path_buf()));
        }

        let source = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        self.parse_source(path, &source)
    }

    /// Parse and split source text; `path` is only used in diagnostics
    pub fn parse_source(&self, path: &Path, source: &str) -> Result<StructuralUnit, ParseError> {
        if source.is_empty() {
            return Err(ParseError::Empty(path.to_path_buf()));
        }

        let source = if self.convert_macros_to_comments {
            convert_macros_to_comments(source)
        } else {
            source.to_string()
        };

        let root = parse_tree(path, &source)?;
        Ok(StructuralUnit::from_tree(source, &root, &CSharpClassifier))
    }
}

/// Comment out preprocessor lines (`#if`, `#region`, ...) so they do not break the grammar
pub fn convert_macros_to_comments(source: &str) -> String {
    let mut result = String::with_capacity(source.len() + 64);

    for line in source.split('\n') {
        if line.trim().starts_with('#') {
            result.push_str("// ");
        }
        result.push_str(line);
        result.push('\n');
    }

    result
}

/// Parse C# text into an owned node tree
pub fn parse_tree(path: &Path, source: &str) -> Result<SourceNode, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
        .map_err(|e| ParseError::Grammar(e.to_string()))?;

    let tree = parser.parse(source, None).ok_or_else(|| ParseError::Failed {
        path: path.to_path_buf(),
        reason: "no root node found".to_string(),
    })?;

    let root = tree.root_node();
    if root.has_error() {
        debug!("{} contains syntax errors, continuing with a partial tree", path.display());
    }

    convert_node(path, root, source.as_bytes())
}

fn convert_node(path: &Path, node: Node, source: &[u8]) -> Result<SourceNode, ParseError> {
    let text = node.utf8_text(source).map_err(|e| ParseError::Failed {
        path: path.to_path_buf(),
        reason: format!("node text is not valid UTF-8: {}", e),
    })?;

    let mut cursor = node.walk();
    let children = node
        .children(&mut cursor)
        .map(|child| convert_node(path, child, source))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SourceNode::new(node.kind(), text, children))
}
