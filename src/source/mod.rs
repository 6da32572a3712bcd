/*!
 * Structural view of a parsed source file.
 *
 * A parser front end (see `csharp`) turns source text into an owned
 * `SourceNode` tree. A `Classifier` assigns every node kind a `NodeRole`, and
 * the visitor below splits the tree into:
 * - the skeleton: everything except member bodies
 * - the members: every member declaration, verbatim and in document order
 */

pub mod csharp;

/// How the skeleton visitor treats a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Container: visit the children
    Recurse,
    /// Member declaration: left out of the skeleton, collected as a member
    Member,
    /// Opening or closing brace, emitted on its own line
    BraceToken,
    /// Anything else, copied as is
    Verbatim,
}

/// Maps node kinds of one grammar to roles
pub trait Classifier: Send + Sync {
    fn classify(&self, kind: &str) -> NodeRole;
}

/// Parser-independent tree node: a kind tag, the exact source text and the children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
    pub kind: String,
    pub text: String,
    pub children: Vec<SourceNode>,
}

impl SourceNode {
    pub fn new(kind: impl Into<String>, text: impl Into<String>, children: Vec<SourceNode>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            children,
        }
    }

    pub fn leaf(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(kind, text, Vec::new())
    }
}

/// One compilation unit split into skeleton and members
///
/// Immutable once built; the orchestrator consumes it once per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralUnit {
    source_text: String,
    skeleton: String,
    members: Vec<String>,
}

impl StructuralUnit {
    pub fn new(source_text: impl Into<String>, skeleton: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            source_text: source_text.into(),
            skeleton: skeleton.into(),
            members,
        }
    }

    /// Split a parsed tree using the given classification
    pub fn from_tree(source_text: impl Into<String>, root: &SourceNode, classifier: &dyn Classifier) -> Self {
        Self {
            source_text: source_text.into(),
            skeleton: render_skeleton(root, classifier),
            members: collect_members(root, classifier),
        }
    }

    /// The complete source, as parsed
    pub fn source_text(&self) -> &str {
        &self.source_text
    }

    /// Everything except member declarations
    pub fn skeleton(&self) -> &str {
        &self.skeleton
    }

    /// Member declarations in document order
    pub fn members(&self) -> &[String] {
        &self.members
    }
}

/// Render everything except members
///
/// Braces get their own lines; verbatim text ending with `;` ends a line,
/// other verbatim text is followed by a space.
pub fn render_skeleton(root: &SourceNode, classifier: &dyn Classifier) -> String {
    let mut skeleton = String::new();
    visit_skeleton(root, classifier, &mut skeleton);
    skeleton
}

fn visit_skeleton(node: &SourceNode, classifier: &dyn Classifier, out: &mut String) {
    match classifier.classify(&node.kind) {
        NodeRole::Recurse => {
            for child in &node.children {
                visit_skeleton(child, classifier, out);
            }
        }
        NodeRole::Member => {}
        NodeRole::BraceToken => {
            out.push('\n');
            out.push_str(&node.kind);
            out.push('\n');
        }
        NodeRole::Verbatim => {
            out.push_str(&node.text);
            out.push(if node.text.ends_with(';') { '\n' } else { ' ' });
        }
    }
}

/// Collect the text of every member node, walking the whole tree in document order
pub fn collect_members(root: &SourceNode, classifier: &dyn Classifier) -> Vec<String> {
    let mut members = Vec::new();
    visit_members(root, classifier, &mut members);
    members
}

fn visit_members(node: &SourceNode, classifier: &dyn Classifier, out: &mut Vec<String>) {
    if classifier.classify(&node.kind) == NodeRole::Member {
        out.push(node.text.clone());
    }

    for child in &node.children {
        visit_members(child, classifier, out);
    }
}
