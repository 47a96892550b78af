//! Type annotations as [`TypeExpr`] trees, converted from tree-sitter nodes.
//!
//! Annotations found during extraction are converted straight from the
//! `type` node. Stored annotation text and quoted forward references go
//! through [`parse_annotation`], which parses the text as a one-expression
//! module and converts that.

use std::fmt;

use tree_sitter::Node;

use crate::indexer::parser::{named_children, node_text, parse_python};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// Possibly dotted name, e.g. `int` or `dt.date`.
    Name(String),
    Subscript {
        base: String,
        args: Vec<TypeExpr>,
    },
    Union(Vec<TypeExpr>),
    None,
    Ellipsis,
    /// Contents of a string literal, without quotes.
    Str(String),
    Number(String),
    /// `(a, b)` or `[a, b]` inside a subscript.
    List(Vec<TypeExpr>),
    /// A valid expression that does not denote a type, such as the
    /// `Field(...)` metadata of `Annotated`.
    Other(String),
    Invalid(String),
}

impl TypeExpr {
    /// Last segment of a name or subscript base.
    pub fn head(&self) -> Option<&str> {
        match self {
            TypeExpr::Name(name) | TypeExpr::Subscript { base: name, .. } => {
                Some(name.rsplit('.').next().unwrap_or(name))
            }
            _ => None,
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Name(name) => write!(f, "{name}"),
            TypeExpr::Subscript { base, args } => {
                write!(f, "{base}[{}]", join(args, ", "))
            }
            TypeExpr::Union(items) => write!(f, "{}", join(items, " | ")),
            TypeExpr::None => write!(f, "None"),
            TypeExpr::Ellipsis => write!(f, "..."),
            TypeExpr::Str(text) => write!(f, "'{text}'"),
            TypeExpr::Number(text) | TypeExpr::Other(text) | TypeExpr::Invalid(text) => {
                write!(f, "{text}")
            }
            TypeExpr::List(items) => write!(f, "[{}]", join(items, ", ")),
        }
    }
}

fn join(items: &[TypeExpr], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Convert an expression node (or the `type` node wrapping one).
pub fn type_expr(node: Node<'_>, source: &str) -> TypeExpr {
    let text = || node_text(node, source).to_string();
    match node.kind() {
        "type" | "parenthesized_expression" => match named_children(node).as_slice() {
            [inner] => type_expr(*inner, source),
            _ => TypeExpr::Other(text()),
        },
        "none" => TypeExpr::None,
        "ellipsis" => TypeExpr::Ellipsis,
        "identifier" | "attribute" => {
            dotted_name(node, source).map_or_else(|| TypeExpr::Other(text()), TypeExpr::Name)
        }
        "subscript" => {
            let base = node
                .child_by_field_name("value")
                .and_then(|value| dotted_name(value, source));
            let Some(base) = base else {
                return TypeExpr::Other(text());
            };
            let mut cursor = node.walk();
            let args = node
                .children_by_field_name("subscript", &mut cursor)
                .map(|arg| type_expr(arg, source))
                .collect();
            TypeExpr::Subscript { base, args }
        }
        "generic_type" => match named_children(node).as_slice() {
            [base, parameters] if parameters.kind() == "type_parameter" => TypeExpr::Subscript {
                base: node_text(*base, source).to_string(),
                args: named_children(*parameters)
                    .into_iter()
                    .map(|arg| type_expr(arg, source))
                    .collect(),
            },
            _ => TypeExpr::Other(text()),
        },
        "member_type" => match named_children(node).as_slice() {
            [object, attribute] => match type_expr(*object, source) {
                TypeExpr::Name(object) => {
                    TypeExpr::Name(format!("{object}.{}", node_text(*attribute, source)))
                }
                _ => TypeExpr::Other(text()),
            },
            _ => TypeExpr::Other(text()),
        },
        "union_type" => union(named_children(node), source),
        "binary_operator" => {
            let is_pipe = node
                .child_by_field_name("operator")
                .is_some_and(|op| op.kind() == "|");
            let (Some(left), Some(right), true) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
                is_pipe,
            ) else {
                return TypeExpr::Other(text());
            };
            union(vec![left, right], source)
        }
        "string" => TypeExpr::Str(string_contents(node, source)),
        "concatenated_string" => TypeExpr::Str(
            named_children(node)
                .into_iter()
                .map(|part| string_contents(part, source))
                .collect(),
        ),
        "integer" | "float" => TypeExpr::Number(text()),
        "unary_operator" => match node.child_by_field_name("argument").map(|a| a.kind()) {
            Some("integer" | "float") => TypeExpr::Number(text()),
            _ => TypeExpr::Other(text()),
        },
        "true" | "false" => TypeExpr::Name(text()),
        "list" | "tuple" => TypeExpr::List(
            named_children(node)
                .into_iter()
                .map(|item| type_expr(item, source))
                .collect(),
        ),
        _ => TypeExpr::Other(text()),
    }
}

/// `X | Y` with nested unions flattened.
fn union(sides: Vec<Node<'_>>, source: &str) -> TypeExpr {
    let mut items = Vec::new();
    for side in sides {
        match type_expr(side, source) {
            TypeExpr::Union(members) => items.extend(members),
            member => items.push(member),
        }
    }
    TypeExpr::Union(items)
}

/// `a.b.c` for identifiers and attribute chains, `None` for anything else.
fn dotted_name(node: Node<'_>, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()),
        "attribute" => {
            let object = dotted_name(node.child_by_field_name("object")?, source)?;
            let attribute = node.child_by_field_name("attribute")?;
            Some(format!("{object}.{}", node_text(attribute, source)))
        }
        _ => None,
    }
}

fn string_contents(node: Node<'_>, source: &str) -> String {
    named_children(node)
        .into_iter()
        .filter(|part| part.kind() == "string_content")
        .map(|part| node_text(part, source))
        .collect()
}

/// Parse annotation text. Text that is not exactly one expression yields
/// [`TypeExpr::Invalid`].
pub fn parse_annotation(text: &str) -> TypeExpr {
    let trimmed = text.trim();
    let invalid = || TypeExpr::Invalid(trimmed.to_string());
    let Ok(parsed) = parse_python("<annotation>", trimmed.to_string()) else {
        return invalid();
    };
    let root = parsed.root();
    if root.has_error() {
        return invalid();
    }
    let statements = named_children(root);
    let [statement] = statements.as_slice() else {
        return invalid();
    };
    if statement.kind() != "expression_statement" {
        return invalid();
    }
    let expressions = named_children(*statement);
    match expressions.as_slice() {
        [expression] if !expression.kind().ends_with("assignment") => {
            type_expr(*expression, &parsed.source)
        }
        _ => invalid(),
    }
}
