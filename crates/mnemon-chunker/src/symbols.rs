//! Per-language symbol sets and the depth-first collector.
//!
//! The walk emits one symbol per matched node and does not descend into it,
//! so every source line belongs to at most one chunk.

use tree_sitter::Node;

use mnemon_core::chunk::Language;

/// A matched symbol, rows 0-based inclusive.
#[derive(Debug, Clone)]
pub struct SymbolNode {
    pub name: String,
    pub kind: &'static str,
    pub start_row: usize,
    pub end_row: usize,
}

/// Collect symbols from the tree root in document order.
pub fn collect_symbols(root: Node<'_>, source: &str, language: Language) -> Vec<SymbolNode> {
    let mut out = Vec::new();
    walk(root, source, language, &mut out);
    out
}

fn walk(node: Node<'_>, source: &str, language: Language, out: &mut Vec<SymbolNode>) {
    if let Some(symbol) = match_symbol(node, source, language) {
        out.push(symbol);
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(child, source, language, out);
    }
}

fn match_symbol(node: Node<'_>, source: &str, language: Language) -> Option<SymbolNode> {
    let kind = match language {
        Language::Typescript | Language::Javascript => match node.kind() {
            "function_declaration" | "function_expression" | "function"
            | "generator_function_declaration" | "arrow_function" => "function",
            "method_definition" => "method",
            "class_declaration" => "class",
            "interface_declaration" => "interface",
            "enum_declaration" => "enum",
            "type_alias_declaration" => "type_alias",
            "variable_declarator" if is_const_object_declarator(node) => "object",
            _ => return None,
        },
        Language::Python => match node.kind() {
            "function_definition" => "function",
            "class_definition" => "class",
            "decorated_definition" => return decorated_symbol(node, source),
            _ => return None,
        },
        _ => return None,
    };

    Some(SymbolNode {
        name: symbol_name(node, source),
        kind,
        start_row: node.start_position().row,
        end_row: end_row(node),
    })
}

/// A `const` binding whose initializer is an object literal.
fn is_const_object_declarator(node: Node<'_>) -> bool {
    let value_is_object = node
        .child_by_field_name("value")
        .map(|v| v.kind() == "object")
        .unwrap_or(false);
    if !value_is_object {
        return false;
    }
    node.parent()
        .filter(|p| p.kind() == "lexical_declaration")
        .and_then(|p| p.child(0))
        .map(|c| c.kind() == "const")
        .unwrap_or(false)
}

/// A Python `decorated_definition` takes the inner definition's name; the
/// chunk spans the decorators too.
fn decorated_symbol(node: Node<'_>, source: &str) -> Option<SymbolNode> {
    let mut cursor = node.walk();
    let inner = node
        .named_children(&mut cursor)
        .find(|c| matches!(c.kind(), "function_definition" | "class_definition"))?;
    let kind = if inner.kind() == "class_definition" {
        "class"
    } else {
        "function"
    };
    Some(SymbolNode {
        name: symbol_name(inner, source),
        kind,
        start_row: node.start_position().row,
        end_row: end_row(node),
    })
}

/// First identifier-like child; `"anonymous"` otherwise.
fn symbol_name(node: Node<'_>, source: &str) -> String {
    if let Some(name) = node.child_by_field_name("name") {
        if let Ok(text) = name.utf8_text(source.as_bytes()) {
            return text.to_string();
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if matches!(
            child.kind(),
            "identifier" | "type_identifier" | "property_identifier"
        ) {
            if let Ok(text) = child.utf8_text(source.as_bytes()) {
                return text.to_string();
            }
        }
    }
    "anonymous".to_string()
}

/// Inclusive end row. A node ending at column 0 of the next line (trailing
/// newline) still belongs to its last content line.
fn end_row(node: Node<'_>) -> usize {
    let end = node.end_position();
    if end.column == 0 && end.row > node.start_position().row {
        end.row - 1
    } else {
        end.row
    }
}
