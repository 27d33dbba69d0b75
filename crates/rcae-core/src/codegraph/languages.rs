//! Per-language tree-sitter symbol extraction (§4.2 step 3, fallback path)
//!
//! Rather than one hand-written visitor per grammar, each language is
//! described by a small table mapping tree-sitter node kinds to
//! [`CodeNodeKind`]; a single generic walk produces nodes for every
//! grammar. Edges are heuristic: a node's body text containing another
//! node's name in the same file is recorded as a `references` edge, tagged
//! `edge_source = heuristic` in its metadata (§4.2 "EdgeSource::Heuristic").

use super::parser_pool::SourceLanguage;
use crate::model::{CodeEdge, CodeEdgeKind, CodeNode, CodeNodeKind};
use chrono::Utc;
use std::collections::HashMap;
use tree_sitter::{Node, Tree};

struct KindRule {
    ts_kind: &'static str,
    node_kind: CodeNodeKind,
}

fn rules_for(language: SourceLanguage) -> &'static [KindRule] {
    use CodeNodeKind::*;
    use SourceLanguage::*;
    match language {
        Rust => &[
            KindRule { ts_kind: "function_item", node_kind: Function },
            KindRule { ts_kind: "struct_item", node_kind: Class },
            KindRule { ts_kind: "enum_item", node_kind: Class },
            KindRule { ts_kind: "trait_item", node_kind: Interface },
        ],
        Python => &[
            KindRule { ts_kind: "function_definition", node_kind: Function },
            KindRule { ts_kind: "class_definition", node_kind: Class },
        ],
        JavaScript => &[
            KindRule { ts_kind: "function_declaration", node_kind: Function },
            KindRule { ts_kind: "method_definition", node_kind: Function },
            KindRule { ts_kind: "class_declaration", node_kind: Class },
        ],
        TypeScript => &[
            KindRule { ts_kind: "function_declaration", node_kind: Function },
            KindRule { ts_kind: "method_definition", node_kind: Function },
            KindRule { ts_kind: "class_declaration", node_kind: Class },
            KindRule { ts_kind: "interface_declaration", node_kind: Interface },
            KindRule { ts_kind: "type_alias_declaration", node_kind: Type },
        ],
        Go => &[
            KindRule { ts_kind: "function_declaration", node_kind: Function },
            KindRule { ts_kind: "method_declaration", node_kind: Function },
            KindRule { ts_kind: "type_declaration", node_kind: Type },
        ],
        Java => &[
            KindRule { ts_kind: "method_declaration", node_kind: Function },
            KindRule { ts_kind: "class_declaration", node_kind: Class },
            KindRule { ts_kind: "interface_declaration", node_kind: Interface },
        ],
        C => &[KindRule { ts_kind: "function_definition", node_kind: Function }],
        Cpp => &[
            KindRule { ts_kind: "function_definition", node_kind: Function },
            KindRule { ts_kind: "class_specifier", node_kind: Class },
            KindRule { ts_kind: "struct_specifier", node_kind: Class },
        ],
    }
}

/// Finds the symbol's name: the grammar's `name` field if present, else the
/// first `identifier`-shaped child (covers C/C++ function declarators, which
/// nest the name inside a `function_declarator` rather than exposing it
/// directly as a `name` field).
fn extract_name<'a>(node: Node<'a>, source: &'a str) -> Option<&'a str> {
    if let Some(name_node) = node.child_by_field_name("name") {
        return name_node.utf8_text(source.as_bytes()).ok();
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind().contains("identifier") {
            if let Ok(text) = child.utf8_text(source.as_bytes()) {
                return Some(text);
            }
        }
        if child.kind() == "function_declarator" || child.kind() == "field_identifier" {
            if let Some(found) = extract_name(child, source) {
                return Some(found);
            }
        }
    }
    None
}

fn signature_line(node: Node, source: &str) -> String {
    let text = node.utf8_text(source.as_bytes()).unwrap_or_default();
    text.lines().next().unwrap_or_default().trim().to_string()
}

/// Walks `tree`, producing one [`CodeNode`] per rule match plus heuristic
/// `references` edges between nodes whose body text mentions another
/// node's name.
pub fn extract_symbols(
    language: SourceLanguage,
    tree: &Tree,
    source: &str,
    rel_path: &str,
) -> (Vec<CodeNode>, Vec<CodeEdge>) {
    let rules = rules_for(language);
    let now = Utc::now();
    let mut nodes = Vec::new();
    let mut bodies: HashMap<String, String> = HashMap::new();

    let mut cursor = tree.walk();
    walk_recursive(cursor.node(), source, rel_path, rules, now, &mut nodes, &mut bodies);
    drop(cursor);

    let mut edges = Vec::new();
    for node in &nodes {
        let Some(body) = bodies.get(&node.id) else { continue };
        for other in &nodes {
            if other.id == node.id {
                continue;
            }
            if body.contains(other.name.as_str()) {
                let id = CodeEdge::make_id(&node.id, &other.id, CodeEdgeKind::References);
                let mut metadata = HashMap::new();
                metadata.insert("edge_source".to_string(), "heuristic".to_string());
                edges.push(CodeEdge {
                    id,
                    from_node: node.id.clone(),
                    to_node: other.id.clone(),
                    edge_type: CodeEdgeKind::References,
                    metadata,
                });
            }
        }
    }

    (nodes, edges)
}

fn walk_recursive(
    node: Node,
    source: &str,
    rel_path: &str,
    rules: &[KindRule],
    now: chrono::DateTime<Utc>,
    nodes: &mut Vec<CodeNode>,
    bodies: &mut HashMap<String, String>,
) {
    if let Some(rule) = rules.iter().find(|r| r.ts_kind == node.kind()) {
        if let Some(name) = extract_name(node, source) {
            let id = CodeNode::make_id(rel_path, rule.node_kind, name);
            let start = node.start_position().row as u32 + 1;
            let end = node.end_position().row as u32 + 1;
            let body = node.utf8_text(source.as_bytes()).unwrap_or_default().to_string();
            bodies.insert(id.clone(), body);
            nodes.push(CodeNode {
                id,
                kind: rule.node_kind,
                name: name.to_string(),
                file_path: rel_path.to_string(),
                start_line: Some(start),
                end_line: Some(end),
                signature: Some(signature_line(node, source)),
                summary: None,
                summary_confidence: 0.0,
                needs_ai_summary: true,
                metadata: HashMap::new(),
                created_at: now,
                updated_at: now,
            });
        }
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_recursive(child, source, rel_path, rules, now, nodes, bodies);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::Parser;

    fn parse(language: SourceLanguage, source: &str) -> Tree {
        let mut parser = Parser::new();
        let grammar = match language {
            SourceLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            _ => unreachable!(),
        };
        parser.set_language(&grammar).unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn test_extract_rust_function_and_struct() {
        let source = "struct Foo { x: i32 }\n\nfn bar(f: Foo) -> i32 {\n    f.x\n}\n";
        let tree = parse(SourceLanguage::Rust, source);
        let (nodes, _edges) = extract_symbols(SourceLanguage::Rust, &tree, source, "lib.rs");
        assert!(nodes.iter().any(|n| n.name == "Foo" && n.kind == CodeNodeKind::Class));
        assert!(nodes.iter().any(|n| n.name == "bar" && n.kind == CodeNodeKind::Function));
    }

    #[test]
    fn test_extract_references_edge() {
        let source = "struct Foo { x: i32 }\n\nfn bar(f: Foo) -> i32 {\n    f.x\n}\n";
        let tree = parse(SourceLanguage::Rust, source);
        let (_nodes, edges) = extract_symbols(SourceLanguage::Rust, &tree, source, "lib.rs");
        assert!(edges.iter().any(|e| e.edge_type == CodeEdgeKind::References));
    }

    #[test]
    fn test_extract_python_class_and_method() {
        let source = "class Greeter:\n    def greet(self):\n        print('hi')\n";
        let tree = parse(SourceLanguage::Python, source);
        let (nodes, _edges) = extract_symbols(SourceLanguage::Python, &tree, source, "g.py");
        assert!(nodes.iter().any(|n| n.name == "Greeter" && n.kind == CodeNodeKind::Class));
        assert!(nodes.iter().any(|n| n.name == "greet" && n.kind == CodeNodeKind::Function));
    }
}
