//! Graphviz dot serializer
//!
//! Resources are drawn as ellipses, blank nodes as circles and literals as
//! records. Labels are shortened with the common namespace prefixes.

use super::{SerializeError, SerializeResult};
use crate::rdf::{NamespaceManager, Node, Statement};
use std::collections::BTreeSet;
use std::io::Write;

fn quote(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Record labels treat these as field syntax
fn quote_record(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in quote(text).chars() {
        if matches!(c, '{' | '}' | '|' | '<' | '>') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Graph identifier of a node: kind prefix plus its N-Triples form
fn node_id(node: &Node) -> String {
    let prefix = match node {
        Node::Resource(_) => 'R',
        Node::Blank(_) => 'B',
        Node::Literal(_) => 'L',
    };
    quote(&format!("{}{}", prefix, node))
}

pub(super) fn write<W: Write>(statements: &[Statement], mut writer: W) -> SerializeResult<()> {
    let namespaces = NamespaceManager::new();
    let mut nodes = BTreeSet::new();

    writeln!(writer, "digraph {{")?;
    writeln!(writer, "\trankdir = LR;")?;
    writeln!(writer, "\tcharset=\"utf-8\";")?;
    writeln!(writer)?;

    for statement in statements {
        let (s, p, o) = statement
            .as_triple()
            .ok_or_else(|| SerializeError::Serialize(format!("incomplete statement {}", statement)))?;
        writeln!(
            writer,
            "\t\"{}\" -> \"{}\" [ label=\"{}\" ];",
            node_id(s),
            node_id(o),
            quote(&namespaces.label(p))
        )?;
        nodes.insert(s);
        nodes.insert(o);
    }

    writeln!(writer)?;
    for node in nodes {
        let label = namespaces.label(node);
        match node {
            Node::Resource(_) => writeln!(
                writer,
                "\t\"{}\" [ label=\"{}\", shape = ellipse, color = blue ];",
                node_id(node),
                quote(&label)
            )?,
            Node::Blank(_) => writeln!(
                writer,
                "\t\"{}\" [ label=\"\", shape = circle, color = green ];",
                node_id(node)
            )?,
            Node::Literal(_) => writeln!(
                writer,
                "\t\"{}\" [ label=\"{}\", shape = record ];",
                node_id(node),
                quote_record(&label)
            )?,
        }
    }

    writeln!(writer, "\tlabel=\"\\n\\nModel:\\n{} statements\\n\";", statements.len())?;
    writeln!(writer, "}}")?;
    Ok(())
}
