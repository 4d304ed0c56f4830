//! RDF/JSON serializer
//!
//! Output shape: `{ subject: { predicate: [ object, ... ] } }` where each
//! object is `{"type": "uri" | "bnode" | "literal", "value": ...}` plus
//! `datatype` or `lang` for literals. Blank subjects and objects are written
//! as `_:id`.

use super::{SerializeError, SerializeResult};
use crate::rdf::{vocab::xsd, Node, Statement};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Serialize)]
struct JsonObject<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    datatype: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    lang: Option<&'a str>,
}

impl<'a> JsonObject<'a> {
    fn from_node(node: &'a Node) -> Self {
        match node {
            Node::Resource(uri) => Self {
                kind: "uri",
                value: uri.to_string(),
                datatype: None,
                lang: None,
            },
            Node::Blank(id) => Self {
                kind: "bnode",
                value: format!("_:{}", id),
                datatype: None,
                lang: None,
            },
            Node::Literal(literal) => Self {
                kind: "literal",
                value: literal.lexical().to_string(),
                datatype: literal
                    .datatype()
                    .map(|dt| dt.as_str())
                    .filter(|dt| *dt != xsd::STRING),
                lang: literal.language(),
            },
        }
    }
}

fn key(node: &Node) -> SerializeResult<String> {
    match node {
        Node::Resource(uri) => Ok(uri.to_string()),
        Node::Blank(id) => Ok(format!("_:{}", id)),
        Node::Literal(_) => Err(SerializeError::Serialize(format!("literal used as key: {}", node))),
    }
}

pub(super) fn write<W: Write>(statements: &[Statement], writer: W) -> SerializeResult<()> {
    let mut graph: BTreeMap<String, BTreeMap<String, Vec<JsonObject<'_>>>> = BTreeMap::new();
    for statement in statements {
        let (s, p, o) = statement
            .as_triple()
            .ok_or_else(|| SerializeError::Serialize(format!("incomplete statement {}", statement)))?;
        graph
            .entry(key(s)?)
            .or_default()
            .entry(key(p)?)
            .or_default()
            .push(JsonObject::from_node(o));
    }
    serde_json::to_writer_pretty(writer, &graph)?;
    Ok(())
}
