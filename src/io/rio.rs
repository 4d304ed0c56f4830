//! Node conversions to and from the rio model, and the rio-backed
//! parsers and formatters

use super::{ParseError, ParseResult, SerializeError, SerializeResult, Syntax};
use crate::rdf::{vocab::xsd, Node, Statement, Uri};
use crate::world::BlankRelabeler;
use oxiri::Iri;
use rio_api::formatter::TriplesFormatter;
use rio_api::model as rio;
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesFormatter, NTriplesParser, TurtleFormatter, TurtleParser};
use rio_xml::{RdfXmlFormatter, RdfXmlParser};
use std::io::{BufRead, Write};

/// Build a lazy statement iterator over `reader`
pub(super) fn parse<R>(
    syntax: Syntax,
    reader: R,
    base_uri: Option<&Uri>,
    mut relabeler: BlankRelabeler,
) -> ParseResult<Box<dyn Iterator<Item = ParseResult<Statement>>>>
where
    R: BufRead + 'static,
{
    let base = base_uri
        .map(|uri| {
            Iri::parse(uri.as_str().to_string()).map_err(|e| ParseError::InvalidBaseUri(format!("{}: {}", uri, e)))
        })
        .transpose()?;

    let convert = move |triple: rio::Triple<'_>| -> ParseResult<Statement> { convert_triple(triple, &mut relabeler) };

    let statements: Box<dyn Iterator<Item = ParseResult<Statement>>> = match syntax {
        Syntax::NTriples => Box::new(NTriplesParser::new(reader).into_iter(convert)),
        Syntax::Turtle => Box::new(TurtleParser::new(reader, base).into_iter(convert)),
        Syntax::RdfXml => Box::new(RdfXmlParser::new(reader, base).into_iter(convert)),
        Syntax::Json | Syntax::Dot => return Err(ParseError::NotParsable(syntax)),
    };
    Ok(statements)
}

fn convert_triple(triple: rio::Triple<'_>, relabeler: &mut BlankRelabeler) -> ParseResult<Statement> {
    let subject = convert_subject(triple.subject, relabeler)?;
    let predicate = Node::iri(triple.predicate.iri)?;
    let object = convert_object(triple.object, relabeler)?;
    Ok(Statement::triple(subject, predicate, object))
}

fn convert_subject(subject: rio::Subject<'_>, relabeler: &mut BlankRelabeler) -> ParseResult<Node> {
    match subject {
        rio::Subject::NamedNode(n) => Ok(Node::iri(n.iri)?),
        rio::Subject::BlankNode(b) => Ok(relabeler.relabel(Node::blank(b.id))),
        #[allow(unreachable_patterns)]
        other => Err(ParseError::UnsupportedTerm(other.to_string())),
    }
}

fn convert_object(object: rio::Term<'_>, relabeler: &mut BlankRelabeler) -> ParseResult<Node> {
    match object {
        rio::Term::NamedNode(n) => Ok(Node::iri(n.iri)?),
        rio::Term::BlankNode(b) => Ok(relabeler.relabel(Node::blank(b.id))),
        rio::Term::Literal(rio::Literal::Simple { value }) => Ok(Node::from(value)),
        rio::Term::Literal(rio::Literal::LanguageTaggedString { value, language }) => {
            Ok(Node::lang_literal(value, language)?)
        }
        rio::Term::Literal(rio::Literal::Typed { value, datatype }) => {
            Ok(Node::typed_literal(value, Uri::new(datatype.iri)?))
        }
        #[allow(unreachable_patterns)]
        other => Err(ParseError::UnsupportedTerm(other.to_string())),
    }
}

fn rio_subject(node: &Node) -> SerializeResult<rio::Subject<'_>> {
    match node {
        Node::Resource(uri) => Ok(rio::Subject::NamedNode(rio::NamedNode { iri: uri.as_str() })),
        Node::Blank(id) => Ok(rio::Subject::BlankNode(rio::BlankNode { id })),
        Node::Literal(_) => Err(SerializeError::Serialize(format!("literal subject {}", node))),
    }
}

fn rio_term(node: &Node) -> rio::Term<'_> {
    match node {
        Node::Resource(uri) => rio::Term::NamedNode(rio::NamedNode { iri: uri.as_str() }),
        Node::Blank(id) => rio::Term::BlankNode(rio::BlankNode { id }),
        Node::Literal(literal) => {
            let value = literal.lexical();
            let literal = match (literal.language(), literal.datatype()) {
                (Some(language), _) => rio::Literal::LanguageTaggedString { value, language },
                (None, Some(datatype)) if datatype.as_str() != xsd::STRING => rio::Literal::Typed {
                    value,
                    datatype: rio::NamedNode { iri: datatype.as_str() },
                },
                _ => rio::Literal::Simple { value },
            };
            rio::Term::Literal(literal)
        }
    }
}

fn rio_triple(statement: &Statement) -> SerializeResult<rio::Triple<'_>> {
    let (s, p, o) = statement
        .as_triple()
        .ok_or_else(|| SerializeError::Serialize(format!("incomplete statement {}", statement)))?;
    let predicate = match p {
        Node::Resource(uri) => rio::NamedNode { iri: uri.as_str() },
        other => return Err(SerializeError::Serialize(format!("non-resource predicate {}", other))),
    };
    Ok(rio::Triple {
        subject: rio_subject(s)?,
        predicate,
        object: rio_term(o),
    })
}

/// Write statements with the rio formatter for `syntax`
pub(super) fn format<W: Write>(syntax: Syntax, statements: &[Statement], writer: W) -> SerializeResult<()> {
    match syntax {
        Syntax::NTriples => {
            let mut formatter = NTriplesFormatter::new(writer);
            for statement in statements {
                formatter.format(&rio_triple(statement)?)?;
            }
            let _writer = formatter.finish();
        }
        Syntax::Turtle => {
            let mut formatter = TurtleFormatter::new(writer);
            for statement in statements {
                formatter.format(&rio_triple(statement)?)?;
            }
            formatter.finish()?;
        }
        Syntax::RdfXml => {
            let mut formatter = RdfXmlFormatter::new(writer)?;
            for statement in statements {
                formatter.format(&rio_triple(statement)?)?;
            }
            formatter.finish()?;
        }
        Syntax::Json | Syntax::Dot => {
            return Err(SerializeError::Serialize(format!("{} is not a rio syntax", syntax)));
        }
    }
    Ok(())
}
