//! SPARQL evaluation over the model's pattern matcher
//!
//! Queries are parsed by `spargebra` into algebra and evaluated bottom-up:
//! each triple pattern of a basic graph pattern becomes a statement pattern
//! (bound variables substituted, unbound positions left empty) and is fed to
//! the storage index. Blank nodes in query patterns behave as variables that
//! are never projected.

use super::{
    QueryEngine, QueryError, QueryLanguage, QueryOptions, QueryResult, QueryResults, QuerySolution, Solutions,
};
use crate::model::Model;
use crate::rdf::{Node, Statement, Uri};
use crate::storage::MemoryStorage;
use crate::world::BlankRelabeler;
use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use spargebra::algebra::{GraphPattern, GraphTarget};
use spargebra::term::{
    GraphName, GroundQuad, GroundSubject, GroundTerm, Literal, NamedNode, NamedNodePattern, Quad, Subject, Term,
    TermPattern, TriplePattern,
};
use spargebra::{GraphUpdateOperation, Query, Update};
use tracing::debug;

/// Prefix marking blank-node variables inside solutions
const BLANK_VARIABLE: &str = "_:";

/// Built-in SPARQL engine
#[derive(Debug, Clone, Copy, Default)]
pub struct SparqlEngine;

impl SparqlEngine {
    pub fn new() -> Self {
        Self
    }

    fn query(&self, model: &Model, text: &str, base_uri: Option<&Uri>) -> QueryResult<QueryResults> {
        let query = Query::parse(text, base_uri.map(Uri::as_str)).map_err(|e| QueryError::Syntax(e.to_string()))?;
        debug!("Evaluating SPARQL query: {}", query);

        match query {
            Query::Select { dataset, pattern, .. } => {
                reject_dataset(dataset.is_some())?;
                let rows = evaluate(model, &pattern)?;
                let variables = projected_variables(&pattern).unwrap_or_else(|| visible_variables(&rows));
                Ok(QueryResults::Bindings(Solutions::new(variables, rows)))
            }
            Query::Ask { dataset, pattern, .. } => {
                reject_dataset(dataset.is_some())?;
                Ok(QueryResults::Boolean(!evaluate(model, &pattern)?.is_empty()))
            }
            Query::Construct {
                template,
                dataset,
                pattern,
                ..
            } => {
                reject_dataset(dataset.is_some())?;
                let rows = evaluate(model, &pattern)?;
                Ok(QueryResults::Graph(construct(model, &template, &rows)?))
            }
            Query::Describe { .. } => Err(QueryError::Unsupported("DESCRIBE queries".to_string())),
        }
    }

    fn update(&self, model: &Model, text: &str, base_uri: Option<&Uri>) -> QueryResult<QueryResults> {
        let update = Update::parse(text, base_uri.map(Uri::as_str)).map_err(|e| QueryError::Syntax(e.to_string()))?;

        for operation in &update.operations {
            match operation {
                GraphUpdateOperation::InsertData { data } => insert_data(model, data)?,
                GraphUpdateOperation::DeleteData { data } => delete_data(model, data)?,
                GraphUpdateOperation::Clear {
                    graph: GraphTarget::DefaultGraph,
                    ..
                } => {
                    let removed = clear(model)?;
                    debug!("CLEAR DEFAULT removed {} statements", removed);
                }
                #[allow(unreachable_patterns)]
                other => return Err(QueryError::Unsupported(format!("update operation {}", other))),
            }
        }
        Ok(QueryResults::Boolean(true))
    }
}

impl QueryEngine for SparqlEngine {
    fn execute(&self, model: &Model, query: &str, options: &QueryOptions) -> QueryResult<QueryResults> {
        let base_uri = options.base_uri.as_ref();
        match options.effective_language()? {
            QueryLanguage::Sparql10 | QueryLanguage::Sparql | QueryLanguage::Sparql11Query => {
                self.query(model, query, base_uri)
            }
            QueryLanguage::Sparql11Update => self.update(model, query, base_uri),
            language @ (QueryLanguage::Laqrs | QueryLanguage::Rdql) => {
                Err(QueryError::Unsupported(format!("query language {}", language)))
            }
        }
    }
}

fn reject_dataset(has_dataset: bool) -> QueryResult<()> {
    if has_dataset {
        return Err(QueryError::Unsupported("FROM / FROM NAMED clauses".to_string()));
    }
    Ok(())
}

fn evaluate(model: &Model, pattern: &GraphPattern) -> QueryResult<Vec<QuerySolution>> {
    match pattern {
        GraphPattern::Bgp { patterns } => {
            let mut rows = vec![QuerySolution::new()];
            for triple in patterns {
                rows = extend_with_triple(model, rows, triple)?;
                if rows.is_empty() {
                    break;
                }
            }
            Ok(rows)
        }
        GraphPattern::Join { left, right } => {
            let left = evaluate(model, left)?;
            if left.is_empty() {
                return Ok(left);
            }
            let right = evaluate(model, right)?;
            Ok(left
                .iter()
                .flat_map(|l| right.iter().filter_map(move |r| merge(l, r)))
                .collect())
        }
        GraphPattern::Union { left, right } => {
            let mut rows = evaluate(model, left)?;
            rows.extend(evaluate(model, right)?);
            Ok(rows)
        }
        GraphPattern::Project { inner, variables } => {
            let names: Vec<&str> = variables.iter().map(|v| v.as_str()).collect();
            Ok(evaluate(model, inner)?
                .into_iter()
                .map(|row| QuerySolution {
                    bindings: row
                        .bindings
                        .into_iter()
                        .filter(|(name, _)| names.contains(&name.as_str()))
                        .collect(),
                })
                .collect())
        }
        GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner } => {
            let unique: IndexSet<QuerySolution> = evaluate(model, inner)?.into_iter().collect();
            Ok(unique.into_iter().collect())
        }
        GraphPattern::Slice { inner, start, length } => {
            let rows = evaluate(model, inner)?.into_iter().skip(*start);
            Ok(match length {
                Some(length) => rows.take(*length).collect(),
                None => rows.collect(),
            })
        }
        #[allow(unreachable_patterns)]
        other => Err(QueryError::Unsupported(format!("graph pattern {}", other))),
    }
}

/// Position of a triple pattern: either a fixed node or a variable name
enum Slot {
    Fixed(Node),
    Variable(String),
}

impl Slot {
    fn resolve<'a>(&'a self, row: &'a QuerySolution) -> Option<&'a Node> {
        match self {
            Slot::Fixed(node) => Some(node),
            Slot::Variable(name) => row.get(name),
        }
    }
}

fn term_slot(term: &TermPattern) -> QueryResult<Slot> {
    match term {
        TermPattern::NamedNode(node) => Ok(Slot::Fixed(named_node(node)?)),
        TermPattern::Literal(literal) => Ok(Slot::Fixed(literal_node(literal)?)),
        TermPattern::Variable(variable) => Ok(Slot::Variable(variable.as_str().to_string())),
        TermPattern::BlankNode(blank) => Ok(Slot::Variable(format!("{}{}", BLANK_VARIABLE, blank.as_str()))),
        #[allow(unreachable_patterns)]
        other => Err(QueryError::Unsupported(format!("term pattern {}", other))),
    }
}

fn predicate_slot(predicate: &NamedNodePattern) -> QueryResult<Slot> {
    match predicate {
        NamedNodePattern::NamedNode(node) => Ok(Slot::Fixed(named_node(node)?)),
        NamedNodePattern::Variable(variable) => Ok(Slot::Variable(variable.as_str().to_string())),
    }
}

/// Join every row with the matches of one triple pattern
fn extend_with_triple(model: &Model, rows: Vec<QuerySolution>, triple: &TriplePattern) -> QueryResult<Vec<QuerySolution>> {
    let slots = [
        term_slot(&triple.subject)?,
        predicate_slot(&triple.predicate)?,
        term_slot(&triple.object)?,
    ];

    let mut extended = Vec::new();
    for row in rows {
        let mut pattern = Statement::new();
        if let Some(node) = slots[0].resolve(&row) {
            pattern.set_subject(node.clone());
        }
        if let Some(node) = slots[1].resolve(&row) {
            pattern.set_predicate(node.clone());
        }
        if let Some(node) = slots[2].resolve(&row) {
            pattern.set_object(node.clone());
        }

        for statement in model.snapshot(&pattern) {
            let Some((s, p, o)) = statement.as_triple() else {
                continue;
            };
            let mut candidate = row.clone();
            let consistent = slots.iter().zip([s, p, o]).all(|(slot, node)| match slot {
                Slot::Fixed(_) => true,
                Slot::Variable(name) => match candidate.get(name) {
                    Some(bound) => bound == node,
                    None => {
                        candidate.bind(name.clone(), node.clone());
                        true
                    }
                },
            });
            if consistent {
                extended.push(candidate);
            }
        }
    }
    Ok(extended)
}

/// Compatible union of two rows, `None` when a shared variable disagrees
fn merge(left: &QuerySolution, right: &QuerySolution) -> Option<QuerySolution> {
    let mut merged = left.clone();
    for (name, node) in right.iter() {
        match merged.get(name) {
            Some(bound) if bound != node => return None,
            Some(_) => {}
            None => merged.bind(name, node.clone()),
        }
    }
    Some(merged)
}

/// Variables named by the outermost projection
fn projected_variables(pattern: &GraphPattern) -> Option<Vec<String>> {
    match pattern {
        GraphPattern::Project { variables, .. } => Some(variables.iter().map(|v| v.as_str().to_string()).collect()),
        GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner } | GraphPattern::Slice { inner, .. } => {
            projected_variables(inner)
        }
        _ => None,
    }
}

fn visible_variables(rows: &[QuerySolution]) -> Vec<String> {
    let names: IndexSet<&str> = rows
        .iter()
        .flat_map(|row| row.bindings.keys())
        .map(String::as_str)
        .filter(|name| !name.starts_with(BLANK_VARIABLE))
        .collect();
    names.into_iter().map(str::to_string).collect()
}

/// Instantiate the template once per row into a new model on the same world
///
/// Template blank nodes get fresh identifiers per row. Triples with unbound
/// variables or a literal in subject or predicate position are skipped.
fn construct(model: &Model, template: &[TriplePattern], rows: &[QuerySolution]) -> QueryResult<Model> {
    let world = model.world();
    let graph = Model::from_storage(world, Box::new(MemoryStorage::new()));

    for row in rows {
        let mut blanks: FxHashMap<&str, Node> = FxHashMap::default();
        for triple in template {
            let subject = match &triple.subject {
                TermPattern::BlankNode(blank) => {
                    Some(blanks.entry(blank.as_str()).or_insert_with(|| world.blank_node()).clone())
                }
                other => term_slot(other)?.resolve(row).cloned(),
            };
            let predicate = predicate_slot(&triple.predicate)?.resolve(row).cloned();
            let object = match &triple.object {
                TermPattern::BlankNode(blank) => {
                    Some(blanks.entry(blank.as_str()).or_insert_with(|| world.blank_node()).clone())
                }
                other => term_slot(other)?.resolve(row).cloned(),
            };

            if let (Some(s), Some(p), Some(o)) = (subject, predicate, object) {
                let statement = Statement::triple(s, p, o);
                if statement.is_insertable() {
                    graph.insert(&statement)?;
                }
            }
        }
    }
    Ok(graph)
}

fn insert_data(model: &Model, data: &[Quad]) -> QueryResult<()> {
    let mut relabeler = BlankRelabeler::new(model.world());
    for quad in data {
        default_graph_only(&quad.graph_name)?;
        let subject = match &quad.subject {
            Subject::NamedNode(node) => named_node(node)?,
            Subject::BlankNode(blank) => relabeler.relabel(Node::blank(blank.as_str())),
            #[allow(unreachable_patterns)]
            other => return Err(QueryError::Unsupported(format!("subject {}", other))),
        };
        let object = match &quad.object {
            Term::NamedNode(node) => named_node(node)?,
            Term::BlankNode(blank) => relabeler.relabel(Node::blank(blank.as_str())),
            Term::Literal(literal) => literal_node(literal)?,
            #[allow(unreachable_patterns)]
            other => return Err(QueryError::Unsupported(format!("object {}", other))),
        };
        model.insert(&Statement::triple(subject, named_node(&quad.predicate)?, object))?;
    }
    Ok(())
}

fn delete_data(model: &Model, data: &[GroundQuad]) -> QueryResult<()> {
    for quad in data {
        default_graph_only(&quad.graph_name)?;
        let subject = match &quad.subject {
            GroundSubject::NamedNode(node) => named_node(node)?,
            #[allow(unreachable_patterns)]
            other => return Err(QueryError::Unsupported(format!("subject {}", other))),
        };
        let object = match &quad.object {
            GroundTerm::NamedNode(node) => named_node(node)?,
            GroundTerm::Literal(literal) => literal_node(literal)?,
            #[allow(unreachable_patterns)]
            other => return Err(QueryError::Unsupported(format!("object {}", other))),
        };
        model.remove(&Statement::triple(subject, named_node(&quad.predicate)?, object))?;
    }
    Ok(())
}

fn clear(model: &Model) -> QueryResult<usize> {
    let mut removed = 0;
    for statement in model.snapshot(&Statement::new()) {
        if model.remove(&statement)? {
            removed += 1;
        }
    }
    Ok(removed)
}

fn default_graph_only(graph_name: &GraphName) -> QueryResult<()> {
    match graph_name {
        GraphName::DefaultGraph => Ok(()),
        other => Err(QueryError::Unsupported(format!("named graph {}", other))),
    }
}

fn named_node(node: &NamedNode) -> QueryResult<Node> {
    Ok(Node::iri(node.as_str())?)
}

fn literal_node(literal: &Literal) -> QueryResult<Node> {
    match literal.language() {
        Some(language) => Ok(Node::lang_literal(literal.value(), language)?),
        None => Ok(Node::typed_literal(literal.value(), Uri::new(literal.datatype().as_str())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOAF: &str = "PREFIX foaf: <http://xmlns.com/foaf/0.1/>\nPREFIX ex: <http://ex.org/>\n";

    fn iri(uri: &str) -> Node {
        Node::iri(uri).unwrap()
    }

    fn people() -> Model {
        let model = Model::in_memory();
        let name = iri("http://xmlns.com/foaf/0.1/name");
        let knows = iri("http://xmlns.com/foaf/0.1/knows");
        let alice = iri("http://ex.org/alice");
        let bob = iri("http://ex.org/bob");
        let carol = iri("http://ex.org/carol");
        let statements = model.statements();
        statements.create((alice.clone(), name.clone(), "Alice"));
        statements.create((bob.clone(), name.clone(), "Bob"));
        statements.create((carol.clone(), name, "Carol"));
        statements.create((alice.clone(), knows.clone(), bob.clone()));
        statements.create((bob, knows.clone(), carol.clone()));
        statements.create((alice, knows, carol));
        model
    }

    fn select(model: &Model, query: &str) -> Solutions {
        SparqlEngine::new()
            .execute(model, &format!("{}{}", FOAF, query), &QueryOptions::default())
            .unwrap()
            .into_bindings()
            .unwrap()
    }

    #[test]
    fn test_select_join() {
        let model = people();
        let solutions = select(
            &model,
            "SELECT ?friend WHERE { ex:alice foaf:knows ?f . ?f foaf:name ?friend } ",
        );
        assert_eq!(solutions.variables(), ["friend"]);

        let mut names: Vec<_> = solutions.map(|s| s.get("friend").cloned().unwrap()).collect();
        names.sort();
        assert_eq!(names, vec![Node::from("Bob"), Node::from("Carol")]);
    }

    #[test]
    fn test_repeated_variable_must_agree() {
        let model = people();
        model.statements().create((iri("http://ex.org/dave"), iri("http://xmlns.com/foaf/0.1/knows"), iri("http://ex.org/dave")));

        let solutions: Vec<_> = select(&model, "SELECT ?x WHERE { ?x foaf:knows ?x }").collect();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("x"), Some(&iri("http://ex.org/dave")));
    }

    #[test]
    fn test_distinct_and_slice() {
        let model = people();
        let distinct: Vec<_> = select(&model, "SELECT DISTINCT ?s WHERE { ?s foaf:knows ?o }").collect();
        assert_eq!(distinct.len(), 2);

        let limited: Vec<_> = select(&model, "SELECT ?s WHERE { ?s foaf:name ?n } LIMIT 2").collect();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_union() {
        let model = people();
        let solutions: Vec<_> = select(
            &model,
            "SELECT ?n WHERE { { ex:alice foaf:name ?n } UNION { ex:bob foaf:name ?n } }",
        )
        .collect();
        assert_eq!(solutions.len(), 2);
    }

    #[test]
    fn test_blank_node_pattern_is_not_projected() {
        let model = people();
        let solutions = select(&model, "SELECT * WHERE { _:who foaf:knows ?o }");
        assert_eq!(solutions.variables(), ["o"]);
        assert_eq!(solutions.count(), 3);
    }

    #[test]
    fn test_ask() {
        let model = people();
        let engine = SparqlEngine::new();
        let yes = engine
            .execute(&model, &format!("{}ASK {{ ex:bob foaf:knows ex:carol }}", FOAF), &QueryOptions::default())
            .unwrap();
        assert_eq!(yes.as_boolean(), Some(true));

        let no = engine
            .execute(&model, &format!("{}ASK {{ ex:carol foaf:knows ?x }}", FOAF), &QueryOptions::default())
            .unwrap();
        assert_eq!(no.as_boolean(), Some(false));
    }

    #[test]
    fn test_construct_shares_world() {
        let model = people();
        let query = format!(
            "{}CONSTRUCT {{ ?b ex:knownBy ?a . ?a ex:tag _:t }} WHERE {{ ?a foaf:knows ?b }}",
            FOAF
        );
        let graph = SparqlEngine::new()
            .execute(&model, &query, &QueryOptions::default())
            .unwrap()
            .into_graph()
            .unwrap();

        assert_eq!(graph.world(), model.world());
        // 3 inverted edges plus one fresh blank tag per row
        assert_eq!(graph.size(), 6);
    }

    #[test]
    fn test_update_insert_delete_clear() {
        let model = Model::in_memory();
        let engine = SparqlEngine::new();
        let update = QueryOptions::new(QueryLanguage::Sparql11Update);

        engine
            .execute(
                &model,
                "INSERT DATA { <http://ex.org/s> <http://ex.org/p> \"one\", \"two\" . _:b <http://ex.org/p> 3 }",
                &update,
            )
            .unwrap();
        assert_eq!(model.size(), 3);

        engine
            .execute(&model, "DELETE DATA { <http://ex.org/s> <http://ex.org/p> \"one\" }", &update)
            .unwrap();
        assert_eq!(model.size(), 2);
        assert!(model.contains(&Statement::triple(iri("http://ex.org/s"), iri("http://ex.org/p"), "two")));

        engine.execute(&model, "CLEAR DEFAULT", &update).unwrap();
        assert!(model.is_empty());
    }

    #[test]
    fn test_relative_iris_use_base() {
        let model = Model::in_memory();
        model.statements().create((iri("http://ex.org/base/s"), iri("http://ex.org/base/p"), "v"));
        let options = QueryOptions::default().with_base_uri(Uri::new("http://ex.org/base/").unwrap());

        let results = SparqlEngine::new().execute(&model, "ASK { <s> <p> ?o }", &options).unwrap();
        assert_eq!(results.as_boolean(), Some(true));
    }

    #[test]
    fn test_errors() {
        let model = Model::in_memory();
        let engine = SparqlEngine::new();

        assert!(matches!(
            engine.execute(&model, "SELECT WHERE", &QueryOptions::default()),
            Err(QueryError::Syntax(_))
        ));
        assert!(matches!(
            engine.execute(&model, "SELECT ?s WHERE { ?s ?p ?o }", &QueryOptions::new(QueryLanguage::Rdql)),
            Err(QueryError::Unsupported(_))
        ));
        assert!(matches!(
            engine.execute(
                &model,
                "SELECT ?s WHERE { ?s ?p ?o } ORDER BY ?s",
                &QueryOptions::default()
            ),
            Err(QueryError::Unsupported(_))
        ));
    }
}
