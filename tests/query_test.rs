//! Integration tests for query execution through the model

use redstore::query::{QueryEngine, QueryResult, QueryResults};
use redstore::{Model, Node, QueryError, QueryLanguage, QueryOptions, Statement, Syntax};

const DATA: &str = r#"
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix ex: <http://ex.org/> .

ex:alice a foaf:Person ; foaf:name "Alice" ; foaf:knows ex:bob .
ex:bob a foaf:Person ; foaf:name "Bob" ; foaf:knows ex:carol .
ex:carol a foaf:Person ; foaf:name "Carol" .
ex:acme foaf:name "ACME" .
"#;

const PREFIXES: &str = "PREFIX foaf: <http://xmlns.com/foaf/0.1/>\nPREFIX ex: <http://ex.org/>\n";

fn model() -> Model {
    let model = Model::in_memory();
    model.from_str(DATA, Syntax::Turtle, None).unwrap();
    model
}

fn run(model: &Model, query: &str) -> QueryResults {
    model
        .query(&format!("{}{}", PREFIXES, query), &QueryOptions::default())
        .unwrap()
}

#[test]
fn test_select_branches_on_kind() {
    let model = model();
    let results = run(&model, "SELECT ?name WHERE { ?p a foaf:Person ; foaf:name ?name }");
    assert!(results.is_bindings());
    assert!(!results.is_graph());

    let mut names: Vec<String> = results
        .into_bindings()
        .unwrap()
        .filter_map(|s| s.get("name").and_then(|n| n.as_literal()).map(|l| l.lexical().to_string()))
        .collect();
    names.sort();
    assert_eq!(names, ["Alice", "Bob", "Carol"]);
}

#[test]
fn test_two_hop_path() {
    let model = model();
    let solutions: Vec<_> = run(
        &model,
        "SELECT ?c WHERE { ex:alice foaf:knows ?b . ?b foaf:knows ?c }",
    )
    .into_bindings()
    .unwrap()
    .collect();

    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("c"), Some(&Node::iri("http://ex.org/carol").unwrap()));
}

#[test]
fn test_ask_and_construct() {
    let model = model();
    assert_eq!(run(&model, "ASK { ex:acme a foaf:Person }").as_boolean(), Some(false));
    assert_eq!(run(&model, "ASK { ex:acme foaf:name ?n }").as_boolean(), Some(true));

    let graph = run(&model, "CONSTRUCT { ?b ex:knownBy ?a } WHERE { ?a foaf:knows ?b }")
        .into_graph()
        .unwrap();
    assert_eq!(graph.size(), 2);
    assert!(graph.contains(&Statement::triple(
        Node::iri("http://ex.org/bob").unwrap(),
        Node::iri("http://ex.org/knownBy").unwrap(),
        Node::iri("http://ex.org/alice").unwrap(),
    )));
    // The source model is untouched
    assert_eq!(model.size(), 9);
}

#[test]
fn test_update_language() {
    let model = model();
    let options = QueryOptions::new(QueryLanguage::Sparql11Update);
    let results = model
        .query(
            &format!("{}INSERT DATA {{ ex:dave foaf:name \"Dave\" }}", PREFIXES),
            &options,
        )
        .unwrap();
    assert_eq!(results.as_boolean(), Some(true));
    assert_eq!(model.size(), 10);

    // Update syntax is rejected by the query languages
    assert!(matches!(
        model.query("CLEAR DEFAULT", &QueryOptions::default()),
        Err(QueryError::Syntax(_))
    ));
}

#[test]
fn test_unsupported_languages() {
    let model = model();
    for language in [QueryLanguage::Laqrs, QueryLanguage::Rdql] {
        let result = model.query("SELECT ?x WHERE (?x, <p>, ?y)", &QueryOptions::new(language));
        assert!(matches!(result, Err(QueryError::Unsupported(_))));
    }
}

/// Answers every query with whether the model holds any statements
struct CountingEngine;

impl QueryEngine for CountingEngine {
    fn execute(&self, model: &Model, _query: &str, _options: &QueryOptions) -> QueryResult<QueryResults> {
        Ok(QueryResults::Boolean(model.size() > 0))
    }
}

#[test]
fn test_custom_engine() {
    let model = model();
    let results = model.query_with(&CountingEngine, "anything", &QueryOptions::default()).unwrap();
    assert_eq!(results.as_boolean(), Some(true));

    let empty = Model::in_memory();
    let results = empty.query_with(&CountingEngine, "anything", &QueryOptions::default()).unwrap();
    assert_eq!(results.as_boolean(), Some(false));
}
