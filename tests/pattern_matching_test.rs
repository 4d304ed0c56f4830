//! Pattern matching against a brute-force scan
//!
//! A seeded random corpus is loaded into each backend; every subset of
//! bound positions is then looked up through the index and compared with a
//! linear filter over the corpus.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use redstore::{Model, Node, Statement, StorageConfig};
use std::collections::{BTreeMap, BTreeSet};

const SUBJECTS: usize = 12;
const PREDICATES: usize = 5;
const OBJECTS: usize = 15;

fn subject(i: usize) -> Node {
    if i % 4 == 0 {
        Node::blank(format!("b{}", i))
    } else {
        Node::iri(&format!("http://ex.org/s{}", i)).unwrap()
    }
}

fn predicate(i: usize) -> Node {
    Node::iri(&format!("http://ex.org/p{}", i)).unwrap()
}

fn object(i: usize) -> Node {
    match i % 3 {
        0 => Node::iri(&format!("http://ex.org/o{}", i)).unwrap(),
        1 => Node::from(i as i64),
        _ => Node::from(format!("text {}", i)),
    }
}

fn corpus(seed: u64, size: usize) -> Vec<Statement> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..size)
        .map(|_| {
            Statement::triple(
                subject(rng.gen_range(0..SUBJECTS)),
                predicate(rng.gen_range(0..PREDICATES)),
                object(rng.gen_range(0..OBJECTS)),
            )
        })
        .collect()
}

fn key(statement: &Statement) -> String {
    statement.to_string()
}

fn check_all_patterns(model: &Model, expected: &BTreeMap<String, Statement>) {
    let probe: Vec<&Statement> = expected.values().step_by(7).collect();

    for statement in probe {
        for mask in 0u8..8 {
            let mut pattern = Statement::new();
            if mask & 1 != 0 {
                pattern.set_subject(statement.subject().unwrap().clone());
            }
            if mask & 2 != 0 {
                pattern.set_predicate(statement.predicate().unwrap().clone());
            }
            if mask & 4 != 0 {
                pattern.set_object(statement.object().unwrap().clone());
            }

            let brute: BTreeSet<String> = expected.values().filter(|s| pattern.matches(s)).map(key).collect();
            let indexed: Vec<String> = model.statements().each(pattern.clone()).map(|s| key(&s)).collect();
            let indexed_set: BTreeSet<String> = indexed.iter().cloned().collect();

            assert_eq!(indexed.len(), indexed_set.len(), "duplicate results for {}", pattern);
            assert_eq!(indexed_set, brute, "mismatch for pattern {}", pattern);
        }
    }
}

fn run(config: StorageConfig, seed: u64) {
    let model = Model::new(config).unwrap();
    let statements = corpus(seed, 400);
    let mut expected = BTreeMap::new();

    for statement in &statements {
        let mut copy = statement.clone();
        let added = model.statements().add(&mut copy);
        assert_eq!(added, expected.insert(key(statement), statement.clone()).is_none());
    }
    assert_eq!(model.size(), expected.len());
    check_all_patterns(&model, &expected);

    // Remove a third of the corpus and check again
    let removed: Vec<Statement> = expected.values().step_by(3).cloned().collect();
    for statement in &removed {
        assert!(model.statements().delete(statement).unwrap());
        expected.remove(&key(statement));
    }
    assert_eq!(model.size(), expected.len());
    check_all_patterns(&model, &expected);
}

#[test]
fn test_memory_backend_matches_scan() {
    for seed in [1, 7, 42] {
        run(StorageConfig::memory(), seed);
    }
}

#[test]
fn test_hashes_backend_matches_scan() {
    for seed in [3, 11] {
        run(StorageConfig::hashes(), seed);
    }
}
