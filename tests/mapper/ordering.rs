//! Sibling ordering per phase

use crate::common::*;
use proptest::prelude::*;
use std::sync::Arc;

/// Phone mountings `p0..pn` with the given save indexes, each under prefix `pI`
fn indexed_user(indexes: &[i32]) -> Arc<MapperDefinition> {
    let mut builder = MapperDefinition::builder("user", "user").attributes(["email"]);
    for (i, index) in indexes.iter().enumerate() {
        builder = builder.mount(
            format!("p{}", i),
            phone_def(),
            MountOptions::new()
                .prefix(format!("p{}", i))
                .index(Index::save(*index)),
        );
    }
    builder.build().unwrap()
}

fn indexed_params(count: usize) -> Params {
    let mut input = params([("email", "a@b.com")]);
    for i in 0..count {
        input.insert(format!("p{}_number", i), Value::from(format!("p{}", i)));
    }
    input
}

/// Labels in save order: `user` or the phone's number
fn save_order(env: &TestEnv) -> Vec<String> {
    env.store
        .save_log()
        .iter()
        .map(|record| {
            let saved = env.store.find(&record.model, record.id).unwrap();
            match record.model.as_str() {
                "phone" => saved.get("number").as_str().unwrap().to_string(),
                other => other.to_string(),
            }
        })
        .collect()
}

#[test]
fn test_negative_index_saves_before_mounter() {
    let env = TestEnv::new();
    let mut mapper = env.mapper_for(indexed_user(&[0, -1]), Target::new("user"), &[]);

    assert!(mapper.apply(&indexed_params(2)).unwrap());
    assert_eq!(save_order(&env), ["p1", "user", "p0"]);
}

#[test]
fn test_positive_indexes_sort_after_defaults() {
    let env = TestEnv::new();
    let mut mapper = env.mapper_for(indexed_user(&[2, 0, 1]), Target::new("user"), &[]);

    assert!(mapper.apply(&indexed_params(3)).unwrap());
    assert_eq!(save_order(&env), ["user", "p1", "p2", "p0"]);
}

#[test]
fn test_save_index_does_not_affect_validate_order() {
    let def = MapperDefinition::builder("user", "user")
        .mount("a", phone_def(), MountOptions::new().index(Index::save(5)))
        .mount("b", phone_def(), MountOptions::new().index(Index::validate(-5)))
        .build()
        .unwrap();
    let env = TestEnv::new();
    let mapper = env.mapper_for(def, Target::new("user"), &[]);

    let a = mapper.mounting("a").unwrap();
    let b = mapper.mounting("b").unwrap();
    assert_eq!(a.index_for(formtree_engine::Phase::Save), 5);
    assert_eq!(a.index_for(formtree_engine::Phase::Validate), 0);
    assert_eq!(b.index_for(formtree_engine::Phase::Validate), -5);
    assert_eq!(b.index_for(formtree_engine::Phase::Save), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Negative indexes save before the mounter, the rest after it, each
    /// group ascending by index with declaration order breaking ties
    #[test]
    fn test_save_order_follows_indexes(indexes in prop::collection::vec(-3i32..3, 1..6)) {
        let env = TestEnv::new();
        let mut mapper = env.mapper_for(indexed_user(&indexes), Target::new("user"), &[]);
        prop_assert!(mapper.apply(&indexed_params(indexes.len())).unwrap());

        let mut sorted: Vec<usize> = (0..indexes.len()).collect();
        sorted.sort_by_key(|&i| indexes[i]);
        let label = |i: usize| format!("p{}", i);
        let mut expected: Vec<String> =
            sorted.iter().filter(|&&i| indexes[i] < 0).map(|&i| label(i)).collect();
        expected.push("user".to_string());
        expected.extend(sorted.iter().filter(|&&i| indexes[i] >= 0).map(|&i| label(i)));

        prop_assert_eq!(save_order(&env), expected);
    }
}
