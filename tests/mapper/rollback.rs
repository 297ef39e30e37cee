//! Atomicity of apply: all or nothing

use crate::common::*;
use std::sync::Arc;

#[test]
fn test_refused_child_save_rolls_back_parent() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);
    env.store.fail_next_save("phone");

    assert!(!mapper.apply(&registration_params()).unwrap());
    assert_eq!(env.counts(), [0, 0, 0, 0]);
    assert_eq!(
        mapper.errors().get("base"),
        Some(&["could not be saved".to_string()][..])
    );
    assert_eq!(env.store.total_aborted(), 1);
    assert!(!env.store.in_transaction());

    // ids handed out inside the aborted transaction are forgotten
    assert!(mapper.target().is_new_record());
    let person = mapper.mounting("person").unwrap().mapper().unwrap();
    assert!(person.target().is_new_record());
    assert_ne!(mapper.state(), MapperState::Saved);
}

#[test]
fn test_retry_after_rollback_inserts_once() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);
    env.store.fail_next_save("person");
    assert!(!mapper.apply(&registration_params()).unwrap());

    assert!(mapper.apply(&Params::new()).unwrap());
    assert!(mapper.errors().is_empty());
    assert_eq!(env.counts(), [1, 1, 1, 0]);

    let user_id = mapper.target().id().unwrap();
    assert_eq!(
        env.store.all("person")[0].get("user_id"),
        Value::from(user_id)
    );
}

#[test]
fn test_unique_violation_becomes_field_error() {
    let env = TestEnv::new();
    env.seed_user("a@b.com");
    let mut mapper = env.user_mapper(&["registration"]);

    assert!(!mapper.apply(&registration_params()).unwrap());
    assert_eq!(
        mapper.errors().get("email"),
        Some(&["has already been taken".to_string()][..])
    );
    assert!(!mapper.errors().contains_key("base"));
    assert_eq!(env.counts(), [1, 0, 0, 0]);
}

#[test]
fn test_child_constraint_violation_rolls_back_saved_parent() {
    let env = TestEnv::new();
    let def = MapperDefinition::builder("user", "user")
        .attributes(["email"])
        .mount(
            "person",
            MapperDefinition::builder("person", "person")
                .attributes(["first_name"])
                .build()
                .unwrap(),
            MountOptions::new().foreign_key("user_id"),
        )
        .build()
        .unwrap();
    let mut mapper = env.mapper_for(def, Target::new("user"), &[]);

    // no validation on last_name: the store's not-null check is what fails
    assert!(!mapper
        .apply(&params([("email", "a@b.com"), ("first_name", "J")]))
        .unwrap());
    assert!(mapper.errors().contains_key("last_name"));
    assert_eq!(env.counts(), [0, 0, 0, 0]);
    assert_eq!(env.store.saved_models(), ["user"]);
}

#[test]
fn test_adapter_error_propagates_after_rollback() {
    let env = TestEnv::new();
    let ghost = MapperDefinition::builder("ghost", "ghost")
        .attributes(["name"])
        .build()
        .unwrap();
    let mut mapper = env.mapper_for(ghost, Target::new("ghost"), &[]);

    let err = mapper.apply(&params([("name", "x")])).unwrap_err();
    assert!(matches!(err, Error::Adapter(_)));
    assert!(!err.is_recoverable());
    assert!(!env.store.in_transaction());
    assert_eq!(env.store.total_aborted(), 1);
}

#[test]
fn test_save_without_apply_is_transactional() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);
    mapper
        .write(&params([("email", "a@b.com"), ("number", "555")]))
        .unwrap();

    // no validation ran: the store's not-null check on last_name fails
    assert!(!mapper.save().unwrap());
    assert_eq!(
        mapper.errors().get("last_name"),
        Some(&["can't be null".to_string()][..])
    );
    assert_eq!(env.counts(), [0, 0, 0, 0]);
    assert_eq!(env.store.total_aborted(), 1);
    assert!(!env.store.in_transaction());
    assert!(mapper.target().is_new_record());
}

#[test]
fn test_refused_save_without_apply_rolls_back() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);
    env.store.fail_next_save("phone");
    mapper.write(&registration_params()).unwrap();

    assert!(!mapper.save().unwrap());
    assert_eq!(env.counts(), [0, 0, 0, 0]);

    assert!(mapper.save().unwrap());
    assert_eq!(env.counts(), [1, 1, 1, 0]);
    assert_eq!(env.store.total_committed(), 1);
}

#[test]
fn test_rollback_restores_persisted_snapshot_of_updated_target() {
    let env = TestEnv::new();
    env.seed_user("taken@b.com");
    let user_id = env.seed_user("a@b.com");
    env.store.insert(
        "person",
        attrs([
            ("user_id", Value::from(user_id)),
            ("last_name", Value::from("Old")),
        ]),
    );
    let def = MapperDefinition::builder("user", "user")
        .attributes(["email"])
        .mount(
            "person",
            person_def(),
            MountOptions::new()
                .foreign_key("user_id")
                .index(Index::save(-1)),
        )
        .build()
        .unwrap();
    let user = env.store.find("user", user_id).unwrap();
    let mut mapper = env.mapper_for(def, user, &[]);

    // person saves first, then the email collides
    assert!(!mapper
        .apply(&params([("email", "taken@b.com"), ("last_name", "New")]))
        .unwrap());
    assert!(mapper.errors().contains_key("email"));
    assert_eq!(env.store.all("person")[0].get("last_name"), Value::from("Old"));

    let person = mapper.mounting("person").unwrap().mapper().unwrap();
    assert_eq!(person.target().get("last_name"), Value::from("New"));
    assert!(person.target().is_changed());

    mapper.mounting_mut("person").unwrap().skip();
    let person = mapper.mounting("person").unwrap().mapper().unwrap();
    assert_eq!(person.target().get("last_name"), Value::from("Old"));
}

#[test]
fn test_rollback_requeues_destroyed_collection_items() {
    let env = TestEnv::new();
    let user_id = env.seed_user("a@b.com");
    let first = env.store.insert(
        "phone",
        attrs([("user_id", Value::from(user_id)), ("number", Value::from("111"))]),
    );
    let second = env.store.insert(
        "phone",
        attrs([("user_id", Value::from(user_id)), ("number", Value::from("222"))]),
    );
    let user = env.store.find("user", user_id).unwrap();
    let mut mapper = env.mapper_for(user_def(), user, &["phones"]);

    env.store.fail_next_save("phone");
    let input = params([(
        "phones",
        Value::Array(vec![
            item([("id", Value::from(first)), ("number", Value::from("999"))]),
            item([("id", Value::from(second)), ("_destroy", Value::Bool(true))]),
        ]),
    )]);
    assert!(!mapper.apply(&input).unwrap());
    assert!(env.store.find("phone", second).is_some());
    let removed = mapper.mounting("phones").unwrap().removed();
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0].id(), Some(second));

    assert!(mapper.apply(&Params::new()).unwrap());
    assert!(env.store.find("phone", second).is_none());
    assert_eq!(
        env.store.find("phone", first).unwrap().get("number"),
        Value::from("999")
    );
}

#[test]
fn test_transactional_apply_follows_model_activation() {
    init_tracing();
    let store = Arc::new(MemoryStore::new(schema()));
    let ctx = ContextBuilder::new(ExtensionRegistry::with_builtins())
        .activate("model")
        .unwrap()
        .adapter(store.clone())
        .build()
        .unwrap();
    assert!(ctx.settings().transactional_apply);

    let ctx = ContextBuilder::new(ExtensionRegistry::with_builtins())
        .activate("skipping")
        .unwrap()
        .build()
        .unwrap();
    assert!(!ctx.settings().transactional_apply);
    assert!(ctx.adapter().is_none());

    // without `model` nothing reaches the store
    let mut mapper = Mapper::new(ctx, user_def(), Target::new("user"), &[]).unwrap();
    assert!(mapper.apply(&params([("email", "a@b.com")])).unwrap());
    assert_eq!(store.count("user"), 0);
    assert_eq!(store.total_committed(), 0);
}
