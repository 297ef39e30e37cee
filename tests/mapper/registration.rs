//! Registration scenario: user + person + phone under the `registration` trait

use crate::common::*;

#[test]
fn test_apply_creates_one_row_per_node() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);

    assert!(mapper.apply(&registration_params()).unwrap());
    assert!(mapper.errors().is_empty());
    assert_eq!(env.counts(), [1, 1, 1, 0]);

    let user_id = mapper.target().id().expect("user persisted");
    let person = &env.store.all("person")[0];
    let phone = &env.store.all("phone")[0];
    assert_eq!(person.get("user_id"), Value::from(user_id));
    assert_eq!(person.get("first_name"), Value::from("J"));
    assert_eq!(person.get("last_name"), Value::from("S"));
    assert_eq!(phone.get("user_id"), Value::from(user_id));
    assert_eq!(phone.get("number"), Value::from("555"));

    assert_eq!(env.store.total_committed(), 1);
    assert_eq!(mapper.state(), MapperState::Saved);
}

#[test]
fn test_missing_last_name_fails_without_rows() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);

    let mut input = registration_params();
    input.remove("last_name");

    assert!(!mapper.apply(&input).unwrap());
    assert_eq!(mapper.errors().keys().collect::<Vec<_>>(), ["last_name"]);
    assert_eq!(
        mapper.errors().get("last_name"),
        Some(&["can't be blank".to_string()][..])
    );
    assert_eq!(env.counts(), [0, 0, 0, 0]);
    assert!(mapper.target().is_new_record());
    assert_eq!(env.store.total_committed(), 0);
}

#[test]
fn test_fixing_input_and_reapplying_succeeds() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);
    let mut input = registration_params();
    input.remove("last_name");
    assert!(!mapper.apply(&input).unwrap());

    assert!(mapper.apply(&params([("last_name", "S")])).unwrap());
    assert!(mapper.errors().is_empty());
    assert_eq!(env.counts(), [1, 1, 1, 0]);
}

#[test]
fn test_read_returns_written_tree() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);
    mapper.write(&registration_params()).unwrap();

    let read = mapper.read();
    for (key, value) in registration_params() {
        assert_eq!(read.get(&key), Some(&value), "key {}", key);
    }
}

#[test]
fn test_unknown_keys_are_ignored() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);
    let mut input = registration_params();
    input.insert("admin".to_string(), Value::Bool(true));

    assert!(mapper.apply(&input).unwrap());
    let user = env.store.find("user", mapper.target().id().unwrap()).unwrap();
    assert_eq!(user.get("admin"), Value::Null);
}

#[test]
fn test_json_body_drives_apply() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);
    let body = serde_json::json!({
        "email": "json@b.com",
        "first_name": "J",
        "last_name": "S",
        "number": "555"
    });

    assert!(mapper
        .apply(&formtree_core::params_from_json(body))
        .unwrap());
    assert_eq!(env.counts(), [1, 1, 1, 0]);
}

#[test]
fn test_existing_user_updates_in_place() {
    let env = TestEnv::new();
    let id = env.seed_user("old@b.com");
    let target = env.store.find("user", id).unwrap();
    let mut mapper = env.mapper_for(user_def(), target, &[]);

    assert!(mapper.apply(&params([("email", "new@b.com")])).unwrap());
    assert_eq!(env.store.count("user"), 1);
    assert_eq!(
        env.store.find("user", id).unwrap().get("email"),
        Value::from("new@b.com")
    );
    assert!(!env.store.save_log()[0].inserted);
}
