//! Foreign key propagation in both directions

use crate::common::*;

#[test]
fn test_foreign_key_copies_parent_id_into_children() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration"]);
    assert!(mapper.apply(&registration_params()).unwrap());

    let user_id = Value::from(mapper.target().id().unwrap());
    for name in ["person", "phone"] {
        let child = mapper.mounting(name).unwrap().mapper().unwrap();
        assert_eq!(child.target().get("user_id"), user_id, "{}", name);
    }
    assert_eq!(env.store.saved_models(), ["user", "person", "phone"]);
}

#[test]
fn test_mounter_foreign_key_saves_child_first() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["billing"]);

    assert!(mapper
        .apply(&params([("email", "a@b.com"), ("account_name", "acme")]))
        .unwrap());
    assert_eq!(env.store.saved_models(), ["account", "user"]);

    let account = mapper.mounting("account").unwrap().mapper().unwrap();
    let account_id = account.target().id().unwrap();
    assert_eq!(account.target().get("name"), Value::from("acme"));

    let stored = env.store.find("user", mapper.target().id().unwrap()).unwrap();
    assert_eq!(stored.get("account_id"), Value::from(account_id));
}

#[test]
fn test_failed_child_leaves_mounter_unsaved() {
    let env = TestEnv::new();
    env.store.insert("account", attrs([("name", "acme")]));
    let mut mapper = env.user_mapper(&["billing"]);

    assert!(!mapper
        .apply(&params([("email", "a@b.com"), ("account_name", "acme")]))
        .unwrap());
    assert_eq!(
        mapper.errors().get("account_name"),
        Some(&["has already been taken".to_string()][..])
    );
    assert!(env.store.saved_models().is_empty());
    assert_eq!(env.counts(), [0, 0, 0, 1]);
}

#[test]
fn test_belongs_to_loads_existing_parent() {
    let env = TestEnv::new();
    let account_id = env.store.insert("account", attrs([("name", "acme")]));
    let user_id = env.store.insert(
        "user",
        attrs([
            ("email", Value::from("a@b.com")),
            ("account_id", Value::from(account_id)),
        ]),
    );
    let user = env.store.find("user", user_id).unwrap();
    let mut mapper = env.mapper_for(user_def(), user, &["billing"]);

    let account = mapper.mounting("account").unwrap().mapper().unwrap();
    assert_eq!(account.target().id(), Some(account_id));

    assert!(mapper
        .apply(&params([("account_name", "renamed")]))
        .unwrap());
    assert_eq!(env.store.count("account"), 1);
    assert_eq!(
        env.store.find("account", account_id).unwrap().get("name"),
        Value::from("renamed")
    );
    assert_eq!(
        env.store.find("user", user_id).unwrap().get("account_id"),
        Value::from(account_id)
    );
}

#[test]
fn test_propagation_is_scoped_to_direct_mountings() {
    let env = TestEnv::new();
    let mut mapper = env.user_mapper(&["registration", "billing"]);
    assert!(mapper
        .apply(&params([
            ("email", "a@b.com"),
            ("last_name", "S"),
            ("account_name", "acme"),
        ]))
        .unwrap());

    let account = mapper.mounting("account").unwrap().mapper().unwrap();
    assert_eq!(account.target().get("user_id"), Value::Null);
    let person = mapper.mounting("person").unwrap().mapper().unwrap();
    assert_eq!(person.target().get("account_id"), Value::Null);
    assert_eq!(env.counts(), [1, 1, 1, 1]);
}

#[test]
fn test_existing_parent_prefills_new_child_key() {
    let env = TestEnv::new();
    let user_id = env.seed_user("a@b.com");
    let user = env.store.find("user", user_id).unwrap();
    let mapper = env.mapper_for(user_def(), user, &["registration"]);

    let phone = mapper.mounting("phone").unwrap().mapper().unwrap();
    assert!(phone.target().is_new_record());
    assert_eq!(phone.target().get("user_id"), Value::from(user_id));
}
