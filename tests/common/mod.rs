//! Shared test utilities for all integration test suites.
//!
//! Provides a `MemoryStore` with the user/person/phone/account schema the
//! suites exercise, a standard context over it, and the mapper
//! definitions built on that schema.
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::collections::BTreeMap;
use std::sync::{Arc, Once};

pub use formtree_core::{params, Error, Params, Target, TargetId, Value};
pub use formtree_engine::{
    Context, ContextBuilder, ExtensionRegistry, Index, Mapper, MapperDefinition, MapperState,
    MountOptions, TraitDefinition, Validation,
};
pub use formtree_storage::{MemoryStore, ModelSchema, Schema};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness (RUST_LOG filters it)
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// TestEnv - store plus standard context
// ============================================================================

/// Store schema shared by the suites
///
/// - user: unique email; has one person, has one phone, has many phones,
///   belongs to an account
/// - person: last_name not null
pub fn schema() -> Schema {
    Schema::new()
        .model(
            ModelSchema::new("user")
                .unique("email")
                .has_one("person", "person", "user_id")
                .has_one("phone", "phone", "user_id")
                .has_many("phones", "phone", "user_id")
                .belongs_to("account", "account", "account_id"),
        )
        .model(ModelSchema::new("person").not_null("last_name"))
        .model(ModelSchema::new("phone"))
        .model(ModelSchema::new("account").unique("name"))
}

/// A `MemoryStore` and a context with the `model` extension over it
pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub ctx: Arc<Context>,
}

impl TestEnv {
    pub fn new() -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new(schema()));
        let ctx = Context::standard(store.clone()).expect("standard context");
        TestEnv { store, ctx }
    }

    /// Root user mapper over a fresh target
    pub fn user_mapper(&self, traits: &[&str]) -> Mapper {
        self.mapper_for(user_def(), Target::new("user"), traits)
    }

    /// Root mapper over `target`
    pub fn mapper_for(
        &self,
        definition: Arc<MapperDefinition>,
        target: Target,
        traits: &[&str],
    ) -> Mapper {
        Mapper::new(self.ctx.clone(), definition, target, traits).expect("mapper construction")
    }

    /// Row count per model, in a fixed order: user, person, phone, account
    pub fn counts(&self) -> [usize; 4] {
        [
            self.store.count("user"),
            self.store.count("person"),
            self.store.count("phone"),
            self.store.count("account"),
        ]
    }

    /// Seed a persisted user row
    pub fn seed_user(&self, email: &str) -> TargetId {
        self.store.insert("user", attrs([("email", email)]))
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Attribute map from pairs
pub fn attrs<K, V, I>(pairs: I) -> BTreeMap<String, Value>
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// An object value for collection params
pub fn item<K, V, I>(pairs: I) -> Value
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    Value::Object(attrs(pairs))
}

// ============================================================================
// Definitions
// ============================================================================

pub fn person_def() -> Arc<MapperDefinition> {
    MapperDefinition::builder("person", "person")
        .attributes(["first_name", "last_name"])
        .validate(Validation::presence("last_name"))
        .build()
        .expect("person definition")
}

pub fn phone_def() -> Arc<MapperDefinition> {
    MapperDefinition::builder("phone", "phone")
        .attributes(["number"])
        .build()
        .expect("phone definition")
}

pub fn account_def() -> Arc<MapperDefinition> {
    MapperDefinition::builder("account", "account")
        .attributes(["name"])
        .build()
        .expect("account definition")
}

/// User mapper definition
///
/// Traits:
/// - `registration`: person and phone, both keyed by `user_id`
/// - `phones`: a `phones` collection keyed by `user_id`
/// - `billing`: an account saved first, its id copied into `account_id`
pub fn user_def() -> Arc<MapperDefinition> {
    MapperDefinition::builder("user", "user")
        .attributes(["email"])
        .with_trait(
            TraitDefinition::new("registration")
                .mount("person", person_def(), MountOptions::new().foreign_key("user_id"))
                .mount("phone", phone_def(), MountOptions::new().foreign_key("user_id")),
        )
        .with_trait(TraitDefinition::new("phones").mount_collection(
            "phones",
            phone_def(),
            MountOptions::new().foreign_key("user_id"),
        ))
        .with_trait(TraitDefinition::new("billing").mount(
            "account",
            account_def(),
            MountOptions::new()
                .prefix("account")
                .mounter_foreign_key("account_id"),
        ))
        .build()
        .expect("user definition")
}

/// The full registration params
pub fn registration_params() -> Params {
    params([
        ("email", "a@b.com"),
        ("first_name", "J"),
        ("last_name", "S"),
        ("number", "555"),
    ])
}
