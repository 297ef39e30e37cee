//! Custom extensions and config-driven contexts

use crate::common::*;
use formtree_core::{ConfigurationError, Result};
use formtree_engine::{
    EngineConfig, Extension, FactoryLayer, MapperLayer, Mounting, MountingLayer, Next,
    ResolveKind, ResolveRequest, Resolution, CONFIG_FILE_NAME,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

/// Records the model of every target saved through the chain
#[derive(Default)]
struct Audit {
    saved: Mutex<Vec<String>>,
    skipped: Mutex<Vec<String>>,
}

struct AuditMapperLayer(Arc<Audit>);

impl MapperLayer for AuditMapperLayer {
    fn save_target(&self, mapper: &mut Mapper, next: Next<'_, bool>) -> Result<bool> {
        let saved = next(mapper)?;
        if saved {
            self.0.saved.lock().push(mapper.target().model().to_string());
        }
        Ok(saved)
    }
}

struct AuditMountingLayer(Arc<Audit>);

impl MountingLayer for AuditMountingLayer {
    fn skip(&self, _ctx: &Context, mounting: &mut Mounting, next: &mut dyn FnMut(&mut Mounting)) {
        self.0.skipped.lock().push(mounting.name().to_string());
        next(mounting);
    }
}

/// Pre-fills `country` on every new phone
struct DefaultCountry;

impl FactoryLayer for DefaultCountry {
    fn resolve(
        &self,
        _ctx: &Context,
        request: &ResolveRequest<'_>,
        next: &mut dyn FnMut() -> Result<Resolution>,
    ) -> Result<Resolution> {
        let resolution = next()?;
        if request.model != "phone" || request.kind == ResolveKind::Collection {
            return Ok(resolution);
        }
        let mut target = resolution.into_single(request.model);
        if target.is_new_record() {
            target.set("country", "NZ");
        }
        Ok(Resolution::Single(target))
    }
}

fn audited_env() -> (Arc<MemoryStore>, Arc<Context>, Arc<Audit>) {
    init_tracing();
    let audit = Arc::new(Audit::default());
    let mut registry = ExtensionRegistry::with_builtins();
    registry
        .register(
            Extension::new("audit")
                .depends_on("model")
                .mapper_layer(AuditMapperLayer(audit.clone()))
                .mounting_layer(AuditMountingLayer(audit.clone()))
                .factory_layer(DefaultCountry),
        )
        .unwrap();

    let store = Arc::new(MemoryStore::new(schema()));
    let ctx = ContextBuilder::new(registry)
        .activate("audit")
        .unwrap()
        .adapter(store.clone())
        .build()
        .unwrap();
    (store, ctx, audit)
}

#[test]
fn test_custom_extension_activates_after_dependencies() {
    let (_, ctx, _) = audited_env();
    assert_eq!(ctx.extensions(), ["skipping", "ordering", "model", "audit"]);
    assert!(ctx.settings().transactional_apply);
}

#[test]
fn test_custom_layers_wrap_builtin_behavior() {
    let (store, ctx, audit) = audited_env();
    let mut mapper = Mapper::new(ctx, user_def(), Target::new("user"), &["registration"]).unwrap();

    assert!(mapper.apply(&registration_params()).unwrap());
    assert_eq!(*audit.saved.lock(), ["user", "person", "phone"]);
    assert_eq!(store.all("phone")[0].get("country"), Value::from("NZ"));
}

#[test]
fn test_refused_saves_are_not_audited() {
    let (store, ctx, audit) = audited_env();
    store.fail_next_save("person");
    let mut mapper = Mapper::new(ctx, user_def(), Target::new("user"), &["registration"]).unwrap();

    assert!(!mapper.apply(&registration_params()).unwrap());
    assert_eq!(*audit.saved.lock(), ["user"]);
}

#[test]
fn test_mounting_layer_sees_skips() {
    let (_, ctx, audit) = audited_env();
    let mut mapper = Mapper::new(ctx, user_def(), Target::new("user"), &["registration"]).unwrap();
    mapper.write(&registration_params()).unwrap();

    mapper.mounting_mut("phone").unwrap().skip();
    assert_eq!(*audit.skipped.lock(), ["phone"]);
    // the model layer still ran underneath
    let phone = mapper.mounting("phone").unwrap().mapper().unwrap();
    assert!(phone.target().is_marked_for_destruction());
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let mut registry = ExtensionRegistry::with_builtins();
    let err = registry.register(Extension::new("model")).unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::DuplicateExtension(_))
    ));
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_model_without_adapter_fails_to_build() {
    let err = ContextBuilder::new(ExtensionRegistry::with_builtins())
        .activate("model")
        .unwrap()
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::MissingAdapter(_))
    ));
}

#[test]
fn test_unknown_extension_names_its_dependent() {
    let mut registry = ExtensionRegistry::new();
    registry
        .register(Extension::new("audit").depends_on("metrics"))
        .unwrap();
    let err = ContextBuilder::new(registry).activate("audit").unwrap_err();
    match err {
        Error::Configuration(ConfigurationError::UnknownExtension { name, required_by }) => {
            assert_eq!(name, "metrics");
            assert_eq!(required_by.as_deref(), Some("audit"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_config_file_drives_context() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let mut config = EngineConfig::default();
    config.apply.base_error_key = "form".to_string();
    config.apply.save_failure_message = "try again later".to_string();
    config.write_to_file(&path).unwrap();

    let loaded = EngineConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);

    let store = Arc::new(MemoryStore::new(schema()));
    let ctx = ContextBuilder::from_config(ExtensionRegistry::with_builtins(), &loaded)
        .unwrap()
        .adapter(store.clone())
        .build()
        .unwrap();
    assert_eq!(ctx.extensions(), ["skipping", "ordering", "model"]);

    store.fail_next_save("user");
    let mut mapper = Mapper::new(ctx, user_def(), Target::new("user"), &[]).unwrap();
    assert!(!mapper.apply(&params([("email", "a@b.com")])).unwrap());
    assert_eq!(
        mapper.errors().get("form"),
        Some(&["try again later".to_string()][..])
    );
    assert!(!mapper.errors().contains_key("base"));
}

#[test]
fn test_default_config_file_is_written_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);

    EngineConfig::write_default_if_missing(&path).unwrap();
    let config = EngineConfig::from_file(&path).unwrap();
    assert_eq!(config, EngineConfig::default());

    let ctx = ContextBuilder::from_config(ExtensionRegistry::with_builtins(), &config)
        .unwrap()
        .adapter(Arc::new(MemoryStore::new(schema())))
        .build()
        .unwrap();
    assert!(ctx.is_active("model"));
}

#[test]
fn test_config_with_only_skipping_needs_no_adapter() {
    let config: EngineConfig = "extensions = [\"skipping\"]".parse().unwrap();
    let ctx = ContextBuilder::from_config(ExtensionRegistry::with_builtins(), &config)
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(ctx.extensions(), ["skipping"]);
    assert!(!ctx.is_active("model"));
}
