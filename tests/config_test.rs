//! Storage configuration loading and backend selection

use redstore::storage::{MemoryStorage, OptionValue, StorageError};
use redstore::{Model, ModelError, StorageConfig, StorageKind, World};

#[test]
fn test_yaml_config() {
    let yaml = r#"
kind: hashes
name: people
options:
  hash_type: memory
  contexts: false
  cache-size: 64
"#;
    let config: StorageConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.kind, StorageKind::Hashes);
    assert_eq!(config.name.as_deref(), Some("people"));
    assert_eq!(config.option("hash-type"), Some(&OptionValue::Text("memory".to_string())));
    assert_eq!(config.bool_option("contexts").unwrap(), Some(false));
    assert_eq!(config.option("cache_size"), Some(&OptionValue::Integer(64)));
    assert_eq!(config.to_options_string(), "cache-size='64',contexts='no',hash-type='memory'");

    let model = Model::new(config).unwrap();
    assert_eq!(model.kind(), StorageKind::Hashes);
}

#[test]
fn test_json_config_defaults() {
    let config: StorageConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, StorageConfig::memory());

    let round_trip: StorageConfig = serde_json::from_str(&serde_json::to_string(&StorageConfig::hashes()).unwrap()).unwrap();
    assert_eq!(round_trip, StorageConfig::hashes());
}

#[test]
fn test_kind_names() {
    assert_eq!("Memory".parse::<StorageKind>().unwrap(), StorageKind::Memory);
    assert_eq!(StorageKind::Postgresql.to_string(), "postgresql");
    assert!(matches!("bdb".parse::<StorageKind>(), Err(StorageError::UnknownKind(_))));
}

#[test]
fn test_unregistered_backend_fails_construction() {
    let result = Model::new(StorageConfig::new(StorageKind::Sqlite));
    assert!(matches!(
        result,
        Err(ModelError::Storage(StorageError::BackendUnavailable(StorageKind::Sqlite)))
    ));
}

#[test]
fn test_custom_backend_registration() {
    let world = World::new();
    assert!(!world.has_backend(StorageKind::Tstore));

    world.register_backend(StorageKind::Tstore, |_world, config| {
        Ok(Box::new(MemoryStorage::from_config(config)?))
    });
    assert!(world.has_backend(StorageKind::Tstore));

    let model = Model::with_world(&world, StorageConfig::new(StorageKind::Tstore)).unwrap();
    assert!(model.is_empty());
}

#[test]
fn test_invalid_option_value() {
    let config = StorageConfig::memory().with_option("read_only", "maybe");
    assert!(matches!(
        Model::new(config),
        Err(ModelError::Storage(StorageError::InvalidOption { .. }))
    ));
}
