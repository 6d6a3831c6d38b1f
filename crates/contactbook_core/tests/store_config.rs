use contactbook_core::{
    open_contact_service, BackendConfig, ConfigError, ContactFilter, StoreConfig,
};
use std::io::Write;

#[test]
fn load_reads_sqlite_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("contacts.db");
    let config_path = dir.path().join("store.json");

    let raw = serde_json::json!({
        "backend": { "kind": "sqlite", "path": db_path },
        "seed_demo_data": true
    });
    let mut file = std::fs::File::create(&config_path).unwrap();
    file.write_all(raw.to_string().as_bytes()).unwrap();
    drop(file);

    let config = StoreConfig::load(&config_path).unwrap();
    assert_eq!(
        config.backend,
        BackendConfig::Sqlite {
            path: db_path.clone()
        }
    );

    let service = open_contact_service(&config).unwrap();
    assert_eq!(service.size(&ContactFilter::new()).unwrap(), 3);
    drop(service);

    // Reopening must not seed twice.
    let service = open_contact_service(&config).unwrap();
    assert_eq!(service.size(&ContactFilter::new()).unwrap(), 3);
    assert!(db_path.exists());
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = StoreConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn relative_log_dir_is_a_logging_error() {
    let config = StoreConfig::from_json_str(r#"{ "logging": { "level": "info", "dir": "logs" } }"#)
        .unwrap();
    match open_contact_service(&config) {
        Err(ConfigError::Logging(message)) => assert!(message.contains("absolute")),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("relative log dir must be rejected"),
    }
}
