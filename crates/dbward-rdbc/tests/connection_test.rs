//! Unit tests for dbward-rdbc connection module

use dbward_rdbc::ConnectionSettings;

#[test]
fn test_connection_settings_default() {
    let settings = ConnectionSettings::default();

    assert!(settings.host.is_empty());
    assert_eq!(settings.port, 5432);
    assert_eq!(settings.database, "postgres");
    assert!(settings.pool_size > 0);
    assert!(settings.connect_timeout_secs > 0);
}

#[test]
fn test_connection_settings_builders() {
    let settings = ConnectionSettings::new("pg", "admin")
        .with_port(6432)
        .with_password("secret")
        .with_database("template1")
        .with_pool_size(8);

    assert_eq!(settings.host, "pg");
    assert_eq!(settings.user, "admin");
    assert_eq!(settings.port, 6432);
    assert_eq!(settings.password, "secret");
    assert_eq!(settings.database, "template1");
    assert_eq!(settings.pool_size, 8);
}

#[test]
fn test_connection_settings_deserialize_camel_case() {
    let settings: ConnectionSettings = serde_json::from_str(
        r#"{"host":"pg","port":6432,"user":"admin","password":"pw","poolSize":2}"#,
    )
    .unwrap();

    assert_eq!(settings.host, "pg");
    assert_eq!(settings.port, 6432);
    assert_eq!(settings.pool_size, 2);
    assert_eq!(settings.database, "postgres");
}

#[test]
fn test_connection_settings_accepts_legacy_keys() {
    let settings: ConnectionSettings = serde_json::from_str(
        r#"{"dbHost":"pg","dbPort":5433,"dbUser":"admin","dbPassword":"pw","dbDatabase":"maint"}"#,
    )
    .unwrap();

    assert_eq!(settings.host, "pg");
    assert_eq!(settings.port, 5433);
    assert_eq!(settings.user, "admin");
    assert_eq!(settings.password, "pw");
    assert_eq!(settings.database, "maint");
}

#[test]
fn test_connection_settings_never_serializes_password() {
    let settings = ConnectionSettings::new("pg", "admin").with_password("hunter2");
    let json = serde_json::to_string(&settings).unwrap();

    assert!(!json.contains("hunter2"));
    assert!(json.contains("\"host\":\"pg\""));
}
