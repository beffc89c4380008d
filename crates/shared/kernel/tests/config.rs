use shortly_kernel::config::load_config;
use shortly_kernel::domain::config::ApiConfig;
use std::io::Write;

#[test]
fn file_overrides_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "[server]\nport = 9000\ncors_origins = [\"https://a.example\"]\n\n[links]\nbase_url = \"https://sho.rt\""
    )
    .unwrap();

    let cfg: ApiConfig = load_config(Some(file.path())).unwrap();

    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.cors_origins, vec!["https://a.example"]);
    assert_eq!(cfg.links.base_url, "https://sho.rt");
    assert_eq!(cfg.links.slug_length, 6);
    assert_eq!(cfg.database.namespace, "shortly");
}

#[test]
fn explicit_missing_file_fails() {
    let result = load_config::<ApiConfig>(Some("/definitely/not/here.toml"));
    assert!(result.is_err());
}

#[test]
fn malformed_values_fail() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[server]\nport = \"not a port\"").unwrap();
    assert!(load_config::<ApiConfig>(Some(file.path())).is_err());
}
