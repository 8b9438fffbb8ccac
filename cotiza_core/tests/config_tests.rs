use cotiza_core::config::{ConfigError, Settings};
use cotiza_core::{PlanLimitsSource, StaticPlans};
use tempfile::TempDir;

#[test]
fn missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::from_file(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(settings.engine.timeout_ms, 15_000);
    assert_eq!(settings.engine.default_providers.len(), 7);
}

#[test]
fn save_then_load_keeps_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut settings = Settings::from_toml(
        r#"
        [engine]
        timeout_ms = 8000
        default_providers = ["jamila", "dimeiggs"]

        [providers.pronobel]
        min_overlap = 0.7

        [plans.school]
        max_items = 40
        max_providers = 3
        "#,
    )
    .unwrap();
    settings.quoting.item_concurrency = 2;
    settings.save(&path).unwrap();

    let loaded = Settings::from_file(&path).unwrap();
    assert_eq!(loaded.engine.timeout_ms, 8000);
    assert_eq!(loaded.engine.default_providers, vec!["jamila", "dimeiggs"]);
    assert_eq!(loaded.quoting.item_concurrency, 2);
    assert_eq!(loaded.provider("pronobel").min_overlap, Some(0.7));
    assert!(loaded.provider("prisa").enabled);

    let plans = StaticPlans::from_settings(&loaded);
    let school = plans.get_limits(Some("school"));
    assert_eq!(school.max_items, Some(40));
    assert_eq!(school.max_providers, Some(3));
    assert_eq!(plans.get_limits(None).max_providers, Some(2));
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[engine]\nmax_concurrency = 0\n").unwrap();
    assert!(matches!(
        Settings::load(Some(&path)),
        Err(ConfigError::Invalid(_))
    ));

    std::fs::write(&path, "[engine]\nparse_threads = 0\n").unwrap();
    assert!(matches!(
        Settings::load(Some(&path)),
        Err(ConfigError::Invalid(msg)) if msg.contains("parse_threads")
    ));

    std::fs::write(&path, "[engine\n").unwrap();
    assert!(matches!(Settings::from_file(&path), Err(ConfigError::Toml(_))));
}
