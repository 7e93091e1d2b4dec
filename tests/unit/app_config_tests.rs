/*!
 * Tests for application configuration
 */

use anyhow::Result;
use lingotrack::app_config::{Config, LogLevel};
use lingotrack::providers::Translator;
use lingotrack::Registry;

/// Test that a config file with translators builds a registry
#[test]
fn test_config_fromJson_shouldRegisterTranslators() -> Result<()> {
    let json = r#"{
        "source_language": "en",
        "target_language": "fr",
        "export_directory": "out",
        "translators": [
            { "id": "agency", "label": "Agency", "plugin": "file", "settings": { "export_format": "html" } },
            { "id": "demo", "plugin": "mock" }
        ],
        "default_translator": "agency",
        "log_level": "debug"
    }"#;
    let config: Config = serde_json::from_str(json)?;
    config.validate()?;

    let registry = Registry::with_defaults(&config)?;

    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(registry.translators().len(), 2);
    assert_eq!(registry.translator("agency")?.label, "Agency");
    assert_eq!(config.default_translator().map(|t| t.plugin.as_str()), Some("file"));
    Ok(())
}

/// Test that a translator bound to an unknown plugin is refused
#[test]
fn test_registry_withUnknownPlugin_shouldFail() {
    let config = Config {
        translators: vec![Translator::new("deepl", "deepl")],
        default_translator: None,
        ..Config::default()
    };

    assert!(config.validate().is_ok());
    assert!(Registry::with_defaults(&config).is_err());
}

/// Test that duplicate translator ids are refused
#[test]
fn test_validate_withDuplicateTranslators_shouldFail() {
    let config = Config {
        translators: vec![Translator::new("files", "file"), Translator::new("files", "mock")],
        ..Config::default()
    };

    assert!(config.validate().is_err());
}
