use std::path::Path;

use sandpit::config::{Config, ConfigError, EntryPoint};

use super::{FIXTURES_PATH, fixture_source};

fn config_path(name: &str) -> String {
    format!("{FIXTURES_PATH}/configs/{name}")
}

#[test]
fn test_load_valid_config() {
    let config =
        Config::from_file(config_path("valid_full.toml")).expect("Failed to load config");

    assert_eq!(config.workspace_root, Path::new("/var/tmp/sandpit-full"));
    assert_eq!(config.default_limits.timeout_ms, Some(2000));
    assert_eq!(config.default_limits.grace_period_ms, Some(500));
    assert_eq!(config.request_limits.max_input_bytes, 4096);
    assert!(!config.sweeper.enabled);
    assert_eq!(config.sweeper.max_age_secs, 120);
    assert_eq!(config.language_ids(), ["cpp", "java", "python"]);

    let cpp = config.get_language("cpp").unwrap();
    assert_eq!(cpp.output_name(), "solution");
    assert_eq!(
        config
            .effective_limits(cpp.compile.as_ref().and_then(|c| c.limits.as_ref()))
            .timeout_ms,
        Some(30000)
    );

    let java = config.get_language("java").unwrap();
    assert_eq!(java.entry_point, EntryPoint::PublicClass);
    assert_eq!(java.program_name("public class Solver {}"), "Solver");
    assert_eq!(java.program_name("class Hidden {}"), "Main");
}

#[test]
fn test_load_minimal_config() {
    let config =
        Config::from_file(config_path("valid_minimal.toml")).expect("Failed to load config");

    assert!(config.languages.contains_key("test"));
    assert!(!config.get_language("test").unwrap().is_compiled());
    assert_eq!(config.default_limits.timeout_ms, Some(10_000));
    assert_eq!(config.request_limits.max_code_bytes, 1024 * 1024);
}

#[test]
fn test_load_shell_fixture() {
    let config = Config::from_file(config_path("shell.toml")).expect("Failed to load config");
    let slow = config.get_language("slow").unwrap();
    let limits = config.effective_limits(slow.run.limits.as_ref());

    assert_eq!(limits.timeout_ms, Some(300));
    assert_eq!(limits.output_byte_cap, Some(65536));
}

#[test]
fn test_load_invalid_empty_name() {
    let result = Config::from_file(config_path("invalid_empty_name.toml"));
    assert!(result.is_err());
}

#[test]
fn test_load_invalid_empty_extension() {
    let result = Config::from_file(config_path("invalid_empty_extension.toml"));
    assert!(result.is_err());
}

#[test]
fn test_load_invalid_empty_run_command() {
    let result = Config::from_file(config_path("invalid_empty_run_command.toml"));
    assert!(result.is_err());
}

#[test]
fn test_load_invalid_output_name() {
    let result = Config::from_file(config_path("invalid_output_name.toml"));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_zero_timeout() {
    let result = Config::from_file(config_path("invalid_zero_timeout.toml"));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_zero_output_cap_override() {
    let result = Config::from_file(config_path("invalid_zero_output_cap_override.toml"));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_builtin_java_ignores_nested_public_class() {
    let config = Config::default();
    let java = config.get_language("java").unwrap();

    assert_eq!(java.program_name(&fixture_source("NestedNode.java")), "Main");
    assert_eq!(java.program_name(&fixture_source("Greeter.java")), "Greeter");
}

#[test]
fn test_load_missing_file() {
    let result = Config::from_file(config_path("does_not_exist.toml"));
    assert!(matches!(result, Err(ConfigError::ReadFile { .. })));
}

#[test]
fn test_layered_load_keeps_builtin_languages() {
    let path = config_path("valid_minimal.toml");
    let config = Config::load(Some(Path::new(&path))).expect("Failed to load config");

    assert!(config.languages.contains_key("test"));
    assert!(config.languages.contains_key("python"));
    assert!(config.languages.contains_key("cpp"));
}
