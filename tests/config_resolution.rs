//! End-to-end checks of schema loading, config layering and lookups through the
//! public API, using files on disk the way a plugin repository lays them out.

use cloudify_tester::core::config_loader;
use cloudify_tester::core::config_resolver::{Config, ConfigError, KeyNotFoundError};
use cloudify_tester::core::interpolator::render_template;
use cloudify_tester::core::schema::SchemaError;
use cloudify_tester::core::schema_display;
use cloudify_tester::models::{ConfigValue, ConfigWarning, ResolvedNode};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};

const CLOUDIFY_SCHEMA: &str = "\
namespace: cloudify
default_version:
  description: Cloudify version to test against.
  default: '4.0'
existing_manager_ip:
  description: IP of an already bootstrapped manager.
";

fn repo_with_schema() -> TempDir {
    let repo = tempdir().unwrap();
    let schemas = repo.path().join("system_tests").join("schemas");
    fs::create_dir_all(&schemas).unwrap();
    fs::write(schemas.join("cloudify.yaml"), CLOUDIFY_SCHEMA).unwrap();
    repo
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_namespaced_entry_resolves_from_config_and_default() {
    // --- Setup ---
    let repo = repo_with_schema();
    let config_file = write(repo.path(), "test_config.yaml", "cloudify.existing_manager_ip: 10.0.0.1\n");

    // --- Execute ---
    let config = config_loader::load_config_with_defaults(Some(&config_file), Some(repo.path())).unwrap();

    // --- Assert ---
    assert_eq!(
        config.items().get("cloudify").unwrap().to_json(),
        json!({"default_version": "4.0", "existing_manager_ip": "10.0.0.1"})
    );
    assert_eq!(
        config.get("cloudify.existing_manager_ip").unwrap(),
        ResolvedNode::Value(ConfigValue::Set(json!("10.0.0.1")))
    );
}

#[test]
fn test_later_config_files_override_earlier_ones() {
    let dir = tempdir().unwrap();
    let schema = write(dir.path(), "schema.yaml", CLOUDIFY_SCHEMA);
    let first = write(dir.path(), "first.yaml", "cloudify.default_version: '4.1'\ncloudify.existing_manager_ip: 1.1.1.1\n");
    let second = write(dir.path(), "second.yaml", "cloudify.existing_manager_ip: 2.2.2.2\n");

    let config = Config::load(&[schema], &[first, second]).unwrap();

    assert_eq!(config.lookup("cloudify.default_version").unwrap(), json!("4.1"));
    assert_eq!(config.lookup("cloudify.existing_manager_ip").unwrap(), json!("2.2.2.2"));
}

#[test]
fn test_invalid_repository_schema_fails_the_whole_load() {
    let repo = repo_with_schema();
    write(
        &repo.path().join("system_tests").join("schemas"),
        "broken.yaml",
        "no_description:\n  default: 1\n",
    );

    let err = config_loader::load_config_with_defaults(None, Some(repo.path())).unwrap_err();

    assert!(matches!(err, ConfigError::Schema(SchemaError::Invalid { .. })));
}

#[test]
fn test_repository_schema_cannot_turn_an_entry_into_a_namespace() {
    let repo = repo_with_schema();
    write(
        &repo.path().join("system_tests").join("schemas"),
        "zz_clash.yaml",
        "namespace: test_groups\nfoo:\n  description: Foo\n",
    );

    let err = config_loader::load_config_with_defaults(None, Some(repo.path())).unwrap_err();

    assert!(matches!(
        err,
        ConfigError::Schema(SchemaError::NamespaceIsEntry(name)) if name == "test_groups"
    ));
}

#[test]
fn test_stale_config_keys_warn_and_stay_unusable() {
    let mut config = config_loader::load_config_with_defaults(None, None).unwrap();

    let warnings = config.update_config_str("c.yaml", "old_setting: 1\nlogging.colour: red\n").unwrap();

    assert_eq!(
        warnings,
        vec![
            ConfigWarning::UnknownKey { key: "logging.colour".to_string() },
            ConfigWarning::UnknownKey { key: "old_setting".to_string() },
        ]
    );
    assert_eq!(
        config.get("old_setting").unwrap_err(),
        KeyNotFoundError::NotInSchema { key: "old_setting".to_string() }
    );
}

#[test]
fn test_sample_config_round_trips_into_a_valid_config() {
    let repo = repo_with_schema();
    let base = config_loader::load_config_with_defaults(None, Some(repo.path())).unwrap();
    let sample = schema_display::generate_sample_config(base.schema()).join("\n");
    let sample_file = write(repo.path(), "sample.yaml", &sample);

    let config = config_loader::load_config_with_defaults(Some(&sample_file), Some(repo.path())).unwrap();

    assert!(config.check_config_is_valid().is_empty());
    assert_eq!(config.lookup("cloudify.default_version").unwrap(), json!("4.0"));
}

#[test]
fn test_template_rendering_uses_resolved_values_and_magic() {
    let repo = repo_with_schema();
    let config_file = write(repo.path(), "test_config.yaml", "cloudify.existing_manager_ip: 10.0.0.1\n");
    let mut config = config_loader::load_config_with_defaults(Some(&config_file), Some(repo.path())).unwrap();
    config_loader::set_workdir(&mut config, Path::new("/tmp/work"));

    let rendered = render_template(
        "manager: {{ cloudify.existing_manager_ip }}\nversion: {{cloudify.default_version}}\n{% if magic.workdir is defined %}key: {{ magic.workdir }}/key.pem{% endif %}\n",
        &config,
    )
    .unwrap();

    assert_eq!(rendered, "manager: 10.0.0.1\nversion: 4.0\nkey: /tmp/work/key.pem");
}
