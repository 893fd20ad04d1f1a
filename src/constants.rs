// src/constants.rs

/// Separator used for dotted-path addressing of configuration entries (`namespace.key`).
pub const DELIMITER: char = '.';

/// Top-level schema key that assigns a schema document to a namespace.
pub const NAMESPACE_KEY: &str = "namespace";

/// The reserved namespace holding runtime-injected values.
pub const MAGIC_NAMESPACE: &str = "magic";

/// Magic entry holding the managed working directory of a test run.
pub const MAGIC_WORKDIR: &str = "workdir";

/// Magic entry holding the root of the repository under test.
pub const MAGIC_REPO_ROOT: &str = "repo_root";

/// Environment variable selecting the config file when none is given explicitly.
pub const CONFIG_ENV_VAR: &str = "CLOUDIFY_PLUGIN_TESTS_CONFIG";

/// Config file used when neither the CLI nor the environment names one.
pub const DEFAULT_CONFIG_FILENAME: &str = "test_config.yaml";

/// Directory (relative to the repository root) searched for extra schemas.
pub const REPO_SCHEMAS_DIR: &str = "system_tests/schemas";

/// Directory (relative to the repository root) searched for templates.
pub const REPO_TEMPLATES_DIR: &str = "system_tests/templates";

/// Log file written into the workdir of every test environment.
pub const RUN_LOG_FILENAME: &str = "test_run.log";

/// File collecting the commands that cleanup would have run when cleanup is disabled.
pub const CLEANUP_INTENT_FILENAME: &str = "cleanup_intent.log";

/// Prefix of every generated environment dotfile.
pub const ENV_FILE_PREFIX: &str = "env_";

/// Prefix of every temporary workdir.
pub const WORKDIR_PREFIX: &str = "cloudify_tester";

/// Test groups run when no config file could be loaded.
pub const FALLBACK_TEST_GROUPS: &[&str] = &["code-quality", "internal"];

/// The test group whose failures may be ignored by configuration.
pub const CODE_QUALITY_GROUP: &str = "code-quality";
