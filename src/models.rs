// src/models.rs

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// --- SCHEMA MODELS ---

/// One configurable key declared by a schema document.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaEntry {
    pub description: String,
    /// `None` when the schema declares no default. An explicit `default: null`
    /// is kept as `Some(Value::Null)`.
    pub default: Option<Value>,
}

/// A top-level node of the merged schema: either a plain entry or a namespace
/// grouping entries under a shared prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Entry(SchemaEntry),
    Namespace(BTreeMap<String, SchemaEntry>),
}

impl SchemaNode {
    pub fn is_namespace(&self) -> bool {
        matches!(self, Self::Namespace(_))
    }
}

// --- RESOLVED CONFIGURATION MODELS ---

/// The effective value of a configuration entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Set(Value),
    NotSet,
}

impl ConfigValue {
    /// Builds the value a schema default implies when no override is supplied.
    pub fn from_default(default: Option<&Value>) -> Self {
        default.cloned().map_or(Self::NotSet, Self::Set)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Set(value) => Some(value),
            Self::NotSet => None,
        }
    }

    /// JSON form used when a whole namespace is rendered; `NotSet` becomes `null`.
    pub fn to_json(&self) -> Value {
        self.as_value().cloned().unwrap_or(Value::Null)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(Value::String(s)) => f.write_str(s),
            Self::Set(other) => write!(f, "{}", other),
            Self::NotSet => f.write_str("not set"),
        }
    }
}

/// A node of the resolved view: a root value or a whole namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedNode {
    Value(ConfigValue),
    Namespace(BTreeMap<String, ConfigValue>),
}

impl ResolvedNode {
    pub fn as_value(&self) -> Option<&ConfigValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Namespace(_) => None,
        }
    }

    pub fn as_namespace(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            Self::Namespace(entries) => Some(entries),
            Self::Value(_) => None,
        }
    }

    /// JSON form of the node; namespaces become objects.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Value(value) => value.to_json(),
            Self::Namespace(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Root-level view of the resolved configuration. Namespaces appear as
/// `ResolvedNode::Namespace`; the dotted view additionally carries
/// `"namespace.key"` aliases.
pub type ResolvedView = BTreeMap<String, ResolvedNode>;

/// A non-fatal problem found while checking raw config against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The key is in config but not in the schema, so it cannot be used.
    UnknownKey { key: String },
    /// The key belongs to the reserved namespace and is never read from config.
    MagicKey { key: String, known: bool },
    /// A namespace name was given a plain value instead of dotted entries.
    NamespaceValue { namespace: String },
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey { key } => write!(
                f,
                "{} is in config, but not defined in the schema. This key will not be usable until correctly defined in the schema.",
                key
            ),
            Self::MagicKey { key, known: true } => write!(
                f,
                "{} is set in config. This will be ignored, as magic values cannot be configured.",
                key
            ),
            Self::MagicKey { key, known: false } => write!(
                f,
                "{} is in config, but not defined in the schema. Additionally, this is a magic configuration entry, which will not be read from the config even if set.",
                key
            ),
            Self::NamespaceValue { namespace } => write!(
                f,
                "{} is a namespace but was given a value in config. Set its entries as '{}.<key>' instead.",
                namespace, namespace
            ),
        }
    }
}

/// Outcome of `config validate`: entries that need attention before a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Entries with neither a configured value nor a schema default.
    pub unset: Vec<String>,
    /// Magic entries that config tries to set.
    pub ignored_magic: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.unset.is_empty() && self.ignored_magic.is_empty()
    }
}

// --- EXECUTION MODELS ---

/// Per-invocation options for the command executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Working directory; the executor's workdir when `None`.
    pub cwd: Option<PathBuf>,
    /// Directories put in front of `PATH` for this invocation only.
    pub path_prepends: Vec<PathBuf>,
    /// Variables set over the inherited environment.
    pub env_var_overrides: BTreeMap<String, String>,
    /// Exit codes that count as success.
    pub expected_return_codes: BTreeSet<i32>,
    /// Raise `RetriesExceeded` once attempts are exhausted instead of
    /// returning the failing result.
    pub exception_on_failure: bool,
    /// Report the equivalent shell invocation instead of running it.
    pub fake: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay: Duration::from_secs(3),
            cwd: None,
            path_prepends: Vec::new(),
            env_var_overrides: BTreeMap::new(),
            expected_return_codes: BTreeSet::from([0]),
            exception_on_failure: true,
            fake: false,
        }
    }
}

/// The outcome of one (possibly retried) command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub return_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Attempts consumed, starting at 1.
    pub attempts: u32,
    /// Whether `return_code` is one of the expected codes.
    pub succeeded: bool,
}

/// What `execute` produced: a real run or the line a fake run stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed(ExecutionResult),
    /// The shell line that would have been run.
    Faked(String),
}

impl ExecutionOutcome {
    /// The result of a real run; `None` for a fake one.
    pub fn into_result(self) -> Option<ExecutionResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Faked(_) => None,
        }
    }

    /// The reconstructed shell line of a fake run.
    pub fn faked(&self) -> Option<&str> {
        match self {
            Self::Faked(line) => Some(line),
            Self::Completed(_) => None,
        }
    }
}

/// A command registered during a test run to undo something it created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleanup {
    pub command: Vec<String>,
    pub options: ExecuteOptions,
}

impl Cleanup {
    /// A cleanup running `command` with default options.
    pub fn new<S: Into<String>>(command: impl IntoIterator<Item = S>) -> Self {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            options: ExecuteOptions::default(),
        }
    }
}
