// src/core/interpolator.rs

use crate::core::config_resolver::{Config, KeyNotFoundError};
use crate::models::{ConfigValue, ResolvedNode};
use lazy_static::lazy_static;
use minijinja::{Environment, UndefinedBehavior};
use regex::Regex;
use serde_json::{Map, Value};
use std::borrow::Cow;
use thiserror::Error;

lazy_static! {
    // A whole command token that is exactly one placeholder: `{{ cloudify.version }}`.
    static ref WHOLE_TOKEN_RE: Regex =
        Regex::new(r"^\{\{\s*([^{}\s]+)\s*\}\}$").expect("static regex is valid");
}

/// A command placeholder that could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Could not substitute '{token}': {source}")]
    Lookup {
        token: String,
        #[source]
        source: KeyNotFoundError,
    },
}

/// A template that could not be rendered.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Could not render template: {0}")]
    Render(#[from] minijinja::Error),
}

/// Expands `{{dotted.path}}` placeholders against a resolved configuration.
#[derive(Debug, Clone, Copy)]
pub struct Interpolator<'a> {
    config: &'a Config,
}

impl<'a> Interpolator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Substitutes a single command token. Only tokens that consist entirely of one
    /// placeholder are replaced; anything else is returned untouched.
    pub fn substitute_token<'t>(&self, token: &'t str) -> Result<Cow<'t, str>, InterpolationError> {
        let Some(path) = WHOLE_TOKEN_RE
            .captures(token)
            .and_then(|captures| captures.get(1))
        else {
            return Ok(Cow::Borrowed(token));
        };

        let value = self.lookup(token, path.as_str())?;
        Ok(Cow::Owned(value_to_string(&value)))
    }

    /// Substitutes every token of a command, preserving order.
    pub fn substitute_command<S: AsRef<str>>(
        &self,
        command: &[S],
    ) -> Result<Vec<String>, InterpolationError> {
        command
            .iter()
            .map(|token| {
                self.substitute_token(token.as_ref())
                    .map(Cow::into_owned)
            })
            .collect()
    }

    fn lookup(&self, token: &str, path: &str) -> Result<Value, InterpolationError> {
        self.config
            .lookup(path)
            .map_err(|source| InterpolationError::Lookup {
                token: token.to_string(),
                source,
            })
    }
}

/// Strings are used verbatim; every other JSON value is serialized.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Renders a Jinja template against the resolved configuration.
///
/// Namespaces are exposed as nested objects (`{{ cloudify.version }}`), root entries
/// as top-level variables. Entries that are not set are left out of the context, so
/// referencing one fails while `{% if x is defined %}` still works.
pub fn render_template(template: &str, config: &Config) -> Result<String, TemplateError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    Ok(env.render_str(template, template_context(config))?)
}

/// The resolved view as a JSON object, with `NotSet` entries removed.
pub fn template_context(config: &Config) -> Value {
    let context: Map<String, Value> = config
        .items()
        .into_iter()
        .filter_map(|(key, node)| {
            let value = match node {
                ResolvedNode::Value(ConfigValue::Set(value)) => value,
                ResolvedNode::Value(ConfigValue::NotSet) => return None,
                ResolvedNode::Namespace(entries) => Value::Object(
                    entries
                        .into_iter()
                        .filter_map(|(entry, value)| match value {
                            ConfigValue::Set(value) => Some((entry, value)),
                            ConfigValue::NotSet => None,
                        })
                        .collect(),
                ),
            };
            Some((key, value))
        })
        .collect();
    Value::Object(context)
}
