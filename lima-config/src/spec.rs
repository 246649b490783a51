//! How a VM gets created when it does not exist yet.

use lima_core::error::{LimaError, Result};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::value::{TaggedValue, Value};

/// Creation specification for a Lima VM.
///
/// In YAML this is a mapping with exactly one of `url` or `config`:
///
/// ```yaml
/// lima:
///   url: template://ubuntu-lts
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawCreationSpec", into = "RawCreationSpec")]
pub enum CreationSpec {
    /// Template reference or URL handed to `limactl start` as-is
    Template(String),
    /// Inline Lima configuration, written to a temporary YAML file
    InlineConfig(Value),
    #[default]
    Unset,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawCreationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<Value>,
}

impl TryFrom<RawCreationSpec> for CreationSpec {
    type Error = LimaError;

    fn try_from(raw: RawCreationSpec) -> Result<Self> {
        CreationSpec::from_parts(raw.url, raw.config)
    }
}

impl From<CreationSpec> for RawCreationSpec {
    fn from(spec: CreationSpec) -> Self {
        match spec {
            CreationSpec::Template(url) => RawCreationSpec {
                url: Some(url),
                config: None,
            },
            CreationSpec::InlineConfig(config) => RawCreationSpec {
                url: None,
                config: Some(config),
            },
            CreationSpec::Unset => RawCreationSpec::default(),
        }
    }
}

impl CreationSpec {
    /// Build a spec from the two optional fields; both present is a configuration error.
    pub fn from_parts(url: Option<String>, config: Option<Value>) -> Result<Self> {
        match (url, config) {
            (Some(_), Some(_)) => Err(LimaError::Config(
                "Only one of url/template/config parameters must be specified".into(),
            )),
            (Some(url), None) => Ok(CreationSpec::Template(url)),
            (None, Some(config)) => Ok(CreationSpec::InlineConfig(config)),
            (None, None) => Ok(CreationSpec::Unset),
        }
    }

    pub fn template(url: impl Into<String>) -> Self {
        CreationSpec::Template(url.into())
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, CreationSpec::Unset)
    }
}

/// Recursively replace every mapping key with its string form.
///
/// Descends into mappings, sequences and tagged values, so mappings nested inside
/// sequences are normalised too. `limactl` rejects non-string keys.
pub fn stringify_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(key, value)| (Value::String(key_to_string(key)), stringify_keys(value)))
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(stringify_keys).collect()),
        Value::Tagged(tagged) => {
            let TaggedValue { tag, value } = *tagged;
            Value::Tagged(Box::new(TaggedValue {
                tag,
                value: stringify_keys(value),
            }))
        }
        scalar => scalar,
    }
}

fn key_to_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Tagged(tagged) => key_to_string(tagged.value),
        compound => serde_yaml_ng::to_string(&compound)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Serialize an inline configuration with all keys stringified.
pub fn normalized_yaml(config: &Value) -> Result<String> {
    Ok(serde_yaml_ng::to_string(&stringify_keys(config.clone()))?)
}
