//! Building metadata dictionary loaded from the campus JSON file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::classify::canonical_numeric;
use crate::error::LoadError;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(deserialize_with = "deserialize_specs")]
    pub specs: BTreeMap<String, String>,
}

fn deserialize_specs<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, scalar_to_string(&value)))
        .collect())
}

pub(crate) fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Metadata keyed by object id. Every numeric key is reachable both as
/// written and in canonical form, so `"07"` also answers lookups for `"7"`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataDictionary {
    entries: BTreeMap<String, Metadata>,
}

impl MetadataDictionary {
    pub fn from_json(raw: &str) -> Result<Self, LoadError> {
        let Value::Object(map) = serde_json::from_str::<Value>(raw)? else {
            return Err(LoadError::NotAnObject);
        };
        let mut entries = BTreeMap::new();
        for (key, value) in map {
            let metadata: Metadata = serde_json::from_value(value)?;
            if !key.is_empty() && key.bytes().all(|byte| byte.is_ascii_digit()) {
                let canonical = canonical_numeric(&key);
                if canonical != key {
                    entries
                        .entry(canonical)
                        .or_insert_with(|| metadata.clone());
                }
            }
            entries.insert(key, metadata);
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let raw = fs::read_to_string(path)?;
        let dictionary = Self::from_json(&raw)?;
        log::info!(
            "loaded {} metadata entries from {}",
            dictionary.len(),
            path.display()
        );
        Ok(dictionary)
    }

    pub fn get(&self, object_id: &str) -> Option<&Metadata> {
        self.entries.get(object_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum MetadataState {
    #[default]
    Loading,
    Ready(MetadataDictionary),
    Failed(String),
}

impl MetadataState {
    pub fn from_result(result: Result<MetadataDictionary, LoadError>) -> Self {
        match result {
            Ok(dictionary) => Self::Ready(dictionary),
            Err(err) => Self::Failed(err.to_string()),
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Loading)
    }

    pub fn dictionary(&self) -> Option<&MetadataDictionary> {
        match self {
            Self::Ready(dictionary) => Some(dictionary),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message.as_str()),
            _ => None,
        }
    }
}
