//! Link metadata: which document fields a link indexes and how.
//!
//! Metadata is parsed from the same definition object that carries the
//! link's `type` and `view` keys; keys it does not know are ignored.
//!
//! ```json
//! {
//!   "fields": ["title", { "name": "body", "analyzers": ["text_en"] }],
//!   "analyzers": ["identity"],
//!   "includeAllFields": false,
//!   "trackListPositions": false
//! }
//! ```
//!
//! Equality is structural: fields are a set keyed by name and analyzers are
//! a set, so declaration order never matters. A field option that repeats
//! the link-level value is dropped on parse, which makes `"a"` and
//! `{ "name": "a", "includeAllFields": false }` the same field.

use std::collections::{BTreeMap, BTreeSet};
use std::mem::size_of;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::definition::Definition;
use crate::error::{LinkError, Result};

pub const FIELDS_FIELD: &str = "fields";
pub const ANALYZERS_FIELD: &str = "analyzers";
pub const INCLUDE_ALL_FIELDS_FIELD: &str = "includeAllFields";
pub const TRACK_LIST_POSITIONS_FIELD: &str = "trackListPositions";

/// Analyzer applied when a definition names none.
pub const DEFAULT_ANALYZER: &str = "identity";

/// Indexed-field configuration owned by a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMeta {
    analyzers: BTreeSet<String>,
    include_all_fields: bool,
    track_list_positions: bool,
    fields: BTreeMap<String, FieldOverrides>,
}

/// Per-field options that differ from the link-level defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOverrides {
    pub analyzers: Option<BTreeSet<String>>,
    pub include_all_fields: Option<bool>,
    pub track_list_positions: Option<bool>,
}

impl FieldOverrides {
    fn is_empty(&self) -> bool {
        self.analyzers.is_none()
            && self.include_all_fields.is_none()
            && self.track_list_positions.is_none()
    }
}

/// Effective options of one indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOptions<'a> {
    pub analyzers: &'a BTreeSet<String>,
    pub include_all_fields: bool,
    pub track_list_positions: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMeta {
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    analyzers: Option<Vec<String>>,
    #[serde(default)]
    include_all_fields: bool,
    #[serde(default)]
    track_list_positions: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawField {
    Name(String),
    Detailed(RawFieldOptions),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawFieldOptions {
    name: String,
    #[serde(default)]
    analyzers: Option<Vec<String>>,
    #[serde(default)]
    include_all_fields: Option<bool>,
    #[serde(default)]
    track_list_positions: Option<bool>,
}

impl Default for LinkMeta {
    fn default() -> Self {
        Self {
            analyzers: BTreeSet::from([DEFAULT_ANALYZER.to_string()]),
            include_all_fields: false,
            track_list_positions: false,
            fields: BTreeMap::new(),
        }
    }
}

impl LinkMeta {
    /// Parse metadata from a definition document.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::BadDefinition`] if a metadata key has the wrong
    /// shape, a field name is empty or repeated, or an analyzer list is empty.
    pub fn from_definition(definition: &Value) -> Result<Self> {
        if !definition.is_object() {
            return Err(LinkError::BadDefinition(
                "definition must be an object".to_string(),
            ));
        }

        let raw = RawMeta::deserialize(definition)
            .map_err(|e| LinkError::BadDefinition(e.to_string()))?;

        let mut meta = Self {
            analyzers: match raw.analyzers {
                Some(list) => analyzer_set(ANALYZERS_FIELD, list)?,
                None => Self::default().analyzers,
            },
            include_all_fields: raw.include_all_fields,
            track_list_positions: raw.track_list_positions,
            fields: BTreeMap::new(),
        };

        for field in raw.fields {
            let (name, overrides) = match field {
                RawField::Name(name) => (name, FieldOverrides::default()),
                RawField::Detailed(opts) => {
                    let analyzers = opts
                        .analyzers
                        .map(|list| analyzer_set(&format!("{FIELDS_FIELD}.{}", opts.name), list))
                        .transpose()?;
                    (
                        opts.name,
                        FieldOverrides {
                            analyzers: analyzers.filter(|a| *a != meta.analyzers),
                            include_all_fields: opts
                                .include_all_fields
                                .filter(|v| *v != meta.include_all_fields),
                            track_list_positions: opts
                                .track_list_positions
                                .filter(|v| *v != meta.track_list_positions),
                        },
                    )
                }
            };

            if name.is_empty() {
                return Err(LinkError::BadDefinition(format!(
                    "'{FIELDS_FIELD}' contains an empty field name"
                )));
            }
            if meta.fields.contains_key(&name) {
                return Err(LinkError::BadDefinition(format!(
                    "duplicate field '{name}' in '{FIELDS_FIELD}'"
                )));
            }
            meta.fields.insert(name, overrides);
        }

        Ok(meta)
    }

    /// Add a field that inherits the link-level options.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldOverrides::default());
        self
    }

    #[must_use]
    pub fn with_include_all_fields(mut self, include: bool) -> Self {
        self.include_all_fields = include;
        self
    }

    #[must_use]
    pub fn analyzers(&self) -> &BTreeSet<String> {
        &self.analyzers
    }

    #[must_use]
    pub fn include_all_fields(&self) -> bool {
        self.include_all_fields
    }

    #[must_use]
    pub fn track_list_positions(&self) -> bool {
        self.track_list_positions
    }

    /// Indexed field names in canonical (sorted) order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Effective options of a field, or `None` if the field is not indexed.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldOptions<'_>> {
        self.fields.get(name).map(|o| FieldOptions {
            analyzers: o.analyzers.as_ref().unwrap_or(&self.analyzers),
            include_all_fields: o.include_all_fields.unwrap_or(self.include_all_fields),
            track_list_positions: o
                .track_list_positions
                .unwrap_or(self.track_list_positions),
        })
    }

    /// Write the canonical form of this metadata into an open definition.
    pub fn write_into(&self, definition: &mut Definition) {
        let fields = self
            .fields
            .iter()
            .map(|(name, overrides)| {
                if overrides.is_empty() {
                    return Value::from(name.as_str());
                }
                let mut obj = Map::new();
                obj.insert("name".to_string(), Value::from(name.as_str()));
                if let Some(analyzers) = &overrides.analyzers {
                    obj.insert(ANALYZERS_FIELD.to_string(), analyzer_array(analyzers));
                }
                if let Some(v) = overrides.include_all_fields {
                    obj.insert(INCLUDE_ALL_FIELDS_FIELD.to_string(), Value::Bool(v));
                }
                if let Some(v) = overrides.track_list_positions {
                    obj.insert(TRACK_LIST_POSITIONS_FIELD.to_string(), Value::Bool(v));
                }
                Value::Object(obj)
            })
            .collect();

        definition.insert(FIELDS_FIELD.to_string(), Value::Array(fields));
        definition.insert(ANALYZERS_FIELD.to_string(), analyzer_array(&self.analyzers));
        definition.insert(
            INCLUDE_ALL_FIELDS_FIELD.to_string(),
            Value::Bool(self.include_all_fields),
        );
        definition.insert(
            TRACK_LIST_POSITIONS_FIELD.to_string(),
            Value::Bool(self.track_list_positions),
        );
    }

    /// Estimated heap footprint in bytes, including `self`.
    #[must_use]
    pub fn memory(&self) -> usize {
        let set_size = |set: &BTreeSet<String>| -> usize {
            set.iter().map(|s| size_of::<String>() + s.capacity()).sum()
        };

        let mut size = size_of::<Self>() + set_size(&self.analyzers);
        for (name, overrides) in &self.fields {
            size += size_of::<String>() + name.capacity() + size_of::<FieldOverrides>();
            if let Some(analyzers) = &overrides.analyzers {
                size += set_size(analyzers);
            }
        }
        size
    }
}

fn analyzer_set(key: &str, list: Vec<String>) -> Result<BTreeSet<String>> {
    if list.is_empty() {
        return Err(LinkError::BadDefinition(format!(
            "'{key}' must name at least one analyzer"
        )));
    }
    if list.iter().any(String::is_empty) {
        return Err(LinkError::BadDefinition(format!(
            "'{key}' contains an empty analyzer name"
        )));
    }
    Ok(list.into_iter().collect())
}

fn analyzer_array(set: &BTreeSet<String>) -> Value {
    Value::Array(set.iter().map(|a| Value::from(a.as_str())).collect())
}
