//! Link definition documents.
//!
//! A definition is a JSON object. The link itself only interprets a few
//! keys; everything else belongs to [`LinkMeta`](crate::meta::LinkMeta):
//!
//! ```json
//! { "type": "link", "view": 5, "fields": ["title", "body"] }
//! ```
//!
//! `skipViewRegistration` is a construction-time marker and is never
//! written back by [`Link::to_definition`](crate::link::Link::to_definition).

use serde_json::{Map, Value};

use crate::error::{LinkError, Result};
use crate::ids::ViewId;

/// Type tag identifying this index kind.
pub const LINK_TYPE: &str = "link";

/// Type tag a view must report to accept links.
pub const SEARCH_VIEW_TYPE: &str = "search";

pub const TYPE_FIELD: &str = "type";
pub const ID_FIELD: &str = "id";
pub const VIEW_ID_FIELD: &str = "view";
pub const SKIP_VIEW_REGISTRATION_FIELD: &str = "skipViewRegistration";
pub const FIGURES_FIELD: &str = "figures";
pub const UNIQUE_FIELD: &str = "unique";
pub const SPARSE_FIELD: &str = "sparse";

/// An open definition object.
pub type Definition = Map<String, Value>;

/// Borrow a definition value as an object.
///
/// # Errors
///
/// Returns [`LinkError::BadDefinition`] if the value is not a JSON object.
pub fn as_object(definition: &Value) -> Result<&Definition> {
    definition
        .as_object()
        .ok_or_else(|| LinkError::BadDefinition("definition must be an object".to_string()))
}

/// Interpret a raw `view` value as a view id.
///
/// Only non-negative JSON integers are accepted; strings, floats and
/// negative numbers yield `None`.
#[must_use]
pub fn parse_view_id(value: &Value) -> Option<ViewId> {
    value.as_u64().map(ViewId)
}

/// Whether the definition asks to defer view registration.
#[must_use]
pub fn skips_view_registration(definition: &Definition) -> bool {
    matches!(
        definition.get(SKIP_VIEW_REGISTRATION_FIELD),
        Some(Value::Bool(true))
    )
}

pub fn set_type(definition: &mut Definition) {
    definition.insert(TYPE_FIELD.to_string(), Value::from(LINK_TYPE));
}

pub fn set_view(definition: &mut Definition, view: ViewId) {
    definition.insert(VIEW_ID_FIELD.to_string(), Value::from(view.get()));
}

/// Mark a definition so the link it creates defers view registration.
pub fn set_skip_view_registration(definition: &mut Definition) {
    definition.insert(SKIP_VIEW_REGISTRATION_FIELD.to_string(), Value::Bool(true));
}
