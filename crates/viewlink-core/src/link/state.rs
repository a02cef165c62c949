//! Serialization of a link's configuration and binding.

use std::mem::size_of;

use serde_json::{json, Value};

use super::Link;
use crate::definition::{
    as_object, parse_view_id, set_type, set_view, Definition, FIGURES_FIELD, ID_FIELD,
    SPARSE_FIELD, UNIQUE_FIELD, VIEW_ID_FIELD,
};
use crate::error::{LinkError, Result};
use crate::meta::LinkMeta;

impl Link {
    /// Build a fresh definition describing this link.
    ///
    /// The `view` key carries the bound view's id, else the remembered id,
    /// and is omitted when neither exists. Figures are runtime data and are
    /// only emitted when requested and not `for_persistence`.
    #[must_use]
    pub fn to_definition(&self, with_figures: bool, for_persistence: bool) -> Definition {
        let mut definition = Definition::new();
        self.meta.write_into(&mut definition);
        definition.insert(ID_FIELD.to_string(), Value::from(self.id.to_string()));
        set_type(&mut definition);
        definition.insert(UNIQUE_FIELD.to_string(), Value::Bool(self.unique()));
        definition.insert(SPARSE_FIELD.to_string(), Value::Bool(self.sparse()));

        if let Some(view) = self.view_id() {
            set_view(&mut definition, view);
        }

        if with_figures && !for_persistence {
            definition.insert(FIGURES_FIELD.to_string(), json!({ "memory": self.memory() }));
        }

        definition
    }

    /// Estimated memory attributed to this link, in bytes.
    ///
    /// Includes an even share of the bound view's memory across all links
    /// registered with it, so the figure moves as sibling links come and go.
    #[must_use]
    pub fn memory(&self) -> usize {
        let mut size = size_of::<Self>() + self.meta.memory() - size_of::<LinkMeta>();

        if let Some(view) = self.bound_view() {
            size += view.memory() / view.link_count().max(1);
        }

        size
    }
}

/// Validate and canonicalize a candidate definition before any link exists.
///
/// Writes the normalized metadata and a copy of any `view` value into
/// `target`. When `create` is set, the `view` value must also be a valid
/// view id, since binding would reject it anyway. Nothing is looked up or
/// registered.
///
/// # Errors
///
/// Returns [`LinkError::BadDefinition`] if the metadata does not parse, or
/// if `create` is set and `view` is not a non-negative integer.
pub fn enhance_definition(definition: &Value, target: &mut Definition, create: bool) -> Result<()> {
    let meta = LinkMeta::from_definition(definition).inspect_err(|e| {
        tracing::warn!(error = %e, "error parsing link definition");
    })?;

    if let Some(raw) = as_object(definition)?.get(VIEW_ID_FIELD) {
        if create && parse_view_id(raw).is_none() {
            return Err(LinkError::BadDefinition(format!(
                "invalid view identifier: {raw}"
            )));
        }
        target.insert(VIEW_ID_FIELD.to_string(), raw.clone());
    }

    meta.write_into(target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::LinkId;
    use crate::testing::{collection_with, RecordingView, TestDatabase};
    use crate::view::View;

    #[test]
    fn bound_link_reproduces_view_and_fields() {
        let db = TestDatabase::with_views([RecordingView::search(5)]);
        let collection = collection_with(1, &db);
        let link = Link::make(
            LinkId(12),
            Some(&collection),
            &json!({ "type": "link", "view": 5, "fields": ["a"] }),
        )
        .unwrap();

        let def = link.to_definition(false, false);
        assert_eq!(def["view"], json!(5));
        assert_eq!(def["fields"], json!(["a"]));
        assert_eq!(def["type"], json!("link"));
        assert_eq!(def["id"], json!("12"));
        assert_eq!(def["unique"], json!(false));
        assert_eq!(def["sparse"], json!(true));
        assert!(!def.contains_key("figures"));
        assert!(!def.contains_key("skipViewRegistration"));
    }

    #[test]
    fn unload_keeps_reported_view() {
        let db = TestDatabase::with_views([RecordingView::search(5)]);
        let collection = collection_with(1, &db);
        let mut link = Link::make(LinkId(12), Some(&collection), &json!({ "view": 5 })).unwrap();

        let before = link.to_definition(false, true)["view"].clone();
        link.unload();
        assert_eq!(link.to_definition(false, true)["view"], before);
    }

    #[test]
    fn deferred_link_reports_candidate_or_nothing() {
        let link = Link::make(
            LinkId(1),
            None,
            &json!({ "skipViewRegistration": true, "view": 9 }),
        )
        .unwrap();
        assert_eq!(link.to_definition(false, true)["view"], json!(9));

        let link = Link::make(
            LinkId(1),
            None,
            &json!({ "skipViewRegistration": true, "view": 0 }),
        )
        .unwrap();
        assert!(!link.to_definition(false, true).contains_key("view"));

        let link = Link::make(LinkId(1), None, &json!({ "skipViewRegistration": true })).unwrap();
        assert!(!link.to_definition(false, true).contains_key("view"));
    }

    #[test]
    fn figures_only_outside_persistence() {
        let link = Link::make(LinkId(1), None, &json!({ "skipViewRegistration": true })).unwrap();

        let def = link.to_definition(true, false);
        assert_eq!(def["figures"]["memory"], json!(link.memory()));
        assert!(!link.to_definition(true, true).contains_key("figures"));
    }

    #[test]
    fn memory_shares_view_between_links() {
        let view = RecordingView::search(5);
        view.set_memory(1000);
        let db = TestDatabase::with_views([view]);
        let collection = collection_with(1, &db);

        let first = Link::make(LinkId(1), Some(&collection), &json!({ "view": 5 })).unwrap();
        let alone = first.memory();

        let second = Link::make(LinkId(2), Some(&collection), &json!({ "view": 5 })).unwrap();
        let shared = first.memory();

        assert_eq!(alone - shared, 1000 - 500);
        assert_eq!(first.memory(), second.memory());
        assert_eq!(db.view(5).link_count(), 2);
    }

    #[test]
    fn memory_of_unbound_link_excludes_view() {
        let view = RecordingView::search(5);
        view.set_memory(1000);
        let db = TestDatabase::with_views([view]);
        let collection = collection_with(1, &db);
        let mut link = Link::make(LinkId(1), Some(&collection), &json!({ "view": 5 })).unwrap();

        let bound = link.memory();
        link.unload();
        assert_eq!(bound - link.memory(), 1000);
    }

    #[test]
    fn enhance_normalizes_and_copies_view() {
        let mut target = Definition::new();
        enhance_definition(
            &json!({ "view": 5, "fields": ["b", "a"], "skipViewRegistration": true }),
            &mut target,
            true,
        )
        .expect("enhance");

        assert_eq!(target["view"], json!(5));
        assert_eq!(target["fields"], json!(["a", "b"]));
        assert_eq!(target["analyzers"], json!(["identity"]));
        assert!(!target.contains_key("skipViewRegistration"));
    }

    #[test]
    fn enhance_rejects_bad_metadata() {
        let mut target = Definition::new();
        let err = enhance_definition(&json!({ "fields": [1] }), &mut target, false).unwrap_err();
        assert!(matches!(err, LinkError::BadDefinition(_)));
        assert!(target.is_empty());
    }

    #[test]
    fn enhance_checks_view_only_on_create() {
        let def = json!({ "view": "five" });

        let mut target = Definition::new();
        assert!(enhance_definition(&def, &mut target, true).is_err());

        let mut target = Definition::new();
        enhance_definition(&def, &mut target, false).expect("enhance");
        assert_eq!(target["view"], json!("five"));
    }

    #[test]
    fn enhance_keeps_existing_keys_of_target() {
        let mut target = Definition::new();
        target.insert("id".to_string(), json!("3"));
        enhance_definition(&json!({ "fields": ["a"] }), &mut target, true).unwrap();
        assert_eq!(target["id"], json!("3"));
        assert!(!target.contains_key("view"));
    }
}
