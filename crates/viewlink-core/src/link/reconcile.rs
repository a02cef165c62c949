//! Matching a candidate definition against an existing link.

use serde_json::Value;

use super::{Binding, Link};
use crate::definition::{parse_view_id, VIEW_ID_FIELD};
use crate::meta::LinkMeta;

impl Link {
    /// Whether creating an index from `candidate` would reproduce this link.
    ///
    /// The candidate's `view` must agree with the view this link is currently
    /// bound to: both absent, or both present and numerically equal. A deferred
    /// or unloaded link has no bound view, so its remembered id never counts.
    /// The candidate's metadata must parse and be structurally equal to the
    /// link's own.
    #[must_use]
    pub fn matches_definition(&self, candidate: &Value) -> bool {
        let Some(fields) = candidate.as_object() else {
            return false;
        };

        let bound = match self.binding {
            Binding::Bound { id, .. } => Some(id),
            Binding::Deferred { .. } | Binding::Unbound { .. } => None,
        };
        let view_matches = match (fields.get(VIEW_ID_FIELD), bound) {
            (None, None) => true,
            (Some(raw), Some(own)) => parse_view_id(raw) == Some(own),
            _ => false,
        };

        view_matches && LinkMeta::from_definition(candidate).is_ok_and(|meta| meta == self.meta)
    }
}
