//! Identifier newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identity of a link (index id within its collection).
    LinkId
);
id_type!(
    /// Identity of a view. `0` is never a valid view id.
    ViewId
);
id_type!(CollectionId);
id_type!(
    /// Revision of a document within a collection.
    RevisionId
);
id_type!(TransactionId);

impl ViewId {
    /// Returns `None` for the reserved id `0`.
    #[must_use]
    pub fn non_zero(self) -> Option<Self> {
        (self.0 != 0).then_some(self)
    }
}
