//! Catalog configuration file.
//!
//! ```yaml
//! collection: 42
//! views:
//!   - id: 5
//!     path: views/5.db   # relative to this file; omit for in-memory
//!   - id: 6
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use viewlink_core::{CollectionId, ViewId};
use viewlink_index::{Catalog, SqliteView};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Id of the collection links are created on.
    pub collection: u64,
    #[serde(default)]
    pub views: Vec<ViewConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    pub id: u64,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// A catalog opened from configuration, with typed handles to its views.
pub struct OpenCatalog {
    pub catalog: Arc<Catalog>,
    pub collection: CollectionId,
    pub views: BTreeMap<ViewId, Arc<SqliteView>>,
}

impl CatalogConfig {
    /// Read and parse a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    /// Open every configured view and register it in a fresh catalog.
    /// Relative view paths resolve against `base`.
    ///
    /// # Errors
    ///
    /// Fails on a zero or duplicate view id, or if a view database cannot be opened.
    pub fn open(&self, base: &Path) -> Result<OpenCatalog> {
        let catalog = Catalog::new();
        let mut views = BTreeMap::new();

        for cfg in &self.views {
            let Some(id) = ViewId(cfg.id).non_zero() else {
                bail!("view id 0 is reserved");
            };
            let view = match &cfg.path {
                Some(path) => {
                    let path = base.join(path);
                    SqliteView::open(id, &path)
                        .with_context(|| format!("opening view {id} at {}", path.display()))?
                }
                None => SqliteView::in_memory(id)?,
            };
            let view = Arc::new(view);
            if !catalog.add_view(view.clone()) {
                bail!("duplicate view id {id}");
            }
            views.insert(id, view);
        }

        Ok(OpenCatalog {
            catalog,
            collection: CollectionId(self.collection),
            views,
        })
    }
}
