//! viewlink CLI: bind links to search views and feed them documents.
//!
//! Commands: enhance, load, matches. All output is JSON on stdout;
//! logs go to stderr (`RUST_LOG`, default `warn`).

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use viewlink_core::definition::{set_type, Definition};
use viewlink_core::{enhance_definition, Link, LinkId, RevisionId, TaskQueue};
use viewlink_index::WriteTransaction;

use crate::config::CatalogConfig;

/// Field carrying a document's revision id in JSON Lines input.
const REVISION_FIELD: &str = "_rev";

#[derive(Parser)]
#[command(name = "viewlink")]
#[command(version)]
#[command(about = "Bind collection links to search views")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Validate a link definition and print its canonical form
    Enhance {
        /// Definition JSON file
        definition: PathBuf,
        /// Also require a valid view id, as index creation would
        #[arg(long)]
        create: bool,
    },
    /// Create a link from a definition and bulk-load documents through it
    Load {
        /// Catalog configuration (YAML)
        #[arg(long)]
        config: PathBuf,
        /// Link definition JSON file
        #[arg(long)]
        definition: PathBuf,
        /// Documents as JSON Lines, each with an integer `_rev`
        #[arg(long)]
        documents: PathBuf,
        #[arg(long, default_value_t = 1)]
        link_id: u64,
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
    },
    /// Check whether a candidate definition would recreate an existing link
    Matches {
        /// Catalog configuration (YAML)
        #[arg(long)]
        config: PathBuf,
        /// Definition of the existing link
        #[arg(long)]
        definition: PathBuf,
        /// Candidate definition
        #[arg(long)]
        candidate: PathBuf,
        #[arg(long, default_value_t = 1)]
        link_id: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Enhance { definition, create } => enhance(&definition, create)?,
        Commands::Load {
            config,
            definition,
            documents,
            link_id,
            batch_size,
        } => load(
            &config,
            &definition,
            &documents,
            LinkId(link_id),
            batch_size,
        )?,
        Commands::Matches {
            config,
            definition,
            candidate,
            link_id,
        } => check_matches(&config, &definition, &candidate, LinkId(link_id))?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn enhance(path: &Path, create: bool) -> Result<Value> {
    let definition = read_json(path)?;
    let mut target = Definition::new();
    set_type(&mut target);
    enhance_definition(&definition, &mut target, create)
        .with_context(|| format!("invalid definition {}", path.display()))?;
    Ok(Value::Object(target))
}

fn load(
    config_path: &Path,
    definition_path: &Path,
    documents_path: &Path,
    link_id: LinkId,
    batch_size: usize,
) -> Result<Value> {
    if batch_size == 0 {
        bail!("--batch-size must be positive");
    }

    let config = CatalogConfig::load(config_path)?;
    let opened = config.open(config_dir(config_path))?;
    let collection = opened.catalog.collection(opened.collection);

    let definition = read_json(definition_path)?;
    let link = Link::make(link_id, Some(&collection), &definition)
        .with_context(|| format!("creating link from {}", definition_path.display()))?;
    let link = Arc::new(link);

    let documents = read_documents(documents_path)?;
    let total = documents.len();

    let trx = Arc::new(WriteTransaction::begin());
    let queue = Arc::new(TaskQueue::new());
    for chunk in documents.chunks(batch_size) {
        let batch = chunk.to_vec();
        let link = Arc::clone(&link);
        let trx = Arc::clone(&trx);
        let sink = Arc::clone(&queue);
        queue.enqueue(move || link.batch_insert(Some(&*trx), &batch, Some(&*sink)));
    }
    queue.dispatch_and_wait();
    queue.status().context("batch insert failed")?;

    let indexed = match link.view_id().and_then(|id| opened.views.get(&id)) {
        Some(view) => Some(view.count(opened.collection)?),
        None => None,
    };
    tracing::info!(link = %link_id, documents = total, "bulk load finished");

    Ok(json!({
        "definition": link.to_definition(true, false),
        "documents": total,
        "indexed": indexed,
    }))
}

fn check_matches(
    config_path: &Path,
    definition_path: &Path,
    candidate_path: &Path,
    link_id: LinkId,
) -> Result<Value> {
    let config = CatalogConfig::load(config_path)?;
    let opened = config.open(config_dir(config_path))?;
    let collection = opened.catalog.collection(opened.collection);

    let link = Link::make(link_id, Some(&collection), &read_json(definition_path)?)
        .with_context(|| format!("creating link from {}", definition_path.display()))?;
    let candidate = read_json(candidate_path)?;

    Ok(json!({ "matches": link.matches_definition(&candidate) }))
}

fn config_dir(config_path: &Path) -> &Path {
    config_path.parent().unwrap_or_else(|| Path::new("."))
}

fn read_json(path: &Path) -> Result<Value> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn read_documents(path: &Path) -> Result<Vec<(RevisionId, Value)>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;

    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| -> Result<(RevisionId, Value)> {
            let doc: Value = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid JSON", path.display(), n + 1))?;
            let Some(rev) = doc.get(REVISION_FIELD).and_then(Value::as_u64) else {
                bail!(
                    "{}:{}: missing integer '{REVISION_FIELD}'",
                    path.display(),
                    n + 1
                );
            };
            Ok((RevisionId(rev), doc))
        })
        .collect()
}
