// ABOUTME: Command implementations behind each CLI subcommand
// ABOUTME: Exports compare-bucket, compare-states, copy, load and export

pub mod compare;
pub mod copy;
pub mod export;
pub mod load;

pub use compare::{compare_bucket, compare_states};
pub use copy::copy;
pub use export::export;
pub use load::load;

use crate::store::{AccessMode, Store};
use anyhow::{Context, Result};
use std::path::Path;

/// Open a store the command only reads from.
pub(crate) fn open_source(path: &Path, role: &str) -> Result<Store> {
    crate::utils::validate_store_path(path)?;
    Store::open(path, AccessMode::ReadOnly)
        .with_context(|| format!("Failed to open {} store {}", role, path.display()))
}

/// Open (creating when missing) a store the command writes to.
pub(crate) fn open_destination(path: &Path) -> Result<Store> {
    Store::open(path, AccessMode::ReadWrite)
        .with_context(|| format!("Failed to open destination store {}", path.display()))
}

/// Run a blocking engine call on tokio's blocking pool.
pub(crate) async fn run_blocking<T, F>(what: &str, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .with_context(|| format!("{} task did not complete", what))?
}
