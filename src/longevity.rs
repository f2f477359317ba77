//! Incremental longevity paper collection.
//!
//! Fetches the newest longevity records, drops the ones whose DOI is already
//! stored and appends the rest to the paper store.

use crate::error::Result;
use crate::medline::{self, PaperRecord};
use crate::pubmed::PubmedClient;
use crate::store::PaperStore;
use tracing::info;

/// Default number of records requested per run
pub const DEFAULT_PAGE_SIZE: u32 = 200;

/// Result of merging one page into the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Every record on the page was already stored; nothing was written
    NoNewRecords,
    /// New records were appended and the store rewritten
    Merged {
        /// Newly stored records in discovery order
        added: Vec<PaperRecord>,
        /// Store size after the merge
        total: usize,
    },
}

/// Merge already extracted records into the store.
///
/// Writes the store only when `novel` is non-empty.
pub fn merge_records(store: &mut PaperStore, novel: Vec<PaperRecord>) -> Result<MergeOutcome> {
    if novel.is_empty() {
        info!("There are no new papers");
        return Ok(MergeOutcome::NoNewRecords);
    }

    store.append(novel.iter().cloned());
    store.save()?;

    info!(added = novel.len(), total = store.len(), path = ?store.path(), "Paper store updated");
    Ok(MergeOutcome::Merged {
        added: novel,
        total: store.len(),
    })
}

/// Extract novel records from a MEDLINE page and merge them into the store.
pub fn merge_page(store: &mut PaperStore, text: &str) -> Result<MergeOutcome> {
    let novel = medline::extract_records(text, &store.dois());
    merge_records(store, novel)
}

/// Fetch one page of longevity records and merge the novel ones into the store.
///
/// # Errors
///
/// Network failures abort before the store is touched.
pub async fn update_papers(
    client: &PubmedClient,
    store: &mut PaperStore,
    page_size: u32,
) -> Result<MergeOutcome> {
    let novel = medline::fetch_records(client, page_size, &store.dois()).await?;
    merge_records(store, novel)
}
