//! Biomarker term counting over PubMed abstract listings.
//!
//! One page of abstracts is fetched for a disease, every `div.abstract`
//! block is isolated, and each candidate term is counted as a whole
//! whitespace-delimited token in the lowercased block markup.

use crate::error::{PubmedError, Result};
use crate::pubmed::PubmedClient;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Total occurrences of one term across a result page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiomarkerCount {
    pub term: String,
    pub count: usize,
}

/// Parameters of a biomarker search
#[derive(Debug, Clone)]
pub struct BiomarkerQuery {
    /// Free-text disease name, spaces allowed
    pub disease: String,
    /// First publication year (inclusive)
    pub start_year: i32,
    /// Last publication year (inclusive)
    pub end_year: i32,
    /// Number of abstracts on the fetched page
    pub page_size: u32,
}

impl Default for BiomarkerQuery {
    fn default() -> Self {
        Self {
            disease: "\"diabetes mellitus\"".to_string(),
            start_year: 2020,
            end_year: 2022,
            page_size: 10,
        }
    }
}

/// Fetch one page of abstracts and count `terms` in it.
///
/// # Errors
///
/// Network and HTTP failures propagate unchanged.
pub async fn search_biomarkers(
    client: &PubmedClient,
    terms: &[String],
    query: &BiomarkerQuery,
) -> Result<Vec<BiomarkerCount>> {
    let url = client.biomarker_search_url(
        &query.disease,
        query.start_year,
        query.end_year,
        query.page_size,
    )?;

    info!(
        disease = %query.disease,
        start_year = query.start_year,
        end_year = query.end_year,
        size = query.page_size,
        "Starting biomarker search"
    );

    let html = client.fetch(&url).await?;
    let counts = count_biomarkers(&html, terms)?;

    info!(terms = terms.len(), found = counts.len(), "Biomarker search complete");
    Ok(counts)
}

/// Serialized markup of every abstract container in `html`.
///
/// Nested containers are returned both on their own and as part of their parent.
pub fn extract_abstract_blocks(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("div.abstract").map_err(|e| PubmedError::Parse(e.to_string()))?;

    Ok(document.select(&selector).map(|el| el.html()).collect())
}

/// Count whole-token, case-insensitive occurrences of each term in the
/// abstract blocks of `html`.
///
/// Only terms with a positive count are returned, in input order. Repeated
/// terms are counted once, at their first position.
pub fn count_biomarkers(html: &str, terms: &[String]) -> Result<Vec<BiomarkerCount>> {
    let blocks = extract_abstract_blocks(html)?;
    debug!(blocks = blocks.len(), "Extracted abstract blocks");

    let lowered: Vec<String> = blocks.iter().map(|b| b.to_lowercase()).collect();

    let mut counts: Vec<BiomarkerCount> = Vec::with_capacity(terms.len());
    for term in terms {
        if counts.iter().any(|c| &c.term == term) {
            continue;
        }
        counts.push(BiomarkerCount {
            term: term.clone(),
            count: 0,
        });
    }

    for entry in counts.iter_mut() {
        let needle = entry.term.to_lowercase();
        for block in &lowered {
            entry.count += block.split_whitespace().filter(|t| *t == needle).count();
        }
    }

    Ok(counts.into_iter().filter(|c| c.count > 0).collect())
}

/// Read candidate terms from a CSV file.
///
/// The first row is a header. Every non-empty cell of the remaining rows is a
/// term, row by row.
pub fn load_terms(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut terms = Vec::new();
    for record in reader.records() {
        let record = record?;
        terms.extend(
            record
                .iter()
                .filter(|cell| !cell.is_empty())
                .map(str::to_string),
        );
    }

    info!(count = terms.len(), path = ?path, "Loaded biomarker terms");
    Ok(terms)
}
