//! # rustpubmed
//!
//! PubMed literature signals: biomarker term counts and an incremental
//! longevity paper store.
//!
//! ## Modules
//!
//! - [`pubmed`] - PubMed search URLs and page fetching
//! - [`biomarkers`] - Biomarker term counting over abstract listings
//! - [`medline`] - MEDLINE plain-text record extraction
//! - [`store`] - Semicolon-delimited paper store
//! - [`longevity`] - Dedup/merge of new longevity papers
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rustpubmed::{biomarkers, pubmed::PubmedClient};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let client = PubmedClient::new(&Default::default())?;
//!     let terms = vec!["creatinine".to_string(), "albumin".to_string()];
//!     let counts = biomarkers::search_biomarkers(&client, &terms, &Default::default()).await?;
//!     println!("Found {} biomarkers", counts.len());
//!     Ok(())
//! }
//! ```

pub mod biomarkers;
pub mod error;
pub mod longevity;
pub mod medline;
pub mod pubmed;
pub mod store;

pub use error::{PubmedError, Result};
