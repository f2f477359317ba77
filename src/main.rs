//! rustpubmed - PubMed biomarker counts and longevity paper tracking
//!
//! ## Usage
//!
//! ```bash
//! rustpubmed biomarkers "chronic kidney disease"
//! rustpubmed longevity 100
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustpubmed::{
    biomarkers::{self, BiomarkerQuery},
    longevity::{self, MergeOutcome},
    medline::PaperRecord,
    pubmed::{ClientOptions, PubmedClient},
    store::{PaperStore, DEFAULT_STORE_PATH},
};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// PubMed biomarker counts and longevity paper tracking
#[derive(Parser)]
#[command(name = "rustpubmed")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Mirror site URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Proxy URL (e.g., http://127.0.0.1:7890)
    #[arg(long, global = true)]
    proxy: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count biomarker mentions in abstracts about a disease
    Biomarkers {
        /// Disease to search for. Quote it if it has more than one word
        #[arg(default_value = "\"diabetes mellitus\"")]
        disease: String,

        /// CSV file of candidate biomarkers (first row is a header)
        #[arg(long, default_value = "./data/raw/biomarkers.csv")]
        terms: PathBuf,

        /// First publication year
        #[arg(long, default_value_t = 2020)]
        start_year: i32,

        /// Last publication year
        #[arg(long, default_value_t = 2022)]
        end_year: i32,

        /// Number of abstracts to fetch
        #[arg(long, default_value_t = 10)]
        size: u32,
    },

    /// Store new longevity papers
    Longevity {
        /// Number of papers to fetch. PubMed accepts 10, 20, 50, 100, 200...
        #[arg(default_value_t = longevity::DEFAULT_PAGE_SIZE)]
        page_size: u32,

        /// Paper store file
        #[arg(long, default_value = DEFAULT_STORE_PATH)]
        store: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let client = PubmedClient::new(&ClientOptions {
        base_url: cli.base_url,
        proxy: cli.proxy,
    })
    .context("Failed to create PubMed client")?;

    match cli.command {
        Commands::Biomarkers {
            disease,
            terms,
            start_year,
            end_year,
            size,
        } => {
            let query = BiomarkerQuery {
                disease,
                start_year,
                end_year,
                page_size: size,
            };
            run_biomarkers(&client, terms, query).await
        }
        Commands::Longevity { page_size, store } => run_longevity(&client, store, page_size).await,
    }
}

// ============================================================================
// Pipelines
// ============================================================================

async fn run_biomarkers(client: &PubmedClient, terms_path: PathBuf, query: BiomarkerQuery) -> Result<()> {
    let terms = biomarkers::load_terms(&terms_path)
        .with_context(|| format!("Failed to read biomarkers from {}", terms_path.display()))?;

    let counts = biomarkers::search_biomarkers(client, &terms, &query)
        .await
        .context("Biomarker search failed")?;

    let pairs: Vec<(&str, usize)> = counts.iter().map(|c| (c.term.as_str(), c.count)).collect();
    println!("Biomarkers for {}: {:?}", query.disease, pairs);
    Ok(())
}

async fn run_longevity(client: &PubmedClient, store_path: PathBuf, page_size: u32) -> Result<()> {
    let mut store = PaperStore::open(store_path);

    let outcome = longevity::update_papers(client, &mut store, page_size)
        .await
        .context("Longevity update failed")?;

    match outcome {
        MergeOutcome::NoNewRecords => {
            println!("There are no new papers.");
        }
        MergeOutcome::Merged { added, total } => {
            println!("New Papers:");
            print_papers(&added);
            println!("\nSaved {} papers to {}", total, store.path().display());
        }
    }
    Ok(())
}

/// Print records as a doi/date/title/keywords table
fn print_papers(records: &[PaperRecord]) {
    println!("{:>4}  {:<40} {:<10} {:<60} keywords", "", "doi", "date", "title");
    for (i, record) in records.iter().enumerate() {
        let title: String = record.title.chars().take(60).collect();
        println!(
            "{:>4}  {:<40} {:<10} {:<60} {}",
            i,
            record.doi,
            record.date,
            title,
            record.keywords.join(", ")
        );
    }
}
