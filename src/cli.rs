//! Command-line interface definitions.
//!
//! Every option can also come from the YAML config file; flags given here win.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Harvest oil & gas news into a deduplicated CSV history.
///
/// # Examples
///
/// ```sh
/// # Crawl every configured site and commit
/// oilfield_news --config harvest.yaml harvest
///
/// # Crawl one listing page per start URL without touching the dataset
/// oilfield_news harvest --max-pages 1 --dry-run
///
/// # Fold a batch file produced elsewhere into the dataset
/// oilfield_news --dataset data/news.csv merge --batch data/news_new.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Committed dataset path (overrides the config file)
    #[arg(short, long, global = true)]
    pub dataset: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Crawl all configured sites, then commit the new records
    Harvest {
        /// Listing pages per start URL (0 = until the site runs out)
        #[arg(long)]
        max_pages: Option<u32>,

        /// Ignore already-committed dates and paginate to the budget
        #[arg(long)]
        no_hard_stop: bool,

        /// Crawl and check the merge, but leave the dataset untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Merge a batch CSV file into the committed dataset
    Merge {
        /// Batch file to merge
        #[arg(short, long)]
        batch: PathBuf,

        /// Check the merge, but leave the dataset untouched
        #[arg(long)]
        dry_run: bool,
    },
}
