use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tagdex::{AudioTagExtractor, Index, IngestDriver, Schema, TagdexError};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tagdex")]
#[command(about = "Index and search tags of music files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Traverse a directory and record file paths and tags into a
    /// searchable database
    Build {
        /// Base directory to traverse
        base_directory: PathBuf,

        /// Database directory. An existing database is updated in place.
        #[arg(long = "db", default_value = "tagdb")]
        database: PathBuf,
    },
    /// Search the tag database
    ///
    /// Query language: boolean operators (pink AND floyd), phrases
    /// ("pink floyd"), sequences with slop ("pink floyd"~5), wildcards
    /// (p?nk fl*d; wildcards never match across terms), lexical ranges
    /// ([apple TO bear]), and fuzzy terms (cat~, cat~2, johannson~2/3).
    Search {
        /// Search term; multiple words are joined with spaces
        #[arg(required = true)]
        search_term: Vec<String>,

        /// Database directory
        #[arg(long = "db", default_value = "tagdb")]
        database: PathBuf,

        /// Limit the number of search results (default: all results)
        #[arg(short = 'l')]
        limit: Option<usize>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            base_directory,
            database,
        } => match build(&base_directory, &database) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("build failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::Search {
            search_term,
            database,
            limit,
        } => search(&search_term.join(" "), &database, limit),
    }
}

fn build(base_directory: &PathBuf, database: &PathBuf) -> Result<()> {
    info!("tag database in {}", database.display());
    let index = Index::open_or_create(database, Schema::tag_schema())?;

    info!("traversing {}", base_directory.display());
    let stats = IngestDriver::new(&index, AudioTagExtractor).ingest(base_directory)?;

    info!(
        "indexed {} files ({} unsupported, {} failed, {} commits)",
        stats.indexed, stats.unsupported, stats.failed, stats.commits
    );
    Ok(())
}

fn search(search_term: &str, database: &PathBuf, limit: Option<usize>) -> ExitCode {
    info!("tag database in {}", database.display());
    if !Index::exists(database) {
        error!("tag database not found in {}", database.display());
        return ExitCode::FAILURE;
    }

    let index = match Index::open_or_create(database, Schema::tag_schema()) {
        Ok(index) => index,
        Err(e) => {
            error!("error opening tag database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let searcher = index.searcher();
    info!("searching ...");
    let results = match searcher.query(search_term, limit) {
        Ok(results) => results,
        Err(e @ TagdexError::QuerySyntax { .. }) => {
            // A malformed query is reported distinctly from zero matches.
            error!("error parsing search query '{}': {}", search_term, e);
            return ExitCode::from(2);
        }
        Err(e) => {
            error!("search failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("found {} results", results.len());
    for (n, hit) in results.iter().enumerate() {
        println!("{}: {}", n, hit.path);
    }
    ExitCode::SUCCESS
}
