//! Command-line interface: parse a single article, list a corpus directory,
//! build the index, or run a query against it.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use walkdir::WalkDir;

use gazette::{parser, ArchiveStore, ScoringConfig};

#[derive(Parser)]
#[command(
    name = "gazette",
    about = "Index and search the New York Times 2000 corpus",
    version
)]
struct Cli {
    /// Path of the index database.
    #[arg(long, global = true, default_value = "nyt.sqlite")]
    database: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a single article file and print it as JSON.
    Parse { file: PathBuf },
    /// List every article file under a directory with its size.
    List { dir: PathBuf },
    /// Recursively parse a directory and build the index.
    Build { dir: PathBuf },
    /// Search the index for a free-text query.
    Query {
        /// Return only the k best documents (dynamic pruning); default all.
        #[arg(short)]
        k: Option<usize>,
        /// Query terms.
        #[arg(required = true)]
        terms: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Parse { file } => {
            let article = parser::parse_article(&file)
                .with_context(|| format!("parsing {}", file.display()))?;
            println!("{}", serde_json::to_string_pretty(&article)?);
        }
        Command::List { dir } => {
            for entry in WalkDir::new(&dir) {
                let entry = entry?;
                if entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "xml")
                {
                    let size = entry.metadata()?.len();
                    println!("File: {} with size {} bytes", entry.path().display(), size);
                }
            }
        }
        Command::Build { dir } => {
            let store = ArchiveStore::build(&cli.database, &dir, ScoringConfig::default())
                .with_context(|| format!("building index at {}", cli.database.display()))?;
            println!(
                "Indexed {} documents into {}",
                store.collection_size()?,
                cli.database.display()
            );
        }
        Command::Query { k, terms } => {
            let store = ArchiveStore::open(&cli.database, ScoringConfig::default())
                .with_context(|| format!("opening index {}", cli.database.display()))?;
            let query = terms.join(" ");
            let started = Instant::now();
            let hits = store.query(&query, k)?;
            println!("Found in {:.2} seconds.", started.elapsed().as_secs_f64());
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "{}. score={} did={} {}",
                    rank + 1,
                    hit.score as i64,
                    hit.did,
                    hit.title
                );
            }
        }
    }
    Ok(())
}
