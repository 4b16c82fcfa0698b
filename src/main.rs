use anyhow::Result;
use clap::{Parser, Subcommand};
use histix::index::reader::IndexReader;
use histix::index::stats;
use histix::output;
use histix::pipeline;
use histix::query::QueryExecutor;
use histix::utils::{self, StandardAnalyzer};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "histix")]
#[command(about = "Full-text search over git commit history")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Search query (when no subcommand is given)
    #[arg(trailing_var_arg = true)]
    query: Vec<String>,

    /// Root containing the indexed repositories
    #[arg(short, long, default_value = ".")]
    path: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the commit history of repositories under a root
    Index {
        /// Root directory: a repository, or a directory of repositories
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Store the index here instead of the app data directory
        #[arg(long)]
        index_dir: Option<PathBuf>,

        /// Discard any existing index first
        #[arg(short, long)]
        force: bool,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Search an indexed root
    Search {
        /// Query, e.g. 'path:main.rs "fn main"'
        query: String,

        /// Root containing the indexed repositories
        #[arg(short, long, default_value = ".")]
        path: PathBuf,

        /// Read the index from here instead of the app data directory
        #[arg(long)]
        index_dir: Option<PathBuf>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 100)]
        limit: usize,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },
    /// Show index statistics
    Stats {
        /// Root containing the indexed repositories
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Read the index from here instead of the app data directory
        #[arg(long)]
        index_dir: Option<PathBuf>,
    },
    /// List all indexed roots
    List,
    /// Remove the index for a root
    Remove {
        /// Root whose index should be removed
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Index {
            path,
            index_dir,
            force,
            quiet,
        }) => {
            run_index(&path, index_dir, force, quiet)?;
        }
        Some(Commands::Search {
            query,
            path,
            index_dir,
            limit,
            no_color,
        }) => {
            run_search(&query, &path, index_dir, limit, !no_color)?;
        }
        Some(Commands::Stats { path, index_dir }) => {
            stats::show_stats(&path, index_dir.as_deref())?;
        }
        Some(Commands::List) => {
            stats::list_indexes()?;
        }
        Some(Commands::Remove { path }) => {
            let root = path.canonicalize()?;
            utils::remove_index(&root)?;
            println!("Removed index for: {}", root.display());
        }
        None => {
            if cli.query.is_empty() {
                println!("No query given. Try 'histix --help'.");
            } else {
                let query = cli.query.join(" ");
                run_search(&query, &cli.path, None, 100, true)?;
            }
        }
    }

    Ok(())
}

fn run_index(path: &Path, index_dir: Option<PathBuf>, force: bool, quiet: bool) -> Result<()> {
    let root = path.canonicalize()?;
    let index_dir = match index_dir {
        Some(dir) => dir,
        None => utils::get_index_dir(&root)?,
    };

    if force && index_dir.exists() {
        std::fs::remove_dir_all(&index_dir)?;
    }

    let cancel = AtomicBool::new(false);
    pipeline::index_root(&root, &index_dir, quiet, &cancel)?;
    Ok(())
}

fn run_search(
    query: &str,
    path: &Path,
    index_dir: Option<PathBuf>,
    limit: usize,
    color: bool,
) -> Result<()> {
    let root = path.canonicalize()?;
    let index_dir = match index_dir {
        Some(dir) => dir,
        None => utils::get_index_dir(&root)?,
    };

    let reader = IndexReader::open(&index_dir)?;
    let executor = QueryExecutor::new(&reader, &StandardAnalyzer);
    let results = executor.search(query, limit)?;
    output::print_results(&results, color)?;
    Ok(())
}
