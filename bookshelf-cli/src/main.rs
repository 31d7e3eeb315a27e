//! Bookshelf CLI - terminal reader and offline cache maintenance

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse and validate a pixel ratio (must be positive)
fn parse_ratio(s: &str) -> Result<f64, String> {
    let ratio: f64 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if ratio.is_finite() && ratio > 0.0 {
        Ok(ratio)
    } else {
        Err("pixel ratio must be positive".to_string())
    }
}

#[derive(Parser)]
#[command(name = "bookshelf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding the offline cache and reading progress
    #[arg(long, global = true, default_value = "./bookshelf_data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Where assets come from and how they are cached
#[derive(Args, Clone)]
pub struct SourceArgs {
    /// Origin: http(s) URL or a directory of static files
    #[arg(long, default_value = "./public")]
    pub origin: String,

    /// Cache manifest (JSON); the built-in manifest is used otherwise
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Read straight from the origin, bypassing the offline cache
    #[arg(long)]
    pub no_cache: bool,
}

/// Which book to open
#[derive(Args, Clone)]
pub struct BookArgs {
    /// Book identifier used for progress
    #[arg(long)]
    pub book_id: Option<String>,

    /// Resource path of the PDF on the origin
    #[arg(long)]
    pub pdf_path: Option<String>,

    /// Book title
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a book in the terminal
    Read {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        book: BookArgs,

        /// Viewport width in points
        #[arg(long, default_value = "800")]
        width: f64,

        /// Viewport height in points
        #[arg(long, default_value = "600")]
        height: f64,

        /// Device pixel ratio
        #[arg(long, default_value = "1", value_parser = parse_ratio)]
        pixel_ratio: f64,
    },

    /// Show or reset saved reading progress
    Progress {
        /// Only this book
        book_id: Option<String>,

        /// Forget the saved progress
        #[arg(long, requires = "book_id")]
        reset: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save the book's PDF to a directory
    Download {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        book: BookArgs,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Manage the offline asset cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Fetch every manifest asset into the current generation
    Install {
        /// Origin: http(s) URL or a directory of static files
        #[arg(long, default_value = "./public")]
        origin: String,

        /// Cache manifest (JSON)
        #[arg(long)]
        manifest: Option<PathBuf>,
    },

    /// List stored generations and their entries
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        "bookshelf=debug,bookshelf_core=debug"
    } else {
        "bookshelf=info,bookshelf_core=warn"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let data_dir = cli.data_dir.as_path();
    match cli.command {
        Commands::Read {
            source,
            book,
            width,
            height,
            pixel_ratio,
        } => commands::read(data_dir, &source, &book, width, height, pixel_ratio).await,

        Commands::Progress {
            book_id,
            reset,
            json,
        } => commands::progress(data_dir, book_id.as_deref(), reset, json).await,

        Commands::Download {
            source,
            book,
            output,
        } => commands::download(data_dir, &source, &book, &output).await,

        Commands::Cache { command } => match command {
            CacheCommands::Install { origin, manifest } => {
                commands::cache_install(data_dir, &origin, manifest.as_deref()).await
            }
            CacheCommands::List { json } => commands::cache_list(data_dir, json).await,
        },
    }
}
