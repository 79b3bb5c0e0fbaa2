//! Command-line interface for archive extraction.
//!
//! Lists and extracts anything the linked libarchive can read, streaming the
//! archive from disk through the `archive-stream` reader.

use archive_stream::{
    extract_archive, list_entries_with, ExtractOptions, OverwriteMode, ReaderOptions,
    DEFAULT_BUFFER_SIZE,
};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "simple-extract")]
#[command(version, about = "List and extract archives from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one or more archives
    Extract {
        /// Archive files to extract
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Overwrite mode: replace, skip, rename
        #[arg(long, default_value = "rename")]
        overwrite: OverwriteMode,

        /// Strip leading path components
        #[arg(long, default_value = "0")]
        strip_components: u32,

        /// Create symbolic links found in the archive
        #[arg(long)]
        allow_symlinks: bool,

        /// Size of the read buffer in bytes
        #[arg(long, default_value_t = DEFAULT_BUFFER_SIZE)]
        buffer_size: usize,
    },

    /// List archive members
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(engine = %archive_stream::version_string(), "starting");

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            archives,
            out,
            overwrite,
            strip_components,
            allow_symlinks,
            buffer_size,
        } => {
            let options = ExtractOptions {
                overwrite,
                strip_components,
                allow_symlinks,
                reader: ReaderOptions { buffer_size },
                raw_name: None,
            };
            handle_extract(&archives, &out, options)
        }
        Commands::List { archive, json } => handle_list(&archive, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}

fn handle_extract(
    archives: &[PathBuf],
    out: &Path,
    mut options: ExtractOptions,
) -> Result<(), Box<dyn Error>> {
    for archive in archives {
        let file = File::open(archive)
            .map_err(|e| format!("cannot open {}: {}", archive.display(), e))?;

        // A bare compressed stream has no member names; use the archive's own.
        options.raw_name = archive.file_stem().map(PathBuf::from);

        let stats = extract_archive(BufReader::new(file), out, &options)?;
        println!(
            "{}: {} files, {} directories, {} links, {} skipped, {} bytes in {:.2}s",
            archive.display(),
            stats.files_extracted,
            stats.directories_created,
            stats.links_created,
            stats.entries_skipped,
            stats.bytes_written,
            stats.duration.as_secs_f64()
        );
    }
    Ok(())
}

fn handle_list(archive: &Path, json: bool) -> Result<(), Box<dyn Error>> {
    let file =
        File::open(archive).map_err(|e| format!("cannot open {}: {}", archive.display(), e))?;
    let listing = list_entries_with(BufReader::new(file), ReaderOptions::default())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for entry in &listing.entries {
        match &entry.link_target {
            Some(target) => println!(
                "{} {:>12} {} -> {}",
                entry.mode, entry.size, entry.path, target
            ),
            None => println!("{} {:>12} {}", entry.mode, entry.size, entry.path),
        }
    }

    let filters = if listing.filters.is_empty() {
        "none".to_string()
    } else {
        listing.filters.join(", ")
    };
    println!();
    println!("Format:  {}", listing.format);
    println!("Filters: {}", filters);
    println!(
        "Total:   {} entries, {} bytes",
        listing.entries.len(),
        listing.total_bytes()
    );
    Ok(())
}
