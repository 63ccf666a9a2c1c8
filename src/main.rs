//! pvfkit CLI - Command-line tool for PVF game-asset archives.
//!
//! This is the main entry point for the pvfkit command-line application.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use walkdir::WalkDir;

use pvfkit::archive::key_path;
use pvfkit::prelude::*;
use pvfkit::script::STRING_TABLE_KEY;

/// pvfkit - PVF archive inspection and editing tool
#[derive(Parser)]
#[command(name = "pvfkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log more detail (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries of an archive
    List {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show sizes and checksums
        #[arg(short, long)]
        detailed: bool,

        /// Print entry metadata as JSON
        #[arg(long, conflicts_with = "detailed")]
        json: bool,
    },

    /// Print an entry to stdout
    Cat {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,

        /// Entry key
        key: String,

        /// Print stored bytes instead of the text form
        #[arg(long)]
        raw: bool,
    },

    /// Extract entries to a directory
    Extract {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,

        /// Output directory
        #[arg(short, long, env = "PVF_OUTPUT")]
        output: PathBuf,

        /// Filter pattern (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Write stored bytes instead of the text form
        #[arg(long)]
        raw: bool,
    },

    /// Export one entry to a file
    Export {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,

        /// Entry key
        key: String,

        /// Destination file
        dest: PathBuf,
    },

    /// Replace an entry with the contents of a file
    Replace {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,

        /// Entry key
        key: String,

        /// Source file
        src: PathBuf,

        /// Save to this path instead of overwriting the archive
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace an entry with data read from stdin
    Write {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,

        /// Entry key
        key: String,

        /// Save to this path instead of overwriting the archive
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create an empty entry
    Create {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,

        /// Entry key
        key: String,

        /// Save to this path instead of overwriting the archive
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete an entry
    Delete {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,

        /// Entry key
        key: String,

        /// Save to this path instead of overwriting the archive
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rename an entry
    Rename {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,

        /// Current entry key
        from: String,

        /// New entry key
        to: String,

        /// Save to this path instead of overwriting the archive
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check every entry against its checksum
    Verify {
        /// Path to the PVF file
        #[arg(short, long, env = "PVF_ARCHIVE")]
        archive: PathBuf,
    },

    /// Build an archive from a directory tree
    Pack {
        /// Input directory
        #[arg(short, long)]
        input: PathBuf,

        /// Output PVF file
        #[arg(short, long, env = "PVF_OUTPUT")]
        output: PathBuf,

        /// Archive GUID, stored as its UTF-8 bytes
        #[arg(long, default_value = "")]
        guid: String,

        /// Format version written to the header
        #[arg(long, default_value_t = pvfkit::archive::DEFAULT_FORMAT_VERSION)]
        format_version: i32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::List {
            archive,
            filter,
            detailed,
            json,
        } => {
            cmd_list(&archive, filter.as_deref(), detailed, json)?;
        }
        Commands::Cat { archive, key, raw } => {
            cmd_cat(&archive, &key, raw)?;
        }
        Commands::Extract {
            archive,
            output,
            filter,
            raw,
        } => {
            cmd_extract(&archive, &output, filter.as_deref(), raw)?;
        }
        Commands::Export { archive, key, dest } => {
            let mut pvf = open(&archive)?;
            pvf.export_file(&key, &dest)
                .with_context(|| format!("Failed to export {key}"))?;
            println!("Exported {key} -> {}", dest.display());
        }
        Commands::Replace {
            archive,
            key,
            src,
            output,
        } => {
            edit(&archive, output.as_deref(), |pvf| {
                pvf.replace_file(&key, &src)
                    .with_context(|| format!("Failed to replace {key} from {}", src.display()))
            })?;
        }
        Commands::Write {
            archive,
            key,
            output,
        } => {
            let mut data = Vec::new();
            io::stdin()
                .read_to_end(&mut data)
                .context("Failed to read stdin")?;
            edit(&archive, output.as_deref(), |pvf| {
                pvf.write_file_bytes(&key, &data)
                    .with_context(|| format!("Failed to write {key}"))
            })?;
        }
        Commands::Create {
            archive,
            key,
            output,
        } => {
            edit(&archive, output.as_deref(), |pvf| {
                pvf.create_empty_file(&key)
                    .with_context(|| format!("Failed to create {key}"))
            })?;
        }
        Commands::Delete {
            archive,
            key,
            output,
        } => {
            edit(&archive, output.as_deref(), |pvf| {
                pvf.delete_file(&key)
                    .with_context(|| format!("Failed to delete {key}"))
            })?;
        }
        Commands::Rename {
            archive,
            from,
            to,
            output,
        } => {
            edit(&archive, output.as_deref(), |pvf| {
                pvf.rename_file(&from, &to)
                    .with_context(|| format!("Failed to rename {from} to {to}"))
            })?;
        }
        Commands::Verify { archive } => {
            cmd_verify(&archive)?;
        }
        Commands::Pack {
            input,
            output,
            guid,
            format_version,
        } => {
            cmd_pack(&input, &output, guid.into_bytes(), format_version)?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn open(path: &Path) -> Result<Pvf> {
    let start = Instant::now();
    let pb = progress_bar(0)?;
    let pvf = Pvf::open_with_progress(path, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })
    .with_context(|| format!("Failed to open PVF archive {}", path.display()))?;
    pb.finish_and_clear();

    tracing::info!(
        entries = pvf.archive().len(),
        elapsed = ?start.elapsed(),
        "loaded {}",
        path.display()
    );
    Ok(pvf)
}

fn save(pvf: &mut Pvf, path: &Path) -> Result<()> {
    let start = Instant::now();
    let pb = progress_bar(0)?;
    pvf.save_with_progress(path, |done, total| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    })
    .with_context(|| format!("Failed to save PVF archive {}", path.display()))?;
    pb.finish_and_clear();

    println!("Saved {} entries to {} in {:?}", pvf.archive().len(), path.display(), start.elapsed());
    Ok(())
}

/// Open an archive, apply one change and save it.
fn edit(archive: &Path, output: Option<&Path>, change: impl FnOnce(&mut Pvf) -> Result<()>) -> Result<()> {
    let mut pvf = open(archive)?;
    change(&mut pvf)?;
    save(&mut pvf, output.unwrap_or(archive))
}

fn compile_filter(filter: Option<&str>) -> Result<Option<glob::Pattern>> {
    filter
        .map(|pattern| {
            glob::Pattern::new(&pattern.to_lowercase())
                .with_context(|| format!("Invalid filter pattern {pattern}"))
        })
        .transpose()
}

fn is_match(filter: &Option<glob::Pattern>, key: &str) -> bool {
    filter.as_ref().map_or(true, |pattern| pattern.matches(key))
}

fn cmd_list(path: &Path, filter: Option<&str>, detailed: bool, json: bool) -> Result<()> {
    let pvf = open(path)?;
    let filter = compile_filter(filter)?;
    let infos: Vec<EntryInfo> = pvf
        .entry_infos()
        .into_iter()
        .filter(|info| is_match(&filter, &info.key))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    for info in &infos {
        if detailed {
            println!(
                "{:>10} {:>10} {:08x} {}",
                info.data_len, info.block_len, info.checksum, info.key
            );
        } else {
            println!("{}", info.key);
        }
    }

    println!("\nTotal: {} entries", infos.len());

    Ok(())
}

fn cmd_cat(path: &Path, key: &str, raw: bool) -> Result<()> {
    let mut pvf = open(path)?;
    let data = if raw {
        pvf.raw_bytes(key)?.to_vec()
    } else {
        pvf.read_file_bytes(key)?
    };
    io::stdout().write_all(&data)?;
    Ok(())
}

fn cmd_extract(path: &Path, output: &Path, filter: Option<&str>, raw: bool) -> Result<()> {
    let mut pvf = open(path)?;
    let filter = compile_filter(filter)?;
    let keys: Vec<String> = pvf
        .all_keys()
        .into_iter()
        .filter(|key| is_match(&filter, key))
        .collect();

    println!("Extracting {} entries...", keys.len());

    fs::create_dir_all(output)?;
    let pb = progress_bar(keys.len() as u64)?;

    let start = Instant::now();
    let mut errors = 0;
    for key in &keys {
        let Some(relative) = key_path(key) else {
            pb.suspend(|| eprintln!("Skipping {key}: not a safe relative path"));
            errors += 1;
            pb.inc(1);
            continue;
        };
        let output_path = output.join(relative);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let result = if raw {
            pvf.raw_bytes(key)
                .map(<[u8]>::to_vec)
                .map_err(anyhow::Error::from)
                .and_then(|data| Ok(fs::write(&output_path, data)?))
        } else {
            pvf.export_file(key, &output_path).map_err(anyhow::Error::from)
        };
        if let Err(e) = result {
            pb.suspend(|| eprintln!("Error extracting {key}: {e:#}"));
            errors += 1;
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!(
        "Extraction completed in {:?} ({} errors)",
        start.elapsed(),
        errors
    );

    Ok(())
}

fn cmd_verify(path: &Path) -> Result<()> {
    let pvf = open(path)?;
    let pb = progress_bar(pvf.archive().len() as u64)?;
    let mismatched = pvf
        .archive()
        .verify(|done, _| pb.set_position(done as u64))
        .context("Failed to verify archive")?;
    pb.finish_and_clear();

    for key in &mismatched {
        println!("checksum mismatch: {key}");
    }
    if !mismatched.is_empty() {
        bail!("{} of {} entries failed verification", mismatched.len(), pvf.archive().len());
    }

    println!("All {} entries verified", pvf.archive().len());
    Ok(())
}

fn cmd_pack(input: &Path, output: &Path, guid: Vec<u8>, format_version: i32) -> Result<()> {
    if !input.is_dir() {
        bail!("{} is not a directory", input.display());
    }

    let mut pvf = Pvf::new(guid, format_version);
    let files = pack_order(input)?;

    for (key, path) in &files {
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        pvf.write_file_bytes(key, &data)
            .with_context(|| format!("Failed to add {key}"))?;
    }

    println!("Packing {} entries...", files.len());
    save(&mut pvf, output)
}

/// Files under `input` as `(key, path)` pairs in file-name order, with the
/// string table first so scripts compile against its indices.
fn pack_order(input: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.context("Failed to walk input directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(input)?;
        let key = normalize_key(&relative.to_string_lossy());
        files.push((key, entry.into_path()));
    }
    // Stable sort keeps walk order for everything else.
    files.sort_by_key(|(key, _)| key != STRING_TABLE_KEY);
    Ok(files)
}
