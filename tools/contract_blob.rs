//! Contract Blob CLI Tool
//!
//! Builds contract descriptor blobs from schema files and inspects existing blobs.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use contract_blob::{digest_hex, BuildConfig, ContractReader, ContractWriter, Schema};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contract-blob")]
#[command(about = "Contract descriptor blob builder and inspector", long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a blob from a TOML or JSON schema
    Build {
        /// Schema file (.toml or .json)
        #[arg(short, long)]
        schema: PathBuf,
        /// Output blob path
        #[arg(short, long)]
        out: PathBuf,
        /// Also write Rust source declaring the blob as a static
        #[arg(long)]
        rust_static: Option<PathBuf>,
        /// Symbol name for --rust-static
        #[arg(long, default_value = "CONTRACT_DESCRIPTOR")]
        symbol: String,
        /// Target pointer size in bytes (overrides CONTRACT_BLOB_POINTER_SIZE)
        #[arg(long)]
        pointer_size: Option<u8>,
        /// Require declared type names to resolve (overrides CONTRACT_BLOB_STRICT_TYPES)
        #[arg(long)]
        strict: bool,
    },
    /// Decode a blob and print its contents
    Dump {
        /// Blob file
        blob: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: DumpFormat,
    },
    /// Validate every table and field run of a blob
    Verify {
        /// Blob file
        blob: PathBuf,
        /// Fail unless the blob's SHA-256 matches
        #[arg(long)]
        expect_digest: Option<String>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DumpFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            schema,
            out,
            rust_static,
            symbol,
            pointer_size,
            strict,
        } => build(schema, out, rust_static, &symbol, pointer_size, strict),
        Commands::Dump { blob, format } => dump(blob, format),
        Commands::Verify {
            blob,
            expect_digest,
        } => verify(blob, expect_digest),
    }
}

fn build(
    schema_path: PathBuf,
    out: PathBuf,
    rust_static: Option<PathBuf>,
    symbol: &str,
    pointer_size: Option<u8>,
    strict: bool,
) -> Result<()> {
    let mut config = BuildConfig::from_env().context("Invalid build configuration")?;
    if let Some(pointer_size) = pointer_size {
        config = config.with_pointer_size(pointer_size);
    }
    if strict {
        config = config.strict(true);
    }
    config.validate().context("Invalid build configuration")?;

    let schema = Schema::load(&schema_path)
        .with_context(|| format!("Failed to load schema {}", schema_path.display()))?;

    let blob = ContractWriter::with_config(config)
        .build(&schema)
        .context("Failed to build contract blob")?;

    blob.write_atomic(&out)
        .with_context(|| format!("Failed to write {}", out.display()))?;
    info!(path = %out.display(), bytes = blob.len(), sha256 = %blob.digest(), "Blob written");

    if let Some(path) = rust_static {
        let source = blob.to_rust_static(symbol)?;
        fs::write(&path, source)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), symbol, "Rust static written");
    }

    Ok(())
}

fn dump(path: PathBuf, format: DumpFormat) -> Result<()> {
    let data = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let descriptor = ContractReader::parse(&data)
        .and_then(|reader| reader.decode())
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    match format {
        DumpFormat::Text => print!("{}", descriptor),
        DumpFormat::Json => println!("{}", descriptor.to_json_pretty()?),
    }
    Ok(())
}

fn verify(path: PathBuf, expect_digest: Option<String>) -> Result<()> {
    let data = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let reader = ContractReader::parse(&data).context("Blob header is invalid")?;

    let stats = reader.verify().context("Blob failed verification")?;
    let baseline = reader.baseline()?;

    let digest = digest_hex(&data);
    if let Some(expected) = expect_digest {
        if !expected.eq_ignore_ascii_case(&digest) {
            bail!("Digest mismatch: expected {}, got {}", expected, digest);
        }
    }

    println!("baseline: {}", baseline);
    println!("types: {}", stats.types);
    println!("fields: {}", stats.field_records);
    println!("globals: {}", stats.globals);
    println!("names bytes: {}", stats.names_bytes);
    println!("sha256: {}", digest);
    println!("OK");
    Ok(())
}
