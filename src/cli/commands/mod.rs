//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod acquire;
mod merge;
mod process;
mod structured;
mod text;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "bowtie")]
#[command(about = "Safety-incident acquisition and bowtie risk extraction pipeline")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config file and BOWTIE_DATA_DIR)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Discover CSB and BSEE incidents, optionally download their PDFs
    Acquire {
        /// Maximum CSB incidents to discover
        #[arg(long, default_value = "20")]
        csb_limit: usize,
        /// Maximum BSEE incidents to discover
        #[arg(long, default_value = "20")]
        bsee_limit: usize,
        /// Manifest to write (default: <data>/raw/incidents_manifest_v0.csv)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Download PDFs after discovery
        #[arg(long)]
        download: bool,
        /// HTTP timeout in seconds (default: from config)
        #[arg(long)]
        timeout: Option<u64>,
        /// Number of download workers (default: from config)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Merge into the existing manifest instead of replacing it
        #[arg(long)]
        append: bool,
        /// Show detailed progress for each file
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Extract text from downloaded PDFs
    ExtractText {
        /// Acquisition manifest to read
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Text manifest to write
        #[arg(long)]
        out: Option<PathBuf>,
        /// Merge into the existing text manifest instead of replacing it
        #[arg(long)]
        append: bool,
    },

    /// Structure incident text into bowtie JSON with an LLM provider
    ExtractStructured {
        /// Directory of incident *.txt files
        #[arg(long)]
        text_dir: Option<PathBuf>,
        /// Directory for per-incident JSON
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Structured manifest to write
        #[arg(long)]
        manifest: Option<PathBuf>,
        /// Provider name (stub, ollama, openai, anthropic, gemini)
        #[arg(long)]
        provider: Option<String>,
        /// Model override
        #[arg(long)]
        model: Option<String>,
        /// Maximum tokens in the response
        #[arg(long)]
        max_output_tokens: Option<u32>,
        /// Sampling temperature
        #[arg(long)]
        temperature: Option<f32>,
        /// Provider timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Retries after transient provider failures
        #[arg(long)]
        retries: Option<u32>,
        /// Maximum files to process
        #[arg(short, long)]
        limit: Option<usize>,
        /// Skip incidents whose JSON already exists
        #[arg(long)]
        resume: bool,
    },

    /// Parse raw incident text, score it against the bowtie and write analytics
    Process {
        /// Directory of raw incident text files
        #[arg(long)]
        raw_dir: Option<PathBuf>,
        /// Output directory for processed JSON
        #[arg(long)]
        processed_dir: Option<PathBuf>,
        /// Reference bowtie JSON
        #[arg(long)]
        bowtie: Option<PathBuf>,
    },

    /// Merge an incoming acquisition manifest into an existing one
    Merge {
        /// Manifest holding the current state
        #[arg(long)]
        existing: PathBuf,
        /// Manifest with newly observed records
        #[arg(long)]
        incoming: PathBuf,
        /// Output path (default: overwrite the existing manifest)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Parse arguments, load settings and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
        data: cli.data,
    };
    let (settings, _config) = load_settings_with_options(options)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let command = cli.command.unwrap_or(Commands::Process {
        raw_dir: None,
        processed_dir: None,
        bowtie: None,
    });

    match command {
        Commands::Acquire {
            csb_limit,
            bsee_limit,
            out,
            download,
            timeout,
            workers,
            append,
            progress,
        } => {
            acquire::cmd_acquire(
                &settings,
                acquire::AcquireArgs {
                    csb_limit,
                    bsee_limit,
                    out,
                    download,
                    timeout,
                    workers,
                    append,
                    progress,
                },
            )
            .await
        }
        Commands::ExtractText {
            manifest,
            out,
            append,
        } => text::cmd_extract_text(&settings, manifest, out, append).await,
        Commands::ExtractStructured {
            text_dir,
            out_dir,
            manifest,
            provider,
            model,
            max_output_tokens,
            temperature,
            timeout,
            retries,
            limit,
            resume,
        } => {
            structured::cmd_extract_structured(
                &settings,
                structured::StructuredArgs {
                    text_dir,
                    out_dir,
                    manifest,
                    provider,
                    model,
                    max_output_tokens,
                    temperature,
                    timeout,
                    retries,
                    limit,
                    resume,
                },
            )
            .await
        }
        Commands::Process {
            raw_dir,
            processed_dir,
            bowtie,
        } => process::cmd_process(&settings, raw_dir, processed_dir, bowtie).await,
        Commands::Merge {
            existing,
            incoming,
            out,
        } => merge::cmd_merge(&existing, &incoming, out.as_deref()).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_defaults() {
        let cli = Cli::try_parse_from(["bowtie", "acquire", "--download"]).unwrap();
        match cli.command {
            Some(Commands::Acquire {
                csb_limit,
                bsee_limit,
                download,
                append,
                workers,
                ..
            }) => {
                assert_eq!(csb_limit, 20);
                assert_eq!(bsee_limit, 20);
                assert!(download);
                assert!(!append);
                assert_eq!(workers, None);
            }
            _ => panic!("expected acquire"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bowtie",
            "extract-structured",
            "--provider",
            "openai",
            "--limit",
            "3",
            "-v",
            "--data",
            "/tmp/data",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/data")));
        match cli.command {
            Some(Commands::ExtractStructured {
                provider, limit, resume, ..
            }) => {
                assert_eq!(provider.as_deref(), Some("openai"));
                assert_eq!(limit, Some(3));
                assert!(!resume);
            }
            _ => panic!("expected extract-structured"),
        }
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["bowtie"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_merge_requires_paths() {
        assert!(Cli::try_parse_from(["bowtie", "merge", "--existing", "a.csv"]).is_err());
    }
}
