mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use durastore_lib::{Codec, JsonCodec, RecordStore, StoreConfig, YamlCodec, default_root};

use crate::cmd::{cmd_exists, cmd_get, cmd_ls, cmd_put, cmd_rm};
use crate::output::{OutputFormat, print_error};

/// dstore - inspect and edit a durastore record directory
#[derive(Parser)]
#[command(name = "dstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Store root directory (default: $DURASTORE_ROOT or the platform data dir)
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Record encoding
  #[arg(long, global = true, value_enum, default_value_t = CodecKind::Yaml)]
  codec: CodecKind,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CodecKind {
  Yaml,
  Json,
}

#[derive(Subcommand)]
enum Commands {
  /// Save a document read from a file or stdin
  Put {
    /// Record key, e.g. char/7
    key: String,

    /// Read the document from this file instead of stdin
    #[arg(short, long)]
    file: Option<PathBuf>,
  },

  /// Print a record
  Get {
    /// Record key
    key: String,
  },

  /// Check whether a record exists (exit status 1 when absent)
  Exists {
    /// Record key
    key: String,
  },

  /// Delete a record
  Rm {
    /// Record key
    key: String,
  },

  /// List keys matching a pattern
  Ls {
    /// Glob pattern; wildcards stay within one segment
    #[arg(default_value = "*")]
    pattern: String,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let config = StoreConfig::new(cli.root.clone().unwrap_or_else(default_root));
  debug!(root = %config.root.display(), codec = ?cli.codec, "starting");

  let result = match cli.codec {
    CodecKind::Yaml => RecordStore::from_config(&config, YamlCodec)
      .map_err(anyhow::Error::from)
      .and_then(|store| run(&store, cli.command, cli.output)),
    CodecKind::Json => RecordStore::from_config(&config, JsonCodec)
      .map_err(anyhow::Error::from)
      .and_then(|store| run(&store, cli.command, cli.output)),
  };

  match result {
    Ok(code) => code,
    Err(err) => {
      print_error(&err.to_string());
      ExitCode::FAILURE
    }
  }
}

fn run<C: Codec>(store: &RecordStore<C>, command: Commands, output: OutputFormat) -> Result<ExitCode> {
  match command {
    Commands::Put { key, file } => cmd_put(store, &key, file.as_deref(), output)?,
    Commands::Get { key } => cmd_get(store, &key, output)?,
    Commands::Exists { key } => {
      if !cmd_exists(store, &key, output)? {
        return Ok(ExitCode::FAILURE);
      }
    }
    Commands::Rm { key } => cmd_rm(store, &key, output)?,
    Commands::Ls { pattern } => cmd_ls(store, &pattern, output)?,
  }
  Ok(ExitCode::SUCCESS)
}
