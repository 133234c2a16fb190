//! CLI entry point for `mailprism`.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};

use mailprism::assemble::{assemble_raw, Assembler};
use mailprism::config::{self, Config};
use mailprism::model::message::AssembledMessage;
use mailprism::parser::mime::{build_tree, TreeMode};
use mailprism::render::snippet::make_snippet;
use mailprism::store::source::HttpSource;

#[derive(Parser)]
#[command(
    name = "mailprism",
    version,
    about = "Turn raw email messages into sanitized, display-ready records"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (overrides the default search)
    #[arg(long, global = true, value_name = "PATH", env = "MAILPRISM_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble a raw RFC 5322 message from a file and print the record
    Assemble {
        /// Message file (.eml)
        file: PathBuf,
        /// Identifier to put in the record (defaults to the file stem)
        #[arg(long)]
        id: Option<String>,
        /// Build the structural tree instead of the canonical one
        #[arg(long)]
        structural: bool,
        /// Print a human-readable summary instead of JSON
        #[arg(long)]
        text: bool,
    },
    /// Fetch messages by id from the configured source and assemble them
    Fetch {
        /// Message ids
        #[arg(required = true)]
        ids: Vec<String>,
        /// Source endpoint (overrides `source.base_url`)
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
        /// Maximum concurrent fetches (overrides `batch.concurrency`)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },
    /// Print the MIME tree of a message file as JSON
    Tree {
        /// Message file (.eml)
        file: PathBuf,
        /// Show the real part hierarchy
        #[arg(long)]
        structural: bool,
    },
    /// Read plain text from stdin and print its snippet
    Snippet,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match cli.config {
        Some(ref path) => config::load_config_from(path)?,
        None => config::load_config(),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Assemble {
            file,
            id,
            structural,
            text,
        } => cmd_assemble(&file, id, structural, text, &config),
        Commands::Fetch {
            ids,
            base_url,
            concurrency,
        } => cmd_fetch(&ids, base_url, concurrency, &config).await,
        Commands::Tree { file, structural } => cmd_tree(&file, structural, &config),
        Commands::Snippet => cmd_snippet(),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailprism.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn read_message_file(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn tree_mode(structural: bool, config: &Config) -> TreeMode {
    if structural {
        TreeMode::Structural
    } else {
        config.assembly.tree_mode
    }
}

/// Assemble a local message file and print the record.
fn cmd_assemble(
    path: &Path,
    id: Option<String>,
    structural: bool,
    text: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let raw = read_message_file(path)?;
    let id = id.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });

    let mut options = config.assemble_options();
    options.tree_mode = tree_mode(structural, config);

    let message = assemble_raw(&id, &raw, &options)?;
    if text {
        print_message_text(&message);
    } else {
        println!("{}", serde_json::to_string_pretty(&message)?);
    }
    Ok(())
}

/// Print an assembled message as a header table followed by its plain text.
fn print_message_text(message: &AssembledMessage) {
    let to: Vec<String> = message.to.iter().map(|a| a.display()).collect();

    println!();
    println!("  {:<10} {}", "Id", message.id);
    println!("  {:<10} {}", "Date", message.date);
    println!("  {:<10} {}", "From", message.sender());
    println!("  {:<10} {}", "To", to.join(", "));
    println!("  {:<10} {}", "Subject", message.subject);
    println!("  {:<10} {}", "Snippet", message.snippet);
    println!("  {}", "-".repeat(60));
    println!();
    println!("{}", message.plain);
}

/// Fetch and assemble messages from the HTTP source.
async fn cmd_fetch(
    ids: &[String],
    base_url: Option<String>,
    concurrency: Option<usize>,
    config: &Config,
) -> anyhow::Result<()> {
    let Some(base_url) = base_url.or_else(|| config.source.base_url.clone()) else {
        anyhow::bail!("No source configured: set source.base_url or pass --base-url");
    };

    let source = Arc::new(HttpSource::new(base_url, config.source_timeout())?);
    let assembler = Assembler::new(source)
        .with_options(config.assemble_options())
        .with_batch_concurrency(concurrency.unwrap_or(config.batch.concurrency));

    let results = assembler.assemble_batch(ids).await;

    let mut failures = 0usize;
    let items: Vec<serde_json::Value> = results
        .into_iter()
        .map(|(id, result)| match result {
            Ok(message) => serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
            Err(e) => {
                failures += 1;
                tracing::warn!(id = %id, error = %e, "Assembly failed");
                serde_json::json!({
                    "id": id,
                    "error": e.to_string(),
                })
            }
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&items)?);

    if failures > 0 {
        anyhow::bail!("{failures} of {} message(s) failed", ids.len());
    }
    Ok(())
}

/// Print the MIME tree of a local message file.
fn cmd_tree(path: &Path, structural: bool, config: &Config) -> anyhow::Result<()> {
    let raw = read_message_file(path)?;
    let tree = build_tree(&raw, tree_mode(structural, config))?;
    println!("{}", serde_json::to_string_pretty(&tree)?);
    Ok(())
}

/// Print the snippet of plain text read from stdin.
fn cmd_snippet() -> anyhow::Result<()> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text)?;
    println!("{}", make_snippet(&text));
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailprism", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
