//! CLI entry point for `threadscribe`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use threadscribe::config::{self, Config};
use threadscribe::export::{self, text};
use threadscribe::source::eml::EmlSource;
use threadscribe::source::gmail::GmailSource;
use threadscribe::source::mbox::MboxSource;
use threadscribe::source::{Direction, MessageSource};

#[derive(Parser)]
#[command(
    name = "threadscribe",
    version,
    about = "Export the mail you exchanged with one correspondent as a clean text report"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Export threads from a Gmail mailbox
    Gmail {
        #[command(flatten)]
        filter: FilterArgs,
        /// OAuth token cache (Google authorized-user JSON)
        #[arg(long, value_name = "FILE")]
        token: Option<PathBuf>,
    },
    /// Export messages from a local MBOX file
    Mbox {
        path: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Export messages from a directory of .eml files
    Eml {
        dir: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Run the extraction on one .eml file and print the record
    Show {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Message selection and output flags shared by the export commands.
#[derive(Args)]
struct FilterArgs {
    /// Address (or fragment) of the other party
    #[arg(short, long, env = "THREADSCRIBE_CORRESPONDENT")]
    correspondent: Option<String>,
    /// Which side of the conversation the correspondent is on
    #[arg(long, value_enum)]
    direction: Option<Direction>,
    /// Only messages on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    after: Option<NaiveDate>,
    /// Only messages before this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    before: Option<NaiveDate>,
    /// Maximum number of messages to export
    #[arg(short, long)]
    limit: Option<usize>,
    /// Report file to write
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

impl FilterArgs {
    /// Fold the flags over the file configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(c) = &self.correspondent {
            config.query.correspondent = Some(c.clone());
        }
        if let Some(d) = self.direction {
            config.query.direction = d;
        }
        if self.after.is_some() {
            config.query.after = self.after;
        }
        if self.before.is_some() {
            config.query.before = self.before;
        }
        if self.limit.is_some() {
            config.query.limit = self.limit;
        }
        if let Some(o) = &self.output {
            config.report.output = o.clone();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        Commands::Gmail { filter, token } => {
            filter.apply(&mut config);
            if let Some(token) = token {
                config.gmail.token_path = token;
            }
            config.validate()?;
            let mut source = GmailSource::new(
                config.gmail.clone(),
                config.query.criteria(),
                config.query.page_size,
            )?;
            cmd_export(&mut source, &config, filter.json)
        }
        Commands::Mbox { path, filter } => {
            filter.apply(&mut config);
            config.validate()?;
            let mut source = MboxSource::open(&path, config.query.criteria())?;
            cmd_export(&mut source, &config, filter.json)
        }
        Commands::Eml { dir, filter } => {
            filter.apply(&mut config);
            config.validate()?;
            let mut source = EmlSource::open(&dir, config.query.criteria())?;
            cmd_export(&mut source, &config, filter.json)
        }
        Commands::Show { path, json } => cmd_show(&path, json),
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

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "threadscribe.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Pull every matching message from `source` and write the report.
fn cmd_export(source: &mut dyn MessageSource, config: &Config, json: bool) -> anyhow::Result<()> {
    let target = config
        .query
        .correspondent
        .clone()
        .unwrap_or_else(|| "any correspondent".to_string());
    let output = &config.report.output;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .context("progress template")?
            .progress_chars("#>-"),
    );
    pb.set_message(source.describe());

    let start = Instant::now();
    let outcome = export::run_export(
        source,
        Some(&|done: usize, total: usize| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        }),
    )?;
    pb.finish_and_clear();

    if outcome.records.is_empty() {
        if json {
            print_summary_json(&outcome.summary, None, start.elapsed())?;
        } else {
            println!("  No messages found for {target}.");
        }
        return Ok(());
    }

    let written = text::write_report(&outcome.records, &target, output)?;

    if json {
        print_summary_json(&outcome.summary, Some((output, written)), start.elapsed())?;
    } else {
        print_summary_table(&outcome.summary, output, written, start.elapsed());
    }
    Ok(())
}

/// Extract a single .eml and print its record.
fn cmd_show(path: &Path, json: bool) -> anyhow::Result<()> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let record = threadscribe::extract::extract_record(&raw, None);
    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        let target = path.display().to_string();
        print!("{}", text::render_report(std::slice::from_ref(&record), &target));
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "threadscribe", &mut std::io::stdout());
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

fn print_summary_table(
    summary: &export::ExportSummary,
    output: &Path,
    written: u64,
    elapsed: std::time::Duration,
) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Messages listed", summary.listed);
    println!("  {:<20} {}", "Messages exported", summary.exported);
    if summary.failed > 0 {
        println!("  {:<20} {}", "Fetch failures", summary.failed);
    }
    if summary.threads > 0 {
        println!("  {:<20} {}", "Threads", summary.threads);
    }
    println!("  {:<20} {}", "Attachments", summary.attachments);
    println!(
        "  {:<20} {} ({})",
        "Report",
        output.display(),
        format_size(written, BINARY)
    );
    println!("  {:<20} {:.2?}", "Elapsed", elapsed);
    println!();
}

fn print_summary_json(
    summary: &export::ExportSummary,
    report: Option<(&PathBuf, u64)>,
    elapsed: std::time::Duration,
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "summary": summary,
        "report": report.map(|(path, size)| serde_json::json!({
            "path": path.to_string_lossy(),
            "size": size,
        })),
        "elapsed_ms": elapsed.as_millis(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
