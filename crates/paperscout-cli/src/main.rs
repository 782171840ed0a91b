use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use paperscout_core::config_file;
use paperscout_core::{Config, Pipeline, ProgressEvent};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod output;

use output::ColorMode;

/// Find conference papers relevant to a set of keywords
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Conference name or acronym to look up on DBLP (prompted if omitted)
    #[arg(short, long)]
    conference: Option<String>,

    /// Keywords describing the papers you are interested in (prompted if omitted)
    #[arg(short, long)]
    keywords: Option<String>,

    /// Chat model used to classify titles
    #[arg(long)]
    model: Option<String>,

    /// Skip abstract retrieval for matching papers
    #[arg(long)]
    no_abstracts: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Path to a config file (replaces the default config lookup)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = build_config(&cli)?;
    tracing::debug!(?config, "resolved configuration");

    let conference = match cli.conference {
        Some(c) => c,
        None => prompt("Which conference to search for?")?,
    };
    let keywords = match cli.keywords {
        Some(k) => k,
        None => prompt("What are you key words?")?,
    };
    if keywords.trim().is_empty() {
        anyhow::bail!("no keywords given");
    }

    let color = ColorMode(!cli.no_color && std::io::stdout().is_terminal());
    let pipeline = Pipeline::from_config(&config)?;

    let progress_cb = move |event: ProgressEvent| {
        let mut out = std::io::stdout().lock();
        output::emit_progress(&mut out, &event, color);
    };

    let report = pipeline
        .run(conference.trim(), keywords.trim(), &progress_cb)
        .await
        .with_context(|| format!("search for \"{}\" failed", conference.trim()))?;

    let mut writer = std::io::stdout().lock();
    output::print_summary(&mut writer, &report, color)?;

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "paperscout=debug,paperscout_core=debug,warn"
    } else {
        "paperscout=warn,paperscout_core=warn"
    };
    let filter = if verbose {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Resolve the run configuration.
///
/// Precedence: CLI flag > environment > config file > default.
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let file = match &cli.config {
        Some(path) => config_file::load_from_path(path)
            .with_context(|| format!("could not load config file {}", path.display()))?,
        None => config_file::load_config(),
    };

    let mut config = Config::default();
    file.apply_to(&mut config);

    if let Ok(key) = std::env::var("OPENAI_API_KEY")
        && !key.trim().is_empty()
    {
        config.openai_api_key = Some(key);
    }
    if let Ok(raw) = std::env::var("PAPERSCOUT_TIMEOUT") {
        let secs: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("PAPERSCOUT_TIMEOUT must be a number of seconds, got {raw:?}"))?;
        if secs == 0 {
            anyhow::bail!("PAPERSCOUT_TIMEOUT must be greater than zero");
        }
        config.timeout_secs = secs;
    }

    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if cli.no_abstracts {
        config.fetch_abstracts = false;
    }

    if config.openai_api_key.is_none() {
        anyhow::bail!(
            "OPENAI_API_KEY is not set. Export it, add it to .env, or set [api_keys] openai_api_key in the config file."
        );
    }

    Ok(config)
}

fn prompt(question: &str) -> anyhow::Result<String> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", question)?;
    out.flush()?;
    drop(out);

    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    if read == 0 {
        anyhow::bail!("stdin closed before an answer to \"{}\" was given", question);
    }
    Ok(line.trim().to_string())
}
