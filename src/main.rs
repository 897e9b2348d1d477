use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::ValueEnum;
use eyre::{Result, bail};
use log::{debug, info};

mod cli;

use cli::{Cli, OutputFormat};
use ytcap::caption::LanguagePolicy;
use ytcap::fetch::HttpFetcher;
use ytcap::pipeline::{Outcome, Pipeline};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytcap.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytcap")
        .join("logs")
}

fn build_after_help() -> String {
    format!(
        "\nSUPPORTED INPUT:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  https://www.youtube.com/embed/ID\n  <video ID>\n\nConfig is read from: {}\nLogs are written to: {}",
        ytcap::config::config_path().display(),
        log_dir().join("ytcap.log").display()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = ytcap::config::Config::load().unwrap_or_default();

    // Apply config defaults (CLI flags take priority)
    let policy = if cli.languages.is_empty() {
        config.language_policy()
    } else {
        LanguagePolicy::new(cli.languages.iter().cloned())
    };
    let fetch_timeout = cli
        .timeout
        .map(std::time::Duration::from_secs)
        .unwrap_or_else(|| config.fetch_timeout());
    let format = cli
        .format
        .or_else(|| {
            config
                .default_format
                .as_deref()
                .and_then(|f| OutputFormat::from_str(f, true).ok())
        })
        .unwrap_or(OutputFormat::Text);

    if cli.verbose {
        let config_path = ytcap::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!("Languages: {}", policy.languages().join(", "));
    }
    debug!("Fetch timeout: {fetch_timeout:?}");

    let fetcher = Arc::new(HttpFetcher::new(fetch_timeout)?);
    let pipeline = Arc::new(Pipeline::new(fetcher, policy).timeout(config.request_timeout()));

    if cli.serve {
        let bind = cli.bind.clone().unwrap_or_else(|| config.bind().to_string());
        return ytcap::server::serve(pipeline, &bind).await;
    }

    // Collect URLs: from arg or stdin
    let urls = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    let inputs = cli::collect_inputs(&urls);
    if inputs.is_empty() {
        bail!("no URL or video ID provided\n\nUsage: ytcap <URL>\n       echo <URL> | ytcap");
    }

    let mut rendered = Vec::new();
    let mut failures = 0usize;

    for url_input in &inputs {
        let outcome = pipeline.get_transcript(url_input).await;

        match &outcome {
            Outcome::Success { transcript, method } => {
                if cli.verbose {
                    eprintln!("Input: {url_input}\nMethod: {method}\nLength: {} chars", transcript.len());
                }
            }
            Outcome::Failure(failure) => {
                failures += 1;
                eprintln!("{url_input}: {failure}");
            }
        }

        match format {
            OutputFormat::Text if outcome.is_success() => rendered.push(ytcap::output::render_text(&outcome)),
            OutputFormat::Text => {}
            OutputFormat::Json => rendered.push(ytcap::output::render_json(&outcome)?),
        }
    }

    let rendered = rendered.join("\n");
    if let Some(ref path) = cli.output {
        std::fs::write(path, &rendered)?;
        if cli.verbose {
            eprintln!("Output written to: {}", path.display());
        }
    } else if !rendered.is_empty() {
        println!("{rendered}");
    }

    if failures > 0 {
        bail!("{failures} of {} input(s) produced no transcript", inputs.len());
    }

    Ok(())
}
