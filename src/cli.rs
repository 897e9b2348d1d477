use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "ytcap",
    about = "YouTube caption transcript extractor",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Output format: text (default), json
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Caption language preference, most preferred first
    #[arg(short, long, value_delimiter = ',')]
    pub languages: Vec<String>,

    /// Per-request timeout in seconds for upstream fetches
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run as an HTTP service instead of a one-shot extraction
    #[arg(long)]
    pub serve: bool,

    /// Address to listen on with --serve
    #[arg(long)]
    pub bind: Option<String>,

    /// Show extraction method and failure details
    #[arg(short, long)]
    pub verbose: bool,
}

/// Trimmed inputs with blank lines dropped
pub fn collect_inputs(lines: &[String]) -> Vec<&str> {
    lines.iter().map(|l| l.trim()).filter(|l| !l.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_languages() {
        let cli = Cli::try_parse_from(["ytcap", "-l", "es,en", "dQw4w9WgXcQ"]).unwrap();
        assert_eq!(cli.languages, vec!["es", "en"]);
        assert_eq!(cli.url.as_deref(), Some("dQw4w9WgXcQ"));
        assert!(cli.format.is_none());
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from(["ytcap", "--serve", "--bind", "0.0.0.0:9000", "-f", "json"]).unwrap();
        assert!(cli.serve);
        assert_eq!(cli.bind.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(cli.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_collect_inputs_skips_blank_lines() {
        let lines: Vec<String> = ["dQw4w9WgXcQ", "", "   ", " https://youtu.be/abcDEF12345 "]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(collect_inputs(&lines), vec!["dQw4w9WgXcQ", "https://youtu.be/abcDEF12345"]);
    }
}
