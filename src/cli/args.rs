//! Command-line argument parsing for auditrag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::errors::{PipelineError, Result};
use crate::rag::SourceOverrides;

/// auditrag - answer questions over audit reports with validated evidence
#[derive(Parser, Debug)]
#[command(name = "auditrag")]
#[command(version)]
#[command(about = "Retrieval-augmented answers over audit reports", long_about = None)]
pub struct Args {
    /// Question to answer
    #[arg(value_name = "QUERY")]
    pub query: Option<String>,

    /// Audit record corpus (JSON array or JSON lines)
    #[arg(long, value_name = "FILE")]
    pub corpus: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the full run outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Top-k for every source
    #[arg(long)]
    pub k: Option<usize>,

    /// Per-source top-k, e.g. vector=2,graph=1
    #[arg(long, value_name = "PAIRS")]
    pub source_k: Option<String>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except the answer)
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer every line of a query file, writing JSON lines
    Batch {
        /// Audit record corpus
        #[arg(long, value_name = "FILE")]
        corpus: PathBuf,

        /// One query per line
        #[arg(long, value_name = "FILE")]
        input: PathBuf,

        /// Output JSON lines file
        #[arg(long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Display current configuration
    Config,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Check that a query run has its inputs
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.command.is_none() && self.query.is_none() {
            return Err("Query required. Use 'auditrag <QUERY> --corpus <FILE>' or run a subcommand.".to_string());
        }

        if self.command.is_some() && self.query.is_some() {
            return Err("Cannot specify a query with a subcommand.".to_string());
        }

        if self.query.is_some() && self.corpus.is_none() {
            return Err("--corpus is required to answer a query.".to_string());
        }

        Ok(())
    }

    /// Top-k overrides from --k and --source-k
    pub fn overrides(&self) -> Result<SourceOverrides> {
        let mut overrides = match &self.source_k {
            Some(pairs) => SourceOverrides::from_pairs(pairs)?,
            None => SourceOverrides::default(),
        };
        if let Some(k) = self.k {
            if k == 0 {
                return Err(PipelineError::ConfigError("--k must be at least 1".to_string()));
            }
            overrides.k = Some(k);
        }
        Ok(overrides)
    }
}

impl Verbosity {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Log level implied by the flags, if they override the config
    pub fn log_level(&self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("error"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("info"),
            Verbosity::VeryVerbose => Some("debug"),
        }
    }

    /// Check if should show reasoning and diagnostics
    pub fn show_details(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }

    /// Check if should show per-document validation records
    pub fn show_validation(&self) -> bool {
        matches!(self, Verbosity::VeryVerbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("auditrag").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(parse(&["-q", "q"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["q"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["-v", "q"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["-vv", "q"]).verbosity(), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_validate_query_needs_corpus() {
        assert!(parse(&["감사 사례"]).validate().is_err());
        assert!(parse(&["감사 사례", "--corpus", "data.json"]).validate().is_ok());
    }

    #[test]
    fn test_validate_subcommand() {
        assert!(parse(&["config"]).validate().is_ok());
        assert!(parse(&[]).validate().is_err());
    }

    #[test]
    fn test_batch_subcommand() {
        let args = parse(&["batch", "--corpus", "c.json", "--input", "q.txt", "--output", "a.jsonl"]);
        match args.command {
            Some(Commands::Batch { input, output, .. }) => {
                assert_eq!(input, PathBuf::from("q.txt"));
                assert_eq!(output, PathBuf::from("a.jsonl"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_overrides_from_flags() {
        let args = parse(&["q", "--k", "4", "--source-k", "vector=2"]);
        let overrides = args.overrides().unwrap();
        assert_eq!(overrides.top_k_for(SourceKind::Vector, 5), 2);
        assert_eq!(overrides.top_k_for(SourceKind::Graph, 5), 4);

        assert!(parse(&["q", "--k", "0"]).overrides().is_err());
        assert!(parse(&["q"]).overrides().unwrap().is_empty());
    }

    #[test]
    fn test_verbosity_methods() {
        assert_eq!(Verbosity::Normal.log_level(), None);
        assert_eq!(Verbosity::VeryVerbose.log_level(), Some("debug"));
        assert!(!Verbosity::Normal.show_details());
        assert!(Verbosity::Verbose.show_details());
        assert!(!Verbosity::Verbose.show_validation());
        assert!(Verbosity::VeryVerbose.show_validation());
    }
}
