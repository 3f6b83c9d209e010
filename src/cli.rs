//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Batch download catalogued PDF reports from primary/backup URLs.
///
/// Reads a CSV catalog of `(id, primary_url, backup_url)` rows, downloads
/// each document under a bounded worker pool, and writes per-item and
/// aggregate status files.
#[derive(Parser, Debug)]
#[command(name = "reportfetch")]
#[command(author, version, about)]
pub struct Args {
    /// Path to the catalog CSV file
    pub catalog: PathBuf,

    /// Destination folder for downloaded documents (default: downloads)
    #[arg(short = 'd', long)]
    pub dest_dir: Option<PathBuf>,

    /// Folder for status sink files (default: output)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent downloads (1-1000)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub concurrency: Option<u64>,

    /// Whole-item retry budget: extra rounds after the first (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub retry_budget: Option<u32>,

    /// Per-attempt timeout in seconds (1-3600)
    #[arg(short = 't', long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout_secs: Option<u64>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_requires_catalog_path() {
        let result = Args::try_parse_from(["reportfetch"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_minimal_invocation() {
        let args = Args::try_parse_from(["reportfetch", "catalog.csv"]).unwrap();
        assert_eq!(args.catalog, PathBuf::from("catalog.csv"));
        assert!(args.concurrency.is_none());
        assert!(args.retry_budget.is_none());
        assert!(!args.quiet);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_cli_all_flags() {
        let args = Args::try_parse_from([
            "reportfetch",
            "catalog.csv",
            "-d",
            "docs",
            "-o",
            "logs",
            "-c",
            "50",
            "-r",
            "2",
            "-t",
            "30",
        ])
        .unwrap();
        assert_eq!(args.dest_dir, Some(PathBuf::from("docs")));
        assert_eq!(args.output_dir, Some(PathBuf::from("logs")));
        assert_eq!(args.concurrency, Some(50));
        assert_eq!(args.retry_budget, Some(2));
        assert_eq!(args.timeout_secs, Some(30));
    }

    #[test]
    fn test_cli_concurrency_bounds() {
        assert!(Args::try_parse_from(["reportfetch", "c.csv", "-c", "0"]).is_err());
        assert!(Args::try_parse_from(["reportfetch", "c.csv", "-c", "1001"]).is_err());
        assert!(Args::try_parse_from(["reportfetch", "c.csv", "-c", "1000"]).is_ok());
    }

    #[test]
    fn test_cli_retry_budget_bounds() {
        // Zero extra rounds is allowed: single round per item.
        assert!(Args::try_parse_from(["reportfetch", "c.csv", "-r", "0"]).is_ok());
        assert!(Args::try_parse_from(["reportfetch", "c.csv", "-r", "11"]).is_err());
    }

    #[test]
    fn test_cli_verbose_and_quiet_flags() {
        let args = Args::try_parse_from(["reportfetch", "c.csv", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
        let args = Args::try_parse_from(["reportfetch", "c.csv", "--quiet"]).unwrap();
        assert!(args.quiet);
    }
}
