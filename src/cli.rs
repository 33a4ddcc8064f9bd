//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Run crawled gazette records through the item pipeline.
///
/// Reads JSON-lines records for one source, downloads their files into the
/// file store and records newly downloaded files in the catalog.
#[derive(Parser, Debug)]
#[command(name = "gazette")]
#[command(author, version, about)]
pub struct Args {
    /// Spider name; selects the `[sources.<name>]` config table
    pub spider: String,

    /// Path to the TOML config file
    #[arg(short = 'C', long, default_value = "gazette.toml")]
    pub config: PathBuf,

    /// JSON-lines record file (reads stdin when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Override the file store root from the config
    #[arg(long)]
    pub files_store: Option<PathBuf>,

    /// Override the database connection string from the config
    #[arg(long)]
    pub database_url: Option<String>,

    /// Override the maximum number of concurrent records (1-100)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Write processed records as JSON lines to stdout
    #[arg(long)]
    pub emit_items: bool,

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
    fn test_cli_spider_only_uses_defaults() {
        let args = Args::try_parse_from(["gazette", "sp_sao_paulo"]).unwrap();
        assert_eq!(args.spider, "sp_sao_paulo");
        assert_eq!(args.config, PathBuf::from("gazette.toml"));
        assert!(args.input.is_none());
        assert!(args.concurrency.is_none());
        assert!(!args.emit_items);
        assert_eq!(args.verbose, 0);
        assert!(!args.quiet);
    }

    #[test]
    fn test_cli_spider_is_required() {
        let err = Args::try_parse_from(["gazette"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["gazette", "x", "-v"]).unwrap();
        assert_eq!(args.verbose, 1);

        let args = Args::try_parse_from(["gazette", "x", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::try_parse_from([
            "gazette",
            "x",
            "-C",
            "conf/prod.toml",
            "--input",
            "items.jsonl",
            "--files-store",
            "/srv/gazettes",
            "--database-url",
            "sqlite://g.db",
            "-c",
            "20",
            "--emit-items",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("conf/prod.toml"));
        assert_eq!(args.input, Some(PathBuf::from("items.jsonl")));
        assert_eq!(args.files_store, Some(PathBuf::from("/srv/gazettes")));
        assert_eq!(args.database_url.as_deref(), Some("sqlite://g.db"));
        assert_eq!(args.concurrency, Some(20));
        assert!(args.emit_items);
    }

    #[test]
    fn test_cli_concurrency_out_of_range_rejected() {
        assert!(Args::try_parse_from(["gazette", "x", "-c", "0"]).is_err());
        assert!(Args::try_parse_from(["gazette", "x", "-c", "101"]).is_err());
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["gazette", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
