//! Command-line interface for the Owl host.

use clap::{value_parser, Arg, ArgMatches, Command};
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = "owl.toml";

/// Command line arguments; every option overrides the matching config file
/// setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    /// Path to the host configuration file
    pub config_path: PathBuf,
    /// Optional override for the data folder
    pub data_dir: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the number of event dispatch workers
    pub workers: Option<usize>,
}

impl CliArgs {
    /// Parse the process arguments.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parse an explicit argument list; the first item is the binary name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from),
            data_dir: matches.get_one::<String>("data-dir").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            workers: matches.get_one::<usize>("workers").copied(),
        }
    }
}

fn command() -> Command {
    Command::new("Owl Host")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Hosts Owl plugins around a shared registry, service locator and event bus")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value(DEFAULT_CONFIG),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Data folder holding config.yml and plugin configs"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("N")
                .help("Number of event dispatch workers")
                .value_parser(value_parser!(usize)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["owl_host"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("owl.toml"));
        assert_eq!(args.data_dir, None);
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert_eq!(args.workers, None);
    }

    #[test]
    fn test_overrides() {
        let args = CliArgs::try_parse_from([
            "owl_host",
            "--config",
            "prod.toml",
            "-d",
            "/srv/owl",
            "--log-level",
            "debug",
            "--json-logs",
            "--workers",
            "8",
        ])
        .unwrap();
        assert_eq!(args.config_path, PathBuf::from("prod.toml"));
        assert_eq!(args.data_dir, Some(PathBuf::from("/srv/owl")));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.workers, Some(8));
    }

    #[test]
    fn test_rejects_non_numeric_workers() {
        assert!(CliArgs::try_parse_from(["owl_host", "--workers", "many"]).is_err());
    }
}
