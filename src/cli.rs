//! Command-line overrides. With no arguments the default run is performed.

use clap::Parser;
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(
    author,
    version,
    about = "Copy files that exist on each origin SFTP server but not on its destination"
)]
pub struct Args {
    /// Pairs table and settings
    #[arg(long, default_value = "sftps.toml")]
    pub config: PathBuf,

    /// Directory for per-account failure logs (overrides settings.log_dir)
    #[arg(long = "log-dir")]
    pub log_dir: Option<PathBuf>,

    /// Only write the log files; print nothing
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_is_the_default_run() {
        let args = Args::try_parse_from(["sftp-relay"]).unwrap();
        assert_eq!(args.config, PathBuf::from("sftps.toml"));
        assert!(args.log_dir.is_none());
        assert!(!args.quiet);
    }

    #[test]
    fn overrides() {
        let args =
            Args::try_parse_from(["sftp-relay", "--config", "x.toml", "--log-dir", "/var/log/relay", "-q"])
                .unwrap();
        assert_eq!(args.config, PathBuf::from("x.toml"));
        assert_eq!(args.log_dir, Some(PathBuf::from("/var/log/relay")));
        assert!(args.quiet);
    }
}
