//! Command-line flags.

use std::path::PathBuf;
use std::time::Duration;

pub const USAGE: &str = "\
Usage: roamsense [OPTIONS]

Options:
  -c, --config <PATH>      Configuration file (default ~/.roamsense/config.toml)
  -i, --interval-ms <MS>   Status refresh period in milliseconds (default 1000)
      --once               Print one status report and exit
      --json               Print status as JSON lines
  -h, --help               Show this help";

#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub config: Option<PathBuf>,
    pub interval: Duration,
    pub once: bool,
    pub json: bool,
    pub help: bool,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            config: None,
            interval: Duration::from_millis(1000),
            once: false,
            json: false,
            help: false,
        }
    }
}

impl CliArgs {
    pub fn parse<I, S>(args: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    let path = args.next().ok_or("--config requires a path")?;
                    parsed.config = Some(PathBuf::from(path));
                }
                "-i" | "--interval-ms" => {
                    let raw = args.next().ok_or("--interval-ms requires a value")?;
                    let ms: u64 = raw
                        .parse()
                        .map_err(|_| format!("invalid interval '{raw}'"))?;
                    if ms == 0 {
                        return Err("interval must be at least 1 ms".to_string());
                    }
                    parsed.interval = Duration::from_millis(ms);
                }
                "--once" => parsed.once = true,
                "--json" => parsed.json = true,
                "-h" | "--help" => parsed.help = true,
                other => return Err(format!("unknown argument '{other}'")),
            }
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_arguments_gives_defaults() {
        assert_eq!(CliArgs::parse(Vec::<String>::new()).unwrap(), CliArgs::default());
    }

    #[test]
    fn all_flags() {
        let args = CliArgs::parse(["--config", "/tmp/r.toml", "-i", "250", "--once", "--json"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/r.toml")));
        assert_eq!(args.interval, Duration::from_millis(250));
        assert!(args.once);
        assert!(args.json);
        assert!(!args.help);
    }

    #[test]
    fn missing_values_and_unknown_flags_are_errors() {
        assert!(CliArgs::parse(["--config"]).is_err());
        assert!(CliArgs::parse(["-i", "soon"]).is_err());
        assert!(CliArgs::parse(["-i", "0"]).is_err());
        assert!(CliArgs::parse(["--fast"]).is_err());
    }

    #[test]
    fn help_flag() {
        assert!(CliArgs::parse(["-h"]).unwrap().help);
    }
}
