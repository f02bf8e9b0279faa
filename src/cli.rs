// src/cli.rs
use crate::config::Config;
use anyhow::{bail, Result};
use std::path::PathBuf;

pub const USAGE: &str = "usage: mongo-loadgen [<port> | dbpath=<directory>]";

/// What the command line asked for. Zero arguments runs with defaults; one
/// argument is either a port override or a dbpath that turns the supervisor
/// on; anything else is malformed and gets the usage message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Defaults,
    Port(u16),
    DbPath(PathBuf),
    Malformed { given: usize },
}

pub fn parse<I>(args: I) -> Invocation
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();

    match args.as_slice() {
        [] => Invocation::Defaults,
        [arg] => {
            if let Some(dir) = arg.strip_prefix("dbpath=") {
                if dir.is_empty() {
                    Invocation::Malformed { given: 1 }
                } else {
                    Invocation::DbPath(PathBuf::from(dir))
                }
            } else if let Ok(port) = arg.parse::<u16>() {
                Invocation::Port(port)
            } else {
                Invocation::Malformed { given: 1 }
            }
        }
        rest => Invocation::Malformed { given: rest.len() },
    }
}

/// Fold the invocation into the configuration. Malformed leaves the config
/// untouched; the caller decides between proceeding and exiting.
pub fn apply_invocation(config: &mut Config, invocation: &Invocation) -> Result<()> {
    match invocation {
        Invocation::Defaults | Invocation::Malformed { .. } => {}
        Invocation::Port(port) => {
            if config.connection.uri.set_port(Some(*port)).is_err() {
                bail!("connection URI {} cannot carry a port", config.connection.uri);
            }
        }
        Invocation::DbPath(dir) => {
            let mut supervisor = config.supervisor.take().unwrap_or_default();
            supervisor.dbpath = dir.clone();
            config.supervisor = Some(supervisor);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_arguments_means_defaults() {
        assert_eq!(parse(strings(&[])), Invocation::Defaults);
    }

    #[test]
    fn bare_port_parses() {
        assert_eq!(parse(strings(&["27018"])), Invocation::Port(27018));
    }

    #[test]
    fn dbpath_argument_parses() {
        assert_eq!(
            parse(strings(&["dbpath=./testdata"])),
            Invocation::DbPath(PathBuf::from("./testdata"))
        );
    }

    #[test]
    fn junk_and_extra_arguments_are_malformed() {
        assert_eq!(
            parse(strings(&["--help"])),
            Invocation::Malformed { given: 1 }
        );
        assert_eq!(parse(strings(&["dbpath="])), Invocation::Malformed { given: 1 });
        assert_eq!(
            parse(strings(&["a", "b"])),
            Invocation::Malformed { given: 2 }
        );
    }

    #[test]
    fn port_overrides_connection_target() {
        let mut config = Config::default();
        apply_invocation(&mut config, &Invocation::Port(29999)).unwrap();
        assert_eq!(config.connection.uri.port(), Some(29999));
    }

    #[test]
    fn dbpath_enables_the_supervisor() {
        let mut config = Config::default();
        assert!(config.supervisor.is_none());

        apply_invocation(&mut config, &Invocation::DbPath(PathBuf::from("./d"))).unwrap();

        let supervisor = config.supervisor.expect("supervisor configured");
        assert_eq!(supervisor.dbpath, PathBuf::from("./d"));
        assert_eq!(supervisor.binary, "mongod");
    }

    #[test]
    fn malformed_leaves_config_untouched() {
        let mut config = Config::default();
        let before = config.connection.uri.clone();

        apply_invocation(&mut config, &Invocation::Malformed { given: 3 }).unwrap();

        assert_eq!(config.connection.uri, before);
        assert!(config.supervisor.is_none());
    }
}
