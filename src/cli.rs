//! Command-line arguments (§6 CLI), parsed with `argh` the way the
//! teacher's binary parses its own top-level flags.

use argh::FromArgs;

/// Appliance control-plane server: serves the line-oriented configuration
/// protocol over TCP and mirrors field state from the hardware register
/// bus.
#[derive(FromArgs, Debug)]
pub struct Args {
    /// config port to listen on
    #[argh(option, short = 'p', default = "8888")]
    pub config_port: u16,

    /// data port, accepted and stored for the data-capture component; this
    /// server does not itself serve it
    #[argh(option, short = 'd', default = "8889")]
    pub data_port: u16,

    /// set SO_REUSEADDR on the listening socket
    #[argh(switch, short = 'R')]
    pub reuse_addr: bool,

    /// config database directory
    #[argh(option, short = 'c')]
    pub config_dir: Option<String>,

    /// persistence state file
    #[argh(option, short = 'f')]
    pub persistence_file: Option<String>,

    /// persistence timing as poll:holdoff:backoff seconds (default 2:10:60)
    #[argh(option, short = 't', default = "String::from(\"2:10:60\")")]
    pub persistence_times: String,

    /// log incoming commands at debug level
    #[argh(switch, short = 'v')]
    pub verbose: bool,
}

/// Parsed `poll:holdoff:backoff` persistence timing, each part optional and
/// defaulting independently (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceTimes {
    pub poll: u32,
    pub holdoff: u32,
    pub backoff: u32,
}

impl Default for PersistenceTimes {
    fn default() -> Self {
        PersistenceTimes {
            poll: 2,
            holdoff: 10,
            backoff: 60,
        }
    }
}

pub fn parse_persistence_times(spec: &str) -> anyhow::Result<PersistenceTimes> {
    let defaults = PersistenceTimes::default();
    let mut parts = spec.split(':');
    let poll = parse_part(parts.next(), defaults.poll)?;
    let holdoff = parse_part(parts.next(), defaults.holdoff)?;
    let backoff = parse_part(parts.next(), defaults.backoff)?;
    if parts.next().is_some() {
        anyhow::bail!("too many fields in persistence timing '{}'", spec);
    }
    Ok(PersistenceTimes { poll, holdoff, backoff })
}

fn parse_part(token: Option<&str>, default: u32) -> anyhow::Result<u32> {
    match token {
        None | Some("") => Ok(default),
        Some(text) => text
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid persistence timing field '{}'", text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let t = parse_persistence_times("5::").unwrap();
        assert_eq!(t, PersistenceTimes { poll: 5, holdoff: 10, backoff: 60 });
    }

    #[test]
    fn all_fields_parse() {
        let t = parse_persistence_times("1:2:3").unwrap();
        assert_eq!(t, PersistenceTimes { poll: 1, holdoff: 2, backoff: 3 });
    }

    #[test]
    fn too_many_fields_is_an_error() {
        assert!(parse_persistence_times("1:2:3:4").is_err());
    }
}
