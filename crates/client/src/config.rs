//! CLI argument parsing and the validated [`ClientConfig`] it produces.

use clap::Parser;
use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

/// Raw command-line arguments for `fountain-client`, before validation.
#[derive(Debug, Parser)]
#[command(name = "fountain-client", version, about = "Receive a file served as rateless fountain packets over UDP")]
pub struct ClientArgs {
    /// Cache size as a multiple of `section_size`.
    #[arg(short = 'c', long = "cachemul", default_value_t = 6)]
    pub cachemul: u32,

    /// Server IP address.
    #[arg(short = 'i', long = "ip", default_value = "127.0.0.1")]
    pub ip: String,

    /// Override the output file name (default: the server's advertised
    /// name, sanitised).
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Server UDP port.
    #[arg(short = 'p', long = "port", default_value_t = 2534)]
    pub port: u16,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parses `args`, handling `--help`/`--version` and argument errors the
/// way the server's front end does.
pub fn parse<I, T>(args: I) -> Result<ClientArgs, ExitCode>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match ClientArgs::try_parse_from(args) {
        Ok(args) => Ok(args),
        Err(err) => {
            use clap::error::ErrorKind;
            let _ = err.print();
            match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => Err(ExitCode::SUCCESS),
                _ => Err(exitcode::ExitCode::Usage.into()),
            }
        }
    }
}

/// A validated, immutable client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Cache size as a multiple of `section_size`.
    pub cachemul: u32,
    /// Server IP address.
    pub ip: IpAddr,
    /// Server UDP port.
    pub port: u16,
    /// Output file name override, if any.
    pub output: Option<PathBuf>,
}

impl TryFrom<ClientArgs> for ClientConfig {
    type Error = std::io::Error;

    fn try_from(args: ClientArgs) -> Result<Self, Self::Error> {
        let ip: IpAddr = args
            .ip
            .parse()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad --ip value"))?;

        Ok(Self {
            cachemul: args.cachemul.max(1),
            ip,
            port: args.port,
            output: args.output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientArgs, ClientConfig};
    use clap::Parser;

    #[test]
    fn defaults_match_design() {
        let args = ClientArgs::try_parse_from(["fountain-client"]).unwrap();
        assert_eq!(args.cachemul, 6);
        assert_eq!(args.ip, "127.0.0.1");
        assert_eq!(args.port, 2534);
        assert!(args.output.is_none());
    }

    #[test]
    fn output_override_is_parsed() {
        let args = ClientArgs::try_parse_from(["fountain-client", "-o", "renamed.bin"]).unwrap();
        let config = ClientConfig::try_from(args).unwrap();
        assert_eq!(config.output, Some("renamed.bin".into()));
    }

    #[test]
    fn cachemul_override_is_parsed() {
        let args = ClientArgs::try_parse_from(["fountain-client", "-c", "10"]).unwrap();
        assert_eq!(args.cachemul, 10);
    }
}
