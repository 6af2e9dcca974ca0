//! CLI argument parsing and the validated [`ServerConfig`] it produces.

use crate::error::ServerError;
use crate::sizing::BlockSizeError;
use clap::Parser;
use std::ffi::OsString;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Raw command-line arguments for `fountain-server`, before validation.
#[derive(Debug, Parser)]
#[command(name = "fountain-server", version, about = "Serve a file as rateless fountain packets over UDP")]
pub struct ServerArgs {
    /// The file to serve.
    pub file: PathBuf,

    /// Block size in bytes (default: chosen automatically).
    #[arg(short = 'b', long = "blocksize")]
    pub blocksize: Option<u16>,

    /// Bind IP address.
    #[arg(short = 'i', long = "ip", default_value = "0.0.0.0")]
    pub ip: String,

    /// Bind UDP port.
    #[arg(short = 'p', long = "port", default_value_t = 2534)]
    pub port: u16,

    /// Inject artificial response latency, in milliseconds (debug aid).
    #[arg(short = 'L', long = "latency")]
    pub latency_ms: Option<u64>,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parses `args`, handling `--help`/`--version` and argument errors the
/// way clap's own CLI front end does; returns `Err` with the process exit
/// code to use when parsing did not yield runnable arguments.
pub fn parse<I, T>(args: I) -> Result<ServerArgs, ExitCode>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match ServerArgs::try_parse_from(args) {
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

/// A validated, immutable server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path to the file being served.
    pub file: PathBuf,
    /// Explicit block size override, if any.
    pub blocksize: Option<u16>,
    /// Bind IP address.
    pub ip: IpAddr,
    /// Bind UDP port.
    pub port: u16,
    /// Artificial per-datagram response latency, if any.
    pub latency: Option<Duration>,
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = ServerError;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        if let Some(blocksize) = args.blocksize {
            if blocksize > crate::sizing::MAX_BLOCK_SIZE {
                return Err(ServerError::BlockSize(BlockSizeError::TooLarge(blocksize)));
            }
        }
        let ip: IpAddr = args
            .ip
            .parse()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "bad --ip value"))?;

        Ok(Self {
            file: args.file,
            blocksize: args.blocksize,
            ip,
            port: args.port,
            latency: args.latency_ms.map(Duration::from_millis),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ServerArgs, ServerConfig};
    use clap::Parser;

    #[test]
    fn defaults_match_design() {
        let args = ServerArgs::try_parse_from(["fountain-server", "file.bin"]).unwrap();
        assert_eq!(args.ip, "0.0.0.0");
        assert_eq!(args.port, 2534);
        assert_eq!(args.verbose, 0);
        assert!(args.blocksize.is_none());
    }

    #[test]
    fn verbose_flag_is_repeatable() {
        let args = ServerArgs::try_parse_from(["fountain-server", "-vvv", "file.bin"]).unwrap();
        assert_eq!(args.verbose, 3);
    }

    #[test]
    fn valid_args_convert_to_config() {
        let args = ServerArgs::try_parse_from(["fountain-server", "-i", "127.0.0.1", "-p", "9000", "file.bin"]).unwrap();
        let config = ServerConfig::try_from(args).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.ip, std::net::IpAddr::from([127, 0, 0, 1]));
    }

    #[test]
    fn oversized_blocksize_is_rejected() {
        let args = ServerArgs::try_parse_from(["fountain-server", "-b", "20000", "file.bin"]).unwrap();
        assert!(ServerConfig::try_from(args).is_err());
    }
}
