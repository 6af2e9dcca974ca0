#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! The fountain-transfer client: fetches a file description from the
//! server, lays out a memory-mapped output file, and decodes one section
//! at a time by pulling packets through a [`cache::CacheRing`] and
//! feeding them to a [`decoder::DecodeState`].
//!
//! See [`Client::run`] for the end-to-end transfer and
//! [`Client::fetch_file_info`] for the `INFO_REQUEST`/`INFO_REPLY`
//! handshake.

mod cache;
mod config;
mod error;
mod mmap_io;
mod net;
mod sink;

pub use cache::{CacheRing, NUM_CACHES};
pub use config::{ClientArgs, ClientConfig};
pub use error::ClientError;
pub use sink::SectionSink;

use decoder::DecodeState;
use net::{RECV_BUF_LEN, is_timeout};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::net::UdpSocket;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use wire::{ControlMessage, FileInfo};

const HANDSHAKE_INITIAL_TIMEOUT: Duration = Duration::from_millis(200);
const HANDSHAKE_MAX_TIMEOUT: Duration = Duration::from_secs(5);

/// Parses CLI arguments, builds a [`ClientConfig`], and runs the transfer
/// to completion.
pub fn run<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let raw = match config::parse(args) {
        Ok(raw) => raw,
        Err(code) => return code,
    };

    init_tracing(raw.verbose);

    let config = match ClientConfig::try_from(raw) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            return exitcode::ExitCode::Usage.into();
        }
    };

    match Client::connect(config).and_then(Client::run) {
        Ok(summary) => {
            info!(
                received = summary.packets_received,
                discarded = summary.packets_discarded,
                elapsed_ms = summary.elapsed.as_millis(),
                "transfer complete"
            );
            println!(
                "received {} packets, discarded {}, in {:.2}s",
                summary.packets_received,
                summary.packets_discarded,
                summary.elapsed.as_secs_f64()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "transfer failed");
            err.exit_code()
        }
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Summary statistics printed at the end of a transfer.
#[derive(Debug, Clone, Copy)]
pub struct Summary {
    /// Total packets accepted into some cache over the transfer.
    pub packets_received: u64,
    /// Total packets discarded: checksum failures, stale-section
    /// datagrams, or cache rotations that dropped unconsumed contents.
    pub packets_discarded: u64,
    /// Wall-clock time from connect to completion.
    pub elapsed: Duration,
}

/// An in-progress (or about-to-start) transfer: owns the socket and the
/// output file mapping for its lifetime.
pub struct Client {
    config: ClientConfig,
    socket: UdpSocket,
    file_info: FileInfo,
}

impl Client {
    /// Connects to the configured server and fetches its [`FileInfo`].
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Network`] if the socket cannot be created
    /// or connected, or [`ClientError::Timeout`] if the server never
    /// answers `INFO_REQUEST`.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect((config.ip, config.port))?;
        let file_info = Self::fetch_file_info(&socket)?;
        Ok(Self {
            config,
            socket,
            file_info,
        })
    }

    fn fetch_file_info(socket: &UdpSocket) -> Result<FileInfo, ClientError> {
        let request = wire::encode_info_request();
        let mut timeout = HANDSHAKE_INITIAL_TIMEOUT;
        loop {
            socket.send(&request)?;
            socket.set_read_timeout(Some(timeout))?;
            let mut buf = [0u8; RECV_BUF_LEN];
            match socket.recv(&mut buf) {
                Ok(len) => match wire::decode_control(&buf[..len]) {
                    Ok(ControlMessage::InfoReply(info)) => return Ok(info),
                    _ => continue,
                },
                Err(err) if is_timeout(&err) => {
                    if timeout >= HANDSHAKE_MAX_TIMEOUT {
                        return Err(ClientError::Timeout {
                            section: 0,
                            received: 0,
                            discarded: 0,
                        });
                    }
                    timeout = (timeout * 2).min(HANDSHAKE_MAX_TIMEOUT);
                    debug!(?timeout, "retrying INFO_REQUEST");
                }
                Err(err) => return Err(ClientError::Network(err)),
            }
        }
    }

    /// Runs the transfer to completion: lays out the output file, pulls
    /// and decodes every section, and truncates the file to its final
    /// size.
    ///
    /// # Errors
    ///
    /// See [`ClientError`] for the conditions under which a transfer is
    /// aborted.
    pub fn run(self) -> Result<Summary, ClientError> {
        let started = Instant::now();
        let Self {
            config,
            socket,
            file_info,
        } = self;

        validate_file_info(&file_info)?;
        let section_size = file_info.section_size as u32;
        let blk_size = file_info.blk_size as u16;
        let filesize = file_info.filesize as u64;

        let output_path = output_path(&config, &file_info)?;
        let section_bytes = u64::from(section_size) * u64::from(blk_size);
        let num_sections = filesize.div_ceil(section_bytes).max(1) as u32;
        let mapped_len = section_bytes * u64::from(num_sections);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&output_path)?;
        file.set_len(mapped_len)?;
        let mut mmap = Some(mmap_io::map_mut(&file)?);

        let mut ring = CacheRing::new(socket, section_size, config.cachemul);
        let mut packets_received = 0u64;

        for section in 0..num_sections {
            let base = (u64::from(section) * section_bytes) as usize;
            let sink = SectionSink::new(mmap.take().expect("mmap present between sections"), base, blk_size);
            let mut state = DecodeState::new(section as u16, section_size, blk_size, sink);

            while !state.is_complete() {
                match ring.get_packet(section, num_sections) {
                    Some(packet) => {
                        state.feed(packet)?;
                    }
                    None => {
                        return Err(ClientError::Timeout {
                            section,
                            received: packets_received + state.packets_so_far(),
                            discarded: ring.discarded(),
                        });
                    }
                }
            }

            packets_received += state.packets_so_far();
            mmap = Some(state.into_sink().mmap);
            info!(section, "section complete");
        }

        let mmap = mmap.expect("mmap present after final section");
        mmap.flush()?;
        drop(mmap);
        file.set_len(filesize)?;

        Ok(Summary {
            packets_received,
            packets_discarded: ring.discarded(),
            elapsed: started.elapsed(),
        })
    }
}

fn validate_file_info(info: &FileInfo) -> Result<(), ClientError> {
    if info.section_size <= 0 {
        return Err(ClientError::InvalidMetadata("non-positive section_size"));
    }
    if info.blk_size <= 0 {
        return Err(ClientError::InvalidMetadata("non-positive blk_size"));
    }
    if info.filesize < 0 {
        return Err(ClientError::InvalidMetadata("negative filesize"));
    }
    Ok(())
}

fn output_path(config: &ClientConfig, info: &FileInfo) -> Result<PathBuf, ClientError> {
    if let Some(path) = &config.output {
        return Ok(path.clone());
    }
    Ok(pathutil::sanitize(&info.filename)?)
}
