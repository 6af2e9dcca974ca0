#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! The fountain-transfer server: a single-threaded, stateless UDP
//! responder. It pins one file at startup, answers `INFO_REQUEST` with a
//! description of that file, and answers `WAIT` with a burst of fountain
//! packets for the requested sections.
//!
//! See [`Server::run`] for the main loop and [`choose_block_size`]/
//! [`choose_section_size`] for the auto-sizing policy (§4.9 in the design
//! notes this crate implements).

mod config;
mod error;
mod sizing;

pub use config::{ServerArgs, ServerConfig};
pub use error::ServerError;
pub use sizing::{MAX_BLOCK_SIZE, choose_block_size, choose_section_size};

use fountain::Encoder;
use pathutil::PathError;
use std::ffi::OsString;
use std::fs::File;
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::process::ExitCode;
use std::thread;
use tracing::{debug, info, warn};
use wire::{ControlMessage, FileInfo};

const RECV_BUF_LEN: usize = 65536;

/// Parses CLI arguments, builds a [`ServerConfig`], and runs the server
/// loop to completion (which, barring a fatal error, never returns until
/// the process is signalled).
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

    let config = match ServerConfig::try_from(raw) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            return err.exit_code();
        }
    };

    match Server::bind(config).and_then(|server| server.run()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "server exiting");
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

/// The bound, running server: owns the UDP socket and the pinned file's
/// description for the lifetime of the process.
pub struct Server {
    socket: UdpSocket,
    config: ServerConfig,
    file_info: FileInfo,
}

impl Server {
    /// Binds the configured address/port and stats the pinned file,
    /// computing its advertised [`FileInfo`] up front.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the bind or the file stat fails, or
    /// [`ServerError::BlockSizeTooLarge`] if an explicit `--blocksize`
    /// exceeds [`MAX_BLOCK_SIZE`].
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let socket = UdpSocket::bind((config.ip, config.port))?;
        info!(addr = %socket.local_addr()?, "bound");

        let metadata = std::fs::metadata(&config.file)?;
        let filesize = metadata.len();
        let blk_size = choose_block_size(filesize, config.blocksize)?;
        let total_blocks = filesize.div_ceil(u64::from(blk_size)).max(1);
        let section_size = choose_section_size(total_blocks);
        let filename = advertised_filename(&config.file)?;

        let file_info = FileInfo {
            section_size: i16::try_from(section_size).unwrap_or(i16::MAX),
            blk_size: i16::try_from(blk_size).unwrap_or(i16::MAX),
            filesize: i32::try_from(filesize).unwrap_or(i32::MAX),
            filename,
        };

        Ok(Self {
            socket,
            config,
            file_info,
        })
    }

    /// Runs the receive loop until a fatal I/O error occurs.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if `recv_from` fails in a way that is
    /// not simply "no datagram available"; send errors are logged and do
    /// not terminate the loop (per the `network` policy in the error
    /// table this crate implements).
    pub fn run(&self) -> Result<(), ServerError> {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf)?;
            if let Some(latency) = self.config.latency {
                thread::sleep(latency);
            }
            self.handle_datagram(&buf[..len], from);
        }
    }

    fn handle_datagram(&self, datagram: &[u8], from: SocketAddr) {
        let message = match wire::decode_control(datagram) {
            Ok(message) => message,
            Err(err) => {
                debug!(%from, %err, "dropped malformed datagram");
                return;
            }
        };

        match message {
            ControlMessage::InfoRequest => {
                debug!(%from, "INFO_REQUEST");
                let frame = wire::encode_info_reply(&self.file_info);
                self.send(&frame, from);
            }
            ControlMessage::Wait(request) => {
                debug!(%from, sections = request.sections.len(), "WAIT");
                self.handle_wait(&request, from);
            }
            ControlMessage::InfoReply(_) => {
                debug!(%from, "dropped unexpected INFO_REPLY");
            }
        }
    }

    fn handle_wait(&self, request: &wire::WaitRequest, from: SocketAddr) {
        let total: u32 = request.sections.iter().map(|s| u32::from(s.capacity)).sum();
        if total == 0 {
            return;
        }

        let file = match File::open(&self.config.file) {
            Ok(file) => file,
            Err(err) => {
                warn!(%from, %err, "failed to open source file for burst");
                return;
            }
        };
        let mut encoder = Encoder::new(file);
        let section_size = u32::from(self.file_info.section_size.max(1) as u16);
        let blk_size = u16::try_from(self.file_info.blk_size.max(1)).unwrap_or(1);

        let mut emitted = 0u32;
        for entry in &request.sections {
            for _ in 0..entry.capacity {
                match encoder.encode(u32::from(entry.section), section_size, blk_size) {
                    Ok(Some(packet)) => {
                        let frame = wire::encode_packet(&packet);
                        self.send(&frame, from);
                        emitted += 1;
                    }
                    Ok(None) => {
                        debug!(section = entry.section, "short read produced no packet");
                    }
                    Err(err) => {
                        warn!(section = entry.section, %err, "encode failed");
                    }
                }
            }
        }
        info!(%from, emitted, "burst complete");
    }

    fn send(&self, frame: &[u8], to: SocketAddr) {
        if let Err(err) = self.socket.send_to(frame, to) {
            warn!(%to, %err, "send failed");
        }
    }
}

fn advertised_filename(path: &Path) -> Result<String, PathError> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    pathutil::sanitize(&name).map(|sanitized| sanitized.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertised_filename_strips_directory_component() {
        let name = advertised_filename(Path::new("/srv/data/payload.bin")).unwrap();
        assert_eq!(name, "payload.bin");
    }

    #[test]
    fn advertised_filename_rejects_unsafe_characters() {
        assert!(advertised_filename(Path::new(r"weird\name")).is_err());
    }

    #[test]
    fn bind_and_describe_small_file() {
        use std::io::Write;
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"Hello, world!\n").unwrap();

        let config = ServerConfig {
            file: tmp.path().to_path_buf(),
            blocksize: None,
            ip: std::net::IpAddr::from([127, 0, 0, 1]),
            port: 0,
            latency: None,
        };
        let server = Server::bind(config).unwrap();
        assert_eq!(server.file_info.filesize, 14);
        assert!(server.file_info.blk_size > 0);
        assert!(server.file_info.section_size > 0);
    }

    /// S5: a `WAIT` declaring capacities `[10, 5, 0]` across three
    /// sections must produce exactly 15 fountain frames, each named for
    /// one of the requested sections and passing its checksum.
    #[test]
    fn wait_with_multiple_sections_emits_declared_capacity_total() {
        use std::io::Write;
        use std::net::UdpSocket;
        use std::time::Duration;

        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(&vec![0xABu8; 4096]).unwrap();

        let config = ServerConfig {
            file: tmp.path().to_path_buf(),
            blocksize: Some(128),
            ip: std::net::IpAddr::from([127, 0, 0, 1]),
            port: 0,
            latency: None,
        };
        let server = Server::bind(config).unwrap();
        let server_addr = server.socket.local_addr().unwrap();

        let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
        probe.connect(server_addr).unwrap();
        probe.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let request = wire::WaitRequest {
            sections: vec![
                wire::SectionCapacity { section: 0, capacity: 10 },
                wire::SectionCapacity { section: 1, capacity: 5 },
                wire::SectionCapacity { section: 2, capacity: 0 },
            ],
        };
        let frame = wire::encode_wait(&request).unwrap();
        server.handle_datagram(&frame, probe.local_addr().unwrap());

        let section_size = u32::from(server.file_info.section_size as u16);
        let mut received = 0u32;
        let mut buf = [0u8; 65536];
        loop {
            match probe.recv(&mut buf) {
                Ok(len) => {
                    let packet = wire::decode_packet(&buf[..len], section_size).unwrap();
                    assert!(request.sections.iter().any(|s| s.section == packet.section));
                    received += 1;
                }
                Err(_) => break,
            }
        }
        assert_eq!(received, 15);
    }
}
