//! Control messages: `INFO_REQUEST`, `INFO_REPLY`, and `WAIT`.

use crate::WireError;

/// `INFO_REQUEST` magic: ASCII `"RINF"`.
pub const INFO_REQUEST_MAGIC: u32 = u32::from_be_bytes(*b"RINF");
/// `INFO_REPLY` magic: ASCII `"INFO"`.
pub const INFO_REPLY_MAGIC: u32 = u32::from_be_bytes(*b"INFO");
/// `WAIT` magic: ASCII `"WAIT"`.
pub const WAIT_MAGIC: u32 = u32::from_be_bytes(*b"WAIT");

const FILENAME_LEN: usize = 256;
const INFO_REPLY_LEN: usize = 4 + 2 + 2 + 4 + FILENAME_LEN;

/// A decoded control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// A client asking the server to describe the pinned file.
    InfoRequest,
    /// The server's description of the pinned file.
    InfoReply(FileInfo),
    /// A client declaring per-section receive capacity.
    Wait(WaitRequest),
}

/// The file metadata carried by an `INFO_REPLY`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Number of blocks per section.
    pub section_size: i16,
    /// Block size in bytes.
    pub blk_size: i16,
    /// Total file size in bytes.
    pub filesize: i32,
    /// The file name, relative, forward-slash separated.
    pub filename: String,
}

/// One `(section, capacity)` pair within a `WAIT` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionCapacity {
    /// Section index.
    pub section: u16,
    /// Number of packets the client is ready to receive for this section.
    pub capacity: u16,
}

/// A `WAIT` message: declares receive capacity for up to `NUM_CACHES`
/// sections at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitRequest {
    /// The declared sections and their capacities.
    pub sections: Vec<SectionCapacity>,
}

/// Serializes an `INFO_REQUEST`.
#[must_use]
pub fn encode_info_request() -> Vec<u8> {
    INFO_REQUEST_MAGIC.to_be_bytes().to_vec()
}

/// Serializes an `INFO_REPLY` for `info`.
///
/// `info.filename` is truncated to [`FILENAME_LEN`] bytes and the field is
/// zero-padded; no UTF-8 boundary check is performed on truncation, as
/// file names are transmitted as opaque bytes.
#[must_use]
pub fn encode_info_reply(info: &FileInfo) -> Vec<u8> {
    let mut buf = Vec::with_capacity(INFO_REPLY_LEN);
    buf.extend_from_slice(&INFO_REPLY_MAGIC.to_be_bytes());
    buf.extend_from_slice(&info.section_size.to_be_bytes());
    buf.extend_from_slice(&info.blk_size.to_be_bytes());
    buf.extend_from_slice(&info.filesize.to_be_bytes());

    let mut name = [0u8; FILENAME_LEN];
    let bytes = info.filename.as_bytes();
    let n = bytes.len().min(FILENAME_LEN);
    name[..n].copy_from_slice(&bytes[..n]);
    buf.extend_from_slice(&name);
    buf
}

/// Serializes a `WAIT` message.
///
/// # Errors
///
/// Returns [`WireError::InvalidHeader`] if `request.sections.len()`
/// exceeds `u16::MAX`.
pub fn encode_wait(request: &WaitRequest) -> Result<Vec<u8>, WireError> {
    let num_sections: u16 = request
        .sections
        .len()
        .try_into()
        .map_err(|_| WireError::InvalidHeader)?;

    let mut buf = Vec::with_capacity(6 + request.sections.len() * 4);
    buf.extend_from_slice(&WAIT_MAGIC.to_be_bytes());
    buf.extend_from_slice(&num_sections.to_be_bytes());
    for entry in &request.sections {
        buf.extend_from_slice(&entry.section.to_be_bytes());
        buf.extend_from_slice(&entry.capacity.to_be_bytes());
    }
    Ok(buf)
}

/// Decodes any of the three control message types, dispatching on the
/// leading 4-byte magic. Unknown magic is rejected rather than panicking.
pub fn decode_control(buf: &[u8]) -> Result<ControlMessage, WireError> {
    if buf.len() < 4 {
        return Err(WireError::Truncated);
    }
    let magic = u32::from_be_bytes(buf[0..4].try_into().expect("4 bytes"));
    match magic {
        INFO_REQUEST_MAGIC => Ok(ControlMessage::InfoRequest),
        INFO_REPLY_MAGIC => decode_info_reply(buf).map(ControlMessage::InfoReply),
        WAIT_MAGIC => decode_wait(buf).map(ControlMessage::Wait),
        other => Err(WireError::UnknownMagic(other)),
    }
}

fn decode_info_reply(buf: &[u8]) -> Result<FileInfo, WireError> {
    if buf.len() < INFO_REPLY_LEN {
        return Err(WireError::Truncated);
    }
    let section_size = i16::from_be_bytes(buf[4..6].try_into().expect("2 bytes"));
    let blk_size = i16::from_be_bytes(buf[6..8].try_into().expect("2 bytes"));
    let filesize = i32::from_be_bytes(buf[8..12].try_into().expect("4 bytes"));
    let name_bytes = &buf[12..12 + FILENAME_LEN];
    let end = name_bytes.iter().position(|&b| b == 0).unwrap_or(FILENAME_LEN);
    let filename = String::from_utf8_lossy(&name_bytes[..end]).into_owned();

    Ok(FileInfo {
        section_size,
        blk_size,
        filesize,
        filename,
    })
}

fn decode_wait(buf: &[u8]) -> Result<WaitRequest, WireError> {
    if buf.len() < 6 {
        return Err(WireError::Truncated);
    }
    let num_sections = u16::from_be_bytes(buf[4..6].try_into().expect("2 bytes"));
    let needed = 6 + usize::from(num_sections) * 4;
    if buf.len() < needed {
        return Err(WireError::Truncated);
    }

    let mut sections = Vec::with_capacity(num_sections as usize);
    let mut offset = 6;
    for _ in 0..num_sections {
        let section = u16::from_be_bytes(buf[offset..offset + 2].try_into().expect("2 bytes"));
        let capacity =
            u16::from_be_bytes(buf[offset + 2..offset + 4].try_into().expect("2 bytes"));
        sections.push(SectionCapacity { section, capacity });
        offset += 4;
    }
    Ok(WaitRequest { sections })
}
