//! LDDS frame codec (encode/decode)

use std::io::{self, Read};

use bytes::Bytes;

use super::{Error, Frame, FrameHeader, HEADER_SIZE, Result};

/// Encode a frame to bytes
///
/// # Format
///
/// ```text
/// [HEADER (10 bytes)] [BODY (variable)]
/// ```
pub fn encode(frame: &Frame) -> Result<Vec<u8>> {
    let body = frame.body();
    let header = frame.header().to_bytes()?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
    bytes.extend_from_slice(&header);
    bytes.extend_from_slice(body);
    Ok(bytes)
}

/// Decode a frame from bytes
///
/// The body is sliced out of `bytes` without copying. Trailing bytes past the
/// declared body length are ignored.
///
/// # Errors
///
/// Returns an error if:
/// - Buffer is too small
/// - Sync pattern is invalid
/// - Message id is unknown
/// - Length field is not decimal
pub fn decode(bytes: Bytes) -> Result<Frame> {
    let header = FrameHeader::from_bytes(&bytes)?;

    let total_size = HEADER_SIZE + header.body_len();
    if bytes.len() < total_size {
        return Err(Error::BufferTooSmall {
            needed: total_size,
            got: bytes.len(),
        });
    }

    let body = bytes.slice(HEADER_SIZE..total_size);
    Ok(Frame::from_parts(header, body))
}

/// Read exactly one frame from a blocking reader
///
/// A read timeout before the first byte surfaces as an [`Error::Io`] for
/// which [`Error::is_timeout`] is true. A timeout once part of the frame
/// has been consumed is [`Error::PartialFrame`].
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Frame> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    fill(reader, &mut header_bytes, 0)?;
    let header = FrameHeader::from_bytes(&header_bytes)?;

    let mut body = vec![0u8; header.body_len()];
    fill(reader, &mut body, HEADER_SIZE)?;
    Ok(Frame::from_parts(header, Bytes::from(body)))
}

/// `read_exact` that reports how far into the frame a timeout struck
fn fill<R: Read>(reader: &mut R, buf: &mut [u8], offset: usize) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => {
                let read = offset + filled;
                let timed_out = matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                );
                if timed_out && read > 0 {
                    return Err(Error::PartialFrame { read });
                }
                return Err(err.into());
            }
        }
    }
    Ok(())
}
