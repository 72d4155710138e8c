//! Length-prefixed frame streams.
//!
//! Each frame is written as a little-endian `u32` byte count followed by the
//! bincode payload. With a key configured the payload is sealed with
//! XChaCha20-Poly1305 (`nonce || ciphertext`).

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use roster_shared::constants::MAX_FRAME_SIZE;
use roster_shared::crypto::{self, SymmetricKey};
use roster_shared::protocol::Frame;
use roster_shared::SharedError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameIoError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The payload could not be sealed, opened or (de)serialized.
    #[error("frame codec error: {0}")]
    Codec(#[from] SharedError),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },

    #[error("stream ended in the middle of a frame")]
    Truncated,
}

impl FrameIoError {
    /// Fatal errors leave the stream at an unknown position; nothing after
    /// them can be read.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Codec(_))
    }
}

/// Destination for archived frames.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), FrameIoError>;
}

/// Source of frames to restore. `Ok(None)` is a clean end of stream.
pub trait FrameSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, FrameIoError>;
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

pub struct FrameWriter<W: Write> {
    inner: W,
    key: Option<SymmetricKey>,
    frames_written: u64,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            key: None,
            frames_written: 0,
        }
    }

    /// Seal every payload with `key`.
    pub fn with_key(mut self, key: SymmetricKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn flush(&mut self) -> Result<(), FrameIoError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> FrameSink for FrameWriter<W> {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), FrameIoError> {
        let plain = frame.to_bytes().map_err(SharedError::from)?;
        let payload = match &self.key {
            Some(key) => crypto::encrypt(key, &plain).map_err(SharedError::from)?,
            None => plain,
        };

        let len = u32::try_from(payload.len()).map_err(|_| FrameIoError::FrameTooLarge {
            len: payload.len(),
            max: u32::MAX as usize,
        })?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(&payload)?;
        self.frames_written += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

pub struct FrameReader<R: Read> {
    inner: R,
    key: Option<SymmetricKey>,
    max_frame_size: usize,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            key: None,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Open every payload with `key`.
    pub fn with_key(mut self, key: SymmetricKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Read the 4-byte length prefix. `None` if the stream ended cleanly
    /// before it.
    fn read_len(&mut self) -> Result<Option<usize>, FrameIoError> {
        let mut buf = [0u8; 4];
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Ok(None),
                Ok(0) => return Err(FrameIoError::Truncated),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(Some(u32::from_le_bytes(buf) as usize))
    }
}

impl<R: Read> FrameSource for FrameReader<R> {
    fn read_frame(&mut self) -> Result<Option<Frame>, FrameIoError> {
        let Some(len) = self.read_len()? else {
            return Ok(None);
        };
        if len > self.max_frame_size {
            return Err(FrameIoError::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => FrameIoError::Truncated,
            _ => FrameIoError::Io(e),
        })?;

        // The payload is fully consumed here, so a bad frame does not
        // desynchronise the stream.
        let plain = match &self.key {
            Some(key) => crypto::decrypt(key, &payload).map_err(SharedError::from)?,
            None => payload,
        };
        let frame = Frame::from_bytes(&plain).map_err(SharedError::from)?;
        Ok(Some(frame))
    }
}

// ---------------------------------------------------------------------------
// In-memory streams
// ---------------------------------------------------------------------------

impl FrameSink for Vec<Frame> {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), FrameIoError> {
        self.push(frame.clone());
        Ok(())
    }
}

impl FrameSource for VecDeque<Frame> {
    fn read_frame(&mut self) -> Result<Option<Frame>, FrameIoError> {
        Ok(self.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_shared::crypto::generate_symmetric_key;
    use roster_shared::protocol::{BackupInfo, Chat};

    fn sample_frames() -> Vec<Frame> {
        vec![
            Frame::header(BackupInfo {
                version: 1,
                backup_time_ms: 1_700_000_000_000,
            }),
            Frame::chat(Chat {
                id: 1,
                recipient_id: 2,
                ..Default::default()
            }),
        ]
    }

    fn write_all(writer: &mut dyn FrameSink, frames: &[Frame]) {
        for frame in frames {
            writer.write_frame(frame).unwrap();
        }
    }

    #[test]
    fn plain_stream_round_trip() {
        let frames = sample_frames();
        let mut writer = FrameWriter::new(Vec::new());
        write_all(&mut writer, &frames);
        assert_eq!(writer.frames_written(), 2);

        let bytes = writer.into_inner();
        let mut reader = FrameReader::new(bytes.as_slice());
        assert_eq!(reader.read_frame().unwrap(), Some(frames[0].clone()));
        assert_eq!(reader.read_frame().unwrap(), Some(frames[1].clone()));
        assert_eq!(reader.read_frame().unwrap(), None);
    }

    #[test]
    fn sealed_stream_needs_the_key() {
        let key = generate_symmetric_key();
        let frames = sample_frames();
        let mut writer = FrameWriter::new(Vec::new()).with_key(key);
        write_all(&mut writer, &frames);
        let bytes = writer.into_inner();

        let mut reader = FrameReader::new(bytes.as_slice()).with_key(key);
        assert_eq!(reader.read_frame().unwrap(), Some(frames[0].clone()));

        let mut wrong = FrameReader::new(bytes.as_slice()).with_key(generate_symmetric_key());
        let err = wrong.read_frame().unwrap_err();
        assert!(!err.is_fatal());
        // The bad frame was consumed; the next one is read (and fails) on its own.
        assert!(matches!(wrong.read_frame(), Err(FrameIoError::Codec(_))));
        assert!(wrong.read_frame().unwrap().is_none());
    }

    #[test]
    fn garbage_payload_is_skipped() {
        let frames = sample_frames();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[0xff, 0xff, 0xff]);
        let mut writer = FrameWriter::new(bytes);
        writer.write_frame(&frames[1]).unwrap();
        let bytes = writer.into_inner();

        let mut reader = FrameReader::new(bytes.as_slice());
        assert!(matches!(reader.read_frame(), Err(FrameIoError::Codec(_))));
        assert_eq!(reader.read_frame().unwrap(), Some(frames[1].clone()));
    }

    #[test]
    fn truncation_and_oversize_are_fatal() {
        let mut writer = FrameWriter::new(Vec::new());
        writer.write_frame(&sample_frames()[0]).unwrap();
        let bytes = writer.into_inner();

        let mut short = FrameReader::new(&bytes[..bytes.len() - 1]);
        let err = short.read_frame().unwrap_err();
        assert!(matches!(err, FrameIoError::Truncated));
        assert!(err.is_fatal());

        let mut half_prefix = FrameReader::new(&bytes[..2]);
        assert!(matches!(half_prefix.read_frame(), Err(FrameIoError::Truncated)));

        let mut limited = FrameReader::new(bytes.as_slice()).with_max_frame_size(4);
        assert!(matches!(
            limited.read_frame(),
            Err(FrameIoError::FrameTooLarge { max: 4, .. })
        ));
    }
}
