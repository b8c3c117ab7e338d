//! Native binary envelope for model artifacts.
//!
//! The format consists of a 16-byte header followed by a Postcard-encoded
//! payload, optionally compressed with zstd.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("ASTR")
//! 4       1     Version major
//! 5       1     Version minor
//! 6       2     Flags (bitfield, little-endian)
//! 8       8     Payload size in bytes (little-endian)
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::LoadError;

// ============================================================================
// Constants
// ============================================================================

/// Magic bytes identifying a native artifact.
pub const MAGIC: &[u8; 4] = b"ASTR";

/// Current format version (major).
pub const CURRENT_VERSION_MAJOR: u8 = 1;

/// Current format version (minor).
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the format header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Default zstd level.
#[cfg(feature = "compression")]
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

// ============================================================================
// Format Flags
// ============================================================================

/// Bitfield flags for format features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatFlags(u16);

impl FormatFlags {
    /// Payload is compressed with zstd.
    pub const COMPRESSED: u16 = 1 << 0;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }
}

// ============================================================================
// Format Header
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: FormatFlags,
    pub payload_size: u64,
}

impl FormatHeader {
    /// Header for the current version with no payload yet.
    pub fn new() -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            flags: FormatFlags::empty(),
            payload_size: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[6..8].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[8..16].copy_from_slice(&self.payload_size.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, LoadError> {
        if &buf[0..4] != MAGIC {
            return Err(LoadError::Header("bad magic bytes".into()));
        }
        let (version_major, version_minor) = (buf[4], buf[5]);
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(LoadError::Header(format!(
                "format version {version_major}.{version_minor} is newer than supported {CURRENT_VERSION_MAJOR}.{CURRENT_VERSION_MINOR}"
            )));
        }
        let flags = FormatFlags::from_bits(u16::from_le_bytes([buf[6], buf[7]]));
        let mut size = [0u8; 8];
        size.copy_from_slice(&buf[8..16]);

        Ok(Self {
            version_major,
            version_minor,
            flags,
            payload_size: u64::from_le_bytes(size),
        })
    }
}

impl Default for FormatHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `bytes` start with the native magic.
pub fn is_native(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

// ============================================================================
// Native Codec
// ============================================================================

/// Errors that can occur while encoding an artifact.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("compression requested but the `compression` feature is disabled")]
    CompressionUnavailable,
}

/// Codec for the native binary envelope.
#[derive(Debug, Clone, Default)]
pub struct NativeCodec {
    /// Compress payloads with zstd.
    pub compress: bool,
}

impl NativeCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compressed() -> Self {
        Self { compress: true }
    }

    /// Encode a payload with header.
    pub fn encode<T: Serialize>(&self, payload: &T) -> Result<Vec<u8>, EncodeError> {
        let raw = postcard::to_allocvec(payload)?;
        let mut header = FormatHeader::new();

        let body = if self.compress {
            header.flags.set(FormatFlags::COMPRESSED);
            compress(&raw)?
        } else {
            raw
        };
        header.payload_size = body.len() as u64;

        let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode a payload, validating the header and payload length.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, LoadError> {
        let header_bytes: &[u8; HEADER_SIZE] = bytes
            .get(..HEADER_SIZE)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| {
                LoadError::Header(format!(
                    "file truncated: header needs {HEADER_SIZE} bytes, got {}",
                    bytes.len()
                ))
            })?;
        let header = FormatHeader::from_bytes(header_bytes)?;

        let body = &bytes[HEADER_SIZE..];
        if body.len() as u64 != header.payload_size {
            return Err(LoadError::Header(format!(
                "payload is {} bytes, header declares {}",
                body.len(),
                header.payload_size
            )));
        }

        if header.flags.contains(FormatFlags::COMPRESSED) {
            let raw = decompress(body)?;
            Ok(postcard::from_bytes(&raw)?)
        } else {
            Ok(postcard::from_bytes(body)?)
        }
    }
}

#[cfg(feature = "compression")]
fn compress(raw: &[u8]) -> Result<Vec<u8>, EncodeError> {
    Ok(zstd::encode_all(raw, DEFAULT_COMPRESSION_LEVEL)?)
}

#[cfg(not(feature = "compression"))]
fn compress(_raw: &[u8]) -> Result<Vec<u8>, EncodeError> {
    Err(EncodeError::CompressionUnavailable)
}

#[cfg(feature = "compression")]
fn decompress(body: &[u8]) -> Result<Vec<u8>, LoadError> {
    Ok(zstd::decode_all(body)?)
}

#[cfg(not(feature = "compression"))]
fn decompress(_body: &[u8]) -> Result<Vec<u8>, LoadError> {
    Err(LoadError::Unsupported(
        "artifact is compressed but the `compression` feature is disabled".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
    struct Payload {
        name: String,
        values: Vec<f64>,
    }

    fn payload() -> Payload {
        Payload {
            name: "stump".into(),
            values: vec![0.25; 64],
        }
    }

    #[test]
    fn header_layout() {
        let mut header = FormatHeader::new();
        header.flags.set(FormatFlags::COMPRESSED);
        header.payload_size = 258;
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..4], b"ASTR");
        assert_eq!(bytes[4], CURRENT_VERSION_MAJOR);
        assert_eq!(&bytes[6..8], &[1, 0]);
        assert_eq!(&bytes[8..10], &[2, 1]);
        assert_eq!(FormatHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn plain_payload_decodes() {
        let codec = NativeCodec::new();
        let bytes = codec.encode(&payload()).unwrap();
        assert!(is_native(&bytes));
        let decoded: Payload = codec.decode(&bytes).unwrap();
        assert_eq!(decoded, payload());
    }

    #[cfg(feature = "compression")]
    #[test]
    fn compressed_payload_is_smaller_and_decodes() {
        let plain = NativeCodec::new().encode(&payload()).unwrap();
        let packed = NativeCodec::compressed().encode(&payload()).unwrap();
        assert!(packed.len() < plain.len());

        let header = FormatHeader::from_bytes(packed[..HEADER_SIZE].try_into().unwrap()).unwrap();
        assert!(header.flags.contains(FormatFlags::COMPRESSED));
        let decoded: Payload = NativeCodec::new().decode(&packed).unwrap();
        assert_eq!(decoded, payload());
    }

    #[test]
    fn rejects_bad_headers() {
        let codec = NativeCodec::new();
        let bytes = codec.encode(&payload()).unwrap();

        assert!(matches!(codec.decode::<Payload>(&bytes[..10]), Err(LoadError::Header(_))));
        assert!(matches!(
            codec.decode::<Payload>(&bytes[..bytes.len() - 1]),
            Err(LoadError::Header(_))
        ));

        let mut newer = bytes.clone();
        newer[4] = CURRENT_VERSION_MAJOR + 1;
        assert!(matches!(codec.decode::<Payload>(&newer), Err(LoadError::Header(msg)) if msg.contains("newer")));

        let mut wrong = bytes;
        wrong[0] = b'X';
        assert!(matches!(codec.decode::<Payload>(&wrong), Err(LoadError::Header(_))));
    }
}
