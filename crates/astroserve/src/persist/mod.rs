//! Reading and writing probabilistic classifier artifacts.
//!
//! Artifacts come in two encodings of the same [`ProbaModelSchema`]:
//!
//! - JSON, for hand-written or exported models;
//! - the native binary envelope ([`native`]), detected by its magic bytes.

mod convert;
pub mod native;
pub mod schema;

use std::path::Path;

pub use native::{EncodeError, FormatFlags, FormatHeader, NativeCodec, MAGIC};
pub use schema::{ClassTreeSchema, ProbaKindSchema, ProbaMetaSchema, ProbaModelSchema};

use crate::error::LoadError;
use crate::model::ProbaModel;

/// How to encode an artifact on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactEncoding {
    Json,
    #[default]
    Binary,
    /// Binary with a zstd-compressed payload.
    Compressed,
}

/// Decode an artifact, auto-detecting its encoding.
pub fn decode_proba_model(bytes: &[u8]) -> Result<ProbaModel, LoadError> {
    let schema: ProbaModelSchema = if native::is_native(bytes) {
        NativeCodec::new().decode(bytes)?
    } else {
        serde_json::from_slice(bytes)?
    };
    ProbaModel::try_from(schema)
}

/// Read an artifact file.
pub fn read_proba_model(path: impl AsRef<Path>) -> Result<ProbaModel, LoadError> {
    let bytes = std::fs::read(path)?;
    decode_proba_model(&bytes)
}

/// Encode a model.
pub fn encode_proba_model(
    model: &ProbaModel,
    encoding: ArtifactEncoding,
) -> Result<Vec<u8>, EncodeError> {
    let schema = ProbaModelSchema::from(model);
    match encoding {
        ArtifactEncoding::Json => Ok(serde_json::to_vec_pretty(&schema)?),
        ArtifactEncoding::Binary => NativeCodec::new().encode(&schema),
        ArtifactEncoding::Compressed => NativeCodec::compressed().encode(&schema),
    }
}

/// Write a model to `path`.
pub fn write_proba_model(
    model: &ProbaModel,
    path: impl AsRef<Path>,
    encoding: ArtifactEncoding,
) -> Result<(), EncodeError> {
    let bytes = encode_proba_model(model, encoding)?;
    std::fs::write(path, bytes)?;
    Ok(())
}
