use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Binary frames carry bincode, text frames carry JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    Bincode,
    Json,
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed binary frame: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("malformed json frame: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn encode<T: Serialize>(format: WireFormat, value: &T) -> Result<Vec<u8>, CodecError> {
    match format {
        WireFormat::Bincode => Ok(bincode::serialize(value)?),
        WireFormat::Json => Ok(serde_json::to_vec(value)?),
    }
}

pub fn decode<T: DeserializeOwned>(format: WireFormat, bytes: &[u8]) -> Result<T, CodecError> {
    match format {
        WireFormat::Bincode => Ok(bincode::deserialize(bytes)?),
        WireFormat::Json => Ok(serde_json::from_slice(bytes)?),
    }
}
