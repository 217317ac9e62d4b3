//! Snapshot codec: JSON, then zlib.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::engine::error::{GameError, GameResult};

/// Serialize and compress a snapshot for the store.
pub fn dehydrate<S: Serialize>(state: &S) -> GameResult<Vec<u8>> {
    let json = serde_json::to_vec(state).map_err(|e| GameError::Codec(e.to_string()))?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| GameError::Codec(e.to_string()))?;
    encoder.finish().map_err(|e| GameError::Codec(e.to_string()))
}

/// Inverse of [`dehydrate`].
pub fn rehydrate<S: DeserializeOwned>(bytes: &[u8]) -> GameResult<S> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| GameError::Codec(e.to_string()))?;
    serde_json::from_slice(&json).map_err(|e| GameError::Codec(e.to_string()))
}
