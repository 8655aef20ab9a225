//! Persisted track-map binary format
//!
//! Header: 4-byte magic, u16 version, two reserved u32 fields. Body: a
//! flat list of little-endian `(x, y, spline)` f32 triples. Written once
//! after a clean full lap, loaded on every later session of that track.

use std::fs;
use std::path::Path;
use thiserror::Error;

pub const MAP_MAGIC: [u8; 4] = *b"tmap";
pub const MAP_VERSION: u16 = 1;

const HEADER_LEN: usize = 4 + 2 + 4 + 4;
const POINT_LEN: usize = 12;

/// One traced position on the centerline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub x: f32,
    pub y: f32,
    /// Normalized 0..1 distance around the track
    pub spline: f32,
}

#[derive(Debug, Error)]
pub enum MapFormatError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The file is not a track map; reported, never silently accepted
    #[error("track map has bad magic bytes")]
    BadMagic,
    #[error("track map version {0} is not supported")]
    UnsupportedVersion(u16),
    #[error("track map is truncated")]
    Truncated,
}

pub fn encode_map(points: &[TrackPoint]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + points.len() * POINT_LEN);
    bytes.extend_from_slice(&MAP_MAGIC);
    bytes.extend_from_slice(&MAP_VERSION.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes()); // reserved
    bytes.extend_from_slice(&0u32.to_le_bytes()); // reserved
    for point in points {
        bytes.extend_from_slice(&point.x.to_le_bytes());
        bytes.extend_from_slice(&point.y.to_le_bytes());
        bytes.extend_from_slice(&point.spline.to_le_bytes());
    }
    bytes
}

pub fn decode_map(bytes: &[u8]) -> Result<Vec<TrackPoint>, MapFormatError> {
    if bytes.len() < HEADER_LEN {
        return Err(MapFormatError::Truncated);
    }
    if bytes[..4] != MAP_MAGIC {
        return Err(MapFormatError::BadMagic);
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != MAP_VERSION {
        return Err(MapFormatError::UnsupportedVersion(version));
    }

    let body = &bytes[HEADER_LEN..];
    if body.len() % POINT_LEN != 0 {
        return Err(MapFormatError::Truncated);
    }

    let read_f32 = |chunk: &[u8]| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    Ok(body
        .chunks_exact(POINT_LEN)
        .map(|chunk| TrackPoint {
            x: read_f32(&chunk[0..4]),
            y: read_f32(&chunk[4..8]),
            spline: read_f32(&chunk[8..12]),
        })
        .collect())
}

pub fn write_map(path: &Path, points: &[TrackPoint]) -> Result<(), MapFormatError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, encode_map(points))?;
    Ok(())
}

pub fn load_map(path: &Path) -> Result<Vec<TrackPoint>, MapFormatError> {
    decode_map(&fs::read(path)?)
}
