//! zlib compression for attribute payloads.
//!
//! SCope expects compressed attributes to be plain zlib streams (RFC 1950).

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::{LoomError, Result};

/// zlib's own default level.
pub const DEFAULT_LEVEL: u32 = 6;

/// Compress data into a zlib stream at the given level (0–9).
pub fn zlib_compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder
        .write_all(data)
        .map_err(|e| LoomError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| LoomError::Compression(e.to_string()))
}

/// Decompress a zlib stream.
pub fn zlib_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| LoomError::Compression(e.to_string()))?;
    Ok(decompressed)
}

/// Whether `data` starts with a zlib header (CMF/FLG pair with a valid check).
pub fn is_zlib(data: &[u8]) -> bool {
    data.len() >= 2
        && data[0] & 0x0F == 8
        && (u16::from(data[0]) << 8 | u16::from(data[1])) % 31 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zlib_roundtrip() {
        let original = b"{\"embeddings\": [], \"annotations\": [], \"metrics\": []}";
        let compressed = zlib_compress(original, DEFAULT_LEVEL).unwrap();
        let decompressed = zlib_decompress(&compressed).unwrap();
        assert_eq!(original.to_vec(), decompressed);
    }

    #[test]
    fn test_default_level_header() {
        let compressed = zlib_compress(b"test", DEFAULT_LEVEL).unwrap();
        assert_eq!(&compressed[..2], &[0x78, 0x9C]);
        assert!(is_zlib(&compressed));
    }

    #[test]
    fn test_not_zlib() {
        assert!(!is_zlib(b"not compressed"));
        assert!(!is_zlib(b""));
    }

    #[test]
    fn test_decompress_garbage() {
        assert!(zlib_decompress(b"not compressed data").is_err());
    }

    proptest! {
        #[test]
        fn zlib_roundtrip_any(data in proptest::collection::vec(any::<u8>(), 0..512), level in 0u32..=9) {
            let compressed = zlib_compress(&data, level).unwrap();
            prop_assert_eq!(zlib_decompress(&compressed).unwrap(), data);
        }
    }
}
