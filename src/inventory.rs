use std::io::Read;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use memchr::memmem;

use crate::api::Member;
use crate::error::{Error, Result};

/// Decoded raw bytes of a member's storage containers.
///
/// Item records are not parsed: watched items are located by literal
/// substring search over the NBT bytes.
#[derive(Debug, Clone, Default)]
pub struct Storage {
    pub inventory: Vec<u8>,
    pub ender_chest: Vec<u8>,
}

impl Storage {
    pub fn decode(member: &Member) -> Result<Self> {
        Ok(Self {
            inventory: decode_container(&member.inventory.data)?,
            ender_chest: decode_container(&member.ender_chest.data)?,
        })
    }

    pub fn contains(&self, needle: &str) -> bool {
        let finder = memmem::Finder::new(needle.as_bytes());
        finder.find(&self.inventory).is_some() || finder.find(&self.ender_chest).is_some()
    }

    /// Watched names present in either container, in watch order.
    pub fn matches<'a>(&self, watched: &'a [String]) -> Vec<&'a str> {
        watched
            .iter()
            .filter(|name| self.contains(name))
            .map(String::as_str)
            .collect()
    }
}

/// Decodes a base64 + gzip container blob. An empty blob decodes to nothing.
pub fn decode_container(data: &str) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let compressed = STANDARD
        .decode(data.trim())
        .map_err(|e| Error::Malformed(format!("container base64: {e}")))?;
    let mut raw = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut raw)
        .map_err(|e| Error::Malformed(format!("container gzip: {e}")))?;
    Ok(raw)
}

/// Inverse of [`decode_container`], used to build fixtures.
#[cfg(test)]
pub(crate) fn encode_container(raw: &[u8]) -> String {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(raw).unwrap();
    STANDARD.encode(encoder.finish().unwrap())
}
