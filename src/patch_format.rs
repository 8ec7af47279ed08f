use serde::{Deserialize, Serialize};

/// Leading bytes of every delta produced by [`crate::delta_codec::BlockDelta`].
pub const MAGIC: &[u8; 8] = b"APDELTA1";
/// zstd level for the encoded chunk list.
pub const ZSTD_LEVEL: i32 = 19;

/// Decoded delta body.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeltaFrame {
    pub base_blake3: [u8; 32],
    pub target_blake3: [u8; 32],
    pub target_len: u64,
    pub chunks: Vec<DiffChunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffChunk {
    Copy { offset: u64, length: u64 },
    Insert { data: Vec<u8> },
}
