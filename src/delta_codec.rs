//! Binary delta primitive used by delta patches.

use crate::binary_diff::{self, DEFAULT_BLOCK_SIZE};
use crate::binary_patch;
use crate::error::DeltaError;
use crate::patch_format::{DeltaFrame, MAGIC, ZSTD_LEVEL};
use crate::util;

/// `apply(base, diff(base, target)) == target` for any base and target.
pub trait DeltaCodec: Send + Sync {
    fn diff(&self, base: &[u8], target: &[u8]) -> Result<Vec<u8>, DeltaError>;

    /// Fails if `delta` was not produced against `base`.
    fn apply(&self, base: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError>;
}

/// Block-matching delta: bincode chunk list, zstd compressed, framed by
/// [`MAGIC`] and the blake3 digests of base and target.
#[derive(Debug, Clone, Copy)]
pub struct BlockDelta {
    block_size: usize,
    level: i32,
}

impl Default for BlockDelta {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            level: ZSTD_LEVEL,
        }
    }
}

impl BlockDelta {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }
}

impl DeltaCodec for BlockDelta {
    fn diff(&self, base: &[u8], target: &[u8]) -> Result<Vec<u8>, DeltaError> {
        let frame = DeltaFrame {
            base_blake3: util::hash_bytes(base),
            target_blake3: util::hash_bytes(target),
            target_len: target.len() as u64,
            chunks: binary_diff::compute_diff(base, target, self.block_size),
        };

        let encoded = bincode::serialize(&frame).map_err(|e| DeltaError::Encode(e.to_string()))?;
        let compressed = zstd::bulk::compress(&encoded, self.level)
            .map_err(|e| DeltaError::Encode(e.to_string()))?;

        let mut out = Vec::with_capacity(MAGIC.len() + compressed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    fn apply(&self, base: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError> {
        if delta.len() < MAGIC.len() || &delta[..MAGIC.len()] != MAGIC {
            return Err(DeltaError::BadMagic);
        }

        let decoder = zstd::Decoder::new(&delta[MAGIC.len()..])
            .map_err(|e| DeltaError::Decode(e.to_string()))?;
        let frame: DeltaFrame =
            bincode::deserialize_from(decoder).map_err(|e| DeltaError::Decode(e.to_string()))?;

        let base_hash = util::hash_bytes(base);
        if base_hash != frame.base_blake3 {
            return Err(DeltaError::BaseMismatch {
                expected: util::to_hex(&frame.base_blake3),
                actual: util::to_hex(&base_hash),
            });
        }

        let result = binary_patch::apply_diff(base, &frame.chunks)?;
        if result.len() as u64 != frame.target_len
            || util::hash_bytes(&result) != frame.target_blake3
        {
            return Err(DeltaError::TargetMismatch);
        }
        Ok(result)
    }
}
