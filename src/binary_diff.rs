use std::collections::HashMap;

use crate::patch_format::DiffChunk;
use crate::rolling_hash::RollingHash;

pub const DEFAULT_BLOCK_SIZE: usize = 256;

struct BlockSignature {
    rolling_hash: u32,
    strong_hash: blake3::Hash,
    offset: u64,
}

/// Compute the chunks that rebuild `target` from `base`.
///
/// Block matching in the style of rsync:
/// 1. Split base into fixed-size blocks and index them by rolling hash
/// 2. Slide a window over target, confirming rolling-hash hits with blake3
/// 3. Emit Copy chunks for matched blocks and Insert chunks for the bytes between
///
/// Consecutive copies of adjacent base blocks are merged into one chunk.
pub fn compute_diff(base: &[u8], target: &[u8], block_size: usize) -> Vec<DiffChunk> {
    if target.is_empty() {
        return vec![];
    }
    if base.is_empty() || target.len() < block_size {
        return vec![DiffChunk::Insert {
            data: target.to_vec(),
        }];
    }

    let signatures = build_signatures(base, block_size);
    let index = build_index(&signatures);
    match_blocks(target, block_size, &index, &signatures)
}

fn build_signatures(data: &[u8], block_size: usize) -> Vec<BlockSignature> {
    data.chunks(block_size)
        .enumerate()
        .map(|(i, block)| BlockSignature {
            rolling_hash: RollingHash::new(block).digest(),
            strong_hash: blake3::hash(block),
            offset: (i * block_size) as u64,
        })
        .collect()
}

fn build_index(signatures: &[BlockSignature]) -> HashMap<u32, Vec<usize>> {
    let mut index: HashMap<u32, Vec<usize>> = HashMap::with_capacity(signatures.len());
    for (idx, sig) in signatures.iter().enumerate() {
        index.entry(sig.rolling_hash).or_default().push(idx);
    }
    index
}

fn match_blocks(
    target: &[u8],
    block_size: usize,
    index: &HashMap<u32, Vec<usize>>,
    signatures: &[BlockSignature],
) -> Vec<DiffChunk> {
    let mut chunks: Vec<DiffChunk> = Vec::new();
    let mut pending: Vec<u8> = Vec::new();
    let mut rolling = RollingHash::new(&target[..block_size]);
    let mut pos: usize = 0;

    while pos + block_size <= target.len() {
        let window = &target[pos..pos + block_size];

        if let Some(offset) = find_match(rolling.digest(), window, index, signatures) {
            if !pending.is_empty() {
                chunks.push(DiffChunk::Insert {
                    data: std::mem::take(&mut pending),
                });
            }
            push_copy(&mut chunks, offset, block_size as u64);

            pos += block_size;
            if pos + block_size <= target.len() {
                rolling = RollingHash::new(&target[pos..pos + block_size]);
            }
        } else {
            pending.push(target[pos]);
            pos += 1;
            if pos + block_size <= target.len() {
                rolling.roll(target[pos - 1], target[pos + block_size - 1]);
            }
        }
    }

    // Tail shorter than a block
    pending.extend_from_slice(&target[pos..]);
    if !pending.is_empty() {
        chunks.push(DiffChunk::Insert { data: pending });
    }

    chunks
}

fn push_copy(chunks: &mut Vec<DiffChunk>, offset: u64, length: u64) {
    if let Some(DiffChunk::Copy {
        offset: prev_offset,
        length: prev_length,
    }) = chunks.last_mut()
    {
        if *prev_offset + *prev_length == offset {
            *prev_length += length;
            return;
        }
    }
    chunks.push(DiffChunk::Copy { offset, length });
}

/// Base offset of a full block equal to `window`.
fn find_match(
    rolling_digest: u32,
    window: &[u8],
    index: &HashMap<u32, Vec<usize>>,
    signatures: &[BlockSignature],
) -> Option<u64> {
    let candidates = index.get(&rolling_digest)?;
    let strong = blake3::hash(window);
    candidates
        .iter()
        .map(|&idx| &signatures[idx])
        .find(|sig| sig.strong_hash == strong)
        .map(|sig| sig.offset)
}
