use crate::error::DeltaError;
use crate::patch_format::DiffChunk;

/// Rebuild the target from base data and a chunk list.
pub fn apply_diff(base: &[u8], chunks: &[DiffChunk]) -> Result<Vec<u8>, DeltaError> {
    let estimated_size: u64 = chunks
        .iter()
        .map(|c| match c {
            DiffChunk::Copy { length, .. } => *length,
            DiffChunk::Insert { data } => data.len() as u64,
        })
        .sum();

    let mut result = Vec::with_capacity(estimated_size as usize);

    for chunk in chunks {
        match chunk {
            DiffChunk::Copy { offset, length } => {
                let range = offset
                    .checked_add(*length)
                    .filter(|end| *end <= base.len() as u64)
                    .map(|end| *offset as usize..end as usize)
                    .ok_or(DeltaError::OutOfBounds {
                        offset: *offset,
                        length: *length,
                        base_len: base.len(),
                    })?;
                result.extend_from_slice(&base[range]);
            }
            DiffChunk::Insert { data } => {
                result.extend_from_slice(data);
            }
        }
    }

    Ok(result)
}
