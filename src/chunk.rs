//! Batch payload chunking

use crate::error::ApiError;

/// Split a slice into consecutive batches of at most `size` elements
///
/// Every batch except possibly the last has exactly `size` elements, and
/// concatenating the batches in order reproduces the input. The iterator
/// is lazy and holds no state between full iterations; re-invoke with the
/// same inputs to restart. A size of zero is refused.
pub fn sync_chunks<T>(items: &[T], size: usize) -> Result<impl Iterator<Item = &[T]>, ApiError> {
    if size == 0 {
        return Err(ApiError::InvalidChunkSize);
    }

    Ok(items.chunks(size))
}
