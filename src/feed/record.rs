//! Feed records and sequence-number encoding

use crate::feed::error::{FeedError, FeedResult};

/// Monotonic record identifier assigned by the feed at append time.
/// Sequence numbers start at 1.
pub type Sequence = u64;

/// Width of an encoded sequence number in store keys.
pub const SEQUENCE_KEY_LEN: usize = 8;

/// Fixed-width big-endian encoding, so lexicographic key order equals
/// numeric sequence order.
pub fn encode_sequence(sequence: Sequence) -> [u8; SEQUENCE_KEY_LEN] {
    sequence.to_be_bytes()
}

pub fn decode_sequence(bytes: &[u8]) -> FeedResult<Sequence> {
    let array: [u8; SEQUENCE_KEY_LEN] =
        bytes
            .try_into()
            .map_err(|_| FeedError::Corrupt {
                message: format!("sequence key has {} bytes, expected {}", bytes.len(), SEQUENCE_KEY_LEN),
            })?;
    Ok(Sequence::from_be_bytes(array))
}

/// One immutable feed record: the assigned sequence plus the serialized
/// payload exactly as appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRecord {
    pub sequence: Sequence,
    pub payload: Vec<u8>,
}
