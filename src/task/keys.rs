//! Pending-index key layout
//!
//! Pending entries live under `todo ! <queue-name> ! <seq8>`. With the
//! fixed-width big-endian sequence encoding, an ascending scan of the
//! whole partition yields pending work ordered by queue name then
//! sequence, and a `todo!<name>!` prefix scan yields one queue's backlog
//! in enqueue order.

use crate::feed::{decode_sequence, encode_sequence, Sequence, SEQUENCE_KEY_LEN};
use crate::task::error::{TaskError, TaskResult};

const SEPARATOR: u8 = b'!';
const TODO_TAG: &[u8] = b"todo";

/// Queue names are key components: non-empty, no separator byte.
pub(crate) fn validate_queue_name(name: &str) -> TaskResult<()> {
    if name.is_empty() || name.bytes().any(|byte| byte == SEPARATOR) {
        return Err(TaskError::InvalidQueueName {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// `todo!` - prefix covering every queue's pending entries.
pub(crate) fn pending_root() -> Vec<u8> {
    let mut key = TODO_TAG.to_vec();
    key.push(SEPARATOR);
    key
}

/// `todo!<queue>!` - prefix covering one queue's pending entries.
pub(crate) fn pending_prefix(queue: &str) -> Vec<u8> {
    let mut key = pending_root();
    key.extend_from_slice(queue.as_bytes());
    key.push(SEPARATOR);
    key
}

/// `todo!<queue>!<seq8>` - one pending entry.
pub(crate) fn pending_key(queue: &str, sequence: Sequence) -> Vec<u8> {
    let mut key = pending_prefix(queue);
    key.extend_from_slice(&encode_sequence(sequence));
    key
}

/// Parse a pending-entry key back into queue name and sequence.
///
/// The sequence is the fixed-width tail, so queue names never need
/// escaping beyond the separator restriction.
pub(crate) fn parse_pending_key(key: &[u8]) -> TaskResult<(String, Sequence)> {
    let corrupt = || TaskError::Codec {
        message: format!("malformed pending index key: {:?}", key),
    };

    let root = pending_root();
    let rest = key.strip_prefix(root.as_slice()).ok_or_else(corrupt)?;
    if rest.len() < SEQUENCE_KEY_LEN + 1 {
        return Err(corrupt());
    }
    let (queue_part, seq_part) = rest.split_at(rest.len() - SEQUENCE_KEY_LEN);
    let queue = queue_part.strip_suffix(&[SEPARATOR]).ok_or_else(corrupt)?;
    let queue = String::from_utf8(queue.to_vec()).map_err(|_| corrupt())?;
    let sequence = decode_sequence(seq_part)?;
    Ok((queue, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_queue_name() {
        assert!(validate_queue_name("mail").is_ok());
        assert!(validate_queue_name("mail-out.2").is_ok());
        assert!(validate_queue_name("").is_err());
        assert!(validate_queue_name("bad!name").is_err());
    }

    #[test]
    fn test_key_roundtrip() {
        let key = pending_key("wait", 42);
        assert!(key.starts_with(b"todo!wait!"));
        assert_eq!(parse_pending_key(&key).unwrap(), ("wait".to_string(), 42));
    }

    #[test]
    fn test_keys_sort_by_queue_then_sequence() {
        let mut keys = vec![
            pending_key("b", 1),
            pending_key("a", 300),
            pending_key("a", 2),
            pending_key("b", 256),
        ];
        keys.sort();
        assert_eq!(parse_pending_key(&keys[0]).unwrap(), ("a".to_string(), 2));
        assert_eq!(parse_pending_key(&keys[1]).unwrap(), ("a".to_string(), 300));
        assert_eq!(parse_pending_key(&keys[2]).unwrap(), ("b".to_string(), 1));
        assert_eq!(parse_pending_key(&keys[3]).unwrap(), ("b".to_string(), 256));
    }

    #[test]
    fn test_queue_prefix_does_not_capture_name_extensions() {
        // "mail" prefix must not match "mailer" entries
        let key = pending_key("mailer", 1);
        assert!(!key.starts_with(pending_prefix("mail").as_slice()));
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        assert!(parse_pending_key(b"done!wait!12345678").is_err());
        assert!(parse_pending_key(b"todo!short").is_err());
    }
}
