use bytes::Bytes;

/// Bounded per-peer payload history: a ring buffer holding the most recent `capacity` payloads,
///  indexed by `sequence % capacity`.
///
/// Each slot remembers the sequence number it was written for, so a lookup for a sequence that
///  was never stored or has since been overwritten reports `None` instead of returning a
///  different packet's payload.
pub struct PayloadHistory {
    slots: Vec<Option<(u64, Bytes)>>,
}

impl PayloadHistory {
    pub fn new(capacity: usize) -> PayloadHistory {
        assert!(capacity > 0, "history capacity must be positive");

        PayloadHistory {
            slots: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot_index(&self, sequence: u64) -> usize {
        (sequence % self.slots.len() as u64) as usize
    }

    /// the payload is kept byte for byte, it need not be valid UTF-8
    pub fn store(&mut self, sequence: u64, payload: Bytes) {
        let idx = self.slot_index(sequence);
        self.slots[idx] = Some((sequence, payload));
    }

    pub fn get(&self, sequence: u64) -> Option<&[u8]> {
        match &self.slots[self.slot_index(sequence)] {
            Some((stored, payload)) if *stored == sequence => Some(payload.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let history = PayloadHistory::new(4);
        assert_eq!(history.capacity(), 4);
        for seq in 0..8 {
            assert_eq!(history.get(seq), None);
        }
    }

    #[test]
    fn test_store_get() {
        let mut history = PayloadHistory::new(4);
        history.store(0, Bytes::from_static(b"a"));
        history.store(1, Bytes::from_static(b"b"));

        assert_eq!(history.get(0), Some(b"a".as_slice()));
        assert_eq!(history.get(1), Some(b"b".as_slice()));
        assert_eq!(history.get(2), None);
    }

    #[test]
    fn test_overwritten_slot_does_not_alias() {
        let mut history = PayloadHistory::new(4);
        for seq in 0..6 {
            history.store(seq, Bytes::from(format!("p{}", seq)));
        }

        assert_eq!(history.get(0), None);
        assert_eq!(history.get(1), None);
        assert_eq!(history.get(2), Some(b"p2".as_slice()));
        assert_eq!(history.get(5), Some(b"p5".as_slice()));
        // same slot as 5, but never written
        assert_eq!(history.get(9), None);
    }

    #[test]
    fn test_non_utf8_payload_is_kept_verbatim() {
        let mut history = PayloadHistory::new(4);
        history.store(1, Bytes::from_static(&[0xff, 0xfe, b'x']));
        assert_eq!(history.get(1), Some([0xff, 0xfe, b'x'].as_slice()));
    }

    #[test]
    fn test_overwrite_same_sequence() {
        let mut history = PayloadHistory::new(4);
        history.store(3, Bytes::from_static(b"old"));
        history.store(3, Bytes::from_static(b"new"));
        assert_eq!(history.get(3), Some(b"new".as_slice()));
    }
}
