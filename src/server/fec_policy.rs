use crate::error::MissingHistoryError;
use crate::server::payload_history::PayloadHistory;

/// Decides whether a received packet triggers a synthetic recovery packet. Recovery is not a
///  real erasure code: it replays the payload received `lookback` packets earlier.
#[derive(Debug, Clone, Copy)]
pub struct FecPolicy {
    pub enabled: bool,
    pub interval: u64,
    pub lookback: u64,
}

impl FecPolicy {
    /// `sequence` is the peer's sequence number *before* it is incremented for the packet that
    ///  was just received
    pub fn should_emit(&self, sequence: u64) -> bool {
        self.enabled && sequence > 0 && sequence % self.interval == 0
    }

    pub fn recovery_payload<'a>(&self, history: &'a PayloadHistory, sequence: u64) -> Result<&'a [u8], MissingHistoryError> {
        let missing = MissingHistoryError { sequence, lookback: self.lookback };

        let source = sequence.checked_sub(self.lookback)
            .ok_or(missing)?;
        history.get(source)
            .ok_or(missing)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use rstest::rstest;
    use super::*;

    fn policy(enabled: bool) -> FecPolicy {
        FecPolicy { enabled, interval: 4, lookback: 3 }
    }

    #[rstest]
    #[case::zero(true, 0, false)]
    #[case::one(true, 1, false)]
    #[case::three(true, 3, false)]
    #[case::four(true, 4, true)]
    #[case::five(true, 5, false)]
    #[case::eight(true, 8, true)]
    #[case::twenty(true, 20, true)]
    #[case::disabled_four(false, 4, false)]
    #[case::disabled_eight(false, 8, false)]
    fn test_should_emit(#[case] enabled: bool, #[case] sequence: u64, #[case] expected: bool) {
        assert_eq!(policy(enabled).should_emit(sequence), expected);
    }

    #[test]
    fn test_recovery_payload() {
        let mut history = PayloadHistory::new(8);
        for seq in 0..5 {
            history.store(seq, Bytes::from(format!("p{}", seq)));
        }

        assert_eq!(policy(true).recovery_payload(&history, 4), Ok(b"p1".as_slice()));
        assert_eq!(policy(true).recovery_payload(&history, 3), Ok(b"p0".as_slice()));
    }

    #[test]
    fn test_recovery_payload_missing() {
        let mut history = PayloadHistory::new(8);
        history.store(4, Bytes::from_static(b"p4"));

        assert_eq!(policy(true).recovery_payload(&history, 4), Err(MissingHistoryError { sequence: 4, lookback: 3 }));
    }

    #[test]
    fn test_recovery_payload_before_start() {
        let history = PayloadHistory::new(8);
        assert!(policy(true).recovery_payload(&history, 2).is_err());
    }
}
