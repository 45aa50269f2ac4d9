//! Hook for observing upstream sequence gaps.
//!
//! The registry never resynchronises a book on its own. A detector only
//! reports; the registry logs and counts what it reports.

/// A discontinuity in the upstream sequence numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceGap {
    pub instrument: String,
    pub expected: u64,
    pub actual: u64,
}

/// Called once per routed book batch with the envelope sequence number, if
/// the frame carried one.
pub trait GapDetector: Send {
    fn observe(&mut self, instrument: &str, upstream_sequence: Option<u64>) -> Option<SequenceGap>;
}

/// Default detector: reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoGapDetection;

impl GapDetector for NoGapDetection {
    fn observe(&mut self, _instrument: &str, _upstream_sequence: Option<u64>) -> Option<SequenceGap> {
        None
    }
}

/// Reports when the envelope `sequence_num` is not contiguous.
///
/// Envelope numbers are per connection, not per product, so the detector
/// tracks a single counter. Several events from the same frame share a number
/// and are not reported. A reconnect restarts upstream numbering, which shows
/// up as one reported gap.
#[derive(Debug, Default, Clone)]
pub struct SequenceGapDetector {
    last: Option<u64>,
}

impl SequenceGapDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GapDetector for SequenceGapDetector {
    fn observe(&mut self, instrument: &str, upstream_sequence: Option<u64>) -> Option<SequenceGap> {
        let actual = upstream_sequence?;
        let previous = self.last.replace(actual);

        match previous {
            Some(last) => {
                let expected = last.wrapping_add(1);
                if actual == last || actual == expected {
                    None
                } else {
                    Some(SequenceGap {
                        instrument: instrument.to_string(),
                        expected,
                        actual,
                    })
                }
            }
            None => None,
        }
    }
}
