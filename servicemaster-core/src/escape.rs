//! Escape-sequence capture
//!
//! After a lone ESC the dispatcher feeds the following characters into an
//! [`EscapeDecoder`] until the sequence completes, overflows or times out.
//! Time comes from an injected [`Clock`] so tests can drive it by hand.

use std::time::{Duration, Instant};

use crate::unit::UnitOp;

/// Bounded wait for the next byte of a sequence
pub const ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// A lone ESC earlier than this after startup is ignored instead of quitting
pub const ESCAPE_GRACE: Duration = Duration::from_millis(300);

/// Longest sequence accepted after the ESC itself
pub const MAX_SEQUENCE_LEN: usize = 9;

/// Legacy function-key sequences (rxvt/xterm-R6 style)
const LEGACY_SEQUENCES: &[(&str, UnitOp)] = &[
    ("[11~", UnitOp::Start),
    ("[12~", UnitOp::Stop),
    ("[13~", UnitOp::Restart),
    ("[14~", UnitOp::Enable),
];

/// Source of monotonic time, as an offset from an arbitrary origin
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Result of feeding one character
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EscapeStep {
    /// Sequence not finished yet
    Pending,
    Resolved(UnitOp),
    /// Sequence finished (or overflowed) without matching anything
    Unrecognized,
}

/// Operation bound to a complete legacy sequence
pub fn legacy_op(sequence: &str) -> Option<UnitOp> {
    LEGACY_SEQUENCES
        .iter()
        .find(|(seq, _)| *seq == sequence)
        .map(|(_, op)| *op)
}

#[derive(Clone, Debug, Default)]
pub struct EscapeDecoder {
    buf: String,
    deadline: Option<Duration>,
}

impl EscapeDecoder {
    /// Start capturing after an ESC seen at `now`
    pub fn begin(&mut self, now: Duration) {
        self.buf.clear();
        self.deadline = Some(now + ESCAPE_TIMEOUT);
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the capture gives up waiting
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Bytes captured so far
    pub fn captured(&self) -> &str {
        &self.buf
    }

    pub fn expired(&self, now: Duration) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    pub fn cancel(&mut self) {
        self.buf.clear();
        self.deadline = None;
    }

    /// Feed the next character; each byte re-arms the timeout
    pub fn feed(&mut self, ch: char, now: Duration) -> EscapeStep {
        if !self.is_active() {
            return EscapeStep::Unrecognized;
        }
        self.buf.push(ch);
        if ch == '~' || self.buf.chars().count() >= MAX_SEQUENCE_LEN {
            let step = match legacy_op(&self.buf) {
                Some(op) => EscapeStep::Resolved(op),
                None => EscapeStep::Unrecognized,
            };
            self.cancel();
            return step;
        }
        self.deadline = Some(now + ESCAPE_TIMEOUT);
        EscapeStep::Pending
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;

    fn feed_all(dec: &mut EscapeDecoder, clock: &ManualClock, s: &str) -> Vec<EscapeStep> {
        s.chars()
            .map(|ch| {
                clock.advance(Duration::from_millis(5));
                dec.feed(ch, clock.now())
            })
            .collect()
    }

    #[test]
    fn test_legacy_sequences_resolve() {
        let clock = ManualClock::default();
        let mut dec = EscapeDecoder::default();
        for (seq, op) in [
            ("[11~", UnitOp::Start),
            ("[12~", UnitOp::Stop),
            ("[13~", UnitOp::Restart),
            ("[14~", UnitOp::Enable),
        ] {
            dec.begin(clock.now());
            let steps = feed_all(&mut dec, &clock, seq);
            assert_eq!(steps.last(), Some(&EscapeStep::Resolved(op)));
            assert!(!dec.is_active());
        }
    }

    #[test]
    fn test_unknown_sequence_is_unrecognized() {
        let clock = ManualClock::default();
        let mut dec = EscapeDecoder::default();
        dec.begin(clock.now());
        let steps = feed_all(&mut dec, &clock, "[15~");
        assert_eq!(
            steps,
            [
                EscapeStep::Pending,
                EscapeStep::Pending,
                EscapeStep::Pending,
                EscapeStep::Unrecognized
            ]
        );
    }

    #[test]
    fn test_overflow_stops_capture() {
        let clock = ManualClock::default();
        let mut dec = EscapeDecoder::default();
        dec.begin(clock.now());
        let steps = feed_all(&mut dec, &clock, "[123456789");
        assert_eq!(steps[MAX_SEQUENCE_LEN - 1], EscapeStep::Unrecognized);
        assert!(!dec.is_active());
    }

    #[test]
    fn test_timeout_rearms_per_byte() {
        let clock = ManualClock::at(Duration::from_secs(1));
        let mut dec = EscapeDecoder::default();
        dec.begin(clock.now());
        assert!(!dec.expired(clock.now()));

        clock.advance(Duration::from_millis(40));
        assert_eq!(dec.feed('[', clock.now()), EscapeStep::Pending);
        clock.advance(Duration::from_millis(40));
        assert!(!dec.expired(clock.now()));

        clock.advance(ESCAPE_TIMEOUT);
        assert!(dec.expired(clock.now()));
        assert_eq!(dec.captured(), "[");
    }
}
