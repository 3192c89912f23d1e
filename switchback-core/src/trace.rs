//! Decision trace consumer.
//!
//! The trace is the external bandwidth/loss signal driving the simulation:
//! whitespace-separated non-negative integers, one rung index per tick,
//! consumed strictly in order with no lookback. A trace that runs out
//! before the input does, or that contains a malformed or out-of-range
//! entry, is fatal: clamping or reuse would silently desynchronize the
//! sender and receiver state machines.

use std::io::BufRead;

/// Errors from trace consumption.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Frames remain in the input but the trace is spent.
    #[error("decision trace exhausted at tick {tick}")]
    Exhausted { tick: u64 },

    /// Non-numeric or out-of-range trace entry.
    #[error("invalid trace entry {entry:?} at tick {tick}: {reason}")]
    InvalidEntry {
        tick: u64,
        entry: String,
        reason: String,
    },

    #[error("trace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Streams rung selections out of a trace, one per tick.
pub struct DecisionTrace<R: BufRead> {
    reader: R,
    rung_count: usize,
    tick: u64,
}

impl<R: BufRead> DecisionTrace<R> {
    /// `rung_count` bounds valid entries: an index `>= rung_count` is
    /// rejected as invalid rather than clamped.
    pub fn new(reader: R, rung_count: usize) -> Self {
        Self {
            reader,
            rung_count,
            tick: 0,
        }
    }

    /// Returns the rung selection for the next tick.
    ///
    /// # Errors
    /// - `TraceError::Exhausted` - no entries remain
    /// - `TraceError::InvalidEntry` - malformed or out-of-range entry
    /// - `TraceError::Io` - underlying read failed
    pub fn next_selection(&mut self) -> Result<usize, TraceError> {
        let token = match self.next_token()? {
            Some(token) => token,
            None => return Err(TraceError::Exhausted { tick: self.tick }),
        };

        let rung: usize = token.parse().map_err(|_| TraceError::InvalidEntry {
            tick: self.tick,
            entry: token.clone(),
            reason: "not a non-negative integer".to_string(),
        })?;

        if rung >= self.rung_count {
            return Err(TraceError::InvalidEntry {
                tick: self.tick,
                entry: token,
                reason: format!("rung index out of range (ladder has {})", self.rung_count),
            });
        }

        self.tick += 1;
        Ok(rung)
    }

    /// Ticks consumed so far.
    pub fn ticks_consumed(&self) -> u64 {
        self.tick
    }

    /// Scans the next whitespace-delimited token without reading past it.
    fn next_token(&mut self) -> Result<Option<String>, TraceError> {
        let mut token = Vec::new();

        loop {
            let buf = self.reader.fill_buf()?;
            if buf.is_empty() {
                // EOF: a partially collected token still counts.
                return if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(String::from_utf8_lossy(&token).into_owned()))
                };
            }

            let mut consumed = 0;
            for &byte in buf {
                if byte.is_ascii_whitespace() {
                    consumed += 1;
                    if token.is_empty() {
                        continue;
                    }
                    self.reader.consume(consumed);
                    return Ok(Some(String::from_utf8_lossy(&token).into_owned()));
                }
                token.push(byte);
                consumed += 1;
            }
            self.reader.consume(consumed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;

    fn trace(text: &str, rung_count: usize) -> DecisionTrace<Cursor<&str>> {
        DecisionTrace::new(Cursor::new(text), rung_count)
    }

    #[test]
    fn reads_entries_in_order() {
        let mut trace = trace("0 1\n1 0\t1", 2);
        let mut selections = Vec::new();
        while let Ok(rung) = trace.next_selection() {
            selections.push(rung);
        }
        assert_eq!(selections, vec![0, 1, 1, 0, 1]);
        assert_eq!(trace.ticks_consumed(), 5);
    }

    #[test]
    fn exhaustion_reports_tick() {
        let mut trace = trace("0 1", 2);
        trace.next_selection().unwrap();
        trace.next_selection().unwrap();
        assert!(matches!(
            trace.next_selection(),
            Err(TraceError::Exhausted { tick: 2 })
        ));
    }

    #[test]
    fn empty_trace_is_exhausted_at_tick_zero() {
        let mut trace = trace("   \n ", 2);
        assert!(matches!(
            trace.next_selection(),
            Err(TraceError::Exhausted { tick: 0 })
        ));
    }

    #[test]
    fn rejects_non_numeric_entry() {
        let mut trace = trace("0 high 1", 2);
        trace.next_selection().unwrap();
        let err = trace.next_selection().unwrap_err();
        match err {
            TraceError::InvalidEntry { tick, entry, .. } => {
                assert_eq!(tick, 1);
                assert_eq!(entry, "high");
            }
            other => panic!("expected InvalidEntry, got {other:?}"),
        }
    }

    #[test]
    fn rejects_out_of_range_rung() {
        let mut trace = trace("2", 2);
        assert!(matches!(
            trace.next_selection(),
            Err(TraceError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn rejects_negative_entry() {
        let mut trace = trace("-1", 2);
        assert!(matches!(
            trace.next_selection(),
            Err(TraceError::InvalidEntry { .. })
        ));
    }

    proptest! {
        #[test]
        fn parses_any_valid_trace(entries in prop::collection::vec(0usize..4, 0..64)) {
            let text = entries
                .iter()
                .map(usize::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            let mut trace = DecisionTrace::new(Cursor::new(text), 4);

            for &expected in &entries {
                prop_assert_eq!(trace.next_selection().unwrap(), expected);
            }
            let end = trace.next_selection();
            prop_assert!(
                matches!(end, Err(TraceError::Exhausted { .. })),
                "expected exhaustion, got {end:?}"
            );
        }
    }
}
