//! Periodic feature sampling from a live book

use crate::data::{FeatureFrame, FeatureRow};
use crate::error::{Error, Result};
use crate::orderbook::{time_to_secs, MatchingEngine, Side, Time};

/// Samples `t x c1 c2 b a` every `interval` nanoseconds.
///
/// A sample at time `s` sees every event stamped at or before `s`: call
/// [`FeatureRecorder::advance_to`] with the time of the next event before
/// applying it.
#[derive(Debug, Clone)]
pub struct FeatureRecorder {
    interval: Time,
    next_sample: Time,
    frame: FeatureFrame,
}

impl FeatureRecorder {
    pub fn new(interval: Time, start: Time) -> Result<Self> {
        if interval <= 0 {
            return Err(Error::InvalidInput(format!(
                "sampling interval must be positive, got {interval}ns"
            )));
        }
        Ok(Self {
            interval,
            next_sample: start,
            frame: FeatureFrame::new(),
        })
    }

    /// Record every sample due strictly before `time`
    pub fn advance_to(&mut self, time: Time, engine: &MatchingEngine) {
        if self.next_sample >= time {
            return;
        }
        let wm = engine.wm();
        let l2 = engine.level2(1);
        let bid_size = l2.bids.first().map_or(0, |&(_, s)| s);
        let ask_size = l2.asks.first().map_or(0, |&(_, s)| s);
        let bid_created = engine.front_order(Side::Bid).map(|o| o.creation_time);
        let ask_created = engine.front_order(Side::Offer).map(|o| o.creation_time);
        let age = |created: Option<Time>, now: Time| {
            created.map_or(f64::NAN, |c| time_to_secs(now - c))
        };
        while self.next_sample < time {
            let now = self.next_sample;
            self.frame.push(FeatureRow {
                t: time_to_secs(now),
                x: wm,
                c1: bid_size as f64,
                c2: ask_size as f64,
                b: age(bid_created, now),
                a: age(ask_created, now),
            });
            self.next_sample += self.interval;
        }
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    pub fn frame(&self) -> &FeatureFrame {
        &self.frame
    }

    pub fn finish(self) -> FeatureFrame {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{NoopNotifier, NANOS_PER_SEC};

    #[test]
    fn test_samples_reflect_book_between_events() {
        let mut eng = MatchingEngine::new();
        let mut rec = FeatureRecorder::new(NANOS_PER_SEC, 0).unwrap();

        rec.advance_to(0, &eng);
        eng.add_simulation_order(0, 100, 4, 4, Side::Bid, false, &mut NoopNotifier)
            .unwrap();
        let t = 2 * NANOS_PER_SEC + 1;
        rec.advance_to(t, &eng);
        eng.set_time(t);
        eng.add_simulation_order(1, 102, 4, 4, Side::Offer, false, &mut NoopNotifier)
            .unwrap();
        rec.advance_to(5 * NANOS_PER_SEC, &eng);

        let frame = rec.finish();
        assert_eq!(frame.len(), 5);
        let rows = frame.rows();
        // one-sided book
        assert!(rows[0].x.is_nan());
        assert_eq!(rows[2].c1, 4.0);
        assert_eq!(rows[2].b, 2.0);
        assert!(rows[2].a.is_nan());
        // both sides after t
        assert_eq!(rows[3].t, 3.0);
        assert_eq!(rows[3].x, 101.0);
        assert_eq!(rows[4].b, 4.0);
        assert!((rows[4].a - (4.0 - time_to_secs(t))).abs() < 1e-12);
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(FeatureRecorder::new(0, 0).is_err());
    }
}
