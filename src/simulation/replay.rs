//! Replay of recorded order logs
//!
//! A log is a headerless CSV with one event per line:
//!
//! ```text
//! time_ns,order_id,ENTRY|CANCEL|AMEND,price,Bid|Ask,size
//! ```
//!
//! Order ids are opaque strings of up to 12 bytes; a `<XX>` sequence stands
//! for the byte with hex value `XX`.

use super::recorder::FeatureRecorder;
use crate::data::FeatureFrame;
use crate::error::{Error, Result};
use crate::orderbook::{
    ClientId, MatchingEngine, Notifier, NotifyMessage, OrderEvent, OrderId, Price, Side, Size,
    Time,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Longest order id after unescaping
pub const MAX_ORDER_ID_BYTES: usize = 12;

/// Client id every replayed order is booked under
pub const REPLAY_CLIENT: ClientId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayKind {
    Entry,
    Cancel,
    Amend,
}

impl std::str::FromStr for ReplayKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ENTRY" => Ok(ReplayKind::Entry),
            "CANCEL" => Ok(ReplayKind::Cancel),
            "AMEND" | "AMMEND" => Ok(ReplayKind::Amend),
            other => Err(Error::InvalidInput(format!("unknown event type '{other}'"))),
        }
    }
}

/// One line of an order log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRecord {
    pub time: Time,
    /// Unescaped id bytes
    pub order_id: Vec<u8>,
    pub kind: ReplayKind,
    pub price: Price,
    pub side: Side,
    pub size: Size,
}

/// Unescape `<XX>` hex sequences in an order id
pub fn decode_order_id(raw: &str) -> Result<Vec<u8>> {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len().min(MAX_ORDER_ID_BYTES));
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            let escaped = bytes
                .get(i + 1..i + 4)
                .filter(|s| s[2] == b'>')
                .and_then(|s| std::str::from_utf8(&s[..2]).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                .ok_or_else(|| Error::InvalidInput(format!("bad escape in order id '{raw}'")))?;
            out.push(escaped);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    if out.len() > MAX_ORDER_ID_BYTES {
        return Err(Error::InvalidInput(format!(
            "order id '{raw}' is longer than {MAX_ORDER_ID_BYTES} bytes"
        )));
    }
    Ok(out)
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, line: usize) -> Result<&'a str> {
    record
        .get(idx)
        .ok_or_else(|| Error::parse(line, format!("missing field {}", idx + 1)))
}

fn parse_field<T: std::str::FromStr>(
    record: &csv::StringRecord,
    idx: usize,
    line: usize,
    what: &str,
) -> Result<T> {
    let raw = field(record, idx, line)?;
    raw.parse()
        .map_err(|_| Error::parse(line, format!("cannot parse {what} '{raw}'")))
}

/// Read and check a whole log.
///
/// Fails on an `ENTRY` for an id that is still live, a `CANCEL` for an id
/// never entered, and time going backwards.
pub fn read_records<R: std::io::Read>(reader: R) -> Result<Vec<ReplayRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut live: HashSet<Vec<u8>> = HashSet::new();
    let mut last_time = Time::MIN;
    for result in rdr.records() {
        let row = result?;
        let line = row.position().map_or(0, |p| p.line() as usize);
        if row.len() != 6 {
            return Err(Error::parse(
                line,
                format!("expected 6 fields, found {}", row.len()),
            ));
        }
        let time: Time = parse_field(&row, 0, line, "time")?;
        let order_id =
            decode_order_id(field(&row, 1, line)?).map_err(|e| Error::parse(line, e.to_string()))?;
        let kind: ReplayKind =
            field(&row, 2, line)?.parse().map_err(|e: Error| Error::parse(line, e.to_string()))?;
        let price: Price = parse_field(&row, 3, line, "price")?;
        let side: Side = field(&row, 4, line)?
            .parse()
            .map_err(|e: Error| Error::parse(line, e.to_string()))?;
        let size: Size = parse_field(&row, 5, line, "size")?;

        if time < last_time {
            return Err(Error::parse(
                line,
                format!("time {time} is before the previous event at {last_time}"),
            ));
        }
        last_time = time;

        match kind {
            ReplayKind::Entry => {
                if !live.insert(order_id.clone()) {
                    return Err(Error::parse(
                        line,
                        format!("entry for live order {}", String::from_utf8_lossy(&order_id)),
                    ));
                }
            }
            ReplayKind::Cancel => {
                if !live.remove(&order_id) {
                    return Err(Error::parse(
                        line,
                        format!("cancel for unknown order {}", String::from_utf8_lossy(&order_id)),
                    ));
                }
            }
            ReplayKind::Amend => {}
        }

        records.push(ReplayRecord {
            time,
            order_id,
            kind,
            price,
            side,
            size,
        });
    }
    Ok(records)
}

pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<ReplayRecord>> {
    let file = std::fs::File::open(path.as_ref())?;
    let records = read_records(file)?;
    info!("Loaded {} events from {}", records.len(), path.as_ref().display());
    Ok(records)
}

/// Counters from one replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub records: usize,
    pub entries: usize,
    pub cancels: usize,
    pub amends_skipped: usize,
    /// Cancels that arrived after the order had already traded out
    pub cancels_after_fill: usize,
    /// Trade events, both sides counted
    pub trades: u64,
    pub traded_volume: u64,
    pub resting_at_end: usize,
    pub samples: usize,
}

#[derive(Debug, Default)]
struct TradeCounter {
    trades: u64,
    volume: u64,
}

impl Notifier for TradeCounter {
    fn notify(&mut self, event: &OrderEvent) -> Result<()> {
        if event.kind == NotifyMessage::Trade {
            self.trades += 1;
            self.volume += u64::from(event.traded_size);
        }
        Ok(())
    }
}

/// Feeds log records into a fresh engine and samples features
#[derive(Debug)]
pub struct Replayer {
    engine: MatchingEngine,
    ids: HashMap<Vec<u8>, OrderId>,
    next_id: OrderId,
    interval: Time,
    recorder: Option<FeatureRecorder>,
    counter: TradeCounter,
    summary: ReplaySummary,
}

impl Replayer {
    pub fn new(sample_interval: Time) -> Result<Self> {
        if sample_interval <= 0 {
            return Err(Error::InvalidInput(format!(
                "sampling interval must be positive, got {sample_interval}ns"
            )));
        }
        Ok(Self {
            engine: MatchingEngine::new(),
            ids: HashMap::new(),
            next_id: OrderId::default(),
            interval: sample_interval,
            recorder: None,
            counter: TradeCounter::default(),
            summary: ReplaySummary::default(),
        })
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    /// Apply one record at its timestamp
    pub fn apply(&mut self, record: &ReplayRecord) -> Result<()> {
        if record.time < self.engine.time() {
            return Err(Error::InvalidInput(format!(
                "record at {} is before engine time {}",
                record.time,
                self.engine.time()
            )));
        }
        if self.recorder.is_none() {
            let start = record.time - record.time.rem_euclid(self.interval);
            self.recorder = Some(FeatureRecorder::new(self.interval, start)?);
        }
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.advance_to(record.time, &self.engine);
        }
        self.engine.set_time(record.time);
        self.summary.records += 1;

        match record.kind {
            ReplayKind::Entry => {
                if self.ids.contains_key(&record.order_id) {
                    return Err(Error::Protocol(format!(
                        "entry for live order {}",
                        String::from_utf8_lossy(&record.order_id)
                    )));
                }
                let id = self.next_id;
                self.next_id = id.next();
                self.ids.insert(record.order_id.clone(), id);
                self.engine.add_replay_order(
                    id,
                    REPLAY_CLIENT,
                    record.price,
                    record.size,
                    record.side,
                    false,
                    &mut self.counter,
                )?;
                self.summary.entries += 1;
            }
            ReplayKind::Cancel => {
                let id = self.ids.remove(&record.order_id).ok_or_else(|| {
                    Error::UnknownOrder(String::from_utf8_lossy(&record.order_id).into_owned())
                })?;
                if self.engine.contains(id) {
                    self.engine.cancel_order(id, &mut self.counter)?;
                } else {
                    warn!(
                        "cancel for {} which already traded out",
                        String::from_utf8_lossy(&record.order_id)
                    );
                    self.summary.cancels_after_fill += 1;
                }
                self.summary.cancels += 1;
            }
            ReplayKind::Amend => {
                debug!("skipping amend at {}", record.time);
                self.summary.amends_skipped += 1;
            }
        }
        Ok(())
    }

    /// Sample up to `end` (if given) and hand back the features
    pub fn finish(mut self, end: Option<Time>) -> (FeatureFrame, ReplaySummary) {
        let end = end.unwrap_or_else(|| self.engine.time() + 1);
        let frame = match self.recorder.take() {
            Some(mut recorder) => {
                recorder.advance_to(end, &self.engine);
                recorder.finish()
            }
            None => FeatureFrame::new(),
        };
        self.summary.trades = self.counter.trades;
        self.summary.traded_volume = self.counter.volume;
        self.summary.resting_at_end = self.engine.num_orders();
        self.summary.samples = frame.len();
        (frame, self.summary)
    }
}

/// Replay a whole log
pub fn replay(records: &[ReplayRecord], sample_interval: Time) -> Result<(FeatureFrame, ReplaySummary)> {
    let mut replayer = Replayer::new(sample_interval)?;
    for record in records {
        replayer.apply(record)?;
    }
    let (frame, summary) = replayer.finish(None);
    info!(
        "Replayed {} events: {} trades, {} samples",
        summary.records, summary.trades, summary.samples
    );
    Ok((frame, summary))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
# time_ns,order_id,type,price,side,size
0,A1,ENTRY,100,Bid,5
1000,B<0a>2,ENTRY,102,Ask,3
2000,C3,ENTRY,100,Ask,2
2500,C3,AMEND,100,Ask,1
3000,A1,CANCEL,100,Bid,3
";

    #[test]
    fn test_decode_order_id() {
        assert_eq!(decode_order_id("ab").unwrap(), b"ab".to_vec());
        assert_eq!(decode_order_id("a<ff><00>").unwrap(), vec![b'a', 0xff, 0]);
        assert!(decode_order_id("a<f").is_err());
        assert!(decode_order_id("a<zz>").is_err());
        assert!(decode_order_id("0123456789abc").is_err());
    }

    #[test]
    fn test_read_records() {
        let records = read_records(LOG.as_bytes()).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[1].order_id, vec![b'B', 0x0a, b'2']);
        assert_eq!(records[1].side, Side::Offer);
        assert_eq!(records[3].kind, ReplayKind::Amend);
    }

    #[test]
    fn test_log_consistency_checks() {
        let twice = "0,A,ENTRY,100,Bid,5\n1,A,ENTRY,100,Bid,5\n";
        assert!(matches!(
            read_records(twice.as_bytes()),
            Err(Error::Parse { line: 2, .. })
        ));
        let unknown = "0,A,CANCEL,100,Bid,5\n";
        assert!(read_records(unknown.as_bytes()).is_err());
        let backwards = "5,A,ENTRY,100,Bid,5\n1,B,ENTRY,100,Bid,5\n";
        assert!(read_records(backwards.as_bytes()).is_err());
        let short = "0,A,ENTRY,100,Bid\n";
        assert!(read_records(short.as_bytes()).is_err());
    }

    #[test]
    fn test_replay_trades_and_late_cancel() {
        let records = read_records(LOG.as_bytes()).unwrap();
        let (frame, summary) = replay(&records, 1000).unwrap();
        assert_eq!(summary.entries, 3);
        assert_eq!(summary.amends_skipped, 1);
        // C3 takes 2 from A1 at 100
        assert_eq!(summary.trades, 2);
        assert_eq!(summary.traded_volume, 4);
        assert_eq!(summary.cancels, 1);
        assert_eq!(summary.cancels_after_fill, 0);
        assert_eq!(summary.resting_at_end, 1);
        // samples at 0, 1000, 2000, 3000
        assert_eq!(frame.len(), 4);
        let rows = frame.rows();
        assert_eq!(rows[1].c1, 5.0);
        assert_eq!((rows[2].c1, rows[2].c2), (3.0, 3.0));
        // A1 cancelled: only the offer is left
        assert_eq!((rows[3].c1, rows[3].c2), (0.0, 3.0));
        assert!(rows[3].x.is_nan());
    }

    #[test]
    fn test_cancel_after_fill_is_counted() {
        let log = "0,A,ENTRY,100,Bid,2\n1,B,ENTRY,100,Ask,2\n2,A,CANCEL,100,Bid,2\n";
        let records = read_records(log.as_bytes()).unwrap();
        let (_, summary) = replay(&records, 1).unwrap();
        assert_eq!(summary.cancels_after_fill, 1);
        assert_eq!(summary.resting_at_end, 0);
    }
}
