//! Events exposed to off-chain observers.
//!
//! The event stream is the only durable, externally observable output of the
//! engine. Frontends and indexers rebuild balances, order lists and price
//! history by replaying it, so every committed state change emits exactly
//! the events needed to reconstruct it.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AccountId, Amount, DexError, OrderId, PoolId, Result, TokenId};

/// A single externally observable fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DexEvent {
    /// The registry created a pool for a new pair.
    PoolCreated {
        pool: PoolId,
        token0: TokenId,
        token1: TokenId,
    },
    /// LP shares minted against a deposit.
    PoolMinted {
        pool: PoolId,
        provider: AccountId,
        shares_minted: Amount,
        amount0: Amount,
        amount1: Amount,
    },
    /// LP shares burned for a proportional withdrawal.
    PoolBurned {
        pool: PoolId,
        provider: AccountId,
        shares_burned: Amount,
        amount0_out: Amount,
        amount1_out: Amount,
    },
    Swap {
        pool: PoolId,
        sender: AccountId,
        amount0_in: Amount,
        amount1_in: Amount,
        amount0_out: Amount,
        amount1_out: Amount,
        recipient: AccountId,
    },
    /// Reserves after a pool mutation.
    Sync {
        pool: PoolId,
        reserve0: Amount,
        reserve1: Amount,
    },
    /// LP shares moved between holders.
    SharesTransferred {
        pool: PoolId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
    OrderCreated {
        id: OrderId,
        owner: AccountId,
        token_in: TokenId,
        token_out: TokenId,
        amount_in: Amount,
        amount_out_min: Amount,
    },
    OrderFilled {
        id: OrderId,
    },
    OrderCancelled {
        id: OrderId,
    },
}

impl DexEvent {
    /// Short name used in log lines.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PoolCreated { .. } => "PoolCreated",
            Self::PoolMinted { .. } => "PoolMinted",
            Self::PoolBurned { .. } => "PoolBurned",
            Self::Swap { .. } => "Swap",
            Self::Sync { .. } => "Sync",
            Self::SharesTransferred { .. } => "SharesTransferred",
            Self::OrderCreated { .. } => "OrderCreated",
            Self::OrderFilled { .. } => "OrderFilled",
            Self::OrderCancelled { .. } => "OrderCancelled",
        }
    }
}

/// Anything that accepts emitted events.
///
/// Operations emit into a staging buffer; the exchange commits the buffer to
/// the [`EventLog`] only when the whole operation succeeds.
pub trait EventSink {
    fn emit(&mut self, event: DexEvent);
}

impl EventSink for Vec<DexEvent> {
    fn emit(&mut self, event: DexEvent) {
        self.push(event);
    }
}

/// A committed event with its position in the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Strictly increasing, starting at 0, never reused.
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    pub event: DexEvent,
}

/// Append-only event log with bounded retention.
///
/// When `capacity` is reached the oldest record is evicted; sequence numbers
/// keep counting so observers can detect the gap.
#[derive(Debug, Clone)]
pub struct EventLog {
    records: VecDeque<EventRecord>,
    next_sequence: u64,
    capacity: usize,
}

impl EventLog {
    /// # Errors
    /// `Configuration` if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(DexError::Configuration(
                "event log capacity must be > 0".into(),
            ));
        }
        Ok(Self {
            records: VecDeque::new(),
            next_sequence: 0,
            capacity,
        })
    }

    /// Commit a batch of staged events in order.
    pub fn commit(&mut self, events: Vec<DexEvent>, at: DateTime<Utc>) {
        for event in events {
            self.append(event, at);
        }
    }

    /// Append one event and return its sequence number.
    pub fn append(&mut self, event: DexEvent, at: DateTime<Utc>) -> u64 {
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.records.push_back(EventRecord {
            sequence,
            recorded_at: at,
            event,
        });
        sequence
    }

    pub fn records(&self) -> impl Iterator<Item = &EventRecord> {
        self.records.iter()
    }

    /// Records with `sequence >= from`.
    pub fn since(&self, from: u64) -> impl Iterator<Item = &EventRecord> {
        self.records.iter().filter(move |r| r.sequence >= from)
    }

    /// Events only, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &DexEvent> {
        self.records.iter().map(|r| &r.event)
    }

    /// Sequence number the next appended event will get.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Sequence of the oldest retained record, if any.
    #[must_use]
    pub fn first_sequence(&self) -> Option<u64> {
        self.records.front().map(|r| r.sequence)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Digest over the retained events, independent of wall-clock time.
    pub fn digest(&self) -> Result<[u8; 32]> {
        digest_events(self.events())
    }
}

/// `SHA-256("dexcore:events:v1:" || count || for each event: len || json)`
///
/// Two replicas that applied the same operations produce the same digest.
pub fn digest_events<'a>(events: impl IntoIterator<Item = &'a DexEvent>) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(b"dexcore:events:v1:");
    let mut count: u64 = 0;
    let mut body = Vec::new();
    for event in events {
        let bytes = serde_json::to_vec(event)?;
        body.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        body.extend_from_slice(&bytes);
        count += 1;
    }
    hasher.update(count.to_le_bytes());
    hasher.update(&body);

    let result = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(id: u64) -> DexEvent {
        DexEvent::OrderFilled { id: OrderId(id) }
    }

    #[test]
    fn sequences_are_monotonic() {
        let mut log = EventLog::new(10).unwrap();
        let now = Utc::now();
        assert_eq!(log.append(filled(0), now), 0);
        assert_eq!(log.append(filled(1), now), 1);
        log.commit(vec![filled(2), filled(3)], now);
        let seqs: Vec<u64> = log.records().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
        assert_eq!(log.next_sequence(), 4);
    }

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut log = EventLog::new(2).unwrap();
        let now = Utc::now();
        log.commit(vec![filled(0), filled(1), filled(2)], now);
        assert_eq!(log.len(), 2);
        assert_eq!(log.first_sequence(), Some(1));
        assert_eq!(log.since(2).count(), 1);
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = EventLog::new(0).unwrap_err();
        assert!(matches!(err, DexError::Configuration(_)));
    }

    #[test]
    fn digest_ignores_timestamps_but_not_order() {
        let mut a = EventLog::new(10).unwrap();
        let mut b = EventLog::new(10).unwrap();
        a.commit(vec![filled(0), filled(1)], Utc::now());
        b.commit(vec![filled(0), filled(1)], Utc::now() + chrono::Duration::hours(1));
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());

        let swapped = digest_events(&[filled(1), filled(0)]).unwrap();
        assert_ne!(a.digest().unwrap(), swapped);
    }

    #[test]
    fn event_serde_is_tagged() {
        let json = serde_json::to_string(&filled(4)).unwrap();
        assert!(json.starts_with("{\"OrderFilled\""), "{json}");
        let back: DexEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, filled(4));
        assert_eq!(back.kind(), "OrderFilled");
    }

    #[test]
    fn vec_is_a_sink() {
        let mut staged: Vec<DexEvent> = Vec::new();
        staged.emit(filled(0));
        assert_eq!(staged.len(), 1);
    }
}
