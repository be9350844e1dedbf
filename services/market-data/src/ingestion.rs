//! Ring buffer ingestion for the event queue
//!
//! Extracts only the events the consumer has not seen yet, given the last
//! observed producer sequence number. The ring holds `alloc_len` slots; a
//! consumer that falls more than `alloc_len - 1` events behind loses the
//! overwritten events permanently. That loss is bounded and reported in
//! [`RecentEvents::skipped`], never as an error.
//!
//! The index arithmetic is kept in free functions so it can be tested on
//! its own.

use crate::events::{DecodeError, EventQueueHeader, EventRecord, EVENT_SIZE, HEADER_SIZE};

/// Events newer than the caller's cursor, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentEvents {
    pub header: EventQueueHeader,
    /// Ring capacity derived from the buffer length
    pub alloc_len: usize,
    pub events: Vec<EventRecord>,
    /// Events the producer pushed that could not be replayed (ring overrun)
    pub skipped: u32,
}

/// Ring capacity for an account of `buffer_len` bytes.
pub fn alloc_len(buffer_len: usize) -> usize {
    buffer_len.saturating_sub(HEADER_SIZE) / EVENT_SIZE
}

/// Number of events produced since `last_seen`, with wraparound over the
/// producer's 32-bit counter.
pub fn sequence_delta(seq_num: u32, last_seen: u32) -> u32 {
    seq_num.wrapping_sub(last_seen)
}

/// How many of the new events can still be replayed from the ring.
///
/// Capped at `alloc_len - 1`: one slot of margin against the producer
/// overwriting the oldest slot mid-read.
pub fn new_events_count(seq_num: u32, last_seen: u32, alloc_len: usize) -> usize {
    let delta = sequence_delta(seq_num, last_seen) as usize;
    delta.min(alloc_len.saturating_sub(1))
}

/// Slot indices of the last `n` events before the ring tail, oldest first.
pub fn ring_slots(head: u32, count: u32, alloc_len: usize, n: usize) -> Vec<usize> {
    if alloc_len == 0 {
        return Vec::new();
    }
    let len = alloc_len as u64;
    let tail = head as u64 + count as u64 + len;
    (1..=n as u64)
        .rev()
        .map(|i| ((tail - i) % len) as usize)
        .collect()
}

/// Decode the header and every event newer than `last_seen_seq_num`.
///
/// Without a cursor only the header is returned: the ring cannot guarantee
/// a complete history, so the first poll establishes a cursor and does not
/// back-fill.
pub fn decode_recent_events(
    buffer: &[u8],
    last_seen_seq_num: Option<u32>,
) -> Result<RecentEvents, DecodeError> {
    let header = EventQueueHeader::decode(buffer)?;
    let alloc_len = alloc_len(buffer.len());

    let Some(last_seen) = last_seen_seq_num else {
        return Ok(RecentEvents {
            header,
            alloc_len,
            events: Vec::new(),
            skipped: 0,
        });
    };
    if alloc_len == 0 {
        return Err(DecodeError::NoCapacity { len: buffer.len() });
    }

    let delta = sequence_delta(header.seq_num, last_seen);
    let n = new_events_count(header.seq_num, last_seen, alloc_len);

    let mut events = Vec::with_capacity(n);
    for slot in ring_slots(header.head, header.count, alloc_len, n) {
        events.push(EventRecord::decode(buffer, HEADER_SIZE + slot * EVENT_SIZE)?);
    }

    Ok(RecentEvents {
        header,
        alloc_len,
        events,
        skipped: delta - n as u32,
    })
}
