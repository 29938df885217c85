use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use crate::error::LedgerError;
use crate::error::LedgerResult;

const WORKER_BITS: u64 = 10;
const SEQ_BITS: u64 = 12;
const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;
const SEQ_MASK: u64 = (1 << SEQ_BITS) - 1;
const MAX_SEQ: u64 = SEQ_MASK;

/// Snowflake-style monotonic 64-bit ID generator: `timestamp_ms ∥ worker ∥
/// seq`. Construction-time `worker_id` is the only
/// configuration this type takes, matching the ambient-stack rule that
/// tunables are constructor arguments rather than hardcoded constants.
pub struct IdGenerator {
    worker_id: u64,
    state: Mutex<GeneratorState>,
}

struct GeneratorState {
    last_timestamp_ms: u64,
    seq: u64,
}

impl IdGenerator {
    #[must_use]
    pub fn new(worker_id: u64) -> Self {
        Self {
            worker_id: worker_id & WORKER_MASK,
            state: Mutex::new(GeneratorState {
                last_timestamp_ms: 0,
                seq: 0,
            }),
        }
    }

    pub fn next_id(&self) -> LedgerResult<u64> {
        let now_ms = current_millis();
        let mut state = self
            .state
            .lock()
            .map_err(|_| LedgerError::Internal("id generator lock poisoned".into()))?;

        let timestamp_ms = if now_ms < state.last_timestamp_ms {
            // Clock moved backwards; stay monotonic by reusing the last tick.
            state.last_timestamp_ms
        } else {
            now_ms
        };

        if timestamp_ms == state.last_timestamp_ms {
            state.seq = (state.seq + 1) & SEQ_MASK;
            if state.seq == 0 {
                return Err(LedgerError::Aborted(
                    "id generator exhausted sequence for this millisecond".into(),
                ));
            }
        } else {
            state.seq = 0;
        }
        state.last_timestamp_ms = timestamp_ms;

        let seq = state.seq;
        drop(state);

        Ok((timestamp_ms << (WORKER_BITS + SEQ_BITS)) | (self.worker_id << SEQ_BITS) | seq)
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Short (≤12 char), human-readable, non-guessable receipt code: a base-32
/// encoding of the journal id plus a mod-32 check digit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptCode(String);

impl ReceiptCode {
    #[must_use]
    pub fn from_journal_id(journal_id: u64) -> Self {
        let mut digits = Vec::new();
        let mut value = journal_id;
        if value == 0 {
            digits.push(0u8);
        }
        while value > 0 {
            digits.push((value % 32) as u8);
            value /= 32;
        }
        digits.reverse();

        let checksum = digits.iter().map(|&d| u32::from(d)).sum::<u32>() % 32;
        digits.push(checksum as u8);

        let code: String = digits
            .iter()
            .map(|&index| ALPHABET[index as usize] as char)
            .collect();
        Self(code)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Re-derives the checksum over the leading characters and compares it
    /// to the trailing check digit.
    #[must_use]
    pub fn verify(code: &str) -> bool {
        if code.len() < 2 || code.len() > 12 {
            return false;
        }
        let mut indices = Vec::with_capacity(code.len());
        for ch in code.chars() {
            match ALPHABET.iter().position(|&c| c as char == ch) {
                Some(index) => indices.push(index as u32),
                None => return false,
            }
        }
        let (body, check) = indices.split_at(indices.len() - 1);
        let expected = body.iter().sum::<u32>() % 32;
        expected == check[0]
    }
}

impl std::fmt::Display for ReceiptCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ids_are_strictly_increasing() {
        let generator = IdGenerator::new(1);
        let mut previous = generator.next_id().expect("first id");
        for _ in 0..1_000 {
            let next = generator.next_id().expect("next id");
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn distinct_workers_do_not_collide_at_same_instant() {
        let a = IdGenerator::new(1);
        let b = IdGenerator::new(2);
        assert_ne!(a.next_id().expect("a id"), b.next_id().expect("b id"));
    }

    #[test]
    fn receipt_code_round_trips_and_is_bounded() {
        let code = ReceiptCode::from_journal_id(123_456_789);
        assert!(code.as_str().len() <= 12);
        assert!(ReceiptCode::verify(code.as_str()));
    }

    #[test]
    fn receipt_code_rejects_tampering() {
        let code = ReceiptCode::from_journal_id(42);
        let mut tampered = code.as_str().to_string();
        let last = tampered.pop().expect("non-empty code");
        let replacement = if last == 'A' { 'B' } else { 'A' };
        tampered.push(replacement);
        assert!(!ReceiptCode::verify(&tampered));
    }
}
