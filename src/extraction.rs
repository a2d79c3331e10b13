//! Extraction requests and results.

use crate::identifier::IdentifierCode;

/// A single "snapshot these signals when this timestamp is reached" request.
/// `index` records the request's position in the caller's original batch so
/// that sorting the batch by `time` does not disturb the order results are
/// reported in.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub time: i64,
    pub ids: Vec<IdentifierCode>,
    pub index: usize,
}

/// Slots for extraction results, sized to the batch and addressed by
/// [`ExtractionRequest::index`]. Each slot is filled at most once.
#[derive(Debug, Default)]
pub struct ExtractionResults {
    slots: Vec<Option<Vec<u8>>>,
}

impl ExtractionResults {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fills `index`'s slot. Panics if the slot was already filled — every
    /// extraction request's timestamp is crossed exactly once while
    /// streaming, so a double-fill indicates an engine bug, not bad input.
    pub fn fill(&mut self, index: usize, value: Vec<u8>) {
        let slot = &mut self.slots[index];
        assert!(slot.is_none(), "extraction slot {index} filled twice");
        *slot = Some(value);
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.slots[index].as_deref()
    }

    /// Number of slots that have not yet been filled.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Option<Vec<u8>>> {
        self.slots
    }
}

/// Sorts a batch of requests by `time` ascending, stable on ties (ties keep
/// their original submission order, matching the original's single-pass
/// scheduling behavior — see DESIGN.md).
pub fn sort_by_time(batch: &mut [ExtractionRequest]) {
    batch.sort_by_key(|req| req.time);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_by_time_is_stable_on_ties() {
        let mut batch = vec![
            ExtractionRequest { time: 5, ids: vec![], index: 0 },
            ExtractionRequest { time: 5, ids: vec![], index: 1 },
            ExtractionRequest { time: 1, ids: vec![], index: 2 },
        ];
        sort_by_time(&mut batch);
        let order: Vec<usize> = batch.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn each_slot_fills_at_most_once() {
        let mut results = ExtractionResults::new(2);
        assert_eq!(results.remaining(), 2);
        results.fill(1, b"101\0".to_vec());
        assert_eq!(results.remaining(), 1);
        assert_eq!(results.get(1), Some(&b"101\0"[..]));
        assert_eq!(results.get(0), None);
    }

    #[test]
    #[should_panic(expected = "filled twice")]
    fn double_fill_panics() {
        let mut results = ExtractionResults::new(1);
        results.fill(0, b"1\0".to_vec());
        results.fill(0, b"0\0".to_vec());
    }
}
