//! Unique task id allocation.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::trace;

use crate::error::IdError;

/// Ids are drawn from `0..DEFAULT_MAX_ID` unless configured otherwise.
pub const DEFAULT_MAX_ID: u32 = 9999;

/// Random draws tried before falling back to a scan.
const MAX_DRAWS: u32 = 64;

static SEED_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hands out pseudo-random ids that are unique among the ids in use.
///
/// Draws come from a BLAKE3 keyed hash over a counter. When random draws
/// keep hitting used ids, the allocator scans for a free one, and reports
/// exhaustion once every id is taken.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    used: HashSet<u32>,
    max: u32,
    key: [u8; 32],
    draws: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::with_max(DEFAULT_MAX_ID)
    }

    /// Creates an allocator drawing from `0..max`.
    pub fn with_max(max: u32) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut hasher = blake3::Hasher::new();
        hasher.update(&nanos.to_le_bytes());
        hasher.update(&std::process::id().to_le_bytes());
        hasher.update(&SEED_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        Self::with_key(max, *hasher.finalize().as_bytes())
    }

    /// Creates an allocator whose draw sequence is fixed by `seed`.
    pub fn with_seed(max: u32, seed: u64) -> Self {
        Self::with_key(max, *blake3::hash(&seed.to_le_bytes()).as_bytes())
    }

    fn with_key(max: u32, key: [u8; 32]) -> Self {
        Self {
            used: HashSet::new(),
            max,
            key,
            draws: 0,
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Returns an unused id and marks it used.
    pub fn new_id(&mut self) -> Result<u32, IdError> {
        if self.max == 0 {
            return Err(IdError::Exhausted { max: 0 });
        }

        for _ in 0..MAX_DRAWS {
            let id = self.draw();
            if self.used.insert(id) {
                trace!("allocated id {id}");
                return Ok(id);
            }
        }

        let start = self.draw();
        let id = (0..self.max)
            .map(|offset| ((u64::from(start) + u64::from(offset)) % u64::from(self.max)) as u32)
            .find(|id| !self.used.contains(id))
            .ok_or(IdError::Exhausted { max: self.max })?;
        self.used.insert(id);
        trace!("allocated id {id} by scan");
        Ok(id)
    }

    /// Marks an externally assigned id, e.g. one loaded from disk.
    pub fn mark_used(&mut self, id: u32) {
        self.used.insert(id);
    }

    pub fn is_used(&self, id: u32) -> bool {
        self.used.contains(&id)
    }

    /// Makes `id` available again.
    pub fn release(&mut self, id: u32) {
        self.used.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    fn draw(&mut self) -> u32 {
        self.draws += 1;
        let hash = blake3::keyed_hash(&self.key, &self.draws.to_le_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&hash.as_bytes()[..8]);
        (u64::from_le_bytes(word) % u64::from(self.max)) as u32
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
