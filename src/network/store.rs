// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Record storage for requests under observation

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;

use super::record::NetworkRecord;
use crate::host::RequestId;

/// How records map to requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordMode {
    /// One record per request object. Concurrent requests are isolated.
    #[default]
    PerRequest,
    /// One current record for the whole interceptor. Every open replaces it,
    /// so two overlapping requests corrupt each other's data. The last
    /// record stays readable until the next open.
    SingleFlight,
}

/// A record plus its timing anchor
#[derive(Debug, Clone)]
pub(crate) struct Tracked {
    pub record: NetworkRecord,
    /// Epoch milliseconds at send. Single-flight records take this from the
    /// store-wide anchor at completion.
    pub sent_at: Option<i64>,
    /// Which open this record belongs to
    pub generation: u64,
}

/// Store of records for in-flight requests
pub(crate) struct RecordStore {
    mode: RecordMode,
    arena: DashMap<RequestId, Tracked>,
    current: Mutex<Option<Tracked>>,
    /// Single-flight send time; only a send moves it, an open leaves it alone
    sent_anchor: Mutex<Option<i64>>,
    generations: AtomicU64,
}

impl RecordStore {
    pub fn new(mode: RecordMode) -> Self {
        Self {
            mode,
            arena: DashMap::new(),
            current: Mutex::new(None),
            sent_anchor: Mutex::new(None),
            generations: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> RecordMode {
        self.mode
    }

    /// Start a fresh record for `id`, discarding whatever was there
    pub fn begin(&self, id: RequestId, record: NetworkRecord) -> u64 {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let tracked = Tracked {
            record,
            sent_at: None,
            generation,
        };

        match self.mode {
            RecordMode::PerRequest => {
                self.arena.insert(id, tracked);
            }
            RecordMode::SingleFlight => {
                *self.current.lock() = Some(tracked);
            }
        }
        generation
    }

    /// Mutate the record for `id`. In per-request mode `generation` must match
    /// the open the caller observed; `None` skips the check.
    pub fn update<T>(
        &self,
        id: RequestId,
        generation: Option<u64>,
        f: impl FnOnce(&mut Tracked) -> T,
    ) -> Option<T> {
        match self.mode {
            RecordMode::PerRequest => {
                let mut entry = self.arena.get_mut(&id)?;
                if generation.is_some_and(|g| g != entry.generation) {
                    return None;
                }
                Some(f(entry.value_mut()))
            }
            RecordMode::SingleFlight => self.current.lock().as_mut().map(f),
        }
    }

    /// Mark `id` as sent at `now` (epoch milliseconds)
    pub fn stamp_sent(&self, id: RequestId, now: i64) {
        match self.mode {
            RecordMode::PerRequest => {
                if let Some(mut entry) = self.arena.get_mut(&id) {
                    entry.sent_at = Some(now);
                }
            }
            RecordMode::SingleFlight => {
                *self.sent_anchor.lock() = Some(now);
            }
        }
    }

    /// Drop the per-request record for `id` if it still belongs to `generation`.
    /// The single-flight record is never discarded this way.
    pub fn discard(&self, id: RequestId, generation: u64) -> bool {
        match self.mode {
            RecordMode::PerRequest => self
                .arena
                .remove_if(&id, |_, tracked| tracked.generation == generation)
                .is_some(),
            RecordMode::SingleFlight => false,
        }
    }

    /// Like [`discard`](Self::discard), but keeps records that were already sent
    pub fn discard_unsent(&self, id: RequestId, generation: u64) -> bool {
        match self.mode {
            RecordMode::PerRequest => self
                .arena
                .remove_if(&id, |_, tracked| {
                    tracked.generation == generation && tracked.sent_at.is_none()
                })
                .is_some(),
            RecordMode::SingleFlight => false,
        }
    }

    /// Finalize the record for `id` and hand back a copy for delivery.
    /// Per-request entries leave the arena; the single-flight record stays.
    pub fn complete(
        &self,
        id: RequestId,
        generation: u64,
        f: impl FnOnce(&mut Tracked),
    ) -> Option<NetworkRecord> {
        match self.mode {
            RecordMode::PerRequest => {
                let (_, mut tracked) = self
                    .arena
                    .remove_if(&id, |_, tracked| tracked.generation == generation)?;
                f(&mut tracked);
                Some(tracked.record)
            }
            RecordMode::SingleFlight => {
                let mut current = self.current.lock();
                let tracked = current.as_mut()?;
                tracked.sent_at = *self.sent_anchor.lock();
                f(tracked);
                Some(tracked.record.clone())
            }
        }
    }

    /// Copy of the record tracked for `id`
    pub fn get(&self, id: RequestId) -> Option<NetworkRecord> {
        match self.mode {
            RecordMode::PerRequest => self.arena.get(&id).map(|entry| entry.record.clone()),
            RecordMode::SingleFlight => self.current(),
        }
    }

    /// Copy of the single-flight record
    pub fn current(&self) -> Option<NetworkRecord> {
        self.current
            .lock()
            .as_ref()
            .map(|tracked| tracked.record.clone())
    }

    /// Number of requests with a live record
    pub fn len(&self) -> usize {
        match self.mode {
            RecordMode::PerRequest => self.arena.len(),
            RecordMode::SingleFlight => usize::from(self.current.lock().is_some()),
        }
    }

    pub fn clear(&self) {
        self.arena.clear();
        *self.current.lock() = None;
        *self.sent_anchor.lock() = None;
    }
}
