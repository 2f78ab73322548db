//! Process-local, render-visible product collection.
//!
//! The store is a `watch` channel holding whole states. Every mutation runs
//! inside `send_if_modified`, so a targeted update reads and writes the
//! current slot value rather than a snapshot taken before other updates
//! landed, and subscribers only ever observe complete states.
//!
//! Writers hold a [`Lease`] (the generation they were started under).
//! [`ProductStore::close`] bumps the generation, after which every seed or
//! update carrying an older lease is rejected.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use crate::catalog::models::{PhotoSource, ProductId, ProductView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorePhase {
    Unseeded,
    Seeded,
    Closed,
}

#[derive(Debug, Clone)]
pub struct StoreState {
    generation: u64,
    phase: StorePhase,
    products: Vec<ProductView>,
}

impl StoreState {
    pub fn phase(&self) -> StorePhase {
        self.phase
    }

    pub fn products(&self) -> &[ProductView] {
        &self.products
    }
}

/// Proof of which store generation a writer was started under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    generation: u64,
}

/// Stable address of one record: the index captured at launch plus the id
/// that must still live there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub index: usize,
    pub id: ProductId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded(usize),
    /// The lease no longer matches; nothing was written.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Stale,
    /// Index out of range or occupied by a different id.
    Missing,
    /// Slot no longer holds a placeholder.
    AlreadyResolved,
}

#[derive(Clone)]
pub struct ProductStore {
    tx: Arc<watch::Sender<StoreState>>,
}

impl Default for ProductStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StoreState {
            generation: 0,
            phase: StorePhase::Unseeded,
            products: Vec::new(),
        });
        Self { tx: Arc::new(tx) }
    }

    /// Lease for the current generation.
    pub fn lease(&self) -> Lease {
        Lease {
            generation: self.tx.borrow().generation,
        }
    }

    /// Whether writes under `lease` would still be accepted.
    pub fn is_current(&self, lease: Lease) -> bool {
        let state = self.tx.borrow();
        state.phase != StorePhase::Closed && state.generation == lease.generation
    }

    /// Replaces the whole collection in one step.
    pub fn seed(&self, lease: Lease, products: Vec<ProductView>) -> SeedOutcome {
        let mut outcome = SeedOutcome::Stale;
        let mut products = Some(products);
        self.tx.send_if_modified(|state| {
            if state.phase == StorePhase::Closed || state.generation != lease.generation {
                return false;
            }
            let products = products.take().unwrap_or_default();
            outcome = SeedOutcome::Seeded(products.len());
            state.products = products;
            state.phase = StorePhase::Seeded;
            true
        });
        outcome
    }

    /// Writes `photo` into the addressed slot only, leaving every other slot
    /// exactly as it currently is.
    pub fn update_photo(&self, lease: Lease, slot: &Slot, photo: String) -> UpdateOutcome {
        let mut outcome = UpdateOutcome::Stale;
        self.tx.send_if_modified(|state| {
            if state.phase != StorePhase::Seeded || state.generation != lease.generation {
                return false;
            }
            let Some(record) = state.products.get_mut(slot.index) else {
                outcome = UpdateOutcome::Missing;
                return false;
            };
            if record.id != slot.id {
                outcome = UpdateOutcome::Missing;
                return false;
            }
            if record.photo_source != PhotoSource::Placeholder {
                outcome = UpdateOutcome::AlreadyResolved;
                return false;
            }
            record.photo = photo;
            record.photo_source = PhotoSource::Preview;
            outcome = UpdateOutcome::Applied;
            true
        });
        outcome
    }

    /// Tears the store down for its consumer: outstanding leases go stale.
    pub fn close(&self) {
        self.tx.send_modify(|state| {
            state.generation += 1;
            state.phase = StorePhase::Closed;
        });
    }

    pub fn phase(&self) -> StorePhase {
        self.tx.borrow().phase
    }

    pub fn len(&self) -> usize {
        self.tx.borrow().products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current products, cloned out of the channel.
    pub fn snapshot(&self) -> Vec<ProductView> {
        self.tx.borrow().products.clone()
    }

    pub fn get(&self, id: &ProductId) -> Option<ProductView> {
        self.tx.borrow().products.iter().find(|p| &p.id == id).cloned()
    }

    /// Count of records still showing the placeholder.
    pub fn pending(&self) -> usize {
        self.tx
            .borrow()
            .products
            .iter()
            .filter(|p| p.photo_source == PhotoSource::Placeholder)
            .count()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.tx.subscribe()
    }
}
