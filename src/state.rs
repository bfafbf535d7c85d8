//! Last-fetched snapshot of every collection.
//!
//! A snapshot is never patched. Each refresh builds a new one and swaps it in
//! whole; whichever refresh finishes last wins, even if it started first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Branch, Client, Product, Sale, StaffProfile};

#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub branches: Vec<Branch>,
    pub clients: Vec<Client>,
    pub products: Vec<Product>,
    pub sales: Vec<Sale>,
    pub profiles: Vec<StaffProfile>,
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuickStats {
    pub clients: usize,
    pub products: usize,
    pub sales: usize,
}

impl Snapshot {
    pub fn branch(&self, id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == id)
    }

    pub fn client(&self, id: &str) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn sale(&self, id: &str) -> Option<&Sale> {
        self.sales.iter().find(|s| s.id == id)
    }

    pub fn profile(&self, id: &str) -> Option<&StaffProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn stats(&self) -> QuickStats {
        QuickStats {
            clients: self.clients.len(),
            products: self.products.len(),
            sales: self.sales.len(),
        }
    }
}

/// Holds the current snapshot. Readers get a cheap `Arc` clone.
#[derive(Debug, Default)]
pub struct AppState {
    current: RwLock<Arc<Snapshot>>,
    generation: AtomicU64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replaces the snapshot and returns the new generation number.
    pub fn install(&self, snapshot: Snapshot) -> u64 {
        let snapshot = Arc::new(snapshot);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = snapshot;
        // Bumped under the write guard so the highest generation always
        // belongs to the snapshot left installed.
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Number of snapshots installed so far. Every install is followed by a
    /// full re-render, so this doubles as the render count.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marked(marker: usize) -> Snapshot {
        Snapshot {
            branches: vec![Branch {
                id: marker.to_string(),
                name: format!("Branch {marker}"),
                city: None,
                created_at: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_install_bumps_generation() {
        let state = AppState::new();
        assert_eq!(state.generation(), 0);
        assert!(state.snapshot().branches.is_empty());

        assert_eq!(state.install(marked(1)), 1);
        assert_eq!(state.install(marked(2)), 2);
        assert_eq!(state.generation(), 2);
        assert_eq!(state.snapshot().branches[0].id, "2");
    }

    #[test]
    fn test_highest_generation_owns_installed_snapshot() {
        for _ in 0..50 {
            let state = Arc::new(AppState::new());
            let handles: Vec<_> = (0..8)
                .map(|marker| {
                    let state = Arc::clone(&state);
                    std::thread::spawn(move || (state.install(marked(marker)), marker))
                })
                .collect();

            let results: Vec<(u64, usize)> = handles
                .into_iter()
                .map(|h| h.join().expect("install thread"))
                .collect();
            let (last_generation, last_marker) = results.iter().max().copied().unwrap();

            assert_eq!(last_generation, 8);
            assert_eq!(state.generation(), 8);
            assert_eq!(state.snapshot().branches[0].id, last_marker.to_string());
        }
    }
}
