//! Process-wide model availability bookkeeping.
//!
//! The registry is populated once at startup and read-only afterwards, so
//! sharing it across concurrent requests needs no locking. A track whose
//! model failed to load simply never gets registered; the affected domain
//! degrades to unavailable instead of crashing the process.

use std::collections::BTreeMap;

use crate::models::enums::{Domain, Track};

use super::ClassifierAdapter;

#[derive(Default)]
pub struct ModelRegistry {
    adapters: BTreeMap<Track, Box<dyn ClassifierAdapter>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for its track, replacing any previous one.
    pub fn register(&mut self, adapter: Box<dyn ClassifierAdapter>) {
        let track = adapter.track();
        tracing::info!(
            track = track.as_str(),
            fidelity = adapter.fidelity().as_str(),
            "classifier registered"
        );
        self.adapters.insert(track, adapter);
    }

    pub fn adapter(&self, track: Track) -> Option<&dyn ClassifierAdapter> {
        self.adapters.get(&track).map(|a| a.as_ref())
    }

    pub fn is_available(&self, track: Track) -> bool {
        self.adapters.contains_key(&track)
    }

    /// The subset of a domain's tracks that actually have a loaded model.
    pub fn available_tracks(&self, domain: Domain) -> Vec<Track> {
        domain
            .tracks()
            .iter()
            .copied()
            .filter(|t| self.is_available(*t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
