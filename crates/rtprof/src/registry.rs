//! Probe registry: the fixed table of probe slots
//!
//! Allocated once when the profiler is built and reused for every session.

use crate::probe::{ProbeId, ProbeSlot, ProbeSnapshot};

#[derive(Debug)]
pub struct ProbeRegistry {
    slots: [ProbeSlot; ProbeId::COUNT],
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| ProbeSlot::new()),
        }
    }

    #[inline]
    pub fn slot(&self, id: ProbeId) -> &ProbeSlot {
        &self.slots[id.index()]
    }

    pub fn reset_probe(&self, id: ProbeId) {
        self.slot(id).reset();
    }

    pub fn reset_all(&self) {
        for slot in &self.slots {
            slot.reset();
        }
    }

    pub fn describe(&self, id: ProbeId) -> &'static str {
        id.description()
    }

    pub fn snapshot(&self, id: ProbeId) -> ProbeSnapshot {
        self.slot(id).snapshot()
    }

    /// Snapshots of every probe in report order
    pub fn snapshots(&self) -> [(ProbeId, ProbeSnapshot); ProbeId::COUNT] {
        ProbeId::ALL.map(|id| (id, self.snapshot(id)))
    }

    /// True when no probe has a single observation
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|slot| slot.count() == 0)
    }
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_empty() {
        let registry = ProbeRegistry::new();
        assert!(registry.is_empty());
        for (_, snap) in registry.snapshots() {
            assert!(snap.is_empty());
        }
    }

    #[test]
    fn test_reset_probe_only_touches_one_slot() {
        let registry = ProbeRegistry::new();
        registry.slot(ProbeId::OneBlock).observe(10.0, 2, 64);
        registry.slot(ProbeId::OneBlockReverb).observe(3.0, 0, 64);

        registry.reset_probe(ProbeId::OneBlock);

        assert!(registry.snapshot(ProbeId::OneBlock).is_empty());
        assert_eq!(registry.snapshot(ProbeId::OneBlockReverb).count, 1);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_reset_all() {
        let registry = ProbeRegistry::new();
        for id in ProbeId::ALL {
            registry.slot(id).observe(1.0, 1, 1);
        }
        registry.reset_all();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_describe_matches_probe_label() {
        let registry = ProbeRegistry::new();
        assert_eq!(registry.describe(ProbeId::VoiceNote), "voice:note --------------->");
    }

    #[test]
    fn test_snapshots_in_report_order() {
        let registry = ProbeRegistry::new();
        let ids: Vec<_> = registry.snapshots().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, ProbeId::ALL.to_vec());
    }
}
