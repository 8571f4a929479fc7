#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic analytics system that publishes per-location accuracy.

pub mod remap;

use beatshot_core::{AccuracyData, DamageKind, Event};
use beatshot_grid::{query, SpatialIndex};

/// Aggregates the per-cell statistics of `index` onto the 5x5 report grid.
///
/// Hit based modes compare spawns with hits; tracking modes compare possible
/// tracking damage with the damage actually dealt. Other kinds yield an empty
/// report.
#[must_use]
pub fn location_accuracy(index: &SpatialIndex, kind: DamageKind) -> AccuracyData {
    let rows = index.config().rows();
    let columns = index.config().columns();
    let (attempts, successes) = match kind {
        DamageKind::Hit => (
            query::total_spawns_matrix(index),
            query::total_hits_matrix(index),
        ),
        DamageKind::Tracking => (
            query::total_tracking_damage_possible_matrix(index),
            query::total_tracking_damage_matrix(index),
        ),
        DamageKind::None | DamageKind::SelfDamage | DamageKind::Combined => {
            log::warn!("no accuracy statistics exist for {kind:?} damage");
            return AccuracyData::empty();
        }
    };
    remap::accumulate_accuracy_5x5(&attempts, &successes, rows, columns)
}

/// Pure analytics system that recomputes accuracy once per tick after the
/// grid reports a completed target.
#[derive(Debug)]
pub struct Analytics {
    kind: DamageKind,
    last_report: Option<AccuracyData>,
    pending: bool,
}

impl Analytics {
    /// Creates a system reporting statistics for the given damage kind.
    #[must_use]
    pub const fn new(kind: DamageKind) -> Self {
        Self {
            kind,
            last_report: None,
            pending: false,
        }
    }

    /// Returns the last report published by the system, if any.
    #[must_use]
    pub fn last_report(&self) -> Option<&AccuracyData> {
        self.last_report.as_ref()
    }

    /// Consumes grid events and publishes a refreshed report when needed.
    ///
    /// Recomputation happens at most once per call and only when a request is
    /// pending *and* a tick (`Event::TimeAdvanced`) has been observed.
    pub fn handle(&mut self, events: &[Event], index: &SpatialIndex, out: &mut Vec<Event>) {
        if !self.observe(events) || !self.pending {
            return;
        }
        self.pending = false;

        let report = location_accuracy(index, self.kind);
        self.last_report = Some(report.clone());
        out.push(Event::AccuracyUpdated { report });
    }

    /// Records pending requests and reports whether a tick was observed.
    fn observe(&mut self, events: &[Event]) -> bool {
        let mut tick_observed = false;
        for event in events {
            match event {
                Event::CellMadeRecent { .. }
                | Event::CellReleased { .. }
                | Event::GridRestarted => self.pending = true,
                Event::TimeAdvanced { .. } => tick_observed = true,
                _ => {}
            }
        }
        tick_observed
    }
}
