#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic spawning system that places one target per beat.
//!
//! The system reads the spatial index to find free cells, asks the learning
//! agent (when one is attached) which of them to use, and emits the grid
//! commands that bind the new target. Outcomes reported through
//! [`TargetSpawner::resolve`] become damage commands and agent rewards.

use std::{collections::BTreeMap, time::Duration};

use beatshot_core::{Command, DamageEvent, DamageKind, Event, TargetGuid, Vertex};
use beatshot_grid::{GridCell, SpatialIndex, SpatialIndexError};
use beatshot_system_agent::{AgentError, QLearningAgent};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Configuration parameters required to construct the spawner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    beat_interval: Duration,
    rng_seed: u64,
    target_scale: f32,
}

impl Config {
    /// Creates a new configuration using the provided beat cadence, seed and
    /// render scale of spawned targets.
    #[must_use]
    pub const fn new(beat_interval: Duration, rng_seed: u64, target_scale: f32) -> Self {
        Self {
            beat_interval,
            rng_seed,
            target_scale,
        }
    }

    /// Time between two beats.
    #[must_use]
    pub const fn beat_interval(&self) -> Duration {
        self.beat_interval
    }

    /// Render scale applied to every spawned target.
    #[must_use]
    pub const fn target_scale(&self) -> f32 {
        self.target_scale
    }
}

/// Target placed by the spawner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnedTarget {
    /// Identity assigned to the target.
    pub guid: TargetGuid,
    /// Flattened index of the cell hosting the target.
    pub index: usize,
    /// World location the target spawned at.
    pub location: Vertex,
}

/// Errors raised while spawning or resolving targets.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// The outcome referenced a target the spawner never placed.
    #[error("target {0:?} was not spawned by this spawner")]
    UnknownTarget(TargetGuid),
    /// The spatial index rejected a cell.
    #[error(transparent)]
    Grid(#[from] SpatialIndexError),
    /// The learning agent rejected an update.
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Pure system that deterministically places targets on the beat.
#[derive(Debug)]
pub struct TargetSpawner {
    config: Config,
    accumulator: Duration,
    rng: ChaCha8Rng,
    agent: Option<QLearningAgent>,
    previous: Option<usize>,
    live: BTreeMap<TargetGuid, SpawnedTarget>,
}

impl TargetSpawner {
    /// Creates a new spawner, optionally driven by a learning agent.
    #[must_use]
    pub fn new(config: Config, agent: Option<QLearningAgent>) -> Self {
        Self {
            config,
            accumulator: Duration::ZERO,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            agent,
            previous: None,
            live: BTreeMap::new(),
        }
    }

    /// Learning agent attached to the spawner, if any.
    #[must_use]
    pub fn agent(&self) -> Option<&QLearningAgent> {
        self.agent.as_ref()
    }

    /// Consumes the spawner, handing back the agent so its table can be saved.
    #[must_use]
    pub fn into_agent(self) -> Option<QLearningAgent> {
        self.agent
    }

    /// Targets whose outcome has not been resolved yet.
    pub fn live_targets(&self) -> impl Iterator<Item = &SpawnedTarget> + '_ {
        self.live.values()
    }

    /// Consumes grid events and places at most one target when a beat is due.
    ///
    /// Binding commands are pushed to `out`; the caller applies them to the
    /// index before the next call. Beats that fall due while another beat is
    /// being handled carry over to the following call.
    pub fn handle(
        &mut self,
        events: &[Event],
        index: &mut SpatialIndex,
        out: &mut Vec<Command>,
    ) -> Result<Option<SpawnedTarget>, SpawnError> {
        let mut accumulated = Duration::ZERO;
        for event in events {
            match event {
                Event::TimeAdvanced { dt } => accumulated = accumulated.saturating_add(*dt),
                Event::GridRestarted => self.reset(),
                _ => {}
            }
        }

        if self.config.beat_interval.is_zero() || accumulated.is_zero() {
            return Ok(None);
        }
        self.accumulator = self.accumulator.saturating_add(accumulated);
        if !self.take_beat() {
            return Ok(None);
        }
        self.spawn(index, out)
    }

    /// Places a target immediately, ignoring the beat clock.
    pub fn spawn(
        &mut self,
        index: &mut SpatialIndex,
        out: &mut Vec<Command>,
    ) -> Result<Option<SpawnedTarget>, SpawnError> {
        let scale = self.config.target_scale;
        let candidates: Vec<usize> = index
            .candidate_spawn_points(scale)
            .into_iter()
            .filter_map(|vertex| index.cell_at(vertex))
            .filter(|cell| !cell.is_managed())
            .map(GridCell::index)
            .collect();

        let chosen = match self.agent.as_mut() {
            Some(agent) => agent.choose_next_action_index(&candidates),
            None => None,
        };
        let Some(cell) = chosen.or_else(|| candidates.choose(&mut self.rng).copied()) else {
            log::warn!("no free cell for a target of scale {scale}");
            return Ok(None);
        };

        let guid = TargetGuid::from_random_bytes(self.rng.gen());
        let location = index.choose_point_in_cell(cell, &mut self.rng)?;
        out.push(Command::FlagManaged { index: cell, guid });
        out.push(Command::FlagActivated { guid, scale });

        if let (Some(agent), Some(previous)) = (self.agent.as_mut(), self.previous) {
            agent.record_spawn(previous, cell);
        }
        self.previous = Some(cell);

        let target = SpawnedTarget {
            guid,
            index: cell,
            location,
        };
        let _ = self.live.insert(guid, target);
        log::debug!("spawned {:?} in cell {cell}", guid.get());
        Ok(Some(target))
    }

    /// Reports whether the player destroyed `guid` before it expired.
    ///
    /// Emits the damage command that retires the target and rewards the
    /// agent for the location.
    pub fn resolve(
        &mut self,
        guid: TargetGuid,
        hit: bool,
        out_commands: &mut Vec<Command>,
        out_events: &mut Vec<Event>,
    ) -> Result<(), SpawnError> {
        let target = self
            .live
            .remove(&guid)
            .ok_or(SpawnError::UnknownTarget(guid))?;

        out_commands.push(Command::RecordDamage {
            event: DamageEvent {
                guid,
                kind: if hit {
                    DamageKind::Hit
                } else {
                    DamageKind::SelfDamage
                },
                location: target.location,
                damage_delta: if hit { 1.0 } else { 0.0 },
                dealt_by_player: hit,
                hit_vulnerable: true,
                will_deactivate: false,
                will_destroy: true,
            },
        });

        if let Some(agent) = self.agent.as_mut() {
            agent.record_outcome(target.index, hit, out_events)?;
        }
        Ok(())
    }

    fn take_beat(&mut self) -> bool {
        if self.accumulator < self.config.beat_interval {
            return false;
        }
        self.accumulator -= self.config.beat_interval;
        true
    }

    fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
        self.previous = None;
        self.live.clear();
    }
}
