//! Headless session loop driving the grid, spawner, agent and analytics.

use std::collections::BTreeMap;

use anyhow::{ensure, Context, Result};
use beatshot_core::{
    AccuracyData, Command, DamageKind, Event, QTableSnapshot, SaveSlot, TargetGuid,
};
use beatshot_grid::{self as grid, SpatialIndex};
use beatshot_system_agent::{AgentParams, QLearningAgent};
use beatshot_system_analytics::{location_accuracy, Analytics};
use beatshot_system_spawning::{Config, TargetSpawner};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::SessionFile;

const AGENT_SEED_OFFSET: u64 = 1;
const PLAYER_SEED_OFFSET: u64 = 2;

/// Knobs supplied on the command line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SessionOptions {
    pub(crate) beats: usize,
    pub(crate) seed: u64,
    pub(crate) hit_probability: f64,
}

/// Summary of a finished session.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SessionReport {
    pub(crate) spawned: usize,
    pub(crate) hits: usize,
    pub(crate) misses: usize,
    pub(crate) accuracy_updates: usize,
    pub(crate) snapshot: Option<QTableSnapshot>,
    pub(crate) accuracy: AccuracyData,
}

/// Result of [`run`]: the report plus the agent so the caller can save it.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) report: SessionReport,
    pub(crate) agent: Option<QLearningAgent>,
}

/// Plays `options.beats` beats against a player who hits each target with
/// probability `options.hit_probability` once its lifetime ends.
pub(crate) fn run(file: &SessionFile, options: SessionOptions, slot: &dyn SaveSlot) -> Result<Outcome> {
    ensure!(
        (0.0..=1.0).contains(&options.hit_probability),
        "hit probability {} is outside [0, 1]",
        options.hit_probability
    );

    let grid_config = file.grid_config()?;
    let mut index = SpatialIndex::initialize(grid_config);
    let agent = QLearningAgent::init(
        AgentParams {
            identity: file.identity(),
            fine_columns: grid_config.columns(),
            fine_rows: grid_config.rows(),
            config: file.agent_config()?,
            seed: options.seed.wrapping_add(AGENT_SEED_OFFSET),
        },
        slot,
    )
    .context("failed to initialise the learning agent")?;

    let beat_interval = file.beat_interval();
    let mut spawner = TargetSpawner::new(
        Config::new(beat_interval, options.seed, file.session.target_scale),
        Some(agent),
    );
    let mut analytics = Analytics::new(DamageKind::Hit);
    let mut player = ChaCha8Rng::seed_from_u64(options.seed.wrapping_add(PLAYER_SEED_OFFSET));
    let mut spawned_at: BTreeMap<TargetGuid, usize> = BTreeMap::new();

    let mut report = SessionReport {
        spawned: 0,
        hits: 0,
        misses: 0,
        accuracy_updates: 0,
        snapshot: None,
        accuracy: AccuracyData::empty(),
    };

    for beat in 0..options.beats {
        let mut beat_events = Vec::new();
        let mut commands = Vec::new();
        grid::apply(&mut index, Command::Tick { dt: beat_interval }, &mut beat_events);

        if let Some(target) = spawner.handle(&beat_events, &mut index, &mut commands)? {
            let _ = spawned_at.insert(target.guid, beat);
            report.spawned += 1;
        }
        apply_all(&mut index, &mut commands, &mut beat_events);

        let expired: Vec<TargetGuid> = spawned_at
            .iter()
            .filter(|(_, spawned)| beat - **spawned >= file.session.target_lifetime_beats)
            .map(|(guid, _)| *guid)
            .collect();
        for guid in expired {
            let _ = spawned_at.remove(&guid);
            let hit = player.gen_bool(options.hit_probability);
            if hit {
                report.hits += 1;
            } else {
                report.misses += 1;
            }

            let mut agent_events = Vec::new();
            spawner.resolve(guid, hit, &mut commands, &mut agent_events)?;
            apply_all(&mut index, &mut commands, &mut beat_events);
            for event in agent_events {
                if let Event::QTableUpdated { snapshot } = event {
                    report.snapshot = Some(snapshot);
                }
            }
        }

        let mut analytics_events = Vec::new();
        analytics.handle(&beat_events, &index, &mut analytics_events);
        report.accuracy_updates += analytics_events.len();
    }

    report.accuracy = location_accuracy(&index, DamageKind::Hit);
    log::info!(
        "session finished: {} spawned, {} hits, {} misses",
        report.spawned,
        report.hits,
        report.misses
    );
    Ok(Outcome {
        report,
        agent: spawner.into_agent(),
    })
}

fn apply_all(index: &mut SpatialIndex, commands: &mut Vec<Command>, events: &mut Vec<Event>) {
    for command in commands.drain(..) {
        grid::apply(index, command, events);
    }
}
