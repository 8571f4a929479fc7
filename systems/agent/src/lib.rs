#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Tabular Q-learning agent that learns where the player misses targets.
//!
//! The agent reasons over a coarse grid: every fine spawn cell maps to one
//! coarse cell, and the square action-value table holds one row per coarse
//! state and one column per coarse action. Missed targets are rewarded so the
//! agent gravitates towards locations the player struggles with.

mod table;

use std::collections::{BTreeMap, HashSet};

use beatshot_core::{
    AgentConfig, ConfigurationError, Event, GameModeIdentity, LearningMode, QTableRecord,
    QTableSnapshot, SaveSlot, StorageError,
};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use table::QTable;

/// Reward credited when the player destroyed the target.
pub const HIT_REWARD: f32 = -1.0;
/// Reward credited when the target expired untouched.
pub const MISS_REWARD: f32 = 1.0;

/// Parameters required to construct the agent.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentParams {
    /// Game mode whose table is loaded and saved.
    pub identity: GameModeIdentity,
    /// Fine spawn cells per row.
    pub fine_columns: usize,
    /// Fine spawn rows.
    pub fine_rows: usize,
    /// Hyperparameters, coarse shape and learning mode.
    pub config: AgentConfig,
    /// Seed of the agent's random number generator.
    pub seed: u64,
}

/// Consecutively spawned locations awaiting the outcome of `current`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TargetPair {
    previous: usize,
    current: usize,
}

/// Errors raised by the learning agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent could not be configured for the requested grid.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The save slot could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A fine index did not address a spawn cell.
    #[error("fine index {index} is outside a grid of {size} cells")]
    FineIndexOutOfRange {
        /// Index supplied by the caller.
        index: usize,
        /// Number of fine cells.
        size: usize,
    },
}

/// Q-learning agent choosing spawn locations over a coarse grid.
#[derive(Debug)]
pub struct QLearningAgent {
    identity: GameModeIdentity,
    config: AgentConfig,
    fine_columns: usize,
    fine_rows: usize,
    width_scale: usize,
    height_scale: usize,
    table: QTable,
    index_mapping: BTreeMap<usize, Vec<usize>>,
    active_pairs: Vec<TargetPair>,
    rng: ChaCha8Rng,
}

impl QLearningAgent {
    /// Builds the agent and restores the table saved for its game mode.
    ///
    /// A saved table of a different shape, or an unreadable slot, leaves the
    /// agent with a zero table.
    pub fn init(params: AgentParams, slot: &dyn SaveSlot) -> Result<Self, AgentError> {
        let AgentParams {
            identity,
            fine_columns,
            fine_rows,
            config,
            seed,
        } = params;

        let width_scale = scale_factor("columns", fine_columns, config.coarse_columns())?;
        let height_scale = scale_factor("rows", fine_rows, config.coarse_rows())?;
        let coarse_size = config.coarse_size();

        let table = match slot.load() {
            Ok(data) => match data.find_q_table(&identity) {
                Some(record) => QTable::from_record(record, coarse_size).unwrap_or_else(|| {
                    log::warn!(
                        "saved table for {identity:?} is {}x{}, expected {coarse_size}x{coarse_size}",
                        record.rows,
                        record.columns
                    );
                    QTable::zeros(coarse_size)
                }),
                None => QTable::zeros(coarse_size),
            },
            Err(error) => {
                log::warn!("could not load saved tables: {error}");
                QTable::zeros(coarse_size)
            }
        };

        let mut agent = Self {
            identity,
            config,
            fine_columns,
            fine_rows,
            width_scale,
            height_scale,
            table,
            index_mapping: BTreeMap::new(),
            active_pairs: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        for fine in 0..fine_columns * fine_rows {
            let coarse = agent.q_table_index(fine);
            agent.index_mapping.entry(coarse).or_default().push(fine);
        }

        log::info!(
            "agent ready: {fine_columns}x{fine_rows} spawn cells on a {}x{} table, {} samples",
            config.coarse_columns(),
            config.coarse_rows(),
            agent.table.total_training_samples()
        );
        Ok(agent)
    }

    /// Game mode the agent learns for.
    #[must_use]
    pub const fn identity(&self) -> &GameModeIdentity {
        &self.identity
    }

    /// Hyperparameters the agent was built with.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Learning mode the agent operates in.
    #[must_use]
    pub const fn mode(&self) -> LearningMode {
        self.config.mode()
    }

    /// Number of fine spawn cells.
    #[must_use]
    pub const fn fine_size(&self) -> usize {
        self.fine_columns * self.fine_rows
    }

    /// Converts a fine spawn cell index to its coarse table index.
    #[must_use]
    pub const fn q_table_index(&self, fine: usize) -> usize {
        let row = (fine / self.fine_columns) / self.height_scale;
        let column = (fine % self.fine_columns) / self.width_scale;
        row * self.config.coarse_columns() + column
    }

    /// Fine spawn cells covered by a coarse index, in ascending order.
    #[must_use]
    pub fn fine_indices(&self, coarse: usize) -> &[usize] {
        self.index_mapping.get(&coarse).map_or(&[], Vec::as_slice)
    }

    /// Learned value of taking coarse `action` from coarse `state`.
    #[must_use]
    pub fn q_value(&self, state: usize, action: usize) -> Option<f32> {
        self.table.value(state, action)
    }

    /// Number of updates applied to a table entry.
    #[must_use]
    pub fn training_samples(&self, state: usize, action: usize) -> Option<u32> {
        self.table.samples(state, action)
    }

    /// Number of updates applied to the whole table.
    #[must_use]
    pub const fn total_training_samples(&self) -> u64 {
        self.table.total_training_samples()
    }

    /// Number of spawned targets whose outcome is still pending.
    #[must_use]
    pub fn pending_outcomes(&self) -> usize {
        self.active_pairs.len()
    }

    /// Picks the next spawn cell among `candidates`.
    ///
    /// Exploits the table with probability `1 - epsilon` and explores
    /// otherwise. Returns `None` for an empty candidate list or when the
    /// learning mode leaves location selection to the caller.
    pub fn choose_next_action_index(&mut self, candidates: &[usize]) -> Option<usize> {
        if candidates.is_empty() || !self.mode().selects_locations() {
            return None;
        }
        if self.rng.gen::<f32>() > self.config.epsilon() {
            if let Some(best) = self.choose_best_action_index(candidates) {
                return Some(best);
            }
            log::debug!("no candidate inside any ranked coarse cell, choosing randomly");
        }
        self.choose_random_action_index(candidates)
    }

    /// Picks a random candidate inside the best ranked coarse cell that holds
    /// any candidate.
    ///
    /// Coarse cells are ranked by their column maximum. Equal maxima fall
    /// back to the column mean, so cells the player keeps hitting drop
    /// behind untouched ones.
    pub fn choose_best_action_index(&mut self, candidates: &[usize]) -> Option<usize> {
        let maxes = self.table.column_maxes();
        let means = self.table.column_means();
        let by_max = rank_descending_by(&maxes, &means);
        if log::log_enabled!(log::Level::Debug) {
            let by_mean = rank_descending_by(&means, &maxes);
            log::debug!("coarse ranking by max {by_max:?}, by mean {by_mean:?}");
        }

        let candidates: HashSet<usize> = candidates.iter().copied().collect();
        for coarse in by_max {
            let filtered: Vec<usize> = self
                .index_mapping
                .get(&coarse)
                .into_iter()
                .flatten()
                .copied()
                .filter(|fine| candidates.contains(fine))
                .collect();
            if let Some(chosen) = filtered.choose(&mut self.rng) {
                return Some(*chosen);
            }
        }
        None
    }

    /// Picks a candidate uniformly at random.
    pub fn choose_random_action_index(&mut self, candidates: &[usize]) -> Option<usize> {
        candidates.choose(&mut self.rng).copied()
    }

    /// Applies one Q-learning step expressed in fine spawn cell indices and
    /// publishes the refreshed table view.
    pub fn update_q_table(
        &mut self,
        state: usize,
        action: usize,
        next_state: usize,
        next_action: usize,
        reward: f32,
        out: &mut Vec<Event>,
    ) -> Result<(), AgentError> {
        let state = self.coarse_of(state)?;
        let action = self.coarse_of(action)?;
        let next_state = self.coarse_of(next_state)?;
        let next_action = self.coarse_of(next_action)?;
        self.update_coarse(state, action, next_state, next_action, reward, out);
        Ok(())
    }

    /// Display-ready column means and maxes with the top coarse row first.
    #[must_use]
    pub fn snapshot(&self) -> QTableSnapshot {
        let rows = self.config.coarse_rows();
        let columns = self.config.coarse_columns();
        QTableSnapshot {
            rows,
            columns,
            averages: flip_rows(&self.table.column_means(), rows, columns),
            maxes: flip_rows(&self.table.column_maxes(), rows, columns),
        }
    }

    /// Remembers that `current` spawned right after `previous`.
    pub fn record_spawn(&mut self, previous: usize, current: usize) {
        if previous == current || !self.mode().learns() {
            return;
        }
        self.active_pairs.push(TargetPair { previous, current });
    }

    /// Rewards the pair ending at `current` and learns from it.
    pub fn record_outcome(
        &mut self,
        current: usize,
        hit: bool,
        out: &mut Vec<Event>,
    ) -> Result<(), AgentError> {
        if !self.mode().learns() {
            return Ok(());
        }
        let Some(position) = self
            .active_pairs
            .iter()
            .position(|pair| pair.current == current)
        else {
            log::warn!("no spawned pair ends at cell {current}");
            return Ok(());
        };
        let pair = self.active_pairs.remove(position);

        let reward = if hit { HIT_REWARD } else { MISS_REWARD };
        let state = self.coarse_of(pair.previous)?;
        let next_state = self.coarse_of(pair.current)?;
        let greedy = self.table.greedy_actions(next_state);
        let next_action = greedy.choose(&mut self.rng).copied().unwrap_or(next_state);

        self.update_coarse(state, next_state, next_state, next_action, reward, out);
        Ok(())
    }

    /// Current table as a persistable record.
    #[must_use]
    pub fn to_record(&self) -> QTableRecord {
        self.table.to_record(&self.identity)
    }

    /// Stores the table under the agent's identity, keeping other records.
    pub fn save_q_table(&self, slot: &mut dyn SaveSlot) -> Result<(), AgentError> {
        let mut data = slot.load()?;
        data.upsert_q_table(self.to_record());
        slot.store(&data)?;
        log::info!(
            "saved table for {:?} after {} samples",
            self.identity,
            self.table.total_training_samples()
        );
        Ok(())
    }

    fn coarse_of(&self, fine: usize) -> Result<usize, AgentError> {
        let size = self.fine_size();
        if fine >= size {
            return Err(AgentError::FineIndexOutOfRange { index: fine, size });
        }
        Ok(self.q_table_index(fine))
    }

    fn update_coarse(
        &mut self,
        state: usize,
        action: usize,
        next_state: usize,
        next_action: usize,
        reward: f32,
        out: &mut Vec<Event>,
    ) {
        debug_assert!(next_action < self.table.size());
        let value = self.table.update(
            state,
            action,
            next_state,
            next_action,
            reward,
            self.config.alpha(),
            self.config.gamma(),
        );
        log::trace!("Q[{state}, {action}] = {value}");
        out.push(Event::QTableUpdated {
            snapshot: self.snapshot(),
        });
    }
}

fn scale_factor(axis: &'static str, fine: usize, coarse: usize) -> Result<usize, ConfigurationError> {
    if coarse == 0 {
        return Err(ConfigurationError::EmptyCoarseGrid);
    }
    if fine < coarse || fine % coarse != 0 {
        return Err(ConfigurationError::IndivisibleGrid { axis, fine, coarse });
    }
    Ok(fine / coarse)
}

/// Indices ordered by descending `primary`, then descending `secondary`,
/// then ascending index.
fn rank_descending_by(primary: &[f32], secondary: &[f32]) -> Vec<usize> {
    let mut ranked: Vec<usize> = (0..primary.len()).collect();
    ranked.sort_by(|a, b| {
        primary[*b]
            .total_cmp(&primary[*a])
            .then(secondary[*b].total_cmp(&secondary[*a]))
            .then(a.cmp(b))
    });
    ranked
}

/// Reshapes a row-major coarse vector so the top row comes first.
fn flip_rows(values: &[f32], rows: usize, columns: usize) -> Vec<f32> {
    values
        .chunks(columns)
        .take(rows)
        .rev()
        .flatten()
        .copied()
        .collect()
}
