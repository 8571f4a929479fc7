#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative spawn grid for BeatShot targets.
//!
//! The [`SpatialIndex`] owns every [`GridCell`] of the spawn plane in a flat
//! arena, keeps the occupancy flags of each cell consistent as targets are
//! spawned, activated and destroyed, and answers the "where may the next
//! target go" question the spawner asks on every beat.

mod cell;

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    time::Duration,
};

use beatshot_core::{
    BorderingDirection, Command, DamageEvent, DamageKind, Event, GridConfig, RecentMemoryPolicy,
    TargetGuid, Vertex,
};
use rand::Rng;
use thiserror::Error;

pub use cell::GridCell;

/// Owns the spawn grid and the occupancy bookkeeping of every cell.
#[derive(Debug)]
pub struct SpatialIndex {
    config: GridConfig,
    cells: Vec<GridCell>,
    guid_map: HashMap<TargetGuid, usize>,
    recent_order: VecDeque<usize>,
    most_recent: Option<usize>,
    elapsed: Duration,
}

impl SpatialIndex {
    /// Builds one cell per lattice slot described by `config`.
    #[must_use]
    pub fn initialize(config: GridConfig) -> Self {
        let cells: Vec<GridCell> = (0..config.size())
            .map(|index| GridCell::new(index, config.bottom_left_of(index), &config))
            .collect();
        assert_eq!(
            cells.len(),
            config.columns() * config.rows(),
            "grid must hold one cell per column and row"
        );
        log::info!(
            "initialised spawn grid with {} columns and {} rows of {}x{} cells",
            config.columns(),
            config.rows(),
            config.cell_width(),
            config.cell_height()
        );

        Self {
            config,
            cells,
            guid_map: HashMap::new(),
            recent_order: VecDeque::new(),
            most_recent: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Resets every cell in place and forgets all live targets.
    pub fn reinitialize(&mut self) {
        let config = self.config;
        for (index, cell) in self.cells.iter_mut().enumerate() {
            cell.init(index, config.bottom_left_of(index), &config);
        }
        self.guid_map.clear();
        self.recent_order.clear();
        self.most_recent = None;
        self.elapsed = Duration::ZERO;
    }

    /// Shared grid configuration.
    #[must_use]
    pub const fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Every cell in index order.
    #[must_use]
    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    /// Cell at the provided flattened index.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&GridCell> {
        self.cells.get(index)
    }

    /// Cell that owns the target identified by `guid`.
    #[must_use]
    pub fn cell_by_guid(&self, guid: TargetGuid) -> Option<&GridCell> {
        self.guid_map
            .get(&guid)
            .and_then(|index| self.cells.get(*index))
    }

    /// Cell whose rectangle contains `point`, if the point lies on the grid.
    #[must_use]
    pub fn cell_at(&self, point: Vertex) -> Option<&GridCell> {
        self.index_at(point).and_then(|index| self.cells.get(index))
    }

    /// Cell under a world location, snapping down to the lattice and clamping
    /// locations outside the bounds onto the nearest edge cell.
    #[must_use]
    pub fn cell_at_location(&self, location: Vertex) -> Option<&GridCell> {
        self.cell_at(self.config.bounds().clamp(location))
    }

    fn index_at(&self, point: Vertex) -> Option<usize> {
        let bounds = self.config.bounds();
        if !bounds.contains(point) {
            return None;
        }
        let column = ((point.y() - bounds.min.y()) / self.config.cell_width() as i32) as usize;
        let row = ((point.z() - bounds.min.z()) / self.config.cell_height() as i32) as usize;
        let index = row * self.config.columns() + column;
        match self.cells.get(index) {
            Some(cell) if cell.contains_point(point) => Some(index),
            _ => self.cells.iter().position(|cell| cell.contains_point(point)),
        }
    }

    /// Most recently activated cell.
    #[must_use]
    pub fn most_recent_cell(&self) -> Option<&GridCell> {
        self.most_recent.and_then(|index| self.cells.get(index))
    }

    /// Simulation time accumulated through [`SpatialIndex::advance_time`].
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Cells flagged as recently used.
    pub fn recent_cells(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells.iter().filter(|cell| cell.is_recent())
    }

    /// Cells holding an activated target.
    pub fn activated_cells(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells.iter().filter(|cell| cell.is_activated())
    }

    /// Cells that are activated or recent.
    pub fn activated_or_recent_cells(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells
            .iter()
            .filter(|cell| cell.is_activated() || cell.is_recent())
    }

    /// Cells bound to a target.
    pub fn managed_cells(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells.iter().filter(|cell| cell.is_managed())
    }

    /// Managed cells whose target is not active.
    pub fn deactivated_managed_cells(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells
            .iter()
            .filter(|cell| cell.is_managed() && !cell.is_activated())
    }

    /// Managed cells whose target is neither active nor recent.
    pub fn managed_deactivated_not_recent_cells(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells
            .iter()
            .filter(|cell| cell.is_managed() && !cell.is_activated() && !cell.is_recent())
    }

    /// Cells carrying no flag at all.
    pub fn unflagged_cells(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.cells
            .iter()
            .filter(|cell| !cell.is_managed() && !cell.is_activated() && !cell.is_recent())
    }

    /// Recent cell that has been recent the longest.
    #[must_use]
    pub fn oldest_recent_cell(&self) -> Option<&GridCell> {
        self.recent_order
            .front()
            .and_then(|index| self.cells.get(*index))
    }

    /// Neighbours of `index` in the requested directions.
    #[must_use]
    pub fn adjacent_cells(&self, index: usize, directions: &[BorderingDirection]) -> Vec<&GridCell> {
        self.cells
            .get(index)
            .map(|cell| {
                cell.adjacent_indices_in(directions)
                    .into_iter()
                    .filter_map(|neighbour| self.cells.get(neighbour))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Row plus column distance between two cells.
    #[must_use]
    pub fn manhattan_distance(&self, first: usize, second: usize) -> usize {
        let columns = self.config.columns();
        let (first_row, first_column) = (first / columns, first % columns);
        let (second_row, second_column) = (second / columns, second % columns);
        first_row.abs_diff(second_row) + first_column.abs_diff(second_column)
    }

    /// Bottom-left vertices of every cell a target of `scale` may spawn in.
    pub fn candidate_spawn_points(&mut self, scale: f32) -> BTreeSet<Vertex> {
        let mut candidates: BTreeSet<Vertex> =
            self.cells.iter().map(GridCell::bottom_left).collect();
        self.remove_overlapping_points_from_candidates(&mut candidates, scale);
        log::debug!(
            "{} of {} spawn points free for scale {scale}",
            candidates.len(),
            self.cells.len()
        );
        candidates
    }

    /// Removes every vertex blocked by an activated or recent cell.
    ///
    /// A cell's cached occupancy is recomputed only when `scale` exceeds the
    /// scale it was last computed for.
    pub fn remove_overlapping_points_from_candidates(
        &mut self,
        candidates: &mut BTreeSet<Vertex>,
        scale: f32,
    ) {
        let config = self.config;
        for cell in self
            .cells
            .iter_mut()
            .filter(|cell| cell.is_activated() || cell.is_recent())
        {
            cell.ensure_occupied_vertices(scale, &config);
            for vertex in cell.occupied_vertices() {
                let _ = candidates.remove(vertex);
            }
        }
    }

    /// Picks a random point inside the cell at `index` for the next target.
    pub fn choose_point_in_cell<R: Rng>(
        &mut self,
        index: usize,
        rng: &mut R,
    ) -> Result<Vertex, SpatialIndexError> {
        let size = self.cells.len();
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(SpatialIndexError::IndexOutOfRange { index, size })?;
        Ok(cell.set_random_chosen_point(rng))
    }

    /// Binds a freshly spawned target to the cell at `index`.
    pub fn flag_as_managed(
        &mut self,
        index: usize,
        guid: TargetGuid,
    ) -> Result<(), SpatialIndexError> {
        let size = self.cells.len();
        let config = self.config;
        let cell = self
            .cells
            .get_mut(index)
            .ok_or(SpatialIndexError::IndexOutOfRange { index, size })?;

        if cell.is_managed() {
            log::warn!("cell {index} is already managed");
            return Ok(());
        }

        cell.set_guid(Some(guid));
        cell.set_is_managed(true, &config);
        let _ = self.guid_map.insert(guid, index);
        Ok(())
    }

    /// Activates the target identified by `guid` at the given render scale.
    pub fn flag_as_activated(
        &mut self,
        guid: TargetGuid,
        scale: f32,
    ) -> Result<(), SpatialIndexError> {
        let index = self.lookup(guid)?;
        let config = self.config;

        {
            let cell = &self.cells[index];
            if cell.can_activate_while_activated() && cell.is_activated() {
                return Ok(());
            }
        }

        if self.cells[index].is_recent() {
            self.remove_recent_at(index);
        }

        let cell = &mut self.cells[index];
        if cell.is_activated() {
            log::warn!("cell {index} is already activated");
            return Ok(());
        }

        cell.set_is_activated(true, config.allow_activation_while_activated());
        cell.set_target_scale(scale);
        cell.ensure_occupied_vertices(scale, &config);
        self.most_recent = Some(index);
        Ok(())
    }

    /// Marks the cell owning `guid` as recently used.
    pub fn flag_as_recent(&mut self, guid: TargetGuid) -> Result<(), SpatialIndexError> {
        let index = self.lookup(guid)?;
        self.flag_recent_at(index);
        Ok(())
    }

    /// Unbinds the target identified by `guid` from its cell.
    pub fn remove_managed_flag(&mut self, guid: TargetGuid) -> Result<(), SpatialIndexError> {
        let index = self.lookup(guid)?;
        let _ = self.guid_map.remove(&guid);

        let config = self.config;
        let cell = &mut self.cells[index];
        if !cell.is_managed() {
            log::warn!("cell {index} is not managed");
            return Ok(());
        }
        cell.set_is_managed(false, &config);
        cell.set_guid(None);
        Ok(())
    }

    /// Clears the activated flag of the cell owning `guid`.
    pub fn remove_activated_flag(&mut self, guid: TargetGuid) -> Result<(), SpatialIndexError> {
        let index = self.lookup(guid)?;
        self.deactivate_at(index);
        Ok(())
    }

    /// Clears the recent flag of the cell at `index`.
    pub fn remove_recent_flag(&mut self, index: usize) -> Result<(), SpatialIndexError> {
        if index >= self.cells.len() {
            return Err(SpatialIndexError::IndexOutOfRange {
                index,
                size: self.cells.len(),
            });
        }
        self.remove_recent_at(index);
        Ok(())
    }

    /// Ages out recent cells according to the configured memory policy.
    pub fn refresh_recent_flags(&mut self) {
        match self.config.recent_memory_policy() {
            RecentMemoryPolicy::None => {
                while let Some(&index) = self.recent_order.front() {
                    self.remove_recent_at(index);
                }
            }
            RecentMemoryPolicy::CountBased { max_recent } => {
                while self.recent_order.len() > max_recent {
                    if let Some(&index) = self.recent_order.front() {
                        self.remove_recent_at(index);
                    }
                }
            }
            RecentMemoryPolicy::TimeBased { duration } => {
                while let Some(&index) = self.recent_order.front() {
                    let expired = self.cells[index]
                        .time_set_recent()
                        .map_or(true, |since| self.elapsed.saturating_sub(since) >= duration);
                    if !expired {
                        break;
                    }
                    self.remove_recent_at(index);
                }
            }
        }
    }

    /// Advances the recency clock and releases cells whose time ran out.
    pub fn advance_time(&mut self, dt: Duration) {
        self.elapsed = self.elapsed.saturating_add(dt);
        self.refresh_recent_flags();
    }

    /// Updates statistics and flags from a target's damage report.
    pub fn record_damage(&mut self, event: DamageEvent) -> Result<(), SpatialIndexError> {
        let index = self.lookup(event.guid)?;
        let dealt_damage = event.dealt_by_player && event.damage_delta > 0.0;

        match event.kind {
            DamageKind::Tracking => {
                // Tracking targets move, so credit the cell under the target now.
                match self.index_at(self.config.bounds().clamp(event.location)) {
                    Some(current) if dealt_damage => {
                        self.cells[current].increment_total_tracking_damage();
                    }
                    Some(_) => {}
                    None => {
                        log::warn!("no cell under tracking location {:?}", event.location);
                        return Ok(());
                    }
                }
            }
            DamageKind::Hit => {
                let cell = &mut self.cells[index];
                cell.increment_total_spawns();
                if dealt_damage {
                    cell.increment_total_hits();
                }
            }
            DamageKind::SelfDamage => {
                if event.hit_vulnerable {
                    self.cells[index].increment_total_spawns();
                }
            }
            DamageKind::None | DamageKind::Combined => {
                log::warn!("ignoring damage event of kind {:?}", event.kind);
            }
        }

        if event.will_deactivate || event.will_destroy {
            self.deactivate_at(index);
            self.flag_recent_at(index);
        }
        if event.will_destroy {
            self.remove_managed_flag(event.guid)?;
        }
        Ok(())
    }

    /// Counts one tick of tracking damage the player could have dealt at `location`.
    pub fn record_tracking_damage_possible(&mut self, location: Vertex) {
        if let Some(index) = self.index_at(self.config.bounds().clamp(location)) {
            self.cells[index].increment_total_tracking_damage_possible();
        }
    }

    fn lookup(&self, guid: TargetGuid) -> Result<usize, SpatialIndexError> {
        self.guid_map.get(&guid).copied().ok_or_else(|| {
            log::warn!("no cell owns target {}", guid.get());
            SpatialIndexError::UnknownTarget(guid)
        })
    }

    fn deactivate_at(&mut self, index: usize) {
        let cell = &mut self.cells[index];
        if !cell.is_activated() {
            log::warn!("cell {index} is not activated");
            return;
        }
        cell.set_is_activated(false, false);
    }

    fn flag_recent_at(&mut self, index: usize) {
        if self.cells[index].is_recent() {
            log::warn!("cell {index} is already recent");
            return;
        }
        self.cells[index].set_is_recent(true, self.elapsed);
        self.recent_order.push_back(index);

        match self.config.recent_memory_policy() {
            RecentMemoryPolicy::None => self.remove_recent_at(index),
            RecentMemoryPolicy::CountBased { .. } => self.refresh_recent_flags(),
            RecentMemoryPolicy::TimeBased { .. } => {}
        }
    }

    fn remove_recent_at(&mut self, index: usize) {
        self.recent_order.retain(|queued| *queued != index);
        let cell = &mut self.cells[index];
        if !cell.is_recent() {
            log::warn!("cell {index} is not recent");
            return;
        }
        cell.set_is_recent(false, self.elapsed);
    }
}

/// Errors raised when a caller addresses a cell that does not exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SpatialIndexError {
    /// No cell is bound to the target.
    #[error("no cell owns target {0:?}")]
    UnknownTarget(TargetGuid),
    /// The flattened index lies outside the grid.
    #[error("cell index {index} is outside a grid of {size} cells")]
    IndexOutOfRange {
        /// Index supplied by the caller.
        index: usize,
        /// Number of cells in the grid.
        size: usize,
    },
}

/// Applies the provided command to the spatial index and reports flag changes.
pub fn apply(index: &mut SpatialIndex, command: Command, out_events: &mut Vec<Event>) {
    let before = FlagSnapshot::capture(index);

    let result = match command {
        Command::Restart => {
            index.reinitialize();
            out_events.push(Event::GridRestarted);
            return;
        }
        Command::Tick { dt } => {
            index.advance_time(dt);
            out_events.push(Event::TimeAdvanced { dt });
            Ok(())
        }
        Command::FlagManaged { index: cell, guid } => index.flag_as_managed(cell, guid),
        Command::FlagActivated { guid, scale } => index.flag_as_activated(guid, scale),
        Command::FlagRecent { guid } => index.flag_as_recent(guid),
        Command::RemoveManaged { guid } => index.remove_managed_flag(guid),
        Command::RemoveActivated { guid } => index.remove_activated_flag(guid),
        Command::RecordDamage { event } => index.record_damage(event),
    };

    match result {
        Ok(()) => {}
        Err(SpatialIndexError::UnknownTarget(guid)) => {
            out_events.push(Event::UnknownTarget { guid });
        }
        Err(error) => log::warn!("rejected grid command: {error}"),
    }

    before.publish_changes(index, out_events);
}

#[derive(Debug)]
struct FlagSnapshot {
    managed: BTreeSet<usize>,
    activated: BTreeSet<usize>,
    recent: BTreeSet<usize>,
}

impl FlagSnapshot {
    fn capture(index: &SpatialIndex) -> Self {
        Self {
            managed: index.managed_cells().map(GridCell::index).collect(),
            activated: index.activated_cells().map(GridCell::index).collect(),
            recent: index.recent_cells().map(GridCell::index).collect(),
        }
    }

    fn publish_changes(self, index: &SpatialIndex, out_events: &mut Vec<Event>) {
        let after = Self::capture(index);

        for cell in after.managed.difference(&self.managed) {
            if let Some(guid) = index.cells[*cell].guid() {
                out_events.push(Event::CellManaged { index: *cell, guid });
            }
        }
        for cell in after.activated.difference(&self.activated) {
            out_events.push(Event::CellActivated { index: *cell });
        }
        for cell in after.recent.difference(&self.recent) {
            out_events.push(Event::CellMadeRecent { index: *cell });
        }
        for cell in self.recent.difference(&after.recent) {
            out_events.push(Event::RecentCleared { index: *cell });
        }
        for cell in self.managed.difference(&after.managed) {
            out_events.push(Event::CellReleased { index: *cell });
        }
    }
}

/// Read-only statistics exports of the spatial index.
pub mod query {
    use super::{GridCell, SpatialIndex};

    /// Sentinel exported for cells that never recorded a value.
    pub const NO_RECORD: i64 = -1;

    fn export(index: &SpatialIndex, value: impl Fn(&GridCell) -> Option<u32>) -> Vec<i64> {
        index
            .cells()
            .iter()
            .map(|cell| value(cell).map_or(NO_RECORD, i64::from))
            .collect()
    }

    /// Spawns per cell in index order, `-1` where nothing spawned.
    #[must_use]
    pub fn total_spawns_matrix(index: &SpatialIndex) -> Vec<i64> {
        export(index, GridCell::total_spawns)
    }

    /// Player hits per cell in index order.
    #[must_use]
    pub fn total_hits_matrix(index: &SpatialIndex) -> Vec<i64> {
        export(index, |cell| Some(cell.total_hits()))
    }

    /// Possible tracking damage per cell in index order, `-1` where none was possible.
    #[must_use]
    pub fn total_tracking_damage_possible_matrix(index: &SpatialIndex) -> Vec<i64> {
        export(index, GridCell::total_tracking_damage_possible)
    }

    /// Tracking damage dealt per cell in index order.
    #[must_use]
    pub fn total_tracking_damage_matrix(index: &SpatialIndex) -> Vec<i64> {
        export(index, |cell| Some(cell.total_tracking_damage()))
    }

    /// Indices of every cell that may currently host a target, in index order.
    #[must_use]
    pub fn unflagged_indices(index: &SpatialIndex) -> Vec<usize> {
        index.unflagged_cells().map(GridCell::index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatshot_core::Extrema;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn config(columns: i32, rows: i32, cell: u32, policy: RecentMemoryPolicy) -> GridConfig {
        let min = Vertex::new(3700, -(columns * cell as i32) / 2, 100);
        let max = min.offset(columns * cell as i32, rows * cell as i32);
        GridConfig::new(Extrema::new(min, max), cell, cell, 0.0)
            .expect("valid config")
            .with_recent_memory_policy(policy)
    }

    fn guid(seed: u8) -> TargetGuid {
        TargetGuid::from_random_bytes([seed; 16])
    }

    fn spawn(index: &mut SpatialIndex, cell: usize, seed: u8) -> TargetGuid {
        let guid = guid(seed);
        index.flag_as_managed(cell, guid).expect("managed");
        index.flag_as_activated(guid, 1.0).expect("activated");
        guid
    }

    fn indices<'a>(cells: impl Iterator<Item = &'a GridCell>) -> Vec<usize> {
        cells.map(GridCell::index).collect()
    }

    #[test]
    fn initialize_builds_lattice() {
        let index = SpatialIndex::initialize(config(8, 5, 100, RecentMemoryPolicy::None));
        assert_eq!(index.cells().len(), 40);
        let bounds = index.config().bounds();
        assert_eq!(index.cells()[0].bottom_left(), bounds.min);
        assert_eq!(index.cells()[39].top_right(), bounds.max);
        assert!(index.cells().iter().enumerate().all(|(i, cell)| cell.index() == i));
    }

    #[test]
    fn adjacency_never_leaves_grid() {
        for (columns, rows) in [(2, 2), (2, 5), (6, 2), (3, 3), (5, 4), (7, 9)] {
            let index = SpatialIndex::initialize(config(columns, rows, 50, RecentMemoryPolicy::None));
            let size = index.cells().len();
            for cell in index.cells() {
                let expected = if cell.index_type().is_corner() {
                    3
                } else if cell.index_type().is_border() {
                    5
                } else {
                    8
                };
                assert_eq!(cell.adjacent_indices().len(), expected, "cell {}", cell.index());
                assert!(cell.adjacent_indices().iter().all(|neighbour| *neighbour < size));
                for neighbour in cell.adjacent_indices() {
                    assert!(index.manhattan_distance(cell.index(), *neighbour) <= 2);
                }
            }
        }
    }

    #[test]
    fn location_lookup_snaps_and_clamps() {
        let index = SpatialIndex::initialize(config(4, 4, 100, RecentMemoryPolicy::None));
        let min = index.config().bounds().min;
        assert_eq!(index.cell_at(min.offset(150, 250)).map(GridCell::index), Some(9));
        assert_eq!(index.cell_at(min.offset(-1, 0)), None);
        assert_eq!(
            index.cell_at_location(min.offset(-500, 9000)).map(GridCell::index),
            Some(12)
        );
        assert_eq!(
            index.cell_at_location(min.offset(399, 0)).map(GridCell::index),
            Some(3)
        );
    }

    #[test]
    fn activation_flow_moves_cell_between_sets() {
        let mut index = SpatialIndex::initialize(config(5, 5, 100, RecentMemoryPolicy::CountBased {
            max_recent: 4,
        }));
        let guid = spawn(&mut index, 12, 1);

        assert_eq!(indices(index.managed_cells()), vec![12]);
        assert_eq!(indices(index.activated_cells()), vec![12]);
        assert_eq!(index.most_recent_cell().map(GridCell::index), Some(12));
        assert_eq!(index.cell_by_guid(guid).map(GridCell::index), Some(12));

        index.remove_activated_flag(guid).expect("deactivated");
        index.flag_as_recent(guid).expect("recent");
        assert!(index.activated_cells().next().is_none());
        assert_eq!(indices(index.recent_cells()), vec![12]);
        assert_eq!(indices(index.activated_or_recent_cells()), vec![12]);
        assert!(index.managed_deactivated_not_recent_cells().next().is_none());

        index.flag_as_activated(guid, 1.0).expect("reactivated");
        assert!(index.recent_cells().next().is_none());
        assert_eq!(indices(index.activated_cells()), vec![12]);

        index.remove_activated_flag(guid).expect("deactivated");
        assert_eq!(indices(index.deactivated_managed_cells()), vec![12]);
        assert_eq!(indices(index.managed_deactivated_not_recent_cells()), vec![12]);

        index.remove_managed_flag(guid).expect("released");
        assert!(index.cell_by_guid(guid).is_none());
        assert_eq!(index.unflagged_cells().count(), 25);
    }

    #[test]
    fn unknown_guid_is_reported() {
        let mut index = SpatialIndex::initialize(config(3, 3, 100, RecentMemoryPolicy::None));
        let missing = guid(9);
        assert_eq!(
            index.flag_as_activated(missing, 1.0),
            Err(SpatialIndexError::UnknownTarget(missing))
        );
        assert_eq!(
            index.flag_as_recent(missing),
            Err(SpatialIndexError::UnknownTarget(missing))
        );
        assert_eq!(
            index.flag_as_managed(9, missing),
            Err(SpatialIndexError::IndexOutOfRange { index: 9, size: 9 })
        );
    }

    #[test]
    fn managed_twice_keeps_first_target() {
        let mut index = SpatialIndex::initialize(config(3, 3, 100, RecentMemoryPolicy::None));
        index.flag_as_managed(4, guid(1)).expect("managed");
        index.flag_as_managed(4, guid(2)).expect("ignored");
        assert_eq!(index.cells()[4].guid(), Some(guid(1)));
        assert!(index.cell_by_guid(guid(2)).is_none());
    }

    #[test]
    fn reactivation_is_ignored_when_allowed() {
        let config = config(3, 3, 100, RecentMemoryPolicy::None).with_activation_while_activated(true);
        let mut index = SpatialIndex::initialize(config);
        let guid = spawn(&mut index, 0, 3);
        index.flag_as_activated(guid, 4.0).expect("ignored");
        assert_eq!(index.cells()[0].target_scale(), 1.0);
        assert!(index.cells()[0].can_activate_while_activated());
    }

    #[test]
    fn candidates_exclude_overlapping_points() {
        let mut index = SpatialIndex::initialize(config(10, 10, 100, RecentMemoryPolicy::None));
        assert_eq!(index.candidate_spawn_points(1.0).len(), 100);

        let _ = spawn(&mut index, 55, 1);
        let candidates = index.candidate_spawn_points(1.0);
        let blocked = index.cells()[55].occupied_vertices().clone();
        assert!(!blocked.is_empty());
        assert!(!candidates.contains(&index.cells()[55].bottom_left()));
        assert!(blocked.iter().all(|vertex| !candidates.contains(vertex)));
        assert_eq!(candidates.len(), 100 - blocked.len());
        assert!(candidates.contains(&index.cells()[0].bottom_left()));
    }

    #[test]
    fn larger_scale_grows_cached_occupancy() {
        let mut index = SpatialIndex::initialize(config(20, 20, 50, RecentMemoryPolicy::None));
        let _ = spawn(&mut index, 210, 1);
        let small = index.cells()[210].occupied_vertices().len();
        let _ = index.candidate_spawn_points(3.0);
        let large = index.cells()[210].occupied_vertices().len();
        assert!(large > small);
        let _ = index.candidate_spawn_points(1.0);
        assert_eq!(index.cells()[210].occupied_vertices().len(), large);
    }

    #[test]
    fn count_based_policy_evicts_oldest() {
        let mut index = SpatialIndex::initialize(config(5, 5, 100, RecentMemoryPolicy::CountBased {
            max_recent: 2,
        }));
        let guids: Vec<TargetGuid> = (0..3).map(|seed| spawn(&mut index, seed as usize * 2, seed)).collect();
        for guid in &guids {
            index.flag_as_recent(*guid).expect("recent");
        }
        assert_eq!(indices(index.recent_cells()), vec![2, 4]);
        assert_eq!(index.oldest_recent_cell().map(GridCell::index), Some(2));
    }

    #[test]
    fn time_based_policy_expires_on_tick() {
        let mut index = SpatialIndex::initialize(config(5, 5, 100, RecentMemoryPolicy::TimeBased {
            duration: Duration::from_secs(2),
        }));
        let first = spawn(&mut index, 0, 1);
        index.flag_as_recent(first).expect("recent");
        index.advance_time(Duration::from_secs(1));
        let second = spawn(&mut index, 10, 2);
        index.flag_as_recent(second).expect("recent");

        index.advance_time(Duration::from_millis(1500));
        assert_eq!(indices(index.recent_cells()), vec![10]);
        index.advance_time(Duration::from_millis(500));
        assert!(index.recent_cells().next().is_none());
    }

    #[test]
    fn no_memory_policy_releases_immediately() {
        let mut index = SpatialIndex::initialize(config(3, 3, 100, RecentMemoryPolicy::None));
        let guid = spawn(&mut index, 4, 1);
        index.flag_as_recent(guid).expect("recent");
        assert!(index.recent_cells().next().is_none());
        assert!(index.activated_cells().next().is_none());
        assert!(index.cells()[4].occupied_vertices().is_empty());
    }

    #[test]
    fn hit_damage_updates_statistics_and_flags() {
        let mut index = SpatialIndex::initialize(config(4, 4, 100, RecentMemoryPolicy::CountBased {
            max_recent: 8,
        }));
        let guid = spawn(&mut index, 5, 1);
        let location = index.cells()[5].center_point();
        index
            .record_damage(DamageEvent {
                guid,
                kind: DamageKind::Hit,
                location,
                damage_delta: 100.0,
                dealt_by_player: true,
                hit_vulnerable: true,
                will_deactivate: true,
                will_destroy: true,
            })
            .expect("recorded");

        let cell = &index.cells()[5];
        assert_eq!(cell.total_spawns(), Some(1));
        assert_eq!(cell.total_hits(), 1);
        assert!(cell.is_recent());
        assert!(!cell.is_activated());
        assert!(!cell.is_managed());
        assert!(index.cell_by_guid(guid).is_none());
    }

    #[test]
    fn self_damage_counts_spawn_without_hit() {
        let mut index = SpatialIndex::initialize(config(4, 4, 100, RecentMemoryPolicy::None));
        let guid = spawn(&mut index, 6, 1);
        let location = index.cells()[6].center_point();
        index
            .record_damage(DamageEvent {
                guid,
                kind: DamageKind::SelfDamage,
                location,
                damage_delta: 100.0,
                dealt_by_player: false,
                hit_vulnerable: true,
                will_deactivate: true,
                will_destroy: false,
            })
            .expect("recorded");

        let cell = &index.cells()[6];
        assert_eq!(cell.total_spawns(), Some(1));
        assert_eq!(cell.total_hits(), 0);
        assert!(cell.is_managed());
        assert!(!cell.is_activated());
    }

    #[test]
    fn tracking_damage_credits_current_location() {
        let mut index = SpatialIndex::initialize(config(4, 4, 100, RecentMemoryPolicy::None));
        let guid = spawn(&mut index, 0, 1);
        let elsewhere = index.cells()[15].center_point();
        index.record_tracking_damage_possible(elsewhere);
        index
            .record_damage(DamageEvent {
                guid,
                kind: DamageKind::Tracking,
                location: elsewhere,
                damage_delta: 1.0,
                dealt_by_player: true,
                hit_vulnerable: false,
                will_deactivate: false,
                will_destroy: false,
            })
            .expect("recorded");

        assert_eq!(index.cells()[15].total_tracking_damage(), 1);
        assert_eq!(index.cells()[15].total_tracking_damage_possible(), Some(1));
        assert_eq!(index.cells()[0].total_tracking_damage(), 0);
        assert_eq!(query::total_tracking_damage_possible_matrix(&index)[0], -1);
    }

    #[test]
    fn chosen_point_is_inside_requested_cell() {
        let mut index = SpatialIndex::initialize(config(4, 4, 100, RecentMemoryPolicy::None));
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let point = index.choose_point_in_cell(7, &mut rng).expect("point");
        assert_eq!(index.cell_at(point).map(GridCell::index), Some(7));
        assert!(index.choose_point_in_cell(16, &mut rng).is_err());
    }

    #[test]
    fn reinitialize_resets_cells_in_place() {
        let mut index = SpatialIndex::initialize(config(4, 4, 100, RecentMemoryPolicy::None));
        let guid = spawn(&mut index, 3, 1);
        index.advance_time(Duration::from_secs(5));
        index.reinitialize();
        assert_eq!(index.cells().len(), 16);
        assert_eq!(index.unflagged_cells().count(), 16);
        assert!(index.cell_by_guid(guid).is_none());
        assert_eq!(index.elapsed(), Duration::ZERO);
        assert_eq!(query::total_spawns_matrix(&index), vec![-1; 16]);
    }

    #[test]
    fn adjacent_cells_follow_directions() {
        let index = SpatialIndex::initialize(config(4, 4, 100, RecentMemoryPolicy::None));
        let above = index.adjacent_cells(5, &[BorderingDirection::Up, BorderingDirection::UpRight]);
        assert_eq!(indices(above.into_iter()), vec![9, 10]);
        assert!(index
            .adjacent_cells(0, &[BorderingDirection::Left])
            .is_empty());
        assert_eq!(index.manhattan_distance(0, 15), 6);
    }
}
