#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the BeatShot target spawn engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative spatial index, and pure systems. Adapters submit [`Command`]
//! values describing desired grid mutations, the spatial index executes them
//! through its `apply` entry point and broadcasts [`Event`] values. Systems
//! such as the learning agent consume immutable views and report their own
//! observations as events so that adapters can forward them to a UI layer.

pub mod persistence;

use std::{cmp::Ordering, time::Duration};

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use persistence::{
    AccuracyData, AccuracyRecord, AccuracyRow, MemorySlot, QTableRecord, SaveData, SaveSlot,
    StorageError,
};

/// Base radius of a spherical target at unit scale, in world units.
pub const SPHERE_TARGET_RADIUS: f32 = 50.0;

/// Side length of the fixed aggregation grid used for accuracy reports.
pub const ACCURACY_GRID_DIMENSION: usize = 5;

/// Commands that express all permissible spatial index mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Resets every cell in place without reallocating the grid.
    Restart,
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Associates a freshly spawned target with the cell at `index`.
    FlagManaged {
        /// Flattened cell index that received the target.
        index: usize,
        /// Identity assigned to the target by the spawner.
        guid: TargetGuid,
    },
    /// Marks the cell owning `guid` as holding an activated target.
    FlagActivated {
        /// Identity of the activated target.
        guid: TargetGuid,
        /// Render scale applied to the target.
        scale: f32,
    },
    /// Marks the cell owning `guid` as recently used.
    FlagRecent {
        /// Identity of the target that just deactivated.
        guid: TargetGuid,
    },
    /// Releases the cell owning `guid` from management.
    RemoveManaged {
        /// Identity of the target that was destroyed.
        guid: TargetGuid,
    },
    /// Clears the activated flag for the cell owning `guid`.
    RemoveActivated {
        /// Identity of the target that deactivated.
        guid: TargetGuid,
    },
    /// Records a damage event against the cell owning the damaged target.
    RecordDamage {
        /// Damage details reported by the target.
        event: DamageEvent,
    },
}

/// Events broadcast after processing commands or updating learned state.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that every cell was reset to its initial state.
    GridRestarted,
    /// Confirms that a target was bound to a cell.
    CellManaged {
        /// Flattened index of the cell.
        index: usize,
        /// Identity of the bound target.
        guid: TargetGuid,
    },
    /// Confirms that a cell now holds an activated target.
    CellActivated {
        /// Flattened index of the cell.
        index: usize,
    },
    /// Confirms that a cell was flagged as recently used.
    CellMadeRecent {
        /// Flattened index of the cell.
        index: usize,
    },
    /// Reports that a cell aged out of the recent set.
    RecentCleared {
        /// Flattened index of the cell.
        index: usize,
    },
    /// Confirms that a cell is no longer bound to any target.
    CellReleased {
        /// Flattened index of the cell.
        index: usize,
    },
    /// Reports that a command referenced a target no cell owns.
    UnknownTarget {
        /// Identity supplied by the caller.
        guid: TargetGuid,
    },
    /// Publishes refreshed per-location accuracy statistics.
    AccuracyUpdated {
        /// Statistics aggregated onto the 5x5 report grid.
        report: AccuracyData,
    },
    /// Publishes the learned action values after an update.
    QTableUpdated {
        /// Display-ready view of the table.
        snapshot: QTableSnapshot,
    },
}

/// Stable identity of a live target instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetGuid(Uuid);

impl TargetGuid {
    /// Wraps an existing identifier.
    #[must_use]
    pub const fn new(value: Uuid) -> Self {
        Self(value)
    }

    /// Builds an identifier from sixteen random bytes.
    ///
    /// Callers feed the bytes from a seeded generator so that replays assign
    /// identical identities.
    #[must_use]
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    /// Retrieves the underlying identifier.
    #[must_use]
    pub const fn get(&self) -> Uuid {
        self.0
    }
}

/// Integer lattice point in world space.
///
/// The spawn plane is spanned by Y (horizontal) and Z (vertical); X stays
/// constant for every vertex of a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vertex(IVec3);

impl Vertex {
    /// Creates a vertex from its components.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(IVec3::new(x, y, z))
    }

    /// Depth component shared by the whole grid.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.0.x
    }

    /// Horizontal component.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.0.y
    }

    /// Vertical component.
    #[must_use]
    pub const fn z(&self) -> i32 {
        self.0.z
    }

    /// Returns a copy translated by the provided horizontal and vertical offsets.
    #[must_use]
    pub const fn offset(&self, dy: i32, dz: i32) -> Self {
        Self::new(self.0.x, self.0.y + dy, self.0.z + dz)
    }

    /// Converts the vertex into floating point coordinates.
    #[must_use]
    pub fn as_vec3(&self) -> Vec3 {
        self.0.as_vec3()
    }

    /// Rounds a floating point location onto the integer lattice.
    #[must_use]
    pub fn from_vec3(location: Vec3) -> Self {
        Self(location.round().as_ivec3())
    }
}

impl PartialOrd for Vertex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Vertex {
    // Row-major: bottom rows first, then left to right.
    fn cmp(&self, other: &Self) -> Ordering {
        self.z()
            .cmp(&other.z())
            .then(self.y().cmp(&other.y()))
            .then(self.x().cmp(&other.x()))
    }
}

/// Axis-aligned bounding box that every cell's overlap computation shares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extrema {
    /// Bottom-left corner of the spawn plane.
    pub min: Vertex,
    /// Top-right corner of the spawn plane.
    pub max: Vertex,
}

impl Extrema {
    /// Creates a new bounding box.
    #[must_use]
    pub const fn new(min: Vertex, max: Vertex) -> Self {
        Self { min, max }
    }

    /// Horizontal extent in world units.
    #[must_use]
    pub const fn extent_y(&self) -> i32 {
        self.max.y() - self.min.y()
    }

    /// Vertical extent in world units.
    #[must_use]
    pub const fn extent_z(&self) -> i32 {
        self.max.z() - self.min.z()
    }

    /// Reports whether a lattice vertex can anchor a cell inside the box.
    ///
    /// The upper edges are exclusive because no cell has its bottom-left
    /// vertex on the top or right boundary.
    #[must_use]
    pub const fn contains(&self, vertex: Vertex) -> bool {
        vertex.y() >= self.min.y()
            && vertex.y() < self.max.y()
            && vertex.z() >= self.min.z()
            && vertex.z() < self.max.z()
    }

    /// Clamps a vertex into the half-open box on the spawn plane.
    #[must_use]
    pub fn clamp(&self, vertex: Vertex) -> Vertex {
        Vertex::new(
            self.min.x(),
            vertex.y().clamp(self.min.y(), (self.max.y() - 1).max(self.min.y())),
            vertex.z().clamp(self.min.z(), (self.max.z() - 1).max(self.min.z())),
        )
    }
}

/// Policy deciding how long a cell stays flagged as recent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecentMemoryPolicy {
    /// Cells are released as soon as their target deactivates.
    None,
    /// Cells stay recent for a fixed amount of simulated time.
    TimeBased {
        /// Time a cell remains recent.
        duration: Duration,
    },
    /// Only the most recent `max_recent` cells are remembered.
    CountBased {
        /// Upper bound on simultaneously recent cells.
        max_recent: usize,
    },
}

impl Default for RecentMemoryPolicy {
    fn default() -> Self {
        Self::CountBased { max_recent: 10 }
    }
}

/// Shared description of the spawn grid.
///
/// Every cell and the spatial index read their geometry from this value
/// instead of global state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridConfig {
    bounds: Extrema,
    cell_width: u32,
    cell_height: u32,
    columns: usize,
    rows: usize,
    min_distance_between_targets: f32,
    allow_activation_while_activated: bool,
    recent_memory_policy: RecentMemoryPolicy,
}

impl GridConfig {
    /// Creates a validated configuration that tiles `bounds` with cells of the
    /// provided dimensions.
    pub fn new(
        bounds: Extrema,
        cell_width: u32,
        cell_height: u32,
        min_distance_between_targets: f32,
    ) -> Result<Self, ConfigurationError> {
        if cell_width == 0 || cell_height == 0 {
            return Err(ConfigurationError::ZeroCellDimension);
        }
        if !min_distance_between_targets.is_finite() || min_distance_between_targets < 0.0 {
            return Err(ConfigurationError::InvalidMinDistance(
                min_distance_between_targets,
            ));
        }
        let columns = tile_count("horizontal", bounds.extent_y(), cell_width)?;
        let rows = tile_count("vertical", bounds.extent_z(), cell_height)?;
        if columns < 2 || rows < 2 {
            return Err(ConfigurationError::TooFewCells { columns, rows });
        }

        Ok(Self {
            bounds,
            cell_width,
            cell_height,
            columns,
            rows,
            min_distance_between_targets,
            allow_activation_while_activated: false,
            recent_memory_policy: RecentMemoryPolicy::default(),
        })
    }

    /// Replaces the recent memory policy.
    #[must_use]
    pub const fn with_recent_memory_policy(mut self, policy: RecentMemoryPolicy) -> Self {
        self.recent_memory_policy = policy;
        self
    }

    /// Allows targets to be activated again while they are still active.
    #[must_use]
    pub const fn with_activation_while_activated(mut self, allow: bool) -> Self {
        self.allow_activation_while_activated = allow;
        self
    }

    /// Bounding box shared by every cell.
    #[must_use]
    pub const fn bounds(&self) -> Extrema {
        self.bounds
    }

    /// Width of a single cell in world units.
    #[must_use]
    pub const fn cell_width(&self) -> u32 {
        self.cell_width
    }

    /// Height of a single cell in world units.
    #[must_use]
    pub const fn cell_height(&self) -> u32 {
        self.cell_height
    }

    /// Smaller of the two cell dimensions.
    #[must_use]
    pub const fn min_cell_dimension(&self) -> u32 {
        if self.cell_width < self.cell_height {
            self.cell_width
        } else {
            self.cell_height
        }
    }

    /// Number of cells per row.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Total number of cells.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.columns * self.rows
    }

    /// Minimum spacing requested between two live targets.
    #[must_use]
    pub const fn min_distance_between_targets(&self) -> f32 {
        self.min_distance_between_targets
    }

    /// Whether an active target may be activated again.
    #[must_use]
    pub const fn allow_activation_while_activated(&self) -> bool {
        self.allow_activation_while_activated
    }

    /// Policy used to age out recent cells.
    #[must_use]
    pub const fn recent_memory_policy(&self) -> RecentMemoryPolicy {
        self.recent_memory_policy
    }

    /// Bottom-left vertex of the cell at `index`. Index 0 is the bottom-left
    /// cell and rows grow upward.
    #[must_use]
    pub fn bottom_left_of(&self, index: usize) -> Vertex {
        let column = (index % self.columns) as i32;
        let row = (index / self.columns) as i32;
        self.bounds.min.offset(
            column * self.cell_width as i32,
            row * self.cell_height as i32,
        )
    }
}

fn tile_count(axis: &'static str, extent: i32, cell: u32) -> Result<usize, ConfigurationError> {
    if extent <= 0 {
        return Err(ConfigurationError::EmptyBounds { axis, extent });
    }
    if extent as u32 % cell != 0 {
        return Err(ConfigurationError::UnevenExtent { axis, extent, cell });
    }
    Ok((extent as u32 / cell) as usize)
}

/// How the learning agent takes part in choosing spawn locations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LearningMode {
    /// The agent neither learns nor chooses locations.
    #[default]
    Disabled,
    /// The agent learns from outcomes but never chooses locations.
    Training,
    /// The agent chooses locations while exploring with probability `epsilon`.
    Exploration,
    /// The agent drives location selection.
    ActiveAgent,
}

impl LearningMode {
    /// Whether the agent may pick the next spawn location in this mode.
    #[must_use]
    pub const fn selects_locations(self) -> bool {
        matches!(self, Self::Exploration | Self::ActiveAgent)
    }

    /// Whether outcomes update the learned table in this mode.
    #[must_use]
    pub const fn learns(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Hyperparameters and coarse table shape of the learning agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentConfig {
    alpha: f32,
    gamma: f32,
    epsilon: f32,
    coarse_columns: usize,
    coarse_rows: usize,
    mode: LearningMode,
}

impl AgentConfig {
    /// Default learning rate.
    pub const DEFAULT_ALPHA: f32 = 0.9;
    /// Default discount factor.
    pub const DEFAULT_GAMMA: f32 = 0.9;
    /// Default exploration probability.
    pub const DEFAULT_EPSILON: f32 = 0.9;
    /// Default number of coarse cells along each axis.
    pub const DEFAULT_COARSE_DIMENSION: usize = 5;

    /// Creates a validated configuration with a 5x5 coarse table.
    pub fn new(alpha: f32, gamma: f32, epsilon: f32) -> Result<Self, ConfigurationError> {
        check_range("alpha", alpha, |value| value > 0.0 && value <= 1.0, "(0, 1]")?;
        check_range("gamma", gamma, |value| value > 0.0 && value <= 1.0, "(0, 1]")?;
        check_range("epsilon", epsilon, |value| (0.0..=1.0).contains(&value), "[0, 1]")?;
        Ok(Self {
            alpha,
            gamma,
            epsilon,
            coarse_columns: Self::DEFAULT_COARSE_DIMENSION,
            coarse_rows: Self::DEFAULT_COARSE_DIMENSION,
            mode: LearningMode::default(),
        })
    }

    /// Replaces the coarse table shape.
    pub fn with_coarse_grid(
        mut self,
        coarse_columns: usize,
        coarse_rows: usize,
    ) -> Result<Self, ConfigurationError> {
        if coarse_columns == 0 || coarse_rows == 0 {
            return Err(ConfigurationError::EmptyCoarseGrid);
        }
        self.coarse_columns = coarse_columns;
        self.coarse_rows = coarse_rows;
        Ok(self)
    }

    /// Replaces the learning mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: LearningMode) -> Self {
        self.mode = mode;
        self
    }

    /// Learning rate.
    #[must_use]
    pub const fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Discount factor applied to the next state's value.
    #[must_use]
    pub const fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Probability of picking a random location instead of the greedy one.
    #[must_use]
    pub const fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Coarse cells per row.
    #[must_use]
    pub const fn coarse_columns(&self) -> usize {
        self.coarse_columns
    }

    /// Coarse rows.
    #[must_use]
    pub const fn coarse_rows(&self) -> usize {
        self.coarse_rows
    }

    /// Side length of the square action-value table.
    #[must_use]
    pub const fn coarse_size(&self) -> usize {
        self.coarse_columns * self.coarse_rows
    }

    /// Learning mode.
    #[must_use]
    pub const fn mode(&self) -> LearningMode {
        self.mode
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            alpha: Self::DEFAULT_ALPHA,
            gamma: Self::DEFAULT_GAMMA,
            epsilon: Self::DEFAULT_EPSILON,
            coarse_columns: Self::DEFAULT_COARSE_DIMENSION,
            coarse_rows: Self::DEFAULT_COARSE_DIMENSION,
            mode: LearningMode::default(),
        }
    }
}

fn check_range(
    name: &'static str,
    value: f32,
    valid: impl Fn(f32) -> bool,
    range: &'static str,
) -> Result<(), ConfigurationError> {
    if value.is_finite() && valid(value) {
        Ok(())
    } else {
        Err(ConfigurationError::HyperparameterOutOfRange { name, value, range })
    }
}

/// Classification of a cell by its position in the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridIndexType {
    /// Top-left corner cell.
    CornerTopLeft,
    /// Top-right corner cell.
    CornerTopRight,
    /// Bottom-right corner cell.
    CornerBottomRight,
    /// Bottom-left corner cell (index 0).
    CornerBottomLeft,
    /// Non-corner cell in the top row.
    BorderTop,
    /// Non-corner cell in the right column.
    BorderRight,
    /// Non-corner cell in the bottom row.
    BorderBottom,
    /// Non-corner cell in the left column.
    BorderLeft,
    /// Interior cell.
    Middle,
    /// Cell that has not been classified.
    None,
}

impl GridIndexType {
    /// Neighbour directions that stay inside the grid for this classification.
    #[must_use]
    pub const fn bordering_directions(self) -> &'static [BorderingDirection] {
        use BorderingDirection::{Down, DownLeft, DownRight, Left, Right, Up, UpLeft, UpRight};
        match self {
            Self::CornerTopLeft => &[Right, Down, DownRight],
            Self::CornerTopRight => &[Left, Down, DownLeft],
            Self::CornerBottomRight => &[Left, Up, UpLeft],
            Self::CornerBottomLeft => &[Right, Up, UpRight],
            Self::BorderTop => &[Left, Right, DownRight, Down, DownLeft],
            Self::BorderRight => &[UpLeft, Up, Left, Down, DownLeft],
            Self::BorderBottom => &[UpLeft, Up, UpRight, Right, Left],
            Self::BorderLeft => &[Up, UpRight, Right, DownRight, Down],
            Self::Middle => &[UpLeft, Up, UpRight, Right, DownRight, Down, DownLeft, Left],
            Self::None => &[],
        }
    }

    /// Whether the classification is one of the four corners.
    #[must_use]
    pub const fn is_corner(self) -> bool {
        matches!(
            self,
            Self::CornerTopLeft
                | Self::CornerTopRight
                | Self::CornerBottomRight
                | Self::CornerBottomLeft
        )
    }

    /// Whether the classification is one of the four non-corner borders.
    #[must_use]
    pub const fn is_border(self) -> bool {
        matches!(
            self,
            Self::BorderTop | Self::BorderRight | Self::BorderBottom | Self::BorderLeft
        )
    }
}

/// Direction from a cell toward one of its eight neighbours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BorderingDirection {
    /// One row up, one column left.
    UpLeft,
    /// One row up.
    Up,
    /// One row up, one column right.
    UpRight,
    /// One column right.
    Right,
    /// One row down, one column right.
    DownRight,
    /// One row down.
    Down,
    /// One row down, one column left.
    DownLeft,
    /// One column left.
    Left,
}

impl BorderingDirection {
    /// Every direction in clockwise order starting at the upper left.
    pub const ALL: [Self; 8] = [
        Self::UpLeft,
        Self::Up,
        Self::UpRight,
        Self::Right,
        Self::DownRight,
        Self::Down,
        Self::DownLeft,
        Self::Left,
    ];

    /// Offset applied to a flattened index in a grid with `columns` cells per row.
    #[must_use]
    pub const fn index_offset(self, columns: usize) -> isize {
        let width = columns as isize;
        match self {
            Self::UpLeft => width - 1,
            Self::Up => width,
            Self::UpRight => width + 1,
            Self::Right => 1,
            Self::DownRight => 1 - width,
            Self::Down => -width,
            Self::DownLeft => -width - 1,
            Self::Left => -1,
        }
    }
}

/// Kind of damage a target reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    /// No damage type; reported events of this kind are ignored.
    None,
    /// Discrete hit, typically from a projectile.
    Hit,
    /// Continuous damage dealt while tracking the target.
    Tracking,
    /// Damage the target dealt to itself, usually on expiry.
    SelfDamage,
    /// Combination of hit and tracking damage.
    Combined,
}

/// Damage notification forwarded from a target to the spatial index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DamageEvent {
    /// Identity of the damaged target.
    pub guid: TargetGuid,
    /// Kind of damage that was applied.
    pub kind: DamageKind,
    /// World location of the target when the damage landed.
    pub location: Vertex,
    /// Health lost by the target.
    pub damage_delta: f32,
    /// Whether the player dealt the damage.
    pub dealt_by_player: bool,
    /// Whether the target accepts hit damage at all.
    pub hit_vulnerable: bool,
    /// Whether the target deactivates after this event.
    pub will_deactivate: bool,
    /// Whether the target is destroyed after this event.
    pub will_destroy: bool,
}

/// Display-ready view of a learned action-value table.
///
/// Both vectors hold one value per coarse cell, laid out row-major with the
/// top row first so they can be drawn without further transformation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QTableSnapshot {
    /// Number of coarse rows.
    pub rows: usize,
    /// Number of coarse columns.
    pub columns: usize,
    /// Mean action value per coarse cell.
    pub averages: Vec<f32>,
    /// Maximum action value per coarse cell.
    pub maxes: Vec<f32>,
}

/// Identity of a game mode used to key persisted records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GameModeIdentity {
    /// Name of the built-in game mode.
    pub game_mode_actor_name: String,
    /// Name of the user-defined variant, empty for built-in modes.
    pub custom_game_mode_name: String,
}

impl GameModeIdentity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(
        game_mode_actor_name: impl Into<String>,
        custom_game_mode_name: impl Into<String>,
    ) -> Self {
        Self {
            game_mode_actor_name: game_mode_actor_name.into(),
            custom_game_mode_name: custom_game_mode_name.into(),
        }
    }
}

/// Errors raised when a configuration cannot describe a consistent grid or agent.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigurationError {
    /// A cell dimension was zero.
    #[error("cell width and height must be positive")]
    ZeroCellDimension,
    /// The bounding box had no extent along an axis.
    #[error("{axis} extent {extent} is empty")]
    EmptyBounds {
        /// Axis that collapsed.
        axis: &'static str,
        /// Extent that was measured.
        extent: i32,
    },
    /// The bounding box could not be tiled evenly.
    #[error("{axis} extent {extent} is not a multiple of the cell size {cell}")]
    UnevenExtent {
        /// Axis that failed to tile.
        axis: &'static str,
        /// Extent that was measured.
        extent: i32,
        /// Requested cell size.
        cell: u32,
    },
    /// The grid was a single cell wide or tall, which leaves corners and
    /// borders undefined.
    #[error("grid of {columns}x{rows} cells needs at least two columns and two rows")]
    TooFewCells {
        /// Cells per row.
        columns: usize,
        /// Number of rows.
        rows: usize,
    },
    /// Target spacing was negative or not finite.
    #[error("minimum distance between targets must be finite and non-negative, got {0}")]
    InvalidMinDistance(f32),
    /// A learning hyperparameter fell outside its valid range.
    #[error("{name} = {value} is outside {range}")]
    HyperparameterOutOfRange {
        /// Name of the hyperparameter.
        name: &'static str,
        /// Value that was supplied.
        value: f32,
        /// Human readable range.
        range: &'static str,
    },
    /// The coarse grid had no cells.
    #[error("coarse grid must have at least one row and one column")]
    EmptyCoarseGrid,
    /// The fine grid could not be divided into the coarse grid.
    #[error("fine {axis} count {fine} is not a multiple of the coarse count {coarse}")]
    IndivisibleGrid {
        /// Axis that failed to divide.
        axis: &'static str,
        /// Fine cell count.
        fine: usize,
        /// Coarse cell count.
        coarse: usize,
    },
}
