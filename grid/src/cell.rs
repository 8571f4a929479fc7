use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, HashSet},
    f32::consts::SQRT_2,
    hash::{Hash, Hasher},
    time::Duration,
};

use beatshot_core::{
    BorderingDirection, GridConfig, GridIndexType, TargetGuid, Vertex, SPHERE_TARGET_RADIUS,
};
use rand::Rng;

/// One addressable slot of the spawn grid.
///
/// Geometry and adjacency are derived once from the index; flags, the chosen
/// point and the lifetime counters change as targets come and go. Equality,
/// hashing and ordering all follow the flattened index, which is row-major
/// from the bottom-left cell.
#[derive(Clone, Debug)]
pub struct GridCell {
    index: usize,
    bottom_left: Vertex,
    bottom_right: Vertex,
    top_left: Vertex,
    top_right: Vertex,
    center_point: Vertex,
    chosen_point: Vertex,
    index_type: GridIndexType,
    adjacent_index_map: BTreeMap<BorderingDirection, usize>,
    adjacent_indices: BTreeSet<usize>,
    is_activated: bool,
    allow_activation_while_activated: bool,
    is_managed: bool,
    is_recent: bool,
    time_set_recent: Option<Duration>,
    occupied_vertices: HashSet<Vertex>,
    occupied_scale: Option<f32>,
    target_scale: f32,
    total_spawns: Option<u32>,
    total_hits: u32,
    total_tracking_damage: u32,
    total_tracking_damage_possible: Option<u32>,
    guid: Option<TargetGuid>,
}

impl GridCell {
    pub(crate) fn new(index: usize, bottom_left: Vertex, config: &GridConfig) -> Self {
        let mut cell = Self {
            index,
            bottom_left,
            bottom_right: bottom_left,
            top_left: bottom_left,
            top_right: bottom_left,
            center_point: bottom_left,
            chosen_point: bottom_left,
            index_type: GridIndexType::None,
            adjacent_index_map: BTreeMap::new(),
            adjacent_indices: BTreeSet::new(),
            is_activated: false,
            allow_activation_while_activated: false,
            is_managed: false,
            is_recent: false,
            time_set_recent: None,
            occupied_vertices: HashSet::new(),
            occupied_scale: None,
            target_scale: 1.0,
            total_spawns: None,
            total_hits: 0,
            total_tracking_damage: 0,
            total_tracking_damage_possible: None,
            guid: None,
        };
        cell.init(index, bottom_left, config);
        cell
    }

    /// Recomputes geometry and adjacency and resets per-session state.
    ///
    /// Tracking counters survive re-initialisation; spawn and hit totals do not.
    pub(crate) fn init(&mut self, index: usize, bottom_left: Vertex, config: &GridConfig) {
        let width = config.cell_width() as i32;
        let height = config.cell_height() as i32;

        self.index = index;
        self.bottom_left = bottom_left;
        self.bottom_right = bottom_left.offset(width, 0);
        self.top_left = bottom_left.offset(0, height);
        self.top_right = bottom_left.offset(width, height);
        self.center_point = bottom_left.offset(width / 2, height / 2);
        self.chosen_point = bottom_left;
        self.target_scale = 1.0;

        self.total_spawns = None;
        self.total_hits = 0;

        self.is_activated = false;
        self.allow_activation_while_activated = false;
        self.is_managed = false;
        self.is_recent = false;
        self.time_set_recent = None;
        self.guid = None;
        self.occupied_vertices.clear();
        self.occupied_scale = None;

        self.index_type = Self::find_index_type(index, config.size(), config.columns());
        self.adjacent_index_map = adjacent_index_map(self.index_type, index, config.size(), config.columns());
        self.adjacent_indices = self.adjacent_index_map.values().copied().collect();
    }

    /// Classifies `index` within a grid of `size` cells laid out `columns` wide.
    #[must_use]
    pub fn find_index_type(index: usize, size: usize, columns: usize) -> GridIndexType {
        if size == 0 || columns == 0 || index >= size {
            return GridIndexType::None;
        }
        let max_index = size - 1;
        let bottom_right = columns - 1;
        let top_left = size - columns;

        if index == 0 {
            return GridIndexType::CornerBottomLeft;
        }
        if index == bottom_right {
            return GridIndexType::CornerBottomRight;
        }
        if index == max_index {
            return GridIndexType::CornerTopRight;
        }
        if index == top_left {
            return GridIndexType::CornerTopLeft;
        }
        if index < bottom_right {
            return GridIndexType::BorderBottom;
        }
        if (index + 1) % columns == 0 {
            return GridIndexType::BorderRight;
        }
        if index > top_left {
            return GridIndexType::BorderTop;
        }
        if index % columns == 0 {
            return GridIndexType::BorderLeft;
        }
        GridIndexType::Middle
    }

    /// Radius around the chosen point that a target of `scale` keeps clear.
    ///
    /// The scaled target radius plus half the requested spacing is snapped up
    /// to whole cells, then padded along the diagonal and doubled.
    #[must_use]
    pub fn trace_radius(scale: f32, config: &GridConfig) -> f32 {
        let cell = config.min_cell_dimension() as f32;
        let padded = scale * SPHERE_TARGET_RADIUS + config.min_distance_between_targets() * 0.5;
        (padded / cell).ceil() * cell * SQRT_2 * 2.0
    }

    /// Lattice vertices inside the trace sphere of a target of `scale`.
    ///
    /// Vertices outside the shared bounds are never returned.
    #[must_use]
    pub fn make_occupied_vertices(&self, scale: f32, config: &GridConfig) -> HashSet<Vertex> {
        self.trace_vertices(scale, config, true)
    }

    /// Lattice vertices near the cell that the trace sphere does not reach.
    #[must_use]
    pub fn make_unoccupied_vertices(&self, scale: f32, config: &GridConfig) -> HashSet<Vertex> {
        self.trace_vertices(scale, config, false)
    }

    fn trace_vertices(&self, scale: f32, config: &GridConfig, inside: bool) -> HashSet<Vertex> {
        let radius = Self::trace_radius(scale, config);
        let width = config.cell_width() as i32;
        let height = config.cell_height() as i32;
        let steps_y = steps_within(radius, width);
        let steps_z = steps_within(radius, height);
        let center = self.chosen_point.as_vec3();
        let bounds = config.bounds();

        let min_y = self.bottom_left.y() - steps_y * width;
        let max_y = self.top_right.y() + steps_y * width;
        let min_z = self.bottom_left.z() - steps_z * height;
        let max_z = self.top_right.z() + steps_z * height;

        let mut vertices = HashSet::new();
        let mut z = min_z;
        while z <= max_z {
            let mut y = min_y;
            while y <= max_y {
                let vertex = Vertex::new(self.chosen_point.x(), y, z);
                let within = vertex.as_vec3().distance(center) <= radius;
                if within == inside && bounds.contains(vertex) {
                    let _ = vertices.insert(vertex);
                }
                y += width;
            }
            z += height;
        }
        vertices
    }

    /// Whether `point` lies within the cell's rectangle on the spawn plane.
    #[must_use]
    pub const fn contains_point(&self, point: Vertex) -> bool {
        point.y() >= self.bottom_left.y()
            && point.y() < self.bottom_right.y()
            && point.z() >= self.bottom_left.z()
            && point.z() < self.top_left.z()
    }

    /// Whether `index` is one of the cell's neighbours.
    #[must_use]
    pub fn is_bordering_index(&self, index: usize) -> bool {
        self.adjacent_indices.contains(&index)
    }

    /// Neighbours reached through the provided directions, skipping any that
    /// fall outside the grid.
    #[must_use]
    pub fn adjacent_indices_in(&self, directions: &[BorderingDirection]) -> BTreeSet<usize> {
        directions
            .iter()
            .filter_map(|direction| self.adjacent_index_map.get(direction).copied())
            .collect()
    }

    pub(crate) fn set_is_managed(&mut self, managed: bool, config: &GridConfig) {
        self.is_managed = managed;
        if managed {
            self.occupied_vertices = self.make_occupied_vertices(self.target_scale, config);
            self.occupied_scale = Some(self.target_scale);
        } else {
            self.clear_occupied_vertices();
        }
    }

    pub(crate) fn set_is_activated(&mut self, activated: bool, allow_reactivation: bool) {
        if activated && self.is_recent {
            self.clear_recent();
        }
        self.is_activated = activated;
        self.allow_activation_while_activated = allow_reactivation;
    }

    pub(crate) fn set_is_recent(&mut self, recent: bool, now: Duration) {
        if !recent {
            self.clear_recent();
            return;
        }
        self.is_activated = false;
        self.is_recent = true;
        self.time_set_recent = Some(now);
    }

    fn clear_recent(&mut self) {
        self.is_recent = false;
        self.time_set_recent = None;
        self.clear_occupied_vertices();
    }

    fn clear_occupied_vertices(&mut self) {
        self.occupied_vertices.clear();
        self.occupied_scale = None;
    }

    /// Recomputes the cached occupancy when `scale` exceeds the scale it was
    /// last computed for. The cache only ever grows.
    pub(crate) fn ensure_occupied_vertices(&mut self, scale: f32, config: &GridConfig) {
        let stale = match self.occupied_scale {
            Some(cached) => scale > cached,
            None => true,
        };
        if stale {
            let scale = scale.max(self.target_scale);
            self.occupied_vertices = self.make_occupied_vertices(scale, config);
            self.occupied_scale = Some(scale);
        }
    }

    pub(crate) fn set_target_scale(&mut self, scale: f32) {
        self.target_scale = scale;
    }

    pub(crate) fn set_guid(&mut self, guid: Option<TargetGuid>) {
        self.guid = guid;
    }

    /// Picks a random integer point inside the cell and makes it the chosen point.
    pub(crate) fn set_random_chosen_point<R: Rng>(&mut self, rng: &mut R) -> Vertex {
        let y = rng.gen_range(self.bottom_left.y()..self.bottom_right.y());
        let z = rng.gen_range(self.bottom_left.z()..self.top_left.z());
        self.chosen_point = Vertex::new(self.bottom_left.x(), y, z);
        self.chosen_point
    }

    pub(crate) fn increment_total_spawns(&mut self) {
        self.total_spawns = Some(self.total_spawns.map_or(1, |total| total + 1));
    }

    pub(crate) fn increment_total_hits(&mut self) {
        self.total_hits += 1;
    }

    pub(crate) fn increment_total_tracking_damage(&mut self) {
        self.total_tracking_damage += 1;
    }

    pub(crate) fn increment_total_tracking_damage_possible(&mut self) {
        self.total_tracking_damage_possible =
            Some(self.total_tracking_damage_possible.map_or(1, |total| total + 1));
    }

    /// Flattened position of the cell.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Bottom-left corner.
    #[must_use]
    pub const fn bottom_left(&self) -> Vertex {
        self.bottom_left
    }

    /// Bottom-right corner.
    #[must_use]
    pub const fn bottom_right(&self) -> Vertex {
        self.bottom_right
    }

    /// Top-left corner.
    #[must_use]
    pub const fn top_left(&self) -> Vertex {
        self.top_left
    }

    /// Top-right corner.
    #[must_use]
    pub const fn top_right(&self) -> Vertex {
        self.top_right
    }

    /// Center of the cell.
    #[must_use]
    pub const fn center_point(&self) -> Vertex {
        self.center_point
    }

    /// Point the most recent target was placed at.
    #[must_use]
    pub const fn chosen_point(&self) -> Vertex {
        self.chosen_point
    }

    /// Position class of the cell.
    #[must_use]
    pub const fn index_type(&self) -> GridIndexType {
        self.index_type
    }

    /// Neighbour index per direction.
    #[must_use]
    pub fn adjacent_index_map(&self) -> &BTreeMap<BorderingDirection, usize> {
        &self.adjacent_index_map
    }

    /// All neighbour indices.
    #[must_use]
    pub fn adjacent_indices(&self) -> &BTreeSet<usize> {
        &self.adjacent_indices
    }

    /// Whether a live target is currently active in the cell.
    #[must_use]
    pub const fn is_activated(&self) -> bool {
        self.is_activated
    }

    /// Whether the active target may be activated again.
    #[must_use]
    pub const fn can_activate_while_activated(&self) -> bool {
        self.allow_activation_while_activated
    }

    /// Whether a target is bound to the cell.
    #[must_use]
    pub const fn is_managed(&self) -> bool {
        self.is_managed
    }

    /// Whether the cell was used recently.
    #[must_use]
    pub const fn is_recent(&self) -> bool {
        self.is_recent
    }

    /// Simulation time the cell became recent, `None` while not recent.
    #[must_use]
    pub const fn time_set_recent(&self) -> Option<Duration> {
        self.time_set_recent
    }

    /// Cached lattice vertices blocked by the cell's target.
    #[must_use]
    pub fn occupied_vertices(&self) -> &HashSet<Vertex> {
        &self.occupied_vertices
    }

    /// Render scale of the cell's most recent target.
    #[must_use]
    pub const fn target_scale(&self) -> f32 {
        self.target_scale
    }

    /// Targets spawned here, `None` before the first spawn.
    #[must_use]
    pub const fn total_spawns(&self) -> Option<u32> {
        self.total_spawns
    }

    /// Player hits landed here.
    #[must_use]
    pub const fn total_hits(&self) -> u32 {
        self.total_hits
    }

    /// Tracking damage ticks dealt by the player here.
    #[must_use]
    pub const fn total_tracking_damage(&self) -> u32 {
        self.total_tracking_damage
    }

    /// Tracking damage ticks available here, `None` before the first one.
    #[must_use]
    pub const fn total_tracking_damage_possible(&self) -> Option<u32> {
        self.total_tracking_damage_possible
    }

    /// Identity of the target bound to the cell.
    #[must_use]
    pub const fn guid(&self) -> Option<TargetGuid> {
        self.guid
    }
}

impl PartialEq for GridCell {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for GridCell {}

impl Hash for GridCell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl PartialOrd for GridCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GridCell {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index.cmp(&other.index)
    }
}

fn steps_within(radius: f32, step: i32) -> i32 {
    if radius > step as f32 {
        (radius / step as f32).floor() as i32
    } else {
        1
    }
}

fn adjacent_index_map(
    index_type: GridIndexType,
    index: usize,
    size: usize,
    columns: usize,
) -> BTreeMap<BorderingDirection, usize> {
    index_type
        .bordering_directions()
        .iter()
        .filter_map(|direction| {
            let neighbour = index as isize + direction.index_offset(columns);
            usize::try_from(neighbour)
                .ok()
                .filter(|neighbour| *neighbour < size && *neighbour != index)
                .map(|neighbour| (*direction, neighbour))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatshot_core::Extrema;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn config(columns: i32, rows: i32, cell: u32) -> GridConfig {
        let min = Vertex::new(3700, 0, 0);
        let max = Vertex::new(3700, columns * cell as i32, rows * cell as i32);
        GridConfig::new(Extrema::new(min, max), cell, cell, 0.0).expect("valid config")
    }

    fn cell(index: usize, config: &GridConfig) -> GridCell {
        GridCell::new(index, config.bottom_left_of(index), config)
    }

    #[test]
    fn corners_follow_cell_dimensions() {
        let config = config(5, 5, 100);
        let cell = cell(6, &config);
        assert_eq!(cell.bottom_left(), Vertex::new(3700, 100, 100));
        assert_eq!(cell.bottom_right(), Vertex::new(3700, 200, 100));
        assert_eq!(cell.top_left(), Vertex::new(3700, 100, 200));
        assert_eq!(cell.top_right(), Vertex::new(3700, 200, 200));
        assert_eq!(cell.center_point(), Vertex::new(3700, 150, 150));
        assert_eq!(cell.chosen_point(), cell.bottom_left());
        assert_eq!(cell.total_spawns(), None);
        assert_eq!(cell.total_hits(), 0);
    }

    #[test]
    fn index_types_partition_grid() {
        let (columns, rows) = (6_usize, 4_usize);
        let size = columns * rows;
        let types: Vec<GridIndexType> = (0..size)
            .map(|index| GridCell::find_index_type(index, size, columns))
            .collect();

        assert_eq!(types[0], GridIndexType::CornerBottomLeft);
        assert_eq!(types[5], GridIndexType::CornerBottomRight);
        assert_eq!(types[18], GridIndexType::CornerTopLeft);
        assert_eq!(types[23], GridIndexType::CornerTopRight);
        assert_eq!(types[3], GridIndexType::BorderBottom);
        assert_eq!(types[11], GridIndexType::BorderRight);
        assert_eq!(types[20], GridIndexType::BorderTop);
        assert_eq!(types[12], GridIndexType::BorderLeft);
        assert_eq!(types[8], GridIndexType::Middle);

        assert_eq!(types.iter().filter(|kind| kind.is_corner()).count(), 4);
        assert_eq!(
            types.iter().filter(|kind| kind.is_border()).count(),
            2 * (columns - 2) + 2 * (rows - 2)
        );
        assert_eq!(
            types.iter().filter(|kind| **kind == GridIndexType::Middle).count(),
            (columns - 2) * (rows - 2)
        );
        assert!(types.iter().all(|kind| *kind != GridIndexType::None));
    }

    #[test]
    fn index_type_is_none_outside_grid() {
        assert_eq!(GridCell::find_index_type(9, 9, 3), GridIndexType::None);
        assert_eq!(GridCell::find_index_type(0, 0, 0), GridIndexType::None);
    }

    #[test]
    fn adjacency_matches_direction_table() {
        let config = config(4, 3, 50);
        let corner = cell(0, &config);
        assert_eq!(
            corner.adjacent_indices().iter().copied().collect::<Vec<_>>(),
            vec![1, 4, 5]
        );
        assert_eq!(
            corner.adjacent_index_map().get(&BorderingDirection::UpRight),
            Some(&5)
        );

        let middle = cell(5, &config);
        assert_eq!(
            middle.adjacent_indices().iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 2, 4, 6, 8, 9, 10]
        );
        assert!(middle.is_bordering_index(10));
        assert!(!middle.is_bordering_index(3));
        assert_eq!(
            middle.adjacent_indices_in(&[BorderingDirection::Up, BorderingDirection::Down]),
            [1, 9].into_iter().collect()
        );

        let top_right = cell(11, &config);
        assert_eq!(
            top_right.adjacent_indices().iter().copied().collect::<Vec<_>>(),
            vec![6, 7, 10]
        );
    }

    #[test]
    fn trace_radius_snaps_to_cell_size() {
        let config = config(10, 10, 100);
        let expected = 100.0 * SQRT_2 * 2.0;
        assert!((GridCell::trace_radius(1.0, &config) - expected).abs() < 1e-3);
        assert!((GridCell::trace_radius(2.5, &config) - expected * 2.0).abs() < 1e-3);
    }

    #[test]
    fn occupied_vertices_include_own_corner_and_respect_bounds() {
        let config = config(10, 10, 100);
        let corner = cell(0, &config);
        let occupied = corner.make_occupied_vertices(1.0, &config);

        assert!(occupied.contains(&corner.bottom_left()));
        assert!(occupied.iter().all(|vertex| config.bounds().contains(*vertex)));
        assert!(occupied.contains(&Vertex::new(3700, 100, 200)));
        assert!(!occupied.contains(&Vertex::new(3700, 300, 0)));

        let unoccupied = corner.make_unoccupied_vertices(1.0, &config);
        assert!(unoccupied.is_disjoint(&occupied));
        assert!(unoccupied.contains(&Vertex::new(3700, 300, 0)));
    }

    #[test]
    fn occupied_vertices_trace_a_disc() {
        let config = config(10, 10, 100);
        let middle = cell(55, &config);
        let occupied = middle.make_occupied_vertices(1.0, &config);
        let diagonal = |vertex: &&Vertex| {
            (vertex.y() - 500).abs() == 200 && (vertex.z() - 500).abs() == 200
        };
        // The diagonal corners sit exactly on the sphere surface.
        assert_eq!(occupied.iter().filter(|vertex| !diagonal(vertex)).count(), 21);
        assert!(occupied.contains(&Vertex::new(3700, 700, 600)));
        assert!(!occupied.contains(&Vertex::new(3700, 800, 500)));
        assert!(!occupied.contains(&Vertex::new(3700, 500, 200)));
    }

    #[test]
    fn activation_and_recency_are_exclusive() {
        let config = config(3, 3, 100);
        let mut cell = cell(4, &config);

        cell.set_is_activated(true, false);
        cell.set_is_recent(true, Duration::from_secs(3));
        assert!(cell.is_recent());
        assert!(!cell.is_activated());
        assert_eq!(cell.time_set_recent(), Some(Duration::from_secs(3)));

        cell.set_is_activated(true, true);
        assert!(cell.is_activated());
        assert!(cell.can_activate_while_activated());
        assert!(!cell.is_recent());
        assert_eq!(cell.time_set_recent(), None);
    }

    #[test]
    fn managed_flag_builds_and_clears_occupancy() {
        let config = config(5, 5, 100);
        let mut cell = cell(12, &config);
        cell.set_is_managed(true, &config);
        assert!(!cell.occupied_vertices().is_empty());
        cell.set_is_managed(false, &config);
        assert!(cell.occupied_vertices().is_empty());
    }

    #[test]
    fn occupancy_cache_never_shrinks() {
        let config = config(20, 20, 50);
        let mut cell = cell(210, &config);
        cell.ensure_occupied_vertices(2.0, &config);
        let large = cell.occupied_vertices().len();
        cell.ensure_occupied_vertices(1.0, &config);
        assert_eq!(cell.occupied_vertices().len(), large);
        cell.ensure_occupied_vertices(3.0, &config);
        assert!(cell.occupied_vertices().len() > large);
    }

    #[test]
    fn counters_start_from_sentinel() {
        let config = config(3, 3, 100);
        let mut cell = cell(0, &config);
        cell.increment_total_spawns();
        cell.increment_total_spawns();
        cell.increment_total_hits();
        cell.increment_total_tracking_damage_possible();
        cell.increment_total_tracking_damage();
        assert_eq!(cell.total_spawns(), Some(2));
        assert_eq!(cell.total_hits(), 1);
        assert_eq!(cell.total_tracking_damage_possible(), Some(1));
        assert_eq!(cell.total_tracking_damage(), 1);
    }

    #[test]
    fn random_chosen_point_stays_inside_cell() {
        let config = config(4, 4, 100);
        let mut cell = cell(9, &config);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..64 {
            let point = cell.set_random_chosen_point(&mut rng);
            assert!(cell.contains_point(point));
            assert_eq!(cell.chosen_point(), point);
        }
    }

    #[test]
    fn equality_and_order_follow_index() {
        let config = config(4, 4, 100);
        let first = cell(3, &config);
        let mut same = cell(3, &config);
        same.set_target_scale(2.0);
        let later = cell(4, &config);
        assert_eq!(first, same);
        assert!(first < later);
        let set: HashSet<GridCell> = [first, same, later].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
