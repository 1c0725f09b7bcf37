//! Uniform grid broad phase
//!
//! Rebuilt from scratch every tick. Cells are keyed by signed grid
//! coordinates; queries visit every cell within `ceil(r / cell_size)` of the
//! query cell and keep entities whose stored position is within `r`.

use crate::game::constants::spatial::{CELL_SIZE, MAX_COORDINATE};
use crate::game::entities::{EntityId, PlayerId};
use crate::util::vec2::Vec2;
use hashbrown::HashMap;

/// Initial capacity for grid cells (number of expected non-empty cells)
const GRID_INITIAL_CAPACITY: usize = 256;

/// Initial capacity for entity vectors within cells
const CELL_INITIAL_CAPACITY: usize = 4;

/// Grid cell key - (x, z) cell coordinates
pub type CellKey = (i32, i32);

/// Kind of entity stored in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player,
    Obstacle,
    PickUp,
}

/// Reference to an entity owned by the simulation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialEntityId {
    Player(PlayerId),
    Obstacle(EntityId),
    PickUp(EntityId),
}

impl SpatialEntityId {
    #[inline]
    pub fn kind(&self) -> EntityKind {
        match self {
            SpatialEntityId::Player(_) => EntityKind::Player,
            SpatialEntityId::Obstacle(_) => EntityKind::Obstacle,
            SpatialEntityId::PickUp(_) => EntityKind::PickUp,
        }
    }
}

/// Entity data stored in the spatial grid
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntity {
    pub id: SpatialEntityId,
    pub position: Vec2,
}

/// Spatial hash grid for broad-phase collision queries
#[derive(Debug)]
pub struct SpatialGrid {
    cell_size: f32,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f32,
    cells: HashMap<CellKey, Vec<SpatialEntity>>,
    len: usize,
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::with_capacity(GRID_INITIAL_CAPACITY),
            len: 0,
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Remove every entity, keeping cell allocations for the next rebuild
    #[inline]
    pub fn clear(&mut self) {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Convert world position to cell key
    #[inline]
    fn position_to_cell(&self, position: Vec2) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.z * self.inv_cell_size).floor() as i32,
        )
    }

    /// Whether a position can be stored in the grid
    #[inline]
    pub fn accepts(position: Vec2) -> bool {
        position.is_finite() && position.within_square(MAX_COORDINATE)
    }

    /// Insert an entity. Positions outside the supported coordinate bound
    /// are rejected and reported.
    pub fn insert(&mut self, entity: SpatialEntity) -> bool {
        if !Self::accepts(entity.position) {
            tracing::warn!(
                "Spatial grid rejected {:?} at ({}, {})",
                entity.id,
                entity.position.x,
                entity.position.z
            );
            return false;
        }
        let cell_key = self.position_to_cell(entity.position);
        self.cells
            .entry(cell_key)
            .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
            .push(entity);
        self.len += 1;
        true
    }

    /// All entities whose stored position lies within `radius` of `position`.
    ///
    /// Order is fixed for a given grid content: cells are visited by
    /// ascending x then ascending z offset, entities in insertion order.
    pub fn query(&self, position: Vec2, radius: f32) -> impl Iterator<Item = &SpatialEntity> {
        let (cx, cz) = self.position_to_cell(position);
        let reach = (radius * self.inv_cell_size).ceil().max(0.0) as i32;
        let radius_sq = radius * radius;

        (-reach..=reach)
            .flat_map(move |dx| (-reach..=reach).map(move |dz| (cx + dx, cz + dz)))
            .filter_map(move |key| self.cells.get(&key))
            .flat_map(|cell| cell.iter())
            .filter(move |entity| entity.position.distance_sq_to(position) <= radius_sq)
    }

    /// Get statistics about the grid
    pub fn stats(&self) -> SpatialGridStats {
        let non_empty_cells = self.cells.values().filter(|c| !c.is_empty()).count();
        let max_per_cell = self.cells.values().map(|c| c.len()).max().unwrap_or(0);

        SpatialGridStats {
            non_empty_cells,
            total_entities: self.len,
            max_per_cell,
        }
    }
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(CELL_SIZE)
    }
}

/// Statistics about the spatial grid
#[derive(Debug, Clone)]
pub struct SpatialGridStats {
    pub non_empty_cells: usize,
    pub total_entities: usize,
    pub max_per_cell: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use uuid::Uuid;

    fn obstacle(id: EntityId, x: f32, z: f32) -> SpatialEntity {
        SpatialEntity {
            id: SpatialEntityId::Obstacle(id),
            position: Vec2::new(x, z),
        }
    }

    fn ids(grid: &SpatialGrid, x: f32, z: f32, radius: f32) -> Vec<SpatialEntityId> {
        grid.query(Vec2::new(x, z), radius).map(|e| e.id).collect()
    }

    #[test]
    fn test_new_grid() {
        let grid = SpatialGrid::default();
        assert_eq!(grid.cell_size(), 100.0);
        assert!(grid.is_empty());
    }

    #[test]
    fn test_insert_and_query() {
        let mut grid = SpatialGrid::default();
        let player = Uuid::new_v4();
        grid.insert(SpatialEntity {
            id: SpatialEntityId::Player(player),
            position: Vec2::new(10.0, 10.0),
        });

        let found = ids(&grid, 0.0, 0.0, 50.0);
        assert_eq!(found, vec![SpatialEntityId::Player(player)]);
        assert_eq!(found[0].kind(), EntityKind::Player);
    }

    #[test]
    fn test_query_filters_by_exact_distance() {
        let mut grid = SpatialGrid::default();
        grid.insert(obstacle(1, 30.0, 0.0));
        grid.insert(obstacle(2, 70.0, 0.0));

        // Both share a cell, only one is within the radius
        assert_eq!(ids(&grid, 0.0, 0.0, 50.0), vec![SpatialEntityId::Obstacle(1)]);
    }

    #[test]
    fn test_query_crosses_cell_boundaries() {
        let mut grid = SpatialGrid::default();
        grid.insert(obstacle(1, -5.0, 0.0));
        grid.insert(obstacle(2, 104.0, 0.0));

        let found = ids(&grid, 50.0, 0.0, 55.0);
        assert!(found.contains(&SpatialEntityId::Obstacle(1)));
        assert!(found.contains(&SpatialEntityId::Obstacle(2)));
    }

    #[test]
    fn test_query_radius_larger_than_cell() {
        let mut grid = SpatialGrid::default();
        grid.insert(obstacle(1, 240.0, 0.0));

        assert!(ids(&grid, 0.0, 0.0, 200.0).is_empty());
        assert_eq!(ids(&grid, 0.0, 0.0, 250.0).len(), 1);
    }

    #[test]
    fn test_query_has_no_false_negatives() {
        let mut rng = rand::thread_rng();
        let mut grid = SpatialGrid::default();
        let points: Vec<Vec2> = (0..400)
            .map(|_| Vec2::new(rng.gen_range(-800.0..800.0), rng.gen_range(-800.0..800.0)))
            .collect();
        for (i, p) in points.iter().enumerate() {
            grid.insert(obstacle(i as EntityId, p.x, p.z));
        }

        for _ in 0..200 {
            let q = Vec2::new(rng.gen_range(-800.0..800.0), rng.gen_range(-800.0..800.0));
            let radius = rng.gen_range(50.0..=60.0);
            let found = ids(&grid, q.x, q.z, radius);
            for (i, p) in points.iter().enumerate() {
                if p.distance_to(q) <= radius {
                    assert!(found.contains(&SpatialEntityId::Obstacle(i as EntityId)));
                }
            }
        }
    }

    #[test]
    fn test_query_order_is_stable() {
        let mut grid = SpatialGrid::default();
        for i in 0..20 {
            grid.insert(obstacle(i, (i as f32) * 7.0 - 70.0, 3.0));
        }
        let first = ids(&grid, 0.0, 0.0, 60.0);
        let second = ids(&grid, 0.0, 0.0, 60.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_clear() {
        let mut grid = SpatialGrid::default();
        grid.insert(obstacle(1, 0.0, 0.0));
        assert_eq!(grid.len(), 1);

        grid.clear();
        assert!(grid.is_empty());
        assert!(ids(&grid, 0.0, 0.0, 100.0).is_empty());
    }

    #[test]
    fn test_rejects_out_of_bound_positions() {
        let mut grid = SpatialGrid::default();
        assert!(!grid.insert(obstacle(1, MAX_COORDINATE * 2.0, 0.0)));
        assert!(!grid.insert(obstacle(2, f32::NAN, 0.0)));
        assert!(grid.insert(obstacle(3, -MAX_COORDINATE, MAX_COORDINATE)));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_stats() {
        let mut grid = SpatialGrid::default();
        grid.insert(obstacle(1, 10.0, 10.0));
        grid.insert(obstacle(2, 20.0, 20.0));
        grid.insert(obstacle(3, 500.0, 500.0));

        let stats = grid.stats();
        assert_eq!(stats.total_entities, 3);
        assert_eq!(stats.non_empty_cells, 2);
        assert_eq!(stats.max_per_cell, 2);
    }
}
