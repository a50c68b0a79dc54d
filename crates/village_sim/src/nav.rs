use crate::time::SimTime;
use crate::world::{is_blocked, Area, TileCoord};

// Costs are kept in half-tile units so climbing by one level (0.5) stays integral.
const FLAT_STEP_HALF_UNITS: u32 = 2;

/// Cost of stepping from `from` to the orthogonal neighbor `to`:
/// `1 + max(0, height(to) - height(from)) * 0.5`.
pub fn edge_cost(area: &Area, from: TileCoord, to: TileCoord) -> f32 {
    edge_cost_half_units(area, from, to) as f32 * 0.5
}

/// Total cost of walking `path` starting from `start`.
pub fn path_cost(area: &Area, start: TileCoord, path: &[TileCoord]) -> f32 {
    let mut previous = start;
    let mut total = 0u32;
    for tile in path {
        total = total.saturating_add(edge_cost_half_units(area, previous, *tile));
        previous = *tile;
    }
    total as f32 * 0.5
}

/// Grid A* over 4-connected tiles with a height-weighted edge cost.
///
/// Returns the tiles from `start` (exclusive) to `goal` (inclusive), or an
/// empty path when the goal is blocked, unreachable, or equal to the start.
/// Occupancy is evaluated against `now` on every call; nothing is cached.
/// Door tiles are only entered when they are the goal.
pub fn find_path(area: &Area, start: TileCoord, goal: TileCoord, now: SimTime) -> Vec<TileCoord> {
    let grid = &area.grid;
    let (Some(start_index), Some(goal_index)) = (grid.index_of(start), grid.index_of(goal)) else {
        return Vec::new();
    };
    if start == goal || is_blocked(area, goal, now) {
        return Vec::new();
    }

    let node_count = grid.cell_count();
    let mut closed = vec![false; node_count];
    let mut best_g = vec![u32::MAX; node_count];
    let mut parent = vec![None::<usize>; node_count];
    let mut open = Vec::new();
    let mut next_insertion = 0u64;

    let start_h = heuristic(start, goal);
    open.push(OpenNode {
        coord: start,
        h_cost: start_h,
        f_cost: start_h,
        insertion_order: next_insertion,
    });
    next_insertion = next_insertion.saturating_add(1);
    best_g[start_index] = 0;

    while !open.is_empty() {
        let best_index = pick_best_open_node_index(&open);
        let current = open.swap_remove(best_index);
        let Some(current_index) = grid.index_of(current.coord) else {
            continue;
        };
        if closed[current_index] {
            continue;
        }
        closed[current_index] = true;

        if current_index == goal_index {
            return reconstruct_path(area, &parent, start_index, goal_index);
        }

        let current_g = best_g[current_index];
        for neighbor in current.coord.neighbors() {
            let Some(neighbor_index) = grid.index_of(neighbor) else {
                continue;
            };
            if closed[neighbor_index] || is_blocked(area, neighbor, now) {
                continue;
            }
            if neighbor != goal && area.door_at(neighbor).is_some() {
                continue;
            }

            let tentative_g =
                current_g.saturating_add(edge_cost_half_units(area, current.coord, neighbor));
            if tentative_g >= best_g[neighbor_index] {
                continue;
            }

            best_g[neighbor_index] = tentative_g;
            parent[neighbor_index] = Some(current_index);
            let h_cost = heuristic(neighbor, goal);
            open.push(OpenNode {
                coord: neighbor,
                h_cost,
                f_cost: tentative_g.saturating_add(h_cost),
                insertion_order: next_insertion,
            });
            next_insertion = next_insertion.saturating_add(1);
        }
    }

    Vec::new()
}

/// Walkable tiles orthogonally next to `target`, nearest to `from` first.
/// Equal distances keep the neighbor enumeration order (+x, -x, +y, -y).
pub fn stand_tile_candidates(
    area: &Area,
    from: TileCoord,
    target: TileCoord,
    now: SimTime,
) -> Vec<TileCoord> {
    let mut candidates: Vec<TileCoord> = target
        .neighbors()
        .into_iter()
        .filter(|tile| !is_blocked(area, *tile, now) && area.door_at(*tile).is_none())
        .collect();
    candidates.sort_by_key(|tile| tile.manhattan(from));
    candidates
}

/// Picks where to stand to reach `target` and the path to get there.
///
/// The first candidate the agent already stands on or can path to wins; an
/// empty path means the agent is already in place.
pub fn best_stand_tile(
    area: &Area,
    from: TileCoord,
    target: TileCoord,
    now: SimTime,
) -> Option<(TileCoord, Vec<TileCoord>)> {
    for stand in stand_tile_candidates(area, from, target, now) {
        if stand == from {
            return Some((stand, Vec::new()));
        }
        let path = find_path(area, from, stand, now);
        if !path.is_empty() {
            return Some((stand, path));
        }
    }
    None
}

fn edge_cost_half_units(area: &Area, from: TileCoord, to: TileCoord) -> u32 {
    let climb = area
        .grid
        .tile_height(to)
        .saturating_sub(area.grid.tile_height(from));
    FLAT_STEP_HALF_UNITS + u32::from(climb)
}

fn heuristic(a: TileCoord, b: TileCoord) -> u32 {
    a.manhattan(b).saturating_mul(FLAT_STEP_HALF_UNITS)
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    coord: TileCoord,
    h_cost: u32,
    f_cost: u32,
    insertion_order: u64,
}

fn pick_best_open_node_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for index in 1..open.len() {
        if open_node_order_key(open[index]) < open_node_order_key(open[best_index]) {
            best_index = index;
        }
    }
    best_index
}

fn open_node_order_key(node: OpenNode) -> (u32, u32, i32, i32, u64) {
    (
        node.f_cost,
        node.h_cost,
        node.coord.y,
        node.coord.x,
        node.insertion_order,
    )
}

fn reconstruct_path(
    area: &Area,
    parent: &[Option<usize>],
    start_index: usize,
    goal_index: usize,
) -> Vec<TileCoord> {
    let mut cursor = goal_index;
    let mut indices = Vec::new();
    while cursor != start_index {
        indices.push(cursor);
        let Some(next) = parent.get(cursor).copied().flatten() else {
            return Vec::new();
        };
        cursor = next;
    }
    indices.reverse();
    indices
        .into_iter()
        .map(|index| area.grid.coord_of(index))
        .collect()
}
