use tracing::warn;

use crate::time::SimTime;

use super::area::{Area, Door, DoorKind};
use super::grid::{TileCoord, TileKind};
use super::ids::{AreaId, DoorId};
use super::World;

/// Whether `tile` blocks movement in `area` at time `now`.
///
/// Checks run in a fixed order: bounds, water, interior walls, structure
/// footprints (door gaps excepted), NPCs, then outdoor resource nodes that are
/// alive or showing their depletion marker. Door tiles are never solid.
pub fn is_blocked(area: &Area, tile: TileCoord, now: SimTime) -> bool {
    let Some(kind) = area.grid.tile_kind(tile) else {
        return true;
    };
    if kind == TileKind::Water {
        return true;
    }
    if kind == TileKind::Stone && area.is_interior() {
        return true;
    }
    if area.structures.iter().any(|structure| structure.blocks(tile)) {
        return true;
    }
    if area.npc_at(tile).is_some() {
        return true;
    }
    if !area.is_interior()
        && area
            .nodes
            .iter()
            .any(|node| node.position == tile && node.occupies_tile(now))
    {
        return true;
    }
    false
}

/// Exact-position door lookup.
pub fn door_at(area: &Area, tile: TileCoord) -> Option<&Door> {
    area.door_at(tile)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoorTransition {
    pub door: DoorId,
    pub from_area: AreaId,
    pub to_area: AreaId,
    pub arrival: TileCoord,
}

/// Resolves the area switch triggered by standing on `tile`, if it is a door.
///
/// Enter doors land the agent one step inside the destination's exit door;
/// exit doors land it on the return position linked at world build.
pub fn resolve_door_transition(
    world: &World,
    area: &Area,
    tile: TileCoord,
) -> Option<DoorTransition> {
    let door = area.door_at(tile)?;
    let arrival = match door.kind {
        DoorKind::Enter => {
            let destination = world.area(&door.to_area)?;
            let Some(exit) = destination.exit_door() else {
                warn!(door = %door.id, to_area = %door.to_area, "door_destination_has_no_exit");
                return None;
            };
            exit.arrival_tile()
        }
        DoorKind::Exit => {
            let Some(return_position) = door.return_position else {
                warn!(door = %door.id, "exit_door_unlinked");
                return None;
            };
            return_position
        }
    };
    Some(DoorTransition {
        door: door.id.clone(),
        from_area: area.id.clone(),
        to_area: door.to_area.clone(),
        arrival,
    })
}
