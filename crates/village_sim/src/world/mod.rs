mod area;
mod grid;
mod ids;
mod nodes;
mod oracle;
mod village;

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

pub use area::{Area, AreaKind, Door, DoorKind, Npc, NpcKind, Structure};
pub use grid::{Grid, TileCoord, TileKind, WorldPos, LEVEL_HEIGHT, TILE_SIZE};
pub use ids::{AreaId, DoorId, NodeId, NpcId, SpotId, StructureId};
pub(crate) use ids::string_id;
pub use nodes::{FishingSpot, NodeKind, NodeState, ResourceNode};
pub use oracle::{door_at, is_blocked, resolve_door_transition, DoorTransition};
pub use village::{build_village, OVERWORLD_ID, SPAWN_INN_ID};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("duplicate area id '{area}'")]
    DuplicateArea { area: AreaId },
    #[error("start area '{area}' does not exist")]
    UnknownStartArea { area: AreaId },
    #[error("start tile ({x}, {y}) is outside area '{area}'")]
    StartOutOfBounds { area: AreaId, x: i32, y: i32 },
    #[error("door '{door}' in '{area}' leads to unknown area '{to_area}'")]
    UnknownDoorDestination {
        area: AreaId,
        door: DoorId,
        to_area: AreaId,
    },
    #[error("enter door '{door}' does not declare a return position")]
    MissingReturnPosition { door: DoorId },
    #[error("area '{area}' has {count} exit doors; an entered area needs exactly one")]
    ExitDoorCount { area: AreaId, count: usize },
    #[error("exit door of '{area}' is linked by more than one enter door")]
    ExitAlreadyLinked { area: AreaId },
    #[error("exit door '{door}' in '{area}' is never linked by an enter door")]
    UnlinkedExit { area: AreaId, door: DoorId },
    #[error("duplicate entity id '{id}' in area '{area}'")]
    DuplicateEntity { area: AreaId, id: String },
    #[error("entity '{id}' at ({x}, {y}) is outside area '{area}'")]
    EntityOutOfBounds {
        area: AreaId,
        id: String,
        x: i32,
        y: i32,
    },
}

/// Every area of the game plus the new-game spawn point.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    areas: BTreeMap<AreaId, Area>,
    start_area: AreaId,
    start_tile: TileCoord,
}

impl World {
    /// Validates the areas and links every interior exit door to the return
    /// position declared by the enter door leading into it. The link is made
    /// here once and never re-derived at runtime.
    pub fn link(
        areas: Vec<Area>,
        start_area: AreaId,
        start_tile: TileCoord,
    ) -> Result<Self, WorldError> {
        let mut by_id = BTreeMap::new();
        for area in areas {
            validate_area_entities(&area)?;
            let id = area.id.clone();
            if by_id.insert(id.clone(), area).is_some() {
                return Err(WorldError::DuplicateArea { area: id });
            }
        }

        let Some(start) = by_id.get(&start_area) else {
            return Err(WorldError::UnknownStartArea { area: start_area });
        };
        if !start.grid.in_bounds(start_tile) {
            return Err(WorldError::StartOutOfBounds {
                area: start_area,
                x: start_tile.x,
                y: start_tile.y,
            });
        }

        let mut links = Vec::new();
        for area in by_id.values() {
            for door in &area.doors {
                if !by_id.contains_key(&door.to_area) {
                    return Err(WorldError::UnknownDoorDestination {
                        area: area.id.clone(),
                        door: door.id.clone(),
                        to_area: door.to_area.clone(),
                    });
                }
                if door.kind == DoorKind::Enter {
                    let Some(return_position) = door.return_position else {
                        return Err(WorldError::MissingReturnPosition {
                            door: door.id.clone(),
                        });
                    };
                    links.push((door.to_area.clone(), area.id.clone(), return_position));
                }
            }
        }

        let mut linked = HashSet::new();
        for (interior_id, source_id, return_position) in links {
            let Some(interior) = by_id.get_mut(&interior_id) else {
                continue;
            };
            let exit_count = interior
                .doors
                .iter()
                .filter(|door| door.kind == DoorKind::Exit)
                .count();
            if exit_count != 1 {
                return Err(WorldError::ExitDoorCount {
                    area: interior_id,
                    count: exit_count,
                });
            }
            if !linked.insert(interior_id.clone()) {
                return Err(WorldError::ExitAlreadyLinked { area: interior_id });
            }
            if let Some(exit) = interior
                .doors
                .iter_mut()
                .find(|door| door.kind == DoorKind::Exit)
            {
                exit.return_position = Some(return_position);
                exit.to_area = source_id;
            }
        }

        for area in by_id.values() {
            for door in &area.doors {
                if door.kind == DoorKind::Exit && door.return_position.is_none() {
                    return Err(WorldError::UnlinkedExit {
                        area: area.id.clone(),
                        door: door.id.clone(),
                    });
                }
            }
        }

        Ok(Self {
            areas: by_id,
            start_area,
            start_tile,
        })
    }

    pub fn area(&self, id: &AreaId) -> Option<&Area> {
        self.areas.get(id)
    }

    pub fn area_mut(&mut self, id: &AreaId) -> Option<&mut Area> {
        self.areas.get_mut(id)
    }

    pub fn areas(&self) -> impl Iterator<Item = &Area> {
        self.areas.values()
    }

    pub fn areas_mut(&mut self) -> impl Iterator<Item = &mut Area> {
        self.areas.values_mut()
    }

    pub fn start_area(&self) -> &AreaId {
        &self.start_area
    }

    pub fn start_tile(&self) -> TileCoord {
        self.start_tile
    }

    /// Resets every node and spot to alive, as at world build.
    pub fn reset_runtime_state(&mut self) {
        for area in self.areas.values_mut() {
            for node in &mut area.nodes {
                node.respawn_at = crate::time::SimTime::ZERO;
                node.marker_until = crate::time::SimTime::ZERO;
            }
            for spot in &mut area.spots {
                spot.respawn_at = None;
            }
        }
    }
}

fn validate_area_entities(area: &Area) -> Result<(), WorldError> {
    let mut seen = HashSet::new();
    let entities = area
        .doors
        .iter()
        .map(|door| (door.id.as_str(), door.position))
        .chain(area.nodes.iter().map(|node| (node.id.as_str(), node.position)))
        .chain(area.spots.iter().map(|spot| (spot.id.as_str(), spot.position)))
        .chain(area.npcs.iter().map(|npc| (npc.id.as_str(), npc.position)));
    for (id, position) in entities {
        if !seen.insert(id) {
            return Err(WorldError::DuplicateEntity {
                area: area.id.clone(),
                id: id.to_string(),
            });
        }
        if !area.grid.in_bounds(position) {
            return Err(WorldError::EntityOutOfBounds {
                area: area.id.clone(),
                id: id.to_string(),
                x: position.x,
                y: position.y,
            });
        }
    }
    Ok(())
}
