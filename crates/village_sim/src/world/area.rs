use serde::{Deserialize, Serialize};

use crate::inventory::ItemId;

use super::grid::{Grid, TileCoord};
use super::ids::{AreaId, DoorId, NodeId, NpcId, SpotId, StructureId};
use super::nodes::{FishingSpot, ResourceNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaKind {
    Outdoor,
    Interior,
}

/// Rectangular solid footprint with an optional walkable door gap.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub id: StructureId,
    pub origin: TileCoord,
    pub width: u32,
    pub depth: u32,
    pub door_gap: Option<TileCoord>,
}

impl Structure {
    pub fn contains(&self, tile: TileCoord) -> bool {
        let dx = tile.x - self.origin.x;
        let dy = tile.y - self.origin.y;
        dx >= 0 && dy >= 0 && (dx as u32) < self.width && (dy as u32) < self.depth
    }

    pub fn blocks(&self, tile: TileCoord) -> bool {
        self.contains(tile) && self.door_gap != Some(tile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorKind {
    Enter,
    Exit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Door {
    pub id: DoorId,
    pub kind: DoorKind,
    pub position: TileCoord,
    pub from_area: AreaId,
    pub to_area: AreaId,
    /// Where the agent lands in `to_area` when leaving through an exit door.
    /// Enter doors declare it; exit doors receive it when the world is linked.
    pub return_position: Option<TileCoord>,
    /// Step from an exit door to the tile the agent arrives on.
    pub arrival_step: (i32, i32),
}

impl Door {
    pub fn arrival_tile(&self) -> TileCoord {
        self.position.offset(self.arrival_step.0, self.arrival_step.1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NpcKind {
    Shop,
    Buyer { item: ItemId },
    Bank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Npc {
    pub id: NpcId,
    pub name: String,
    pub position: TileCoord,
    pub kind: NpcKind,
}

/// One discrete map region. Topology is fixed after world build; only node
/// and spot timestamps change at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub id: AreaId,
    pub title: String,
    pub kind: AreaKind,
    pub grid: Grid,
    pub structures: Vec<Structure>,
    pub doors: Vec<Door>,
    pub nodes: Vec<ResourceNode>,
    pub spots: Vec<FishingSpot>,
    pub npcs: Vec<Npc>,
}

impl Area {
    pub fn new(id: impl Into<AreaId>, kind: AreaKind, grid: Grid) -> Self {
        let id = id.into();
        Self {
            title: id.to_string(),
            id,
            kind,
            grid,
            structures: Vec::new(),
            doors: Vec::new(),
            nodes: Vec::new(),
            spots: Vec::new(),
            npcs: Vec::new(),
        }
    }

    pub fn is_interior(&self) -> bool {
        self.kind == AreaKind::Interior
    }

    pub fn door_at(&self, tile: TileCoord) -> Option<&Door> {
        self.doors.iter().find(|door| door.position == tile)
    }

    pub fn door(&self, id: &DoorId) -> Option<&Door> {
        self.doors.iter().find(|door| &door.id == id)
    }

    pub fn npc_at(&self, tile: TileCoord) -> Option<&Npc> {
        self.npcs.iter().find(|npc| npc.position == tile)
    }

    pub fn npc(&self, id: &NpcId) -> Option<&Npc> {
        self.npcs.iter().find(|npc| &npc.id == id)
    }

    pub fn node_at(&self, tile: TileCoord) -> Option<&ResourceNode> {
        self.nodes.iter().find(|node| node.position == tile)
    }

    pub fn node(&self, id: &NodeId) -> Option<&ResourceNode> {
        self.nodes.iter().find(|node| &node.id == id)
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut ResourceNode> {
        self.nodes.iter_mut().find(|node| &node.id == id)
    }

    pub fn spot_at(&self, tile: TileCoord) -> Option<&FishingSpot> {
        self.spots.iter().find(|spot| spot.position == tile)
    }

    pub fn spot(&self, id: &SpotId) -> Option<&FishingSpot> {
        self.spots.iter().find(|spot| &spot.id == id)
    }

    pub fn spot_mut(&mut self, id: &SpotId) -> Option<&mut FishingSpot> {
        self.spots.iter_mut().find(|spot| &spot.id == id)
    }

    pub fn exit_door(&self) -> Option<&Door> {
        self.doors.iter().find(|door| door.kind == DoorKind::Exit)
    }
}
