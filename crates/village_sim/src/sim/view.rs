use serde::Serialize;

use crate::action::ActionKind;
use crate::world::{AreaId, DoorId, DoorKind, NodeId, NodeKind, NpcId, SpotId, TileCoord, WorldPos};

use super::Simulation;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentView {
    pub tile: TileCoord,
    pub position: WorldPos,
    pub facing: f32,
    pub moving: bool,
    pub busy: Option<ActionKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeView {
    pub id: NodeId,
    pub kind: NodeKind,
    pub tile: TileCoord,
    pub position: WorldPos,
    pub alive: bool,
    /// Stump or rock stub is visible.
    pub marker: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotView {
    pub id: SpotId,
    pub tile: TileCoord,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoorView {
    pub id: DoorId,
    pub kind: DoorKind,
    pub tile: TileCoord,
    pub to_area: AreaId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NpcView {
    pub id: NpcId,
    pub name: String,
    pub tile: TileCoord,
    pub position: WorldPos,
}

/// Everything a renderer draws for the active area, already resolved against
/// the current clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorldView {
    pub area: AreaId,
    pub title: String,
    pub interior: bool,
    pub now_ms: u64,
    pub agent: AgentView,
    pub nodes: Vec<NodeView>,
    pub spots: Vec<SpotView>,
    pub doors: Vec<DoorView>,
    pub npcs: Vec<NpcView>,
}

impl Simulation {
    pub fn view(&self) -> Option<WorldView> {
        let area = self.current_area()?;
        let now = self.now;
        let agent = &self.state.agent;
        Some(WorldView {
            area: area.id.clone(),
            title: area.title.clone(),
            interior: area.is_interior(),
            now_ms: now.as_millis(),
            agent: AgentView {
                tile: agent.tile,
                position: agent.world_position(area),
                facing: agent.facing,
                moving: agent.is_moving(),
                busy: self.busy_with(),
            },
            nodes: area
                .nodes
                .iter()
                .map(|node| NodeView {
                    id: node.id.clone(),
                    kind: node.kind,
                    tile: node.position,
                    position: area.grid.tile_to_world(node.position),
                    alive: node.is_alive(now),
                    marker: node.shows_marker(now),
                })
                .collect(),
            spots: area
                .spots
                .iter()
                .map(|spot| SpotView {
                    id: spot.id.clone(),
                    tile: spot.position,
                    ready: spot.is_ready(now),
                })
                .collect(),
            doors: area
                .doors
                .iter()
                .map(|door| DoorView {
                    id: door.id.clone(),
                    kind: door.kind,
                    tile: door.position,
                    to_area: door.to_area.clone(),
                })
                .collect(),
            npcs: area
                .npcs
                .iter()
                .map(|npc| NpcView {
                    id: npc.id.clone(),
                    name: npc.name.clone(),
                    tile: npc.position,
                    position: area.grid.tile_to_world(npc.position),
                })
                .collect(),
        })
    }
}
