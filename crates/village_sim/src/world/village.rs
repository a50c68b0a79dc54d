use crate::inventory::ItemId;

use super::area::{Area, AreaKind, Door, DoorKind, Npc, NpcKind, Structure};
use super::grid::{Grid, TileCoord, TileKind};
use super::ids::{AreaId, DoorId, NpcId, StructureId};
use super::nodes::{FishingSpot, NodeKind, ResourceNode};
use super::{World, WorldError};

pub const OVERWORLD_ID: &str = "overworld";
pub const SPAWN_INN_ID: &str = "spawn_inn";

const OVERWORLD_SIZE: u32 = 34;
const INTERIOR_SIZE: u32 = 10;
const MAX_HILL_LEVEL: u8 = 4;
const INTERIOR_IDS: [&str; 5] = [SPAWN_INN_ID, "house_1", "house_2", "house_3", "house_4"];

struct HouseSpec {
    id: &'static str,
    origin: (i32, i32),
    size: (u32, u32),
    door: (i32, i32),
    interior: &'static str,
}

const HOUSES: [HouseSpec; 5] = [
    HouseSpec {
        id: "inn",
        origin: (10, 8),
        size: (5, 4),
        door: (12, 11),
        interior: SPAWN_INN_ID,
    },
    HouseSpec {
        id: "house_1",
        origin: (6, 8),
        size: (4, 3),
        door: (8, 10),
        interior: "house_1",
    },
    HouseSpec {
        id: "house_2",
        origin: (15, 8),
        size: (4, 3),
        door: (16, 10),
        interior: "house_2",
    },
    HouseSpec {
        id: "house_3",
        origin: (6, 14),
        size: (4, 3),
        door: (8, 16),
        interior: "house_3",
    },
    HouseSpec {
        id: "house_4",
        origin: (15, 14),
        size: (4, 3),
        door: (16, 16),
        interior: "house_4",
    },
];

/// The shipped village: one outdoor area with a hill, a lake crossed by a
/// road bridge, five houses and their interiors. New games start inside the
/// inn.
pub fn build_village() -> Result<World, WorldError> {
    let mut areas = vec![build_overworld()];
    for id in INTERIOR_IDS {
        areas.push(build_interior(id));
    }
    World::link(areas, AreaId::new(SPAWN_INN_ID), TileCoord::new(5, 7))
}

fn build_overworld() -> Area {
    let mut grid = Grid::filled(OVERWORLD_SIZE, OVERWORLD_SIZE, TileKind::Grass, 0);
    let size = OVERWORLD_SIZE as i32;
    let extent = OVERWORLD_SIZE as f32;

    let hill_center = extent * 0.46;
    let hill_radius = extent * 0.65;
    let lake_x = extent * 0.78;
    let lake_y = extent * 0.32;
    for y in 0..size {
        for x in 0..size {
            let tile = TileCoord::new(x, y);
            let lx = (x as f32 - lake_x) / 6.0;
            let ly = (y as f32 - lake_y) / 5.0;
            if lx * lx + ly * ly < 1.0 {
                grid.set(tile, TileKind::Water, 0);
                continue;
            }
            let dx = (x as f32 - hill_center) / hill_radius;
            let dy = (y as f32 - hill_center) / hill_radius;
            let hill = (1.0 - (dx * dx + dy * dy).sqrt()).max(0.0);
            let level = ((hill * 4.0).floor() as u8).min(MAX_HILL_LEVEL);
            let kind = if level >= MAX_HILL_LEVEL {
                TileKind::Stone
            } else {
                TileKind::Grass
            };
            grid.set(tile, kind, level);
        }
    }

    for i in 0..size {
        for tile in [
            TileCoord::new(i, 0),
            TileCoord::new(i, size - 1),
            TileCoord::new(0, i),
            TileCoord::new(size - 1, i),
        ] {
            grid.set(tile, TileKind::Stone, 0);
        }
    }

    for y in 6..=18 {
        for x in 6..=18 {
            grid.set(TileCoord::new(x, y), TileKind::Grass, 1);
        }
    }

    for x in 6..size - 1 {
        grid.set(TileCoord::new(x, 12), TileKind::Road, 1);
    }
    for y in 7..=18 {
        grid.set(TileCoord::new(12, y), TileKind::Road, 1);
    }

    let mut area = Area::new(OVERWORLD_ID, AreaKind::Outdoor, grid);
    area.title = "Village".to_string();

    for house in &HOUSES {
        let door = TileCoord::new(house.door.0, house.door.1);
        area.structures.push(Structure {
            id: StructureId::new(house.id),
            origin: TileCoord::new(house.origin.0, house.origin.1),
            width: house.size.0,
            depth: house.size.1,
            door_gap: Some(door),
        });
        area.doors.push(Door {
            id: DoorId::new(format!("door_{}", house.id)),
            kind: DoorKind::Enter,
            position: door,
            from_area: AreaId::new(OVERWORLD_ID),
            to_area: AreaId::new(house.interior),
            return_position: Some(door.offset(0, 1)),
            arrival_step: (0, 1),
        });
    }

    area.npcs = vec![
        npc("shop", "Tool Vendor", (13, 14), NpcKind::Shop),
        npc(
            "buy_logs",
            "Log Buyer",
            (10, 18),
            NpcKind::Buyer {
                item: ItemId::new("log"),
            },
        ),
        npc(
            "buy_fish",
            "Fishmonger",
            (14, 18),
            NpcKind::Buyer {
                item: ItemId::new("fish"),
            },
        ),
        npc(
            "buy_ore",
            "Ore Buyer",
            (20, 14),
            NpcKind::Buyer {
                item: ItemId::new("ore"),
            },
        ),
    ];

    area.nodes = vec![
        ResourceNode::new("t1", NodeKind::Tree, TileCoord::new(22, 20)),
        ResourceNode::new("t2", NodeKind::Tree, TileCoord::new(25, 23)),
        ResourceNode::new("t3", NodeKind::Tree, TileCoord::new(28, 19)),
        ResourceNode::new("t4", NodeKind::Tree, TileCoord::new(18, 26)),
        ResourceNode::new("t5", NodeKind::Tree, TileCoord::new(10, 28)),
        ResourceNode::new("r1", NodeKind::Rock, TileCoord::new(5, 24)),
        ResourceNode::new("r2", NodeKind::Rock, TileCoord::new(7, 27)),
        ResourceNode::new("r3", NodeKind::Rock, TileCoord::new(29, 27)),
    ];

    // Spots sit in the lake beside the road bridge.
    area.spots = vec![
        FishingSpot::new("spot1", TileCoord::new(25, 11)),
        FishingSpot::new("spot2", TileCoord::new(27, 11)),
        FishingSpot::new("spot3", TileCoord::new(26, 13)),
    ];

    area
}

fn build_interior(id: &str) -> Area {
    let size = INTERIOR_SIZE as i32;
    let mut grid = Grid::filled(INTERIOR_SIZE, INTERIOR_SIZE, TileKind::Floor, 0);
    for i in 0..size {
        grid.set_kind(TileCoord::new(i, 0), TileKind::Stone);
        grid.set_kind(TileCoord::new(i, size - 1), TileKind::Stone);
        grid.set_kind(TileCoord::new(0, i), TileKind::Stone);
        grid.set_kind(TileCoord::new(size - 1, i), TileKind::Stone);
    }

    let mut area = Area::new(id, AreaKind::Interior, grid);
    area.title = id.replace('_', " ").to_uppercase();
    area.structures.push(Structure {
        id: StructureId::new(format!("{id}_table")),
        origin: TileCoord::new(3, 3),
        width: 2,
        depth: 1,
        door_gap: None,
    });
    area.doors.push(Door {
        id: DoorId::new(format!("exit_{id}")),
        kind: DoorKind::Exit,
        position: TileCoord::new(size / 2, size - 2),
        from_area: AreaId::new(id),
        to_area: AreaId::new(OVERWORLD_ID),
        return_position: None,
        arrival_step: (0, -1),
    });
    if id == SPAWN_INN_ID {
        area.npcs.push(npc("banker", "Banker", (6, 3), NpcKind::Bank));
    }
    area
}

fn npc(id: &str, name: &str, position: (i32, i32), kind: NpcKind) -> Npc {
    Npc {
        id: NpcId::new(id),
        name: name.to_string(),
        position: TileCoord::new(position.0, position.1),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::find_path;
    use crate::time::SimTime;
    use crate::world::{is_blocked, resolve_door_transition};

    fn overworld(world: &World) -> &Area {
        world.area(&AreaId::new(OVERWORLD_ID)).expect("overworld")
    }

    fn reachable_neighbor(area: &Area, from: TileCoord, target: TileCoord) -> bool {
        target.neighbors().into_iter().any(|stand| {
            stand == from
                || (!is_blocked(area, stand, SimTime::ZERO)
                    && !find_path(area, from, stand, SimTime::ZERO).is_empty())
        })
    }

    #[test]
    fn village_links_every_interior_exit_to_its_house_door() {
        let world = build_village().expect("village");
        let overworld = overworld(&world);
        for house in &HOUSES {
            let interior = world
                .area(&AreaId::new(house.interior))
                .expect("interior");
            let exit = interior.exit_door().expect("exit");
            let enter = overworld
                .door_at(TileCoord::new(house.door.0, house.door.1))
                .expect("enter door");
            assert_eq!(exit.return_position, enter.return_position);
        }
    }

    #[test]
    fn every_counter_node_and_spot_has_a_reachable_standing_tile() {
        let world = build_village().expect("village");
        let area = overworld(&world);
        let from = TileCoord::new(12, 12);
        for npc in &area.npcs {
            assert!(reachable_neighbor(area, from, npc.position), "npc {}", npc.id);
        }
        for node in &area.nodes {
            assert!(reachable_neighbor(area, from, node.position), "node {}", node.id);
        }
        for spot in &area.spots {
            assert!(reachable_neighbor(area, from, spot.position), "spot {}", spot.id);
        }
    }

    #[test]
    fn every_house_door_is_reachable_and_not_blocked() {
        let world = build_village().expect("village");
        let area = overworld(&world);
        let from = TileCoord::new(12, 13);
        for door in &area.doors {
            assert!(!is_blocked(area, door.position, SimTime::ZERO));
            assert!(!find_path(area, from, door.position, SimTime::ZERO).is_empty());
        }
    }

    #[test]
    fn entering_the_inn_lands_inside_and_leaving_returns_outside() {
        let world = build_village().expect("village");
        let area = overworld(&world);
        let enter = resolve_door_transition(&world, area, TileCoord::new(12, 11))
            .expect("enter transition");
        assert_eq!(enter.to_area, AreaId::new(SPAWN_INN_ID));
        assert_eq!(enter.arrival, TileCoord::new(5, 7));

        let inn = world.area(&AreaId::new(SPAWN_INN_ID)).expect("inn");
        assert!(inn.door_at(enter.arrival).is_none());
        let exit = resolve_door_transition(&world, inn, TileCoord::new(5, 8))
            .expect("exit transition");
        assert_eq!(exit.to_area, AreaId::new(OVERWORLD_ID));
        assert_eq!(exit.arrival, TileCoord::new(12, 12));
        assert!(area.door_at(exit.arrival).is_none());
    }
}
