use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::action::{ActionSlot, ActionTarget};
use crate::content::ContentDatabase;
use crate::inventory::{Container, ItemStack};
use crate::movement::{Agent, Segment};
use crate::progression::{SkillId, Skills};
use crate::state::GameState;
use crate::time::SimTime;
use crate::world::{is_blocked, AreaId, NodeId, NpcId, SpotId, TileCoord, World};

use super::Simulation;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot is not a JSON object")]
    NotAnObject,
    #[error("snapshot has no agent record")]
    MissingAgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub area: AreaId,
    pub id: NodeId,
    pub respawn_at: SimTime,
    pub marker_until: SimTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotRecord {
    pub area: AreaId,
    pub id: SpotId,
    pub respawn_at: Option<SimTime>,
}

/// Everything that changes during play, in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub content_hash: String,
    pub now: SimTime,
    pub state: GameState,
    pub nodes: Vec<NodeRecord>,
    pub spots: Vec<SpotRecord>,
}

impl Simulation {
    pub fn snapshot(&self) -> Snapshot {
        let mut nodes = Vec::new();
        let mut spots = Vec::new();
        for area in self.world.areas() {
            for node in &area.nodes {
                nodes.push(NodeRecord {
                    area: area.id.clone(),
                    id: node.id.clone(),
                    respawn_at: node.respawn_at,
                    marker_until: node.marker_until,
                });
            }
            for spot in &area.spots {
                spots.push(SpotRecord {
                    area: area.id.clone(),
                    id: spot.id.clone(),
                    respawn_at: spot.respawn_at,
                });
            }
        }
        Snapshot {
            version: SNAPSHOT_VERSION,
            content_hash: self.content.content_hash().to_string(),
            now: self.now,
            state: self.state.clone(),
            nodes,
            spots,
        }
    }

    /// Rebuilds a simulation from a well-formed snapshot, then repairs
    /// anything that no longer fits the world or content.
    pub fn restore(world: World, content: ContentDatabase, snapshot: Snapshot) -> Self {
        check_header(snapshot.version, &snapshot.content_hash, &content);
        let mut sim = Self {
            world,
            content,
            state: snapshot.state,
            now: snapshot.now,
            carry: Duration::ZERO,
            events: Vec::new(),
        };
        sim.restore_entities(&snapshot.nodes, &snapshot.spots);
        sim.repair();
        sim
    }

    /// Loads a snapshot one field at a time. Fields that are missing or do not
    /// parse fall back to new-game defaults; only a missing agent tile makes
    /// the snapshot unusable.
    pub fn restore_lenient(
        world: World,
        content: ContentDatabase,
        value: &Value,
    ) -> Result<Self, SnapshotError> {
        let root = value.as_object().ok_or(SnapshotError::NotAnObject)?;
        let state_value = root
            .get("state")
            .and_then(Value::as_object)
            .ok_or(SnapshotError::MissingAgent)?;
        let agent_value = state_value
            .get("agent")
            .and_then(Value::as_object)
            .ok_or(SnapshotError::MissingAgent)?;
        let tile: TileCoord = agent_value
            .get("tile")
            .and_then(|tile| serde_json::from_value(tile.clone()).ok())
            .ok_or(SnapshotError::MissingAgent)?;

        let version = field(root, "", "version", || SNAPSHOT_VERSION);
        let content_hash = field(root, "", "content_hash", String::new);
        check_header(version, &content_hash, &content);

        let mut state = GameState::new_game(&world, content.tuning());
        let defaults = state.clone();
        state.area = field(state_value, "state", "area", || defaults.area.clone());
        state.agent = Agent {
            tile,
            speed: field(agent_value, "state.agent", "speed", || defaults.agent.speed),
            path: field(agent_value, "state.agent", "path", Default::default),
            segment: field::<Option<Segment>>(agent_value, "state.agent", "segment", || None),
            facing: field(agent_value, "state.agent", "facing", || 0.0),
            goal: field(agent_value, "state.agent", "goal", || None),
        };
        state.action = field(state_value, "state", "action", ActionSlot::default);
        state.inventory = container_field(state_value, "inventory");
        state.bank = container_field(state_value, "bank");
        state.coins = field(state_value, "state", "coins", || defaults.coins);
        state.skills = skills_field(state_value);
        state.counter = field::<Option<NpcId>>(state_value, "state", "counter", || None);
        state.pending_npc = field::<Option<NpcId>>(state_value, "state", "pending_npc", || None);

        let nodes = records_field::<NodeRecord>(root, "nodes");
        let spots = records_field::<SpotRecord>(root, "spots");
        let mut sim = Self {
            world,
            content,
            state,
            now: field(root, "", "now", || SimTime::ZERO),
            carry: Duration::ZERO,
            events: Vec::new(),
        };
        sim.restore_entities(&nodes, &spots);
        sim.repair();
        Ok(sim)
    }

    /// Copies saved timestamps onto matching nodes and spots. Records for
    /// entities the world no longer has are ignored; entities without a
    /// record stay alive.
    fn restore_entities(&mut self, nodes: &[NodeRecord], spots: &[SpotRecord]) {
        self.world.reset_runtime_state();
        for record in nodes {
            let node = self
                .world
                .area_mut(&record.area)
                .and_then(|area| area.node_mut(&record.id));
            match node {
                Some(node) => {
                    node.respawn_at = record.respawn_at;
                    node.marker_until = record.marker_until;
                }
                None => info!(area = %record.area, node = %record.id, "save_node_ignored"),
            }
        }
        for record in spots {
            let spot = self
                .world
                .area_mut(&record.area)
                .and_then(|area| area.spot_mut(&record.id));
            match spot {
                Some(spot) => spot.respawn_at = record.respawn_at,
                None => info!(area = %record.area, spot = %record.id, "save_spot_ignored"),
            }
        }
    }

    fn repair(&mut self) {
        let tuning = self.content.tuning();
        let state = &mut self.state;

        let area_ok = self
            .world
            .area(&state.area)
            .is_some_and(|area| area.grid.in_bounds(state.agent.tile));
        if !area_ok {
            warn!(area = %state.area, "save_area_repaired");
            state.area = self.world.start_area().clone();
            state.agent.tile = self.world.start_tile();
            state.agent.stop();
            state.action = ActionSlot::Idle;
        }
        let Some(area) = self.world.area(&state.area) else {
            return;
        };

        if !state.agent.speed.is_finite() || state.agent.speed <= 0.0 {
            state.agent.speed = tuning.move_speed;
        }

        let path_ok = state
            .agent
            .path
            .iter()
            .all(|tile| !is_blocked(area, *tile, self.now));
        let segment_ok = state.agent.segment.map_or(true, |segment| {
            segment.from == state.agent.tile
                && segment.from.is_adjacent(segment.to)
                && segment.progress.is_finite()
                && !is_blocked(area, segment.to, self.now)
        });
        if !path_ok || !segment_ok {
            warn!(steps = state.agent.path.len(), "save_path_dropped");
            state.agent.stop();
        }

        let target_ok = match state.action.current().map(|action| &action.target) {
            None => true,
            Some(ActionTarget::Node(id)) => area.node(id).is_some(),
            Some(ActionTarget::Spot(id)) => area.spot(id).is_some(),
        };
        if !target_ok {
            warn!("save_action_dropped");
            state.action = ActionSlot::Idle;
        }
        if state.action.is_busy() {
            state.agent.stop();
        }

        if let Some(npc) = &state.counter {
            if area.npc(npc).is_none() {
                state.counter = None;
            }
        }
        if let Some(npc) = &state.pending_npc {
            if area.npc(npc).is_none() {
                state.pending_npc = None;
            }
        }

        let catalog = self.content.items();
        let inventory_stacks = state.inventory.stacks().to_vec();
        let bank_stacks = state.bank.stacks().to_vec();
        let mut inventory = Container::new(Some(tuning.inventory_capacity));
        let mut bank = Container::new(tuning.bank_capacity);
        for stack in inventory_stacks.iter().chain(bank_stacks.iter()) {
            if !catalog.contains(&stack.item) || stack.quantity == 0 {
                warn!(item = %stack.item, quantity = stack.quantity, "save_stack_dropped");
            }
        }
        for stack in usable(&inventory_stacks, catalog) {
            if inventory.add(catalog, &stack.item, stack.quantity).is_err() {
                info!(item = %stack.item, quantity = stack.quantity, "save_stack_moved_to_bank");
                if bank.add(catalog, &stack.item, stack.quantity).is_err() {
                    warn!(item = %stack.item, "save_stack_dropped");
                }
            }
        }
        for stack in usable(&bank_stacks, catalog) {
            if bank.add(catalog, &stack.item, stack.quantity).is_err() {
                warn!(item = %stack.item, quantity = stack.quantity, "save_stack_dropped");
            }
        }
        state.inventory = inventory;
        state.bank = bank;

        let mut skills = Skills::default();
        for (id, skill) in state.skills.iter() {
            skills.set_xp(id, skill.xp);
        }
        state.skills = skills;
    }
}

fn usable<'a>(
    stacks: &'a [ItemStack],
    catalog: &'a crate::inventory::ItemCatalog,
) -> impl Iterator<Item = &'a ItemStack> {
    stacks
        .iter()
        .filter(|stack| stack.quantity > 0 && catalog.contains(&stack.item))
}

fn check_header(version: u32, content_hash: &str, content: &ContentDatabase) {
    if version > SNAPSHOT_VERSION {
        warn!(
            version,
            supported = SNAPSHOT_VERSION,
            "save_version_newer_than_supported"
        );
    }
    if content_hash != content.content_hash() {
        warn!(
            saved = content_hash,
            current = content.content_hash(),
            "save_content_hash_mismatch"
        );
    }
}

fn field<T: DeserializeOwned>(
    object: &Map<String, Value>,
    parent: &str,
    key: &str,
    default: impl FnOnce() -> T,
) -> T {
    let path = if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    };
    match object.get(key) {
        None => {
            info!(field = %path, reason = "missing", "save_field_defaulted");
            default()
        }
        Some(value) => match serde_json::from_value(value.clone()) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(field = %path, reason = %error, "save_field_defaulted");
                default()
            }
        },
    }
}

/// Keeps every stack that parses; capacity is re-applied by the repair pass.
fn container_field(state: &Map<String, Value>, key: &str) -> Container {
    let mut container = Container::new(None);
    let stacks = state
        .get(key)
        .and_then(|value| value.get("stacks"))
        .and_then(Value::as_array);
    let Some(stacks) = stacks else {
        info!(field = %format!("state.{key}"), reason = "missing", "save_field_defaulted");
        return container;
    };
    for (index, value) in stacks.iter().enumerate() {
        match serde_json::from_value::<ItemStack>(value.clone()) {
            Ok(stack) => container.push_restored(stack),
            Err(error) => warn!(
                field = %format!("state.{key}.stacks[{index}]"),
                reason = %error,
                "save_field_defaulted"
            ),
        }
    }
    container
}

/// Reads each known skill's XP; unknown names are ignored and missing skills
/// start fresh.
fn skills_field(state: &Map<String, Value>) -> Skills {
    let mut skills = Skills::default();
    let Some(saved) = state.get("skills").and_then(Value::as_object) else {
        info!(field = "state.skills", reason = "missing", "save_field_defaulted");
        return skills;
    };
    for id in SkillId::ALL {
        let key = serde_json::to_value(id)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string));
        let Some(key) = key else {
            continue;
        };
        let xp = saved
            .get(&key)
            .and_then(|skill| skill.get("xp"))
            .and_then(Value::as_u64);
        if let Some(xp) = xp {
            skills.set_xp(id, xp);
        }
    }
    skills
}

fn records_field<T: DeserializeOwned>(root: &Map<String, Value>, key: &str) -> Vec<T> {
    let Some(values) = root.get(key).and_then(Value::as_array) else {
        info!(field = key, reason = "missing", "save_field_defaulted");
        return Vec::new();
    };
    values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value.clone()) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(
                    field = %format!("{key}[{index}]"),
                    reason = %error,
                    "save_field_defaulted"
                );
                None
            }
        })
        .collect()
}
