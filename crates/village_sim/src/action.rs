use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::content::Tuning;
use crate::intent::RejectReason;
use crate::inventory::{ItemCatalog, ItemId};
use crate::progression::{SkillId, XpGain};
use crate::state::GameState;
use crate::time::SimTime;
use crate::world::{Area, NodeId, NodeKind, SpotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Chop,
    Fish,
    Mine,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [ActionKind::Chop, ActionKind::Fish, ActionKind::Mine];

    pub fn for_node(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Tree => ActionKind::Chop,
            NodeKind::Rock => ActionKind::Mine,
        }
    }

    pub fn tool(self) -> &'static str {
        match self {
            ActionKind::Chop => "axe",
            ActionKind::Fish => "fishing_rod",
            ActionKind::Mine => "pickaxe",
        }
    }

    pub fn yield_item(self) -> &'static str {
        match self {
            ActionKind::Chop => "log",
            ActionKind::Fish => "fish",
            ActionKind::Mine => "ore",
        }
    }

    pub fn skill(self) -> SkillId {
        match self {
            ActionKind::Chop => SkillId::Woodcutting,
            ActionKind::Fish => SkillId::Fishing,
            ActionKind::Mine => SkillId::Mining,
        }
    }

    pub fn duration(self, tuning: &Tuning) -> Duration {
        Duration::from_millis(match self {
            ActionKind::Chop => tuning.chop_ms,
            ActionKind::Fish => tuning.fish_ms,
            ActionKind::Mine => tuning.mine_ms,
        })
    }

    pub fn xp(self, tuning: &Tuning) -> u64 {
        match self {
            ActionKind::Chop => tuning.xp_chop,
            ActionKind::Fish => tuning.xp_fish,
            ActionKind::Mine => tuning.xp_mine,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ActionTarget {
    Node(NodeId),
    Spot(SpotId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    pub target: ActionTarget,
    pub ends_at: SimTime,
}

/// The single action slot. Every intent handler consults it the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ActionSlot {
    #[default]
    Idle,
    Busy(Action),
}

impl ActionSlot {
    pub fn is_busy(&self) -> bool {
        matches!(self, ActionSlot::Busy(_))
    }

    pub fn current(&self) -> Option<&Action> {
        match self {
            ActionSlot::Idle => None,
            ActionSlot::Busy(action) => Some(action),
        }
    }
}

/// Validates and starts a gather action on `target`.
///
/// Checks run in order: busy, tool owned, adjacency, target liveness. On
/// success movement is cancelled and the slot becomes busy until
/// `now + duration`.
pub fn start_action(
    state: &mut GameState,
    area: &Area,
    target: ActionTarget,
    now: SimTime,
    tuning: &Tuning,
) -> Result<Action, RejectReason> {
    if state.action.is_busy() {
        return Err(RejectReason::Busy);
    }

    let (kind, position, ready, depleted) = match &target {
        ActionTarget::Node(id) => {
            let node = area.node(id).ok_or_else(|| RejectReason::UnknownTarget {
                id: id.to_string(),
            })?;
            (
                ActionKind::for_node(node.kind),
                node.position,
                node.is_alive(now),
                RejectReason::NodeDepleted,
            )
        }
        ActionTarget::Spot(id) => {
            let spot = area.spot(id).ok_or_else(|| RejectReason::UnknownTarget {
                id: id.to_string(),
            })?;
            (
                ActionKind::Fish,
                spot.position,
                spot.is_ready(now),
                RejectReason::SpotDepleted,
            )
        }
    };

    let tool = ItemId::new(kind.tool());
    if !state.inventory.contains(&tool) {
        return Err(RejectReason::MissingTool { tool });
    }
    if !state.agent.tile.is_adjacent(position) {
        return Err(RejectReason::NotAdjacent);
    }
    if !ready {
        return Err(depleted);
    }

    state.halt();
    let action = Action {
        kind,
        target,
        ends_at: now.after(kind.duration(tuning)),
    };
    state.action = ActionSlot::Busy(action.clone());
    Ok(action)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionReport {
    Completed {
        kind: ActionKind,
        item: ItemId,
        /// `false` when the inventory had no room and the item was dropped.
        item_added: bool,
        xp: XpGain,
    },
    /// The target was gone; nothing was applied.
    Aborted { kind: ActionKind },
}

/// Finishes the busy action once `now` has reached its end time.
///
/// Applied in order: resolve target, add yield (a full inventory drops the
/// item but does not fail the action), grant XP and level-up coins, deplete
/// the node or spot, return to idle.
pub fn poll_completion(
    state: &mut GameState,
    area: &mut Area,
    catalog: &ItemCatalog,
    tuning: &Tuning,
    now: SimTime,
) -> Option<ActionReport> {
    let ActionSlot::Busy(action) = &state.action else {
        return None;
    };
    if now < action.ends_at {
        return None;
    }
    let action = action.clone();
    state.action = ActionSlot::Idle;
    let kind = action.kind;

    let target_exists = match &action.target {
        ActionTarget::Node(id) => area.node(id).is_some(),
        ActionTarget::Spot(id) => area.spot(id).is_some(),
    };
    if !target_exists {
        return Some(ActionReport::Aborted { kind });
    }

    let item = ItemId::new(kind.yield_item());
    let item_added = state.inventory.add(catalog, &item, 1).is_ok();

    let xp = state.skills.add_xp(kind.skill(), kind.xp(tuning));
    state.coins = state.coins.saturating_add(xp.coins_awarded());

    match &action.target {
        ActionTarget::Node(id) => {
            let respawn = match kind {
                ActionKind::Mine => tuning.rock_respawn_ms,
                _ => tuning.tree_respawn_ms,
            };
            if let Some(node) = area.node_mut(id) {
                node.harvest(now, Duration::from_millis(respawn));
            }
        }
        ActionTarget::Spot(id) => {
            if let Some(spot) = area.spot_mut(id) {
                spot.mark_fished(now, tuning.fish_spot_respawn());
            }
        }
    }

    Some(ActionReport::Completed {
        kind,
        item,
        item_added,
        xp,
    })
}
