use serde::{Deserialize, Serialize};

use crate::action::ActionSlot;
use crate::content::Tuning;
use crate::inventory::Container;
use crate::movement::Agent;
use crate::progression::Skills;
use crate::world::{AreaId, NpcId, World};

/// Everything about the player that changes during play. Owned by the
/// simulation; observers only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub area: AreaId,
    pub agent: Agent,
    pub action: ActionSlot,
    pub inventory: Container,
    pub bank: Container,
    pub coins: u64,
    pub skills: Skills,
    /// Counter whose trades are currently allowed.
    pub counter: Option<NpcId>,
    /// NPC whose counter opens when the agent arrives next to it.
    pub pending_npc: Option<NpcId>,
}

impl GameState {
    pub fn new_game(world: &World, tuning: &Tuning) -> Self {
        Self {
            area: world.start_area().clone(),
            agent: Agent::new(world.start_tile(), tuning.move_speed),
            action: ActionSlot::Idle,
            inventory: Container::new(Some(tuning.inventory_capacity)),
            bank: Container::new(tuning.bank_capacity),
            coins: tuning.starting_coins,
            skills: Skills::default(),
            counter: None,
            pending_npc: None,
        }
    }

    /// Cancels movement and everything movement implies: the open counter and
    /// any pending NPC approach.
    pub(crate) fn halt(&mut self) {
        self.agent.stop();
        self.counter = None;
        self.pending_npc = None;
    }
}
