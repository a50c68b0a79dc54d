mod snapshot;
mod trade;
mod view;

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::action::{poll_completion, start_action, ActionKind, ActionReport, ActionTarget};
use crate::content::ContentDatabase;
use crate::intent::{Applied, Intent, RejectReason, SimEvent, TargetRef};
use crate::movement::{advance, plan_move, MoveEvent};
use crate::nav::best_stand_tile;
use crate::state::GameState;
use crate::time::{duration_to_millis, SimTime};
use crate::world::{resolve_door_transition, Area, NodeKind, NpcId, TileCoord, World};

pub use snapshot::{Snapshot, SnapshotError, SNAPSHOT_VERSION};
pub use view::{AgentView, DoorView, NodeView, NpcView, SpotView, WorldView};

/// The owned simulation context: the world, the content it was built with,
/// the player's state and the clock. Every mutation goes through
/// [`Simulation::apply`] or [`Simulation::tick`].
#[derive(Debug)]
pub struct Simulation {
    world: World,
    content: ContentDatabase,
    state: GameState,
    now: SimTime,
    /// Sub-millisecond remainder of ticked time not yet on the clock.
    carry: Duration,
    events: Vec<SimEvent>,
}

impl Simulation {
    pub fn new(world: World, content: ContentDatabase) -> Self {
        let state = GameState::new_game(&world, content.tuning());
        Self {
            world,
            content,
            state,
            now: SimTime::ZERO,
            carry: Duration::ZERO,
            events: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn content(&self) -> &ContentDatabase {
        &self.content
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn current_area(&self) -> Option<&Area> {
        self.world.area(&self.state.area)
    }

    /// Takes every event produced since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }

    /// Validates `intent` and applies it, or declines it leaving state as it
    /// was.
    pub fn apply(&mut self, intent: Intent) -> Result<Applied, RejectReason> {
        let name = intent.name();
        let result = self.dispatch(intent);
        match &result {
            Ok(applied) => debug!(intent = name, result = ?applied, "intent_applied"),
            Err(reason) => info!(
                intent = name,
                reason = reason.code(),
                detail = %reason,
                "intent_rejected"
            ),
        }
        result
    }

    fn dispatch(&mut self, intent: Intent) -> Result<Applied, RejectReason> {
        if intent == Intent::Reset {
            return Ok(self.reset());
        }
        if self.state.action.is_busy() {
            return Err(RejectReason::Busy);
        }
        match intent {
            Intent::MoveTo(tile) => self.move_to(tile),
            Intent::Approach(target) => self.approach(target),
            Intent::Interact => self.interact(),
            Intent::OpenShop(npc) => self.open_counter(npc),
            Intent::CloseCounter => {
                self.state.counter = None;
                Ok(Applied::CounterClosed)
            }
            Intent::Buy(item) => trade::buy(&mut self.state, &self.world, &self.content, &item),
            Intent::Sell { item, quantity } => {
                trade::sell(&mut self.state, &self.world, &self.content, &item, quantity)
            }
            Intent::Deposit { item, quantity } => {
                trade::deposit(&mut self.state, &self.world, &self.content, &item, quantity)
            }
            Intent::Withdraw { item, quantity } => {
                trade::withdraw(&mut self.state, &self.world, &self.content, &item, quantity)
            }
            Intent::DepositAll => trade::deposit_all(&mut self.state, &self.world, &self.content),
            Intent::WithdrawAll => trade::withdraw_all(&mut self.state, &self.world, &self.content),
            Intent::Reset => Ok(self.reset()),
        }
    }

    /// Advances the clock by `dt`, capped at the tuned maximum, then polls
    /// the busy action and, when idle, moves the agent.
    pub fn tick(&mut self, dt: Duration) {
        let dt = match self.content.tuning().max_tick() {
            Some(max) => dt.min(max),
            None => dt,
        };
        let elapsed = self.carry.saturating_add(dt);
        let whole = Duration::from_millis(duration_to_millis(elapsed));
        self.carry = elapsed.saturating_sub(whole);
        self.now = self.now.after(whole);
        self.poll_action();
        if self.state.action.is_busy() {
            return;
        }
        self.advance_movement(dt);
    }

    fn move_to(&mut self, tile: TileCoord) -> Result<Applied, RejectReason> {
        let area = active_area(&self.world, &self.state)?;
        let steps = plan_move(&mut self.state.agent, area, tile, self.now)?;
        self.state.counter = None;
        self.state.pending_npc = None;
        Ok(moving_or_in_place(tile, steps))
    }

    /// Walks to the best standing tile next to `target`, or onto it for
    /// doors. Approaching an NPC opens its counter on arrival.
    fn approach(&mut self, target: TargetRef) -> Result<Applied, RejectReason> {
        let area = active_area(&self.world, &self.state)?;
        let from = self.state.agent.tile;
        let (position, npc) = match &target {
            TargetRef::Npc(id) => (area.npc(id).map(|npc| npc.position), Some(id.clone())),
            TargetRef::Node(id) => (area.node(id).map(|node| node.position), None),
            TargetRef::Spot(id) => (area.spot(id).map(|spot| spot.position), None),
            TargetRef::Door(id) => {
                let door = area.door(id).ok_or_else(|| unknown_target(&target))?;
                let steps = plan_move(&mut self.state.agent, area, door.position, self.now)?;
                self.state.counter = None;
                self.state.pending_npc = None;
                return Ok(moving_or_in_place(door.position, steps));
            }
        };
        let position = position.ok_or_else(|| unknown_target(&target))?;
        let (stand, path) = best_stand_tile(area, from, position, self.now)
            .ok_or(RejectReason::Blocked { tile: position })?;

        if path.is_empty() {
            self.state.halt();
            if let Some(npc) = npc {
                return Ok(self.open_counter_unchecked(npc));
            }
            return Ok(Applied::InPlace);
        }
        let steps = path.len();
        self.state.counter = None;
        self.state.agent.commit_path(path);
        self.state.pending_npc = npc;
        Ok(Applied::Moving { goal: stand, steps })
    }

    /// Resolves what the agent faces, by priority: an NPC, a door, a fishing
    /// spot, a live tree, a live rock.
    fn interact(&mut self) -> Result<Applied, RejectReason> {
        let area = active_area(&self.world, &self.state)?;
        let here = self.state.agent.tile;
        let neighbors = here.neighbors();
        let adjacent = |position: TileCoord| neighbors.contains(&position);

        if let Some(npc) = area.npcs.iter().find(|npc| adjacent(npc.position)) {
            let npc = npc.id.clone();
            self.state.halt();
            return Ok(self.open_counter_unchecked(npc));
        }

        if let Some(door) = area.doors.iter().find(|door| adjacent(door.position)) {
            let goal = door.position;
            let steps = plan_move(&mut self.state.agent, area, goal, self.now)?;
            self.state.counter = None;
            self.state.pending_npc = None;
            return Ok(moving_or_in_place(goal, steps));
        }

        let mut depleted = None;
        let mut target = None;
        if !area.is_interior() {
            for spot in area.spots.iter().filter(|spot| adjacent(spot.position)) {
                if spot.is_ready(self.now) {
                    target = Some(ActionTarget::Spot(spot.id.clone()));
                    break;
                }
                depleted.get_or_insert(RejectReason::SpotDepleted);
            }
        }
        if target.is_none() {
            for kind in [NodeKind::Tree, NodeKind::Rock] {
                let nodes = area
                    .nodes
                    .iter()
                    .filter(|node| node.kind == kind && adjacent(node.position));
                for node in nodes {
                    if node.is_alive(self.now) {
                        target = Some(ActionTarget::Node(node.id.clone()));
                        break;
                    }
                    depleted.get_or_insert(RejectReason::NodeDepleted);
                }
                if target.is_some() {
                    break;
                }
            }
        }

        match target {
            Some(target) => self.start(target),
            None => Err(depleted.unwrap_or(RejectReason::NothingToInteract)),
        }
    }

    fn start(&mut self, target: ActionTarget) -> Result<Applied, RejectReason> {
        let area = active_area(&self.world, &self.state)?;
        let action = start_action(
            &mut self.state,
            area,
            target,
            self.now,
            self.content.tuning(),
        )?;
        info!(
            kind = ?action.kind,
            target = ?action.target,
            ends_at_ms = action.ends_at.as_millis(),
            "action_started"
        );
        self.events.push(SimEvent::ActionStarted {
            kind: action.kind,
            target: action.target.clone(),
        });
        Ok(Applied::ActionStarted {
            kind: action.kind,
            target: action.target,
        })
    }

    fn open_counter(&mut self, npc: NpcId) -> Result<Applied, RejectReason> {
        let area = active_area(&self.world, &self.state)?;
        let position = area
            .npc(&npc)
            .map(|found| found.position)
            .ok_or_else(|| RejectReason::UnknownTarget {
                id: npc.to_string(),
            })?;
        if !self.state.agent.tile.is_adjacent(position) {
            return Err(RejectReason::NotAdjacent);
        }
        self.state.halt();
        Ok(self.open_counter_unchecked(npc))
    }

    fn open_counter_unchecked(&mut self, npc: NpcId) -> Applied {
        info!(npc = %npc, "counter_opened");
        self.state.counter = Some(npc.clone());
        self.events.push(SimEvent::CounterOpened { npc: npc.clone() });
        Applied::CounterOpened { npc }
    }

    /// Discards the whole game: fresh state and every node back to alive.
    /// The clock keeps running so it stays monotonic.
    fn reset(&mut self) -> Applied {
        self.world.reset_runtime_state();
        self.state = GameState::new_game(&self.world, self.content.tuning());
        info!(now_ms = self.now.as_millis(), "game_reset");
        Applied::Reset
    }

    fn poll_action(&mut self) {
        let Some(area) = self.world.area_mut(&self.state.area) else {
            return;
        };
        let report = poll_completion(
            &mut self.state,
            area,
            self.content.items(),
            self.content.tuning(),
            self.now,
        );
        match report {
            None => {}
            Some(ActionReport::Aborted { kind }) => {
                warn!(kind = ?kind, "action_aborted");
                self.events.push(SimEvent::ActionAborted { kind });
            }
            Some(ActionReport::Completed {
                kind,
                item,
                item_added,
                xp,
            }) => {
                info!(
                    kind = ?kind,
                    item = %item,
                    item_added,
                    xp = xp.amount,
                    "action_completed"
                );
                self.events.push(SimEvent::ActionCompleted {
                    kind,
                    item: item.clone(),
                    item_added,
                    xp: xp.amount,
                });
                if !item_added {
                    info!(item = %item, "inventory_full");
                    self.events.push(SimEvent::InventoryFull { item });
                }
                if xp.levels_gained > 0 {
                    let coins = xp.coins_awarded();
                    info!(
                        skill = xp.skill.name(),
                        level = xp.new_level,
                        coins,
                        "level_up"
                    );
                    self.events.push(SimEvent::LevelUp {
                        skill: xp.skill,
                        level: xp.new_level,
                        coins,
                    });
                }
            }
        }
    }

    fn advance_movement(&mut self, dt: Duration) {
        let Some(area) = self.world.area(&self.state.area) else {
            warn!(area = %self.state.area, "active_area_missing");
            return;
        };
        match advance(&mut self.state.agent, area, dt, self.now) {
            MoveEvent::Idle | MoveEvent::Moving => {}
            MoveEvent::Arrived { tile, path_done } => self.on_arrival(tile, path_done),
            MoveEvent::Blocked { goal } => {
                info!(
                    goal = ?goal.map(|tile| (tile.x, tile.y)),
                    "path_blocked"
                );
                self.state.pending_npc = None;
                self.events.push(SimEvent::PathBlocked { goal });
            }
        }
    }

    /// Runs once per discrete tile change: door transitions first, then the
    /// pending NPC check when the path is done.
    fn on_arrival(&mut self, tile: TileCoord, path_done: bool) {
        let Some(area) = self.world.area(&self.state.area) else {
            return;
        };
        if let Some(transition) = resolve_door_transition(&self.world, area, tile) {
            self.state.halt();
            self.state.area = transition.to_area.clone();
            self.state.agent.tile = transition.arrival;
            info!(
                door = %transition.door,
                from = %transition.from_area,
                to = %transition.to_area,
                x = transition.arrival.x,
                y = transition.arrival.y,
                "area_changed"
            );
            self.events.push(SimEvent::AreaChanged {
                from: transition.from_area,
                to: transition.to_area,
                arrival: transition.arrival,
            });
            return;
        }

        if !path_done {
            return;
        }
        let Some(npc) = self.state.pending_npc.take() else {
            return;
        };
        let in_reach = area
            .npc(&npc)
            .is_some_and(|found| found.position.is_adjacent(tile));
        if in_reach {
            self.open_counter_unchecked(npc);
        }
    }

    /// Kind of the action in progress, if any.
    pub fn busy_with(&self) -> Option<ActionKind> {
        self.state.action.current().map(|action| action.kind)
    }
}

fn active_area<'a>(world: &'a World, state: &GameState) -> Result<&'a Area, RejectReason> {
    world
        .area(&state.area)
        .ok_or_else(|| RejectReason::UnknownTarget {
            id: state.area.to_string(),
        })
}

fn unknown_target(target: &TargetRef) -> RejectReason {
    let id = match target {
        TargetRef::Npc(id) => id.to_string(),
        TargetRef::Node(id) => id.to_string(),
        TargetRef::Spot(id) => id.to_string(),
        TargetRef::Door(id) => id.to_string(),
    };
    RejectReason::UnknownTarget { id }
}

fn moving_or_in_place(goal: TileCoord, steps: usize) -> Applied {
    if steps == 0 {
        Applied::InPlace
    } else {
        Applied::Moving { goal, steps }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ItemId;
    use crate::progression::SkillId;
    use crate::world::{build_village, AreaId, DoorId, NodeState, OVERWORLD_ID, SPAWN_INN_ID};

    const FRAME: Duration = Duration::from_millis(16);

    fn sim() -> Simulation {
        Simulation::new(
            build_village().expect("village"),
            ContentDatabase::builtin(),
        )
    }

    fn outdoor_sim(tile: TileCoord) -> Simulation {
        let mut sim = sim();
        sim.state.area = AreaId::new(OVERWORLD_ID);
        sim.state.agent.tile = tile;
        sim
    }

    fn run_for(sim: &mut Simulation, total: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < total {
            sim.tick(FRAME);
            elapsed += FRAME;
        }
    }

    fn run_until_idle(sim: &mut Simulation) {
        for _ in 0..2_000 {
            if !sim.state.agent.is_moving() && !sim.state.action.is_busy() {
                return;
            }
            sim.tick(FRAME);
        }
        panic!("simulation never settled");
    }

    fn give(sim: &mut Simulation, item: &str) {
        let catalog = sim.content.items().clone();
        sim.state
            .inventory
            .add(&catalog, &ItemId::new(item), 1)
            .expect("give item");
    }

    #[test]
    fn tick_is_clamped_to_the_tuned_maximum() {
        let mut sim = sim();
        sim.tick(Duration::from_secs(5));
        assert_eq!(sim.now(), SimTime(33));
    }

    #[test]
    fn chop_scenario_yields_log_xp_and_stump() {
        // Tree t1 stands at (22, 20); the agent waits directly below it.
        let mut sim = outdoor_sim(TileCoord::new(22, 21));
        give(&mut sim, "axe");

        let applied = sim.apply(Intent::Interact).expect("interact");
        assert!(matches!(
            applied,
            Applied::ActionStarted {
                kind: ActionKind::Chop,
                ..
            }
        ));
        assert_eq!(sim.apply(Intent::Interact), Err(RejectReason::Busy));

        run_for(&mut sim, Duration::from_millis(900));
        assert!(!sim.state.action.is_busy());
        assert_eq!(sim.state.inventory.count(&ItemId::new("log")), 1);
        assert_eq!(sim.state.skills.get(SkillId::Woodcutting).xp, 25);

        let area = sim.current_area().expect("area");
        let tree = area
            .node(&crate::world::NodeId::new("t1"))
            .expect("tree");
        assert_eq!(tree.state(sim.now()), NodeState::DepletedWithMarker);
        assert!(tree.respawn_at > sim.now());

        assert_eq!(sim.apply(Intent::Interact), Err(RejectReason::NodeDepleted));
        let events = sim.drain_events();
        assert!(events
            .iter()
            .any(|event| matches!(event, SimEvent::ActionCompleted { item_added: true, .. })));
    }

    #[test]
    fn busy_rejects_movement_but_accepts_reset() {
        let mut sim = outdoor_sim(TileCoord::new(22, 21));
        give(&mut sim, "axe");
        sim.apply(Intent::Interact).expect("interact");
        assert_eq!(
            sim.apply(Intent::MoveTo(TileCoord::new(20, 21))),
            Err(RejectReason::Busy)
        );
        assert_eq!(sim.apply(Intent::Reset), Ok(Applied::Reset));
        assert!(!sim.state.action.is_busy());
        assert_eq!(sim.state.area, AreaId::new(SPAWN_INN_ID));
    }

    #[test]
    fn interact_without_tool_is_rejected_and_state_unchanged() {
        let mut sim = outdoor_sim(TileCoord::new(22, 21));
        let before = sim.state.clone();
        assert_eq!(
            sim.apply(Intent::Interact),
            Err(RejectReason::MissingTool {
                tool: ItemId::new("axe")
            })
        );
        assert_eq!(sim.state, before);
    }

    #[test]
    fn interact_with_nothing_around_is_rejected() {
        let mut sim = outdoor_sim(TileCoord::new(2, 2));
        assert_eq!(
            sim.apply(Intent::Interact),
            Err(RejectReason::NothingToInteract)
        );
    }

    #[test]
    fn walking_out_of_the_inn_changes_area_once() {
        let mut sim = sim();
        sim.apply(Intent::Approach(TargetRef::Door(DoorId::new(
            "exit_spawn_inn",
        ))))
        .expect("approach door");
        run_until_idle(&mut sim);

        assert_eq!(sim.state.area, AreaId::new(OVERWORLD_ID));
        assert_eq!(sim.state.agent.tile, TileCoord::new(12, 12));
        let changes: Vec<_> = sim
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, SimEvent::AreaChanged { .. }))
            .collect();
        assert_eq!(
            changes,
            vec![SimEvent::AreaChanged {
                from: AreaId::new(SPAWN_INN_ID),
                to: AreaId::new(OVERWORLD_ID),
                arrival: TileCoord::new(12, 12),
            }]
        );
    }

    #[test]
    fn entering_the_inn_lands_inside_its_exit_door() {
        let mut sim = outdoor_sim(TileCoord::new(12, 12));
        let applied = sim.apply(Intent::Interact).expect("door is adjacent");
        assert!(matches!(applied, Applied::Moving { .. }));
        run_until_idle(&mut sim);
        assert_eq!(sim.state.area, AreaId::new(SPAWN_INN_ID));
        assert_eq!(sim.state.agent.tile, TileCoord::new(5, 7));
    }

    #[test]
    fn approaching_an_npc_opens_its_counter_on_arrival() {
        let mut sim = outdoor_sim(TileCoord::new(12, 13));
        let applied = sim
            .apply(Intent::Approach(TargetRef::Npc(NpcId::new("shop"))))
            .expect("approach");
        assert!(matches!(applied, Applied::Moving { .. }));
        assert_eq!(sim.state.counter, None);
        run_until_idle(&mut sim);
        assert_eq!(sim.state.counter, Some(NpcId::new("shop")));
        assert!(sim
            .drain_events()
            .contains(&SimEvent::CounterOpened {
                npc: NpcId::new("shop")
            }));
    }

    #[test]
    fn movement_closes_the_counter() {
        let mut sim = outdoor_sim(TileCoord::new(13, 13));
        sim.apply(Intent::OpenShop(NpcId::new("shop")))
            .expect("shop adjacent");
        assert_eq!(sim.state.counter, Some(NpcId::new("shop")));
        sim.apply(Intent::MoveTo(TileCoord::new(13, 12)))
            .expect("move");
        assert_eq!(sim.state.counter, None);
    }

    #[test]
    fn open_shop_requires_adjacency() {
        let mut sim = outdoor_sim(TileCoord::new(2, 2));
        assert_eq!(
            sim.apply(Intent::OpenShop(NpcId::new("shop"))),
            Err(RejectReason::NotAdjacent)
        );
        assert_eq!(
            sim.apply(Intent::OpenShop(NpcId::new("nobody"))),
            Err(RejectReason::UnknownTarget {
                id: "nobody".to_string()
            })
        );
    }

    #[test]
    fn move_onto_blocked_tile_is_rejected() {
        let mut sim = outdoor_sim(TileCoord::new(2, 2));
        let error = sim
            .apply(Intent::MoveTo(TileCoord::new(13, 14)))
            .expect_err("npc tile");
        assert_eq!(error.code(), "blocked");
        assert!(!sim.state.agent.is_moving());
    }

    #[test]
    fn action_completion_waits_for_the_clock() {
        let mut sim = outdoor_sim(TileCoord::new(22, 21));
        give(&mut sim, "axe");
        sim.apply(Intent::Interact).expect("interact");
        run_for(&mut sim, Duration::from_millis(880));
        assert!(sim.state.action.is_busy());
        assert_eq!(sim.busy_with(), Some(ActionKind::Chop));
        run_for(&mut sim, Duration::from_millis(32));
        assert!(!sim.state.action.is_busy());
    }
}
