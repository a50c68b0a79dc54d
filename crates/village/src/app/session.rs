use std::collections::VecDeque;
use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use village_sim::{
    ActionKind, Applied, ConsoleCommand, ConsoleCommandRegistry, ContentDatabase, FixedStepLoop,
    Intent, RejectReason, SimEvent, SimTime, Simulation, World,
};

use super::bootstrap::AppWiring;
use super::save::{SaveError, SaveSlot};

const IDLE_FRAME_SLEEP: Duration = Duration::from_millis(2);

/// What the caller should do after a line was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineOutcome {
    Continue,
    Quit,
}

/// Console-driven play: parses lines, applies them to the simulation and
/// renders the results as text.
pub(crate) struct Session {
    sim: Simulation,
    world: World,
    content: ContentDatabase,
    slot: SaveSlot,
    registry: ConsoleCommandRegistry,
    wait_until: Option<SimTime>,
    pending_lines: VecDeque<String>,
}

impl Session {
    pub(crate) fn new(
        sim: Simulation,
        world: World,
        content: ContentDatabase,
        slot: SaveSlot,
    ) -> Self {
        Self {
            sim,
            world,
            content,
            slot,
            registry: ConsoleCommandRegistry::with_builtins(),
            wait_until: None,
            pending_lines: VecDeque::new(),
        }
    }

    pub(crate) fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub(crate) fn sim_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub(crate) fn queue_line(&mut self, line: String) {
        self.pending_lines.push_back(line);
    }

    pub(crate) fn is_waiting(&self) -> bool {
        self.wait_until.is_some()
    }

    pub(crate) fn has_pending_lines(&self) -> bool {
        !self.pending_lines.is_empty()
    }

    /// Handles queued lines until one starts a wait, the queue empties or a
    /// line asks to quit. Output lines are appended to `out`.
    pub(crate) fn process_pending(&mut self, out: &mut Vec<String>) -> LineOutcome {
        if let Some(deadline) = self.wait_until {
            if self.sim.now() < deadline {
                return LineOutcome::Continue;
            }
            self.wait_until = None;
        }

        while let Some(line) = self.pending_lines.pop_front() {
            if self.handle_line(&line, out) == LineOutcome::Quit {
                return LineOutcome::Quit;
            }
            if self.wait_until.is_some() {
                break;
            }
        }
        LineOutcome::Continue
    }

    pub(crate) fn handle_line(&mut self, line: &str, out: &mut Vec<String>) -> LineOutcome {
        let command = match self.registry.parse_line(line) {
            Ok(Some(command)) => command,
            Ok(None) => return LineOutcome::Continue,
            Err(error) => {
                out.push(format!("error: {error}"));
                return LineOutcome::Continue;
            }
        };

        match command {
            ConsoleCommand::Intent(intent) => self.apply_intent(intent, out),
            ConsoleCommand::Wait(duration) => {
                self.wait_until = Some(self.sim.now().after(duration));
            }
            ConsoleCommand::Status => out.extend(self.status_lines()),
            ConsoleCommand::View => match self.sim.view() {
                Some(view) => match serde_json::to_string_pretty(&view) {
                    Ok(json) => out.push(json),
                    Err(error) => out.push(format!("error: encode view: {error}")),
                },
                None => out.push("error: current area is missing".to_string()),
            },
            ConsoleCommand::Save => match self.save() {
                Ok(()) => out.push(format!("saved to {}", self.slot.path().display())),
                Err(error) => {
                    warn!(error = %error, "save_failed");
                    out.push(format!("error: {error}"));
                }
            },
            ConsoleCommand::Load => self.load(out),
            ConsoleCommand::Help => out.extend(self.registry.help_lines()),
            ConsoleCommand::Quit => return LineOutcome::Quit,
        }
        LineOutcome::Continue
    }

    /// Renders events the simulation raised since the last call.
    pub(crate) fn drain_event_lines(&mut self, out: &mut Vec<String>) {
        let events = self.sim.drain_events();
        for event in events {
            out.push(self.describe_event(&event));
        }
    }

    pub(crate) fn save(&self) -> Result<(), SaveError> {
        self.slot.write(&self.sim)
    }

    fn load(&mut self, out: &mut Vec<String>) {
        if !self.slot.exists() {
            out.push(format!("no save at {}", self.slot.path().display()));
            return;
        }
        match self.slot.read(self.world.clone(), self.content.clone()) {
            Ok(sim) => {
                self.sim = sim;
                self.wait_until = None;
                out.push(format!(
                    "loaded {} at {}",
                    self.slot.path().display(),
                    self.sim.now().as_millis()
                ));
            }
            Err(error) => {
                warn!(error = %error, "save_load_failed");
                out.push(format!("error: {error}"));
            }
        }
    }

    fn apply_intent(&mut self, intent: Intent, out: &mut Vec<String>) {
        match self.sim.apply(intent) {
            Ok(applied) => out.extend(self.describe_applied(&applied)),
            Err(reason) => out.push(describe_rejection(&reason)),
        }
    }

    fn label(&self, item: &village_sim::ItemId) -> String {
        self.sim.content().items().label(item).to_string()
    }

    /// Starts and counter openings are left to the matching events.
    fn describe_applied(&self, applied: &Applied) -> Option<String> {
        let line = match applied {
            Applied::Moving { goal, steps } => {
                format!("walking to ({}, {}), {steps} tiles", goal.x, goal.y)
            }
            Applied::InPlace => "already there".to_string(),
            Applied::ActionStarted { .. } | Applied::CounterOpened { .. } => return None,
            Applied::CounterClosed => "counter closed".to_string(),
            Applied::Bought { item, price } => {
                format!("bought {} for {price} coins", self.label(item))
            }
            Applied::Sold {
                item,
                quantity,
                coins,
            } => format!("sold {quantity} {} for {coins} coins", self.label(item)),
            Applied::Deposited { item, quantity } => {
                format!("deposited {quantity} {}", self.label(item))
            }
            Applied::Withdrawn { item, quantity } => {
                format!("withdrew {quantity} {}", self.label(item))
            }
            Applied::DepositedAll(bulk) => {
                let mut line = format!("deposited {} items", bulk.units_moved);
                if bulk.stopped_full {
                    line.push_str(", bank is full");
                }
                line
            }
            Applied::WithdrawnAll(bulk) => {
                let mut line = format!("withdrew {} items", bulk.units_moved);
                if bulk.stopped_full {
                    line.push_str(", inventory is full");
                }
                line
            }
            Applied::Reset => "new game".to_string(),
        };
        Some(line)
    }

    fn describe_event(&self, event: &SimEvent) -> String {
        match event {
            SimEvent::ActionStarted { kind, .. } => format!("[{}] started", action_verb(*kind)),
            SimEvent::ActionCompleted {
                kind,
                item,
                item_added,
                xp,
            } => {
                if *item_added {
                    format!(
                        "[{}] you get some {} (+{xp} xp)",
                        action_verb(*kind),
                        self.label(item)
                    )
                } else {
                    format!("[{}] +{xp} xp", action_verb(*kind))
                }
            }
            SimEvent::ActionAborted { kind } => format!("[{}] stopped", action_verb(*kind)),
            SimEvent::InventoryFull { item } => {
                format!("your inventory is too full to hold {}", self.label(item))
            }
            SimEvent::LevelUp {
                skill,
                level,
                coins,
            } => format!(
                "{} level {level}! (+{coins} coins)",
                skill.name()
            ),
            SimEvent::AreaChanged { to, arrival, .. } => {
                format!("entered {to} at ({}, {})", arrival.x, arrival.y)
            }
            SimEvent::CounterOpened { npc } => format!("counter open: {npc}"),
            SimEvent::PathBlocked { .. } => "the way is blocked".to_string(),
        }
    }

    fn status_lines(&self) -> Vec<String> {
        let state = self.sim.state();
        let mut lines = vec![
            format!(
                "area {} tile ({}, {}) time {}ms",
                state.area,
                state.agent.tile.x,
                state.agent.tile.y,
                self.sim.now().as_millis()
            ),
            format!(
                "coins {} action {}",
                state.coins,
                self.sim.busy_with().map_or("idle", action_verb)
            ),
        ];
        if let Some(npc) = &state.counter {
            lines.push(format!("counter {npc}"));
        }
        lines.push(format!(
            "inventory [{}]",
            self.stack_summary(state.inventory.stacks())
        ));
        lines.push(format!("bank [{}]", self.stack_summary(state.bank.stacks())));
        let trained = state
            .skills
            .iter()
            .filter(|(_, skill)| skill.xp > 0)
            .map(|(id, skill)| format!("{} {} ({} xp)", id.name(), skill.level, skill.xp))
            .collect::<Vec<_>>();
        lines.push(format!(
            "total level {} [{}]",
            state.skills.total_level(),
            trained.join(", ")
        ));
        lines
    }

    fn stack_summary(&self, stacks: &[village_sim::ItemStack]) -> String {
        stacks
            .iter()
            .map(|stack| format!("{} x{}", self.label(&stack.item), stack.quantity))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn describe_rejection(reason: &RejectReason) -> String {
    format!("rejected ({}): {reason}", reason.code())
}

fn action_verb(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Chop => "chop",
        ActionKind::Fish => "fish",
        ActionKind::Mine => "mine",
    }
}

/// Drives the session in real time until `quit` or end of input, then writes
/// the save slot one last time.
pub(crate) fn run_session(app: AppWiring) -> io::Result<()> {
    let AppWiring {
        config,
        sim,
        world,
        content,
        slot,
        autosave_every,
    } = app;
    let mut session = Session::new(sim, world, content, slot);
    let input = spawn_stdin_reader()?;

    let mut runner = FixedStepLoop::new(&config, Instant::now());
    let mut last_save = Instant::now();
    let mut input_closed = false;
    let mut out = Vec::new();
    info!("session_started");

    loop {
        runner.run_frame(session.sim_mut(), Instant::now());
        session.drain_event_lines(&mut out);

        input_closed |= drain_input(&input, &mut session);
        let outcome = session.process_pending(&mut out);
        session.drain_event_lines(&mut out);
        for line in out.drain(..) {
            println!("{line}");
        }
        if outcome == LineOutcome::Quit {
            break;
        }
        if input_closed && !session.has_pending_lines() && !session.is_waiting() {
            info!("input_closed");
            break;
        }

        if let Some(every) = autosave_every {
            if last_save.elapsed() >= every {
                autosave(&session, "interval");
                last_save = Instant::now();
            }
        }
        thread::sleep(IDLE_FRAME_SLEEP);
    }

    if autosave_every.is_some() {
        autosave(&session, "exit");
    }
    info!(
        sim_time_ms = session.sim().now().as_millis(),
        "session_ended"
    );
    Ok(())
}

/// Writes the slot without interrupting play; a failed write is logged and
/// the next autosave tries again. Returns whether the write succeeded.
fn autosave(session: &Session, trigger: &'static str) -> bool {
    match session.save() {
        Ok(()) => true,
        Err(error) => {
            warn!(error = %error, trigger, "autosave_failed");
            false
        }
    }
}

/// Moves every line the reader has produced into the session queue. Returns
/// true once the reader has hung up.
fn drain_input(input: &Receiver<String>, session: &mut Session) -> bool {
    loop {
        match input.try_recv() {
            Ok(line) => session.queue_line(line),
            Err(TryRecvError::Empty) => return false,
            Err(TryRecvError::Disconnected) => return true,
        }
    }
}

fn spawn_stdin_reader() -> io::Result<Receiver<String>> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if sender.send(line).is_err() {
                            break;
                        }
                    }
                    Err(error) => {
                        warn!(error = %error, "stdin_read_failed");
                        break;
                    }
                }
            }
        })?;
    Ok(receiver)
}

#[cfg(test)]
mod tests {
    use village_sim::{build_village, TileCoord};

    use super::*;

    fn session_in(dir: &std::path::Path) -> Session {
        let world = build_village().expect("village");
        let content = ContentDatabase::builtin();
        let sim = Simulation::new(world.clone(), content.clone());
        Session::new(sim, world, content, SaveSlot::new(dir.join("save.json")))
    }

    fn run_for(session: &mut Session, duration: Duration) {
        let step = Duration::from_millis(10);
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            session.sim_mut().tick(step);
            elapsed += step;
        }
    }

    #[test]
    fn unknown_command_reports_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = session_in(temp.path());
        let mut out = Vec::new();

        session.handle_line("dance", &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("error: unknown command"), "{}", out[0]);
    }

    #[test]
    fn rejected_intents_print_their_code() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = session_in(temp.path());
        let mut out = Vec::new();

        session.handle_line("interact", &mut out);
        assert!(out[0].starts_with("rejected (nothing_to_interact)"), "{}", out[0]);
    }

    #[test]
    fn wait_holds_later_lines_until_the_clock_catches_up() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = session_in(temp.path());
        let mut out = Vec::new();
        session.queue_line("wait 100".to_string());
        session.queue_line("move 5 6".to_string());

        session.process_pending(&mut out);
        assert!(session.is_waiting());
        assert!(session.has_pending_lines());
        assert!(out.is_empty());

        run_for(&mut session, Duration::from_millis(50));
        session.process_pending(&mut out);
        assert!(session.has_pending_lines());

        run_for(&mut session, Duration::from_millis(50));
        session.process_pending(&mut out);
        assert!(!session.is_waiting());
        assert!(!session.has_pending_lines());
        assert!(out[0].starts_with("walking to (5, 6)"), "{}", out[0]);
    }

    #[test]
    fn quit_stops_processing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = session_in(temp.path());
        let mut out = Vec::new();
        session.queue_line("quit".to_string());
        session.queue_line("status".to_string());

        assert_eq!(session.process_pending(&mut out), LineOutcome::Quit);
        assert!(session.has_pending_lines());
    }

    #[test]
    fn save_then_load_restores_position() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = session_in(temp.path());
        let mut out = Vec::new();

        session.handle_line("move 5 6", &mut out);
        run_for(&mut session, Duration::from_secs(2));
        session.handle_line("save", &mut out);
        session.handle_line("move 4 6", &mut out);
        run_for(&mut session, Duration::from_secs(2));
        assert_eq!(session.sim().state().agent.tile, TileCoord::new(4, 6));

        session.handle_line("load", &mut out);
        assert_eq!(session.sim().state().agent.tile, TileCoord::new(5, 6));
    }

    #[test]
    fn failed_save_is_reported_not_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let blocker = temp.path().join("occupied");
        std::fs::create_dir(&blocker).expect("dir in the way");
        let world = build_village().expect("village");
        let content = ContentDatabase::builtin();
        let sim = Simulation::new(world.clone(), content.clone());
        let mut session = Session::new(sim, world, content, SaveSlot::new(blocker));
        let mut out = Vec::new();

        assert!(!autosave(&session, "interval"));
        session.handle_line("save", &mut out);
        assert!(out[0].starts_with("error: write save"), "{}", out[0]);
        session.handle_line("status", &mut out);
        assert!(out.len() > 1);
    }

    #[test]
    fn autosave_writes_the_slot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let session = session_in(temp.path());
        assert!(autosave(&session, "exit"));
        assert!(temp.path().join("save.json").is_file());
    }

    #[test]
    fn load_without_a_save_says_so() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = session_in(temp.path());
        let mut out = Vec::new();

        session.handle_line("load", &mut out);
        assert!(out[0].starts_with("no save at"), "{}", out[0]);
    }

    #[test]
    fn status_lists_coins_and_inventory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = session_in(temp.path());
        let mut out = Vec::new();

        session.handle_line("status", &mut out);
        assert!(out[0].starts_with("area spawn_inn tile (5, 7)"), "{}", out[0]);
        assert!(out.iter().any(|line| line.starts_with("coins ")));
        assert!(out.iter().any(|line| line.starts_with("inventory [")));
    }

    #[test]
    fn area_change_is_reported_as_an_event() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut session = session_in(temp.path());
        let mut out = Vec::new();

        session.handle_line("move 5 8", &mut out);
        run_for(&mut session, Duration::from_secs(2));
        out.clear();
        session.drain_event_lines(&mut out);
        assert!(
            out.iter().any(|line| line.starts_with("entered overworld")),
            "{out:?}"
        );
    }
}
