use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::intent::RejectReason;
use crate::nav::find_path;
use crate::time::SimTime;
use crate::world::{is_blocked, Area, TileCoord, WorldPos};

/// The step currently being walked, `progress` in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: TileCoord,
    pub to: TileCoord,
    pub progress: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub tile: TileCoord,
    /// Tiles per second.
    pub speed: f32,
    /// Remaining tiles, next first. Excludes `tile`.
    pub path: VecDeque<TileCoord>,
    pub segment: Option<Segment>,
    /// Heading in radians, `atan2(dx, dz)` of the last segment.
    pub facing: f32,
    /// Final tile of the committed path, kept for re-planning.
    pub goal: Option<TileCoord>,
}

impl Agent {
    pub fn new(tile: TileCoord, speed: f32) -> Self {
        Self {
            tile,
            speed,
            path: VecDeque::new(),
            segment: None,
            facing: 0.0,
            goal: None,
        }
    }

    pub fn is_moving(&self) -> bool {
        self.segment.is_some() || !self.path.is_empty()
    }

    /// Drops the committed path and any in-flight segment.
    pub fn stop(&mut self) {
        self.path.clear();
        self.segment = None;
        self.goal = None;
    }

    /// Replaces the path. A segment in flight keeps its progress when the
    /// new path still starts with the tile it is heading to.
    pub fn commit_path(&mut self, path: Vec<TileCoord>) {
        self.goal = path.last().copied();
        self.path = path.into();
        let continues = match (self.segment, self.path.front()) {
            (Some(segment), Some(next)) => segment.to == *next,
            _ => false,
        };
        if !continues {
            self.segment = None;
        }
    }

    /// Interpolated world position, including height.
    pub fn world_position(&self, area: &Area) -> WorldPos {
        let Some(segment) = self.segment else {
            return area.grid.tile_to_world(self.tile);
        };
        let a = area.grid.tile_to_world(segment.from);
        let b = area.grid.tile_to_world(segment.to);
        let t = segment.progress.clamp(0.0, 1.0);
        WorldPos {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
            z: a.z + (b.z - a.z) * t,
        }
    }
}

/// Plans a path to `goal` and commits it, replacing any previous path.
///
/// Blocked goals are rejected before any search runs; an empty search result
/// is rejected with the same reason. Standing on the goal is not an error.
pub fn plan_move(
    agent: &mut Agent,
    area: &Area,
    goal: TileCoord,
    now: SimTime,
) -> Result<usize, RejectReason> {
    if is_blocked(area, goal, now) {
        return Err(RejectReason::Blocked { tile: goal });
    }
    if goal == agent.tile {
        agent.stop();
        return Ok(0);
    }
    let path = find_path(area, agent.tile, goal, now);
    if path.is_empty() {
        return Err(RejectReason::Blocked { tile: goal });
    }
    let steps = path.len();
    agent.commit_path(path);
    Ok(steps)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveEvent {
    Idle,
    Moving,
    /// The agent's discrete tile just changed; arrival triggers run now.
    Arrived { tile: TileCoord, path_done: bool },
    /// The next tile became solid and no new path exists.
    Blocked { goal: Option<TileCoord> },
}

/// Advances the agent by `dt`. At most one tile is reached per call; the
/// next segment starts on the following call with progress reset to zero.
pub fn advance(agent: &mut Agent, area: &Area, dt: Duration, now: SimTime) -> MoveEvent {
    if agent.segment.is_none() {
        let Some(next) = agent.path.front().copied() else {
            return MoveEvent::Idle;
        };
        let next = if next_step_open(agent, area, next, now) {
            next
        } else {
            match replan(agent, area, now) {
                Some(next) => next,
                None => {
                    let goal = agent.goal;
                    agent.stop();
                    return MoveEvent::Blocked { goal };
                }
            }
        };
        let dx = (next.x - agent.tile.x) as f32;
        let dz = (next.y - agent.tile.y) as f32;
        agent.facing = dx.atan2(dz);
        agent.segment = Some(Segment {
            from: agent.tile,
            to: next,
            progress: 0.0,
        });
    }

    let Some(segment) = agent.segment.as_mut() else {
        return MoveEvent::Idle;
    };
    segment.progress += agent.speed * dt.as_secs_f32();
    if segment.progress < 1.0 {
        return MoveEvent::Moving;
    }

    let tile = segment.to;
    agent.tile = tile;
    agent.segment = None;
    agent.path.pop_front();
    let path_done = agent.path.is_empty();
    if path_done {
        agent.goal = None;
    }
    MoveEvent::Arrived { tile, path_done }
}

fn next_step_open(agent: &Agent, area: &Area, next: TileCoord, now: SimTime) -> bool {
    agent.tile.is_adjacent(next) && !is_blocked(area, next, now)
}

fn replan(agent: &mut Agent, area: &Area, now: SimTime) -> Option<TileCoord> {
    let goal = agent.goal?;
    let path = find_path(area, agent.tile, goal, now);
    debug!(
        from_x = agent.tile.x,
        from_y = agent.tile.y,
        goal_x = goal.x,
        goal_y = goal.y,
        steps = path.len(),
        "path_replanned"
    );
    let next = path.first().copied()?;
    if !next_step_open(agent, area, next, now) {
        return None;
    }
    agent.commit_path(path);
    Some(next)
}
