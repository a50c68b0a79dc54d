use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::time::SimTime;

use super::grid::TileCoord;
use super::ids::{NodeId, SpotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Tree,
    Rock,
}

/// Lifecycle state of a node, derived from its two timestamps and `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Alive,
    DepletedWithMarker,
    /// Neither alive nor marked. Unreachable while `marker_until == respawn_at`.
    DepletedBare,
}

/// A harvestable tree or rock.
///
/// There is no timer: liveness is evaluated on demand against the caller's
/// `now`, so unloading and reloading an area needs no cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub position: TileCoord,
    pub respawn_at: SimTime,
    pub marker_until: SimTime,
}

impl ResourceNode {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind, position: TileCoord) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            respawn_at: SimTime::ZERO,
            marker_until: SimTime::ZERO,
        }
    }

    pub fn state(&self, now: SimTime) -> NodeState {
        if now >= self.respawn_at {
            NodeState::Alive
        } else if now < self.marker_until {
            NodeState::DepletedWithMarker
        } else {
            NodeState::DepletedBare
        }
    }

    pub fn is_alive(&self, now: SimTime) -> bool {
        now >= self.respawn_at
    }

    pub fn shows_marker(&self, now: SimTime) -> bool {
        now < self.marker_until
    }

    /// Live nodes and depletion markers both occupy their tile.
    pub fn occupies_tile(&self, now: SimTime) -> bool {
        self.is_alive(now) || self.shows_marker(now)
    }

    /// Alive -> depleted-with-marker. The marker lasts exactly until respawn.
    pub fn harvest(&mut self, now: SimTime, respawn: Duration) {
        self.respawn_at = now.after(respawn);
        self.marker_until = self.respawn_at;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FishingSpot {
    pub id: SpotId,
    pub position: TileCoord,
    /// `None` when the spot has never been fished or has no per-spot timer.
    pub respawn_at: Option<SimTime>,
}

impl FishingSpot {
    pub fn new(id: impl Into<SpotId>, position: TileCoord) -> Self {
        Self {
            id: id.into(),
            position,
            respawn_at: None,
        }
    }

    pub fn is_ready(&self, now: SimTime) -> bool {
        self.respawn_at.map_or(true, |at| now >= at)
    }

    pub fn mark_fished(&mut self, now: SimTime, respawn: Option<Duration>) {
        self.respawn_at = respawn.map(|delay| now.after(delay));
    }
}
