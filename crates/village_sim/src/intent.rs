use thiserror::Error;

use crate::action::{ActionKind, ActionTarget};
use crate::inventory::{BulkTransfer, ItemId};
use crate::progression::SkillId;
use crate::world::{AreaId, DoorId, NodeId, NpcId, SpotId, TileCoord};

/// Something a player or script can target with `approach`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    Npc(NpcId),
    Node(NodeId),
    Spot(SpotId),
    Door(DoorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellQuantity {
    Units(u32),
    All,
}

/// Requests from the input layer. The simulation validates every one; none is
/// assumed valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    MoveTo(TileCoord),
    Approach(TargetRef),
    Interact,
    OpenShop(NpcId),
    CloseCounter,
    Buy(ItemId),
    Sell { item: ItemId, quantity: SellQuantity },
    Deposit { item: ItemId, quantity: u32 },
    Withdraw { item: ItemId, quantity: u32 },
    DepositAll,
    WithdrawAll,
    Reset,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::MoveTo(_) => "move_to",
            Intent::Approach(_) => "approach",
            Intent::Interact => "interact",
            Intent::OpenShop(_) => "open_shop",
            Intent::CloseCounter => "close_counter",
            Intent::Buy(_) => "buy",
            Intent::Sell { .. } => "sell",
            Intent::Deposit { .. } => "deposit",
            Intent::Withdraw { .. } => "withdraw",
            Intent::DepositAll => "deposit_all",
            Intent::WithdrawAll => "withdraw_all",
            Intent::Reset => "reset",
        }
    }
}

/// Why an intent was declined. State is unchanged whenever one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectReason {
    #[error("busy with an action")]
    Busy,
    #[error("can't walk to ({}, {})", .tile.x, .tile.y)]
    Blocked { tile: TileCoord },
    #[error("target is not adjacent")]
    NotAdjacent,
    #[error("missing tool: {tool}")]
    MissingTool { tool: ItemId },
    #[error("that has been depleted")]
    NodeDepleted,
    #[error("nothing is biting")]
    SpotDepleted,
    #[error("nothing to interact with")]
    NothingToInteract,
    #[error("unknown target '{id}'")]
    UnknownTarget { id: String },
    #[error("unknown item '{item}'")]
    UnknownItem { item: ItemId },
    #[error("no matching counter is open")]
    CounterClosed,
    #[error("{item} is not for sale")]
    NotForSale { item: ItemId },
    #[error("this buyer does not want {item}")]
    NotBuying { item: ItemId },
    #[error("already own {item}")]
    AlreadyOwned { item: ItemId },
    #[error("not enough coins: need {needed}, have {available}")]
    InsufficientCoins { needed: u64, available: u64 },
    #[error("inventory full")]
    InventoryFull,
    #[error("bank full")]
    BankFull,
    #[error("you don't have enough {item}")]
    NotHeld { item: ItemId },
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

impl RejectReason {
    /// Stable snake_case code for callers and logs.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Busy => "busy",
            RejectReason::Blocked { .. } => "blocked",
            RejectReason::NotAdjacent => "not_adjacent",
            RejectReason::MissingTool { .. } => "missing_tool",
            RejectReason::NodeDepleted => "node_depleted",
            RejectReason::SpotDepleted => "spot_depleted",
            RejectReason::NothingToInteract => "nothing_to_interact",
            RejectReason::UnknownTarget { .. } => "unknown_target",
            RejectReason::UnknownItem { .. } => "unknown_item",
            RejectReason::CounterClosed => "counter_closed",
            RejectReason::NotForSale { .. } => "not_for_sale",
            RejectReason::NotBuying { .. } => "not_buying",
            RejectReason::AlreadyOwned { .. } => "already_owned",
            RejectReason::InsufficientCoins { .. } => "insufficient_coins",
            RejectReason::InventoryFull => "inventory_full",
            RejectReason::BankFull => "bank_full",
            RejectReason::NotHeld { .. } => "not_held",
            RejectReason::InvalidQuantity => "invalid_quantity",
        }
    }
}

/// What an accepted intent did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// A path was committed; `steps` tiles remain to walk.
    Moving { goal: TileCoord, steps: usize },
    /// Already standing where the intent wanted to go.
    InPlace,
    ActionStarted { kind: ActionKind, target: ActionTarget },
    CounterOpened { npc: NpcId },
    CounterClosed,
    Bought { item: ItemId, price: u64 },
    Sold { item: ItemId, quantity: u32, coins: u64 },
    Deposited { item: ItemId, quantity: u32 },
    Withdrawn { item: ItemId, quantity: u32 },
    DepositedAll(BulkTransfer),
    WithdrawnAll(BulkTransfer),
    Reset,
}

/// Notifications produced while ticking or applying intents, drained by the
/// caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    ActionStarted {
        kind: ActionKind,
        target: ActionTarget,
    },
    ActionCompleted {
        kind: ActionKind,
        item: ItemId,
        item_added: bool,
        xp: u64,
    },
    /// The action's target disappeared; no rewards were applied.
    ActionAborted { kind: ActionKind },
    InventoryFull { item: ItemId },
    LevelUp {
        skill: SkillId,
        level: u32,
        coins: u64,
    },
    AreaChanged {
        from: AreaId,
        to: AreaId,
        arrival: TileCoord,
    },
    CounterOpened { npc: NpcId },
    PathBlocked { goal: Option<TileCoord> },
}
