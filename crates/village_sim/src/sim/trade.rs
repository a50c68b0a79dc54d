use tracing::info;

use crate::content::ContentDatabase;
use crate::intent::{Applied, RejectReason, SellQuantity};
use crate::inventory::{transfer, transfer_all, ContainerError, ItemDef, ItemId};
use crate::state::GameState;
use crate::world::{NpcKind, World};

/// Kind of the NPC whose counter is open, if it is still in the active area.
fn open_counter_kind<'a>(state: &GameState, world: &'a World) -> Option<&'a NpcKind> {
    let npc = state.counter.as_ref()?;
    world
        .area(&state.area)?
        .npc(npc)
        .map(|found| &found.kind)
}

fn require_shop(state: &GameState, world: &World) -> Result<(), RejectReason> {
    match open_counter_kind(state, world) {
        Some(NpcKind::Shop) => Ok(()),
        _ => Err(RejectReason::CounterClosed),
    }
}

fn require_bank(state: &GameState, world: &World) -> Result<(), RejectReason> {
    match open_counter_kind(state, world) {
        Some(NpcKind::Bank) => Ok(()),
        _ => Err(RejectReason::CounterClosed),
    }
}

fn item_def<'a>(content: &'a ContentDatabase, item: &ItemId) -> Result<&'a ItemDef, RejectReason> {
    content
        .items()
        .get(item)
        .ok_or_else(|| RejectReason::UnknownItem { item: item.clone() })
}

fn container_reject(error: ContainerError, full: RejectReason) -> RejectReason {
    match error {
        ContainerError::UnknownItem { item } => RejectReason::UnknownItem { item },
        ContainerError::ZeroQuantity => RejectReason::InvalidQuantity,
        ContainerError::Full { .. } => full,
        ContainerError::Insufficient { item, .. } => RejectReason::NotHeld { item },
    }
}

/// Buys one unit of a tool. Tools are unique, and slot and coin checks run
/// before anything changes.
pub(super) fn buy(
    state: &mut GameState,
    world: &World,
    content: &ContentDatabase,
    item: &ItemId,
) -> Result<Applied, RejectReason> {
    require_shop(state, world)?;
    let def = item_def(content, item)?;
    let price = def
        .buy_price
        .ok_or_else(|| RejectReason::NotForSale { item: item.clone() })?;
    if !def.stackable && state.inventory.contains(item) {
        return Err(RejectReason::AlreadyOwned { item: item.clone() });
    }
    if state.coins < price {
        return Err(RejectReason::InsufficientCoins {
            needed: price,
            available: state.coins,
        });
    }
    state
        .inventory
        .add(content.items(), item, 1)
        .map_err(|error| container_reject(error, RejectReason::InventoryFull))?;
    state.coins -= price;
    info!(item = %item, price, coins = state.coins, "item_bought");
    Ok(Applied::Bought {
        item: item.clone(),
        price,
    })
}

/// Sells to the open buyer, which only takes the one resource it wants.
pub(super) fn sell(
    state: &mut GameState,
    world: &World,
    content: &ContentDatabase,
    item: &ItemId,
    quantity: SellQuantity,
) -> Result<Applied, RejectReason> {
    let Some(NpcKind::Buyer { item: wanted }) = open_counter_kind(state, world) else {
        return Err(RejectReason::CounterClosed);
    };
    let def = item_def(content, item)?;
    if wanted != item {
        return Err(RejectReason::NotBuying { item: item.clone() });
    }
    let unit_price = def
        .sell_price
        .ok_or_else(|| RejectReason::NotBuying { item: item.clone() })?;

    let held = state.inventory.count(item);
    let quantity = match quantity {
        SellQuantity::Units(0) => return Err(RejectReason::InvalidQuantity),
        SellQuantity::Units(units) => units,
        SellQuantity::All => held,
    };
    if quantity == 0 || held < quantity {
        return Err(RejectReason::NotHeld { item: item.clone() });
    }

    state
        .inventory
        .remove(content.items(), item, quantity)
        .map_err(|error| container_reject(error, RejectReason::InventoryFull))?;
    let coins = unit_price.saturating_mul(u64::from(quantity));
    state.coins = state.coins.saturating_add(coins);
    info!(item = %item, quantity, coins, total = state.coins, "item_sold");
    Ok(Applied::Sold {
        item: item.clone(),
        quantity,
        coins,
    })
}

pub(super) fn deposit(
    state: &mut GameState,
    world: &World,
    content: &ContentDatabase,
    item: &ItemId,
    quantity: u32,
) -> Result<Applied, RejectReason> {
    require_bank(state, world)?;
    let GameState {
        inventory, bank, ..
    } = state;
    transfer(content.items(), inventory, bank, item, quantity)
        .map_err(|error| container_reject(error, RejectReason::BankFull))?;
    info!(item = %item, quantity, "item_deposited");
    Ok(Applied::Deposited {
        item: item.clone(),
        quantity,
    })
}

pub(super) fn withdraw(
    state: &mut GameState,
    world: &World,
    content: &ContentDatabase,
    item: &ItemId,
    quantity: u32,
) -> Result<Applied, RejectReason> {
    require_bank(state, world)?;
    let GameState {
        inventory, bank, ..
    } = state;
    transfer(content.items(), bank, inventory, item, quantity)
        .map_err(|error| container_reject(error, RejectReason::InventoryFull))?;
    info!(item = %item, quantity, "item_withdrawn");
    Ok(Applied::Withdrawn {
        item: item.clone(),
        quantity,
    })
}

pub(super) fn deposit_all(
    state: &mut GameState,
    world: &World,
    content: &ContentDatabase,
) -> Result<Applied, RejectReason> {
    require_bank(state, world)?;
    let GameState {
        inventory, bank, ..
    } = state;
    let summary = transfer_all(content.items(), inventory, bank);
    info!(
        units = summary.units_moved,
        stopped_full = summary.stopped_full,
        "deposited_all"
    );
    Ok(Applied::DepositedAll(summary))
}

/// Withdraws stacks in bank order until the inventory has no room left.
pub(super) fn withdraw_all(
    state: &mut GameState,
    world: &World,
    content: &ContentDatabase,
) -> Result<Applied, RejectReason> {
    require_bank(state, world)?;
    let GameState {
        inventory, bank, ..
    } = state;
    let summary = transfer_all(content.items(), bank, inventory);
    info!(
        units = summary.units_moved,
        stopped_full = summary.stopped_full,
        "withdrawn_all"
    );
    Ok(Applied::WithdrawnAll(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::BulkTransfer;
    use crate::world::{build_village, AreaId, NpcId, OVERWORLD_ID, SPAWN_INN_ID};

    fn setup(area: &str, counter: &str) -> (World, ContentDatabase, GameState) {
        let world = build_village().expect("village");
        let content = ContentDatabase::builtin();
        let mut state = GameState::new_game(&world, content.tuning());
        state.area = AreaId::new(area);
        state.counter = Some(NpcId::new(counter));
        (world, content, state)
    }

    fn id(raw: &str) -> ItemId {
        ItemId::new(raw)
    }

    #[test]
    fn buy_charges_once_and_refuses_a_second_copy() {
        let (world, content, mut state) = setup(OVERWORLD_ID, "shop");
        let applied = buy(&mut state, &world, &content, &id("axe")).expect("buy");
        assert_eq!(
            applied,
            Applied::Bought {
                item: id("axe"),
                price: 5
            }
        );
        assert_eq!(state.coins, 5);
        assert_eq!(
            buy(&mut state, &world, &content, &id("axe")),
            Err(RejectReason::AlreadyOwned { item: id("axe") })
        );
        assert_eq!(
            buy(&mut state, &world, &content, &id("fishing_rod")),
            Err(RejectReason::InsufficientCoins {
                needed: 8,
                available: 5
            })
        );
        assert_eq!(state.inventory.count(&id("fishing_rod")), 0);
    }

    #[test]
    fn buy_needs_the_shop_counter_and_a_priced_item() {
        let (world, content, mut state) = setup(OVERWORLD_ID, "buy_logs");
        assert_eq!(
            buy(&mut state, &world, &content, &id("axe")),
            Err(RejectReason::CounterClosed)
        );
        state.counter = Some(NpcId::new("shop"));
        assert_eq!(
            buy(&mut state, &world, &content, &id("log")),
            Err(RejectReason::NotForSale { item: id("log") })
        );
    }

    #[test]
    fn buy_with_full_inventory_changes_nothing() {
        let (world, content, mut state) = setup(OVERWORLD_ID, "shop");
        state.inventory = crate::inventory::Container::new(Some(1));
        state
            .inventory
            .add(content.items(), &id("pickaxe"), 1)
            .expect("fill");
        let before = state.clone();
        assert_eq!(
            buy(&mut state, &world, &content, &id("axe")),
            Err(RejectReason::InventoryFull)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn sell_all_and_partial_at_the_matching_buyer() {
        let (world, content, mut state) = setup(OVERWORLD_ID, "buy_logs");
        state
            .inventory
            .add(content.items(), &id("log"), 5)
            .expect("logs");
        let applied = sell(
            &mut state,
            &world,
            &content,
            &id("log"),
            SellQuantity::Units(2),
        )
        .expect("sell two");
        assert_eq!(
            applied,
            Applied::Sold {
                item: id("log"),
                quantity: 2,
                coins: 2
            }
        );
        sell(&mut state, &world, &content, &id("log"), SellQuantity::All).expect("sell all");
        assert_eq!(state.coins, 15);
        assert!(state.inventory.is_empty());
        assert_eq!(
            sell(&mut state, &world, &content, &id("log"), SellQuantity::All),
            Err(RejectReason::NotHeld { item: id("log") })
        );
    }

    #[test]
    fn buyer_refuses_other_items_and_overselling() {
        let (world, content, mut state) = setup(OVERWORLD_ID, "buy_logs");
        state
            .inventory
            .add(content.items(), &id("fish"), 1)
            .expect("fish");
        state
            .inventory
            .add(content.items(), &id("log"), 1)
            .expect("log");
        assert_eq!(
            sell(&mut state, &world, &content, &id("fish"), SellQuantity::All),
            Err(RejectReason::NotBuying { item: id("fish") })
        );
        assert_eq!(
            sell(
                &mut state,
                &world,
                &content,
                &id("log"),
                SellQuantity::Units(3)
            ),
            Err(RejectReason::NotHeld { item: id("log") })
        );
        assert_eq!(
            sell(
                &mut state,
                &world,
                &content,
                &id("log"),
                SellQuantity::Units(0)
            ),
            Err(RejectReason::InvalidQuantity)
        );
        assert_eq!(state.coins, 10);
    }

    #[test]
    fn deposit_and_withdraw_move_units_through_the_bank() {
        let (world, content, mut state) = setup(SPAWN_INN_ID, "banker");
        state
            .inventory
            .add(content.items(), &id("log"), 4)
            .expect("logs");
        deposit(&mut state, &world, &content, &id("log"), 3).expect("deposit");
        assert_eq!(state.inventory.count(&id("log")), 1);
        assert_eq!(state.bank.count(&id("log")), 3);
        assert_eq!(
            deposit(&mut state, &world, &content, &id("log"), 2),
            Err(RejectReason::NotHeld { item: id("log") })
        );
        withdraw(&mut state, &world, &content, &id("log"), 3).expect("withdraw");
        assert_eq!(state.inventory.count(&id("log")), 4);
        assert!(state.bank.is_empty());
    }

    #[test]
    fn withdraw_into_full_inventory_keeps_the_bank_intact() {
        let (world, content, mut state) = setup(SPAWN_INN_ID, "banker");
        state.inventory = crate::inventory::Container::new(Some(1));
        state
            .inventory
            .add(content.items(), &id("log"), 1)
            .expect("log");
        state.bank.add(content.items(), &id("ore"), 2).expect("ore");
        assert_eq!(
            withdraw(&mut state, &world, &content, &id("ore"), 1),
            Err(RejectReason::InventoryFull)
        );
        assert_eq!(state.bank.count(&id("ore")), 2);
        assert_eq!(state.inventory.count(&id("ore")), 0);
    }

    #[test]
    fn deposit_into_full_bank_is_rejected_atomically() {
        let (world, content, mut state) = setup(SPAWN_INN_ID, "banker");
        state.bank = crate::inventory::Container::new(Some(1));
        state
            .inventory
            .add(content.items(), &id("log"), 3)
            .expect("logs");
        state
            .inventory
            .add(content.items(), &id("fish"), 2)
            .expect("fish");

        deposit(&mut state, &world, &content, &id("log"), 1).expect("first log");
        deposit(&mut state, &world, &content, &id("log"), 1).expect("merges into the log stack");
        assert_eq!(state.bank.count(&id("log")), 2);
        assert_eq!(state.bank.slots_used(), 1);

        let before = state.clone();
        assert_eq!(
            deposit(&mut state, &world, &content, &id("fish"), 1),
            Err(RejectReason::BankFull)
        );
        assert_eq!(state, before);
        assert_eq!(state.inventory.count(&id("fish")), 2);
        assert_eq!(state.bank.count(&id("fish")), 0);
    }

    #[test]
    fn deposit_all_stops_when_the_bank_runs_out_of_slots() {
        let (world, content, mut state) = setup(SPAWN_INN_ID, "banker");
        state.bank = crate::inventory::Container::new(Some(1));
        state.bank.add(content.items(), &id("log"), 1).expect("bank log");
        state
            .inventory
            .add(content.items(), &id("log"), 1)
            .expect("log");
        state
            .inventory
            .add(content.items(), &id("fish"), 2)
            .expect("fish");

        let applied = deposit_all(&mut state, &world, &content).expect("deposit all");
        assert_eq!(
            applied,
            Applied::DepositedAll(BulkTransfer {
                units_moved: 1,
                stopped_full: true
            })
        );
        assert_eq!(state.bank.count(&id("log")), 2);
        assert_eq!(state.inventory.count(&id("fish")), 2);
        assert_eq!(state.inventory.count(&id("log")), 0);
    }

    #[test]
    fn bulk_transfers_report_what_moved() {
        let (world, content, mut state) = setup(SPAWN_INN_ID, "banker");
        state
            .inventory
            .add(content.items(), &id("log"), 3)
            .expect("logs");
        state
            .inventory
            .add(content.items(), &id("axe"), 1)
            .expect("axe");
        let applied = deposit_all(&mut state, &world, &content).expect("deposit all");
        assert_eq!(
            applied,
            Applied::DepositedAll(BulkTransfer {
                units_moved: 4,
                stopped_full: false
            })
        );
        assert!(state.inventory.is_empty());

        state.inventory = crate::inventory::Container::new(Some(1));
        let applied = withdraw_all(&mut state, &world, &content).expect("withdraw all");
        assert_eq!(
            applied,
            Applied::WithdrawnAll(BulkTransfer {
                units_moved: 3,
                stopped_full: true
            })
        );
        assert_eq!(state.bank.count(&id("axe")), 1);
    }

    #[test]
    fn bank_operations_need_the_bank_counter() {
        let (world, content, mut state) = setup(OVERWORLD_ID, "shop");
        assert_eq!(
            deposit_all(&mut state, &world, &content),
            Err(RejectReason::CounterClosed)
        );
        state.counter = None;
        assert_eq!(
            withdraw(&mut state, &world, &content, &id("log"), 1),
            Err(RejectReason::CounterClosed)
        );
    }
}
