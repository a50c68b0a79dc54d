use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::string_id;

string_id!(
    /// Content identifier of an item (`log`, `axe`, ...).
    ItemId
);

/// Trade and stacking rules of one item kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDef {
    pub id: ItemId,
    pub label: String,
    /// Resources stack; tools occupy one slot per unit.
    pub stackable: bool,
    pub buy_price: Option<u64>,
    pub sell_price: Option<u64>,
}

/// Item definitions in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemCatalog {
    defs: Vec<ItemDef>,
}

impl ItemCatalog {
    pub fn new(defs: Vec<ItemDef>) -> Self {
        Self { defs }
    }

    pub fn get(&self, id: &ItemId) -> Option<&ItemDef> {
        self.defs.iter().find(|def| &def.id == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    pub fn defs(&self) -> &[ItemDef] {
        &self.defs
    }

    pub fn label<'a>(&'a self, id: &'a ItemId) -> &'a str {
        self.get(id).map_or(id.as_str(), |def| def.label.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: ItemId,
    pub quantity: u32,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("unknown item '{item}'")]
    UnknownItem { item: ItemId },
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("not enough room for {item}: need {needed} slot(s), {free} free")]
    Full {
        item: ItemId,
        needed: usize,
        free: usize,
    },
    #[error("not enough {item}: requested {requested}, holding {available}")]
    Insufficient {
        item: ItemId,
        requested: u32,
        available: u32,
    },
}

/// Slot-limited stack container used for both the inventory and the bank.
///
/// Stack order is insertion order and is what the player sees, so it is never
/// re-sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    stacks: Vec<ItemStack>,
    capacity: Option<usize>,
}

impl Container {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            stacks: Vec::new(),
            capacity,
        }
    }

    pub fn stacks(&self) -> &[ItemStack] {
        &self.stacks
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn slots_used(&self) -> usize {
        self.stacks.len()
    }

    pub fn free_slots(&self) -> usize {
        self.capacity
            .map_or(usize::MAX, |capacity| capacity.saturating_sub(self.stacks.len()))
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn clear(&mut self) {
        self.stacks.clear();
    }

    pub fn count(&self, item: &ItemId) -> u32 {
        self.stacks
            .iter()
            .filter(|stack| &stack.item == item)
            .fold(0u32, |total, stack| total.saturating_add(stack.quantity))
    }

    pub fn contains(&self, item: &ItemId) -> bool {
        self.stacks.iter().any(|stack| &stack.item == item)
    }

    /// Slots an `add` of `quantity` units would newly occupy.
    pub fn slots_needed(&self, def: &ItemDef, quantity: u32) -> usize {
        if def.stackable {
            usize::from(!self.contains(&def.id))
        } else {
            quantity as usize
        }
    }

    pub fn can_add(&self, catalog: &ItemCatalog, item: &ItemId, quantity: u32) -> bool {
        catalog
            .get(item)
            .is_some_and(|def| quantity > 0 && self.slots_needed(def, quantity) <= self.free_slots())
    }

    /// Adds `quantity` units, or nothing at all when there is not enough room.
    pub fn add(
        &mut self,
        catalog: &ItemCatalog,
        item: &ItemId,
        quantity: u32,
    ) -> Result<(), ContainerError> {
        let def = lookup(catalog, item)?;
        if quantity == 0 {
            return Err(ContainerError::ZeroQuantity);
        }
        let needed = self.slots_needed(def, quantity);
        let free = self.free_slots();
        if needed > free {
            return Err(ContainerError::Full {
                item: item.clone(),
                needed,
                free,
            });
        }

        if def.stackable {
            if let Some(stack) = self.stacks.iter_mut().find(|stack| &stack.item == item) {
                stack.quantity = stack.quantity.saturating_add(quantity);
            } else {
                self.stacks.push(ItemStack {
                    item: item.clone(),
                    quantity,
                });
            }
        } else {
            for _ in 0..quantity {
                self.stacks.push(ItemStack {
                    item: item.clone(),
                    quantity: 1,
                });
            }
        }
        Ok(())
    }

    /// Removes `quantity` units, or nothing at all when fewer are held.
    ///
    /// Emptied stacks are deleted; unstackable units go from the end of the
    /// list first.
    pub fn remove(
        &mut self,
        catalog: &ItemCatalog,
        item: &ItemId,
        quantity: u32,
    ) -> Result<(), ContainerError> {
        let def = lookup(catalog, item)?;
        if quantity == 0 {
            return Err(ContainerError::ZeroQuantity);
        }
        let available = self.count(item);
        if available < quantity {
            return Err(ContainerError::Insufficient {
                item: item.clone(),
                requested: quantity,
                available,
            });
        }

        if def.stackable {
            if let Some(index) = self.stacks.iter().position(|stack| &stack.item == item) {
                let stack = &mut self.stacks[index];
                stack.quantity -= quantity;
                if stack.quantity == 0 {
                    self.stacks.remove(index);
                }
            }
        } else {
            let mut remaining = quantity;
            while remaining > 0 {
                let Some(index) = self.stacks.iter().rposition(|stack| &stack.item == item) else {
                    break;
                };
                self.stacks.remove(index);
                remaining -= 1;
            }
        }
        Ok(())
    }

    /// Places a restored stack without merging, for snapshot repair only.
    pub(crate) fn push_restored(&mut self, stack: ItemStack) {
        self.stacks.push(stack);
    }
}

fn lookup<'a>(catalog: &'a ItemCatalog, item: &ItemId) -> Result<&'a ItemDef, ContainerError> {
    catalog
        .get(item)
        .ok_or_else(|| ContainerError::UnknownItem { item: item.clone() })
}

/// Moves `quantity` units from `from` to `to` as one step: if the add leg
/// fails, the source is restored and the error returned.
pub fn transfer(
    catalog: &ItemCatalog,
    from: &mut Container,
    to: &mut Container,
    item: &ItemId,
    quantity: u32,
) -> Result<(), ContainerError> {
    let before = from.stacks.clone();
    from.remove(catalog, item, quantity)?;
    if let Err(error) = to.add(catalog, item, quantity) {
        from.stacks = before;
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkTransfer {
    pub units_moved: u32,
    /// Some units stayed behind because the destination ran out of slots.
    pub stopped_full: bool,
}

/// Moves every stack of `from` into `to` in list order, as much as fits.
pub fn transfer_all(
    catalog: &ItemCatalog,
    from: &mut Container,
    to: &mut Container,
) -> BulkTransfer {
    let mut summary = BulkTransfer::default();
    let items: Vec<ItemId> = from.stacks.iter().map(|stack| stack.item.clone()).collect();
    let mut seen = Vec::new();
    for item in items {
        if seen.contains(&item) {
            continue;
        }
        seen.push(item.clone());
        let Some(def) = catalog.get(&item) else {
            continue;
        };
        let held = from.count(&item);
        let movable = if def.stackable {
            if to.slots_needed(def, held) <= to.free_slots() {
                held
            } else {
                0
            }
        } else {
            held.min(u32::try_from(to.free_slots()).unwrap_or(u32::MAX))
        };
        if movable < held {
            summary.stopped_full = true;
        }
        if movable > 0 && transfer(catalog, from, to, &item, movable).is_ok() {
            summary.units_moved = summary.units_moved.saturating_add(movable);
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ItemCatalog {
        let def = |id: &str, stackable: bool| ItemDef {
            id: ItemId::new(id),
            label: id.to_string(),
            stackable,
            buy_price: None,
            sell_price: None,
        };
        ItemCatalog::new(vec![
            def("log", true),
            def("fish", true),
            def("axe", false),
            def("rod", false),
        ])
    }

    fn filler_catalog(count: usize) -> ItemCatalog {
        let mut defs = catalog().defs().to_vec();
        for index in 0..count {
            defs.push(ItemDef {
                id: ItemId::new(format!("junk_{index}")),
                label: format!("Junk {index}"),
                stackable: true,
                buy_price: None,
                sell_price: None,
            });
        }
        ItemCatalog::new(defs)
    }

    fn log() -> ItemId {
        ItemId::new("log")
    }

    #[test]
    fn add_then_remove_restores_exact_stack_list() {
        let catalog = catalog();
        let mut bag = Container::new(Some(20));
        bag.add(&catalog, &ItemId::new("fish"), 2).expect("fish");
        let before = bag.clone();
        bag.add(&catalog, &log(), 3).expect("add");
        bag.remove(&catalog, &log(), 3).expect("remove");
        assert_eq!(bag, before);
        assert!(bag.stacks().iter().all(|stack| stack.quantity > 0));
    }

    #[test]
    fn stackable_items_share_one_slot() {
        let catalog = catalog();
        let mut bag = Container::new(Some(20));
        bag.add(&catalog, &log(), 2).expect("add");
        bag.add(&catalog, &log(), 5).expect("add");
        assert_eq!(bag.slots_used(), 1);
        assert_eq!(bag.count(&log()), 7);
    }

    #[test]
    fn tools_take_one_slot_each_and_leave_from_the_end() {
        let catalog = catalog();
        let mut bag = Container::new(Some(20));
        let axe = ItemId::new("axe");
        bag.add(&catalog, &axe, 2).expect("axes");
        bag.add(&catalog, &log(), 1).expect("log");
        bag.add(&catalog, &axe, 1).expect("axe");
        assert_eq!(bag.slots_used(), 4);
        bag.remove(&catalog, &axe, 1).expect("remove");
        let order: Vec<&str> = bag.stacks().iter().map(|stack| stack.item.as_str()).collect();
        assert_eq!(order, vec!["axe", "axe", "log"]);
    }

    #[test]
    fn full_container_rejects_new_ids_but_grows_existing_stacks() {
        let catalog = filler_catalog(20);
        let mut bag = Container::new(Some(20));
        bag.add(&catalog, &log(), 1).expect("log");
        for index in 0..19 {
            bag.add(&catalog, &ItemId::new(format!("junk_{index}")), 1)
                .expect("junk");
        }
        assert_eq!(bag.free_slots(), 0);

        let error = bag.add(&catalog, &ItemId::new("fish"), 1).expect_err("full");
        assert!(matches!(error, ContainerError::Full { needed: 1, free: 0, .. }));
        let error = bag.add(&catalog, &ItemId::new("rod"), 1).expect_err("full");
        assert!(matches!(error, ContainerError::Full { .. }));
        bag.add(&catalog, &log(), 4).expect("existing stack");
        assert_eq!(bag.count(&log()), 5);
        assert_eq!(bag.slots_used(), 20);
    }

    #[test]
    fn failed_operations_leave_the_container_unchanged() {
        let catalog = catalog();
        let mut bag = Container::new(Some(2));
        bag.add(&catalog, &log(), 2).expect("log");
        let before = bag.clone();
        assert!(bag.add(&catalog, &ItemId::new("axe"), 2).is_err());
        assert!(bag.remove(&catalog, &log(), 3).is_err());
        assert!(bag.remove(&catalog, &ItemId::new("fish"), 1).is_err());
        assert_eq!(
            bag.add(&catalog, &ItemId::new("gold"), 1),
            Err(ContainerError::UnknownItem {
                item: ItemId::new("gold")
            })
        );
        assert_eq!(bag.add(&catalog, &log(), 0), Err(ContainerError::ZeroQuantity));
        assert_eq!(bag, before);
    }

    #[test]
    fn transfer_into_full_destination_keeps_the_source() {
        let catalog = catalog();
        let mut bank = Container::new(None);
        let mut bag = Container::new(Some(1));
        bank.add(&catalog, &ItemId::new("fish"), 4).expect("bank");
        bag.add(&catalog, &log(), 1).expect("bag");
        let bank_before = bank.clone();
        let error = transfer(&catalog, &mut bank, &mut bag, &ItemId::new("fish"), 2)
            .expect_err("no room");
        assert!(matches!(error, ContainerError::Full { .. }));
        assert_eq!(bank, bank_before);
        assert_eq!(bag.count(&ItemId::new("fish")), 0);

        transfer(&catalog, &mut bag, &mut bank, &log(), 1).expect("deposit");
        assert!(bag.is_empty());
        assert_eq!(bank.count(&log()), 1);
    }

    #[test]
    fn transfer_all_stops_when_destination_fills() {
        let catalog = catalog();
        let mut bank = Container::new(None);
        let mut bag = Container::new(Some(2));
        bank.add(&catalog, &log(), 6).expect("logs");
        bank.add(&catalog, &ItemId::new("axe"), 2).expect("axes");
        let summary = transfer_all(&catalog, &mut bank, &mut bag);
        assert_eq!(
            summary,
            BulkTransfer {
                units_moved: 7,
                stopped_full: true
            }
        );
        assert_eq!(bag.count(&log()), 6);
        assert_eq!(bank.count(&ItemId::new("axe")), 1);

        let summary = transfer_all(&catalog, &mut bag, &mut bank);
        assert_eq!(summary.units_moved, 7);
        assert!(!summary.stopped_full);
        assert!(bag.is_empty());
    }
}
