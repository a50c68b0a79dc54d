use std::time::Duration;

use crate::inventory::{ItemCatalog, ItemDef, ItemId};

pub const BUILTIN_CONTENT_HASH: &str = "builtin";

/// Economy and timing constants read at decision points.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    pub chop_ms: u64,
    pub fish_ms: u64,
    pub mine_ms: u64,
    pub tree_respawn_ms: u64,
    pub rock_respawn_ms: u64,
    /// `0` disables per-spot timers: spots can be fished again immediately.
    pub fish_spot_respawn_ms: u64,
    pub xp_chop: u64,
    pub xp_fish: u64,
    pub xp_mine: u64,
    pub inventory_capacity: usize,
    /// `None` leaves the bank unbounded.
    pub bank_capacity: Option<usize>,
    pub starting_coins: u64,
    /// Tiles per second.
    pub move_speed: f32,
    /// Upper bound on a single tick's delta; `0` disables the clamp.
    pub max_tick_ms: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            chop_ms: 900,
            fish_ms: 900,
            mine_ms: 1_200,
            tree_respawn_ms: 6_000,
            rock_respawn_ms: 8_000,
            fish_spot_respawn_ms: 2_500,
            xp_chop: 25,
            xp_fish: 20,
            xp_mine: 35,
            inventory_capacity: 20,
            bank_capacity: None,
            starting_coins: 10,
            move_speed: 4.2,
            max_tick_ms: 33,
        }
    }
}

impl Tuning {
    pub fn max_tick(&self) -> Option<Duration> {
        (self.max_tick_ms > 0).then(|| Duration::from_millis(self.max_tick_ms))
    }

    pub fn fish_spot_respawn(&self) -> Option<Duration> {
        (self.fish_spot_respawn_ms > 0).then(|| Duration::from_millis(self.fish_spot_respawn_ms))
    }
}

/// Compiled content: the item catalog plus tuning, and the hash of the
/// inputs they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDatabase {
    items: ItemCatalog,
    tuning: Tuning,
    content_hash: String,
}

impl ContentDatabase {
    pub(crate) fn from_parts(items: ItemCatalog, tuning: Tuning, content_hash: String) -> Self {
        Self {
            items,
            tuning,
            content_hash,
        }
    }

    /// The same content as the shipped `assets/base` defs.
    pub fn builtin() -> Self {
        let item = |id: &str, label: &str, stackable, buy_price, sell_price| ItemDef {
            id: ItemId::new(id),
            label: label.to_string(),
            stackable,
            buy_price,
            sell_price,
        };
        let items = ItemCatalog::new(vec![
            item("log", "Logs", true, None, Some(1)),
            item("fish", "Raw fish", true, None, Some(2)),
            item("ore", "Copper ore", true, None, Some(3)),
            item("axe", "Bronze axe", false, Some(5), None),
            item("fishing_rod", "Fishing rod", false, Some(8), None),
            item("pickaxe", "Bronze pickaxe", false, Some(10), None),
        ]);
        Self::from_parts(items, Tuning::default(), BUILTIN_CONTENT_HASH.to_string())
    }

    pub fn items(&self) -> &ItemCatalog {
        &self.items
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Items the tool vendor sells, in catalog order.
    pub fn shop_stock(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.defs().iter().filter(|def| def.buy_price.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_shop_sells_only_tools() {
        let db = ContentDatabase::builtin();
        let stock: Vec<&str> = db.shop_stock().map(|def| def.id.as_str()).collect();
        assert_eq!(stock, vec!["axe", "fishing_rod", "pickaxe"]);
        assert!(db.shop_stock().all(|def| !def.stackable));
    }

    #[test]
    fn zero_spot_respawn_disables_timer() {
        let tuning = Tuning {
            fish_spot_respawn_ms: 0,
            ..Tuning::default()
        };
        assert_eq!(tuning.fish_spot_respawn(), None);
        assert_eq!(
            Tuning::default().fish_spot_respawn(),
            Some(Duration::from_millis(2_500))
        );
    }
}
