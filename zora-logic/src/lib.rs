use hashbrown::{HashMap, HashSet};
use log::debug;

use zora_game::{Direction, Item, LevelNum, Location, ProgressiveClass, RoomNum};

/// Hearts the player starts with.
pub const STARTING_HEARTS: usize = 3;
pub const MAX_HEARTS: usize = 16;

/// Progress markers that are not physical items. Tracked alongside the bag so
/// reachability can treat "the beast is dead" like any other acquisition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VirtualItem {
    BeastDefeated,
    KidnappedRescued,
    LostHillsHint,
    DeadWoodsHint,
}

/// Accumulating bag of everything the player has picked up.
///
/// Progressive classes are stored as a highest-seen tier per class, never as
/// individual tier items; `has` on a progressive item means "tier at least
/// this". The bag only ever grows: reachability analysis relies on
/// monotonicity for termination.
#[derive(Clone, Debug, Default)]
pub struct Inventory {
    items: HashSet<Item>,
    tiers: HashMap<ProgressiveClass, usize>,
    virtuals: HashSet<VirtualItem>,
    collected_locations: HashSet<Location>,
    heart_containers: usize,
    keys_per_level: HashMap<LevelNum, usize>,
    locks_opened: HashSet<(LevelNum, RoomNum, Direction)>,
    triforce_levels: Vec<LevelNum>,
    making_progress: bool,
}

impl Inventory {
    pub fn new() -> Inventory {
        Inventory {
            heart_containers: STARTING_HEARTS,
            ..Inventory::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Inventory::new();
    }

    pub fn set_making_progress(&mut self) {
        self.making_progress = true;
    }

    pub fn clear_making_progress(&mut self) {
        self.making_progress = false;
    }

    pub fn still_making_progress(&self) -> bool {
        self.making_progress
    }

    /// Record an item pickup at a location. A location yields its item once;
    /// revisits are no-ops. Items with no effect on logic are dropped.
    pub fn add_at(&mut self, item: Item, location: Location) {
        if !self.collected_locations.insert(location) {
            return;
        }
        self.set_making_progress();

        match item {
            // Inert pickups as far as reachability is concerned.
            Item::Map
            | Item::Compass
            | Item::MagicalShield
            | Item::Bombs
            | Item::FiveRupees
            | Item::Rupee
            | Item::Clock
            | Item::SingleHeart
            | Item::Fairy
            | Item::BluePotion
            | Item::RedPotion
            | Item::TriforceOfPower => {}
            Item::HeartContainer => {
                self.heart_containers = (self.heart_containers + 1).min(MAX_HEARTS);
                debug!(
                    "found heart container at {location:?}; now {}",
                    self.heart_containers
                );
            }
            Item::Triforce => {
                if let Some(level) = location.level() {
                    if !self.triforce_levels.contains(&level) {
                        self.triforce_levels.push(level);
                        debug!("found triforce in level {level}; now {}", self.triforce_count());
                    }
                }
            }
            Item::Key => {
                if let Some(level) = location.level() {
                    *self.keys_per_level.entry(level).or_insert(0) += 1;
                }
            }
            _ => self.add(item),
        }
    }

    /// Add an item directly (starting items, virtual grants). A progressive
    /// class records the highest tier ever seen; re-acquiring a tier already
    /// held changes nothing.
    pub fn add(&mut self, item: Item) {
        match item.progressive() {
            Some((class, tier)) => {
                let entry = self.tiers.entry(class).or_insert(0);
                *entry = (*entry).max(tier + 1);
            }
            None => {
                self.items.insert(item);
            }
        }
        self.set_making_progress();
    }

    pub fn add_virtual(&mut self, item: VirtualItem) {
        if self.virtuals.insert(item) {
            self.set_making_progress();
        }
    }

    /// Membership, with tier-ordering semantics for progressive items.
    pub fn has(&self, item: Item) -> bool {
        match item.progressive() {
            Some((class, tier)) => self.tier(class) >= tier + 1,
            None => self.items.contains(&item),
        }
    }

    pub fn has_virtual(&self, item: VirtualItem) -> bool {
        self.virtuals.contains(&item)
    }

    /// Highest acquired tier of a class, 1-based; 0 means none held.
    pub fn tier(&self, class: ProgressiveClass) -> usize {
        self.tiers.get(&class).copied().unwrap_or(0)
    }

    /// How many of this item the bag holds. A progressive class collapses to
    /// a single held item, its highest tier.
    pub fn count(&self, item: Item) -> usize {
        match item.progressive() {
            Some((class, _)) => (self.tier(class) > 0) as usize,
            None => self.items.contains(&item) as usize,
        }
    }

    pub fn heart_count(&self) -> usize {
        self.heart_containers
    }

    pub fn triforce_count(&self) -> usize {
        self.triforce_levels.len()
    }

    pub fn was_collected(&self, location: Location) -> bool {
        self.collected_locations.contains(&location)
    }

    // ------------------------------------------------------------------
    // Keys
    // ------------------------------------------------------------------

    /// Whether a locked door in `level` can be opened: the magical key always
    /// works, otherwise a lock is openable iff the keys collected in the
    /// level outnumber the locks already opened there.
    pub fn can_open_lock(&self, level: LevelNum) -> bool {
        if self.has(Item::MagicalKey) {
            return true;
        }
        let keys = self.keys_per_level.get(&level).copied().unwrap_or(0);
        let opened = self
            .locks_opened
            .iter()
            .filter(|(l, _, _)| *l == level)
            .count();
        keys > opened
    }

    /// Consume a key for a specific door. Re-opening the same door is free.
    pub fn open_lock(&mut self, level: LevelNum, room: RoomNum, direction: Direction) {
        if self.has(Item::MagicalKey) {
            return;
        }
        self.locks_opened.insert((level, room, direction));
    }

    pub fn keys_in_level(&self, level: LevelNum) -> usize {
        self.keys_per_level.get(&level).copied().unwrap_or(0)
    }

    // ------------------------------------------------------------------
    // Combat and traversal predicates
    // ------------------------------------------------------------------

    pub fn has_sword(&self) -> bool {
        self.tier(ProgressiveClass::Sword) > 0
    }

    pub fn has_sword_or_wand(&self) -> bool {
        self.has_sword() || self.has(Item::Wand)
    }

    /// A weapon that never runs out.
    pub fn has_reusable_weapon(&self) -> bool {
        self.has_sword_or_wand() || self.has(Item::RedCandle)
    }

    pub fn has_reusable_weapon_or_boomerang(&self) -> bool {
        self.has_reusable_weapon() || self.tier(ProgressiveClass::Boomerang) > 0
    }

    pub fn has_candle(&self) -> bool {
        self.tier(ProgressiveClass::Candle) > 0
    }

    pub fn has_ring(&self) -> bool {
        self.tier(ProgressiveClass::Ring) > 0
    }

    pub fn has_bow_and_arrows(&self) -> bool {
        self.has(Item::Bow) && self.tier(ProgressiveClass::Arrow) > 0
    }

    pub fn has_bow_silver_arrows_and_sword(&self) -> bool {
        self.has_sword() && self.has(Item::Bow) && self.has(Item::SilverArrows)
    }

    pub fn has_recorder_and_reusable_weapon(&self) -> bool {
        self.has(Item::Recorder) && self.has_reusable_weapon()
    }

    // ------------------------------------------------------------------
    // Debugging
    // ------------------------------------------------------------------

    /// Stable, sorted rendering of the bag for logs and failure reports.
    pub fn to_sorted_debug_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut items: Vec<Item> = self.items.iter().copied().collect();
        items.sort();
        parts.extend(items.iter().map(|i| format!("{i:?}")));
        let mut classes: Vec<(ProgressiveClass, usize)> = self
            .tiers
            .iter()
            .filter(|(_, &t)| t > 0)
            .map(|(&c, &t)| (c, t))
            .collect();
        classes.sort();
        parts.extend(
            classes
                .iter()
                .map(|(c, t)| format!("{:?}", c.tiers()[t - 1])),
        );
        let mut virtuals: Vec<VirtualItem> = self.virtuals.iter().copied().collect();
        virtuals.sort();
        parts.extend(virtuals.iter().map(|v| format!("{v:?}")));
        parts.push(format!("hearts={}", self.heart_containers));
        parts.push(format!("triforce={}", self.triforce_count()));
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zora_game::CaveType;

    fn loc(level: LevelNum, room: RoomNum) -> Location {
        Location::Room { level, room }
    }

    #[test]
    fn progressive_sword_tiers() {
        let mut inv = Inventory::new();
        inv.add(Item::WoodSword);
        inv.add(Item::MagicalSword);
        assert!(inv.has(Item::WoodSword));
        assert!(inv.has(Item::WhiteSword));
        assert!(inv.has(Item::MagicalSword));
        assert_eq!(inv.tier(ProgressiveClass::Sword), 3);
        assert_eq!(inv.count(Item::WoodSword), 1);
        assert_eq!(inv.count(Item::MagicalSword), 1);
    }

    #[test]
    fn reacquiring_a_held_tier_is_a_no_op() {
        let mut inv = Inventory::new();
        inv.add(Item::BlueCandle);
        assert!(!inv.has(Item::RedCandle));
        inv.add(Item::BlueCandle);
        assert_eq!(inv.tier(ProgressiveClass::Candle), 1);
        assert!(!inv.has(Item::RedCandle));
        inv.add(Item::RedCandle);
        assert_eq!(inv.tier(ProgressiveClass::Candle), 2);
    }

    #[test]
    fn lower_tier_never_downgrades() {
        let mut inv = Inventory::new();
        inv.add(Item::RedRing);
        inv.add(Item::BlueRing);
        assert_eq!(inv.tier(ProgressiveClass::Ring), 2);
        assert!(inv.has(Item::RedRing));
    }

    #[test]
    fn locations_yield_items_once() {
        let mut inv = Inventory::new();
        inv.add_at(Item::HeartContainer, loc(3, 0x20));
        inv.add_at(Item::HeartContainer, loc(3, 0x20));
        assert_eq!(inv.heart_count(), STARTING_HEARTS + 1);
    }

    #[test]
    fn triforce_counted_per_level() {
        let mut inv = Inventory::new();
        inv.add_at(Item::Triforce, loc(1, 0x10));
        inv.add_at(Item::Triforce, loc(1, 0x11));
        inv.add_at(Item::Triforce, loc(2, 0x10));
        assert_eq!(inv.triforce_count(), 2);
    }

    #[test]
    fn key_accounting_is_per_level() {
        let mut inv = Inventory::new();
        inv.add_at(Item::Key, loc(2, 0x10));
        assert!(inv.can_open_lock(2));
        assert!(!inv.can_open_lock(3));
        inv.open_lock(2, 0x11, Direction::North);
        assert!(!inv.can_open_lock(2));
        // Re-opening the same door consumes nothing.
        inv.open_lock(2, 0x11, Direction::North);
        assert_eq!(inv.keys_in_level(2), 1);
    }

    #[test]
    fn magical_key_opens_everything() {
        let mut inv = Inventory::new();
        inv.add(Item::MagicalKey);
        assert!(inv.can_open_lock(9));
        inv.open_lock(9, 0x44, Direction::West);
        assert!(inv.can_open_lock(9));
    }

    #[test]
    fn shop_pickups_do_not_affect_logic_items() {
        let mut inv = Inventory::new();
        inv.add_at(
            Item::BluePotion,
            Location::Shop { shop: CaveType::PotionShop, slot: 0 },
        );
        assert!(!inv.has(Item::BluePotion));
        assert!(inv.was_collected(Location::Shop { shop: CaveType::PotionShop, slot: 0 }));
    }

    #[test]
    fn debug_string_is_sorted_and_stable() {
        let mut a = Inventory::new();
        a.add(Item::Ladder);
        a.add(Item::Bow);
        a.add(Item::WoodSword);
        let mut b = Inventory::new();
        b.add(Item::WoodSword);
        b.add(Item::Bow);
        b.add(Item::Ladder);
        assert_eq!(a.to_sorted_debug_string(), b.to_sorted_debug_string());
    }
}
