//! Flag registry, dependency rules and the flagstring codec.
//!
//! Every flag has a stable key, a display name, help text and a category.
//! Flags in the item-shuffle, legacy and logic categories are carried in the
//! flagstring, in declaration order; the remaining categories travel
//! out-of-band (settings file / UI state), as do the two complex flags
//! (starting-items and skip-items multisets).

use serde_derive::{Deserialize, Serialize};
use strum_macros::EnumIter;

use zora_game::Item;

/// Letters for the 3-bit flagstring digits, in digit order. No vowels, so a
/// flagstring can never spell anything unfortunate.
pub const FLAGSTRING_ALPHABET: [char; 8] = ['B', 'C', 'D', 'F', 'G', 'H', 'K', 'L'];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagCategory {
    ItemShuffle,
    ItemChanges,
    OverworldRandomization,
    LogicAndDifficulty,
    QualityOfLife,
    Experimental,
    Legacy,
    Hidden,
    Cosmetic,
}

impl FlagCategory {
    /// Whether flags in this category occupy a bit in the flagstring.
    pub fn encodable(self) -> bool {
        matches!(
            self,
            FlagCategory::ItemShuffle | FlagCategory::Legacy | FlagCategory::LogicAndDifficulty
        )
    }
}

#[derive(Clone, Debug)]
pub struct FlagDef {
    pub key: &'static str,
    pub display_name: &'static str,
    pub help_text: &'static str,
    pub category: FlagCategory,
    pub default: bool,
}

/// All boolean flags. Declaration order is bit order for the encodable ones,
/// so reordering this enum changes the flagstring format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[repr(usize)]
pub enum Flag {
    // Encodable: item shuffle (bit 0 is the master toggle).
    MajorItemShuffle,
    ShuffleWhiteSwordCaveItem,
    ShuffleMagicalSwordCaveItem,
    ShuffleLetterCaveItem,
    ShuffleShopArrows,
    ShuffleShopCandle,
    ShuffleShopRing,
    ShuffleShopBook,
    ShuffleShopBait,
    ShufflePotionShopItems,
    ShuffleDungeonHearts,
    ShuffleWithinLevel,
    // Encodable: legacy.
    ShuffleMinorDungeonItems,
    // Encodable: logic & difficulty.
    ForceSwordToOpenCave,
    AvoidRequiredHardCombat,
    // Out-of-band from here on.
    ForceArrowToLevelNine,
    ForceRingToLevelNine,
    ForceWandToLevelNine,
    ForceHeartContainerToLevelNine,
    ForceHeartContainerToArmos,
    ForceHeartContainerToCoast,
    AllowImportantItemsInLevelNine,
    ForceMajorItemToBoss,
    ForceMajorItemToTriforceRoom,
    ItemStairCanHaveTriforce,
    ItemStairCanHaveHeartContainer,
    ItemStairCanHaveMinorItem,
    IncreasedBaitBlocks,
    ExtraRaftBlocks,
    ExtraPowerBraceletBlocks,
    ShuffleStartScreen,
    FullStartShuffle,
    RandomizeHeartContainerRequirements,
    DontGuaranteeStartingSword,
    RandomizeLostHills,
    RandomizeDeadWoods,
    ProgressiveItems,
    AddL4Sword,
    MagicalBoomerangDoesOneHpDamage,
    KeepHealthAfterDeathWarp,
    IncreaseMinimumHealth,
    SelectSwap,
    SpeedUpText,
    SpeedUpDungeonTransitions,
    CommunityHints,
    FastFill,
    LowHeartsSound,
    FluteKillsPolsVoice,
    FourPotionInventory,
    AutoShowLetter,
    RandomizeLevelText,
    ForceTwoHeartContainersToLevelNine,
}

/// The 13 shuffle flags forced off when the master toggle is disabled.
pub const DEPENDENT_SHUFFLE_FLAGS: [Flag; 13] = [
    Flag::ShuffleWhiteSwordCaveItem,
    Flag::ShuffleMagicalSwordCaveItem,
    Flag::ShuffleLetterCaveItem,
    Flag::ShuffleShopArrows,
    Flag::ShuffleShopCandle,
    Flag::ShuffleShopRing,
    Flag::ShuffleShopBook,
    Flag::ShuffleShopBait,
    Flag::ShufflePotionShopItems,
    Flag::ShuffleDungeonHearts,
    Flag::ShuffleWithinLevel,
    Flag::ShuffleMinorDungeonItems,
    Flag::ForceSwordToOpenCave,
];

impl Flag {
    pub fn def(self) -> &'static FlagDef {
        &FLAG_DEFS[self as usize]
    }

    pub fn key(self) -> &'static str {
        self.def().key
    }

    pub fn category(self) -> FlagCategory {
        self.def().category
    }

    /// Bit position in the flagstring, for encodable flags.
    pub fn bit(self) -> Option<usize> {
        if !self.category().encodable() {
            return None;
        }
        Some(
            FLAG_DEFS[..self as usize]
                .iter()
                .filter(|d| d.category.encodable())
                .count(),
        )
    }

    pub fn from_key(key: &str) -> Option<Flag> {
        use strum::IntoEnumIterator;
        Flag::iter().find(|f| f.key() == key)
    }
}

macro_rules! flag_def {
    ($key:literal, $name:literal, $help:literal, $category:ident) => {
        flag_def!($key, $name, $help, $category, false)
    };
    ($key:literal, $name:literal, $help:literal, $category:ident, $default:literal) => {
        FlagDef {
            key: $key,
            display_name: $name,
            help_text: $help,
            category: FlagCategory::$category,
            default: $default,
        }
    };
}

/// Indexed by `Flag as usize`; must stay in enum declaration order.
pub const FLAG_DEFS: &[FlagDef] = &[
    flag_def!(
        "major_item_shuffle",
        "Major Item Shuffle",
        "Shuffle the major items across dungeons and the open overworld slots (Armos, Coast, Wood Sword Cave). Master toggle: turning this off also turns off every dependent shuffle flag.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_white_sword_cave_item",
        "Shuffle White Sword Cave item",
        "Adds the White Sword Cave item to the shuffle pool.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_magical_sword_cave_item",
        "Shuffle Magical Sword Cave item",
        "Adds the Magical Sword Cave item to the shuffle pool. If it lands in a room with a standing floor item it becomes a drop item.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_letter_cave_item",
        "Shuffle Letter Cave item",
        "Adds the Letter Cave item to the shuffle pool.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_shop_arrows",
        "Shuffle Shop Arrows",
        "Adds the wood arrows from the shop to the shuffle pool.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_shop_candle",
        "Shuffle Shop Candle",
        "Adds the blue candle from the shop to the shuffle pool.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_shop_ring",
        "Shuffle Shop Ring",
        "Adds the blue ring from the shop to the shuffle pool. The slot is re-priced for whatever lands there.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_shop_book",
        "Shuffle Shop Book",
        "Adds the book from the shop, if one is present, to the shuffle pool.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_shop_bait",
        "Shuffle Shop Bait",
        "Adds one bait from the shops to the shuffle pool; the other bait slot is replaced with a fairy.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_potion_shop_items",
        "Shuffle Potion Shop Items",
        "Adds both potions in the potion shop to the shuffle pool. Red potions that land in dungeons are downgraded to blue.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_dungeon_hearts",
        "Shuffle Dungeon Hearts",
        "Adds the heart containers found in dungeons to the shuffle pool.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_within_level",
        "Shuffle Items Within Levels",
        "Re-shuffle each dungeon's items among its own rooms after the major shuffle.",
        ItemShuffle
    ),
    flag_def!(
        "shuffle_minor_dungeon_items",
        "Shuffle Minor Dungeon Items",
        "Adds minor items (five rupees, bombs, keys) to the shuffle pool. Intended for the vanilla base image only.",
        Legacy
    ),
    flag_def!(
        "force_sword_to_open_cave",
        "Force Sword to Open Cave",
        "Guarantee the Wood Sword Cave slot holds a sword so a weapon is available from the start.",
        LogicAndDifficulty
    ),
    flag_def!(
        "avoid_required_hard_combat",
        "Avoid Requiring Hard Combat",
        "Logic will not require fighting Blue Darknuts, Blue Wizzrobes, Gleeoks or Patras without a ring and a sword upgrade.",
        LogicAndDifficulty
    ),
    flag_def!(
        "force_arrow_to_level_nine",
        "Force an Arrow to Level 9",
        "The silver arrow may only be placed in level 9. Seeds with several items forced there can take a long time to generate.",
        Experimental
    ),
    flag_def!(
        "force_ring_to_level_nine",
        "Force a Ring to Level 9",
        "Require that a ring be placed in level 9.",
        Experimental
    ),
    flag_def!(
        "force_wand_to_level_nine",
        "Force a Wand to Level 9",
        "Require that a wand be placed in level 9.",
        Experimental
    ),
    flag_def!(
        "force_heart_container_to_level_nine",
        "Force a Heart Container to Level 9",
        "Require that at least one heart container be placed in level 9.",
        Experimental
    ),
    flag_def!(
        "force_heart_container_to_armos",
        "Force Heart Container to Armos",
        "Require the Armos item to be a heart container. Needs the Armos slot in the pool.",
        Experimental
    ),
    flag_def!(
        "force_heart_container_to_coast",
        "Force Heart Container to Coast",
        "Require the Coast item to be a heart container. Needs the Coast slot in the pool.",
        Experimental
    ),
    flag_def!(
        "allow_important_items_in_level_nine",
        "Allow Important Items in Level 9",
        "Allow the bow, ladder, raft, recorder and power bracelet to be placed in level 9. Off by default.",
        Experimental
    ),
    flag_def!(
        "force_major_item_to_boss",
        "Force Major Item to Boss Room",
        "Require that at least one major item or triforce land in a room with a boss enemy during the within-level shuffle.",
        Experimental
    ),
    flag_def!(
        "force_major_item_to_triforce_room",
        "Force Major Item to Triforce Room",
        "Require that at least one major item or triforce land in the triforce room during the within-level shuffle.",
        Experimental
    ),
    flag_def!(
        "item_stair_can_have_triforce",
        "Item Staircase Can Have Triforce",
        "Allow the triforce in item staircase rooms of levels 1-8. When off, the within-level shuffle keeps it out of staircases.",
        Experimental,
        true
    ),
    flag_def!(
        "item_stair_can_have_heart_container",
        "Item Staircase Can Have Heart Container",
        "Allow heart containers in item staircase rooms of levels 1-8. When off, the within-level shuffle keeps them out of staircases.",
        Experimental,
        true
    ),
    flag_def!(
        "item_stair_can_have_minor_item",
        "Item Staircase Can Have Minor Items",
        "Allow minor items (bombs, keys, five rupees, maps, compasses) in item staircase rooms. When off, the within-level shuffle keeps them out.",
        Experimental,
        true
    ),
    flag_def!(
        "increased_bait_blocks",
        "Increased Bait Blocks",
        "Insert a bait blocker so a region is only reachable by feeding the hungry goriya. Best-effort per layout.",
        Experimental
    ),
    flag_def!(
        "extra_raft_blocks",
        "Extra Raft Blocks",
        "Convert additional regions into raft-blocked areas.",
        Experimental
    ),
    flag_def!(
        "extra_power_bracelet_blocks",
        "Extra Power Bracelet Blocks",
        "Add power bracelet blocks in West Death Mountain.",
        Experimental
    ),
    flag_def!(
        "shuffle_start_screen",
        "Shuffle Start Screen",
        "Start the game on a random overworld screen instead of the vanilla one.",
        OverworldRandomization
    ),
    flag_def!(
        "full_start_shuffle",
        "Full Start Screen Shuffle",
        "Allow every screen as a start candidate instead of only the easy ones.",
        OverworldRandomization
    ),
    flag_def!(
        "randomize_heart_container_requirements",
        "Randomize Heart Requirements",
        "Randomize the hearts needed for the White Sword (4-6) and Magical Sword (10-12) caves.",
        OverworldRandomization
    ),
    flag_def!(
        "dont_guarantee_starting_sword",
        "Don't Guarantee Starting Sword",
        "Drop the guarantee that an open-screen cave holds a sword or wand. You may have to dive dungeons weaponless.",
        OverworldRandomization
    ),
    flag_def!(
        "randomize_lost_hills",
        "Randomize Lost Hills",
        "Randomize the Lost Hills direction sequence and add a hint NPC.",
        OverworldRandomization
    ),
    flag_def!(
        "randomize_dead_woods",
        "Randomize Dead Woods",
        "Randomize the Dead Woods direction sequence and add a hint NPC.",
        OverworldRandomization
    ),
    flag_def!(
        "progressive_items",
        "Progressive Items",
        "Swords, candles, arrows and rings become progressive: collecting a second copy upgrades to the next tier.",
        ItemChanges
    ),
    flag_def!(
        "add_l4_sword",
        "Add L4 Sword",
        "Adds a fourth sword upgrade guarded by the level 9 triforce check.",
        ItemChanges
    ),
    flag_def!(
        "magical_boomerang_does_one_hp_damage",
        "Magical Boomerang Does 1 HP Damage",
        "The magical boomerang deals wood-sword damage to enemies.",
        ItemChanges
    ),
    flag_def!(
        "keep_health_after_death_warp",
        "Keep Health After Death Warp",
        "Keep current hearts instead of resetting them when continuing after a death warp.",
        ItemChanges
    ),
    flag_def!(
        "increase_minimum_health",
        "Increase Minimum Health",
        "Raise the minimum hearts restored when continuing.",
        ItemChanges
    ),
    flag_def!(
        "select_swap",
        "Item Swap with Select",
        "Select cycles the B-button item instead of pausing.",
        QualityOfLife
    ),
    flag_def!(
        "speed_up_text",
        "Speed Up Text",
        "Faster text scrolling in caves and dungeons.",
        QualityOfLife
    ),
    flag_def!(
        "speed_up_dungeon_transitions",
        "Speed Up Dungeon Transitions",
        "Dungeon room transitions run as fast as overworld screen transitions.",
        QualityOfLife
    ),
    flag_def!(
        "community_hints",
        "Community Hints",
        "Use community hints for non-hint NPCs; otherwise hints are blanked.",
        QualityOfLife
    ),
    flag_def!(
        "fast_fill",
        "Fast Fill",
        "Fill hearts faster from fairies and potions.",
        QualityOfLife
    ),
    flag_def!(
        "low_hearts_sound",
        "Softer Low Hearts Sound",
        "Replace the low-hearts beep with a softer heartbeat.",
        QualityOfLife
    ),
    flag_def!(
        "flute_kills_pols_voice",
        "Flute Kills Pols Voice",
        "Playing the flute kills all Pols Voice in dungeons.",
        QualityOfLife
    ),
    flag_def!(
        "four_potion_inventory",
        "Four Potion Inventory",
        "Increase potion inventory from 2 to 4 blue potions.",
        QualityOfLife
    ),
    flag_def!(
        "auto_show_letter",
        "Auto Show Letter",
        "Show the letter to NPCs without equipping it.",
        QualityOfLife
    ),
    flag_def!(
        "randomize_level_text",
        "Randomize Level Text",
        "Pick a random word for the \"level-#\" text shown in dungeons.",
        Cosmetic
    ),
    flag_def!(
        "force_two_heart_containers_to_level_nine",
        "Force Two Heart Containers to Level 9",
        "Require two heart containers in level 9. Needs at least two hearts in the pool.",
        Hidden
    ),
];

/// Number of bits carried in the flagstring.
pub fn encoded_flag_count() -> usize {
    FLAG_DEFS.iter().filter(|d| d.category.encodable()).count()
}

/// Flagstring length in characters.
pub fn flagstring_len() -> usize {
    encoded_flag_count().div_ceil(3)
}

/// A complete flag assignment, plus the two complex out-of-band flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flags {
    values: Vec<bool>,
    /// Items granted before validation starts.
    pub starting_items: Vec<Item>,
    /// Items replaced with rupees when writing the output.
    pub skip_items: Vec<Item>,
}

impl Default for Flags {
    fn default() -> Flags {
        Flags {
            values: FLAG_DEFS.iter().map(|d| d.default).collect(),
            starting_items: Vec::new(),
            skip_items: Vec::new(),
        }
    }
}

impl Flags {
    pub fn new() -> Flags {
        Flags::default()
    }

    pub fn get(&self, flag: Flag) -> bool {
        self.values[flag as usize]
    }

    /// Set a flag. Disabling the master shuffle toggle atomically forces the
    /// dependent shuffle flags off; re-enabling it restores nothing.
    pub fn set(&mut self, flag: Flag, value: bool) {
        self.values[flag as usize] = value;
        if flag == Flag::MajorItemShuffle && !value {
            for dep in DEPENDENT_SHUFFLE_FLAGS {
                self.values[dep as usize] = false;
            }
        }
    }

    pub fn with(mut self, flag: Flag, value: bool) -> Flags {
        self.set(flag, value);
        self
    }

    pub fn set_by_key(&mut self, key: &str, value: bool) -> bool {
        match Flag::from_key(key) {
            Some(flag) => {
                self.set(flag, value);
                true
            }
            None => false,
        }
    }

    /// Legacy flags only make sense against the vanilla image; against
    /// anything else they are forced off.
    pub fn apply_base_image_policy(&mut self, is_vanilla_base: bool) {
        use strum::IntoEnumIterator;
        if is_vanilla_base {
            return;
        }
        for flag in Flag::iter() {
            if flag.category() == FlagCategory::Legacy && self.get(flag) {
                log::warn!(
                    "flag {} requires the vanilla base image; forcing it off",
                    flag.key()
                );
                self.set(flag, false);
            }
        }
    }

    /// Encode the encodable bits, declaration order, most significant bit
    /// first within each 3-bit octal digit.
    pub fn encode_flagstring(&self) -> String {
        use strum::IntoEnumIterator;
        let bits: Vec<bool> = Flag::iter()
            .filter(|f| f.category().encodable())
            .map(|f| self.get(f))
            .collect();
        let mut out = String::with_capacity(flagstring_len());
        for chunk in 0..flagstring_len() {
            let mut digit = 0usize;
            for i in 0..3 {
                let bit = bits.get(chunk * 3 + i).copied().unwrap_or(false);
                digit = digit << 1 | bit as usize;
            }
            out.push(FLAGSTRING_ALPHABET[digit]);
        }
        out
    }

    /// Decode a flagstring into a fresh flag set. Rejects strings of the
    /// wrong length, letters outside the alphabet, and set padding bits.
    /// Non-encodable flags come back at their defaults.
    pub fn decode_flagstring(s: &str) -> Option<Flags> {
        use strum::IntoEnumIterator;
        if s.chars().count() != flagstring_len() {
            return None;
        }
        let mut bits: Vec<bool> = Vec::with_capacity(flagstring_len() * 3);
        for c in s.chars() {
            let digit = FLAGSTRING_ALPHABET.iter().position(|&a| a == c)?;
            bits.push(digit & 0b100 != 0);
            bits.push(digit & 0b010 != 0);
            bits.push(digit & 0b001 != 0);
        }
        // Padding bits past the last enumerated flag must be zero.
        if bits[encoded_flag_count()..].iter().any(|&b| b) {
            return None;
        }
        let mut flags = Flags::new();
        let encodable: Vec<Flag> = Flag::iter().filter(|f| f.category().encodable()).collect();
        // Raw assignment, bypassing the master rule: the string is the
        // authoritative bit pattern.
        for (flag, &bit) in encodable.iter().zip(&bits) {
            flags.values[*flag as usize] = bit;
        }
        Some(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn defs_table_matches_enum_order() {
        assert_eq!(Flag::iter().count(), FLAG_DEFS.len());
        assert_eq!(Flag::MajorItemShuffle.key(), "major_item_shuffle");
        assert_eq!(
            Flag::ForceTwoHeartContainersToLevelNine.key(),
            "force_two_heart_containers_to_level_nine"
        );
    }

    #[test]
    fn fifteen_bits_five_letters() {
        assert_eq!(encoded_flag_count(), 15);
        assert_eq!(flagstring_len(), 5);
        assert_eq!(Flag::MajorItemShuffle.bit(), Some(0));
        assert_eq!(Flag::AvoidRequiredHardCombat.bit(), Some(14));
        assert_eq!(Flag::ProgressiveItems.bit(), None);
    }

    #[test]
    fn empty_set_encodes_as_all_b() {
        assert_eq!(Flags::new().encode_flagstring(), "BBBBB");
    }

    #[test]
    fn master_only_encodes_first_bit() {
        let flags = Flags::new().with(Flag::MajorItemShuffle, true);
        // Bit 0 is the most significant bit of the first octal digit: 0b100 = G.
        assert_eq!(flags.encode_flagstring(), "GBBBB");
    }

    #[test]
    fn decode_inverts_encode_for_every_single_bit() {
        for flag in Flag::iter().filter(|f| f.category().encodable()) {
            let mut flags = Flags::new();
            flags.values[flag as usize] = true;
            let s = flags.encode_flagstring();
            let decoded = Flags::decode_flagstring(&s).unwrap();
            assert_eq!(decoded, flags, "round-trip failed for {}", flag.key());
        }
    }

    #[test]
    fn decode_inverts_encode_for_bit_patterns() {
        let encodable: Vec<Flag> = Flag::iter().filter(|f| f.category().encodable()).collect();
        // Walk a spread of patterns over the 15 bits.
        for pattern in [0usize, 0x1, 0x7FFF, 0x2A55, 0x4321, 0x5555, 0x7abc & 0x7FFF] {
            let mut flags = Flags::new();
            for (i, &flag) in encodable.iter().enumerate() {
                flags.values[flag as usize] = pattern >> i & 1 != 0;
            }
            let decoded = Flags::decode_flagstring(&flags.encode_flagstring()).unwrap();
            assert_eq!(decoded, flags, "pattern 0x{pattern:04X}");
        }
    }

    #[test]
    fn decode_rejects_bad_input() {
        assert!(Flags::decode_flagstring("").is_none());
        assert!(Flags::decode_flagstring("BBBB").is_none());
        assert!(Flags::decode_flagstring("BBBBBB").is_none());
        assert!(Flags::decode_flagstring("ABBBB").is_none());
        assert!(Flags::decode_flagstring("BBBBE").is_none());
        // Lowercase is not part of the alphabet either.
        assert!(Flags::decode_flagstring("bbbbb").is_none());
    }

    #[test]
    fn last_letter_carries_the_last_flag() {
        // C sets the lowest bit of the final digit, which is bit 14.
        let decoded = Flags::decode_flagstring("BBBBC").unwrap();
        assert!(decoded.get(Flag::AvoidRequiredHardCombat));
        assert_eq!(decoded.encode_flagstring(), "BBBBC");
    }

    #[test]
    fn leading_b_is_zero_padding() {
        let decoded = Flags::decode_flagstring("BBBBB").unwrap();
        assert_eq!(decoded, Flags::new());
    }

    #[test]
    fn disabling_master_clears_dependents() {
        let mut flags = Flags::new();
        flags.set(Flag::MajorItemShuffle, true);
        flags.set(Flag::ShuffleShopRing, true);
        flags.set(Flag::ShuffleWithinLevel, true);
        flags.set(Flag::MajorItemShuffle, false);
        assert!(!flags.get(Flag::ShuffleShopRing));
        assert!(!flags.get(Flag::ShuffleWithinLevel));
        // Re-enabling restores nothing.
        flags.set(Flag::MajorItemShuffle, true);
        assert!(!flags.get(Flag::ShuffleShopRing));
    }

    #[test]
    fn master_rule_does_not_touch_unrelated_flags() {
        let mut flags = Flags::new();
        flags.set(Flag::AvoidRequiredHardCombat, true);
        flags.set(Flag::ProgressiveItems, true);
        flags.set(Flag::MajorItemShuffle, false);
        assert!(flags.get(Flag::AvoidRequiredHardCombat));
        assert!(flags.get(Flag::ProgressiveItems));
    }

    #[test]
    fn legacy_flags_forced_off_on_non_vanilla_base() {
        let mut flags = Flags::new();
        flags.set(Flag::MajorItemShuffle, true);
        flags.set(Flag::ShuffleMinorDungeonItems, true);
        flags.apply_base_image_policy(false);
        assert!(!flags.get(Flag::ShuffleMinorDungeonItems));
        assert!(flags.get(Flag::MajorItemShuffle));

        let mut flags = Flags::new();
        flags.set(Flag::MajorItemShuffle, true);
        flags.set(Flag::ShuffleMinorDungeonItems, true);
        flags.apply_base_image_policy(true);
        assert!(flags.get(Flag::ShuffleMinorDungeonItems));
    }

    #[test]
    fn staircase_permission_flags_default_on() {
        let flags = Flags::new();
        assert!(flags.get(Flag::ItemStairCanHaveTriforce));
        assert!(flags.get(Flag::ItemStairCanHaveHeartContainer));
        assert!(flags.get(Flag::ItemStairCanHaveMinorItem));
        assert!(!flags.get(Flag::ForceMajorItemToBoss));
        assert!(!flags.get(Flag::ForceMajorItemToTriforceRoom));
        // Encodable flags must default off, or the all-B flagstring would
        // stop matching the default set.
        for flag in Flag::iter().filter(|f| f.category().encodable()) {
            assert!(!flag.def().default, "{} defaults on", flag.key());
        }
    }

    #[test]
    fn set_by_key_round_trips() {
        let mut flags = Flags::new();
        assert!(flags.set_by_key("progressive_items", true));
        assert!(flags.get(Flag::ProgressiveItems));
        assert!(!flags.set_by_key("not_a_flag", true));
    }
}
