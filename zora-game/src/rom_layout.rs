//! Declarative memory map for the base image.
//!
//! All addresses are file offsets (they include the 0x10 iNES header). NES
//! technical documentation uses CPU addresses instead; the relationship is
//! `file_offset = cpu_address + 0x10`.

/// Size of the iNES header. Nothing in this range may ever be written.
pub const HEADER_SIZE: usize = 0x10;

/// Total size of the supported base image: 0x10 header + 128 KiB PRG + 8 KiB CHR.
pub const BASE_IMAGE_LEN: usize = 0x20010;

/// The fixed leading bytes of the iNES header ("NES\x1A").
pub const HEADER_MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

/// What kind of entity a region holds. Consumed by [`crate::GameData`] when
/// deciding how to parse and re-serialize a region.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EntityKind {
    ItemSlot,
    EnemyGroup,
    Pointer,
    RoomTable,
    LevelInfo,
    CaveTable,
    Requirement,
    HintText,
    Code,
}

/// One declared region of the base image. Regions not declared here are
/// read-only; writes outside a writable region are rejected as out-of-region.
#[derive(Copy, Clone, Debug)]
pub struct RomRegion {
    pub name: &'static str,
    pub file_offset: usize,
    pub size: usize,
    pub kind: EntityKind,
    pub writable: bool,
}

impl RomRegion {
    pub const fn end_offset(&self) -> usize {
        self.file_offset + self.size
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.file_offset && offset < self.end_offset()
    }
}

pub const OVERWORLD_DATA: RomRegion = RomRegion {
    name: "overworld_data",
    file_offset: 0x18410,
    size: 0x300,
    kind: EntityKind::RoomTable,
    writable: true,
};

pub const LEVEL_1_TO_6_DATA: RomRegion = RomRegion {
    name: "level_1_to_6_data",
    file_offset: 0x18710,
    size: 0x300,
    kind: EntityKind::RoomTable,
    writable: true,
};

pub const LEVEL_7_TO_9_DATA: RomRegion = RomRegion {
    name: "level_7_to_9_data",
    file_offset: 0x18A10,
    size: 0x300,
    kind: EntityKind::RoomTable,
    writable: true,
};

/// Ten 0xFC-byte blocks: block 0 describes the overworld (start screen at
/// offset 0x2F), blocks 1-9 describe the dungeons (start room 0x2F, compass
/// pointer 0x30, stairway room list from 0x34, 0xFF-terminated).
pub const LEVEL_INFO: RomRegion = RomRegion {
    name: "level_info",
    file_offset: 0x19310,
    size: 0x9D8,
    kind: EntityKind::LevelInfo,
    writable: true,
};

/// Cave item bytes: 20 caves x 3 slots, cave-major. This range is table 4 of
/// the overworld block, repurposed by the game for cave contents.
pub const CAVE_ITEM_DATA: RomRegion = RomRegion {
    name: "cave_item_data",
    file_offset: 0x18610,
    size: 0x3C,
    kind: EntityKind::CaveTable,
    writable: true,
};

/// Cave price bytes, immediately following the item bytes.
pub const CAVE_PRICE_DATA: RomRegion = RomRegion {
    name: "cave_price_data",
    file_offset: 0x1864C,
    size: 0x3C,
    kind: EntityKind::CaveTable,
    writable: true,
};

pub const ARMOS_ITEM: RomRegion = RomRegion {
    name: "armos_item",
    file_offset: 0x10D05,
    size: 1,
    kind: EntityKind::ItemSlot,
    writable: true,
};

pub const COAST_ITEM: RomRegion = RomRegion {
    name: "coast_item",
    file_offset: 0x1789A,
    size: 1,
    kind: EntityKind::ItemSlot,
    writable: true,
};

/// Encoded as (hearts - 1) * 16.
pub const WHITE_SWORD_REQUIREMENT: RomRegion = RomRegion {
    name: "white_sword_requirement",
    file_offset: 0x490D,
    size: 1,
    kind: EntityKind::Requirement,
    writable: true,
};

/// Encoded as (hearts - 1) * 16.
pub const MAGICAL_SWORD_REQUIREMENT: RomRegion = RomRegion {
    name: "magical_sword_requirement",
    file_offset: 0x4916,
    size: 1,
    kind: EntityKind::Requirement,
    writable: true,
};

pub const TRIFORCE_REQUIREMENT: RomRegion = RomRegion {
    name: "triforce_requirement",
    file_offset: 0x5F27,
    size: 1,
    kind: EntityKind::Requirement,
    writable: false,
};

pub const ANY_ROAD_SCREENS: RomRegion = RomRegion {
    name: "any_road_screens",
    file_offset: 0x19344,
    size: 4,
    kind: EntityKind::Pointer,
    writable: true,
};

pub const RECORDER_WARP_DESTINATIONS: RomRegion = RomRegion {
    name: "recorder_warp_destinations",
    file_offset: 0x6020,
    size: 8,
    kind: EntityKind::Pointer,
    writable: true,
};

/// The byte the game compares room item codes against to decide "no item".
/// Rewritten from the vanilla 0x03 so a magical sword can sit in a dungeon.
pub const DUNGEON_NO_ITEM_CODE: RomRegion = RomRegion {
    name: "dungeon_no_item_code",
    file_offset: 0x1785F,
    size: 1,
    kind: EntityKind::Code,
    writable: true,
};

pub const HINT_TEXT: RomRegion = RomRegion {
    name: "hint_text",
    file_offset: 0x4010,
    size: 0x4C,
    kind: EntityKind::HintText,
    writable: true,
};

/// Every declared region, for boundary checks and diagnostics.
pub const REGIONS: &[RomRegion] = &[
    OVERWORLD_DATA,
    LEVEL_1_TO_6_DATA,
    LEVEL_7_TO_9_DATA,
    LEVEL_INFO,
    CAVE_ITEM_DATA,
    CAVE_PRICE_DATA,
    ARMOS_ITEM,
    COAST_ITEM,
    WHITE_SWORD_REQUIREMENT,
    MAGICAL_SWORD_REQUIREMENT,
    TRIFORCE_REQUIREMENT,
    ANY_ROAD_SCREENS,
    RECORDER_WARP_DESTINATIONS,
    DUNGEON_NO_ITEM_CODE,
    HINT_TEXT,
];

/// Offsets within a 0xFC-byte level-info block.
pub const LEVEL_INFO_BLOCK_SIZE: usize = 0xFC;
pub const LEVEL_INFO_START_ROOM_OFFSET: usize = 0x2F;
pub const LEVEL_INFO_COMPASS_OFFSET: usize = 0x30;
pub const LEVEL_INFO_STAIRWAY_LIST_OFFSET: usize = 0x34;
pub const LEVEL_INFO_STAIRWAY_LIST_LEN: usize = 10;

/// Room tables: 6 tables of 0x80 bytes each.
pub const ROOM_TABLE_SIZE: usize = 0x80;
pub const TABLES_PER_ROOM: usize = 6;

pub fn region_for_offset(offset: usize) -> Option<&'static RomRegion> {
    REGIONS.iter().find(|r| r.contains(offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_fit_inside_base_image() {
        for region in REGIONS {
            assert!(region.file_offset >= HEADER_SIZE, "{}", region.name);
            assert!(region.end_offset() <= BASE_IMAGE_LEN, "{}", region.name);
        }
    }

    #[test]
    fn cave_tables_live_inside_overworld_table_4() {
        let table4_start = OVERWORLD_DATA.file_offset + 4 * ROOM_TABLE_SIZE;
        assert_eq!(CAVE_ITEM_DATA.file_offset, table4_start);
        assert_eq!(CAVE_PRICE_DATA.file_offset, table4_start + 0x3C);
        assert!(CAVE_PRICE_DATA.end_offset() <= table4_start + ROOM_TABLE_SIZE);
    }

    #[test]
    fn lookup_by_offset() {
        assert_eq!(region_for_offset(0x18410).unwrap().name, "overworld_data");
        assert_eq!(region_for_offset(0x10D05).unwrap().name, "armos_item");
        assert!(region_for_offset(0x0).is_none());
    }
}
