//! Synthetic base-image builder.
//!
//! The real base image cannot be distributed, so tests build a small but
//! coherent world through this builder: nine connected dungeons, the cave and
//! shop inventory, and overworld destinations arranged so the vanilla layout
//! is beatable end to end. The builder mutates a [`GameData`] parsed from a
//! blank image and serializes it through the same codec the randomizer uses,
//! so round-trip bugs surface here first.

use crate::rom_layout::{
    self, BASE_IMAGE_LEN, HEADER_MAGIC, LEVEL_INFO_BLOCK_SIZE, LEVEL_INFO_COMPASS_OFFSET,
    LEVEL_INFO_START_ROOM_OFFSET, LEVEL_INFO_STAIRWAY_LIST_LEN, LEVEL_INFO_STAIRWAY_LIST_OFFSET,
    ROOM_TABLE_SIZE, TABLES_PER_ROOM,
};
use crate::{
    CaveType, Destination, Direction, Enemy, GameData, Item, LevelNum, RoomNum, RoomType,
    ScreenNum, SlotNum, VANILLA_NO_ITEM_CODE, VANILLA_START_SCREEN, WallType,
};

/// Vanilla overworld screens for levels 1-9.
pub const VANILLA_LEVEL_SCREENS: [ScreenNum; 9] =
    [0x37, 0x3C, 0x74, 0x45, 0x0B, 0x22, 0x42, 0x6D, 0x05];

pub const VANILLA_WHITE_SWORD_SCREEN: ScreenNum = 0x0A;
pub const VANILLA_MAGICAL_SWORD_SCREEN: ScreenNum = 0x21;
pub const VANILLA_LETTER_SCREEN: ScreenNum = 0x0E;
pub const VANILLA_ARMOS_SCREEN: ScreenNum = 0x24;
pub const VANILLA_COAST_SCREEN: ScreenNum = 0x2F;
pub const VANILLA_POTION_SHOP_SCREEN: ScreenNum = 0x4A;

pub struct TestRomBuilder {
    data: GameData,
}

impl TestRomBuilder {
    /// A structurally valid but empty image: solid dungeon walls everywhere,
    /// empty item slots, terminated stairway lists.
    pub fn blank() -> TestRomBuilder {
        let mut image = vec![0u8; BASE_IMAGE_LEN];
        image[..4].copy_from_slice(&HEADER_MAGIC);

        // All dungeon walls solid, all room item slots empty.
        let solid = (WallType::SolidWall as u8) << 5 | (WallType::SolidWall as u8) << 2;
        for block_offset in [
            rom_layout::LEVEL_1_TO_6_DATA.file_offset,
            rom_layout::LEVEL_7_TO_9_DATA.file_offset,
        ] {
            for room in 0..ROOM_TABLE_SIZE {
                image[block_offset + room] = solid;
                image[block_offset + ROOM_TABLE_SIZE + room] = solid;
                image[block_offset + 4 * ROOM_TABLE_SIZE + room] = VANILLA_NO_ITEM_CODE;
            }
        }

        // Empty cave slots.
        for i in 0..rom_layout::CAVE_ITEM_DATA.size {
            image[rom_layout::CAVE_ITEM_DATA.file_offset + i] = crate::CAVE_NO_ITEM_CODE;
        }
        image[rom_layout::ARMOS_ITEM.file_offset] = crate::CAVE_NO_ITEM_CODE;
        image[rom_layout::COAST_ITEM.file_offset] = crate::CAVE_NO_ITEM_CODE;

        // Terminated stairway lists in every level-info block.
        for block in 0..10 {
            let base = rom_layout::LEVEL_INFO.file_offset + block * LEVEL_INFO_BLOCK_SIZE;
            for i in 0..LEVEL_INFO_STAIRWAY_LIST_LEN {
                image[base + LEVEL_INFO_STAIRWAY_LIST_OFFSET + i] = 0xFF;
            }
        }

        // Heart requirements: 5 and 12, in the (hearts - 1) * 16 encoding.
        image[rom_layout::WHITE_SWORD_REQUIREMENT.file_offset] = 0x40;
        image[rom_layout::MAGICAL_SWORD_REQUIREMENT.file_offset] = 0xB0;
        image[rom_layout::TRIFORCE_REQUIREMENT.file_offset] = 8;
        image[rom_layout::DUNGEON_NO_ITEM_CODE.file_offset] = VANILLA_NO_ITEM_CODE;

        let data = GameData::from_base_image(&image).expect("blank image must parse");
        TestRomBuilder { data }
    }

    /// The full vanilla-like world used by most tests.
    pub fn vanilla() -> TestRomBuilder {
        let mut b = TestRomBuilder::blank();

        // Overworld: start position and level/cave destinations.
        b.data.set_start_screen(VANILLA_START_SCREEN);
        b.data.set_start_compass_pointer(VANILLA_START_SCREEN);
        for (i, &screen) in VANILLA_LEVEL_SCREENS.iter().enumerate() {
            b = b.with_screen_destination(screen, Destination::Level(i + 1));
        }
        b = b
            .with_screen_destination(VANILLA_START_SCREEN, Destination::Cave(CaveType::WoodSwordCave))
            .with_screen_destination(VANILLA_WHITE_SWORD_SCREEN, Destination::Cave(CaveType::WhiteSwordCave))
            .with_screen_destination(VANILLA_MAGICAL_SWORD_SCREEN, Destination::Cave(CaveType::MagicalSwordCave))
            .with_screen_destination(VANILLA_LETTER_SCREEN, Destination::Cave(CaveType::LetterCave))
            .with_screen_destination(0x46, Destination::Cave(CaveType::ShopA))
            .with_screen_destination(0x66, Destination::Cave(CaveType::ShopB))
            .with_screen_destination(0x33, Destination::Cave(CaveType::ShopC))
            .with_screen_destination(0x44, Destination::Cave(CaveType::ShopD))
            .with_screen_destination(VANILLA_POTION_SHOP_SCREEN, Destination::Cave(CaveType::PotionShop))
            .with_screen_destination(VANILLA_ARMOS_SCREEN, Destination::Cave(CaveType::ArmosItem))
            .with_screen_destination(VANILLA_COAST_SCREEN, Destination::Cave(CaveType::CoastItem));
        for &screen in &[0x1D, 0x23, 0x49, 0x79] {
            b = b.with_screen_destination(screen, Destination::Cave(CaveType::AnyRoad));
        }

        // A few populated screens, so start-shuffle has both kinds to choose from.
        for &screen in &[0x30, 0x31, 0x38, 0x48, 0x57, 0x67, 0x6E] {
            b.data.set_screen_enemy_byte(screen, 0x45);
        }

        // Cave and shop inventory.
        b = b
            .with_cave_item(CaveType::WoodSwordCave, 1, Item::WoodSword)
            .with_cave_item(CaveType::WhiteSwordCave, 1, Item::WhiteSword)
            .with_cave_item(CaveType::MagicalSwordCave, 1, Item::MagicalSword)
            .with_cave_item(CaveType::LetterCave, 1, Item::Letter)
            .with_cave_item(CaveType::ShopA, 0, Item::MagicalShield)
            .with_cave_item(CaveType::ShopA, 1, Item::Bait)
            .with_cave_item(CaveType::ShopA, 2, Item::WoodArrows)
            .with_cave_item(CaveType::ShopB, 0, Item::MagicalShield)
            .with_cave_item(CaveType::ShopB, 1, Item::Bait)
            .with_cave_item(CaveType::ShopB, 2, Item::BlueCandle)
            .with_cave_item(CaveType::ShopC, 0, Item::MagicalShield)
            .with_cave_item(CaveType::ShopC, 1, Item::Bait)
            .with_cave_item(CaveType::ShopC, 2, Item::SingleHeart)
            .with_cave_item(CaveType::ShopD, 0, Item::Key)
            .with_cave_item(CaveType::ShopD, 1, Item::BlueRing)
            .with_cave_item(CaveType::ShopD, 2, Item::Bait)
            .with_cave_item(CaveType::PotionShop, 0, Item::BluePotion)
            .with_cave_item(CaveType::PotionShop, 2, Item::RedPotion)
            .with_armos_item(Item::PowerBracelet)
            .with_coast_item(Item::HeartContainer);
        for shop in [CaveType::ShopA, CaveType::ShopB, CaveType::ShopC, CaveType::ShopD] {
            for slot in 0..3 {
                b.data.set_cave_price(shop, slot, 60 + 5 * slot as u8);
            }
        }

        // Dungeons. Each level is a short column: entrance at the bottom, a
        // major-item room and heart room above it, triforce room at the top.
        let majors: [Item; 9] = [
            Item::Bow,
            Item::MagicalBoomerang,
            Item::Raft,
            Item::Ladder,
            Item::Recorder,
            Item::Wand,
            Item::RedCandle,
            Item::MagicalKey,
            Item::SilverArrows,
        ];
        for level in 1..=9 {
            b.add_level_skeleton(level, majors[level - 1]);
        }

        // Level 1 also carries an item staircase with the wood boomerang,
        // reached through the push block in its major-item room.
        b.set_stairway_list(1, &[0x7F]);
        {
            let stair = b.data.room_mut(1, 0x7F);
            stair.set_room_type(RoomType::ItemStaircase);
            stair.set_exits(0x60, 0x60);
        }
        b.data.set_room_item(1, 0x7F, Some(Item::WoodBoomerang));
        {
            let room_a = b.data.room_mut(1, 0x60);
            room_a.set_room_type(RoomType::DoubleBlock);
            room_a.bytes[3] |= 0x40; // movable block
        }

        // Level 8 has a second major item (the book) east of its triforce room.
        {
            let room_c = b.data.room_mut(8, 0x52);
            room_c.set_wall_type(Direction::East, WallType::OpenDoor);
        }
        {
            let room_d = b.data.room_mut(8, 0x53);
            room_d.set_wall_type(Direction::West, WallType::OpenDoor);
        }
        b.data.set_room_item(8, 0x53, Some(Item::Book));

        // Level 9: the ring room, then the beast guarding the kidnapped.
        b.data.set_room_item(9, 0x65, Some(Item::RedRing));
        {
            let room_b = b.data.room_mut(9, 0x65);
            room_b.set_wall_type(Direction::West, WallType::OpenDoor);
        }
        {
            let room_a = b.data.room_mut(9, 0x64);
            room_a.set_wall_type(Direction::East, WallType::OpenDoor);
        }
        b.data.set_room_item(9, 0x54, None);
        {
            let beast = b.data.room_mut(9, 0x54);
            beast.set_enemy(Enemy::TheBeast);
            beast.set_room_type(RoomType::GannonRoom);
            beast.set_wall_type(Direction::North, WallType::ShutterDoor);
        }
        {
            let zelda = b.data.room_mut(9, 0x44);
            zelda.set_enemy(Enemy::TheKidnapped);
            zelda.set_room_type(RoomType::ZeldaRoom);
            zelda.set_wall_type(Direction::South, WallType::OpenDoor);
        }
        b.data.set_room_item(9, 0x44, Some(Item::TriforceOfPower));

        b
    }

    /// Column layout per level: start room at row 7, major item and heart at
    /// row 6, triforce at row 5. Levels 1-6 use even columns of the shared
    /// first block; levels 7-9 restart at column 0 of the second block.
    fn level_column(level: LevelNum) -> RoomNum {
        if level <= 6 { (level - 1) * 2 } else { (level - 7) * 2 }
    }

    fn add_level_skeleton(&mut self, level: LevelNum, major: Item) {
        let c = TestRomBuilder::level_column(level);
        let start = 0x70 + c;
        let room_a = 0x60 + c;
        let room_b = 0x61 + c;
        let room_c = 0x50 + c;

        self.set_start_room(level, start);

        {
            let r = self.data.room_mut(level, start);
            r.set_room_type(RoomType::EntranceRoom);
            r.set_wall_type(Direction::North, WallType::OpenDoor);
        }
        {
            let r = self.data.room_mut(level, room_a);
            r.set_room_type(RoomType::PlainRoom);
            r.set_wall_type(Direction::South, WallType::OpenDoor);
            r.set_wall_type(Direction::North, WallType::OpenDoor);
            r.set_wall_type(Direction::East, WallType::OpenDoor);
        }
        {
            let r = self.data.room_mut(level, room_b);
            r.set_room_type(RoomType::PlainRoom);
            r.set_wall_type(Direction::West, WallType::OpenDoor);
        }
        {
            let r = self.data.room_mut(level, room_c);
            r.set_room_type(RoomType::TriforceRoom);
            r.set_wall_type(Direction::South, WallType::OpenDoor);
        }

        self.data.set_room_item(level, room_a, Some(major));
        if level <= 8 {
            self.data.set_room_item(level, room_b, Some(Item::HeartContainer));
            self.data.set_room_item(level, room_c, Some(Item::Triforce));
        } else {
            self.data.set_room_item(level, room_c, Some(Item::TriforceOfPower));
        }
    }

    // ------------------------------------------------------------------
    // Fluent knobs for individual tests
    // ------------------------------------------------------------------

    pub fn with_screen_destination(mut self, screen: ScreenNum, dest: Destination) -> Self {
        self.data.set_screen_destination(screen, Some(dest));
        self
    }

    pub fn with_cave_item(mut self, cave: CaveType, slot: SlotNum, item: Item) -> Self {
        self.data.set_cave_item(cave, slot, Some(item));
        self
    }

    pub fn with_armos_item(mut self, item: Item) -> Self {
        self.data.set_cave_item(CaveType::ArmosItem, 0, Some(item));
        self
    }

    pub fn with_coast_item(mut self, item: Item) -> Self {
        self.data.set_cave_item(CaveType::CoastItem, 0, Some(item));
        self
    }

    pub fn with_room_item(mut self, level: LevelNum, room: RoomNum, item: Item) -> Self {
        self.data.set_room_item(level, room, Some(item));
        self
    }

    pub fn with_room_enemy(mut self, level: LevelNum, room: RoomNum, enemy: Enemy) -> Self {
        self.data.room_mut(level, room).set_enemy(enemy);
        self
    }

    pub fn with_wall(
        mut self,
        level: LevelNum,
        room: RoomNum,
        direction: Direction,
        wall: WallType,
    ) -> Self {
        self.data.room_mut(level, room).set_wall_type(direction, wall);
        self
    }

    pub fn set_start_room(&mut self, level: LevelNum, room: RoomNum) {
        self.data.level_info[level][LEVEL_INFO_START_ROOM_OFFSET] = room as u8;
        self.data.level_info[level][LEVEL_INFO_COMPASS_OFFSET] = room as u8;
    }

    pub fn set_stairway_list(&mut self, level: LevelNum, rooms: &[RoomNum]) {
        for i in 0..LEVEL_INFO_STAIRWAY_LIST_LEN {
            self.data.level_info[level][LEVEL_INFO_STAIRWAY_LIST_OFFSET + i] =
                rooms.get(i).map_or(0xFF, |&r| r as u8);
        }
    }

    /// Serialize the configured world into a full base image.
    pub fn build(&self) -> Vec<u8> {
        let patch = self.data.drain_writes();
        patch
            .apply_to(self.data.base_image())
            .expect("builder writes stay inside the image")
    }

    /// Build and reparse, handing back a fresh data table over the new image.
    pub fn build_game_data(&self) -> GameData {
        GameData::from_base_image(&self.build()).expect("built image must parse")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vanilla_image_parses_and_round_trips() {
        let image = TestRomBuilder::vanilla().build();
        assert_eq!(image.len(), BASE_IMAGE_LEN);
        let data = GameData::from_base_image(&image).unwrap();
        assert_eq!(data.start_screen(), VANILLA_START_SCREEN);
        assert_eq!(
            data.screen_destination(0x37),
            Some(Destination::Level(1))
        );
        assert_eq!(data.cave_item(CaveType::WoodSwordCave, 1), Some(Item::WoodSword));
        assert_eq!(data.cave_item(CaveType::CoastItem, 0), Some(Item::HeartContainer));
        assert_eq!(data.room_item(1, 0x60), Some(Item::Bow));
        assert_eq!(data.room_item(9, 0x65), Some(Item::RedRing));
        assert!(data.is_vanilla_base());
    }

    #[test]
    fn vanilla_levels_have_disjoint_room_columns() {
        let data = TestRomBuilder::vanilla().build_game_data();
        // Levels 1-6 share a block; their start rooms must all differ.
        let mut starts: Vec<_> = (1..=6).map(|l| data.level_start_room(l)).collect();
        starts.dedup();
        assert_eq!(starts.len(), 6);
    }

    #[test]
    fn stairway_list_round_trips() {
        let data = TestRomBuilder::vanilla().build_game_data();
        assert_eq!(data.level_stairway_rooms(1), vec![0x7F]);
        assert_eq!(data.level_stairway_rooms(2), Vec::<RoomNum>::new());
        assert_eq!(data.room_item(1, 0x7F), Some(Item::WoodBoomerang));
    }

    #[test]
    fn tables_per_room_is_six() {
        // The builder and parser must agree on the table count.
        assert_eq!(TABLES_PER_ROOM, 6);
    }
}
