// The changes suggested by this lint usually make the code more cluttered and less clear:
#![allow(clippy::needless_range_loop)]

pub mod patch;
pub mod rom_layout;
pub mod test_rom;

use num_enum::TryFromPrimitive;
use serde_derive::{Deserialize, Serialize};
use strum_macros::{EnumString, VariantNames};
use thiserror::Error;

use crate::patch::Patch;
use crate::rom_layout::{
    BASE_IMAGE_LEN, HEADER_MAGIC, LEVEL_INFO_BLOCK_SIZE, LEVEL_INFO_COMPASS_OFFSET,
    LEVEL_INFO_START_ROOM_OFFSET, LEVEL_INFO_STAIRWAY_LIST_LEN, LEVEL_INFO_STAIRWAY_LIST_OFFSET,
    ROOM_TABLE_SIZE, RomRegion, TABLES_PER_ROOM,
};

pub type LevelNum = usize; // 1..=9
pub type RoomNum = usize; // 0..0x80
pub type ScreenNum = usize; // 0..0x80
pub type SlotNum = usize; // 0..3

pub const NUM_SCREENS: usize = 0x80;
pub const NUM_ROOMS: usize = 0x80;
pub const NUM_LEVELS: usize = 9;
pub const NUM_CAVES: usize = 20;
pub const CAVE_SLOTS: usize = 3;
pub const VANILLA_START_SCREEN: ScreenNum = 0x77;

/// Vanilla "no item here" code for dungeon rooms. Collides with the magical
/// sword's item code, which is why the randomizer re-points it (see
/// [`GameData::normalize_no_item_code`]).
pub const VANILLA_NO_ITEM_CODE: u8 = 0x03;
/// The code empty rooms use after normalization (the Triforce of Power's
/// code, which the game never treats as a collectible floor item).
pub const NORMALIZED_NO_ITEM_CODE: u8 = 0x0E;

/// Item code meaning "empty slot" in cave data.
pub const CAVE_NO_ITEM_CODE: u8 = 0x3F;

#[derive(Debug, Error)]
pub enum GameDataError {
    #[error("invalid base image: {reason}")]
    InvalidBaseImage { reason: String },
    #[error("write outside declared memory map at offset 0x{offset:05X}")]
    OutOfRegion { offset: usize },
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, EnumString,
    VariantNames, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum Item {
    Bombs = 0x00,
    WoodSword = 0x01,
    WhiteSword = 0x02,
    MagicalSword = 0x03,
    Bait = 0x04,
    Recorder = 0x05,
    BlueCandle = 0x06,
    RedCandle = 0x07,
    WoodArrows = 0x08,
    SilverArrows = 0x09,
    Bow = 0x0A,
    MagicalKey = 0x0B,
    Raft = 0x0C,
    Ladder = 0x0D,
    TriforceOfPower = 0x0E,
    FiveRupees = 0x0F,
    Wand = 0x10,
    Book = 0x11,
    BlueRing = 0x12,
    RedRing = 0x13,
    PowerBracelet = 0x14,
    Letter = 0x15,
    Compass = 0x16,
    Map = 0x17,
    Rupee = 0x18,
    Key = 0x19,
    HeartContainer = 0x1A,
    Triforce = 0x1B,
    MagicalShield = 0x1C,
    WoodBoomerang = 0x1D,
    MagicalBoomerang = 0x1E,
    BluePotion = 0x1F,
    RedPotion = 0x20,
    Clock = 0x21,
    SingleHeart = 0x22,
    Fairy = 0x23,
}

/// Constraint category of an item slot's occupant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Major,
    Minor,
    DungeonHeart,
    Shop,
    Nothing,
}

/// A totally ordered family of item tiers. Acquiring any tier supersedes all
/// lower tiers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProgressiveClass {
    Sword,
    Boomerang,
    Ring,
    Candle,
    Arrow,
}

impl ProgressiveClass {
    pub const ALL: [ProgressiveClass; 5] = [
        ProgressiveClass::Sword,
        ProgressiveClass::Boomerang,
        ProgressiveClass::Ring,
        ProgressiveClass::Candle,
        ProgressiveClass::Arrow,
    ];

    /// Tiers in ascending order.
    pub fn tiers(self) -> &'static [Item] {
        match self {
            ProgressiveClass::Sword => &[Item::WoodSword, Item::WhiteSword, Item::MagicalSword],
            ProgressiveClass::Boomerang => &[Item::WoodBoomerang, Item::MagicalBoomerang],
            ProgressiveClass::Ring => &[Item::BlueRing, Item::RedRing],
            ProgressiveClass::Candle => &[Item::BlueCandle, Item::RedCandle],
            ProgressiveClass::Arrow => &[Item::WoodArrows, Item::SilverArrows],
        }
    }
}

impl Item {
    pub fn category(self) -> ItemCategory {
        use Item::*;
        match self {
            HeartContainer => ItemCategory::DungeonHeart,
            BluePotion | RedPotion | Clock | SingleHeart | Fairy => ItemCategory::Shop,
            Bombs | FiveRupees | Rupee | Key | Compass | Map | MagicalShield => ItemCategory::Minor,
            _ => ItemCategory::Major,
        }
    }

    /// Category of a slot's occupant, treating an empty slot as `Nothing`.
    pub fn category_of(slot: Option<Item>) -> ItemCategory {
        slot.map_or(ItemCategory::Nothing, Item::category)
    }

    pub fn is_major(self) -> bool {
        self.category() == ItemCategory::Major
            && !matches!(self, Item::Triforce | Item::TriforceOfPower)
    }

    pub fn is_minor(self) -> bool {
        self.category() == ItemCategory::Minor
    }

    pub fn is_sword(self) -> bool {
        matches!(self, Item::WoodSword | Item::WhiteSword | Item::MagicalSword)
    }

    /// The progressive class and ascending tier index (0-based), if any.
    pub fn progressive(self) -> Option<(ProgressiveClass, usize)> {
        for class in ProgressiveClass::ALL {
            if let Some(tier) = class.tiers().iter().position(|&t| t == self) {
                return Some((class, tier));
            }
        }
        None
    }

    /// Items the shop 5-bit dungeon field cannot represent.
    pub fn is_shop_only(self) -> bool {
        self as u8 > 0x1F
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

pub const CARDINAL_DIRECTIONS: [Direction; 4] = [
    Direction::West,
    Direction::North,
    Direction::East,
    Direction::South,
];

impl Direction {
    /// Room-number delta on the 16-wide dungeon grid.
    pub fn offset(self) -> isize {
        match self {
            Direction::North => -0x10,
            Direction::South => 0x10,
            Direction::East => 0x1,
            Direction::West => -0x1,
        }
    }

    pub fn inverse(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    /// The room adjacent to `room` in this direction, staying on the grid.
    pub fn neighbor(self, room: RoomNum) -> Option<RoomNum> {
        let next = room as isize + self.offset();
        // East/west moves must not wrap between rows.
        if matches!(self, Direction::East | Direction::West) && next / 0x10 != room as isize / 0x10
        {
            return None;
        }
        (0..NUM_ROOMS as isize).contains(&next).then_some(next as RoomNum)
    }
}

/// Three-bit wall code between two adjacent rooms.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum WallType {
    OpenDoor = 0,
    SolidWall = 1,
    WalkThroughWall1 = 2,
    WalkThroughWall2 = 3,
    BombHole = 4,
    LockedDoor1 = 5,
    LockedDoor2 = 6,
    ShutterDoor = 7,
}

impl WallType {
    pub fn is_locked(self) -> bool {
        matches!(self, WallType::LockedDoor1 | WallType::LockedDoor2)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum RoomType {
    PlainRoom = 0x00,
    SpikeTrapRoom = 0x01,
    FourShortRoom = 0x02,
    FourTallRoom = 0x03,
    AquamentusRoom = 0x04,
    GleeokRoom = 0x05,
    GohmaRoom = 0x06,
    ThreeRows = 0x07,
    ReverseC = 0x08,
    CircleWall = 0x09,
    DoubleBlock = 0x0A,
    LavaMoat = 0x0B,
    MazeRoom = 0x0C,
    GridRoom = 0x0D,
    VerticalChuteRoom = 0x0E,
    HorizontalChuteRoom = 0x0F,
    VerticalRows = 0x10,
    ZigzagRoom = 0x11,
    TRoom = 0x12,
    VerticalMoatRoom = 0x13,
    CircleMoatRoom = 0x14,
    PointlessMoatRoom = 0x15,
    ChevyRoom = 0x16,
    Nsu = 0x17,
    HorizontalMoatRoom = 0x18,
    DoubleMoatRoom = 0x19,
    DiamondStairRoom = 0x1A,
    NarrowStairRoom = 0x1B,
    SpiralStairRoom = 0x1C,
    DoubleSixBlockRoom = 0x1D,
    SingleSixBlockRoom = 0x1E,
    FivePairRoom = 0x1F,
    TurnstileRoom = 0x20,
    EntranceRoom = 0x21,
    SingleBlockRoom = 0x22,
    TwoFireballRoom = 0x23,
    FourFireballRoom = 0x24,
    DesertRoom = 0x25,
    BlackRoom = 0x26,
    ZeldaRoom = 0x27,
    GannonRoom = 0x28,
    TriforceRoom = 0x29,
    TransportStaircase = 0x3E,
    ItemStaircase = 0x3F,
}

impl RoomType {
    pub fn is_staircase(self) -> bool {
        matches!(self, RoomType::ItemStaircase | RoomType::TransportStaircase)
    }

    /// Stair rooms whose staircase is visible without pushing anything.
    pub fn has_open_staircase(self) -> bool {
        matches!(
            self,
            RoomType::DiamondStairRoom | RoomType::NarrowStairRoom | RoomType::SpiralStairRoom
        )
    }

    /// Room shapes with a middle-row block that can conceal a stairway.
    pub fn can_have_push_block(self) -> bool {
        matches!(
            self,
            RoomType::ThreeRows
                | RoomType::DoubleBlock
                | RoomType::GridRoom
                | RoomType::MazeRoom
                | RoomType::VerticalRows
                | RoomType::DoubleSixBlockRoom
                | RoomType::SingleSixBlockRoom
                | RoomType::FivePairRoom
                | RoomType::SingleBlockRoom
        )
    }

    /// Rooms where the item can sit across water, out of reach without the
    /// ladder.
    pub fn has_potential_ladder_block(self) -> bool {
        matches!(
            self,
            RoomType::LavaMoat
                | RoomType::VerticalMoatRoom
                | RoomType::CircleMoatRoom
                | RoomType::HorizontalMoatRoom
                | RoomType::DoubleMoatRoom
                | RoomType::ChevyRoom
        )
    }

    /// Valid item-position codes for this room shape.
    pub fn valid_item_positions(self) -> &'static [u8] {
        match self {
            RoomType::ItemStaircase | RoomType::TransportStaircase => &[0],
            RoomType::VerticalChuteRoom | RoomType::HorizontalChuteRoom => &[2],
            _ => &[0, 1, 2, 3],
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, TryFromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum Enemy {
    Nothing = 0x00,
    BlueLynel = 0x01,
    RedLynel = 0x02,
    BlueMoblin = 0x03,
    RedMoblin = 0x04,
    BlueGoriya = 0x05,
    RedGoriya = 0x06,
    RedOctorok = 0x07,
    RedFastOctorok = 0x08,
    BlueOctorok = 0x09,
    BlueFastOctorok = 0x0A,
    RedDarknut = 0x0B,
    BlueDarknut = 0x0C,
    BlueTektite = 0x0D,
    RedTektite = 0x0E,
    BlueLeever = 0x0F,
    RedLeever = 0x10,
    Zora = 0x11,
    Vire = 0x12,
    Zol = 0x13,
    Gel = 0x14,
    PolsVoice = 0x15,
    LikeLike = 0x16,
    Peahat = 0x1A,
    Keese = 0x1B,
    Armos = 0x1E,
    Gibdo = 0x21,
    BlueWizzrobe = 0x23,
    RedWizzrobe = 0x24,
    Wallmaster = 0x27,
    Rope = 0x28,
    Stalfos = 0x2A,
    Bubble = 0x2B,
    Patra1 = 0x30,
    Dodongo = 0x31,
    Patra2 = 0x32,
    Aquamentus = 0x33,
    Manhandla = 0x34,
    Gleeok1 = 0x35,
    Gleeok2 = 0x36,
    Gleeok3 = 0x37,
    Gleeok4 = 0x38,
    Digdogger1 = 0x39,
    Digdogger3 = 0x3A,
    BlueGohma = 0x3B,
    RedGohma = 0x3C,
    HungryGoriya = 0x3D,
    TheBeast = 0x3E,
    TheKidnapped = 0x3F,
    OldMan = 0x4B,
    OldWoman = 0x4C,
    Merchant = 0x4D,
    BombUpgrader = 0x4F,
}

impl Enemy {
    pub fn is_boss(self) -> bool {
        use Enemy::*;
        matches!(
            self,
            Dodongo
                | Aquamentus
                | Manhandla
                | Gleeok1
                | Gleeok2
                | Gleeok3
                | Gleeok4
                | Digdogger1
                | Digdogger3
                | BlueGohma
                | RedGohma
                | TheBeast
        )
    }

    pub fn is_npc(self) -> bool {
        matches!(
            self,
            Enemy::OldMan | Enemy::OldWoman | Enemy::Merchant | Enemy::BombUpgrader
        )
    }

    pub fn is_gleeok_or_patra(self) -> bool {
        use Enemy::*;
        matches!(self, Gleeok1 | Gleeok2 | Gleeok3 | Gleeok4 | Patra1 | Patra2)
    }

    pub fn is_digdogger(self) -> bool {
        matches!(self, Enemy::Digdogger1 | Enemy::Digdogger3)
    }

    pub fn is_gohma(self) -> bool {
        matches!(self, Enemy::BlueGohma | Enemy::RedGohma)
    }

    pub fn is_wizzrobe(self) -> bool {
        matches!(self, Enemy::BlueWizzrobe | Enemy::RedWizzrobe)
    }

    /// Enemies that die to a boomerang (and nothing tougher is required).
    pub fn is_zero_hp(self) -> bool {
        matches!(self, Enemy::Gel | Enemy::Keese)
    }

    /// Enemies the "avoid required hard combat" logic refuses to require
    /// without a ring and a sword upgrade.
    pub fn is_hard_combat(self) -> bool {
        use Enemy::*;
        matches!(self, BlueDarknut | BlueWizzrobe) || self.is_gleeok_or_patra()
    }
}

/// Cave destination codes as they appear (shifted) in overworld table 1.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive, Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum CaveType {
    WoodSwordCave = 0x10,
    TakeAny = 0x11,
    WhiteSwordCave = 0x12,
    MagicalSwordCave = 0x13,
    ShopA = 0x14,
    ShopB = 0x15,
    ShopC = 0x16,
    ShopD = 0x17,
    LetterCave = 0x18,
    AnyRoad = 0x19,
    PotionShop = 0x1A,
    DoorRepair = 0x1B,
    MoneyMakingGame = 0x1C,
    Mugger = 0x1D,
    LostHillsHint = 0x1E,
    DeadWoodsHint = 0x1F,
    SecretSmall = 0x20,
    SecretMedium = 0x21,
    SecretLarge = 0x22,
    GambleHint = 0x23,
    ArmosItem = 0x24,
    CoastItem = 0x25,
}

impl CaveType {
    /// Index into the cave item/price tables. The Armos and Coast pseudo-caves
    /// store their single item elsewhere and have no table entry.
    pub fn cave_index(self) -> Option<usize> {
        let idx = self as u8 - 0x10;
        ((idx as usize) < NUM_CAVES).then_some(idx as usize)
    }

    pub fn is_shop(self) -> bool {
        matches!(
            self,
            CaveType::ShopA | CaveType::ShopB | CaveType::ShopC | CaveType::ShopD
        )
    }
}

/// Where an overworld screen's stairway or cave entrance leads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    Level(LevelNum),
    Cave(CaveType),
}

impl Destination {
    pub fn from_code(code: u8) -> Option<Destination> {
        match code {
            1..=9 => Some(Destination::Level(code as LevelNum)),
            _ => CaveType::try_from(code).ok().map(Destination::Cave),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Destination::Level(level) => level as u8,
            Destination::Cave(cave) => cave as u8,
        }
    }
}

/// Terrain class of an overworld screen: what is needed to walk onto it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    Open,
    Bomb,
    Candle,
    Raft,
    RaftAndBomb,
    LadderAndBomb,
    Recorder,
    PowerBracelet,
    PowerBraceletAndBomb,
}

impl BlockType {
    /// Whether Link's spawn sprite can be placed on this terrain.
    pub fn is_spawnable(self) -> bool {
        self == BlockType::Open
    }
}

/// Static terrain classes for the 128 overworld screens. The table is data,
/// not derived from the image; the randomizer overlays flag-driven overrides
/// on top of it.
pub const OVERWORLD_BLOCK_TYPES: [BlockType; NUM_SCREENS] = {
    use BlockType::*;
    [
        // 0x00 - 0x0F: Death Mountain
        Bomb, Bomb, Bomb, Bomb, Open, Open, Bomb, Open, Bomb, Bomb, Open, Open, Bomb, Bomb, Open,
        Bomb,
        // 0x10 - 0x1F
        Bomb, PowerBracelet, Open, Bomb, Open, Open, Open, Open, Open, Bomb, Open, Open, Open,
        PowerBracelet, Bomb, LadderAndBomb,
        // 0x20 - 0x2F
        Open, Bomb, Open, PowerBracelet, Open, Open, Bomb, Open, Candle, Open, Open, Open, Bomb,
        Open, Open, Open,
        // 0x30 - 0x3F
        Open, Open, Open, Open, Open, Open, Open, Open, Open, Open, Open, Open, Open, Candle, Open,
        Open,
        // 0x40 - 0x4F
        Open, Open, Recorder, Open, Open, Raft, Open, Candle, Open, PowerBracelet, Open, Open,
        Open, Candle, Open, Open,
        // 0x50 - 0x5F
        Open, Candle, Open, Open, Open, Raft, Candle, Open, Open, Open, Open, Candle, Open, Open,
        Open, Open,
        // 0x60 - 0x6F
        Open, Open, Candle, Candle, Open, Open, Open, Open, Candle, Open, Open, Candle, Open,
        Candle, Open, Open,
        // 0x70 - 0x7F
        Open, Open, Open, Open, Open, Open, Open, Open, Open, PowerBracelet, Open, Open, Open,
        Open, Open, Open,
    ]
};

/// A mutable item slot.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Location {
    /// One of the three item tiles in a non-shop cave.
    Cave { cave: CaveType, slot: SlotNum },
    /// An item-bearing dungeon room.
    Room { level: LevelNum, room: RoomNum },
    /// The singleton item under the Armos statues.
    Armos,
    /// The singleton item on the coast tile.
    Coast,
    /// One of the three purchasable slots in a shop.
    Shop { shop: CaveType, slot: SlotNum },
}

impl Location {
    pub fn cave(cave: CaveType, slot: SlotNum) -> Location {
        if cave.is_shop() {
            Location::Shop { shop: cave, slot }
        } else {
            Location::Cave { cave, slot }
        }
    }

    pub fn is_dungeon(&self) -> bool {
        matches!(self, Location::Room { .. })
    }

    pub fn level(&self) -> Option<LevelNum> {
        match self {
            Location::Room { level, .. } => Some(*level),
            _ => None,
        }
    }
}

/// A single dungeon room: six bytes, one from each room table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Room {
    pub bytes: [u8; TABLES_PER_ROOM],
}

impl Room {
    /// Wall codes live in tables 0 and 1, three bits per direction.
    fn wall_bits(direction: Direction) -> (usize, u32) {
        match direction {
            Direction::North => (0, 5),
            Direction::West => (0, 2),
            Direction::South => (1, 5),
            Direction::East => (1, 2),
        }
    }

    pub fn wall_type(&self, direction: Direction) -> WallType {
        let (table, shift) = Room::wall_bits(direction);
        WallType::try_from((self.bytes[table] >> shift) & 0x07).unwrap()
    }

    pub fn set_wall_type(&mut self, direction: Direction, wall: WallType) {
        let (table, shift) = Room::wall_bits(direction);
        let cleared = self.bytes[table] & !(0x07 << shift);
        self.bytes[table] = cleared | ((wall as u8) << shift);
    }

    /// Stairway rooms reuse tables 0/1 as their two return-room numbers.
    pub fn left_exit(&self) -> RoomNum {
        (self.bytes[0] & 0x7F) as RoomNum
    }

    pub fn right_exit(&self) -> RoomNum {
        (self.bytes[1] & 0x7F) as RoomNum
    }

    pub fn set_exits(&mut self, left: RoomNum, right: RoomNum) {
        self.bytes[0] = left as u8 & 0x7F;
        self.bytes[1] = right as u8 & 0x7F;
    }

    pub fn room_type(&self) -> Option<RoomType> {
        RoomType::try_from(self.bytes[3] & 0x3F).ok()
    }

    pub fn set_room_type(&mut self, room_type: RoomType) {
        self.bytes[3] = (self.bytes[3] & 0xC0) | room_type as u8;
    }

    /// Enemy code, extended by the high bit stashed in table 3.
    pub fn enemy(&self) -> Option<Enemy> {
        let mut code = self.bytes[2] & 0x3F;
        if self.bytes[3] & 0x80 != 0 {
            code += 0x40;
        }
        Enemy::try_from(code).ok()
    }

    pub fn set_enemy(&mut self, enemy: Enemy) {
        let code = enemy as u8;
        self.bytes[2] = (self.bytes[2] & 0xC0) | (code & 0x3F);
        if code >= 0x40 {
            self.bytes[3] |= 0x80;
        } else {
            self.bytes[3] &= 0x7F;
        }
    }

    pub fn item_code(&self) -> u8 {
        self.bytes[4] & 0x1F
    }

    pub fn set_item_code(&mut self, code: u8) {
        self.bytes[4] = (self.bytes[4] & 0xE0) | (code & 0x1F);
    }

    pub fn has_movable_block(&self) -> bool {
        self.bytes[3] & 0x40 != 0
    }

    /// The item only appears after the room is cleared.
    pub fn has_drop_bit(&self) -> bool {
        self.bytes[5] & 0x04 != 0 && self.bytes[5] & 0x01 != 0
    }

    pub fn item_position(&self) -> u8 {
        (self.bytes[5] >> 4) & 0x03
    }

    pub fn set_item_position(&mut self, position: u8) {
        self.bytes[5] = (self.bytes[5] & 0xCF) | ((position & 0x03) << 4);
    }

    /// Whether this room can expose a stairway entrance. Stair-shaped rooms
    /// always do; push-block rooms do unless a shutter door repurposes the
    /// block trigger.
    pub fn reveals_stairway(&self) -> bool {
        let Some(room_type) = self.room_type() else {
            return false;
        };
        if room_type.has_open_staircase() {
            return true;
        }
        for direction in CARDINAL_DIRECTIONS {
            if self.wall_type(direction) == WallType::ShutterDoor {
                return false;
            }
        }
        room_type.can_have_push_block() && self.has_movable_block()
    }
}

/// One cave's three item slots and three price slots. The upper two bits of
/// each item byte carry appearance flags the randomizer must preserve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Cave {
    pub item_bytes: [u8; CAVE_SLOTS],
    pub price_bytes: [u8; CAVE_SLOTS],
}

impl Cave {
    pub fn item(&self, slot: SlotNum) -> Option<Item> {
        let code = self.item_bytes[slot] & 0x3F;
        if code == CAVE_NO_ITEM_CODE {
            return None;
        }
        Item::try_from(code).ok()
    }

    pub fn set_item(&mut self, slot: SlotNum, item: Option<Item>) {
        let code = item.map_or(CAVE_NO_ITEM_CODE, |i| i as u8);
        self.item_bytes[slot] = (self.item_bytes[slot] & 0xC0) | (code & 0x3F);
    }

    pub fn price(&self, slot: SlotNum) -> u8 {
        self.price_bytes[slot]
    }

    pub fn set_price(&mut self, slot: SlotNum, price: u8) {
        self.price_bytes[slot] = price;
    }
}

/// Entrance direction per level: which edge of the start room the player
/// enters from. Uniform in the supported base image.
pub const LEVEL_ENTRANCE_DIRECTIONS: [Direction; NUM_LEVELS] = [Direction::South; NUM_LEVELS];

fn block_index_for_level(level: LevelNum) -> usize {
    if level <= 6 { 0 } else { 1 }
}

/// Parsed world model over the base image.
///
/// Constructed once from the read-only base bytes, then cloned into a working
/// copy per generation. All mutations stay in the parsed structures until
/// [`GameData::drain_writes`] diffs them back into a byte-level [`Patch`].
#[derive(Clone, Debug)]
pub struct GameData {
    base: Vec<u8>,
    /// Two shared room blocks: levels 1-6 and levels 7-9.
    room_blocks: [Vec<Room>; 2],
    /// Overworld tables 0-5. Table 4's head is cave data, parsed separately.
    overworld_tables: [[u8; ROOM_TABLE_SIZE]; TABLES_PER_ROOM],
    /// Ten raw level-info blocks (block 0 = overworld).
    level_info: Vec<Vec<u8>>,
    caves: [Cave; NUM_CAVES],
    armos_item: u8,
    coast_item: u8,
    white_sword_hearts: u8,
    magical_sword_hearts: u8,
    any_road_screens: [u8; 4],
    recorder_warps: [u8; 8],
    no_item_code: u8,
    /// Free-form writes into writable regions not covered by the structures
    /// above (hint text and the like).
    extra: Patch,
}

impl GameData {
    pub fn from_base_image(base: &[u8]) -> Result<GameData, GameDataError> {
        if base.len() != BASE_IMAGE_LEN {
            return Err(GameDataError::InvalidBaseImage {
                reason: format!("expected {BASE_IMAGE_LEN} bytes, got {}", base.len()),
            });
        }
        if base[..4] != HEADER_MAGIC {
            return Err(GameDataError::InvalidBaseImage {
                reason: "iNES header magic mismatch".to_string(),
            });
        }

        let parse_rooms = |offset: usize| -> Vec<Room> {
            (0..NUM_ROOMS)
                .map(|room| {
                    let mut bytes = [0u8; TABLES_PER_ROOM];
                    for table in 0..TABLES_PER_ROOM {
                        bytes[table] = base[offset + table * ROOM_TABLE_SIZE + room];
                    }
                    Room { bytes }
                })
                .collect()
        };

        let mut overworld_tables = [[0u8; ROOM_TABLE_SIZE]; TABLES_PER_ROOM];
        for table in 0..TABLES_PER_ROOM {
            let start = rom_layout::OVERWORLD_DATA.file_offset + table * ROOM_TABLE_SIZE;
            overworld_tables[table].copy_from_slice(&base[start..start + ROOM_TABLE_SIZE]);
        }

        let level_info: Vec<Vec<u8>> = (0..10)
            .map(|block| {
                let start = rom_layout::LEVEL_INFO.file_offset + block * LEVEL_INFO_BLOCK_SIZE;
                base[start..start + LEVEL_INFO_BLOCK_SIZE].to_vec()
            })
            .collect();

        let mut caves = [Cave {
            item_bytes: [CAVE_NO_ITEM_CODE; CAVE_SLOTS],
            price_bytes: [0; CAVE_SLOTS],
        }; NUM_CAVES];
        for (i, cave) in caves.iter_mut().enumerate() {
            for slot in 0..CAVE_SLOTS {
                cave.item_bytes[slot] =
                    base[rom_layout::CAVE_ITEM_DATA.file_offset + i * CAVE_SLOTS + slot];
                cave.price_bytes[slot] =
                    base[rom_layout::CAVE_PRICE_DATA.file_offset + i * CAVE_SLOTS + slot];
            }
        }

        let decode_hearts = |b: u8| b / 16 + 1;

        let mut any_road_screens = [0u8; 4];
        any_road_screens.copy_from_slice(
            &base[rom_layout::ANY_ROAD_SCREENS.file_offset
                ..rom_layout::ANY_ROAD_SCREENS.end_offset()],
        );
        let mut recorder_warps = [0u8; 8];
        recorder_warps.copy_from_slice(
            &base[rom_layout::RECORDER_WARP_DESTINATIONS.file_offset
                ..rom_layout::RECORDER_WARP_DESTINATIONS.end_offset()],
        );

        Ok(GameData {
            room_blocks: [
                parse_rooms(rom_layout::LEVEL_1_TO_6_DATA.file_offset),
                parse_rooms(rom_layout::LEVEL_7_TO_9_DATA.file_offset),
            ],
            overworld_tables,
            level_info,
            caves,
            armos_item: base[rom_layout::ARMOS_ITEM.file_offset],
            coast_item: base[rom_layout::COAST_ITEM.file_offset],
            white_sword_hearts: decode_hearts(base[rom_layout::WHITE_SWORD_REQUIREMENT.file_offset]),
            magical_sword_hearts: decode_hearts(
                base[rom_layout::MAGICAL_SWORD_REQUIREMENT.file_offset],
            ),
            any_road_screens,
            recorder_warps,
            // Images that already went through a shuffle carry the
            // re-pointed no-item code; honor it when reparsing.
            no_item_code: if base[rom_layout::DUNGEON_NO_ITEM_CODE.file_offset]
                == NORMALIZED_NO_ITEM_CODE
            {
                NORMALIZED_NO_ITEM_CODE
            } else {
                VANILLA_NO_ITEM_CODE
            },
            extra: Patch::new(),
            base: base.to_vec(),
        })
    }

    /// The pristine base bytes this table was parsed from.
    pub fn base_image(&self) -> &[u8] {
        &self.base
    }

    /// Whether the base image is the vanilla image (legacy flags are only
    /// valid against it). Detected by the vanilla wood-sword cave placement.
    pub fn is_vanilla_base(&self) -> bool {
        self.screen_destination(VANILLA_START_SCREEN)
            == Some(Destination::Cave(CaveType::WoodSwordCave))
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    pub fn room(&self, level: LevelNum, room: RoomNum) -> Room {
        self.room_blocks[block_index_for_level(level)][room]
    }

    pub fn room_mut(&mut self, level: LevelNum, room: RoomNum) -> &mut Room {
        &mut self.room_blocks[block_index_for_level(level)][room]
    }

    pub fn room_item(&self, level: LevelNum, room: RoomNum) -> Option<Item> {
        let code = self.room(level, room).item_code();
        if code == self.no_item_code {
            return None;
        }
        Item::try_from(code).ok()
    }

    pub fn set_room_item(&mut self, level: LevelNum, room: RoomNum, item: Option<Item>) {
        let code = item.map_or(self.no_item_code, |i| i as u8);
        self.room_mut(level, room).set_item_code(code);
    }

    /// Re-point the "no item" code away from the magical sword's code so the
    /// sword can be placed in dungeons. Called once before any dungeon item
    /// shuffle; rewrites every empty room slot to the new code.
    pub fn normalize_no_item_code(&mut self) {
        if self.no_item_code == NORMALIZED_NO_ITEM_CODE {
            return;
        }
        for block in self.room_blocks.iter_mut() {
            for room in block.iter_mut() {
                if room.item_code() == VANILLA_NO_ITEM_CODE {
                    room.set_item_code(NORMALIZED_NO_ITEM_CODE);
                }
            }
        }
        self.no_item_code = NORMALIZED_NO_ITEM_CODE;
    }

    pub fn level_start_room(&self, level: LevelNum) -> RoomNum {
        self.level_info[level][LEVEL_INFO_START_ROOM_OFFSET] as RoomNum & 0x7F
    }

    pub fn level_entrance_direction(&self, level: LevelNum) -> Direction {
        LEVEL_ENTRANCE_DIRECTIONS[level - 1]
    }

    /// Stairway room numbers for a level, in ROM order.
    pub fn level_stairway_rooms(&self, level: LevelNum) -> Vec<RoomNum> {
        let info = &self.level_info[level];
        let mut rooms = Vec::new();
        for i in 0..LEVEL_INFO_STAIRWAY_LIST_LEN {
            let b = info[LEVEL_INFO_STAIRWAY_LIST_OFFSET + i];
            if b == 0xFF {
                break;
            }
            rooms.push((b & 0x7F) as RoomNum);
        }
        rooms
    }

    pub fn compass_pointer(&self, level: LevelNum) -> u8 {
        self.level_info[level][LEVEL_INFO_COMPASS_OFFSET]
    }

    pub fn set_compass_pointer(&mut self, level: LevelNum, value: u8) {
        self.level_info[level][LEVEL_INFO_COMPASS_OFFSET] = value;
    }

    // ------------------------------------------------------------------
    // Overworld screens
    // ------------------------------------------------------------------

    pub fn start_screen(&self) -> ScreenNum {
        self.level_info[0][LEVEL_INFO_START_ROOM_OFFSET] as ScreenNum & 0x7F
    }

    pub fn set_start_screen(&mut self, screen: ScreenNum) {
        self.level_info[0][LEVEL_INFO_START_ROOM_OFFSET] = screen as u8;
    }

    /// Map marker for the start position, alongside the start screen itself.
    pub fn start_compass_pointer(&self) -> u8 {
        self.level_info[0][LEVEL_INFO_COMPASS_OFFSET]
    }

    pub fn set_start_compass_pointer(&mut self, screen: ScreenNum) {
        self.level_info[0][LEVEL_INFO_COMPASS_OFFSET] = screen as u8;
    }

    /// Destination code sits in the upper six bits of table 1.
    pub fn screen_destination(&self, screen: ScreenNum) -> Option<Destination> {
        Destination::from_code(self.overworld_tables[1][screen] >> 2)
    }

    pub fn set_screen_destination(&mut self, screen: ScreenNum, destination: Option<Destination>) {
        let code = destination.map_or(0, Destination::code);
        let low = self.overworld_tables[1][screen] & 0x03;
        self.overworld_tables[1][screen] = (code << 2) | low;
    }

    /// Enemy type and quantity byte for a screen (table 2).
    pub fn screen_enemy_byte(&self, screen: ScreenNum) -> u8 {
        self.overworld_tables[2][screen]
    }

    pub fn set_screen_enemy_byte(&mut self, screen: ScreenNum, value: u8) {
        self.overworld_tables[2][screen] = value;
    }

    pub fn screen_has_enemies(&self, screen: ScreenNum) -> bool {
        self.screen_enemy_byte(screen) & 0x3F != 0
    }

    pub fn is_second_quest_screen(&self, screen: ScreenNum) -> bool {
        self.overworld_tables[5][screen] & 0x80 != 0
    }

    pub fn block_type(&self, screen: ScreenNum) -> BlockType {
        OVERWORLD_BLOCK_TYPES[screen]
    }

    pub fn any_road_screens(&self) -> [u8; 4] {
        self.any_road_screens
    }

    pub fn recorder_warps(&self) -> [u8; 8] {
        self.recorder_warps
    }

    pub fn set_recorder_warps(&mut self, warps: [u8; 8]) {
        self.recorder_warps = warps;
    }

    // ------------------------------------------------------------------
    // Caves, singleton slots, requirements
    // ------------------------------------------------------------------

    pub fn cave(&self, cave: CaveType) -> Option<&Cave> {
        cave.cave_index().map(|i| &self.caves[i])
    }

    pub fn cave_item(&self, cave: CaveType, slot: SlotNum) -> Option<Item> {
        match cave {
            CaveType::ArmosItem => Item::try_from(self.armos_item).ok(),
            CaveType::CoastItem => Item::try_from(self.coast_item).ok(),
            _ => self.cave(cave).and_then(|c| c.item(slot)),
        }
    }

    pub fn set_cave_item(&mut self, cave: CaveType, slot: SlotNum, item: Option<Item>) {
        match cave {
            CaveType::ArmosItem => self.armos_item = item.map_or(CAVE_NO_ITEM_CODE, |i| i as u8),
            CaveType::CoastItem => self.coast_item = item.map_or(CAVE_NO_ITEM_CODE, |i| i as u8),
            _ => {
                if let Some(i) = cave.cave_index() {
                    self.caves[i].set_item(slot, item);
                }
            }
        }
    }

    pub fn cave_price(&self, cave: CaveType, slot: SlotNum) -> Option<u8> {
        self.cave(cave).map(|c| c.price(slot))
    }

    pub fn set_cave_price(&mut self, cave: CaveType, slot: SlotNum, price: u8) {
        if let Some(i) = cave.cave_index() {
            self.caves[i].set_price(slot, price);
        }
    }

    pub fn white_sword_hearts(&self) -> u8 {
        self.white_sword_hearts
    }

    pub fn magical_sword_hearts(&self) -> u8 {
        self.magical_sword_hearts
    }

    pub fn set_white_sword_hearts(&mut self, hearts: u8) {
        self.white_sword_hearts = hearts;
    }

    pub fn set_magical_sword_hearts(&mut self, hearts: u8) {
        self.magical_sword_hearts = hearts;
    }

    // ------------------------------------------------------------------
    // Location routing
    // ------------------------------------------------------------------

    pub fn item(&self, location: Location) -> Option<Item> {
        match location {
            Location::Cave { cave, slot } | Location::Shop { shop: cave, slot } => {
                self.cave_item(cave, slot)
            }
            Location::Room { level, room } => self.room_item(level, room),
            Location::Armos => self.cave_item(CaveType::ArmosItem, 0),
            Location::Coast => self.cave_item(CaveType::CoastItem, 0),
        }
    }

    pub fn set_item(&mut self, location: Location, item: Option<Item>) {
        match location {
            Location::Cave { cave, slot } | Location::Shop { shop: cave, slot } => {
                self.set_cave_item(cave, slot, item)
            }
            Location::Room { level, room } => self.set_room_item(level, room, item),
            Location::Armos => self.set_cave_item(CaveType::ArmosItem, 0, item),
            Location::Coast => self.set_cave_item(CaveType::CoastItem, 0, item),
        }
    }

    // ------------------------------------------------------------------
    // Boundary-checked raw access
    // ------------------------------------------------------------------

    /// Read a raw base-image byte. Unknown offsets return `None`, never panic.
    pub fn read_byte(&self, offset: usize) -> Option<u8> {
        self.base.get(offset).copied()
    }

    /// Write raw bytes through the declared memory map. Writes that land
    /// outside a writable region are rejected.
    pub fn write_region(
        &mut self,
        region: &RomRegion,
        offset_in_region: usize,
        bytes: &[u8],
    ) -> Result<(), GameDataError> {
        let start = region.file_offset + offset_in_region;
        if !region.writable || offset_in_region + bytes.len() > region.size {
            return Err(GameDataError::OutOfRegion { offset: start });
        }
        self.extra.set_range(start, bytes);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serialize the working state back to bytes and diff it against the base
    /// image, producing the byte-exact patch for this generation.
    pub fn drain_writes(&self) -> Patch {
        let mut patch = Patch::new();
        let diff = |patch: &mut Patch, offset: usize, value: u8| {
            if self.base[offset] != value {
                patch.set(offset, value);
            }
        };

        // Room blocks.
        let block_offsets = [
            rom_layout::LEVEL_1_TO_6_DATA.file_offset,
            rom_layout::LEVEL_7_TO_9_DATA.file_offset,
        ];
        for (block, &offset) in self.room_blocks.iter().zip(&block_offsets) {
            for (room_num, room) in block.iter().enumerate() {
                for table in 0..TABLES_PER_ROOM {
                    diff(
                        &mut patch,
                        offset + table * ROOM_TABLE_SIZE + room_num,
                        room.bytes[table],
                    );
                }
            }
        }

        // Overworld tables 0-3 and 5; table 4 is reconstructed from cave data
        // with its unparsed tail carried through unchanged.
        for table in [0usize, 1, 2, 3, 5] {
            let offset = rom_layout::OVERWORLD_DATA.file_offset + table * ROOM_TABLE_SIZE;
            for screen in 0..ROOM_TABLE_SIZE {
                diff(&mut patch, offset + screen, self.overworld_tables[table][screen]);
            }
        }
        for (i, cave) in self.caves.iter().enumerate() {
            for slot in 0..CAVE_SLOTS {
                diff(
                    &mut patch,
                    rom_layout::CAVE_ITEM_DATA.file_offset + i * CAVE_SLOTS + slot,
                    cave.item_bytes[slot],
                );
                diff(
                    &mut patch,
                    rom_layout::CAVE_PRICE_DATA.file_offset + i * CAVE_SLOTS + slot,
                    cave.price_bytes[slot],
                );
            }
        }

        // Level info blocks.
        for (block_num, info) in self.level_info.iter().enumerate() {
            let offset = rom_layout::LEVEL_INFO.file_offset + block_num * LEVEL_INFO_BLOCK_SIZE;
            for (i, &b) in info.iter().enumerate() {
                diff(&mut patch, offset + i, b);
            }
        }

        diff(&mut patch, rom_layout::ARMOS_ITEM.file_offset, self.armos_item);
        diff(&mut patch, rom_layout::COAST_ITEM.file_offset, self.coast_item);

        let encode_hearts = |hearts: u8| (hearts - 1) * 16;
        diff(
            &mut patch,
            rom_layout::WHITE_SWORD_REQUIREMENT.file_offset,
            encode_hearts(self.white_sword_hearts),
        );
        diff(
            &mut patch,
            rom_layout::MAGICAL_SWORD_REQUIREMENT.file_offset,
            encode_hearts(self.magical_sword_hearts),
        );

        for (i, &b) in self.any_road_screens.iter().enumerate() {
            diff(&mut patch, rom_layout::ANY_ROAD_SCREENS.file_offset + i, b);
        }
        for (i, &b) in self.recorder_warps.iter().enumerate() {
            diff(&mut patch, rom_layout::RECORDER_WARP_DESTINATIONS.file_offset + i, b);
        }

        diff(
            &mut patch,
            rom_layout::DUNGEON_NO_ITEM_CODE.file_offset,
            self.no_item_code,
        );

        patch.merge(&self.extra);
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_rom::TestRomBuilder;

    #[test]
    fn rejects_wrong_length() {
        let err = GameData::from_base_image(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, GameDataError::InvalidBaseImage { .. }));
    }

    #[test]
    fn rejects_bad_header() {
        let mut image = vec![0u8; BASE_IMAGE_LEN];
        image[0] = 0x4E;
        let err = GameData::from_base_image(&image).unwrap_err();
        assert!(matches!(err, GameDataError::InvalidBaseImage { .. }));
    }

    #[test]
    fn untouched_table_drains_no_writes() {
        let image = TestRomBuilder::vanilla().build();
        let data = GameData::from_base_image(&image).unwrap();
        assert!(data.drain_writes().is_empty());
    }

    #[test]
    fn room_item_round_trip() {
        let image = TestRomBuilder::vanilla().build();
        let mut data = GameData::from_base_image(&image).unwrap();
        data.set_room_item(3, 0x4F, Some(Item::Ladder));
        assert_eq!(data.room_item(3, 0x4F), Some(Item::Ladder));

        let patch = data.drain_writes();
        let out = patch.apply_to(&image).unwrap();
        let reparsed = GameData::from_base_image(&out).unwrap();
        assert_eq!(reparsed.room_item(3, 0x4F), Some(Item::Ladder));
    }

    #[test]
    fn cave_item_write_preserves_appearance_bits() {
        let image = TestRomBuilder::vanilla().build();
        let mut data = GameData::from_base_image(&image).unwrap();
        let idx = CaveType::WoodSwordCave.cave_index().unwrap();
        data.caves[idx].item_bytes[1] |= 0x80;
        data.set_cave_item(CaveType::WoodSwordCave, 1, Some(Item::Bow));
        assert_eq!(data.caves[idx].item_bytes[1] & 0xC0, 0x80);
        assert_eq!(data.cave_item(CaveType::WoodSwordCave, 1), Some(Item::Bow));
    }

    #[test]
    fn normalization_repoints_empty_rooms() {
        let image = TestRomBuilder::vanilla().build();
        let mut data = GameData::from_base_image(&image).unwrap();
        assert_eq!(data.room_item(1, 0x00), None);
        data.normalize_no_item_code();
        assert_eq!(data.room(1, 0x00).item_code(), NORMALIZED_NO_ITEM_CODE);
        assert_eq!(data.room_item(1, 0x00), None);
        // A magical sword can now round-trip through a dungeon slot.
        data.set_room_item(1, 0x33, Some(Item::MagicalSword));
        assert_eq!(data.room_item(1, 0x33), Some(Item::MagicalSword));
    }

    #[test]
    fn write_region_rejects_read_only_and_overflow() {
        let image = TestRomBuilder::vanilla().build();
        let mut data = GameData::from_base_image(&image).unwrap();
        assert!(matches!(
            data.write_region(&rom_layout::TRIFORCE_REQUIREMENT, 0, &[8]),
            Err(GameDataError::OutOfRegion { .. })
        ));
        assert!(matches!(
            data.write_region(&rom_layout::ARMOS_ITEM, 0, &[1, 2]),
            Err(GameDataError::OutOfRegion { .. })
        ));
        assert!(data.write_region(&rom_layout::HINT_TEXT, 0, &[0x24]).is_ok());
    }

    #[test]
    fn wall_codes_round_trip() {
        let mut room = Room { bytes: [0; 6] };
        room.set_wall_type(Direction::North, WallType::ShutterDoor);
        room.set_wall_type(Direction::East, WallType::LockedDoor1);
        room.set_wall_type(Direction::South, WallType::BombHole);
        assert_eq!(room.wall_type(Direction::North), WallType::ShutterDoor);
        assert_eq!(room.wall_type(Direction::East), WallType::LockedDoor1);
        assert_eq!(room.wall_type(Direction::South), WallType::BombHole);
        assert_eq!(room.wall_type(Direction::West), WallType::OpenDoor);
    }

    #[test]
    fn direction_neighbors_respect_grid_edges() {
        assert_eq!(Direction::East.neighbor(0x0F), None);
        assert_eq!(Direction::West.neighbor(0x10), None);
        assert_eq!(Direction::North.neighbor(0x05), None);
        assert_eq!(Direction::South.neighbor(0x15), Some(0x25));
    }

    #[test]
    fn progressive_classes_are_ordered() {
        assert_eq!(
            Item::WhiteSword.progressive(),
            Some((ProgressiveClass::Sword, 1))
        );
        assert_eq!(Item::Bow.progressive(), None);
    }
}
