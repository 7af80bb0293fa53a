//! Overworld randomization: start-screen shuffle, heart requirements, and
//! the bait-blocker partition analysis.

use hashbrown::HashSet;
use log::{debug, info};

use zora_game::{
    CARDINAL_DIRECTIONS, Direction, Enemy, GameData, LevelNum, RoomNum, RoomType, ScreenNum,
    WallType, NUM_ROOMS, NUM_SCREENS,
};

use crate::flags::{Flag, Flags};
use crate::rng::SeededRng;

/// Screens excluded from the easy start-screen pool: the hostile mountain
/// rows and a handful of dead-end or gated pockets.
fn easy_start_screens() -> Vec<ScreenNum> {
    let mut excluded: HashSet<ScreenNum> = HashSet::new();
    excluded.extend(0x00..0x17);
    excluded.extend(0x19..0x1C);
    excluded.extend(0x20..0x27);
    excluded.extend(0x33..0x37);
    excluded.extend([0x1E, 0x1F, 0x2F, 0x30, 0x31, 0x40, 0x41, 0x44, 0x45]);
    (0..NUM_SCREENS).filter(|s| !excluded.contains(s)).collect()
}

pub struct OverworldRandomizer<'a> {
    data: &'a mut GameData,
    flags: &'a Flags,
    rng: &'a mut SeededRng,
}

impl<'a> OverworldRandomizer<'a> {
    pub fn new(
        data: &'a mut GameData,
        flags: &'a Flags,
        rng: &'a mut SeededRng,
    ) -> OverworldRandomizer<'a> {
        OverworldRandomizer { data, flags, rng }
    }

    pub fn randomize(&mut self) {
        self.randomize_heart_requirements();
        self.shuffle_start_screen();
    }

    fn randomize_heart_requirements(&mut self) {
        if self.flags.get(Flag::RandomizeHeartContainerRequirements) {
            let hearts = *self.rng.choice(&[4u8, 5, 6]);
            self.data.set_white_sword_hearts(hearts);
            debug!("white sword now requires {hearts} hearts");
        }
        if self.flags.get(Flag::ShuffleMagicalSwordCaveItem)
            || self.flags.get(Flag::RandomizeHeartContainerRequirements)
        {
            let hearts = *self.rng.choice(&[10u8, 11, 12]);
            self.data.set_magical_sword_hearts(hearts);
            debug!("magical sword now requires {hearts} hearts");
        }
    }

    /// Pick a new start screen whose enemy group is empty and whose terrain
    /// can hold the spawn sprite, then swap enemy bytes with the old start
    /// so neither screen inherits a hostile welcome, and keep the map marker
    /// in step.
    fn shuffle_start_screen(&mut self) {
        if !self.flags.get(Flag::ShuffleStartScreen) {
            return;
        }
        let old_start = self.data.start_screen();

        let pool: Vec<ScreenNum> = if self.flags.get(Flag::FullStartShuffle) {
            (0..NUM_SCREENS).collect()
        } else {
            easy_start_screens()
        };
        let candidates: Vec<ScreenNum> = pool
            .into_iter()
            .filter(|&s| {
                s != old_start
                    && !self.data.screen_has_enemies(s)
                    && self.data.block_type(s).is_spawnable()
            })
            .collect();
        if candidates.is_empty() {
            debug!("no eligible start screens; keeping {old_start:#04X}");
            return;
        }

        let new_start = *self.rng.choice(&candidates);
        let old_enemies = self.data.screen_enemy_byte(old_start);
        let new_enemies = self.data.screen_enemy_byte(new_start);
        self.data.set_screen_enemy_byte(old_start, new_enemies);
        self.data.set_screen_enemy_byte(new_start, old_enemies);
        self.data.set_start_screen(new_start);
        self.data.set_start_compass_pointer(new_start);
        info!("start screen moved {old_start:#04X} -> {new_start:#04X}");
    }
}

/// Installs a bait blocker: split a dungeon into two partitions joined only
/// by the hungry goriya's room, so the far side is reachable exactly when
/// logic can pay the bait toll.
pub struct BaitBlocker<'a> {
    data: &'a mut GameData,
}

impl<'a> BaitBlocker<'a> {
    pub fn new(data: &'a mut GameData) -> BaitBlocker<'a> {
        BaitBlocker { data }
    }

    /// Best-effort per level: returns whether a blocker was installed.
    pub fn try_block_level(&mut self, level: LevelNum) -> bool {
        let Some(goriya) = self.find_hungry_goriya_room(level) else {
            debug!("level {level}: no hungry goriya; skipping bait blocker");
            return false;
        };
        debug!("level {level}: hungry goriya in room {goriya:#04X}");

        let goriya_room = self.data.room(level, goriya);
        // The gated crossing is the goriya's north passage; without it there
        // is nothing to partition.
        let Some(north) = Direction::North.neighbor(goriya) else {
            return false;
        };
        if goriya_room.wall_type(Direction::North) == WallType::SolidWall {
            debug!("level {level}: goriya room has no north passage");
            return false;
        }

        // Seed the two partitions: the near side keeps the goriya room and
        // its other open neighbors, the far side starts beyond the crossing.
        let mut partition_a: HashSet<RoomNum> = HashSet::new();
        let mut partition_b: HashSet<RoomNum> = HashSet::new();
        partition_a.insert(goriya);
        partition_b.insert(north);
        for direction in [Direction::West, Direction::East, Direction::South] {
            if goriya_room.wall_type(direction) != WallType::SolidWall {
                if let Some(neighbor) = direction.neighbor(goriya) {
                    partition_a.insert(neighbor);
                }
            }
        }

        self.expand_partitions(level, &mut partition_a, &mut partition_b);
        debug!(
            "level {level}: partition sizes {} / {}",
            partition_a.len(),
            partition_b.len()
        );

        let walls = self.solidify_between(level, &partition_a, &partition_b, goriya);
        debug!("level {level}: solidified {walls} wall sides");

        // The gated crossing itself must have survived, or the far partition
        // just became unreachable and the seed would no longer be completable.
        debug_assert_ne!(
            self.data.room(level, goriya).wall_type(Direction::North),
            WallType::SolidWall
        );
        true
    }

    /// Walk the level from its entrance, looking for the hungry goriya.
    fn find_hungry_goriya_room(&self, level: LevelNum) -> Option<RoomNum> {
        let mut pending = vec![self.data.level_start_room(level)];
        let mut visited: HashSet<RoomNum> = HashSet::new();
        let mut found = None;
        while let Some(room_num) = pending.pop() {
            if room_num >= NUM_ROOMS || !visited.insert(room_num) {
                continue;
            }
            let room = self.data.room(level, room_num);
            if room.enemy() == Some(Enemy::HungryGoriya) {
                found = Some(room_num);
            }
            for direction in CARDINAL_DIRECTIONS {
                if room.wall_type(direction) != WallType::SolidWall {
                    if let Some(neighbor) = direction.neighbor(room_num) {
                        if !visited.contains(&neighbor) {
                            pending.push(neighbor);
                        }
                    }
                }
            }
        }
        found
    }

    /// Flood-fill both partitions to a fixed point. Queues are seeded from
    /// sorted vertex lists and the two sides alternate, so the division is
    /// the same on every run. A room claimed by one side is never re-claimed
    /// by the other.
    fn expand_partitions(
        &self,
        level: LevelNum,
        partition_a: &mut HashSet<RoomNum>,
        partition_b: &mut HashSet<RoomNum>,
    ) {
        let mut queue_a: Vec<RoomNum> = {
            let mut v: Vec<RoomNum> = partition_a.iter().copied().collect();
            v.sort_unstable();
            v
        };
        let mut queue_b: Vec<RoomNum> = {
            let mut v: Vec<RoomNum> = partition_b.iter().copied().collect();
            v.sort_unstable();
            v
        };
        let mut idx_a = 0;
        let mut idx_b = 0;

        while idx_a < queue_a.len() || idx_b < queue_b.len() {
            if idx_a < queue_a.len() {
                let room_num = queue_a[idx_a];
                idx_a += 1;
                let room = self.data.room(level, room_num);
                for direction in CARDINAL_DIRECTIONS {
                    if room.wall_type(direction) == WallType::SolidWall {
                        continue;
                    }
                    if let Some(neighbor) = direction.neighbor(room_num) {
                        if !partition_a.contains(&neighbor) && !partition_b.contains(&neighbor) {
                            partition_a.insert(neighbor);
                            queue_a.push(neighbor);
                        }
                    }
                }
            }
            if idx_b < queue_b.len() {
                let room_num = queue_b[idx_b];
                idx_b += 1;
                let room = self.data.room(level, room_num);
                for direction in CARDINAL_DIRECTIONS {
                    if room.wall_type(direction) == WallType::SolidWall {
                        continue;
                    }
                    if let Some(neighbor) = direction.neighbor(room_num) {
                        if !partition_a.contains(&neighbor) && !partition_b.contains(&neighbor) {
                            partition_b.insert(neighbor);
                            queue_b.push(neighbor);
                        }
                    }
                }
            }
        }
    }

    /// Wall off every edge between the partitions except the gated crossing,
    /// on both sides of each edge.
    fn solidify_between(
        &mut self,
        level: LevelNum,
        partition_a: &HashSet<RoomNum>,
        partition_b: &HashSet<RoomNum>,
        goriya: RoomNum,
    ) -> usize {
        let mut modified = 0;
        let mut rooms_a: Vec<RoomNum> = partition_a.iter().copied().collect();
        rooms_a.sort_unstable();

        for room_num in rooms_a {
            let room = self.data.room(level, room_num);
            if room.room_type().is_some_and(RoomType::is_staircase) {
                continue;
            }
            for direction in CARDINAL_DIRECTIONS {
                if room.wall_type(direction) == WallType::SolidWall {
                    continue;
                }
                if room_num == goriya && direction == Direction::North {
                    continue;
                }
                let Some(neighbor) = direction.neighbor(room_num) else {
                    continue;
                };
                if !partition_b.contains(&neighbor) {
                    continue;
                }
                self.data
                    .room_mut(level, room_num)
                    .set_wall_type(direction, WallType::SolidWall);
                modified += 1;
                let opposite = direction.inverse();
                let other = self.data.room(level, neighbor);
                if other.wall_type(opposite) != WallType::SolidWall {
                    self.data
                        .room_mut(level, neighbor)
                        .set_wall_type(opposite, WallType::SolidWall);
                    modified += 1;
                }
            }
        }
        modified
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Validator;
    use zora_game::test_rom::TestRomBuilder;

    #[test]
    fn start_shuffle_swaps_enemy_bytes() {
        let mut data = TestRomBuilder::vanilla().build_game_data();
        let flags = Flags::new()
            .with(Flag::ShuffleStartScreen, true)
            .with(Flag::FullStartShuffle, true);
        let old_start = data.start_screen();
        let old_enemies = data.screen_enemy_byte(old_start);

        let mut rng = SeededRng::new(77);
        OverworldRandomizer::new(&mut data, &flags, &mut rng).randomize();

        let new_start = data.start_screen();
        assert_ne!(new_start, old_start);
        assert!(!data.screen_has_enemies(new_start));
        assert!(data.block_type(new_start).is_spawnable());
        // The swap went both ways.
        assert_eq!(data.screen_enemy_byte(old_start), 0x00);
        assert_eq!(data.screen_enemy_byte(new_start), old_enemies);
        assert_eq!(data.start_compass_pointer(), new_start as u8);
    }

    #[test]
    fn start_shuffle_is_deterministic_per_seed() {
        let flags = Flags::new().with(Flag::ShuffleStartScreen, true);
        let run = |seed| {
            let mut data = TestRomBuilder::vanilla().build_game_data();
            let mut rng = SeededRng::new(seed);
            OverworldRandomizer::new(&mut data, &flags, &mut rng).randomize();
            data.start_screen()
        };
        assert_eq!(run(123), run(123));
    }

    #[test]
    fn start_shuffle_disabled_leaves_everything_alone() {
        let mut data = TestRomBuilder::vanilla().build_game_data();
        let flags = Flags::new();
        let mut rng = SeededRng::new(5);
        OverworldRandomizer::new(&mut data, &flags, &mut rng).randomize();
        assert_eq!(data.start_screen(), zora_game::VANILLA_START_SCREEN);
        assert!(data.drain_writes().is_empty());
    }

    #[test]
    fn bait_blocker_partitions_but_keeps_the_level_beatable() {
        // Goriya below level 3's triforce room: the blocker walls the
        // triforce off from everything except the bait-gated passage.
        let builder = TestRomBuilder::vanilla().with_room_enemy(3, 0x64, Enemy::HungryGoriya);
        let image = builder.build();
        let mut data = zora_game::GameData::from_base_image(&image).unwrap();

        let installed = BaitBlocker::new(&mut data).try_block_level(3);
        assert!(installed);

        // The gated crossing survives; bait (from a shop) still wins.
        assert_ne!(
            data.room(3, 0x64).wall_type(Direction::North),
            WallType::SolidWall
        );
        let flags = Flags::new();
        let report = Validator::new(&data, &flags).validate();
        assert!(report.beatable, "report: {report:?}");
    }

    #[test]
    fn bait_blocker_skips_levels_without_a_goriya() {
        let mut data = TestRomBuilder::vanilla().build_game_data();
        assert!(!BaitBlocker::new(&mut data).try_block_level(2));
        assert!(data.drain_writes().is_empty());
    }

    #[test]
    fn heart_requirements_stay_in_range() {
        let mut data = TestRomBuilder::vanilla().build_game_data();
        let flags = Flags::new().with(Flag::RandomizeHeartContainerRequirements, true);
        let mut rng = SeededRng::new(9);
        OverworldRandomizer::new(&mut data, &flags, &mut rng).randomize();
        assert!((4..=6).contains(&data.white_sword_hearts()));
        assert!((10..=12).contains(&data.magical_sword_hearts()));
    }
}
