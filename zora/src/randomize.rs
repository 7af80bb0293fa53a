//! Item randomization and the top-level generation pipeline.
//!
//! The item randomizer translates the active flags into a permutation
//! problem over (location, item) pairs, hands it to the configured solver
//! backend, and is the only code allowed to write item slots back into the
//! data table. The pipeline wraps it with overworld randomization, the
//! reachability validator and patch emission, retrying whole shuffles with
//! derived seeds when the validator rejects one.

use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use log::{debug, info, warn};
use serde_derive::{Deserialize, Serialize};

use zora_game::{
    CaveType, Enemy, GameData, Item, LevelNum, Location, RoomNum, RoomType, WallType,
    CARDINAL_DIRECTIONS, NUM_ROOMS,
};

use crate::error::RandomizeError;
use crate::flags::{Flag, Flags};
use crate::overworld::{BaitBlocker, OverworldRandomizer};
use crate::patch::make_rom;
use crate::rng::SeededRng;
use crate::solver::{create_solver, Solver, SolverKind};
use crate::validate::Validator;

/// Solver retries (with derived seeds) before giving up on an assignment.
const MAX_SOLVER_ATTEMPTS: usize = 3;
/// Whole-shuffle retries when the validator keeps rejecting the result.
/// Rejected solutions are blacklisted, so every retry explores fresh ground.
const MAX_VALIDATION_RETRIES: usize = 100;
/// Per-solve time budget.
const SOLVE_TIME_LIMIT: Duration = Duration::from_secs(10);

/// Items kept out of level 9 unless explicitly allowed.
const IMPORTANT_ITEMS: [Item; 5] = [
    Item::Bow,
    Item::Ladder,
    Item::Raft,
    Item::Recorder,
    Item::PowerBracelet,
];

/// Rooms of a level in deterministic structural walk order (walls and
/// stairways only; no inventory gating), item stairways included.
pub fn visited_rooms(data: &GameData, level: LevelNum) -> Vec<RoomNum> {
    let mut order = Vec::new();
    let mut visited: HashSet<RoomNum> = HashSet::new();
    let mut pending = vec![data.level_start_room(level)];
    while let Some(room_num) = pending.pop() {
        if room_num >= NUM_ROOMS || !visited.insert(room_num) {
            continue;
        }
        order.push(room_num);
        let room = data.room(level, room_num);
        for direction in CARDINAL_DIRECTIONS {
            if room.wall_type(direction) != WallType::SolidWall {
                if let Some(neighbor) = direction.neighbor(room_num) {
                    if !visited.contains(&neighbor) {
                        pending.push(neighbor);
                    }
                }
            }
        }
        if !room.reveals_stairway() {
            continue;
        }
        for stairway_num in data.level_stairway_rooms(level) {
            let stairway = data.room(level, stairway_num);
            let (left, right) = (stairway.left_exit(), stairway.right_exit());
            if left == room_num && right == room_num {
                if visited.insert(stairway_num) {
                    order.push(stairway_num);
                }
            } else if left == room_num {
                pending.push(right);
                break;
            } else if right == room_num {
                pending.push(left);
                break;
            }
        }
    }
    order
}

pub struct ItemRandomizer<'a> {
    data: &'a mut GameData,
    flags: &'a Flags,
    rng: &'a mut SeededRng,
    solver_kind: SolverKind,
    forbidden_solutions: Vec<HashMap<Location, Item>>,
    pub last_solution: Option<HashMap<Location, Item>>,
}

impl<'a> ItemRandomizer<'a> {
    pub fn new(
        data: &'a mut GameData,
        flags: &'a Flags,
        rng: &'a mut SeededRng,
        solver_kind: SolverKind,
    ) -> ItemRandomizer<'a> {
        ItemRandomizer {
            data,
            flags,
            rng,
            solver_kind,
            forbidden_solutions: Vec::new(),
            last_solution: None,
        }
    }

    /// Solutions from earlier attempts that the validator rejected; the
    /// solver must not hand them back.
    pub fn set_forbidden_solutions(&mut self, forbidden: Vec<HashMap<Location, Item>>) {
        self.forbidden_solutions = forbidden;
    }

    pub fn randomize(&mut self) -> Result<(), RandomizeError> {
        if !self.flags.get(Flag::MajorItemShuffle) {
            debug!("major item shuffle disabled; nothing to do");
            return Ok(());
        }
        let pairs = self.collect_location_item_pairs();
        if pairs.is_empty() {
            warn!("no shuffleable items found");
            return Ok(());
        }
        info!("major shuffle pool holds {} locations", pairs.len());
        self.validate_constraints(&pairs)?;
        self.data.normalize_no_item_code();

        let locations: Vec<Location> = pairs.iter().map(|&(l, _)| l).collect();
        let items: Vec<Item> = pairs.iter().map(|&(_, i)| i).collect();

        for attempt in 0..MAX_SOLVER_ATTEMPTS {
            let mut solver = create_solver::<Location, Item>(self.solver_kind);
            solver.add_permutation_problem(locations.clone(), items.clone());
            for forbidden in &self.forbidden_solutions {
                solver.add_forbidden_solution_map(forbidden);
            }
            self.add_constraints(solver.as_mut(), &locations, &items);

            let solver_seed = self.rng.derive(0x501 + attempt as u64).seed();
            match solver.solve(solver_seed, SOLVE_TIME_LIMIT) {
                Some(solution) => {
                    debug!("solver accepted on attempt {}", attempt + 1);
                    self.write_solution(&solution);
                    self.last_solution = Some(solution);
                    self.replace_bait_with_fairy();
                    self.apply_skip_items(&locations);
                    self.shuffle_within_levels()?;
                    return Ok(());
                }
                None => debug!("solver attempt {} found no assignment", attempt + 1),
            }
        }
        Err(RandomizeError::NoFeasibleAssignment {
            seed: self.rng.seed(),
            attempts: MAX_SOLVER_ATTEMPTS,
        })
    }

    /// Pool membership. The master flag brings in every major item reachable
    /// in the dungeon walk plus the Armos, Coast and Wood Sword Cave slots;
    /// the dependent toggles extend the pool from there.
    fn collect_location_item_pairs(&self) -> Vec<(Location, Item)> {
        let flags = self.flags;
        let mut pairs: Vec<(Location, Item)> = Vec::new();

        for level in 1..=zora_game::NUM_LEVELS {
            for room in visited_rooms(self.data, level) {
                let Some(item) = self.data.room_item(level, room) else {
                    continue;
                };
                let include = item.is_major()
                    || (item == Item::HeartContainer && flags.get(Flag::ShuffleDungeonHearts))
                    || (matches!(item, Item::Bombs | Item::Key | Item::FiveRupees)
                        && flags.get(Flag::ShuffleMinorDungeonItems));
                if include {
                    pairs.push((Location::Room { level, room }, item));
                }
            }
        }

        let mut cave_slots: Vec<(Location, bool)> = vec![
            (Location::Armos, true),
            (Location::Coast, true),
            (Location::cave(CaveType::WoodSwordCave, 1), true),
            (
                Location::cave(CaveType::WhiteSwordCave, 1),
                flags.get(Flag::ShuffleWhiteSwordCaveItem),
            ),
            (
                Location::cave(CaveType::MagicalSwordCave, 1),
                flags.get(Flag::ShuffleMagicalSwordCaveItem),
            ),
            (
                Location::cave(CaveType::LetterCave, 1),
                flags.get(Flag::ShuffleLetterCaveItem),
            ),
            (
                Location::cave(CaveType::ShopA, 2),
                flags.get(Flag::ShuffleShopArrows),
            ),
            (
                Location::cave(CaveType::ShopB, 2),
                flags.get(Flag::ShuffleShopCandle),
            ),
            (
                Location::cave(CaveType::ShopD, 1),
                flags.get(Flag::ShuffleShopRing),
            ),
            (
                Location::cave(CaveType::ShopC, 2),
                flags.get(Flag::ShuffleShopBook),
            ),
            (
                Location::cave(CaveType::ShopC, 1),
                flags.get(Flag::ShuffleShopBait),
            ),
            (
                Location::cave(CaveType::PotionShop, 0),
                flags.get(Flag::ShufflePotionShopItems),
            ),
            (
                Location::cave(CaveType::PotionShop, 2),
                flags.get(Flag::ShufflePotionShopItems),
            ),
        ];
        for (location, enabled) in cave_slots.drain(..) {
            if !enabled {
                continue;
            }
            if let Some(item) = self.data.item(location) {
                pairs.push((location, item));
            }
        }
        pairs
    }

    /// Reject flag combinations no assignment can ever satisfy, with a
    /// message naming the flags instead of a bare solver failure.
    fn validate_constraints(&self, pairs: &[(Location, Item)]) -> Result<(), RandomizeError> {
        let flags = self.flags;
        let hearts = pairs
            .iter()
            .filter(|&&(_, i)| i == Item::HeartContainer)
            .count();
        let mut errors: Vec<String> = Vec::new();

        if flags.get(Flag::ForceSwordToOpenCave)
            && !pairs.iter().any(|&(_, i)| i.is_sword())
        {
            errors.push("'Force Sword to Open Cave' needs a sword in the pool".to_string());
        }
        if flags.get(Flag::ForceHeartContainerToArmos) && hearts == 0 {
            errors.push(
                "'Force Heart Container to Armos' needs a heart container in the pool; enable 'Shuffle Dungeon Hearts'".to_string(),
            );
        }
        if flags.get(Flag::ForceHeartContainerToCoast) && hearts == 0 {
            errors.push(
                "'Force Heart Container to Coast' needs a heart container in the pool; enable 'Shuffle Dungeon Hearts'".to_string(),
            );
        }
        if flags.get(Flag::ForceHeartContainerToLevelNine) && hearts == 0 {
            errors.push(
                "'Force a Heart Container to Level 9' needs a heart container in the pool".to_string(),
            );
        }
        if flags.get(Flag::ForceTwoHeartContainersToLevelNine) {
            if hearts < 2 {
                errors.push(format!(
                    "'Force Two Heart Containers to Level 9' needs two heart containers in the pool, found {hearts}"
                ));
            }
            if flags.get(Flag::ForceHeartContainerToLevelNine) {
                errors.push(
                    "'Force Two Heart Containers to Level 9' cannot be combined with 'Force a Heart Container to Level 9'".to_string(),
                );
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RandomizeError::ConstraintConflict {
                reason: errors.join("; "),
            })
        }
    }

    fn add_constraints(
        &self,
        solver: &mut dyn Solver<Location, Item>,
        locations: &[Location],
        items: &[Item],
    ) {
        let flags = self.flags;
        let shop_locations: Vec<Location> = locations
            .iter()
            .copied()
            .filter(|l| matches!(l, Location::Shop { .. }))
            .collect();
        let dungeon_locations: Vec<Location> = locations
            .iter()
            .copied()
            .filter(|l| l.is_dungeon())
            .collect();
        let level_9_rooms: Vec<Location> = locations
            .iter()
            .copied()
            .filter(|l| l.level() == Some(9))
            .collect();
        let non_level_9: Vec<Location> = locations
            .iter()
            .copied()
            .filter(|l| l.level() != Some(9))
            .collect();
        let present = |item: Item| items.contains(&item);

        // Heart containers never go in shops: buying a heart is a scam.
        if present(Item::HeartContainer) && !shop_locations.is_empty() {
            solver.forbid_all(&shop_locations, &[Item::HeartContainer]);
        }
        // The coast slot needs the ladder to reach, so the ladder itself may
        // not hide there.
        if present(Item::Ladder) {
            solver.forbid(Location::Coast, Item::Ladder);
        }
        // Same for the letter and the potion shop it unlocks.
        if present(Item::Letter) {
            for slot in [0, 2] {
                let location = Location::cave(CaveType::PotionShop, slot);
                if locations.contains(&location) {
                    solver.forbid(location, Item::Letter);
                }
            }
        }
        // Dungeon item fields are five bits; shop-only codes cannot fit.
        let shop_only: Vec<Item> = items
            .iter()
            .copied()
            .filter(|i| i.is_shop_only())
            .collect();
        if !dungeon_locations.is_empty() && !shop_only.is_empty() {
            solver.forbid_all(&dungeon_locations, &shop_only);
        }
        if flags.get(Flag::ProgressiveItems) && !shop_locations.is_empty() {
            let progressive: Vec<Item> = items
                .iter()
                .copied()
                .filter(|i| i.progressive().is_some())
                .collect();
            if !progressive.is_empty() {
                solver.forbid_all(&shop_locations, &progressive);
            }
        }

        if flags.get(Flag::ForceSwordToOpenCave) {
            let open_cave = Location::cave(CaveType::WoodSwordCave, 1);
            let mut distinct: Vec<Item> = items.to_vec();
            distinct.sort();
            distinct.dedup();
            for item in distinct.iter().filter(|i| !i.is_sword()) {
                solver.forbid(open_cave, *item);
            }
            // Best sword present, by tier.
            if let Some(best) = distinct.iter().copied().filter(|i| i.is_sword()).max() {
                solver.require(open_cave, best);
            }
        }

        if flags.get(Flag::ForceArrowToLevelNine) && present(Item::SilverArrows) {
            solver.forbid_all(&non_level_9, &[Item::SilverArrows]);
        }
        let level9_disjunctions: [(Flag, &[Item]); 3] = [
            (Flag::ForceRingToLevelNine, &[Item::BlueRing, Item::RedRing]),
            (Flag::ForceWandToLevelNine, &[Item::Wand]),
            (
                Flag::ForceHeartContainerToLevelNine,
                &[Item::HeartContainer],
            ),
        ];
        for (flag, candidates) in level9_disjunctions {
            if !flags.get(flag) || level_9_rooms.is_empty() {
                continue;
            }
            let matching: Vec<Item> = candidates
                .iter()
                .copied()
                .filter(|&i| present(i))
                .collect();
            if !matching.is_empty() {
                solver.at_least_one_of(&level_9_rooms, &matching);
            }
        }
        if flags.get(Flag::ForceTwoHeartContainersToLevelNine) {
            // Two requires consume two distinct heart occurrences, pinning
            // hearts onto two different level 9 rooms.
            for location in level_9_rooms.iter().take(2) {
                solver.require(*location, Item::HeartContainer);
            }
        }

        let armos_coast: [(Flag, Location); 2] = [
            (Flag::ForceHeartContainerToArmos, Location::Armos),
            (Flag::ForceHeartContainerToCoast, Location::Coast),
        ];
        for (flag, location) in armos_coast {
            if flags.get(flag) && present(Item::HeartContainer) && locations.contains(&location) {
                solver.at_least_one_of(&[location], &[Item::HeartContainer]);
            }
        }

        if !flags.get(Flag::AllowImportantItemsInLevelNine) && !level_9_rooms.is_empty() {
            let important: Vec<Item> = IMPORTANT_ITEMS
                .iter()
                .copied()
                .filter(|&i| present(i))
                .collect();
            if !important.is_empty() {
                solver.forbid_all(&level_9_rooms, &important);
            }
        }
    }

    /// Write the assignment back. Sorted location order keeps the shop
    /// price draws on a fixed RNG schedule.
    fn write_solution(&mut self, solution: &HashMap<Location, Item>) {
        let mut placements: Vec<(Location, Item)> =
            solution.iter().map(|(&l, &i)| (l, i)).collect();
        placements.sort();
        for (location, item) in placements {
            self.data.set_item(location, Some(item));
            debug!("placed {item:?} at {location:?}");
            if let Location::Shop { shop, slot } = location {
                let price = self.shop_price(item);
                self.data.set_cave_price(shop, slot, price);
            }
        }
    }

    /// Price tiers for shuffled shop stock.
    fn shop_price(&mut self, item: Item) -> u8 {
        use Item::*;
        match item {
            WoodSword | WhiteSword | MagicalSword | BlueRing | RedRing | MagicalKey => {
                self.rng.range(205, 256) as u8
            }
            Bow | Wand | Ladder => self.rng.range(80, 121) as u8,
            Recorder | WoodArrows | SilverArrows | HeartContainer => {
                self.rng.range(60, 101) as u8
            }
            _ => self.rng.range(40, 81) as u8,
        }
    }

    /// With the shop bait in the pool, the redundant bait slot becomes a
    /// cheap fairy instead of a second bait.
    fn replace_bait_with_fairy(&mut self) {
        if !self.flags.get(Flag::ShuffleShopBait) {
            return;
        }
        self.data.set_cave_item(CaveType::ShopD, 2, Some(Item::Fairy));
        let price = self.rng.range(20, 41) as u8;
        self.data.set_cave_price(CaveType::ShopD, 2, price);
        info!("replaced the spare bait with a {price}-rupee fairy");
    }

    /// Items the player asked to skip are swapped for rupees after
    /// placement; conservation is intentionally broken here and only here.
    fn apply_skip_items(&mut self, locations: &[Location]) {
        if self.flags.skip_items.is_empty() {
            return;
        }
        let mut sorted = locations.to_vec();
        sorted.sort();
        let mut replaced: HashSet<Location> = HashSet::new();
        for &skip in &self.flags.skip_items {
            let found = sorted.iter().copied().find(|&l| {
                !replaced.contains(&l) && self.data.item(l) == Some(skip)
            });
            if let Some(location) = found {
                self.data.set_item(location, Some(Item::Rupee));
                replaced.insert(location);
                debug!("skipped {skip:?} at {location:?}");
            }
        }
    }

    /// Re-shuffle each dungeon's contents among every room its walk visits,
    /// empty slots included, then re-roll the item positions. The Triforce
    /// of Power never moves; the staircase and boss/triforce-room flags
    /// constrain the rest.
    fn shuffle_within_levels(&mut self) -> Result<(), RandomizeError> {
        if !self.flags.get(Flag::ShuffleWithinLevel) {
            return Ok(());
        }
        for level in 1..=zora_game::NUM_LEVELS {
            let rooms: Vec<RoomNum> = visited_rooms(self.data, level)
                .into_iter()
                .filter(|&r| self.is_possible_item_room(level, r))
                .collect();
            if rooms.len() < 2 {
                continue;
            }
            let items: Vec<Option<Item>> = rooms
                .iter()
                .map(|&r| self.data.room_item(level, r))
                .collect();

            let mut solver = create_solver::<RoomNum, Option<Item>>(self.solver_kind);
            solver.add_permutation_problem(rooms.clone(), items.clone());
            self.add_within_level_constraints(solver.as_mut(), level, &rooms, &items)?;

            let solver_seed = self.rng.derive(0x901 + level as u64).seed();
            let Some(solution) = solver.solve(solver_seed, SOLVE_TIME_LIMIT) else {
                warn!("level {level}: no intra-level shuffle satisfies the constraints");
                continue;
            };
            let mut placements: Vec<(RoomNum, Option<Item>)> =
                solution.iter().map(|(&r, &i)| (r, i)).collect();
            placements.sort();
            for (room, item) in placements {
                self.data.set_room_item(level, room, item);
            }
            for &room in &rooms {
                let positions = self
                    .data
                    .room(level, room)
                    .room_type()
                    .map_or(&[0, 1, 2, 3][..], RoomType::valid_item_positions);
                let position = *self.rng.choice(positions);
                self.data.room_mut(level, room).set_item_position(position);
            }
        }
        Ok(())
    }

    fn add_within_level_constraints(
        &self,
        solver: &mut dyn Solver<RoomNum, Option<Item>>,
        level: LevelNum,
        rooms: &[RoomNum],
        items: &[Option<Item>],
    ) -> Result<(), RandomizeError> {
        let flags = self.flags;
        let present = |item: Option<Item>| items.contains(&item);

        // The Triforce of Power stays where the base image put it.
        if let Some(pos) = items.iter().position(|&i| i == Some(Item::TriforceOfPower)) {
            solver.require(rooms[pos], Some(Item::TriforceOfPower));
        }

        let stair_rooms: Vec<RoomNum> = rooms
            .iter()
            .copied()
            .filter(|&r| {
                self.data.room(level, r).room_type() == Some(RoomType::ItemStaircase)
            })
            .collect();
        if !stair_rooms.is_empty() {
            // An item staircase must keep an item; the stairway byte has no
            // way to express an empty floor.
            if present(None) {
                solver.forbid_all(&stair_rooms, &[None]);
            }
            if level != 9
                && !flags.get(Flag::ItemStairCanHaveTriforce)
                && present(Some(Item::Triforce))
            {
                solver.forbid_all(&stair_rooms, &[Some(Item::Triforce)]);
            }
            if level != 9
                && !flags.get(Flag::ItemStairCanHaveHeartContainer)
                && present(Some(Item::HeartContainer))
            {
                solver.forbid_all(&stair_rooms, &[Some(Item::HeartContainer)]);
            }
            if !flags.get(Flag::ItemStairCanHaveMinorItem) {
                let mut minors: Vec<Option<Item>> = items
                    .iter()
                    .copied()
                    .filter(|&i| matches!(i, Some(x) if x.is_minor()))
                    .collect();
                minors.sort();
                minors.dedup();
                if !minors.is_empty() {
                    solver.forbid_all(&stair_rooms, &minors);
                }
            }
        }

        let mut majors: Vec<Option<Item>> = items
            .iter()
            .copied()
            .filter(|&i| matches!(i, Some(x) if x.is_major() || x == Item::Triforce))
            .collect();
        majors.sort();
        majors.dedup();

        if flags.get(Flag::ForceMajorItemToBoss) {
            let boss_rooms: Vec<RoomNum> = rooms
                .iter()
                .copied()
                .filter(|&r| self.data.room(level, r).enemy().is_some_and(Enemy::is_boss))
                .collect();
            self.require_major_in(solver, level, &boss_rooms, &majors, "a boss room")?;
        }
        if flags.get(Flag::ForceMajorItemToTriforceRoom) {
            let triforce_rooms: Vec<RoomNum> = rooms
                .iter()
                .copied()
                .filter(|&r| {
                    self.data.room(level, r).room_type() == Some(RoomType::TriforceRoom)
                })
                .collect();
            self.require_major_in(solver, level, &triforce_rooms, &majors, "the triforce room")?;
        }
        Ok(())
    }

    fn require_major_in(
        &self,
        solver: &mut dyn Solver<RoomNum, Option<Item>>,
        level: LevelNum,
        target_rooms: &[RoomNum],
        majors: &[Option<Item>],
        what: &str,
    ) -> Result<(), RandomizeError> {
        if majors.is_empty() {
            return Err(RandomizeError::ConstraintConflict {
                reason: format!("level {level} has no major item to force into {what}"),
            });
        }
        if target_rooms.is_empty() {
            return Err(RandomizeError::ConstraintConflict {
                reason: format!("level {level} has no room matching {what}"),
            });
        }
        solver.at_least_one_of(target_rooms, majors);
        Ok(())
    }

    fn is_possible_item_room(&self, level: LevelNum, room: RoomNum) -> bool {
        let r = self.data.room(level, room);
        match r.room_type() {
            Some(RoomType::EntranceRoom) | Some(RoomType::TransportStaircase) => false,
            Some(RoomType::ItemStaircase) => true,
            _ => !r.enemy().is_some_and(Enemy::is_npc),
        }
    }
}

/// One complete generation: randomize, prove beatable, emit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Randomizer {
    pub solver_kind: SolverKind,
}

/// What a successful generation reports back to the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub seed: u64,
    pub flagstring: String,
    pub patch_hash: u64,
    pub shuffle_attempts: usize,
    pub validator_rounds: usize,
    pub display_code: [u8; 4],
}

impl Randomizer {
    pub fn new(solver_kind: SolverKind) -> Randomizer {
        Randomizer { solver_kind }
    }

    pub fn generate(
        &self,
        seed: u64,
        flags: &Flags,
        base: &[u8],
    ) -> Result<(Vec<u8>, GenerationSummary), RandomizeError> {
        let pristine = GameData::from_base_image(base)?;
        let mut flags = flags.clone();
        flags.apply_base_image_policy(pristine.is_vanilla_base());
        let flagstring = flags.encode_flagstring();
        info!("generating seed {seed} with flags {flagstring}");

        let mut forbidden: Vec<HashMap<Location, Item>> = Vec::new();
        let mut last_missing: Vec<Item> = Vec::new();
        for attempt in 0..MAX_VALIDATION_RETRIES {
            let mut working = pristine.clone();
            let mut rng = if attempt == 0 {
                SeededRng::new(seed)
            } else {
                SeededRng::new(seed).derive(attempt as u64)
            };

            let mut item_randomizer =
                ItemRandomizer::new(&mut working, &flags, &mut rng, self.solver_kind);
            item_randomizer.set_forbidden_solutions(forbidden.clone());
            item_randomizer.randomize()?;
            let solution = item_randomizer.last_solution.clone();

            OverworldRandomizer::new(&mut working, &flags, &mut rng).randomize();

            if flags.get(Flag::IncreasedBaitBlocks) {
                let mut blocker = BaitBlocker::new(&mut working);
                for level in 1..=zora_game::NUM_LEVELS {
                    blocker.try_block_level(level);
                }
            }

            let report = Validator::new(&working, &flags).validate();
            if !report.beatable {
                debug!(
                    "attempt {attempt}: validator rejected (missing {:?})",
                    report.missing_items
                );
                last_missing = report.missing_items;
                if let Some(solution) = solution {
                    forbidden.push(solution);
                }
                continue;
            }

            let (output, patch_hash, display_code) =
                make_rom(base, &working, &flags, &mut rng)?;
            return Ok((
                output,
                GenerationSummary {
                    seed,
                    flagstring: flagstring.clone(),
                    patch_hash,
                    shuffle_attempts: attempt + 1,
                    validator_rounds: report.rounds,
                    display_code,
                },
            ));
        }
        Err(RandomizeError::Unbeatable {
            seed,
            flagstring,
            attempts: MAX_VALIDATION_RETRIES,
            missing: last_missing,
        })
    }
}
