//! End-to-end generation scenarios over the synthetic vanilla image:
//! byte-exact determinism, item conservation, constraint satisfaction, and
//! validator acceptance of everything the pipeline emits.

use hashbrown::HashMap;

use zora::flags::{Flag, Flags};
use zora::randomize::Randomizer;
use zora::solver::SolverKind;
use zora::validate::Validator;
use zora_game::test_rom::TestRomBuilder;
use zora_game::{CaveType, GameData, Item, Location};

fn vanilla_image() -> Vec<u8> {
    TestRomBuilder::vanilla().build()
}

/// The master-flag shuffle pool of the vanilla world: every major dungeon
/// item plus the Armos, Coast and Wood Sword Cave slots.
fn core_pool_locations(data: &GameData) -> Vec<Location> {
    let mut pool = Vec::new();
    for level in 1..=9 {
        for room in zora::randomize::visited_rooms(data, level) {
            if let Some(item) = data.room_item(level, room) {
                if item.is_major() {
                    pool.push(Location::Room { level, room });
                }
            }
        }
    }
    pool.push(Location::Armos);
    pool.push(Location::Coast);
    pool.push(Location::cave(CaveType::WoodSwordCave, 1));
    pool
}

fn item_multiset(data: &GameData, pool: &[Location]) -> Vec<Item> {
    let mut items: Vec<Item> = pool.iter().filter_map(|&l| data.item(l)).collect();
    items.sort();
    items
}

#[test]
fn no_flags_only_touches_metadata() {
    // Scenario: no flags set; the world data must ride through untouched.
    let base = vanilla_image();
    let flags = Flags::decode_flagstring("BBBBB").unwrap();
    let (output, summary) = Randomizer::default()
        .generate(12345, &flags, &base)
        .unwrap();
    assert_eq!(summary.flagstring, "BBBBB");

    let before = GameData::from_base_image(&base).unwrap();
    let after = GameData::from_base_image(&output).unwrap();
    assert_eq!(after.start_screen(), before.start_screen());
    for level in 1..=9usize {
        for room in 0..zora_game::NUM_ROOMS {
            assert_eq!(
                before.room(level, room).bytes,
                after.room(level, room).bytes,
                "level {level} room {room:#04X} changed"
            );
        }
    }
    for cave in [
        CaveType::WoodSwordCave,
        CaveType::WhiteSwordCave,
        CaveType::MagicalSwordCave,
        CaveType::LetterCave,
        CaveType::ShopA,
        CaveType::ShopB,
        CaveType::ShopC,
        CaveType::ShopD,
        CaveType::PotionShop,
    ] {
        for slot in 0..3 {
            assert_eq!(before.cave_item(cave, slot), after.cave_item(cave, slot));
        }
    }

    let report = Validator::new(&after, &flags).validate();
    assert!(report.beatable);
}

#[test]
fn generation_is_byte_identical_per_seed_and_flags() {
    let base = vanilla_image();
    for flagstring in ["BBBBB", "GBBBB"] {
        let flags = Flags::decode_flagstring(flagstring).unwrap();
        let (first, summary) = Randomizer::default().generate(12345, &flags, &base).unwrap();
        for _ in 0..9 {
            let (again, again_summary) =
                Randomizer::default().generate(12345, &flags, &base).unwrap();
            assert_eq!(first, again, "flags {flagstring} not reproducible");
            assert_eq!(summary.patch_hash, again_summary.patch_hash);
        }
    }
}

#[test]
fn major_shuffle_moves_the_open_slots_and_stays_beatable() {
    // Scenario: master shuffle only.
    let base = vanilla_image();
    let flags = Flags::decode_flagstring("GBBBB").unwrap();
    assert!(flags.get(Flag::MajorItemShuffle));

    let (output, _) = Randomizer::default().generate(12345, &flags, &base).unwrap();
    let before = GameData::from_base_image(&base).unwrap();
    let after = GameData::from_base_image(&output).unwrap();

    let trio = [
        Location::Armos,
        Location::Coast,
        Location::cave(CaveType::WoodSwordCave, 1),
    ];
    assert!(
        trio.iter().any(|&l| before.item(l) != after.item(l)),
        "armos/coast/wood-sword-cave all unchanged"
    );

    let report = Validator::new(&after, &flags).validate();
    assert!(report.beatable, "report: {report:?}");
}

#[test]
fn items_are_conserved_across_the_shuffle() {
    let base = vanilla_image();
    let flags = Flags::decode_flagstring("GBBBB").unwrap();
    let (output, _) = Randomizer::default().generate(4242, &flags, &base).unwrap();

    let before = GameData::from_base_image(&base).unwrap();
    let after = GameData::from_base_image(&output).unwrap();
    let pool = core_pool_locations(&before);
    assert_eq!(item_multiset(&before, &pool), item_multiset(&after, &pool));
}

#[test]
fn forced_sword_lands_in_the_open_cave() {
    // Scenario: master shuffle plus the open-cave sword guarantee.
    let base = vanilla_image();
    let flags = Flags::new()
        .with(Flag::MajorItemShuffle, true)
        .with(Flag::ForceSwordToOpenCave, true);
    assert_eq!(flags.encode_flagstring(), "GBBBD");

    let (output, _) = Randomizer::default().generate(99999, &flags, &base).unwrap();
    let after = GameData::from_base_image(&output).unwrap();
    let slot = after.cave_item(CaveType::WoodSwordCave, 1);
    assert!(
        slot.is_some_and(|i| i.is_sword()),
        "open cave holds {slot:?}"
    );
}

#[test]
fn important_items_stay_out_of_level_nine_by_default() {
    let base = vanilla_image();
    let flags = Flags::decode_flagstring("GBBBB").unwrap();
    let (output, _) = Randomizer::default().generate(777, &flags, &base).unwrap();
    let after = GameData::from_base_image(&output).unwrap();

    for room in zora::randomize::visited_rooms(&after, 9) {
        if let Some(item) = after.room_item(9, room) {
            assert!(
                ![
                    Item::Bow,
                    Item::Ladder,
                    Item::Raft,
                    Item::Recorder,
                    Item::PowerBracelet
                ]
                .contains(&item),
                "{item:?} placed in level 9 room {room:#04X}"
            );
        }
    }
}

#[test]
fn forced_arrow_ends_up_in_level_nine() {
    let base = vanilla_image();
    let mut flags = Flags::decode_flagstring("GBBBB").unwrap();
    flags.set(Flag::ForceArrowToLevelNine, true);
    let (output, _) = Randomizer::default().generate(31337, &flags, &base).unwrap();
    let after = GameData::from_base_image(&output).unwrap();

    let in_level_9 = zora::randomize::visited_rooms(&after, 9)
        .into_iter()
        .any(|room| after.room_item(9, room) == Some(Item::SilverArrows));
    assert!(in_level_9, "silver arrows escaped level 9");
}

#[test]
fn within_level_shuffle_stays_beatable_and_reproducible() {
    let base = vanilla_image();
    let flags = Flags::decode_flagstring("GBBCB").unwrap();
    assert!(flags.get(Flag::ShuffleWithinLevel));

    let (output, _) = Randomizer::default().generate(2468, &flags, &base).unwrap();
    let after = GameData::from_base_image(&output).unwrap();
    let report = Validator::new(&after, &flags).validate();
    assert!(report.beatable, "report: {report:?}");

    let (again, _) = Randomizer::default().generate(2468, &flags, &base).unwrap();
    assert_eq!(output, again);
}

#[test]
fn item_staircase_keeps_an_item_when_empty_rooms_join_the_shuffle() {
    // Open an empty room above level 1's triforce room so the within-level
    // pool carries an empty slot; the staircase may never receive it.
    let base = TestRomBuilder::vanilla()
        .with_wall(1, 0x50, zora_game::Direction::North, zora_game::WallType::OpenDoor)
        .with_wall(1, 0x40, zora_game::Direction::South, zora_game::WallType::OpenDoor)
        .build();
    let flags = Flags::decode_flagstring("GBBCB").unwrap();

    for seed in [11, 222, 3333] {
        let (output, _) = Randomizer::default().generate(seed, &flags, &base).unwrap();
        let after = GameData::from_base_image(&output).unwrap();
        assert!(
            after.room_item(1, 0x7F).is_some(),
            "seed {seed}: the level 1 item staircase came up empty"
        );
    }
}

#[test]
fn forced_major_item_lands_in_each_boss_room() {
    // Give levels 1-8 a boss in their heart room; level 9 already has one.
    let mut builder = TestRomBuilder::vanilla();
    let boss_rooms: [(usize, usize); 8] = [
        (1, 0x61),
        (2, 0x63),
        (3, 0x65),
        (4, 0x67),
        (5, 0x69),
        (6, 0x6B),
        (7, 0x61),
        (8, 0x63),
    ];
    for &(level, room) in &boss_rooms {
        builder = builder.with_room_enemy(level, room, zora_game::Enemy::Aquamentus);
    }
    let base = builder.build();

    let mut flags = Flags::decode_flagstring("GBBCB").unwrap();
    flags.set(Flag::ForceMajorItemToBoss, true);
    let (output, _) = Randomizer::default().generate(1357, &flags, &base).unwrap();
    let after = GameData::from_base_image(&output).unwrap();

    for &(level, room) in &boss_rooms {
        let item = after.room_item(level, room);
        assert!(
            item.is_some_and(|i| i.is_major() || i == Item::Triforce),
            "level {level} boss room holds {item:?}"
        );
    }
    let report = Validator::new(&after, &flags).validate();
    assert!(report.beatable, "report: {report:?}");
}

#[test]
fn force_major_to_boss_without_boss_rooms_is_a_conflict() {
    // The unmodified world has no boss in levels 1-8, so the constraint has
    // no room to bind to.
    let base = vanilla_image();
    let mut flags = Flags::decode_flagstring("GBBCB").unwrap();
    flags.set(Flag::ForceMajorItemToBoss, true);
    let err = Randomizer::default().generate(9, &flags, &base).unwrap_err();
    assert!(matches!(
        err,
        zora::error::RandomizeError::ConstraintConflict { .. }
    ));
}

#[test]
fn every_backend_produces_an_accepted_seed() {
    let base = vanilla_image();
    let flags = Flags::decode_flagstring("GBBBB").unwrap();
    let mut outputs: HashMap<&str, Vec<u8>> = HashMap::new();
    for (name, kind) in [
        ("assignment", SolverKind::Assignment),
        ("backtracking", SolverKind::Backtracking),
        ("rejection", SolverKind::Rejection),
    ] {
        let (output, _) = Randomizer::new(kind)
            .generate(2026, &flags, &base)
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        let after = GameData::from_base_image(&output).unwrap();
        let report = Validator::new(&after, &flags).validate();
        assert!(report.beatable, "{name}: {report:?}");
        outputs.insert(name, output);
    }
}

#[test]
fn different_seeds_differ() {
    let base = vanilla_image();
    let flags = Flags::decode_flagstring("GBBBB").unwrap();
    let (a, _) = Randomizer::default().generate(1, &flags, &base).unwrap();
    let (b, _) = Randomizer::default().generate(2, &flags, &base).unwrap();
    assert_ne!(a, b);
}

#[test]
fn invalid_base_image_is_rejected() {
    let flags = Flags::new();
    let err = Randomizer::default()
        .generate(1, &flags, &[0u8; 64])
        .unwrap_err();
    assert!(matches!(
        err,
        zora::error::RandomizeError::GameData(zora_game::GameDataError::InvalidBaseImage { .. })
    ));
}

#[test]
fn impossible_flag_combination_is_reported_as_conflict() {
    let base = vanilla_image();
    // Two hearts forced to level 9, but the pool only carries the coast heart.
    let mut flags = Flags::decode_flagstring("GBBBB").unwrap();
    flags.set(Flag::ForceTwoHeartContainersToLevelNine, true);
    let err = Randomizer::default().generate(5, &flags, &base).unwrap_err();
    assert!(matches!(
        err,
        zora::error::RandomizeError::ConstraintConflict { .. }
    ));
}
