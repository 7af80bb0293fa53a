//! Final image assembly: data-table writes, flag-driven code patches, hint
//! text, the title strings and the stamped hash code.

use log::debug;

use zora_game::patch::Patch;
use zora_game::rom_layout::HINT_TEXT;
use zora_game::GameData;

use crate::error::RandomizeError;
use crate::flags::{Flag, Flags};
use crate::rng::SeededRng;

/// Where the 4-byte scrambled hash code is displayed from.
const HASH_CODE_ADDR: usize = 0xAFD4;
/// Hook that jumps into the code-display routine.
const HASH_HOOK_ADDR: usize = 0xA4CD;
/// The code-display routine itself.
const HASH_ROUTINE_ADDR: usize = 0xAFA0;

/// Offset of the heart-restore code (`LDA $066F / AND #$F0 / ORA #$02 /
/// STA $066F`) in the supported base image.
const HEART_RESTORE_ADDR: usize = 0x14B7D;

/// Tile codes: digits are 0x00-0x09, letters 0x0A-0x23, 0x24 is blank.
fn text_tiles(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '0'..='9' => c as u8 - b'0',
            'A'..='Z' => c as u8 - b'A' + 0x0A,
            'a'..='z' => c as u8 - b'a' + 0x0A,
            _ => 0x24,
        })
        .collect()
}

const COMMUNITY_HINTS: [&str; 6] = [
    "BOMB WALLS HIDE MANY THINGS",
    "THE OLD LADY KNOWS THE WAY",
    "FEED THE HUNGRY ONE",
    "SILVER FELLS THE BEAST",
    "THE COAST REWARDS THE LADDER",
    "TWELVE HEARTS EARN THE BLADE",
];

/// Serialize the mutated data table over the base image, apply the
/// flag-driven code patches, stamp the metadata, and return the output
/// bytes together with the content hash and the display code.
pub fn make_rom(
    base: &[u8],
    data: &GameData,
    flags: &Flags,
    rng: &mut SeededRng,
) -> Result<(Vec<u8>, u64, [u8; 4]), RandomizeError> {
    let mut patch = data.drain_writes();
    apply_flag_patches(&mut patch, flags, rng);
    write_hints(&mut patch, flags, rng);

    // Content hash before the metadata stamp, so the stamp depends on the
    // content rather than the other way around.
    let content_hash = patch.hash();
    write_metadata(&mut patch, content_hash);

    let output = patch.apply_to(base)?;
    debug!(
        "emitted {} patched bytes, content hash {content_hash:016x}",
        patch.len()
    );
    Ok((output, content_hash, rng.code()))
}

fn apply_flag_patches(patch: &mut Patch, flags: &Flags, rng: &mut SeededRng) {
    if flags.get(Flag::ProgressiveItems) {
        // Item descriptor table: swords, candles, arrows and rings become
        // graded pickups.
        patch.set_range(0x6B49, &[0x11, 0x12, 0x13]);
        patch.set_range(0x6B4E, &[0x11, 0x12]);
        patch.set_range(0x6B50, &[0x11, 0x12]);
        patch.set_range(0x6B5A, &[0x11, 0x12]);
        // Ring/tunic palette fix.
        patch.set_range(0x6BFB, &[0x20, 0xE4, 0xFF]);
        patch.set_range(
            0x1FFF4,
            &[0x8E, 0x02, 0x06, 0x8E, 0x72, 0x06, 0xEE, 0x4F, 0x03, 0x60],
        );
    }

    if flags.get(Flag::MagicalBoomerangDoesOneHpDamage) {
        patch.set_range(
            0x7478,
            &[
                0xA9, 0x50, 0x99, 0xAC, 0x00, 0xBD, 0xB2, 0x04, 0x25, 0x09, 0xF0, 0x04, 0x20,
                0xC5, 0x7D, 0x60, 0xAD, 0x75, 0x06, 0x0A, 0x0A, 0x0A, 0x0A, 0x85, 0x07, 0xA9,
                0x10, 0x95, 0x3D,
            ],
        );
    }

    if flags.get(Flag::SpeedUpDungeonTransitions) {
        // NOP out the dungeon-vs-overworld scroll branch.
        for addr in [0x141F3, 0x1426B, 0x1446B, 0x14478, 0x144AD] {
            patch.set_range(addr, &[0xEA, 0xEA]);
        }
    }

    if flags.get(Flag::SelectSwap) {
        patch.set_range(0x1EC4C, &[0x4C, 0xC0, 0xFF]);
        patch.set_range(
            0x1FFD0,
            &[
                0xA9, 0x05, 0x20, 0xAC, 0xFF, 0xAD, 0x56, 0x06, 0xC9, 0x0F, 0xD0, 0x02, 0xA9,
                0x07, 0xA8, 0xA9, 0x01, 0x20, 0xC8, 0xB7, 0x4C, 0x58, 0xEC,
            ],
        );
    }

    if flags.get(Flag::AddL4Sword) {
        // BEQ (grade == 3) becomes BCS (grade >= 3).
        patch.set(0x7540, 0xB0);
    }

    // Heart restore after a death warp: AND #$F0 keeps whole hearts only and
    // ORA #$02 floors the refill. Keeping health widens the mask; raising
    // the minimum widens the floor. Both together keep health with the
    // higher floor applied on top.
    if flags.get(Flag::KeepHealthAfterDeathWarp) {
        patch.set_range(HEART_RESTORE_ADDR + 3, &[0x29, 0xFF]);
    }
    if flags.get(Flag::IncreaseMinimumHealth) {
        patch.set_range(HEART_RESTORE_ADDR + 5, &[0x09, 0x06]);
    }

    if flags.get(Flag::ExtraRaftBlocks) {
        patch.set(0x154F8, 0x0C);
        patch.set_range(0x155F7, &[0x0C, 0x0C]);
        patch.set(0x15613, 0xEB);
        patch.set(0x15615, 0xAF);
        patch.set(0x15715, 0xB6);
        patch.set_range(0x15765, &[0x91, 0x78]);
        patch.set_range(
            0x1582F,
            &[0x02, 0x08, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x0B, 0x01],
        );
        patch.set_range(0x1592F, &[0x17, 0x17]);
    }

    if flags.get(Flag::ExtraPowerBraceletBlocks) {
        patch.set_range(0x15554, &[0x06, 0xE7, 0x00, 0x00, 0x00]);
        patch.set_range(0x15649, &[0x00, 0xA9]);
        patch.set(0x1564E, 0xB6);
        patch.set(0x1574E, 0x02);
    }

    if flags.get(Flag::RandomizeLostHills) {
        // Three random steps, always ending with Up.
        let options = [0x08u8, 0x04, 0x01];
        let mut directions = [0u8; 4];
        for d in directions.iter_mut().take(3) {
            *d = *rng.choice(&options);
        }
        directions[3] = 0x08;
        patch.set_range(0x6DAB, &directions);
        // Annex the two screens east of the hills.
        patch.set_range(0x154D7, &[0x01; 7]);
        patch.set(0x154F1, 0x09);
        patch.set(0x154F5, 0x06);
        patch.set(0x155DD, 0x02);
        patch.set(0x155F5, 0x51);
    }

    if flags.get(Flag::RandomizeDeadWoods) {
        // Three random steps, always ending with South.
        let options = [0x08u8, 0x02, 0x04];
        let mut directions = [0u8; 4];
        for d in directions.iter_mut().take(3) {
            *d = *rng.choice(&options);
        }
        directions[3] = 0x04;
        patch.set_range(0x6DA7, &directions);
        patch.set(0x15B08, 0x29);
    }

    // fast_fill, low_hearts_sound, flute_kills_pols_voice,
    // four_potion_inventory, auto_show_letter and the text-speed patches are
    // applied from externally loaded patch files by the front end.
}

fn write_hints(patch: &mut Patch, flags: &Flags, rng: &mut SeededRng) {
    let mut buffer = vec![0x24u8; HINT_TEXT.size];
    if flags.get(Flag::CommunityHints) {
        let hint = text_tiles(*rng.choice(&COMMUNITY_HINTS[..]));
        let n = hint.len().min(buffer.len());
        buffer[..n].copy_from_slice(&hint[..n]);
    }
    patch.set_range(HINT_TEXT.file_offset, &buffer);
}

fn write_metadata(patch: &mut Patch, content_hash: u64) {
    // Four displayable bytes derived from the content hash. A few tile codes
    // render as items that read as gibberish on the file screen; remap them.
    let mut code = [0u8; 4];
    for (i, b) in content_hash.to_le_bytes()[..4].iter().enumerate() {
        code[i] = match b & 0x1F {
            0x0E => 0x21,
            0x02 => 0x22,
            0x07 => 0x23,
            v => v,
        };
    }
    patch.set_range(HASH_CODE_ADDR, &code);
    patch.set_range(HASH_HOOK_ADDR, &[0x4C, 0x90, 0xAF]);
    patch.set_range(
        HASH_ROUTINE_ADDR,
        &[
            0xA9, 0x00, 0x8D, 0x08, 0x01, 0xA2, 0x0A, 0xA9, 0xFF, 0x95, 0xAC, 0xCA, 0xD0, 0xFB,
            0xA2, 0x04, 0xA0, 0x60, 0xBD, 0xC3, 0xAF, 0x9D, 0x44, 0x04, 0x98, 0x69, 0x1B, 0xA8,
            0x95, 0x70, 0xA9, 0x20, 0x95, 0x84, 0xA9, 0x00, 0x95, 0xAC, 0xCA, 0xD0, 0xE9, 0x20,
            0x9D, 0x97, 0xA9, 0x14, 0x85, 0x14, 0xE6, 0x13, 0x60, 0xFF,
        ],
    );
    // Title tile: "ZORA" over the old dungeon label.
    patch.set_range(
        0x1A129,
        &[
            0x23, 0x18, 0x1B, 0x0A, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24,
            0x24,
        ],
    );
    // "PRESS START BUTTON" becomes "  ZORA  V0.1 BETA".
    patch.set_range(
        0x1AB40,
        &[
            0x24, 0x24, 0x23, 0x18, 0x1B, 0x0A, 0x24, 0x24, 0x1F, 0x00, 0x2C, 0x01, 0x24, 0x0B,
            0x0E, 0x1D, 0x0A,
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use zora_game::test_rom::TestRomBuilder;

    #[test]
    fn untouched_table_emits_metadata_only() {
        let image = TestRomBuilder::vanilla().build();
        let data = zora_game::GameData::from_base_image(&image).unwrap();
        let flags = Flags::new();
        let mut rng = SeededRng::new(1);
        let (output, _, _) = make_rom(&image, &data, &flags, &mut rng).unwrap();

        // Everything outside the metadata and hint regions matches the base.
        let metadata_regions = [
            (HASH_CODE_ADDR, 4),
            (HASH_HOOK_ADDR, 3),
            (HASH_ROUTINE_ADDR, 52),
            (0x1A129, 15),
            (0x1AB40, 17),
            (HINT_TEXT.file_offset, HINT_TEXT.size),
        ];
        for (i, (&b, &o)) in image.iter().zip(output.iter()).enumerate() {
            let in_metadata = metadata_regions
                .iter()
                .any(|&(start, len)| i >= start && i < start + len);
            if !in_metadata {
                assert_eq!(b, o, "unexpected write at offset {i:#06X}");
            }
        }
    }

    #[test]
    fn hash_depends_only_on_content() {
        let image = TestRomBuilder::vanilla().build();
        let data = zora_game::GameData::from_base_image(&image).unwrap();
        let flags = Flags::new();
        let mut rng_a = SeededRng::new(1);
        let mut rng_b = SeededRng::new(999);
        let (_, hash_a, _) = make_rom(&image, &data, &flags, &mut rng_a).unwrap();
        let (_, hash_b, _) = make_rom(&image, &data, &flags, &mut rng_b).unwrap();
        // The display code draw differs, the content hash must not.
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn progressive_flag_writes_descriptor_table() {
        let image = TestRomBuilder::vanilla().build();
        let data = zora_game::GameData::from_base_image(&image).unwrap();
        let mut flags = Flags::new();
        flags.set(Flag::ProgressiveItems, true);
        let mut rng = SeededRng::new(1);
        let (output, _, _) = make_rom(&image, &data, &flags, &mut rng).unwrap();
        assert_eq!(&output[0x6B49..0x6B4C], &[0x11, 0x12, 0x13]);
    }

    #[test]
    fn text_tiles_encode_letters_and_blanks() {
        assert_eq!(text_tiles("A Z9"), vec![0x0A, 0x24, 0x23, 0x09]);
    }
}
