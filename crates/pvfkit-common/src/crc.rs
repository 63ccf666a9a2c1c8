//! Reflected CRC-32 checksum.
//!
//! Every archive entry carries a checksum of its padded plaintext block seeded
//! with the entry's name checksum, and the directory carries one seeded with
//! the entry count. The same value later keys the stream cipher, so the
//! function has to be bit-exact with the format.

use std::sync::LazyLock;

/// MSB-first generator polynomial. Its bit reversal is `0xEDB88320`.
const POLYNOMIAL: u32 = 0x04C1_1DB7;

/// Byte-indexed lookup table, built once on first use.
static TABLE: LazyLock<[u32; 256]> = LazyLock::new(build_table);

/// Build the reflected table by running the forward polynomial over the
/// bit-reversed index and reversing the result.
fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    for (index, slot) in table.iter_mut().enumerate() {
        let mut value = ((index as u8).reverse_bits() as u32) << 24;
        for _ in 0..8 {
            value = if value & 0x8000_0000 != 0 {
                (value << 1) ^ POLYNOMIAL
            } else {
                value << 1
            };
        }
        *slot = value.reverse_bits();
    }
    table
}

/// Fold `data` into a checksum seeded with `seed`.
///
/// The accumulator starts at `!seed` and the result is inverted, so chaining
/// calls continues a previous computation.
pub fn derive_checksum(data: &[u8], seed: u32) -> u32 {
    let table = &*TABLE;
    let acc = data.iter().fold(!seed, |acc, &byte| {
        table[((acc ^ byte as u32) & 0xFF) as usize] ^ (acc >> 8)
    });
    !acc
}

/// Checksum of a name, used as the seed of that entry's payload checksum.
#[inline]
pub fn name_checksum(name: &[u8]) -> u32 {
    derive_checksum(name, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_reflected_polynomial() {
        assert_eq!(TABLE[0], 0);
        assert_eq!(TABLE[1], 0x7707_3096);
        assert_eq!(TABLE[128], 0xEDB8_8320);
        assert_eq!(TABLE[255], 0x2D02_EF8D);
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(derive_checksum(b"123456789", 0), 0xCBF4_3926);
    }

    #[test]
    fn test_empty_returns_seed() {
        assert_eq!(derive_checksum(&[], 0x1234_5678), 0x1234_5678);
    }

    #[test]
    fn test_is_pure() {
        let data = b"character/swordman/attack1.ani";
        assert_eq!(derive_checksum(data, 77), derive_checksum(data, 77));
        assert_ne!(derive_checksum(data, 77), derive_checksum(data, 78));
    }

    #[test]
    fn test_chaining_continues_computation() {
        let whole = derive_checksum(b"hello world", 9);
        let split = derive_checksum(b" world", derive_checksum(b"hello", 9));
        assert_eq!(whole, split);
    }

    #[test]
    fn test_matches_independent_implementation() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1031).collect();
        for seed in [0u32, 1, 0x81A7_9011, u32::MAX] {
            let mut hasher = crc32fast::Hasher::new_with_initial(seed);
            hasher.update(&data);
            assert_eq!(derive_checksum(&data, seed), hasher.finalize());
        }
    }
}
