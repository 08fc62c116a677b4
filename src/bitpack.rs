//! Unsigned bit-field access inside a 32-bit word.
//!
//! Bit 0 is the least significant bit of the word. A field is described by its `width` in bits
//! and by the `offset` of its least significant bit. Callers must keep `width + offset <= 32`.

/// Number of bits in a machine word.
pub const WORD_BITS: u32 = 32;

fn mask(width: u32) -> u64 {
    (1u64 << width) - 1
}

/// Returns `true` if `value` can be stored in a field of `width` bits.
pub fn fits_unsigned(value: u32, width: u32) -> bool {
    debug_assert!(width <= WORD_BITS);

    u64::from(value) <= mask(width)
}

/// Reads the `width`-bit field whose least significant bit sits at `offset`.
///
/// # Example
/// ```
/// use um::bitpack::extract_unsigned;
///
/// assert_eq!(extract_unsigned(0x7000_0000, 4, 28), 7);
/// assert_eq!(extract_unsigned(0b1_1010_0000, 4, 5), 0b1101);
/// ```
pub fn extract_unsigned(word: u32, width: u32, offset: u32) -> u32 {
    debug_assert!(width + offset <= WORD_BITS, "field {}@{} exceeds a word", width, offset);

    ((u64::from(word) >> offset) & mask(width)) as u32
}

/// Returns `word` with the `width`-bit field at `offset` replaced by `value`.
///
/// `value` is expected to fit in `width` bits already. Only its low `width` bits are written, the
/// rest of `word` is left untouched.
pub fn insert_unsigned(word: u32, width: u32, offset: u32, value: u32) -> u32 {
    debug_assert!(width + offset <= WORD_BITS, "field {}@{} exceeds a word", width, offset);
    debug_assert!(fits_unsigned(value, width), "{} does not fit in {} bits", value, width);

    let field = mask(width) << offset;
    let cleared = u64::from(word) & !field;

    (cleared | ((u64::from(value) << offset) & field)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_opcode_and_registers() {
        // lv r1, 72
        let word = 0xD200_0048;

        assert_eq!(extract_unsigned(word, 4, 28), 13);
        assert_eq!(extract_unsigned(word, 3, 25), 1);
        assert_eq!(extract_unsigned(word, 25, 0), 72);
    }

    #[test]
    fn test_full_width_field() {
        assert_eq!(extract_unsigned(0xDEAD_BEEF, 32, 0), 0xDEAD_BEEF);
        assert_eq!(insert_unsigned(0, 32, 0, 0xDEAD_BEEF), 0xDEAD_BEEF);
        assert!(fits_unsigned(u32::MAX, 32));
    }

    #[test]
    fn test_insert_leaves_other_bits() {
        let word = insert_unsigned(u32::MAX, 8, 8, 0);
        assert_eq!(word, 0xFFFF_00FF);

        let word = insert_unsigned(word, 8, 8, 0xAB);
        assert_eq!(word, 0xFFFF_ABFF);
    }

    #[test]
    fn test_insert_then_extract() {
        let base = 0xA5A5_5A5A;

        for width in 1..=WORD_BITS {
            let top = ((1u64 << width) - 1) as u32;

            for &value in &[0, 1, top / 2, top] {
                for &offset in &[0, (WORD_BITS - width) / 2, WORD_BITS - width] {
                    let packed = insert_unsigned(base, width, offset, value);
                    assert_eq!(extract_unsigned(packed, width, offset), value,
                        "width {} offset {} value {}", width, offset, value);
                }
            }
        }
    }

    #[test]
    fn test_fits_unsigned() {
        assert!(fits_unsigned(0x1FF_FFFF, 25));
        assert!(!fits_unsigned(0x200_0000, 25));
        assert!(fits_unsigned(0, 0));
        assert!(!fits_unsigned(1, 0));
    }
}
