//! Nucleotide codec
//!
//! Packs two bases per byte (one per nibble) and classifies bases.
//!
//! Nibble layout: the low three bits select the base in the order
//! `N, A, C, G, T`; bit `0x8` marks a lower-case (soft-masked) base.
//! An even index lives in the high nibble of byte `index / 2`, an odd
//! index in the low nibble. A zeroed byte therefore reads as `NN`.

use crate::core::error::{DnaError, DnaResult};

/// Bit set in a nibble code for lower-case bases
pub const MASK_BIT: u8 = 0x8;

const fn build_pack_map() -> [u8; 256] {
    // Anything unrecognized packs as 'N'
    let mut map = [0u8; 256];
    map[b'N' as usize] = 0;
    map[b'A' as usize] = 1;
    map[b'C' as usize] = 2;
    map[b'G' as usize] = 3;
    map[b'T' as usize] = 4;
    map[b'n' as usize] = MASK_BIT;
    map[b'a' as usize] = MASK_BIT | 1;
    map[b'c' as usize] = MASK_BIT | 2;
    map[b'g' as usize] = MASK_BIT | 3;
    map[b't' as usize] = MASK_BIT | 4;
    map
}

/// Character to nibble code, both cases
pub static DNA_PACK_MAP: [u8; 256] = build_pack_map();

/// Nibble code to character
pub static DNA_UNPACK_MAP: [u8; 16] = *b"NACGTNNNnacgtnnn";

/// Pack `base` into the nibble of `packed` selected by the parity of `index`.
///
/// The other nibble is left untouched.
///
/// # Examples
/// ```
/// use fast_hal::core::dna::{pack, unpack};
///
/// let byte = pack(b'G', 0, 0);
/// let byte = pack(b't', 1, byte);
/// assert_eq!(unpack(0, byte), b'G');
/// assert_eq!(unpack(1, byte), b't');
/// ```
#[inline]
pub fn pack(base: u8, index: u64, packed: u8) -> u8 {
    let code = DNA_PACK_MAP[base as usize];
    if index & 1 == 1 {
        (packed & 0xF0) | code
    } else {
        (packed & 0x0F) | (code << 4)
    }
}

/// Unpack the base stored in the nibble of `packed` selected by `index`
#[inline]
pub fn unpack(index: u64, packed: u8) -> u8 {
    let code = if index & 1 == 1 { packed & 0x0F } else { packed >> 4 };
    DNA_UNPACK_MAP[code as usize]
}

/// Complement a single DNA base
///
/// Only `ACGT` (either case) are touched; every other byte is returned as-is.
#[inline]
pub fn reverse_complement(base: u8) -> u8 {
    match base {
        b'A' => b'T',
        b'T' => b'A',
        b'G' => b'C',
        b'C' => b'G',
        b'a' => b't',
        b't' => b'a',
        b'g' => b'c',
        b'c' => b'g',
        _ => base,
    }
}

/// Compute the reverse complement of a DNA sequence
///
/// # Examples
/// ```
/// use fast_hal::core::dna::revcomp;
///
/// assert_eq!(revcomp("AACGT"), "ACGTT");
/// assert_eq!(revcomp("acgN"), "Ncgt");
/// assert_eq!(revcomp(""), "");
/// ```
pub fn revcomp(seq: &str) -> String {
    seq.bytes()
        .rev()
        .map(reverse_complement)
        .map(|b| b as char)
        .collect()
}

/// Compute the reverse complement of a DNA sequence in-place (bytes)
pub fn revcomp_inplace(seq: &mut [u8]) {
    seq.reverse();
    for base in seq.iter_mut() {
        *base = reverse_complement(*base);
    }
}

/// Check if a byte is a storable base (`ACGTN`, either case)
#[inline]
pub fn is_nucleotide(base: u8) -> bool {
    matches!(
        base,
        b'A' | b'C' | b'G' | b'T' | b'N' | b'a' | b'c' | b'g' | b't' | b'n'
    )
}

/// Check if every byte of a string is a storable base
pub fn is_dna(seq: &str) -> bool {
    seq.bytes().all(is_nucleotide)
}

/// True for `N`/`n`
#[inline]
pub fn is_missing_data(base: u8) -> bool {
    base == b'N' || base == b'n'
}

/// Lower case marks a soft-masked base
#[inline]
pub fn is_masked(base: u8) -> bool {
    base.is_ascii_lowercase()
}

/// Purine-purine or pyrimidine-pyrimidine change (A<->G, C<->T)
#[inline]
pub fn is_transition(b1: u8, b2: u8) -> bool {
    matches!(
        (b1.to_ascii_uppercase(), b2.to_ascii_uppercase()),
        (b'A', b'G') | (b'G', b'A') | (b'C', b'T') | (b'T', b'C')
    )
}

/// Case-insensitive inequality
#[inline]
pub fn is_substitution(b1: u8, b2: u8) -> bool {
    b1.to_ascii_uppercase() != b2.to_ascii_uppercase()
}

/// Substitution between two called bases that is not a transition
#[inline]
pub fn is_transversion(b1: u8, b2: u8) -> bool {
    is_nucleotide(b1)
        && is_nucleotide(b2)
        && !is_missing_data(b1)
        && !is_missing_data(b2)
        && is_substitution(b1, b2)
        && !is_transition(b1, b2)
}

/// Is the third codon position 4-fold degenerate given the first two
pub fn is_fourfold_degenerate(b1: u8, b2: u8) -> bool {
    let x1 = b1.to_ascii_uppercase();
    match b2.to_ascii_uppercase() {
        b'T' | b'G' => x1 == b'C' || x1 == b'G',
        b'C' => matches!(x1, b'A' | b'C' | b'G' | b'T'),
        _ => false,
    }
}

/// Count the case-insensitive substitutions between two equal-length strings
pub fn hamming_distance(s1: &[u8], s2: &[u8]) -> DnaResult<u64> {
    if s1.len() != s2.len() {
        return Err(DnaError::InvalidArgument(format!(
            "hamming distance needs equal lengths, got {} and {}",
            s1.len(),
            s2.len()
        )));
    }
    Ok(s1
        .iter()
        .zip(s2)
        .filter(|(a, b)| is_substitution(**a, **b))
        .count() as u64)
}
