//! Stable command-argv digest.
//!
//! FNV-1a is mandated over a platform-defined hash because the digest is
//! persisted across builds and across machines (shared caches, CI artifacts).
//! Width is fixed at 64 bits; widening it would require bumping the state
//! format version (see [`crate::state`]).

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Separator byte folded between parts so that `("ab", "c")` and `("a",
/// "bc")` never collide at the argument boundary.
const SEPARATOR: u8 = 0x00;

/// Hashes an ordered sequence of byte strings with FNV-1a, folding in
/// [`SEPARATOR`] between each part.
pub fn fnv1a64<I, S>(parts: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut hash = FNV_OFFSET_BASIS;
    let mut first = true;
    for part in parts {
        if !first {
            hash = fold_byte(hash, SEPARATOR);
        }
        first = false;
        for &byte in part.as_ref() {
            hash = fold_byte(hash, byte);
        }
    }
    hash
}

#[inline]
fn fold_byte(hash: u64, byte: u8) -> u64 {
    (hash ^ byte as u64).wrapping_mul(FNV_PRIME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_offset_basis() {
        assert_eq!(fnv1a64(Vec::<&str>::new()), FNV_OFFSET_BASIS);
    }

    #[test]
    fn separator_prevents_boundary_collision() {
        let a = fnv1a64(["ab", "c"]);
        let b = fnv1a64(["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn deterministic_across_calls() {
        let parts = ["aria-cc", "main.aria", "-o", "build/main.o"];
        assert_eq!(fnv1a64(parts), fnv1a64(parts));
    }

    #[test]
    fn order_sensitive() {
        let a = fnv1a64(["-O2", "-g"]);
        let b = fnv1a64(["-g", "-O2"]);
        assert_ne!(a, b);
    }
}
