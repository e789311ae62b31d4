//! Short collision-resistant identifiers for ephemeral entities.

use rand::Rng;

/// Number of characters in a generated identifier.
pub const UNIQUE_ID_LEN: usize = 9;

/// Base-36 alphabet the identifier characters are drawn from.
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a 9-character base-36 identifier from the thread RNG.
pub fn generate_unique_id() -> String {
    generate_unique_id_with(&mut rand::rng())
}

/// Generate an identifier from the given RNG.
pub fn generate_unique_id_with(rng: &mut impl Rng) -> String {
    (0..UNIQUE_ID_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            char::from(ALPHABET.get(idx).copied().unwrap_or(b'0'))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn ids_are_nine_base36_chars() {
        let id = generate_unique_id();
        assert_eq!(id.len(), UNIQUE_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let a = generate_unique_id_with(&mut SmallRng::seed_from_u64(7));
        let b = generate_unique_id_with(&mut SmallRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn ids_rarely_collide() {
        let ids: BTreeSet<String> = (0..1000).map(|_| generate_unique_id()).collect();
        assert_eq!(ids.len(), 1000);
    }
}
