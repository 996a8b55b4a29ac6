// Code generation helpers shared by rooms and tournaments.

use rand::Rng;

/// Avoids `0/O` and `1/I`, which are easy to misread aloud.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_code(len: usize, rng: &mut impl Rng) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn generate_room_code(rng: &mut impl Rng) -> String {
    random_code(6, rng)
}

pub fn generate_tournament_code(rng: &mut impl Rng) -> String {
    random_code(8, rng)
}

/// Room passwords are a lobby-entry gate, not an account credential (full user
/// password hashing for accounts) — a fast digest is enough here, and lets `verify_password`
/// stay constant-time without pulling in a KDF dependency nothing else in this crate needs.
pub fn hash_password(password: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    password.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// Compares `candidate`'s hash against `expected_hash` without short-circuiting on the first
/// differing byte.
pub fn verify_password(expected_hash: &str, candidate: &str) -> bool {
    let candidate_hash = hash_password(candidate);
    let a = candidate_hash.as_bytes();
    let b = expected_hash.as_bytes();
    let mut diff = a.len() ^ b.len();
    for i in 0..a.len().max(b.len()) {
        diff |= (*a.get(i).unwrap_or(&0) ^ *b.get(i).unwrap_or(&0)) as usize;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn room_codes_avoid_confusing_glyphs() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let code = generate_room_code(&mut rng);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| !"0O1I".contains(c)));
        }
    }

    #[test]
    fn tournament_codes_are_eight_chars() {
        let mut rng = StdRng::seed_from_u64(9);
        assert_eq!(generate_tournament_code(&mut rng).len(), 8);
    }
}
