//! Question Engine — pure functions for generating and grading conversion questions.
//!
//! Nothing here touches a Room, a connection, or the Store. `generate` takes an `Rng` so tests
//! can seed it; `normalize`/`is_correct` are total functions that never fail — an unparsable
//! answer just grades as incorrect.

use crate::models::Conversion;
use rand::Rng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub value: String,
    pub answer: String,
}

/// `true` when `conv` is one of the nibble-width variants (4-bit questions instead of 8-bit).
fn is_nibble(conv: Conversion) -> bool {
    matches!(conv, Conversion::BinaryNibbleSprint | Conversion::HexNibbleSprint)
}

pub fn generate(conv: Conversion, rng: &mut impl Rng) -> Generated {
    match conv {
        Conversion::BinaryStandalone | Conversion::BinaryNibbleSprint => {
            let max = if is_nibble(conv) { 15 } else { 255 };
            let n: u32 = rng.gen_range(0..=max);
            let width = if is_nibble(conv) { 4 } else { 8 };
            Generated {
                value: n.to_string(),
                answer: format!("{:0width$b}", n, width = width),
            }
        }
        Conversion::HexStandalone | Conversion::HexNibbleSprint => {
            let max = if is_nibble(conv) { 15 } else { 255 };
            let n: u32 = rng.gen_range(0..=max);
            let width = if is_nibble(conv) { 1 } else { 2 };
            Generated {
                value: n.to_string(),
                answer: format!("{:0width$X}", n, width = width),
            }
        }
        Conversion::Ipv6Hextet => {
            let n: u32 = rng.gen_range(0..=65535);
            Generated {
                value: n.to_string(),
                answer: format!("{:04X}", n),
            }
        }
        Conversion::Ipv4Full => {
            let first: u32 = rng.gen_range(1..=223);
            let a: u32 = rng.gen_range(0..=255);
            let b: u32 = rng.gen_range(0..=255);
            let last: u32 = rng.gen_range(1..=254);
            let value = format!("{first}.{a}.{b}.{last}");
            let answer = [first, a, b, last]
                .iter()
                .map(|octet| format!("{:08b}", octet))
                .collect::<Vec<_>>()
                .join(".");
            Generated { value, answer }
        }
    }
}

/// Trims, lowercases, maps the numpad alias `"2"` to `"0"`, and strips a leading `0x` for
/// hex/hextet conversions. Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(input: &str, conv: Conversion) -> String {
    let mut s = input.trim().to_lowercase();
    if s == "2" {
        s = "0".to_string();
    }
    if matches!(
        conv,
        Conversion::HexStandalone | Conversion::HexNibbleSprint | Conversion::Ipv6Hextet
    ) {
        if let Some(stripped) = s.strip_prefix("0x") {
            s = stripped.to_string();
        }
        let width = match conv {
            Conversion::HexNibbleSprint => 1,
            Conversion::Ipv6Hextet => 4,
            _ => 2,
        };
        if s.chars().all(|c| c.is_ascii_hexdigit()) && !s.is_empty() {
            s = format!("{:0width$}", s, width = width);
        }
    }
    s
}

pub fn is_correct(input: &str, answer: &str, conv: Conversion) -> bool {
    let normalized_input = normalize(input, conv);
    match conv {
        Conversion::HexStandalone
        | Conversion::HexNibbleSprint
        | Conversion::Ipv6Hextet => normalized_input.eq_ignore_ascii_case(&answer.to_lowercase()),
        Conversion::BinaryStandalone | Conversion::BinaryNibbleSprint | Conversion::Ipv4Full => {
            normalized_input == answer.to_lowercase()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn all_convs() -> Vec<Conversion> {
        vec![
            Conversion::BinaryStandalone,
            Conversion::BinaryNibbleSprint,
            Conversion::HexStandalone,
            Conversion::HexNibbleSprint,
            Conversion::Ipv4Full,
            Conversion::Ipv6Hextet,
        ]
    }

    #[test]
    fn binary_standalone_is_8_bits() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let g = generate(Conversion::BinaryStandalone, &mut rng);
            assert_eq!(g.answer.len(), 8);
            assert!(g.answer.chars().all(|c| c == '0' || c == '1'));
        }
    }

    #[test]
    fn nibble_sprint_is_4_bits() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..50 {
            let g = generate(Conversion::BinaryNibbleSprint, &mut rng);
            assert_eq!(g.answer.len(), 4);
        }
    }

    #[test]
    fn ipv4_full_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let g = generate(Conversion::Ipv4Full, &mut rng);
            let octets: Vec<&str> = g.answer.split('.').collect();
            assert_eq!(octets.len(), 4);
            assert!(octets.iter().all(|o| o.len() == 8));
        }
    }

    #[test]
    fn numpad_two_aliases_zero() {
        assert_eq!(normalize("2", Conversion::BinaryStandalone), "0");
    }

    #[test]
    fn hex_0x_prefix_stripped_and_padded() {
        assert_eq!(normalize("0xFF", Conversion::HexStandalone), "ff");
        assert_eq!(normalize("0xf", Conversion::HexStandalone), "0f");
    }

    proptest! {
        #[test]
        fn prop_answer_correct_against_itself(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for conv in all_convs() {
                let g = generate(conv, &mut rng);
                prop_assert!(is_correct(&g.answer, &g.answer, conv));
            }
        }

        #[test]
        fn prop_normalize_idempotent(seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            for conv in all_convs() {
                let g = generate(conv, &mut rng);
                let once = normalize(&g.answer, conv);
                let twice = normalize(&once, conv);
                prop_assert_eq!(once, twice);
            }
        }
    }
}
