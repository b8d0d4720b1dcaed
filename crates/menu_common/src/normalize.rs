//! Deterministic dish-name cleanup.
//!
//! Total and pure: lower-cases, strips menu punctuation, collapses
//! whitespace. Every similarity comparison goes through this first so
//! "Spaghetti  Carbonara!" and "spaghetti carbonara" score 1.0.

/// Punctuation commonly found on menus that never distinguishes dishes.
const STRIPPED: &[char] = &[
    '.', ',', '!', '?', ';', ':', '"', '(', ')', '[', ']', '{', '}',
];

/// Normalize a dish name for comparison.
pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(normalize("Spaghetti  Carbonara!"), "spaghetti carbonara");
        assert_eq!(normalize("Coq au Vin (Classic)"), "coq au vin classic");
    }

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(normalize("  pad \t thai \n "), "pad thai");
    }

    #[test]
    fn empty_and_punctuation_only_yield_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!.,"), "");
    }

    #[test]
    fn keeps_non_ascii_letters() {
        assert_eq!(normalize("Crème Brûlée"), "crème brûlée");
        assert_eq!(normalize("麻婆豆腐"), "麻婆豆腐");
    }

    #[test]
    fn is_idempotent() {
        let once = normalize("Grilled  Salmon, with Lemon!");
        assert_eq!(normalize(&once), once);
    }
}
