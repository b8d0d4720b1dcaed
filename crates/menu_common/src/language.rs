//! Menu-language heuristic.
//!
//! Guesses which language the original menu text was written in. Ordered
//! rule list, first match wins: Unicode block tests for non-Latin scripts,
//! then diacritic classes and stop-word patterns for Latin-script
//! languages, defaulting to English.
//!
//! This is metadata only. It never gates matching or generation; only the
//! display language the user explicitly chose does that.

use once_cell::sync::Lazy;
use regex::Regex;

/// Unicode block tests, in precedence order.
const SCRIPT_RULES: &[(&str, fn(char) -> bool)] = &[
    ("zh", |c| matches!(c as u32, 0x4E00..=0x9FFF | 0x3400..=0x4DBF)),
    ("ja", |c| matches!(c as u32, 0x3040..=0x309F | 0x30A0..=0x30FF)),
    ("ko", |c| matches!(c as u32, 0xAC00..=0xD7AF | 0x1100..=0x11FF)),
    ("ar", |c| matches!(c as u32, 0x0600..=0x06FF | 0x0750..=0x077F)),
    ("he", |c| matches!(c as u32, 0x0590..=0x05FF)),
    ("ru", |c| matches!(c as u32, 0x0400..=0x04FF)),
    ("hi", |c| matches!(c as u32, 0x0900..=0x097F)),
    ("th", |c| matches!(c as u32, 0x0E00..=0x0E7F)),
    ("el", |c| matches!(c as u32, 0x0370..=0x03FF)),
];

struct LatinRule {
    code: &'static str,
    chars: Regex,
    stop_words: Regex,
}

impl LatinRule {
    fn new(code: &'static str, chars: &str, stop_words: &str) -> Self {
        Self {
            code,
            chars: Regex::new(chars).expect("diacritic class"),
            stop_words: Regex::new(stop_words).expect("stop-word pattern"),
        }
    }

    fn matches(&self, lower: &str) -> bool {
        self.chars.is_match(lower) || self.stop_words.is_match(lower)
    }
}

/// Diacritic classes plus small article/preposition patterns, tried in a
/// fixed order. Tuned for menu text, not prose.
static LATIN_RULES: Lazy<Vec<LatinRule>> = Lazy::new(|| {
    vec![
        LatinRule::new(
            "fr",
            r"[àâçèéêëîïôùûœ]",
            r"\b(le|la|les|des|du|au|aux|avec|et)\b",
        ),
        // Bare "de" is shared with French, Portuguese and Dutch menu names,
        // so it carries no signal and is deliberately absent here.
        LatinRule::new(
            "es",
            r"[áéíóúñ¿¡]",
            r"\b(el|los|las|con|del|y|para)\b",
        ),
        LatinRule::new(
            "pt",
            r"[ãõâêô]",
            r"\b(o|os|as|um|uma|em|não|com)\b",
        ),
        LatinRule::new(
            "it",
            r"[àèéìòù]",
            r"\b(il|lo|gli|della|dello|con|di|alla)\b",
        ),
        LatinRule::new(
            "de",
            r"[äöüß]",
            r"\b(der|die|das|und|mit|vom|für)\b",
        ),
        LatinRule::new(
            "nl",
            r"[ĳ]",
            r"\b(het|een|met|van|en|gebakken)\b",
        ),
        LatinRule::new(
            "sv",
            r"[åäö]",
            r"\b(och|med|en|ett|på|av)\b",
        ),
        LatinRule::new(
            "pl",
            r"[ąćęłńśźż]",
            r"\b(i|z|na|się|do|w)\b",
        ),
        LatinRule::new(
            "tr",
            r"[çğışöü]",
            r"\b(ve|ile|bir|için)\b",
        ),
        LatinRule::new(
            "vi",
            r"[ăđơưạảấầẩậắằẳặẹẻẽếềểệịỉọỏốồổộớờởợụủứừửựỳỵỷỹ]",
            r"\b(và|với|của|món)\b",
        ),
    ]
});

/// Guess the language of the original menu text. Defaults to `en`.
pub fn detect_menu_language(text: &str) -> &'static str {
    for (code, in_block) in SCRIPT_RULES {
        if text.chars().any(in_block) {
            return code;
        }
    }

    let lower = text.to_lowercase();
    for rule in LATIN_RULES.iter() {
        if rule.matches(&lower) {
            return rule.code;
        }
    }

    "en"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_non_latin_scripts() {
        assert_eq!(detect_menu_language("麻婆豆腐"), "zh");
        assert_eq!(detect_menu_language("とんかつ"), "ja");
        assert_eq!(detect_menu_language("비빔밥"), "ko");
        assert_eq!(detect_menu_language("كسكس"), "ar");
        assert_eq!(detect_menu_language("חומוס"), "he");
        assert_eq!(detect_menu_language("Борщ со сметаной"), "ru");
        assert_eq!(detect_menu_language("पनीर टिक्का"), "hi");
        assert_eq!(detect_menu_language("ต้มยำกุ้ง"), "th");
        assert_eq!(detect_menu_language("Μουσακάς"), "el");
    }

    #[test]
    fn han_takes_precedence_over_kana() {
        // Mixed Japanese with kanji classifies as zh under the fixed rule
        // order; pure kana text classifies as ja.
        assert_eq!(detect_menu_language("天ぷら"), "zh");
        assert_eq!(detect_menu_language("てんぷら"), "ja");
    }

    #[test]
    fn detects_latin_languages_by_stop_words() {
        assert_eq!(detect_menu_language("Coq au vin"), "fr");
        assert_eq!(detect_menu_language("Tacos con carnitas"), "es");
        assert_eq!(detect_menu_language("Frango com quiabo não picante"), "pt");
        assert_eq!(detect_menu_language("Spaghetti alla carbonara"), "it");
        assert_eq!(detect_menu_language("Bratwurst mit Sauerkraut"), "de");
    }

    #[test]
    fn detects_latin_languages_by_diacritics() {
        assert_eq!(detect_menu_language("crème brûlée"), "fr");
        assert_eq!(detect_menu_language("jalapeño"), "es");
        assert_eq!(detect_menu_language("Knödel"), "de");
        assert_eq!(detect_menu_language("pierogi z kapustą"), "pl");
        assert_eq!(detect_menu_language("gỏi cuốn"), "vi");
    }

    #[test]
    fn bare_de_does_not_classify_as_spanish() {
        // "de" alone is ambiguous across fr/es/pt/nl; with no other signal
        // the name falls through to the default.
        assert_eq!(detect_menu_language("Magret de canard"), "en");
        assert_eq!(detect_menu_language("Ensalada de pollo con aguacate"), "es");
    }

    #[test]
    fn defaults_to_english() {
        assert_eq!(detect_menu_language("Grilled salmon"), "en");
        assert_eq!(detect_menu_language(""), "en");
        assert_eq!(detect_menu_language("12345"), "en");
    }
}
