//! Name-based node classification.
//!
//! Everything here is a pure function of the node name, so callers may
//! recompute a class at any time instead of caching it.

use serde::Serialize;

pub const CLICKABLE_PREFIX: &str = "ar";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Water,
    Pavement,
    Road,
    Building,
    Decorative,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeClass {
    pub category: NodeCategory,
    pub clickable: bool,
    pub object_id: Option<String>,
}

pub fn classify(name: &str) -> NodeClass {
    let lower = name.to_ascii_lowercase();
    let clickable = lower.starts_with(CLICKABLE_PREFIX);
    let category = if lower.contains("water") {
        NodeCategory::Water
    } else if lower.contains("pavement") {
        NodeCategory::Pavement
    } else if lower.contains("road") {
        NodeCategory::Road
    } else if clickable {
        NodeCategory::Building
    } else {
        NodeCategory::Decorative
    };
    NodeClass {
        category,
        clickable,
        object_id: object_id(name),
    }
}

pub fn is_clickable(name: &str) -> bool {
    name.to_ascii_lowercase().starts_with(CLICKABLE_PREFIX)
}

/// Digits of the first case-insensitive `ar<digits>` occurrence, as written.
/// Equivalent to capture group 1 of the regex `(?i)ar(\d+)`.
pub fn id_digits(name: &str) -> Option<&str> {
    let bytes = name.as_bytes();
    let mut start = 0;
    while start + 2 < bytes.len() {
        let prefix = &bytes[start..start + 2];
        if prefix.eq_ignore_ascii_case(b"ar") && bytes[start + 2].is_ascii_digit() {
            let digits_start = start + 2;
            let digits_len = bytes[digits_start..]
                .iter()
                .take_while(|byte| byte.is_ascii_digit())
                .count();
            return Some(&name[digits_start..digits_start + digits_len]);
        }
        start += 1;
    }
    None
}

/// Canonical object id: the `ar<digits>` number without leading zeros, so
/// `ar07` and `AR7` both resolve to `"7"`.
pub fn object_id(name: &str) -> Option<String> {
    id_digits(name).map(canonical_numeric)
}

pub fn canonical_numeric(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Display code such as `AR07`, keeping the digits exactly as written.
pub fn building_code(name: &str) -> Option<String> {
    id_digits(name).map(|digits| format!("AR{digits}"))
}

/// `lecture_hall_2` becomes `Lecture Hall 2`.
pub fn format_room_name(name: &str) -> String {
    let mut formatted = String::with_capacity(name.len());
    let mut previous_is_word = false;
    for ch in name.chars() {
        let ch = if ch == '_' { ' ' } else { ch };
        let is_word = ch.is_alphanumeric();
        if is_word && !previous_is_word {
            formatted.extend(ch.to_uppercase());
        } else {
            formatted.push(ch);
        }
        previous_is_word = is_word;
    }
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_precedence_prefers_surface_keywords() {
        assert_eq!(classify("Water_Pond").category, NodeCategory::Water);
        assert_eq!(classify("ar12_road_link").category, NodeCategory::Road);
        assert_eq!(classify("pavement_road").category, NodeCategory::Pavement);
        assert_eq!(classify("AR07").category, NodeCategory::Building);
        assert_eq!(classify("tree_01").category, NodeCategory::Decorative);
    }

    #[test]
    fn clickable_only_depends_on_prefix() {
        assert!(classify("ar12_road_link").clickable);
        assert!(classify("Ar3").clickable);
        assert!(!classify("tower_ar5").clickable);
        assert!(!is_clickable("Part_1a2b3c4d"));
    }

    #[test]
    fn object_id_is_canonical_number() {
        assert_eq!(object_id("ar07").as_deref(), Some("7"));
        assert_eq!(object_id("AR120_block").as_deref(), Some("120"));
        assert_eq!(object_id("tower_ar5").as_deref(), Some("5"));
        assert_eq!(object_id("ar00").as_deref(), Some("0"));
        assert_eq!(object_id("arena"), None);
        assert_eq!(object_id("ar"), None);
    }

    #[test]
    fn object_id_skips_prefix_without_digits() {
        assert_eq!(object_id("area_ar9").as_deref(), Some("9"));
    }

    #[test]
    fn building_code_keeps_digits_as_written() {
        assert_eq!(building_code("ar07").as_deref(), Some("AR07"));
        assert_eq!(building_code("road"), None);
    }

    #[test]
    fn room_names_are_title_cased() {
        assert_eq!(format_room_name("lecture_hall_2"), "Lecture Hall 2");
        assert_eq!(format_room_name("LAB"), "LAB");
        assert_eq!(format_room_name("office"), "Office");
    }
}
