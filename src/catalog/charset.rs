//! Character sets and collations the driver reports

/// (charset, description, default collation, max bytes per character)
pub static CHARSETS: &[(&str, &str, &str, u32)] = &[
    ("ascii", "US ASCII", "ascii_general_ci", 1),
    ("binary", "Binary pseudo charset", "binary", 1),
    ("latin1", "cp1252 West European", "latin1_swedish_ci", 1),
    ("utf8mb3", "UTF-8 Unicode", "utf8mb3_general_ci", 3),
    ("utf8mb4", "UTF-8 Unicode", "utf8mb4_0900_ai_ci", 4),
];

/// (collation, charset, id, pad attribute)
pub static COLLATIONS: &[(&str, &str, u32, &str)] = &[
    ("ascii_bin", "ascii", 65, "PAD SPACE"),
    ("ascii_general_ci", "ascii", 11, "PAD SPACE"),
    ("binary", "binary", 63, "NO PAD"),
    ("latin1_bin", "latin1", 47, "PAD SPACE"),
    ("latin1_general_ci", "latin1", 48, "PAD SPACE"),
    ("latin1_swedish_ci", "latin1", 8, "PAD SPACE"),
    ("utf8mb3_bin", "utf8mb3", 83, "PAD SPACE"),
    ("utf8mb3_general_ci", "utf8mb3", 33, "PAD SPACE"),
    ("utf8mb3_unicode_ci", "utf8mb3", 192, "PAD SPACE"),
    ("utf8mb4_0900_ai_ci", "utf8mb4", 255, "NO PAD"),
    ("utf8mb4_0900_as_cs", "utf8mb4", 278, "NO PAD"),
    ("utf8mb4_0900_bin", "utf8mb4", 309, "NO PAD"),
    ("utf8mb4_bin", "utf8mb4", 46, "PAD SPACE"),
    ("utf8mb4_general_ci", "utf8mb4", 45, "PAD SPACE"),
    ("utf8mb4_unicode_ci", "utf8mb4", 224, "PAD SPACE"),
];

/// `utf8` is an alias of `utf8mb3`.
pub fn normalize_charset(charset: &str) -> String {
    let lower = charset.to_ascii_lowercase();
    match lower.as_str() {
        "utf8" => "utf8mb3".to_string(),
        _ => lower,
    }
}

pub fn normalize_collation(collation: &str) -> String {
    let lower = collation.to_ascii_lowercase();
    match lower.strip_prefix("utf8_") {
        Some(rest) => format!("utf8mb3_{}", rest),
        None => lower,
    }
}

/// Default collation of a character set.
pub fn default_collation(charset: &str) -> String {
    let charset = normalize_charset(charset);
    CHARSETS
        .iter()
        .find(|(name, ..)| *name == charset)
        .map(|(_, _, collation, _)| collation.to_string())
        .unwrap_or_else(|| format!("{}_general_ci", charset))
}

/// Character set a collation belongs to.
pub fn collation_charset(collation: &str) -> String {
    let collation = normalize_collation(collation);
    COLLATIONS
        .iter()
        .find(|(name, ..)| *name == collation)
        .map(|(_, charset, ..)| charset.to_string())
        .unwrap_or_else(|| collation.split('_').next().unwrap_or_default().to_string())
}

pub fn is_known_charset(charset: &str) -> bool {
    let charset = normalize_charset(charset);
    CHARSETS.iter().any(|(name, ..)| *name == charset)
}

pub fn is_known_collation(collation: &str) -> bool {
    let collation = normalize_collation(collation);
    COLLATIONS.iter().any(|(name, ..)| *name == collation)
}

/// Case-insensitive collations compare with the native NOCASE collation.
pub fn is_case_insensitive(collation: &str) -> bool {
    collation.to_ascii_lowercase().ends_with("_ci")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_collation("latin1"), "latin1_swedish_ci");
        assert_eq!(default_collation("UTF8"), "utf8mb3_general_ci");
        assert_eq!(default_collation("utf8mb4"), "utf8mb4_0900_ai_ci");
    }

    #[test]
    fn test_collation_charset() {
        assert_eq!(collation_charset("utf8mb4_unicode_ci"), "utf8mb4");
        assert_eq!(collation_charset("utf8_bin"), "utf8mb3");
        assert!(is_case_insensitive("utf8mb4_0900_ai_ci"));
        assert!(!is_case_insensitive("utf8mb4_bin"));
    }
}
