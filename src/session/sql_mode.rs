//! `sql_mode` flag set
//!
//! Only the flags that change driver behavior are tracked as booleans; the
//! rest are remembered so `SELECT @@sql_mode` echoes what was set.

use crate::error::{DriverError, Result};

/// Flags the caster, lexer and compiler consult.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlMode {
    pub strict_trans_tables: bool,
    pub strict_all_tables: bool,
    pub no_backslash_escapes: bool,
    pub no_zero_date: bool,
    pub no_zero_in_date: bool,
    pub error_for_division_by_zero: bool,
    pub no_auto_value_on_zero: bool,
    pub pipes_as_concat: bool,
    pub ansi_quotes: bool,
    pub pad_char_to_full_length: bool,
    /// Remaining recognized flags, canonical order
    others: Vec<&'static str>,
}

const KNOWN: &[&str] = &[
    "REAL_AS_FLOAT",
    "PIPES_AS_CONCAT",
    "ANSI_QUOTES",
    "IGNORE_SPACE",
    "ONLY_FULL_GROUP_BY",
    "NO_UNSIGNED_SUBTRACTION",
    "NO_DIR_IN_CREATE",
    "ANSI",
    "NO_AUTO_VALUE_ON_ZERO",
    "NO_BACKSLASH_ESCAPES",
    "STRICT_TRANS_TABLES",
    "STRICT_ALL_TABLES",
    "NO_ZERO_IN_DATE",
    "NO_ZERO_DATE",
    "ALLOW_INVALID_DATES",
    "ERROR_FOR_DIVISION_BY_ZERO",
    "TRADITIONAL",
    "HIGH_NOT_PRECEDENCE",
    "NO_ENGINE_SUBSTITUTION",
    "PAD_CHAR_TO_FULL_LENGTH",
    "TIME_TRUNCATE_FRACTIONAL",
];

/// Composite modes and what they expand to.
fn expand(flag: &str) -> Option<&'static [&'static str]> {
    match flag {
        "ANSI" => Some(&[
            "REAL_AS_FLOAT",
            "PIPES_AS_CONCAT",
            "ANSI_QUOTES",
            "IGNORE_SPACE",
            "ONLY_FULL_GROUP_BY",
            "ANSI",
        ]),
        "TRADITIONAL" => Some(&[
            "STRICT_TRANS_TABLES",
            "STRICT_ALL_TABLES",
            "NO_ZERO_IN_DATE",
            "NO_ZERO_DATE",
            "ERROR_FOR_DIVISION_BY_ZERO",
            "TRADITIONAL",
            "NO_ENGINE_SUBSTITUTION",
        ]),
        _ => None,
    }
}

impl SqlMode {
    /// Parse a comma-separated mode list. Unknown flags are rejected the way
    /// `SET sql_mode` rejects them.
    pub fn parse(text: &str) -> Result<Self> {
        let mut flags: Vec<&'static str> = Vec::new();
        for raw in text.split(',') {
            let name = raw.trim().to_ascii_uppercase();
            if name.is_empty() {
                continue;
            }
            let canonical = KNOWN
                .iter()
                .find(|k| **k == name)
                .ok_or_else(|| DriverError::WrongVariableValue {
                    name: "sql_mode".into(),
                    value: raw.trim().to_string(),
                })?;
            match expand(canonical) {
                Some(expanded) => flags.extend_from_slice(expanded),
                None => flags.push(canonical),
            }
        }

        let mut mode = SqlMode::default();
        for flag in KNOWN {
            if !flags.contains(flag) {
                continue;
            }
            match *flag {
                "STRICT_TRANS_TABLES" => mode.strict_trans_tables = true,
                "STRICT_ALL_TABLES" => mode.strict_all_tables = true,
                "NO_BACKSLASH_ESCAPES" => mode.no_backslash_escapes = true,
                "NO_ZERO_DATE" => mode.no_zero_date = true,
                "NO_ZERO_IN_DATE" => mode.no_zero_in_date = true,
                "ERROR_FOR_DIVISION_BY_ZERO" => mode.error_for_division_by_zero = true,
                "NO_AUTO_VALUE_ON_ZERO" => mode.no_auto_value_on_zero = true,
                "PIPES_AS_CONCAT" => mode.pipes_as_concat = true,
                "ANSI_QUOTES" => mode.ansi_quotes = true,
                "PAD_CHAR_TO_FULL_LENGTH" => mode.pad_char_to_full_length = true,
                other => mode.others.push(other),
            }
        }
        Ok(mode)
    }

    /// Strict mode is either strict flag; every table is transactional here.
    pub fn is_strict(&self) -> bool {
        self.strict_trans_tables || self.strict_all_tables
    }

    /// Relaxed copy used by `INSERT IGNORE` / `UPDATE IGNORE`.
    pub fn relaxed(&self) -> Self {
        let mut mode = self.clone();
        mode.strict_trans_tables = false;
        mode.strict_all_tables = false;
        mode
    }

    /// Flag set packed into an integer, handed to engine UDFs.
    pub fn bits(&self) -> i64 {
        let mut bits = 0;
        let flags = [
            self.strict_trans_tables,
            self.strict_all_tables,
            self.no_backslash_escapes,
            self.no_zero_date,
            self.no_zero_in_date,
            self.error_for_division_by_zero,
            self.no_auto_value_on_zero,
        ];
        for (i, set) in flags.iter().enumerate() {
            if *set {
                bits |= 1 << i;
            }
        }
        bits
    }

    pub fn from_bits(bits: i64) -> Self {
        let has = |i: u32| bits & (1 << i) != 0;
        SqlMode {
            strict_trans_tables: has(0),
            strict_all_tables: has(1),
            no_backslash_escapes: has(2),
            no_zero_date: has(3),
            no_zero_in_date: has(4),
            error_for_division_by_zero: has(5),
            no_auto_value_on_zero: has(6),
            ..SqlMode::default()
        }
    }

    fn has(&self, flag: &str) -> bool {
        match flag {
            "STRICT_TRANS_TABLES" => self.strict_trans_tables,
            "STRICT_ALL_TABLES" => self.strict_all_tables,
            "NO_BACKSLASH_ESCAPES" => self.no_backslash_escapes,
            "NO_ZERO_DATE" => self.no_zero_date,
            "NO_ZERO_IN_DATE" => self.no_zero_in_date,
            "ERROR_FOR_DIVISION_BY_ZERO" => self.error_for_division_by_zero,
            "NO_AUTO_VALUE_ON_ZERO" => self.no_auto_value_on_zero,
            "PIPES_AS_CONCAT" => self.pipes_as_concat,
            "ANSI_QUOTES" => self.ansi_quotes,
            "PAD_CHAR_TO_FULL_LENGTH" => self.pad_char_to_full_length,
            other => self.others.contains(&other),
        }
    }
}

impl std::fmt::Display for SqlMode {
    /// Canonical comma list, in the server's flag order.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set: Vec<&str> = KNOWN.iter().copied().filter(|k| self.has(k)).collect();
        write!(f, "{}", set.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SQL_MODE;

    #[test]
    fn test_default_mode_is_strict() {
        let mode = SqlMode::parse(DEFAULT_SQL_MODE).unwrap();
        assert!(mode.is_strict());
        assert!(mode.no_zero_date);
        assert!(!mode.no_backslash_escapes);
        assert_eq!(mode.to_string(), DEFAULT_SQL_MODE);
    }

    #[test]
    fn test_empty_mode_is_relaxed() {
        let mode = SqlMode::parse("").unwrap();
        assert!(!mode.is_strict());
        assert_eq!(mode.to_string(), "");
    }

    #[test]
    fn test_composite_expansion() {
        let mode = SqlMode::parse("traditional").unwrap();
        assert!(mode.strict_all_tables && mode.strict_trans_tables);
        assert!(mode.error_for_division_by_zero);
        assert_eq!(
            mode.to_string(),
            "STRICT_TRANS_TABLES,STRICT_ALL_TABLES,NO_ZERO_IN_DATE,NO_ZERO_DATE,ERROR_FOR_DIVISION_BY_ZERO,TRADITIONAL,NO_ENGINE_SUBSTITUTION"
        );

        let mode = SqlMode::parse("ANSI").unwrap();
        assert!(mode.pipes_as_concat && mode.ansi_quotes);
        assert!(!mode.is_strict());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let err = SqlMode::parse("STRICT_TRANS_TABLES,BOGUS").unwrap_err();
        assert_eq!(err.code(), 1231);
    }

    #[test]
    fn test_bits_roundtrip_behavior_flags() {
        let mode = SqlMode::parse("NO_BACKSLASH_ESCAPES,STRICT_ALL_TABLES,NO_AUTO_VALUE_ON_ZERO").unwrap();
        let back = SqlMode::from_bits(mode.bits());
        assert!(back.no_backslash_escapes);
        assert!(back.is_strict());
        assert!(back.no_auto_value_on_zero);
        assert!(!back.relaxed().is_strict());
    }
}
