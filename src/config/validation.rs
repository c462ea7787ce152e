//! Unknown-key detection for config files, with edit-distance suggestions.
//!
//! The raw TOML is parsed into `toml::Value` first and its dotted key paths
//! compared against the known set. Unknown keys only produce warnings; serde
//! then deserializes as usual and ignores them.

use std::collections::HashSet;

/// A non-fatal config warning (typo, unknown section).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `AppConfig`. Keep in sync with app_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [server]
        "server",
        "server.addr",
        "server.cors_origins",
        // [ingest]
        "ingest",
        "ingest.raw_path",
        "ingest.cleaned_path",
        "ingest.z_threshold",
        "ingest.write_cleaned",
        // [outliers]
        "outliers",
        "outliers.default_k",
        "outliers.default_z",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Collect all dotted key paths of a `toml::Value` tree.
///
/// `{ a = { b = 1, c = 2 } }` yields `["a", "a.b", "a.c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Suggestions
// ============================================================================

fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest known key within edit distance 3. Ties go to the lexically smaller key.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

/// Warnings for every unknown key in a raw TOML document.
///
/// Parse errors yield no warnings; serde reports them afterwards.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("addr", "addr"), 0);
        assert_eq!(levenshtein("z_treshold", "z_threshold"), 1);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [ingest]
            z_threshold = 3.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"ingest".to_string()));
        assert!(keys.contains(&"ingest.z_threshold".to_string()));
    }

    #[test]
    fn test_typo_key_produces_warning_with_suggestion() {
        let warnings = validate_unknown_keys(
            r#"
[ingest]
z_treshold = 2.0
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "ingest.z_treshold");
        assert_eq!(warnings[0].suggestion.as_deref(), Some("ingest.z_threshold"));
        assert!(warnings[0].to_string().contains("did you mean"));
    }

    #[test]
    fn test_all_valid_keys_produce_zero_warnings() {
        let warnings = validate_unknown_keys(
            r#"
[server]
addr = "0.0.0.0:5000"
cors_origins = []

[ingest]
cleaned_path = "x.csv"
write_cleaned = false

[outliers]
default_k = 2.0
"#,
        );
        assert!(warnings.is_empty(), "Expected 0 warnings, got: {:?}", warnings);
    }

    #[test]
    fn test_unknown_section_has_no_suggestion() {
        let warnings = validate_unknown_keys("[database]\nuri = \"mongodb://x\"\n");
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.suggestion.is_none()));
    }

    #[test]
    fn test_unparsable_toml_yields_no_warnings() {
        assert!(validate_unknown_keys("[server").is_empty());
    }
}
