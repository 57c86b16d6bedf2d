//! Scalar cleaning shared by both conversion directions.
//!
//! Nothing in this module fails: malformed input degrades to an empty value
//! and the caller is told why through [`Finding`].

use std::collections::BTreeSet;

use serde::Deserialize;

const NULL_TOKENS: [&str; 5] = ["nan", "none", "null", "n/a", "na"];
const SPREADSHEET_ERRORS: [&str; 7] = [
    "#N/A", "#REF!", "#VALUE!", "#DIV/0!", "#NAME?", "#NULL!", "#NUM!",
];
/// Separator used when list cells are written.
pub const LIST_SEPARATOR: &str = ", ";

/// Latin letters that are routinely typed in place of their Cyrillic twins.
pub const DEFAULT_HOMOGLYPHS: [(char, char); 14] = [
    ('C', 'С'),
    ('A', 'А'),
    ('E', 'Е'),
    ('O', 'О'),
    ('P', 'Р'),
    ('X', 'Х'),
    ('Y', 'У'),
    ('c', 'с'),
    ('a', 'а'),
    ('e', 'е'),
    ('o', 'о'),
    ('p', 'р'),
    ('x', 'х'),
    ('y', 'у'),
];

/// What to do when a homoglyph fix has several candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Keep the input unchanged.
    #[default]
    Reject,
    /// Take the lexicographically smallest candidate.
    BestGuess,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Replacement for line breaks inside a cell.
    pub newline_separator: String,
    /// Largest number of substituted letters a correction may need.
    pub max_substitutions: usize,
    pub ambiguity: AmbiguityPolicy,
    pub homoglyphs: Vec<(char, char)>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            newline_separator: " ".to_string(),
            max_substitutions: 1,
            ambiguity: AmbiguityPolicy::Reject,
            homoglyphs: DEFAULT_HOMOGLYPHS.to_vec(),
        }
    }
}

/// Reason a value was dropped or left uncorrected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    Malformed { raw: String },
    Ambiguous { value: String, candidates: Vec<String> },
}

/// Result of cleaning one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<T> {
    pub value: T,
    pub finding: Option<Finding>,
}

/// Result of splitting a list cell. Every malformed piece is reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedList {
    pub value: Vec<String>,
    pub findings: Vec<Finding>,
}

impl<T> Normalized<T> {
    fn clean(value: T) -> Self {
        Self {
            value,
            finding: None,
        }
    }
}

/// Trims, flattens line breaks, collapses whitespace, and maps null tokens and
/// spreadsheet error literals to `None`.
pub fn normalize_scalar(raw: Option<&str>, config: &NormalizerConfig) -> Normalized<Option<String>> {
    let Some(raw) = raw else {
        return Normalized::clean(None);
    };

    let trimmed = raw.trim();
    if SPREADSHEET_ERRORS.contains(&trimmed)
        || raw
            .chars()
            .any(|ch| ch.is_control() && !matches!(ch, '\n' | '\r' | '\t'))
    {
        return Normalized {
            value: None,
            finding: Some(Finding::Malformed {
                raw: raw.to_string(),
            }),
        };
    }

    let flattened = flatten_newlines(raw, &config.newline_separator);
    let collapsed = flattened
        .split(|ch: char| ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.is_empty() || NULL_TOKENS.contains(&collapsed.to_lowercase().as_str()) {
        return Normalized::clean(None);
    }
    Normalized::clean(Some(collapsed))
}

/// Replaces every run of CR/LF characters with `separator`.
pub fn flatten_newlines(raw: &str, separator: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_break = false;
    for ch in raw.chars() {
        if ch == '\n' || ch == '\r' {
            if !in_break {
                out.push_str(separator);
            }
            in_break = true;
        } else {
            in_break = false;
            out.push(ch);
        }
    }
    out
}

/// Cleans an identifier: scalar normalization followed by whitespace removal.
pub fn canonical_id(raw: Option<&str>, config: &NormalizerConfig) -> Normalized<Option<String>> {
    let normalized = normalize_scalar(raw, config);
    Normalized {
        value: normalized
            .value
            .map(|value| value.chars().filter(|ch| !ch.is_whitespace()).collect::<String>())
            .filter(|value| !value.is_empty()),
        finding: normalized.finding,
    }
}

/// Splits a list cell on line breaks, commas, and semicolons. A leading `-`
/// bullet on each line is ignored. Duplicates are dropped, first-seen order kept.
pub fn parse_list(raw: Option<&str>, config: &NormalizerConfig) -> ParsedList {
    let mut parsed = ParsedList::default();
    let Some(raw) = raw else {
        return parsed;
    };

    for line in raw.split(['\n', '\r']) {
        let line = line.trim();
        let line = line.strip_prefix('-').unwrap_or(line);
        for piece in line.split([',', ';']) {
            let cleaned = canonical_id(Some(piece), config);
            if let Some(finding) = cleaned.finding {
                parsed.findings.push(finding);
                continue;
            }
            if let Some(item) = cleaned.value {
                if !parsed.value.contains(&item) {
                    parsed.value.push(item);
                }
            }
        }
    }
    parsed
}

/// Sorted, deduplicated, comma-joined form of a list. Equal sets always
/// produce equal cells.
pub fn serialize_list<S: AsRef<str>>(items: &[S]) -> String {
    let unique: BTreeSet<&str> = items
        .iter()
        .map(AsRef::as_ref)
        .filter(|item| !item.is_empty())
        .collect();
    unique.into_iter().collect::<Vec<_>>().join(LIST_SEPARATOR)
}

/// Parses integer cells; spreadsheet readers often hand back `12.0`.
pub fn parse_integer(raw: &str) -> Normalized<Option<i64>> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Normalized::clean(Some(value));
    }
    match raw.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
            Normalized::clean(Some(value as i64))
        }
        _ => Normalized {
            value: None,
            finding: Some(Finding::Malformed {
                raw: raw.to_string(),
            }),
        },
    }
}

/// Outcome of [`correct_homoglyphs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    /// Already a vocabulary entry.
    Exact,
    /// Exactly one entry is reachable by substitution.
    Corrected(String),
    /// Several entries are reachable.
    Ambiguous(Vec<String>),
    /// Nothing within reach.
    NoMatch,
}

/// Matches `value` against a controlled vocabulary, allowing Latin look-alike
/// letters in place of their Cyrillic counterparts.
pub fn correct_homoglyphs<S: AsRef<str>>(
    value: &str,
    vocabulary: &[S],
    config: &NormalizerConfig,
) -> Correction {
    if vocabulary.iter().any(|entry| entry.as_ref() == value) {
        return Correction::Exact;
    }

    let source: Vec<char> = value.chars().collect();
    let mut candidates: Vec<String> = vocabulary
        .iter()
        .map(AsRef::as_ref)
        .filter(|entry| {
            substitution_distance(&source, entry, &config.homoglyphs)
                .is_some_and(|distance| distance >= 1 && distance <= config.max_substitutions)
        })
        .map(str::to_string)
        .collect();
    candidates.sort();
    candidates.dedup();

    match candidates.len() {
        0 => Correction::NoMatch,
        1 => Correction::Corrected(candidates.remove(0)),
        _ => Correction::Ambiguous(candidates),
    }
}

/// Number of positions where `source` differs from `target`, provided every
/// difference is a table substitution.
fn substitution_distance(source: &[char], target: &str, table: &[(char, char)]) -> Option<usize> {
    let target: Vec<char> = target.chars().collect();
    if target.len() != source.len() {
        return None;
    }
    let mut distance = 0;
    for (from, to) in source.iter().zip(target.iter()) {
        if from == to {
            continue;
        }
        if !table.contains(&(*from, *to)) {
            return None;
        }
        distance += 1;
    }
    Some(distance)
}

/// Applies [`correct_homoglyphs`] and the configured ambiguity policy.
pub fn correct_value<S: AsRef<str>>(
    value: String,
    vocabulary: &[S],
    config: &NormalizerConfig,
) -> Normalized<String> {
    match correct_homoglyphs(&value, vocabulary, config) {
        Correction::Exact | Correction::NoMatch => Normalized::clean(value),
        Correction::Corrected(fixed) => Normalized::clean(fixed),
        Correction::Ambiguous(candidates) => {
            let chosen = match config.ambiguity {
                AmbiguityPolicy::Reject => value.clone(),
                AmbiguityPolicy::BestGuess => candidates[0].clone(),
            };
            Normalized {
                value: chosen,
                finding: Some(Finding::Ambiguous { value, candidates }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NormalizerConfig {
        NormalizerConfig::default()
    }

    #[test]
    fn scalars_are_flattened_and_trimmed() {
        let cleaned = normalize_scalar(Some("  Core\r\n\r\nrouter\t room\u{a0}1 "), &config());
        assert_eq!(cleaned.value.as_deref(), Some("Core router room 1"));
        assert!(cleaned.finding.is_none());
    }

    #[test]
    fn custom_newline_separator() {
        let config = NormalizerConfig {
            newline_separator: " / ".into(),
            ..NormalizerConfig::default()
        };
        let cleaned = normalize_scalar(Some("line one\nline two"), &config);
        assert_eq!(cleaned.value.as_deref(), Some("line one / line two"));
    }

    #[test]
    fn null_tokens_become_empty() {
        for raw in ["", "   ", "NaN", "None", "n/a", "NULL"] {
            assert_eq!(normalize_scalar(Some(raw), &config()).value, None, "{raw}");
        }
        assert_eq!(normalize_scalar(None, &config()).value, None);
    }

    #[test]
    fn spreadsheet_errors_are_malformed() {
        let cleaned = normalize_scalar(Some("#REF!"), &config());
        assert_eq!(cleaned.value, None);
        assert_eq!(
            cleaned.finding,
            Some(Finding::Malformed { raw: "#REF!".into() })
        );
    }

    #[test]
    fn identifiers_lose_inner_whitespace() {
        let cleaned = canonical_id(Some(" sbs.dc. 01 "), &config());
        assert_eq!(cleaned.value.as_deref(), Some("sbs.dc.01"));
    }

    #[test]
    fn lists_split_on_all_delimiters() {
        let parsed = parse_list(
            Some("- sbs.net.b\n- sbs.net.a; sbs.net.c,sbs.net.a\r\n"),
            &config(),
        );
        assert_eq!(parsed.value, vec!["sbs.net.b", "sbs.net.a", "sbs.net.c"]);
        assert!(parsed.findings.is_empty());
    }

    #[test]
    fn every_malformed_list_piece_is_reported() {
        let parsed = parse_list(Some("sbs.net.a, #REF!; #N/A\nsbs.net.b"), &config());
        assert_eq!(parsed.value, vec!["sbs.net.a", "sbs.net.b"]);
        assert_eq!(
            parsed.findings,
            vec![
                Finding::Malformed { raw: " #REF!".into() },
                Finding::Malformed { raw: " #N/A".into() },
            ]
        );
    }

    #[test]
    fn list_serialization_is_order_independent() {
        let lhs = serialize_list(&["b", "a", "c"]);
        let rhs = serialize_list(&["c", "b", "a", "a"]);
        assert_eq!(lhs, "a, b, c");
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn integers_accept_float_text() {
        assert_eq!(parse_integer("12").value, Some(12));
        assert_eq!(parse_integer("12.0").value, Some(12));
        let bad = parse_integer("twelve");
        assert_eq!(bad.value, None);
        assert!(matches!(bad.finding, Some(Finding::Malformed { .. })));
    }

    #[test]
    fn single_homoglyph_is_corrected() {
        // Latin 'C' in place of the Cyrillic one.
        let vocabulary = ["МСЭ", "Коммутатор"];
        assert_eq!(
            correct_homoglyphs("МCЭ", &vocabulary, &config()),
            Correction::Corrected("МСЭ".into())
        );
        assert_eq!(correct_homoglyphs("МСЭ", &vocabulary, &config()), Correction::Exact);
    }

    #[test]
    fn distance_above_threshold_is_no_match() {
        let vocabulary = ["СОР"];
        assert_eq!(
            correct_homoglyphs("COP", &vocabulary, &config()),
            Correction::NoMatch
        );
        let relaxed = NormalizerConfig {
            max_substitutions: 3,
            ..NormalizerConfig::default()
        };
        assert_eq!(
            correct_homoglyphs("COP", &vocabulary, &relaxed),
            Correction::Corrected("СОР".into())
        );
    }

    #[test]
    fn ambiguity_policy_controls_the_result() {
        // "Cx" is one substitution away from both entries.
        let vocabulary = ["Сx", "Cх"];
        let rejected = correct_value("Cx".to_string(), &vocabulary, &config());
        assert_eq!(rejected.value, "Cx");
        assert!(matches!(rejected.finding, Some(Finding::Ambiguous { .. })));

        let guessing = NormalizerConfig {
            ambiguity: AmbiguityPolicy::BestGuess,
            ..NormalizerConfig::default()
        };
        let guessed = correct_value("Cx".to_string(), &vocabulary, &guessing);
        let mut expected = vec!["Сx".to_string(), "Cх".to_string()];
        expected.sort();
        assert_eq!(guessed.value, expected[0]);
        assert!(guessed.finding.is_some());
    }
}
