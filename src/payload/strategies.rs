use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::Identity;

/// Known badge layouts, tried in the order listed in [`ParseStrategy::ORDERED`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// `LAST, First, Country`
    ThreePartComma,
    /// `Name: <value>, Country: <value>`
    Labeled,
    /// `Full Name, Country`
    TwoPartComma,
    /// JSON object with `name`/`country` or `lastName`/`firstName`/`country`
    Structured,
    /// Two or three non-blank lines
    MultiLine,
}

impl ParseStrategy {
    pub const ORDERED: [ParseStrategy; 5] = [
        ParseStrategy::ThreePartComma,
        ParseStrategy::Labeled,
        ParseStrategy::TwoPartComma,
        ParseStrategy::Structured,
        ParseStrategy::MultiLine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParseStrategy::ThreePartComma => "three-part-comma",
            ParseStrategy::Labeled => "labeled",
            ParseStrategy::TwoPartComma => "two-part-comma",
            ParseStrategy::Structured => "structured",
            ParseStrategy::MultiLine => "multi-line",
        }
    }

    pub(super) fn apply(&self, payload: &str) -> Option<Identity> {
        match self {
            ParseStrategy::ThreePartComma => three_part_comma(payload),
            ParseStrategy::Labeled => labeled(payload),
            ParseStrategy::TwoPartComma => two_part_comma(payload),
            ParseStrategy::Structured => structured(payload),
            ParseStrategy::MultiLine => multi_line(payload),
        }
    }
}

/// A JSON object or array is left to the structured layout, even though its
/// text contains commas.
fn is_json_document(payload: &str) -> bool {
    let trimmed = payload.trim();
    (trimmed.starts_with('{') || trimmed.starts_with('['))
        && serde_json::from_str::<Value>(trimmed).is_ok()
}

/// Byte offsets of the commas that separate fields. Quotes and brackets are
/// ordinary text here, so `O"BRIEN, John, USA` still splits.
fn field_commas(payload: &str) -> Vec<usize> {
    if is_json_document(payload) {
        return Vec::new();
    }
    payload.match_indices(',').map(|(idx, _)| idx).collect()
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn three_part_comma(payload: &str) -> Option<Identity> {
    let commas = field_commas(payload);
    let (&first, &second) = (commas.first()?, commas.get(1)?);

    let last_name = non_empty(&payload[..first])?;
    let first_name = non_empty(&payload[first + 1..second])?;
    let country = non_empty(&payload[second + 1..])?;

    Some(Identity::new(format!("{last_name}, {first_name}"), country))
}

fn label_patterns() -> Option<&'static (Regex, Regex)> {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let name = Regex::new(r"(?i)\bname\s*:\s*([^,\r\n]+)").ok()?;
            let country = Regex::new(r"(?i)\bcountry\s*:\s*([^,\r\n]+)").ok()?;
            Some((name, country))
        })
        .as_ref()
}

fn labeled(payload: &str) -> Option<Identity> {
    let (name_re, country_re) = label_patterns()?;
    let name = name_re.captures(payload)?.get(1)?.as_str();
    let country = country_re.captures(payload)?.get(1)?.as_str();

    Some(Identity::new(non_empty(name)?, non_empty(country)?))
}

fn two_part_comma(payload: &str) -> Option<Identity> {
    let first = *field_commas(payload).first()?;

    let name = non_empty(&payload[..first])?;
    let country = non_empty(&payload[first + 1..])?;

    Some(Identity::new(name, country))
}

fn string_field<'a>(object: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str).and_then(non_empty)
}

fn structured(payload: &str) -> Option<Identity> {
    // Anything that is not a JSON object is simply not this layout.
    let value: Value = serde_json::from_str(payload.trim()).ok()?;
    let object = value.as_object()?;
    let country = string_field(object, "country")?;

    if let Some(name) = string_field(object, "name") {
        return Some(Identity::new(name, country));
    }

    let last_name = string_field(object, "lastName")?;
    let first_name = string_field(object, "firstName")?;
    Some(Identity::new(format!("{last_name}, {first_name}"), country))
}

fn multi_line(payload: &str) -> Option<Identity> {
    let lines: Vec<&str> = payload
        .split(|ch: char| ch == '\n' || ch == '\r')
        .filter_map(non_empty)
        .collect();

    match lines.as_slice() {
        [last_name, first_name, country] => {
            Some(Identity::new(format!("{last_name}, {first_name}"), *country))
        }
        [name, country] => Some(Identity::new(*name, *country)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_and_brackets_do_not_hide_commas() {
        assert_eq!(field_commas(r#""x, y", z"#), vec![2, 6]);
        assert_eq!(field_commas("a, (b, c), d"), vec![1, 5, 9]);
        assert_eq!(field_commas("a), b"), vec![2]);
    }

    #[test]
    fn json_documents_have_no_field_commas() {
        assert!(field_commas(r#"{"a":1,"b":2}"#).is_empty());
        assert!(field_commas(r#"  [1, 2]  "#).is_empty());
        // Looks like JSON but is not, so the commas count.
        assert_eq!(field_commas("{DOE, John, USA"), vec![4, 10]);
    }

    #[test]
    fn stray_quote_keeps_three_part_layout() {
        let identity = ParseStrategy::ThreePartComma
            .apply(r#"O"BRIEN, John, USA"#)
            .unwrap();
        assert_eq!(identity, Identity::new(r#"O"BRIEN, John"#, "USA"));
    }

    #[test]
    fn unclosed_bracket_keeps_three_part_layout() {
        let identity = ParseStrategy::ThreePartComma
            .apply("DOE, John (Team, USA")
            .unwrap();
        assert_eq!(identity, Identity::new("DOE, John (Team", "USA"));
    }

    #[test]
    fn labeled_requires_both_labels() {
        assert_eq!(ParseStrategy::Labeled.apply("Name: Jane Roe"), None);
        assert_eq!(ParseStrategy::Labeled.apply("Country: Canada"), None);
    }

    #[test]
    fn structured_never_errors_on_plain_text() {
        assert_eq!(ParseStrategy::Structured.apply("Jane Roe, Canada"), None);
        assert_eq!(ParseStrategy::Structured.apply("[1, 2]"), None);
        assert_eq!(ParseStrategy::Structured.apply(r#"{"name": 5, "country": "X"}"#), None);
    }

    #[test]
    fn structured_prefers_full_name_field() {
        let identity = ParseStrategy::Structured
            .apply(r#"{"name":"Jane Roe","lastName":"ROE","firstName":"Jane","country":"Canada"}"#)
            .unwrap();
        assert_eq!(identity, Identity::new("Jane Roe", "Canada"));
    }

    #[test]
    fn json_payload_with_commas_is_not_split() {
        let payload = r#"{"lastName":"DOE","firstName":"John","country":"USA"}"#;
        assert_eq!(ParseStrategy::ThreePartComma.apply(payload), None);
        assert_eq!(ParseStrategy::TwoPartComma.apply(payload), None);
    }

    #[test]
    fn structured_keeps_surname_case() {
        let identity = ParseStrategy::Structured
            .apply(r#"{"lastName":"Doe","firstName":"John","country":"USA"}"#)
            .unwrap();
        assert_eq!(identity, Identity::new("Doe, John", "USA"));
    }
}
