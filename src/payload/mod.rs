//! Participant identity extraction from decoded QR text.
//!
//! Badges in the wild are printed by different tools, so the text inside a code
//! has no fixed layout. `parse_payload` tries each known layout in a fixed
//! priority order and returns the first one that yields both a name and a
//! country. It never fails: unrecognised text gives an empty `Identity`.

mod strategies;

use serde::{Deserialize, Serialize};

pub use strategies::ParseStrategy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub name: String,
    pub country: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: country.into(),
        }
    }

    /// Both fields are required; an empty one means the payload was not understood.
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.country.is_empty()
    }
}

/// Parse a decoded payload into an identity, returning an empty identity when
/// no layout matches.
pub fn parse_payload(payload: &str) -> Identity {
    parse_payload_with_strategy(payload)
        .map(|(_, identity)| identity)
        .unwrap_or_default()
}

/// Same as [`parse_payload`] but also reports which layout matched.
pub fn parse_payload_with_strategy(payload: &str) -> Option<(ParseStrategy, Identity)> {
    ParseStrategy::ORDERED.iter().find_map(|strategy| {
        strategy
            .apply(payload)
            .filter(Identity::is_complete)
            .map(|identity| (*strategy, identity))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_part_comma_form() {
        assert_eq!(
            parse_payload("SMITH, John, USA"),
            Identity::new("SMITH, John", "USA")
        );
    }

    #[test]
    fn three_part_trims_and_keeps_extra_commas_in_country() {
        assert_eq!(
            parse_payload("  DOE ,  Jane  , Korea, Republic of  "),
            Identity::new("DOE, Jane", "Korea, Republic of")
        );
    }

    #[test]
    fn three_part_wins_over_two_part() {
        let (strategy, identity) = parse_payload_with_strategy("DOE, John, USA").unwrap();
        assert_eq!(strategy, ParseStrategy::ThreePartComma);
        assert_eq!(identity, Identity::new("DOE, John", "USA"));
    }

    #[test]
    fn stray_punctuation_does_not_break_three_part_form() {
        for (payload, name) in [
            (r#"O"BRIEN, John, USA"#, r#"O"BRIEN, John"#),
            (r#"DOE "JJ, John, USA"#, r#"DOE "JJ, John"#),
            ("DOE, John (Team, USA", "DOE, John (Team"),
        ] {
            let (strategy, identity) = parse_payload_with_strategy(payload).unwrap();
            assert_eq!(strategy, ParseStrategy::ThreePartComma, "payload {payload:?}");
            assert_eq!(identity.name, name);
            assert_eq!(identity.country, "USA");
        }
    }

    #[test]
    fn labeled_form() {
        assert_eq!(
            parse_payload("Name: Jane Roe, Country: Canada"),
            Identity::new("Jane Roe", "Canada")
        );
    }

    #[test]
    fn labeled_form_is_case_insensitive() {
        let (strategy, identity) =
            parse_payload_with_strategy("NAME:Jane Roe,  country :  Canada ").unwrap();
        assert_eq!(strategy, ParseStrategy::Labeled);
        assert_eq!(identity, Identity::new("Jane Roe", "Canada"));
    }

    #[test]
    fn two_part_comma_form() {
        let (strategy, identity) = parse_payload_with_strategy("Jane Roe, Canada").unwrap();
        assert_eq!(strategy, ParseStrategy::TwoPartComma);
        assert_eq!(identity, Identity::new("Jane Roe", "Canada"));
    }

    #[test]
    fn structured_name_and_country() {
        let (strategy, identity) =
            parse_payload_with_strategy(r#"{"name": " Jane Roe ", "country": "Canada"}"#).unwrap();
        assert_eq!(strategy, ParseStrategy::Structured);
        assert_eq!(identity, Identity::new("Jane Roe", "Canada"));
    }

    #[test]
    fn structured_split_name() {
        assert_eq!(
            parse_payload(r#"{"lastName":"DOE","firstName":"John","country":"USA"}"#),
            Identity::new("DOE, John", "USA")
        );
    }

    #[test]
    fn structured_without_required_fields_is_a_miss() {
        assert_eq!(parse_payload(r#"{"id": 7}"#), Identity::default());
        assert_eq!(parse_payload(r#"{"name": "Jane"}"#), Identity::default());
    }

    #[test]
    fn multi_line_three_lines() {
        assert_eq!(
            parse_payload("DOE\nJohn\nUSA"),
            Identity::new("DOE, John", "USA")
        );
    }

    #[test]
    fn multi_line_two_lines_skips_blanks() {
        let (strategy, identity) =
            parse_payload_with_strategy("\r\n  Jane Roe \r\n\r\n Canada\r\n").unwrap();
        assert_eq!(strategy, ParseStrategy::MultiLine);
        assert_eq!(identity, Identity::new("Jane Roe", "Canada"));
    }

    #[test]
    fn multi_line_other_counts_do_not_match() {
        assert_eq!(parse_payload("one"), Identity::default());
        assert_eq!(parse_payload("a\nb\nc\nd"), Identity::default());
    }

    #[test]
    fn unmatched_input_is_empty() {
        for payload in ["", "   ", "https://example.com/ticket/42", "{not json", ",", ", , ,"] {
            let identity = parse_payload(payload);
            assert_eq!(identity, Identity::default(), "payload {payload:?}");
            assert!(!identity.is_complete());
        }
    }
}
