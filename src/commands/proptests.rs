//! Property-based tests for command parsing
//!
//! - Every token after the trigger lands in exactly one of args or kwargs
//! - Keyword tokens split at their first `=`
//! - Peeled overrides leave a suffix of the input behind

use super::parse::{parse_query, split_leading_overrides};
use proptest::prelude::*;

fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z0-9_.]{1,12}",
        ("[a-z_]{1,8}", "[a-z0-9=.]{0,8}").prop_map(|(k, v)| format!("{k}={v}")),
    ]
}

proptest! {
    #[test]
    fn prop_tokens_are_partitioned(
        trigger in "/[a-z_]{1,15}",
        tokens in prop::collection::vec(arb_token(), 0..8),
    ) {
        let text = format!("{trigger} {}", tokens.join(" "));
        let parsed = parse_query(&text).unwrap();

        prop_assert_eq!(&parsed.trigger, &trigger);
        prop_assert_eq!(parsed.args.len() + parsed.kwargs.len(), tokens.len());

        let keyword_tokens: Vec<&String> = tokens.iter().filter(|t| t.contains('=')).collect();
        prop_assert_eq!(parsed.kwargs.len(), keyword_tokens.len());
        for ((key, value), token) in parsed.kwargs.iter().zip(keyword_tokens) {
            prop_assert_eq!(format!("{key}={value}"), token.clone());
            prop_assert!(!key.contains('='));
        }
    }

    #[test]
    fn prop_overrides_leave_suffix(tokens in prop::collection::vec(arb_token(), 0..8)) {
        let text = tokens.join(" ");
        let allowed = ["model", "temperature", "max_tokens"];
        let (overrides, rest) = split_leading_overrides(&text, &allowed);

        prop_assert!(text.ends_with(rest));
        prop_assert!(overrides.len() <= tokens.len());
        for (key, _) in &overrides {
            prop_assert!(allowed.contains(key));
        }
        // The first remaining token is never an allowed override
        if let Some(first) = rest.split_whitespace().next() {
            let peelable = first
                .split_once('=')
                .is_some_and(|(key, _)| allowed.contains(&key));
            prop_assert!(!peelable);
        }
    }
}
