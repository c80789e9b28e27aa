//! Property-based tests for the completions wire translation
//!
//! - Empty choice lists are rejected
//! - The first choice's text is returned untouched
//! - Usage counters survive normalization

use super::openai::{CompletionChoice, CompletionResponse, CompletionUsage, OpenAIService};
use proptest::prelude::*;

fn arb_choice() -> impl Strategy<Value = CompletionChoice> {
    (
        "[a-zA-Z0-9 _.!?,\\[\\]:\n]{0,200}",
        prop_oneof![
            Just(None),
            Just(Some("stop".to_string())),
            Just(Some("length".to_string())),
        ],
    )
        .prop_map(|(text, finish_reason)| CompletionChoice {
            text,
            finish_reason,
        })
}

fn arb_usage() -> impl Strategy<Value = Option<CompletionUsage>> {
    prop::option::of((0u32..100_000, 0u32..100_000).prop_map(|(p, c)| CompletionUsage {
        prompt_tokens: p,
        completion_tokens: c,
        total_tokens: p.saturating_add(c),
    }))
}

proptest! {
    #[test]
    fn prop_empty_choices_rejected(usage in arb_usage()) {
        let resp = CompletionResponse { choices: vec![], usage };
        prop_assert!(OpenAIService::normalize_response(resp).is_err());
    }

    #[test]
    fn prop_first_choice_text_preserved(
        choices in prop::collection::vec(arb_choice(), 1..5),
        usage in arb_usage(),
    ) {
        let expected_text = choices[0].text.clone();
        let expected_truncated = choices[0].finish_reason.as_deref() == Some("length");
        let expected_usage = usage.as_ref().map(|u| (u.prompt_tokens, u.completion_tokens));

        let resp = OpenAIService::normalize_response(CompletionResponse { choices, usage });
        prop_assert!(resp.is_ok());
        let resp = resp.unwrap();

        prop_assert_eq!(&resp.text, &expected_text);
        prop_assert_eq!(resp.is_truncated(), expected_truncated);
        let (p, c) = expected_usage.unwrap_or((0, 0));
        prop_assert_eq!(resp.usage.prompt_tokens, u64::from(p));
        prop_assert_eq!(resp.usage.completion_tokens, u64::from(c));
    }
}
