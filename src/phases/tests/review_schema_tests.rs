use super::*;

#[test]
fn test_bare_json_reply_is_structured() {
    let raw = r#"{"approved": true, "feedback": "solid plan"}"#;
    match classify_review_reply(raw) {
        ReviewParse::Structured(reply) => {
            assert!(reply.approved);
            assert_eq!(reply.feedback, "solid plan");
            assert!(reply.suggested_changes.is_empty());
            assert!(reply.revised_plan.is_none());
        }
        other => panic!("expected structured reply, got {other:?}"),
    }
}

#[test]
fn test_fenced_json_reply_is_structured() {
    let raw = "Here is my verdict:\n```json\n{\"approved\": false, \"feedback\": \"scope too broad\", \"suggestedChanges\": [\"split phase 2\"]}\n```";
    match classify_review_reply(raw) {
        ReviewParse::Structured(reply) => {
            assert!(!reply.approved);
            assert_eq!(reply.suggested_changes, vec!["split phase 2"]);
        }
        other => panic!("expected structured reply, got {other:?}"),
    }
}

#[test]
fn test_revised_plan_parses_as_partial() {
    let raw = r#"{"approved": false, "feedback": "narrow it", "revisedPlan": {"scope": "just the parser"}}"#;
    match classify_review_reply(raw) {
        ReviewParse::Structured(reply) => {
            let revision = reply.revised_plan.expect("revised plan present");
            assert_eq!(revision.scope.as_deref(), Some("just the parser"));
            assert!(revision.intent.is_none());
        }
        other => panic!("expected structured reply, got {other:?}"),
    }
}

#[test]
fn test_non_json_reply_falls_back_to_raw_text() {
    let raw = "  Looks fine to me, go ahead.  ";
    match classify_review_reply(raw) {
        ReviewParse::RawText(text) => assert_eq!(text, "Looks fine to me, go ahead."),
        other => panic!("expected raw text, got {other:?}"),
    }
}

#[test]
fn test_json_missing_required_fields_falls_back_to_raw_text() {
    // `approved` is required; a JSON object without it is not a review.
    let raw = r#"{"feedback": "no verdict here"}"#;
    assert!(matches!(classify_review_reply(raw), ReviewParse::RawText(_)));
}

#[test]
fn test_blank_reply_is_empty() {
    assert!(matches!(classify_review_reply("   \n"), ReviewParse::Empty));
    assert!(matches!(classify_review_reply(""), ReviewParse::Empty));
}
