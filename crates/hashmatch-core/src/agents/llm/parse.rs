//! Turning free-form model output into a JSON action object.
//!
//! Strategies run in [`PARSE_STRATEGIES`] order and the first one that
//! yields a usable object wins. Every strategy is a pure function of the text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

pub type ParseStrategy = fn(&str) -> Option<Map<String, Value>>;

pub const PARSE_STRATEGIES: [(&str, ParseStrategy); 3] = [
    ("direct", parse_direct),
    ("fenced", parse_fenced),
    ("braceMatch", parse_brace_match),
];

/// Wrapper keys models like to put around the action.
const WRAPPER_KEYS: [&str; 3] = ["action", "response", "result"];

fn as_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

pub fn parse_direct(text: &str) -> Option<Map<String, Value>> {
    as_object(text)
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?is)```(?:json)?\s*(.*?)```").ok())
        .as_ref()
}

pub fn parse_fenced(text: &str) -> Option<Map<String, Value>> {
    let captures = fence_regex()?.captures(text)?;
    as_object(captures.get(1)?.as_str())
}

/// First balanced `{...}` starting at the first brace, string-aware.
pub fn parse_brace_match(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return as_object(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Run the strategies in order, handing each candidate to `accept`
/// (directly, then through each wrapper key). First accepted value wins.
pub fn parse_response<T>(text: &str, accept: impl Fn(&Map<String, Value>) -> Option<T>) -> Option<T> {
    PARSE_STRATEGIES.iter().find_map(|(_, strategy)| {
        let obj = strategy(text)?;
        accept(&obj).or_else(|| {
            WRAPPER_KEYS.iter().find_map(|key| match obj.get(*key) {
                Some(Value::Object(inner)) => accept(inner),
                _ => None,
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_of(map: &Map<String, Value>) -> Option<String> {
        map.get("type").and_then(Value::as_str).map(str::to_string)
    }

    #[test]
    fn direct_needs_an_object() {
        assert!(parse_direct(r#" {"type":"wait"} "#).is_some());
        assert!(parse_direct("[1,2]").is_none());
        assert!(parse_direct("wait").is_none());
    }

    #[test]
    fn fenced_block_extracted() {
        let text = "Sure!\n```json\n{\"type\":\"extract\"}\n```\nGood luck.";
        assert_eq!(type_of(&parse_fenced(text).unwrap()).as_deref(), Some("extract"));
        assert!(parse_fenced("no fence").is_none());
    }

    #[test]
    fn brace_match_ignores_braces_in_strings() {
        let text = r#"I think {"type":"move","toRoomId":"a}b"} is best {"type":"wait"}"#;
        let map = parse_brace_match(text).unwrap();
        assert_eq!(map["toRoomId"], "a}b");
        assert!(parse_brace_match("{ unterminated").is_none());
    }

    #[test]
    fn first_success_wins_and_wrappers_unwrap() {
        let wrapped = r#"{"action":{"type":"pickup","itemId":"keycard-1"}}"#;
        assert_eq!(parse_response(wrapped, type_of).as_deref(), Some("pickup"));

        let prose = r#"My move: {"result": {"type": "wait"}} thanks"#;
        assert_eq!(parse_response(prose, type_of).as_deref(), Some("wait"));

        assert_eq!(parse_response("nothing here", type_of), None);
    }
}
