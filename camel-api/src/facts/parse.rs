//! Parsers for free-form generator output
//!
//! Each parser returns the cleaned facts it could extract, possibly none.

use serde_json::Value;

/// Most facts ever returned for one breed
pub const MAX_FACTS: usize = 10;

/// Normalize candidate facts
///
/// Trims, drops fragments under 4 characters and `note:` / `disclaimer:`
/// lines, ensures a trailing period, removes duplicates (first occurrence
/// wins) and keeps at most [`MAX_FACTS`].
pub fn clean_facts<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();

    for item in items {
        let item = item.as_ref().trim();
        if item.chars().count() < 4 {
            continue;
        }

        let lower = item.to_lowercase();
        if lower.starts_with("note:") || lower.starts_with("disclaimer:") {
            continue;
        }

        let mut fact = item.to_string();
        if !fact.ends_with('.') {
            fact.push('.');
        }
        if !out.contains(&fact) {
            out.push(fact);
        }
    }

    out.truncate(MAX_FACTS);
    out
}

/// `{"facts": [...]}`, or the first `{ ... }` span inside surrounding prose
pub fn parse_json_facts(text: &str) -> Vec<String> {
    let value = match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => value,
        Err(_) => match embedded_object(text).and_then(|s| serde_json::from_str(s).ok()) {
            Some(value) => value,
            None => return Vec::new(),
        },
    };

    let Some(items) = value.get("facts").and_then(Value::as_array) else {
        return Vec::new();
    };

    clean_facts(items.iter().map(|item| match item {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }))
}

/// Lines of the form `- fact`
pub fn parse_bullet_facts(text: &str) -> Vec<String> {
    clean_facts(
        text.lines()
            .map(str::trim)
            .filter_map(|line| line.strip_prefix("- ")),
    )
}

/// One fact per line; if that yields fewer than [`MAX_FACTS`], split into
/// sentences instead
pub fn parse_plain_facts(text: &str) -> Vec<String> {
    let by_line = clean_facts(
        text.lines()
            .map(str::trim)
            .filter(|line| line.chars().count() > 3),
    );
    if by_line.len() >= MAX_FACTS {
        return by_line;
    }

    clean_facts(
        text.split(['.', '\n'])
            .map(str::trim)
            .filter(|s| s.chars().count() > 5),
    )
}

fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_drops_short_and_disclaimers() {
        let facts = clean_facts([
            "  Camels store fat in their humps  ",
            "ok",
            "Note: facts may vary",
            "DISCLAIMER: not verified",
            "Camels can close their nostrils.",
        ]);
        assert_eq!(
            facts,
            [
                "Camels store fat in their humps.",
                "Camels can close their nostrils."
            ]
        );
    }

    #[test]
    fn test_clean_dedupes_after_period_fix() {
        let facts = clean_facts(["Two humps", "Two humps.", "Two humps"]);
        assert_eq!(facts, ["Two humps."]);
    }

    #[test]
    fn test_clean_clips_to_max() {
        let items: Vec<String> = (0..15).map(|i| format!("Fact number {}", i)).collect();
        let facts = clean_facts(&items);
        assert_eq!(facts.len(), MAX_FACTS);
        assert_eq!(facts[0], "Fact number 0.");
        assert_eq!(facts[9], "Fact number 9.");
    }

    #[test]
    fn test_json_strict() {
        let facts = parse_json_facts(r#"{"facts": ["Lives in deserts", "Has one hump."]}"#);
        assert_eq!(facts, ["Lives in deserts.", "Has one hump."]);
    }

    #[test]
    fn test_json_embedded_in_prose() {
        let text = "Here you go:\n```json\n{\"facts\": [\"Bred in Arabia\"]}\n```";
        assert_eq!(parse_json_facts(text), ["Bred in Arabia."]);
    }

    #[test]
    fn test_json_non_string_items() {
        let facts = parse_json_facts(r#"{"facts": [12345, "Tall animal"]}"#);
        assert_eq!(facts, ["12345.", "Tall animal."]);
    }

    #[test]
    fn test_json_unusable() {
        assert!(parse_json_facts("no json here").is_empty());
        assert!(parse_json_facts(r#"{"other": []}"#).is_empty());
        assert!(parse_json_facts(r#"["a list", "not an object"]"#).is_empty());
        assert!(parse_json_facts("} backwards {").is_empty());
    }

    #[test]
    fn test_bullets() {
        let text = "Intro line\n- First fact here\n  - Second fact here\n* not a bullet\n-nospace";
        assert_eq!(
            parse_bullet_facts(text),
            ["First fact here.", "Second fact here."]
        );
    }

    #[test]
    fn test_plain_lines_when_enough() {
        let text: String = (1..=10)
            .map(|i| format!("Plain fact {}\n", i))
            .collect();
        let facts = parse_plain_facts(&text);
        assert_eq!(facts.len(), 10);
        assert_eq!(facts[0], "Plain fact 1.");
    }

    #[test]
    fn test_plain_falls_back_to_sentences() {
        let text = "Camels are hardy. They drink fast. Calves walk early";
        assert_eq!(
            parse_plain_facts(text),
            ["Camels are hardy.", "They drink fast.", "Calves walk early."]
        );
    }
}
