use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Outermost brace span: first `{` to last `}`, across lines.
static BRACE_SPAN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)```(?:json)?").unwrap());

/// Find the first JSON object embedded in model output.
///
/// Tries the outermost brace span first, then the balanced `{...}` spans in
/// order of their opening brace. Returns `None` when nothing parses as an
/// object.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    if let Some(span) = BRACE_SPAN.find(text) {
        if let Ok(Value::Object(map)) = serde_json::from_str(span.as_str()) {
            return Some(map);
        }
    }

    let mut scan = BraceScan::default();
    for (i, c) in text.char_indices() {
        if let Some(map) = scan.step(text, i, c) {
            return Some(map);
        }
    }
    scan.flush(text)
}

/// Single pass over the text collecting balanced spans.
///
/// Quotes only count inside an open brace. Spans are parsed once their
/// outermost brace closes, or at the end of input for unclosed groups.
#[derive(Default)]
struct BraceScan {
    open: Vec<usize>,
    closed: Vec<(usize, usize)>,
    in_string: bool,
    escaped: bool,
}

impl BraceScan {
    fn step(&mut self, text: &str, i: usize, c: char) -> Option<Map<String, Value>> {
        if self.in_string {
            match c {
                _ if self.escaped => self.escaped = false,
                '\\' => self.escaped = true,
                '"' => self.in_string = false,
                _ => {}
            }
            return None;
        }
        match c {
            '"' if !self.open.is_empty() => self.in_string = true,
            '{' => self.open.push(i),
            '}' => {
                let start = self.open.pop()?;
                self.closed.push((start, i + 1));
                if self.open.is_empty() {
                    return self.flush(text);
                }
            }
            _ => {}
        }
        None
    }

    /// Try the collected spans by opening position, then forget them.
    fn flush(&mut self, text: &str) -> Option<Map<String, Value>> {
        let mut spans = std::mem::take(&mut self.closed);
        spans.sort_unstable_by_key(|&(start, _)| start);
        spans.into_iter().find_map(|(start, end)| {
            match serde_json::from_str(&text[start..end]) {
                Ok(Value::Object(map)) => Some(map),
                _ => None,
            }
        })
    }
}

/// Remove markdown code fences (```json / ```) and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Render a JSON value as plain text: strings unquoted, everything else as JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_surrounded_by_prose() {
        let text = "Here is the analysis:\n{\"modality\": \"X-Ray\", \"findings\": \"Clear lungs\"}\nLet me know.";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["modality"], "X-Ray");
    }

    #[test]
    fn fenced_multiline_object() {
        let text = "```json\n{\n  \"modality\": \"CT\",\n  \"impression\": \"Normal\"\n}\n```";
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["impression"], "Normal");
    }

    #[test]
    fn greedy_span_failure_falls_back_to_first_balanced_object() {
        // The outermost span covers both objects plus prose and does not parse.
        let text = r#"{"modality": "MRI", "findings": "ok"} and also {"note": "x"}"#;
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["modality"], "MRI");
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_scan() {
        let text = r#"noise {"findings": "curly } brace", "modality": "US"} tail }"#;
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["findings"], "curly } brace");
    }

    #[test]
    fn nested_object_is_returned_whole() {
        let text = r#"note: {"modality": "CT", "extra": {"contrast": true}} trailing }"#;
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["modality"], "CT");
        assert_eq!(map["extra"]["contrast"], true);
    }

    #[test]
    fn object_inside_unclosed_group_is_found() {
        let text = r#"{ draft {"findings": "clear"} and {"findings": "second"}"#;
        let map = extract_json_object(text).unwrap();
        assert_eq!(map["findings"], "clear");
    }

    #[test]
    fn brace_heavy_output_is_scanned_linearly() {
        assert!(extract_json_object(&"{".repeat(20_000)).is_none());
        assert!(extract_json_object(&"{x} ".repeat(20_000)).is_none());

        let noisy = format!("{}{}", "{".repeat(20_000), r#"{"modality": "US"}"#);
        assert_eq!(extract_json_object(&noisy).unwrap()["modality"], "US");
    }

    #[test]
    fn no_object_returns_none() {
        assert!(extract_json_object("The image is too blurry to analyze.").is_none());
        assert!(extract_json_object("{not json at all}").is_none());
        assert!(extract_json_object("[1, 2, 3]").is_none());
    }

    #[test]
    fn fences_are_stripped_and_trimmed() {
        assert_eq!(
            strip_code_fences("```json\n{\"diagnosis\": \"URTI\"}\n```\n"),
            "{\"diagnosis\": \"URTI\"}"
        );
        assert_eq!(strip_code_fences("  plain  "), "plain");
    }

    #[test]
    fn non_string_values_are_stringified() {
        assert_eq!(value_to_text(&Value::from(3)), "3");
        assert_eq!(value_to_text(&Value::from("CT")), "CT");
        assert_eq!(
            value_to_text(&serde_json::json!(["a", "b"])),
            r#"["a","b"]"#
        );
    }
}
