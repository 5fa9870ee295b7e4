//! Fence-tolerant JSON extraction shared by the Analyzer, Rewriter, and
//! Generator nodes (distilled §4.9 Generator: "tolerate markdown fences,
//! leading/trailing prose, and unescaped newlines inside string fields";
//! GLOSSARY "Fence-tolerant JSON extraction"). Grounded on
//! `original_source/l88_backend/graph/nodes/query_rewriter.py`'s
//! `` "```" in text `` split, generalized to also balance braces and repair
//! raw newlines the source's simpler split doesn't handle.

/// Strips a leading/trailing markdown code fence (with an optional `json`
/// language tag), narrows to the outermost `{...}` object to drop
/// surrounding prose, then repairs literal newlines inside string values so
/// the result parses as strict JSON.
pub fn extract_json_object(raw: &str) -> Option<String> {
    let unfenced = strip_code_fence(raw);
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        return None;
    }
    Some(escape_raw_newlines_in_strings(&unfenced[start..=end]))
}

pub fn parse_json<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    let candidate = extract_json_object(raw)?;
    serde_json::from_str(&candidate).ok()
}

fn strip_code_fence(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    match rest.rfind("```") {
        Some(idx) => rest[..idx].trim(),
        None => rest.trim(),
    }
}

/// Walks the text tracking whether it is inside a quoted string (respecting
/// backslash escapes) and replaces any literal `\n`/`\r` found there with an
/// escaped `\n`, since a raw control character inside a JSON string is
/// invalid per the JSON grammar but LLMs emit them routinely inside
/// "reasoning" fields.
fn escape_raw_newlines_in_strings(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in s.chars() {
        if in_string {
            if escaped {
                out.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => {
                    out.push(c);
                    escaped = true;
                }
                '"' => {
                    out.push(c);
                    in_string = false;
                }
                '\n' => out.push_str("\\n"),
                '\r' => {}
                _ => out.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, PartialEq, Debug)]
    struct Probe {
        a: String,
        b: i32,
    }

    #[test]
    fn parses_bare_json() {
        let probe: Probe = parse_json(r#"{"a": "x", "b": 1}"#).unwrap();
        assert_eq!(probe, Probe { a: "x".into(), b: 1 });
    }

    #[test]
    fn strips_markdown_fence_and_language_tag() {
        let raw = "```json\n{\"a\": \"x\", \"b\": 2}\n```";
        let probe: Probe = parse_json(raw).unwrap();
        assert_eq!(probe, Probe { a: "x".into(), b: 2 });
    }

    #[test]
    fn tolerates_leading_and_trailing_prose() {
        let raw = "Sure, here is the JSON:\n{\"a\": \"x\", \"b\": 3}\nHope that helps!";
        let probe: Probe = parse_json(raw).unwrap();
        assert_eq!(probe, Probe { a: "x".into(), b: 3 });
    }

    #[test]
    fn escapes_unescaped_newlines_inside_string_fields() {
        let raw = "{\"a\": \"line one\nline two\", \"b\": 4}";
        let probe: Probe = parse_json(raw).unwrap();
        assert_eq!(probe.a, "line one\nline two");
        assert_eq!(probe.b, 4);
    }

    #[test]
    fn returns_none_when_no_object_present() {
        assert!(extract_json_object("not json at all").is_none());
    }
}
