//! Strip Markdown code fences from model output before JSON parsing.

const OPENING_FENCES: [&str; 3] = ["```json", "```JSON", "```"];
const CLOSING_FENCE: &str = "```";

/// Remove surrounding whitespace and code-fence markers.
///
/// Stripping repeats until nothing changes, so the result is a fixpoint:
/// `sanitize_json(sanitize_json(x)) == sanitize_json(x)`.
pub fn sanitize_json(text: &str) -> &str {
    let mut current = text.trim();
    loop {
        let next = strip_once(current);
        if next.len() == current.len() {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> &str {
    let text = text.trim();
    let text = OPENING_FENCES
        .iter()
        .find_map(|fence| text.strip_prefix(fence))
        .unwrap_or(text);
    let text = text.strip_suffix(CLOSING_FENCE).unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fences() {
        assert_eq!(sanitize_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(sanitize_json("```JSON {\"a\": 1} ```"), "{\"a\": 1}");
        assert_eq!(sanitize_json("  ```\n[1, 2]\n```  "), "[1, 2]");
    }

    #[test]
    fn leaves_plain_json_alone() {
        assert_eq!(sanitize_json("{\"tips\": []}"), "{\"tips\": []}");
        assert_eq!(sanitize_json("  {}\n"), "{}");
    }

    #[test]
    fn handles_degenerate_input() {
        assert_eq!(sanitize_json(""), "");
        assert_eq!(sanitize_json("   "), "");
        assert_eq!(sanitize_json("```"), "");
        assert_eq!(sanitize_json("``````"), "");
        assert_eq!(sanitize_json("```json```"), "");
    }

    #[test]
    fn nested_fences_are_removed() {
        assert_eq!(sanitize_json("```json\n```json\n{}\n```\n```"), "{}");
    }

    #[test]
    fn sanitize_is_idempotent() {
        let fragments = ["```", "```json", "```JSON", " ", "\n", "{}", "x", "`"];
        let mut inputs = vec![String::new()];
        for _ in 0..4 {
            let mut longer = Vec::new();
            for prefix in &inputs {
                for fragment in fragments {
                    longer.push(format!("{prefix}{fragment}"));
                }
            }
            inputs.extend(longer);
        }

        for input in &inputs {
            let once = sanitize_json(input);
            assert_eq!(sanitize_json(once), once, "input: {input:?}");
        }
    }
}
