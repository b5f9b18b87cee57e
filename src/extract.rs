//! Fenced code block extraction.
//!
//! A block opens with a language-tagged fence and closes with a bare fence.
//! An unterminated block running to the end of the text still counts.
use regex::Regex;

/// Compile the block pattern for a fence language tag.
pub fn fence_pattern(language: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(?s)```{}\s*(.*?)\s*(?:```|$)",
        regex::escape(language)
    ))
}

/// Bodies of every fenced block tagged with `language`, trimmed of the
/// whitespace hugging the fences.
pub fn extract_code_blocks<'a>(text: &'a str, language: &str) -> Result<Vec<&'a str>, regex::Error> {
    let pattern = fence_pattern(language)?;
    Ok(pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|body| body.as_str()))
        .collect())
}

/// Re-wrap a block body in its fence delimiters.
pub fn fence(body: &str, language: &str) -> String {
    format!("```{language}\n{body}\n```")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_block_round_trips_through_fence() {
        let text = "```python\nprint(1)\n```";
        let blocks = extract_code_blocks(text, "python").expect("extract");
        assert_eq!(blocks, vec!["print(1)"]);
        assert_eq!(fence(blocks[0], "python"), text);
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let text = "Here you go:\n\n```python\nimport os\n\nx = 1\n```\n\nLet me know.";
        let blocks = extract_code_blocks(text, "python").expect("extract");
        assert_eq!(blocks, vec!["import os\n\nx = 1"]);
    }

    #[test]
    fn unterminated_trailing_block_is_tolerated() {
        let text = "Partial answer\n```python\nprint(2)\n";
        let blocks = extract_code_blocks(text, "python").expect("extract");
        assert_eq!(blocks, vec!["print(2)"]);
    }

    #[test]
    fn multiple_blocks_are_all_reported() {
        let text = "```python\na = 1\n```\ntext\n```python\nb = 2\n```";
        let blocks = extract_code_blocks(text, "python").expect("extract");
        assert_eq!(blocks, vec!["a = 1", "b = 2"]);
    }

    #[test]
    fn other_languages_and_bare_fences_do_not_match() {
        let text = "```rust\nfn main() {}\n```\n```\nplain\n```";
        let blocks = extract_code_blocks(text, "python").expect("extract");
        assert!(blocks.is_empty());
    }

    #[test]
    fn language_tag_is_matched_literally() {
        let text = "```c++\nint x;\n```";
        let blocks = extract_code_blocks(text, "c++").expect("extract");
        assert_eq!(blocks, vec!["int x;"]);
    }
}
