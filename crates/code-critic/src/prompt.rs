//! Reviewer prompt and response cleanup.

/// Build the reviewer prompt for one file.
pub fn build_prompt(content: &str, path_hint: &str) -> String {
    format!(
        "You are the code critic for a personal assistant that installs third-party skill \
modules. Rewrite the file below to meet the assistant's standards.\n\
\n\
Standards:\n\
- document every public function and type\n\
- add explicit error handling around I/O and network calls\n\
- add type annotations where the language supports them\n\
- remove hardcoded credentials, tokens and unsafe file operations\n\
- flag security-sensitive operations with a short comment\n\
\n\
Keep the behaviour of the file. Do not add features. If you see a security issue, fix it.\n\
\n\
File: {path_hint}\n\
\n\
Original:\n\
{content}\n\
\n\
Reply with only the rewritten file, no explanations."
    )
}

/// Strip a Markdown code fence wrapped around a model response.
///
/// Returns the body of the first fenced block when one is present (the
/// language tag after the opening fence is dropped), otherwise the whole
/// response. The result is trimmed.
pub fn strip_code_fences(response: &str) -> String {
    let Some(open) = response.find("```") else {
        return response.trim().to_string();
    };

    let after_open = &response[open + 3..];
    // Skip the info string (e.g. "python") up to the end of the fence line.
    let body = match after_open.find('\n') {
        Some(nl) => &after_open[nl + 1..],
        None => after_open,
    };

    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };

    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_carries_path_and_content() {
        let prompt = build_prompt("print('hi')", "tool/main.py");
        assert!(prompt.contains("File: tool/main.py"));
        assert!(prompt.contains("print('hi')"));
    }

    #[test]
    fn test_strip_language_tagged_fence() {
        let raw = "Here you go:\n```python\ndef f():\n    return 1\n```\nEnjoy";
        assert_eq!(strip_code_fences(raw), "def f():\n    return 1");
    }

    #[test]
    fn test_strip_bare_fence() {
        let raw = "```\nfn main() {}\n```";
        assert_eq!(strip_code_fences(raw), "fn main() {}");
    }

    #[test]
    fn test_unterminated_fence_keeps_rest() {
        let raw = "```rust\nfn main() {}\n";
        assert_eq!(strip_code_fences(raw), "fn main() {}");
    }

    #[test]
    fn test_no_fence_is_trimmed() {
        assert_eq!(strip_code_fences("  x = 1\n"), "x = 1");
    }
}
