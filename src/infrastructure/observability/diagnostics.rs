const MAX_VISIBLE_LENGTH: usize = 100;
const MAX_DIAGNOSTIC_LINES: usize = 6;
const MAX_DIAGNOSTIC_CHARS: usize = 600;

/// Shortens prompt text for logging and masks credentials in it.
pub fn sanitize_prompt(prompt: &str) -> String {
    let trimmed = prompt.trim();

    if trimmed.is_empty() {
        return String::from("[EMPTY]");
    }

    let total = trimmed.chars().count();
    let visible = if total > MAX_VISIBLE_LENGTH {
        let head: String = trimmed.chars().take(MAX_VISIBLE_LENGTH).collect();
        format!("{}... ({} chars total)", head, total)
    } else {
        trimmed.to_string()
    };

    redact_sensitive_patterns(&visible)
}

/// Condenses an external tool's stderr into the tail lines that usually
/// name the failure, with credentials masked.
pub fn summarize_diagnostics(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return String::from("no diagnostic output");
    }

    let tail = &lines[lines.len().saturating_sub(MAX_DIAGNOSTIC_LINES)..];
    let joined = tail.join(" | ");
    let clipped: String = if joined.chars().count() > MAX_DIAGNOSTIC_CHARS {
        let skip = joined.chars().count() - MAX_DIAGNOSTIC_CHARS;
        format!("...{}", joined.chars().skip(skip).collect::<String>())
    } else {
        joined
    };

    redact_sensitive_patterns(&clipped)
}

fn redact_sensitive_patterns(text: &str) -> String {
    let patterns = [
        ("Bearer ", "Bearer [REDACTED]"),
        ("api_key=", "api_key=[REDACTED]"),
        ("key=", "key=[REDACTED]"),
        ("password=", "password=[REDACTED]"),
        ("token=", "token=[REDACTED]"),
    ];

    let mut result = text.to_string();
    for (pattern, replacement) in patterns {
        let mut from = 0;
        while let Some(found) = result[from..].find(pattern) {
            let idx = from + found;
            let value_start = idx + pattern.len();
            let end = result[value_start..]
                .find(|c: char| c.is_whitespace() || c == '&' || c == '"' || c == '\'')
                .map(|i| value_start + i)
                .unwrap_or(result.len());
            result = format!("{}{}{}", &result[..idx], replacement, &result[end..]);
            from = idx + replacement.len();
        }
    }

    result
}
