//! Commit-message trailer injection, parsing, and stripping.
//!
//! Trailers are plain `Key: value` lines appended after a blank separator
//! from the subject/body, before any trailing `#`-comment region a version
//! control tool may have appended to a message-in-progress file.

/// Find the value of `key` in `message`'s trailer lines, if present.
pub fn parse_trailer(message: &str, key: &str) -> Option<String> {
    let prefix = format!("{key}: ");
    message
        .lines()
        .find_map(|line| line.strip_prefix(prefix.as_str()).map(str::trim).map(str::to_string))
}

/// Split `message` into the editable content and any trailing `#`-comment
/// region (the region a version-control tool appends explaining how to
/// finish or abort the commit).
fn split_comment_region(message: &str) -> (&str, &str) {
    match message.find("\n#") {
        Some(index) => (&message[..index], &message[index + 1..]),
        None => (message, ""),
    }
}

/// Insert `key: value` as a trailer line, immediately before any
/// `#`-comment region, preceded by a blank-line separator.
pub fn inject_trailer(message: &str, key: &str, value: &str) -> String {
    let (content, comments) = split_comment_region(message);
    let trimmed = content.trim_end_matches('\n');
    let mut result = String::new();
    result.push_str(trimmed);
    result.push_str("\n\n");
    result.push_str(key);
    result.push_str(": ");
    result.push_str(value);
    result.push('\n');
    if !comments.is_empty() {
        result.push('#');
        result.push_str(comments);
    }
    result
}

/// Remove any trailer line keyed `key` from `message`.
pub fn strip_trailer(message: &str, key: &str) -> String {
    let prefix = format!("{key}: ");
    message
        .lines()
        .filter(|line| !line.starts_with(prefix.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `true` if, once `#`-comments and the named trailer keys are removed,
/// `message` contains no non-whitespace content — i.e. the user never
/// typed anything beyond what the engine injected.
pub fn is_effectively_empty(message: &str, trailer_keys: &[&str]) -> bool {
    let (content, _) = split_comment_region(message);
    let mut remaining = content.to_string();
    for key in trailer_keys {
        remaining = strip_trailer(&remaining, key);
    }
    remaining.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inject_then_parse_round_trips() {
        let message = "fix: a\n";
        let injected = inject_trailer(message, "Checkpoint-Checkpoint", "0123456789ab");
        assert_eq!(parse_trailer(&injected, "Checkpoint-Checkpoint"), Some("0123456789ab".to_string()));
    }

    #[test]
    fn inject_preserves_trailing_comment_region() {
        let message = "fix: a\n# Please enter the commit message\n# lines starting with '#' will be ignored\n";
        let injected = inject_trailer(message, "Checkpoint-Checkpoint", "0123456789ab");
        assert!(injected.contains("Checkpoint-Checkpoint: 0123456789ab"));
        assert!(injected.contains("# Please enter the commit message"));
        assert!(injected.find("Checkpoint-Checkpoint").unwrap() < injected.find("# Please").unwrap());
    }

    #[test]
    fn injecting_twice_is_idempotent_after_strip() {
        let message = "fix: a\n";
        let once = inject_trailer(message, "Checkpoint-Checkpoint", "0123456789ab");
        let stripped = strip_trailer(&once, "Checkpoint-Checkpoint");
        let twice = inject_trailer(&stripped, "Checkpoint-Checkpoint", "0123456789ab");
        assert_eq!(once.trim_end(), twice.trim_end());
    }

    #[test]
    fn trailer_only_message_is_effectively_empty() {
        let message = "\n\nCheckpoint-Checkpoint: 0123456789ab\n# comment\n";
        assert!(is_effectively_empty(message, &["Checkpoint-Checkpoint"]));
    }

    #[test]
    fn message_with_user_content_is_not_empty() {
        let message = "fix: a\n\nCheckpoint-Checkpoint: 0123456789ab\n";
        assert!(!is_effectively_empty(message, &["Checkpoint-Checkpoint"]));
    }
}
