//! Parser for the trigger-related flags of a `try:` directive.
//!
//! This module provides a pure parser that extracts a [`TryRequest`] from
//! unstructured submission message text.

use super::types::TryRequest;

/// Marker that introduces the directive arguments.
const DIRECTIVE: &str = "try: ";

/// Parses the first `try:` directive found in a submission message.
///
/// # Arguments
///
/// * `text` - The full submission message
/// * `limit` - Ceiling applied to each requested rebuild count
///
/// # Parsing Rules
///
/// - Only the first line containing `try: ` is considered
/// - Bracketed filter expressions (`-u mochitest[Windows 7,Linux]`) are single tokens,
///   even when they contain spaces
/// - Flags the bot doesn't recognize are skipped, as are their arguments
/// - A count that is missing or not a non-negative integer leaves the field at zero
/// - When a flag is repeated, the last occurrence wins
/// - Returns [`TryRequest::DEFAULT`] if there is no directive
///
/// # Examples
///
/// ```
/// use trigger_bot::try_syntax::parse_try_syntax;
///
/// let req = parse_try_syntax("try: -b do -p all -u all -t none --rebuild 50", 20);
/// assert_eq!(req.rebuild, 20);
///
/// let req = parse_try_syntax("try: -b o -p linux -u all --no-retry", 20);
/// assert!(!req.retry);
/// ```
pub fn parse_try_syntax(text: &str, limit: u32) -> TryRequest {
    let Some(args) = find_directive(text) else {
        return TryRequest::DEFAULT;
    };

    let tokens = tokenize(args);
    let mut request = TryRequest::DEFAULT;
    let mut pos = 0;

    while pos < tokens.len() {
        let token = tokens[pos];
        pos += 1;

        let (flag, inline_value) = split_flag(token);
        match flag {
            "--rebuild" => {
                if let Some(n) = take_count(inline_value, &tokens, &mut pos) {
                    request.rebuild = n.min(limit);
                }
            }
            "--rebuild-talos" => {
                if let Some(n) = take_count(inline_value, &tokens, &mut pos) {
                    request.rebuild_talos = n.min(limit);
                }
            }
            "--no-retry" => request.retry = false,
            _ => {}
        }
    }

    request
}

/// Returns the argument text following the first `try: ` marker.
fn find_directive(text: &str) -> Option<&str> {
    text.lines()
        .find_map(|line| line.split_once(DIRECTIVE))
        .map(|(_, rest)| rest.trim())
}

/// Splits `--flag=value` into its parts. Other tokens are returned whole.
fn split_flag(token: &str) -> (&str, Option<&str>) {
    if token.starts_with("--") {
        if let Some((flag, value)) = token.split_once('=') {
            return (flag, Some(value));
        }
    }
    (token, None)
}

/// Reads a count either from an inline `=value` or from the next token.
///
/// The next token is only consumed if it parses as a count.
fn take_count(inline_value: Option<&str>, tokens: &[&str], pos: &mut usize) -> Option<u32> {
    if let Some(value) = inline_value {
        return value.parse().ok();
    }

    let value = tokens.get(*pos)?.parse().ok()?;
    *pos += 1;
    Some(value)
}

/// Splits directive arguments on whitespace, keeping `[...]` groups intact.
///
/// An opening bracket without a matching close bracket is an ordinary character.
fn tokenize(args: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut chars = args.char_indices();

    while let Some((idx, c)) = chars.next() {
        if c == '[' {
            if let Some(offset) = args[idx..].find(']') {
                start.get_or_insert(idx);
                let close = idx + offset;
                for (i, _) in chars.by_ref() {
                    if i == close {
                        break;
                    }
                }
                continue;
            }
        }

        if c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(&args[s..idx]);
            }
        } else {
            start.get_or_insert(idx);
        }
    }

    if let Some(s) = start {
        tokens.push(&args[s..]);
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LIMIT: u32 = 20;

    // ==================== Directive detection ====================

    #[test]
    fn no_directive_is_default() {
        assert_eq!(parse_try_syntax("", LIMIT), TryRequest::DEFAULT);
        assert_eq!(
            parse_try_syntax("Bug 123 - Fix the frobnicator r=me", LIMIT),
            TryRequest::DEFAULT
        );
        // Needs the space after the colon
        assert_eq!(
            parse_try_syntax("try:--rebuild 5", LIMIT),
            TryRequest::DEFAULT
        );
    }

    #[test]
    fn directive_on_later_line() {
        let msg = "Bug 1 - Thing\n\nMore words.\ntry: -b o -p linux -u all -t none --rebuild 3";
        assert_eq!(parse_try_syntax(msg, LIMIT).rebuild, 3);
    }

    #[test]
    fn first_directive_wins() {
        let msg = "try: -b o --rebuild 2\ntry: -b o --rebuild 7";
        assert_eq!(parse_try_syntax(msg, LIMIT).rebuild, 2);
    }

    #[test]
    fn directive_without_trigger_flags() {
        let req = parse_try_syntax("try: -b o -p linux -u xpcshell -t none", LIMIT);
        assert_eq!(req, TryRequest::DEFAULT);
    }

    // ==================== Flags ====================

    #[test]
    fn rebuild_forms() {
        assert_eq!(parse_try_syntax("try: --rebuild 5", LIMIT).rebuild, 5);
        assert_eq!(parse_try_syntax("try: --rebuild=5", LIMIT).rebuild, 5);
        assert_eq!(parse_try_syntax("try: --rebuild 0", LIMIT).rebuild, 0);
    }

    #[test]
    fn rebuild_talos_is_separate() {
        let req = parse_try_syntax("try: -b o -t all --rebuild-talos 4", LIMIT);
        assert_eq!(req.rebuild, 0);
        assert_eq!(req.rebuild_talos, 4);

        let req = parse_try_syntax("try: --rebuild 2 --rebuild-talos=6", LIMIT);
        assert_eq!(req.rebuild, 2);
        assert_eq!(req.rebuild_talos, 6);
    }

    #[test]
    fn no_retry_opt_out() {
        let req = parse_try_syntax("try: -b o -p all -u all --no-retry", LIMIT);
        assert!(!req.retry);
        assert_eq!(req.rebuild, 0);
    }

    #[test]
    fn counts_are_clamped() {
        assert_eq!(parse_try_syntax("try: --rebuild 21", LIMIT).rebuild, 20);
        assert_eq!(parse_try_syntax("try: --rebuild 1000", LIMIT).rebuild, 20);
        assert_eq!(
            parse_try_syntax("try: --rebuild-talos 99", LIMIT).rebuild_talos,
            20
        );
        assert_eq!(parse_try_syntax("try: --rebuild 20", LIMIT).rebuild, 20);
    }

    #[test]
    fn invalid_counts_are_ignored() {
        assert_eq!(parse_try_syntax("try: --rebuild", LIMIT).rebuild, 0);
        assert_eq!(parse_try_syntax("try: --rebuild lots", LIMIT).rebuild, 0);
        assert_eq!(parse_try_syntax("try: --rebuild -3", LIMIT).rebuild, 0);
        assert_eq!(parse_try_syntax("try: --rebuild=", LIMIT).rebuild, 0);
    }

    #[test]
    fn missing_count_does_not_swallow_next_flag() {
        let req = parse_try_syntax("try: --rebuild --no-retry", LIMIT);
        assert_eq!(req.rebuild, 0);
        assert!(!req.retry);
    }

    #[test]
    fn last_occurrence_wins() {
        assert_eq!(
            parse_try_syntax("try: --rebuild 2 --rebuild 4", LIMIT).rebuild,
            4
        );
    }

    #[test]
    fn unknown_flags_are_skipped() {
        let req = parse_try_syntax(
            "try: -b o -p linux --artifact --tag foo --setenv A=B --rebuild 3",
            LIMIT,
        );
        assert_eq!(req.rebuild, 3);
        assert!(req.retry);
    }

    #[test]
    fn similar_flag_names_do_not_match() {
        let req = parse_try_syntax("try: --rebuilds 3 --no-retrying", LIMIT);
        assert_eq!(req, TryRequest::DEFAULT);
    }

    // ==================== Bracketed filters ====================

    #[test]
    fn brackets_with_spaces_are_one_token() {
        assert_eq!(
            tokenize("-u mochitest-1[Windows 7,Linux x64] --rebuild 2"),
            vec!["-u", "mochitest-1[Windows 7,Linux x64]", "--rebuild", "2"]
        );
        let req = parse_try_syntax(
            "try: -b o -p win32 -u mochitest-1[Windows 7, Windows XP] --rebuild 2",
            LIMIT,
        );
        assert_eq!(req.rebuild, 2);
    }

    #[test]
    fn bracket_filter_does_not_hide_flags() {
        // A flag inside brackets is part of the filter, not a flag
        let req = parse_try_syntax("try: -u all[x --no-retry y] --rebuild 1", LIMIT);
        assert!(req.retry);
        assert_eq!(req.rebuild, 1);
    }

    #[test]
    fn unmatched_bracket_is_ordinary() {
        assert_eq!(tokenize("-u foo[bar baz"), vec!["-u", "foo[bar", "baz"]);
    }

    #[test]
    fn tokenize_edge_cases() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t ").is_empty());
        assert_eq!(tokenize("  a  b "), vec!["a", "b"]);
        assert_eq!(tokenize("[a b][c d]e"), vec!["[a b][c d]e"]);
    }

    // ==================== Robustness ====================

    proptest! {
        #[test]
        fn arbitrary_text_never_panics(text: String) {
            let _ = parse_try_syntax(&text, LIMIT);
        }

        #[test]
        fn arbitrary_args_never_panic(args: String) {
            let _ = parse_try_syntax(&format!("try: {}", args), LIMIT);
        }

        #[test]
        fn requested_counts_never_exceed_limit(n in 0u32..=u32::MAX, limit in 0u32..100) {
            let req = parse_try_syntax(&format!("try: --rebuild {} --rebuild-talos {}", n, n), limit);
            prop_assert_eq!(req.rebuild, n.min(limit));
            prop_assert_eq!(req.rebuild_talos, n.min(limit));
        }

        #[test]
        fn tokens_never_contain_outer_whitespace(args in "[a-z\\[\\] -]{0,40}") {
            for token in tokenize(&args) {
                prop_assert!(!token.is_empty());
                prop_assert!(!token.starts_with(' '));
                prop_assert!(!token.ends_with(' '));
            }
        }
    }
}
