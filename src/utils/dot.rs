//! DOT format helpers for rendering IR graphs with Graphviz.

/// Escapes a string for safe use in a DOT record label.
///
/// Handles quotes, backslashes, newlines, braces, pipes and angle brackets, all of which
/// have special meaning in `shape=record` labels.
///
/// # Examples
///
/// ```rust,ignore
/// use hirforge::utils::escape_dot;
///
/// assert_eq!(escape_dot("v3 = phi[v1, v2] {B4}"), "v3 = phi[v1, v2] \\{B4\\}");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '<' | '>' | '{' | '}' | '|' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

/// Joins lines into a left-aligned DOT label body (`\l` line terminators).
#[must_use]
pub fn left_aligned<I, S>(lines: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for line in lines {
        out.push_str(&escape_dot(line.as_ref()));
        out.push_str("\\l");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_basic() {
        assert_eq!(escape_dot("v1 = 42"), "v1 = 42");
    }

    #[test]
    fn test_escape_dot_quotes_and_backslash() {
        assert_eq!(escape_dot("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_dot("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_escape_dot_record_characters() {
        assert_eq!(escape_dot("{a|b}"), "\\{a\\|b\\}");
        assert_eq!(escape_dot("List<T>"), "List\\<T\\>");
        assert_eq!(escape_dot("l1\r\nl2"), "l1\\nl2");
    }

    #[test]
    fn test_left_aligned() {
        assert_eq!(left_aligned(["B0:", "  goto B1"]), "B0:\\l  goto B1\\l");
    }
}
