//! Delimiter-aware splitting of a single source line.

/// Marker that starts a comment line.
pub const COMMENT_MARKER: char = '#';

/// Tokens extracted from one line, each already trimmed.
///
/// Always holds at least two tokens and a non-empty first token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawLine<'a> {
    tokens: Vec<&'a str>,
}

/// Which rule split the line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Delimiter {
    Tab,
    Whitespace,
    Comma,
}

impl<'a> RawLine<'a> {
    pub fn word(&self) -> &'a str {
        self.tokens[0]
    }

    /// Code or weight, depending on the adapter.
    pub fn second(&self) -> &'a str {
        self.tokens[1]
    }

    /// Explicit weight column, if present.
    pub fn third(&self) -> Option<&'a str> {
        self.tokens.get(2).copied()
    }

    pub fn tokens(&self) -> &[&'a str] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Blank and comment lines carry no payload and are dropped without counting.
pub fn is_blank_or_comment(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with(COMMENT_MARKER)
}

/// Split a line on the first matching delimiter rule.
///
/// Order: tab, then whitespace (only when it yields two or more tokens), then
/// comma. Only the first rule that applies is used. Lines that end up with
/// fewer than two tokens or an empty first token yield `None`.
pub fn parse_line(line: &str) -> Option<RawLine<'_>> {
    parse_line_with_delimiter(line).map(|(raw, _)| raw)
}

/// Like [`parse_line`], also reporting which rule applied.
pub fn parse_line_with_delimiter(line: &str) -> Option<(RawLine<'_>, Delimiter)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(COMMENT_MARKER) {
        return None;
    }

    let (tokens, delimiter): (Vec<&str>, _) = if line.contains('\t') {
        (line.split('\t').map(str::trim).collect(), Delimiter::Tab)
    } else if line.split_whitespace().nth(1).is_some() {
        (line.split_whitespace().collect(), Delimiter::Whitespace)
    } else if line.contains(',') {
        (line.split(',').map(str::trim).collect(), Delimiter::Comma)
    } else {
        return None;
    };

    if tokens.len() < 2 || tokens[0].is_empty() {
        return None;
    }
    Some((RawLine { tokens }, delimiter))
}

/// Parse a weight column. Negative or non-numeric values are rejected.
pub fn parse_weight(token: &str) -> Option<u64> {
    token.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_split_takes_precedence() {
        let (raw, delim) = parse_line_with_delimiter("苹果\tpingguo\t120").unwrap();
        assert_eq!(delim, Delimiter::Tab);
        assert_eq!(raw.tokens(), &["苹果", "pingguo", "120"]);
        assert_eq!(raw.third().and_then(parse_weight), Some(120));
    }

    #[test]
    fn whitespace_split_without_tab() {
        let (raw, delim) = parse_line_with_delimiter("苹果 pingguo 120").unwrap();
        assert_eq!(delim, Delimiter::Whitespace);
        assert_eq!(raw.tokens(), &["苹果", "pingguo", "120"]);
    }

    #[test]
    fn comma_split_as_last_resort() {
        let (raw, delim) = parse_line_with_delimiter("苹果,pingguo,120").unwrap();
        assert_eq!(delim, Delimiter::Comma);
        assert_eq!(raw.tokens(), &["苹果", "pingguo", "120"]);
    }

    #[test]
    fn tab_fields_keep_inner_spaces_and_commas() {
        let raw = parse_line("ice cream\tbing qi lin, x\t7").unwrap();
        assert_eq!(raw.word(), "ice cream");
        assert_eq!(raw.second(), "bing qi lin, x");
    }

    #[test]
    fn whitespace_rule_wins_over_comma() {
        let raw = parse_line("a,b c").unwrap();
        assert_eq!(raw.tokens(), &["a,b", "c"]);
    }

    #[test]
    fn drops_blank_comment_and_single_token_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# 注释\tx\t1").is_none());
        assert!(parse_line("孤词").is_none());
        assert!(parse_line(",nihao").is_none());
    }

    #[test]
    fn weight_parsing_is_strict() {
        assert_eq!(parse_weight(" 42 "), Some(42));
        assert_eq!(parse_weight("-1"), None);
        assert_eq!(parse_weight("abc"), None);
    }
}
