//! Source-specific framing on top of [`parse_line`](crate::line::parse_line).

use std::fmt;

use lexicon_types::{BareEntry, Entry, EntrySink, SourceEntry};

use crate::line::{
    COMMENT_MARKER, Delimiter, RawLine, is_blank_or_comment, parse_line, parse_line_with_delimiter,
    parse_weight,
};

/// Literal line that ends the header of an annotated file.
pub const SECTION_SEPARATOR: &str = "...";

const IMPORT_DIRECTIVE: &str = "import_tables:";
const NAME_KEY: &str = "name:";

/// Produce entries from the text of one resource.
pub trait FormatAdapter {
    fn read(&self, text: &str, sink: &mut dyn EntrySink) -> SourceReport;
}

/// Closed set of supported layouts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SourceFormat {
    /// Header, `...` separator, then `word<TAB>code[<TAB>weight]` payload.
    Annotated,
    /// `word<TAB>frequency` lines with no header.
    FrequencyList,
    /// Anything else found on disk: unknown delimiter, optional code.
    Heterogeneous,
}

impl SourceFormat {
    /// Pick an adapter from the content. Annotated needs a `name:` header key
    /// above the separator line; a stray `...` in a word-list does not count.
    pub fn detect(text: &str) -> Self {
        let mut named = false;
        for line in text.lines() {
            let line = line.trim();
            if line == SECTION_SEPARATOR {
                if named {
                    return SourceFormat::Annotated;
                }
                break;
            }
            named |= line.starts_with(NAME_KEY);
        }
        SourceFormat::Heterogeneous
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "annotated" => Some(SourceFormat::Annotated),
            "frequency" | "frequency-list" => Some(SourceFormat::FrequencyList),
            "heterogeneous" | "local" => Some(SourceFormat::Heterogeneous),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceFormat::Annotated => "annotated",
            SourceFormat::FrequencyList => "frequency-list",
            SourceFormat::Heterogeneous => "heterogeneous",
        })
    }
}

impl FormatAdapter for SourceFormat {
    fn read(&self, text: &str, sink: &mut dyn EntrySink) -> SourceReport {
        match self {
            SourceFormat::Annotated => Annotated.read(text, sink),
            SourceFormat::FrequencyList => FrequencyList.read(text, sink),
            SourceFormat::Heterogeneous => Heterogeneous.read(text, sink),
        }
    }
}

/// Per-resource counters.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceReport {
    pub format: SourceFormat,
    /// Entries handed to the sink.
    pub accepted: usize,
    /// Payload lines rejected as malformed.
    pub skipped: usize,
    /// Lines ignored because they precede the separator.
    pub header_lines: usize,
    /// Whether an annotated file reached its payload section.
    pub separator_found: bool,
    /// Tables named by an `import_tables:` header directive; never followed.
    pub imports: Vec<String>,
}

impl SourceReport {
    fn new(format: SourceFormat) -> Self {
        Self {
            format,
            accepted: 0,
            skipped: 0,
            header_lines: 0,
            separator_found: false,
            imports: Vec::new(),
        }
    }

    /// True when the header declared imports, whether or not names were found.
    pub fn has_import_directive(&self) -> bool {
        !self.imports.is_empty()
    }

    fn emit(&mut self, sink: &mut dyn EntrySink, entry: SourceEntry) {
        self.accepted += 1;
        sink.accept(entry);
    }
}

/// Two-section dictionary: everything up to the `...` line is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct Annotated;

impl FormatAdapter for Annotated {
    fn read(&self, text: &str, sink: &mut dyn EntrySink) -> SourceReport {
        let mut report = SourceReport::new(SourceFormat::Annotated);
        let mut header = Vec::new();

        for line in text.lines() {
            if !report.separator_found {
                if line.trim() == SECTION_SEPARATOR {
                    report.separator_found = true;
                } else {
                    report.header_lines += 1;
                    header.push(line);
                }
                continue;
            }

            if is_blank_or_comment(line) {
                continue;
            }
            let Some(raw) = parse_line(line) else {
                report.skipped += 1;
                continue;
            };
            let code = raw.second();
            let weight = match raw.third() {
                None => Some(0),
                Some(token) => parse_weight(token),
            };
            match weight {
                Some(weight) if !code.is_empty() => {
                    report.emit(sink, Entry::new(raw.word(), code, weight).into());
                }
                _ => report.skipped += 1,
            }
        }

        report.imports = import_tables(&header);
        report
    }
}

/// Flat `word<TAB>frequency` list. A non-numeric frequency rejects the line.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrequencyList;

impl FormatAdapter for FrequencyList {
    fn read(&self, text: &str, sink: &mut dyn EntrySink) -> SourceReport {
        let mut report = SourceReport::new(SourceFormat::FrequencyList);
        for line in text.lines() {
            if is_blank_or_comment(line) {
                continue;
            }
            match parse_line(line).and_then(|raw| Some((raw.word(), parse_weight(raw.second())?))) {
                Some((word, freq)) => report.emit(sink, BareEntry::new(word, freq).into()),
                None => report.skipped += 1,
            }
        }
        report
    }
}

/// Lenient reader for local files of unknown shape.
///
/// A numeric second column is a weight for a bare word. A romanized second
/// column is kept as the code only for a non-ASCII word, and only when the
/// line is `word<TAB>code` or exactly `word code weight` with a valid weight.
/// Anything else becomes a bare word weighted by its first numeric column.
#[derive(Clone, Copy, Debug, Default)]
pub struct Heterogeneous;

impl FormatAdapter for Heterogeneous {
    fn read(&self, text: &str, sink: &mut dyn EntrySink) -> SourceReport {
        let mut report = SourceReport::new(SourceFormat::Heterogeneous);
        for line in text.lines() {
            if is_blank_or_comment(line) {
                continue;
            }
            let Some((raw, delimiter)) = parse_line_with_delimiter(line) else {
                report.skipped += 1;
                continue;
            };
            let word = raw.word();
            let entry = match explicit_code(&raw, delimiter) {
                Some((code, weight)) => Entry::new(word, code, weight).into(),
                None => {
                    let weight = raw.tokens()[1..]
                        .iter()
                        .find_map(|token| parse_weight(token))
                        .unwrap_or(0);
                    BareEntry::new(word, weight).into()
                }
            };
            report.emit(sink, entry);
        }
        report
    }
}

fn explicit_code<'a>(raw: &RawLine<'a>, delimiter: Delimiter) -> Option<(&'a str, u64)> {
    let code = raw.second();
    if raw.word().is_ascii() || !looks_like_code(code) {
        return None;
    }
    match raw.len() {
        2 if delimiter == Delimiter::Tab => Some((code, 0)),
        3 => raw.third().and_then(parse_weight).map(|weight| (code, weight)),
        _ => None,
    }
}

fn looks_like_code(token: &str) -> bool {
    !token.is_empty()
        && token.chars().any(|c| c.is_ascii_alphabetic())
        && token
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '\'')
}

// Only the narrow `import_tables:` shape is recognised: an inline `[a, b]`
// list or indented `- name` items on the following lines.
fn import_tables(header: &[&str]) -> Vec<String> {
    let mut names = Vec::new();
    let mut lines = header.iter().map(|l| l.trim_end());
    while let Some(line) = lines.next() {
        let Some(rest) = line.trim_start().strip_prefix(IMPORT_DIRECTIVE) else {
            continue;
        };
        let rest = rest.trim();
        if let Some(list) = rest.strip_prefix('[') {
            names.extend(
                list.trim_end_matches(']')
                    .split(',')
                    .map(|n| n.trim().trim_matches('"').to_string())
                    .filter(|n| !n.is_empty()),
            );
            continue;
        }
        for item in lines.by_ref() {
            let Some(name) = item.trim_start().strip_prefix('-') else {
                break;
            };
            let name = name
                .split(COMMENT_MARKER)
                .next()
                .unwrap_or_default()
                .trim()
                .trim_matches('"');
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
        if names.is_empty() {
            names.push(String::from("<unnamed>"));
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(adapter: impl FormatAdapter, text: &str) -> (Vec<SourceEntry>, SourceReport) {
        let mut out = Vec::new();
        let report = adapter.read(text, &mut out);
        (out, report)
    }

    #[test]
    fn annotated_ignores_header_lines_that_look_like_payload() {
        let text = "---\nname: demo\n假\tjia\t999\n...\n你好\tnihao\t50\n世界\tshijie\n";
        let (entries, report) = read(Annotated, text);
        assert_eq!(
            entries,
            vec![
                Entry::new("你好", "nihao", 50).into(),
                Entry::new("世界", "shijie", 0).into(),
            ]
        );
        assert!(report.separator_found);
        assert_eq!(report.header_lines, 3);
    }

    #[test]
    fn annotated_without_separator_yields_nothing() {
        let (entries, report) = read(Annotated, "你好\tnihao\t50\n");
        assert!(entries.is_empty());
        assert!(!report.separator_found);
    }

    #[test]
    fn annotated_rejects_bad_weight() {
        let (entries, report) = read(Annotated, "...\n你好\tnihao\tmany\n好\thao\t3\n");
        assert_eq!(entries, vec![Entry::new("好", "hao", 3).into()]);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn annotated_reports_import_tables() {
        let text = "name: rime_ice\nimport_tables:\n  - cn_dicts/8105 # chars\n  - cn_dicts/base\nsort: by_weight\n...\n";
        let (_, report) = read(Annotated, text);
        assert_eq!(report.imports, vec!["cn_dicts/8105", "cn_dicts/base"]);

        let (_, report) = read(Annotated, "import_tables: [a, \"b\"]\n...\n");
        assert_eq!(report.imports, vec!["a", "b"]);
    }

    #[test]
    fn frequency_list_rejects_non_numeric_frequency() {
        let (entries, report) = read(FrequencyList, "词汇\tabc\n词语\t12\n");
        assert_eq!(entries, vec![BareEntry::new("词语", 12).into()]);
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn heterogeneous_is_lenient() {
        let text = "# comment\n苹果,12\n香蕉 xiangjiao 5\n梨\tli\n杏\txing\tx\n桃 ？\n";
        let (entries, report) = read(Heterogeneous, text);
        assert_eq!(
            entries,
            vec![
                BareEntry::new("苹果", 12).into(),
                Entry::new("香蕉", "xiangjiao", 5).into(),
                Entry::new("梨", "li", 0).into(),
                BareEntry::new("杏", 0).into(),
                BareEntry::new("桃", 0).into(),
            ]
        );
        assert_eq!(report.skipped, 0);
    }

    #[test]
    fn heterogeneous_never_truncates_a_spaced_code() {
        let (entries, _) = read(Heterogeneous, "你好 ni hao 5\napple pie\n世界 shi 2 jie\n");
        assert_eq!(
            entries,
            vec![
                BareEntry::new("你好", 5).into(),
                BareEntry::new("apple", 0).into(),
                BareEntry::new("世界", 2).into(),
            ]
        );
    }

    #[test]
    fn detection_uses_separator_line() {
        assert_eq!(SourceFormat::detect("---\nname: a\n...\nx\ty\n"), SourceFormat::Annotated);
        assert_eq!(SourceFormat::detect("x\t1\n"), SourceFormat::Heterogeneous);
        assert_eq!(SourceFormat::detect("x ... y\n"), SourceFormat::Heterogeneous);
    }

    #[test]
    fn word_list_with_stray_separator_stays_heterogeneous() {
        let text = "苹果\t12\n...\n香蕉\t5\n";
        assert_eq!(SourceFormat::detect(text), SourceFormat::Heterogeneous);
        let (entries, _) = read(SourceFormat::detect(text), text);
        assert_eq!(
            entries,
            vec![BareEntry::new("苹果", 12).into(), BareEntry::new("香蕉", 5).into()]
        );
    }
}
