use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use lexicon_formats::SECTION_SEPARATOR;
use lexicon_types::Entry;
use tempfile::NamedTempFile;

/// Sort policy marker written into every header.
pub const SORT_POLICY: &str = "by_weight";

/// Metadata for the four-line header block.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LexiconHeader {
    pub name: String,
    pub version: String,
}

impl LexiconHeader {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Order entries by weight, highest first.
///
/// The sort is stable: entries of equal weight keep their incoming order.
pub fn emit(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(|a, b| b.weight.cmp(&a.weight));
    entries
}

/// Serialize the header and one `word<TAB>code<TAB>weight` line per entry.
pub fn write_lexicon<W: Write>(
    writer: &mut W,
    header: &LexiconHeader,
    entries: &[Entry],
) -> io::Result<()> {
    writeln!(writer, "name: {}", header.name)?;
    writeln!(writer, "version: \"{}\"", header.version)?;
    writeln!(writer, "sort: {SORT_POLICY}")?;
    writeln!(writer, "{SECTION_SEPARATOR}")?;
    writeln!(writer)?;
    for entry in entries {
        writeln!(writer, "{entry}")?;
    }
    Ok(())
}

/// Write the lexicon to `path` atomically.
///
/// Records go to a temporary file next to `path` that replaces it only once
/// everything has been flushed, so a failed or interrupted write leaves no
/// partial lexicon behind. Returns the size in bytes.
pub fn write_lexicon_file(
    path: &Path,
    header: &LexiconHeader,
    entries: &[Entry],
) -> io::Result<u64> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let temp = NamedTempFile::new_in(dir)?;
    let mut writer = BufWriter::new(temp);
    write_lexicon(&mut writer, header, entries)?;
    let temp = writer.into_inner().map_err(|e| e.into_error())?;
    temp.as_file().sync_all()?;
    let file = temp.persist(path).map_err(|e| e.error)?;
    Ok(file.metadata()?.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_by_weight_descending_and_stable() {
        let entries = vec![
            Entry::new("甲", "jia", 50),
            Entry::new("乙", "yi", 80),
            Entry::new("丙", "bing", 50),
        ];
        let sorted = emit(entries);
        let words: Vec<&str> = sorted.iter().map(|e| e.word.as_str()).collect();
        assert_eq!(words, vec!["乙", "甲", "丙"]);
    }

    #[test]
    fn writes_header_then_records() {
        let mut out = Vec::new();
        let header = LexiconHeader::new("merged_lexicon", "1.0");
        write_lexicon(&mut out, &header, &[Entry::new("你好", "nihao", 80)]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "name: merged_lexicon\nversion: \"1.0\"\nsort: by_weight\n...\n\n你好\tnihao\t80\n"
        );
    }

    #[test]
    fn file_write_replaces_existing_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("lexicon.yaml");
        let header = LexiconHeader::new("t", "1.0");

        write_lexicon_file(&path, &header, &[Entry::new("a", "a", 1)]).unwrap();
        let size = write_lexicon_file(&path, &header, &[Entry::new("b", "b", 2)]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(size, text.len() as u64);
        assert!(text.ends_with("b\tb\t2\n"));
        assert!(!text.contains("a\ta\t1"));
        let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
