//! Shared types that describe one lexicon record on its way from a source file
//! to the canonical output.
//!
//! Sources come in two flavours: some already carry a phonetic code for each
//! word ([`Entry`]), others only carry a bare word and a frequency
//! ([`BareEntry`]) and get their code synthesized later. [`SourceEntry`] wraps
//! both so a single [`EntrySink`] can accept everything an adapter produces,
//! and [`MergeKey`] captures the identity each flavour is deduplicated on.
//!
//! ```rust
//! use lexicon_types::{Entry, MergeKey, SourceEntry};
//!
//! let entry = SourceEntry::Coded(Entry::new("你好", "nihao", 80));
//! assert_eq!(
//!     entry.merge_key(),
//!     MergeKey::WordCode { word: "你好".into(), code: "nihao".into() }
//! );
//! assert_eq!(entry.weight(), 80);
//! ```

use std::fmt;

/// Canonical `(word, code, weight)` record.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Entry {
    pub word: String,
    pub code: String,
    pub weight: u64,
}

impl Entry {
    pub fn new(word: impl Into<String>, code: impl Into<String>, weight: u64) -> Self {
        Self {
            word: word.into(),
            code: code.into(),
            weight,
        }
    }

    /// Both the surface form and the code are non-empty.
    pub fn is_admissible(&self) -> bool {
        !self.word.is_empty() && !self.code.is_empty()
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.word, self.code, self.weight)
    }
}

/// A word with a frequency but no phonetic code yet.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct BareEntry {
    pub word: String,
    pub weight: u64,
}

impl BareEntry {
    pub fn new(word: impl Into<String>, weight: u64) -> Self {
        Self {
            word: word.into(),
            weight,
        }
    }
}

/// Anything a format adapter can yield.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum SourceEntry {
    /// The source supplied the phonetic code.
    Coded(Entry),
    /// Only the word is known; the code is derived after merging.
    Bare(BareEntry),
}

impl SourceEntry {
    pub fn word(&self) -> &str {
        match self {
            SourceEntry::Coded(e) => &e.word,
            SourceEntry::Bare(e) => &e.word,
        }
    }

    pub fn weight(&self) -> u64 {
        match self {
            SourceEntry::Coded(e) => e.weight,
            SourceEntry::Bare(e) => e.weight,
        }
    }

    /// Identity used for deduplication.
    pub fn merge_key(&self) -> MergeKey {
        match self {
            SourceEntry::Coded(e) => MergeKey::WordCode {
                word: e.word.clone(),
                code: e.code.clone(),
            },
            SourceEntry::Bare(e) => MergeKey::Word(e.word.clone()),
        }
    }
}

impl From<Entry> for SourceEntry {
    fn from(entry: Entry) -> Self {
        SourceEntry::Coded(entry)
    }
}

impl From<BareEntry> for SourceEntry {
    fn from(entry: BareEntry) -> Self {
        SourceEntry::Bare(entry)
    }
}

/// Deduplication identity.
///
/// Keys of different variants never compare equal, even for the same word:
/// a coded `("你好", "nihao")` and a bare `"你好"` are distinct keys.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum MergeKey {
    WordCode { word: String, code: String },
    Word(String),
}

impl MergeKey {
    pub fn word(&self) -> &str {
        match self {
            MergeKey::WordCode { word, .. } => word,
            MergeKey::Word(word) => word,
        }
    }

    /// The code carried by the key, if it has one.
    pub fn code(&self) -> Option<&str> {
        match self {
            MergeKey::WordCode { code, .. } => Some(code),
            MergeKey::Word(_) => None,
        }
    }
}

impl fmt::Display for MergeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeKey::WordCode { word, code } => write!(f, "({word}, {code})"),
            MergeKey::Word(word) => f.write_str(word),
        }
    }
}

/// Consumer of adapter output.
///
/// Adapters push entries as they parse so nothing is buffered per source.
pub trait EntrySink {
    fn accept(&mut self, entry: SourceEntry);
}

impl EntrySink for Vec<SourceEntry> {
    fn accept(&mut self, entry: SourceEntry) {
        self.push(entry);
    }
}

impl<S: EntrySink + ?Sized> EntrySink for &mut S {
    fn accept(&mut self, entry: SourceEntry) {
        (**self).accept(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_and_bare_keys_differ_for_same_word() {
        let coded = SourceEntry::Coded(Entry::new("你好", "nihao", 1));
        let bare = SourceEntry::Bare(BareEntry::new("你好", 1));
        assert_ne!(coded.merge_key(), bare.merge_key());
        assert_eq!(coded.merge_key().word(), bare.merge_key().word());
        assert_eq!(bare.merge_key().code(), None);
    }

    #[test]
    fn admissibility_requires_word_and_code() {
        assert!(Entry::new("词", "ci", 0).is_admissible());
        assert!(!Entry::new("", "ci", 0).is_admissible());
        assert!(!Entry::new("词", "", 0).is_admissible());
    }

    #[test]
    fn display_is_tab_separated() {
        assert_eq!(Entry::new("苹果", "pingguo", 120).to_string(), "苹果\tpingguo\t120");
    }
}
