use std::collections::HashMap;

use lexicon_translit::{Cached, Transliterate};
use lexicon_types::{Entry, EntrySink, MergeKey, SourceEntry};
use tracing::debug;

/// Deduplicated mapping from [`MergeKey`] to the highest weight seen for it.
///
/// Keys remember their first insertion position so that later sorting can be
/// stable. Equality ignores that order: two lexicons are equal when they map
/// the same keys to the same weights.
#[derive(Debug, Clone, Default)]
pub struct MergedLexicon {
    slots: Vec<Slot>,
    index: HashMap<MergeKey, usize>,
    observed: usize,
    rejected: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    key: MergeKey,
    weight: u64,
}

/// Fold `entries` into a fresh lexicon.
pub fn merge<I>(entries: I) -> MergedLexicon
where
    I: IntoIterator<Item = SourceEntry>,
{
    let mut lexicon = MergedLexicon::new();
    for entry in entries {
        lexicon.insert(entry);
    }
    lexicon
}

impl MergedLexicon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one entry under the max-weight rule.
    ///
    /// Returns `false` when the entry is rejected for an empty word or code.
    pub fn insert(&mut self, entry: SourceEntry) -> bool {
        self.observed += 1;
        let admissible = match &entry {
            SourceEntry::Coded(e) => e.is_admissible(),
            SourceEntry::Bare(e) => !e.word.is_empty(),
        };
        if !admissible {
            self.rejected += 1;
            return false;
        }

        let weight = entry.weight();
        let key = entry.merge_key();
        match self.index.get(&key) {
            Some(&slot) => {
                let existing = &mut self.slots[slot].weight;
                *existing = (*existing).max(weight);
            }
            None => {
                self.index.insert(key.clone(), self.slots.len());
                self.slots.push(Slot { key, weight });
            }
        }
        true
    }

    pub fn get(&self, key: &MergeKey) -> Option<u64> {
        self.index.get(key).map(|&slot| self.slots[slot].weight)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries offered, admitted or not.
    pub fn observed(&self) -> usize {
        self.observed
    }

    /// Entries refused for an empty word or code.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Keys whose code still has to be derived.
    pub fn bare_words(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.key, MergeKey::Word(_)))
            .count()
    }

    /// Keys and weights in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&MergeKey, u64)> + '_ {
        self.slots.iter().map(|s| (&s.key, s.weight))
    }

    /// Turn every key into a full entry, deriving codes for bare words.
    ///
    /// Each bare word is looked up once through `translit`; words with no
    /// derivable code are dropped and counted. A bare word whose derived code
    /// equals an explicit `(word, code)` key lands on that same entry under
    /// the max-weight rule; otherwise the two stay separate.
    pub fn resolve<T: Transliterate>(self, translit: &mut Cached<T>) -> Resolved {
        let mut entries: Vec<Entry> = Vec::with_capacity(self.slots.len());
        let mut positions: HashMap<(String, String), usize> = HashMap::new();
        let mut untransliterable = 0usize;
        let mut folded = 0usize;

        for Slot { key, weight } in self.slots {
            let (word, code) = match key {
                MergeKey::WordCode { word, code } => (word, code),
                MergeKey::Word(word) => match translit.code_for(&word) {
                    Some(code) => {
                        let code = code.to_string();
                        (word, code)
                    }
                    None => {
                        untransliterable += 1;
                        continue;
                    }
                },
            };

            match positions.get(&(word.clone(), code.clone())) {
                Some(&pos) => {
                    debug!("folding {word} ({code}) into existing entry");
                    folded += 1;
                    let existing = &mut entries[pos].weight;
                    *existing = (*existing).max(weight);
                }
                None => {
                    positions.insert((word.clone(), code.clone()), entries.len());
                    entries.push(Entry { word, code, weight });
                }
            }
        }

        Resolved {
            entries,
            untransliterable,
            folded,
        }
    }
}

impl PartialEq for MergedLexicon {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, weight)| other.get(key) == Some(weight))
    }
}

impl Eq for MergedLexicon {}

impl EntrySink for MergedLexicon {
    fn accept(&mut self, entry: SourceEntry) {
        self.insert(entry);
    }
}

impl FromIterator<SourceEntry> for MergedLexicon {
    fn from_iter<I: IntoIterator<Item = SourceEntry>>(iter: I) -> Self {
        merge(iter)
    }
}

/// Output of [`MergedLexicon::resolve`], still in first-insertion order.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub entries: Vec<Entry>,
    /// Bare words dropped because no code could be derived.
    pub untransliterable: usize,
    /// Bare words whose derived code matched an explicit key.
    pub folded: usize,
}
