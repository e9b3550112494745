//! Derive a phonetic input code for a word that arrived without one.
//!
//! The fallback is deliberately narrow: produce a lower-cased, tone-free key,
//! or report that none can be derived so the caller can count the word as
//! skipped. Any callable `Fn(&str) -> Option<String>` can act as a
//! [`Transliterate`] implementation; [`Pinyin`] is the stock one for Chinese.
//!
//! # How it works
//! 1. Han characters map to their most common reading, without tone marks.
//! 2. Runs of ASCII letters and digits are kept, lower-cased.
//! 3. Everything else (punctuation, symbols, other scripts) is dropped.
//! 4. An empty result means "unconvertible".
//!
//! [`Cached`] memoizes results so repeated words never hit the converter twice.
//!
//! # Example
//! ```
//! use lexicon_translit::{Cached, Pinyin, Transliterate};
//!
//! assert_eq!(Pinyin::new().transliterate("你好").as_deref(), Some("nihao"));
//! assert_eq!(Pinyin::new().transliterate("——"), None);
//!
//! let mut cached = Cached::new(Pinyin::with_separator(" "));
//! assert_eq!(cached.code_for("中国"), Some("zhong guo"));
//! assert_eq!(cached.code_for("中国"), Some("zhong guo"));
//! assert_eq!(cached.invocations(), 1);
//! ```
//!
//! For a runnable demo, see `cargo run -p lexicon-translit --example convert -- <word>...`.

use std::collections::HashMap;

use pinyin::ToPinyin;

/// Map a word to a phonetic code, or `None` when it has no transliterable part.
pub trait Transliterate {
    fn transliterate(&self, word: &str) -> Option<String>;
}

impl<F> Transliterate for F
where
    F: Fn(&str) -> Option<String>,
{
    fn transliterate(&self, word: &str) -> Option<String> {
        self(word)
    }
}

/// Toneless Mandarin pinyin.
#[derive(Clone, Debug, Default)]
pub struct Pinyin {
    separator: String,
}

impl Pinyin {
    /// Syllables joined with no separator (`你好` -> `nihao`).
    pub fn new() -> Self {
        Self::default()
    }

    /// Syllables joined with `separator` (`你好` -> `ni hao` for `" "`).
    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    fn syllables(word: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut ascii_run = String::new();
        for ch in word.chars() {
            if ch.is_ascii_alphanumeric() {
                ascii_run.push(ch.to_ascii_lowercase());
                continue;
            }
            if !ascii_run.is_empty() {
                out.push(std::mem::take(&mut ascii_run));
            }
            if let Some(py) = ch.to_pinyin() {
                out.push(normalize_syllable(py.plain()));
            }
        }
        if !ascii_run.is_empty() {
            out.push(ascii_run);
        }
        out
    }
}

impl Transliterate for Pinyin {
    fn transliterate(&self, word: &str) -> Option<String> {
        let syllables = Self::syllables(word);
        if syllables.is_empty() {
            return None;
        }
        Some(syllables.join(&self.separator))
    }
}

// `ü` is typed as `v` on pinyin keyboards.
fn normalize_syllable(plain: &str) -> String {
    plain.to_lowercase().replace('ü', "v")
}

/// Memoizing wrapper: each distinct word is converted at most once.
pub struct Cached<T> {
    inner: T,
    memo: HashMap<String, Option<String>>,
    invocations: usize,
}

impl<T: Transliterate> Cached<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            memo: HashMap::new(),
            invocations: 0,
        }
    }

    /// Code for `word`, converting it on first sight only.
    pub fn code_for(&mut self, word: &str) -> Option<&str> {
        if !self.memo.contains_key(word) {
            self.invocations += 1;
            let code = self.inner.transliterate(word).filter(|c| !c.is_empty());
            self.memo.insert(word.to_string(), code);
        }
        self.memo.get(word).and_then(|c| c.as_deref())
    }

    /// How many times the wrapped converter actually ran.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    /// Distinct words that had no derivable code.
    pub fn unconvertible(&self) -> usize {
        self.memo.values().filter(|c| c.is_none()).count()
    }
}
