use std::env;

use anyhow::{Result, bail};
use lexicon_translit::{Cached, Pinyin};

fn main() -> Result<()> {
    let mut separator = String::new();
    let mut words = Vec::new();
    for arg in env::args().skip(1) {
        if let Some(sep) = arg.strip_prefix("--separator=") {
            separator = sep.to_string();
        } else if arg == "--demo" {
            words.extend(["你好", "绿色", "A股", "维C片", "——"].map(String::from));
        } else {
            words.push(arg);
        }
    }
    if words.is_empty() {
        bail!(
            "usage: cargo run -p lexicon-translit --example convert -- [--separator=<s>] [--demo | <word>...]"
        );
    }

    let mut cached = Cached::new(Pinyin::with_separator(separator));
    for word in &words {
        match cached.code_for(word) {
            Some(code) => println!("{:<12} {}", word, code),
            None => println!("{:<12} (no transliteration)", word),
        }
    }
    println!(
        "\n{} lookups, {} conversions, {} unconvertible",
        words.len(),
        cached.invocations(),
        cached.unconvertible()
    );

    Ok(())
}
