use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use lexicon_formats::{LoadMode, SourceFormat, read_source};
use lexicon_types::SourceEntry;

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let path = args.next().map(PathBuf::from).context(
        "usage: cargo run -p lexicon-formats --example inspect -- <file> [annotated|frequency|auto]",
    )?;
    let format = match args.next() {
        Some(raw) if raw == "auto" => None,
        Some(raw) => Some(
            SourceFormat::parse(&raw).with_context(|| format!("unknown format {raw:?}"))?,
        ),
        None => None,
    };
    if args.next().is_some() {
        bail!("too many arguments");
    }

    let mut entries: Vec<SourceEntry> = Vec::new();
    let report = read_source(&path, LoadMode::Mmap, format, &mut entries)
        .with_context(|| format!("reading {}", path.display()))?;

    let coded = entries
        .iter()
        .filter(|e| matches!(e, SourceEntry::Coded(_)))
        .count();
    let unique_words: HashSet<&str> = entries.iter().map(SourceEntry::word).collect();
    let max_weight = entries.iter().map(SourceEntry::weight).max().unwrap_or(0);

    println!("Source       : {}", path.display());
    println!("Format       : {}", report.format);
    println!("Accepted     : {}", report.accepted);
    println!("Skipped      : {}", report.skipped);
    println!("Header lines : {}", report.header_lines);
    println!("With code    : {}", coded);
    println!("Bare words   : {}", entries.len() - coded);
    println!("Unique words : {}", unique_words.len());
    println!("Max weight   : {}", max_weight);
    if !report.imports.is_empty() {
        println!("Imports (not followed): {}", report.imports.join(", "));
    }

    // Show the first few records to eyeball delimiter handling.
    for entry in entries.iter().take(5) {
        println!("  {:?}", entry);
    }

    Ok(())
}
