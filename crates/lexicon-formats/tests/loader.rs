use std::path::PathBuf;

use lexicon_formats::{LoadMode, SourceFormat, read_source};
use lexicon_types::{BareEntry, Entry, SourceEntry};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn reads_annotated_dictionary_with_header() {
    let mut entries = Vec::new();
    let report = read_source(
        fixture("base.dict.yaml"),
        LoadMode::Mmap,
        Some(SourceFormat::Annotated),
        &mut entries,
    )
    .expect("read annotated fixture");

    assert_eq!(
        entries,
        vec![
            SourceEntry::Coded(Entry::new("你好", "ni hao", 50)),
            SourceEntry::Coded(Entry::new("你好", "ni hao", 80)),
            SourceEntry::Coded(Entry::new("世界", "shi jie", 0)),
        ]
    );
    assert_eq!(report.accepted, 3);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.header_lines, 8);
    assert_eq!(report.imports, vec!["cn_dicts/8105", "cn_dicts/base"]);
}

#[test]
fn reads_frequency_list_with_bom_and_crlf() {
    for mode in [LoadMode::Mmap, LoadMode::Owned] {
        let mut entries = Vec::new();
        let report = read_source(
            fixture("THUOCL_it.txt"),
            mode,
            Some(SourceFormat::FrequencyList),
            &mut entries,
        )
        .expect("read frequency fixture");

        assert_eq!(
            entries,
            vec![
                SourceEntry::Bare(BareEntry::new("人工智能", 21098)),
                SourceEntry::Bare(BareEntry::new("机器学习", 1822)),
                SourceEntry::Bare(BareEntry::new("深度学习", 903)),
            ]
        );
        assert_eq!(report.skipped, 1);
    }
}

#[test]
fn detects_format_when_not_forced() {
    let mut entries = Vec::new();
    let report = read_source(fixture("mine.txt"), LoadMode::Owned, None, &mut entries)
        .expect("read local fixture");
    assert_eq!(report.format, SourceFormat::Heterogeneous);
    assert_eq!(entries.len(), 3);
    assert_eq!(report.skipped, 1);

    let mut entries = Vec::new();
    let report = read_source(fixture("base.dict.yaml"), LoadMode::Owned, None, &mut entries)
        .expect("read annotated fixture");
    assert_eq!(report.format, SourceFormat::Annotated);
}

#[test]
fn undecodable_file_contributes_nothing() {
    let mut entries = Vec::new();
    let err = read_source(fixture("broken.txt"), LoadMode::Mmap, None, &mut entries)
        .expect_err("invalid utf-8 must fail");
    assert!(format!("{err:#}").contains("utf-8"));
    assert!(entries.is_empty());
}

#[test]
fn missing_and_empty_files() {
    let mut entries = Vec::new();
    assert!(read_source(fixture("absent.txt"), LoadMode::Mmap, None, &mut entries).is_err());

    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.txt");
    std::fs::write(&empty, b"").unwrap();
    let report = read_source(&empty, LoadMode::Mmap, None, &mut entries).unwrap();
    assert_eq!(report.accepted, 0);
    assert!(entries.is_empty());
}
