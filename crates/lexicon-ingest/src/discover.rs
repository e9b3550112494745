//! Locate the directory that actually holds the word-lists, and the lists in it.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Suffixes of Rime dictionary files.
pub const RIME_DICT_SUFFIXES: &[&str] = &[".dict.yaml", ".dict.yml"];
/// Suffixes of plain frequency lists.
pub const FREQUENCY_LIST_SUFFIXES: &[&str] = &[".txt"];
/// Suffixes accepted from a local word-list folder.
pub const LOCAL_SUFFIXES: &[&str] = &[".txt", ".dict", ".yaml", ".yml"];

/// Which heuristic picked the directory.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Strategy {
    NameMatch,
    SoleSubdirectory,
    Scan,
    Root,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Resolved {
    pub dir: PathBuf,
    pub strategy: Strategy,
}

pub fn has_suffix(path: &Path, suffixes: &[&str]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_lowercase();
    suffixes.iter().any(|suffix| name.ends_with(suffix))
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = read
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

fn directly_contains(dir: &Path, suffixes: &[&str]) -> bool {
    let Ok(read) = fs::read_dir(dir) else {
        return false;
    };
    read.filter_map(|e| e.ok())
        .map(|e| e.path())
        .any(|p| p.is_file() && has_suffix(&p, suffixes))
}

/// Resolve `root` to the directory containing source files.
///
/// Tried in order:
/// 1. the first direct subdirectory whose lower-cased name contains every
///    fragment of `name_parts` (skipped when `name_parts` is empty),
/// 2. the only direct subdirectory, if there is exactly one,
/// 3. `root` itself, if it directly holds a file ending in one of `suffixes`,
/// 4. the first directory below `root`, in sorted walk order, that directly
///    holds such a file.
pub fn resolve_source_dir(root: &Path, name_parts: &[&str], suffixes: &[&str]) -> Option<Resolved> {
    let subdirs = sorted_subdirs(root);

    if !name_parts.is_empty() {
        let by_name = subdirs.iter().find(|dir| {
            dir.file_name()
                .and_then(|n| n.to_str())
                .map(|n| {
                    let lower = n.to_lowercase();
                    name_parts.iter().all(|part| lower.contains(part))
                })
                .unwrap_or(false)
        });
        if let Some(dir) = by_name {
            return Some(Resolved {
                dir: dir.clone(),
                strategy: Strategy::NameMatch,
            });
        }
    }

    if let [only] = subdirs.as_slice() {
        return Some(Resolved {
            dir: only.clone(),
            strategy: Strategy::SoleSubdirectory,
        });
    }

    if directly_contains(root, suffixes) {
        return Some(Resolved {
            dir: root.to_path_buf(),
            strategy: Strategy::Root,
        });
    }

    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .find(|e| directly_contains(e.path(), suffixes))
        .map(|entry| Resolved {
            dir: entry.into_path(),
            strategy: Strategy::Scan,
        })
}

/// Every file under `dir` (recursively) ending in one of `suffixes`, sorted.
pub fn find_source_files(dir: &Path, suffixes: &[&str]) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skipping unreadable path under {}: {err}", dir.display());
                continue;
            }
        };
        if entry.file_type().is_file() && has_suffix(entry.path(), suffixes) {
            found.insert(entry.into_path());
        }
    }
    debug!("{} source files under {}", found.len(), dir.display());
    found.into_iter().collect()
}

/// Render `root` as an indented tree, `max_depth` levels deep.
pub fn describe_tree(root: &Path, max_depth: usize) -> String {
    let mut out = format!("{}\n", root.display());
    tree_lines(root, "", max_depth, &mut out);
    out
}

fn tree_lines(dir: &Path, prefix: &str, depth_left: usize, out: &mut String) {
    if depth_left == 0 {
        return;
    }
    let Ok(read) = fs::read_dir(dir) else {
        return;
    };
    let mut items: Vec<(bool, String, PathBuf)> = read
        .filter_map(|e| e.ok())
        .map(|e| {
            let path = e.path();
            (!path.is_dir(), e.file_name().to_string_lossy().into_owned(), path)
        })
        .collect();
    items.sort();

    let count = items.len();
    for (idx, (is_file, name, path)) in items.into_iter().enumerate() {
        let last = idx + 1 == count;
        let _ = writeln!(out, "{prefix}{}{name}", if last { "└── " } else { "├── " });
        if !is_file {
            let next = format!("{prefix}{}", if last { "    " } else { "│   " });
            tree_lines(&path, &next, depth_left - 1, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x\t1\n").unwrap();
    }

    #[test]
    fn prefers_name_match_over_other_dirs() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("docs")).unwrap();
        touch(&root.path().join("other/a.dict.yaml"));
        fs::create_dir_all(root.path().join("iDvel-Rime-Ice-1a2b3c")).unwrap();

        let resolved = resolve_source_dir(root.path(), &["rime", "ice"], RIME_DICT_SUFFIXES).unwrap();
        assert_eq!(resolved.strategy, Strategy::NameMatch);
        assert!(resolved.dir.ends_with("iDvel-Rime-Ice-1a2b3c"));
    }

    #[test]
    fn falls_back_to_sole_subdirectory() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("snapshot")).unwrap();
        let resolved = resolve_source_dir(root.path(), &["rime", "ice"], RIME_DICT_SUFFIXES).unwrap();
        assert_eq!(resolved.strategy, Strategy::SoleSubdirectory);
    }

    #[test]
    fn scans_below_root_for_dictionary_files() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("a")).unwrap();
        touch(&root.path().join("b/nested/base.dict.yaml"));
        let resolved = resolve_source_dir(root.path(), &[], RIME_DICT_SUFFIXES).unwrap();
        assert_eq!(resolved.strategy, Strategy::Scan);
        assert!(resolved.dir.ends_with("b/nested"));

        let flat = tempfile::tempdir().unwrap();
        touch(&flat.path().join("base.dict.yaml"));
        let resolved = resolve_source_dir(flat.path(), &[], RIME_DICT_SUFFIXES).unwrap();
        assert_eq!(resolved.strategy, Strategy::Root);
        assert_eq!(resolved.dir, flat.path());

        let empty = tempfile::tempdir().unwrap();
        touch(&empty.path().join("readme.md"));
        assert_eq!(resolve_source_dir(empty.path(), &[], RIME_DICT_SUFFIXES), None);
    }

    #[test]
    fn root_holding_dictionaries_wins_over_scan() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("rime_ice.dict.yaml"));
        touch(&root.path().join("cn_dicts/base.dict.yaml"));
        touch(&root.path().join("en_dicts/en.dict.yaml"));
        for dir in ["lua", "opencc", "others", "custom"] {
            fs::create_dir_all(root.path().join(dir)).unwrap();
        }

        let resolved = resolve_source_dir(root.path(), &["rime", "ice"], RIME_DICT_SUFFIXES).unwrap();
        assert_eq!(resolved.strategy, Strategy::Root);
        assert_eq!(resolved.dir, root.path());
        assert_eq!(find_source_files(&resolved.dir, RIME_DICT_SUFFIXES).len(), 3);
    }

    #[test]
    fn finds_files_recursively_sorted_and_once() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("z.txt"));
        touch(&root.path().join("sub/a.TXT"));
        touch(&root.path().join("sub/b.yml"));
        touch(&root.path().join("sub/c.md"));

        let files = find_source_files(root.path(), LOCAL_SUFFIXES);
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(root.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["sub/a.TXT", "sub/b.yml", "z.txt"]);
    }

    #[test]
    fn tree_lists_directories_first() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("b.txt"));
        touch(&root.path().join("a/x.txt"));
        let tree = describe_tree(root.path(), 3);
        let lines: Vec<&str> = tree.lines().skip(1).collect();
        assert_eq!(lines, vec!["├── a", "│   └── x.txt", "└── b.txt"]);
    }
}
