//! Virtual entry identifiers.
//!
//! An entry key `<dir>/<name>.<ext>` always normalizes to the virtual id
//! `<dir>/<name>.html`, relative to the project root with forward slashes.
//! Every lookup strips the query string first. Two keys that normalize to
//! the same id collide last-write-wins, since both stores are keyed maps.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use crate::config::EntryMap;

/// Normalized virtual id for an entry key.
#[must_use]
pub fn entry_id(key: &str) -> String {
    let path = Path::new(key);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    match path.parent().and_then(|d| d.to_str()) {
        None | Some("") => format!("{stem}.html"),
        Some(dir) => format!("{}/{stem}.html", dir.replace('\\', "/")),
    }
}

/// Strip the query string from a module id or request path.
#[must_use]
pub fn strip_query(id: &str) -> &str {
    id.split('?').next().unwrap_or(id)
}

/// Build-input paths derived from the entry map, in enumeration order.
#[must_use]
pub fn entry_inputs(entries: &EntryMap) -> Vec<String> {
    entries.keys().map(|key| entry_id(key)).collect()
}

/// Normalized virtual id → absolute source module path.
#[must_use]
pub fn entry_index(root: &Path, entries: &EntryMap) -> FxHashMap<String, PathBuf> {
    let mut index = FxHashMap::default();
    for (key, value) in entries {
        index.insert(entry_id(key), root.join(value));
    }
    index
}
