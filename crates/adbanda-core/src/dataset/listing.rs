//! Directory-convention file listing
//!
//! Raw audio lives at `<root>/<class-name>/*.wav`. A missing class directory
//! is treated as an empty class.

use std::path::{Path, PathBuf};

use crate::config::{ModelKind, RawClass};

use super::LabeledSet;

/// Sorted `*.wav` files directly inside `dir`.
///
/// Returns an empty list (and logs a warning) when the directory is missing
/// or unreadable. `limit` caps the number of files returned.
pub fn list_wav_files(dir: &Path, limit: Option<usize>) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {:?}: {}, treating as empty", dir, e);
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_wav(path))
        .collect();
    files.sort();

    if let Some(limit) = limit {
        files.truncate(limit);
    }
    files
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

/// Files of one raw class under a dataset root
pub fn list_class_files(root: &Path, class: RawClass, limit: Option<usize>) -> Vec<PathBuf> {
    let files = list_wav_files(&root.join(class.name()), limit);
    log::info!("{}: {} files", class, files.len());
    files
}

/// Label every audio file under `root` according to a grouping.
///
/// Raw classes merged into one output class are concatenated in grouping
/// order (e.g. advert files, then talk files, for `mo`'s "other").
pub fn label_audio_files(
    root: &Path,
    kind: ModelKind,
    limit: Option<usize>,
) -> LabeledSet<PathBuf> {
    let groups = kind
        .groups()
        .into_iter()
        .map(|raw_classes| {
            raw_classes
                .into_iter()
                .flat_map(|class| list_class_files(root, class, limit))
                .collect()
        })
        .collect();
    LabeledSet::from_groups(groups)
}
