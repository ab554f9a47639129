// src/controller/slug.rs
//! Artifact naming
//!
//! Artifacts live at `<data_root>/<map_slug>/<start>.parquet`.

use crate::recording::artifact::ARTIFACT_EXTENSION;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Slug used when a map name has no usable characters
pub const UNKNOWN_MAP_SLUG: &str = "unknown_map";

const FILENAME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Filesystem-safe directory name for a map.
///
/// Lowercases, turns spaces into underscores and drops anything outside
/// `[a-z0-9_]`.
pub fn map_slug(map_name: &str) -> String {
    let slug: String = map_name
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    if slug.is_empty() {
        UNKNOWN_MAP_SLUG.to_string()
    } else {
        slug
    }
}

/// Path for a new artifact.
///
/// Named after the start time; a `-1`, `-2`, ... suffix is added if a
/// recording already claimed that second.
pub fn artifact_path(data_root: &Path, slug: &str, started: NaiveDateTime) -> PathBuf {
    let dir = data_root.join(slug);
    let stem = started.format(FILENAME_FORMAT).to_string();

    let candidate = |suffix: u32| {
        let name = if suffix == 0 {
            format!("{}.{}", stem, ARTIFACT_EXTENSION)
        } else {
            format!("{}-{}.{}", stem, suffix, ARTIFACT_EXTENSION)
        };
        dir.join(name)
    };

    let mut suffix = 0;
    loop {
        let path = candidate(suffix);
        if !path.exists() && !partial_exists(&path) {
            return path;
        }
        suffix += 1;
    }
}

fn partial_exists(path: &Path) -> bool {
    let mut name = path.as_os_str().to_os_string();
    name.push(".partial");
    Path::new(&name).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::tempdir;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(12, 5, 9)
            .unwrap()
    }

    #[test]
    fn test_map_slug() {
        assert_eq!(map_slug("Airship Battle"), "airship_battle");
        assert_eq!(map_slug("Race for Victory 2"), "race_for_victory_2");
        assert_eq!(map_slug("Twin-Peaks: Reloaded!"), "twinpeaks_reloaded");
        assert_eq!(map_slug("Château"), "chteau");
        assert_eq!(map_slug("!!!"), UNKNOWN_MAP_SLUG);
        assert_eq!(map_slug(""), UNKNOWN_MAP_SLUG);
    }

    #[test]
    fn test_artifact_path() {
        let dir = tempdir().unwrap();
        let path = artifact_path(dir.path(), "airship_battle", noon());
        assert_eq!(
            path,
            dir.path().join("airship_battle").join("2026-03-14_12-05-09.parquet")
        );
    }

    #[test]
    fn test_artifact_path_avoids_collisions() {
        let dir = tempdir().unwrap();
        let map_dir = dir.path().join("airship_battle");
        fs::create_dir_all(&map_dir).unwrap();
        fs::write(map_dir.join("2026-03-14_12-05-09.parquet"), b"").unwrap();
        fs::write(map_dir.join("2026-03-14_12-05-09-1.parquet.partial"), b"").unwrap();

        let path = artifact_path(dir.path(), "airship_battle", noon());
        assert_eq!(path, map_dir.join("2026-03-14_12-05-09-2.parquet"));
    }
}
