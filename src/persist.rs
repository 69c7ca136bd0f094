use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Sibling temp path used for write-then-rename, e.g. `ids.json` -> `ids.json.tmp`.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `bytes` next to `path` and renames over it, so readers only ever see
/// the previous file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).with_context(|| format!("failed creating {}", dir.display()))?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).with_context(|| format!("failed writing {}", tmp.display()))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("failed replacing {}", path.display()));
    }
    Ok(())
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value).context("failed serializing json")?;
    write_atomic(path, &json)
}

/// `Ok(None)` when the file does not exist; an error when it exists but does
/// not decode.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("failed reading {}", path.display()));
        }
    };
    let value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid json in {}", path.display()))?;
    Ok(Some(value))
}

/// Time since the file was last modified, if it exists.
pub fn file_age(path: &Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        a: u32,
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mlb_oracle_persist_{}", std::process::id()));
        dir.join(name)
    }

    #[test]
    fn tmp_path_keeps_extension() {
        assert_eq!(
            tmp_path(Path::new("data/ids.json")),
            PathBuf::from("data/ids.json.tmp")
        );
    }

    #[test]
    fn save_then_load() {
        let path = scratch("sample.json");
        save_json(&path, &Sample { a: 7 }).unwrap();
        let loaded: Option<Sample> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(Sample { a: 7 }));
        assert!(!tmp_path(&path).exists());
        assert!(file_age(&path).is_some());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_none_and_garbage_is_error() {
        let missing: Option<Sample> = load_json(&scratch("nope.json")).unwrap();
        assert!(missing.is_none());

        let path = scratch("garbage.json");
        write_atomic(&path, b"{not json").unwrap();
        assert!(load_json::<Sample>(&path).is_err());
        let _ = fs::remove_file(&path);
    }
}
