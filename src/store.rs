//! JSON file I/O shared by every job.
//!
//! Output is pretty-printed with two-space indentation and raw (unescaped)
//! non-ASCII text. Saves go through a sibling temp file and a rename, so an
//! interrupted run leaves either the previous file or the new one on disk,
//! never a truncated mix. Resumable jobs rely on that.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

/// Read and deserialize `path`.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::Io(std::io::Error::new(e.kind(), format!("cannot read {}: {e}", path.display())))
    })?;
    serde_json::from_str(&text).map_err(|e| AppError::json(path, e))
}

/// Like [`load_json`], but a missing file yields `T::default()`.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, AppError> {
    if !path.exists() {
        debug!(path = %path.display(), "no existing file, starting empty");
        return Ok(T::default());
    }
    load_json(path)
}

/// Serialize `value` and atomically replace `path`.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), AppError> {
    let mut text = serde_json::to_string_pretty(value).map_err(|e| AppError::json(path, e))?;
    text.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(path);
    fs::write(&tmp, text.as_bytes())?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })?;

    debug!(path = %path.display(), bytes = text.len(), "saved");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "out.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        let mut map = BTreeMap::new();
        map.insert("汤面".to_string(), vec![1, 2]);
        save_json(&path, &map).unwrap();

        let back: BTreeMap<String, Vec<i32>> = load_json(&path).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn output_is_pretty_and_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        save_json(&path, &serde_json::json!({ "answer": "是" })).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"answer\": \"是\"\n}\n");
    }

    #[test]
    fn missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let v: Vec<String> = load_json_or_default(&dir.path().join("absent.json")).unwrap();
        assert!(v.is_empty());
    }

    #[test]
    fn malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[1, 2").unwrap();
        let err = load_json::<Vec<i32>>(&path).unwrap_err().to_string();
        assert!(err.contains("bad.json"));
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        save_json(&path, &vec![1]).unwrap();
        save_json(&path, &vec![1, 2]).unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["out.json".to_string()]);
    }
}
