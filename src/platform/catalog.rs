// DltExport - platform/catalog.rs
//
// Message catalog loading for non-verbose decoding.
//
// Format:
//   [messages]
//   1001 = "Engine started"
//   0x3f2 = "Door opened"

use crate::util::constants;
use crate::util::error::ConfigError;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct RawCatalog {
    messages: BTreeMap<String, String>,
}

/// Load a catalog mapping message ids to their text.
pub fn load_catalog(path: &Path) -> Result<HashMap<u32, String>, ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    let size = std::fs::metadata(path).map_err(io_err)?.len();
    if size > constants::MAX_CATALOG_FILE_SIZE {
        return Err(ConfigError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            max_size: constants::MAX_CATALOG_FILE_SIZE,
        });
    }

    let content = std::fs::read_to_string(path).map_err(io_err)?;
    let raw: RawCatalog = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entries = HashMap::with_capacity(raw.messages.len());
    for (key, text) in raw.messages {
        let id = parse_message_id(&key).ok_or_else(|| ConfigError::ValueOutOfRange {
            field: format!("messages.{key}"),
            value: key.clone(),
            expected: "a decimal or 0x-prefixed hex message id (0-4294967295)".to_string(),
        })?;
        entries.insert(id, text);
    }

    tracing::info!(path = %path.display(), entries = entries.len(), "Message catalog loaded");
    Ok(entries)
}

fn parse_message_id(key: &str) -> Option<u32> {
    let key = key.trim();
    match key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => key.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(constants::CATALOG_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_decimal_and_hex_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "[messages]\n1001 = \"Engine started\"\n0x10 = \"Door opened\"\n",
        );
        let catalog = load_catalog(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[&1001], "Engine started");
        assert_eq!(catalog[&16], "Door opened");
    }

    #[test]
    fn test_missing_section_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "");
        assert!(load_catalog(&path).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[messages]\nengine = \"x\"\n");
        assert!(matches!(
            load_catalog(&path),
            Err(ConfigError::ValueOutOfRange { .. })
        ));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "[messages\n");
        assert!(matches!(
            load_catalog(&path),
            Err(ConfigError::TomlParse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_catalog(&dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
