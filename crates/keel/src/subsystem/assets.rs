//! Game data tables.
//!
//! The host ships its UI text and item data as binary string tables. The
//! runtime loads every table under `<assets>/tables/` at startup; the
//! rest of the runtime (and extensions) resolve entries through
//! [`DataAssets`]. Failing to load these tables leaves the runtime
//! unable to render anything meaningful, so the load is fatal to startup.
//!
//! Table file layout (little-endian):
//! magic `KTB0` | entry count u32 | count offsets u32 (payload-relative)
//! | payload of NUL-terminated strings.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, Result};

const TABLE_MAGIC: &[u8; 4] = b"KTB0";
const TABLE_EXT: &str = "tbl";

#[derive(Debug)]
pub struct StringTable {
    name: String,
    entries: Vec<Vec<u8>>,
}

impl StringTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&[u8]> {
        self.entries.get(index).map(Vec::as_slice)
    }
}

#[derive(Debug)]
pub struct DataAssets {
    language: String,
    tables: HashMap<String, StringTable>,
}

impl DataAssets {
    /// Load every table for `language` from the asset directory.
    pub fn new(asset_dir: &Path, language: &str) -> Result<Self> {
        let table_dir = asset_dir.join("tables");
        let entries = fs::read_dir(&table_dir).map_err(|e| {
            Error::AssetLoadFailed(format!("cannot read table dir {:?}: {}", table_dir, e))
        })?;

        let mut tables = HashMap::new();
        for entry in entries {
            let path = entry
                .map_err(|e| Error::AssetLoadFailed(format!("table dir walk failed: {e}")))?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some(TABLE_EXT) {
                continue;
            }

            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let bytes = fs::read(&path)?;
            let table = parse_table(&name, &bytes)?;
            debug!("Loaded table '{}' ({} entries)", name, table.len());
            tables.insert(name, table);
        }

        if tables.is_empty() {
            return Err(Error::AssetLoadFailed(format!(
                "no string tables in {:?}",
                table_dir
            )));
        }

        info!("Loaded {} data tables (language {})", tables.len(), language);
        Ok(Self {
            language: language.to_string(),
            tables,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn table(&self, name: &str) -> Option<&StringTable> {
        self.tables.get(name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Raw bytes of one table entry.
    pub fn entry(&self, table: &str, index: usize) -> Result<&[u8]> {
        let t = self
            .tables
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))?;
        t.entry(index).ok_or_else(|| Error::EntryOutOfRange {
            table: table.to_string(),
            index,
        })
    }
}

fn parse_table(name: &str, bytes: &[u8]) -> Result<StringTable> {
    let invalid = |message: String| Error::TableInvalid {
        name: name.to_string(),
        message,
    };

    if bytes.len() < 8 || &bytes[..4] != TABLE_MAGIC {
        return Err(invalid("bad magic".to_string()));
    }

    let count = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let payload_start = 8 + count * 4;
    if bytes.len() < payload_start {
        return Err(invalid(format!("offset table truncated (count {count})")));
    }
    let payload = &bytes[payload_start..];

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let at = 8 + i * 4;
        let offset = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap()) as usize;
        if offset > payload.len() {
            return Err(invalid(format!("entry {i} offset {offset} out of range")));
        }
        let rest = &payload[offset..];
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        entries.push(rest[..end].to_vec());
    }

    Ok(StringTable {
        name: name.to_string(),
        entries,
    })
}

/// Write a table file in the format `DataAssets` loads.
///
/// Counterpart of the loader, used by packaging tooling and fixtures.
pub fn write_table<P: AsRef<Path>>(path: P, entries: &[&[u8]]) -> Result<()> {
    let mut offsets = Vec::with_capacity(entries.len());
    let mut payload = Vec::new();
    for entry in entries {
        offsets.push(payload.len() as u32);
        payload.extend_from_slice(entry);
        payload.push(0);
    }

    let mut bytes = Vec::with_capacity(8 + offsets.len() * 4 + payload.len());
    bytes.extend_from_slice(TABLE_MAGIC);
    bytes.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for offset in offsets {
        bytes.extend_from_slice(&offset.to_le_bytes());
    }
    bytes.extend_from_slice(&payload);

    fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset_dir_with_table(entries: &[&[u8]]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let tables = dir.path().join("tables");
        fs::create_dir_all(&tables).unwrap();
        write_table(tables.join("ui.tbl"), entries).unwrap();
        dir
    }

    #[test]
    fn test_load_and_read_entries() {
        let dir = asset_dir_with_table(&[b"first".as_slice(), b"second".as_slice()]);
        let assets = DataAssets::new(dir.path(), "en").unwrap();

        assert_eq!(assets.table_names(), vec!["ui"]);
        assert_eq!(assets.entry("ui", 0).unwrap(), b"first");
        assert_eq!(assets.entry("ui", 1).unwrap(), b"second");
    }

    #[test]
    fn test_missing_table_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = DataAssets::new(dir.path(), "en").unwrap_err();
        assert!(matches!(err, Error::AssetLoadFailed(_)));
    }

    #[test]
    fn test_empty_table_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("tables")).unwrap();
        assert!(DataAssets::new(dir.path(), "en").is_err());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tables = dir.path().join("tables");
        fs::create_dir_all(&tables).unwrap();
        fs::write(tables.join("bad.tbl"), b"NOPE\x01\x00\x00\x00").unwrap();

        let err = DataAssets::new(dir.path(), "en").unwrap_err();
        assert!(matches!(err, Error::TableInvalid { .. }));
    }

    #[test]
    fn test_out_of_range_lookups() {
        let dir = asset_dir_with_table(&[b"only".as_slice()]);
        let assets = DataAssets::new(dir.path(), "en").unwrap();

        assert!(matches!(
            assets.entry("ui", 5).unwrap_err(),
            Error::EntryOutOfRange { .. }
        ));
        assert!(matches!(
            assets.entry("nope", 0).unwrap_err(),
            Error::UnknownTable(_)
        ));
    }
}
