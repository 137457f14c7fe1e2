//! String decoding over the loaded data tables.
//!
//! Table payloads are Shift-JIS (the host predates its own UTF-8
//! migration); everything user-visible goes through here.

use std::sync::Arc;

use encoding_rs::SHIFT_JIS;

use crate::error::Result;
use crate::subsystem::assets::DataAssets;

pub struct StringDecoder {
    assets: Arc<DataAssets>,
}

impl StringDecoder {
    pub fn new(assets: Arc<DataAssets>) -> Self {
        Self { assets }
    }

    /// Decode a table entry to UTF-8.
    pub fn decode(&self, table: &str, index: usize) -> Result<String> {
        let bytes = self.assets.entry(table, index)?;
        Ok(decode_shift_jis(bytes))
    }
}

/// Decode Shift-JIS bytes, stopping at the first NUL.
pub fn decode_shift_jis(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let (decoded, _, _) = SHIFT_JIS.decode(&bytes[..len]);
    decoded.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystem::assets::write_table;
    use std::fs;

    #[test]
    fn test_decode_ascii_entry() {
        let dir = tempfile::tempdir().unwrap();
        let tables = dir.path().join("tables");
        fs::create_dir_all(&tables).unwrap();
        write_table(tables.join("ui.tbl"), &[b"hello".as_slice()]).unwrap();

        let assets = Arc::new(DataAssets::new(dir.path(), "en").unwrap());
        let decoder = StringDecoder::new(assets);
        assert_eq!(decoder.decode("ui", 0).unwrap(), "hello");
    }

    #[test]
    fn test_decode_shift_jis_payload() {
        // "テスト" in Shift-JIS
        let encoded = [0x83, 0x65, 0x83, 0x58, 0x83, 0x67];
        assert_eq!(decode_shift_jis(&encoded), "テスト");
    }

    #[test]
    fn test_decode_stops_at_nul() {
        assert_eq!(decode_shift_jis(b"abc\0def"), "abc");
    }
}
