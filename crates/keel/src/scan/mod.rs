//! Signature scanning over the host module snapshot.

pub mod signature;

use memchr::memchr_iter;
use tracing::debug;

use crate::error::{Error, Result};
use crate::process::ProcessContext;

pub use signature::{builtin, format_pattern, materialize_pattern, parse_pattern};

/// Finds byte patterns in the host's main module.
///
/// Owns the module snapshot taken at construction; lookups return host
/// virtual addresses (snapshot offset + module base).
pub struct PatternScanner {
    context: ProcessContext,
}

impl PatternScanner {
    pub fn new(context: ProcessContext) -> Self {
        debug!(
            "Scanner over module at {:#x} ({} bytes)",
            context.base(),
            context.len()
        );
        Self { context }
    }

    pub fn module_base(&self) -> u64 {
        self.context.base()
    }

    pub fn module_len(&self) -> usize {
        self.context.len()
    }

    /// Find the first occurrence of `pattern`, returning its host address.
    pub fn find(&self, pattern: &str) -> Result<u64> {
        let bytes = parse_pattern(pattern)?;
        self.find_bytes(&bytes)
            .ok_or_else(|| Error::SignatureNotFound(pattern.to_string()))
    }

    /// Find every occurrence of `pattern`.
    pub fn find_all(&self, pattern: &str) -> Result<Vec<u64>> {
        let bytes = parse_pattern(pattern)?;
        let image = self.context.image();
        let mut hits = Vec::new();
        let mut offset = 0;
        while let Some(pos) = Self::scan_from(image, offset, &bytes) {
            hits.push(self.context.base() + pos as u64);
            offset = pos + 1;
        }
        Ok(hits)
    }

    fn find_bytes(&self, bytes: &[Option<u8>]) -> Option<u64> {
        Self::scan_from(self.context.image(), 0, bytes).map(|pos| self.context.base() + pos as u64)
    }

    /// Scan `image[start..]` for the pattern, returning the match offset.
    ///
    /// Anchors on the first concrete byte with memchr, then verifies the
    /// rest of the window. Patterns that begin with wildcards anchor on
    /// the first concrete byte further in and back-project the offset.
    fn scan_from(image: &[u8], start: usize, bytes: &[Option<u8>]) -> Option<usize> {
        if bytes.is_empty() || image.len() < bytes.len() || start > image.len() - bytes.len() {
            return None;
        }

        let (anchor_idx, anchor_byte) = bytes
            .iter()
            .enumerate()
            .find_map(|(i, b)| b.map(|v| (i, v)))?;

        // memchr runs over image[start + anchor_idx..], so a hit at h puts
        // the candidate window at start + h.
        let last_window = image.len() - bytes.len();
        for hit in memchr_iter(anchor_byte, &image[start + anchor_idx..]) {
            let window_start = start + hit;
            if window_start > last_window {
                return None;
            }
            if Self::matches_at(image, window_start, bytes) {
                return Some(window_start);
            }
        }
        None
    }

    fn matches_at(image: &[u8], pos: usize, bytes: &[Option<u8>]) -> bool {
        bytes
            .iter()
            .zip(&image[pos..pos + bytes.len()])
            .all(|(expected, actual)| expected.is_none_or(|b| b == *actual))
    }
}
