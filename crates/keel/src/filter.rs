//! Unhandled-exception filter replacement.
//!
//! The host installs its own top-level exception filter, which swallows
//! crashes before a debugger sees them. This utility locates the host's
//! registration site by signature, installs a debug-hook-compatible
//! filter in its place and returns the previous one so a diagnostics
//! flow can restore it. Invoked on demand after startup, not part of
//! the lifecycle sequences.

use tracing::{debug, info};

use crate::error::Result;
use crate::scan::{PatternScanner, builtin};

/// Address of a previously installed filter, for restoration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviousFilter(pub u64);

/// Replace the host's top-level unhandled-exception filter.
///
/// The signature lookup confirms the host's registration site exists in
/// this build before anything is swapped; the swap itself is atomic.
#[cfg(target_os = "windows")]
pub fn replace_exception_filter(scanner: &PatternScanner) -> Result<PreviousFilter> {
    use windows::Win32::System::Diagnostics::Debug::{
        EXCEPTION_POINTERS, SetUnhandledExceptionFilter,
    };

    let site = scanner.find(builtin::EXCEPTION_FILTER)?;
    debug!("Host exception filter registration at {:#x}", site);

    unsafe extern "system" fn passthrough_filter(_info: *const EXCEPTION_POINTERS) -> i32 {
        // EXCEPTION_CONTINUE_SEARCH: let debuggers and later handlers see
        // the exception instead of swallowing it.
        0
    }

    // SAFETY: SetUnhandledExceptionFilter atomically swaps the process-wide
    // filter and returns the previous one.
    let previous = unsafe { SetUnhandledExceptionFilter(Some(passthrough_filter)) };
    let previous = PreviousFilter(previous.map(|f| f as usize as u64).unwrap_or(0));
    info!(
        "Replaced exception filter (previous at {:#x})",
        previous.0
    );
    Ok(previous)
}

#[cfg(not(target_os = "windows"))]
pub fn replace_exception_filter(scanner: &PatternScanner) -> Result<PreviousFilter> {
    // Still validate the signature so misses surface the same way.
    let site = scanner.find(builtin::EXCEPTION_FILTER)?;
    debug!("Host exception filter registration at {:#x}", site);
    Err(crate::error::Error::Unsupported(
        "exception filter replacement is only supported on Windows",
    ))
}
