//! Host process module context.
//!
//! Read-only view of the host's main executable module: its base address
//! and a byte snapshot of the loaded image. Every subsystem that scans
//! host memory works against this snapshot rather than live memory, so
//! the host can keep executing while the runtime searches.

use crate::error::Result;

/// Read-only handle to the host process's main module.
pub struct ProcessContext {
    base: u64,
    image: Vec<u8>,
}

impl ProcessContext {
    /// Snapshot the main module of the current (host) process.
    #[cfg(target_os = "windows")]
    pub fn current() -> Result<Self> {
        use windows::Win32::System::LibraryLoader::GetModuleHandleW;
        use windows::Win32::System::ProcessStatus::{GetModuleInformation, MODULEINFO};
        use windows::Win32::System::Threading::GetCurrentProcess;
        use windows::core::PCWSTR;

        use crate::error::Error;

        // SAFETY: GetModuleHandleW(NULL) returns the handle of the main
        // executable module of the calling process; the handle is not owned.
        let module = unsafe { GetModuleHandleW(PCWSTR::null()) }
            .map_err(|e| Error::ModuleUnavailable(format!("GetModuleHandleW failed: {e}")))?;

        let mut info = MODULEINFO::default();
        // SAFETY: module is a valid handle for the current process and the
        // MODULEINFO buffer is correctly sized.
        unsafe {
            GetModuleInformation(
                GetCurrentProcess(),
                module,
                &mut info,
                std::mem::size_of::<MODULEINFO>() as u32,
            )
        }
        .map_err(|e| Error::ModuleUnavailable(format!("GetModuleInformation failed: {e}")))?;

        let base = info.lpBaseOfDll as u64;
        // SAFETY: the main module stays mapped for the process lifetime;
        // lpBaseOfDll/SizeOfImage describe its committed image range.
        let image = unsafe {
            std::slice::from_raw_parts(info.lpBaseOfDll as *const u8, info.SizeOfImage as usize)
        }
        .to_vec();

        Ok(Self { base, image })
    }

    #[cfg(not(target_os = "windows"))]
    pub fn current() -> Result<Self> {
        Err(crate::error::Error::Unsupported(
            "host module snapshot is only supported on Windows",
        ))
    }

    /// Build a context from an already-captured module image.
    ///
    /// Used by hosts that snapshot the module themselves and by tests.
    pub fn from_image(base: u64, image: Vec<u8>) -> Self {
        Self { base, image }
    }

    /// Build a context from a module image on disk, mapped at `base`.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P, base: u64) -> Result<Self> {
        let image = std::fs::read(path)?;
        Ok(Self { base, image })
    }

    /// Base address the module is (or is assumed to be) mapped at.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// The module image bytes.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Image size in bytes.
    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}
