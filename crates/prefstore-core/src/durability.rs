//! Durable file sync per platform
//!
//! `File::sync_data` is not enough everywhere: on Apple platforms it only
//! reaches the drive's volatile cache. [`durable_sync`] maps to the strongest
//! primitive each platform offers.

use std::fs::File;
use std::io;

/// Block until the file's data is on persistent media.
///
/// - Linux: `fdatasync()`
/// - macOS/iOS: `fcntl(F_FULLFSYNC)`
/// - Windows: `FlushFileBuffers()`
/// - Other: `File::sync_data()`
///
/// Must not be called while holding a lock that readers need.
pub fn durable_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File` borrowed for the call.
        let rc = unsafe { libc::fdatasync(file.as_raw_fd()) };
        if rc == 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: the descriptor comes from a live `File` borrowed for the call.
        let rc = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_FULLFSYNC) };
        if rc != -1 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        // SAFETY: the handle comes from a live `File` borrowed for the call.
        let ok = unsafe { FlushFileBuffers(file.as_raw_handle() as *mut _) };
        if ok != 0 { Ok(()) } else { Err(io::Error::last_os_error()) }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios", target_os = "windows")))]
    {
        file.sync_data()
    }
}

/// Sync a directory so a rename inside it survives power loss.
///
/// No-op where directories cannot be opened as files (Windows).
pub fn sync_dir(dir: &std::path::Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        File::open(dir)?.sync_all()
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
        Ok(())
    }
}
