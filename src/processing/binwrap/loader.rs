//! Turns raw executable bytes into something the OS can spawn.
//!
//! On Linux and Android the image lives in an anonymous `memfd` and is
//! launched through `/proc/self/fd/<n>`; nothing touches the filesystem.
//! Elsewhere the bytes go to a private temp file that is removed when the
//! handle is dropped. Either way the backing resource is released on drop,
//! so every exit path of a run cleans up.

use std::path::{Path, PathBuf};
use tracing::debug;
use crate::utils::{ToolError, ToolResult};

/// A loaded executable image that can be spawned any number of times.
#[derive(Debug)]
pub struct ExecutableImage {
    path: PathBuf,
    name: String,
    _backing: Backing,
}

impl ExecutableImage {
    /// Prepares `bytes` for execution. `name` is used for the memfd / temp
    /// file name and as the child's `argv[0]`.
    pub fn load(bytes: &[u8], name: &str) -> ToolResult<Self> {
        if bytes.is_empty() {
            return Err(ToolError::load(format!("binary image for {name} is empty")));
        }

        let (path, backing) = materialize(bytes, name)?;
        debug!("Loaded {} ({} bytes) at {}", name, bytes.len(), path.display());

        Ok(Self {
            path,
            name: name.to_string(),
            _backing: backing,
        })
    }

    /// Path to hand to the process spawner.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Releases the backing memory or temp file now instead of at drop.
    pub fn release(self) {
        debug!("Released executable image for {}", self.name);
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
type Backing = std::fs::File;

#[cfg(any(target_os = "linux", target_os = "android"))]
fn materialize(bytes: &[u8], name: &str) -> ToolResult<(PathBuf, Backing)> {
    use std::ffi::CString;
    use std::io::Write;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

    let c_name = CString::new(name)
        .map_err(|e| ToolError::load(format!("invalid binary name {name:?}: {e}")))?;

    // SAFETY: c_name is a valid NUL-terminated string; the flags are constants.
    let raw = unsafe { libc::memfd_create(c_name.as_ptr(), libc::MFD_CLOEXEC) };
    if raw < 0 {
        return Err(ToolError::load(format!(
            "memfd_create failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    // SAFETY: memfd_create returned a fresh descriptor that nothing else owns.
    let mut file = std::fs::File::from(unsafe { OwnedFd::from_raw_fd(raw) });
    file.write_all(bytes)
        .map_err(|e| ToolError::load(format!("Failed to write binary image to memfd: {e}")))?;

    let path = PathBuf::from(format!("/proc/self/fd/{}", file.as_raw_fd()));
    Ok((path, file))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
type Backing = tempfile::TempPath;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn materialize(bytes: &[u8], name: &str) -> ToolResult<(PathBuf, Backing)> {
    use std::io::Write;

    let suffix = if cfg!(windows) { ".exe" } else { "" };
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{name}-"))
        .suffix(suffix)
        .tempfile()
        .map_err(|e| ToolError::load(format!("Failed to create temp executable: {e}")))?;

    file.write_all(bytes)
        .map_err(|e| ToolError::load(format!("Failed to write temp executable: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o700))
            .map_err(|e| ToolError::load(format!("Failed to mark temp executable runnable: {e}")))?;
    }

    // Close the write handle before anyone tries to exec the file.
    let temp_path = file.into_temp_path();
    Ok((temp_path.to_path_buf(), temp_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_image_is_load_error() {
        let err = ExecutableImage::load(&[], "cjpeg").unwrap_err();
        assert!(matches!(err, ToolError::Load(_)));
    }

    #[test]
    fn loaded_image_is_readable_at_its_path() {
        let image = ExecutableImage::load(b"\x7fELF not really", "fake").unwrap();
        let read_back = std::fs::read(image.path()).unwrap();
        assert_eq!(read_back, b"\x7fELF not really");
        assert_eq!(image.name(), "fake");
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    #[test]
    fn release_removes_temp_file() {
        let image = ExecutableImage::load(b"payload", "fake").unwrap();
        let path = image.path().to_path_buf();
        assert!(path.exists());
        image.release();
        assert!(!path.exists());
    }
}
