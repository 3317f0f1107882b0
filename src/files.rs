use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tauri::command;

/// Serializable view of a tray entry for the frontend.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct TrayFile {
    pub path: String,
    pub name: String,
}

/// A file reference dropped onto the tray. Duplicates are allowed and
/// insertion order is meaningful. While a security scope is held, the
/// entry owns it; the scope is released when the entry is removed or the
/// tray closes.
#[derive(Debug)]
pub struct DroppedFile {
    path: PathBuf,
    scope: Option<SecurityScope>,
}

impl DroppedFile {
    /// Best-effort: the entry is added even when scope acquisition fails,
    /// with degraded capability for that entry.
    pub fn new(path: PathBuf) -> Self {
        let scope = SecurityScope::acquire(&path);
        if scope.is_none() {
            log::debug!("no security scope acquired for {}", path.display());
        }
        Self { path, scope }
    }

    /// Entry restored from persistence; never holds a scope.
    pub fn without_scope(path: PathBuf) -> Self {
        Self { path, scope: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_scope(&self) -> bool {
        self.scope.is_some()
    }

    pub fn release_scope(&mut self) {
        self.scope = None;
    }

    pub fn tray_file(&self) -> TrayFile {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned());
        TrayFile {
            path: self.path.to_string_lossy().into_owned(),
            name,
        }
    }
}

/// Keeps a security-scoped resource accessible; access stops when the
/// guard drops.
#[cfg(target_os = "macos")]
#[derive(Debug)]
pub struct SecurityScope {
    url: objc2::rc::Retained<objc2_foundation::NSURL>,
}

// The NSURL is only ever used to stop the access it started; start/stop
// are documented as callable from any thread.
#[cfg(target_os = "macos")]
unsafe impl Send for SecurityScope {}

#[cfg(target_os = "macos")]
impl SecurityScope {
    pub fn acquire(path: &Path) -> Option<Self> {
        use objc2_foundation::{NSString, NSURL};

        let path = NSString::from_str(&path.to_string_lossy());
        let url = unsafe { NSURL::fileURLWithPath(&path) };
        let started = unsafe { url.startAccessingSecurityScopedResource() };
        if started {
            Some(Self { url })
        } else {
            None
        }
    }
}

#[cfg(target_os = "macos")]
impl Drop for SecurityScope {
    fn drop(&mut self) {
        unsafe { self.url.stopAccessingSecurityScopedResource() };
    }
}

#[cfg(not(target_os = "macos"))]
#[derive(Debug)]
pub struct SecurityScope;

#[cfg(not(target_os = "macos"))]
impl SecurityScope {
    pub fn acquire(_path: &Path) -> Option<Self> {
        None
    }
}

#[command]
pub fn open_file(path: String) -> Result<(), String> {
    #[cfg(target_os = "macos")]
    std::process::Command::new("open")
        .arg(&path)
        .spawn()
        .map_err(|e| e.to_string())?;
    Ok(())
}

#[command]
pub fn reveal_file(path: String) -> Result<(), String> {
    #[cfg(target_os = "macos")]
    std::process::Command::new("open")
        .args(["-R", &path])
        .spawn()
        .map_err(|e| e.to_string())?;
    Ok(())
}

#[command]
pub fn resolve_path(path: String) -> Result<String, String> {
    fs::canonicalize(&path)
        .map(|p| p.to_string_lossy().into_owned())
        .map_err(|e| e.to_string())
}

/// Write the drag preview image used when dragging entries out of the tray.
#[command]
pub fn save_drag_icon(icon_data: Vec<u8>) -> Result<String, String> {
    use std::io::Write;
    let file_path = std::env::temp_dir().join("notchdash_drag_icon.png");

    let mut file = fs::File::create(&file_path).map_err(|e| e.to_string())?;
    file.write_all(&icon_data).map_err(|e| e.to_string())?;

    Ok(file_path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tray_file_uses_the_file_name() {
        let entry = DroppedFile::without_scope(PathBuf::from("/tmp/report.pdf"));
        let view = entry.tray_file();
        assert_eq!(view.name, "report.pdf");
        assert_eq!(view.path, "/tmp/report.pdf");
    }

    #[test]
    fn restored_entries_carry_no_scope() {
        let entry = DroppedFile::without_scope(PathBuf::from("/tmp/a"));
        assert!(!entry.has_scope());
    }

    #[test]
    fn release_is_idempotent() {
        let mut entry = DroppedFile::new(PathBuf::from("/tmp/a"));
        entry.release_scope();
        entry.release_scope();
        assert!(!entry.has_scope());
    }
}
