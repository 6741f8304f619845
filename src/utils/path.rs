//! 路径处理工具函数
//!
//! Resolution of archive file names against a project directory and
//! conversion of host paths into forward-slash archive paths.

use std::path::{Component, Path, PathBuf};

/// Resolve an archive file name the way the project stores it.
///
/// Absolute names are used as-is; relative names are joined onto `base_dir`.
/// `.` and `..` components are folded lexically, the target may not exist yet.
pub fn resolve_archive_path(base_dir: &Path, archive_file: &str) -> PathBuf {
    let candidate = Path::new(archive_file);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    };
    // Windows: 使用 dunce 去除 UNC 前缀 \\?\
    dunce::simplified(&normalize_lexically(&joined)).to_path_buf()
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Convert a path relative to some source root into archive form: forward
/// slashes regardless of the host separator.
pub fn to_archive_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// The file name of an archive without its `.zip` extension, used to name
/// temporary artifacts after the archive they belong to.
pub fn archive_stem(archive: &Path) -> String {
    archive
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "archive".to_string())
}

/// 移除文件只读属性（Windows 专用）
#[cfg(target_os = "windows")]
#[allow(clippy::permissions_set_readonly_false)]
pub fn remove_readonly(path: &Path) -> std::io::Result<()> {
    use std::os::windows::fs::MetadataExt;

    let metadata = path.metadata()?;
    // Windows FILE_ATTRIBUTE_READONLY = 0x1
    if metadata.file_attributes() & 0x1 != 0 {
        let mut perms = metadata.permissions();
        perms.set_readonly(false);
        std::fs::set_permissions(path, perms)?;
    }
    Ok(())
}
