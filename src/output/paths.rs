use std::path::{Component, Path, PathBuf};

use crate::error::IntegrityError;

/// Joins `segments` under `root`, refusing anything that could resolve
/// outside it (parent traversal, absolute segments, drive prefixes). Pure;
/// never touches the filesystem.
pub fn resolve_under_root(root: &Path, segments: &[&str]) -> Result<PathBuf, IntegrityError> {
    let mut out = root.to_path_buf();
    for segment in segments {
        for component in Path::new(segment).components() {
            match component {
                Component::Normal(part) => out.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(IntegrityError::PathEscape {
                        root: root.to_path_buf(),
                        path: PathBuf::from(segment),
                    })
                }
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_segments_resolve_inside_root() {
        let p = resolve_under_root(Path::new("/out"), &["0000034940", "acc-1"]).unwrap();
        assert_eq!(p, PathBuf::from("/out/0000034940/acc-1"));
    }

    #[test]
    fn test_parent_traversal_rejected() {
        assert!(resolve_under_root(Path::new("/out"), &["../etc"]).is_err());
        assert!(resolve_under_root(Path::new("/out"), &["a/../../b"]).is_err());
        assert!(resolve_under_root(Path::new("/out"), &["ok", ".."]).is_err());
    }

    #[test]
    fn test_absolute_segment_rejected() {
        assert!(resolve_under_root(Path::new("/out"), &["/etc/passwd"]).is_err());
    }

    #[test]
    fn test_curdir_ignored() {
        let p = resolve_under_root(Path::new("/out"), &["./a", "b"]).unwrap();
        assert_eq!(p, PathBuf::from("/out/a/b"));
    }
}
