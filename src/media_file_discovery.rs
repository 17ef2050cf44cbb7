use std::path::{Path, PathBuf};

use log::debug;

use crate::catalog::MediaKind;

pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 7] = ["mp3", "wav", "ogg", "flac", "aac", "m4a", "opus"];

pub const SUPPORTED_VIDEO_EXTENSIONS: [&str; 6] = ["mp4", "m4v", "mov", "mkv", "webm", "3gp"];

fn extensions_for(kind: MediaKind) -> &'static [&'static str] {
    match kind {
        MediaKind::Audio => &SUPPORTED_AUDIO_EXTENSIONS,
        MediaKind::Video => &SUPPORTED_VIDEO_EXTENSIONS,
    }
}

pub fn is_supported_media_file(path: &Path, kind: MediaKind) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions_for(kind)
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

/// Walks `folder_path` and returns matching files in sorted order.
///
/// Unreadable entries below the root are skipped. An unreadable root is returned
/// as an error so callers can tell a denied folder from an empty one.
pub fn collect_media_files_from_folder(
    folder_path: &Path,
    kind: MediaKind,
) -> std::io::Result<Vec<PathBuf>> {
    let root_entries = std::fs::read_dir(folder_path)?;
    let mut pending_directories = Vec::new();
    let mut files = Vec::new();

    let mut visit = |entries: std::fs::ReadDir, pending: &mut Vec<PathBuf>| {
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("Failed to read a directory entry: {}", err);
                    continue;
                }
            };

            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    debug!("Failed to inspect {}: {}", path.display(), err);
                    continue;
                }
            };

            if file_type.is_dir() {
                pending.push(path);
                continue;
            }

            if file_type.is_file() && is_supported_media_file(&path, kind) {
                files.push(path);
            }
        }
    };

    visit(root_entries, &mut pending_directories);
    while let Some(directory) = pending_directories.pop() {
        match std::fs::read_dir(&directory) {
            Ok(entries) => visit(entries, &mut pending_directories),
            Err(err) => {
                debug!("Failed to read directory {}: {}", directory.display(), err);
            }
        }
    }

    files.sort_unstable();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::{collect_media_files_from_folder, is_supported_media_file};
    use crate::catalog::MediaKind;
    use std::path::Path;

    #[test]
    fn test_supported_extensions_are_split_by_kind() {
        assert!(is_supported_media_file(Path::new("/m/song.MP3"), MediaKind::Audio));
        assert!(!is_supported_media_file(Path::new("/m/song.mp3"), MediaKind::Video));
        assert!(is_supported_media_file(Path::new("/v/clip.mov"), MediaKind::Video));
        assert!(!is_supported_media_file(Path::new("/v/notes.txt"), MediaKind::Video));
        assert!(!is_supported_media_file(Path::new("/v/no_extension"), MediaKind::Audio));
    }

    #[test]
    fn test_collect_media_files_walks_nested_folders_in_sorted_order() {
        let root = std::env::temp_dir().join(format!("mediadeck-scan-{}", uuid::Uuid::new_v4()));
        let nested = root.join("b-nested");
        std::fs::create_dir_all(&nested).expect("create nested dir");
        std::fs::write(root.join("c.flac"), b"").expect("write");
        std::fs::write(root.join("a.mp3"), b"").expect("write");
        std::fs::write(root.join("cover.jpg"), b"").expect("write");
        std::fs::write(nested.join("d.ogg"), b"").expect("write");

        let files = collect_media_files_from_folder(&root, MediaKind::Audio).expect("scan");
        let names: Vec<String> = files
            .iter()
            .map(|path| {
                path.strip_prefix(&root)
                    .expect("under root")
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.mp3", "b-nested/d.ogg", "c.flac"]);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_collect_media_files_reports_missing_root() {
        let missing = std::env::temp_dir().join(format!("mediadeck-missing-{}", uuid::Uuid::new_v4()));
        assert!(collect_media_files_from_folder(&missing, MediaKind::Audio).is_err());
    }
}
