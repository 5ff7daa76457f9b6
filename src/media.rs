use crate::model::{Content, ItemKind, MediaRef};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const EBUSY: i32 = 16;

#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("permission denied reading {0:?}; check the file's access rights")]
    PermissionDenied(PathBuf),
    #[error("no media found at {0:?}")]
    NotFound(PathBuf),
    #[error("{0:?} is in use by another program; try again")]
    Busy(PathBuf),
    #[error("{path:?} is not a supported {kind} file")]
    Unsupported { path: PathBuf, kind: ItemKind },
    #[error("reading {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl MediaError {
    fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        if err.raw_os_error() == Some(EBUSY) {
            return MediaError::Busy(path);
        }
        match err.kind() {
            io::ErrorKind::PermissionDenied => MediaError::PermissionDenied(path),
            io::ErrorKind::NotFound => MediaError::NotFound(path),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => MediaError::Busy(path),
            _ => MediaError::Io { path, source: err },
        }
    }
}

/// MIME type for a media file, if its extension belongs to `kind`.
pub fn mime_for(path: &Path, kind: ItemKind) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match (kind, ext.as_str()) {
        (ItemKind::Photo, "jpg" | "jpeg") => "image/jpeg",
        (ItemKind::Photo, "png") => "image/png",
        (ItemKind::Photo, "gif") => "image/gif",
        (ItemKind::Photo, "webp") => "image/webp",
        (ItemKind::Photo, "svg") => "image/svg+xml",
        (ItemKind::Audio, "webm") => "audio/webm",
        (ItemKind::Audio, "mp3") => "audio/mpeg",
        (ItemKind::Audio, "ogg" | "oga") => "audio/ogg",
        (ItemKind::Audio, "wav") => "audio/wav",
        (ItemKind::Audio, "m4a") => "audio/mp4",
        (ItemKind::Video, "webm") => "video/webm",
        (ItemKind::Video, "mp4" | "m4v") => "video/mp4",
        (ItemKind::Video, "mov") => "video/quicktime",
        (ItemKind::Video, "ogv") => "video/ogg",
        _ => return None,
    };
    Some(mime)
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Reads a photo, audio or video file and inlines it.
pub fn load_media(path: &Path, kind: ItemKind) -> Result<MediaRef, MediaError> {
    let mime = mime_for(path, kind).ok_or_else(|| MediaError::Unsupported {
        path: path.to_path_buf(),
        kind,
    })?;
    let bytes = fs::read(path).map_err(|err| MediaError::from_io(path, err))?;
    Ok(MediaRef {
        mime: mime.to_string(),
        data_uri: data_uri(mime, &bytes),
    })
}

pub fn media_content(path: &Path, kind: ItemKind) -> Result<Content, MediaError> {
    let media = load_media(path, kind)?;
    match kind {
        ItemKind::Photo => Ok(Content::Photo(media)),
        ItemKind::Audio => Ok(Content::Audio(media)),
        ItemKind::Video => Ok(Content::Video(media)),
        other => Err(MediaError::Unsupported {
            path: path.to_path_buf(),
            kind: other,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn photo_is_inlined_as_data_uri() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("beach.PNG");
        fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        let media = load_media(&path, ItemKind::Photo).unwrap();
        assert_eq!(media.mime, "image/png");
        let payload = media
            .data_uri
            .strip_prefix("data:image/png;base64,")
            .unwrap();
        assert_eq!(
            STANDARD.decode(payload).unwrap(),
            vec![0x89, b'P', b'N', b'G']
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load_media(&dir.path().join("gone.jpg"), ItemKind::Photo).unwrap_err();
        assert!(matches!(err, MediaError::NotFound(_)));
        assert!(err.to_string().contains("no media found"));
    }

    #[test]
    fn wrong_extension_is_unsupported() {
        let err = load_media(Path::new("clip.mp4"), ItemKind::Audio).unwrap_err();
        assert!(matches!(err, MediaError::Unsupported { .. }));
        assert_eq!(mime_for(Path::new("clip.webm"), ItemKind::Video), Some("video/webm"));
        assert_eq!(mime_for(Path::new("noext"), ItemKind::Photo), None);
    }

    #[test]
    fn io_errors_map_to_readable_variants() {
        let path = Path::new("x.jpg");
        let denied = MediaError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, MediaError::PermissionDenied(_)));
        let busy = MediaError::from_io(path, io::Error::from_raw_os_error(EBUSY));
        assert!(matches!(busy, MediaError::Busy(_)));
    }

    #[test]
    fn media_content_wraps_by_kind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("memo.webm");
        fs::write(&path, b"abc").unwrap();
        let content = media_content(&path, ItemKind::Audio).unwrap();
        assert_eq!(content.kind(), ItemKind::Audio);
    }
}
