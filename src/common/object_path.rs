//! Helpers shared by the producer, the upload pipeline and object deletion for
//! turning destination hints and public URLs into folders and object keys.

use std::path::Path;

/// Marker used when no storage host marker is configured.
pub const DEFAULT_HOST_MARKER: &str = "is3";

/// Folder name reserved for seeded placeholder objects; never deleted.
pub const PLACEHOLDER_FOLDER: &str = "example";

pub fn is_url(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Derives the storage folder from a destination hint using the default host marker.
pub fn extract_folder_from_path(path: &str) -> String {
    extract_folder_with_marker(path, DEFAULT_HOST_MARKER)
}

/// Derives the storage folder from a destination hint.
///
/// For a public URL (`https://<host>/<bucket>/<folder>/<file>`) the folder is
/// the segment right after the bucket, found by locating the segment that
/// contains `host_marker`. Anything else is treated as a local path and its
/// parent directory is returned (`.` when there is none).
pub fn extract_folder_with_marker(path: &str, host_marker: &str) -> String {
    if is_url(path) {
        let parts: Vec<&str> = path.split('/').collect();
        let Some(host_index) = parts.iter().position(|part| part.contains(host_marker)) else {
            return String::new();
        };
        let bucket_index = host_index + 1;
        // a file segment must follow the folder
        if bucket_index + 1 < parts.len() - 1 {
            return parts[bucket_index + 1].to_string();
        }
        return String::new();
    }

    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    }
}

/// Last path segment of a destination hint or URL.
pub fn base_name(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    trimmed
        .rsplit('/')
        .next()
        .unwrap_or(trimmed)
        .to_string()
}

/// Extension including the leading dot, or an empty string.
pub fn extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

pub fn replace_extension(file_name: &str, new_ext: &str) -> String {
    let ext = extension(file_name);
    let stem = file_name.strip_suffix(ext.as_str()).unwrap_or(file_name);
    format!("{}{}", stem, new_ext)
}

/// Joins a folder and file name into an object key.
///
/// Empty and `.` folders produce a key at the bucket root.
pub fn object_key(folder: &str, file_name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() || folder == "." {
        file_name.to_string()
    } else {
        format!("{}/{}", folder, file_name)
    }
}

/// Key of the object a public URL points to, i.e. every segment after the
/// bucket segment.
pub fn key_from_url(url: &str, bucket: &str) -> Option<String> {
    let parts: Vec<&str> = url.split('/').collect();
    let bucket_index = parts.iter().position(|part| *part == bucket)?;
    if bucket_index >= parts.len() - 1 {
        return None;
    }
    let key = parts[bucket_index + 1..].join("/");
    (!key.is_empty()).then_some(key)
}

/// Normalizes an endpoint so it always carries a scheme and no trailing slash.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if is_url(endpoint) {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

pub fn public_url(endpoint: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", normalize_endpoint(endpoint), bucket, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_from_public_url() {
        assert_eq!(
            extract_folder_from_path("https://is3.example.com/bucket/photos/x.jpg"),
            "photos"
        );
    }

    #[test]
    fn folder_from_url_without_file_segment_is_empty() {
        assert_eq!(extract_folder_from_path("https://is3.example.com/bucket/photos"), "");
        assert_eq!(extract_folder_from_path("https://cdn.example.com/bucket/photos/x.jpg"), "");
    }

    #[test]
    fn folder_from_local_path() {
        assert_eq!(extract_folder_from_path("/local/dir/file.png"), "/local/dir");
        assert_eq!(extract_folder_from_path("users/avatar.png"), "users");
        assert_eq!(extract_folder_from_path("avatar.png"), ".");
    }

    #[test]
    fn custom_marker_matches_minio_host() {
        assert_eq!(
            extract_folder_with_marker("http://minio:9000/media/users/1.webp", "minio"),
            "users"
        );
    }

    #[test]
    fn keys_are_joined_without_duplicate_slashes() {
        assert_eq!(object_key("/users/", "1.webp"), "users/1.webp");
        assert_eq!(object_key(".", "1.webp"), "1.webp");
        assert_eq!(object_key("", "1.webp"), "1.webp");
    }

    #[test]
    fn extension_is_rewritten() {
        assert_eq!(replace_extension("avatar.png", ".webp"), "avatar.webp");
        assert_eq!(replace_extension("archive.tar.gz", ".webp"), "archive.tar.webp");
        assert_eq!(replace_extension("noext", ".webp"), "noext.webp");
    }

    #[test]
    fn key_is_everything_after_bucket() {
        assert_eq!(
            key_from_url("https://is3.example.com/bucket/photos/2024/x.jpg", "bucket").as_deref(),
            Some("photos/2024/x.jpg")
        );
        assert_eq!(key_from_url("https://is3.example.com/other/x.jpg", "bucket"), None);
        assert_eq!(key_from_url("https://is3.example.com/bucket", "bucket"), None);
    }

    #[test]
    fn public_url_adds_scheme() {
        assert_eq!(
            public_url("is3.example.com/", "bucket", "users/1.webp"),
            "https://is3.example.com/bucket/users/1.webp"
        );
        assert_eq!(
            public_url("http://localhost:9000", "bucket", "a.png"),
            "http://localhost:9000/bucket/a.png"
        );
    }
}
