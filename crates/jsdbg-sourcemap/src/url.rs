//! URL and path helpers shared by the source map loader and the breakpoint core.

use std::path::{Component, Path, PathBuf};

use url::Url;

/// Whether paths on this platform compare case-insensitively by default.
pub const CASE_INSENSITIVE_PATHS: bool = cfg!(any(windows, target_os = "macos"));

/// Decode a `file:` URL into an absolute path. Any other scheme yields `None`.
pub fn file_url_to_absolute_path(url: &str) -> Option<PathBuf> {
    if !url.get(..5).is_some_and(|scheme| scheme.eq_ignore_ascii_case("file:")) {
        return None;
    }
    Url::parse(url).ok()?.to_file_path().ok()
}

pub fn absolute_path_to_file_url(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(String::from)
}

/// Whether `s` starts with a URL scheme (`webpack:`, `file:`, `http:`…).
///
/// Single-letter schemes are treated as Windows drive letters, not URLs.
pub fn is_absolute_url(s: &str) -> bool {
    let Some(colon) = s.find(':') else {
        return false;
    };
    let scheme = &s[..colon];
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Fold a path's case on platforms whose file systems are case-insensitive.
pub fn lower_case_insensitive_path(path: &str) -> String {
    if CASE_INSENSITIVE_PATHS {
        path.to_lowercase()
    } else {
        path.to_string()
    }
}

/// Forward-slash a path and lowercase a leading Windows drive letter.
pub fn fix_drive_letter_and_slashes(path: &str) -> String {
    let mut out = path.replace('\\', "/");
    let bytes = out.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        let drive = (bytes[0] as char).to_ascii_lowercase();
        out.replace_range(..1, drive.encode_utf8(&mut [0; 4]));
    }
    out
}

/// Drop `.` segments and fold `..` into its parent without touching the file
/// system. A `..` above the root is discarded; above a relative start it is kept.
pub fn normalize_path_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir if depth > 0 => {
                out.pop();
                depth -= 1;
            }
            Component::ParentDir => {
                if !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(segment) => {
                out.push(segment);
                depth += 1;
            }
        }
    }
    out
}

/// Canonical form used to compare script URLs with requested source paths.
///
/// `file:` URLs become paths; separators and drive letters are normalised and
/// case is folded where the platform's file system ignores it.
pub fn canonicalize_url(url: &str) -> String {
    let path = match file_url_to_absolute_path(url) {
        Some(path) => path.to_string_lossy().into_owned(),
        None => url.to_string(),
    };
    lower_case_insensitive_path(&fix_drive_letter_and_slashes(&path))
}
