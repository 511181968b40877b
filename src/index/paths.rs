/// Canonicalizes a file system path into a cache key that is stable across
/// platforms: separators become `/`, Windows verbatim prefixes are stripped,
/// trailing slashes are trimmed, and case is folded on platforms whose file
/// systems are case-insensitive by default.
pub fn normalize_path_key(path: &str) -> String {
    let mut key = path.trim().replace('\\', "/");

    // \\?\C:\... verbatim form after separator rewrite.
    if let Some(stripped) = key.strip_prefix("//?/") {
        key = stripped.to_string();
    }

    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }

    if cfg!(any(windows, target_os = "macos")) {
        key = key.to_lowercase();
    }

    key
}
