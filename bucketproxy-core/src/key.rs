//! Request path to object key mapping

/// Map a request path to a backend object key.
///
/// A single leading `/` is stripped and the prefix is prepended verbatim. No
/// separator is inserted, so operators wanting a directory-like prefix pass
/// one that already ends with `/` (e.g. `"team/"`).
pub fn resolve(prefix: &str, request_path: &str) -> String {
    let path = request_path.strip_prefix('/').unwrap_or(request_path);
    let mut key = String::with_capacity(prefix.len() + path.len());
    key.push_str(prefix);
    key.push_str(path);
    key
}
