//! Textual path handling.
//!
//! Paths in originfs are plain `/`-separated strings. They are never
//! validated against the backing store here: normalization is a pure
//! function and cannot fail. Out-of-range `..` segments are absorbed at the
//! root instead of being reported.

/// Path separator used by every root.
pub const SEPARATOR: char = '/';

/// Returns true if the path starts at the root.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

/// Split a path into its non-empty segments.
///
/// `.` and `..` are returned verbatim; use [`normalize`] to resolve them.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Resolve `rel` against `base`.
///
/// An absolute `rel` replaces `base` entirely. `.` is a no-op and `..` pops
/// one segment (or does nothing at the root). The result always has a
/// leading `/` and never a trailing one, except for the root itself.
///
/// ```rust
/// use originfs_core::path::normalize;
///
/// assert_eq!(normalize("/a/b", "c/./d"), "/a/b/c/d");
/// assert_eq!(normalize("/a/b", "../../../x"), "/x");
/// assert_eq!(normalize("/a/b", "/y"), "/y");
/// ```
pub fn normalize(base: &str, rel: &str) -> String {
    let mut walked: Vec<&str> = Vec::new();
    let start = if is_absolute(rel) { "" } else { base };

    for segment in segments(start).chain(segments(rel)) {
        match segment {
            "." => {}
            ".." => {
                walked.pop();
            }
            other => walked.push(other),
        }
    }

    join(walked)
}

/// Join segments into an absolute path.
pub fn join<'a, I>(segments: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();
    for segment in segments {
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    out
}

/// Split a normalized path into its parent directory and final name.
///
/// The root has no name: `split_parent("/")` is `("/", None)`.
pub fn split_parent(path: &str) -> (String, Option<String>) {
    let mut parts: Vec<&str> = segments(path).collect();
    match parts.pop() {
        Some(name) => (join(parts), Some(name.to_string())),
        None => (join([]), None),
    }
}

/// Clean a root reference string down to a bare id.
///
/// Strips a leading separator and keeps only the first segment, so
/// `"/docs/a/b"`, `"docs/"` and `"docs"` all yield `"docs"`.
pub fn root_id(reference: &str) -> &str {
    segments(reference).next().unwrap_or("")
}

/// Heuristic: does this segment look like a file name?
///
/// A segment counts as a file name when it has a non-empty stem and a
/// non-empty extension (`notes.txt`). Dot-files such as `.config` do not.
pub fn looks_like_file(segment: &str) -> bool {
    match segment.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && !ext.is_empty(),
        None => false,
    }
}

/// Strip a leading `/<id>/` scope from a path, if present.
///
/// Returns the remainder as an absolute path. Paths not scoped to `id` are
/// returned normalized but otherwise unchanged.
pub fn strip_scope(path: &str, id: &str) -> String {
    let mut parts = segments(path).peekable();
    if !id.is_empty() && parts.peek() == Some(&id) {
        parts.next();
    }
    normalize("/", &join(parts))
}
