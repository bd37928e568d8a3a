//! Remote path helpers. Remote paths always use `/`.

/// Parent directory of `path`. `/x` → `/`, `x` → `.`.
pub fn parent_dir(path: &str) -> String {
    let trimmed = trim_trailing(path);
    match trimmed.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => trimmed[..i].to_string(),
        None => ".".to_string(),
    }
}

/// Last segment of `path`, ignoring a trailing slash.
pub fn base_name(path: &str) -> &str {
    let trimmed = trim_trailing(path);
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// True for `/` (and `//`, …).
pub fn is_root(path: &str) -> bool {
    !path.is_empty() && path.chars().all(|c| c == '/')
}

/// Directory segments of `path`, empty and `.` segments dropped.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

/// Chain of directories from the root down to `dir`, inclusive.
///
/// `/a/b/c` → `["/", "/a", "/a/b", "/a/b/c"]`; relative paths start at
/// their first segment.
pub fn ancestor_chain(dir: &str) -> Vec<String> {
    let absolute = dir.starts_with('/');
    let mut chain = Vec::new();
    let mut current = String::new();
    if absolute {
        chain.push("/".to_string());
    }
    for seg in segments(dir) {
        if absolute || !current.is_empty() {
            current.push('/');
        }
        current.push_str(seg);
        chain.push(current.clone());
    }
    chain
}

fn trim_trailing(path: &str) -> &str {
    if is_root(path) {
        return "/";
    }
    path.trim_end_matches('/')
}
