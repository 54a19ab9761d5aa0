//! String helpers for the `/`-separated paths used on both transports.

/// Last segment of `path`, after the final `/`. `None` when there is no `/`.
pub fn name(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[idx + 1..])
}

/// Text after the final `.` of `path`. `None` when there is no `.`.
pub fn suffix(path: &str) -> Option<&str> {
    path.rfind('.').map(|idx| &path[idx + 1..])
}

/// `dir + "/" + entry`, without doubling a trailing separator of `dir`.
pub fn join(dir: &str, entry: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{entry}")
    } else {
        format!("{dir}/{entry}")
    }
}

/// Every ancestor of `path` and then `path` itself, shortest first:
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`.
pub(crate) fn prefixes(path: &str) -> impl Iterator<Item = &str> {
    let path = path.trim_end_matches('/');
    path.char_indices()
        .filter(|&(idx, c)| c == '/' && idx > 0)
        .map(move |(idx, _)| &path[..idx])
        .chain(std::iter::once(path))
        .filter(|prefix| !prefix.is_empty() && !prefix.ends_with('/'))
}

/// Lexical form of `path`: repeated separators, `.` and resolvable `..`
/// components are removed. Symbolic links are not looked at.
pub(crate) fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." if parts.last().is_some_and(|last| *last != "..") => {
                parts.pop();
            }
            ".." if absolute => {}
            part => parts.push(part),
        }
    }
    match (absolute, parts.is_empty()) {
        (true, _) => format!("/{}", parts.join("/")),
        (false, true) => ".".to_string(),
        (false, false) => parts.join("/"),
    }
}

/// Whether `path` is `ancestor` or lies below it, compared lexically.
pub(crate) fn is_within(path: &str, ancestor: &str) -> bool {
    let path = normalize(path);
    let ancestor = normalize(ancestor);
    if path == ancestor || (ancestor == "/" && path.starts_with('/')) {
        return true;
    }
    if ancestor == "." {
        return !path.starts_with('/') && path != ".." && !path.starts_with("../");
    }
    path.strip_prefix(ancestor.as_str())
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn name_scans_from_the_end() {
        assert_eq!(name("/a/b/c.txt"), Some("c.txt"));
        assert_eq!(name("/a/b/"), Some(""));
        assert_eq!(name("/top"), Some("top"));
        assert_eq!(name("noslashnodot"), None);
    }

    #[test]
    fn suffix_scans_from_the_end() {
        assert_eq!(suffix("/a/b/c.txt"), Some("txt"));
        assert_eq!(suffix("/a/b/c.tar.gz"), Some("gz"));
        assert_eq!(suffix("trailing."), Some(""));
        assert_eq!(suffix("noslashnodot"), None);
    }

    #[test]
    fn join_avoids_double_separator() {
        assert_eq!(join("/a", "b"), "/a/b");
        assert_eq!(join("/a/", "b"), "/a/b");
        assert_eq!(join("/", "b"), "/b");
    }

    #[test]
    fn normalize_is_lexical() {
        assert_eq!(normalize("/a//b/./c/"), "/a/b/c");
        assert_eq!(normalize("/a/../../b"), "/b");
        assert_eq!(normalize("a/./b/.."), "a");
        assert_eq!(normalize("../a"), "../a");
        assert_eq!(normalize("a/.."), ".");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn within() {
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a/./b/", "/a/"));
        assert!(is_within("/a", "/a"));
        assert!(!is_within("/ab", "/a"));
        assert!(!is_within("/a", "/a/b"));
        assert!(is_within("/x", "/"));
        assert!(is_within("src/dst", "src"));
        assert!(is_within("./src/dst", "src/"));
        assert!(is_within("b", "."));
        assert!(!is_within("../b", "."));
        assert!(is_within("..b", "."));
    }

    #[test]
    fn prefixes_in_path_order() {
        assert_eq!(
            prefixes("/a/b/c").collect::<Vec<_>>(),
            vec!["/a", "/a/b", "/a/b/c"]
        );
        assert_eq!(prefixes("/a//b/").collect::<Vec<_>>(), vec!["/a", "/a//b"]);
        assert_eq!(prefixes("rel/dir").collect::<Vec<_>>(), vec!["rel", "rel/dir"]);
    }
}
