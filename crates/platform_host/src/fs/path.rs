//! Virtual-path normalization and root-convention rewriting.

/// Normalizes a virtual filesystem path.
///
/// Trims whitespace, converts backslashes to `/`, resolves `.`/`..`, ensures a leading slash, and
/// returns `/` for empty or fully-collapsed paths.
pub fn normalize_virtual_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let mut out = String::new();
    for segment in trimmed.replace('\\', "/").split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if let Some(idx) = out.rfind('/') {
                    out.truncate(idx);
                }
            }
            _ => {
                out.push('/');
                out.push_str(segment);
            }
        }
    }

    if out.is_empty() {
        "/".to_string()
    } else {
        out
    }
}

/// Rewrites `path` from the `from` root to the `to` root when it lives under `from`.
///
/// Both roots are compared segment-wise after normalization, so `/home` matches `/home` and
/// `/home/a` but not `/homework`. Returns `None` when `path` is outside `from`.
pub fn rewrite_path_prefix(path: &str, from: &str, to: &str) -> Option<String> {
    let path = normalize_virtual_path(path);
    let from = normalize_virtual_path(from);
    let to = normalize_virtual_path(to);

    let rest = if from == "/" {
        path.as_str()
    } else if path == from {
        ""
    } else {
        path.strip_prefix(&from)
            .filter(|rest| rest.starts_with('/'))?
    };

    Some(normalize_virtual_path(&format!("{to}{rest}")))
}

#[cfg(test)]
mod tests {
    use super::{normalize_virtual_path, rewrite_path_prefix};

    #[test]
    fn saved_paths_normalize_to_absolute_slash_paths() {
        for (saved, expected) in [
            ("", "/"),
            ("Users/guest", "/Users/guest"),
            ("/Users//guest/Pictures/", "/Users/guest/Pictures"),
            ("/Users/guest/./Documents/../Pictures", "/Users/guest/Pictures"),
            ("C:\\Users\\guest", "/C:/Users/guest"),
            ("/Users/../../..", "/"),
        ] {
            assert_eq!(normalize_virtual_path(saved), expected, "saved={saved:?}");
        }
    }

    #[test]
    fn rewrite_path_prefix_respects_segment_boundaries() {
        assert_eq!(
            rewrite_path_prefix("/home/guest/Documents", "/home", "/Users"),
            Some("/Users/guest/Documents".to_string())
        );
        assert_eq!(
            rewrite_path_prefix("/home", "/home/", "/Users/"),
            Some("/Users".to_string())
        );
        assert_eq!(rewrite_path_prefix("/homework/a", "/home", "/Users"), None);
        assert_eq!(rewrite_path_prefix("/Users/guest", "/home", "/Users"), None);
    }
}
