//! Path and filename conventions shared by the builder and the admin backend.
//!
//! Every place that turns user input or directory entries into storage paths
//! goes through here, so the index, the admin operations, and the navigator
//! agree on one spelling of each path:
//!
//! - Folder locations are trimmed of leading/trailing slashes and empty
//!   segments: `"/2025//trips/"` → `"2025/trips"`.
//! - Post filenames always end in `.md`. A filename supplied by the admin has
//!   whitespace runs turned into dashes; without one, the title is slugified
//!   (`"Hello, World!"` → `"hello-world"`), and when even that is empty a
//!   base-36 timestamp is used.
//! - Dotted folder keys (`2025/trips` → `2025.trips`) are how images are
//!   associated with folders by name.

const MAX_SLUG_LEN: usize = 80;

/// Trim slashes and drop empty segments: `"/a//b/"` → `"a/b"`.
pub fn normalize_folder(location: &str) -> String {
    segments(location).join("/")
}

/// Split a slash-delimited location into its non-empty segments.
pub fn segments(location: &str) -> Vec<String> {
    location
        .split('/')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Join folder segments with dots, the image-naming convention for folders.
pub fn dotted(segments: &[String]) -> String {
    segments.join(".")
}

/// Strip a trailing `.ext` from a name (`"a.b.png"` → `"a.b"`).
///
/// A leading dot is not an extension separator: `".png"` is returned as is.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 && !name[pos + 1..].contains('/') => &name[..pos],
        _ => name,
    }
}

/// Pick the stored filename for a post.
///
/// `now_ms` feeds the timestamp fallback so callers (and tests) control it.
pub fn post_filename(requested: Option<&str>, title: &str, now_ms: u64) -> String {
    let stem = match requested.map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => dash_whitespace(name),
        None => {
            let slug = slugify(title);
            if slug.is_empty() { base36(now_ms) } else { slug }
        }
    };
    if stem.ends_with(".md") {
        stem
    } else {
        format!("{stem}.md")
    }
}

/// Replace each run of whitespace with a single dash.
fn dash_whitespace(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Lowercase URL-safe slug from a free-form title.
///
/// - Replaces non-alphanumeric characters (except dashes) with dashes
/// - Collapses consecutive dashes into one
/// - Strips leading and trailing dashes
/// - Truncates to `MAX_SLUG_LEN` characters (breaks at last dash before limit)
pub fn slugify(title: &str) -> String {
    let mut collapsed = String::with_capacity(title.len());
    let mut prev_dash = false;
    for c in title.chars() {
        let c = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '-'
        };
        if c == '-' {
            if !prev_dash {
                collapsed.push('-');
            }
            prev_dash = true;
        } else {
            collapsed.push(c);
            prev_dash = false;
        }
    }

    let trimmed = collapsed.trim_matches('-');
    if trimmed.len() <= MAX_SLUG_LEN {
        return trimmed.to_string();
    }
    let truncated = &trimmed[..MAX_SLUG_LEN];
    match truncated.rfind('-') {
        Some(pos) => truncated[..pos].to_string(),
        None => truncated.to_string(),
    }
}

/// Lowercase base-36 rendering, used for timestamp-derived names.
pub fn base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// `prefix/folder/name`, skipping the folder when it is empty.
pub fn join_under(prefix: &str, folder: &str, name: &str) -> String {
    let folder = normalize_folder(folder);
    let prefix = normalize_folder(prefix);
    [prefix.as_str(), folder.as_str(), name]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
