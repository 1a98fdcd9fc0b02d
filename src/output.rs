//! CLI output formatting.
//!
//! Output leads with what a post *is* (its date and title) and shows where it
//! lives as indented context lines, so a listing reads like a table of
//! contents rather than a directory dump.
//!
//! # Output Format
//!
//! ## Index (`folio build`)
//!
//! ```text
//! Posts (6 posts, 3 folders)
//! travel/ (3 posts)
//!     japan/ (2 posts)
//!         2025-03-10 Tokyo Nights
//!             Path: travel/japan/tokyo
//!     2023-09-15 Lisbon in September
//!         Path: travel/lisbon
//! 2024-05-01 About
//!     Path: about
//! ```
//!
//! ## Search (`folio search`)
//!
//! ```text
//! 2 results for "japan"
//! 2025-03-10 folder  travel/japan
//! 2025-03-10 post    Tokyo Nights (travel/japan/tokyo)
//! ```
//!
//! Each view has a `format_*` function returning lines, for tests, and a
//! `print_*` wrapper that writes them to stdout.

use crate::navigate::{Entry, Resolution, listing};
use crate::rebuild::RebuildOutcome;
use crate::types::{ContentFile, FolderNode};
use chrono::DateTime;

// ============================================================================
// Shared helpers
// ============================================================================

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `YYYY-MM-DD` in UTC, or dashes when there is no timestamp.
fn format_date(ms: Option<i64>) -> String {
    ms.and_then(DateTime::from_timestamp_millis)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "----------".to_string())
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn folder_header(name: &str, node: &FolderNode) -> String {
    format!("{name}/ ({})", plural(node.file_count(), "post", "posts"))
}

fn post_lines(file: &ContentFile, depth: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{}{} {}",
        indent(depth),
        format_date(Some(file.mtime_ms)),
        file.display_name()
    )];
    lines.push(format!("{}Path: {}", indent(depth + 1), file.path));
    if let Some(cover) = &file.cover {
        lines.push(format!("{}Cover: {cover}", indent(depth + 1)));
    }
    lines
}

/// Lines for a folder's contents, newest first, recursing into subfolders.
fn tree_lines(node: &FolderNode, base: &[String], depth: usize, lines: &mut Vec<String>) {
    for entry in listing(node, base) {
        match entry {
            Entry::Folder {
                name,
                node: child,
                segments,
            } => {
                lines.push(format!("{}{}", indent(depth), folder_header(name, child)));
                tree_lines(child, &segments, depth + 1, lines);
            }
            Entry::File { file, .. } => lines.extend(post_lines(file, depth)),
        }
    }
}

// ============================================================================
// Index
// ============================================================================

/// The whole index as an indented tree.
pub fn format_index(root: &FolderNode) -> Vec<String> {
    let mut lines = vec![format!(
        "Posts ({}, {})",
        plural(root.file_count(), "post", "posts"),
        plural(root.folder_count(), "folder", "folders")
    )];
    tree_lines(root, &[], 0, &mut lines);
    lines
}

pub fn print_index(root: &FolderNode) {
    for line in format_index(root) {
        println!("{line}");
    }
}

// ============================================================================
// Search
// ============================================================================

pub fn format_search_results(query: &str, entries: &[Entry<'_>]) -> Vec<String> {
    let mut lines = vec![format!(
        "{} for \"{query}\"",
        plural(entries.len(), "result", "results")
    )];
    for entry in entries {
        let date = format_date(entry.timestamp());
        let line = match entry {
            Entry::Folder { .. } => format!("{date} folder  {}", entry.path()),
            Entry::File { .. } => format!("{date} post    {} ({})", entry.name(), entry.path()),
        };
        lines.push(line);
    }
    lines
}

pub fn print_search_results(query: &str, entries: &[Entry<'_>]) {
    for line in format_search_results(query, entries) {
        println!("{line}");
    }
}

// ============================================================================
// Show
// ============================================================================

/// A resolved path: a folder listing, or a post's details.
pub fn format_resolution(request: &str, resolution: &Resolution<'_>) -> Vec<String> {
    match resolution {
        Resolution::Root(root) => format_index(root),
        Resolution::Folder { node, segments } => {
            let mut lines = vec![folder_header(&segments.join("/"), node)];
            if let Some(cover) = &node.cover {
                lines.push(format!("{}Cover: {cover}", indent(1)));
            }
            tree_lines(node, segments, 1, &mut lines);
            lines
        }
        Resolution::File { file, .. } => {
            let mut lines = vec![format!(
                "{} {}",
                format_date(Some(file.mtime_ms)),
                file.display_name()
            )];
            lines.push(format!("{}Source: {}", indent(1), file.file));
            lines.push(format!("{}Path: {}", indent(1), file.path));
            if !file.description().is_empty() {
                lines.push(format!("{}Description: {}", indent(1), file.description()));
            }
            if let Some(cover) = &file.cover {
                lines.push(format!("{}Cover: {cover}", indent(1)));
            }
            for (key, value) in &file.meta {
                if key != "Title" && key != "Description" {
                    lines.push(format!("{}{key}: {value}", indent(1)));
                }
            }
            lines
        }
        Resolution::NotFound => vec![format!("Not found: {request}")],
    }
}

pub fn print_resolution(request: &str, resolution: &Resolution<'_>) {
    for line in format_resolution(request, resolution) {
        println!("{line}");
    }
}

// ============================================================================
// Folders / rebuild
// ============================================================================

pub fn format_folders(folders: &[String]) -> Vec<String> {
    if folders.is_empty() {
        return vec!["No folders".to_string()];
    }
    folders.to_vec()
}

pub fn print_folders(folders: &[String]) {
    for line in format_folders(folders) {
        println!("{line}");
    }
}

pub fn format_rebuild(outcome: &RebuildOutcome) -> String {
    match outcome {
        RebuildOutcome::Success { files, folders } => format!(
            "Index rebuilt: {} in {}",
            plural(*files, "post", "posts"),
            plural(*folders, "folder", "folders")
        ),
        RebuildOutcome::Failure { detail } => format!("Rebuild failed: {detail}"),
        RebuildOutcome::TimedOut { after_secs } => format!("Rebuild timed out after {after_secs}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::navigate::{SearchFilter, resolve, search, split_path};
    use crate::scan::scan_site;
    use crate::test_helpers::*;

    fn fixture_tree() -> FolderNode {
        let tmp = setup_fixtures();
        scan_site(tmp.path(), &SiteConfig::default()).unwrap()
    }

    // =========================================================================
    // Index tree
    // =========================================================================

    #[test]
    fn index_header_counts_posts_and_folders() {
        let lines = format_index(&fixture_tree());
        assert_eq!(lines[0], "Posts (6 posts, 3 folders)");
    }

    #[test]
    fn index_nests_folders_newest_first() {
        let lines = format_index(&fixture_tree());
        let travel = lines.iter().position(|l| l == "travel/ (3 posts)").unwrap();
        assert_eq!(lines[travel + 1], "    japan/ (2 posts)");
        assert_eq!(lines[travel + 2], "        2025-03-10 Tokyo Nights");
        assert_eq!(lines[travel + 3], "            Path: travel/japan/tokyo");
        // travel (2025) sorts above blog (2024)
        let blog = lines.iter().position(|l| l == "blog/ (2 posts)").unwrap();
        assert!(travel < blog);
    }

    #[test]
    fn empty_index() {
        assert_eq!(format_index(&FolderNode::default()), vec!["Posts (0 posts, 0 folders)"]);
    }

    // =========================================================================
    // Search / show
    // =========================================================================

    #[test]
    fn search_results_label_kinds() {
        let tree = fixture_tree();
        let results = search(&tree, &[], "japan", SearchFilter::All);
        let lines = format_search_results("japan", &results);
        assert_eq!(lines[0], format!("{} for \"japan\"", plural(results.len(), "result", "results")));
        assert!(lines.contains(&"2025-03-10 folder  travel/japan".to_string()));
    }

    #[test]
    fn no_results_line() {
        assert_eq!(format_search_results("zzz", &[]), vec!["0 results for \"zzz\""]);
    }

    #[test]
    fn show_post_details() {
        let tree = fixture_tree();
        let segments = split_path("/posts/travel/japan/tokyo", "posts");
        let lines = format_resolution("travel/japan/tokyo", &resolve(&tree, &segments));
        assert_eq!(lines[0], "2025-03-10 Tokyo Nights");
        assert!(lines.contains(&"    Source: /posts/travel/japan/tokyo.md".to_string()));
        assert!(lines.contains(&"    Description: Neon and ramen".to_string()));
        assert!(lines.contains(&"    Date: 2025-03-10".to_string()));
    }

    #[test]
    fn show_folder_and_missing() {
        let tree = fixture_tree();
        let lines = format_resolution("blog", &resolve(&tree, &split_path("blog", "posts")));
        assert_eq!(lines[0], "blog/ (2 posts)");
        assert_eq!(lines[1], "    Cover: /public/posts/blog.png");

        let missing = format_resolution("nope", &Resolution::NotFound);
        assert_eq!(missing, vec!["Not found: nope"]);
    }

    // =========================================================================
    // Folders / rebuild
    // =========================================================================

    #[test]
    fn folders_listing() {
        assert_eq!(format_folders(&[]), vec!["No folders"]);
        assert_eq!(format_folders(&["/a/".to_string()]), vec!["/a/"]);
    }

    #[test]
    fn rebuild_lines() {
        assert_eq!(
            format_rebuild(&RebuildOutcome::Success { files: 1, folders: 2 }),
            "Index rebuilt: 1 post in 2 folders"
        );
        assert_eq!(
            format_rebuild(&RebuildOutcome::TimedOut { after_secs: 30 }),
            "Rebuild timed out after 30s"
        );
        assert_eq!(
            format_rebuild(&RebuildOutcome::Failure { detail: "x".into() }),
            "Rebuild failed: x"
        );
    }
}
