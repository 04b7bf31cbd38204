//! Display-path computation for findings.
//!
//! Fetched trees can sit behind filesystem abstractions where a naive
//! relative-path computation throws or yields nonsense, so this walks a
//! layered fallback chain and always returns something usable for display.
//! The result is not guaranteed to be a mathematically correct relative
//! path.

use std::path::Path;

/// Make `file` relative to `root` for display, forward slashes always.
///
/// Priority: textual prefix strip (ASCII-case-insensitive), then
/// cross-volume heuristics (segment matching the root's final name, then
/// a literal `src` segment), then a platform-relative computation, then
/// the bare file name.
pub fn display_path(root: &Path, file: &Path) -> String {
    let root_str = normalize(root);
    let file_str = normalize(file);

    // Byte-wise ASCII folding: Unicode folding can change byte lengths
    // (dotted I, the Kelvin sign) and push the strip offset off a char
    // boundary.
    if !root_str.is_empty()
        && file_str.len() >= root_str.len()
        && file_str.as_bytes()[..root_str.len()]
            .eq_ignore_ascii_case(root_str.as_bytes())
    {
        let stripped = &file_str[root_str.len()..];
        let stripped = stripped.strip_prefix('/').unwrap_or(stripped);
        if !stripped.is_empty() {
            return stripped.to_string();
        }
    }

    if volume(&root_str) != volume(&file_str) {
        return cross_volume_fallback(&root_str, &file_str);
    }

    match relative_segments(&root_str, &file_str) {
        Some(rel) if rel.starts_with("..") || rel.contains(':') => {
            cross_volume_fallback(&root_str, &file_str)
        }
        Some(rel) => rel,
        None => file_name(&file_str),
    }
}

fn cross_volume_fallback(root_str: &str, file_str: &str) -> String {
    if let Some(rel) = after_segment_named(root_str, file_str) {
        return rel;
    }
    if let Some(rel) = from_src_segment(file_str) {
        return rel;
    }
    file_name(file_str)
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Volume marker of a normalized path: a drive prefix, `/` for rooted
/// POSIX paths, `None` for relative ones.
fn volume(path: &str) -> Option<String> {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
    {
        return Some(path[..2].to_ascii_lowercase());
    }
    if path.starts_with('/') {
        return Some("/".to_string());
    }
    None
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Segments of `file` after the one matching `root`'s final segment name,
/// compared case-insensitively.
fn after_segment_named(root_str: &str, file_str: &str) -> Option<String> {
    let root_name = segments(root_str).into_iter().next_back()?;
    let parts = segments(file_str);
    let idx = parts
        .iter()
        .position(|part| part.eq_ignore_ascii_case(root_name))?;
    let rest = &parts[idx + 1..];
    if rest.is_empty() {
        return None;
    }
    Some(rest.join("/"))
}

/// Segments of `file` from a literal `src` segment, inclusive.
fn from_src_segment(file_str: &str) -> Option<String> {
    let parts = segments(file_str);
    let idx = parts.iter().position(|part| *part == "src")?;
    Some(parts[idx..].join("/"))
}

fn file_name(file_str: &str) -> String {
    segments(file_str)
        .into_iter()
        .next_back()
        .unwrap_or(file_str)
        .to_string()
}

/// Plain segment-wise relative computation. Case-sensitive, `..` chains
/// for the unshared part of `root`. `None` when the result is empty.
fn relative_segments(root_str: &str, file_str: &str) -> Option<String> {
    let root_parts = segments(root_str);
    let file_parts = segments(file_str);
    let common = root_parts
        .iter()
        .zip(file_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    for _ in common..root_parts.len() {
        parts.push("..");
    }
    parts.extend(&file_parts[common..]);
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(root: &str, file: &str) -> String {
        display_path(Path::new(root), Path::new(file))
    }

    #[test]
    fn strips_the_root_prefix() {
        assert_eq!(rel("/repo", "/repo/src/A.java"), "src/A.java");
    }

    #[test]
    fn prefix_match_ignores_case() {
        assert_eq!(rel("/Repo", "/repo/src/Main.java"), "src/Main.java");
    }

    #[test]
    fn prefix_fold_stays_byte_aligned_for_multibyte_roots() {
        // Unicode-lowercasing either root changes its byte length, so the
        // prefix check must not hand its offset to the unfolded string.
        assert_eq!(rel("/\u{130}", "/i\u{307}/src/A.java"), "src/A.java");
        assert_eq!(rel("/\u{212A}", "/k/src/App.java"), "src/App.java");
    }

    #[test]
    fn backslashes_become_forward_slashes() {
        assert_eq!(
            rel("C:\\work\\repo", "C:\\work\\repo\\src\\Main.java"),
            "src/Main.java"
        );
    }

    #[test]
    fn mismatched_volume_matches_root_name_segment() {
        assert_eq!(
            rel("D:/work/project", "C:/mnt/project/src/App.java"),
            "src/App.java"
        );
    }

    #[test]
    fn mismatched_volume_falls_back_to_src_segment() {
        assert_eq!(
            rel("D:/work/engine", "C:/checkout/src/Lib.java"),
            "src/Lib.java"
        );
    }

    #[test]
    fn mismatched_volume_last_resort_is_file_name() {
        assert_eq!(rel("D:/x/y", "C:/a/b/Thing.java"), "Thing.java");
    }

    #[test]
    fn escaping_relative_result_reapplies_heuristics() {
        // Same volume, sibling checkout with the same leaf folder name.
        assert_eq!(
            rel(
                "/builds/agent1/work",
                "/builds/agent2/work/src/Main.java"
            ),
            "src/Main.java"
        );
        // Nothing matches at all.
        assert_eq!(rel("/repo/sub", "/other/place/File.java"), "File.java");
    }

    #[test]
    fn identical_paths_degrade_to_the_file_name() {
        assert_eq!(rel("/repo/src/A.java", "/repo/src/A.java"), "A.java");
    }
}
