//! Artifact file naming.
//!
//! Stored files get a collision-resistant generated name; derived
//! artifacts keep the input's stem and swap the extension.

use std::sync::LazyLock;

use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;

/// Longest stem kept from a user-supplied file name.
const MAX_STEM_LEN: usize = 64;

/// Length of the random suffix in generated names.
const RANDOM_SUFFIX_LEN: usize = 8;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_-]+").expect("static regex is valid")
});

/// Lowercased extension of `file_name`, without the dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Reduce a user-supplied name to a filesystem- and URL-safe stem.
///
/// ```
/// use sketchbook_core::naming::sanitize_stem;
///
/// assert_eq!(sanitize_stem("My Sketch (v2).pde"), "My_Sketch_v2");
/// assert_eq!(sanitize_stem("../../etc"), "etc");
/// ```
pub fn sanitize_stem(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let cleaned = UNSAFE_CHARS.replace_all(stem, "_");
    let trimmed = cleaned.trim_matches('_');
    let mut stem: String = trimmed.chars().take(MAX_STEM_LEN).collect();
    if stem.is_empty() {
        stem.push_str("file");
    }
    stem
}

/// Generate a unique stored file name: `<unix_millis>_<random>_<stem>.<ext>`.
pub fn generate_file_name(original_name: &str, ext: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("{millis}_{suffix}_{}.{ext}", sanitize_stem(original_name))
}

/// Name of a derived artifact: the input's name with its extension
/// replaced by `new_ext` (appended when the input has none).
///
/// ```
/// use sketchbook_core::naming::derived_file_name;
///
/// assert_eq!(derived_file_name("sketch.pde", "js"), "sketch.js");
/// assert_eq!(derived_file_name("photo.large.png", "webp"), "photo.large.webp");
/// assert_eq!(derived_file_name("README", "js"), "README.js");
/// ```
pub fn derived_file_name(input_name: &str, new_ext: &str) -> String {
    match input_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{new_ext}"),
        _ => format!("{input_name}.{new_ext}"),
    }
}

/// Opaque correlation token passed through the conversion function.
pub fn new_canvas_id() -> String {
    format!("canvas_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("A.PDE").as_deref(), Some("pde"));
        assert_eq!(file_extension("noext"), None);
        assert_eq!(file_extension(".hidden"), None);
        assert_eq!(file_extension("trailing."), None);
    }

    #[test]
    fn generated_names_are_unique_and_safe() {
        let a = generate_file_name("my sketch.pde", "pde");
        let b = generate_file_name("my sketch.pde", "pde");
        assert_ne!(a, b);
        assert!(a.ends_with("_my_sketch.pde"), "got {a}");
        assert!(!a.contains(' '));
        assert!(!a.contains('/'));
    }

    #[test]
    fn empty_stem_gets_placeholder() {
        assert_eq!(sanitize_stem("???.pde"), "file");
        assert_eq!(sanitize_stem(""), "file");
    }

    #[test]
    fn long_stems_are_truncated() {
        let long = "a".repeat(200);
        assert_eq!(sanitize_stem(&format!("{long}.pde")).len(), MAX_STEM_LEN);
    }

    #[test]
    fn derived_name_strips_only_last_extension() {
        assert_eq!(derived_file_name("a.b.pde", "js"), "a.b.js");
        assert_eq!(derived_file_name(".pde", "js"), ".pde.js");
    }

    #[test]
    fn canvas_ids_are_distinct() {
        let a = new_canvas_id();
        assert!(a.starts_with("canvas_"));
        assert_ne!(a, new_canvas_id());
    }
}
