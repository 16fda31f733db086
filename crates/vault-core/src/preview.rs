//! Helpers for presenting stored files.

use serde::{Deserialize, Serialize};

/// How a file should be rendered, chosen from its MIME type only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    Image,
    Video,
    Document,
}

impl PreviewKind {
    pub fn from_mime(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            PreviewKind::Image
        } else if mime_type.starts_with("video/") {
            PreviewKind::Video
        } else {
            PreviewKind::Document
        }
    }
}

const MAX_NAME_CHARS: usize = 100;
const HEAD_CHARS: usize = 50;
const TAIL_CHARS: usize = 45;

/// Byte count as megabytes with two decimals, e.g. `"1.50 MB"`.
pub fn format_size(bytes: i64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Shorten long names to the first 50 and last 45 characters.
pub fn truncate_name(name: &str) -> String {
    let len = name.chars().count();
    if len <= MAX_NAME_CHARS {
        return name.to_string();
    }
    let head: String = name.chars().take(HEAD_CHARS).collect();
    let tail: String = name.chars().skip(len - TAIL_CHARS).collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_prefix_selects_kind() {
        assert_eq!(PreviewKind::from_mime("image/png"), PreviewKind::Image);
        assert_eq!(PreviewKind::from_mime("video/mp4"), PreviewKind::Video);
        assert_eq!(PreviewKind::from_mime("application/pdf"), PreviewKind::Document);
        assert_eq!(PreviewKind::from_mime(""), PreviewKind::Document);
    }

    #[test]
    fn size_is_megabytes() {
        assert_eq!(format_size(0), "0.00 MB");
        assert_eq!(format_size(1_572_864), "1.50 MB");
    }

    #[test]
    fn short_names_untouched() {
        let name = "a".repeat(100);
        assert_eq!(truncate_name(&name), name);
    }

    #[test]
    fn long_names_keep_head_and_tail() {
        let name = format!("{}{}{}", "h".repeat(50), "m".repeat(20), "t".repeat(45));
        let short = truncate_name(&name);
        assert_eq!(short, format!("{}...{}", "h".repeat(50), "t".repeat(45)));
        assert_eq!(short.chars().count(), 98);
    }
}
