//! Mod metadata (`meta.ini`) reading
//!
//! Only the `[General]` section is read. A file that is missing, not UTF-8
//! or otherwise unreadable yields empty metadata.

use std::path::Path;

use tracing::debug;

use crate::fs::FileSystem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModMeta {
    pub notes: String,
    pub comments: String,
    /// Archive the mod was installed from, as recorded by the mod manager
    pub installation_file: Option<String>,
}

impl ModMeta {
    pub fn parse(text: &str) -> Self {
        let mut meta = ModMeta::default();
        let mut in_general = false;

        for line in text.lines() {
            let line = line.trim();
            if line.starts_with('[') && line.ends_with(']') {
                in_general = line[1..line.len() - 1].trim().eq_ignore_ascii_case("General");
                continue;
            }
            if !in_general || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "notes" => meta.notes = value,
                "comments" => meta.comments = value,
                "installationfile" if !value.is_empty() => meta.installation_file = Some(value),
                _ => {}
            }
        }

        meta
    }

    /// Read metadata from `path`, treating any failure as empty metadata
    pub fn read(fs: &dyn FileSystem, path: &Path) -> Self {
        if !fs.exists(path) {
            return Self::default();
        }
        match fs.read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(e) => {
                debug!("Ignoring unreadable metadata {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Whether `tag` appears in the notes or comments
    pub fn has_tag(&self, tag: &str) -> bool {
        !tag.is_empty() && (self.notes.contains(tag) || self.comments.contains(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::NativeFileSystem;

    #[test]
    fn test_parse_general_section() {
        let meta = ModMeta::parse(
            "[General]\ngameName=SkyrimSE\nnotes=\"keep this WABBAJACK_INCLUDE\"\n\
             installationFile=Some Mod-1234-1-0.zip\n[installedFiles]\nnotes=not me\n",
        );
        assert!(meta.has_tag("WABBAJACK_INCLUDE"));
        assert_eq!(meta.notes, "keep this WABBAJACK_INCLUDE");
        assert_eq!(meta.installation_file.as_deref(), Some("Some Mod-1234-1-0.zip"));
    }

    #[test]
    fn test_tag_in_comments_only() {
        let meta = ModMeta::parse("[General]\ncomments=WABBAJACK_INCLUDE\n");
        assert!(meta.has_tag("WABBAJACK_INCLUDE"));
        assert!(!meta.has_tag(""));
    }

    #[test]
    fn test_garbled_or_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let garbled = dir.path().join("meta.ini");
        std::fs::write(&garbled, [0xff, 0xfe, 0x00, 0x9c]).unwrap();

        assert_eq!(ModMeta::read(&NativeFileSystem, &garbled), ModMeta::default());
        assert_eq!(ModMeta::read(&NativeFileSystem, &dir.path().join("nope.ini")), ModMeta::default());
        assert_eq!(ModMeta::parse("notes=outside any section"), ModMeta::default());
    }
}
