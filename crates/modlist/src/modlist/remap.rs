//! Machine-specific path placeholders in embedded text files
//!
//! Config files often contain absolute paths to the game, the mod manager
//! root or the downloads folder. Those are swapped for placeholders when the
//! list is compiled and swapped back for the installer's own paths.

use std::path::Path;

const GAME: &str = "GAME_PATH_MAGIC";
const MO2: &str = "MO2_PATH_MAGIC";
const DOWNLOAD: &str = "DOWNLOAD_PATH_MAGIC";

/// Placeholder substitution for one set of root paths
#[derive(Debug, Clone)]
pub struct PathRemapper {
    /// (concrete text, placeholder), longest concrete text first
    replacements: Vec<(String, String)>,
}

fn forms(root: &Path, magic: &str) -> Vec<(String, String)> {
    let raw = root.to_string_lossy();
    let raw = raw.trim_end_matches(['/', '\\']);
    if raw.is_empty() {
        return Vec::new();
    }
    let back = raw.replace('/', "\\");
    vec![
        (back.replace('\\', "\\\\"), format!("{{{}_DOUBLE_BACK}}", magic)),
        (back, format!("{{{}_BACK}}", magic)),
        (raw.replace('\\', "/"), format!("{{{}_FORWARD}}", magic)),
    ]
}

impl PathRemapper {
    /// `mo2` is the mod manager root: the source root when compiling, the install root when installing
    pub fn new(game: &Path, mo2: &Path, downloads: &Path) -> Self {
        let mut replacements: Vec<(String, String)> = forms(game, GAME)
            .into_iter()
            .chain(forms(mo2, MO2))
            .chain(forms(downloads, DOWNLOAD))
            .collect();
        replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.1.cmp(&b.1)));
        Self { replacements }
    }

    /// Replace concrete paths with placeholders; `None` when the text mentions none of them
    pub fn to_placeholders(&self, text: &str) -> Option<String> {
        let mut out = text.to_string();
        let mut changed = false;
        for (concrete, placeholder) in &self.replacements {
            if out.contains(concrete.as_str()) {
                out = out.replace(concrete.as_str(), placeholder);
                changed = true;
            }
        }
        changed.then_some(out)
    }

    /// Replace every placeholder with this remapper's concrete paths
    pub fn expand_placeholders(&self, text: &str) -> String {
        self.replacements
            .iter()
            .fold(text.to_string(), |acc, (concrete, placeholder)| acc.replace(placeholder.as_str(), concrete))
    }
}
