//! Read-only state shared by every compilation step

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use super::meta::ModMeta;
use super::source::RawSourceFile;
use crate::archive::ArchiveIndex;
use crate::config::{CompilerConfig, Conventions};
use crate::error::{CompileError, StepError};
use crate::fs::FileSystem;
use crate::hashing::Hash;
use crate::modlist::PathRemapper;
use crate::paths;

/// A stock master file of the game installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameMaster {
    /// Path relative to the game directory
    pub game_file: String,
    pub path: PathBuf,
    pub hash: Hash,
}

pub struct CompilerContext {
    pub config: CompilerConfig,
    pub fs: Arc<dyn FileSystem>,
    pub index: ArchiveIndex,
    /// Metadata per mod name
    pub mod_meta: HashMap<String, ModMeta>,
    /// Stock masters by lowercase file name
    pub game_masters: HashMap<String, GameMaster>,
    pub remapper: PathRemapper,
}

impl std::fmt::Debug for CompilerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilerContext")
            .field("source_dir", &self.config.source_dir)
            .field("index", &self.index)
            .field("mods", &self.mod_meta.len())
            .field("game_masters", &self.game_masters.len())
            .finish()
    }
}

impl CompilerContext {
    pub fn build(config: CompilerConfig, fs: Arc<dyn FileSystem>, index: ArchiveIndex) -> Result<Self, CompileError> {
        let mod_meta = read_mod_meta(fs.as_ref(), &config)?;
        let game_masters = find_game_masters(fs.as_ref(), &config)?;
        let remapper = PathRemapper::new(&config.game_dir, &config.source_dir, &config.downloads_dir);

        debug!(
            "Compiler context: {} mods with metadata, {} game masters",
            mod_meta.len(),
            game_masters.len()
        );

        Ok(Self {
            config,
            fs,
            index,
            mod_meta,
            game_masters,
            remapper,
        })
    }

    pub fn conventions(&self) -> &Conventions {
        &self.config.conventions
    }

    pub fn meta_for(&self, source: &RawSourceFile) -> Option<&ModMeta> {
        source.mod_name().and_then(|name| self.mod_meta.get(name))
    }

    pub fn read(&self, source: &RawSourceFile) -> Result<Vec<u8>, StepError> {
        self.fs.read(&source.abs_path).map_err(|e| StepError::Read {
            path: source.abs_path.clone(),
            source: e,
        })
    }
}

fn read_mod_meta(fs: &dyn FileSystem, config: &CompilerConfig) -> Result<HashMap<String, ModMeta>, CompileError> {
    let mods_root = config.source_dir.join(&config.conventions.mods_dir);
    let mut metas = HashMap::new();

    for dir in fs.list_dirs(&mods_root).map_err(|source| CompileError::Scan {
        path: mods_root.clone(),
        source,
    })? {
        if dir.parent() != Some(mods_root.as_path()) {
            continue;
        }
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let meta = ModMeta::read(fs, &dir.join(&config.conventions.mod_meta_file));
        metas.insert(name, meta);
    }

    Ok(metas)
}

fn find_game_masters(fs: &dyn FileSystem, config: &CompilerConfig) -> Result<HashMap<String, GameMaster>, CompileError> {
    let conventions = &config.conventions;
    let data_dir = paths::join(&config.game_dir, &conventions.game_data_dir);
    let files = fs.list_files(&data_dir).map_err(|source| CompileError::Scan {
        path: data_dir.clone(),
        source,
    })?;

    let masters: Vec<GameMaster> = files
        .par_iter()
        .filter(|f| conventions.is_master(&f.relative))
        .filter_map(|f| match fs.hash(&f.path) {
            Ok((hash, _)) => Some(GameMaster {
                game_file: format!("{}/{}", conventions.game_data_dir.trim_end_matches('/'), f.relative),
                path: f.path.clone(),
                hash,
            }),
            Err(e) => {
                warn!("Could not hash game master {}: {}", f.path.display(), e);
                None
            }
        })
        .collect();

    Ok(masters
        .into_iter()
        .map(|m| (paths::file_name(&m.game_file).to_lowercase(), m))
        .collect())
}
