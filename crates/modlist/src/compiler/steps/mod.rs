//! Compilation steps
//!
//! Each step looks at one source file and either claims it, by returning
//! the directive that reproduces it, or passes. The pipeline runs the steps
//! in order and keeps the first claim.

use super::context::CompilerContext;
use super::source::RawSourceFile;
use crate::error::StepError;
use crate::modlist::{Directive, IgnoredDirectly, InlineBlob, InlineFile};

pub mod direct_match;
pub mod drop_all;
pub mod ignore_game_files;
pub mod ignore_other_profiles;
pub mod ignore_patterns;
pub mod ignore_stock_game_files;
pub mod include_mod_meta;
pub mod include_patches;
pub mod include_profile_files;
pub mod include_remapped_configs;
pub mod include_tagged_mods;
pub mod patch_stock_masters;
pub mod verify_game_masters;

pub use direct_match::DirectMatch;
pub use drop_all::DropAll;
pub use ignore_game_files::IgnoreGameFilesIfOverrideExists;
pub use ignore_other_profiles::IgnoreOtherProfiles;
pub use ignore_patterns::IgnorePatterns;
pub use ignore_stock_game_files::IgnoreStockGameFiles;
pub use include_mod_meta::IncludeModMeta;
pub use include_patches::IncludePatches;
pub use include_profile_files::IncludeProfileFiles;
pub use include_remapped_configs::IncludeRemappedConfigs;
pub use include_tagged_mods::IncludeTaggedMods;
pub use patch_stock_masters::PatchStockMasters;
pub use verify_game_masters::VerifyGameMasters;

/// A directive together with the blobs it introduced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub directive: Directive,
    pub blobs: Vec<InlineBlob>,
}

impl Classified {
    pub fn new(directive: Directive) -> Self {
        Self {
            directive,
            blobs: Vec::new(),
        }
    }

    pub fn with_blob(directive: Directive, blob: InlineBlob) -> Self {
        Self {
            directive,
            blobs: vec![blob],
        }
    }

    /// Embed `data` verbatim as the content of `source`
    pub fn inline(source: &RawSourceFile, data: Vec<u8>) -> Self {
        let blob = InlineBlob::new(data);
        let directive = Directive::InlineFile(InlineFile {
            to: source.path.clone(),
            hash: source.hash,
            size: source.size,
            source_data_id: blob.id.clone(),
        });
        Self::with_blob(directive, blob)
    }

    pub fn ignored(source: &RawSourceFile, reason: impl Into<String>) -> Self {
        Self::new(Directive::IgnoredDirectly(IgnoredDirectly {
            to: source.path.clone(),
            hash: source.hash,
            size: source.size,
            reason: reason.into(),
        }))
    }
}

/// One classification rule
pub trait CompilationStep: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the step does not apply to `source`
    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError>;
}

/// Ordered list of steps
pub struct Pipeline {
    steps: Vec<Box<dyn CompilationStep>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.steps.iter().map(|s| s.name())).finish()
    }
}

impl Pipeline {
    pub fn new(steps: Vec<Box<dyn CompilationStep>>) -> Self {
        Self { steps }
    }

    /// The default rule set, built against `ctx`
    pub fn standard(ctx: &CompilerContext) -> Self {
        Self::new(vec![
            Box::new(IgnorePatterns::new(ctx.conventions())),
            Box::new(IncludeTaggedMods::new(ctx)),
            Box::new(IgnoreGameFilesIfOverrideExists::new(ctx)),
            Box::new(IgnoreOtherProfiles),
            Box::new(IncludeModMeta),
            Box::new(VerifyGameMasters),
            Box::new(PatchStockMasters),
            Box::new(IncludeRemappedConfigs),
            Box::new(DirectMatch),
            Box::new(IncludePatches),
            Box::new(IncludeProfileFiles),
            Box::new(IgnoreStockGameFiles),
            Box::new(DropAll),
        ])
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Run the steps in order and return the first claim
    pub fn classify(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        for step in &self.steps {
            if let Some(classified) = step.run(source, ctx)? {
                return Ok(Some(classified));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::archive::{ArchiveIndex, ZipArchiveReader};
    use crate::compiler::source::{SourceOrigin, scan_sources};
    use crate::config::CompilerConfig;
    use crate::fs::NativeFileSystem;

    pub(crate) fn write(path: &Path, data: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    /// A mod manager root, game and downloads folder under one temp dir
    pub(crate) struct Fixture {
        pub dir: tempfile::TempDir,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            for sub in ["mo2/mods", "mo2/profiles", "game/Data", "downloads"] {
                std::fs::create_dir_all(dir.path().join(sub)).unwrap();
            }
            Self { dir }
        }

        pub fn mo2(&self) -> std::path::PathBuf {
            self.dir.path().join("mo2")
        }

        pub fn game(&self) -> std::path::PathBuf {
            self.dir.path().join("game")
        }

        pub fn downloads(&self) -> std::path::PathBuf {
            self.dir.path().join("downloads")
        }

        pub fn config(&self) -> CompilerConfig {
            CompilerConfig::new(self.mo2(), self.game(), self.downloads())
        }

        pub fn context(&self, config: CompilerConfig) -> CompilerContext {
            let reader = Arc::new(ZipArchiveReader);
            let index = ArchiveIndex::scan(&NativeFileSystem, reader, &config.downloads_dir).unwrap();
            CompilerContext::build(config, Arc::new(NativeFileSystem), index).unwrap()
        }

        pub fn source(&self, ctx: &CompilerContext, path: &str) -> RawSourceFile {
            scan_sources(ctx.fs.as_ref(), &ctx.config)
                .unwrap()
                .into_iter()
                .find(|s| s.path == path)
                .unwrap_or_else(|| panic!("no source file {}", path))
        }
    }

    pub(crate) fn kind(result: Option<Classified>) -> Option<&'static str> {
        result.map(|c| c.directive.kind())
    }

    pub(crate) fn is_game(source: &RawSourceFile) -> bool {
        matches!(source.origin, SourceOrigin::Game { .. })
    }
}
