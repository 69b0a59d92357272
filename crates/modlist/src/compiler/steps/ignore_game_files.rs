//! Skips the real game folder when the author keeps game files in the override directory

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::error::StepError;

pub struct IgnoreGameFilesIfOverrideExists {
    override_exists: bool,
}

impl IgnoreGameFilesIfOverrideExists {
    pub fn new(ctx: &CompilerContext) -> Self {
        let dir = ctx.config.source_dir.join(&ctx.conventions().game_folder_files_dir);
        Self {
            override_exists: ctx.fs.is_dir(&dir),
        }
    }
}

impl CompilationStep for IgnoreGameFilesIfOverrideExists {
    fn name(&self) -> &'static str {
        "IgnoreGameFilesIfOverrideExists"
    }

    fn run(&self, source: &RawSourceFile, _ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        if self.override_exists && source.is_game_file() {
            return Ok(Some(Classified::ignored(source, "game folder files are overridden")));
        }
        Ok(None)
    }
}
