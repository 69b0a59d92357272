//! Game master files are never shipped; the installer verifies the user's copy

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::{RawSourceFile, SourceOrigin};
use crate::error::StepError;
use crate::modlist::{CleanedEsm, Directive};

pub struct VerifyGameMasters;

impl CompilationStep for VerifyGameMasters {
    fn name(&self) -> &'static str {
        "VerifyGameMasters"
    }

    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        let SourceOrigin::Game { relative } = &source.origin else {
            return Ok(None);
        };
        if !ctx.conventions().is_master(relative) {
            return Ok(None);
        }
        Ok(Some(Classified::new(Directive::CleanedEsm(CleanedEsm {
            to: source.path.clone(),
            hash: source.hash,
            size: source.size,
            source_esm_hash: source.hash,
            game_file: relative.clone(),
            patch_id: None,
        }))))
    }
}
