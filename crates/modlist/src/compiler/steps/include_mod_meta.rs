//! Embeds each mod's metadata file

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::error::StepError;

pub struct IncludeModMeta;

impl CompilationStep for IncludeModMeta {
    fn name(&self) -> &'static str {
        "IncludeModMeta"
    }

    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        if source.mod_name().is_none() || !source.inner_path().eq_ignore_ascii_case(&ctx.conventions().mod_meta_file) {
            return Ok(None);
        }
        Ok(Some(Classified::inline(source, ctx.read(source)?)))
    }
}
