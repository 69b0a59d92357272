//! Profile files of selected profiles are embedded as-is

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::{RawSourceFile, SourceOrigin};
use crate::error::StepError;

pub struct IncludeProfileFiles;

impl CompilationStep for IncludeProfileFiles {
    fn name(&self) -> &'static str {
        "IncludeProfileFiles"
    }

    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        match &source.origin {
            SourceOrigin::Profile { name } if ctx.config.includes_profile(name) => {
                Ok(Some(Classified::inline(source, ctx.read(source)?)))
            }
            _ => Ok(None),
        }
    }
}
