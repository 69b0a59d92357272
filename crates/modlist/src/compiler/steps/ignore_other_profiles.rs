//! Excludes files of profiles that are not part of the list

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::{RawSourceFile, SourceOrigin};
use crate::error::StepError;

pub struct IgnoreOtherProfiles;

impl CompilationStep for IgnoreOtherProfiles {
    fn name(&self) -> &'static str {
        "IgnoreOtherProfiles"
    }

    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        match &source.origin {
            SourceOrigin::Profile { name } if !ctx.config.includes_profile(name) => {
                Ok(Some(Classified::ignored(source, format!("profile '{}' not selected", name))))
            }
            _ => Ok(None),
        }
    }
}
