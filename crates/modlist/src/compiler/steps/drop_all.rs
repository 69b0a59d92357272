//! Catch-all: anything left cannot be reproduced

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::error::StepError;
use crate::modlist::{Directive, NoMatch};

pub struct DropAll;

impl CompilationStep for DropAll {
    fn name(&self) -> &'static str {
        "DropAll"
    }

    fn run(&self, source: &RawSourceFile, _ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        Ok(Some(Classified::new(Directive::NoMatch(NoMatch {
            to: source.path.clone(),
            hash: source.hash,
            size: source.size,
            reason: "no archive contains this file".to_string(),
        }))))
    }
}
