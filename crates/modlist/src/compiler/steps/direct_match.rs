//! Files whose exact bytes exist in a downloaded archive

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::error::StepError;
use crate::modlist::{ArchiveHashPath, Directive, FromArchive};

pub struct DirectMatch;

impl CompilationStep for DirectMatch {
    fn name(&self) -> &'static str {
        "DirectMatch"
    }

    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        let Some(entry) = ctx.index.find_by_hash(&source.hash)? else {
            return Ok(None);
        };
        Ok(Some(Classified::new(Directive::FromArchive(FromArchive::new(
            source.path.clone(),
            source.hash,
            source.size,
            ArchiveHashPath::new(entry.archive, entry.path.clone()),
        )))))
    }
}
