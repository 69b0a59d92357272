//! Text configs mentioning local paths are embedded with placeholders

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::error::StepError;
use crate::modlist::{Directive, InlineBlob, RemappedInlineFile};

pub struct IncludeRemappedConfigs;

impl CompilationStep for IncludeRemappedConfigs {
    fn name(&self) -> &'static str {
        "IncludeRemappedConfigs"
    }

    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        if !ctx.conventions().is_remappable(&source.path) {
            return Ok(None);
        }
        let Ok(text) = String::from_utf8(ctx.read(source)?) else {
            return Ok(None);
        };
        let Some(remapped) = ctx.remapper.to_placeholders(&text) else {
            return Ok(None);
        };

        let blob = InlineBlob::new(remapped.into_bytes());
        let directive = Directive::RemappedInlineFile(RemappedInlineFile {
            to: source.path.clone(),
            hash: source.hash,
            size: source.size,
            source_data_id: blob.id.clone(),
        });
        Ok(Some(Classified::with_blob(directive, blob)))
    }
}
