//! Embeds every file of mods whose metadata carries the include tag

use std::collections::BTreeSet;

use tracing::debug;

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::error::StepError;

pub struct IncludeTaggedMods {
    /// Names of the mods that opted in
    tagged: BTreeSet<String>,
}

impl IncludeTaggedMods {
    pub fn new(ctx: &CompilerContext) -> Self {
        let tag = &ctx.conventions().include_tag;
        let tagged: BTreeSet<String> = ctx
            .mod_meta
            .iter()
            .filter(|(_, meta)| meta.has_tag(tag))
            .map(|(name, _)| name.clone())
            .collect();

        for name in &tagged {
            debug!("Including all files of tagged mod '{}'", name);
        }
        Self { tagged }
    }

    pub fn tagged_mods(&self) -> impl Iterator<Item = &str> {
        self.tagged.iter().map(String::as_str)
    }
}

impl CompilationStep for IncludeTaggedMods {
    fn name(&self) -> &'static str {
        "IncludeTaggedMods"
    }

    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        match source.mod_name() {
            Some(name) if self.tagged.contains(name) => Ok(Some(Classified::inline(source, ctx.read(source)?))),
            _ => Ok(None),
        }
    }
}
