//! Modified archive files are shipped as a patch against the original entry
//!
//! The base entry comes from the archive the mod was installed from when the
//! mod manager recorded one. Only when that fails are same-named entries
//! across all archives considered.

use std::cmp::Reverse;

use tracing::debug;

use super::{Classified, CompilationStep};
use crate::archive::EntryRef;
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::error::StepError;
use crate::modlist::{ArchiveHashPath, Directive, InlineBlob, PatchedFromArchive};
use crate::{patch, paths};

pub struct IncludePatches;

impl IncludePatches {
    /// Entry of the mod's own installation archive sharing the longest path suffix
    fn from_installation_file<'a>(
        &self,
        source: &RawSourceFile,
        ctx: &'a CompilerContext,
    ) -> Result<Option<&'a EntryRef>, StepError> {
        let Some(file) = ctx.meta_for(source).and_then(|m| m.installation_file.as_deref()) else {
            return Ok(None);
        };
        let Some(archive) = ctx.index.archive_by_name(file) else {
            debug!("Installation archive '{}' of {} is not downloaded", file, source.path);
            return Ok(None);
        };

        let inner = source.inner_path();
        Ok(ctx
            .index
            .entries_of(&archive.hash)?
            .iter()
            .map(|e| (paths::common_suffix_len(&e.path, inner), e))
            .filter(|(suffix, _)| *suffix > 0)
            .min_by_key(|(suffix, e)| (Reverse(*suffix), e.path.as_str()))
            .map(|(_, e)| e))
    }

    /// Same-named entry in any archive, closest by path then size
    fn by_name<'a>(&self, source: &RawSourceFile, ctx: &'a CompilerContext) -> Result<Option<&'a EntryRef>, StepError> {
        let inner = source.inner_path();
        Ok(ctx
            .index
            .find_by_name(paths::file_name(&source.path))?
            .iter()
            .min_by_key(|e| {
                (
                    Reverse(paths::common_suffix_len(&e.path, inner)),
                    e.size.abs_diff(source.size),
                    e.archive,
                    e.path.as_str(),
                )
            }))
    }

    pub fn choose_base<'a>(
        &self,
        source: &RawSourceFile,
        ctx: &'a CompilerContext,
    ) -> Result<Option<&'a EntryRef>, StepError> {
        match self.from_installation_file(source, ctx)? {
            Some(entry) => Ok(Some(entry)),
            None => self.by_name(source, ctx),
        }
    }
}

impl CompilationStep for IncludePatches {
    fn name(&self) -> &'static str {
        "IncludePatches"
    }

    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        let Some(entry) = self.choose_base(source, ctx)? else {
            return Ok(None);
        };

        let base = ctx.index.read_entry(entry)?;
        let target = ctx.read(source)?;
        let blob = patch::create(&base, &target).map_err(|e| StepError::Patch {
            path: source.path.clone(),
            source: e,
        })?;
        debug!("{} patched from {} ({} byte patch)", source.path, entry.path, blob.len());

        let blob = InlineBlob::new(blob);
        let directive = Directive::PatchedFromArchive(PatchedFromArchive {
            to: source.path.clone(),
            hash: source.hash,
            size: source.size,
            archive_hash_path: ArchiveHashPath::new(entry.archive, entry.path.clone()),
            from_hash: entry.hash,
            patch_id: blob.id.clone(),
        });
        Ok(Some(Classified::with_blob(directive, blob)))
    }
}
