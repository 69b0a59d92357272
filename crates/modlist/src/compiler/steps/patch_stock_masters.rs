//! Mod copies of stock masters (cleaned or otherwise edited) become patches
//! against the user's own game file

use tracing::debug;

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::error::StepError;
use crate::modlist::{CleanedEsm, Directive, InlineBlob};
use crate::{patch, paths};

pub struct PatchStockMasters;

impl CompilationStep for PatchStockMasters {
    fn name(&self) -> &'static str {
        "PatchStockMasters"
    }

    fn run(&self, source: &RawSourceFile, ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        if source.mod_name().is_none() || !ctx.conventions().is_master(&source.path) {
            return Ok(None);
        }
        let Some(master) = ctx.game_masters.get(&paths::file_name(&source.path).to_lowercase()) else {
            return Ok(None);
        };

        let base = ctx.fs.read(&master.path).map_err(|e| StepError::Read {
            path: master.path.clone(),
            source: e,
        })?;
        let target = ctx.read(source)?;
        let blob = patch::create(&base, &target).map_err(|e| StepError::Patch {
            path: source.path.clone(),
            source: e,
        })?;
        debug!("{} patched from {} ({} byte patch)", source.path, master.game_file, blob.len());

        let blob = InlineBlob::new(blob);
        let directive = Directive::CleanedEsm(CleanedEsm {
            to: source.path.clone(),
            hash: source.hash,
            size: source.size,
            source_esm_hash: master.hash,
            game_file: master.game_file.clone(),
            patch_id: Some(blob.id.clone()),
        });
        Ok(Some(Classified::with_blob(directive, blob)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::steps::test_support::*;
    use crate::hashing::Hash;

    #[test]
    fn test_mod_master_patched_from_game_copy() {
        let fixture = Fixture::new();
        write(&fixture.game().join("Data/Update.esm"), b"stock update master with dirty edits");
        write(&fixture.mo2().join("mods/Cleaned ESMs/Update.esm"), b"stock update master");
        write(&fixture.mo2().join("mods/Other/Unrelated.esm"), b"x");

        let ctx = fixture.context(fixture.config());
        let claimed = PatchStockMasters
            .run(&fixture.source(&ctx, "mods/Cleaned ESMs/Update.esm"), &ctx)
            .unwrap()
            .unwrap();

        let Directive::CleanedEsm(esm) = &claimed.directive else {
            panic!("expected CleanedEsm, got {:?}", claimed.directive);
        };
        assert_eq!(esm.game_file, "Data/Update.esm");
        assert_eq!(esm.source_esm_hash, Hash::of(b"stock update master with dirty edits"));
        assert_eq!(esm.patch_id.as_deref(), Some(claimed.blobs[0].id.as_str()));

        let unrelated = fixture.source(&ctx, "mods/Other/Unrelated.esm");
        assert!(PatchStockMasters.run(&unrelated, &ctx).unwrap().is_none());
    }
}
