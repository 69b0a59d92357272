//! Game files nothing else claimed are assumed to be stock and left to the user's own install

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::error::StepError;

pub struct IgnoreStockGameFiles;

impl CompilationStep for IgnoreStockGameFiles {
    fn name(&self) -> &'static str {
        "IgnoreStockGameFiles"
    }

    fn run(&self, source: &RawSourceFile, _ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        if source.is_game_file() {
            return Ok(Some(Classified::ignored(source, "stock game file")));
        }
        Ok(None)
    }
}
