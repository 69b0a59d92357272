//! Excludes transient files (logs, caches) by path pattern

use super::{Classified, CompilationStep};
use crate::compiler::context::CompilerContext;
use crate::compiler::source::RawSourceFile;
use crate::config::Conventions;
use crate::error::StepError;

pub struct IgnorePatterns {
    prefixes: Vec<String>,
    suffixes: Vec<String>,
    substrings: Vec<String>,
}

fn lowered(values: &[String]) -> Vec<String> {
    values.iter().filter(|v| !v.is_empty()).map(|v| v.to_lowercase()).collect()
}

impl IgnorePatterns {
    pub fn new(conventions: &Conventions) -> Self {
        Self {
            prefixes: lowered(&conventions.ignored_prefixes),
            suffixes: lowered(&conventions.ignored_suffixes),
            substrings: lowered(&conventions.ignored_substrings),
        }
    }

    fn matching(&self, path: &str) -> Option<String> {
        let path = path.to_lowercase();
        if let Some(p) = self.prefixes.iter().find(|p| path.starts_with(p.as_str())) {
            return Some(format!("ignored prefix '{}'", p));
        }
        if let Some(s) = self.suffixes.iter().find(|s| path.ends_with(s.as_str())) {
            return Some(format!("ignored suffix '{}'", s));
        }
        self.substrings
            .iter()
            .find(|s| path.contains(s.as_str()))
            .map(|s| format!("ignored substring '{}'", s))
    }
}

impl CompilationStep for IgnorePatterns {
    fn name(&self) -> &'static str {
        "IgnorePatterns"
    }

    fn run(&self, source: &RawSourceFile, _ctx: &CompilerContext) -> Result<Option<Classified>, StepError> {
        Ok(self.matching(&source.path).map(|reason| Classified::ignored(source, reason)))
    }
}
