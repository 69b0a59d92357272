//! Modlist compiler
//!
//! Turns a mod manager installation into a [`ModList`]:
//!
//! 1. index the downloaded archives
//! 2. enumerate and hash mod, profile and game files
//! 3. classify every file through the step [`Pipeline`] in parallel
//! 4. assemble, normalize and validate the list
//!
//! Classification failures are collected for all files and reported
//! together instead of stopping at the first one.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveIndex, ArchiveReader, ZipArchiveReader};
use crate::config::CompilerConfig;
use crate::error::{ClassificationFailure, CompileError, FailureReason, StepError};
use crate::fs::{FileSystem, NativeFileSystem};
use crate::hashing::Hash;
use crate::modlist::{Archive, BlobStore, Directive, ModList};

pub mod context;
pub mod meta;
pub mod source;
pub mod steps;

pub use context::{CompilerContext, GameMaster};
pub use meta::ModMeta;
pub use source::{RawSourceFile, SourceOrigin};
pub use steps::{Classified, CompilationStep, Pipeline};

type StepOutcome = Result<Option<Classified>, StepError>;

pub struct Compiler {
    config: CompilerConfig,
    fs: Arc<dyn FileSystem>,
    reader: Arc<dyn ArchiveReader>,
    cancellation_token: CancellationToken,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            fs: Arc::new(NativeFileSystem),
            reader: Arc::new(ZipArchiveReader),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_archive_reader(mut self, reader: Arc<dyn ArchiveReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Build the context and the standard pipeline, then compile
    pub fn compile(&self) -> Result<ModList, CompileError> {
        info!("Compiling '{}' from {}", self.config.name, self.config.source_dir.display());

        let index = ArchiveIndex::scan(self.fs.as_ref(), self.reader.clone(), &self.config.downloads_dir)?;
        let ctx = CompilerContext::build(self.config.clone(), self.fs.clone(), index)?;
        let pipeline = Pipeline::standard(&ctx);
        debug!("Pipeline: {:?}", pipeline);

        self.compile_with(&ctx, &pipeline)
    }

    /// Compile with a caller-provided pipeline
    pub fn compile_with(&self, ctx: &CompilerContext, pipeline: &Pipeline) -> Result<ModList, CompileError> {
        ctx.index.prime()?;
        let sources = source::scan_sources(self.fs.as_ref(), &self.config)?;
        if self.cancellation_token.is_cancelled() {
            return Err(CompileError::Cancelled);
        }

        let outcomes: Vec<(&RawSourceFile, Option<StepOutcome>)> = sources
            .par_iter()
            .map(|source| {
                if self.cancellation_token.is_cancelled() {
                    return (source, None);
                }
                (source, Some(pipeline.classify(source, ctx)))
            })
            .collect();

        if self.cancellation_token.is_cancelled() {
            info!("Compilation cancelled");
            return Err(CompileError::Cancelled);
        }

        let mut directives = Vec::new();
        let mut blobs = BlobStore::new();
        let mut failures = Vec::new();
        let mut ignored = 0usize;

        for (source, outcome) in outcomes {
            let reason = match outcome {
                Some(Ok(Some(Classified { directive, blobs: new_blobs }))) => match directive {
                    Directive::IgnoredDirectly(d) => {
                        debug!("Ignoring {}: {}", d.to, d.reason);
                        ignored += 1;
                        continue;
                    }
                    Directive::NoMatch(d) => FailureReason::NoMatch(d.reason),
                    directive => {
                        for blob in new_blobs {
                            blobs.insert(blob);
                        }
                        directives.push(directive);
                        continue;
                    }
                },
                Some(Ok(None)) => FailureReason::NoMatch("no step claimed the file".to_string()),
                Some(Err(e)) => FailureReason::Step(e),
                None => return Err(CompileError::Cancelled),
            };
            failures.push(ClassificationFailure {
                path: source.path.clone(),
                reason,
            });
        }

        if !failures.is_empty() {
            for failure in &failures {
                warn!("Could not classify {}", failure);
            }
            return Err(CompileError::Classification(failures));
        }

        let archives = self.referenced_archives(ctx, &directives);
        let mut modlist = ModList {
            name: self.config.name.clone(),
            version: self.config.version.clone(),
            author: self.config.author.clone(),
            description: self.config.description.clone(),
            game: self.config.game.clone(),
            archives,
            directives,
            blobs,
        };
        modlist.normalize();
        modlist.validate()?;

        info!(
            "Compiled {} directives from {} archives ({} files ignored, {} bytes inline)",
            modlist.directives.len(),
            modlist.archives.len(),
            ignored,
            modlist.blobs.total_size()
        );
        for (kind, count) in modlist.directive_counts() {
            debug!("  {}: {}", kind, count);
        }
        Ok(modlist)
    }

    fn referenced_archives(&self, ctx: &CompilerContext, directives: &[Directive]) -> Vec<Archive> {
        let mut archives: BTreeMap<Hash, Archive> = BTreeMap::new();
        for hash in directives.iter().filter_map(Directive::archive_hash) {
            if let Some(indexed) = ctx.index.archive(&hash) {
                archives.entry(hash).or_insert_with(|| indexed.to_manifest_entry());
            }
        }
        archives.into_values().collect()
    }
}
