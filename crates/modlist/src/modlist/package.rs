//! Modlist package files
//!
//! A package is a zip holding the manifest JSON under [`MANIFEST_ENTRY`] and
//! one entry per inline blob, named by blob id.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{ModList, ModListError};
use crate::archive::zip_reader::read_entry_data;

pub const MANIFEST_ENTRY: &str = "modlist";

impl ModList {
    /// Write the modlist and its blobs to a package at `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModListError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut zip = ZipWriter::new(BufWriter::new(File::create(path)?));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file(MANIFEST_ENTRY, options)?;
        zip.write_all(self.to_json()?.as_bytes())?;

        for (id, data) in self.blobs.iter() {
            zip.start_file(id, options)?;
            zip.write_all(data)?;
        }

        zip.finish()?.flush()?;
        info!(
            "Saved modlist '{}' to {} ({} directives, {} blobs)",
            self.name,
            path.display(),
            self.directives.len(),
            self.blobs.len()
        );
        Ok(())
    }

    /// Read a package written by [`ModList::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModListError> {
        let path = path.as_ref();
        let mut zip = ZipArchive::new(BufReader::new(File::open(path)?))?;

        let mut json = String::new();
        zip.by_name(MANIFEST_ENTRY)
            .map_err(|e| match e {
                zip::result::ZipError::FileNotFound => ModListError::MissingManifest(MANIFEST_ENTRY),
                other => other.into(),
            })?
            .read_to_string(&mut json)?;
        let mut modlist = ModList::from_json(&json)?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            if entry.is_dir() || entry.name() == MANIFEST_ENTRY {
                continue;
            }
            let id = entry.name().to_string();
            let size = entry.size();
            let data = read_entry_data(&mut entry, size)?;
            modlist.blobs.insert_raw(id, data);
        }

        debug!("Loaded {} blobs from {}", modlist.blobs.len(), path.display());
        Ok(modlist)
    }
}
