//! Thin read/write adapter over the zip storage engine.

use std::io::{Read, Seek, Write};

use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::Result;
use crate::manifest::COMPRESSION_LEVEL;

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOC: usize = 64 << 20;

/// How an entry's bytes are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntryMode {
    /// Deflate at [`COMPRESSION_LEVEL`].
    #[default]
    Compressed,
    /// Raw store, for payloads that are already dense.
    Stored,
}

impl EntryMode {
    fn options(self) -> SimpleFileOptions {
        match self {
            EntryMode::Compressed => SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(COMPRESSION_LEVEL)),
            EntryMode::Stored => {
                SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
            }
        }
    }
}

pub struct ArchiveWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            zip: ZipWriter::new(inner),
        }
    }

    pub fn write_entry(&mut self, name: &str, data: &[u8], mode: EntryMode) -> Result<()> {
        debug!("writing entry {} ({} bytes, {:?})", name, data.len(), mode);
        self.zip.start_file(name, mode.options())?;
        self.zip.write_all(data)?;
        Ok(())
    }

    /// Write the central directory and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        Ok(self.zip.finish()?)
    }
}

pub struct ArchiveReader<R: Read + Seek> {
    zip: ZipArchive<R>,
}

impl<R: Read + Seek> ArchiveReader<R> {
    pub fn new(inner: R) -> Result<Self> {
        Ok(Self {
            zip: ZipArchive::new(inner)?,
        })
    }

    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut entry = self.zip.by_name(name)?;
        // The declared size comes from the file and is only a hint.
        let hint = usize::try_from(entry.size()).unwrap_or(MAX_PREALLOC);
        let mut data = Vec::with_capacity(hint.min(MAX_PREALLOC));
        entry.read_to_end(&mut data)?;
        Ok(data)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.zip.file_names().any(|n| n == name)
    }

    pub fn entry_names(&self) -> Vec<String> {
        self.zip.file_names().map(str::to_string).collect()
    }
}
