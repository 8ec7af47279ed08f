//! Patches that store a binary delta against a handler's base asset.
//!
//! Producing: `DeltaPatch::new(Some(out)).with_patched_path(file).write(None)`
//! diffs `file` against the cached base asset and stores the delta as a raw
//! `delta.bin` entry. Applying: [`AutoApplyPatch::patch`] reads the container
//! if needed and rebuilds the output from base + delta.

use std::fmt;
use std::io::{self, Read, Seek, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::archive::{ArchiveReader, ArchiveWriter, EntryMode};
use crate::container::{Container, ContainerFormat};
use crate::delta_codec::{BlockDelta, DeltaCodec};
use crate::error::{ContainerError, RegistrationError, Result};
use crate::manifest::{self, Manifest, DEFAULT_RESULT_FILE_ENDING, DELTA_ENTRY};
use crate::patch::{AutoApplyPatch, Patch};
use crate::registry::{self, HandlerInfo};
use crate::{source_cache, util};

/// A game specific delta patch format.
pub trait DeltaHandler: Send + Sync + 'static {
    /// Type name for logs and errors.
    const NAME: &'static str;
    const GAME: &'static str;
    /// Suffix identifying this handler's patch files. Must not be empty.
    const PATCH_FILE_ENDING: &'static str;
    const RESULT_FILE_ENDING: &'static str = DEFAULT_RESULT_FILE_ENDING;

    /// The canonical unmodified asset. Called at most once per process.
    fn source_data() -> io::Result<Vec<u8>>;

    /// Checksum to record instead of the blake3 digest of the base asset.
    fn base_checksum() -> Option<String> {
        None
    }
}

pub struct DeltaPatch<H: DeltaHandler, C: DeltaCodec = BlockDelta> {
    pub patch: Patch,
    /// File to diff against the base asset when producing.
    pub patched_path: Option<PathBuf>,
    delta: Option<Vec<u8>>,
    base_checksum: Option<String>,
    read_manifest: Option<Manifest>,
    codec: C,
    _handler: PhantomData<fn() -> H>,
}

impl<H: DeltaHandler, C: DeltaCodec + Default> DeltaPatch<H, C> {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self::with_codec(path, C::default())
    }
}

impl<H: DeltaHandler, C: DeltaCodec> DeltaPatch<H, C> {
    pub fn with_codec(path: Option<PathBuf>, codec: C) -> Self {
        Self {
            patch: Patch::new(path),
            patched_path: None,
            delta: None,
            base_checksum: None,
            read_manifest: None,
            codec,
            _handler: PhantomData,
        }
    }

    pub fn with_patched_path(mut self, patched_path: impl Into<PathBuf>) -> Self {
        self.patched_path = Some(patched_path.into());
        self
    }

    pub fn with_player(mut self, player: Option<u32>, player_name: impl Into<String>) -> Self {
        self.patch.container = self.patch.container.with_player(player, player_name);
        self
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.patch.container = self.patch.container.with_server(server);
        self
    }

    /// Delta bytes, once computed or read.
    pub fn delta(&self) -> Option<&[u8]> {
        self.delta.as_deref()
    }

    /// Checksum of the base asset recorded in (or destined for) the manifest.
    /// Not verified on apply.
    pub fn base_checksum(&self) -> Option<&str> {
        self.base_checksum.as_deref()
    }

    /// The manifest as read from disk, if this patch was read.
    pub fn read_manifest(&self) -> Option<&Manifest> {
        self.read_manifest.as_ref()
    }

    /// The handler's base asset, derived once per handler type.
    pub fn source_data_with_cache() -> Result<Arc<[u8]>> {
        source_cache::get_or_try_init::<H, _, _>(|| {
            H::source_data().map_err(|source| ContainerError::SourceData {
                game: H::GAME,
                source,
            })
        })
    }

    /// Apply the loaded delta to the base asset.
    pub fn patched_bytes(&mut self) -> Result<Vec<u8>> {
        if self.delta.is_none() {
            self.read(None)?;
        }
        let source = Self::source_data_with_cache()?;
        let delta = self.delta.as_deref().unwrap_or_default();
        Ok(self.codec.apply(&source, delta)?)
    }
}

impl<H, C> DeltaPatch<H, C>
where
    H: DeltaHandler,
    C: DeltaCodec + Default + 'static,
{
    pub fn handler_info() -> HandlerInfo {
        HandlerInfo::new(
            H::NAME,
            H::GAME,
            H::PATCH_FILE_ENDING,
            H::RESULT_FILE_ENDING,
            open_boxed::<H, C>,
        )
    }

    /// Add this handler to the process-wide registry.
    pub fn register() -> std::result::Result<(), RegistrationError> {
        registry::register(Self::handler_info())
    }
}

fn open_boxed<H, C>(path: PathBuf) -> Box<dyn AutoApplyPatch>
where
    H: DeltaHandler,
    C: DeltaCodec + Default + 'static,
{
    Box::new(DeltaPatch::<H, C>::new(Some(path)))
}

impl<H: DeltaHandler, C: DeltaCodec> ContainerFormat for DeltaPatch<H, C> {
    const KIND: &'static str = H::NAME;
    const GAME: Option<&'static str> = Some(H::GAME);

    fn container(&self) -> &Container {
        &self.patch.container
    }

    fn container_mut(&mut self) -> &mut Container {
        &mut self.patch.container
    }

    fn manifest(&self) -> Manifest {
        let [container, patch] = self.patch.manifest_layers(Self::GAME);
        Manifest::compose([
            container,
            patch,
            manifest::delta_fields(
                self.base_checksum.as_deref(),
                H::RESULT_FILE_ENDING,
                H::PATCH_FILE_ENDING,
            ),
        ])
    }

    fn prepare_write(&mut self) -> Result<()> {
        let Some(patched_path) = self.patched_path.as_deref() else {
            // Re-writing a patch that was read keeps its delta.
            return match self.delta {
                Some(_) => Ok(()),
                None => Err(ContainerError::NoPatchedFile { kind: H::NAME }),
            };
        };

        let source = Self::source_data_with_cache()?;
        let target =
            util::mmap_file(patched_path).map_err(|e| ContainerError::io(patched_path, e))?;
        let delta = self.codec.diff(&source, &target)?;
        debug!(
            "{}: {} byte delta for {} ({} bytes)",
            H::NAME,
            delta.len(),
            patched_path.display(),
            target.len()
        );

        if self.base_checksum.is_none() {
            self.base_checksum = H::base_checksum().or_else(|| Some(util::checksum_hex(&source)));
        }
        self.delta = Some(delta);
        Ok(())
    }

    fn write_contents<W: Write + Seek>(&mut self, archive: &mut ArchiveWriter<W>) -> Result<()> {
        let delta = self
            .delta
            .as_deref()
            .ok_or(ContainerError::NoPatchedFile { kind: H::NAME })?;
        // The delta is already compressed.
        archive.write_entry(DELTA_ENTRY, delta, EntryMode::Stored)
    }

    fn read_contents<R: Read + Seek>(
        &mut self,
        archive: &mut ArchiveReader<R>,
        manifest: &Manifest,
    ) -> Result<()> {
        self.patch.read_procedure(manifest)?;
        self.base_checksum = manifest.optional_str("base_checksum").map(str::to_string);
        self.delta = Some(archive.read_entry(DELTA_ENTRY)?);
        self.read_manifest = Some(manifest.clone());
        Ok(())
    }
}

impl<H: DeltaHandler, C: DeltaCodec> AutoApplyPatch for DeltaPatch<H, C> {
    fn patch(&mut self, target: &Path) -> Result<()> {
        let result = self.patched_bytes()?;
        std::fs::write(target, &result).map_err(|e| ContainerError::io(target, e))?;
        debug!("{}: wrote {} bytes to {}", H::NAME, result.len(), target.display());
        Ok(())
    }

    fn game(&self) -> &'static str {
        H::GAME
    }

    fn patch_file_ending(&self) -> &'static str {
        H::PATCH_FILE_ENDING
    }

    fn result_file_ending(&self) -> &'static str {
        H::RESULT_FILE_ENDING
    }

    fn container_info(&self) -> &Container {
        &self.patch.container
    }
}

impl<H: DeltaHandler, C: DeltaCodec> fmt::Debug for DeltaPatch<H, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(H::NAME)
            .field("patch", &self.patch)
            .field("patched_path", &self.patched_path)
            .field("delta_len", &self.delta.as_ref().map(Vec::len))
            .field("base_checksum", &self.base_checksum)
            .finish()
    }
}
