//! Patch containers and the auto-apply contract.

use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use crate::archive::ArchiveReader;
use crate::container::{Container, ContainerFormat};
use crate::error::Result;
use crate::manifest::{self, Manifest, Procedure};

/// A container that represents a patch file. Adds `procedure` to the manifest
/// and requires a patch-aware reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub container: Container,
    pub procedure: Procedure,
}

impl Patch {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            container: Container::new(path),
            procedure: Procedure::Custom,
        }
    }

    pub fn with_procedure(mut self, procedure: Procedure) -> Self {
        self.procedure = procedure;
        self
    }

    /// Container layer followed by the patch layer.
    pub fn manifest_layers(&self, game: Option<&str>) -> [Manifest; 2] {
        [
            self.container.manifest_layer(game),
            manifest::patch_fields(&self.procedure),
        ]
    }

    /// Pick up `procedure` from a parsed manifest; absent or null means custom.
    pub fn read_procedure(&mut self, manifest: &Manifest) -> Result<()> {
        self.procedure = match manifest.get("procedure") {
            None | Some(serde_json::Value::Null) => Procedure::Custom,
            Some(value) => Procedure::from_value(value)?,
        };
        Ok(())
    }
}

impl ContainerFormat for Patch {
    const KIND: &'static str = "Patch";

    fn container(&self) -> &Container {
        &self.container
    }

    fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    fn manifest(&self) -> Manifest {
        Manifest::compose(self.manifest_layers(Self::GAME))
    }

    fn read_contents<R: Read + Seek>(
        &mut self,
        _archive: &mut ArchiveReader<R>,
        manifest: &Manifest,
    ) -> Result<()> {
        self.read_procedure(manifest)
    }
}

/// A patch that can produce its output file on its own.
///
/// Concrete types are reached through the handler registry, so every
/// implementor belongs to one game and one patch file ending.
pub trait AutoApplyPatch: Send {
    /// Create the output file at `target`.
    fn patch(&mut self, target: &Path) -> Result<()>;

    fn game(&self) -> &'static str;

    fn patch_file_ending(&self) -> &'static str;

    /// Expected suffix of the produced file. Informational only.
    fn result_file_ending(&self) -> &'static str {
        manifest::DEFAULT_RESULT_FILE_ENDING
    }

    fn container_info(&self) -> &Container;
}
