//! Maps game identifiers and patch file endings to handler types.
//!
//! Each handler module registers itself once at startup; entries are never
//! removed. Lookups by file ending walk the endings in registration order.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{info, warn};
use parking_lot::RwLock;

use crate::error::{ContainerError, RegistrationError, Result};
use crate::patch::AutoApplyPatch;

/// Constructs a handler's patch type bound to a file.
pub type OpenFn = fn(PathBuf) -> Box<dyn AutoApplyPatch>;

/// Descriptor of a registered handler type.
#[derive(Clone, Copy)]
pub struct HandlerInfo {
    pub name: &'static str,
    pub game: &'static str,
    pub patch_file_ending: &'static str,
    pub result_file_ending: &'static str,
    open: OpenFn,
}

impl HandlerInfo {
    pub const fn new(
        name: &'static str,
        game: &'static str,
        patch_file_ending: &'static str,
        result_file_ending: &'static str,
        open: OpenFn,
    ) -> Self {
        Self {
            name,
            game,
            patch_file_ending,
            result_file_ending,
            open,
        }
    }

    /// Instantiate the handler's patch type for `path`.
    pub fn open(&self, path: impl Into<PathBuf>) -> Box<dyn AutoApplyPatch> {
        (self.open)(path.into())
    }
}

impl fmt::Debug for HandlerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerInfo")
            .field("name", &self.name)
            .field("game", &self.game)
            .field("patch_file_ending", &self.patch_file_ending)
            .field("result_file_ending", &self.result_file_ending)
            .finish()
    }
}

impl PartialEq for HandlerInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.game == other.game
            && self.patch_file_ending == other.patch_file_ending
    }
}

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    patch_types: Vec<(&'static str, HandlerInfo)>,
    file_endings: Vec<(&'static str, HandlerInfo)>,
}

impl HandlerRegistry {
    pub const fn new() -> Self {
        Self {
            patch_types: Vec::new(),
            file_endings: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: HandlerInfo) -> std::result::Result<(), RegistrationError> {
        if handler.patch_file_ending.is_empty() {
            return Err(RegistrationError::MissingFileEnding {
                handler: handler.name,
            });
        }
        upsert(&mut self.patch_types, handler.game, handler);
        upsert(&mut self.file_endings, handler.patch_file_ending, handler);
        info!(
            "registered handler {} for {} ({})",
            handler.name, handler.game, handler.patch_file_ending
        );
        Ok(())
    }

    /// First handler whose file ending is a suffix of `file`.
    pub fn resolve_by_path(&self, file: &str) -> Option<HandlerInfo> {
        self.file_endings
            .iter()
            .find(|(ending, _)| file.ends_with(*ending))
            .map(|(_, handler)| *handler)
    }

    pub fn by_game(&self, game: &str) -> Option<HandlerInfo> {
        self.patch_types
            .iter()
            .find(|(g, _)| *g == game)
            .map(|(_, handler)| *handler)
    }

    /// Handlers in file ending registration order.
    pub fn handlers(&self) -> impl Iterator<Item = &HandlerInfo> {
        self.file_endings.iter().map(|(_, handler)| handler)
    }

    pub fn len(&self) -> usize {
        self.file_endings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.file_endings.is_empty()
    }
}

fn upsert(entries: &mut Vec<(&'static str, HandlerInfo)>, key: &'static str, handler: HandlerInfo) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => {
            warn!("{} replaces {} for {}", handler.name, slot.1.name, key);
            slot.1 = handler;
        }
        None => entries.push((key, handler)),
    }
}

static REGISTRY: RwLock<HandlerRegistry> = RwLock::new(HandlerRegistry::new());

/// Add a handler to the process-wide registry.
pub fn register(handler: HandlerInfo) -> std::result::Result<(), RegistrationError> {
    REGISTRY.write().register(handler)
}

pub fn resolve_by_path(file: impl AsRef<Path>) -> Option<HandlerInfo> {
    REGISTRY
        .read()
        .resolve_by_path(&file.as_ref().to_string_lossy())
}

pub fn by_game(game: &str) -> Option<HandlerInfo> {
    REGISTRY.read().by_game(game)
}

/// Snapshot of all registered handlers.
pub fn handlers() -> Vec<HandlerInfo> {
    REGISTRY.read().handlers().copied().collect()
}

/// Resolve the handler for `path`, open it and write the result to `target`.
pub fn patch_file(path: &Path, target: &Path) -> Result<HandlerInfo> {
    let handler = resolve_by_path(path).ok_or_else(|| ContainerError::NoHandler {
        path: path.to_path_buf(),
    })?;
    handler.open(path).patch(target)?;
    Ok(handler)
}
