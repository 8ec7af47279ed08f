//! Versioned patch containers.
//!
//! A container is a zip archive holding an `archipelago.json` manifest plus
//! format specific entries. Readers refuse files whose `compatible_version`
//! is newer than they understand. [`DeltaPatch`] stores a binary delta
//! against a handler supplied base asset, and handlers are found by patch
//! file ending through the [`registry`].
//!
//! ```no_run
//! use std::path::Path;
//! use patch_container::{ContainerFormat, DeltaHandler, DeltaPatch};
//!
//! struct MyGame;
//! type MyGamePatch = DeltaPatch<MyGame>;
//!
//! impl DeltaHandler for MyGame {
//!     const NAME: &'static str = "MyGamePatch";
//!     const GAME: &'static str = "My Game";
//!     const PATCH_FILE_ENDING: &'static str = ".apmygame";
//!
//!     fn source_data() -> std::io::Result<Vec<u8>> {
//!         std::fs::read("base.sfc")
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! MyGamePatch::register()?;
//!
//! let mut patch = MyGamePatch::new(Some("seed.apmygame".into()))
//!     .with_patched_path("patched.sfc")
//!     .with_player(Some(1), "Player1");
//! patch.write(None)?;
//!
//! patch_container::registry::patch_file(Path::new("seed.apmygame"), Path::new("out.sfc"))?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod batch;
pub mod binary_diff;
pub mod binary_patch;
pub mod container;
pub mod delta_codec;
pub mod delta_patch;
pub mod error;
pub mod limiter;
pub mod manifest;
pub mod patch;
pub mod patch_format;
pub mod registry;
pub mod rolling_hash;
pub mod source_cache;
pub mod util;

pub use container::{Container, ContainerFormat};
pub use delta_codec::{BlockDelta, DeltaCodec};
pub use delta_patch::{DeltaHandler, DeltaPatch};
pub use error::{ContainerError, DeltaError, RegistrationError, Result};
pub use manifest::{Manifest, Procedure};
pub use patch::{AutoApplyPatch, Patch};
pub use registry::{HandlerInfo, HandlerRegistry};
