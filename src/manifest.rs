//! The `archipelago.json` manifest record and its per-level field layers.
//!
//! Each container level contributes a fixed set of keys. [`Manifest::compose`]
//! concatenates the layers in order; a later layer may overwrite the value of
//! a key an earlier one introduced, but keeps its position.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ContainerError, Result};

/// Current container format revision written by this crate.
pub const CONTAINER_VERSION: u32 = 6;
/// Oldest reader able to consume a plain container.
pub const CONTAINER_COMPATIBLE_VERSION: u32 = 5;
/// Oldest reader able to consume a patch container.
pub const PATCH_COMPATIBLE_VERSION: u32 = 6;

pub const MANIFEST_ENTRY: &str = "archipelago.json";
pub const DELTA_ENTRY: &str = "delta.bin";
pub const DEFAULT_RESULT_FILE_ENDING: &str = ".sfc";
/// Deflate level applied to compressed entries.
pub const COMPRESSION_LEVEL: i64 = 9;

const CUSTOM_PROCEDURE: &str = "custom";

/// Ordered key/value record stored as `archipelago.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(Map<String, Value>);

impl Manifest {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Concatenate layers in order.
    pub fn compose<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Manifest>,
    {
        let mut out = Map::new();
        for layer in layers {
            for (key, value) in layer.0 {
                out.insert(key, value);
            }
        }
        Self(out)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.0).map_err(|source| ContainerError::ManifestSerialization {
            manifest: format!("{:?}", self.0),
            source,
        })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ContainerError::ManifestFormat(serde::de::Error::custom(
                "manifest is not a JSON object",
            ))),
        }
    }

    /// Minimum reader version demanded by the file.
    pub fn compatible_version(&self) -> Result<u32> {
        self.required_u32("compatible_version")
    }

    /// Producer's format version, if recorded.
    pub fn version(&self) -> Option<u32> {
        self.optional_u32("version")
    }

    pub fn game(&self) -> Option<&str> {
        self.get("game").and_then(Value::as_str)
    }

    pub fn player(&self) -> Result<Option<u32>> {
        match self.get("player") {
            None => Err(ContainerError::MissingField("player")),
            Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(u32::deserialize(value)?)),
        }
    }

    pub fn required_str(&self, key: &'static str) -> Result<&str> {
        match self.get(key) {
            None => Err(ContainerError::MissingField(key)),
            Some(value) => value.as_str().ok_or_else(|| {
                ContainerError::ManifestFormat(serde::de::Error::custom(format!(
                    "`{key}` is not a string"
                )))
            }),
        }
    }

    pub fn optional_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn required_u32(&self, key: &'static str) -> Result<u32> {
        let value = self.get(key).ok_or(ContainerError::MissingField(key))?;
        Ok(u32::deserialize(value)?)
    }

    fn optional_u32(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }
}

/// Keys every container writes.
pub fn container_fields(
    server: &str,
    player: Option<u32>,
    player_name: &str,
    game: Option<&str>,
) -> Manifest {
    let mut m = Manifest::new();
    // Empty when the producer has no server to connect to.
    m.insert("server", server);
    m.insert("player", player);
    m.insert("player_name", player_name);
    m.insert("game", game);
    m.insert("compatible_version", CONTAINER_COMPATIBLE_VERSION);
    m.insert("version", CONTAINER_VERSION);
    m
}

/// Keys a patch container adds on top of [`container_fields`].
pub fn patch_fields(procedure: &Procedure) -> Manifest {
    let mut m = Manifest::new();
    m.insert("procedure", procedure.to_value());
    m.insert("compatible_version", PATCH_COMPATIBLE_VERSION);
    m
}

/// Keys a delta patch adds on top of [`patch_fields`].
pub fn delta_fields(
    base_checksum: Option<&str>,
    result_file_ending: &str,
    patch_file_ending: &str,
) -> Manifest {
    let mut m = Manifest::new();
    m.insert("base_checksum", base_checksum);
    m.insert("result_file_ending", result_file_ending);
    m.insert("patch_file_ending", patch_file_ending);
    m
}

/// How a patch is meant to be applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Procedure {
    /// Application is handler specific and not machine readable.
    #[default]
    Custom,
    /// Ordered `(operation, arguments)` steps.
    Steps(Vec<(String, Vec<Value>)>),
}

impl Procedure {
    pub fn to_value(&self) -> Value {
        match self {
            Procedure::Custom => Value::from(CUSTOM_PROCEDURE),
            Procedure::Steps(steps) => Value::Array(
                steps
                    .iter()
                    .map(|(name, args)| {
                        Value::Array(vec![Value::from(name.as_str()), Value::Array(args.clone())])
                    })
                    .collect(),
            ),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) if s == CUSTOM_PROCEDURE => Ok(Procedure::Custom),
            Value::Array(_) => {
                let steps = Vec::<(String, Vec<Value>)>::deserialize(value)?;
                Ok(Procedure::Steps(steps))
            }
            other => Err(ContainerError::ManifestFormat(serde::de::Error::custom(
                format!("unknown procedure {other}"),
            ))),
        }
    }
}
