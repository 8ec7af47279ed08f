//! Versioned container envelope: `archipelago.json` plus format-specific entries.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::archive::{ArchiveReader, ArchiveWriter, EntryMode};
use crate::error::{ContainerError, Result};
use crate::limiter;
use crate::manifest::{self, Manifest, CONTAINER_VERSION, MANIFEST_ENTRY};

/// Identity fields shared by every container kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub path: Option<PathBuf>,
    pub player: Option<u32>,
    pub player_name: String,
    /// Server to connect to after patching; empty when there is none.
    pub server: String,
}

impl Container {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    pub fn with_player(mut self, player: Option<u32>, player_name: impl Into<String>) -> Self {
        self.player = player;
        self.player_name = player_name.into();
        self
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// The container level manifest layer.
    pub fn manifest_layer(&self, game: Option<&str>) -> Manifest {
        manifest::container_fields(&self.server, self.player, &self.player_name, game)
    }
}

/// A container kind with its own manifest layers and entries.
///
/// Implementors supply the hooks; `write`/`read` drive the lifecycle.
pub trait ContainerFormat {
    /// Type name used in error messages.
    const KIND: &'static str;
    /// Newest `compatible_version` this reader accepts.
    const VERSION: u32 = CONTAINER_VERSION;
    const GAME: Option<&'static str> = None;

    fn container(&self) -> &Container;
    fn container_mut(&mut self) -> &mut Container;

    fn manifest(&self) -> Manifest {
        self.container().manifest_layer(Self::GAME)
    }

    /// Runs while holding a write slot, before the archive is opened.
    fn prepare_write(&mut self) -> Result<()> {
        Ok(())
    }

    /// Entries written after the manifest.
    fn write_contents<W: Write + Seek>(&mut self, _archive: &mut ArchiveWriter<W>) -> Result<()> {
        Ok(())
    }

    /// Entries read after the manifest was parsed and accepted.
    fn read_contents<R: Read + Seek>(
        &mut self,
        _archive: &mut ArchiveReader<R>,
        _manifest: &Manifest,
    ) -> Result<()> {
        Ok(())
    }

    /// Write to `destination`, or to the bound path. An explicit destination
    /// becomes the bound path.
    fn write(&mut self, destination: Option<&Path>) -> Result<()> {
        let path = resolve_path(destination, self.container())
            .ok_or(ContainerError::NoDestination { kind: Self::KIND })?;

        let _permit = limiter::global().acquire();
        self.prepare_write()?;

        debug!("writing {} to {}", Self::KIND, path.display());
        let file = File::create(&path).map_err(|e| ContainerError::io(&path, e))?;
        let mut out = write_archive(self, BufWriter::new(file))?;
        out.flush().map_err(|e| ContainerError::io(&path, e))?;

        if destination.is_some() {
            self.container_mut().path = Some(path);
        }
        Ok(())
    }

    /// Write into an open stream and return it.
    fn write_to<W: Write + Seek>(&mut self, writer: W) -> Result<W> {
        let _permit = limiter::global().acquire();
        self.prepare_write()?;
        write_archive(self, writer)
    }

    /// Read from `source`, or from the bound path. An explicit source becomes
    /// the bound path.
    fn read(&mut self, source: Option<&Path>) -> Result<()> {
        let path = resolve_path(source, self.container())
            .ok_or(ContainerError::NoSource { kind: Self::KIND })?;

        debug!("reading {} from {}", Self::KIND, path.display());
        let file = File::open(&path).map_err(|e| ContainerError::io(&path, e))?;
        if source.is_some() {
            self.container_mut().path = Some(path);
        }
        self.read_from(BufReader::new(file))
    }

    /// Read from an open stream, such as an entry of an outer archive.
    fn read_from<R: Read + Seek>(&mut self, reader: R) -> Result<()> {
        let mut archive = ArchiveReader::new(reader)?;
        read_archive(self, &mut archive).map_err(|err| match err {
            too_new @ ContainerError::VersionTooNew { .. } => too_new,
            other => ContainerError::invalid_data(other),
        })
    }
}

fn resolve_path(explicit: Option<&Path>, container: &Container) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| container.path.clone())
}

fn write_archive<F, W>(format: &mut F, writer: W) -> Result<W>
where
    F: ContainerFormat + ?Sized,
    W: Write + Seek,
{
    let manifest_json = format.manifest().to_json()?;
    let mut archive = ArchiveWriter::new(writer);
    archive.write_entry(MANIFEST_ENTRY, manifest_json.as_bytes(), EntryMode::Compressed)?;
    format.write_contents(&mut archive)?;
    archive.finish()
}

fn read_archive<F, R>(format: &mut F, archive: &mut ArchiveReader<R>) -> Result<()>
where
    F: ContainerFormat + ?Sized,
    R: Read + Seek,
{
    let manifest = Manifest::from_json(&archive.read_entry(MANIFEST_ENTRY)?)?;
    let file_version = manifest.compatible_version()?;
    if file_version > F::VERSION {
        return Err(ContainerError::VersionTooNew {
            file_version,
            reader_version: F::VERSION,
        });
    }

    let player = manifest.player()?;
    let server = manifest.required_str("server")?.to_string();
    let player_name = manifest.required_str("player_name")?.to_string();

    let container = format.container_mut();
    container.player = player;
    container.server = server;
    container.player_name = player_name;

    format.read_contents(archive, &manifest)
}

impl ContainerFormat for Container {
    const KIND: &'static str = "Container";

    fn container(&self) -> &Container {
        self
    }

    fn container_mut(&mut self) -> &mut Container {
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Build an archive holding only the given manifest text.
    pub(crate) fn raw_container(manifest_json: &str) -> Vec<u8> {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()));
        writer
            .write_entry(MANIFEST_ENTRY, manifest_json.as_bytes(), EntryMode::Compressed)
            .unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.apc");

        let mut written = Container::new(Some(path.clone()))
            .with_player(Some(7), "Samus")
            .with_server("archipelago.gg:38281");
        written.write(None).unwrap();

        let mut read = Container::new(Some(path.clone()));
        read.read(None).unwrap();
        assert_eq!(read.player, Some(7));
        assert_eq!(read.player_name, "Samus");
        assert_eq!(read.server, "archipelago.gg:38281");
        assert_eq!(read.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_round_trip_through_stream() {
        let mut written = Container::default().with_player(None, "");
        let bytes = written.write_to(Cursor::new(Vec::new())).unwrap().into_inner();

        let mut read = Container::default().with_player(Some(3), "stale");
        read.read_from(Cursor::new(bytes)).unwrap();
        assert_eq!(read.player, None);
        assert_eq!(read.player_name, "");
        assert_eq!(read.server, "");
    }

    #[test]
    fn test_explicit_destination_binds_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bound.apc");
        let mut c = Container::default();
        c.write(Some(path.as_path())).unwrap();
        assert_eq!(c.path.as_deref(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn test_write_without_destination_fails() {
        let mut c = Container::default();
        let err = c.write(None).unwrap_err();
        assert!(matches!(err, ContainerError::NoDestination { kind: "Container" }));
    }

    #[test]
    fn test_read_without_source_fails() {
        let mut c = Container::default();
        let err = c.read(None).unwrap_err();
        assert!(matches!(err, ContainerError::NoSource { kind: "Container" }));
    }

    #[test]
    fn test_manifest_written_first_with_container_fields() {
        let mut c = Container::default().with_player(Some(1), "Link");
        let bytes = c.write_to(Cursor::new(Vec::new())).unwrap().into_inner();
        let mut reader = ArchiveReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.entry_names(), vec![MANIFEST_ENTRY.to_string()]);

        let manifest = Manifest::from_json(&reader.read_entry(MANIFEST_ENTRY).unwrap()).unwrap();
        assert_eq!(manifest.compatible_version().unwrap(), 5);
        assert_eq!(manifest.version(), Some(6));
        assert_eq!(manifest.game(), None);
        assert_eq!(manifest.player().unwrap(), Some(1));
    }

    #[test]
    fn test_too_new_file_is_rejected_without_populating() {
        let bytes = raw_container(
            r#"{"compatible_version": 999, "version": 999, "player": 4, "player_name": "x", "server": "y"}"#,
        );
        let mut c = Container::default().with_player(Some(1), "keep");
        let err = c.read_from(Cursor::new(bytes)).unwrap_err();
        match err {
            ContainerError::VersionTooNew {
                file_version,
                reader_version,
            } => {
                assert_eq!(file_version, 999);
                assert_eq!(reader_version, 6);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(c.player, Some(1));
        assert_eq!(c.player_name, "keep");
    }

    #[test]
    fn test_one_version_ahead_is_rejected() {
        let json = format!(
            r#"{{"compatible_version": {}, "player": null, "player_name": "", "server": ""}}"#,
            CONTAINER_VERSION + 1
        );
        let mut c = Container::default();
        assert!(matches!(
            c.read_from(Cursor::new(raw_container(&json))),
            Err(ContainerError::VersionTooNew { .. })
        ));
    }

    #[test]
    fn test_malformed_manifest_is_invalid_data() {
        let mut c = Container::default();
        let err = c
            .read_from(Cursor::new(raw_container(r#"{"compatible_version": 5}"#)))
            .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidData { .. }));
        assert!(err.to_string().contains("player"));

        let err = c
            .read_from(Cursor::new(raw_container("{not json")))
            .unwrap_err();
        assert!(matches!(err, ContainerError::InvalidData { .. }));
    }

    #[test]
    fn test_missing_manifest_is_invalid_data() {
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()));
        writer
            .write_entry("other.txt", b"hi", EntryMode::Compressed)
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let mut c = Container::default();
        let err = c.read_from(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, ContainerError::InvalidData { .. }));
    }

    /// Fails in `prepare_write` after checking that a write slot is held.
    #[derive(Default)]
    struct FailingPrepare {
        container: Container,
        slot_held: bool,
    }

    impl ContainerFormat for FailingPrepare {
        const KIND: &'static str = "FailingPrepare";

        fn container(&self) -> &Container {
            &self.container
        }

        fn container_mut(&mut self) -> &mut Container {
            &mut self.container
        }

        fn prepare_write(&mut self) -> Result<()> {
            let limiter = limiter::global();
            self.slot_held = limiter.available() < limiter.capacity();
            Err(ContainerError::NoPatchedFile { kind: Self::KIND })
        }
    }

    #[test]
    fn test_failed_write_returns_its_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.apc");
        let capacity = limiter::global().capacity();

        // More failures than slots: a leaked permit would block the last ones.
        for _ in 0..=capacity {
            let mut failing = FailingPrepare::default();
            let err = failing.write(Some(path.as_path())).unwrap_err();
            assert!(matches!(err, ContainerError::NoPatchedFile { kind: "FailingPrepare" }));
            assert!(failing.slot_held);
            assert_eq!(failing.container.path, None);
        }
        assert!(!path.exists());

        let mut c = Container::default();
        c.write(Some(path.as_path())).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = Container::default();
        let err = c.read(Some(dir.path().join("nope.apc").as_path())).unwrap_err();
        assert!(matches!(err, ContainerError::Io { .. }));
    }
}
