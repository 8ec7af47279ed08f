use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use patch_container::{
    limiter, registry, util, Container, ContainerFormat, DeltaHandler,
    DeltaPatch, Manifest,
};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;

use patch_container::archive::ArchiveReader;

#[derive(Parser)]
#[command(name = "patch-container", about = "Create, inspect and apply patch containers")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
    /// Maximum number of containers written at the same time
    #[arg(long, global = true)]
    write_limit: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a delta patch of a modified file against a base file
    Create {
        /// Unmodified base file
        #[arg(long)]
        base: PathBuf,
        /// Modified file to encode
        #[arg(long)]
        patched: PathBuf,
        /// Output container path
        #[arg(long, short)]
        output: PathBuf,
        /// Player slot stored in the manifest
        #[arg(long)]
        player: Option<u32>,
        #[arg(long, default_value = "")]
        player_name: String,
        /// Server address stored in the manifest
        #[arg(long, default_value = "")]
        server: String,
    },
    /// Apply a patch container, picking the handler by file ending
    Patch {
        /// Patch container to apply
        file: PathBuf,
        /// Unmodified base file (for generic delta patches)
        #[arg(long)]
        base: Option<PathBuf>,
        /// Output path; defaults to the container path with the result ending
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print a container's manifest
    Inspect {
        file: PathBuf,
    },
    /// List files under a directory that a registered handler can open
    Scan {
        dir: PathBuf,
    },
}

static BASE_FILE: OnceLock<PathBuf> = OnceLock::new();

/// Delta patch whose base asset is a file given on the command line.
struct FileBase;

impl DeltaHandler for FileBase {
    const NAME: &'static str = "GenericDeltaPatch";
    const GAME: &'static str = "Generic";
    const PATCH_FILE_ENDING: &'static str = ".apdelta";
    const RESULT_FILE_ENDING: &'static str = ".bin";

    fn source_data() -> std::io::Result<Vec<u8>> {
        let path = BASE_FILE.get().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no base file given (--base)")
        })?;
        std::fs::read(path)
    }
}

type GenericPatch = DeltaPatch<FileBase>;

/// Reads any container and keeps its manifest.
#[derive(Default)]
struct ManifestProbe {
    container: Container,
    manifest: Manifest,
}

impl ContainerFormat for ManifestProbe {
    const KIND: &'static str = "Container";

    fn container(&self) -> &Container {
        &self.container
    }

    fn container_mut(&mut self) -> &mut Container {
        &mut self.container
    }

    fn read_contents<R: Read + Seek>(
        &mut self,
        _archive: &mut ArchiveReader<R>,
        manifest: &Manifest,
    ) -> patch_container::Result<()> {
        self.manifest = manifest.clone();
        Ok(())
    }
}

fn set_base(base: PathBuf) -> Result<()> {
    if BASE_FILE.set(base).is_err() {
        bail!("Base file already set");
    }
    Ok(())
}

fn default_output(file: &Path, result_file_ending: &str) -> PathBuf {
    file.with_extension(result_file_ending.trim_start_matches('.'))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match (cli.verbose, cli.quiet) {
        (0, true) => "error",
        (0, false) => "warn",
        (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Some(slots) = cli.write_limit {
        limiter::configure_write_limit(slots);
    }
    GenericPatch::register().context("Failed to register generic delta handler")?;

    match cli.command {
        Commands::Create {
            base,
            patched,
            output,
            player,
            player_name,
            server,
        } => {
            println!("Creating patch...");
            println!("  Base: {}", base.display());
            println!("  Patched: {}", patched.display());
            println!("  Output: {}", output.display());

            let start = Instant::now();
            set_base(base)?;
            let out = output.clone();
            let (delta_len, checksum) = tokio::task::spawn_blocking(move || -> Result<_> {
                let mut patch = GenericPatch::new(Some(out))
                    .with_patched_path(patched)
                    .with_player(player, player_name)
                    .with_server(server);
                patch.write(None).context("Failed to write patch container")?;
                Ok((
                    patch.delta().map_or(0, <[u8]>::len),
                    patch.base_checksum().unwrap_or_default().to_string(),
                ))
            })
            .await??;
            let elapsed = start.elapsed();

            println!("\nPatch created successfully!");
            println!("  Delta size: {} bytes", delta_len);
            println!("  Base checksum: {}", checksum);
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
        Commands::Patch { file, base, output } => {
            let handler = registry::resolve_by_path(&file)
                .with_context(|| format!("No handler registered for {}", file.display()))?;
            if let Some(base) = base {
                set_base(base)?;
            }
            let target = output.unwrap_or_else(|| default_output(&file, handler.result_file_ending));

            println!("Applying patch...");
            println!("  Handler: {} ({})", handler.name, handler.game);
            println!("  Patch: {}", file.display());
            println!("  Output: {}", target.display());

            let start = Instant::now();
            let out = target.clone();
            tokio::task::spawn_blocking(move || -> Result<()> {
                let mut patch = handler.open(&file);
                patch
                    .patch(&out)
                    .with_context(|| format!("Failed to apply {}", file.display()))
            })
            .await??;
            let elapsed = start.elapsed();

            println!("\nPatch applied successfully!");
            println!(
                "  Output size: {} bytes",
                std::fs::metadata(&target)
                    .with_context(|| format!("Failed to stat {}", target.display()))?
                    .len()
            );
            println!("  Time elapsed: {:.3}s", elapsed.as_secs_f64());
        }
        Commands::Inspect { file } => {
            let path = file.clone();
            let probe = tokio::task::spawn_blocking(move || -> Result<ManifestProbe> {
                let mut probe = ManifestProbe::default();
                probe
                    .read(Some(path.as_path()))
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                Ok(probe)
            })
            .await??;

            println!("{}", serde_json::to_string_pretty(&probe.manifest)?);
            match registry::resolve_by_path(&file) {
                Some(handler) => println!("Handler: {} ({})", handler.name, handler.game),
                None => println!("Handler: none registered"),
            }
        }
        Commands::Scan { dir } => {
            let files = tokio::task::spawn_blocking(move || util::walk_files(&dir)).await??;
            let mut matched = 0;
            for file in &files {
                if let Some(handler) = registry::resolve_by_path(file) {
                    println!("{}  {}", handler.game, file.display());
                    matched += 1;
                }
            }
            println!("\n{} of {} files have a handler", matched, files.len());
        }
    }

    Ok(())
}
