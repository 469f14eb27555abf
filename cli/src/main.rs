//! `mmwcas` CLI: translate physical radar parameters into multi-device
//! `.mmwave.json` descriptor documents.

use anyhow::{Context, Result};
use cascade_core::chirp::NUM_DEVICES;
use cascade_core::config::{self, DeviceConfig};
use cascade_core::convert::convert_params;
use cascade_core::descriptor::{expand_descriptor, write_descriptor, write_setup, CaptureSetup};
use cascade_core::lua::parse_assignments;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mmwcas", about = "MMWCAS cascade radar configuration tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Number of cascade devices in the descriptor
    #[arg(long, global = true, default_value_t = NUM_DEVICES)]
    num_devices: usize,

    /// Value of the descriptor's createdBy tag
    #[arg(long, global = true, default_value = "mmwcas")]
    created_by: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract physical parameters from an mmWave Studio Lua script and
    /// generate the descriptor document.
    Convert {
        /// Path to the Lua script
        input: PathBuf,
        /// Output path (default: `<input stem>.mmwave.json`)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate the descriptor document and its `.setup.json` companion from
    /// a TOML configuration file.
    Generate {
        /// Path to the TOML configuration
        input: PathBuf,
        /// Output path (default: `<input stem>.mmwave.json`)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Capture board address recorded in the setup metadata
        #[arg(long, default_value = "192.168.33.180")]
        board_ip: String,
    },
    /// Dump the descriptor for the built-in default configuration.
    Defaults {
        /// Output path
        #[arg(short, long, default_value = "default.mmwave.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Convert { input, output } => {
            let config = load_from_lua(input)?;
            let out = output.clone().unwrap_or_else(|| descriptor_name(input));
            emit(&config, &out, &cli)?;
        }
        Commands::Generate {
            input,
            output,
            board_ip,
        } => {
            let mimo = config::load_mimo_toml(input)?;
            let config = DeviceConfig::from_mimo(&mimo);
            let out = output.clone().unwrap_or_else(|| descriptor_name(input));
            emit(&config, &out, &cli)?;

            let setup = CaptureSetup::new(&stem(input), board_ip, &file_name(input));
            let setup_out = setup_name(&out);
            write_setup(&setup, &setup_out)?;
            println!("Wrote {}", setup_out.display());
        }
        Commands::Defaults { output } => {
            emit(&DeviceConfig::default(), output, &cli)?;
        }
    }

    Ok(())
}

fn load_from_lua(input: &Path) -> Result<DeviceConfig> {
    let script = std::fs::read_to_string(input)
        .with_context(|| format!("reading script {}", input.display()))?;
    let params = parse_assignments(script.lines());
    let converted = convert_params(&params);
    println!(
        "Extracted {} assignments, converted {} register fields",
        params.len(),
        converted.len()
    );

    let mut config = DeviceConfig::default();
    config.apply(&converted);
    Ok(config)
}

fn emit(config: &DeviceConfig, output: &Path, cli: &Cli) -> Result<()> {
    let doc = expand_descriptor(config, cli.num_devices, &cli.created_by)?;
    write_descriptor(&doc, output)?;
    println!(
        "Wrote {} ({} devices, {} chirps each)",
        output.display(),
        doc.mm_wave_devices.len(),
        doc.mm_wave_devices
            .first()
            .map_or(0, |d| d.rf_config.chirps.len()),
    );
    Ok(())
}

/// Default descriptor name: `<input stem>.mmwave.json` in the current
/// directory, mirroring the capture-directory naming convention.
fn descriptor_name(input: &Path) -> PathBuf {
    PathBuf::from(format!("{}.mmwave.json", stem(input)))
}

/// Setup metadata name: the descriptor path with `.mmwave.json` swapped for
/// `.setup.json`, so the pair always sits side by side.
fn setup_name(descriptor: &Path) -> PathBuf {
    let name = descriptor
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = name.strip_suffix(".mmwave.json").unwrap_or(&name);
    descriptor.with_file_name(format!("{base}.setup.json"))
}

fn stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string())
}

fn file_name(input: &Path) -> String {
    input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config.toml".to_string())
}
