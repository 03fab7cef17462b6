//! A small inspection CLI for bin/cue disc images: dumps the TOC a guest
//! driver would see, or reports the parsed track layout.

mod config;

use std::path::PathBuf;

use cdrom::backend::{CdRom, DiscBackend};
use cdrom_driver::dispatcher::{Dispatcher, RecordingGuestOps};
use clap::{Parser, Subcommand};
use env_logger::Env;

#[derive(Debug, Parser)]
#[command(name = "cdrom-tool", about = "Inspects bin/cue CD-ROM images")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dumps the Type-4 AppleCD SC TOC table a guest driver would read.
    Toc {
        /// Path to the disc's `.cue` sheet.
        cue_path: PathBuf,
    },
    /// Parses a cue sheet and reports its track layout.
    Probe {
        /// Path to the disc's `.cue` sheet.
        cue_path: PathBuf,
    },
    /// Lists the drives a `cdrom-tool.toml` preferences file configures.
    ListConfig {
        /// Path to the TOML preferences file.
        #[arg(default_value = "cdrom-tool.toml")]
        config_path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Toc { cue_path } => toc(&cue_path),
        Command::Probe { cue_path } => probe(&cue_path),
        Command::ListConfig { config_path } => list_config(&config_path),
    }
}

fn list_config(config_path: &std::path::Path) -> anyhow::Result<()> {
    let cfg = config::Config::load(config_path)?;
    if cfg.drives.is_empty() {
        println!("{}: no [[cdrom]] entries", config_path.display());
        return Ok(());
    }
    for drive in &cfg.drives {
        println!("{}  mount_non_hfs={}", drive.path.display(), drive.mount_non_hfs);
    }
    Ok(())
}

fn toc(cue_path: &std::path::Path) -> anyhow::Result<()> {
    let backend = CdRom::open(cue_path)?;
    let mut dispatcher: Dispatcher<CdRom, _> = Dispatcher::new(RecordingGuestOps::default(), !0i16);
    dispatcher.open(vec![backend])?;
    let num = dispatcher.registry.drives[0].num;
    let driver_ref_num = dispatcher.registry.drives[0].driver_reference_number;
    let Some(table) = dispatcher.read_toc_512(num, driver_ref_num) else {
        anyhow::bail!("no disc mounted at {}", cue_path.display());
    };
    for (i, chunk) in table.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        println!("{:04x}  {}", i * 16, hex.join(" "));
    }
    Ok(())
}

fn probe(cue_path: &std::path::Path) -> anyhow::Result<()> {
    let backend = CdRom::open(cue_path)?;
    let cue = backend.cue();
    println!("{}", cue_path.display());
    println!("  length: {}", cdrom::Msf::from_frames(cue.length));
    for track in &cue.tracks {
        println!(
            "  track {:02} {:?}  start={}  length={}  pregap={}",
            track.number,
            track.mode,
            cdrom::Msf::from_frames(track.start),
            cdrom::Msf::from_frames(track.length),
            cdrom::Msf::from_frames(track.pregap),
        );
    }
    Ok(())
}
