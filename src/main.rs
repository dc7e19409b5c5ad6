use std::path::PathBuf;

use clap::Parser;
use handspace::calibration::Preset;
use handspace::Options;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Gesture-driven floating windows with optional headset stereo")]
struct Args {
    /// Start in side-by-side stereo
    #[arg(long)]
    stereo: bool,

    /// Calibration preset to apply at start (cardboard-v1, cardboard-v2, vr-box, bobovr-z4, flat)
    #[arg(long, value_parser = parse_preset)]
    preset: Option<Preset>,

    /// Directory holding the calibration file
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Treat the hand feed as a rear-camera (non-mirrored) image
    #[arg(long)]
    no_mirror: bool,
}

fn parse_preset(name: &str) -> Result<Preset, String> {
    Preset::from_name(name).ok_or_else(|| {
        let known: Vec<_> = Preset::ALL.iter().map(|p| p.as_str()).collect();
        format!("unknown preset '{name}', expected one of: {}", known.join(", "))
    })
}

fn main() {
    let args = Args::parse();
    handspace::run_with(Options {
        stereo: args.stereo,
        preset: args.preset,
        config_dir: args.config_dir,
        mirrored: !args.no_mirror,
    });
}
