use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "clip-sharpen")]
#[command(about = "Clip a projected GeoTIFF to the area of interest and apply a Laplacian high-pass filter")]
#[command(version)]
pub struct Args {
    /// Input GeoTIFF path (projected, EPSG-coded CRS); outputs are written next to it
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
