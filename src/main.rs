use clap::Parser;
use env_logger::Env;
use log::{error, info, warn};
use std::process::ExitCode;

use geotiff_clip_sharpen::cli::Args;
use geotiff_clip_sharpen::pipeline::{PipelineConfig, PipelineContext};
use geotiff_clip_sharpen::{PipelineError, Result};

/// Drive the stages one by one, reporting each as soon as it completes
fn process(ctx: &mut PipelineContext) -> Result<()> {
    let epsg = ctx.check_crs()?;
    println!("Input raster is valid and has valid CRS (EPSG:{})", epsg);

    ctx.clip()?;
    println!(
        "Clipping is successful and output path is {}",
        ctx.paths().clipped.display()
    );

    ctx.sharpen()?;
    ctx.reattach()?;
    println!(
        "Image sharpening is successful and output path is {}",
        ctx.paths().sharpened_geo.display()
    );

    let report = ctx.validate()?;
    for check in &report.checks {
        println!("{}", check);
    }

    // Failed checks are reported, not fatal
    let failed = report.failures().count();
    if failed > 0 {
        warn!("{} of {} checks failed", failed, report.checks.len());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== GeoTIFF Clip & Sharpen ===");
    info!("Input raster: {}", args.input.display());

    let mut ctx = PipelineContext::new(&args.input, PipelineConfig::default());
    match process(&mut ctx) {
        Ok(()) => {
            info!(
                "=== Done (source EPSG:{}) ===",
                ctx.source_epsg().unwrap_or_default()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let PipelineError::InvalidCrs(reason) = e.root() {
                println!("Input raster does not have valid CRS ({}). Exiting", reason);
            }
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
