use anyhow::Result;
use clap::Parser;
use graph_to_geojson::{convert_dir, ConvertConfig};
use log::info;

#[derive(Parser)]
struct Args {
    /// Directory with .graph files to convert. Each one is written as .geojson next to it.
    /// Defaults to data/graphs
    dir: Option<String>,
}

fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info).unwrap();
    let args = Args::parse();

    let mut config = ConvertConfig::default();
    if let Some(dir) = args.dir.filter(|dir| !dir.is_empty()) {
        config.dir = dir.into();
    }

    let summary = convert_dir(&config, &mut std::io::stdout().lock())?;
    info!(
        "{} converted, {} failed",
        summary.converted, summary.failed
    );
    Ok(())
}
