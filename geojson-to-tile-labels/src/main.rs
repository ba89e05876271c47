use clap::Parser;
use geojson_to_tile_labels::{generate_labels, LabelConfig};

/// Cuts region graphs into ground-truth graph labels, one per imagery tile.
#[derive(Parser)]
struct Args {
    /// Directory with REGION.geojson files
    #[arg(long, default_value = "data/graphs")]
    graphs_dir: String,

    /// Directory with REGION_x_y_sat.png tiles
    #[arg(long, default_value = "data/imagery")]
    imagery_dir: String,

    /// Output directory for the label files
    #[arg(long, default_value = "data/labels")]
    out_dir: String,

    /// Tile size in pixels
    #[arg(long, default_value_t = 4096)]
    tile_size: u32,

    /// Only process these regions, instead of every .geojson file in graphs_dir
    #[arg(long, num_args = 1..)]
    regions: Vec<String>,
}

fn main() {
    simple_logger::init_with_level(log::Level::Info).unwrap();
    let args = Args::parse();
    generate_labels(&LabelConfig {
        graphs_dir: args.graphs_dir.into(),
        imagery_dir: args.imagery_dir.into(),
        out_dir: args.out_dir.into(),
        tile_size: args.tile_size,
        regions: args.regions,
    })
    .unwrap();
}
