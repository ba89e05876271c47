use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use geo::Coord;
use geojson::{FeatureCollection, JsonObject, JsonValue};
use log::{error, info, warn};
use serde::Serialize;

pub struct LabelConfig {
    /// Holds `<region>.geojson` files, as written by graph-to-geojson
    pub graphs_dir: PathBuf,
    /// Holds `<region>_<tx>_<ty>_sat.png` tiles
    pub imagery_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Width and height of one imagery tile, in the same units as the graph coordinates
    pub tile_size: u32,
    /// Only process these regions. If empty, every region in `graphs_dir` is used.
    pub regions: Vec<String>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            graphs_dir: PathBuf::from("data/graphs"),
            imagery_dir: PathBuf::from("data/imagery"),
            out_dir: PathBuf::from("data/labels"),
            tile_size: 4096,
            regions: Vec::new(),
        }
    }
}

/// The nodes and edges recovered from a region's GeoJSON. Nodes only exist as edge endpoints.
#[derive(Default, Debug)]
pub struct RegionGraph {
    pub nodes: BTreeMap<i64, Coord>,
    pub edges: Vec<InputEdge>,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct InputEdge {
    pub edge_id: i64,
    pub src: i64,
    pub dst: i64,
}

#[derive(Clone, PartialEq, Debug)]
pub struct Tile {
    pub path: PathBuf,
    pub tx: i64,
    pub ty: i64,
}

/// The part of a region's graph inside one imagery tile, in tile pixel coordinates.
#[derive(Serialize, Debug)]
pub struct TileLabel {
    pub region: String,
    pub image_path: String,
    pub tile_xy: [i64; 2],
    pub tile_size: u32,
    pub coord_convention: &'static str,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub nodes: Vec<LabelNode>,
    pub edges: Vec<LabelEdge>,
}

#[derive(Serialize, PartialEq, Debug)]
pub struct LabelNode {
    pub nid: i64,
    pub idx: usize,
    pub x: f64,
    pub y: f64,
}

#[derive(Serialize, PartialEq, Debug)]
pub struct LabelEdge {
    pub eid: i64,
    pub src_idx: usize,
    pub dst_idx: usize,
}

/// Reads the LineString features of a region. The first point of each line is the position of
/// `src` and the last is `dst`. If a node appears on many edges, the last one read wins.
pub fn load_region_graph(path: &Path) -> Result<RegionGraph> {
    let input =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let fc: FeatureCollection = input
        .parse()
        .with_context(|| format!("parse {}", path.display()))?;

    let mut graph = RegionGraph::default();
    for (idx, feature) in fc.features.into_iter().enumerate() {
        let Some(geojson::Value::LineString(pts)) = feature.geometry.map(|g| g.value) else {
            continue;
        };
        let (Some(first), Some(last)) = (pts.first(), pts.last()) else {
            continue;
        };

        let props = feature.properties.unwrap_or_default();
        let edge = read_edge(&props)
            .with_context(|| format!("feature {idx} in {}", path.display()))?;
        graph.nodes.insert(edge.src, to_coord(first)?);
        graph.nodes.insert(edge.dst, to_coord(last)?);
        graph.edges.push(edge);
    }
    Ok(graph)
}

fn read_edge(props: &JsonObject) -> Result<InputEdge> {
    let edge_id = match props.get("edge_id") {
        Some(value) => as_int(value).context("edge_id")?,
        None => -1,
    };
    let src = props.get("src").context("missing src")?;
    let dst = props.get("dst").context("missing dst")?;
    Ok(InputEdge {
        edge_id,
        src: as_int(src).context("src")?,
        dst: as_int(dst).context("dst")?,
    })
}

// IDs are usually integers, but tolerate whole floats like `3.0` and numeric strings
fn as_int(value: &JsonValue) -> Result<i64> {
    if let Some(x) = value.as_i64() {
        return Ok(x);
    }
    if let Some(x) = value.as_f64() {
        if x.fract() == 0.0 && x >= i64::MIN as f64 && x < i64::MAX as f64 {
            return Ok(x as i64);
        }
    }
    if let Some(x) = value.as_str().and_then(|s| s.trim().parse().ok()) {
        return Ok(x);
    }
    bail!("{value} isn't an integer")
}

fn to_coord(pos: &[f64]) -> Result<Coord> {
    match pos {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => bail!("position {pos:?} has fewer than 2 dimensions"),
    }
}

/// Finds `<region>_<tx>_<ty>_sat.png` in the imagery directory, sorted by `(tx, ty)`. A missing
/// directory just means there are no tiles.
pub fn find_tiles(imagery_dir: &Path, region: &str) -> Result<Vec<Tile>> {
    let entries = match std::fs::read_dir(imagery_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("readdir {}", imagery_dir.display()));
        }
    };

    let mut tiles = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("readdir {}", imagery_dir.display()))?;
        let name = entry.file_name();
        if let Some((tx, ty)) = name.to_str().and_then(|name| parse_tile_name(name, region)) {
            tiles.push(Tile {
                path: entry.path(),
                tx,
                ty,
            });
        }
    }
    tiles.sort_by_key(|tile| (tile.tx, tile.ty));
    Ok(tiles)
}

fn parse_tile_name(name: &str, region: &str) -> Option<(i64, i64)> {
    let xy = name
        .strip_prefix(region)?
        .strip_prefix('_')?
        .strip_suffix("_sat.png")?;
    let (tx, ty) = xy.split_once('_')?;
    Some((parse_tile_coord(tx)?, parse_tile_coord(ty)?))
}

// Only an optional minus sign followed by digits; no `+5` or whitespace
fn parse_tile_coord(x: &str) -> Option<i64> {
    let digits = x.strip_prefix('-').unwrap_or(x);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    x.parse().ok()
}

/// Cuts out the part of the graph inside one tile. Tiles are half-open squares, so a node on the
/// shared border of two tiles belongs to the one on the right or below. Edges are only kept when
/// both ends are inside. Returns `None` if no nodes are inside.
pub fn tile_label(
    region: &str,
    graph: &RegionGraph,
    tile: &Tile,
    tile_size: u32,
) -> Option<TileLabel> {
    let size = tile_size as f64;
    // Tile coordinates come from file names and can be arbitrarily large
    let x0 = tile.tx as f64 * size;
    let y0 = tile.ty as f64 * size;
    let inside = |pt: &Coord| x0 <= pt.x && pt.x < x0 + size && y0 <= pt.y && pt.y < y0 + size;

    // BTreeMap iteration is sorted by node ID, so indices are compact and stable
    let mut idx_for_node = BTreeMap::new();
    let mut nodes = Vec::new();
    for (nid, pt) in &graph.nodes {
        if inside(pt) {
            idx_for_node.insert(*nid, nodes.len());
            nodes.push(LabelNode {
                nid: *nid,
                idx: nodes.len(),
                x: pt.x - x0,
                y: pt.y - y0,
            });
        }
    }
    if nodes.is_empty() {
        return None;
    }

    let edges: Vec<LabelEdge> = graph
        .edges
        .iter()
        .filter_map(|e| {
            Some(LabelEdge {
                eid: e.edge_id,
                src_idx: *idx_for_node.get(&e.src)?,
                dst_idx: *idx_for_node.get(&e.dst)?,
            })
        })
        .collect();

    Some(TileLabel {
        region: region.to_string(),
        image_path: tile.path.to_string_lossy().into_owned(),
        tile_xy: [tile.tx, tile.ty],
        tile_size,
        coord_convention: "pixel_y_down",
        num_nodes: nodes.len(),
        num_edges: edges.len(),
        nodes,
        edges,
    })
}

/// Writes one label file per tile with graph content, returning how many were written.
pub fn process_region(config: &LabelConfig, region: &str) -> Result<usize> {
    let geojson_path = config.graphs_dir.join(format!("{region}.geojson"));
    if !geojson_path.exists() {
        warn!("[{region}] SKIP: {} not found", geojson_path.display());
        return Ok(0);
    }

    info!("[{region}] Loading graph: {}", geojson_path.display());
    let graph = load_region_graph(&geojson_path)?;
    if graph.edges.is_empty() {
        warn!("[{region}] No edges found; skipping.");
        return Ok(0);
    }

    let tiles = find_tiles(&config.imagery_dir, region)?;
    if tiles.is_empty() {
        warn!(
            "[{region}] No imagery tiles found in {}; skipping.",
            config.imagery_dir.display()
        );
        return Ok(0);
    }

    std::fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("create {}", config.out_dir.display()))?;

    let mut written = 0;
    for tile in &tiles {
        let Some(label) = tile_label(region, &graph, tile, config.tile_size) else {
            continue;
        };
        let out_path = config
            .out_dir
            .join(format!("{region}_{}_{}_graph.json", tile.tx, tile.ty));
        let json = serde_json::to_string_pretty(&label)
            .with_context(|| format!("serialize {}", out_path.display()))?;
        std::fs::write(&out_path, json)
            .with_context(|| format!("write {}", out_path.display()))?;
        written += 1;
        info!(
            "[{region}] Wrote {} (nodes={}, edges={})",
            out_path.display(),
            label.num_nodes,
            label.num_edges
        );
    }

    info!("[{region}] Done. {written} file(s).");
    Ok(written)
}

/// The stems of every `.geojson` file in the directory, sorted.
pub fn find_regions(graphs_dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(graphs_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("readdir {}", graphs_dir.display()));
        }
    };

    let mut regions = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("readdir {}", graphs_dir.display()))?;
        let name = entry.file_name();
        if let Some(region) = name.to_str().and_then(|n| n.strip_suffix(".geojson")) {
            regions.push(region.to_string());
        }
    }
    regions.sort();
    Ok(regions)
}

/// Processes every region, returning the total number of label files written. A region that
/// fails is logged and skipped.
pub fn generate_labels(config: &LabelConfig) -> Result<usize> {
    let regions = if config.regions.is_empty() {
        find_regions(&config.graphs_dir)?
    } else {
        config.regions.clone()
    };
    if regions.is_empty() {
        info!("No regions found.");
        return Ok(0);
    }

    std::fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("create {}", config.out_dir.display()))?;

    let mut total = 0;
    for region in &regions {
        match process_region(config, region) {
            Ok(written) => total += written,
            Err(err) => error!("[{region}] ERR {err:#}"),
        }
    }
    info!("All regions done. Total GT files: {total}");
    Ok(total)
}
