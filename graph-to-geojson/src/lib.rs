use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry};
use log::{info, warn};

use map_graph::Graph;

/// Where to look for graphs, and how to name the output.
pub struct ConvertConfig {
    /// Directory to scan, non-recursively. Outputs are written next to the inputs.
    pub dir: PathBuf,
    pub input_suffix: String,
    pub output_suffix: String,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/graphs"),
            input_suffix: ".graph".to_string(),
            output_suffix: ".geojson".to_string(),
        }
    }
}

/// One input graph and the GeoJSON file it becomes.
#[derive(Clone, PartialEq, Debug)]
pub struct Conversion {
    pub input: PathBuf,
    pub output: PathBuf,
}

#[derive(Default, PartialEq, Debug)]
pub struct BatchSummary {
    pub converted: usize,
    pub failed: usize,
}

/// Finds every file directly inside `config.dir` ending with the input suffix, sorted by name.
/// Failing to list the directory is an error; nothing is converted in that case.
pub fn scan(config: &ConvertConfig) -> Result<Vec<Conversion>> {
    let entries = std::fs::read_dir(&config.dir)
        .with_context(|| format!("readdir {}", config.dir.display()))?;

    let mut conversions = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("readdir {}", config.dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if file_type.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            warn!("Skipping {}, the name isn't UTF-8", entry.path().display());
            continue;
        };
        let Some(stem) = name.strip_suffix(&config.input_suffix) else {
            continue;
        };
        conversions.push(Conversion {
            input: entry.path(),
            output: config.dir.join(format!("{stem}{}", config.output_suffix)),
        });
    }
    conversions.sort_by(|a, b| a.input.cmp(&b.input));
    Ok(conversions)
}

/// Turns every edge into a two-point LineString, in edge order. The properties identify the
/// edge and its endpoints exactly as the graph labels them.
pub fn to_feature_collection(graph: &Graph) -> FeatureCollection {
    let features = graph
        .edges
        .iter()
        .map(|edge| {
            let (start, end) = (edge.segment.start, edge.segment.end);
            let mut f = Feature::from(Geometry::from(geojson::Value::LineString(vec![
                vec![start.x, start.y],
                vec![end.x, end.y],
            ])));
            f.set_property("edge_id", edge.id.0);
            f.set_property("src", edge.src.0);
            f.set_property("dst", edge.dst.0);
            f
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Writes pretty-printed GeoJSON, replacing anything already at `path`.
pub fn write_geojson(fc: &FeatureCollection, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(fc)
        .with_context(|| format!("serialize geojson for {}", path.display()))?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))
}

/// Converts one graph file, returning the number of edges written.
pub fn convert_file(conversion: &Conversion) -> Result<usize> {
    let graph = Graph::read(&conversion.input)?;
    let fc = to_feature_collection(&graph);
    write_geojson(&fc, &conversion.output)?;
    Ok(fc.features.len())
}

/// Converts every graph in the directory, one at a time, writing a status line per file to
/// `out`. A file that fails is reported and skipped; only failing to list the directory stops
/// the batch.
pub fn convert_dir<W: Write>(config: &ConvertConfig, out: &mut W) -> Result<BatchSummary> {
    let conversions = scan(config)?;
    info!(
        "Found {} {} files in {}",
        conversions.len(),
        config.input_suffix,
        config.dir.display()
    );

    let mut summary = BatchSummary::default();
    for conversion in &conversions {
        match convert_file(conversion) {
            Ok(num_edges) => {
                writeln!(
                    out,
                    "OK  {} -> {}  (edges={num_edges})",
                    file_name(&conversion.input),
                    file_name(&conversion.output)
                )?;
                summary.converted += 1;
            }
            Err(err) => {
                writeln!(out, "ERR {}: {err:#}", file_name(&conversion.input))?;
                summary.failed += 1;
            }
        }
    }
    writeln!(out, "Done!")?;
    Ok(summary)
}

fn file_name(path: &Path) -> Cow<'_, str> {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default()
}
