//! Dump/load orchestration for the `.apo` binary snapshot.
//!
//! CRC32 framing follows a write-ahead-log style (`crc32fast::hash` plus
//! explicit little-endian integers); gzip transparency wraps the whole
//! framed byte stream (see DESIGN.md).

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{ApoError, Result};
use crate::external::RecordLoader;
use crate::graph::{GraphConfig, GraphCore};
use crate::metric::DistanceMetric;
use crate::record::HashRecord;

use super::format::{
    self, read_node_record, write_node_record, write_u32, NodeRecord, Reader, GZIP_MAGIC, I_SIZE, MAGIC, VERSION,
};

fn encode_cfg(config: &GraphConfig) -> Vec<u8> {
    let mut buf = Vec::new();
    write_u32(&mut buf, config.m as u32);
    write_u32(&mut buf, config.ef as u32);
    write_u32(&mut buf, config.m_max as u32);
    write_u32(&mut buf, config.m_max0 as u32);
    write_u32(&mut buf, config.metric.tag() as u32);
    format::write_bool(&mut buf, config.heuristic);
    format::write_bool(&mut buf, config.extend_candidates);
    format::write_bool(&mut buf, config.keep_pruned_conns);
    format::write_f32(&mut buf, config.beer_factor);
    buf
}

fn decode_cfg(r: &mut Reader<'_>) -> Result<GraphConfig> {
    let m = r.read_u32()? as usize;
    let ef = r.read_u32()? as usize;
    let m_max = r.read_u32()? as usize;
    let m_max0 = r.read_u32()? as usize;
    let metric_tag = r.read_u32()? as u8;
    let metric = DistanceMetric::from_tag(metric_tag)?;
    let heuristic = r.read_bool()?;
    let extend_candidates = r.read_bool()?;
    let keep_pruned_conns = r.read_bool()?;
    let beer_factor = r.read_f32()?;
    Ok(GraphConfig {
        m,
        ef,
        m_max,
        m_max0,
        heuristic,
        extend_candidates,
        keep_pruned_conns,
        beer_factor,
        metric,
    })
}

fn node_record_for(graph: &GraphCore, idx: usize, layer: usize, with_layer: bool) -> NodeRecord {
    let rec = graph.record_unchecked(idx);
    let neighborhoods = (0..=layer)
        .map(|l| {
            let pids: Vec<u32> = rec
                .neighbors_at(l)
                .iter()
                .map(|&n| graph.record_unchecked(n).page_id())
                .collect();
            (l as u32, pids)
        })
        .collect();
    NodeRecord {
        page_id: rec.page_id(),
        layer: if with_layer { Some(layer as u32) } else { None },
        neighborhoods,
    }
}

/// Entry section layout: a one-word presence flag, followed by the entry
/// node record only when present. An empty graph has no entry point, so
/// the flag lets the section (and therefore `dump`) encode that case
/// instead of failing — `IndexEmpty` is reserved for query-time operations
/// on an empty graph (`knn_search`, `threshold_search`, `delete`).
fn encode_entry_point(graph: &GraphCore) -> Vec<u8> {
    let mut buf = Vec::new();
    match graph.entry_point_idx() {
        Some(idx) => {
            format::write_bool(&mut buf, true);
            let layer = graph.record_unchecked(idx).layer().unwrap();
            write_node_record(&mut buf, &node_record_for(graph, idx, layer, true));
        }
        None => format::write_bool(&mut buf, false),
    }
    buf
}

fn encode_nodes(graph: &GraphCore) -> Vec<u8> {
    let entry_idx = graph.entry_point_idx();
    let mut groups: Vec<(u32, Vec<u8>, u32)> = Vec::new();

    for (&layer, idxs) in graph.by_layer() {
        let mut group_buf = Vec::new();
        let mut count = 0u32;
        for &idx in idxs {
            if Some(idx) == entry_idx {
                continue;
            }
            write_node_record(&mut group_buf, &node_record_for(graph, idx, layer, false));
            count += 1;
        }
        if count > 0 {
            groups.push((layer as u32, group_buf, count));
        }
    }

    let mut buf = Vec::new();
    write_u32(&mut buf, groups.len() as u32);
    for (layer, group_buf, count) in groups {
        write_u32(&mut buf, layer);
        write_u32(&mut buf, count);
        buf.extend_from_slice(&group_buf);
    }
    buf
}

/// Writes a snapshot of `graph`. Two-pass: sections are built into
/// in-memory buffers (accumulating their CRCs) before the header and
/// buffered sections are written out, optionally gzip-wrapped.
pub fn dump<W: Write>(graph: &GraphCore, mut writer: W, compress: bool) -> Result<()> {
    let cfg_bytes = encode_cfg(graph.config());
    let entry_bytes = encode_entry_point(graph);
    let nodes_bytes = encode_nodes(graph);

    let crc_cfg = crc32fast::hash(&cfg_bytes);
    let crc_entry = crc32fast::hash(&entry_bytes);
    let crc_nodes = crc32fast::hash(&nodes_bytes);

    let mut out = Vec::with_capacity(16 + cfg_bytes.len() + entry_bytes.len() + nodes_bytes.len());
    out.extend_from_slice(&MAGIC);
    out.push(VERSION);
    out.push(0);
    write_u32(&mut out, crc_cfg);
    write_u32(&mut out, crc_entry);
    write_u32(&mut out, crc_nodes);
    out.extend_from_slice(&cfg_bytes);
    out.extend_from_slice(&entry_bytes);
    out.extend_from_slice(&nodes_bytes);

    if compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&out)?;
        writer.write_all(&encoder.finish()?)?;
    } else {
        writer.write_all(&out)?;
    }
    tracing::info!(nodes = graph.len(), compress, "dumped snapshot");
    Ok(())
}

const CFG_LEN: usize = 9 * I_SIZE;

/// Reads a snapshot, resolving page-ids through `loader`. Two-pass: build
/// `page_id -> arena index` and `page_id -> {layer -> neighbor page_ids}`
/// maps while reading, then resolve edges once every node is known.
pub fn load<R: Read>(mut reader: R, metric: DistanceMetric, loader: &dyn RecordLoader) -> Result<GraphCore> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw)?;

    let bytes: Vec<u8> = if raw.len() >= 2 && raw[0..2] == GZIP_MAGIC {
        let mut decoder = GzDecoder::new(&raw[..]);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        out
    } else {
        raw
    };

    let mut r = Reader::new(&bytes);
    let magic = r.read_bytes(2)?;
    let version = r.read_bytes(1)?[0];
    let _flags = r.read_bytes(1)?[0];
    if magic != MAGIC || version != VERSION {
        return Err(ApoError::BadFormat);
    }
    let crc_cfg_expected = r.read_u32()?;
    let crc_entry_expected = r.read_u32()?;
    let crc_nodes_expected = r.read_u32()?;

    let cfg_start = r.pos();
    let config = decode_cfg(&mut r)?;
    let crc_cfg_actual = crc32fast::hash(r.slice_from(cfg_start));
    if crc_cfg_actual != crc_cfg_expected {
        return Err(ApoError::BadCrc {
            section: "cfg",
            expected: crc_cfg_expected,
            actual: crc_cfg_actual,
        });
    }
    if config.metric != metric {
        return Err(ApoError::MetricMismatch {
            expected: metric.name().to_string(),
            actual: config.metric.name().to_string(),
        });
    }
    // CFG_LEN documents the fixed on-disk width this decode consumes.
    debug_assert_eq!(r.pos() - cfg_start, CFG_LEN);

    let entry_start = r.pos();
    let has_entry = r.read_bool()?;
    let entry_node = if has_entry { Some(read_node_record(&mut r, true)?) } else { None };
    let crc_entry_actual = crc32fast::hash(r.slice_from(entry_start));
    if crc_entry_actual != crc_entry_expected {
        return Err(ApoError::BadCrc {
            section: "entry",
            expected: crc_entry_expected,
            actual: crc_entry_actual,
        });
    }

    let mut graph = GraphCore::new(config);
    let mut page_to_idx: BTreeMap<u32, usize> = BTreeMap::new();
    let mut page_neighbors: BTreeMap<u32, BTreeMap<usize, BTreeSet<u32>>> = BTreeMap::new();

    if let Some(entry_node) = entry_node {
        let entry_layer = entry_node.layer.unwrap();
        let entry_record = loader.fetch(entry_node.page_id, metric).map_err(loader_failed)?;
        let entry_idx = graph.restore_record(entry_record, entry_layer as usize, true);
        page_to_idx.insert(entry_node.page_id, entry_idx);
        page_neighbors.insert(entry_node.page_id, collect_neighborhoods(&entry_node.neighborhoods));
    }

    let nodes_start = r.pos();
    let n_layers = r.read_u32()?;
    for _ in 0..n_layers {
        let layer = r.read_u32()?;
        let n_nodes = r.read_u32()?;
        for _ in 0..n_nodes {
            let node = read_node_record(&mut r, false)?;
            let record = loader.fetch(node.page_id, metric).map_err(loader_failed)?;
            let idx = graph.restore_record(record, layer as usize, false);
            page_to_idx.insert(node.page_id, idx);
            page_neighbors.insert(node.page_id, collect_neighborhoods(&node.neighborhoods));
        }
    }
    let crc_nodes_actual = crc32fast::hash(r.slice_from(nodes_start));
    if crc_nodes_actual != crc_nodes_expected {
        return Err(ApoError::BadCrc {
            section: "nodes",
            expected: crc_nodes_expected,
            actual: crc_nodes_actual,
        });
    }

    for (page_id, by_layer) in &page_neighbors {
        let &owner_idx = page_to_idx.get(page_id).expect("just inserted above");
        for (&layer, neighbor_pids) in by_layer {
            for &pid in neighbor_pids {
                let &neighbor_idx = page_to_idx
                    .get(&pid)
                    .ok_or(ApoError::CorruptIndex { page_id: pid })?;
                graph.add_edge_one_sided(owner_idx, neighbor_idx, layer);
            }
        }
    }

    tracing::info!(nodes = graph.len(), "loaded snapshot");
    Ok(graph)
}

fn collect_neighborhoods(neighborhoods: &[(u32, Vec<u32>)]) -> BTreeMap<usize, BTreeSet<u32>> {
    neighborhoods
        .iter()
        .map(|(layer, pids)| (*layer as usize, pids.iter().copied().collect()))
        .collect()
}

fn loader_failed(e: ApoError) -> ApoError {
    match e {
        ApoError::LoaderFailed(_) => e,
        other => ApoError::LoaderFailed(other.to_string()),
    }
}

/// An in-memory [`HashRecord`] loader for dump/load round-trip tests,
/// keyed by page-id.
pub struct MapLoader {
    records: BTreeMap<u32, HashRecord>,
}

impl MapLoader {
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, record: HashRecord) {
        self.records.insert(record.page_id(), record);
    }
}

impl Default for MapLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordLoader for MapLoader {
    fn fetch(&self, page_id: u32, metric: DistanceMetric) -> Result<HashRecord> {
        self.records
            .get(&page_id)
            .cloned()
            .filter(|r| r.metric() == metric)
            .ok_or_else(|| ApoError::LoaderFailed(format!("no record for page_id {page_id}")))
    }
}
