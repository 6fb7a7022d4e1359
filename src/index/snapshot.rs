// src/index/snapshot.rs
//
// Versioned on-disk snapshot of the vector index. A snapshot is a
// directory of four files: a JSON header (magic, version, dimensions,
// counts, config), two little-endian binary blobs for the vector arena
// and the graph topology, and a JSON track table. Loading rejects
// mismatched magic, version or dimension.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::hnsw::{HnswGraph, HnswNode};
use super::{IndexConfig, TrackMetadata, VectorIndex, VectorRecord, VectorStore};
use crate::error::{Error, Result};

const MAGIC: &str = "audioprint-index";
const VERSION: u32 = 1;

const HEADER_FILE: &str = "index.json";
const VECTORS_FILE: &str = "vectors.bin";
const GRAPH_FILE: &str = "graph.bin";
const TRACKS_FILE: &str = "tracks.json";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    magic: String,
    version: u32,
    dim: usize,
    vector_count: usize,
    node_count: usize,
    track_count: usize,
    config: IndexConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct TrackRow {
    meta: TrackMetadata,
    deleted: bool,
}

pub(crate) fn save(index: &VectorIndex, path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    let (config, graph, store, tracks) = index.parts();

    let header = Header {
        magic: MAGIC.to_string(),
        version: VERSION,
        dim: config.dim,
        vector_count: store.len(),
        node_count: graph.len(),
        track_count: tracks.len(),
        config: config.clone(),
    };
    let header_json = serde_json::to_vec_pretty(&header)
        .map_err(|e| Error::Internal(format!("failed to encode snapshot header: {e}")))?;
    fs::write(path.join(HEADER_FILE), header_json)?;

    write_vectors(&path.join(VECTORS_FILE), store, config.dim)?;
    write_graph(&path.join(GRAPH_FILE), graph)?;

    let rows: Vec<TrackRow> = tracks
        .into_iter()
        .map(|(meta, deleted)| TrackRow { meta, deleted })
        .collect();
    let tracks_json = serde_json::to_vec_pretty(&rows)
        .map_err(|e| Error::Internal(format!("failed to encode track table: {e}")))?;
    fs::write(path.join(TRACKS_FILE), tracks_json)?;

    Ok(())
}

pub(crate) fn load(path: &Path) -> Result<VectorIndex> {
    let header_bytes = fs::read(path.join(HEADER_FILE))?;
    let header: Header = serde_json::from_slice(&header_bytes)
        .map_err(|e| Error::InvalidInput(format!("corrupt snapshot header: {e}")))?;

    if header.magic != MAGIC {
        return Err(Error::InvalidInput(format!(
            "not an index snapshot: bad magic {:?}",
            header.magic
        )));
    }
    if header.version != VERSION {
        return Err(Error::InvalidInput(format!(
            "unsupported snapshot version {} (expected {VERSION})",
            header.version
        )));
    }
    if header.dim != header.config.dim {
        return Err(Error::InvalidInput(format!(
            "snapshot dimension {} disagrees with its config ({})",
            header.dim, header.config.dim
        )));
    }

    let store = read_vectors(&path.join(VECTORS_FILE), header.dim, header.vector_count)?;
    let graph = read_graph(
        &path.join(GRAPH_FILE),
        &header.config,
        header.node_count,
    )?;
    if graph.len() != store.len() {
        return Err(Error::InvalidInput(format!(
            "snapshot graph has {} nodes but {} vectors",
            graph.len(),
            store.len()
        )));
    }

    let tracks_bytes = fs::read(path.join(TRACKS_FILE))?;
    let rows: Vec<TrackRow> = serde_json::from_slice(&tracks_bytes)
        .map_err(|e| Error::InvalidInput(format!("corrupt track table: {e}")))?;
    if rows.len() != header.track_count {
        return Err(Error::InvalidInput(format!(
            "snapshot declares {} tracks but the table has {}",
            header.track_count,
            rows.len()
        )));
    }
    let tracks = rows.into_iter().map(|r| (r.meta, r.deleted)).collect();

    VectorIndex::from_parts(header.config, graph, store, tracks)
}

fn write_vectors(path: &Path, store: &VectorStore, dim: usize) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&(store.len() as u64).to_le_bytes())?;
    for record in &store.records {
        w.write_all(&record.track_idx.to_le_bytes())?;
        w.write_all(&record.ref_time_s.to_le_bytes())?;
        debug_assert_eq!(record.values.len(), dim);
        for &v in &record.values {
            w.write_all(&v.to_le_bytes())?;
        }
    }
    w.flush()?;
    Ok(())
}

fn read_vectors(path: &Path, dim: usize, expected: usize) -> Result<VectorStore> {
    let mut r = BufReader::new(File::open(path)?);
    let count = read_u64(&mut r)? as usize;
    if count != expected {
        return Err(Error::InvalidInput(format!(
            "vector blob holds {count} vectors, header says {expected}"
        )));
    }

    let mut store = VectorStore::new(dim);
    for _ in 0..count {
        let track_idx = read_u32(&mut r)?;
        let ref_time_s = read_f64(&mut r)?;
        let mut values = Vec::with_capacity(dim);
        for _ in 0..dim {
            values.push(read_f32(&mut r)?);
        }
        store.push(VectorRecord {
            track_idx,
            ref_time_s,
            values,
        });
    }
    Ok(store)
}

fn write_graph(path: &Path, graph: &HnswGraph) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&(graph.len() as u64).to_le_bytes())?;
    match graph.entry_point {
        Some(entry) => {
            w.write_all(&[1u8])?;
            w.write_all(&entry.to_le_bytes())?;
        }
        None => {
            w.write_all(&[0u8])?;
            w.write_all(&0u32.to_le_bytes())?;
        }
    }
    w.write_all(&(graph.top_level as u16).to_le_bytes())?;

    for node in &graph.nodes {
        w.write_all(&[u8::from(node.deleted)])?;
        w.write_all(&(node.level as u16).to_le_bytes())?;
        for links in &node.neighbors {
            w.write_all(&(links.len() as u32).to_le_bytes())?;
            for &n in links {
                w.write_all(&n.to_le_bytes())?;
            }
        }
    }
    w.flush()?;
    Ok(())
}

fn read_graph(path: &Path, config: &IndexConfig, expected: usize) -> Result<HnswGraph> {
    let mut r = BufReader::new(File::open(path)?);
    let count = read_u64(&mut r)? as usize;
    if count != expected {
        return Err(Error::InvalidInput(format!(
            "graph blob holds {count} nodes, header says {expected}"
        )));
    }

    let has_entry = read_u8(&mut r)? != 0;
    let entry = read_u32(&mut r)?;
    let entry_point = has_entry.then_some(entry);
    let top_level = read_u16(&mut r)? as usize;

    let mut nodes = Vec::with_capacity(count);
    for _ in 0..count {
        let deleted = read_u8(&mut r)? != 0;
        let level = read_u16(&mut r)? as usize;
        let mut neighbors = Vec::with_capacity(level + 1);
        for _ in 0..=level {
            let links = read_u32(&mut r)? as usize;
            let mut layer = Vec::with_capacity(links);
            for _ in 0..links {
                let n = read_u32(&mut r)?;
                if n as usize >= count {
                    return Err(Error::InvalidInput(format!(
                        "graph blob links to missing node {n}"
                    )));
                }
                layer.push(n);
            }
            neighbors.push(layer);
        }
        nodes.push(HnswNode {
            level,
            neighbors,
            deleted,
        });
    }

    Ok(HnswGraph::from_parts(
        config.m,
        config.ef_construction,
        nodes,
        entry_point,
        top_level,
    ))
}

fn read_u8(r: &mut impl Read) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u16(r: &mut impl Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f32(r: &mut impl Read) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_f64(r: &mut impl Read) -> Result<f64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}
