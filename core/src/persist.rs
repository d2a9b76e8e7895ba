//! On-disk layout of a [`MemoryIndex`]: `index.bin` (bincode body) next to `meta.json`.

use crate::index::{IndexStatsSource, MemoryIndex};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u64,
    pub total_terms: u64,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn body(&self) -> PathBuf { self.root.join("index.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

pub fn save_index(paths: &IndexPaths, index: &MemoryIndex) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = BufWriter::new(File::create(paths.body())?);
    bincode::serialize_into(&mut f, index)?;
    f.flush()?;

    let stats = index.collection_stats();
    let meta = MetaFile { num_docs: stats.document_count, total_terms: stats.total_term_count, version: FORMAT_VERSION };
    save_meta(paths, &meta)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let f = File::open(paths.meta()).with_context(|| format!("opening {}", paths.meta().display()))?;
    let meta: MetaFile = serde_json::from_reader(BufReader::new(f))?;
    Ok(meta)
}

/// Load an index, checking the body against its meta file. An empty collection is rejected.
pub fn load_index(paths: &IndexPaths) -> Result<MemoryIndex> {
    let meta = load_meta(paths)?;
    if meta.version != FORMAT_VERSION {
        bail!("unsupported index format version {} (expected {FORMAT_VERSION})", meta.version);
    }
    let f = File::open(paths.body()).with_context(|| format!("opening {}", paths.body().display()))?;
    let index: MemoryIndex = bincode::deserialize_from(BufReader::new(f))
        .with_context(|| format!("decoding {}", paths.body().display()))?;

    let stats = index.collection_stats().validate().map_err(anyhow::Error::new)?;
    if stats.document_count != meta.num_docs || stats.total_term_count != meta.total_terms {
        bail!(
            "index body ({} docs, {} terms) does not match meta.json ({} docs, {} terms)",
            stats.document_count, stats.total_term_count, meta.num_docs, meta.total_terms
        );
    }
    tracing::info!(root = %paths.root.display(), docs = stats.document_count, terms = index.num_terms(), "index loaded");
    Ok(index)
}
