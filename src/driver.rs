//! File driver: memory-maps one VCD file, drives the header and engine
//! phases over its byte range, and returns owned outputs once the mapping
//! is released.
//!
//! Grounded in `original_source/.../file_mem_map.cc` and the `Parser`
//! constructor in `original_source/.../parser.cc`, which opens, maps, parses
//! both phases and unmaps before returning. `memmap2::Mmap`'s `Drop` impl
//! does the unmap here, so it runs on every exit path including `?`-early
//! returns from a malformed file.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::config::EngineConfig;
use crate::cursor::Cursor;
use crate::engine;
use crate::error::Error;
use crate::extraction::{ExtractionRequest, ExtractionResults};
use crate::header;
use crate::identifier::IdentifierCode;
use crate::spec_files::{InspectionSpec, VarDefSet};
use crate::variable_state::VariableState;

/// Reduces one VCD file to a leakage buffer and a set of extraction
/// results. `var_def_set` is shared across every file in a batch so
/// declaration consistency is checked across files, not just within one.
pub fn parse_one(
    path: &Path,
    inspection_spec: &InspectionSpec,
    config: &EngineConfig,
    var_def_set: &mut VarDefSet,
    extraction_batch: Vec<ExtractionRequest>,
) -> Result<(Vec<i64>, ExtractionResults), Error> {
    let file = File::open(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;

    // Safety: the mapping is read-only and this process does not rely on the
    // file staying unmodified by other processes for longer than the parse.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    log::debug!("mapped {} ({} bytes)", path.display(), mmap.len());

    let result = parse_bytes(&mmap, inspection_spec, config, var_def_set, extraction_batch);

    log::debug!("releasing mapping for {}", path.display());
    drop(mmap);

    result
}

fn parse_bytes(
    bytes: &[u8],
    inspection_spec: &InspectionSpec,
    config: &EngineConfig,
    var_def_set: &mut VarDefSet,
    extraction_batch: Vec<ExtractionRequest>,
) -> Result<(Vec<i64>, ExtractionResults), Error> {
    let ids_to_extract: Vec<IdentifierCode> =
        extraction_batch.iter().flat_map(|request| request.ids.iter().cloned()).collect();

    let mut cursor = Cursor::new(bytes);
    let mut variable_state = VariableState::new();
    let extract_only =
        header::parse_header(&mut cursor, &mut variable_state, inspection_spec, &ids_to_extract, var_def_set)?;

    engine::run(&mut cursor, &mut variable_state, &extract_only, config, extraction_batch)
}
