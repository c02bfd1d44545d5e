//! BCAT: multi-part files assembled from chunk transactions.
//!
//! Chunks and their manifest can arrive in any order, across blocks and
//! the mempool. Assembly is therefore attempted from both sides: when a
//! manifest is recorded, and whenever a chunk it lists is buffered. An
//! attempt that finds something missing simply leaves state as it is;
//! the next related record retries it.

use bitfs_cas::AliasKind;
use bitfs_config::{log_ingest_debug, log_ingest_info, log_store_debug};
use bitfs_index::{ManifestRecord, ManifestStoreError, MetaKind};

use crate::engine::{Engine, Result};
use crate::outcome::{Assembled, Outcome};
use crate::record::ChunkRecord;
use crate::sniff::resolve_content_type;

/// Result of one assembly attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyState {
    /// Manifest id already aliased
    AlreadyAssembled,
    /// At least one listed chunk is not buffered yet
    Waiting { missing: usize },
    Assembled(Assembled),
}

/// Record a manifest, then try to assemble it.
///
/// A duplicate txid keeps the originally stored manifest; assembly is still
/// attempted against that stored copy.
pub fn save_manifest(engine: &Engine, manifest: &ManifestRecord) -> Result<Outcome> {
    let stored = match engine.manifests().create(manifest) {
        Ok(()) => manifest.clone(),
        Err(ManifestStoreError::Duplicate(_)) => {
            log_ingest_debug!("Duplicate manifest", txid = manifest.tx_id.as_str());
            match engine.manifests().get(&manifest.tx_id)? {
                Some(existing) => existing,
                None => manifest.clone(),
            }
        }
        Err(ManifestStoreError::Index(e)) => return Err(e.into()),
    };

    Ok(match try_assemble(engine, &stored)? {
        AssemblyState::AlreadyAssembled => Outcome::AlreadyStored { id: stored.tx_id },
        AssemblyState::Waiting { .. } => Outcome::ManifestPending { id: stored.tx_id },
        AssemblyState::Assembled(done) => Outcome::Assembled(done),
    })
}

/// Buffer a chunk, then try every manifest that lists it.
pub fn save_chunk(engine: &Engine, chunk: &ChunkRecord) -> Result<Outcome> {
    if engine.chunks().put(&chunk.tx_id, &chunk.data)? {
        log_store_debug!("Chunk buffered", txid = chunk.tx_id.as_str(), len = chunk.data.len());
    }

    let mut assembled = Vec::new();
    for manifest in engine.manifests().find_by_chunk(&chunk.tx_id)? {
        if let AssemblyState::Assembled(done) = try_assemble(engine, &manifest)? {
            assembled.push(done);
        }
    }

    Ok(Outcome::ChunkBuffered {
        id: chunk.tx_id.clone(),
        assembled,
    })
}

/// Assemble `manifest` if every chunk is present and it is not aliased yet.
pub fn try_assemble(engine: &Engine, manifest: &ManifestRecord) -> Result<AssemblyState> {
    if engine.linker().is_linked(AliasKind::Bcat, &manifest.tx_id)? {
        return Ok(AssemblyState::AlreadyAssembled);
    }

    let mut missing = 0;
    for chunk_id in &manifest.chunks {
        if !engine.chunks().contains(chunk_id)? {
            missing += 1;
        }
    }
    if missing > 0 || manifest.chunks.is_empty() {
        log_ingest_debug!(
            "Manifest waiting for chunks",
            txid = manifest.tx_id.as_str(),
            missing = missing,
        );
        return Ok(AssemblyState::Waiting { missing });
    }

    // Strictly manifest order
    let mut buffer = Vec::new();
    for chunk_id in &manifest.chunks {
        match engine.chunks().read(chunk_id)? {
            Some(data) => buffer.extend_from_slice(&data),
            None => return Ok(AssemblyState::Waiting { missing: 1 }),
        }
    }

    let content_type = resolve_content_type(manifest.content_type.as_deref(), &buffer);
    let hash = engine.store().store(&buffer)?;

    if let Some(ct) = &content_type {
        engine.metadata().put(MetaKind::C, &hash.to_hex(), ct)?;
        engine.metadata().put(MetaKind::Bcat, &manifest.tx_id, ct)?;
    }
    engine.linker().link(AliasKind::Bcat, &manifest.tx_id, &hash)?;

    let hex = hash.to_hex();
    log_ingest_info!(
        "BCAT file assembled",
        txid = manifest.tx_id.as_str(),
        hash = hex.as_str(),
        chunks = manifest.chunks.len(),
        len = buffer.len(),
    );

    Ok(AssemblyState::Assembled(Assembled {
        manifest_id: manifest.tx_id.clone(),
        hash,
    }))
}
