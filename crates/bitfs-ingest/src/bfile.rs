//! Single-transaction B files.

use bitfs_cas::AliasKind;
use bitfs_config::log_ingest_info;
use bitfs_index::MetaKind;

use crate::engine::{Engine, Result};
use crate::outcome::Outcome;
use crate::record::BFile;
use crate::sniff::resolve_content_type;

/// Store, index and alias a B file. A txid that is already aliased is
/// left alone.
pub fn save_b(engine: &Engine, file: &BFile) -> Result<Outcome> {
    if engine.linker().is_linked(AliasKind::B, &file.tx_id)? {
        return Ok(Outcome::AlreadyStored {
            id: file.tx_id.clone(),
        });
    }

    let content_type = resolve_content_type(file.content_type.as_deref(), &file.data);
    let hash = engine.store().store(&file.data)?;

    // The alias is created last: it marks the whole write as done.
    if let Some(ct) = &content_type {
        engine.metadata().put(MetaKind::C, &hash.to_hex(), ct)?;
        engine.metadata().put(MetaKind::B, &file.tx_id, ct)?;
    }
    engine.linker().link(AliasKind::B, &file.tx_id, &hash)?;

    let hex = hash.to_hex();
    log_ingest_info!(
        "B file stored",
        txid = file.tx_id.as_str(),
        hash = hex.as_str(),
        len = file.data.len(),
    );
    Ok(Outcome::Stored {
        id: file.tx_id.clone(),
        hash,
    })
}
