//! Engine context: every durable handle the handlers need, opened once.

use bitfs_cas::{CasError, ChunkBuffer, ContentStore, FsLayout, Linker};
use bitfs_config::Config;
use bitfs_index::{
    IndexError, IndexOptions, LmdbManifestStore, ManifestStore, MetadataIndex,
};
use thiserror::Error;
use tracing::info;

/// Storage failures. These are never downgraded to a skip: continuing past
/// one risks silently losing data.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("content store: {0}")]
    Cas(#[from] CasError),

    #[error("index: {0}")]
    Index(#[from] IndexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;

pub struct Engine {
    layout: FsLayout,
    store: ContentStore,
    linker: Linker,
    chunks: ChunkBuffer,
    metadata: MetadataIndex,
    manifests: Box<dyn ManifestStore>,
}

impl Engine {
    /// Open (or create) the store, indexes and layout under `config.storage.root`.
    pub fn open(config: &Config) -> Result<Self> {
        let layout = FsLayout::new(&config.storage.root);
        layout.create_all()?;
        let manifests = LmdbManifestStore::open(layout.manifests_dir(), index_options(config))?;
        Self::with_manifest_store(config, Box::new(manifests))
    }

    /// Open with a caller-supplied manifest store.
    pub fn with_manifest_store(config: &Config, manifests: Box<dyn ManifestStore>) -> Result<Self> {
        let layout = FsLayout::new(&config.storage.root);
        layout.create_all()?;

        let store = ContentStore::new(&layout)?;
        let linker = Linker::new(layout.clone(), store.clone());
        let chunks = ChunkBuffer::new(&layout)?;
        let metadata = MetadataIndex::open(layout.metadata_dir(), index_options(config))?;

        info!(root = %layout.root().display(), "Engine opened");

        Ok(Self {
            layout,
            store,
            linker,
            chunks,
            metadata,
            manifests,
        })
    }

    pub fn layout(&self) -> &FsLayout {
        &self.layout
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn linker(&self) -> &Linker {
        &self.linker
    }

    pub fn chunks(&self) -> &ChunkBuffer {
        &self.chunks
    }

    pub fn metadata(&self) -> &MetadataIndex {
        &self.metadata
    }

    pub fn manifests(&self) -> &dyn ManifestStore {
        self.manifests.as_ref()
    }
}

fn index_options(config: &Config) -> IndexOptions {
    IndexOptions {
        map_size: config.index.map_size,
        max_readers: config.index.max_readers,
    }
}
