//! Outbound ports (driven ports) and their default adapters.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use parking_lot::RwLock;
use shared_types::Hash;

use crate::domain::errors::StorageError;

/// Durable key-value storage for serialized view-change blocks.
///
/// Writes must be durable before `Ok` is returned, and reads must observe
/// every prior successful write in this process: the duplicate gate relies
/// on read-your-writes.
pub trait VcBlockStore: Send + Sync {
    /// Fetch a stored block by canonical hash.
    fn get_vc_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError>;

    /// Persist a serialized block under its canonical hash.
    fn put_vc_block(&self, hash: &Hash, bytes: &[u8]) -> Result<(), StorageError>;
}

/// Hands an outgoing frame to the tree-based broadcast subsystem.
///
/// The transport fans the frame out to `cluster_size` receivers per shard
/// across `child_clusters` subtree levels; delivery is best-effort.
pub trait ShardBroadcaster: Send + Sync {
    /// Enqueue `frame` for fan-out.
    fn send_to_shard_nodes(&self, frame: Vec<u8>, cluster_size: u32, child_clusters: u32);
}

/// Clock abstraction so the timestamp gate is testable.
pub trait TimeSource: Send + Sync {
    /// Current time, seconds since the Unix epoch.
    fn now(&self) -> u64;
}

impl<T: VcBlockStore + ?Sized> VcBlockStore for std::sync::Arc<T> {
    fn get_vc_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get_vc_block(hash)
    }

    fn put_vc_block(&self, hash: &Hash, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).put_vc_block(hash, bytes)
    }
}

impl<T: ShardBroadcaster + ?Sized> ShardBroadcaster for std::sync::Arc<T> {
    fn send_to_shard_nodes(&self, frame: Vec<u8>, cluster_size: u32, child_clusters: u32) {
        (**self).send_to_shard_nodes(frame, cluster_size, child_clusters)
    }
}

impl<T: TimeSource + ?Sized> TimeSource for std::sync::Arc<T> {
    fn now(&self) -> u64 {
        (**self).now()
    }
}

/// Production time source backed by the system clock.
#[derive(Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// In-memory block store for unit tests and lookup caches.
#[derive(Default)]
pub struct InMemoryVcBlockStore {
    blocks: RwLock<HashMap<Hash, Vec<u8>>>,
}

impl InMemoryVcBlockStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    /// True when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl VcBlockStore for InMemoryVcBlockStore {
    fn get_vc_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blocks.read().get(hash).cloned())
    }

    fn put_vc_block(&self, hash: &Hash, bytes: &[u8]) -> Result<(), StorageError> {
        self.blocks.write().insert(*hash, bytes.to_vec());
        Ok(())
    }
}

/// File-backed block store: one file per block, named by the hex hash.
///
/// Writes go through a temp file, `sync_all`, then an atomic rename, so a
/// block is either fully durable or absent.
pub struct FileVcBlockStore {
    dir: PathBuf,
}

impl FileVcBlockStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::Io {
            message: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    fn block_path(&self, hash: &Hash) -> PathBuf {
        self.dir.join(hex::encode(hash))
    }
}

impl VcBlockStore for FileVcBlockStore {
    fn get_vc_block(&self, hash: &Hash) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(self.block_path(hash)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io {
                message: e.to_string(),
            }),
        }
    }

    fn put_vc_block(&self, hash: &Hash, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.block_path(hash);
        let tmp_path = path.with_extension("tmp");
        let io_err = |e: std::io::Error| StorageError::Io {
            message: e.to_string(),
        };

        let mut file = std::fs::File::create(&tmp_path).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        std::fs::rename(&tmp_path, &path).map_err(io_err)?;
        Ok(())
    }
}
