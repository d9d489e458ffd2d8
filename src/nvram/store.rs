//! Virtual NVRAM store
//!
//! Host-owned key/value records kept in pool blocks. Reads are served
//! locally; every successful mutation is mirrored to the host transport.

use super::record::{Catalogue, Record};
use crate::error::{Error, Result};
use crate::pool::PoolAllocator;
use crate::transport::codec::{KEY_LEN, MAX_PAYLOAD_LEN};
use crate::transport::HostTransport;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Largest record the store accepts; a write event must still fit one frame
pub const MAX_RECORD_LEN: usize = MAX_PAYLOAD_LEN - KEY_LEN;

/// Volatile key/value store emulating NVRAM semantics
///
/// The catalogue has no lock of its own: mutation needs `&mut self`, so a
/// store is driven from one context (the host receive path). The allocator
/// underneath may be shared.
pub struct VirtualNvram {
    pool: Arc<PoolAllocator>,
    transport: Box<dyn HostTransport>,
    catalogue: Catalogue,
}

impl std::fmt::Debug for VirtualNvram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualNvram")
            .field("records", &self.catalogue.len())
            .finish()
    }
}

impl VirtualNvram {
    pub fn new(pool: Arc<PoolAllocator>, transport: Box<dyn HostTransport>) -> Self {
        info!("Virtual NVRAM ready");
        Self {
            pool,
            transport,
            catalogue: Catalogue::new(),
        }
    }

    /// Allocator backing the records
    pub fn pool(&self) -> &Arc<PoolAllocator> {
        &self.pool
    }

    /// Copy the value of `key` into the front of `dest`
    ///
    /// Returns the record length. `dest` is left untouched unless the whole
    /// record fits.
    pub fn read(&self, key: u16, dest: &mut [u8]) -> Result<usize> {
        if dest.is_empty() {
            return Err(Error::InvalidArgument(
                "read destination is empty".to_string(),
            ));
        }

        let record = self.find(key).ok_or(Error::NotFound(key))?;
        if dest.len() < record.len() {
            return Err(Error::TooSmall {
                required: record.len(),
                capacity: dest.len(),
            });
        }

        self.pool
            .read_payload(record.block, &mut dest[..record.len()])?;

        debug!(key, len = record.len(), "Read record");
        Ok(record.len())
    }

    /// Store `data` under `key`
    ///
    /// Identical rewrites are a no-op and are not mirrored. A rewrite with a
    /// different length replaces the record, so its block always matches the
    /// current length.
    ///
    /// Only a fresh insert is atomic: if the replacement block of a resized
    /// record cannot be allocated, the old record stays deleted.
    pub fn write(&mut self, key: u16, data: &[u8]) -> Result<usize> {
        if data.is_empty() {
            return Err(Error::InvalidArgument("write payload is empty".to_string()));
        }
        if data.len() > MAX_RECORD_LEN {
            return Err(Error::InvalidArgument(format!(
                "write payload of {} bytes exceeds {}",
                data.len(),
                MAX_RECORD_LEN
            )));
        }

        let Some(existing) = self.find(key).cloned() else {
            return self.insert(key, data);
        };

        if existing.len() != data.len() {
            debug!(
                key,
                old_len = existing.len(),
                new_len = data.len(),
                "Replacing resized record"
            );
            self.delete(key)?;
            return self.insert(key, data);
        }

        if self.pool.payload_matches(existing.block, data) {
            debug!(key, "Record unchanged");
            return Ok(data.len());
        }

        self.pool.write_payload(existing.block, data)?;
        debug!(key, len = data.len(), "Updated record in place");
        self.mirror_write(key, data);

        Ok(data.len())
    }

    /// Remove `key`; removing an absent key succeeds without effect
    pub fn delete(&mut self, key: u16) -> Result<()> {
        let Some((prev, id)) = self.catalogue.find_with_prev(key) else {
            return Ok(());
        };

        if let Err(e) = self.transport.notify_delete(key) {
            debug!(key, error = %e, "Delete notification dropped");
        }

        if let Some(record) = self.catalogue.unlink(prev, id) {
            self.pool.free(record.block);
            debug!(key, block = %record.block, "Deleted record");
        }

        Ok(())
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.catalogue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogue.len() == 0
    }

    pub fn contains_key(&self, key: u16) -> bool {
        self.catalogue.find(key).is_some()
    }

    /// Length of the value stored under `key`
    pub fn record_len(&self, key: u16) -> Option<usize> {
        self.find(key).map(Record::len)
    }

    /// Live keys, most recently created first
    pub fn keys(&self) -> Vec<u16> {
        self.catalogue.iter().map(|(_, record)| record.key).collect()
    }

    pub fn stats(&self) -> NvramStats {
        let mut stats = NvramStats::default();
        for (_, record) in self.catalogue.iter() {
            stats.records += 1;
            stats.payload_bytes += record.len();
            stats.block_bytes += self.pool.block_capacity(record.block).unwrap_or(0);
        }
        stats
    }

    fn find(&self, key: u16) -> Option<&Record> {
        self.catalogue
            .find(key)
            .and_then(|id| self.catalogue.get(id))
    }

    fn insert(&mut self, key: u16, data: &[u8]) -> Result<usize> {
        let block = self.pool.allocate(data.len())?;

        if let Err(e) = self.pool.write_payload(block, data) {
            self.pool.free(block);
            return Err(e);
        }

        self.catalogue
            .push_front(Record::new(key, data.len() as u16, block));
        debug!(key, len = data.len(), %block, "Created record");
        self.mirror_write(key, data);

        Ok(data.len())
    }

    fn mirror_write(&self, key: u16, data: &[u8]) {
        if let Err(e) = self.transport.notify_write(key, data) {
            debug!(key, error = %e, "Write notification dropped");
        }
    }
}

/// Statistics for the virtual NVRAM
#[derive(Debug, Clone, Default, Serialize)]
pub struct NvramStats {
    pub records: usize,
    pub payload_bytes: usize,
    pub block_bytes: usize,
}
