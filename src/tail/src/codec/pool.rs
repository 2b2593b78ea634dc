//! Pool of reusable decompressors shared between readers.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use log::debug;

use super::{Decompressor, create_decompressor};
use crate::error::Result;
use crate::proto::CompressionKind;

/// Idle decompressors kept per kind unless configured otherwise.
pub const DEFAULT_MAX_IDLE_PER_KIND: usize = 8;

/// Pool of reusable decompressors, keyed by compression kind.
///
/// The pool is an explicit object: readers receive it through
/// [`crate::ReaderOptions::codec_pool`] and several readers may share one.
/// Checkouts are scoped by [`PooledDecompressor`], which hands the instance
/// back on drop, so error paths never leak a decompressor.
pub struct CodecPool {
    max_idle_per_kind: usize,
    // Decompressors are `Send` only; the inner mutex makes the map shareable.
    idle: DashMap<CompressionKind, Mutex<Vec<Box<dyn Decompressor>>>>,
    created: AtomicUsize,
}

impl std::fmt::Debug for CodecPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecPool")
            .field("max_idle_per_kind", &self.max_idle_per_kind)
            .field("created", &self.created())
            .finish()
    }
}

impl Default for CodecPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE_PER_KIND)
    }
}

impl CodecPool {
    /// Create a pool that keeps at most `max_idle_per_kind` idle instances per kind.
    pub fn new(max_idle_per_kind: usize) -> Self {
        Self {
            max_idle_per_kind,
            idle: DashMap::new(),
            created: AtomicUsize::new(0),
        }
    }

    /// Most idle instances retained for a single kind.
    pub fn max_idle_per_kind(&self) -> usize {
        self.max_idle_per_kind
    }

    /// Take a decompressor for `kind`, reusing an idle one when available.
    pub fn checkout(&self, kind: CompressionKind) -> Result<PooledDecompressor<'_>> {
        // Bind the pop result so the shard guard is released before creating.
        let reused = self
            .idle
            .get(&kind)
            .and_then(|idle| {
                let mut idle = idle.lock().unwrap();
                idle.pop()
            });
        let codec = match reused {
            Some(codec) => codec,
            None => {
                let codec = create_decompressor(kind)?;
                self.created.fetch_add(1, Ordering::Relaxed);
                debug!("Created {kind} decompressor");
                codec
            }
        };
        Ok(PooledDecompressor {
            pool: self,
            codec: Some(codec),
        })
    }

    fn give_back(&self, mut codec: Box<dyn Decompressor>) {
        codec.reset();
        let kind = codec.kind();
        let slot = self.idle.entry(kind).or_default();
        let mut idle = slot.lock().unwrap();
        if idle.len() < self.max_idle_per_kind {
            idle.push(codec);
        } else {
            debug!("Dropping {kind} decompressor, pool already holds {}", idle.len());
        }
    }

    /// Number of idle instances of `kind`.
    pub fn idle(&self, kind: CompressionKind) -> usize {
        self.idle
            .get(&kind)
            .map(|idle| {
                let idle = idle.lock().unwrap();
                idle.len()
            })
            .unwrap_or(0)
    }

    /// Number of instances created since the pool was built.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

/// A decompressor checked out of a [`CodecPool`]; returned when dropped.
#[derive(Debug)]
pub struct PooledDecompressor<'a> {
    pool: &'a CodecPool,
    codec: Option<Box<dyn Decompressor>>,
}

impl Deref for PooledDecompressor<'_> {
    type Target = dyn Decompressor;

    fn deref(&self) -> &Self::Target {
        // Only `Drop` takes the codec out.
        self.codec.as_deref().expect("decompressor already returned")
    }
}

impl DerefMut for PooledDecompressor<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.codec.as_deref_mut().expect("decompressor already returned")
    }
}

impl Drop for PooledDecompressor<'_> {
    fn drop(&mut self) {
        if let Some(codec) = self.codec.take() {
            self.pool.give_back(codec);
        }
    }
}
