//! Bounded LRU cache of decoded frames in front of a single decode cursor.
//!
//! Two locks are involved. The cursor lock owns the [`VideoSource`] and is
//! held for the whole seek+read; the entries lock guards the map and the
//! recency list and is only held for bookkeeping. The entries lock is never
//! held while waiting for the cursor.

use crate::source::{VideoInfo, VideoSource};
use creditwipe_core::{FrameBuffer, Result, SharedFrameBuffer};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// LRU cache of decoded frames keyed by frame index.
pub struct FrameCache {
    cursor: Mutex<Box<dyn VideoSource>>,
    entries: Mutex<Entries>,
    info: VideoInfo,
    capacity: usize,
    decoder_reads: AtomicUsize,
}

struct Entries {
    frames: HashMap<usize, SharedFrameBuffer>,
    /// Recency order (most recently used last).
    lru_order: Vec<usize>,
}

impl Entries {
    fn touch(&mut self, index: usize) {
        self.lru_order.retain(|&i| i != index);
        self.lru_order.push(index);
    }
}

impl FrameCache {
    /// Create a cache holding at most `capacity` frames (at least one).
    pub fn new(source: Box<dyn VideoSource>, capacity: usize) -> Self {
        let info = source.info().clone();
        Self {
            cursor: Mutex::new(source),
            entries: Mutex::new(Entries {
                frames: HashMap::new(),
                lru_order: Vec::new(),
            }),
            info,
            capacity: capacity.max(1),
            decoder_reads: AtomicUsize::new(0),
        }
    }

    /// Get a frame, decoding it on a miss.
    pub fn get(&self, index: usize) -> Result<SharedFrameBuffer> {
        if let Some(frame) = self.lookup(index) {
            debug!(index, "frame cache hit");
            return Ok(frame);
        }

        let mut cursor = self.cursor.lock();
        // Another caller may have loaded it while we waited for the cursor.
        if let Some(frame) = self.lookup(index) {
            debug!(index, "frame cache hit after wait");
            return Ok(frame);
        }
        debug!(index, "frame cache miss");
        let frame: SharedFrameBuffer = Arc::new(cursor.read_frame(index)?);
        self.decoder_reads.fetch_add(1, Ordering::Relaxed);
        drop(cursor);

        self.insert(index, Arc::clone(&frame));
        Ok(frame)
    }

    /// Decode a frame under the cursor lock without touching the cache.
    pub fn decode_uncached(&self, index: usize) -> Result<FrameBuffer> {
        let mut cursor = self.cursor.lock();
        let frame = cursor.read_frame(index)?;
        self.decoder_reads.fetch_add(1, Ordering::Relaxed);
        Ok(frame)
    }

    fn lookup(&self, index: usize) -> Option<SharedFrameBuffer> {
        let mut entries = self.entries.lock();
        let frame = entries.frames.get(&index).cloned()?;
        entries.touch(index);
        Some(frame)
    }

    fn insert(&self, index: usize, frame: SharedFrameBuffer) {
        let mut entries = self.entries.lock();
        if entries.frames.insert(index, frame).is_none() {
            while entries.frames.len() > self.capacity && !entries.lru_order.is_empty() {
                let oldest = entries.lru_order.remove(0);
                // The cache's handle is released here; holders keep theirs.
                if entries.frames.remove(&oldest).is_some() {
                    debug!(index = oldest, "evicted frame");
                }
            }
        }
        entries.touch(index);
    }

    /// Check if a frame is resident.
    pub fn contains(&self, index: usize) -> bool {
        self.entries.lock().frames.contains_key(&index)
    }

    /// Number of resident frames.
    pub fn len(&self) -> usize {
        self.entries.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes held by resident frames.
    pub fn memory_usage(&self) -> usize {
        self.entries
            .lock()
            .frames
            .values()
            .map(|f| f.memory_size())
            .sum()
    }

    /// Total reads issued to the decoder, cached or not.
    pub fn decoder_reads(&self) -> usize {
        self.decoder_reads.load(Ordering::Relaxed)
    }

    /// Resident indices from least to most recently used.
    pub fn resident(&self) -> Vec<usize> {
        self.entries.lock().lru_order.clone()
    }

    /// Drop every resident frame.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.frames.clear();
        entries.lru_order.clear();
    }

    /// Metadata of the underlying source.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }
}
