//! Uniform-grid broad phase.
//!
//! Items are bucketed into every square cell their bounding box touches, so
//! only items sharing a cell need a narrow-phase test. An item that straddles
//! a cell border shows up in several regions; callers deduplicate pairs.
//! A box edge lying exactly on a grid line counts as touching the cells on
//! both sides, so shapes that merely touch across a border still meet.

use std::collections::HashMap;

use tracing::debug;

use crate::geometry::Aabb;

const MIN_CHUNK_SIZE: f32 = 1e-5;

/// Buckets items by the grid cells their bounding boxes overlap.
#[derive(Debug, Clone)]
pub struct BboxGrouper<T> {
    chunk_size: f32,
    regions: HashMap<(i32, i32), Vec<T>>,
}

impl<T: Clone> BboxGrouper<T> {
    pub fn new(chunk_size: f32) -> Self {
        Self {
            chunk_size: chunk_size.max(MIN_CHUNK_SIZE),
            regions: HashMap::new(),
        }
    }

    pub fn chunk_size(&self) -> f32 {
        self.chunk_size
    }

    /// Registers `item` in every cell overlapped by `bbox`.
    ///
    /// Returns `false`, leaving the grid untouched, when the box is not
    /// finite or lies outside the addressable cell range.
    pub fn push(&mut self, item: T, bbox: &Aabb) -> bool {
        let span = cell_span(bbox.min().x, bbox.max().x, self.chunk_size)
            .zip(cell_span(bbox.min().y, bbox.max().y, self.chunk_size));
        let Some(((x0, x1), (y0, y1))) = span else {
            debug!(min = %bbox.min(), max = %bbox.max(), "skipping unaddressable bbox");
            return false;
        };
        for j in y0..y1 {
            for i in x0..x1 {
                self.regions.entry((i, j)).or_default().push(item.clone());
            }
        }
        true
    }

    /// Item lists of the populated cells, in no particular order.
    pub fn regions(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.regions.values().map(Vec::as_slice)
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn clear(&mut self) {
        self.regions.clear();
    }
}

/// Half-open cell range `[floor(min/size), floor(max/size) + 1)`, never empty.
///
/// `None` if either bound is non-finite or does not fit an `i32` cell index.
fn cell_span(min: f32, max: f32, size: f32) -> Option<(i32, i32)> {
    const LIMIT: f32 = i32::MAX as f32;
    let lo = (min / size).floor();
    let hi = (max / size).floor();
    if !(lo >= -LIMIT && hi < LIMIT) {
        return None;
    }
    let start = lo as i32;
    let end = (hi as i32).saturating_add(1).max(start.saturating_add(1));
    Some((start, end))
}
