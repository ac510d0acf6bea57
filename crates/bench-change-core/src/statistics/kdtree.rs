//! Exact k-nearest-neighbour search over a static point set.
//!
//! The tree is implicit: a permutation of point indices where every range
//! `[lo, hi)` longer than a leaf is split at its median along the axis of
//! largest spread. Points are copied once into a row-major buffer so that
//! distance evaluations never allocate.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::types::Matrix;

/// Ranges at or below this size are scanned linearly.
const LEAF_SIZE: usize = 16;

pub(crate) struct KdTree {
    data: Vec<f64>,
    dim: usize,
    order: Vec<usize>,
    /// Split axis of the node stored at `order[mid]`.
    axis: Vec<usize>,
}

/// A neighbour ordered by (squared distance, index).
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist: f64,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.total_cmp(&other.dist).then(self.index.cmp(&other.index))
    }
}

impl KdTree {
    pub(crate) fn new(points: &Matrix) -> Self {
        let n = points.nrows();
        let dim = points.ncols();
        let mut data = Vec::with_capacity(n * dim);
        for row in points.row_iter() {
            data.extend(row.iter().copied());
        }
        let mut tree = Self {
            data,
            dim,
            order: (0..n).collect(),
            axis: vec![0; n],
        };
        tree.build(0, n);
        tree
    }

    fn point(&self, i: usize) -> &[f64] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    fn build(&mut self, lo: usize, hi: usize) {
        if hi - lo <= LEAF_SIZE || self.dim == 0 {
            return;
        }

        let mut axis = 0;
        let mut widest = f64::NEG_INFINITY;
        for a in 0..self.dim {
            let (min, max) = self.order[lo..hi]
                .iter()
                .map(|&i| self.data[i * self.dim + a])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| (min.min(v), max.max(v)));
            if max - min > widest {
                widest = max - min;
                axis = a;
            }
        }

        let mid = lo + (hi - lo) / 2;
        let (data, dim) = (&self.data, self.dim);
        self.order[lo..hi].select_nth_unstable_by(mid - lo, |&i, &j| {
            data[i * dim + axis]
                .total_cmp(&data[j * dim + axis])
                .then(i.cmp(&j))
        });
        self.axis[mid] = axis;

        self.build(lo, mid);
        self.build(mid + 1, hi);
    }

    fn squared_distance(&self, i: usize, query: &[f64]) -> f64 {
        self.point(i)
            .iter()
            .zip(query)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// The `k` points nearest to `query`, closest first, ties by index.
    pub(crate) fn nearest(&self, query: &[f64], k: usize) -> Vec<usize> {
        let mut heap = BinaryHeap::with_capacity(k + 1);
        if k > 0 {
            self.search(0, self.order.len(), query, k, &mut heap);
        }
        heap.into_sorted_vec().into_iter().map(|c| c.index).collect()
    }

    fn offer(&self, index: usize, query: &[f64], k: usize, heap: &mut BinaryHeap<Candidate>) {
        let candidate = Candidate {
            dist: self.squared_distance(index, query),
            index,
        };
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().is_some_and(|worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }
    }

    fn search(&self, lo: usize, hi: usize, query: &[f64], k: usize, heap: &mut BinaryHeap<Candidate>) {
        if hi - lo <= LEAF_SIZE || self.dim == 0 {
            for &i in &self.order[lo..hi] {
                self.offer(i, query, k, heap);
            }
            return;
        }

        let mid = lo + (hi - lo) / 2;
        let node = self.order[mid];
        let axis = self.axis[mid];
        self.offer(node, query, k, heap);

        let diff = query[axis] - self.data[node * self.dim + axis];
        let (near, far) = if diff < 0.0 {
            ((lo, mid), (mid + 1, hi))
        } else {
            ((mid + 1, hi), (lo, mid))
        };
        self.search(near.0, near.1, query, k, heap);

        // Points across the split are at least |diff| away; equal distances
        // still matter for the index tie-break
        let worst = heap.peek().map_or(f64::INFINITY, |c| c.dist);
        if heap.len() < k || diff * diff <= worst {
            self.search(far.0, far.1, query, k, heap);
        }
    }
}
