//! Adaptive loose quad-tree over feature envelopes.
//!
//! The tree is sized to the dataset: its depth limit is
//! `ceil(0.4 * log2(entry_count))`. Each node owns a bucket of
//! `(feature_index, bounds)` entries and up to four lazily created
//! children, one per quadrant of its bounds.
//!
//! # Insertion policy
//!
//! An entry descends into the quadrant that fully contains its bounds. An
//! entry straddling a quadrant edge stays in the bucket of the node where
//! the straddle is detected; it is never copied into several siblings.
//! Nodes are split lazily: a non-point index splits a node once its bucket
//! holds more than `leaf_capacity` entries, while a point-optimized index
//! splits on every insert until `max_depth`, since clustered points make
//! count-based stopping produce lopsided trees.
//!
//! # Queries
//!
//! [`SpatialIndex::query`] returns candidates, not answers: every entry
//! whose bounds intersect the query rectangle is returned, and exact
//! geometry tests are left to the caller.

use crate::envelope::Envelope;
use rustc_hash::{FxHashMap, FxHashSet};

/// Ratio between dataset size (log2) and tree depth.
pub const DEPTH_FACTOR: f64 = 0.4;

/// Depth limit for an index over `entry_count` entries.
///
/// `ceil(0.4 * log2(n))`, clamped at zero so empty and single-entry
/// indexes are a single leaf.
pub fn max_depth_for(entry_count: usize) -> u32 {
    if entry_count <= 1 {
        return 0;
    }
    let depth = (DEPTH_FACTOR * (entry_count as f64).log2()).ceil();
    depth.max(0.0) as u32
}

/// A bucket entry: one feature envelope (or one part envelope of a
/// multi-part feature).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexEntry {
    pub feature_index: usize,
    pub bounds: Envelope,
}

impl IndexEntry {
    pub fn new(feature_index: usize, bounds: Envelope) -> Self {
        Self {
            feature_index,
            bounds,
        }
    }
}

/// Where an entry ended up in the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryLocation {
    /// Level of the node holding the entry (0 = root).
    pub level: u32,
    /// Bounds of the node holding the entry.
    pub node_bounds: Envelope,
    /// The entry's own bounds.
    pub bounds: Envelope,
}

/// Read-only view of a node, for debugging and visualization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeInfo {
    pub bounds: Envelope,
    pub level: u32,
    pub entry_count: usize,
    pub child_count: usize,
}

/// Shape statistics of a built index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStats {
    /// Number of nodes, root included.
    pub node_count: usize,
    /// Number of bucket entries.
    pub entry_count: usize,
    /// Number of distinct features.
    pub feature_count: usize,
    /// Depth limit computed at build time.
    pub max_depth: u32,
    /// Deepest level that actually holds a node.
    pub deepest_level: u32,
    /// Entries held by the root bucket.
    pub root_entries: usize,
}

/// A quad-tree node.
#[derive(Debug, Clone)]
pub struct QuadTreeNode {
    bounds: Envelope,
    level: u32,
    /// Set once the node has been subdivided. Children are still created
    /// only for quadrants that receive an entry.
    split: bool,
    children: [Option<Box<QuadTreeNode>>; 4],
    bucket: Vec<IndexEntry>,
}

impl QuadTreeNode {
    fn new(bounds: Envelope, level: u32) -> Self {
        Self {
            bounds,
            level,
            split: false,
            children: [None, None, None, None],
            bucket: Vec::new(),
        }
    }

    pub fn bounds(&self) -> &Envelope {
        &self.bounds
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Entries retained at this node.
    pub fn bucket(&self) -> &[IndexEntry] {
        &self.bucket
    }

    /// Existing children, in NW, NE, SW, SE order.
    pub fn children(&self) -> impl Iterator<Item = &QuadTreeNode> {
        self.children.iter().filter_map(|c| c.as_deref())
    }

    /// Index of the quadrant that fully contains `bounds`, if any.
    fn quadrant_for(&self, bounds: &Envelope) -> Option<usize> {
        self.bounds
            .quadrants()
            .iter()
            .position(|quadrant| quadrant.contains(bounds))
    }

    fn insert(&mut self, entry: IndexEntry, policy: &SplitPolicy) {
        if self.split {
            match self.quadrant_for(&entry.bounds) {
                Some(q) => self.child_mut(q).insert(entry, policy),
                None => self.bucket.push(entry),
            }
            return;
        }

        self.bucket.push(entry);
        if self.level < policy.max_depth && self.bucket.len() > policy.leaf_capacity {
            self.subdivide(policy);
        }
    }

    fn subdivide(&mut self, policy: &SplitPolicy) {
        self.split = true;
        let pending = std::mem::take(&mut self.bucket);
        for entry in pending {
            self.insert(entry, policy);
        }
    }

    fn child_mut(&mut self, quadrant: usize) -> &mut QuadTreeNode {
        let bounds = self.bounds.quadrants()[quadrant];
        let level = self.level + 1;
        self.children[quadrant].get_or_insert_with(|| Box::new(QuadTreeNode::new(bounds, level)))
    }

    fn query_into(&self, rect: &Envelope, min_feature_size: f64, out: &mut FxHashSet<usize>) {
        for entry in &self.bucket {
            if entry.bounds.intersects(rect) && !entry.bounds.is_smaller_than(min_feature_size) {
                out.insert(entry.feature_index);
            }
        }
        for child in self.children() {
            if child.bounds.intersects(rect) {
                child.query_into(rect, min_feature_size, out);
            }
        }
    }

    fn visit<F: FnMut(&QuadTreeNode)>(&self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitPolicy {
    max_depth: u32,
    leaf_capacity: usize,
}

/// Quad-tree spatial index over a snapshot of feature envelopes.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    root: QuadTreeNode,
    max_depth: u32,
    point_optimized: bool,
    entry_count: usize,
    /// Feature index -> every entry inserted for it.
    feature_entries: FxHashMap<usize, Vec<EntryLocation>>,
}

impl SpatialIndex {
    /// Build an index over `entries` inside `root_bounds`.
    ///
    /// Entry bounds must be finite; the builder rejects anything else
    /// before calling this. Entries falling outside `root_bounds` are kept
    /// in the root bucket. `leaf_capacity` is ignored when
    /// `point_optimized` is set.
    pub fn build(
        entries: Vec<IndexEntry>,
        root_bounds: Envelope,
        point_optimized: bool,
        leaf_capacity: usize,
    ) -> Self {
        let entry_count = entries.len();
        let max_depth = max_depth_for(entry_count);
        let policy = SplitPolicy {
            max_depth,
            leaf_capacity: if point_optimized { 0 } else { leaf_capacity },
        };

        let mut root = QuadTreeNode::new(root_bounds, 0);
        for entry in entries {
            debug_assert!(entry.bounds.is_finite(), "non-finite index entry");
            root.insert(entry, &policy);
        }

        let mut feature_entries: FxHashMap<usize, Vec<EntryLocation>> = FxHashMap::default();
        root.visit(&mut |node| {
            for entry in &node.bucket {
                feature_entries
                    .entry(entry.feature_index)
                    .or_default()
                    .push(EntryLocation {
                        level: node.level,
                        node_bounds: node.bounds,
                        bounds: entry.bounds,
                    });
            }
        });

        Self {
            root,
            max_depth,
            point_optimized,
            entry_count,
            feature_entries,
        }
    }

    /// An index with no entries. Every query returns nothing.
    pub fn empty() -> Self {
        Self::build(Vec::new(), Envelope::null(), false, 0)
    }

    /// Feature indices whose entry bounds intersect `rect`, unique and in
    /// ascending order.
    ///
    /// Entries whose larger dimension is below `min_feature_size` are
    /// skipped; pass 0 to disable culling. The result may contain false
    /// positives with respect to exact geometry.
    pub fn query(&self, rect: &Envelope, min_feature_size: f64) -> Vec<usize> {
        if rect.is_null() || self.entry_count == 0 {
            return Vec::new();
        }
        let mut found = FxHashSet::default();
        // The root bucket is always scanned: it also holds entries that
        // fell outside the root bounds.
        self.root.query_into(rect, min_feature_size, &mut found);
        let mut out: Vec<usize> = found.into_iter().collect();
        out.sort_unstable();
        out
    }

    pub fn root(&self) -> &QuadTreeNode {
        &self.root
    }

    pub fn root_bounds(&self) -> &Envelope {
        &self.root.bounds
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn is_point_optimized(&self) -> bool {
        self.point_optimized
    }

    /// Number of bucket entries (multi-part features count once per part).
    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Number of distinct features in the index.
    pub fn feature_count(&self) -> usize {
        self.feature_entries.len()
    }

    /// Every entry inserted for `feature_index`.
    pub fn entries_for(&self, feature_index: usize) -> &[EntryLocation] {
        self.feature_entries
            .get(&feature_index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Visit every node depth-first, root first.
    pub fn visit_nodes<F: FnMut(NodeInfo)>(&self, mut f: F) {
        self.root.visit(&mut |node| {
            f(NodeInfo {
                bounds: node.bounds,
                level: node.level,
                entry_count: node.bucket.len(),
                child_count: node.children().count(),
            })
        });
    }

    /// Shape statistics of the tree.
    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            entry_count: self.entry_count,
            feature_count: self.feature_entries.len(),
            max_depth: self.max_depth,
            root_entries: self.root.bucket.len(),
            ..IndexStats::default()
        };
        self.visit_nodes(|node| {
            stats.node_count += 1;
            stats.deepest_level = stats.deepest_level.max(node.level);
        });
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(idx: usize, cx: f64, cy: f64, half: f64) -> IndexEntry {
        IndexEntry::new(idx, Envelope::new(cx - half, cy - half, cx + half, cy + half))
    }

    fn four_squares() -> (Vec<IndexEntry>, Envelope) {
        let entries = vec![
            square(0, 0.0, 0.0, 0.5),
            square(1, 10.0, 0.0, 0.5),
            square(2, 0.0, 10.0, 0.5),
            square(3, 10.0, 10.0, 0.5),
        ];
        let mut root = Envelope::null();
        for e in &entries {
            root.expand_to_include(&e.bounds);
        }
        (entries, root)
    }

    #[test]
    fn test_max_depth_formula() {
        assert_eq!(max_depth_for(0), 0);
        assert_eq!(max_depth_for(1), 0);
        assert_eq!(max_depth_for(2), 1); // ceil(0.4)
        assert_eq!(max_depth_for(4), 1); // ceil(0.8)
        assert_eq!(max_depth_for(8), 2); // ceil(1.2)
        assert_eq!(max_depth_for(1024), 4); // ceil(4.0)
        assert_eq!(max_depth_for(1025), 5);
        assert_eq!(max_depth_for(1_000_000), 8); // ceil(7.97)
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::empty();
        assert!(index.is_empty());
        assert_eq!(index.max_depth(), 0);
        assert!(index
            .query(&Envelope::new(-1e9, -1e9, 1e9, 1e9), 0.0)
            .is_empty());
        assert_eq!(index.stats().node_count, 1);
    }

    #[test]
    fn test_query_four_squares() {
        let (entries, root) = four_squares();
        let index = SpatialIndex::build(entries, root, false, 0);

        assert_eq!(index.query(&Envelope::new(0.0, 0.0, 5.0, 5.0), 0.0), vec![0]);
        assert_eq!(
            index.query(&Envelope::new(-1.0, -1.0, 11.0, 11.0), 0.0),
            vec![0, 1, 2, 3]
        );
        assert!(index
            .query(&Envelope::new(3.0, 3.0, 7.0, 7.0), 0.0)
            .is_empty());
        assert!(index.query(&Envelope::null(), 0.0).is_empty());
    }

    #[test]
    fn test_straddling_entry_stays_at_first_straddle() {
        let root = Envelope::new(0.0, 0.0, 16.0, 16.0);
        let mut entries: Vec<IndexEntry> = (0..16)
            .map(|i| square(i, 1.0 + (i % 4) as f64 * 4.0, 1.0 + (i / 4) as f64 * 4.0, 0.5))
            .collect();
        // Crosses the root's vertical mid-line.
        entries.push(IndexEntry::new(99, Envelope::new(7.0, 1.0, 9.0, 2.0)));

        let index = SpatialIndex::build(entries, root, false, 0);
        let locations = index.entries_for(99);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].level, 0);
        assert_eq!(locations[0].node_bounds, root);

        // Small squares are pushed below the root.
        assert!(index.entries_for(0)[0].level > 0);
    }

    #[test]
    fn test_children_are_exact_quadrants() {
        let root = Envelope::new(0.0, 0.0, 8.0, 8.0);
        let entries: Vec<IndexEntry> = (0..64)
            .map(|i| square(i, 0.5 + (i % 8) as f64, 0.5 + (i / 8) as f64, 0.25))
            .collect();
        let index = SpatialIndex::build(entries, root, false, 1);

        fn check(node: &QuadTreeNode) {
            let quads = node.bounds().quadrants();
            for child in node.children() {
                assert_eq!(child.level(), node.level() + 1);
                assert!(quads.contains(child.bounds()));
                for entry in child.bucket() {
                    assert!(child.bounds().contains(&entry.bounds));
                }
                check(child);
            }
        }
        check(index.root());

        let stats = index.stats();
        assert!(stats.deepest_level <= index.max_depth());
        assert_eq!(stats.entry_count, 64);
        assert_eq!(stats.feature_count, 64);
    }

    #[test]
    fn test_point_optimized_descends_to_max_depth() {
        let root = Envelope::new(0.0, 0.0, 100.0, 100.0);
        let entries: Vec<IndexEntry> = (0..20)
            .map(|i| IndexEntry::new(i, Envelope::from_point(10.0 + i as f64, 10.0)))
            .collect();

        let points = SpatialIndex::build(entries.clone(), root, true, 8);
        let plain = SpatialIndex::build(entries, root, false, 64);

        assert!(points.is_point_optimized());
        assert_eq!(points.stats().deepest_level, points.max_depth());
        // Below capacity: the non-point tree never splits.
        assert_eq!(plain.stats().node_count, 1);
        assert_eq!(plain.stats().root_entries, 20);
    }

    #[test]
    fn test_min_feature_size_culls_small_entries() {
        let root = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let entries = vec![
            IndexEntry::new(0, Envelope::new(1.0, 1.0, 1.1, 1.05)),
            IndexEntry::new(1, Envelope::new(2.0, 2.0, 5.0, 2.5)),
        ];
        let index = SpatialIndex::build(entries, root, false, 8);
        let all = Envelope::new(0.0, 0.0, 10.0, 10.0);

        assert_eq!(index.query(&all, 0.0), vec![0, 1]);
        assert_eq!(index.query(&all, 1.0), vec![1]);
        assert_eq!(index.query(&all, 3.0), vec![1]);
        assert!(index.query(&all, 3.5).is_empty());
    }

    #[test]
    fn test_entries_outside_root_are_found() {
        let root = Envelope::new(0.0, 0.0, 1.0, 1.0);
        let entries = vec![IndexEntry::new(7, Envelope::new(50.0, 50.0, 51.0, 51.0))];
        let index = SpatialIndex::build(entries, root, false, 0);
        assert_eq!(index.query(&Envelope::new(49.0, 49.0, 52.0, 52.0), 0.0), vec![7]);
    }

    #[test]
    fn test_multi_entry_feature_deduplicated() {
        let root = Envelope::new(0.0, 0.0, 16.0, 16.0);
        let entries = vec![
            square(5, 2.0, 2.0, 0.5),
            square(5, 14.0, 14.0, 0.5),
            square(6, 14.0, 2.0, 0.5),
        ];
        let index = SpatialIndex::build(entries, root, false, 0);
        assert_eq!(index.len(), 3);
        assert_eq!(index.feature_count(), 2);
        assert_eq!(index.entries_for(5).len(), 2);
        assert_eq!(index.query(&root, 0.0), vec![5, 6]);
        assert_eq!(
            index.query(&Envelope::new(13.0, 13.0, 15.0, 15.0), 0.0),
            vec![5]
        );
    }

    #[test]
    fn test_identical_points_zero_area_root() {
        let root = Envelope::from_point(3.0, 3.0);
        let entries: Vec<IndexEntry> = (0..10)
            .map(|i| IndexEntry::new(i, Envelope::from_point(3.0, 3.0)))
            .collect();
        let index = SpatialIndex::build(entries, root, true, 8);
        assert_eq!(index.query(&root, 0.0).len(), 10);
    }
}
