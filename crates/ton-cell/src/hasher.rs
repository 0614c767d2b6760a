//! Representation hash and depth of a cell tree.
//!
//! The hash of an ordinary cell is SHA256 over its representation:
//!
//! ```text
//! d1 d2 | data with completion tag | depth(ref_i) as u16 BE ... | hash(ref_i) ...
//! ```
//!
//! Child depths and hashes must be known before the parent can be hashed, so
//! the tree is walked in post-order with an explicit stack. Results are kept
//! in an arena indexed by insertion order; the index map is keyed by cell
//! identity, which is stable because the hasher borrows every cell it has
//! visited for its whole lifetime.
//!
//! Reference: ton-blockchain/ton/crypto/vm/cells/DataCell.cpp

use std::collections::HashMap;

use tracing::trace;

use crate::{sha256, Cell, CellError, CellResult, DEPTH_BYTES, HASH_BYTES, MAX_CELL_DEPTH};

/// Hash and depth computed for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellInfo {
    pub hash: [u8; HASH_BYTES],
    pub depth: u16,
}

/// Memoizing hasher for one derivation call.
///
/// A hasher must not be shared between unrelated derivations running on
/// different threads; create one per call instead. Nothing is global.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use ton_cell::{CellBuilder, MerkleHasher};
///
/// let leaf = Arc::new(CellBuilder::new().build().unwrap());
/// let mut builder = CellBuilder::new();
/// builder.store_ref(leaf.clone()).unwrap();
/// builder.store_ref(leaf).unwrap();
/// let root = builder.build().unwrap();
///
/// let mut hasher = MerkleHasher::new();
/// assert_eq!(hasher.depth(&root).unwrap(), 1);
/// // The shared leaf was hashed once.
/// assert_eq!(hasher.len(), 2);
/// ```
#[derive(Debug)]
pub struct MerkleHasher<'a> {
    max_depth: usize,
    arena: Vec<CellInfo>,
    index: HashMap<*const Cell, usize>,
    _cells: std::marker::PhantomData<&'a Cell>,
}

impl<'a> MerkleHasher<'a> {
    /// Create a hasher enforcing the protocol depth ceiling (1024).
    pub fn new() -> Self {
        Self::with_max_depth(MAX_CELL_DEPTH)
    }

    /// Create a hasher with a custom depth ceiling.
    pub fn with_max_depth(max_depth: usize) -> Self {
        MerkleHasher {
            max_depth,
            arena: Vec::new(),
            index: HashMap::new(),
            _cells: std::marker::PhantomData,
        }
    }

    /// The configured depth ceiling.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Number of distinct cells hashed so far.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether nothing has been hashed yet.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Representation hash of `cell`.
    pub fn hash(&mut self, cell: &'a Cell) -> CellResult<[u8; HASH_BYTES]> {
        self.hash_and_depth(cell).map(|info| info.hash)
    }

    /// Depth of `cell`.
    pub fn depth(&mut self, cell: &'a Cell) -> CellResult<u16> {
        self.hash_and_depth(cell).map(|info| info.depth)
    }

    /// Hash and depth of `cell`, computing every unvisited descendant first.
    pub fn hash_and_depth(&mut self, cell: &'a Cell) -> CellResult<CellInfo> {
        if let Some(info) = self.lookup(cell) {
            return Ok(info);
        }

        // (cell, children already pushed, distance from `cell`)
        let mut stack: Vec<(&'a Cell, bool, usize)> = vec![(cell, false, 0)];

        while let Some((current, expanded, distance)) = stack.pop() {
            if self.lookup(current).is_some() {
                continue;
            }

            if expanded {
                let info = self.compute(current)?;
                self.index.insert(current as *const Cell, self.arena.len());
                self.arena.push(info);
                if std::ptr::eq(current, cell) {
                    return Ok(info);
                }
                continue;
            }

            // A cell `distance` edges below the root forces the root depth
            // to at least `distance`; stop before the stack can run away.
            if distance > self.max_depth {
                return Err(CellError::DepthOverflow {
                    depth: distance,
                    max: self.max_depth,
                });
            }

            stack.push((current, true, distance));
            for child in current.references().iter().rev() {
                if self.lookup(child).is_none() {
                    stack.push((child.as_ref(), false, distance + 1));
                }
            }
        }

        // The root is always finished last, so this only runs on a broken walk.
        self.child_info(cell)
    }

    /// The exact byte string that is hashed for `cell`.
    pub fn representation(&mut self, cell: &'a Cell) -> CellResult<Vec<u8>> {
        for child in cell.references() {
            self.hash_and_depth(child)?;
        }
        self.build_representation(cell)
    }

    fn lookup(&self, cell: &Cell) -> Option<CellInfo> {
        self.index
            .get(&(cell as *const Cell))
            .map(|&slot| self.arena[slot])
    }

    fn compute(&self, cell: &Cell) -> CellResult<CellInfo> {
        let depth = match cell
            .references()
            .iter()
            .map(|child| self.child_info(child).map(|info| info.depth))
            .collect::<CellResult<Vec<u16>>>()?
            .into_iter()
            .max()
        {
            Some(max_child) => usize::from(max_child) + 1,
            None => 0,
        };

        if depth > self.max_depth {
            return Err(CellError::DepthOverflow {
                depth,
                max: self.max_depth,
            });
        }

        let repr = self.build_representation(cell)?;
        let hash = sha256(&repr);
        trace!(
            "hashed cell: {} bits, {} refs, depth {}",
            cell.bit_len(),
            cell.reference_count(),
            depth
        );

        Ok(CellInfo {
            hash,
            // max_depth is at most MAX_CELL_DEPTH in practice; u16 covers it.
            depth: u16::try_from(depth).map_err(|_| CellError::DepthOverflow {
                depth,
                max: usize::from(u16::MAX),
            })?,
        })
    }

    fn child_info(&self, child: &Cell) -> CellResult<CellInfo> {
        self.lookup(child).ok_or(CellError::HashOrder)
    }

    fn build_representation(&self, cell: &Cell) -> CellResult<Vec<u8>> {
        let refs = cell.references();
        let mut repr = Vec::with_capacity(2 + cell.byte_len() + refs.len() * (DEPTH_BYTES + HASH_BYTES));

        let (d1, d2) = cell.descriptors();
        repr.push(d1);
        repr.push(d2);

        repr.extend_from_slice(&cell.data_with_completion_tag());

        let infos = refs
            .iter()
            .map(|child| self.child_info(child))
            .collect::<CellResult<Vec<_>>>()?;

        for info in &infos {
            repr.extend_from_slice(&info.depth.to_be_bytes());
        }
        for info in &infos {
            repr.extend_from_slice(&info.hash);
        }

        Ok(repr)
    }
}

impl Default for MerkleHasher<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellBuilder;
    use std::sync::Arc;

    fn chain(length: usize) -> Arc<Cell> {
        let mut current = Arc::new(CellBuilder::new().build().unwrap());
        for _ in 0..length {
            let mut builder = CellBuilder::new();
            builder.store_ref(current).unwrap();
            current = Arc::new(builder.build().unwrap());
        }
        current
    }

    #[test]
    fn test_representation_layout() {
        let mut child_builder = CellBuilder::new();
        child_builder.store_u8(0xAB).unwrap();
        let child = Arc::new(child_builder.build().unwrap());

        let mut builder = CellBuilder::new();
        builder.store_uint(0b101, 3).unwrap();
        builder.store_ref(child.clone()).unwrap();
        let parent = builder.build().unwrap();

        let mut hasher = MerkleHasher::new();
        let repr = hasher.representation(&parent).unwrap();
        let child_hash = hasher.hash(&child).unwrap();

        let mut expected = vec![1, 1, 0b1011_0000, 0, 0];
        expected.extend_from_slice(&child_hash);
        assert_eq!(repr, expected);
        assert_eq!(hasher.hash(&parent).unwrap(), sha256(&expected));
    }

    #[test]
    fn test_shared_children_are_hashed_once() {
        let leaf = Arc::new(CellBuilder::new().build().unwrap());
        let mut mid_builder = CellBuilder::new();
        mid_builder.store_ref(leaf.clone()).unwrap();
        let mid = Arc::new(mid_builder.build().unwrap());

        let mut root_builder = CellBuilder::new();
        root_builder.store_ref(leaf.clone()).unwrap();
        root_builder.store_ref(mid.clone()).unwrap();
        root_builder.store_ref(leaf).unwrap();
        let root = root_builder.build().unwrap();

        let mut hasher = MerkleHasher::new();
        assert_eq!(hasher.depth(&root).unwrap(), 2);
        assert_eq!(hasher.len(), 3);
    }

    #[test]
    fn test_same_content_same_hash_regardless_of_identity() {
        let a = chain(3);
        let b = chain(3);
        assert!(!Arc::ptr_eq(&a, &b));

        let mut hasher = MerkleHasher::new();
        assert_eq!(hasher.hash(&a).unwrap(), hasher.hash(&b).unwrap());
    }

    #[test]
    fn test_max_depth_chain_is_accepted() {
        let root = chain(MAX_CELL_DEPTH);
        assert_eq!(root.depth().unwrap() as usize, MAX_CELL_DEPTH);
    }

    #[test]
    fn test_depth_overflow() {
        let root = chain(MAX_CELL_DEPTH + 1);
        assert!(matches!(
            root.hash(),
            Err(CellError::DepthOverflow { max: MAX_CELL_DEPTH, .. })
        ));
    }

    #[test]
    fn test_custom_ceiling() {
        let root = chain(5);
        let mut hasher = MerkleHasher::with_max_depth(4);
        assert!(matches!(
            hasher.hash(&root),
            Err(CellError::DepthOverflow { depth: 5, max: 4 })
        ));

        let mut hasher = MerkleHasher::with_max_depth(5);
        assert_eq!(hasher.depth(&root).unwrap(), 5);
    }

    #[test]
    fn test_reference_order_matters() {
        let mut a = CellBuilder::new();
        a.store_u8(1).unwrap();
        let a = Arc::new(a.build().unwrap());
        let mut b = CellBuilder::new();
        b.store_u8(2).unwrap();
        let b = Arc::new(b.build().unwrap());

        let mut ab = CellBuilder::new();
        ab.store_ref(a.clone()).unwrap();
        ab.store_ref(b.clone()).unwrap();
        let mut ba = CellBuilder::new();
        ba.store_ref(b).unwrap();
        ba.store_ref(a).unwrap();

        assert_ne!(
            ab.build().unwrap().hash().unwrap(),
            ba.build().unwrap().hash().unwrap()
        );
    }

    #[test]
    fn test_unhashed_child_reports_hash_order() {
        let leaf = CellBuilder::new().build().unwrap();
        let hasher = MerkleHasher::new();
        assert!(matches!(hasher.child_info(&leaf), Err(CellError::HashOrder)));

        let mut parent = CellBuilder::new();
        parent.store_ref(Arc::new(leaf)).unwrap();
        let parent = parent.build().unwrap();
        assert!(matches!(
            hasher.build_representation(&parent),
            Err(CellError::HashOrder)
        ));
    }
}
