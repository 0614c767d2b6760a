//! Bag of Cells (BoC) serialization format.
//!
//! BoC is the standard serialization format for TON cells. It efficiently
//! encodes a DAG of cells with deduplication and optional CRC32 checksum.
//! Compiled contract code is distributed as a BoC, so this is how code
//! cells enter the derivation pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::{
    crc32c, Cell, CellError, CellResult, MerkleHasher, BOC_GENERIC_MAGIC, BOC_INDEXED_CRC32_MAGIC,
    BOC_INDEXED_MAGIC, MAX_CELL_BITS, MAX_CELL_DEPTH, MAX_CELL_REFS,
};

/// Bag of Cells - a serialized collection of cells.
///
/// BoC is the standard way to serialize cells in TON. It supports:
/// - Multiple root cells
/// - Cell deduplication (cells with same hash are stored once)
/// - Optional CRC32 checksum for integrity
/// - Optional index for fast cell lookup
#[derive(Debug, Clone)]
pub struct BagOfCells {
    /// Root cells.
    roots: Vec<Arc<Cell>>,
}

/// Parsed but not yet linked cell.
struct RawCell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<usize>,
}

impl BagOfCells {
    /// Create a new BoC with the given root cells.
    pub fn new(roots: Vec<Arc<Cell>>) -> Self {
        BagOfCells { roots }
    }

    /// Create a BoC with a single root cell.
    pub fn from_root(root: Cell) -> Self {
        BagOfCells {
            roots: vec![Arc::new(root)],
        }
    }

    /// Get all root cells.
    pub fn roots(&self) -> &[Arc<Cell>] {
        &self.roots
    }

    /// Get a single root cell (errors if not exactly one root).
    pub fn single_root(&self) -> CellResult<&Arc<Cell>> {
        if self.roots.len() != 1 {
            return Err(CellError::NotSingleRoot(self.roots.len()));
        }
        Ok(&self.roots[0])
    }

    /// Consume the BoC, returning its only root.
    pub fn into_single_root(mut self) -> CellResult<Arc<Cell>> {
        if self.roots.len() != 1 {
            return Err(CellError::NotSingleRoot(self.roots.len()));
        }
        Ok(self.roots.remove(0))
    }

    /// Get the number of root cells.
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Serialize the BoC to bytes.
    ///
    /// Uses the generic BoC format with CRC32 checksum.
    pub fn serialize(&self) -> CellResult<Vec<u8>> {
        self.serialize_with_options(true, false)
    }

    /// Serialize with options.
    ///
    /// # Arguments
    /// * `with_crc` - Include CRC32 checksum
    /// * `with_index` - Include cell index (for faster deserialization)
    pub fn serialize_with_options(&self, with_crc: bool, with_index: bool) -> CellResult<Vec<u8>> {
        if self.roots.is_empty() {
            return Err(CellError::InvalidBoc("No root cells".to_string()));
        }

        // One hasher for the whole bag: shared subtrees are hashed once.
        let mut hasher = MerkleHasher::new();

        // Parents before children, as every other TON serializer emits.
        let cells = self.collect_cells(&mut hasher)?;
        let cell_count = cells.len();

        let mut hash_to_index: HashMap<[u8; 32], usize> = HashMap::with_capacity(cell_count);
        for (i, &cell) in cells.iter().enumerate() {
            hash_to_index.insert(hasher.hash(cell)?, i);
        }

        let root_indices = self
            .roots
            .iter()
            .map(|r| {
                let hash = hasher.hash(r)?;
                hash_to_index
                    .get(&hash)
                    .copied()
                    .ok_or_else(|| CellError::InvalidBoc("Root not collected".to_string()))
            })
            .collect::<CellResult<Vec<usize>>>()?;

        let size_bytes = Self::bytes_needed(cell_count);

        let mut cell_data: Vec<Vec<u8>> = Vec::with_capacity(cell_count);
        let mut total_cells_size = 0usize;
        for &cell in &cells {
            let serialized = Self::serialize_cell(cell, &mut hasher, &hash_to_index, size_bytes)?;
            total_cells_size += serialized.len();
            cell_data.push(serialized);
        }

        let off_bytes = Self::bytes_needed(total_cells_size);

        let mut result = Vec::new();

        // Magic number (4 bytes)
        result.extend_from_slice(&BOC_GENERIC_MAGIC.to_be_bytes());

        // Flags byte: has_idx (bit 7) | has_crc (bit 6) | has_cache_bits (bit 5) | flags (bits 4-3) | size_bytes (bits 2-0)
        let flags: u8 = (if with_index { 1 << 7 } else { 0 })
            | (if with_crc { 1 << 6 } else { 0 })
            | (size_bytes as u8);
        result.push(flags);
        result.push(off_bytes as u8);

        Self::write_uint(&mut result, cell_count as u64, size_bytes);
        Self::write_uint(&mut result, self.roots.len() as u64, size_bytes);
        // Absent count
        Self::write_uint(&mut result, 0, size_bytes);
        Self::write_uint(&mut result, total_cells_size as u64, off_bytes);

        for idx in &root_indices {
            Self::write_uint(&mut result, *idx as u64, size_bytes);
        }

        if with_index {
            let mut offset = 0usize;
            for data in &cell_data {
                offset += data.len();
                Self::write_uint(&mut result, offset as u64, off_bytes);
            }
        }

        for data in cell_data {
            result.extend_from_slice(&data);
        }

        if with_crc {
            let crc = crc32c(&result);
            result.extend_from_slice(&crc.to_le_bytes());
        }

        Ok(result)
    }

    /// Serialize to base64 string.
    pub fn serialize_to_base64(&self) -> CellResult<String> {
        let bytes = self.serialize()?;
        Ok(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            &bytes,
        ))
    }

    /// Deserialize from bytes.
    ///
    /// Supports all three BoC formats:
    /// - `0xb5ee9c72` - Generic BoC (serialized_boc)
    /// - `0x68ff65f3` - Indexed BoC (serialized_boc_idx)
    /// - `0xacc3a728` - Indexed BoC with CRC32C (serialized_boc_idx_crc32c)
    pub fn deserialize(data: &[u8]) -> CellResult<Self> {
        if data.len() < 6 {
            return Err(CellError::UnexpectedEof);
        }

        let magic = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let mut offset = 4;

        let (has_idx, has_crc, size_bytes) = match magic {
            BOC_GENERIC_MAGIC => {
                let flags = data[offset];
                offset += 1;
                let has_idx = (flags & 0x80) != 0;
                let has_crc = (flags & 0x40) != 0;
                let size_bytes = (flags & 0x07) as usize;
                (has_idx, has_crc, size_bytes)
            }
            BOC_INDEXED_MAGIC => {
                let size_bytes = data[offset] as usize;
                offset += 1;
                (true, false, size_bytes)
            }
            BOC_INDEXED_CRC32_MAGIC => {
                let size_bytes = data[offset] as usize;
                offset += 1;
                (true, true, size_bytes)
            }
            _ => {
                return Err(CellError::InvalidBoc(format!(
                    "Invalid magic: {:08x}, expected one of {:08x}, {:08x}, {:08x}",
                    magic, BOC_GENERIC_MAGIC, BOC_INDEXED_MAGIC, BOC_INDEXED_CRC32_MAGIC
                )));
            }
        };

        if size_bytes == 0 || size_bytes > 4 {
            return Err(CellError::InvalidBoc(format!("Invalid size_bytes: {}", size_bytes)));
        }

        let off_bytes = data[offset] as usize;
        offset += 1;
        if off_bytes == 0 || off_bytes > 8 {
            return Err(CellError::InvalidBoc(format!("Invalid off_bytes: {}", off_bytes)));
        }

        let data_end = if has_crc {
            if data.len() < offset + 4 {
                return Err(CellError::UnexpectedEof);
            }
            let data_end = data.len() - 4;
            let expected = u32::from_le_bytes([
                data[data_end],
                data[data_end + 1],
                data[data_end + 2],
                data[data_end + 3],
            ]);
            let actual = crc32c(&data[..data_end]);
            if expected != actual {
                return Err(CellError::CrcMismatch { expected, actual });
            }
            data_end
        } else {
            data.len()
        };
        let data = &data[..data_end];

        let cells_count = Self::read_uint(data, &mut offset, size_bytes)? as usize;
        let roots_count = Self::read_uint(data, &mut offset, size_bytes)? as usize;
        let absent_count = Self::read_uint(data, &mut offset, size_bytes)? as usize;
        let total_cells_size = Self::read_uint(data, &mut offset, off_bytes)? as usize;

        if absent_count != 0 {
            return Err(CellError::InvalidBoc("Absent cells are not supported".to_string()));
        }
        if roots_count == 0 || roots_count > cells_count {
            return Err(CellError::InvalidBoc(format!(
                "Invalid root count {} for {} cells",
                roots_count, cells_count
            )));
        }

        let mut root_indices = Vec::with_capacity(roots_count);
        for _ in 0..roots_count {
            root_indices.push(Self::read_uint(data, &mut offset, size_bytes)? as usize);
        }

        if has_idx {
            offset = cells_count
                .checked_mul(off_bytes)
                .and_then(|len| offset.checked_add(len))
                .ok_or(CellError::UnexpectedEof)?;
        }

        let cells_end = offset
            .checked_add(total_cells_size)
            .filter(|&end| end <= data.len())
            .ok_or(CellError::UnexpectedEof)?;
        let cells = Self::parse_cells(&data[offset..cells_end], cells_count, size_bytes)?;

        let roots: Vec<Arc<Cell>> = root_indices
            .iter()
            .map(|&idx| cells.get(idx).cloned().ok_or(CellError::CellNotFound(idx)))
            .collect::<CellResult<Vec<_>>>()?;

        debug!("deserialized BoC: {} cells, {} roots", cells_count, roots.len());

        Ok(BagOfCells { roots })
    }

    /// Deserialize from base64 string.
    pub fn deserialize_from_base64(base64_str: &str) -> CellResult<Self> {
        let bytes = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            base64_str.trim(),
        )
        .map_err(|e| CellError::InvalidBase64(e.to_string()))?;

        Self::deserialize(&bytes)
    }

    /// Deserialize from hex string.
    pub fn deserialize_from_hex(hex_str: &str) -> CellResult<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CellError::InvalidBoc(format!("invalid hex string: {}", e)))?;

        Self::deserialize(&bytes)
    }

    /// Collect all distinct cells, each parent before its children.
    fn collect_cells<'a>(&'a self, hasher: &mut MerkleHasher<'a>) -> CellResult<Vec<&'a Cell>> {
        // Post-order first (children before parents), then reverse.
        let mut order: Vec<&'a Cell> = Vec::new();
        let mut visited: HashSet<[u8; 32]> = HashSet::new();

        for root in &self.roots {
            let mut stack: Vec<(&'a Cell, bool)> = vec![(root.as_ref(), false)];
            while let Some((cell, expanded)) = stack.pop() {
                let hash = hasher.hash(cell)?;
                if visited.contains(&hash) {
                    continue;
                }
                if expanded {
                    visited.insert(hash);
                    order.push(cell);
                    continue;
                }
                stack.push((cell, true));
                for child in cell.references().iter().rev() {
                    stack.push((child.as_ref(), false));
                }
            }
        }

        order.reverse();
        Ok(order)
    }

    /// Serialize a single cell.
    fn serialize_cell<'a>(
        cell: &'a Cell,
        hasher: &mut MerkleHasher<'a>,
        hash_to_index: &HashMap<[u8; 32], usize>,
        ref_size: usize,
    ) -> CellResult<Vec<u8>> {
        let mut result = Vec::with_capacity(2 + cell.byte_len() + cell.reference_count() * ref_size);

        let (d1, d2) = cell.descriptors();
        result.push(d1);
        result.push(d2);

        result.extend_from_slice(&cell.data_with_completion_tag());

        for reference in cell.references() {
            let hash = hasher.hash(reference)?;
            let idx = hash_to_index
                .get(&hash)
                .ok_or_else(|| CellError::InvalidBoc("Reference not found".to_string()))?;
            Self::write_uint(&mut result, *idx as u64, ref_size);
        }

        Ok(result)
    }

    /// Parse cells from serialized data.
    fn parse_cells(data: &[u8], cell_count: usize, size_bytes: usize) -> CellResult<Vec<Arc<Cell>>> {
        let mut raw_cells: Vec<RawCell> = Vec::with_capacity(cell_count.min(data.len() / 2));
        let mut offset = 0;

        for _ in 0..cell_count {
            if offset + 2 > data.len() {
                return Err(CellError::UnexpectedEof);
            }

            let d1 = data[offset];
            let d2 = data[offset + 1];
            offset += 2;

            let refs_count = (d1 & 0x07) as usize;
            if d1 & 0x08 != 0 {
                return Err(CellError::InvalidBoc("Exotic cells are not supported".to_string()));
            }
            if d1 >> 5 != 0 {
                return Err(CellError::InvalidBoc(format!("Non-zero level mask: {}", d1 >> 5)));
            }
            if refs_count > MAX_CELL_REFS {
                return Err(CellError::TooManyReferences(refs_count));
            }

            // d2 = ceil(bit_len / 8) + floor(bit_len / 8)
            let data_len = (d2 as usize).div_ceil(2);
            if offset + data_len > data.len() {
                return Err(CellError::UnexpectedEof);
            }
            let cell_data = &data[offset..offset + data_len];
            offset += data_len;

            let bit_len = if d2 % 2 == 0 {
                data_len * 8
            } else {
                let bit_len = Self::find_bit_len(cell_data)?;
                if bit_len % 8 == 0 {
                    return Err(CellError::InvalidBoc(
                        "Completion tag fills a whole byte".to_string(),
                    ));
                }
                bit_len
            };
            if bit_len > MAX_CELL_BITS {
                return Err(CellError::CapacityExceeded {
                    requested: bit_len,
                    max: MAX_CELL_BITS,
                });
            }

            let mut refs = Vec::with_capacity(refs_count);
            for _ in 0..refs_count {
                let idx = Self::read_uint(data, &mut offset, size_bytes)? as usize;
                if idx >= cell_count {
                    return Err(CellError::CellNotFound(idx));
                }
                refs.push(idx);
            }

            raw_cells.push(RawCell {
                data: Self::remove_completion_tag(cell_data, bit_len),
                bit_len,
                refs,
            });
        }

        // Standard serializers put parents first (children at higher
        // indices); some emit children first. Detect and build leaves first.
        let refs_point_higher = raw_cells
            .iter()
            .enumerate()
            .find_map(|(i, raw)| raw.refs.first().map(|&r| r > i))
            .unwrap_or(true);

        let order: Vec<usize> = if refs_point_higher {
            (0..cell_count).rev().collect()
        } else {
            (0..cell_count).collect()
        };

        // Dropping an `Arc<Cell>` chain recurses once per level, so nothing
        // deeper than MAX_CELL_DEPTH may be linked.
        let mut cells: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
        let mut depths = vec![0usize; cell_count];
        for i in order {
            let raw = &raw_cells[i];
            let mut depth = 0;
            let mut references = Vec::with_capacity(raw.refs.len());
            for &idx in &raw.refs {
                let child = cells[idx].clone().ok_or(CellError::CellNotFound(idx))?;
                depth = depth.max(depths[idx] + 1);
                references.push(child);
            }
            if depth > MAX_CELL_DEPTH {
                return Err(CellError::DepthOverflow {
                    depth,
                    max: MAX_CELL_DEPTH,
                });
            }

            depths[i] = depth;
            cells[i] = Some(Arc::new(Cell::new(raw.data.clone(), raw.bit_len, references)));
        }

        cells
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.ok_or(CellError::CellNotFound(i)))
            .collect()
    }

    /// Find the actual bit length of non-aligned data from its completion tag.
    ///
    /// The completion tag is a '1' bit followed by zeros in the last byte.
    fn find_bit_len(data: &[u8]) -> CellResult<usize> {
        match data.last() {
            Some(&last) if last != 0 => {
                let trailing_zeros = last.trailing_zeros() as usize;
                Ok(data.len() * 8 - trailing_zeros - 1)
            }
            _ => Err(CellError::InvalidBoc("Missing completion tag".to_string())),
        }
    }

    /// Remove completion tag from data.
    fn remove_completion_tag(data: &[u8], bit_len: usize) -> Vec<u8> {
        let byte_len = bit_len.div_ceil(8);
        let mut result = data[..byte_len].to_vec();

        let remainder = bit_len % 8;
        if remainder != 0
            && let Some(last) = result.last_mut()
        {
            *last &= !((1u8 << (8 - remainder)) - 1);
        }

        result
    }

    /// Calculate bytes needed to represent a number.
    fn bytes_needed(n: usize) -> usize {
        if n == 0 {
            1
        } else {
            ((64 - (n as u64).leading_zeros()) + 7) as usize / 8
        }
    }

    /// Write an unsigned integer with specified byte width.
    fn write_uint(buf: &mut Vec<u8>, value: u64, bytes: usize) {
        for i in (0..bytes).rev() {
            buf.push((value >> (i * 8)) as u8);
        }
    }

    /// Read an unsigned integer with specified byte width.
    fn read_uint(data: &[u8], offset: &mut usize, bytes: usize) -> CellResult<u64> {
        if *offset + bytes > data.len() {
            return Err(CellError::UnexpectedEof);
        }

        let mut result: u64 = 0;
        for i in 0..bytes {
            result = (result << 8) | (data[*offset + i] as u64);
        }
        *offset += bytes;
        Ok(result)
    }
}
