//! # Instance Dataset
//!
//! The baked per-instance arrays plus the bookkeeping the resolver watches.
//!
//! ## Lifecycle
//!
//! ```text
//!   bake ──► regenerate(arrays) ──► dirty = true ──► resolver full upload
//!                                                     └─► clear_dirty()
//!   edit ──► modify_scale(i) / mark_modified(i) ──► resolver drains indices
//! ```
//!
//! ## Storage Format
//!
//! Datasets are saved as LZ4-compressed (size-prepended) little-endian
//! records:
//!
//! ```text
//!   "CNPY" | version u16 | flags u16 | count u32 | name_len u32 | name
//!   | positions  count * 4 f32
//!   | rotations  count * 4 f32
//!   | custom     count * 4 f32   (only when flags has CUSTOM_DATA)
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use glam::{Quat, Vec3};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use canopy_shared::{pack_scale, unpack_scale, Float4};

use crate::error::{DatasetError, DatasetResult};

const MAGIC: &[u8; 4] = b"CNPY";
const FORMAT_VERSION: u16 = 1;
const FLAG_DIRTY: u16 = 1 << 0;
const FLAG_CUSTOM_DATA: u16 = 1 << 1;

/// Parallel per-instance arrays. Index `i` is the same instance everywhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceArrays {
    positions: Vec<Float4>,
    rotations: Vec<Float4>,
    custom_data: Option<Vec<Float4>>,
}

impl InstanceArrays {
    /// Bundles arrays after checking they agree on length.
    ///
    /// # Errors
    ///
    /// [`DatasetError::ArrayLengthMismatch`] when any length differs.
    pub fn new(
        positions: Vec<Float4>,
        rotations: Vec<Float4>,
        custom_data: Option<Vec<Float4>>,
    ) -> DatasetResult<Self> {
        let custom_len = custom_data.as_ref().map(Vec::len);
        if positions.len() != rotations.len() || custom_len.is_some_and(|n| n != positions.len()) {
            return Err(DatasetError::ArrayLengthMismatch {
                positions: positions.len(),
                rotations: rotations.len(),
                custom_data: custom_len,
            });
        }
        Ok(Self {
            positions,
            rotations,
            custom_data,
        })
    }

    /// Number of instances.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True when there are no instances.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// `(x, y, z, packed_scale)` per instance.
    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[Float4] {
        &self.positions
    }

    /// Rotation quaternions `(x, y, z, w)`.
    #[inline]
    #[must_use]
    pub fn rotations(&self) -> &[Float4] {
        &self.rotations
    }

    /// Optional custom data.
    #[inline]
    #[must_use]
    pub fn custom_data(&self) -> Option<&[Float4]> {
        self.custom_data.as_deref()
    }
}

/// Deduplicated set of instance indices touched since the last drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifiedIndexSet {
    indices: BTreeSet<usize>,
}

impl ModifiedIndexSet {
    /// Records an index.
    pub fn insert(&mut self, index: usize) {
        self.indices.insert(index);
    }

    /// Number of pending indices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Takes every pending index in ascending order.
    pub fn drain(&mut self) -> Vec<usize> {
        std::mem::take(&mut self.indices).into_iter().collect()
    }

    /// Forgets every pending index.
    pub fn clear(&mut self) {
        self.indices.clear();
    }
}

/// A named instance population with change tracking.
#[derive(Debug, Clone, Default)]
pub struct InstanceDataset {
    name: String,
    arrays: InstanceArrays,
    dirty: bool,
    modified: ModifiedIndexSet,
}

impl InstanceDataset {
    /// Creates an empty, clean dataset.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a dataset already holding `arrays`, marked dirty.
    #[must_use]
    pub fn with_arrays(name: impl Into<String>, arrays: InstanceArrays) -> Self {
        let mut dataset = Self::new(name);
        dataset.regenerate(arrays);
        dataset
    }

    /// Dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current arrays.
    #[inline]
    #[must_use]
    pub fn arrays(&self) -> &InstanceArrays {
        &self.arrays
    }

    /// Number of instances.
    #[inline]
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.arrays.len()
    }

    /// Whether custom data is carried.
    #[must_use]
    pub fn has_custom_data(&self) -> bool {
        self.arrays.custom_data.is_some()
    }

    /// Replaces every array in one move and flags a full re-upload.
    /// Pending per-index edits are superseded.
    pub fn regenerate(&mut self, arrays: InstanceArrays) {
        self.arrays = arrays;
        self.modified.clear();
        self.dirty = true;
    }

    /// True when the arrays need a full re-upload.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Requests a full re-upload.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Acknowledges a full upload.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
        self.modified.clear();
    }

    /// Records an edited instance for a partial re-upload.
    ///
    /// # Errors
    ///
    /// [`DatasetError::IndexOutOfRange`].
    pub fn mark_modified(&mut self, index: usize) -> DatasetResult<()> {
        self.check_index(index)?;
        self.modified.insert(index);
        Ok(())
    }

    /// Pending edited indices.
    #[must_use]
    pub fn modified(&self) -> &ModifiedIndexSet {
        &self.modified
    }

    /// Takes the pending edited indices.
    pub fn drain_modified(&mut self) -> Vec<usize> {
        self.modified.drain()
    }

    /// Decoded scale of one instance.
    #[must_use]
    pub fn scale_at(&self, index: usize) -> Option<Vec3> {
        self.arrays.positions.get(index).map(|p| unpack_scale(p[3]))
    }

    /// Multiplies one instance's scale component-wise and repacks it.
    ///
    /// # Errors
    ///
    /// - [`DatasetError::IndexOutOfRange`]
    /// - [`DatasetError::Codec`] when the new scale is not packable; the
    ///   stored value is left untouched
    pub fn modify_scale(&mut self, index: usize, multiplier: Vec3) -> DatasetResult<()> {
        self.check_index(index)?;
        let slot = &mut self.arrays.positions[index];
        slot[3] = pack_scale(unpack_scale(slot[3]) * multiplier)?;
        self.modified.insert(index);
        Ok(())
    }

    /// Moves one instance, keeping its packed scale.
    ///
    /// # Errors
    ///
    /// [`DatasetError::IndexOutOfRange`].
    pub fn set_position(&mut self, index: usize, position: Vec3) -> DatasetResult<()> {
        self.check_index(index)?;
        let slot = &mut self.arrays.positions[index];
        slot[..3].copy_from_slice(&position.to_array());
        self.modified.insert(index);
        Ok(())
    }

    /// Re-orients one instance.
    ///
    /// # Errors
    ///
    /// [`DatasetError::IndexOutOfRange`].
    pub fn set_rotation(&mut self, index: usize, rotation: Quat) -> DatasetResult<()> {
        self.check_index(index)?;
        self.arrays.rotations[index] = rotation.normalize().to_array();
        self.modified.insert(index);
        Ok(())
    }

    fn check_index(&self, index: usize) -> DatasetResult<()> {
        if index < self.arrays.len() {
            Ok(())
        } else {
            Err(DatasetError::IndexOutOfRange {
                index,
                count: self.arrays.len(),
            })
        }
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Serializes and compresses the dataset.
    ///
    /// # Errors
    ///
    /// [`DatasetError::TooLarge`] when the instance count or name length
    /// does not fit the format's 32-bit fields.
    pub fn encode(&self) -> DatasetResult<Vec<u8>> {
        let count = self.arrays.len();
        let mut flags = 0u16;
        if self.dirty {
            flags |= FLAG_DIRTY;
        }
        if self.has_custom_data() {
            flags |= FLAG_CUSTOM_DATA;
        }

        let arrays = if self.has_custom_data() { 3 } else { 2 };
        let mut raw = Vec::with_capacity(16 + self.name.len() + count * 16 * arrays);
        raw.extend_from_slice(MAGIC);
        raw.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        raw.extend_from_slice(&flags.to_le_bytes());
        raw.extend_from_slice(&wire_len("instance count", count)?.to_le_bytes());
        raw.extend_from_slice(&wire_len("name length", self.name.len())?.to_le_bytes());
        raw.extend_from_slice(self.name.as_bytes());

        write_float4s(&mut raw, &self.arrays.positions);
        write_float4s(&mut raw, &self.arrays.rotations);
        if let Some(custom) = &self.arrays.custom_data {
            write_float4s(&mut raw, custom);
        }

        Ok(compress_prepend_size(&raw))
    }

    /// Inverse of [`InstanceDataset::encode`].
    ///
    /// # Errors
    ///
    /// [`DatasetError::Corrupt`] for anything that is not a complete record.
    pub fn decode(bytes: &[u8]) -> DatasetResult<Self> {
        let raw = decompress_size_prepended(bytes)
            .map_err(|e| DatasetError::Corrupt(format!("decompression failed: {e}")))?;
        let mut reader = ByteReader::new(&raw);

        if reader.take(4)? != MAGIC {
            return Err(DatasetError::Corrupt("bad magic".into()));
        }
        let version = reader.u16()?;
        if version != FORMAT_VERSION {
            return Err(DatasetError::Corrupt(format!("unsupported version {version}")));
        }
        let flags = reader.u16()?;
        let count = reader.u32()? as usize;
        let name_len = reader.u32()? as usize;
        let name = String::from_utf8(reader.take(name_len)?.to_vec())
            .map_err(|_| DatasetError::Corrupt("name is not utf-8".into()))?;

        let positions = reader.float4s(count)?;
        let rotations = reader.float4s(count)?;
        let custom_data = if flags & FLAG_CUSTOM_DATA != 0 {
            Some(reader.float4s(count)?)
        } else {
            None
        };
        if !reader.is_exhausted() {
            return Err(DatasetError::Corrupt("trailing bytes".into()));
        }

        Ok(Self {
            name,
            arrays: InstanceArrays::new(positions, rotations, custom_data)?,
            dirty: flags & FLAG_DIRTY != 0,
            modified: ModifiedIndexSet::default(),
        })
    }

    /// Saves to a compressed file.
    ///
    /// # Errors
    ///
    /// [`DatasetError::TooLarge`] or [`DatasetError::Io`].
    pub fn save(&self, path: &Path) -> DatasetResult<()> {
        std::fs::write(path, self.encode()?)?;
        Ok(())
    }

    /// Loads from a compressed file.
    ///
    /// # Errors
    ///
    /// [`DatasetError::Io`] or [`DatasetError::Corrupt`].
    pub fn load(path: &Path) -> DatasetResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }
}

fn wire_len(what: &'static str, len: usize) -> DatasetResult<u32> {
    u32::try_from(len).map_err(|_| DatasetError::TooLarge { what, len })
}

fn write_float4s(out: &mut Vec<u8>, values: &[Float4]) {
    for value in values {
        for component in value {
            out.extend_from_slice(&component.to_le_bytes());
        }
    }
}

/// Bounds-checked little-endian cursor.
struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, len: usize) -> DatasetResult<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| DatasetError::Corrupt(format!("truncated at byte {}", self.offset)))?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u16(&mut self) -> DatasetResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> DatasetResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn float4s(&mut self, count: usize) -> DatasetResult<Vec<Float4>> {
        let len = count
            .checked_mul(16)
            .ok_or_else(|| DatasetError::Corrupt("instance count overflows".into()))?;
        let bytes = self.take(len)?;
        Ok(bytes
            .chunks_exact(16)
            .map(|chunk| {
                let mut value = [0.0f32; 4];
                for (slot, b) in value.iter_mut().zip(chunk.chunks_exact(4)) {
                    *slot = f32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                }
                value
            })
            .collect())
    }

    fn is_exhausted(&self) -> bool {
        self.offset == self.bytes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_arrays(count: usize, custom: bool) -> InstanceArrays {
        let packed = pack_scale(Vec3::new(1.0, 2.0, 1.0)).unwrap();
        let positions = (0..count).map(|i| [i as f32, 0.0, -(i as f32), packed]).collect();
        let rotations = vec![[0.0, 0.0, 0.0, 1.0]; count];
        let custom_data = custom.then(|| vec![[0.9, 1.0, 0.8, 42.0]; count]);
        InstanceArrays::new(positions, rotations, custom_data).unwrap()
    }

    #[test]
    fn test_mismatched_arrays_rejected() {
        let err = InstanceArrays::new(vec![[0.0; 4]; 3], vec![[0.0; 4]; 2], None).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::ArrayLengthMismatch {
                positions: 3,
                rotations: 2,
                custom_data: None
            }
        ));

        let err =
            InstanceArrays::new(vec![[0.0; 4]; 2], vec![[0.0; 4]; 2], Some(vec![[0.0; 4]; 1]))
                .unwrap_err();
        assert!(matches!(err, DatasetError::ArrayLengthMismatch { custom_data: Some(1), .. }));
    }

    #[test]
    fn test_regenerate_sets_dirty_and_drops_edits() {
        let mut dataset = InstanceDataset::new("ferns");
        assert!(!dataset.is_dirty());

        dataset.regenerate(sample_arrays(4, false));
        dataset.clear_dirty();
        dataset.mark_modified(2).unwrap();
        assert_eq!(dataset.modified().len(), 1);

        dataset.regenerate(sample_arrays(8, false));
        assert!(dataset.is_dirty());
        assert!(dataset.modified().is_empty());
        assert_eq!(dataset.instance_count(), 8);
    }

    #[test]
    fn test_modify_scale() {
        let mut dataset = InstanceDataset::with_arrays("rocks", sample_arrays(3, false));
        dataset.clear_dirty();

        dataset.modify_scale(1, Vec3::new(1.5, 0.5, 2.0)).unwrap();
        let scale = dataset.scale_at(1).unwrap();
        println!("modified scale: {scale:?}");
        assert!((scale - Vec3::new(1.5, 1.0, 2.0)).abs().max_element() < 0.05);

        // untouched neighbours, edit recorded, no full re-upload requested
        assert_eq!(dataset.arrays().positions()[0], sample_arrays(3, false).positions()[0]);
        assert_eq!(dataset.drain_modified(), vec![1]);
        assert!(!dataset.is_dirty());
    }

    #[test]
    fn test_modify_scale_errors() {
        let mut dataset = InstanceDataset::with_arrays("rocks", sample_arrays(2, false));
        assert!(matches!(
            dataset.modify_scale(5, Vec3::ONE),
            Err(DatasetError::IndexOutOfRange { index: 5, count: 2 })
        ));

        let before = dataset.arrays().positions()[0];
        assert!(matches!(
            dataset.modify_scale(0, Vec3::splat(10.0)),
            Err(DatasetError::Codec(_))
        ));
        assert_eq!(dataset.arrays().positions()[0], before);
    }

    #[test]
    fn test_modified_set_dedups_and_sorts() {
        let mut dataset = InstanceDataset::with_arrays("grass", sample_arrays(10, false));
        for i in [7, 2, 7, 4, 2] {
            dataset.mark_modified(i).unwrap();
        }
        assert_eq!(dataset.drain_modified(), vec![2, 4, 7]);
        assert!(dataset.drain_modified().is_empty());
    }

    #[test]
    fn test_set_position_keeps_scale() {
        let mut dataset = InstanceDataset::with_arrays("grass", sample_arrays(2, false));
        let packed = dataset.arrays().positions()[1][3];
        dataset.set_position(1, Vec3::new(5.0, 6.0, 7.0)).unwrap();
        assert_eq!(dataset.arrays().positions()[1], [5.0, 6.0, 7.0, packed]);
    }

    #[test]
    fn test_encode_decode() {
        let mut dataset = InstanceDataset::with_arrays("pines", sample_arrays(50, true));
        let restored = InstanceDataset::decode(&dataset.encode().unwrap()).unwrap();
        assert_eq!(restored.name(), "pines");
        assert_eq!(restored.arrays(), dataset.arrays());
        assert!(restored.is_dirty());

        dataset.clear_dirty();
        let restored = InstanceDataset::decode(&dataset.encode().unwrap()).unwrap();
        assert!(!restored.is_dirty());
    }

    #[test]
    fn test_wire_lengths_refuse_truncation() {
        assert_eq!(wire_len("instance count", 12).unwrap(), 12);
        assert_eq!(wire_len("instance count", u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_wire_length_overflow_reported() {
        match wire_len("instance count", u32::MAX as usize + 1) {
            Err(DatasetError::TooLarge { what, len }) => {
                assert_eq!(what, "instance count");
                assert_eq!(len, 1usize << 32);
            }
            other => panic!("expected TooLarge, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            InstanceDataset::decode(&[1, 2, 3]),
            Err(DatasetError::Corrupt(_))
        ));

        let bogus = compress_prepend_size(b"NOPE\x01\x00");
        assert!(matches!(
            InstanceDataset::decode(&bogus),
            Err(DatasetError::Corrupt(_))
        ));
    }
}
