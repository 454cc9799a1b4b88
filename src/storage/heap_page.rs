use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{DbError, DbResult};
use crate::record::{RecordId, Tuple, TupleDesc};

use super::{PAGE_SIZE, PageId};

/// Size of the (slot_count, slot_used) page header in bytes
const HEADER_SIZE: usize = 8;

/// A fixed-size slotted page of same-width tuples.
///
/// On-disk layout:
///
/// ```text
/// [0..4)   slot_count : little-endian i32 (capacity)
/// [4..8)   slot_used  : little-endian i32 (occupancy)
/// [8..)    occupied tuples in ascending slot order, then zero padding
/// ```
///
/// The page records the path of its backing file so the buffer pool can
/// write it back without holding the owning `HeapFile`.
pub struct HeapPage {
    page_no: PageId,
    dirty: bool,
    desc: TupleDesc,
    path: PathBuf,
    slots: Vec<Option<Tuple>>,
    slot_used: usize,
}

impl HeapPage {
    /// Create a fresh zero-occupancy page. The slot capacity is
    /// `(PAGE_SIZE - 8) / tuple_size`; a descriptor whose tuples cannot
    /// fit a single slot is rejected.
    pub fn new(desc: TupleDesc, page_no: PageId, path: &Path) -> DbResult<Self> {
        let tuple_size = desc.byte_size();
        if tuple_size == 0 || tuple_size > PAGE_SIZE - HEADER_SIZE {
            return Err(DbError::IncompatibleTypes(format!(
                "tuple layout of {} bytes does not fit a {}-byte page",
                tuple_size, PAGE_SIZE
            )));
        }

        let slot_count = (PAGE_SIZE - HEADER_SIZE) / tuple_size;
        Ok(Self {
            page_no,
            dirty: false,
            desc,
            path: path.to_path_buf(),
            slots: vec![None; slot_count],
            slot_used: 0,
        })
    }

    pub fn page_no(&self) -> PageId {
        self.page_no
    }

    pub fn backing_path(&self) -> &Path {
        &self.path
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot_used(&self) -> usize {
        self.slot_used
    }

    pub fn is_full(&self) -> bool {
        self.slot_used >= self.slots.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Place the tuple in the first empty slot, stamping its record id
    /// both on the stored copy and on the caller's tuple.
    pub fn insert(&mut self, tuple: &mut Tuple) -> DbResult<RecordId> {
        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(DbError::PageFull(self.page_no))?;

        let rid = RecordId::new(self.page_no, slot);
        tuple.set_rid(Some(rid));

        let mut stored = tuple.clone();
        stored.set_rid(Some(rid));
        self.slots[slot] = Some(stored);
        self.slot_used += 1;
        self.dirty = true;
        Ok(rid)
    }

    /// Clear the slot addressed by `rid`. The id must reference an
    /// occupied slot of this page.
    pub fn delete(&mut self, rid: RecordId) -> DbResult<()> {
        let slot = self
            .slots
            .get_mut(rid.slot)
            .ok_or_else(|| DbError::TupleNotFound(format!("slot {} out of range", rid.slot)))?;

        if slot.take().is_none() {
            return Err(DbError::TupleNotFound(format!(
                "slot {} is already empty",
                rid.slot
            )));
        }

        self.slot_used -= 1;
        self.dirty = true;
        Ok(())
    }

    /// Serialize the page to exactly `PAGE_SIZE` bytes.
    ///
    /// Occupied tuples are compacted: a tuple's on-disk position is its
    /// rank among occupied slots, not its in-memory slot number. Record
    /// ids are therefore renumbered on a flush-then-reload cycle, which is
    /// safe only because dirty pages are never evicted while referenced.
    pub fn to_buffer(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PAGE_SIZE);
        buf.extend_from_slice(&(self.slots.len() as i32).to_le_bytes());
        buf.extend_from_slice(&(self.slot_used as i32).to_le_bytes());
        for tuple in self.slots.iter().flatten() {
            tuple.write_to(&mut buf);
        }
        buf.resize(PAGE_SIZE, 0);
        buf
    }

    /// Reset this page from serialized bytes: the slot array is rebuilt at
    /// the stored capacity and `slot_used` tuples are read into slots
    /// `0..slot_used`, each stamped with its record id.
    pub fn init_from_buffer(&mut self, data: &[u8]) -> DbResult<()> {
        if data.len() < HEADER_SIZE {
            return Err(DbError::MalformedData(format!(
                "page buffer of {} bytes is shorter than the header",
                data.len()
            )));
        }

        let slot_count = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let slot_used = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        if slot_count < 0 || slot_used < 0 || slot_used > slot_count {
            return Err(DbError::MalformedData(format!(
                "invalid page header: slot_count={}, slot_used={}",
                slot_count, slot_used
            )));
        }

        let slot_used = slot_used as usize;
        let tuple_size = self.desc.byte_size();
        if HEADER_SIZE + slot_used * tuple_size > data.len() {
            return Err(DbError::MalformedData(format!(
                "page claims {} tuples but holds only {} bytes",
                slot_used,
                data.len()
            )));
        }

        self.slots = vec![None; slot_count as usize];
        self.slot_used = slot_used;

        let mut offset = HEADER_SIZE;
        for slot in 0..slot_used {
            let mut tuple = Tuple::read_from(&data[offset..offset + tuple_size], &self.desc)?;
            tuple.set_rid(Some(RecordId::new(self.page_no, slot)));
            self.slots[slot] = Some(tuple);
            offset += tuple_size;
        }
        Ok(())
    }

    /// Iterate the occupied slots in ascending order. Restart by
    /// constructing a new iterator.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().flatten()
    }

    /// Write the serialized page at its offset in `file`
    pub fn write_to_file(&self, file: &mut File) -> DbResult<()> {
        file.seek(SeekFrom::Start((self.page_no * PAGE_SIZE) as u64))?;
        file.write_all(&self.to_buffer())?;
        Ok(())
    }
}
