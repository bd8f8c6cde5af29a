//! The three-file octree store.
//!
//! An [`OctreeFile`] owns the header, node and data files of one octree and
//! the header metadata describing them. Record operations are blocking and
//! go straight to disk; the header is only rewritten by
//! [`OctreeFile::write_header`].
//!
//! Lifecycle: opened with default (or configured) metadata, optionally
//! loaded with [`read_header`](OctreeFile::read_header), read and written
//! record by record, then closed. Closing is idempotent and happens on drop
//! if the caller did not do it.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::config::{OctreeFileBuilder, OctreeFileConfig};
use crate::constants::{NODE_RECORD_SIZE, NO_DATA};
use crate::descriptor::DataDescriptor;
use crate::errors::{OctreeError, OctreeResult};
use crate::header::OctreeFileHeader;
use crate::node::OctreeNode;
use crate::record_file::RecordFile;

/// A sparse voxel octree persisted as `<base>.octree`, `<base>.octreenodes`
/// and `<base>.octreedata`.
///
/// All state sits behind one mutex, so a store can be shared between
/// threads, but every operation is serialized and blocking.
pub struct OctreeFile {
    config: OctreeFileConfig,
    inner: Mutex<OctreeFileInner>,
}

struct OctreeFileInner {
    /// `None` once the store is closed
    files: Option<OpenFiles>,
    header: OctreeFileHeader,
}

struct OpenFiles {
    header: File,
    nodes: RecordFile,
    data: RecordFile,
}

impl OpenFiles {
    fn open(config: &OctreeFileConfig, data_size: usize) -> OctreeResult<Self> {
        let create = config.create_if_missing();
        let truncate = config.truncate();

        let header = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(truncate)
            .open(config.header_path())?;
        let nodes = RecordFile::open(&config.nodes_path(), NODE_RECORD_SIZE, create, truncate)?;
        let data = RecordFile::open(&config.data_path(), data_size, create, truncate)?;

        Ok(Self {
            header,
            nodes,
            data,
        })
    }

    fn sync(&mut self) -> OctreeResult<()> {
        self.header.flush()?;
        self.header.sync_all()?;
        self.nodes.sync()?;
        self.data.sync()?;
        Ok(())
    }
}

impl OctreeFile {
    /// Creates a builder for configuring and opening a store.
    pub fn with_config() -> OctreeFileBuilder {
        OctreeFileBuilder::new()
    }

    /// Opens the three files sharing `base_name`. Missing files are created
    /// empty when `create` is set, otherwise opening fails.
    ///
    /// Metadata starts at its defaults; call [`read_header`](Self::read_header)
    /// to load it from an existing store.
    pub fn open_or_create(base_name: impl AsRef<Path>, create: bool) -> OctreeResult<Self> {
        Self::with_config()
            .base_name(base_name)
            .create_if_missing(create)
            .open()
    }

    /// Opens an existing store and loads its header.
    pub fn open(base_name: impl AsRef<Path>) -> OctreeResult<Self> {
        let store = Self::open_or_create(base_name, false)?;
        store.read_header()?;
        Ok(store)
    }

    /// Creates a new, empty store, replacing any files already present.
    pub fn create(base_name: impl AsRef<Path>) -> OctreeResult<Self> {
        Self::with_config()
            .base_name(base_name)
            .create_if_missing(true)
            .truncate(true)
            .open()
    }

    pub fn open_with_config(config: OctreeFileConfig) -> OctreeResult<Self> {
        let mut header = config.initial_header().clone();
        header.node_count = 0;
        header.data_count = 0;

        let data_size = record_len(header.data_size)?;
        let files = OpenFiles::open(&config, data_size)?;
        log::debug!("Opened octree file {:?}", config.base_name());

        Ok(Self {
            config,
            inner: Mutex::new(OctreeFileInner {
                files: Some(files),
                header,
            }),
        })
    }

    pub fn config(&self) -> &OctreeFileConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Header
    // ------------------------------------------------------------------

    /// Loads metadata from the header file. On error the in-memory
    /// metadata is left untouched.
    pub fn read_header(&self) -> OctreeResult<()> {
        let mut guard = self.inner.lock();
        let OctreeFileInner { files, header } = &mut *guard;
        let files = files.as_mut().ok_or(OctreeError::Closed)?;

        let mut bytes = Vec::new();
        files.header.seek(SeekFrom::Start(0))?;
        files.header.read_to_end(&mut bytes)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| OctreeError::MalformedHeader(format!("header is not text: {}", e)))?;

        let parsed = OctreeFileHeader::parse(&text)?;
        files.data.set_record_size(record_len(parsed.data_size)?);
        *header = parsed;

        log::debug!(
            "Read octree header {:?}: {} nodes, {} data records of {} bytes",
            self.config.header_path(),
            header.node_count,
            header.data_count,
            header.data_size
        );
        check_file_lengths(files, header)
    }

    /// Replaces the header file with the current metadata.
    pub fn write_header(&self) -> OctreeResult<()> {
        let mut guard = self.inner.lock();
        let OctreeFileInner { files, header } = &mut *guard;
        let files = files.as_mut().ok_or(OctreeError::Closed)?;

        let text = header.to_string();
        files.header.set_len(0)?;
        files.header.seek(SeekFrom::Start(0))?;
        files.header.write_all(text.as_bytes())?;
        files.header.flush()?;

        log::debug!("Wrote octree header {:?}", self.config.header_path());
        Ok(())
    }

    /// Snapshot of the current metadata
    pub fn header(&self) -> OctreeFileHeader {
        self.inner.lock().header.clone()
    }

    pub fn node_count(&self) -> u64 {
        self.inner.lock().header.node_count
    }

    /// Number of data records, including the reserved record at index 0
    pub fn data_count(&self) -> u64 {
        self.inner.lock().header.data_count
    }

    pub fn data_size(&self) -> u64 {
        self.inner.lock().header.data_size
    }

    pub fn grid(&self) -> [u32; 3] {
        self.inner.lock().header.grid
    }

    pub fn data_descriptors(&self) -> Vec<DataDescriptor> {
        self.inner.lock().header.data_descriptors.clone()
    }

    pub fn data_descriptor(&self, name: &str) -> Option<DataDescriptor> {
        self.inner.lock().header.data_descriptor(name).cloned()
    }

    /// Sets the payload record size. Only allowed while the data array is empty.
    pub fn set_data_size(&self, data_size: u64) -> OctreeResult<()> {
        let mut guard = self.inner.lock();
        let OctreeFileInner { files, header } = &mut *guard;
        let files = files.as_mut().ok_or(OctreeError::Closed)?;

        if header.data_count > 0 && header.data_size != data_size {
            return Err(OctreeError::InvalidOperation(format!(
                "cannot change data_size from {} to {} with {} records stored",
                header.data_size, data_size, header.data_count
            )));
        }

        files.data.set_record_size(record_len(data_size)?);
        header.data_size = data_size;
        Ok(())
    }

    pub fn set_grid(&self, grid: [u32; 3]) {
        self.inner.lock().header.grid = grid;
    }

    pub fn add_data_descriptor(&self, descriptor: DataDescriptor) {
        self.inner.lock().header.data_descriptors.push(descriptor);
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    pub fn read_node_at(&self, index: u64) -> OctreeResult<OctreeNode> {
        let mut guard = self.inner.lock();
        let OctreeFileInner { files, header } = &mut *guard;
        let files = files.as_mut().ok_or(OctreeError::Closed)?;

        check_index(index, header.node_count)?;
        let record = files.nodes.read_record(index)?;
        OctreeNode::decode(&record)
    }

    /// Writes `node` at the end of the node array and returns its index.
    pub fn append_node(&self, node: &OctreeNode) -> OctreeResult<u64> {
        let mut guard = self.inner.lock();
        let OctreeFileInner { files, header } = &mut *guard;
        let files = files.as_mut().ok_or(OctreeError::Closed)?;

        files.nodes.append_record(&node.encode()?)?;
        header.node_count += 1;
        Ok(header.node_count - 1)
    }

    /// Overwrites the node at `index`, typically to backpatch a parent once
    /// its children have been appended.
    pub fn write_node_at(&self, node: &OctreeNode, index: u64) -> OctreeResult<()> {
        let mut guard = self.inner.lock();
        let OctreeFileInner { files, header } = &mut *guard;
        let files = files.as_mut().ok_or(OctreeError::Closed)?;

        check_index(index, header.node_count)?;
        files.nodes.write_record(index, &node.encode()?)
    }

    /// Reads every counted node in index order.
    pub fn nodes(&self) -> impl Iterator<Item = OctreeResult<OctreeNode>> + '_ {
        (0..self.node_count()).map(move |index| self.read_node_at(index))
    }

    /// Visits every node reachable from `root` in depth-first pre-order,
    /// children in increasing slot order. The visitor receives the node
    /// index, the node and its depth below `root`.
    pub fn walk<F>(&self, root: u64, mut visitor: F) -> OctreeResult<()>
    where
        F: FnMut(u64, &OctreeNode, u32) -> OctreeResult<()>,
    {
        let limit = self.node_count();
        let mut visited = 0u64;
        let mut stack = vec![(root, 0u32)];

        while let Some((index, depth)) = stack.pop() {
            visited += 1;
            if visited > limit {
                return Err(OctreeError::InvalidOperation(format!(
                    "walk from node {} visited more nodes than the file holds",
                    root
                )));
            }

            let node = self.read_node_at(index)?;
            visitor(index, &node, depth)?;

            let children: Vec<_> = node.children().collect();
            for (_, child) in children.into_iter().rev() {
                stack.push((child as u64, depth + 1));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------

    /// Reads the payload record at `index`.
    pub fn read_data_at(&self, index: u64) -> OctreeResult<Vec<u8>> {
        let mut guard = self.inner.lock();
        let OctreeFileInner { files, header } = &mut *guard;
        let files = files.as_mut().ok_or(OctreeError::Closed)?;

        check_data_size(header)?;
        check_data_index(index, header.data_count)?;
        files.data.read_record(index)
    }

    /// Writes `record` at the end of the data array and returns its index.
    ///
    /// Index 0 is reserved: the first append to an empty array writes a
    /// zero-filled placeholder first, so payloads are numbered from 1.
    pub fn append_data(&self, record: &[u8]) -> OctreeResult<u64> {
        let mut guard = self.inner.lock();
        let OctreeFileInner { files, header } = &mut *guard;
        let files = files.as_mut().ok_or(OctreeError::Closed)?;

        check_data_size(header)?;
        check_record_len(record, header.data_size)?;

        if header.data_count == NO_DATA as u64 {
            let placeholder = vec![0u8; record.len()];
            files.data.append_record(&placeholder)?;
            header.data_count += 1;
        }

        files.data.append_record(record)?;
        header.data_count += 1;
        Ok(header.data_count - 1)
    }

    pub fn write_data_at(&self, record: &[u8], index: u64) -> OctreeResult<()> {
        let mut guard = self.inner.lock();
        let OctreeFileInner { files, header } = &mut *guard;
        let files = files.as_mut().ok_or(OctreeError::Closed)?;

        check_data_size(header)?;
        check_data_index(index, header.data_count)?;
        check_record_len(record, header.data_size)?;
        files.data.write_record(index, record)
    }

    /// Reads every payload record as `(index, bytes)`, skipping the reserved index 0.
    pub fn data_records(&self) -> impl Iterator<Item = OctreeResult<(u64, Vec<u8>)>> + '_ {
        (1..self.data_count()).map(move |index| self.read_data_at(index).map(|r| (index, r)))
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Forces all three files to durable storage.
    pub fn flush(&self) -> OctreeResult<()> {
        let mut guard = self.inner.lock();
        guard.files.as_mut().ok_or(OctreeError::Closed)?.sync()
    }

    /// Flushes and releases the files. Further calls are no-ops.
    pub fn close(&self) -> OctreeResult<()> {
        let files = self.inner.lock().files.take();
        match files {
            Some(mut files) => {
                log::debug!("Closing octree file {:?}", self.config.base_name());
                files.sync()
            }
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().files.is_none()
    }
}

impl Drop for OctreeFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!(
                "Failed to flush octree file {:?} on drop: {}",
                self.config.base_name(),
                e
            );
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn record_len(data_size: u64) -> OctreeResult<usize> {
    usize::try_from(data_size).map_err(|_| {
        OctreeError::InvalidOperation(format!("data_size {} does not fit in memory", data_size))
    })
}

fn check_index(index: u64, count: u64) -> OctreeResult<()> {
    if index >= count {
        Err(OctreeError::OutOfRange { index, count })
    } else {
        Ok(())
    }
}

fn check_data_index(index: u64, count: u64) -> OctreeResult<()> {
    if index == NO_DATA as u64 {
        return Err(OctreeError::ReservedDataIndex);
    }
    check_index(index, count)
}

fn check_data_size(header: &OctreeFileHeader) -> OctreeResult<()> {
    if header.data_size == 0 {
        return Err(OctreeError::InvalidOperation(
            "data_size is 0; set it or read the header first".to_string(),
        ));
    }
    Ok(())
}

fn check_record_len(record: &[u8], data_size: u64) -> OctreeResult<()> {
    if record.len() as u64 != data_size {
        return Err(OctreeError::RecordSizeMismatch {
            expected: data_size as usize,
            actual: record.len(),
        });
    }
    Ok(())
}

/// Warns when the record files do not hold exactly the counted records.
fn check_file_lengths(files: &OpenFiles, header: &OctreeFileHeader) -> OctreeResult<()> {
    check_record_count(&files.nodes, "Node", header.node_count)?;
    check_record_count(&files.data, "Data", header.data_count)
}

fn check_record_count(file: &RecordFile, kind: &str, counted: u64) -> OctreeResult<()> {
    let stored = file.record_count()?;
    let len = file.len_bytes()?;
    let whole = stored.saturating_mul(file.record_size() as u64);
    if stored != counted || len != whole {
        log::warn!(
            "{} file {:?} is {} bytes ({} records of {} bytes), header counts {}",
            kind,
            file.path(),
            len,
            stored,
            file.record_size(),
            counted
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_store(dir: &tempfile::TempDir, data_size: u64) -> OctreeFile {
        OctreeFile::with_config()
            .base_name(dir.path().join("test"))
            .create_if_missing(true)
            .truncate(true)
            .data_size(data_size)
            .grid([16, 16, 16])
            .open()
            .unwrap()
    }

    #[test]
    fn test_create_empty_store() {
        let dir = tempdir().unwrap();
        let store = OctreeFile::create(dir.path().join("test")).unwrap();

        assert!(dir.path().join("test.octree").exists());
        assert!(dir.path().join("test.octreenodes").exists());
        assert!(dir.path().join("test.octreedata").exists());
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.data_count(), 0);
        assert_eq!(store.grid(), [0, 0, 0]);
        store.close().unwrap();
    }

    #[test]
    fn test_open_missing_without_create() {
        let dir = tempdir().unwrap();
        let result = OctreeFile::open_or_create(dir.path().join("missing"), false);
        assert!(matches!(result, Err(OctreeError::Io(_))));
    }

    #[test]
    fn test_open_leaves_default_metadata() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("test");
        {
            let store = new_store(&dir, 4);
            store.append_node(&OctreeNode::leaf(0)).unwrap();
            store.write_header().unwrap();
        }

        let store = OctreeFile::open_or_create(&base, false).unwrap();
        assert_eq!(store.node_count(), 0);
        store.read_header().unwrap();
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.data_size(), 4);
    }

    #[test]
    fn test_append_and_read_nodes() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);

        let nodes: Vec<_> = (0..10u32)
            .map(|i| OctreeNode::new(i as u8, i * 8, i))
            .collect();
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(store.append_node(node).unwrap(), i as u64);
        }

        assert_eq!(store.node_count(), 10);
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(store.read_node_at(i as u64).unwrap(), *node);
        }

        let read: Vec<_> = store.nodes().collect::<OctreeResult<_>>().unwrap();
        assert_eq!(read, nodes);
    }

    #[test]
    fn test_read_node_out_of_range() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);
        assert!(matches!(
            store.read_node_at(0),
            Err(OctreeError::OutOfRange { index: 0, count: 0 })
        ));

        store.append_node(&OctreeNode::default()).unwrap();
        assert!(store.read_node_at(0).is_ok());
        assert!(store.read_node_at(1).unwrap_err().is_out_of_range());
    }

    #[test]
    fn test_write_node_backpatch() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);

        let root = store.append_node(&OctreeNode::default()).unwrap();
        let first = store.append_node(&OctreeNode::leaf(0)).unwrap();
        store.append_node(&OctreeNode::leaf(0)).unwrap();

        let patched = OctreeNode::new(0b1000_0001, first as u32, 0);
        store.write_node_at(&patched, root).unwrap();

        assert_eq!(store.node_count(), 3);
        assert_eq!(store.read_node_at(root).unwrap(), patched);
        assert_eq!(store.read_node_at(1).unwrap(), OctreeNode::leaf(0));
        assert_eq!(
            std::fs::metadata(dir.path().join("test.octreenodes"))
                .unwrap()
                .len(),
            3 * NODE_RECORD_SIZE as u64
        );
    }

    #[test]
    fn test_write_node_out_of_range() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);
        let result = store.write_node_at(&OctreeNode::default(), 0);
        assert!(matches!(result, Err(OctreeError::OutOfRange { .. })));
        assert_eq!(store.node_count(), 0);
    }

    #[test]
    fn test_data_indices_start_at_one() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);

        assert_eq!(store.append_data(&[1, 2, 3, 4]).unwrap(), 1);
        assert_eq!(store.append_data(&[5, 6, 7, 8]).unwrap(), 2);
        assert_eq!(store.data_count(), 3);

        assert_eq!(store.read_data_at(1).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(store.read_data_at(2).unwrap(), vec![5, 6, 7, 8]);
        assert!(matches!(
            store.read_data_at(0),
            Err(OctreeError::ReservedDataIndex)
        ));
        assert!(store.read_data_at(3).unwrap_err().is_out_of_range());

        let records: Vec<_> = store.data_records().collect::<OctreeResult<_>>().unwrap();
        assert_eq!(records, vec![(1, vec![1, 2, 3, 4]), (2, vec![5, 6, 7, 8])]);
    }

    #[test]
    fn test_write_data_in_place() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 2);

        store.append_data(&[1, 1]).unwrap();
        store.append_data(&[2, 2]).unwrap();
        store.append_data(&[3, 3]).unwrap();
        store.write_data_at(&[9, 9], 2).unwrap();

        assert_eq!(store.read_data_at(1).unwrap(), vec![1, 1]);
        assert_eq!(store.read_data_at(2).unwrap(), vec![9, 9]);
        assert_eq!(store.read_data_at(3).unwrap(), vec![3, 3]);
        assert!(matches!(
            store.write_data_at(&[0, 0], 0),
            Err(OctreeError::ReservedDataIndex)
        ));
        assert!(store.write_data_at(&[0, 0], 4).is_err());
    }

    #[test]
    fn test_data_size_enforced() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);

        assert!(matches!(
            store.append_data(&[1, 2]),
            Err(OctreeError::RecordSizeMismatch {
                expected: 4,
                actual: 2
            })
        ));
        assert_eq!(store.data_count(), 0);

        store.append_data(&[0; 4]).unwrap();
        assert!(store.write_data_at(&[0; 5], 1).is_err());
    }

    #[test]
    fn test_data_requires_data_size() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 0);

        assert!(matches!(
            store.append_data(&[]),
            Err(OctreeError::InvalidOperation(_))
        ));

        store.set_data_size(3).unwrap();
        assert_eq!(store.append_data(&[7, 8, 9]).unwrap(), 1);
        assert!(store.set_data_size(4).is_err());
        assert!(store.set_data_size(3).is_ok());
    }

    #[test]
    fn test_header_round_trip() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("test");
        {
            let store = new_store(&dir, 8);
            store.set_grid([128, 64, 32]);
            store.add_data_descriptor(DataDescriptor::new("morton", 0, 8).unwrap());
            store.append_node(&OctreeNode::new(1, 1, 0)).unwrap();
            store.append_node(&OctreeNode::leaf(1)).unwrap();
            store.append_data(&[1; 8]).unwrap();
            store.write_header().unwrap();
            store.close().unwrap();
        }

        let store = OctreeFile::open(&base).unwrap();
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.data_count(), 2);
        assert_eq!(store.data_size(), 8);
        assert_eq!(store.grid(), [128, 64, 32]);
        assert_eq!(
            store.data_descriptor("morton"),
            Some(DataDescriptor::new("morton", 0, 8).unwrap())
        );
        assert_eq!(store.read_node_at(1).unwrap(), OctreeNode::leaf(1));
        assert_eq!(store.read_data_at(1).unwrap(), vec![1; 8]);
    }

    #[test]
    fn test_write_header_truncates() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);
        for i in 0..5 {
            let name = format!("field_{}", i);
            store.add_data_descriptor(DataDescriptor::new(&name, i, i + 1).unwrap());
        }
        store.write_header().unwrap();
        let long = std::fs::read_to_string(dir.path().join("test.octree")).unwrap();

        let store2 = OctreeFile::open_or_create(dir.path().join("test"), false).unwrap();
        store2.write_header().unwrap();
        let short = std::fs::read_to_string(dir.path().join("test.octree")).unwrap();

        assert!(short.len() < long.len());
        assert_eq!(short, OctreeFileHeader::default().to_string());
    }

    #[test]
    fn test_malformed_header_keeps_metadata() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("test");
        let store = new_store(&dir, 4);
        store.append_node(&OctreeNode::default()).unwrap();

        std::fs::write(dir.path().join("test.octree"), "#voxels 1\nnode_count 9\nEND\n").unwrap();
        let result = store.read_header();
        assert!(matches!(result, Err(OctreeError::MalformedHeader(_))));
        assert_eq!(store.node_count(), 1);
        assert_eq!(store.data_size(), 4);

        let fresh = OctreeFile::open_or_create(&base, false).unwrap();
        assert!(fresh.read_header().unwrap_err().is_malformed_header());
        assert_eq!(fresh.node_count(), 0);
    }

    #[test]
    fn test_binary_header_is_malformed() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);
        std::fs::write(dir.path().join("test.octree"), [0xFFu8, 0xFE, 0x00]).unwrap();
        assert!(store.read_header().unwrap_err().is_malformed_header());
    }

    #[test]
    fn test_walk_pre_order() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);

        // 0: root with children in slots 1 and 6
        // 1: slot 1, children in slots 0 and 7
        // 2: slot 6, leaf
        // 3, 4: children of node 1
        store.append_node(&OctreeNode::new(0b0100_0010, 1, 0)).unwrap();
        store.append_node(&OctreeNode::new(0b1000_0001, 3, 0)).unwrap();
        store.append_node(&OctreeNode::leaf(0)).unwrap();
        store.append_node(&OctreeNode::leaf(0)).unwrap();
        store.append_node(&OctreeNode::leaf(0)).unwrap();

        let mut visits = Vec::new();
        store
            .walk(0, |index, _, depth| {
                visits.push((index, depth));
                Ok(())
            })
            .unwrap();

        assert_eq!(visits, vec![(0, 0), (1, 1), (3, 2), (4, 2), (2, 1)]);
    }

    #[test]
    fn test_walk_detects_cycles() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);
        store.append_node(&OctreeNode::new(0b1, 0, 0)).unwrap();

        let result = store.walk(0, |_, _, _| Ok(()));
        assert!(matches!(result, Err(OctreeError::InvalidOperation(_))));
    }

    #[test]
    fn test_walk_stops_on_visitor_error() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);
        store.append_node(&OctreeNode::new(0b11, 1, 0)).unwrap();
        store.append_node(&OctreeNode::leaf(0)).unwrap();
        store.append_node(&OctreeNode::leaf(0)).unwrap();

        let mut seen = 0;
        let result = store.walk(0, |index, _, _| {
            seen += 1;
            if index == 1 {
                Err(OctreeError::InvalidOperation("stop".into()))
            } else {
                Ok(())
            }
        });
        assert!(result.is_err());
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);

        assert!(!store.is_closed());
        store.close().unwrap();
        assert!(store.is_closed());
        store.close().unwrap();
        store.close().unwrap();
    }

    #[test]
    fn test_closed_store_errors() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);
        store.append_node(&OctreeNode::default()).unwrap();
        store.close().unwrap();

        assert!(matches!(store.read_node_at(0), Err(OctreeError::Closed)));
        assert!(matches!(
            store.append_node(&OctreeNode::default()),
            Err(OctreeError::Closed)
        ));
        assert!(matches!(store.append_data(&[0; 4]), Err(OctreeError::Closed)));
        assert!(matches!(store.read_header(), Err(OctreeError::Closed)));
        assert!(matches!(store.write_header(), Err(OctreeError::Closed)));
        assert!(matches!(store.flush(), Err(OctreeError::Closed)));

        // metadata stays readable
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_flush() {
        let dir = tempdir().unwrap();
        let store = new_store(&dir, 4);
        store.append_node(&OctreeNode::leaf(0)).unwrap();
        store.flush().unwrap();

        let len = std::fs::metadata(dir.path().join("test.octreenodes"))
            .unwrap()
            .len();
        assert_eq!(len, NODE_RECORD_SIZE as u64);
    }

    #[test]
    fn test_drop_releases_files() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("test");
        {
            let store = new_store(&dir, 4);
            store.append_node(&OctreeNode::leaf(0)).unwrap();
            store.write_header().unwrap();
        }

        let store = OctreeFile::open(&base).unwrap();
        assert_eq!(store.node_count(), 1);
    }
}
