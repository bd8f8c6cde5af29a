use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rand::Rng;
use svo_store::errors::OctreeResult;
use svo_store::{DataDescriptor, OctreeFile, OctreeNode};
use tempfile::TempDir;

/// Size of the payload written by [`build_random_octree`]: the leaf's node index as u64
pub const LEAF_DATA_SIZE: u64 = 8;

/// A scratch directory holding one octree base name.
pub struct TestContext {
    dir: TempDir,
    base_name: PathBuf,
}

impl TestContext {
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn base_name(&self) -> &Path {
        &self.base_name
    }

    pub fn header_path(&self) -> PathBuf {
        self.dir.path().join("test.octree")
    }

    /// A new empty store with `data_size` bytes per payload record
    pub fn create_store(&self, data_size: u64) -> OctreeResult<OctreeFile> {
        OctreeFile::with_config()
            .base_name(&self.base_name)
            .create_if_missing(true)
            .truncate(true)
            .data_size(data_size)
            .open()
    }

    /// Reopens the store and loads its header
    pub fn reopen_store(&self) -> OctreeResult<OctreeFile> {
        OctreeFile::open(&self.base_name)
    }
}

pub fn create_test_context() -> OctreeResult<TestContext> {
    let dir = tempfile::tempdir()?;
    let base_name = dir.path().join("test");
    Ok(TestContext { dir, base_name })
}

/// Builds a random sparse octree `depth` levels deep, breadth first.
///
/// Each parent is appended as a placeholder, its children are appended as a
/// contiguous run, then the parent is backpatched. Leaves at the last level
/// carry a payload holding their own node index. Returns the nodes in index
/// order as they were written.
pub fn build_random_octree<R: Rng>(
    store: &OctreeFile,
    depth: u32,
    rng: &mut R,
) -> OctreeResult<Vec<OctreeNode>> {
    store.set_data_size(LEAF_DATA_SIZE)?;
    store.set_grid([1 << depth; 3]);
    store.add_data_descriptor(DataDescriptor::new("node_index", 0, 8)?);

    let mut written = Vec::new();
    let root = store.append_node(&OctreeNode::default())?;
    written.push(OctreeNode::default());

    let mut queue = VecDeque::from([(root, 0u32)]);
    while let Some((index, level)) = queue.pop_front() {
        let node = if level == depth {
            let data = store.append_data(&index.to_le_bytes())?;
            OctreeNode::leaf(data as u32)
        } else {
            let mask: u8 = rng.gen_range(1..=255);
            let base = store.node_count();
            for _ in 0..mask.count_ones() {
                let child = store.append_node(&OctreeNode::default())?;
                written.push(OctreeNode::default());
                queue.push_back((child, level + 1));
            }
            OctreeNode::new(mask, base as u32, 0)
        };

        store.write_node_at(&node, index)?;
        written[index as usize] = node;
    }

    Ok(written)
}
