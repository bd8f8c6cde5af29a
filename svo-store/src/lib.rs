//! # SVO Store - On-Disk Sparse Voxel Octrees
//!
//! This crate stores a sparse voxel octree in three coordinated files that
//! share a base name:
//!
//! - `<base>.octree` - ASCII header: counts, grid size and payload field descriptors
//! - `<base>.octreenodes` - fixed-size node records (childmask, children_base, data)
//! - `<base>.octreedata` - fixed-size payload records of `data_size` bytes
//!
//! ## Features
//!
//! - **Compact Nodes**: 9 bytes per node regardless of child count
//! - **Rank Addressing**: child positions computed from the childmask, no per-child pointers
//! - **Random Access**: every record lives at `index * record_size`
//! - **Append & Backpatch**: parents can be written first and patched once children exist
//! - **Tolerant Header**: unknown keywords and a missing end marker only log warnings
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use svo_store::{OctreeFile, OctreeNode};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = OctreeFile::with_config()
//!     .base_name("bunny")
//!     .create_if_missing(true)
//!     .truncate(true)
//!     .data_size(4)
//!     .grid([2, 2, 2])
//!     .open()?;
//!
//! // Parent first, children later, then backpatch the parent.
//! let root = store.append_node(&OctreeNode::default())?;
//! let payload = store.append_data(&[255, 0, 0, 255])?;
//! let first = store.append_node(&OctreeNode::leaf(payload as u32))?;
//! store.append_node(&OctreeNode::leaf(payload as u32))?;
//! store.write_node_at(&OctreeNode::new(0b0000_0101, first as u32, 0), root)?;
//!
//! store.write_header()?;
//! store.close()?;
//!
//! let store = OctreeFile::open("bunny")?;
//! let root = store.read_node_at(0)?;
//! assert_eq!(root.child_index(2)?, 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod descriptor;
pub mod errors;
pub mod header;
pub mod node;
pub mod octree_file;
pub mod record_file;

pub use config::{base_name_from_location, OctreeFileBuilder, OctreeFileConfig};
pub use descriptor::DataDescriptor;
pub use errors::{OctreeError, OctreeResult};
pub use header::OctreeFileHeader;
pub use node::{Children, OctreeNode};
pub use octree_file::OctreeFile;
