//! Constants for the octree file format.

/// Extension of the ASCII header file
pub const HEADER_EXTENSION: &str = "octree";

/// Extension of the binary node array
pub const NODES_EXTENSION: &str = "octreenodes";

/// Extension of the binary data array
pub const DATA_EXTENSION: &str = "octreedata";

/// First token of every header file
pub const HEADER_MAGIC: &str = "#octree";

/// Format version written after the magic token
pub const HEADER_VERSION: &str = "1";

/// Marks the end of the header keyword list
pub const HEADER_END: &str = "END";

/// Alternate end marker, accepted when reading
pub const HEADER_END_ALT: &str = "#END";

/// `children_base` value of a node without children
pub const NO_CHILDREN: u32 = 0;

/// `data` value of a node without payload. Data index 0 never holds a real record.
pub const NO_DATA: u32 = 0;

/// Size in bytes of one encoded node: childmask (u8) + children_base (u32) + data (u32)
pub const NODE_RECORD_SIZE: usize = 1 + std::mem::size_of::<u32>() + std::mem::size_of::<u32>();

/// Number of child slots per node
pub const CHILD_SLOTS: u8 = 8;
