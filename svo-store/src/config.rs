use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::constants::{DATA_EXTENSION, HEADER_EXTENSION, NODES_EXTENSION};
use crate::descriptor::DataDescriptor;
use crate::errors::{OctreeError, OctreeResult};
use crate::header::OctreeFileHeader;
use crate::octree_file::OctreeFile;

/// Settings used to open an [`OctreeFile`].
///
/// The three files of a store share `base_name` and differ by extension.
/// `initial_header` is the metadata a store starts with before
/// [`OctreeFile::read_header`] replaces it; its counts are always zero.
#[derive(Debug, Clone, Default)]
pub struct OctreeFileConfig {
    base_name: PathBuf,
    create_if_missing: bool,
    truncate: bool,
    initial_header: OctreeFileHeader,
}

impl OctreeFileConfig {
    pub fn new(base_name: impl AsRef<Path>) -> Self {
        Self {
            base_name: base_name.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn base_name(&self) -> &Path {
        &self.base_name
    }

    pub fn create_if_missing(&self) -> bool {
        self.create_if_missing
    }

    pub fn truncate(&self) -> bool {
        self.truncate
    }

    pub fn initial_header(&self) -> &OctreeFileHeader {
        &self.initial_header
    }

    pub fn header_path(&self) -> PathBuf {
        path_with_extension(&self.base_name, HEADER_EXTENSION)
    }

    pub fn nodes_path(&self) -> PathBuf {
        path_with_extension(&self.base_name, NODES_EXTENSION)
    }

    pub fn data_path(&self) -> PathBuf {
        path_with_extension(&self.base_name, DATA_EXTENSION)
    }
}

/// Strips the final extension of any of a store's file locations,
/// e.g. `scenes/bunny.octree` becomes `scenes/bunny`.
pub fn base_name_from_location(location: impl AsRef<Path>) -> PathBuf {
    location.as_ref().with_extension("")
}

/// Appends `.extension` without replacing dots already in the base name.
fn path_with_extension(base_name: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(base_name.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Fluent builder for opening an [`OctreeFile`].
///
/// ```rust,no_run
/// use svo_store::{DataDescriptor, OctreeFile};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = OctreeFile::with_config()
///     .base_name("scenes/bunny")
///     .create_if_missing(true)
///     .data_size(4)
///     .grid([512, 512, 512])
///     .data_descriptor(DataDescriptor::new("rgba", 0, 4)?)
///     .open()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct OctreeFileBuilder {
    config: OctreeFileConfig,
}

impl OctreeFileBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path shared by the three files, without extension
    pub fn base_name(mut self, base_name: impl AsRef<Path>) -> Self {
        self.config.base_name = base_name.as_ref().to_path_buf();
        self
    }

    /// Path of any one of the store's files; the extension is dropped
    pub fn location(mut self, location: impl AsRef<Path>) -> Self {
        self.config.base_name = base_name_from_location(location);
        self
    }

    pub fn create_if_missing(mut self, create_if_missing: bool) -> Self {
        self.config.create_if_missing = create_if_missing;
        self
    }

    /// Empty all three files on open
    pub fn truncate(mut self, truncate: bool) -> Self {
        self.config.truncate = truncate;
        self
    }

    pub fn data_size(mut self, data_size: u64) -> Self {
        self.config.initial_header.data_size = data_size;
        self
    }

    pub fn grid(mut self, grid: [u32; 3]) -> Self {
        self.config.initial_header.grid = grid;
        self
    }

    pub fn data_descriptor(mut self, descriptor: DataDescriptor) -> Self {
        self.config.initial_header.data_descriptors.push(descriptor);
        self
    }

    pub fn build(self) -> OctreeResult<OctreeFileConfig> {
        if self.config.base_name.as_os_str().is_empty() {
            return Err(OctreeError::InvalidOperation(
                "octree file base name is not set".to_string(),
            ));
        }
        Ok(self.config)
    }

    pub fn open(self) -> OctreeResult<OctreeFile> {
        OctreeFile::open_with_config(self.build()?)
    }
}
