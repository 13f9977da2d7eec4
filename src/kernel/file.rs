use std::collections::BTreeMap;

use crate::fs::node::NodeRef;
use crate::kernel::{Error, Result};

/// A unique id used to track opened files.
pub type FileDescriptor = usize;

/// Handle bound to console input at process start.
pub const CONSOLE_INPUT: FileDescriptor = 0;

/// Handle bound to console output at process start.
pub const CONSOLE_OUTPUT: FileDescriptor = 1;

/// How many descriptors a process can hold open at once, console bindings
/// included.
pub const OPEN_FILE_MAX: usize = 16;

/// What a descriptor points at.
pub enum FileTarget {
    ConsoleInput,
    ConsoleOutput,
    File(NodeRef),
}

/// A unique handle to an open file.
pub struct FileDescription {
    target: FileTarget,
    pub offset: u64,
}

impl FileDescription {
    /// Creates a new description with its cursor at the start.
    pub fn new(target: FileTarget) -> Self {
        Self { target, offset: 0 }
    }

    pub fn target(&self) -> &FileTarget {
        &self.target
    }

    pub fn into_target(self) -> FileTarget {
        self.target
    }
}

/// Tracks opened files.
///
/// Handles 0 and 1 are bound to the console when the table is built and are
/// never handed out by [OpenFileTable::allocate]; closing one only drops
/// this process's binding.
pub struct OpenFileTable {
    entries: BTreeMap<FileDescriptor, FileDescription>,
}

impl OpenFileTable {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            CONSOLE_INPUT,
            FileDescription::new(FileTarget::ConsoleInput),
        );
        entries.insert(
            CONSOLE_OUTPUT,
            FileDescription::new(FileTarget::ConsoleOutput),
        );
        Self { entries }
    }

    /// Binds `description` to the lowest free handle above the console
    /// pair.
    pub fn allocate(&mut self, description: FileDescription) -> Result<FileDescriptor> {
        if self.entries.len() >= OPEN_FILE_MAX {
            return Err(Error::TooManyOpen);
        }
        let fd = (CONSOLE_OUTPUT + 1..)
            .find(|fd| !self.entries.contains_key(fd))
            .expect("a table below capacity has a free handle");
        self.entries.insert(fd, description);
        Ok(fd)
    }

    pub fn get_mut(&mut self, fd: FileDescriptor) -> Result<&mut FileDescription> {
        self.entries.get_mut(&fd).ok_or(Error::InvalidHandle)
    }

    /// Unbinds `fd` and hands the description back, so the caller can
    /// release the underlying file reference.
    pub fn release(&mut self, fd: FileDescriptor) -> Result<FileDescription> {
        self.entries.remove(&fd).ok_or(Error::InvalidHandle)
    }

    pub fn open_files(&self) -> usize {
        self.entries.len()
    }
}

impl Default for OpenFileTable {
    fn default() -> Self {
        Self::new()
    }
}
