
pub mod file;

use std::sync::{Arc, Mutex};

use log::{debug, trace};

use crate::{
    console::Console,
    fs::{self, Filesystem, node::NodeRef},
};
use file::{FileDescription, FileDescriptor, FileTarget, OpenFileTable};

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the syscall surface. Each is a distinct, recoverable
/// condition; the `sys_*` boundary collapses all of them to `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Fs(fs::Error),
    TooManyOpen,
    InvalidHandle,
    NotReadable,
    NotWritable,
    BadArgument,
}

impl From<fs::Error> for Error {
    fn from(err: fs::Error) -> Self {
        Self::Fs(err)
    }
}

impl From<Error> for libc::c_int {
    fn from(err: Error) -> Self {
        match err {
            Error::Fs(err) => err.into(),
            Error::TooManyOpen => libc::EMFILE,
            Error::InvalidHandle => libc::EBADF,
            Error::NotReadable => libc::EBADF,
            Error::NotWritable => libc::EBADF,
            Error::BadArgument => libc::EINVAL,
        }
    }
}

/// One process's view of the syscall surface: a shared name directory, a
/// private descriptor table, and the console bound to handles 0 and 1.
pub struct Kernel {
    fs: Arc<Filesystem>,
    console: Arc<dyn Console>,
    files: Mutex<OpenFileTable>,
}

impl Kernel {
    pub fn new(fs: Arc<Filesystem>, console: Arc<dyn Console>) -> Self {
        Self {
            fs,
            console,
            files: Mutex::new(OpenFileTable::new()),
        }
    }

    pub fn filesystem(&self) -> &Arc<Filesystem> {
        &self.fs
    }

    /// Creates `name`, truncating it if it already exists, and opens it.
    pub fn creat(&self, name: &str) -> Result<FileDescriptor> {
        let node = self.fs.create(name)?;
        let fd = self.install(node)?;
        debug!("creat {name:?} -> fd {fd}");
        Ok(fd)
    }

    /// Opens an existing `name`.
    pub fn open(&self, name: &str) -> Result<FileDescriptor> {
        let node = self.fs.open(name)?;
        let fd = self.install(node)?;
        debug!("open {name:?} -> fd {fd}");
        Ok(fd)
    }

    /// Binds an acquired node to a fresh descriptor, undoing the
    /// acquisition if the table is full.
    fn install(&self, node: NodeRef) -> Result<FileDescriptor> {
        let mut files = self.files.lock().unwrap();
        let description = FileDescription::new(FileTarget::File(NodeRef::clone(&node)));
        match files.allocate(description) {
            Ok(fd) => Ok(fd),
            Err(err) => {
                drop(files);
                node.release();
                Err(err)
            }
        }
    }

    /// Reads up to `buf.len()` bytes from `fd` into `buf`. Zero on a file
    /// handle is end-of-file; on the console it is end of input. Neither
    /// is a failure.
    pub fn read(&self, fd: FileDescriptor, buf: &mut [u8]) -> Result<usize> {
        let mut files = self.files.lock().unwrap();
        let description = files.get_mut(fd)?;
        match description.target() {
            FileTarget::File(node) => {
                let node = NodeRef::clone(node);
                let count = node.read_at(description.offset, buf);
                description.offset += count as u64;
                trace!("read fd {fd}: {count} bytes");
                Ok(count)
            }
            FileTarget::ConsoleInput => {
                // The device may park the caller; the table must not stay
                // locked while it does.
                drop(files);
                Ok(self.console.read(buf))
            }
            FileTarget::ConsoleOutput => Err(Error::NotReadable),
        }
    }

    /// Writes `buf` to `fd`, returning how many bytes were transferred.
    pub fn write(&self, fd: FileDescriptor, buf: &[u8]) -> Result<usize> {
        let mut files = self.files.lock().unwrap();
        let description = files.get_mut(fd)?;
        match description.target() {
            FileTarget::File(node) => {
                let node = NodeRef::clone(node);
                let count = node.write_at(description.offset, buf);
                description.offset += count as u64;
                trace!("write fd {fd}: {count} bytes");
                Ok(count)
            }
            FileTarget::ConsoleOutput => {
                drop(files);
                Ok(self.console.write(buf))
            }
            FileTarget::ConsoleInput => Err(Error::NotWritable),
        }
    }

    /// Closes `fd`. Closing the last descriptor of an unlinked file
    /// releases its storage.
    pub fn close(&self, fd: FileDescriptor) -> Result<()> {
        let description = self.files.lock().unwrap().release(fd)?;
        if let FileTarget::File(node) = description.into_target() {
            node.release();
        }
        debug!("close fd {fd}");
        Ok(())
    }

    /// Removes `name` from the directory. Descriptors already open against
    /// it keep working until they close.
    pub fn unlink(&self, name: &str) -> Result<()> {
        self.fs.remove(name)?;
        debug!("unlink {name:?}");
        Ok(())
    }

    // C-style boundary: identical semantics, every failure is `-1`.

    pub fn sys_creat(&self, name: &str) -> i32 {
        sentinel(self.creat(name).map(|fd| fd as i32))
    }

    pub fn sys_open(&self, name: &str) -> i32 {
        sentinel(self.open(name).map(|fd| fd as i32))
    }

    pub fn sys_read(&self, fd: i32, buf: &mut [u8], len: i32) -> i32 {
        let result = checked_io(fd, len, buf.len())
            .and_then(|(fd, len)| self.read(fd, &mut buf[..len]));
        sentinel(result.map(|count| count as i32))
    }

    pub fn sys_write(&self, fd: i32, buf: &[u8], len: i32) -> i32 {
        let result =
            checked_io(fd, len, buf.len()).and_then(|(fd, len)| self.write(fd, &buf[..len]));
        sentinel(result.map(|count| count as i32))
    }

    pub fn sys_close(&self, fd: i32) -> i32 {
        if fd < 0 {
            return sentinel(Err(Error::InvalidHandle));
        }
        sentinel(self.close(fd as FileDescriptor).map(|()| 0))
    }

    pub fn sys_unlink(&self, name: &str) -> i32 {
        sentinel(self.unlink(name).map(|()| 0))
    }
}

fn checked_io(fd: i32, len: i32, buf_len: usize) -> Result<(FileDescriptor, usize)> {
    if fd < 0 {
        return Err(Error::InvalidHandle);
    }
    if len < 0 || len as usize > buf_len {
        return Err(Error::BadArgument);
    }
    Ok((fd as FileDescriptor, len as usize))
}

fn sentinel(result: Result<i32>) -> i32 {
    match result {
        Ok(value) => value,
        Err(err) => {
            debug!("syscall failed: {err:?} (errno {})", libc::c_int::from(err));
            -1
        }
    }
}
