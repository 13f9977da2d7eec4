use std::{
    collections::BTreeMap,
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use log::debug;

pub mod error;
pub mod node;

pub use error::{Error, Result};
use node::{Node, NodeRef};

/// How long a file name can be.
pub const NAME_MAX_LEN: usize = 256;

/// A flat, process-wide mapping from file names to their in-memory contents.
///
/// `create`, `open` and `remove` on the same name linearize through the
/// directory lock, so a removal never races a lookup into a half-dead node.
pub struct Filesystem {
    names: Mutex<BTreeMap<String, NodeRef>>,
    next_id: AtomicU64,
}

impl Filesystem {
    pub fn new() -> Self {
        Self {
            names: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates `name` as an empty file, truncating it if it already exists.
    ///
    /// The returned reference counts as one open reference; pair it with
    /// [Node::release].
    pub fn create(&self, name: &str) -> Result<NodeRef> {
        check_name(name)?;
        let mut names = self.names.lock().unwrap();
        let node = match names.get(name) {
            Some(node) => {
                node.truncate();
                NodeRef::clone(node)
            }
            None => {
                let node = Node::new(self.next_id.fetch_add(1, Ordering::Relaxed));
                names.insert(name.to_string(), NodeRef::clone(&node));
                node
            }
        };
        node.acquire();
        Ok(node)
    }

    /// Resolves `name` to its file.
    ///
    /// The returned reference counts as one open reference; pair it with
    /// [Node::release].
    pub fn open(&self, name: &str) -> Result<NodeRef> {
        check_name(name)?;
        let names = self.names.lock().unwrap();
        let node = names.get(name).ok_or(Error::NotFound)?;
        node.acquire();
        Ok(NodeRef::clone(node))
    }

    /// Removes the name → file mapping. The name becomes unresolvable at
    /// once; open references keep the contents alive until the last of
    /// them is released.
    pub fn remove(&self, name: &str) -> Result<()> {
        check_name(name)?;
        let mut names = self.names.lock().unwrap();
        let node = names.remove(name).ok_or(Error::NotFound)?;
        let open = node.mark_unlinked();
        if open > 0 {
            debug!("unlink {name:?} (node {}): {open} open reference(s), reclaim deferred", node.id());
        }
        Ok(())
    }

    /// Lists every live name.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().keys().cloned().collect()
    }
}

impl Default for Filesystem {
    fn default() -> Self {
        Self::new()
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > NAME_MAX_LEN {
        return Err(Error::InvalidName);
    }
    if name.contains('\0') || name.contains('/') {
        return Err(Error::InvalidName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn open_nonexistent() {
        let fs = Filesystem::new();
        assert!(matches!(fs.open("missing"), Err(Error::NotFound)));
    }

    #[test]
    fn create_then_open() {
        let fs = Filesystem::new();
        let node = fs.create("file").unwrap();
        node.write_at(0, b"data");
        node.release();

        let node = fs.open("file").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(node.read_at(0, &mut buf), 4);
        assert_eq!(&buf, b"data");
        node.release();
    }

    #[test]
    fn create_existing_truncates() {
        let fs = Filesystem::new();
        let node = fs.create("file").unwrap();
        node.write_at(0, b"data");
        node.release();

        let again = fs.create("file").unwrap();
        assert!(again.is_empty());
        again.release();
    }

    #[test]
    fn create_existing_is_same_node() {
        let fs = Filesystem::new();
        let first = fs.create("file").unwrap();
        let second = fs.create("file").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        first.release();
        second.release();
    }

    #[test]
    fn remove_nonexistent() {
        let fs = Filesystem::new();
        assert!(matches!(fs.remove("missing"), Err(Error::NotFound)));
    }

    #[test]
    fn remove_makes_name_unresolvable() {
        let fs = Filesystem::new();
        fs.create("file").unwrap().release();
        fs.remove("file").unwrap();
        assert!(matches!(fs.open("file"), Err(Error::NotFound)));
    }

    #[test]
    fn remove_defers_to_last_release() {
        let fs = Filesystem::new();
        let node = fs.create("file").unwrap();
        node.write_at(0, b"data");

        fs.remove("file").unwrap();
        let weak = Arc::downgrade(&node);

        let mut buf = [0u8; 4];
        assert_eq!(node.read_at(0, &mut buf), 4);
        assert_eq!(&buf, b"data");

        node.release();
        drop(node);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn removed_name_can_be_recreated() {
        let fs = Filesystem::new();
        let old = fs.create("file").unwrap();
        old.write_at(0, b"old");
        fs.remove("file").unwrap();

        let new = fs.create("file").unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(new.is_empty());

        // The displaced node still answers through its open reference.
        let mut buf = [0u8; 3];
        assert_eq!(old.read_at(0, &mut buf), 3);
        assert_eq!(&buf, b"old");

        old.release();
        new.release();
    }

    #[test]
    fn invalid_names() {
        let fs = Filesystem::new();
        assert!(matches!(fs.create(""), Err(Error::InvalidName)));
        assert!(matches!(fs.create("a/b"), Err(Error::InvalidName)));
        assert!(matches!(fs.create("a\0b"), Err(Error::InvalidName)));
        let long = "x".repeat(NAME_MAX_LEN + 1);
        assert!(matches!(fs.create(&long), Err(Error::InvalidName)));
    }

    #[test]
    fn names_are_listed_sorted() {
        let fs = Filesystem::new();
        for name in ["b", "a", "c"] {
            fs.create(name).unwrap().release();
        }
        assert_eq!(fs.names(), vec!["a", "b", "c"]);

        fs.remove("b").unwrap();
        assert_eq!(fs.names(), vec!["a", "c"]);
    }
}
