//! Ownership-scoped access to the compound file backing a message.
//!
//! Everything else in this crate goes through [`Container`]; no other module
//! holds raw `cfb` paths or stream handles. A `Container` is a cheap clone
//! (shared backing file plus a storage path), so child handles are released
//! by ordinary drops on every exit path.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{MsgError, Result};

/// The in-memory compound file every [`Container`] handle points into.
pub(crate) type BackingFile = cfb::CompoundFile<Cursor<Vec<u8>>>;

/// Kind of a child element inside a storage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ChildKind {
    Storage,
    Stream,
}

/// One named child of a storage, as reported by [`Container::list_children`].
#[derive(Clone, Debug)]
pub struct ChildEntry {
    pub name: String,
    pub kind: ChildKind,
    pub size: u64,
}

/// A storage inside a compound file (the root storage for a top-level
/// message, or a nested storage for recipients, attachments and embedded
/// messages).
#[derive(Clone)]
pub struct Container {
    cfb: Rc<RefCell<BackingFile>>,
    path: PathBuf,
}

impl Container {
    /// Opens the root storage of a compound file held in `bytes`.
    pub fn open(bytes: Vec<u8>) -> Result<Self> {
        let cfb = cfb::CompoundFile::open(Cursor::new(bytes))
            .map_err(|err| MsgError::Format(err.to_string()))?;
        Ok(Self {
            cfb: Rc::new(RefCell::new(cfb)),
            path: PathBuf::from("/"),
        })
    }

    /// Reads a whole file into memory and opens it. Working on a private
    /// copy guarantees the source file is never modified.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Self::open(buffer)
    }

    /// The path of this storage within the compound file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when this handle is the root storage of the compound file.
    pub fn is_root(&self) -> bool {
        self.path == Path::new("/")
    }

    /// Another handle into the same backing file at an arbitrary storage
    /// path. Used to reach the top ancestor's storages from an embedded
    /// message during save.
    pub(crate) fn sibling(&self, path: PathBuf) -> Container {
        Container {
            cfb: Rc::clone(&self.cfb),
            path,
        }
    }

    /// Lists the immediate children of this storage. The order is the
    /// directory order of the compound file and is stable across calls.
    pub fn list_children(&self) -> Result<Vec<ChildEntry>> {
        let cfb = self.cfb.borrow();
        let entries = cfb
            .read_storage(&self.path)
            .map_err(|err| MsgError::from_lookup(&self.path.to_string_lossy(), err))?;
        Ok(entries
            .map(|entry| ChildEntry {
                name: entry.name().to_string(),
                kind: if entry.is_storage() {
                    ChildKind::Storage
                } else {
                    ChildKind::Stream
                },
                size: entry.len(),
            })
            .collect())
    }

    /// True when a child storage or stream with the given name exists.
    pub fn has_child(&self, name: &str) -> bool {
        self.cfb.borrow().exists(self.path.join(name))
    }

    /// Opens a child storage by name.
    pub fn open_child_storage(&self, name: &str) -> Result<Container> {
        let child = self.path.join(name);
        if !self.cfb.borrow().is_storage(&child) {
            return Err(MsgError::NotFound(name.to_string()));
        }
        Ok(Container {
            cfb: Rc::clone(&self.cfb),
            path: child,
        })
    }

    /// Reads the full contents of a child stream.
    pub fn read_stream(&self, name: &str) -> Result<Vec<u8>> {
        let child = self.path.join(name);
        let mut cfb = self.cfb.borrow_mut();
        let mut stream = cfb
            .open_stream(&child)
            .map_err(|err| MsgError::from_lookup(name, err))?;
        let mut buffer = Vec::with_capacity(stream.len() as usize);
        stream.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    /// Deep-copies every descendant storage and stream of this storage into
    /// `dest` below `dest_path`. The destination is expected to be fresh;
    /// callers discard it wholesale when this returns an error, which is what
    /// makes the copy atomic from their perspective.
    pub(crate) fn copy_subtree_into(&self, dest: &mut BackingFile, dest_path: &Path) -> Result<()> {
        if dest_path != Path::new("/") && !dest.is_storage(dest_path) {
            dest.create_storage(dest_path)?;
        }

        // Collect the walk up front so stream reads below don't contend with
        // the traversal borrow.
        let entries: Vec<(PathBuf, bool)> = {
            let cfb = self.cfb.borrow();
            let walk = cfb
                .walk_storage(&self.path)
                .map_err(|err| MsgError::from_lookup(&self.path.to_string_lossy(), err))?;
            walk.map(|entry| (entry.path().to_path_buf(), entry.is_storage()))
                .collect()
        };

        for (source_path, is_storage) in entries {
            let relative = match source_path.strip_prefix(&self.path) {
                Ok(relative) if !relative.as_os_str().is_empty() => relative.to_path_buf(),
                // The subtree root itself, already handled above.
                _ => continue,
            };
            let target = dest_path.join(&relative);
            if is_storage {
                dest.create_storage(&target)?;
            } else {
                let bytes = {
                    let mut cfb = self.cfb.borrow_mut();
                    let mut stream = cfb.open_stream(&source_path)?;
                    let mut buffer = Vec::with_capacity(stream.len() as usize);
                    stream.read_to_end(&mut buffer)?;
                    buffer
                };
                let mut stream = dest.create_stream(&target)?;
                stream.write_all(&bytes)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> Vec<u8> {
        let mut cfb = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        cfb.create_storage("/inner").unwrap();
        cfb.create_stream("/inner/data")
            .unwrap()
            .write_all(b"hello")
            .unwrap();
        cfb.create_stream("/top").unwrap().write_all(b"x").unwrap();
        cfb.flush().unwrap();
        cfb.into_inner().into_inner()
    }

    #[test]
    fn open_rejects_garbage() {
        let err = Container::open(vec![0u8; 64]).unwrap_err();
        assert!(matches!(err, MsgError::Format(_)));
    }

    #[test]
    fn list_children_is_stable() {
        let container = Container::open(sample_file()).unwrap();
        let first = container.list_children().unwrap();
        let second = container.list_children().unwrap();
        let names = |children: &[ChildEntry]| {
            children
                .iter()
                .map(|child| child.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn read_stream_and_missing_child() {
        let container = Container::open(sample_file()).unwrap();
        let inner = container.open_child_storage("inner").unwrap();
        assert_eq!(inner.read_stream("data").unwrap(), b"hello");
        assert!(matches!(
            inner.read_stream("absent").unwrap_err(),
            MsgError::NotFound(_)
        ));
        assert!(matches!(
            container.open_child_storage("nope").unwrap_err(),
            MsgError::NotFound(_)
        ));
    }

    #[test]
    fn copy_subtree_round_trips() {
        let container = Container::open(sample_file()).unwrap();
        let mut dest = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        container
            .copy_subtree_into(&mut dest, Path::new("/"))
            .unwrap();
        dest.flush().unwrap();
        let copied = Container::open(dest.into_inner().into_inner()).unwrap();
        let inner = copied.open_child_storage("inner").unwrap();
        assert_eq!(inner.read_stream("data").unwrap(), b"hello");
        assert_eq!(copied.read_stream("top").unwrap(), b"x");
    }
}
