//! Shared access to a document across threads.
//!
//! [`SharedDocument`] puts a [`Document`] behind a single-writer,
//! multiple-reader lock. Queries and other reads run concurrently; edits
//! take the lock exclusively, so a query never observes a half-applied
//! edit.
//!
//! ```
//! use std::thread;
//! use xmlsift::sync::SharedDocument;
//! use xmlsift::Document;
//!
//! let shared = SharedDocument::new(Document::parse_str("<r><i/></r>").unwrap());
//! let reader = shared.clone();
//! let handle = thread::spawn(move || reader.read(|doc| doc.xpath("//i").unwrap().len()));
//! assert_eq!(handle.join().unwrap(), 1);
//! ```

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

use crate::error::Result;
use crate::tree::Document;
use crate::xpath::{NodeSet, XPathValue};

/// A cloneable handle to a document shared between threads.
///
/// Clones share the same document. A panic inside [`write`](Self::write)
/// poisons the lock; the next access recovers it, since every edit either
/// completes or fails before changing the tree.
#[derive(Debug, Clone, Default)]
pub struct SharedDocument {
    inner: Arc<RwLock<Document>>,
}

impl SharedDocument {
    #[must_use]
    pub fn new(doc: Document) -> Self {
        Self {
            inner: Arc::new(RwLock::new(doc)),
        }
    }

    /// Runs `f` with shared read access. Readers do not block each other.
    pub fn read<T>(&self, f: impl FnOnce(&Document) -> T) -> T {
        f(&self.read_guard())
    }

    /// Runs `f` with exclusive access.
    pub fn write<T>(&self, f: impl FnOnce(&mut Document) -> T) -> T {
        f(&mut self.write_guard())
    }

    /// Evaluates an expression at the document node under a read lock.
    ///
    /// # Errors
    ///
    /// As for [`Document::eval`].
    pub fn query(&self, expr: &str) -> Result<XPathValue> {
        self.read(|doc| doc.eval(expr))
    }

    /// Selects nodes at the document node under a read lock.
    ///
    /// # Errors
    ///
    /// As for [`Document::xpath`].
    pub fn select(&self, expr: &str) -> Result<NodeSet> {
        self.read(|doc| doc.xpath(expr))
    }

    /// Takes the document back if this is the last handle, or returns the
    /// handle unchanged.
    ///
    /// # Errors
    ///
    /// Returns `self` when other handles still exist.
    pub fn try_unwrap(self) -> std::result::Result<Document, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(lock) => Ok(lock.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(inner) => Err(Self { inner }),
        }
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Document> {
        self.inner.read().unwrap_or_else(|poisoned| {
            warn!("recovering shared document after a writer panicked");
            poisoned.into_inner()
        })
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Document> {
        self.inner.write().unwrap_or_else(|poisoned| {
            warn!("recovering shared document after a writer panicked");
            poisoned.into_inner()
        })
    }
}

impl From<Document> for SharedDocument {
    fn from(doc: Document) -> Self {
        Self::new(doc)
    }
}
