use core::fmt::Debug;

/// A random-access, byte-oriented file, per spec section 1's assumed
/// "physical storage... supporting open/read/seek/append/size".
pub trait File {
  type Error: Debug;

  /// Total size of the file in bytes.
  fn size(&self) -> Result<u64, Self::Error>;

  /// Read up to `buf.len()` bytes starting at `offset`, returning the
  /// number of bytes actually read (fewer than `buf.len()` at EOF).
  fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error>;

  /// Append `bytes` to the end of the file.
  fn append(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

  /// Truncate the file to zero length, ready to be written from scratch.
  fn truncate(&mut self) -> Result<(), Self::Error>;
}

/// Opens named files on request. Resources hold no file handles between
/// requests; each operation opens what it needs and lets it drop.
pub trait FileSystem {
  type File: File<Error = Self::Error>;
  type Error: Debug;

  fn open(&self, name: &str) -> Result<Self::File, Self::Error>;

  /// Open for write, creating the file if it doesn't exist.
  fn create(&self, name: &str) -> Result<Self::File, Self::Error>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod test {
  use std::cell::RefCell;
  use std::collections::HashMap;
  use std::rc::Rc;

  use super::*;

  /// The named file has never been created - returned by [`InMemoryFs::open`],
  /// mirroring [`DirFs::open`](crate::fs)'s real `NotFound` behavior instead
  /// of auto-vivifying the entry.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct NotFound;

  #[derive(Debug, Clone, Default)]
  pub struct InMemoryFs(pub Rc<RefCell<HashMap<String, Vec<u8>>>>);

  impl InMemoryFs {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn with_file(name: &str, contents: &[u8]) -> Self {
      let fs = Self::new();
      fs.0.borrow_mut().insert(name.to_string(), contents.to_vec());
      fs
    }
  }

  #[derive(Debug)]
  pub struct InMemoryFile {
    fs: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    name: String,
  }

  impl File for InMemoryFile {
    type Error = NotFound;

    fn size(&self) -> Result<u64, Self::Error> {
      Ok(self.fs.borrow().get(&self.name).map(|v| v.len() as u64).unwrap_or(0))
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error> {
      let fs = self.fs.borrow();
      let contents = fs.get(&self.name).map(|v| v.as_slice()).unwrap_or(&[]);
      let offset = offset as usize;
      if offset >= contents.len() {
        return Ok(0);
      }
      let n = (contents.len() - offset).min(buf.len());
      buf[..n].copy_from_slice(&contents[offset..offset + n]);
      Ok(n)
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
      self.fs.borrow_mut().entry(self.name.clone()).or_default().extend_from_slice(bytes);
      Ok(())
    }

    fn truncate(&mut self) -> Result<(), Self::Error> {
      self.fs.borrow_mut().entry(self.name.clone()).or_default().clear();
      Ok(())
    }
  }

  impl FileSystem for InMemoryFs {
    type File = InMemoryFile;
    type Error = NotFound;

    fn open(&self, name: &str) -> Result<Self::File, Self::Error> {
      if !self.0.borrow().contains_key(name) {
        return Err(NotFound);
      }
      Ok(InMemoryFile { fs: self.0.clone(), name: name.to_string() })
    }

    fn create(&self, name: &str) -> Result<Self::File, Self::Error> {
      self.0.borrow_mut().entry(name.to_string()).or_default();
      Ok(InMemoryFile { fs: self.0.clone(), name: name.to_string() })
    }
  }
}
