use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use coap_core::fs::{File as CoreFile, FileSystem};

/// Files rooted under one base directory, grounded on spec section 1's
/// "assumed: a random-access byte-oriented file interface".
#[derive(Debug, Clone)]
pub struct DirFs {
  root: PathBuf,
}

impl DirFs {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn path_for(&self, name: &str) -> PathBuf {
    self.root.join(name)
  }
}

#[derive(Debug)]
pub struct DiskFile(std::fs::File);

impl CoreFile for DiskFile {
  type Error = io::Error;

  fn size(&self) -> Result<u64, Self::Error> {
    Ok(self.0.metadata()?.len())
  }

  fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, Self::Error> {
    self.0.seek(SeekFrom::Start(offset))?;
    let mut total = 0;
    while total < buf.len() {
      match self.0.read(&mut buf[total..]) {
        | Ok(0) => break,
        | Ok(n) => total += n,
        | Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
        | Err(e) => return Err(e),
      }
    }
    Ok(total)
  }

  fn append(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
    self.0.seek(SeekFrom::End(0))?;
    self.0.write_all(bytes)
  }

  fn truncate(&mut self) -> Result<(), Self::Error> {
    self.0.set_len(0)?;
    self.0.seek(SeekFrom::Start(0))?;
    Ok(())
  }
}

impl FileSystem for DirFs {
  type File = DiskFile;
  type Error = io::Error;

  fn open(&self, name: &str) -> Result<Self::File, Self::Error> {
    OpenOptions::new().read(true)
                       .write(true)
                       .open(self.path_for(name))
                       .map(DiskFile)
  }

  fn create(&self, name: &str) -> Result<Self::File, Self::Error> {
    OpenOptions::new().read(true)
                       .write(true)
                       .create(true)
                       .open(self.path_for(name))
                       .map(DiskFile)
  }
}
