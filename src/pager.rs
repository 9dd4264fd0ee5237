//! Pager: read/write one 4096-byte page at a time against a single open file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::{debug, trace};

use crate::error::Result;
use crate::page::{zeroed_page, RawPage, PageNo, PAGE_SIZE};

#[derive(Debug)]
pub struct Pager {
    file: File,
}

fn seek_addr(page_no: PageNo) -> SeekFrom {
    SeekFrom::Start(page_no * PAGE_SIZE as u64)
}

impl Pager {
    /// Open an existing database file for read+write. Per the minimal core
    /// contract the file must already exist; callers that want
    /// create-on-open ergonomics should use [`Pager::open_or_create`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Pager { file })
    }

    /// Open `path`, creating it (and returning `true` for "freshly created")
    /// if it does not already exist.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let existed = path.as_ref().exists();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok((Pager { file }, !existed))
    }

    /// Read exactly one page. Fails (via `Err`) on a short read, e.g. a page
    /// number beyond the end of the file.
    pub fn read(&mut self, page_no: PageNo) -> Result<RawPage> {
        let mut buf = zeroed_page();
        self.file.seek(seek_addr(page_no))?;
        self.file.read_exact(&mut buf)?;
        trace!("pager: read page {page_no}");
        Ok(buf)
    }

    /// Write one page and flush it to the OS before returning. This flush is
    /// the engine's durability contract: once `write` returns, the bytes
    /// have left user space.
    pub fn write(&mut self, page_no: PageNo, buf: &RawPage) -> Result<()> {
        self.file.seek(seek_addr(page_no))?;
        self.file.write_all(buf)?;
        self.file.flush()?;
        debug!("pager: wrote page {page_no}");
        Ok(())
    }
}
