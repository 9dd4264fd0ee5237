//! Space Manager: allocates and frees pages using a free list rooted in the
//! header page.

use std::path::Path;

use log::{debug, trace};

use crate::error::Result;
use crate::page::{
    FreePage, HeaderPage, PageCodec, PageNo, RawPage, HEADER_PAGE_NO, NULL_PAGE,
};
use crate::pager::Pager;

pub struct SpaceManager {
    pager: Pager,
}

impl SpaceManager {
    /// Open an existing database file, or create and initialize a fresh one
    /// (header page only, empty tree) if it does not yet exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (mut pager, created) = Pager::open_or_create(path)?;
        if created {
            let mut space = SpaceManager { pager };
            space.write_header(&HeaderPage::fresh())?;
            return Ok(space);
        }
        // Touch the header once so a corrupt/zero-length file fails fast.
        let _ = pager.read(HEADER_PAGE_NO)?;
        Ok(SpaceManager { pager })
    }

    pub fn read_header(&mut self) -> Result<HeaderPage> {
        let buf = self.pager.read(HEADER_PAGE_NO)?;
        HeaderPage::decode(HEADER_PAGE_NO, &buf)
    }

    pub fn write_header(&mut self, header: &HeaderPage) -> Result<()> {
        let mut buf = [0u8; crate::page::PAGE_SIZE];
        header.encode(&mut buf);
        self.pager.write(HEADER_PAGE_NO, &buf)
    }

    pub fn read_page<T: PageCodec>(&mut self, page_no: PageNo) -> Result<T> {
        let buf = self.pager.read(page_no)?;
        T::decode(page_no, &buf)
    }

    /// Read a page's raw bytes without committing to a type, so the caller
    /// can inspect the shared `is_leaf` tag and pick the right `PageCodec`.
    pub fn read_raw(&mut self, page_no: PageNo) -> Result<RawPage> {
        self.pager.read(page_no)
    }

    pub fn write_page<T: PageCodec>(&mut self, page_no: PageNo, page: &T) -> Result<()> {
        let mut buf = [0u8; crate::page::PAGE_SIZE];
        page.encode(&mut buf);
        self.pager.write(page_no, &buf)
    }

    /// Recycle the head of the free list, or extend the file by one page if
    /// the free list is empty. The returned page's content is undefined;
    /// the caller must write a fully-initialized typed page to it before
    /// treating it as live.
    pub fn alloc(&mut self) -> Result<PageNo> {
        let mut header = self.read_header()?;
        let page_no = if header.free_page_no != NULL_PAGE {
            let free_no = header.free_page_no;
            let free: FreePage = self.read_page(free_no)?;
            header.free_page_no = free.next_free_page_no;
            free_no
        } else {
            let new_no = header.page_count;
            header.page_count += 1;
            new_no
        };
        self.write_header(&header)?;
        trace!("space: allocated page {page_no}");
        Ok(page_no)
    }

    /// Prepend `page_no` to the free list. The page's existing content
    /// beyond its first 8 bytes is left untouched.
    pub fn free(&mut self, page_no: PageNo) -> Result<()> {
        let mut header = self.read_header()?;
        self.write_page(page_no, &FreePage::new(header.free_page_no))?;
        header.free_page_no = page_no;
        self.write_header(&header)?;
        debug!("space: freed page {page_no}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::NamedTempFile;

    #[test]
    fn fresh_file_has_one_page_and_empty_tree() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::remove_file(tmp.path()).unwrap();
        let mut space = SpaceManager::open(tmp.path()).unwrap();
        let header = space.read_header().unwrap();
        assert_eq!(header.page_count, 1);
        assert!(header.is_empty());
    }

    #[test]
    fn alloc_extends_file_when_free_list_empty() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::remove_file(tmp.path()).unwrap();
        let mut space = SpaceManager::open(tmp.path()).unwrap();
        let a = space.alloc().unwrap();
        let b = space.alloc().unwrap();
        assert_eq!(a, 1);
        assert_eq!(b, 2);
        assert_eq!(space.read_header().unwrap().page_count, 3);
    }

    #[test]
    fn freed_pages_are_reused_before_extending() {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::remove_file(tmp.path()).unwrap();
        let mut space = SpaceManager::open(tmp.path()).unwrap();
        let pages: Vec<PageNo> = (0..5).map(|_| space.alloc().unwrap()).collect();

        space.free(pages[1]).unwrap();
        space.free(pages[3]).unwrap();

        let mut reused = HashSet::new();
        reused.insert(space.alloc().unwrap());
        reused.insert(space.alloc().unwrap());
        assert!(reused.contains(&pages[1]));
        assert!(reused.contains(&pages[3]));

        // The free list was exhausted, so the file does not grow past what
        // the two freed + two reused pages required.
        assert_eq!(space.read_header().unwrap().page_count, 6);
    }
}
