use binary_layout::prelude::*;
use bincode::Options;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::{arena::ByteArena, error::Result};

// Every page starts with this header, followed by the serialized page content.
define_layout!(page_header, LittleEndian, {
    used_size: u32,
    key_count: u32,
});

pub(crate) const PAGE_HEADER_SIZE: usize = 8;

/// Content of a single B-tree page.
///
/// Inner pages have one more child than keys, leaves have no children at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Page {
    pub keys: Vec<Vec<u8>>,
    pub children: Vec<u32>,
}

impl Page {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Fixed-size pages stored consecutively in an arena.
pub(crate) struct PageFile<A> {
    arena: A,
    page_size: usize,
    page_count: usize,
    serializer: bincode::DefaultOptions,
}

impl<A> PageFile<A>
where
    A: ByteArena,
{
    pub fn new(arena: A, page_size: usize) -> PageFile<A> {
        PageFile {
            arena,
            page_size,
            page_count: 0,
            serializer: bincode::DefaultOptions::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Allocate a new empty leaf page.
    ///
    /// Returns the ID of the new page.
    pub fn allocate(&mut self) -> Result<u32> {
        let id: u32 = self.page_count.try_into()?;
        self.grow((self.page_count + 1) * self.page_size)?;
        self.page_count += 1;
        self.put(id, &Page::default())?;
        Ok(id)
    }

    /// Make sure the next `pages` allocations succeed without growing the arena.
    pub fn reserve(&mut self, pages: usize) -> Result<()> {
        let last: u32 = (self.page_count + pages).try_into()?;
        self.grow(last as usize * self.page_size)
    }

    pub fn get(&self, id: u32) -> Result<Page> {
        let offset = self.offset(id);
        let header = page_header::View::new(&self.arena.bytes()[offset..]);
        let used_size: usize = header.used_size().read().try_into()?;

        let start = offset + PAGE_HEADER_SIZE;
        let page: Page = self
            .serializer
            .deserialize(&self.arena.bytes()[start..(start + used_size)])?;
        debug_assert_eq!(header.key_count().read() as usize, page.keys.len());
        Ok(page)
    }

    /// Number of keys stored in the page, without deserializing it.
    #[cfg(test)]
    pub fn key_count(&self, id: u32) -> u32 {
        page_header::View::new(&self.arena.bytes()[self.offset(id)..])
            .key_count()
            .read()
    }

    /// Whether the serialized page fits into a single page.
    pub fn fits(&self, page: &Page) -> Result<bool> {
        let size = self.serializer.serialized_size(page)?;
        Ok(size <= (self.page_size - PAGE_HEADER_SIZE) as u64)
    }

    /// Serialize the page into the page with the given ID.
    ///
    /// Fails if the page does not fit, check with [`PageFile::fits`] first.
    pub fn put(&mut self, id: u32, page: &Page) -> Result<()> {
        let used_size: u32 = self.serializer.serialized_size(page)?.try_into()?;
        let key_count: u32 = page.keys.len().try_into()?;
        let offset = self.offset(id);
        let start = offset + PAGE_HEADER_SIZE;
        let end = offset + self.page_size;

        let bytes = self.arena.bytes_mut();
        self.serializer.serialize_into(&mut bytes[start..end], page)?;
        let mut header = page_header::View::new(&mut bytes[offset..]);
        header.used_size_mut().write(used_size);
        header.key_count_mut().write(key_count);
        Ok(())
    }

    pub fn release(&mut self) -> Result<()> {
        self.page_count = 0;
        self.arena.release()
    }

    fn offset(&self, id: u32) -> usize {
        id as usize * self.page_size
    }

    /// Grows the arena to contain at least the requested number of bytes.
    /// To avoid growing too often, the arena size is at least doubled.
    fn grow(&mut self, requested_size: usize) -> Result<()> {
        if requested_size <= self.arena.len() {
            return Ok(());
        }
        let new_size = requested_size.max(self.arena.len() * 2);
        debug!(
            old_size = self.arena.len(),
            new_size, "growing page file"
        );
        self.arena.resize(new_size)
    }
}
