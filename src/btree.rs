//! B-tree set with its pages stored in an arena.
use std::cmp::Ordering;

use serde_derive::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    arena::{ByteArena, HeapArena},
    compare::{default_comparator, Comparator, SharedComparator},
    error::{Error, Result},
    set::Set,
};

use page::{Page, PageFile, PAGE_HEADER_SIZE};

mod page;

/// Smallest supported page size.
pub const MIN_PAGE_SIZE: usize = 256;

/// Configuration of a [`BtreeSet`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BtreeConfig {
    /// Size of a single page in bytes.
    pub page_size: usize,
}

impl Default for BtreeConfig {
    fn default() -> Self {
        Self { page_size: 4096 }
    }
}

impl BtreeConfig {
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE || u32::try_from(self.page_size).is_err() {
            Err(Error::PageSizeTooSmall(self.page_size))
        } else {
            Ok(())
        }
    }

    /// Keys are limited to a quarter of a page, so a full page can always be split
    /// into two pages that fit.
    pub fn max_key_size(&self) -> usize {
        (self.page_size - PAGE_HEADER_SIZE) / 4 - 16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchResult {
    Found(usize),
    NotFound(usize),
}

fn search(keys: &[Vec<u8>], key: &[u8], comparator: &dyn Comparator) -> SearchResult {
    match keys.binary_search_by(|k| comparator.compare(k, key)) {
        Ok(i) => SearchResult::Found(i),
        Err(i) => SearchResult::NotFound(i),
    }
}

enum Insertion {
    Present,
    Inserted,
    /// The page was split, the separator and the new right page need to be added to the parent.
    Split { separator: Vec<u8>, right: u32 },
}

/// Ordered set of byte strings in a B-tree with fixed-size pages.
///
/// Each page holds as many keys as fit into its serialized form, pages that overflow
/// are split at the middle of their content.
pub struct BtreeSet<A: ByteArena = HeapArena> {
    pages: PageFile<A>,
    root: u32,
    height: usize,
    len: usize,
    max_key_size: usize,
    comparator: SharedComparator,
}

impl BtreeSet<HeapArena> {
    pub fn new(config: BtreeConfig) -> Result<BtreeSet<HeapArena>> {
        BtreeSet::with_arena(HeapArena::new(), config)
    }
}

impl<A> BtreeSet<A>
where
    A: ByteArena,
{
    /// Create an empty set that stores its pages in the given arena.
    pub fn with_arena(arena: A, config: BtreeConfig) -> Result<BtreeSet<A>> {
        config.validate()?;
        let mut pages = PageFile::new(arena, config.page_size);
        // Always start with an empty root page
        let root = pages.allocate()?;
        Ok(BtreeSet {
            pages,
            root,
            height: 1,
            len: 0,
            max_key_size: config.max_key_size(),
            comparator: default_comparator(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn max_key_size(&self) -> usize {
        self.max_key_size
    }

    /// Number of page levels from the root down to the leaves.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of allocated pages.
    pub fn page_count(&self) -> usize {
        self.pages.page_count()
    }

    pub fn set_comparator(&mut self, comparator: SharedComparator) {
        self.comparator = comparator;
    }

    /// Insert a key if it does not exist yet.
    ///
    /// Returns `true` if the key was already present.
    /// A failed insert leaves the set unchanged.
    pub fn insert(&mut self, key: &[u8]) -> Result<bool> {
        self.check_key(key)?;
        // Every level may split once and the root split needs one more page
        self.pages.reserve(self.height + 1)?;
        let comparator = self.comparator.clone();

        match self.insert_into(self.root, key, comparator.as_ref())? {
            Insertion::Present => return Ok(true),
            Insertion::Inserted => {}
            Insertion::Split { separator, right } => {
                // Create a new root above the two halves of the old one
                let new_root = self.pages.allocate()?;
                let page = Page {
                    keys: vec![separator],
                    children: vec![self.root, right],
                };
                self.pages.put(new_root, &page)?;
                debug!(old_root = self.root, new_root, "split root page");
                self.root = new_root;
                self.height += 1;
            }
        }
        self.len += 1;
        Ok(false)
    }

    /// Returns whether the set contains the given key.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.check_key(key)?;
        let mut page_id = self.root;
        loop {
            let page = self.pages.get(page_id)?;
            match search(&page.keys, key, self.comparator.as_ref()) {
                SearchResult::Found(_) => return Ok(true),
                SearchResult::NotFound(_) if page.is_leaf() => return Ok(false),
                SearchResult::NotFound(i) => page_id = page.children[i],
            }
        }
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let mut result = Vec::with_capacity(self.len);
        self.collect_keys(self.root, &mut result)?;
        Ok(result)
    }

    /// Release the pages.
    pub fn destroy(mut self) -> Result<()> {
        self.pages.release()
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() > self.max_key_size {
            Err(Error::KeyTooLarge {
                size: key.len(),
                max: self.max_key_size,
            })
        } else {
            Ok(())
        }
    }

    fn collect_keys(&self, page_id: u32, result: &mut Vec<Vec<u8>>) -> Result<()> {
        let page = self.pages.get(page_id)?;
        if page.is_leaf() {
            result.extend(page.keys);
        } else {
            let mut keys = page.keys.into_iter();
            for child in page.children {
                self.collect_keys(child, result)?;
                result.extend(keys.next());
            }
        }
        Ok(())
    }

    fn insert_into(
        &mut self,
        page_id: u32,
        key: &[u8],
        comparator: &dyn Comparator,
    ) -> Result<Insertion> {
        let mut page = self.pages.get(page_id)?;
        match search(&page.keys, key, comparator) {
            SearchResult::Found(_) => Ok(Insertion::Present),
            SearchResult::NotFound(i) => {
                if page.is_leaf() {
                    page.keys.insert(i, key.to_vec());
                } else {
                    match self.insert_into(page.children[i], key, comparator)? {
                        Insertion::Split { separator, right } => {
                            page.keys.insert(i, separator);
                            page.children.insert(i + 1, right);
                        }
                        other => return Ok(other),
                    }
                }
                self.store(page_id, page)
            }
        }
    }

    /// Write a changed page back, splitting it if it got too large.
    fn store(&mut self, page_id: u32, mut page: Page) -> Result<Insertion> {
        if self.pages.fits(&page)? {
            self.pages.put(page_id, &page)?;
            return Ok(Insertion::Inserted);
        }

        let middle = split_point(&page);
        let right = Page {
            keys: page.keys.split_off(middle + 1),
            children: if page.is_leaf() {
                Vec::new()
            } else {
                page.children.split_off(middle + 1)
            },
        };
        let separator = page.keys.pop().unwrap_or_default();

        let right_id = self.pages.allocate()?;
        self.pages.put(page_id, &page)?;
        self.pages.put(right_id, &right)?;
        trace!(
            page_id,
            right_id,
            left_keys = page.keys.len(),
            right_keys = right.keys.len(),
            "split page"
        );
        Ok(Insertion::Split {
            separator,
            right: right_id,
        })
    }
}

/// Index of the key that divides the content of a page into two halves of similar size.
///
/// The result leaves at least one key on each side.
fn split_point(page: &Page) -> usize {
    let total: usize = page.keys.iter().map(|k| k.len() + 1).sum();
    let mut before = 0;
    let mut middle = 0;
    for (i, k) in page.keys.iter().enumerate() {
        before += k.len() + 1;
        if 2 * before >= total {
            middle = i;
            break;
        }
    }
    middle.max(1).min(page.keys.len().saturating_sub(2))
}

impl<A> Set for BtreeSet<A>
where
    A: ByteArena,
{
    fn insert(&mut self, key: &[u8]) -> Result<bool> {
        BtreeSet::insert(self, key)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        BtreeSet::contains(self, key)
    }

    fn set_comparator(&mut self, comparator: SharedComparator) {
        BtreeSet::set_comparator(self, comparator)
    }

    fn len(&self) -> usize {
        BtreeSet::len(self)
    }

    fn destroy(self: Box<Self>) -> Result<()> {
        BtreeSet::destroy(*self)
    }
}

#[cfg(test)]
mod tests;
