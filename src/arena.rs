use std::{
    fs::{File, OpenOptions},
    path::Path,
};

use memmap2::{MmapMut, MmapOptions};
use tracing::debug;

use crate::error::{Error, Result};

/// Memory mapped arenas are always allocated in multiples of this size.
const CHUNK_SIZE: usize = 4096;

/// A single growable, contiguous and byte-addressable storage region.
///
/// All set implementations use an arena as their only allocation source.
/// Growing an arena preserves its content, but may move it in memory, so callers must
/// only keep offsets into the arena and never references across a call to [`ByteArena::resize`].
pub trait ByteArena {
    /// Number of bytes currently in use.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bytes(&self) -> &[u8];

    fn bytes_mut(&mut self) -> &mut [u8];

    /// Changes the used size of the arena to `new_size` bytes.
    ///
    /// The content up to the smaller of the old and new size is preserved and new bytes are zero.
    /// A size of zero releases the storage.
    /// If the operation fails, the arena keeps its previous size and content.
    fn resize(&mut self, new_size: usize) -> Result<()>;

    /// Releases all storage held by the arena.
    fn release(&mut self) -> Result<()> {
        self.resize(0)
    }
}

impl<A> ByteArena for Box<A>
where
    A: ByteArena + ?Sized,
{
    fn len(&self) -> usize {
        self.as_ref().len()
    }

    fn bytes(&self) -> &[u8] {
        self.as_ref().bytes()
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        self.as_mut().bytes_mut()
    }

    fn resize(&mut self, new_size: usize) -> Result<()> {
        self.as_mut().resize(new_size)
    }

    fn release(&mut self) -> Result<()> {
        self.as_mut().release()
    }
}

/// Arena type used when the storage is selected at runtime.
pub type DynArena = Box<dyn ByteArena + Send>;

/// Arena allocated on the heap.
#[derive(Debug, Default)]
pub struct HeapArena {
    data: Vec<u8>,
}

impl HeapArena {
    pub fn new() -> HeapArena {
        HeapArena::default()
    }
}

impl ByteArena for HeapArena {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn resize(&mut self, new_size: usize) -> Result<()> {
        if new_size == 0 {
            self.data = Vec::new();
            return Ok(());
        }
        if new_size > self.data.len() {
            // Reserve fallibly, so an allocation failure leaves the existing data untouched
            self.data
                .try_reserve(new_size - self.data.len())
                .map_err(|_| Error::ArenaExhausted {
                    requested: new_size,
                })?;
        }
        self.data.resize(new_size, 0);
        Ok(())
    }
}

/// Arena backed by a memory mapped region.
///
/// The region is either anonymous or backed by a file, which allows the operating
/// system to page out parts of large sets.
pub struct MmapArena {
    mmap: Option<MmapMut>,
    file: Option<File>,
    len: usize,
}

impl MmapArena {
    /// Create an arena backed by anonymous memory.
    pub fn anonymous() -> MmapArena {
        MmapArena {
            mmap: None,
            file: None,
            len: 0,
        }
    }

    /// Create an arena backed by a new temporary file, which is deleted when the arena is dropped.
    pub fn temporary() -> Result<MmapArena> {
        let file = tempfile::tempfile()?;
        Ok(MmapArena {
            mmap: None,
            file: Some(file),
            len: 0,
        })
    }

    /// Create an arena backed by the file at the given path.
    ///
    /// An existing file is truncated.
    pub fn create(path: &Path) -> Result<MmapArena> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(MmapArena {
            mmap: None,
            file: Some(file),
            len: 0,
        })
    }

    /// Number of bytes currently mapped.
    pub fn capacity(&self) -> usize {
        self.mmap.as_ref().map_or(0, |m| m.len())
    }

    /// Makes sure the mapped region has room for at least the requested number of bytes.
    /// To avoid remapping too often, the mapped size is at least doubled.
    fn reserve(&mut self, requested_size: usize) -> Result<()> {
        if requested_size <= self.capacity() {
            // Still enough space, no action required
            return Ok(());
        }

        let new_capacity = requested_size
            .max(self.capacity() * 2)
            .checked_next_multiple_of(CHUNK_SIZE)
            .ok_or(Error::ArenaExhausted {
                requested: requested_size,
            })?;

        let new_mmap = match &self.file {
            Some(file) => {
                // Extend the file and map it again, the content is kept by the file itself
                file.set_len(new_capacity.try_into()?)?;
                // SAFETY: the file is owned by this arena and not modified by anyone else
                // while mapped
                unsafe { MmapOptions::new().len(new_capacity).map_mut(file)? }
            }
            None => {
                let mut new_mmap = MmapOptions::new().len(new_capacity).map_anon()?;
                // Copy all content from the old region into the new one
                if let Some(old) = &self.mmap {
                    new_mmap[0..self.len].copy_from_slice(&old[0..self.len]);
                }
                new_mmap
            }
        };
        debug!(
            old_capacity = self.capacity(),
            new_capacity, "remapped arena"
        );
        // Only replace the old mapping once the new one exists
        self.mmap = Some(new_mmap);
        Ok(())
    }
}

impl ByteArena for MmapArena {
    fn len(&self) -> usize {
        self.len
    }

    fn bytes(&self) -> &[u8] {
        match &self.mmap {
            Some(mmap) => &mmap[0..self.len],
            None => &[],
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.mmap {
            Some(mmap) => &mut mmap[0..self.len],
            None => &mut [],
        }
    }

    fn resize(&mut self, new_size: usize) -> Result<()> {
        if new_size == 0 {
            self.mmap = None;
            if let Some(file) = &self.file {
                file.set_len(0)?;
            }
            self.len = 0;
            return Ok(());
        }

        self.reserve(new_size)?;
        if new_size < self.len {
            // Bytes beyond the used size must read as zero when the arena grows again
            if let Some(mmap) = &mut self.mmap {
                mmap[new_size..self.len].fill(0);
            }
        }
        self.len = new_size;
        Ok(())
    }
}
