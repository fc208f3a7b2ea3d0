use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bincode::config::{self, Config as BincodeConfig};
use bincode::serde::{decode_from_slice, encode_into_slice};
use common::{DbError, DbResult, PageId};

pub const PAGE_SIZE: usize = 4096;
/// Bytes reserved at the front of every page for the bincode-encoded [`PageHeader`].
/// Generous relative to the header's actual encoded size so future header fields fit
/// without reshuffling page bodies.
pub const HEADER_BYTES: usize = 32;

fn bincode_config() -> impl BincodeConfig {
    config::legacy()
}

/// Every page begins with one of these, matching the three structural roles a page
/// can play: an interior B+Tree node, a leaf B+Tree node, or the catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PageType {
    Internal,
    Leaf,
    Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PageHeader {
    pub page_type: PageType,
    pub free_space_offset: u16,
    pub num_cells: u16,
}

impl PageHeader {
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            free_space_offset: PAGE_SIZE as u16,
            num_cells: 0,
        }
    }
}

/// A fixed 4 KiB byte container. The header occupies the first [`HEADER_BYTES`]
/// bytes; everything after that is free for the owning layer (B+Tree node, catalog
/// record) to serialize into via [`Page::body`] / [`Page::body_mut`].
#[derive(Debug, Clone)]
pub struct Page {
    pub id: u64,
    pub data: Vec<u8>,
}

impl Page {
    /// A freshly zeroed page with the given type written into its header.
    pub fn new(id: u64, page_type: PageType) -> Self {
        let mut page = Self {
            id,
            data: vec![0u8; PAGE_SIZE],
        };
        page.write_header(&PageHeader::new(page_type))
            .expect("header always fits in HEADER_BYTES");
        page
    }

    /// A page that has not been initialized yet: all-zero bytes, including the
    /// header region. Decoding its header yields whatever the zero discriminant
    /// maps to (`PageType::Internal`); callers that read an uninitialized page are
    /// expected to overwrite it before relying on that value.
    fn zeroed(id: u64) -> Self {
        Self {
            id,
            data: vec![0u8; PAGE_SIZE],
        }
    }

    pub fn header(&self) -> DbResult<PageHeader> {
        let (header, _) = decode_from_slice(&self.data[..HEADER_BYTES], bincode_config())
            .map_err(|e| DbError::Storage(format!("read page header failed: {e}")))?;
        Ok(header)
    }

    pub fn write_header(&mut self, header: &PageHeader) -> DbResult<()> {
        let written = encode_into_slice(header, &mut self.data[..HEADER_BYTES], bincode_config())
            .map_err(|e| DbError::Storage(format!("write page header failed: {e}")))?;
        if written > HEADER_BYTES {
            return Err(DbError::Storage("page header overflowed its region".into()));
        }
        Ok(())
    }

    pub fn body(&self) -> &[u8] {
        &self.data[HEADER_BYTES..]
    }

    pub fn body_mut(&mut self) -> &mut [u8] {
        &mut self.data[HEADER_BYTES..]
    }
}

/// Owns the data file handle and the page-id allocation counter.
#[derive(Debug)]
pub struct Pager {
    file: File,
    next_page_id: u64,
}

impl Pager {
    pub fn open(path: &Path) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let len = file.metadata()?.len();
        let next_page_id = len / PAGE_SIZE as u64;
        Ok(Self { file, next_page_id })
    }

    pub fn next_page_id(&self) -> u64 {
        self.next_page_id
    }

    /// Reserve the next page id without writing any bytes. The caller must
    /// initialize and write the page through the buffer pool.
    pub fn allocate_page_id(&mut self) -> u64 {
        let id = self.next_page_id;
        self.next_page_id += 1;
        id
    }

    fn num_pages_on_disk(&self) -> DbResult<u64> {
        Ok(self.file.metadata()?.len() / PAGE_SIZE as u64)
    }

    /// Read a page by id. If the id has been allocated but never written (it is
    /// beyond the current file length), returns a fresh all-zero page rather than
    /// failing -- the caller is responsible for initializing it.
    pub fn read_page(&mut self, page_id: PageId) -> DbResult<Page> {
        if page_id.0 >= self.num_pages_on_disk()? {
            return Ok(Page::zeroed(page_id.0));
        }
        let mut page = Page::zeroed(page_id.0);
        self.file
            .seek(SeekFrom::Start(page_id.0 * PAGE_SIZE as u64))?;
        self.file.read_exact(&mut page.data)?;
        Ok(page)
    }

    pub fn write_page(&mut self, page: &Page) -> DbResult<()> {
        self.file
            .seek(SeekFrom::Start(page.id * PAGE_SIZE as u64))?;
        self.file.write_all(&page.data)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn close(self) -> DbResult<()> {
        drop(self.file);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
