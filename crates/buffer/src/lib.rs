use std::path::Path;

use common::{DbError, DbResult, PageId};
use hashbrown::HashMap;
use storage::{Page, PageHeader, PageType, Pager};

/// A buffer-pool slot. A frame with `page_id == None` is unbound and is always the
/// cheapest eviction target (lowest `lru_counter`, ties to lowest index).
#[derive(Debug)]
struct Frame {
    page: Page,
    page_id: Option<PageId>,
    dirty: bool,
    pin_count: u32,
    lru_counter: u64,
}

impl Frame {
    fn unbound() -> Self {
        Self {
            page: Page::new(0, PageType::Metadata),
            page_id: None,
            dirty: false,
            pin_count: 0,
            lru_counter: 0,
        }
    }
}

/// Fixed-capacity cache of resident pages with pin counts, a dirty bit per frame,
/// and LRU-counter-based eviction. Owns the [`Pager`] so that a miss can load the
/// requested page directly.
#[derive(Debug)]
pub struct BufferPool {
    pager: Pager,
    frames: Vec<Frame>,
    index: HashMap<PageId, usize, ahash::RandomState>,
}

impl BufferPool {
    pub fn open(path: &Path, capacity: usize) -> DbResult<Self> {
        let pager = Pager::open(path)?;
        Ok(Self {
            pager,
            frames: (0..capacity).map(|_| Frame::unbound()).collect(),
            index: HashMap::default(),
        })
    }

    pub fn next_page_id(&self) -> u64 {
        self.pager.next_page_id()
    }

    /// Reopen the underlying file and drop all frame bindings, discarding any
    /// in-memory state. Used by ROLLBACK, which resets to committed state by REDO
    /// replay against a clean pool.
    pub fn reopen(&mut self, path: &Path) -> DbResult<()> {
        self.pager = Pager::open(path)?;
        for frame in self.frames.iter_mut() {
            *frame = Frame::unbound();
        }
        self.index.clear();
        Ok(())
    }

    /// Pin a page, returning the frame index holding it. Loads from disk on a miss.
    pub fn get(&mut self, page_id: PageId) -> DbResult<usize> {
        if let Some(&idx) = self.index.get(&page_id) {
            self.frames[idx].pin_count += 1;
            self.touch(idx);
            return Ok(idx);
        }

        let victim = self.find_victim()?;
        if let Some(old_id) = self.frames[victim].page_id {
            if self.frames[victim].dirty {
                self.flush_frame(victim)?;
            }
            self.index.remove(&old_id);
        }

        let page = self.pager.read_page(page_id)?;
        self.frames[victim] = Frame {
            page,
            page_id: Some(page_id),
            dirty: false,
            pin_count: 1,
            lru_counter: 0,
        };
        self.index.insert(page_id, victim);
        self.touch(victim);
        Ok(victim)
    }

    /// Allocate a fresh page id, bind it to a frame, and write the given page type
    /// into its header. Returns the id and the pinned frame index; the caller still
    /// owns writing the body and unpinning with `dirty = true`.
    pub fn allocate_page(&mut self, page_type: PageType) -> DbResult<(PageId, usize)> {
        let id = PageId(self.pager.allocate_page_id());
        let idx = self.get(id)?;
        self.frames[idx]
            .page
            .write_header(&PageHeader::new(page_type))?;
        Ok((id, idx))
    }

    pub fn page(&self, frame_idx: usize) -> &Page {
        &self.frames[frame_idx].page
    }

    pub fn page_mut(&mut self, frame_idx: usize) -> &mut Page {
        &mut self.frames[frame_idx].page
    }

    /// Decrement the pin count and OR in the dirty flag. This implementation delays
    /// the physical write until `flush`/`flush_all` or eviction of a dirty victim,
    /// rather than writing through immediately -- the spec permits either choice,
    /// but only delayed write keeps an in-progress, uncommitted transaction's writes
    /// out of the data file until `COMMIT`'s `flush_all`, which is what makes crash
    /// recovery (reopening after a BEGIN with no COMMIT) actually discard the
    /// uncommitted work rather than finding it already on disk.
    pub fn unpin(&mut self, page_id: PageId, dirty: bool) -> DbResult<()> {
        let idx = *self
            .index
            .get(&page_id)
            .ok_or_else(|| DbError::Storage(format!("page {} is not resident", page_id.0)))?;
        let frame = &mut self.frames[idx];
        frame.pin_count = frame.pin_count.saturating_sub(1);
        if dirty {
            frame.dirty = true;
        }
        Ok(())
    }

    pub fn flush(&mut self, page_id: PageId) -> DbResult<()> {
        if let Some(&idx) = self.index.get(&page_id) {
            if self.frames[idx].dirty {
                self.flush_frame(idx)?;
            }
        }
        Ok(())
    }

    pub fn flush_all(&mut self) -> DbResult<()> {
        for idx in 0..self.frames.len() {
            if self.frames[idx].dirty {
                self.flush_frame(idx)?;
            }
        }
        Ok(())
    }

    /// Unbind every frame without flushing. The engine calls `flush_all` first and
    /// this second, defeating any staleness before a SELECT scan.
    pub fn invalidate_all(&mut self) {
        for frame in self.frames.iter_mut() {
            *frame = Frame::unbound();
        }
        self.index.clear();
    }

    fn flush_frame(&mut self, idx: usize) -> DbResult<()> {
        self.pager.write_page(&self.frames[idx].page)?;
        self.frames[idx].dirty = false;
        Ok(())
    }

    /// Reset the touched frame's recency to zero and age every other resident frame.
    fn touch(&mut self, touched: usize) {
        for (i, frame) in self.frames.iter_mut().enumerate() {
            if i == touched {
                frame.lru_counter = 0;
            } else if frame.page_id.is_some() {
                frame.lru_counter = frame.lru_counter.saturating_add(1);
            }
        }
    }

    /// Among unpinned frames, the smallest `lru_counter` wins; ties go to the lowest
    /// frame index (natural by iteration order since `min_by_key` keeps the first).
    fn find_victim(&self) -> DbResult<usize> {
        self.frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.pin_count == 0)
            .min_by_key(|(i, f)| (f.lru_counter, *i))
            .map(|(i, _)| i)
            .ok_or_else(|| DbError::Capacity("no unpinned frame available".into()))
    }
}
