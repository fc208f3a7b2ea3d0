use super::*;
use tempfile::tempdir;

#[test]
fn pager_opens_fresh_file_with_no_pages() {
    let dir = tempdir().unwrap();
    let pager = Pager::open(&dir.path().join("data.db")).unwrap();
    assert_eq!(pager.next_page_id(), 0);
}

#[test]
fn allocate_page_id_increments_without_writing() {
    let dir = tempdir().unwrap();
    let mut pager = Pager::open(&dir.path().join("data.db")).unwrap();
    assert_eq!(pager.allocate_page_id(), 0);
    assert_eq!(pager.allocate_page_id(), 1);
    assert_eq!(pager.next_page_id(), 2);
}

#[test]
fn read_unwritten_page_returns_zeroed_page() {
    let dir = tempdir().unwrap();
    let mut pager = Pager::open(&dir.path().join("data.db")).unwrap();
    let page = pager.read_page(PageId(0)).unwrap();
    assert!(page.data.iter().all(|&b| b == 0));
}

#[test]
fn write_then_read_round_trips_bytes() {
    let dir = tempdir().unwrap();
    let mut pager = Pager::open(&dir.path().join("data.db")).unwrap();
    let mut page = Page::new(0, PageType::Leaf);
    page.body_mut()[0..5].copy_from_slice(b"hello");
    pager.write_page(&page).unwrap();

    let read_back = pager.read_page(PageId(0)).unwrap();
    assert_eq!(&read_back.body()[0..5], b"hello");
    assert_eq!(read_back.header().unwrap().page_type, PageType::Leaf);
}

#[test]
fn reopening_computes_next_page_id_from_file_length() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data.db");
    {
        let mut pager = Pager::open(&path).unwrap();
        let page = Page::new(0, PageType::Leaf);
        pager.write_page(&page).unwrap();
        let page = Page::new(1, PageType::Metadata);
        pager.write_page(&page).unwrap();
    }
    let pager = Pager::open(&path).unwrap();
    assert_eq!(pager.next_page_id(), 2);
}

#[test]
fn header_round_trips_through_body_boundary() {
    let mut page = Page::new(7, PageType::Internal);
    let mut header = page.header().unwrap();
    header.num_cells = 12;
    header.free_space_offset = 100;
    page.write_header(&header).unwrap();

    let read_back = page.header().unwrap();
    assert_eq!(read_back.num_cells, 12);
    assert_eq!(read_back.free_space_offset, 100);
    assert_eq!(page.body().len(), PAGE_SIZE - HEADER_BYTES);
}
