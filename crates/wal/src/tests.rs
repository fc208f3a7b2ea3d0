use super::*;
use buffer::BufferPool;
use tempfile::tempdir;

fn pool(dir: &std::path::Path) -> BufferPool {
    BufferPool::open(&dir.join("data.db"), 16).unwrap()
}

#[test]
fn committed_tx_ids_only_includes_commit_records() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("wal.log")).unwrap();

    wal.log_begin(1).unwrap();
    wal.log_insert(1, 1, "1|Alice").unwrap();
    wal.log_commit(1).unwrap();

    wal.log_begin(2).unwrap();
    wal.log_insert(2, 2, "2|Bob").unwrap();
    // transaction 2 never commits

    let committed = wal.committed_tx_ids().unwrap();
    assert!(committed.contains(&1));
    assert!(!committed.contains(&2));
}

#[test]
fn recover_replays_only_committed_transactions() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("wal.log")).unwrap();
    let mut pool = pool(dir.path());
    let root = btree::create_empty_leaf(&mut pool).unwrap();

    wal.log_begin(1).unwrap();
    wal.log_insert(1, 1, "1|Alice").unwrap();
    wal.log_insert(1, 2, "2|Bob").unwrap();
    wal.log_commit(1).unwrap();

    wal.log_begin(2).unwrap();
    wal.log_insert(2, 99, "99|Uncommitted").unwrap();

    wal.recover(&mut pool, root).unwrap();

    assert_eq!(
        btree::search(&mut pool, root, 1).unwrap(),
        Some("1|Alice".to_string())
    );
    assert_eq!(
        btree::search(&mut pool, root, 2).unwrap(),
        Some("2|Bob".to_string())
    );
    assert_eq!(btree::search(&mut pool, root, 99).unwrap(), None);
}

#[test]
fn recover_applies_update_as_delete_then_insert() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("wal.log")).unwrap();
    let mut pool = pool(dir.path());
    let root = btree::create_empty_leaf(&mut pool).unwrap();

    wal.log_begin(1).unwrap();
    wal.log_insert(1, 1, "1|Alice").unwrap();
    wal.log_commit(1).unwrap();

    wal.log_begin(2).unwrap();
    wal.log_update(2, 1, "1|Alicia").unwrap();
    wal.log_commit(2).unwrap();

    wal.recover(&mut pool, root).unwrap();

    assert_eq!(
        btree::search(&mut pool, root, 1).unwrap(),
        Some("1|Alicia".to_string())
    );
}

#[test]
fn apply_committed_transactions_excludes_given_tx() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("wal.log")).unwrap();
    let mut pool = pool(dir.path());
    let root = btree::create_empty_leaf(&mut pool).unwrap();

    wal.log_begin(1).unwrap();
    wal.log_insert(1, 1, "1|Alice").unwrap();
    wal.log_commit(1).unwrap();

    wal.log_begin(2).unwrap();
    wal.log_insert(2, 2, "2|Bob").unwrap();
    wal.log_commit(2).unwrap();

    // Simulate ROLLBACK of tx 2: replay every committed tx except 2.
    wal.apply_committed_transactions(&mut pool, root, 2)
        .unwrap();

    assert_eq!(
        btree::search(&mut pool, root, 1).unwrap(),
        Some("1|Alice".to_string())
    );
    assert_eq!(btree::search(&mut pool, root, 2).unwrap(), None);
}

#[test]
fn reopening_resumes_lsn_allocation() {
    let dir = tempdir().unwrap();
    let wal_path = dir.path().join("wal.log");
    {
        let mut wal = Wal::open(&wal_path).unwrap();
        wal.log_begin(1).unwrap();
        wal.log_commit(1).unwrap();
    }
    let mut wal = Wal::open(&wal_path).unwrap();
    wal.log_begin(2).unwrap();

    let lsns: Vec<u64> = wal.read_all().unwrap().iter().map(WalRecord::lsn).collect();
    assert_eq!(lsns, vec![1, 2, 3]);
}

#[test]
fn max_tx_id_counts_uncommitted_transactions_too() {
    let dir = tempdir().unwrap();
    let mut wal = Wal::open(dir.path().join("wal.log")).unwrap();

    wal.log_begin(1).unwrap();
    wal.log_commit(1).unwrap();
    wal.log_begin(5).unwrap();
    // tx 5 never commits, but its id must not be reissued.

    assert_eq!(wal.max_tx_id().unwrap(), 5);
}

#[test]
fn truncated_tail_is_discarded_on_scan() {
    use std::io::Write as _;

    let dir = tempdir().unwrap();
    let wal_path = dir.path().join("wal.log");
    {
        let mut wal = Wal::open(&wal_path).unwrap();
        wal.log_begin(1).unwrap();
        wal.log_commit(1).unwrap();
    }
    // Append a dangling length prefix claiming more bytes than follow.
    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(&wal_path)
            .unwrap();
        file.write_all(&100u32.to_le_bytes()).unwrap();
        file.write_all(b"short").unwrap();
    }

    let wal = Wal::open(&wal_path).unwrap();
    let records = wal.read_all().unwrap();
    assert_eq!(records.len(), 2);
}
