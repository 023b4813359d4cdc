use super::helpers::*;
use crate::Engine;
use codec::FileRecord;
use rdb::Rdb;
use std::fs;
use tempfile::tempdir;
use wal::Wal;

// --------------------- Fresh start ---------------------

#[test]
fn recover_on_empty_dirs_is_a_fresh_start() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());
    let engine = engine_with(&cfg);

    engine.recover().unwrap();
    assert!(engine.top_all().is_empty());

    // The engine is immediately usable.
    engine.click(1).unwrap();
    engine.drain().unwrap();
    assert_eq!(counts(&engine), vec![(1, 1)]);
}

// --------------------- Snapshot only ---------------------

#[test]
fn recover_from_snapshot_only() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());

    {
        let engine = engine_with(&cfg);
        for _ in 0..5 {
            engine.click(1).unwrap();
        }
        for _ in 0..3 {
            engine.click(2).unwrap();
        }
        engine.drain().unwrap();
        engine.snapshot_now().unwrap();
    } // drop = stop

    let engine = engine_with(&cfg);
    engine.recover().unwrap();
    assert_eq!(counts(&engine), vec![(1, 5), (2, 3)]);
}

#[test]
fn recovered_names_come_from_the_snapshot() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());

    {
        let engine = Engine::new(
            &cfg,
            Box::new(ranking::LookupFn(|id: u64| Some(format!("f{}", id)))),
        )
        .unwrap();
        engine.click(7).unwrap();
        engine.drain().unwrap();
        engine.snapshot_now().unwrap();
    }

    // The second engine has no name source; the snapshot carries the name.
    let engine = engine_with(&cfg);
    engine.recover().unwrap();
    assert_eq!(engine.top_all()[0].file_name, "f7");
}

// --------------------- Snapshot + WAL ---------------------

#[test]
fn recover_applies_post_snapshot_wal_records() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());

    // Snapshot state: [(1, 5), (2, 3)].
    let rdb = Rdb::open(&cfg.rdb_dir, cfg.rdb_max_files).unwrap();
    let (snap_ts, _) = rdb
        .save(&[rec(1, 5), rec(2, 3)])
        .unwrap();

    // Post-snapshot log: three clicks on 2, one on a brand-new 3.
    let wal = Wal::open(&cfg.wal_dir, 1, cfg.wal_max_size).unwrap();
    for _ in 0..3 {
        wal.append(2, snap_ts + 1).unwrap();
    }
    wal.append(3, snap_ts + 1).unwrap();
    wal.close().unwrap();
    drop(wal);

    let engine = engine_with(&cfg);
    engine.recover().unwrap();
    assert_eq!(counts(&engine), vec![(2, 6), (1, 5), (3, 1)]);
}

#[test]
fn replay_cutoff_is_strictly_newer_than_snapshot() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());

    let rdb = Rdb::open(&cfg.rdb_dir, cfg.rdb_max_files).unwrap();
    let (snap_ts, _) = rdb.save(&[rec(1, 5)]).unwrap();

    let wal = Wal::open(&cfg.wal_dir, 1, cfg.wal_max_size).unwrap();
    wal.append(1, snap_ts - 1).unwrap(); // already inside the snapshot
    wal.append(1, snap_ts).unwrap(); // boundary: also covered
    wal.append(1, snap_ts + 1).unwrap(); // newer: must apply
    wal.close().unwrap();
    drop(wal);

    let engine = engine_with(&cfg);
    engine.recover().unwrap();
    assert_eq!(counts(&engine), vec![(1, 6)]);
}

// --------------------- WAL only (crash before any snapshot) ---------------------

#[test]
fn crash_without_snapshot_recovers_from_wal_alone() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());

    {
        let engine = engine_with(&cfg);
        for id in [7, 3, 7] {
            engine.click(id).unwrap();
        }
        engine.drain().unwrap();
        // Simulated crash: no stop, no final snapshot, in-memory state gone.
        std::mem::forget(engine);
    }

    let engine = engine_with(&cfg);
    engine.recover().unwrap();
    assert_eq!(counts(&engine), vec![(7, 2), (3, 1)]);
}

// --------------------- Crash/recover equivalence ---------------------

#[test]
fn recovery_matches_pre_crash_state_across_sessions() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());

    // Session 1: clicks, snapshot mid-way, more clicks, crash.
    let expected = {
        let engine = engine_with(&cfg);
        for id in [4, 4, 9] {
            engine.click(id).unwrap();
        }
        engine.drain().unwrap();
        engine.snapshot_now().unwrap();
        // Step past the snapshot's one-second replay cutoff before the
        // next clicks, as a live deployment naturally would.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        for id in [9, 9, 1] {
            engine.click(id).unwrap();
        }
        engine.drain().unwrap();
        let state = counts(&engine);
        std::mem::forget(engine);
        state
    };

    // Session 2 must see exactly the pre-crash state.
    let engine = engine_with(&cfg);
    engine.recover().unwrap();
    assert_eq!(counts(&engine), expected);
}

// --------------------- Corruption ---------------------

#[test]
fn corrupted_snapshot_aborts_recovery() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());
    let engine = engine_with(&cfg);

    // A damaged snapshot that sorts as the newest.
    fs::write(cfg.rdb_dir.join("dump-9999999999.rdb"), b"RDB1 garbage").unwrap();

    assert!(engine.recover().is_err());
}

#[test]
fn torn_wal_tail_does_not_abort_recovery() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());

    {
        let wal = Wal::open(&cfg.wal_dir, 1, cfg.wal_max_size).unwrap();
        wal.append(5, 10).unwrap();
        wal.append(6, 10).unwrap();
        wal.close().unwrap();
    }

    // Tear the last record in half.
    let segment = wal::list_segments(&cfg.wal_dir).unwrap().remove(0);
    let data = fs::read(&segment).unwrap();
    fs::write(&segment, &data[..data.len() - 7]).unwrap();

    let engine = engine_with(&cfg);
    engine.recover().unwrap();
    assert_eq!(counts(&engine), vec![(5, 1)]);
}

// --------------------- Seeding details ---------------------

#[test]
fn seeded_records_keep_counting() {
    let dir = tempdir().unwrap();
    let cfg = test_config(dir.path());

    let rdb = Rdb::open(&cfg.rdb_dir, cfg.rdb_max_files).unwrap();
    rdb.save(&[
        FileRecord {
            id: 1,
            file_name: "a".into(),
            count: 10,
        },
        FileRecord {
            id: 2,
            file_name: "b".into(),
            count: 9,
        },
    ])
    .unwrap();

    let engine = engine_with(&cfg);
    engine.recover().unwrap();

    // Live clicks on recovered state reorder it correctly.
    engine.click(2).unwrap();
    engine.click(2).unwrap();
    engine.drain().unwrap();
    assert_eq!(counts(&engine), vec![(2, 11), (1, 10)]);
}
