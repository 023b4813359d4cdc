use super::*;

// -------------------- Helpers --------------------

fn board() -> Ranking {
    Ranking::new(Box::new(NoNames))
}

fn board_with_names() -> Ranking {
    Ranking::new(Box::new(LookupFn(|id: u64| Some(format!("file-{}", id)))))
}

fn counts(r: &Ranking) -> Vec<(u64, u64)> {
    r.top_all().iter().map(|f| (f.id, f.count)).collect()
}

/// Asserts the total-order invariant: strictly descending count, ties by
/// ascending id.
fn assert_ordered(r: &Ranking) {
    let all = r.top_all();
    for pair in all.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            a.count > b.count || (a.count == b.count && a.id < b.id),
            "order violated: ({}, {}) before ({}, {})",
            a.id,
            a.count,
            b.id,
            b.count
        );
    }
}

// -------------------- Basic hits --------------------

#[test]
fn first_hit_inserts_with_count_one() {
    let mut r = board_with_names();
    r.hit(7);

    assert_eq!(r.len(), 1);
    let all = r.top_all();
    assert_eq!(all[0].id, 7);
    assert_eq!(all[0].count, 1);
    assert_eq!(all[0].file_name, "file-7");
}

#[test]
fn unknown_name_stored_as_empty() {
    let mut r = board();
    r.hit(7);
    assert_eq!(r.top_all()[0].file_name, "");
}

#[test]
fn click_sequence_orders_by_count() {
    // Clicks: 7, 3, 7, 7, 3, 5 -> [(7,3), (3,2), (5,1)]
    let mut r = board();
    for id in [7, 3, 7, 7, 3, 5] {
        r.hit(id);
    }
    assert_eq!(counts(&r), vec![(7, 3), (3, 2), (5, 1)]);
    assert_ordered(&r);
}

#[test]
fn ties_break_by_ascending_id() {
    // Clicks: 9, 2, 9, 2 -> both at count 2, id 2 first.
    let mut r = board();
    for id in [9, 2, 9, 2] {
        r.hit(id);
    }
    assert_eq!(counts(&r), vec![(2, 2), (9, 2)]);
}

#[test]
fn conservation_of_clicks() {
    let mut r = board();
    let clicks: Vec<u64> = (0..500).map(|i| (i * 7 + 3) % 40).collect();
    for &id in &clicks {
        r.hit(id);
    }
    let total: u64 = r.top_all().iter().map(|f| f.count).sum();
    assert_eq!(total, clicks.len() as u64);
    assert_ordered(&r);
}

#[test]
fn order_holds_under_mixed_workload() {
    let mut r = board();
    // A deterministic but scrambled click stream.
    let mut x: u64 = 1;
    for _ in 0..2_000 {
        x = x.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        r.hit(x % 25);
        assert_ordered(&r);
    }
}

// -------------------- Bubbling across ties --------------------

#[test]
fn increment_leaps_a_run_of_equal_counts() {
    // [1:5, 2:5, 3:5]; a hit on 3 lifts it to 6, past BOTH ties.
    let mut r = board();
    r.insert(FileRecord {
        id: 1,
        file_name: String::new(),
        count: 5,
    });
    r.insert(FileRecord {
        id: 2,
        file_name: String::new(),
        count: 5,
    });
    r.insert(FileRecord {
        id: 3,
        file_name: String::new(),
        count: 5,
    });
    assert_eq!(counts(&r), vec![(1, 5), (2, 5), (3, 5)]);

    r.hit(3);
    assert_eq!(counts(&r), vec![(3, 6), (1, 5), (2, 5)]);
    assert_ordered(&r);
}

#[test]
fn increment_within_ties_respects_id_order() {
    // [5:2, 9:2] and a hit on 9: it passes 5 on count, not on id.
    let mut r = board();
    for id in [5, 9, 5, 9] {
        r.hit(id);
    }
    assert_eq!(counts(&r), vec![(5, 2), (9, 2)]);

    r.hit(9);
    assert_eq!(counts(&r), vec![(9, 3), (5, 2)]);
}

#[test]
fn leader_stays_put_on_increment() {
    let mut r = board();
    for id in [1, 1, 1, 2] {
        r.hit(id);
    }
    r.hit(1);
    assert_eq!(counts(&r), vec![(1, 4), (2, 1)]);
}

// -------------------- Insert (snapshot seeding) --------------------

#[test]
fn insert_in_descending_order() {
    let mut r = board();
    r.insert(FileRecord {
        id: 1,
        file_name: "a".into(),
        count: 5,
    });
    r.insert(FileRecord {
        id: 2,
        file_name: "b".into(),
        count: 3,
    });
    assert_eq!(counts(&r), vec![(1, 5), (2, 3)]);
}

#[test]
fn insert_out_of_order_still_lands_sorted() {
    let mut r = board();
    for (id, count) in [(4, 1), (1, 9), (3, 4), (2, 4), (5, 20)] {
        r.insert(FileRecord {
            id,
            file_name: String::new(),
            count,
        });
    }
    assert_eq!(counts(&r), vec![(5, 20), (1, 9), (2, 4), (3, 4), (4, 1)]);
    assert_ordered(&r);
}

#[test]
fn insert_ignores_duplicate_ids() {
    let mut r = board();
    r.insert(FileRecord {
        id: 1,
        file_name: "first".into(),
        count: 5,
    });
    r.insert(FileRecord {
        id: 1,
        file_name: "second".into(),
        count: 99,
    });
    assert_eq!(r.len(), 1);
    assert_eq!(r.top_all()[0].count, 5);
}

#[test]
fn hits_continue_from_seeded_counts() {
    let mut r = board();
    r.insert(FileRecord {
        id: 1,
        file_name: String::new(),
        count: 5,
    });
    r.insert(FileRecord {
        id: 2,
        file_name: String::new(),
        count: 3,
    });

    for _ in 0..3 {
        r.hit(2);
    }
    r.hit(3);
    assert_eq!(counts(&r), vec![(2, 6), (1, 5), (3, 1)]);
}

// -------------------- top_n --------------------

#[test]
fn top_n_truncates_and_top_all_does_not() {
    let mut r = board();
    for id in [7, 3, 7, 7, 3, 5] {
        r.hit(id);
    }

    let top2: Vec<u64> = r.top_n(2).iter().map(|f| f.id).collect();
    assert_eq!(top2, vec![7, 3]);
    assert_eq!(r.top_n(100).len(), 3);
    assert_eq!(r.top_n(0).len(), 0);
    assert_eq!(r.top_all().len(), 3);
}

// -------------------- Remove --------------------

#[test]
fn remove_head_middle_tail() {
    let mut r = board();
    for (id, count) in [(1, 30), (2, 20), (3, 10)] {
        r.insert(FileRecord {
            id,
            file_name: String::new(),
            count,
        });
    }

    r.remove(2); // middle
    assert_eq!(counts(&r), vec![(1, 30), (3, 10)]);
    r.remove(1); // head
    assert_eq!(counts(&r), vec![(3, 10)]);
    r.remove(3); // tail
    assert!(r.is_empty());
}

#[test]
fn remove_absent_is_noop() {
    let mut r = board();
    r.hit(1);
    r.remove(99);
    assert_eq!(r.len(), 1);
}

#[test]
fn slot_reuse_after_remove() {
    let mut r = board();
    for id in 0..10u64 {
        r.hit(id);
    }
    for id in 0..10u64 {
        r.remove(id);
    }
    assert!(r.is_empty());

    // Fresh inserts land in recycled slots and stay ordered.
    for id in [3, 1, 2] {
        r.hit(id);
        r.hit(id);
    }
    assert_eq!(counts(&r), vec![(1, 2), (2, 2), (3, 2)]);
    assert_ordered(&r);
}
