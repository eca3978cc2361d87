use gridclaim_core::{
    bucket_key, ActorId, CanvasConfig, CanvasService, CellKey, ColorStrategy, Coordinate,
    GroupId, InvalidInput, PeriodKind, PlaceError, PlacementOutcome, PlacementReceipt,
    PlacementRequest, ReclaimPolicy, RejectReason,
};

const T0: i64 = 1_792_000_000_000;

fn test_config() -> CanvasConfig {
    CanvasConfig {
        cell_size: 1.0,
        base_cooldown_ms: 10,
        ..CanvasConfig::default()
    }
}

fn service() -> CanvasService {
    CanvasService::open_in_memory(test_config()).unwrap()
}

fn request(actor: &str, group: &str, x: f64, y: f64, size: u8) -> PlacementRequest {
    PlacementRequest {
        actor_id: actor.to_string(),
        group_id: group.to_string(),
        anchor: Coordinate::new(x, y),
        footprint_size: size,
        color: ColorStrategy::solid("#ff4b4b"),
    }
}

fn committed(outcome: PlacementOutcome) -> PlacementReceipt {
    match outcome {
        PlacementOutcome::Committed(receipt) => receipt,
        other => panic!("expected commit, got {other:?}"),
    }
}

fn group(code: &str) -> GroupId {
    GroupId::parse(code).unwrap()
}

#[test]
fn cooldown_scales_with_footprint_area() {
    let service = service();

    let first = committed(service.place(&request("alice", "JP", 0.5, 0.5, 1), T0).unwrap());
    assert_eq!(first.next_allowed_at, T0 + 10);
    assert_eq!(first.affected_cells, vec![CellKey::new(0, 0)]);

    let second = committed(
        service
            .place(&request("alice", "JP", 0.5, 0.5, 2), first.next_allowed_at)
            .unwrap(),
    );
    assert_eq!(second.next_allowed_at, first.next_allowed_at + 40);
    assert_eq!(second.affected_cell_count(), 4);

    let third = committed(
        service
            .place(&request("alice", "JP", 0.5, 0.5, 3), second.next_allowed_at)
            .unwrap(),
    );
    assert_eq!(third.next_allowed_at, second.next_allowed_at + 90);
    assert_eq!(third.affected_cell_count(), 9);
}

#[test]
fn immediate_retry_is_rejected_without_side_effects() {
    let service = service();
    let receipt = committed(service.place(&request("alice", "JP", 3.2, 4.7, 1), T0).unwrap());

    let retry = service
        .place(&request("alice", "KR", 9.0, 9.0, 1), T0 + 4)
        .unwrap();
    assert_eq!(
        retry,
        PlacementOutcome::Rejected {
            reason: RejectReason::CooldownActive,
            retry_after_ms: 6,
            next_allowed_at: Some(receipt.next_allowed_at),
        }
    );

    assert!(service.cell(CellKey::new(9, 9)).unwrap().is_none());
    let all = bucket_key(PeriodKind::AllTime, T0);
    assert_eq!(
        service
            .bucket_count(PeriodKind::AllTime, &all, &group("KR"))
            .unwrap(),
        0
    );
    assert_eq!(
        service
            .next_allowed_at(&ActorId::parse("alice").unwrap())
            .unwrap(),
        Some(receipt.next_allowed_at)
    );
}

#[test]
fn cooldown_is_per_actor() {
    let service = service();
    committed(service.place(&request("alice", "JP", 0.0, 0.0, 3), T0).unwrap());
    committed(service.place(&request("bob", "JP", 5.0, 5.0, 1), T0).unwrap());
}

#[test]
fn invalid_input_touches_nothing() {
    let service = service();

    let err = service
        .place(&request("alice", "JP", f64::NAN, 0.0, 1), T0)
        .unwrap_err();
    assert!(matches!(
        err,
        PlaceError::InvalidInput(InvalidInput::Coordinate { .. })
    ));

    let err = service
        .place(&request("alice", "JP", 0.0, 0.0, 4), T0)
        .unwrap_err();
    assert!(matches!(
        err,
        PlaceError::InvalidInput(InvalidInput::FootprintSize { side: 4, max: 3 })
    ));

    let mut bad_color = request("alice", "JP", 0.0, 0.0, 1);
    bad_color.color = ColorStrategy::solid("red");
    assert!(matches!(
        service.place(&bad_color, T0).unwrap_err(),
        PlaceError::InvalidInput(InvalidInput::Color(_))
    ));

    assert!(matches!(
        service.place(&request("  ", "JP", 0.0, 0.0, 1), T0).unwrap_err(),
        PlaceError::InvalidInput(InvalidInput::ActorId(_))
    ));

    // The actor never consumed a cooldown.
    committed(service.place(&request("alice", "JP", 0.0, 0.0, 1), T0).unwrap());
}

#[test]
fn footprint_anchors_on_floored_cell() {
    let service = service();
    let receipt = committed(service.place(&request("alice", "JP", -0.5, 2.9, 2), T0).unwrap());
    assert_eq!(
        receipt.affected_cells,
        vec![
            CellKey::new(-1, 2),
            CellKey::new(-1, 3),
            CellKey::new(0, 2),
            CellKey::new(0, 3),
        ]
    );
}

#[test]
fn concurrent_claims_on_one_cell_leave_one_winner_and_count_both() {
    let service = service();
    let jp = request("alice", "JP", 7.5, 7.5, 1);
    let mut kr = request("bob", "KR", 7.5, 7.5, 1);
    kr.color = ColorStrategy::solid("#3366ff");

    let (jp_outcome, kr_outcome) = std::thread::scope(|scope| {
        let jp_handle = scope.spawn(|| service.place(&jp, T0).unwrap());
        let kr_handle = scope.spawn(|| service.place(&kr, T0).unwrap());
        (jp_handle.join().unwrap(), kr_handle.join().unwrap())
    });
    let jp_receipt = committed(jp_outcome);
    let kr_receipt = committed(kr_outcome);
    assert_ne!(jp_receipt.seq, kr_receipt.seq);

    let cell = service.cell(CellKey::new(7, 7)).unwrap().unwrap();
    let (winner, winner_color) = if jp_receipt.seq > kr_receipt.seq {
        ("JP", "#ff4b4b")
    } else {
        ("KR", "#3366ff")
    };
    assert_eq!(cell.group_id.as_str(), winner);
    assert_eq!(cell.color.as_str(), winner_color);
    assert_eq!(cell.seq, jp_receipt.seq.max(kr_receipt.seq));

    let all = bucket_key(PeriodKind::AllTime, T0);
    for code in ["JP", "KR"] {
        assert_eq!(
            service
                .bucket_count(PeriodKind::AllTime, &all, &group(code))
                .unwrap(),
            1
        );
    }
}

#[test]
fn many_concurrent_actors_all_commit_once() {
    let service = service();
    let requests: Vec<PlacementRequest> = (0..16)
        .map(|i| request(&format!("actor-{i}"), "JP", f64::from(i % 4), 0.0, 1))
        .collect();

    std::thread::scope(|scope| {
        for request in &requests {
            let service = &service;
            scope.spawn(move || {
                assert!(service.place(request, T0).unwrap().is_committed());
            });
        }
    });

    let all = bucket_key(PeriodKind::AllTime, T0);
    assert_eq!(
        service
            .bucket_count(PeriodKind::AllTime, &all, &group("JP"))
            .unwrap(),
        16
    );
    let stats = service.group_stats(&group("JP")).unwrap();
    assert_eq!(stats.owned_cells, 4);
    assert_eq!(stats.total_cells, 4);
}

#[test]
fn same_actor_racing_itself_commits_once() {
    let service = service();
    let first = request("alice", "JP", 0.0, 0.0, 1);
    let second = request("alice", "JP", 1.0, 0.0, 1);

    let outcomes = std::thread::scope(|scope| {
        let a = scope.spawn(|| service.place(&first, T0).unwrap());
        let b = scope.spawn(|| service.place(&second, T0).unwrap());
        [a.join().unwrap(), b.join().unwrap()]
    });
    let commits = outcomes.iter().filter(|o| o.is_committed()).count();
    assert_eq!(commits, 1);
}

#[test]
fn reclaiming_own_cells_counts_again_by_default() {
    let service = service();
    committed(service.place(&request("alice", "JP", 0.0, 0.0, 1), T0).unwrap());
    committed(service.place(&request("alice", "JP", 0.0, 0.0, 1), T0 + 10).unwrap());

    let all = bucket_key(PeriodKind::AllTime, T0);
    assert_eq!(
        service
            .bucket_count(PeriodKind::AllTime, &all, &group("JP"))
            .unwrap(),
        2
    );
}

#[test]
fn skip_owned_cells_policy_only_counts_changes() {
    let service = CanvasService::open_in_memory(CanvasConfig {
        reclaim_policy: ReclaimPolicy::SkipOwnedCells,
        ..test_config()
    })
    .unwrap();

    committed(service.place(&request("alice", "JP", 0.0, 0.0, 1), T0).unwrap());

    let overlap = committed(service.place(&request("bob", "JP", 0.0, 0.0, 2), T0).unwrap());
    assert_eq!(overlap.affected_cell_count(), 3);
    assert!(!overlap.affected_cells.contains(&CellKey::new(0, 0)));

    let nothing = service
        .place(&request("carol", "JP", 0.0, 0.0, 1), T0)
        .unwrap();
    assert_eq!(
        nothing,
        PlacementOutcome::Rejected {
            reason: RejectReason::NothingToClaim,
            retry_after_ms: 0,
            next_allowed_at: None,
        }
    );
    assert_eq!(
        service
            .next_allowed_at(&ActorId::parse("carol").unwrap())
            .unwrap(),
        None
    );

    let all = bucket_key(PeriodKind::AllTime, T0);
    assert_eq!(
        service
            .bucket_count(PeriodKind::AllTime, &all, &group("JP"))
            .unwrap(),
        4
    );
}

#[test]
fn captures_are_counted_per_victim() {
    let service = service();
    committed(service.place(&request("alice", "JP", 0.0, 0.0, 2), T0).unwrap());
    committed(service.place(&request("bob", "US", 5.0, 0.0, 1), T0).unwrap());

    // 2x2 over (0..2, 0..2) takes two JP cells; (5,0) is one US cell.
    committed(service.place(&request("carol", "KR", 1.0, 0.0, 2), T0).unwrap());
    committed(service.place(&request("dave", "KR", 5.0, 0.0, 1), T0).unwrap());

    let captures = service.capture_stats(&group("KR")).unwrap();
    let summary: Vec<(&str, u64)> = captures
        .iter()
        .map(|c| (c.victim_group.as_str(), c.count))
        .collect();
    assert_eq!(summary, vec![("JP", 2), ("US", 1)]);

    let jp = service.group_stats(&group("JP")).unwrap();
    assert_eq!(jp.owned_cells, 2);
}

#[test]
fn derived_colors_are_resolved_once_per_placement() {
    let service = service();
    let mut by_group = request("alice", "JP", 0.0, 0.0, 2);
    by_group.color = ColorStrategy::GroupDefault;
    let receipt = committed(service.place(&by_group, T0).unwrap());

    for key in &receipt.affected_cells {
        let cell = service.cell(*key).unwrap().unwrap();
        assert_eq!(cell.color, receipt.color);
        assert_eq!(cell.seq, receipt.seq);
        assert_eq!(cell.updated_at, T0);
    }
}

#[test]
fn older_timestamp_committed_later_does_not_rewind_the_cell() {
    let service = service();
    committed(service.place(&request("alice", "JP", 0.0, 0.0, 1), T0 + 500).unwrap());

    let mut late = request("bob", "KR", 0.0, 0.0, 1);
    late.color = ColorStrategy::solid("#0000ff");
    committed(service.place(&late, T0).unwrap());

    let cell = service.cell(CellKey::new(0, 0)).unwrap().unwrap();
    assert_eq!(cell.group_id, group("KR"));
    assert_eq!(cell.color.as_str(), "#0000ff");
    assert_eq!(cell.updated_at, T0 + 500);

    let recent = service.recent(1);
    assert_eq!(recent[0].updated_at, T0 + 500);
    assert_eq!(
        service
            .bucket_count(PeriodKind::AllTime, &bucket_key(PeriodKind::AllTime, T0), &group("KR"))
            .unwrap(),
        1
    );
}

#[test]
fn wall_clock_placements_stamp_non_decreasing_times() {
    let service = service();
    let receipts: Vec<PlacementReceipt> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = &service;
                scope.spawn(move || {
                    committed(
                        service
                            .place_now(&request(&format!("actor-{i}"), "JP", 0.0, 0.0, 1))
                            .unwrap(),
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(receipts.len(), 8);

    let stamps: Vec<(u64, i64)> = service
        .recent(8)
        .iter()
        .map(|change| (change.seq, change.updated_at))
        .collect();
    assert_eq!(stamps.len(), 8);
    assert!(stamps.windows(2).all(|pair| pair[0].0 < pair[1].0 && pair[0].1 <= pair[1].1));
    let cell = service.cell(CellKey::new(0, 0)).unwrap().unwrap();
    assert_eq!(cell.updated_at, stamps[7].1);
}
