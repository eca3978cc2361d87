use gridclaim_core::{
    bucket_key, CanvasConfig, CanvasService, ColorStrategy, Coordinate, GroupId, PeriodId,
    PeriodKind, PlacementRequest,
};

fn ms(rfc3339: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .timestamp_millis()
}

fn service() -> CanvasService {
    CanvasService::open_in_memory(CanvasConfig {
        cell_size: 1.0,
        base_cooldown_ms: 10,
        ..CanvasConfig::default()
    })
    .unwrap()
}

fn place(service: &CanvasService, actor: &str, group: &str, x: f64, size: u8, at: i64) {
    let outcome = service
        .place(
            &PlacementRequest {
                actor_id: actor.to_string(),
                group_id: group.to_string(),
                anchor: Coordinate::new(x, 0.0),
                footprint_size: size,
                color: ColorStrategy::PositionHue,
            },
            at,
        )
        .unwrap();
    assert!(outcome.is_committed(), "{outcome:?}");
}

fn count(service: &CanvasService, kind: PeriodKind, period: &str, group: &str) -> u64 {
    service
        .bucket_count(
            kind,
            &PeriodId::new(period),
            &GroupId::parse(group).unwrap(),
        )
        .unwrap()
}

#[test]
fn placement_increments_every_period_by_cells_claimed() {
    let service = service();
    let at = ms("2026-10-16T12:00:00Z");
    place(&service, "alice", "JP", 0.0, 3, at);

    assert_eq!(count(&service, PeriodKind::Day, "2026-10-16", "JP"), 9);
    assert_eq!(count(&service, PeriodKind::Week, "2026-W42", "JP"), 9);
    assert_eq!(count(&service, PeriodKind::Month, "2026-10", "JP"), 9);
    assert_eq!(count(&service, PeriodKind::AllTime, "all", "JP"), 9);
}

#[test]
fn day_rollover_starts_a_new_day_bucket_only() {
    let service = service();
    place(&service, "alice", "JP", 0.0, 1, ms("2026-10-16T23:59:59Z"));
    place(&service, "alice", "JP", 1.0, 1, ms("2026-10-17T00:00:01Z"));

    assert_eq!(count(&service, PeriodKind::Day, "2026-10-16", "JP"), 1);
    assert_eq!(count(&service, PeriodKind::Day, "2026-10-17", "JP"), 1);
    assert_eq!(count(&service, PeriodKind::Week, "2026-W42", "JP"), 2);
    assert_eq!(count(&service, PeriodKind::Month, "2026-10", "JP"), 2);
    assert_eq!(count(&service, PeriodKind::AllTime, "all", "JP"), 2);
}

#[test]
fn unseen_bucket_reads_as_zero() {
    let service = service();
    assert_eq!(count(&service, PeriodKind::Day, "1999-01-01", "JP"), 0);
}

#[test]
fn bucket_sums_match_claimed_cells_even_when_overwritten() {
    let service = service();
    let at = ms("2026-10-16T08:00:00Z");
    place(&service, "a1", "JP", 0.0, 2, at);
    place(&service, "a2", "KR", 0.0, 2, at);
    place(&service, "a3", "JP", 0.0, 1, at);

    // Counters record claims, not current ownership.
    assert_eq!(count(&service, PeriodKind::AllTime, "all", "JP"), 5);
    assert_eq!(count(&service, PeriodKind::AllTime, "all", "KR"), 4);

    let jp = service
        .group_stats(&GroupId::parse("JP").unwrap())
        .unwrap();
    assert_eq!(jp.owned_cells, 1);
    assert_eq!(jp.total_cells, 4);
}

#[test]
fn leaderboard_ranks_by_count_then_group() {
    let service = service();
    let at = ms("2026-10-16T08:00:00Z");
    place(&service, "a1", "KR", 0.0, 2, at);
    place(&service, "a2", "JP", 10.0, 2, at);
    place(&service, "a3", "US", 20.0, 3, at);
    place(&service, "a4", "BR", 30.0, 1, at);

    let board = service.leaderboard(PeriodKind::Day, at, Some(3)).unwrap();
    assert_eq!(board.period_kind, PeriodKind::Day);
    assert_eq!(board.period_id.as_str(), "2026-10-16");
    let rows: Vec<(u32, &str, u64)> = board
        .entries
        .iter()
        .map(|e| (e.rank, e.group_id.as_str(), e.count))
        .collect();
    assert_eq!(rows, vec![(1, "US", 9), (2, "JP", 4), (3, "KR", 4)]);
}

#[test]
fn leaderboard_for_past_period_is_preserved() {
    let service = service();
    let yesterday = ms("2026-10-15T10:00:00Z");
    let today = ms("2026-10-16T10:00:00Z");
    place(&service, "a1", "JP", 0.0, 1, yesterday);
    place(&service, "a2", "KR", 1.0, 2, today);

    let board = service
        .leaderboard_for_period(PeriodKind::Day, bucket_key(PeriodKind::Day, yesterday), None)
        .unwrap();
    assert_eq!(board.entries.len(), 1);
    assert_eq!(board.entries[0].group_id.as_str(), "JP");

    let today_board = service.leaderboard(PeriodKind::Day, today, None).unwrap();
    assert_eq!(today_board.entries.len(), 1);
    assert_eq!(today_board.entries[0].group_id.as_str(), "KR");
}

#[test]
fn leaderboard_limit_defaults_and_clamps() {
    let service = service();
    let at = ms("2026-10-16T08:00:00Z");
    for i in 0..8 {
        place(&service, &format!("a{i}"), &format!("G{i}"), f64::from(i), 1, at);
    }

    let default = service.leaderboard(PeriodKind::AllTime, at, None).unwrap();
    assert_eq!(default.entries.len(), 5);
    let all = service.leaderboard(PeriodKind::AllTime, at, Some(500)).unwrap();
    assert_eq!(all.entries.len(), 8);
}
