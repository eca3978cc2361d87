use gridclaim_core::{
    CanvasConfig, CanvasService, CellKey, ColorStrategy, Coordinate, PlacementRequest,
    SubscriptionEvent,
};

const T0: i64 = 1_792_000_000_000;

fn service(recent_capacity: usize) -> CanvasService {
    CanvasService::open_in_memory(CanvasConfig {
        cell_size: 1.0,
        base_cooldown_ms: 10,
        recent_capacity,
        ..CanvasConfig::default()
    })
    .unwrap()
}

fn place(service: &CanvasService, actor: &str, group: &str, x: f64, size: u8, color: &str) {
    let outcome = service
        .place(
            &PlacementRequest {
                actor_id: actor.to_string(),
                group_id: group.to_string(),
                anchor: Coordinate::new(x, 0.0),
                footprint_size: size,
                color: ColorStrategy::solid(color),
            },
            T0,
        )
        .unwrap();
    assert!(outcome.is_committed());
}

fn drain(subscription: &mut gridclaim_core::Subscription) -> Vec<SubscriptionEvent> {
    std::iter::from_fn(|| subscription.try_recv()).collect()
}

#[test]
fn subscriber_sees_each_committed_cell_once() {
    let service = service(64);
    let mut subscription = service.subscribe();
    assert!(subscription.take_catch_up().is_empty());

    place(&service, "alice", "JP", 0.0, 2, "#ff0000");

    let events = drain(&mut subscription);
    assert_eq!(events.len(), 4);
    for event in &events {
        match event {
            SubscriptionEvent::Changed(change) => {
                assert_eq!(change.group_id.as_str(), "JP");
                assert_eq!(change.color.as_str(), "#ff0000");
                assert_eq!(change.seq, 1);
                assert_eq!(change.previous_group, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[test]
fn per_cell_order_matches_commit_order() {
    let service = service(64);
    let mut subscription = service.subscribe();

    place(&service, "a", "JP", 0.0, 1, "#ff0000");
    place(&service, "b", "KR", 0.0, 1, "#0000ff");
    place(&service, "c", "US", 0.0, 1, "#00ff00");

    let seen: Vec<(u64, String, Option<String>)> = drain(&mut subscription)
        .into_iter()
        .map(|event| match event {
            SubscriptionEvent::Changed(change) => (
                change.seq,
                change.group_id.to_string(),
                change.previous_group.map(|g| g.to_string()),
            ),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(
        seen,
        vec![
            (1, "JP".to_string(), None),
            (2, "KR".to_string(), Some("JP".to_string())),
            (3, "US".to_string(), Some("KR".to_string())),
        ]
    );

    let cell = service.cell(CellKey::new(0, 0)).unwrap().unwrap();
    assert_eq!(cell.group_id.as_str(), "US");
}

#[test]
fn late_subscriber_catches_up_from_recent_window() {
    let service = service(3);
    for (i, actor) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        place(&service, actor, "JP", i as f64, 1, "#ff0000");
    }

    let mut subscription = service.subscribe();
    let catch_up: Vec<u64> = subscription
        .take_catch_up()
        .iter()
        .map(|change| change.seq)
        .collect();
    assert_eq!(catch_up, vec![3, 4, 5]);

    place(&service, "f", "JP", 10.0, 1, "#ff0000");
    let live = drain(&mut subscription);
    assert_eq!(live.len(), 1);
    assert!(matches!(&live[0], SubscriptionEvent::Changed(change) if change.seq == 6));

    let recent: Vec<u64> = service.recent(2).iter().map(|c| c.seq).collect();
    assert_eq!(recent, vec![5, 6]);
}

#[test]
fn concurrent_placements_reach_subscriber_in_commit_order() {
    let service = service(256);
    let mut subscription = service.subscribe();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let service = &service;
            scope.spawn(move || {
                place(service, &format!("actor-{i}"), "JP", 0.0, 1, "#ff0000");
            });
        }
    });

    let seqs: Vec<u64> = drain(&mut subscription)
        .into_iter()
        .map(|event| match event {
            SubscriptionEvent::Changed(change) => change.seq,
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(seqs, (1..=8).collect::<Vec<u64>>());

    let cell = service.cell(CellKey::new(0, 0)).unwrap().unwrap();
    assert_eq!(cell.seq, 8);
}
