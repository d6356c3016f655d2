//! Engine tests against the in-memory store

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_core::config::InventoryConfig;
use parking_core::models::{
    ClientIdentity, MobilityFlag, PaymentFilter, PaymentMode, PlaceType, TicketFilter,
    TicketStatus,
};
use parking_core::traits::Pagination;
use parking_core::{AppError, ErrorKind};
use parking_db::MemoryStore;
use parking_services::{Eligibility, EngineSettings, ManualClock, ParkingEngine};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

fn identity(phone: &str) -> ClientIdentity {
    ClientIdentity::new("Martin", "Paul", phone)
}

async fn engine_with(
    standard: u32,
    pmr: u32,
    settings: EngineSettings,
) -> (Arc<ParkingEngine<MemoryStore>>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start()));
    let engine = ParkingEngine::new(Arc::new(MemoryStore::new()), settings, clock.clone());

    engine
        .bootstrap(&InventoryConfig {
            standard_places: standard,
            pmr_places: pmr,
            subscriber_rate: Some(dec!(2.0)),
            non_subscriber_rate: Some(dec!(5.0)),
        })
        .await
        .unwrap();

    (Arc::new(engine), clock)
}

async fn engine(standard: u32, pmr: u32) -> (Arc<ParkingEngine<MemoryStore>>, Arc<ManualClock>) {
    engine_with(standard, pmr, EngineSettings::default()).await
}

#[tokio::test]
async fn test_two_concurrent_entries_for_one_place() {
    let (engine, _) = engine(1, 0).await;

    let id_a = identity("0600000001");
    let id_b = identity("0600000002");
    let (a, b) = tokio::join!(
        engine.open_ticket(&id_a, MobilityFlag::Standard),
        engine.open_ticket(&id_b, MobilityFlag::Standard),
    );

    let results = [a, b];
    let opened = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::NoAvailability(_))))
        .count();
    assert_eq!(opened, 1);
    assert_eq!(refused, 1);

    let stats = engine.statistics().await.unwrap();
    assert_eq!(stats.occupied_places, 1);
    assert_eq!(stats.open_tickets, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_entries_never_exceed_capacity() {
    let (engine, _) = engine(3, 1).await;

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .open_ticket(&identity(&format!("06000001{:02}", i)), MobilityFlag::Standard)
                    .await
            })
        })
        .collect();

    let mut place_ids = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(ticket) => place_ids.push(ticket.place_id),
            Err(e) => assert_eq!(e.kind(), ErrorKind::Capacity),
        }
    }

    assert_eq!(place_ids.len(), 3);
    place_ids.sort();
    place_ids.dedup();
    assert_eq!(place_ids.len(), 3, "a place was handed out twice");

    // the PMR place was never given to a standard client
    let pmr_free = engine.available_places(Some(PlaceType::Pmr)).await.unwrap();
    assert_eq!(pmr_free.len(), 1);
}

#[tokio::test]
async fn test_subscriber_and_visitor_fares() {
    let (engine, clock) = engine(2, 0).await;

    let subscriber = engine
        .register_client(&identity("0600000010"), MobilityFlag::Standard)
        .await
        .unwrap();
    let outcome = engine.subscribe(subscriber.id, None).await.unwrap();
    assert!(outcome.was_created());

    let t1 = engine
        .open_ticket(&identity("0600000010"), MobilityFlag::Standard)
        .await
        .unwrap();
    assert_eq!(t1.client_id, subscriber.id);
    let t2 = engine
        .open_ticket(&identity("0600000011"), MobilityFlag::Standard)
        .await
        .unwrap();

    clock.advance(Duration::minutes(150));

    let closed_sub = engine.close_ticket(t1.id, PaymentMode::Card).await.unwrap();
    let closed_visitor = engine.close_ticket(t2.id, PaymentMode::Cash).await.unwrap();

    assert_eq!(closed_sub.payment.amount, dec!(6.0));
    assert_eq!(closed_sub.ticket.hourly_rate, Some(dec!(2.0)));
    assert_eq!(closed_visitor.payment.amount, dec!(15.0));
    assert_eq!(closed_visitor.ticket.amount, Some(dec!(15.0)));
    assert_eq!(closed_visitor.payment.mode, PaymentMode::Cash);
    assert_eq!(
        closed_visitor.ticket.exit_time,
        Some(start() + Duration::minutes(150))
    );

    let stats = engine.statistics().await.unwrap();
    assert_eq!(stats.daily_revenue, dec!(21.0));
    assert_eq!(stats.valid_payments, 2);
    assert_eq!(stats.total_subscribers, 1);
    assert_eq!(stats.total_clients, 2);
}

#[tokio::test]
async fn test_close_twice() {
    let (engine, clock) = engine(1, 0).await;

    let ticket = engine
        .open_ticket(&identity("0600000020"), MobilityFlag::Standard)
        .await
        .unwrap();
    clock.advance(Duration::minutes(30));

    engine.close_ticket(ticket.id, PaymentMode::Cash).await.unwrap();
    let second = engine.close_ticket(ticket.id, PaymentMode::Cash).await;
    assert!(matches!(second, Err(AppError::AlreadyClosed(id)) if id == ticket.id));

    let (payments, total) = engine
        .list_payments(&PaymentFilter::default(), &Pagination::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(payments[0].payment.amount, dec!(5.0));
}

#[tokio::test]
async fn test_concurrent_closes_bill_once() {
    let (engine, clock) = engine(1, 0).await;

    let ticket = engine
        .open_ticket(&identity("0600000021"), MobilityFlag::Standard)
        .await
        .unwrap();
    clock.advance(Duration::hours(1));

    let (a, b) = tokio::join!(
        engine.close_ticket(ticket.id, PaymentMode::Card),
        engine.close_ticket(ticket.id, PaymentMode::Cash),
    );
    assert_eq!([&a, &b].iter().filter(|r| r.is_ok()).count(), 1);
    assert!([&a, &b]
        .iter()
        .any(|r| matches!(r, Err(AppError::AlreadyClosed(_)))));

    assert_eq!(engine.statistics().await.unwrap().valid_payments, 1);
}

#[tokio::test]
async fn test_unknown_ticket() {
    let (engine, _) = engine(1, 0).await;
    let result = engine.close_ticket(404, PaymentMode::Cash).await;
    assert!(matches!(result, Err(AppError::TicketNotFound(_))));
}

#[tokio::test]
async fn test_release_makes_place_available_again() {
    let (engine, clock) = engine(1, 0).await;

    let first = engine
        .open_ticket(&identity("0600000030"), MobilityFlag::Standard)
        .await
        .unwrap();
    let refused = engine
        .open_ticket(&identity("0600000031"), MobilityFlag::Standard)
        .await;
    assert!(matches!(refused, Err(AppError::NoAvailability(_))));

    clock.advance(Duration::minutes(5));
    engine.close_ticket(first.id, PaymentMode::Cash).await.unwrap();

    let second = engine
        .open_ticket(&identity("0600000031"), MobilityFlag::Standard)
        .await
        .unwrap();
    assert_eq!(second.place_id, first.place_id);
}

#[tokio::test]
async fn test_statistics_three_of_ten() {
    let (engine, _) = engine(10, 0).await;

    for i in 0..3 {
        engine
            .open_ticket(&identity(&format!("06000004{:02}", i)), MobilityFlag::Standard)
            .await
            .unwrap();
    }

    let stats = engine.statistics().await.unwrap();
    assert_eq!(stats.total_places, 10);
    assert_eq!(stats.occupied_places, 3);
    assert_eq!(stats.occupancy_rate, 30.0);
    assert_eq!(stats.free_rate, 70.0);
    assert_eq!(stats.daily_revenue, dec!(0));
}

#[tokio::test]
async fn test_daily_revenue_counts_today_only() {
    let (engine, clock) = engine(2, 0).await;

    let yesterday = engine
        .open_ticket(&identity("0600000050"), MobilityFlag::Standard)
        .await
        .unwrap();
    clock.advance(Duration::hours(1));
    engine.close_ticket(yesterday.id, PaymentMode::Cash).await.unwrap();

    clock.advance(Duration::days(1));
    let today = engine
        .open_ticket(&identity("0600000051"), MobilityFlag::Standard)
        .await
        .unwrap();
    clock.advance(Duration::hours(2));
    engine.close_ticket(today.id, PaymentMode::Cash).await.unwrap();

    let stats = engine.statistics().await.unwrap();
    assert_eq!(stats.daily_revenue, dec!(10.0));
    assert_eq!(stats.valid_payments, 2);

    let (from, until) = engine
        .day_window(Some(start().date_naive()), Some(start().date_naive()))
        .unwrap();
    let (payments, total) = engine
        .list_payments(
            &PaymentFilter {
                client_id: None,
                paid_from: from,
                paid_until: until,
            },
            &Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(payments[0].payment.ticket_id, yesterday.id);
}

#[tokio::test]
async fn test_invalid_tariff_update_keeps_rates() {
    let (engine, _) = engine(1, 0).await;

    let result = engine.update_tariffs(dec!(3.0), dec!(0)).await;
    assert!(matches!(result, Err(AppError::InvalidRate(_))));
    let result = engine.update_tariffs(dec!(-1), dec!(4.0)).await;
    assert!(matches!(result, Err(AppError::InvalidRate(_))));

    let current = engine.current_tariffs().await.unwrap();
    assert_eq!(current.subscriber.hourly_rate, dec!(2.0));
    assert_eq!(current.non_subscriber.hourly_rate, dec!(5.0));
    assert_eq!(engine.list_tariffs(true).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_tariff_update_applies_to_future_closes_only() {
    let (engine, clock) = engine(2, 0).await;

    let early = engine
        .open_ticket(&identity("0600000060"), MobilityFlag::Standard)
        .await
        .unwrap();
    let late = engine
        .open_ticket(&identity("0600000061"), MobilityFlag::Standard)
        .await
        .unwrap();
    clock.advance(Duration::hours(1));

    let closed_early = engine.close_ticket(early.id, PaymentMode::Cash).await.unwrap();
    let schedule = engine.update_tariffs(dec!(1.5), dec!(8.0)).await.unwrap();
    assert_eq!(schedule.non_subscriber.version, 2);
    let closed_late = engine.close_ticket(late.id, PaymentMode::Cash).await.unwrap();

    assert_eq!(closed_early.payment.amount, dec!(5.0));
    assert_eq!(closed_late.payment.amount, dec!(8.0));

    let stored_early = engine.get_ticket(early.id).await.unwrap();
    assert_eq!(stored_early.ticket.hourly_rate, Some(dec!(5.0)));
    assert_ne!(stored_early.ticket.tariff_id, closed_late.ticket.tariff_id);
    assert_eq!(engine.list_tariffs(true).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_missing_tariff_leaves_ticket_open() {
    let clock = Arc::new(ManualClock::new(start()));
    let engine = ParkingEngine::new(
        Arc::new(MemoryStore::new()),
        EngineSettings::default(),
        clock.clone(),
    );
    engine
        .bootstrap(&InventoryConfig {
            standard_places: 1,
            ..Default::default()
        })
        .await
        .unwrap();

    let ticket = engine
        .open_ticket(&identity("0600000070"), MobilityFlag::Standard)
        .await
        .unwrap();
    clock.advance(Duration::hours(1));

    let result = engine.close_ticket(ticket.id, PaymentMode::Cash).await;
    assert!(matches!(result, Err(AppError::TariffNotFound(_))));

    let record = engine.get_ticket(ticket.id).await.unwrap();
    assert_eq!(record.status, TicketStatus::Open);
    let stats = engine.statistics().await.unwrap();
    assert_eq!(stats.occupied_places, 1);
    assert_eq!(stats.valid_payments, 0);
}

#[tokio::test]
async fn test_client_already_parked() {
    let (engine, _) = engine(2, 0).await;

    let ticket = engine
        .open_ticket(&identity("0600000080"), MobilityFlag::Standard)
        .await
        .unwrap();
    let again = engine
        .open_ticket(&identity(" 0600000080 "), MobilityFlag::Standard)
        .await;

    match again {
        Err(AppError::AlreadyParked { ticket_id, .. }) => assert_eq!(ticket_id, ticket.id),
        other => panic!("expected AlreadyParked, got {:?}", other),
    }
    assert_eq!(engine.statistics().await.unwrap().occupied_places, 1);
}

#[tokio::test]
async fn test_multiple_tickets_when_policy_allows() {
    let settings = EngineSettings {
        single_open_ticket_per_client: false,
        ..Default::default()
    };
    let (engine, _) = engine_with(2, 0, settings).await;

    engine
        .open_ticket(&identity("0600000081"), MobilityFlag::Standard)
        .await
        .unwrap();
    engine
        .open_ticket(&identity("0600000081"), MobilityFlag::Standard)
        .await
        .unwrap();

    assert_eq!(engine.statistics().await.unwrap().total_clients, 1);
}

#[tokio::test]
async fn test_pmr_allocation() {
    let (engine, _) = engine(1, 1).await;

    let pmr = engine
        .open_ticket(&identity("0600000090"), MobilityFlag::Pmr)
        .await
        .unwrap();
    let record = engine.get_ticket(pmr.id).await.unwrap();
    assert_eq!(record.place_type, PlaceType::Pmr);

    // strict policy: second PMR client does not take the standard place
    let refused = engine
        .open_ticket(&identity("0600000091"), MobilityFlag::Pmr)
        .await;
    assert!(matches!(refused, Err(AppError::NoAvailability(_))));
}

#[tokio::test]
async fn test_pmr_fallback_to_standard() {
    let settings = EngineSettings {
        eligibility: Eligibility {
            pmr_may_use_standard: true,
            standard_may_use_pmr: false,
        },
        ..Default::default()
    };
    let (engine, _) = engine_with(1, 1, settings).await;

    engine
        .open_ticket(&identity("0600000092"), MobilityFlag::Pmr)
        .await
        .unwrap();
    let fallback = engine
        .open_ticket(&identity("0600000093"), MobilityFlag::Pmr)
        .await
        .unwrap();
    let record = engine.get_ticket(fallback.id).await.unwrap();
    assert_eq!(record.place_type, PlaceType::Standard);

    let refused = engine
        .open_ticket(&identity("0600000094"), MobilityFlag::Standard)
        .await;
    assert!(matches!(refused, Err(AppError::NoAvailability(_))));
}

#[tokio::test]
async fn test_subscribe_is_idempotent() {
    let (engine, _) = engine(1, 0).await;

    let (client, first) = engine
        .subscribe_identity(&identity("0600000100"), MobilityFlag::Standard, None)
        .await
        .unwrap();
    assert!(first.was_created());
    assert_eq!(first.subscription().since, start().date_naive());

    let second = engine.subscribe(client.id, None).await.unwrap();
    assert!(!second.was_created());
    assert_eq!(second.subscription().id, first.subscription().id);

    assert!(engine.is_subscriber(client.id).await.unwrap());
    assert_eq!(engine.list_subscriptions(true).await.unwrap().len(), 1);

    engine.cancel_subscription(client.id).await.unwrap();
    assert!(!engine.is_subscriber(client.id).await.unwrap());
    assert!(matches!(
        engine.cancel_subscription(client.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        engine.subscribe(999, None).await,
        Err(AppError::ClientNotFound(_))
    ));
}

#[tokio::test]
async fn test_client_registry() {
    let (engine, clock) = engine(1, 0).await;

    let a = engine
        .register_client(&identity("0600000110"), MobilityFlag::Standard)
        .await
        .unwrap();
    let again = engine
        .register_client(&identity("0600000110"), MobilityFlag::Pmr)
        .await
        .unwrap();
    assert_eq!(a.id, again.id);

    let b = engine
        .register_client(&ClientIdentity::new("Bernard", "Lea", "0600000111"), MobilityFlag::Pmr)
        .await
        .unwrap();

    let dup = engine
        .update_client(b.id, &identity("0600000110"), MobilityFlag::Pmr)
        .await;
    assert!(matches!(dup, Err(AppError::DuplicatePhone(_))));

    let blank = engine
        .register_client(&ClientIdentity::new("  ", "Lea", "0600000112"), MobilityFlag::Pmr)
        .await;
    assert_eq!(blank.unwrap_err().kind(), ErrorKind::BadInput);

    let (clients, total) = engine.list_clients(&Pagination::default()).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(clients[0].surname, "Bernard");

    // client with an open ticket cannot be deleted
    let ticket = engine
        .open_ticket(&identity("0600000110"), MobilityFlag::Standard)
        .await
        .unwrap();
    assert!(matches!(
        engine.delete_client(a.id).await,
        Err(AppError::ClientHasOpenTicket(_))
    ));

    clock.advance(Duration::minutes(10));
    engine.close_ticket(ticket.id, PaymentMode::Cash).await.unwrap();
    engine.delete_client(a.id).await.unwrap();
    assert!(matches!(
        engine.get_client(a.id).await,
        Err(AppError::ClientNotFound(_))
    ));
}

#[tokio::test]
async fn test_ticket_listing_filters() {
    let (engine, clock) = engine(3, 0).await;

    let first = engine
        .open_ticket(&identity("0600000120"), MobilityFlag::Standard)
        .await
        .unwrap();
    clock.advance(Duration::minutes(1));
    let second = engine
        .open_ticket(&identity("0600000121"), MobilityFlag::Standard)
        .await
        .unwrap();
    clock.advance(Duration::minutes(1));
    engine.close_ticket(first.id, PaymentMode::Cash).await.unwrap();

    let (all, total) = engine
        .list_tickets(&TicketFilter::default(), &Pagination::default())
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(all[0].ticket.id, second.id, "newest entry first");

    let open_only = TicketFilter {
        open_only: true,
        ..Default::default()
    };
    let (open, total) = engine
        .list_tickets(&open_only, &Pagination::default())
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(open[0].ticket.id, second.id);
    assert_eq!(open[0].status, TicketStatus::Open);

    let by_client = TicketFilter {
        client_id: Some(first.client_id),
        ..Default::default()
    };
    let (mine, _) = engine
        .list_tickets(&by_client, &Pagination::default())
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, TicketStatus::Closed);
}
