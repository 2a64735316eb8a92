//! Integration tests for `PgProjectionStore` and the projectors running on it.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mercado_affiliation::domain::aggregates::AffiliationStatus;
use mercado_affiliation::domain::details::{ContactInfo, Representative, ZoneDetails};
use mercado_affiliation::domain::events::{
    AffiliationApproved, AffiliationEvent, AffiliationEventKind, AffiliationSubmitted,
};
use mercado_core::event::EventMetadata;
use mercado_core::projection::{CommitOutcome, ProcessedEvent, ProjectionStore};
use mercado_producers::application::command_handlers::PendingApplications;
use mercado_producers::domain::aggregates::ApplicationStatus;
use mercado_producers::domain::events::{
    ProducerApplicationApproved, ProducerApplicationEvent, ProducerApplicationEventKind,
    ProducerApplicationSubmitted,
};
use mercado_producers::domain::profile::ProducerProfile;
use mercado_projection::pg_projection_store::PgProjectionStore;
use mercado_projection::producer_queries::ProducerApplicationQueries;
use mercado_projection::projector::{
    AffiliationProjector, ProducerApplicationProjector, ProjectionOutcome,
};
use mercado_projection::queries::AffiliationQueries;
use mercado_projection::view::AffiliationView;
use mercado_test_support::FixedClock;
use sqlx::PgPool;
use uuid::Uuid;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

fn submitted(affiliation_id: &str, zone_id: &str) -> AffiliationSubmitted {
    AffiliationSubmitted {
        affiliation_id: affiliation_id.to_owned(),
        zone_id: zone_id.to_owned(),
        requester_id: "USR-1".to_owned(),
        details: ZoneDetails {
            hamlet_name: "La Esperanza".to_owned(),
            municipality: "Fusagasugá".to_owned(),
            contact: ContactInfo {
                phone: None,
                email: Some("zona@example.com".to_owned()),
            },
            representative: Representative {
                name: "Ana Gómez".to_owned(),
                document: "1010101010".to_owned(),
                email: "ana@example.com".to_owned(),
            },
        },
    }
}

fn view(affiliation_id: &str, zone_id: &str, version: i64) -> AffiliationView {
    let mut view = AffiliationView::seed(&submitted(affiliation_id, zone_id), 1, base(), base());
    view.version = version;
    view
}

fn processed(aggregate_id: &str) -> ProcessedEvent {
    ProcessedEvent {
        event_id: Uuid::new_v4(),
        aggregate_id: aggregate_id.to_owned(),
        event_type: "affiliation.submitted".to_owned(),
        processed_at: base(),
    }
}

async fn ledger_count(pool: &PgPool) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM processed_events")
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

async fn stored(store: &PgProjectionStore, affiliation_id: &str) -> AffiliationView {
    ProjectionStore::<AffiliationView>::load(store, affiliation_id)
        .await
        .unwrap()
        .unwrap()
}

// --- commit ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_commit_writes_view_and_ledger(pool: PgPool) {
    // Arrange
    let store = PgProjectionStore::new(pool.clone());
    let entry = processed("AFI-1");

    // Act
    let outcome = store.commit(Some(&view("AFI-1", "ZON-1", 1)), &entry).await.unwrap();

    // Assert
    assert_eq!(outcome, CommitOutcome::Committed);
    assert!(
        ProjectionStore::<AffiliationView>::is_processed(&store, entry.event_id)
            .await
            .unwrap()
    );
    let loaded = stored(&store, "AFI-1").await;
    assert_eq!(loaded, view("AFI-1", "ZON-1", 1));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_ledger_conflict_leaves_view_untouched(pool: PgPool) {
    // Arrange
    let store = PgProjectionStore::new(pool.clone());
    let entry = processed("AFI-1");
    store.commit(Some(&view("AFI-1", "ZON-1", 1)), &entry).await.unwrap();
    let mut changed = view("AFI-1", "ZON-1", 2);
    changed.state = AffiliationStatus::Approved;

    // Act
    let outcome = store.commit(Some(&changed), &entry).await.unwrap();

    // Assert
    assert_eq!(outcome, CommitOutcome::AlreadyProcessed);
    let loaded = stored(&store, "AFI-1").await;
    assert_eq!(loaded.version, 1);
    assert_eq!(loaded.state, AffiliationStatus::Pending);
    assert_eq!(ledger_count(&pool).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_upsert_never_lowers_the_stored_version(pool: PgPool) {
    // Arrange
    let store = PgProjectionStore::new(pool.clone());
    let mut newer = view("AFI-1", "ZON-1", 3);
    newer.state = AffiliationStatus::Rejected;
    store.commit(Some(&newer), &processed("AFI-1")).await.unwrap();

    // Act
    let outcome = store
        .commit(Some(&view("AFI-1", "ZON-1", 2)), &processed("AFI-1"))
        .await
        .unwrap();

    // Assert
    assert_eq!(outcome, CommitOutcome::Committed);
    let loaded = stored(&store, "AFI-1").await;
    assert_eq!(loaded.version, 3);
    assert_eq!(loaded.state, AffiliationStatus::Rejected);
    assert_eq!(ledger_count(&pool).await, 2);
}

// --- queries ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_indexed_lookups(pool: PgPool) {
    // Arrange
    let store = PgProjectionStore::new(pool.clone());
    let mut approved = view("AFI-2", "ZON-1", 2);
    approved.state = AffiliationStatus::Approved;
    approved.requester_id = "USR-2".to_owned();
    for v in [view("AFI-1", "ZON-1", 1), approved, view("AFI-3", "ZON-2", 1)] {
        store.commit(Some(&v), &processed(&v.id)).await.unwrap();
    }

    // Act
    let zone = store.by_zone("ZON-1").await.unwrap();
    let pending = store.by_state(AffiliationStatus::Pending).await.unwrap();
    let by_requester = store.by_requester("USR-2").await.unwrap();
    let missing = store.get("AFI-404").await.unwrap();

    // Assert
    assert_eq!(zone.len(), 2);
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|v| v.state == AffiliationStatus::Pending));
    assert_eq!(by_requester.len(), 1);
    assert_eq!(by_requester[0].id, "AFI-2");
    assert!(missing.is_none());
}

// --- projector on Postgres ---

#[sqlx::test(migrations = "../../migrations")]
async fn test_projector_converges_under_redelivery_and_reordering(pool: PgPool) {
    // Arrange
    let store = Arc::new(PgProjectionStore::new(pool.clone()));
    let projector = AffiliationProjector::new(store.clone(), Arc::new(FixedClock(base())));
    let submission = AffiliationEvent {
        event_id: Uuid::new_v4(),
        occurred_at: base(),
        metadata: EventMetadata::new("ZoneAffiliation", "AFI-1", 1).with_partition_key("ZON-1"),
        kind: AffiliationEventKind::AffiliationSubmitted(submitted("AFI-1", "ZON-1")),
    };
    let approval = AffiliationEvent {
        event_id: Uuid::new_v4(),
        occurred_at: base() + Duration::minutes(5),
        metadata: EventMetadata::new("ZoneAffiliation", "AFI-1", 2).with_partition_key("ZON-1"),
        kind: AffiliationEventKind::AffiliationApproved(AffiliationApproved {
            affiliation_id: "AFI-1".to_owned(),
            zone_id: "ZON-1".to_owned(),
            requester_id: "USR-1".to_owned(),
            decided_by: "USR-admin".to_owned(),
            notes: None,
        }),
    };

    // Act
    projector.apply(&submission).await.unwrap();
    projector.apply(&approval).await.unwrap();
    let again = projector.apply(&approval).await.unwrap();
    let late = projector.apply(&submission).await.unwrap();

    // Assert
    assert_eq!(again, ProjectionOutcome::Duplicate);
    assert_eq!(late, ProjectionOutcome::Duplicate);
    let view = store.get("AFI-1").await.unwrap().unwrap();
    assert_eq!(view.state, AffiliationStatus::Approved);
    assert_eq!(view.version, 2);
    assert_eq!(view.decided_at, Some(approval.occurred_at));
    assert_eq!(ledger_count(&pool).await, 2);
}

// --- producer applications ---

fn application_event(
    application_id: &str,
    version: i64,
    kind: ProducerApplicationEventKind,
) -> ProducerApplicationEvent {
    ProducerApplicationEvent {
        event_id: Uuid::new_v4(),
        occurred_at: base() + Duration::minutes(version),
        metadata: EventMetadata::new("ProducerApplication", application_id, version)
            .with_partition_key("ZON-1"),
        kind,
    }
}

fn application_submitted(application_id: &str) -> ProducerApplicationEventKind {
    ProducerApplicationEventKind::Submitted(ProducerApplicationSubmitted {
        application_id: application_id.to_owned(),
        zone_id: "ZON-1".to_owned(),
        producer_id: "USR-7".to_owned(),
        profile: ProducerProfile {
            producer_name: "Finca El Roble".to_owned(),
            document: "52000111".to_owned(),
            phone: None,
            email: Some("roble@example.com".to_owned()),
            address: Some("Vereda La Esperanza, km 3".to_owned()),
            product_types: Some("café, plátano".to_owned()),
        },
    })
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_producer_projector_shares_the_ledger_and_tracks_pending(pool: PgPool) {
    // Arrange
    let store = Arc::new(PgProjectionStore::new(pool.clone()));
    let projector = ProducerApplicationProjector::new(store.clone(), Arc::new(FixedClock(base())));
    let submission = application_event("PAP-1", 1, application_submitted("PAP-1"));
    let approval = application_event(
        "PAP-1",
        2,
        ProducerApplicationEventKind::Approved(ProducerApplicationApproved {
            application_id: "PAP-1".to_owned(),
            zone_id: "ZON-1".to_owned(),
            producer_id: "USR-7".to_owned(),
            decided_by: "USR-zone-admin".to_owned(),
            notes: None,
        }),
    );

    // Act
    projector.apply(&submission).await.unwrap();
    let while_pending = store.pending_application("USR-7", "ZON-1").await.unwrap();
    projector.apply(&approval).await.unwrap();
    let after_approval = store.pending_application("USR-7", "ZON-1").await.unwrap();
    let again = projector.apply(&approval).await.unwrap();

    // Assert
    assert_eq!(while_pending.as_deref(), Some("PAP-1"));
    assert!(after_approval.is_none());
    assert_eq!(again, ProjectionOutcome::Duplicate);
    let view = store.get_application("PAP-1").await.unwrap().unwrap();
    assert_eq!(view.state, ApplicationStatus::Approved);
    assert_eq!(view.address.as_deref(), Some("Vereda La Esperanza, km 3"));
    assert_eq!(view.version, 2);
    assert_eq!(store.applications_by_producer("USR-7").await.unwrap().len(), 1);
    assert_eq!(ledger_count(&pool).await, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_producer_view_keeps_a_long_address(pool: PgPool) {
    // Arrange
    let store = Arc::new(PgProjectionStore::new(pool.clone()));
    let projector = ProducerApplicationProjector::new(store.clone(), Arc::new(FixedClock(base())));
    let mut kind = application_submitted("PAP-2");
    if let ProducerApplicationEventKind::Submitted(submitted) = &mut kind {
        submitted.profile.address = Some("a".repeat(300));
    }

    // Act
    let outcome = projector
        .apply(&application_event("PAP-2", 1, kind))
        .await
        .unwrap();

    // Assert
    assert_eq!(outcome, ProjectionOutcome::Applied);
    let view = store.get_application("PAP-2").await.unwrap().unwrap();
    assert_eq!(view.address.map(|a| a.chars().count()), Some(300));
}
