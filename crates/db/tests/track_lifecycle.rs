//! Integration tests for the track state machine.
//!
//! Exercises the repository layer against a real database to verify that:
//! - Status transitions follow draft -> generating -> ready | failed, with
//!   failed -> generating permitted as a retry
//! - Batch indexes are allocated atomically and never reused, even after
//!   earlier batches lose all their variants
//! - `primary_variant_id` can only reference a variant of the same track
//! - Soft-deleted tracks surface in the cleanup query once their retention
//!   window elapses, and hard-delete cascades to child rows

use chrono::{Duration, Utc};
use sqlx::PgPool;
use songforge_db::models::status::TrackStatus;
use songforge_db::models::track::CreateTrack;
use songforge_db::models::track_variant::CreateTrackVariant;
use songforge_db::repositories::{TrackRepo, TrackVariantRepo};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_track(device_id: &str) -> CreateTrack {
    CreateTrack {
        device_id: device_id.to_string(),
        title: Some("Lifecycle Test".to_string()),
        style: Some("lofi".to_string()),
    }
}

fn new_variant(track_id: i64, variant: &str, batch_index: i32) -> CreateTrackVariant {
    CreateTrackVariant {
        track_id,
        variant: variant.to_string(),
        batch_index,
        audio_url: format!("https://vendor.test/{track_id}/{variant}.mp3"),
        image_url: None,
        image_large_url: None,
        duration_secs: Some(30.0),
        provider: "suno".to_string(),
        similarity_score: None,
        quality_score: None,
    }
}

// ---------------------------------------------------------------------------
// Test: status transitions
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_new_track_starts_as_draft(pool: PgPool) {
    let track = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();

    assert_eq!(track.status_id, TrackStatus::Draft.id());
    assert_eq!(track.last_batch_index, 0);
    assert!(track.primary_variant_id.is_none());
    assert!(track.deleted_at.is_none());
}

#[sqlx::test]
async fn test_generating_guard_rejects_double_entry(pool: PgPool) {
    let track = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();

    let first = TrackRepo::set_generating(&pool, track.id).await.unwrap();
    assert!(first, "draft -> generating should succeed");

    let second = TrackRepo::set_generating(&pool, track.id).await.unwrap();
    assert!(!second, "a track already generating must not re-enter");
}

#[sqlx::test]
async fn test_failed_track_can_retry_generation(pool: PgPool) {
    let track = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();

    TrackRepo::set_generating(&pool, track.id).await.unwrap();
    TrackRepo::set_failed(&pool, track.id).await.unwrap();

    let retried = TrackRepo::set_generating(&pool, track.id).await.unwrap();
    assert!(retried, "failed -> generating is the retry path");

    let row = TrackRepo::find_by_id(&pool, track.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, TrackStatus::Generating.id());
}

#[sqlx::test]
async fn test_ready_records_the_resolved_style(pool: PgPool) {
    let track = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();

    TrackRepo::set_generating(&pool, track.id).await.unwrap();
    TrackRepo::set_ready(&pool, track.id, "jazz fusion").await.unwrap();

    let row = TrackRepo::find_by_id(&pool, track.id).await.unwrap().unwrap();
    assert_eq!(row.status_id, TrackStatus::Ready.id());
    assert_eq!(row.style.as_deref(), Some("jazz fusion"));
}

// ---------------------------------------------------------------------------
// Test: batch index allocation
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_batch_indexes_are_strictly_increasing(pool: PgPool) {
    let track = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();

    assert_eq!(TrackRepo::next_batch_index(&pool, track.id).await.unwrap(), 1);
    assert_eq!(TrackRepo::next_batch_index(&pool, track.id).await.unwrap(), 2);
    assert_eq!(TrackRepo::next_batch_index(&pool, track.id).await.unwrap(), 3);
}

#[sqlx::test]
async fn test_batch_indexes_survive_losing_all_variants(pool: PgPool) {
    let track = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();

    let batch = TrackRepo::next_batch_index(&pool, track.id).await.unwrap();
    let a = TrackVariantRepo::create(&pool, &new_variant(track.id, "A", batch))
        .await
        .unwrap();
    let b = TrackVariantRepo::create(&pool, &new_variant(track.id, "B", batch))
        .await
        .unwrap();

    // Wipe the whole first batch, as if both downloads had failed and the
    // rows were purged.
    for id in [a.id, b.id] {
        sqlx::query("DELETE FROM track_variants WHERE id = $1")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();
    }

    let next = TrackRepo::next_batch_index(&pool, track.id).await.unwrap();
    assert_eq!(next, 2, "a wiped batch index must never be reused");
}

#[sqlx::test]
async fn test_batch_indexes_are_per_track(pool: PgPool) {
    let first = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();
    let second = TrackRepo::create(&pool, &new_track("dev-2")).await.unwrap();

    assert_eq!(TrackRepo::next_batch_index(&pool, first.id).await.unwrap(), 1);
    assert_eq!(TrackRepo::next_batch_index(&pool, first.id).await.unwrap(), 2);
    assert_eq!(
        TrackRepo::next_batch_index(&pool, second.id).await.unwrap(),
        1,
        "counters are independent per track"
    );
}

// ---------------------------------------------------------------------------
// Test: primary variant ownership
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_primary_variant_must_belong_to_the_track(pool: PgPool) {
    let track = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();
    let other = TrackRepo::create(&pool, &new_track("dev-2")).await.unwrap();

    let own = TrackVariantRepo::create(&pool, &new_variant(track.id, "A", 1))
        .await
        .unwrap();
    let foreign = TrackVariantRepo::create(&pool, &new_variant(other.id, "A", 1))
        .await
        .unwrap();

    let linked = TrackRepo::set_primary_variant(&pool, track.id, own.id)
        .await
        .unwrap();
    assert!(linked, "a variant of the same track is linkable");

    let rejected = TrackRepo::set_primary_variant(&pool, track.id, foreign.id)
        .await
        .unwrap();
    assert!(!rejected, "another track's variant must be rejected");

    let row = TrackRepo::find_by_id(&pool, track.id).await.unwrap().unwrap();
    assert_eq!(row.primary_variant_id, Some(own.id));
}

// ---------------------------------------------------------------------------
// Test: soft delete and cleanup eligibility
// ---------------------------------------------------------------------------

#[sqlx::test]
async fn test_find_expired_honors_the_retention_window(pool: PgPool) {
    let expired = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();
    let pending = TrackRepo::create(&pool, &new_track("dev-2")).await.unwrap();
    let live = TrackRepo::create(&pool, &new_track("dev-3")).await.unwrap();

    TrackRepo::soft_delete(&pool, expired.id, Utc::now() - Duration::hours(1))
        .await
        .unwrap();
    TrackRepo::soft_delete(&pool, pending.id, Utc::now() + Duration::days(7))
        .await
        .unwrap();

    let eligible = TrackRepo::find_expired(&pool, Utc::now()).await.unwrap();
    let ids: Vec<i64> = eligible.iter().map(|t| t.id).collect();

    assert!(ids.contains(&expired.id), "past the window -> eligible");
    assert!(!ids.contains(&pending.id), "inside the window -> not yet");
    assert!(!ids.contains(&live.id), "never deleted -> never eligible");
}

#[sqlx::test]
async fn test_hard_delete_cascades_to_children(pool: PgPool) {
    let track = TrackRepo::create(&pool, &new_track("dev-1")).await.unwrap();
    TrackVariantRepo::create(&pool, &new_variant(track.id, "A", 1))
        .await
        .unwrap();
    TrackVariantRepo::create(&pool, &new_variant(track.id, "B", 1))
        .await
        .unwrap();

    TrackRepo::hard_delete(&pool, track.id).await.unwrap();

    assert!(TrackRepo::find_by_id(&pool, track.id).await.unwrap().is_none());
    let orphans = TrackVariantRepo::list_by_track(&pool, track.id).await.unwrap();
    assert!(orphans.is_empty(), "variants must cascade with the track");
}
