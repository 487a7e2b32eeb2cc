//! Integration tests for the script conversion Job Store.
//!
//! Exercises the repository against a real database:
//! - creation, lookup and oldest-first pending listing
//! - pending counts as jobs resolve
//! - claim exclusivity and lease-guarded status writes
//! - partial `update_status` semantics and the table's invariants

use std::time::Duration;

use assert_matches::assert_matches;
use sqlx::PgPool;
use sketchbook_db::models::script_job::{CreateScriptJob, ReplaceScriptInput};
use sketchbook_db::models::status::ConversionStatus;
use sketchbook_db::models::StatusUpdate;
use sketchbook_db::repositories::ScriptJobRepo;

const LEASE: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_job(subject_id: i64, content: &str) -> CreateScriptJob {
    CreateScriptJob {
        subject_id,
        input_content: content.to_string(),
        input_path: None,
        file_name: format!("sketch_{subject_id}.pde"),
        original_name: "sketch.pde".to_string(),
        canvas_id: format!("canvas_{subject_id}"),
    }
}

// ---------------------------------------------------------------------------
// Create / find
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn create_starts_pending(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "void setup() {}"))
        .await
        .unwrap();

    assert_eq!(job.status(), Some(ConversionStatus::Pending));
    assert_eq!(job.subject_id, 1);
    assert_eq!(job.attempt_count, 0);
    assert!(job.derived_path.is_none());
    assert!(job.error_message.is_none());
    assert!(job.lease_token.is_none());

    let by_id = ScriptJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(by_id.input_content, "void setup() {}");

    let by_subject = ScriptJobRepo::find_by_subject(&pool, 1).await.unwrap().unwrap();
    assert_eq!(by_subject.id, job.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn find_missing_returns_none(pool: PgPool) {
    assert!(ScriptJobRepo::find_by_id(&pool, 999).await.unwrap().is_none());
    assert!(ScriptJobRepo::find_by_subject(&pool, 999).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn second_job_for_same_subject_violates_unique_constraint(pool: PgPool) {
    ScriptJobRepo::create(&pool, &new_job(7, "a")).await.unwrap();
    let err = ScriptJobRepo::create(&pool, &new_job(7, "b")).await.unwrap_err();

    assert_matches!(
        err,
        sqlx::Error::Database(db) if db.constraint() == Some("uq_script_conversion_jobs_subject_id")
    );
}

// ---------------------------------------------------------------------------
// Pending listing and counts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_pending_is_oldest_first_and_excludes_other_statuses(pool: PgPool) {
    let first = ScriptJobRepo::create(&pool, &new_job(1, "a")).await.unwrap();
    let second = ScriptJobRepo::create(&pool, &new_job(2, "b")).await.unwrap();
    let third = ScriptJobRepo::create(&pool, &new_job(3, "c")).await.unwrap();

    // Move the second job out of pending.
    let claimed = ScriptJobRepo::claim(&pool, second.id, LEASE).await.unwrap();
    assert!(claimed.is_some());

    let pending = ScriptJobRepo::list_pending(&pool, 10).await.unwrap();
    let ids: Vec<i64> = pending.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![first.id, third.id]);

    let limited = ScriptJobRepo::list_pending(&pool, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].id, first.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn count_pending_tracks_resolved_jobs(pool: PgPool) {
    let mut ids = Vec::new();
    for subject in 1..=5 {
        ids.push(ScriptJobRepo::create(&pool, &new_job(subject, "x")).await.unwrap().id);
    }
    assert_eq!(ScriptJobRepo::count_pending(&pool).await.unwrap(), 5);

    // Resolve two: one processed, one error.
    let a = ScriptJobRepo::claim(&pool, ids[0], LEASE).await.unwrap().unwrap();
    ScriptJobRepo::update_status(&pool, a.id, &StatusUpdate::processed("/uploads/js/a.js", a.lease_token))
        .await
        .unwrap()
        .unwrap();
    let b = ScriptJobRepo::claim(&pool, ids[1], LEASE).await.unwrap().unwrap();
    ScriptJobRepo::update_status(&pool, b.id, &StatusUpdate::error("boom", b.lease_token))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ScriptJobRepo::count_pending(&pool).await.unwrap(), 3);

    let counts = ScriptJobRepo::status_counts(&pool).await.unwrap();
    let lookup = |status: ConversionStatus| {
        counts
            .iter()
            .find(|c| c.status_id == status.id())
            .map(|c| c.count)
            .unwrap_or(0)
    };
    assert_eq!(lookup(ConversionStatus::Pending), 3);
    assert_eq!(lookup(ConversionStatus::Processed), 1);
    assert_eq!(lookup(ConversionStatus::Error), 1);
}

// ---------------------------------------------------------------------------
// Claim and lease
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn claim_is_exclusive(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();

    let first = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();
    assert_eq!(first.status(), Some(ConversionStatus::Processing));
    assert_eq!(first.attempt_count, 1);
    assert!(first.lease_token.is_some());

    assert!(ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_claims_yield_one_winner(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();

    let attempts = (0..8).map(|_| ScriptJobRepo::claim(&pool, job.id, LEASE));
    let results = futures::future::join_all(attempts).await;

    let winners = results
        .into_iter()
        .map(|r| r.unwrap())
        .filter(Option::is_some)
        .count();
    assert_eq!(winners, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_lease_can_be_reclaimed(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();

    let stale = ScriptJobRepo::claim(&pool, job.id, Duration::ZERO).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    let fresh = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();

    assert_ne!(stale.lease_token, fresh.lease_token);
    assert_eq!(fresh.attempt_count, 2);

    // The stale holder can no longer commit.
    let rejected = ScriptJobRepo::update_status(
        &pool,
        job.id,
        &StatusUpdate::processed("/uploads/js/stale.js", stale.lease_token),
    )
    .await
    .unwrap();
    assert!(rejected.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn expired_attempts_are_requeued_and_live_ones_kept(pool: PgPool) {
    let abandoned = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();
    let live = ScriptJobRepo::create(&pool, &new_job(2, "x")).await.unwrap();
    ScriptJobRepo::claim(&pool, abandoned.id, Duration::ZERO).await.unwrap().unwrap();
    ScriptJobRepo::claim(&pool, live.id, LEASE).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ScriptJobRepo::count_pending(&pool).await.unwrap(), 0);

    assert_eq!(ScriptJobRepo::requeue_expired(&pool).await.unwrap(), 1);

    let requeued = ScriptJobRepo::find_by_id(&pool, abandoned.id).await.unwrap().unwrap();
    assert_eq!(requeued.status(), Some(ConversionStatus::Pending));
    assert!(requeued.lease_token.is_none());
    assert_eq!(requeued.attempt_count, 1);
    let still_running = ScriptJobRepo::find_by_id(&pool, live.id).await.unwrap().unwrap();
    assert_eq!(still_running.status(), Some(ConversionStatus::Processing));
    assert_eq!(ScriptJobRepo::count_pending(&pool).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn processed_job_cannot_be_claimed(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();
    let claimed = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();
    ScriptJobRepo::update_status(
        &pool,
        job.id,
        &StatusUpdate::processed("/uploads/js/x.js", claimed.lease_token),
    )
    .await
    .unwrap()
    .unwrap();

    assert!(ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn error_job_is_claimed_straight_into_processing(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();
    let claimed = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();
    ScriptJobRepo::update_status(&pool, job.id, &StatusUpdate::error("down", claimed.lease_token))
        .await
        .unwrap()
        .unwrap();

    let retried = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();
    assert_eq!(retried.status(), Some(ConversionStatus::Processing));
    assert_eq!(retried.attempt_count, 2);
}

// ---------------------------------------------------------------------------
// update_status semantics
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn processed_clears_error_and_releases_lease(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();
    let c1 = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();
    ScriptJobRepo::update_status(&pool, job.id, &StatusUpdate::error("first failure", c1.lease_token))
        .await
        .unwrap()
        .unwrap();

    let c2 = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();
    // The old message survives while processing.
    assert_eq!(c2.error_message.as_deref(), Some("first failure"));

    let done = ScriptJobRepo::update_status(
        &pool,
        job.id,
        &StatusUpdate::processed("/uploads/js/x.js", c2.lease_token),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(done.status(), Some(ConversionStatus::Processed));
    assert_eq!(done.derived_path.as_deref(), Some("/uploads/js/x.js"));
    assert!(done.error_message.is_none());
    assert!(done.lease_token.is_none());
    assert!(done.lease_expires_at.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn empty_fields_do_not_overwrite(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();
    let c1 = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();
    ScriptJobRepo::update_status(&pool, job.id, &StatusUpdate::processed("/uploads/js/v1.js", c1.lease_token))
        .await
        .unwrap()
        .unwrap();

    // Unguarded write back to pending with empty fields keeps derived_path.
    let reset = ScriptJobRepo::update_status(
        &pool,
        job.id,
        &StatusUpdate {
            status: ConversionStatus::Pending,
            derived_path: Some(""),
            error_message: None,
            lease: None,
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(reset.status(), Some(ConversionStatus::Pending));
    assert_eq!(reset.derived_path.as_deref(), Some("/uploads/js/v1.js"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn error_without_message_violates_invariant(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();

    let err = ScriptJobRepo::update_status(
        &pool,
        job.id,
        &StatusUpdate {
            status: ConversionStatus::Error,
            derived_path: None,
            error_message: Some(""),
            lease: None,
        },
    )
    .await
    .unwrap_err();

    assert_matches!(
        err,
        sqlx::Error::Database(db) if db.constraint() == Some("ck_script_conversion_jobs_error")
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn processed_without_derived_path_violates_invariant(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();

    let err = ScriptJobRepo::update_status(
        &pool,
        job.id,
        &StatusUpdate {
            status: ConversionStatus::Processed,
            derived_path: None,
            error_message: None,
            lease: None,
        },
    )
    .await
    .unwrap_err();

    assert_matches!(
        err,
        sqlx::Error::Database(db) if db.constraint() == Some("ck_script_conversion_jobs_processed")
    );
}

// ---------------------------------------------------------------------------
// Update / replace input
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn replace_input_resets_to_pending_and_invalidates_lease(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "old")).await.unwrap();
    let claimed = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();

    let replaced = ScriptJobRepo::replace_input(
        &pool,
        job.id,
        &ReplaceScriptInput {
            input_content: "new".into(),
            input_path: None,
            file_name: "sketch_1_v2.pde".into(),
            original_name: "sketch.pde".into(),
            canvas_id: "canvas_v2".into(),
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(replaced.status(), Some(ConversionStatus::Pending));
    assert_eq!(replaced.input_content, "new");
    assert!(replaced.lease_token.is_none());

    // The attempt that was running against the old input is superseded.
    let stale = ScriptJobRepo::update_status(
        &pool,
        job.id,
        &StatusUpdate::processed("/uploads/js/old.js", claimed.lease_token),
    )
    .await
    .unwrap();
    assert!(stale.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn hydrated_content_only_fills_empty_input_under_lease(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "")).await.unwrap();
    let claimed = ScriptJobRepo::claim(&pool, job.id, LEASE).await.unwrap().unwrap();

    let stale = uuid::Uuid::new_v4();
    assert!(!ScriptJobRepo::set_input_content(&pool, job.id, "x", Some(stale)).await.unwrap());

    assert!(
        ScriptJobRepo::set_input_content(&pool, job.id, "void draw() {}", claimed.lease_token)
            .await
            .unwrap()
    );
    // Never overwrites content that is already present.
    assert!(!ScriptJobRepo::set_input_content(&pool, job.id, "other", None).await.unwrap());

    let found = ScriptJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(found.input_content, "void draw() {}");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn full_update_never_reassigns_subject(pool: PgPool) {
    let job = ScriptJobRepo::create(&pool, &new_job(1, "x")).await.unwrap();

    let mut edited = ScriptJobRepo::find_by_id(&pool, job.id).await.unwrap().unwrap();
    edited.subject_id = 42;
    edited.input_content = "edited".into();
    let saved = ScriptJobRepo::update(&pool, &edited).await.unwrap().unwrap();

    assert_eq!(saved.subject_id, 1);
    assert_eq!(saved.input_content, "edited");

    let direct = sqlx::query("UPDATE script_conversion_jobs SET subject_id = 42 WHERE id = $1")
        .bind(job.id)
        .execute(&pool)
        .await;
    assert!(direct.is_err(), "subject reassignment must be rejected");
}
