//! Integration tests for job creation, deletion, and scheduler shutdown.

mod helpers;

use std::time::Duration;

use serde_json::json;

use filevault_core::error::ErrorKind;
use filevault_core::types::id::JobId;
use filevault_entity::job::log::LogStatus;
use filevault_entity::job::model::{CreateJob, JobFilter, UpdateJob};
use filevault_entity::job::status::{JobStatus, JobType};
use filevault_scheduler::{ArmState, ExecutionError, TimerState};

use helpers::{TestApp, at};

#[tokio::test(start_paused = true)]
async fn test_create_and_get_round_trip() {
    let app = TestApp::new().await;
    let created = app
        .create_job("  nightly  ", Some(" 0 3 * * * "), json!({"retentionDays": 7}))
        .await;

    let fetched = app.job(created.id).await;
    assert_eq!(fetched.name, "nightly");
    assert_eq!(fetched.job_type, JobType::Webhook);
    assert_eq!(fetched.schedule.as_deref(), Some("0 3 * * *"));
    assert_eq!(fetched.config, json!({"retentionDays": 7}));
    assert_eq!(fetched.owner_id, app.owner);
    assert_eq!(fetched.status, JobStatus::Active);
    assert_eq!(
        fetched.next_run,
        Some(at(0, 0) + chrono::TimeDelta::hours(15))
    );
    assert_eq!(fetched.created_at, at(0, 0));
}

#[tokio::test(start_paused = true)]
async fn test_create_rejects_bad_input() {
    let app = TestApp::new().await;
    let base = CreateJob {
        owner_id: app.owner,
        name: "bad".to_string(),
        job_type: "cleanup".to_string(),
        schedule: None,
        config: json!({}),
        is_active: true,
    };

    let unknown = app
        .service
        .create(CreateJob {
            job_type: "defragment".to_string(),
            ..base.clone()
        })
        .await
        .unwrap_err();
    assert_eq!(unknown.kind, ErrorKind::Validation);
    assert!(unknown.message.contains("defragment"));

    let bad_cron = app
        .service
        .create(CreateJob {
            schedule: Some("61 * * * *".to_string()),
            ..base.clone()
        })
        .await
        .unwrap_err();
    assert_eq!(bad_cron.kind, ErrorKind::Validation);

    let blank_name = app
        .service
        .create(CreateJob {
            name: "   ".to_string(),
            ..base.clone()
        })
        .await
        .unwrap_err();
    assert_eq!(blank_name.kind, ErrorKind::Validation);

    let bad_config = app
        .service
        .create(CreateJob {
            config: json!("paths"),
            ..base
        })
        .await
        .unwrap_err();
    assert_eq!(bad_config.kind, ErrorKind::Validation);

    assert!(app.service.list(&JobFilter::default()).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_schedules_that_never_fire_are_rejected() {
    let app = TestApp::new().await;
    let base = CreateJob {
        owner_id: app.owner,
        name: "never".to_string(),
        job_type: "cleanup".to_string(),
        schedule: None,
        config: json!({}),
        is_active: true,
    };

    for expr in ["0 0 30 2 *", "2020-01-01T00:00:00Z"] {
        let err = app
            .service
            .create(CreateJob {
                schedule: Some(expr.to_string()),
                ..base.clone()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation, "{expr}");
        assert!(err.message.contains("no upcoming occurrence"), "{expr}");
    }
    assert!(app.service.list(&JobFilter::default()).await.unwrap().is_empty());

    let job = app.create_job("live", Some("*/5 * * * *"), json!({})).await;
    let err = app
        .service
        .update(
            job.id,
            UpdateJob {
                schedule: Some(Some("2026-03-02T11:00:00Z".to_string())),
                ..UpdateJob::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let stored = app.job(job.id).await;
    assert_eq!(stored.schedule.as_deref(), Some("*/5 * * * *"));
    assert_eq!(stored.next_run, Some(at(5, 0)));
    assert!(app.scheduler.is_armed(job.id));
}

#[tokio::test(start_paused = true)]
async fn test_create_rejects_type_without_handler() {
    let app = TestApp::with_types(&[JobType::Webhook]).await;
    let err = app
        .service
        .create(CreateJob {
            owner_id: app.owner,
            name: "scan".to_string(),
            job_type: "virus_scan".to_string(),
            schedule: None,
            config: json!({}),
            is_active: true,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}

#[tokio::test(start_paused = true)]
async fn test_update_rules() {
    let app = TestApp::new().await;
    let job = app.create_job("edit me", Some("*/5 * * * *"), json!({})).await;

    let empty = app
        .service
        .update(job.id, UpdateJob::default())
        .await
        .unwrap_err();
    assert_eq!(empty.message, "No valid fields to update");

    let bad = app
        .service
        .update(
            job.id,
            UpdateJob {
                schedule: Some(Some("*/5 * *".to_string())),
                ..UpdateJob::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(bad.kind, ErrorKind::Validation);
    assert!(app.scheduler.is_armed(job.id));

    let missing = app
        .service
        .update(
            JobId::new(),
            UpdateJob {
                name: Some("ghost".to_string()),
                ..UpdateJob::default()
            },
        )
        .await
        .unwrap_err();
    assert!(missing.is_not_found());

    let renamed = app
        .service
        .update(
            job.id,
            UpdateJob {
                name: Some("edited".to_string()),
                ..UpdateJob::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "edited");
    assert_eq!(renamed.next_run, Some(at(5, 0)));
}

#[tokio::test(start_paused = true)]
async fn test_list_filters_and_orders_newest_first() {
    let app = TestApp::new().await;
    let first = app.create_job("first", None, json!({})).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    let second = app.create_job("second", None, json!({})).await;
    app.service
        .update(
            first.id,
            UpdateJob {
                is_active: Some(false),
                ..UpdateJob::default()
            },
        )
        .await
        .unwrap();

    let all: Vec<JobId> = app
        .service
        .list(&JobFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(all, vec![second.id, first.id]);

    let active = app
        .service
        .list(&JobFilter {
            is_active: Some(true),
            ..JobFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, second.id);
}

#[tokio::test(start_paused = true)]
async fn test_delete_while_firing_finishes_run_without_rearm() {
    let app = TestApp::new().await;
    let job = app
        .create_job(
            "doomed",
            Some("*/5 * * * *"),
            json!({"mode": "sleep", "seconds": 50}),
        )
        .await;

    app.advance_to(at(5, 1)).await;
    assert_eq!(app.scheduler.timer_state(job.id), Some(TimerState::Firing));
    assert!(app.executor.is_running(job.id));

    app.service.delete(job.id).await.unwrap();
    assert!(!app.scheduler.is_armed(job.id));
    assert!(app.service.get(job.id).await.unwrap_err().is_not_found());

    app.advance_to(at(20, 0)).await;
    assert!(!app.executor.is_running(job.id));
    assert!(!app.scheduler.is_armed(job.id));
    assert_eq!(app.recorder.calls_for(job.id), 1);

    let logs = app.logs(job.id).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Completed);
    assert_eq!(logs[0].completed_at, Some(at(5, 50)));
}

#[tokio::test(start_paused = true)]
async fn test_manual_run_cannot_start_after_delete_returns() {
    let app = TestApp::with_slow_delete(Duration::from_secs(10)).await;
    let job = app.create_job("racy", None, json!({})).await;

    let service = app.service.clone();
    let delete = tokio::spawn(async move { service.delete(job.id).await });
    tokio::time::sleep(Duration::from_secs(1)).await;

    // The delete holds the job's critical section until 12:00:10.
    let outcome = app.service.run_now(job.id).await;
    delete.await.unwrap().unwrap();

    match outcome {
        Err(ExecutionError::Store(err)) => assert!(err.is_not_found()),
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(app.recorder.calls_for(job.id), 0);
    assert!(app.logs(job.id).await.is_empty());
    assert!(!app.executor.is_running(job.id));
}

#[tokio::test(start_paused = true)]
async fn test_manual_run_admitted_before_delete_completes() {
    let app = TestApp::new().await;
    let job = app
        .create_job("busy", None, json!({"mode": "sleep", "seconds": 30}))
        .await;

    let service = app.service.clone();
    let run = tokio::spawn(async move { service.run_now(job.id).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(app.executor.is_running(job.id));

    app.service.delete(job.id).await.unwrap();

    let report = run.await.unwrap().unwrap();
    assert_eq!(report.started_at, at(0, 0));
    assert_eq!(app.recorder.calls_for(job.id), 1);
    let logs = app.logs(job.id).await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, LogStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_delete_unknown_job() {
    let app = TestApp::new().await;
    let err = app.service.delete(JobId::new()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn test_stats() {
    let app = TestApp::new().await;
    app.create_job("a", Some("*/5 * * * *"), json!({})).await;
    let failing = app.create_job("b", None, json!({"mode": "fail"})).await;
    app.service.run_now(failing.id).await.unwrap_err();

    let stats = app.service.stats().await.unwrap();
    assert_eq!(stats.total_jobs, 2);
    assert_eq!(stats.active_jobs, 2);
    assert_eq!(stats.failed_jobs, 1);
    assert_eq!(stats.armed_timers, 1);
    assert_eq!(stats.running, 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_disarms_and_drains() {
    let app = TestApp::new().await;
    let slow = app
        .create_job(
            "slow",
            Some("*/5 * * * *"),
            json!({"mode": "sleep", "seconds": 3}),
        )
        .await;
    let other = app.create_job("other", Some("*/10 * * * *"), json!({})).await;

    app.advance_to(at(5, 1)).await;
    assert!(app.executor.is_running(slow.id));

    assert!(app.scheduler.shutdown().await);
    assert_eq!(app.scheduler.armed_count(), 0);
    assert_eq!(app.job(other.id).await.next_run, None);
    assert_eq!(app.logs(slow.id).await[0].status, LogStatus::Completed);

    let state = app.scheduler.reschedule(other.id).await.unwrap();
    assert_eq!(state, ArmState::Unarmed);

    app.advance_to(at(30, 0)).await;
    assert_eq!(app.recorder.calls_for(slow.id), 1);
    assert_eq!(app.recorder.calls_for(other.id), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_reports_stragglers() {
    let app = TestApp::new().await;
    let job = app
        .create_job("sticky", None, json!({"mode": "sleep", "seconds": 50}))
        .await;

    let service = app.service.clone();
    let run = tokio::spawn(async move { service.run_now(job.id).await });
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Grace period is 5 seconds.
    assert!(!app.scheduler.shutdown().await);
    run.await.unwrap().unwrap();
}
