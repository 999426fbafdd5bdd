//! Integration tests for publishing rows and resuming from reject lists.
//!
//! A scripted publisher replaces Notion. Reject lists are written to and
//! read back from a real output directory, the way the `publish` and
//! `resume` commands chain together.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::{Value, json};

use product_porter_integration_tests::Workspace;
use product_porter_pipeline::publish::{
    PagePublisher, PublishError, PublishOptions, Reject, latest_reject_file, publish_all,
    resume, row_handle,
};
use product_porter_pipeline::retry::RetryPolicy;

/// Rejects rows whose handle is in `broken`; records every attempt.
struct FlakyNotion {
    broken: RefCell<BTreeSet<String>>,
    throttled: RefCell<VecDeque<u16>>,
    attempts: RefCell<Vec<String>>,
}

impl FlakyNotion {
    fn new(broken: &[&str]) -> Self {
        Self {
            broken: RefCell::new(broken.iter().map(|h| (*h).to_string()).collect()),
            throttled: RefCell::new(VecDeque::new()),
            attempts: RefCell::new(Vec::new()),
        }
    }

    fn repair(&self) {
        self.broken.borrow_mut().clear();
    }

    fn throttle(&self, statuses: &[u16]) {
        self.throttled.borrow_mut().extend(statuses);
    }
}

impl PagePublisher for FlakyNotion {
    async fn create_page(&self, properties: &Value) -> Result<(), PublishError> {
        let handle = row_handle(properties).unwrap_or_default().to_string();
        self.attempts.borrow_mut().push(handle.clone());

        if let Some(status) = self.throttled.borrow_mut().pop_front() {
            return Err(PublishError::Status {
                status,
                body: "{\"code\":\"rate_limited\"}".to_string(),
            });
        }
        if self.broken.borrow().contains(&handle) {
            return Err(PublishError::Status {
                status: 400,
                body: "{\"code\":\"validation_error\"}".to_string(),
            });
        }
        Ok(())
    }
}

fn row(title: &str, handle: &str) -> Value {
    json!({
        "Title": {"title": [{"text": {"content": title}}]},
        "Handle": {"rich_text": [{"text": {"content": handle}}]},
        "Price": {"number": 9.5}
    })
}

fn rows() -> Vec<Value> {
    vec![
        row("LC-LC Patch Cord", "lc-lc"),
        row("SFP+ Module", "sfp"),
        row("MPO Trunk", "mpo"),
    ]
}

fn options() -> PublishOptions {
    PublishOptions {
        delay: Duration::from_millis(400),
        retry: RetryPolicy {
            retries: 3,
            base: Duration::from_millis(400),
        },
        progress: false,
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
}

// =============================================================================
// Publish Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_clean_run_writes_no_reject_list() {
    let ws = Workspace::new();
    let notion = FlakyNotion::new(&[]);

    let summary = publish_all(&notion, ws.store(), &rows(), &options(), day(1))
        .await
        .unwrap();

    assert_eq!(summary.published, 3);
    assert!(summary.reject_file.is_none());
    assert!(latest_reject_file(ws.path()).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_written_with_position() {
    let ws = Workspace::new();
    let notion = FlakyNotion::new(&["sfp"]);

    let summary = publish_all(&notion, ws.store(), &rows(), &options(), day(1))
        .await
        .unwrap();

    assert_eq!(summary.published, 2);
    assert_eq!(
        summary.reject_file,
        Some(ws.path().join("notion_upload_fail_2025-09-01.json"))
    );

    let rejects: Vec<Reject> = ws.load("notion_upload_fail_2025-09-01.json");
    assert_eq!(rejects.len(), 1);
    assert_eq!(rejects[0].index, 2);
    assert_eq!(rejects[0].title, "SFP+ Module");
    assert_eq!(rejects[0].handle, "sfp");
    assert!(rejects[0].error.contains("400"));
}

#[tokio::test(start_paused = true)]
async fn test_publish_does_not_retry() {
    let ws = Workspace::new();
    let notion = FlakyNotion::new(&[]);
    notion.throttle(&[429]);

    let summary = publish_all(&notion, ws.store(), &rows(), &options(), day(1))
        .await
        .unwrap();

    assert_eq!(summary.published, 2);
    assert_eq!(notion.attempts.borrow().len(), 3);
}

// =============================================================================
// Resume Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_resume_from_latest_reject_list() {
    let ws = Workspace::new();
    let notion = FlakyNotion::new(&["lc-lc", "mpo"]);
    publish_all(&notion, ws.store(), &rows(), &options(), day(1))
        .await
        .unwrap();

    notion.repair();
    notion.attempts.borrow_mut().clear();
    let fail = latest_reject_file(ws.path()).unwrap().unwrap();
    let rejects: Vec<Reject> = serde_json::from_slice(&std::fs::read(&fail).unwrap()).unwrap();

    let summary = resume(&notion, ws.store(), &rows(), &rejects, &options(), day(2))
        .await
        .unwrap();

    assert_eq!(summary.published, 2);
    assert!(summary.reject_file.is_none());
    assert_eq!(*notion.attempts.borrow(), vec!["lc-lc", "mpo"]);
    assert!(!ws.exists("notion_upload_fail_retry_2025-09-02.json"));
}

#[tokio::test(start_paused = true)]
async fn test_resume_matches_by_handle_when_index_is_stale() {
    let ws = Workspace::new();
    let notion = FlakyNotion::new(&[]);
    let rejects = vec![Reject {
        index: 42,
        title: "MPO Trunk".to_string(),
        handle: "mpo".to_string(),
        error: "HTTP 502".to_string(),
    }];

    let summary = resume(&notion, ws.store(), &rows(), &rejects, &options(), day(2))
        .await
        .unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(*notion.attempts.borrow(), vec!["mpo"]);
}

#[tokio::test(start_paused = true)]
async fn test_resume_retries_throttled_rows() {
    let ws = Workspace::new();
    let notion = FlakyNotion::new(&[]);
    notion.throttle(&[429, 503]);
    let rejects = vec![Reject {
        index: 1,
        title: String::new(),
        handle: String::new(),
        error: String::new(),
    }];

    let started = tokio::time::Instant::now();
    let summary = resume(&notion, ws.store(), &rows(), &rejects, &options(), day(2))
        .await
        .unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(notion.attempts.borrow().len(), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(1200));
}

#[tokio::test(start_paused = true)]
async fn test_resume_still_failing_writes_retry_list() {
    let ws = Workspace::new();
    let notion = FlakyNotion::new(&["sfp"]);
    publish_all(&notion, ws.store(), &rows(), &options(), day(1))
        .await
        .unwrap();
    let rejects: Vec<Reject> = ws.load("notion_upload_fail_2025-09-01.json");

    let summary = resume(&notion, ws.store(), &rows(), &rejects, &options(), day(2))
        .await
        .unwrap();

    assert_eq!(summary.published, 0);
    assert_eq!(
        summary.reject_file,
        Some(ws.path().join("notion_upload_fail_retry_2025-09-02.json"))
    );
    let retried: Vec<Reject> = ws.load("notion_upload_fail_retry_2025-09-02.json");
    assert_eq!(retried[0].index, 2);
}

#[tokio::test(start_paused = true)]
async fn test_resume_with_unmatched_rejects_does_nothing() {
    let ws = Workspace::new();
    let notion = FlakyNotion::new(&[]);
    let rejects = vec![Reject {
        index: 0,
        title: "Gone".to_string(),
        handle: "discontinued".to_string(),
        error: String::new(),
    }];

    let summary = resume(&notion, ws.store(), &rows(), &rejects, &options(), day(2))
        .await
        .unwrap();

    assert_eq!(summary.published, 0);
    assert!(summary.rejects.is_empty());
    assert!(notion.attempts.borrow().is_empty());
}
