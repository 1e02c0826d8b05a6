use chrono::{Duration, Utc};
use os_core::error::{GithubError, WatchError};
use os_core::github::{GithubClient, MockClient, NoopClient};
use os_core::types::{
    CheckConclusion, CheckRun, CheckSource, CheckStatus, ChecksState, Comment, CommentKind,
    CreatePrWatchInput, CreateReviewWatchInput, PrState, RecordReviewPrTaskInput, RepoFilter,
    Review, ReviewEvent, ReviewState, ReviewSummary, ReviewWatch,
};
use os_core::{GithubService, OverseerError, RequestContext, ReviewPollTrigger};
use os_db::schema::with_test_db;
use os_db::DbStore;
use os_events::{EventBus, EventSource};
use std::sync::Arc;

fn service_with(client: Arc<dyn GithubClient>) -> (GithubService<DbStore>, EventBus) {
    let store = DbStore::new(with_test_db().unwrap());
    let bus = EventBus::new(64);
    (GithubService::new(store, client, bus.clone()), bus)
}

fn ctx() -> RequestContext {
    RequestContext::new(EventSource::Api, Some("corr_1".to_string()))
}

fn pr_watch_input(session: &str, pr_number: u64) -> CreatePrWatchInput {
    CreatePrWatchInput {
        session_id: session.to_string(),
        task_id: "task_1".to_string(),
        owner: "acme".to_string(),
        repo: "widgets".to_string(),
        pr_number,
        branch: "feature-x".to_string(),
    }
}

fn review_watch_input(repos: Vec<RepoFilter>) -> CreateReviewWatchInput {
    CreateReviewWatchInput {
        workspace_id: "ws_1".to_string(),
        workflow_id: "wf_review".to_string(),
        workflow_step_id: "step_triage".to_string(),
        repos,
        review_scope: None,
        custom_query: None,
        agent_profile_id: Some("agent_1".to_string()),
        executor_profile_id: None,
        prompt: Some("Review carefully".to_string()),
        enabled: None,
        poll_interval_seconds: None,
    }
}

fn record_input(watch: &ReviewWatch, owner: &str, repo: &str, number: u64) -> RecordReviewPrTaskInput {
    RecordReviewPrTaskInput {
        review_watch_id: watch.id.clone(),
        owner: owner.to_string(),
        repo: repo.to_string(),
        pr_number: number,
        pr_url: format!("https://github.com/{owner}/{repo}/pull/{number}"),
        task_id: format!("task_review_{number}"),
    }
}

fn issue_comment(id: u64, minutes_ago: i64) -> Comment {
    Comment {
        id,
        kind: CommentKind::Issue,
        author: "reviewer".to_string(),
        body: "please rename this".to_string(),
        path: None,
        line: None,
        created_at: Utc::now() - Duration::minutes(minutes_ago),
    }
}

fn check_run(name: &str, conclusion: CheckConclusion) -> CheckRun {
    CheckRun {
        name: name.to_string(),
        status: CheckStatus::Completed,
        conclusion: Some(conclusion),
        url: None,
        source: CheckSource::CheckRun,
    }
}

#[tokio::test]
async fn review_queue_is_deduplicated_through_the_ledger() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 1, "fix-a"));
    client.add_pr(MockClient::sample_pr("acme", "gadgets", 2, "fix-b"));
    client.request_review("acme", "widgets", 1);
    client.request_review("acme", "gadgets", 2);
    let (service, _bus) = service_with(client.clone());

    let watch = service.create_review_watch(review_watch_input(Vec::new())).unwrap();
    assert_eq!(watch.poll_interval_seconds, 300);

    let first = service.check_review_watch(&watch, Utc::now()).await.unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|pr| !pr.lacks_branches()));

    let second = service.check_review_watch(&watch, Utc::now()).await.unwrap();
    assert_eq!(second, first);

    for pr in &first {
        service
            .record_review_pr_task(record_input(&watch, &pr.owner, &pr.repo, pr.number))
            .unwrap();
    }
    let third = service.check_review_watch(&watch, Utc::now()).await.unwrap();
    assert!(third.is_empty());
    assert_eq!(service.list_review_pr_tasks(&watch.id).unwrap().len(), 2);

    let polled = service.get_review_watch(&watch.id).unwrap().unwrap();
    assert!(polled.last_polled_at.is_some());
    assert!(!polled.is_due(Utc::now()));
}

#[tokio::test]
async fn review_poll_is_stamped_with_the_scheduled_time() {
    let (service, _bus) = service_with(Arc::new(MockClient::new()));
    let watch = service.create_review_watch(review_watch_input(Vec::new())).unwrap();
    let scheduled = Utc::now() - Duration::seconds(30);

    service.check_review_watch(&watch, scheduled).await.unwrap();
    let polled = service.get_review_watch(&watch.id).unwrap().unwrap();
    assert_eq!(polled.last_polled_at, Some(scheduled));
    assert!(polled.is_due(scheduled + Duration::seconds(300)));
    assert!(!polled.is_due(scheduled + Duration::seconds(299)));
}

#[tokio::test]
async fn repo_filters_search_once_per_filter_and_merge() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 1, "fix-a"));
    client.add_pr(MockClient::sample_pr("tools", "cli", 9, "fix-c"));
    client.add_pr(MockClient::sample_pr("other", "thing", 4, "fix-d"));
    for (owner, repo, number) in [("acme", "widgets", 1), ("tools", "cli", 9), ("other", "thing", 4)] {
        client.request_review(owner, repo, number);
    }
    let (service, _bus) = service_with(client.clone());

    let filters = vec![
        RepoFilter {
            owner: "acme".to_string(),
            name: "widgets".to_string(),
        },
        RepoFilter {
            owner: "acme".to_string(),
            name: String::new(),
        },
        RepoFilter {
            owner: "tools".to_string(),
            name: String::new(),
        },
    ];
    let watch = service.create_review_watch(review_watch_input(filters)).unwrap();
    let found = service.check_review_watch(&watch, Utc::now()).await.unwrap();

    let keys: Vec<(String, u64)> = found.iter().map(|pr| (pr.owner.clone(), pr.number)).collect();
    assert_eq!(keys, vec![("acme".to_string(), 1), ("tools".to_string(), 9)]);
    assert_eq!(client.calls("search_prs"), 3);
}

#[tokio::test]
async fn enrichment_failure_keeps_bare_search_result() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 5, "fix-a"));
    client.request_review("acme", "widgets", 5);
    client.fail("get_pr");
    let (service, _bus) = service_with(client.clone());

    let watch = service.create_review_watch(review_watch_input(Vec::new())).unwrap();
    let found = service.check_review_watch(&watch, Utc::now()).await.unwrap();

    assert_eq!(found.len(), 1);
    assert!(found[0].lacks_branches());
}

#[tokio::test]
async fn search_failure_propagates_without_marking_poll() {
    let client = Arc::new(MockClient::new());
    client.fail("search_prs");
    let (service, _bus) = service_with(client.clone());

    let watch = service.create_review_watch(review_watch_input(Vec::new())).unwrap();
    let err = service.check_review_watch(&watch, Utc::now()).await.unwrap_err();
    assert!(matches!(err, OverseerError::Github(GithubError::Transport { .. })));
    let reloaded = service.get_review_watch(&watch.id).unwrap().unwrap();
    assert!(reloaded.last_polled_at.is_none());
}

#[tokio::test]
async fn detection_moves_watch_to_tracking_and_links_task() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 7, "feature-x"));
    let (service, bus) = service_with(client.clone());
    let mut events = bus.subscribe();

    let watch = service.create_pr_watch(pr_watch_input("sess_1", 0)).unwrap();
    let task_pr = service
        .detect_pr_for_watch(&ctx(), &watch)
        .await
        .unwrap()
        .expect("pull request should be detected");

    assert_eq!(task_pr.pr_number, 7);
    assert_eq!(task_pr.head_branch, "feature-x");
    let tracking = service.get_pr_watch(&watch.id).unwrap().unwrap();
    assert_eq!(tracking.pr_number, 7);
    assert!(tracking.last_checked_at.is_some());
    let linked = service.list_task_prs("task_1").unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].pr_number, 7);

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind(), Some("TaskPrUpdated"));
    assert_eq!(event.source, EventSource::Api);
    assert_eq!(event.correlation_id.as_deref(), Some("corr_1"));
    assert!(event.id.starts_with("evt_"));
}

#[tokio::test]
async fn detection_miss_only_advances_last_checked() {
    let client = Arc::new(MockClient::new());
    let (service, _bus) = service_with(client.clone());
    let watch = service.create_pr_watch(pr_watch_input("sess_1", 0)).unwrap();

    assert!(service.detect_pr_for_watch(&ctx(), &watch).await.unwrap().is_none());
    client.fail("find_pr_by_branch");
    assert!(service.detect_pr_for_watch(&ctx(), &watch).await.unwrap().is_none());

    let reloaded = service.get_pr_watch(&watch.id).unwrap().unwrap();
    assert_eq!(reloaded.pr_number, 0);
    assert!(reloaded.last_checked_at.is_some());
    assert!(service.list_task_prs("task_1").unwrap().is_empty());
}

#[tokio::test]
async fn detection_keeps_an_existing_task_pr_summary() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 7, "feature-x"));
    client.set_reviews(
        "acme",
        "widgets",
        7,
        vec![Review {
            id: 1,
            author: "alice".to_string(),
            state: ReviewState::Approved,
            body: String::new(),
            submitted_at: Some(Utc::now()),
        }],
    );
    let (service, _bus) = service_with(client.clone());
    let linked = service
        .associate_pr_with_task(&ctx(), "task_1", "acme", "widgets", 7)
        .await
        .unwrap();
    assert_eq!(linked.review_state, ReviewSummary::Approved);

    let watch = service.create_pr_watch(pr_watch_input("sess_2", 0)).unwrap();
    let detected = service
        .detect_pr_for_watch(&ctx(), &watch)
        .await
        .unwrap()
        .expect("pull request should be detected");

    assert_eq!(detected.id, linked.id);
    assert_eq!(detected.review_state, ReviewSummary::Approved);
    assert_eq!(detected.review_count, 1);
    let stored = service.get_task_pr("task_1", 7).unwrap().unwrap();
    assert_eq!(stored.review_state, ReviewSummary::Approved);
    assert_eq!(stored.review_count, 1);
    assert_eq!(
        service.get_pr_watch(&watch.id).unwrap().unwrap().pr_number,
        7
    );
}

#[tokio::test]
async fn pr_watch_creation_is_idempotent_per_session() {
    let (service, _bus) = service_with(Arc::new(MockClient::new()));
    let first = service.create_pr_watch(pr_watch_input("sess_1", 0)).unwrap();
    let again = service.create_pr_watch(pr_watch_input("sess_1", 12)).unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.pr_number, 0);
    assert_eq!(service.list_active_pr_watches().unwrap().len(), 1);

    let err = service
        .create_pr_watch(CreatePrWatchInput {
            branch: String::new(),
            ..pr_watch_input("sess_2", 0)
        })
        .unwrap_err();
    assert!(matches!(err, OverseerError::Watch(WatchError::InvalidInput { .. })));
}

#[tokio::test]
async fn check_reports_new_feedback_once() {
    let client = Arc::new(MockClient::new());
    let pr = MockClient::sample_pr("acme", "widgets", 3, "feature-x");
    client.add_pr(pr.clone());
    client.add_comment("acme", "widgets", 3, issue_comment(1, 5));
    client.set_check_runs(
        "acme",
        "widgets",
        pr.checks_ref(),
        vec![check_run("build", CheckConclusion::Success)],
    );
    let (service, _bus) = service_with(client.clone());
    let watch = service.create_pr_watch(pr_watch_input("sess_1", 3)).unwrap();

    let (feedback, has_new) = service.check_pr_watch(&watch).await.unwrap();
    assert!(has_new);
    assert_eq!(feedback.checks_state, ChecksState::Success);
    assert_eq!(feedback.comments.len(), 1);

    let watch = service.get_pr_watch(&watch.id).unwrap().unwrap();
    assert_eq!(watch.last_check_status, ChecksState::Success);
    let (_, has_new) = service.check_pr_watch(&watch).await.unwrap();
    assert!(!has_new);

    client.set_check_runs(
        "acme",
        "widgets",
        pr.checks_ref(),
        vec![check_run("build", CheckConclusion::Failure)],
    );
    let watch = service.get_pr_watch(&watch.id).unwrap().unwrap();
    let (feedback, has_new) = service.check_pr_watch(&watch).await.unwrap();
    assert!(has_new);
    assert_eq!(feedback.checks_state, ChecksState::Failure);
}

#[tokio::test]
async fn checking_a_searching_watch_is_rejected() {
    let (service, _bus) = service_with(Arc::new(MockClient::new()));
    let watch = service.create_pr_watch(pr_watch_input("sess_1", 0)).unwrap();
    let err = service.check_pr_watch(&watch).await.unwrap_err();
    assert!(matches!(err, OverseerError::Watch(WatchError::InvalidInput { .. })));
}

#[tokio::test]
async fn feedback_tolerates_missing_status_contexts() {
    let client = Arc::new(MockClient::new());
    let pr = MockClient::sample_pr("acme", "widgets", 3, "feature-x");
    client.add_pr(pr.clone());
    client.set_check_runs(
        "acme",
        "widgets",
        pr.checks_ref(),
        vec![check_run("ci/test", CheckConclusion::Success)],
    );
    client.fail("list_status_contexts");
    let (service, _bus) = service_with(client.clone());

    let feedback = service.get_pr_feedback("acme", "widgets", 3).await.unwrap();
    assert_eq!(feedback.checks.len(), 1);
    assert_eq!(feedback.checks_state, ChecksState::Success);

    client.fail("list_check_runs");
    assert!(service.get_pr_feedback("acme", "widgets", 3).await.is_err());
}

#[tokio::test]
async fn sync_rewrites_task_pr_summary() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 3, "feature-x"));
    client.set_reviews(
        "acme",
        "widgets",
        3,
        vec![Review {
            id: 1,
            author: "alice".to_string(),
            state: ReviewState::Approved,
            body: String::new(),
            submitted_at: Some(Utc::now()),
        }],
    );
    let (service, _bus) = service_with(client.clone());

    let linked = service
        .associate_pr_with_task(&ctx(), "task_9", "acme", "widgets", 3)
        .await
        .unwrap();
    assert_eq!(linked.review_state, ReviewSummary::Approved);
    assert_eq!(linked.review_count, 1);

    client.set_pr_state("acme", "widgets", 3, PrState::Merged);
    let feedback = service.get_pr_feedback("acme", "widgets", 3).await.unwrap();
    let synced = service.sync_task_pr(&ctx(), "task_9", &feedback).unwrap();
    assert_eq!(synced.id, linked.id);
    assert_eq!(synced.state, PrState::Merged);
    assert!(synced.merged_at.is_some());
    assert_eq!(
        service.get_task_pr("task_9", 3).unwrap().map(|task_pr| task_pr.state),
        Some(PrState::Merged)
    );
}

#[tokio::test]
async fn unavailable_client_fails_fast() {
    let (service, _bus) = service_with(Arc::new(NoopClient));
    assert!(!service.is_available());
    let status = service.status().await;
    assert!(!status.available);
    assert!(status.user.is_none());

    let err = service.get_pr_feedback("acme", "widgets", 1).await.unwrap_err();
    assert!(err.is_unavailable());
    let watch = service.create_pr_watch(pr_watch_input("sess_1", 0)).unwrap();
    let err = service.detect_pr_for_watch(&ctx(), &watch).await.unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn review_watch_creation_queues_initial_poll() {
    let (trigger, mut queue) = ReviewPollTrigger::channel(4);
    let store = DbStore::new(with_test_db().unwrap());
    let service = GithubService::new(store, Arc::new(MockClient::new()), EventBus::new(8))
        .with_review_trigger(trigger);

    let enabled = service.create_review_watch(review_watch_input(Vec::new())).unwrap();
    service
        .create_review_watch(CreateReviewWatchInput {
            enabled: Some(false),
            ..review_watch_input(Vec::new())
        })
        .unwrap();

    assert_eq!(queue.recv().await, Some(enabled.id));
    assert!(queue.try_recv().is_err());
}

#[tokio::test]
async fn review_submission_passes_through() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 3, "feature-x"));
    let (service, _bus) = service_with(client.clone());

    service
        .submit_review("acme", "widgets", 3, ReviewEvent::Approve, "LGTM")
        .await
        .unwrap();
    let submitted = client.submitted_reviews();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].event, ReviewEvent::Approve);
    assert_eq!(service.list_open_prs("acme", "widgets").await.unwrap().len(), 1);
}
