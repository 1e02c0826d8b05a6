use chrono::{Duration as ChronoDuration, Utc};
use os_core::github::{GithubClient, MockClient, NoopClient};
use os_core::types::{
    Comment, CommentKind, CreatePrWatchInput, CreateReviewWatchInput, PrState,
};
use os_core::{GithubService, RequestContext, ReviewPollTrigger};
use os_db::DbStore;
use os_db::schema::with_test_db;
use os_events::EventBus;
use os_poller::{PassReport, Poller, PollerConfig, run_pr_pass, run_review_pass};
use std::sync::Arc;
use std::time::Duration;

fn service_with(client: Arc<dyn GithubClient>) -> (GithubService<DbStore>, EventBus) {
    let store = DbStore::new(with_test_db().unwrap());
    let bus = EventBus::new(64);
    (GithubService::new(store, client, bus.clone()), bus)
}

fn pr_watch_input(pr_number: u64) -> CreatePrWatchInput {
    CreatePrWatchInput {
        session_id: "sess_1".to_string(),
        task_id: "task_1".to_string(),
        owner: "acme".to_string(),
        repo: "widgets".to_string(),
        pr_number,
        branch: "feature-x".to_string(),
    }
}

fn review_watch_input() -> CreateReviewWatchInput {
    CreateReviewWatchInput {
        workspace_id: "ws_1".to_string(),
        workflow_id: "wf_review".to_string(),
        workflow_step_id: "step_triage".to_string(),
        repos: Vec::new(),
        review_scope: None,
        custom_query: None,
        agent_profile_id: None,
        executor_profile_id: None,
        prompt: None,
        enabled: None,
        poll_interval_seconds: None,
    }
}

fn quiet_config() -> PollerConfig {
    PollerConfig {
        pr_interval: Duration::from_secs(3600),
        review_interval: Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn detection_pass_moves_watch_to_tracking() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 7, "feature-x"));
    let (service, _bus) = service_with(client);
    let watch = service.create_pr_watch(pr_watch_input(0)).unwrap();

    let report = run_pr_pass(&service, &RequestContext::poller()).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.changed, 1);

    let watch = service.get_pr_watch(&watch.id).unwrap().unwrap();
    assert_eq!(watch.pr_number, 7);
    let task_prs = service.list_task_prs("task_1").unwrap();
    assert_eq!(task_prs.len(), 1);
    assert_eq!(task_prs[0].pr_number, 7);
}

#[tokio::test]
async fn merged_pull_request_removes_its_watch() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 7, "feature-x"));
    client.set_pr_state("acme", "widgets", 7, PrState::Merged);
    let (service, _bus) = service_with(client);
    service.create_pr_watch(pr_watch_input(7)).unwrap();

    let report = run_pr_pass(&service, &RequestContext::poller()).await.unwrap();
    assert_eq!(report.removed, 1);
    assert!(service.list_active_pr_watches().unwrap().is_empty());

    let task_pr = service.get_task_pr("task_1", 7).unwrap().unwrap();
    assert_eq!(task_pr.state, PrState::Merged);
    assert!(task_pr.merged_at.is_some());
}

#[tokio::test]
async fn new_comment_is_announced_once() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 7, "feature-x"));
    client.add_comment(
        "acme",
        "widgets",
        7,
        Comment {
            id: 1,
            kind: CommentKind::Review,
            author: "reviewer".to_string(),
            body: "nit".to_string(),
            path: Some("src/lib.rs".to_string()),
            line: Some(3),
            created_at: Utc::now() - ChronoDuration::minutes(1),
        },
    );
    let (service, bus) = service_with(client);
    let mut events = bus.subscribe();
    service.create_pr_watch(pr_watch_input(7)).unwrap();

    let report = run_pr_pass(&service, &RequestContext::poller()).await.unwrap();
    assert_eq!(report.changed, 1);
    let mut kinds = Vec::new();
    while let Ok(record) = events.try_recv() {
        kinds.push(record.kind().unwrap_or_default().to_string());
    }
    assert!(kinds.contains(&"PrFeedbackChanged".to_string()));
    assert!(kinds.contains(&"TaskPrUpdated".to_string()));

    let report = run_pr_pass(&service, &RequestContext::poller()).await.unwrap();
    assert_eq!(
        report,
        PassReport {
            checked: 1,
            ..PassReport::default()
        }
    );
}

#[tokio::test]
async fn failing_watch_does_not_stop_the_pass() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 7, "feature-x"));
    let (service, _bus) = service_with(client.clone());
    service.create_pr_watch(pr_watch_input(7)).unwrap();
    let mut other = pr_watch_input(0);
    other.session_id = "sess_2".to_string();
    other.branch = "feature-y".to_string();
    service.create_pr_watch(other).unwrap();
    client.fail("get_pr");

    let report = run_pr_pass(&service, &RequestContext::poller()).await.unwrap();
    assert_eq!(report.checked, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(service.list_active_pr_watches().unwrap().len(), 2);
}

#[tokio::test]
async fn review_pass_announces_and_waits_for_schedule() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 11, "fix-y"));
    client.request_review("acme", "widgets", 11);
    let (service, bus) = service_with(client.clone());
    let mut events = bus.subscribe();
    service.create_review_watch(review_watch_input()).unwrap();

    let ctx = RequestContext::poller();
    let report = run_review_pass(&service, &ctx, Utc::now()).await.unwrap();
    assert_eq!(report.changed, 1);
    let record = events.try_recv().unwrap();
    assert_eq!(record.kind(), Some("ReviewPrDiscovered"));

    let report = run_review_pass(&service, &ctx, Utc::now()).await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(client.calls("search_prs"), 1);

    let later = Utc::now() + ChronoDuration::hours(1);
    let report = run_review_pass(&service, &ctx, later).await.unwrap();
    assert_eq!(report.checked, 1);
    assert_eq!(report.changed, 1, "unrecorded PRs are announced again");
}

#[tokio::test]
async fn review_watches_are_polled_again_after_exactly_their_interval() {
    let client = Arc::new(MockClient::new());
    let (service, _bus) = service_with(client);
    service.create_review_watch(review_watch_input()).unwrap();
    service
        .create_review_watch(CreateReviewWatchInput {
            poll_interval_seconds: Some(60),
            ..review_watch_input()
        })
        .unwrap();

    let ctx = RequestContext::poller();
    let t0 = Utc::now() + ChronoDuration::minutes(5);
    let at = |secs: i64| t0 + ChronoDuration::seconds(secs);
    assert_eq!(run_review_pass(&service, &ctx, t0).await.unwrap().checked, 2);
    assert_eq!(run_review_pass(&service, &ctx, at(59)).await.unwrap().checked, 0);
    assert_eq!(run_review_pass(&service, &ctx, at(60)).await.unwrap().checked, 1);
    assert_eq!(run_review_pass(&service, &ctx, at(299)).await.unwrap().checked, 0);
    assert_eq!(run_review_pass(&service, &ctx, at(300)).await.unwrap().checked, 2);
}

#[tokio::test]
async fn unavailable_client_skips_passes() {
    let (service, _bus) = service_with(Arc::new(NoopClient));
    service.create_pr_watch(pr_watch_input(0)).unwrap();
    let ctx = RequestContext::poller();
    assert_eq!(run_pr_pass(&service, &ctx).await.unwrap(), PassReport::default());
    assert_eq!(
        run_review_pass(&service, &ctx, Utc::now()).await.unwrap(),
        PassReport::default()
    );
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let (service, _bus) = service_with(Arc::new(MockClient::new()));
    let mut poller = Poller::new(Arc::new(service), quiet_config());

    poller.stop().await;
    assert!(!poller.is_running());

    poller.start();
    poller.start();
    assert!(poller.is_running());

    poller.stop().await;
    assert!(!poller.is_running());
    poller.stop().await;

    poller.start();
    assert!(poller.is_running());
    poller.stop().await;
}

#[tokio::test]
async fn queued_review_watch_is_polled_promptly() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 11, "fix-y"));
    client.request_review("acme", "widgets", 11);
    let (trigger, queue) = ReviewPollTrigger::channel(4);
    let (service, bus) = service_with(client);
    let service = Arc::new(service.with_review_trigger(trigger));
    let mut events = bus.subscribe();

    let mut poller = Poller::new(Arc::clone(&service), quiet_config()).with_review_queue(queue);
    poller.start();
    service.create_review_watch(review_watch_input()).unwrap();

    let record = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let record = events.recv().await.unwrap();
            if record.kind() == Some("ReviewPrDiscovered") {
                return record;
            }
        }
    })
    .await
    .expect("review watch was not polled");
    assert_eq!(record.body["payload"]["pr"]["number"], 11);

    poller.stop().await;
    poller.start();
    assert!(poller.is_running());
    poller.stop().await;
}

async fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

#[tokio::test]
async fn first_pass_runs_as_soon_as_the_poller_starts() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 7, "feature-x"));
    let (service, _bus) = service_with(client);
    let service = Arc::new(service);
    let watch = service.create_pr_watch(pr_watch_input(0)).unwrap();

    let mut poller = Poller::new(Arc::clone(&service), quiet_config());
    poller.start();
    wait_for("detection", || {
        service
            .get_pr_watch(&watch.id)
            .unwrap()
            .is_some_and(|watch| watch.pr_number == 7)
    })
    .await;
    poller.stop().await;
}

#[tokio::test]
async fn stop_waits_for_the_pass_in_flight() {
    let client = Arc::new(MockClient::new());
    client.add_pr(MockClient::sample_pr("acme", "widgets", 7, "feature-x"));
    client.delay("find_pr_by_branch", Duration::from_millis(300));
    let (service, _bus) = service_with(client.clone());
    let service = Arc::new(service);
    let watch = service.create_pr_watch(pr_watch_input(0)).unwrap();

    let mut poller = Poller::new(Arc::clone(&service), quiet_config());
    poller.start();
    wait_for("lookup to begin", || client.calls("find_pr_by_branch") == 1).await;
    assert_eq!(service.get_pr_watch(&watch.id).unwrap().unwrap().pr_number, 0);

    poller.stop().await;
    assert!(!poller.is_running());
    assert_eq!(service.get_pr_watch(&watch.id).unwrap().unwrap().pr_number, 7);
    assert_eq!(service.list_task_prs("task_1").unwrap().len(), 1);
}
