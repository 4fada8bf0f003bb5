//! End-to-end workflow scenarios against an in-memory store and local stub
//! servers for the feed host and the model API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;

use citadel_common::db::{init, Store};
use citadel_common::models::TimelineStatus;
use citadel_worker::engine::{ActivityOptions, ErrorTag, RetryPolicy, WorkflowHost};
use citadel_worker::fetch::Fetcher;
use citadel_worker::judge::ClaudeClient;
use citadel_worker::workflows::JUDGE_TIMELINE_WORKFLOW_ID;
use citadel_worker::{Activities, Workflows};

const RSS_TWO_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test RSS Feed</title>
    <description>A test RSS feed</description>
    <item>
      <title>Post One</title>
      <link>https://example.com/post-1</link>
      <guid>g1</guid>
      <description>First post</description>
      <pubDate>Mon, 01 Jan 2024 12:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Post Two</title>
      <link>https://example.com/post-2</link>
      <guid>g2</guid>
      <description>Second post</description>
      <pubDate>Tue, 02 Jan 2024 12:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

const RSS_THREE_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Fanout Feed</title>
    <description>Entries for fan-out</description>
    <item><title>E1</title><link>https://example.com/e1</link><guid>e1</guid><description>one</description></item>
    <item><title>E2</title><link>https://example.com/e2</link><guid>e2</guid><description>two</description></item>
    <item><title>E3</title><link>https://example.com/e3</link><guid>e3</guid><description>three</description></item>
  </channel>
</rss>"#;

async fn test_store() -> Result<Store> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init::apply_pragmas(&pool).await?;
    init::create_schema(&pool).await?;
    Ok(Store::new(pool))
}

async fn serve(app: Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn workflows(store: &Store, claude: Option<ClaudeClient>) -> Result<Workflows> {
    let activities = Activities::new(store.clone(), Fetcher::new()?, claude);
    Ok(Workflows::new(
        Arc::new(activities),
        Arc::new(WorkflowHost::new()),
    ))
}

async fn wait_for_judgement(wf: &Workflows) {
    for _ in 0..100 {
        if !wf.host().is_running(JUDGE_TIMELINE_WORKFLOW_ID).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("judge workflow did not finish");
}

#[tokio::test]
async fn create_feed_syncs_entries_and_metadata() -> Result<()> {
    let store = test_store().await?;
    let base = serve(Router::new().route("/rss", get(|| async { RSS_TWO_ITEMS }))).await?;
    let wf = workflows(&store, None)?;

    let feed_id = wf.create_feed(&format!("{base}/rss")).await.unwrap();
    assert!(feed_id.ends_with("-fd"));

    let feed = store.feed(&feed_id).await?;
    assert_eq!(feed.title.as_deref(), Some("Test RSS Feed"));
    assert_eq!(feed.description.as_deref(), Some("A test RSS feed"));
    let synced = feed.last_synced_at.expect("sync must stamp the feed");
    assert!(Utc::now() - synced.0 < chrono::Duration::minutes(1));

    let guids: Vec<String> = sqlx::query_scalar("SELECT guid FROM feed_entries ORDER BY guid")
        .fetch_all(store.pool())
        .await?;
    assert_eq!(guids, vec!["g1", "g2"]);

    Ok(())
}

#[tokio::test]
async fn create_feed_compensates_when_sync_fails() -> Result<()> {
    let store = test_store().await?;
    let base = serve(Router::new().route(
        "/rss",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    ))
    .await?;
    let wf = workflows(&store, None)?;

    let err = wf.create_feed(&format!("{base}/rss")).await.unwrap_err();
    assert_eq!(err.into_domain().status(), 502);

    // Compensation removed the feed row; cascade leaves no orphans.
    let feeds: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
        .fetch_one(store.pool())
        .await?;
    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_entries")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(feeds, 0);
    assert_eq!(entries, 0);

    Ok(())
}

#[tokio::test]
async fn create_feed_returns_the_existing_feed_for_a_known_url() -> Result<()> {
    let store = test_store().await?;
    let base = serve(Router::new().route("/rss", get(|| async { RSS_TWO_ITEMS }))).await?;
    let wf = workflows(&store, None)?;

    let url = format!("{base}/rss");
    let first = wf.create_feed(&url).await.unwrap();
    let second = wf.create_feed(&url).await.unwrap();
    assert_eq!(first, second);

    let feeds: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(feeds, 1);

    Ok(())
}

#[tokio::test]
async fn syncing_twice_reaches_the_same_state() -> Result<()> {
    let store = test_store().await?;
    let base = serve(Router::new().route("/rss", get(|| async { RSS_TWO_ITEMS }))).await?;
    let wf = workflows(&store, None)?;
    let activities = Activities::new(store.clone(), Fetcher::new()?, None);

    let feed_id = wf.create_feed(&format!("{base}/rss")).await.unwrap();
    activities.sync_feed(&feed_id, true).await.unwrap();

    let entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feed_entries")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(entries, 2);

    Ok(())
}

#[tokio::test]
async fn recent_feeds_are_skipped_unless_forced() -> Result<()> {
    let store = test_store().await?;

    let hits = Arc::new(AtomicU32::new(0));
    let app = Router::new().route(
        "/rss",
        get({
            let hits = hits.clone();
            move || {
                hits.fetch_add(1, Ordering::SeqCst);
                async { RSS_TWO_ITEMS }
            }
        }),
    );
    let base = serve(app).await?;

    let wf = workflows(&store, None)?;
    let activities = Activities::new(store.clone(), Fetcher::new()?, None);

    let feed_id = wf.create_feed(&format!("{base}/rss")).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Within the recency window a non-forced sync is a no-op.
    activities.sync_feed(&feed_id, false).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Forcing ignores the window.
    activities.sync_feed(&feed_id, true).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    Ok(())
}

#[tokio::test]
async fn refresh_fans_out_subscribed_entries() -> Result<()> {
    let store = test_store().await?;
    let base = serve(Router::new().route("/rss", get(|| async { RSS_THREE_ITEMS }))).await?;
    let activities = Activities::new(store.clone(), Fetcher::new()?, None);

    let user = store.ensure_user("gh-u", "u@example.com").await?;
    let feed_id = activities.create_feed(&format!("{base}/rss")).await.unwrap();
    activities.sync_feed(&feed_id, true).await.unwrap();
    store.create_subscription(&user.id, &feed_id).await?;

    assert!(activities.active_prompt().await.unwrap().is_none());

    let inserted = activities.insert_missing_timeline_entries().await.unwrap();
    assert_eq!(inserted, 3);

    let pending = store.entries_needing_judgement(None, 10).await?;
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|e| e.user_id == user.id));
    assert!(pending
        .iter()
        .all(|e| e.status == TimelineStatus::RequiresJudgement));

    // A second refresh over unchanged state owes nothing.
    let inserted_again = activities.insert_missing_timeline_entries().await.unwrap();
    assert_eq!(inserted_again, 0);

    Ok(())
}

#[tokio::test]
async fn judgement_auto_approves_without_an_active_prompt() -> Result<()> {
    let store = test_store().await?;
    let base = serve(Router::new().route("/rss", get(|| async { RSS_THREE_ITEMS }))).await?;
    // No Claude client at all: the auto-approve path must never need one.
    let wf = workflows(&store, None)?;

    let user = store.ensure_user("gh-u", "u@example.com").await?;
    let feed_id = wf.create_feed(&format!("{base}/rss")).await.unwrap();
    store.create_subscription(&user.id, &feed_id).await?;

    wf.refresh_timeline().await;
    wait_for_judgement(&wf).await;

    let statuses: Vec<String> = sqlx::query_scalar("SELECT status FROM timeline_entries")
        .fetch_all(store.pool())
        .await?;
    assert_eq!(statuses.len(), 3);
    assert!(statuses.iter().all(|s| s == "approved"));

    Ok(())
}

#[tokio::test]
async fn judgement_applies_model_verdicts() -> Result<()> {
    let store = test_store().await?;
    let base = serve(Router::new().route("/rss", get(|| async { RSS_THREE_ITEMS }))).await?;

    let user = store.ensure_user("gh-u", "u@example.com").await?;
    store.set_prompt("only posts about one and three").await?;

    // The stub approves e1 and e3 and rejects e2, echoing back feed entry IDs.
    let claude_app = Router::new().route(
        "/",
        post(|State(store): State<Store>| async move {
            let verdicts = verdicts_for(&store, &[("e1", true), ("e2", false), ("e3", true)]).await;
            Json(claude_response(&verdicts))
        }),
    );
    let claude_base = serve(claude_app.with_state(store.clone())).await?;
    let claude = ClaudeClient::with_api_url(claude_base, "test-key".to_string())?;

    let wf = workflows(&store, Some(claude))?;
    let feed_id = wf.create_feed(&format!("{base}/rss")).await.unwrap();
    store.create_subscription(&user.id, &feed_id).await?;

    wf.refresh_timeline().await;
    wait_for_judgement(&wf).await;

    assert_eq!(status_of_guid(&store, "e1").await?, "approved");
    assert_eq!(status_of_guid(&store, "e2").await?, "rejected");
    assert_eq!(status_of_guid(&store, "e3").await?, "approved");

    Ok(())
}

#[tokio::test]
async fn entries_dropped_by_the_model_are_rejected() -> Result<()> {
    let store = test_store().await?;
    let base = serve(Router::new().route("/rss", get(|| async { RSS_THREE_ITEMS }))).await?;

    let user = store.ensure_user("gh-u", "u@example.com").await?;
    store.set_prompt("strict prompt").await?;

    // The stub only rules on e1; e2 and e3 are missing from the response.
    let claude_app = Router::new().route(
        "/",
        post(|State(store): State<Store>| async move {
            let verdicts = verdicts_for(&store, &[("e1", true)]).await;
            Json(claude_response(&verdicts))
        }),
    );
    let claude_base = serve(claude_app.with_state(store.clone())).await?;
    let claude = ClaudeClient::with_api_url(claude_base, "test-key".to_string())?;

    let wf = workflows(&store, Some(claude))?;
    let feed_id = wf.create_feed(&format!("{base}/rss")).await.unwrap();
    store.create_subscription(&user.id, &feed_id).await?;

    wf.refresh_timeline().await;
    wait_for_judgement(&wf).await;

    assert_eq!(status_of_guid(&store, "e1").await?, "approved");
    assert_eq!(status_of_guid(&store, "e2").await?, "rejected");
    assert_eq!(status_of_guid(&store, "e3").await?, "rejected");

    Ok(())
}

#[tokio::test]
async fn rate_limited_judgement_succeeds_on_retry() -> Result<()> {
    let store = test_store().await?;
    let base = serve(Router::new().route("/rss", get(|| async { RSS_THREE_ITEMS }))).await?;

    let user = store.ensure_user("gh-u", "u@example.com").await?;
    store.set_prompt("only posts about one and three").await?;

    // First call is a 429; the retry succeeds.
    let calls = Arc::new(AtomicU32::new(0));
    let claude_state = (store.clone(), calls.clone());
    let claude_app = Router::new().route(
        "/",
        post(
            |State((store, calls)): State<(Store, Arc<AtomicU32>)>| async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    return StatusCode::TOO_MANY_REQUESTS.into_response();
                }
                let verdicts =
                    verdicts_for(&store, &[("e1", true), ("e2", false), ("e3", true)]).await;
                Json(claude_response(&verdicts)).into_response()
            },
        ),
    );
    let claude_base = serve(claude_app.with_state(claude_state)).await?;
    let claude = ClaudeClient::with_api_url(claude_base, "test-key".to_string())?;

    let activities = Activities::new(store.clone(), Fetcher::new()?, Some(claude));
    let wf = workflows(&store, None)?;
    let feed_id = wf.create_feed(&format!("{base}/rss")).await.unwrap();
    store.create_subscription(&user.id, &feed_id).await?;
    activities.insert_missing_timeline_entries().await.unwrap();

    // Same shape as the judge policy, with test-sized backoff.
    let options = ActivityOptions {
        start_to_close_timeout: Duration::from_secs(5),
        retry_policy: RetryPolicy {
            initial_interval: Duration::from_millis(10),
            backoff_coefficient: 2.0,
            maximum_attempts: 3,
        },
        non_retryable: &[ErrorTag::Internal],
    };
    let judgements =
        citadel_worker::engine::execute("judge entries", &options, || activities.judge_entries())
            .await
            .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    activities.mark_entries_as_judged(&judgements).await.unwrap();

    assert_eq!(status_of_guid(&store, "e1").await?, "approved");
    assert_eq!(status_of_guid(&store, "e2").await?, "rejected");
    assert_eq!(status_of_guid(&store, "e3").await?, "approved");

    // A replayed mark is absorbed.
    activities.mark_entries_as_judged(&judgements).await.unwrap();
    assert_eq!(status_of_guid(&store, "e2").await?, "rejected");

    Ok(())
}

#[tokio::test]
async fn judge_timeline_is_a_noop_with_nothing_pending() -> Result<()> {
    let store = test_store().await?;
    let wf = workflows(&store, None)?;

    // No pending rows: must exit without needing a model or writing anything.
    wf.judge_timeline().await;

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM timeline_entries")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(rows, 0);

    Ok(())
}

/// Map fixture GUIDs to their stored feed-entry IDs and wrap them in the
/// verdict shape the model returns.
async fn verdicts_for(store: &Store, wanted: &[(&str, bool)]) -> Vec<serde_json::Value> {
    let mut verdicts = Vec::new();
    for (guid, approved) in wanted {
        let feed_entry_id: String =
            sqlx::query_scalar("SELECT id FROM feed_entries WHERE guid = ?")
                .bind(guid)
                .fetch_one(store.pool())
                .await
                .unwrap();
        verdicts.push(serde_json::json!({
            "feed_entry_id": feed_entry_id,
            "approved": approved,
        }));
    }
    verdicts
}

fn claude_response(verdicts: &[serde_json::Value]) -> serde_json::Value {
    serde_json::json!({
        "content": [{
            "type": "text",
            "text": serde_json::to_string(verdicts).unwrap(),
        }],
    })
}

async fn status_of_guid(store: &Store, guid: &str) -> Result<String> {
    Ok(sqlx::query_scalar(
        r#"
        SELECT te.status
        FROM timeline_entries te
        INNER JOIN feed_entries fe ON fe.id = te.feed_entry_id
        WHERE fe.guid = ?
        "#,
    )
    .bind(guid)
    .fetch_one(store.pool())
    .await?)
}
