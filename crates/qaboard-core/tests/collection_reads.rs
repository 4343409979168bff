//! Cache-first collection reads

use pretty_assertions::assert_eq;
use qaboard_core::{
    AnswerState, ClientConfig, CollectionKind, ErrorKind, Source, ViewerContext, ViewerRole,
};
use qaboard_cache::CacheKey;
use qaboard_test_utils::testing::Script;
use qaboard_test_utils::*;
use serde_json::json;
use std::time::Duration;

fn ids(questions: &[qaboard_core::Question]) -> Vec<String> {
    questions.iter().map(|q| q.id.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn second_read_is_served_from_cache() {
    let h = TestHarness::new();
    h.respond("getQuestions", questions_payload(&sample_questions()));
    let viewer = ViewerContext::public();

    let first = h.client.load_questions(&viewer).await.unwrap();
    let second = h.client.load_questions(&viewer).await.unwrap();

    assert_eq!(first.source, Source::Remote);
    assert_eq!(second.source, Source::Cache);
    assert_eq!(first.items, second.items);
    assert_eq!(h.channel.attempts_for("getQuestions"), 1);
}

#[tokio::test(start_paused = true)]
async fn public_viewer_only_sees_public_questions() {
    let h = TestHarness::new();
    h.respond("getQuestions", questions_payload(&sample_questions()));

    let loaded = h.client.load_questions(&ViewerContext::public()).await.unwrap();

    assert_eq!(ids(&loaded.items), ["Q1", "Q3"]);
    let request = &h.channel.requests()[0];
    assert_eq!(request.params().get("includePrivate"), Some(&json!(false)));
}

#[tokio::test(start_paused = true)]
async fn roles_never_share_a_snapshot() {
    let h = TestHarness::new();
    h.respond("getQuestions", questions_payload(&[question("Q1", true)]));
    h.respond("getQuestions", questions_payload(&sample_questions()));

    let public = h.client.load_questions(&ViewerContext::public()).await.unwrap();
    let admin = h.client.load_questions(&ViewerContext::elevated()).await.unwrap();

    assert_eq!(public.items.len(), 1);
    assert_eq!(admin.source, Source::Remote);
    assert_eq!(ids(&admin.items), ["Q1", "Q2", "Q3"]);
    assert_eq!(h.channel.attempts_for("getQuestions"), 2);
}

#[tokio::test(start_paused = true)]
async fn one_channel_error_then_success_retries_once() {
    let h = TestHarness::new();
    h.script("getQuestions", Script::fail("script load failed"));
    h.respond(
        "getQuestions",
        json!({"status": "success", "data": [{"id": "Q1", "visibility": true}]}),
    );

    let started = tokio::time::Instant::now();
    let loaded = h.client.load_questions(&ViewerContext::public()).await.unwrap();

    assert_eq!(ids(&loaded.items), ["Q1"]);
    assert!(loaded.items[0].visibility);
    assert_eq!(h.channel.attempts_for("getQuestions"), 2);
    assert_eq!(started.elapsed(), Duration::from_millis(1_000));
    assert_eq!(h.channel.open_leases(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_read_falls_back_to_stale_snapshot() {
    let h = TestHarness::new();
    h.respond("getQuestions", questions_payload(&sample_questions()));
    let viewer = ViewerContext::public();
    h.client.load_questions(&viewer).await.unwrap();

    h.clock.advance(Duration::from_secs(120));
    let loaded = h.client.load_questions(&viewer).await.unwrap();

    assert_eq!(loaded.source, Source::StaleCache);
    assert!(loaded.source.is_degraded());
    assert_eq!(ids(&loaded.items), ["Q1", "Q3"]);
    // one initial fetch, then the default read budget of one retry
    assert_eq!(h.channel.attempts_for("getQuestions"), 3);
}

#[tokio::test(start_paused = true)]
async fn snapshot_older_than_fallback_ceiling_surfaces_the_error() {
    let h = TestHarness::new();
    h.respond("getQuestions", questions_payload(&sample_questions()));
    let viewer = ViewerContext::public();
    h.client.load_questions(&viewer).await.unwrap();

    h.clock.advance(Duration::from_secs(300));
    let err = h.client.load_questions(&viewer).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkExhausted);
}

#[tokio::test(start_paused = true)]
async fn remote_error_on_read_is_not_masked_by_cache() {
    let h = TestHarness::new();
    h.respond("getQuestions", questions_payload(&sample_questions()));
    let viewer = ViewerContext::public();
    h.client.load_questions(&viewer).await.unwrap();

    h.clock.advance(Duration::from_secs(60));
    h.respond("getQuestions", failure("sheet unavailable"));
    let err = h.client.load_questions(&viewer).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RemoteError);
    assert_eq!(err.to_string(), "sheet unavailable");
}

#[tokio::test(start_paused = true)]
async fn unexpected_payload_is_a_decode_error() {
    let h = TestHarness::new();
    h.respond("getQuestions", success(json!({"rows": 3})));

    let err = h.client.load_questions(&ViewerContext::public()).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test(start_paused = true)]
async fn blank_cells_do_not_fail_the_whole_list() {
    let h = TestHarness::new();
    h.respond(
        "getQuestions",
        success(json!([
            {"questionId": "Q1", "answerStatus": "ตอบแล้ว", "publicDisplay": true, "averageRating": 4.5},
            {"questionId": "Q2", "answerStatus": "", "publicDisplay": true, "averageRating": ""},
            {"questionId": "Q3", "answerStatus": null, "publicDisplay": "", "totalRatings": null},
        ])),
    );

    let loaded = h
        .client
        .load_questions(&ViewerContext::elevated())
        .await
        .unwrap();

    assert_eq!(loaded.source, Source::Remote);
    assert_eq!(ids(&loaded.items), ["Q1", "Q2", "Q3"]);
    let states: Vec<_> = loaded.items.iter().map(|q| q.state).collect();
    assert_eq!(
        states,
        [AnswerState::Answered, AnswerState::Rejected, AnswerState::Rejected]
    );
    assert_eq!(loaded.items[1].average_rating, None);
    assert!(!loaded.items[2].visibility);

    let cached = h
        .client
        .load_questions(&ViewerContext::elevated())
        .await
        .unwrap();
    assert_eq!(cached.source, Source::Cache);
    assert_eq!(cached.items, loaded.items);
}

#[tokio::test(start_paused = true)]
async fn topics_use_defaults_when_nothing_else_is_available() {
    let h = TestHarness::new();

    let loaded = h.client.load_topics(&ViewerContext::public()).await;

    assert_eq!(loaded.source, Source::Defaults);
    let names: Vec<_> = loaded.items.iter().map(|t| t.name.clone()).collect();
    assert_eq!(names, ClientConfig::default().default_topics);
}

#[tokio::test(start_paused = true)]
async fn topics_accept_legacy_bare_array() {
    let h = TestHarness::new();
    h.respond("getTopics", json!([{"topicName": "Admissions"}, {"name": "Fees"}]));

    let loaded = h
        .client
        .load_collection(CollectionKind::Topics, &ViewerContext::public())
        .await
        .unwrap();

    assert_eq!(loaded.source, Source::Remote);
    assert_eq!(loaded.items.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_drops_snapshots_and_reloads_both() {
    let h = TestHarness::new();
    let viewer = ViewerContext::public();
    h.respond("getQuestions", questions_payload(&sample_questions()));
    h.respond("getTopics", topics_payload(&["Admissions"]));
    h.client.load_questions(&viewer).await.unwrap();
    h.client.load_topics(&viewer).await;

    h.respond("getQuestions", questions_payload(&[question("Q9", true)]));
    h.respond("getTopics", topics_payload(&["Fees", "Exams"]));
    let refreshed = h.client.refresh(&viewer).await.unwrap();

    assert_eq!(refreshed.questions.source, Source::Remote);
    assert_eq!(ids(&refreshed.questions.items), ["Q9"]);
    assert_eq!(refreshed.topics.items.len(), 2);
    assert!(
        h.client
            .cache()
            .contains(&CacheKey::new(CollectionKind::Topics, ViewerRole::Public))
            .await
    );
}
