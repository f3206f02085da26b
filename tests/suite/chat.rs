//! End-to-end chat turns over HTTP.

use bgchat_engine::{ADVISORY_TEXT, ChatError, Message, SessionEvent, TurnOutcome};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{
    answer_body, api, mount_answer, mount_determination, mount_history, next_notice,
    request_paths, session_for, start_backend,
};

#[tokio::test]
async fn selected_game_turn_streams_into_history() {
    let server = start_backend().await;
    mount_history(
        &server,
        "Catan",
        json!([
            { "role": "user", "content": "How many players?" },
            { "role": "assistant", "content": "Three to four." }
        ]),
    )
    .await;
    mount_answer(&server, "Can I build on turn one?", answer_body(&["Yes, ", "after rolling."])).await;

    let (mut session, _notices) = session_for(&server);
    session.load_known_games().await.unwrap();
    session.select_game("Catan").unwrap();
    session.settle().await;
    assert_eq!(session.history().len(), 2);

    assert!(session.send("Can I build on turn one?"));
    let mut chunks = Vec::new();
    while let Some(event) = session.next_event().await {
        if let SessionEvent::Chunk(text) = event {
            chunks.push(text);
        }
    }

    assert_eq!(chunks.concat(), "Yes, after rolling.");
    assert_eq!(
        session.history()[2..],
        [
            Message::user("Can I build on turn one?"),
            Message::assistant("Yes, after rolling."),
        ]
    );
    assert!(session.history().iter().all(Message::is_persisted));
    assert_eq!(session.last_outcome(), Some(&TurnOutcome::Completed));
}

#[tokio::test]
async fn question_without_game_is_classified_first() {
    let server = start_backend().await;
    mount_determination(&server, "Wingspan").await;
    mount_answer(&server, "When do I lay eggs?", answer_body(&["On the lay eggs action."])).await;

    let (mut session, _notices) = session_for(&server);
    session.send("When do I lay eggs?");
    session.settle().await;

    assert_eq!(session.selected_game().map(|g| g.as_str()), Some("Wingspan"));
    assert_eq!(session.history()[1], Message::assistant("On the lay eggs action."));

    let paths = request_paths(&server).await;
    let classify = paths.iter().position(|p| p == &api("determine-board-game"));
    let ask = paths.iter().position(|p| p == &api("ask-question"));
    assert!(classify.is_some() && classify < ask);
}

#[tokio::test]
async fn unknown_game_gets_advisory_without_asking() {
    let server = start_backend().await;
    mount_determination(&server, "UNKNOWN").await;
    Mock::given(method("POST"))
        .and(path(api("ask-question")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (mut session, _notices) = session_for(&server);
    session.send("What is the meaning of life?");
    session.settle().await;

    assert_eq!(
        session.history(),
        &[
            Message::user("What is the meaning of life?"),
            Message::assistant(ADVISORY_TEXT),
        ]
    );
    assert_eq!(session.last_outcome(), Some(&TurnOutcome::Advisory));
    assert!(session.selected_game().is_none());
}

#[tokio::test]
async fn edit_deletes_remote_suffix_before_asking_again() {
    let server = start_backend().await;
    mount_history(
        &server,
        "Catan",
        json!([
            { "role": "user", "content": "q1" },
            { "role": "assistant", "content": "a1" },
            { "role": "user", "content": "q2" },
            { "role": "assistant", "content": "a2" }
        ]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(api("delete-messages-from-index")))
        .and(body_json(json!({ "board_game": "Catan", "index": 2 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;
    mount_answer(&server, "q2, rephrased", answer_body(&["a2b"])).await;

    let (mut session, _notices) = session_for(&server);
    session.load_known_games().await.unwrap();
    session.select_game("Catan").unwrap();
    session.settle().await;

    assert_eq!(session.edit_and_resend(2, "q2, rephrased"), Ok(true));
    session.settle().await;

    assert_eq!(
        session.history(),
        &[
            Message::user("q1"),
            Message::assistant("a1"),
            Message::user("q2, rephrased"),
            Message::assistant("a2b"),
        ]
    );
    let paths = request_paths(&server).await;
    let delete = paths.iter().position(|p| p == &api("delete-messages-from-index"));
    let ask = paths.iter().position(|p| p == &api("ask-question"));
    assert!(delete.is_some() && delete < ask);
}

#[tokio::test]
async fn server_failure_becomes_error_message_and_notice() {
    let server = start_backend().await;
    mount_history(&server, "Catan", json!([])).await;
    Mock::given(method("POST"))
        .and(path(api("ask-question")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (mut session, mut notices) = session_for(&server);
    session.load_known_games().await.unwrap();
    session.select_game("Catan").unwrap();
    session.send("Anything?");
    session.settle().await;

    assert_eq!(
        session.history(),
        &[
            Message::user("Anything?"),
            Message::from_failure(&ChatError::ServerError),
        ]
    );
    assert_eq!(next_notice(&mut notices).await, ChatError::ServerError.to_string());
}

#[tokio::test]
async fn error_frame_keeps_partial_answer() {
    let server = start_backend().await;
    mount_history(&server, "Catan", json!([])).await;
    let body = format!(
        "data: {}\n\ndata: {}\n\n",
        json!({ "chunk": "The robber " }),
        json!({ "error": "An error occurred while processing your question" })
    );
    mount_answer(&server, "Robber?", body).await;

    let (mut session, mut notices) = session_for(&server);
    session.load_known_games().await.unwrap();
    session.select_game("Catan").unwrap();
    session.send("Robber?");
    session.settle().await;

    assert_eq!(
        session.history(),
        &[
            Message::user("Robber?"),
            Message::assistant("The robber "),
            Message::error("An error occurred while processing your question"),
        ]
    );
    assert_eq!(
        next_notice(&mut notices).await,
        "An error occurred while processing your question"
    );
}

#[tokio::test]
async fn clear_chat_clears_remote_history() {
    let server = start_backend().await;
    mount_history(
        &server,
        "Wingspan",
        json!([{ "role": "user", "content": "q" }, { "role": "assistant", "content": "a" }]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(api("clear-message-history")))
        .and(body_json(json!({ "board_game": "Wingspan" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (mut session, _notices) = session_for(&server);
    session.load_known_games().await.unwrap();
    session.select_game("Wingspan").unwrap();
    session.settle().await;
    assert_eq!(session.history().len(), 2);

    session.clear_chat();
    session.settle().await;
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn unauthenticated_history_is_announced() {
    let server = start_backend().await;
    Mock::given(method("POST"))
        .and(path(api("message-history")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (mut session, mut notices) = session_for(&server);
    session.load_known_games().await.unwrap();
    session.select_game("Catan").unwrap();
    session.settle().await;

    assert!(session.history().is_empty());
    assert_eq!(
        next_notice(&mut notices).await,
        ChatError::Unauthenticated.to_string()
    );
}
