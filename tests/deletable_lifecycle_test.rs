use forum_api::auth::Claims;
use forum_api::db::repository::{NotificationFilter, TrashScope};
use forum_api::db::DatabaseClient;
use forum_api::library::CaptchaBuilder;
use forum_api::models::answer::CreateAnswerRequest;
use forum_api::models::comment::CreateCommentRequest;
use forum_api::models::question::CreateQuestionRequest;
use forum_api::models::{Commentable, Notification, ResourceKind, VoteType};
use forum_api::services::Deletable;
use forum_api::{AppConfig, AppError, AppState, Result};
use std::sync::Arc;
use tempfile::TempDir;

const ALICE: i64 = 1;
const BOB: i64 = 2;
const CAROL: i64 = 3;
const ADMIN: i64 = 99;

struct FixedCaptcha;

impl CaptchaBuilder for FixedCaptcha {
    fn build(&self, _width: u32, _height: u32) -> Result<(String, Vec<u8>)> {
        Ok(("AbCd5".to_string(), vec![0x89, 0x50, 0x4e, 0x47]))
    }
}

fn test_state(dir: &TempDir) -> AppState {
    let config = AppConfig::for_testing(dir.path().to_str().unwrap());
    AppState::with_parts(config, DatabaseClient::in_memory(), Arc::new(FixedCaptcha))
}

fn user(user_id: i64) -> Claims {
    Claims {
        user_id,
        username: format!("user{}", user_id),
        is_admin: user_id == ADMIN,
        exp: 0,
    }
}

fn question_request(title: &str) -> CreateQuestionRequest {
    CreateQuestionRequest {
        title: title.to_string(),
        content_markdown: "What is the **best** way?".to_string(),
        captcha_token: None,
        captcha_code: None,
    }
}

fn answer_request(text: &str) -> CreateAnswerRequest {
    CreateAnswerRequest {
        content_markdown: text.to_string(),
        captcha_token: None,
        captcha_code: None,
    }
}

fn comment_request(text: &str) -> CreateCommentRequest {
    CreateCommentRequest {
        content: text.to_string(),
        captcha_token: None,
        captcha_code: None,
    }
}

async fn notifications(state: &AppState, receiver_id: i64) -> Vec<Notification> {
    state
        .notification_service
        .list(receiver_id, &NotificationFilter::default(), 100, 0)
        .await
        .unwrap()
        .items
}

fn of_type<'a>(items: &'a [Notification], notification_type: &str) -> Vec<&'a Notification> {
    items.iter().filter(|n| n.notification_type == notification_type).collect()
}

#[tokio::test]
async fn test_trash_and_untrash_round_trip() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let question = state
        .question_service
        .create(&user(ALICE), question_request("Round trip"), 100)
        .await
        .unwrap()
        .item;

    let trashed = state.question_service.trash(question.question_id, ADMIN).await.unwrap();
    assert!(trashed.delete_time.is_some());
    assert!(matches!(
        state.question_service.get(question.question_id).await,
        Err(AppError::NotFound(_))
    ));

    // Trashing again finds nothing live.
    assert!(matches!(
        state.question_service.trash(question.question_id, ADMIN).await,
        Err(AppError::NotFound(_))
    ));

    let notices = notifications(&state, ALICE).await;
    let deleted = of_type(&notices, "question_deleted");
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].sender_id, Some(ADMIN));
    assert_eq!(deleted[0].question_id, Some(question.question_id));
    let snapshot = deleted[0].content_deleted.as_ref().unwrap();
    assert_eq!(snapshot["title"], "Round trip");

    let restored = state.question_service.untrash(question.question_id).await.unwrap();
    assert_eq!(restored.delete_time, None);
    assert_eq!(state.question_service.get(question.question_id).await.unwrap().title, "Round trip");

    // Restoring sends nothing.
    assert_eq!(notifications(&state, ALICE).await.len(), 1);
    assert!(matches!(
        state.question_service.untrash(question.question_id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_permanent_delete_notifies_only_live_rows() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let first = state
        .question_service
        .create(&user(ALICE), question_request("First"), 100)
        .await
        .unwrap()
        .item;
    let second = state
        .question_service
        .create(&user(ALICE), question_request("Second"), 101)
        .await
        .unwrap()
        .item;

    state.question_service.trash(first.question_id, ADMIN).await.unwrap();
    assert_eq!(of_type(&notifications(&state, ALICE).await, "question_deleted").len(), 1);

    state
        .question_service
        .delete_multiple(&[first.question_id, second.question_id, 404], ADMIN)
        .await
        .unwrap();

    // Only the still-live question is announced a second time.
    let notices = notifications(&state, ALICE).await;
    let deleted = of_type(&notices, "question_deleted");
    assert_eq!(deleted.len(), 2);
    assert_eq!(deleted[0].question_id, Some(second.question_id));

    for id in [first.question_id, second.question_id] {
        assert!(state.db.question_repo.find(id, TrashScope::WithTrashed).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_owner_removing_own_content_is_not_notified() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let question = state
        .question_service
        .create(&user(ALICE), question_request("Mine"), 100)
        .await
        .unwrap()
        .item;
    state.question_service.delete(&user(ALICE), question.question_id).await.unwrap();

    assert!(notifications(&state, ALICE).await.is_empty());
}

#[tokio::test]
async fn test_answer_trash_recounts_question() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let question = state
        .question_service
        .create(&user(ALICE), question_request("Counting"), 100)
        .await
        .unwrap()
        .item;
    let bobs = state
        .answer_service
        .create(&user(BOB), question.question_id, answer_request("Use a map"), 110)
        .await
        .unwrap()
        .item;
    state
        .answer_service
        .create(&user(CAROL), question.question_id, answer_request("Use a set"), 120)
        .await
        .unwrap();

    assert_eq!(state.question_service.get(question.question_id).await.unwrap().answer_count, 2);
    assert_eq!(of_type(&notifications(&state, ALICE).await, "question_answered").len(), 2);

    state.answer_service.trash(bobs.answer_id, ADMIN).await.unwrap();
    assert_eq!(state.question_service.get(question.question_id).await.unwrap().answer_count, 1);

    let notices = notifications(&state, BOB).await;
    let deleted = of_type(&notices, "answer_deleted");
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].question_id, Some(question.question_id));
    assert_eq!(deleted[0].answer_id, Some(bobs.answer_id));

    state.answer_service.untrash(bobs.answer_id).await.unwrap();
    assert_eq!(state.question_service.get(question.question_id).await.unwrap().answer_count, 2);
}

async fn answer_count(state: &AppState, question_id: i64) -> i64 {
    state.question_service.get(question_id).await.unwrap().answer_count
}

#[tokio::test]
async fn test_batch_trash_and_restore_answers() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);
    const DAVE: i64 = 4;

    let question = state
        .question_service
        .create(&user(ALICE), question_request("Batch"), 100)
        .await
        .unwrap()
        .item;
    let mut answer_ids = Vec::new();
    for (author, text) in [(BOB, "One"), (CAROL, "Two"), (DAVE, "Three")] {
        let answer = state
            .answer_service
            .create(&user(author), question.question_id, answer_request(text), 110)
            .await
            .unwrap()
            .item;
        answer_ids.push(answer.answer_id);
    }
    let (bobs, carols, daves) = (answer_ids[0], answer_ids[1], answer_ids[2]);
    assert_eq!(answer_count(&state, question.question_id).await, 3);

    state.answer_service.trash(bobs, ADMIN).await.unwrap();
    assert_eq!(answer_count(&state, question.question_id).await, 2);

    // Bob's answer is already in the trash and the last id does not exist.
    let trashed = state
        .answer_service
        .trash_multiple(&[bobs, carols, 404], ADMIN)
        .await
        .unwrap();
    assert_eq!(trashed.len(), 1);
    assert_eq!(trashed[0].answer_id, carols);
    assert!(trashed[0].delete_time.is_some());
    assert_eq!(answer_count(&state, question.question_id).await, 1);

    assert_eq!(of_type(&notifications(&state, BOB).await, "answer_deleted").len(), 1);
    let notices = notifications(&state, CAROL).await;
    let deleted = of_type(&notices, "answer_deleted");
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].answer_id, Some(carols));
    assert!(of_type(&notifications(&state, DAVE).await, "answer_deleted").is_empty());

    let restored = state
        .answer_service
        .untrash_multiple(&[bobs, carols, daves])
        .await
        .unwrap();
    let mut restored_ids: Vec<i64> = restored.iter().map(|a| a.answer_id).collect();
    restored_ids.sort();
    assert_eq!(restored_ids, vec![bobs, carols]);
    assert!(restored.iter().all(|a| a.delete_time.is_none()));
    assert_eq!(answer_count(&state, question.question_id).await, 3);

    // Nothing left in the trash.
    let restored = state.answer_service.untrash_multiple(&[bobs, carols]).await.unwrap();
    assert!(restored.is_empty());
    assert_eq!(answer_count(&state, question.question_id).await, 3);

    // Restoring sends nothing.
    assert_eq!(of_type(&notifications(&state, BOB).await, "answer_deleted").len(), 1);
    assert_eq!(of_type(&notifications(&state, CAROL).await, "answer_deleted").len(), 1);
}

#[tokio::test]
async fn test_batch_trash_comments_recounts() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let question = state
        .question_service
        .create(&user(ALICE), question_request("Chatty"), 100)
        .await
        .unwrap()
        .item;
    let first = state
        .comment_service
        .create(&user(BOB), Commentable::Question(question.question_id), comment_request("First"), 110)
        .await
        .unwrap()
        .item;
    let second = state
        .comment_service
        .create(&user(CAROL), Commentable::Question(question.question_id), comment_request("Second"), 120)
        .await
        .unwrap()
        .item;
    assert_eq!(state.question_service.get(question.question_id).await.unwrap().comment_count, 2);

    let trashed = state
        .comment_service
        .trash_multiple(&[first.comment_id, second.comment_id], ADMIN)
        .await
        .unwrap();
    assert_eq!(trashed.len(), 2);
    assert_eq!(state.question_service.get(question.question_id).await.unwrap().comment_count, 0);

    for receiver in [BOB, CAROL] {
        let notices = notifications(&state, receiver).await;
        let deleted = of_type(&notices, "comment_deleted");
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].question_id, Some(question.question_id));
    }

    state
        .comment_service
        .untrash_multiple(&[first.comment_id, second.comment_id])
        .await
        .unwrap();
    assert_eq!(state.question_service.get(question.question_id).await.unwrap().comment_count, 2);
}

#[tokio::test]
async fn test_comment_on_answer_resolves_question() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let question = state
        .question_service
        .create(&user(ALICE), question_request("Nested"), 100)
        .await
        .unwrap()
        .item;
    let answer = state
        .answer_service
        .create(&user(BOB), question.question_id, answer_request("Answer"), 110)
        .await
        .unwrap()
        .item;
    let comment = state
        .comment_service
        .create(&user(CAROL), Commentable::Answer(answer.answer_id), comment_request("Nice"), 120)
        .await
        .unwrap()
        .item;

    assert_eq!(state.answer_service.get(answer.answer_id).await.unwrap().comment_count, 1);
    let notices = notifications(&state, BOB).await;
    let commented = of_type(&notices, "answer_commented");
    assert_eq!(commented.len(), 1);
    assert_eq!(commented[0].question_id, Some(question.question_id));
    assert_eq!(commented[0].comment_id, Some(comment.comment_id));

    state.comment_service.delete(&user(ADMIN), comment.comment_id).await.unwrap();

    let notices = notifications(&state, CAROL).await;
    let deleted = of_type(&notices, "comment_deleted");
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].answer_id, Some(answer.answer_id));
    assert_eq!(deleted[0].question_id, Some(question.question_id));
    assert_eq!(state.answer_service.get(answer.answer_id).await.unwrap().comment_count, 0);
}

#[tokio::test]
async fn test_question_delete_cascades_silently() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let question = state
        .question_service
        .create(&user(ALICE), question_request("Cascade"), 100)
        .await
        .unwrap()
        .item;
    let answer = state
        .answer_service
        .create(&user(BOB), question.question_id, answer_request("Answer"), 110)
        .await
        .unwrap()
        .item;
    let on_answer = state
        .comment_service
        .create(&user(CAROL), Commentable::Answer(answer.answer_id), comment_request("On answer"), 120)
        .await
        .unwrap()
        .item;
    let on_question = state
        .comment_service
        .create(&user(CAROL), Commentable::Question(question.question_id), comment_request("On question"), 130)
        .await
        .unwrap()
        .item;
    state
        .vote_service
        .cast_vote(BOB, ResourceKind::Question, question.question_id, VoteType::Up)
        .await
        .unwrap();
    state
        .vote_service
        .cast_vote(ALICE, ResourceKind::Answer, answer.answer_id, VoteType::Down)
        .await
        .unwrap();

    state.question_service.trash(question.question_id, ADMIN).await.unwrap();
    state
        .question_service
        .delete_multiple(&[question.question_id], ADMIN)
        .await
        .unwrap();

    assert!(state.db.answer_repo.find(answer.answer_id, TrashScope::WithTrashed).await.unwrap().is_none());
    for id in [on_answer.comment_id, on_question.comment_id] {
        assert!(state.db.comment_repo.find(id, TrashScope::WithTrashed).await.unwrap().is_none());
    }

    let votes = state
        .vote_service
        .get_in_relationship(Some(BOB), ResourceKind::Question, &[question.question_id])
        .await
        .unwrap();
    assert_eq!(votes[&question.question_id], "");
    let votes = state
        .vote_service
        .get_in_relationship(Some(ALICE), ResourceKind::Answer, &[answer.answer_id])
        .await
        .unwrap();
    assert_eq!(votes[&answer.answer_id], "");

    // Children go without notices of their own.
    assert!(of_type(&notifications(&state, BOB).await, "answer_deleted").is_empty());
    assert!(of_type(&notifications(&state, CAROL).await, "comment_deleted").is_empty());
}

#[tokio::test]
async fn test_topics_trash_without_notices() {
    let dir = TempDir::new().unwrap();
    let state = test_state(&dir);

    let topic = state
        .topic_service
        .create(
            &user(ADMIN),
            forum_api::models::topic::CreateTopicRequest {
                name: "rust".to_string(),
                description: "Systems programming".to_string(),
            },
            100,
        )
        .await
        .unwrap();

    let trashed = state.topic_service.trash_multiple(&[topic.topic_id, 77], ADMIN).await.unwrap();
    assert_eq!(trashed.len(), 1);
    let restored = state.topic_service.untrash_multiple(&[topic.topic_id]).await.unwrap();
    assert_eq!(restored[0].delete_time, None);
    assert!(notifications(&state, ADMIN).await.is_empty());
}

#[tokio::test]
async fn test_creation_throttle_demands_captcha() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::for_testing(dir.path().to_str().unwrap());
    config.throttle.max_count = 2;
    let state = AppState::with_parts(config, DatabaseClient::in_memory(), Arc::new(FixedCaptcha));

    let first = state
        .question_service
        .create(&user(ALICE), question_request("One"), 100)
        .await
        .unwrap();
    assert!(!first.need_captcha);

    let second = state
        .question_service
        .create(&user(ALICE), question_request("Two"), 101)
        .await
        .unwrap();
    assert!(second.need_captcha);

    let challenge = match state
        .question_service
        .create(&user(ALICE), question_request("Three"), 102)
        .await
    {
        Err(AppError::FieldValidation { errors, need_captcha, captcha }) => {
            assert!(errors.contains_key("captcha_code"));
            assert!(need_captcha);
            captcha.expect("a fresh challenge")
        }
        other => panic!("expected captcha error, got {:?}", other.map(|c| c.item)),
    };

    let mut request = question_request("Three");
    request.captcha_token = Some(challenge.token);
    request.captcha_code = Some("abcd5".to_string());
    let third = state.question_service.create(&user(ALICE), request, 103).await.unwrap();
    assert!(third.need_captcha);

    // Another user has a separate allowance.
    let other = state
        .question_service
        .create(&user(BOB), question_request("Bob's"), 104)
        .await
        .unwrap();
    assert!(!other.need_captcha);
}
