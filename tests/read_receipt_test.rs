//! Read-receipt semantics against a real Postgres: one receipt per
//! reader, counted reads and is_read promotion at full coverage.
//!
//! Run with: DATABASE_URL=... cargo test -- --ignored

mod common;

use chat_service::error::AppError;
use chat_service::services::chat_resolver::ChatResolver;
use chat_service::services::chat_store::ChatStore;
use chat_service::services::message_service::MessageService;
use chat_service::services::read_receipt_service::ReadReceiptService;
use common::{create_user, setup_db};
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires a running Postgres; set DATABASE_URL"]
async fn duplicate_read_is_a_conflict_and_counts_once() {
    let db = setup_db().await;
    let alice = create_user(&db, "alice", "public").await;
    let bob = create_user(&db, "bob", "public").await;
    let chat = ChatResolver::find_or_create_direct_chat(&db, alice, bob)
        .await
        .unwrap();
    let message = MessageService::send(&db, chat.chat_id, alice, "hello", None)
        .await
        .unwrap();

    let first = ReadReceiptService::mark_read(&db, message.message_id, bob)
        .await
        .unwrap();
    assert_eq!(first.read_count, 1);

    let second = ReadReceiptService::mark_read(&db, message.message_id, bob).await;
    assert!(matches!(second, Err(AppError::AlreadyRead)));

    let stored = ChatStore::get_message(&db, message.message_id)
        .await
        .unwrap();
    assert_eq!(stored.read_count, 1, "retry must not double-count");
}

#[tokio::test]
#[ignore = "requires a running Postgres; set DATABASE_URL"]
async fn concurrent_reads_by_one_user_count_once() {
    let db = setup_db().await;
    let alice = create_user(&db, "alice", "public").await;
    let bob = create_user(&db, "bob", "public").await;
    let chat = ChatResolver::find_or_create_direct_chat(&db, alice, bob)
        .await
        .unwrap();
    let message = MessageService::send(&db, chat.chat_id, alice, "racy", None)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let db = db.clone();
        let id = message.message_id;
        handles.push(tokio::spawn(async move {
            ReadReceiptService::mark_read(&db, id, bob).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(AppError::AlreadyRead) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(wins, 1, "exactly one racer records the receipt");

    let stored = ChatStore::get_message(&db, message.message_id)
        .await
        .unwrap();
    assert_eq!(stored.read_count, 1);
}

#[tokio::test]
#[ignore = "requires a running Postgres; set DATABASE_URL"]
async fn is_read_promotes_when_every_participant_has_read() {
    let db = setup_db().await;
    let alice = create_user(&db, "alice", "public").await;
    let bob = create_user(&db, "bob", "public").await;
    let chat = ChatResolver::find_or_create_direct_chat(&db, alice, bob)
        .await
        .unwrap();
    let message = MessageService::send(&db, chat.chat_id, alice, "hello", None)
        .await
        .unwrap();

    // Recipient read alone does not promote: the sender has no implicit
    // receipt, and participants_count here is 2.
    let partial = ReadReceiptService::mark_read(&db, message.message_id, bob)
        .await
        .unwrap();
    assert!(!partial.fully_read);
    let stored = ChatStore::get_message(&db, message.message_id)
        .await
        .unwrap();
    assert!(!stored.is_read);

    let full = ReadReceiptService::mark_read(&db, message.message_id, alice)
        .await
        .unwrap();
    assert_eq!(full.read_count, 2);
    assert!(full.fully_read);

    let stored = ChatStore::get_message(&db, message.message_id)
        .await
        .unwrap();
    assert!(stored.is_read);
}

#[tokio::test]
#[ignore = "requires a running Postgres; set DATABASE_URL"]
async fn read_requires_membership_and_a_real_message() {
    let db = setup_db().await;
    let alice = create_user(&db, "alice", "public").await;
    let bob = create_user(&db, "bob", "public").await;
    let mallory = create_user(&db, "mallory", "public").await;
    let chat = ChatResolver::find_or_create_direct_chat(&db, alice, bob)
        .await
        .unwrap();
    let message = MessageService::send(&db, chat.chat_id, alice, "secret", None)
        .await
        .unwrap();

    let outsider = ReadReceiptService::mark_read(&db, message.message_id, mallory).await;
    assert!(matches!(outsider, Err(AppError::Forbidden)));

    let missing = ReadReceiptService::mark_read(&db, Uuid::new_v4(), bob).await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}
