// ABOUTME: Integration tests for account resolution and lazy ledger creation
// ABOUTME: Runs against an in-memory SQLite database with the full schema

use agentbay_storage::{init_memory_pool, AccountStorage, StorageError};

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let pool = init_memory_pool().await.unwrap();
    let storage = AccountStorage::new(pool.clone());

    let first = storage.get_or_create("user_123", None).await.unwrap();
    let second = storage.get_or_create("user_123", None).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.email, "user_123@placeholder.local");

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_new_account_gets_zero_balance_ledger() {
    let pool = init_memory_pool().await.unwrap();
    let storage = AccountStorage::new(pool.clone());

    let account = storage.get_or_create("user_456", None).await.unwrap();

    let (balance, auto_recharge): (i64, bool) = sqlx::query_as(
        "SELECT balance_cents, auto_recharge_enabled FROM credit_ledgers WHERE account_id = ?1",
    )
    .bind(&account.id)
    .fetch_one(&pool)
    .await
    .unwrap();

    assert_eq!(balance, 0);
    assert!(!auto_recharge);
}

#[tokio::test]
async fn test_supplied_email_replaces_placeholder() {
    let pool = init_memory_pool().await.unwrap();
    let storage = AccountStorage::new(pool);

    storage.get_or_create("user_789", None).await.unwrap();
    let updated = storage
        .get_or_create("user_789", Some("ada@example.com"))
        .await
        .unwrap();
    assert_eq!(updated.email, "ada@example.com");

    // Omitting the email later keeps the known one
    let again = storage.get_or_create("user_789", None).await.unwrap();
    assert_eq!(again.email, "ada@example.com");

    let by_external = storage.get_by_external_id("user_789").await.unwrap().unwrap();
    assert_eq!(by_external.id, updated.id);
}

#[tokio::test]
async fn test_lookup_misses() {
    let pool = init_memory_pool().await.unwrap();
    let storage = AccountStorage::new(pool);

    assert!(storage.get_by_external_id("nobody").await.unwrap().is_none());
    assert!(matches!(
        storage.get("missing").await,
        Err(StorageError::NotFound(_))
    ));
    assert!(matches!(
        storage.get_or_create("   ", None).await,
        Err(StorageError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_credit_transactions_reject_updates() {
    let pool = init_memory_pool().await.unwrap();
    let storage = AccountStorage::new(pool.clone());
    let account = storage.get_or_create("user_audit", None).await.unwrap();

    sqlx::query(
        r#"
        INSERT INTO credit_transactions
            (id, account_id, amount_cents, transaction_type, description, balance_after_cents, created_at)
        VALUES ('tx1', ?1, 100, 'credit', 'seed', 100, '2026-01-01T00:00:00.000000Z')
        "#,
    )
    .bind(&account.id)
    .execute(&pool)
    .await
    .unwrap();

    let result = sqlx::query("UPDATE credit_transactions SET amount_cents = 5 WHERE id = 'tx1'")
        .execute(&pool)
        .await;
    assert!(result.is_err());
}
