use chrono::{Duration, Utc};
use rusty_library_lending::adapters::postgres::{PostgresLendingReadModel, PostgresLendingStore};
use rusty_library_lending::application::lending::{
    LendingError, ServiceDependencies, borrow_copy, register_book, remove_copy, return_loan,
};
use rusty_library_lending::domain::commands::*;
use rusty_library_lending::domain::*;
use rusty_library_lending::ports::{LendingReadModel, LendingStore, LoanStatus, StoreError};
use serial_test::serial;
use sqlx::PgPool;
use std::sync::Arc;

mod common;

const TEST_LOCK_TIMEOUT_MS: u64 = 200;

fn deps_for(pool: &PgPool) -> ServiceDependencies {
    ServiceDependencies {
        store: Arc::new(PostgresLendingStore::new(pool.clone(), TEST_LOCK_TIMEOUT_MS)),
        read_model: Arc::new(PostgresLendingReadModel::new(pool.clone())),
    }
}

async fn add_borrower(pool: &PgPool, name: &str, role: BorrowerRole) -> BorrowerId {
    let borrower_id = BorrowerId::new();
    sqlx::query("INSERT INTO borrowers (id, name, role) VALUES ($1, $2, $3)")
        .bind(borrower_id.value())
        .bind(name)
        .bind(role.as_str())
        .execute(pool)
        .await
        .expect("Failed to insert borrower");
    borrower_id
}

async fn add_book(deps: &ServiceDependencies, admin: BorrowerId, quantity: u32) -> Vec<CopyId> {
    register_book(
        deps,
        RegisterBook {
            actor_id: admin,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            quantity,
        },
    )
    .await
    .expect("Failed to register book")
    .copy_ids
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_borrow_and_return() {
    let pool = common::create_test_pool().await;
    let deps = deps_for(&pool);
    let admin = add_borrower(&pool, "Admin", BorrowerRole::Admin).await;
    let alice = add_borrower(&pool, "Alice", BorrowerRole::User).await;
    let copies = add_book(&deps, admin, 1).await;

    let loan = borrow_copy(
        &deps,
        BorrowCopy {
            borrower_id: alice,
            copy_id: copies[0],
            requested_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let view = deps.read_model.get_loan(loan.loan_id).await.unwrap().unwrap();
    assert_eq!(view.status, LoanStatus::Borrowed);
    assert_eq!(view.book_title, "Dune");

    return_loan(
        &deps,
        ReturnLoan {
            borrower_id: alice,
            loan_id: loan.loan_id,
            returned_at: Utc::now(),
        },
    )
    .await
    .unwrap();

    let history = deps.read_model.find_loans_by_borrower(alice).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, LoanStatus::Returned);

    let copy_views = deps.read_model.find_copies_by_book(view.book_id).await.unwrap();
    assert_eq!(copy_views[0].state, CopyState::Available);
    assert!(copy_views[0].borrower_id.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_concurrent_borrows_have_single_winner() {
    let pool = common::create_test_pool().await;
    let deps = deps_for(&pool);
    let admin = add_borrower(&pool, "Admin", BorrowerRole::Admin).await;
    let copy_id = add_book(&deps, admin, 1).await[0];

    let mut handles = Vec::new();
    for i in 0..4 {
        let borrower_id = add_borrower(&pool, &format!("Borrower {}", i), BorrowerRole::User).await;
        let deps = deps.clone();
        handles.push(tokio::spawn(async move {
            borrow_copy(
                &deps,
                BorrowCopy {
                    borrower_id,
                    copy_id,
                    requested_at: Utc::now(),
                },
            )
            .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(LendingError::PolicyViolation(PolicyViolation::CopyUnavailable)) => {}
            // ロック待ちがタイムアウトした場合も、貸出は作られていない
            Err(err) if err.is_retryable() => {}
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(successes, 1);

    let open: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM loans WHERE copy_id = $1 AND return_date IS NULL",
    )
    .bind(copy_id.value())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(open, 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_lock_wait_times_out_as_transient() {
    let pool = common::create_test_pool().await;
    let deps = deps_for(&pool);
    let admin = add_borrower(&pool, "Admin", BorrowerRole::Admin).await;
    let copy_id = add_book(&deps, admin, 1).await[0];
    let store = PostgresLendingStore::new(pool.clone(), TEST_LOCK_TIMEOUT_MS);

    let mut holder = store.begin().await.unwrap();
    holder.lock_copy(copy_id).await.unwrap().unwrap();

    let mut waiter = store.begin().await.unwrap();
    let result = waiter.lock_copy(copy_id).await;
    assert!(matches!(result, Err(StoreError::Transient(_))));

    holder.rollback().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_second_open_loan_violates_unique_index() {
    let pool = common::create_test_pool().await;
    let deps = deps_for(&pool);
    let admin = add_borrower(&pool, "Admin", BorrowerRole::Admin).await;
    let alice = add_borrower(&pool, "Alice", BorrowerRole::User).await;
    let bob = add_borrower(&pool, "Bob", BorrowerRole::User).await;
    let copy_id = add_book(&deps, admin, 1).await[0];
    let store = PostgresLendingStore::new(pool.clone(), TEST_LOCK_TIMEOUT_MS);

    let mut tx = store.begin().await.unwrap();
    tx.insert_loan(&loan::open_loan(copy_id, alice, Utc::now()))
        .await
        .unwrap();
    let result = tx
        .insert_loan(&loan::open_loan(copy_id, bob, Utc::now()))
        .await;

    assert!(matches!(result, Err(StoreError::Integrity(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_due_date_is_checked_by_schema() {
    let pool = common::create_test_pool().await;
    let deps = deps_for(&pool);
    let admin = add_borrower(&pool, "Admin", BorrowerRole::Admin).await;
    let alice = add_borrower(&pool, "Alice", BorrowerRole::User).await;
    let copy_id = add_book(&deps, admin, 1).await[0];
    let store = PostgresLendingStore::new(pool.clone(), TEST_LOCK_TIMEOUT_MS);

    let mut bad = loan::open_loan(copy_id, alice, Utc::now());
    bad.due_date = bad.loan_date + Duration::days(30);

    let mut tx = store.begin().await.unwrap();
    let result = tx.insert_loan(&bad).await;

    assert!(matches!(result, Err(StoreError::Integrity(_))));
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL"]
async fn test_postgres_removing_last_copy_removes_book() {
    let pool = common::create_test_pool().await;
    let deps = deps_for(&pool);
    let admin = add_borrower(&pool, "Admin", BorrowerRole::Admin).await;
    let copies = add_book(&deps, admin, 2).await;

    let first = remove_copy(
        &deps,
        RemoveCopy {
            actor_id: admin,
            copy_id: copies[0],
        },
    )
    .await
    .unwrap();
    assert!(!first.book_removed);

    let second = remove_copy(
        &deps,
        RemoveCopy {
            actor_id: admin,
            copy_id: copies[1],
        },
    )
    .await
    .unwrap();
    assert!(second.book_removed);

    let books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE id = $1")
        .bind(second.book_id.value())
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(books, 0);
}
