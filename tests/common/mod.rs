use sqlx::PgPool;

/// テスト用データベースプールを作成し、マイグレーションを実行
///
/// PostgreSQLを使うテストは`#[ignore]`付きで、`cargo test -- --ignored`で実行する。
/// その際DATABASE_URLが未設定なら失敗させる。
/// 本番と同じマイグレーションファイルを使用する。
pub async fn create_test_pool() -> PgPool {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run PostgreSQL tests");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    cleanup_database(&pool).await;
    pool
}

/// テストの独立性を保つため、各テスト前にすべてのデータを削除する
async fn cleanup_database(pool: &PgPool) {
    sqlx::query("TRUNCATE TABLE loans, book_copies, books, borrowers CASCADE")
        .execute(pool)
        .await
        .expect("Failed to truncate lending tables");
}
