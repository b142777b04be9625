//! Concrete end-to-end migration scenarios, run against a real Postgres
//! instance. Gated on `DATABASE_URL` — skipped, not failed, when unset,
//! since these exercise real `ALTER TABLE` statements that an in-memory
//! fake cannot stand in for.

use std::sync::Arc;

use chrono::Utc;
use migration_core::{BackupStore, BackupType, Field, FieldDataType, Form, HistoryFilter, MigrationJournal, MigrationType};
use migration_engine::{detect, DdlExecutor, SchemaOperation};
use migration_store::{PostgresBackupStore, PostgresMigrationJournal, RetentionConfig};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPool::connect(&url).await.expect("connect to DATABASE_URL");
    migration_store::run_migrations(&pool).await.expect("run migrations");
    Some(pool)
}

async fn fresh_table(pool: &PgPool, table: &str) {
    sqlx::query(&format!(r#"DROP TABLE IF EXISTS "{table}""#))
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(&format!(r#"CREATE TABLE "{table}" (id uuid PRIMARY KEY)"#))
        .execute(pool)
        .await
        .unwrap();
}

fn executor(pool: PgPool) -> (DdlExecutor, Arc<PostgresBackupStore>, Arc<PostgresMigrationJournal>) {
    let backups = Arc::new(PostgresBackupStore::new(pool.clone(), RetentionConfig::default()));
    let journal = Arc::new(PostgresMigrationJournal::new(pool.clone()));
    (DdlExecutor::new(pool, backups.clone(), journal.clone()), backups, journal)
}

/// Add one field to an empty form.
#[tokio::test]
async fn add_one_field_to_an_empty_form() {
    let Some(pool) = test_pool().await else { return };
    let table = "form_seed1";
    fresh_table(&pool, table).await;
    let (executor, _backups, journal) = executor(pool.clone());

    let field_id = Uuid::new_v4();
    let op = SchemaOperation::AddColumn {
        field_id,
        table: table.to_string(),
        column: "email_1".to_string(),
        data_type: FieldDataType::Email,
    };

    let outcome = executor.execute(Uuid::new_v4(), op, "tester").await.expect("execute succeeds");
    assert!(outcome.backup_id.is_none());
    assert_eq!(
        outcome.rollback_sql.as_deref(),
        Some(r#"ALTER TABLE "form_seed1" DROP COLUMN "email_1""#)
    );

    let entry = journal.get(outcome.migration_id).await.unwrap().expect("journal entry exists");
    assert_eq!(entry.migration_type, MigrationType::AddColumn);
    assert_eq!(entry.column_name, "email_1");
    assert!(entry.success);
    assert!(entry.backup_id.is_none());

    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM information_schema.columns WHERE table_name = $1 AND column_name = $2)",
    )
    .bind(table)
    .bind("email_1")
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(row.0, "email_1 column should exist");
}

/// Delete a field with data, then restore it.
#[tokio::test]
async fn delete_a_field_with_data_then_restore_it() {
    let Some(pool) = test_pool().await else { return };
    let table = "form_seed2";
    fresh_table(&pool, table).await;
    sqlx::query(&format!(r#"ALTER TABLE "{table}" ADD COLUMN "age_1" integer"#))
        .execute(&pool)
        .await
        .unwrap();

    let r1 = Uuid::new_v4();
    let r2 = Uuid::new_v4();
    for (id, age) in [(r1, 30), (r2, 45)] {
        sqlx::query(&format!(r#"INSERT INTO "{table}" (id, "age_1") VALUES ($1, $2)"#))
            .bind(id)
            .bind(age)
            .execute(&pool)
            .await
            .unwrap();
    }

    let (executor, backups, journal) = executor(pool.clone());
    let form_id = Uuid::new_v4();
    let op = SchemaOperation::DropColumn {
        field_id: Uuid::new_v4(),
        table: table.to_string(),
        column: "age_1".to_string(),
        data_type: FieldDataType::Number,
    };
    let outcome = executor.execute(form_id, op, "tester").await.expect("drop succeeds");

    let backup_id = outcome.backup_id.expect("destructive op leaves a backup");
    let backup = backups.get(backup_id).await.unwrap().expect("backup exists");
    assert_eq!(backup.backup_type, BackupType::PreDelete);
    assert_eq!(backup.data_snapshot.len(), 2);

    let rollback = outcome.rollback_sql.expect("drop column rollback re-adds the column");
    assert!(rollback.contains(r#"ADD COLUMN "age_1" numeric"#));

    let entry = journal.get(outcome.migration_id).await.unwrap().unwrap();
    assert_eq!(entry.migration_type, MigrationType::DropColumn);
    assert_eq!(entry.backup_id, Some(backup_id));

    let column_exists: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM information_schema.columns WHERE table_name = $1 AND column_name = 'age_1')",
    )
    .bind(table)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(!column_exists.0, "age_1 column should be gone after the drop");

    // Now restore the backup.
    let restored_rows = backups.restore(backup_id, "tester").await.expect("restore succeeds");
    assert_eq!(restored_rows, 2);

    let column_exists_again: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM information_schema.columns WHERE table_name = $1 AND column_name = 'age_1')",
    )
    .bind(table)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert!(column_exists_again.0, "age_1 column should be re-added by restore");
}

/// Reject a type-narrowing change that would lose data.
#[tokio::test]
async fn reject_a_type_narrowing_change_that_would_lose_data() {
    use migration_core::DataValue;

    let existing = vec![DataValue::Text("hello".to_string())];
    let result = migration_engine::validate_conversion(
        "amount",
        FieldDataType::ShortText,
        FieldDataType::Number,
        &existing,
    );
    assert!(result.is_err(), "non-numeric text must not narrow to number");
}

/// Serial execution within one form: detect produces a stable order and,
/// once executed in that order, the journal reflects the same order with
/// no overlap (single-threaded here is sufficient to assert ordering;
/// true overlap-freedom is exercised by the scheduler's own per-form
/// worker, which this test does not re-drive).
#[tokio::test]
async fn serial_execution_within_one_form_preserves_enqueue_order() {
    let Some(pool) = test_pool().await else { return };
    let table = "form_seed5";
    fresh_table(&pool, table).await;
    sqlx::query(&format!(r#"ALTER TABLE "{table}" ADD COLUMN "f1" varchar(255)"#))
        .execute(&pool)
        .await
        .unwrap();

    let form_id = Uuid::new_v4();
    let f1 = Uuid::new_v4();
    let f2 = Uuid::new_v4();
    let f3 = Uuid::new_v4();

    let old_fields = vec![Field {
        id: f1,
        form_id,
        column_name: "f1".to_string(),
        data_type: FieldDataType::ShortText,
        sub_form_id: None,
    }];
    let new_fields = vec![Field {
        id: f3,
        form_id,
        column_name: "f3b".to_string(),
        data_type: FieldDataType::ShortText,
        sub_form_id: None,
    }];
    // ADD(f2)/RENAME(f3->f3b)/DELETE(f1): emulate by calling detect twice
    // so the add is ordered first, matching the scenario's enqueue order.
    let form = Form {
        id: form_id,
        table_name: table.to_string(),
        fields: vec![],
    };
    let add_f2 = detect(
        &form,
        &[],
        &[Field {
            id: f2,
            form_id,
            column_name: "f2".to_string(),
            data_type: FieldDataType::Number,
            sub_form_id: None,
        }],
    );
    let mut ops = add_f2;
    ops.extend(detect(
        &form,
        &[Field {
            id: f3,
            form_id,
            column_name: "f3".to_string(),
            data_type: FieldDataType::ShortText,
            sub_form_id: None,
        }],
        &new_fields,
    ));
    ops.extend(detect(&form, &old_fields, &[]));
    assert_eq!(ops.len(), 3);

    let (executor, _backups, journal) = executor(pool.clone());
    let mut executed_ids = Vec::new();
    for op in ops {
        let outcome = executor.execute(form_id, op, "tester").await.expect("each op executes");
        executed_ids.push(outcome.migration_id);
    }

    let (entries, _total) = journal.by_form(form_id, HistoryFilter::Any, 50, 0).await.unwrap();
    let mut by_time = entries.clone();
    by_time.sort_by_key(|e| e.executed_at);
    let ordered_ids: Vec<Uuid> = by_time.iter().map(|e| e.id).collect();
    assert_eq!(ordered_ids, executed_ids, "journal order must equal execution order");

    let mut previous = Utc::now() - chrono::Duration::days(1);
    for entry in &by_time {
        assert!(entry.executed_at >= previous, "journal entries must be strictly time-ordered");
        previous = entry.executed_at;
    }
}
