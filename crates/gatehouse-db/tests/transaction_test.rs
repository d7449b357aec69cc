//! Integration tests for the transaction coordinator using in-memory
//! SurrealDB.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gatehouse_core::models::permission::CreatePermission;
use gatehouse_core::repository::{EntityRepository, Pagination, SearchFilter};
use gatehouse_core::{GatehouseError, RequestContext};
use gatehouse_db::{
    CommandEvent, CommandObserver, DbError, DbManager, PoolConfig, Services, Statement,
    TransactionCoordinator, TxScope,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use surrealdb_types::SurrealValue;

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<(String, bool)>>,
}

impl CommandObserver for RecordingObserver {
    fn started(&self, event: &CommandEvent<'_>) {
        self.events
            .lock()
            .unwrap()
            .push((event.operation.to_string(), event.transactional));
    }
}

impl RecordingObserver {
    fn events(&self) -> Vec<(String, bool)> {
        self.events.lock().unwrap().clone()
    }
}

#[derive(Debug, SurrealValue)]
struct CodenameRow {
    codename: String,
}

async fn setup(pool: PoolConfig) -> (DbManager<Db>, Arc<RecordingObserver>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    gatehouse_db::run_migrations(&db).await.unwrap();

    let observer = Arc::new(RecordingObserver::default());
    let manager = DbManager::new(db, &pool).with_observer(observer.clone());
    (manager, observer)
}

async fn permission_count(services: &Services<Db>) -> u64 {
    services
        .permissions
        .list(
            &RequestContext::new(),
            Pagination::default(),
            SearchFilter::default(),
        )
        .await
        .unwrap()
        .total
}

#[tokio::test]
async fn committed_batch_returns_rows_of_the_chosen_statement() {
    let (manager, observer) = setup(PoolConfig::default()).await;
    let coordinator = TransactionCoordinator::new(manager);

    let rows: Vec<CodenameRow> = coordinator
        .run(
            &RequestContext::new(),
            TxScope::new("permission.seed", "permission"),
            |tx| {
                let name = tx.assign("name", "Can edit");
                let codename = tx.assign("codename", "can_edit");
                tx.push(format!("CREATE permission SET {name}, {codename} RETURN NONE"));
                Ok(tx.push("SELECT codename FROM permission"))
            },
        )
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].codename, "can_edit");
    assert_eq!(observer.events(), vec![("permission.seed".to_string(), true)]);
}

#[tokio::test]
async fn first_statement_rows_are_returned_from_a_longer_batch() {
    let (manager, _) = setup(PoolConfig::default()).await;
    let services = Services::new(manager.clone(), None);
    let coordinator = TransactionCoordinator::new(manager);
    let ctx = RequestContext::new();

    services
        .permissions
        .create(
            &ctx,
            CreatePermission {
                name: "Can view".into(),
                codename: "can_view".into(),
            },
        )
        .await
        .unwrap();

    let rows: Vec<CodenameRow> = coordinator
        .run(&ctx, TxScope::new("permission.purge", "permission"), |tx| {
            let selected = tx.push("SELECT codename FROM permission");
            tx.push("DELETE permission");
            Ok(selected)
        })
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].codename, "can_view");
    assert_eq!(permission_count(&services).await, 0);
}

#[tokio::test]
async fn failing_statement_rolls_back_earlier_writes() {
    let (manager, _) = setup(PoolConfig::default()).await;
    let services = Services::new(manager.clone(), None);
    let coordinator = TransactionCoordinator::new(manager);

    let err = coordinator
        .run::<CodenameRow, _>(
            &RequestContext::new(),
            TxScope::new("permission.seed", "permission"),
            |tx| {
                let name = tx.assign("name", "Can edit");
                let codename = tx.assign("codename", "can_edit");
                let first = tx.push(format!("CREATE permission SET {name}, {codename}"));
                tx.push("THROW 'forced failure'");
                Ok(first)
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Write { .. }), "{err:?}");
    assert!(matches!(
        GatehouseError::from(err),
        GatehouseError::WriteFailure { .. }
    ));
    assert_eq!(permission_count(&services).await, 0);
}

#[tokio::test]
async fn failed_second_write_leaves_the_entity_unchanged() {
    let (manager, _) = setup(PoolConfig::default()).await;
    let services = Services::new(manager.clone(), None);
    let coordinator = TransactionCoordinator::new(manager);
    let ctx = RequestContext::new();

    let created = services
        .permissions
        .create(
            &ctx,
            CreatePermission {
                name: "Can edit".into(),
                codename: "can_edit".into(),
            },
        )
        .await
        .unwrap();
    let id = created.id.to_string();

    // The rename applies first; the duplicate codename then breaks the
    // unique index and cancels the whole batch.
    let err = coordinator
        .run::<CodenameRow, _>(
            &ctx,
            TxScope::new("permission.rename", "permission").with_id(&id),
            |tx| {
                let record = tx.param(id.as_str());
                let name = tx.assign("name", "Can publish");
                let renamed = tx.push(format!(
                    "UPDATE type::record('permission', {record}) SET {name} RETURN NONE"
                ));
                let duplicate = tx.assign("codename", "can_edit");
                tx.push(format!(
                    "CREATE permission SET name = 'Duplicate', {duplicate} RETURN NONE"
                ));
                Ok(renamed)
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Write { .. }), "{err:?}");

    let stored = services.permissions.get_by_id(&ctx, &id).await.unwrap();
    assert_eq!(stored.name, "Can edit");
    assert_eq!(stored.updated_at, created.updated_at);
    assert_eq!(permission_count(&services).await, 1);
}

#[tokio::test]
async fn unit_of_work_error_is_returned_unchanged() {
    let (manager, observer) = setup(PoolConfig::default()).await;
    let coordinator = TransactionCoordinator::new(manager);

    let err = coordinator
        .run::<CodenameRow, _>(
            &RequestContext::new(),
            TxScope::new("permission.seed", "permission"),
            |tx| {
                tx.push("CREATE permission SET name = 'x', codename = 'x'");
                Err(DbError::Decode("rejected by caller".into()))
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Decode(ref msg) if msg == "rejected by caller"));
    assert!(observer.events().is_empty(), "nothing may be sent");
}

#[tokio::test]
async fn reads_run_outside_transactions() {
    let (manager, observer) = setup(PoolConfig::default()).await;
    let services = Services::new(manager, None);

    permission_count(&services).await;

    let events = observer.events();
    assert!(!events.is_empty());
    assert!(events.iter().all(|(_, transactional)| !transactional));
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_store_work_hits_the_deadline() {
    let (manager, _) = setup(PoolConfig::default()).await;
    let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));

    let err = manager
        .fetch::<surrealdb_types::Value>(&ctx, "sleep", Statement::new("SLEEP 2s"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Timeout { ref operation } if operation == "sleep"));
}

#[tokio::test(flavor = "multi_thread")]
async fn exhausted_pool_times_out_waiting_for_a_session() {
    let pool = PoolConfig {
        max_size: 1,
        ..PoolConfig::default()
    };
    let (manager, _) = setup(pool).await;

    let busy = manager.clone();
    let holder = tokio::spawn(async move {
        let _ = busy
            .fetch::<surrealdb_types::Value>(&RequestContext::new(), "hold", Statement::new("SLEEP 500ms"))
            .await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
    let coordinator = TransactionCoordinator::new(manager);
    let err = coordinator
        .run::<CodenameRow, _>(&ctx, TxScope::new("permission.seed", "permission"), |tx| {
            Ok(tx.push("SELECT codename FROM permission"))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::Timeout { .. }), "{err:?}");
    assert!(matches!(
        GatehouseError::from(err),
        GatehouseError::Timeout { .. }
    ));
    holder.await.unwrap();
}
