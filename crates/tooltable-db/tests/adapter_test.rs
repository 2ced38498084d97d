use std::sync::Arc;

use tooltable_core::{ReconciliationError, ToolRecord, ToolTable};
use tooltable_db::{
    DbError, MemoryToolStore, RelationalAdapter, SqliteToolStore, ToolRow, ToolStore,
};

fn table(numbers: &[i32]) -> ToolTable {
    numbers.iter().copied().map(ToolRecord::new_tool).collect()
}

async fn seeded_memory(numbers: &[i32]) -> (Arc<MemoryToolStore>, RelationalAdapter) {
    let store = Arc::new(MemoryToolStore::with_rows(
        table(numbers).iter().map(ToolRow::from_record),
    ));
    let adapter = RelationalAdapter::new(store.clone());
    (store, adapter)
}

#[tokio::test]
async fn test_reconcile_insert_update_delete() {
    let (store, adapter) = seeded_memory(&[1, 2, 3]).await;

    let mut desired = table(&[2, 3, 4]);
    desired.ensure_sentinel();
    let mut changed = ToolRecord::new_tool(2);
    changed.diameter = 0.5;
    desired.insert(changed.clone());

    let changes = adapter.save(&desired).await.unwrap();
    assert_eq!(changes.inserted_numbers(), vec![4]);
    assert_eq!(changes.updated_numbers(), vec![2]);
    assert_eq!(changes.deleted_numbers(), vec![1]);

    let loaded = adapter.load().await.unwrap();
    assert_eq!(loaded.tool_numbers().collect::<Vec<_>>(), vec![2, 3, 4]);
    assert_eq!(loaded.tool(2).unwrap(), &changed);
    assert!(!loaded.contains(0));
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_save_twice_is_idempotent() {
    let (_store, adapter) = seeded_memory(&[]).await;

    let mut desired = table(&[1, 5]);
    desired.ensure_sentinel();
    let mut with_model = ToolRecord::new_tool(5);
    with_model.model_path = "drill.stl".to_string();
    desired.insert(with_model);

    let first = adapter.save(&desired).await.unwrap();
    assert_eq!(first.inserted_numbers(), vec![1, 5]);

    let second = adapter.save(&desired).await.unwrap();
    assert!(second.is_empty(), "unexpected changes: {}", second);
}

#[tokio::test]
async fn test_missing_row_stops_apply() {
    let (store, adapter) = seeded_memory(&[1, 2]).await;
    let persisted = adapter.load().await.unwrap();

    let mut desired = table(&[2, 7]);
    let mut changed = ToolRecord::new_tool(2);
    changed.z_offset = 3.0;
    desired.insert(changed);
    let changes = RelationalAdapter::diff(&persisted, &desired);

    // the store changed after the snapshot was taken
    store.remove_row(2);

    let err = adapter.apply(&changes).await.unwrap_err();
    assert!(matches!(
        err,
        DbError::Reconciliation(ReconciliationError::MissingUpdateTarget { tool_number: 2 })
    ));

    // the insert ran before the failure and stays applied; the delete never ran
    let loaded = adapter.load().await.unwrap();
    assert_eq!(loaded.tool_numbers().collect::<Vec<_>>(), vec![1, 7]);
}

#[tokio::test]
async fn test_sqlite_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("tools.db").display());

    let store = Arc::new(SqliteToolStore::connect(&url).await.unwrap());
    let adapter = RelationalAdapter::new(store.clone());

    let mut tool = ToolRecord::new_tool(12);
    tool.x_offset = 0.125;
    tool.front_angle = 35.0;
    tool.back_angle = 145.0;
    tool.orientation = 2;
    let mut desired = ToolTable::with_sentinel();
    desired.insert(tool.clone());
    desired.insert(ToolRecord::new_tool(3));

    adapter.save(&desired).await.unwrap();
    assert_eq!(store.load_rows().await.unwrap().len(), 2);

    // reopen to make sure the rows were committed
    drop(adapter);
    drop(store);
    let reopened = RelationalAdapter::new(Arc::new(SqliteToolStore::connect(&url).await.unwrap()));
    let loaded = reopened.load().await.unwrap();
    assert_eq!(loaded.tool(12).unwrap(), &tool);
    assert_eq!(loaded.len(), 2);
}
