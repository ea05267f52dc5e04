//! Tests for todo storage and tools

use super::toolset::would_create_cycle;
use super::*;
use crate::llm::ModelProfile;
use crate::run::RunContext;
use crate::tools::{ToolError, ToolErrorKind, Toolset};
use serde_json::{Map, Value, json};
use std::sync::Arc;

fn ctx() -> RunContext {
    RunContext::new(ModelProfile::new("test"))
}

async fn call(toolset: &TodoToolset, name: &str, args: Value) -> Result<String, ToolError> {
    let args = match args {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let value = toolset.call_tool(&ctx(), name, args).await?;
    Ok(value.as_str().unwrap_or_default().to_string())
}

async fn create(toolset: &TodoToolset, content: &str, depends_on: &[u64]) -> String {
    call(
        toolset,
        "create_todo",
        json!({ "content": content, "active_form": format!("Doing {content}"), "depends_on": depends_on }),
    )
    .await
    .unwrap()
}

fn todo(id: u64, content: &str, status: TodoStatus, depends_on: Vec<u64>) -> Todo {
    Todo {
        id,
        content: content.to_string(),
        status,
        active_form: format!("Doing {content}"),
        depends_on,
    }
}

fn assert_retry(result: Result<String, ToolError>, message: &str) {
    let err = result.unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::ModelRetry);
    assert_eq!(err.message, message);
}

#[tokio::test]
async fn test_storage_assigns_sequential_ids() {
    let storage = InMemoryTodoStorage::new();
    let a = storage.create("A".into(), "Doing A".into(), vec![]).await.unwrap();
    let b = storage.create("B".into(), "Doing B".into(), vec![1]).await.unwrap();
    let c = storage.create("C".into(), "Doing C".into(), vec![]).await.unwrap();
    assert_eq!((a.id, b.id, c.id), (1, 2, 3));
    assert_eq!(b.status, TodoStatus::Pending);

    let contents: Vec<String> = storage
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|todo| todo.content)
        .collect();
    assert_eq!(contents, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_storage_update_and_delete() {
    let storage = InMemoryTodoStorage::new();
    let mut todo = storage.create("A".into(), "Doing A".into(), vec![]).await.unwrap();
    todo.content = "Updated".into();
    todo.status = TodoStatus::Completed;
    storage.update(todo).await.unwrap();

    let fetched = storage.get(1).await.unwrap().unwrap();
    assert_eq!(fetched.content, "Updated");
    assert_eq!(fetched.status, TodoStatus::Completed);

    storage.delete(1).await.unwrap();
    storage.delete(42).await.unwrap();
    assert!(storage.get(1).await.unwrap().is_none());
    assert!(storage.list().await.unwrap().is_empty());
}

#[test]
fn test_format_empty_list() {
    assert_eq!(format_todo_list(&[]), "No todos.");
}

#[test]
fn test_format_list_with_blocked_items() {
    let mut migrating = todo(2, "Run migrations", TodoStatus::InProgress, vec![1]);
    migrating.active_form = "Running migrations".to_string();
    let todos = vec![
        todo(1, "Setup DB", TodoStatus::Completed, vec![]),
        migrating,
        todo(3, "Deploy", TodoStatus::Pending, vec![1, 2]),
    ];
    assert_eq!(
        format_todo_list(&todos),
        "[x] 1: Setup DB\n[~] 2: Run migrations | Running migrations\n[ ] 3: Deploy (blocked by: 2)"
    );
}

#[test]
fn test_status_serde() {
    assert_eq!(serde_json::to_value(TodoStatus::InProgress).unwrap(), json!("in_progress"));
    let status: TodoStatus = serde_json::from_value(json!("completed")).unwrap();
    assert_eq!(status, TodoStatus::Completed);
    assert_eq!(TodoStatus::Pending.to_string(), "pending");
}

#[test]
fn test_cycle_search_reports_offending_dependency() {
    let todos = vec![
        todo(1, "A", TodoStatus::Pending, vec![]),
        todo(2, "B", TodoStatus::Pending, vec![1]),
        todo(3, "C", TodoStatus::Pending, vec![2]),
        todo(4, "D", TodoStatus::Pending, vec![]),
    ];
    assert_eq!(would_create_cycle(&todos, 1, &[4, 3]), Some(3));
    assert_eq!(would_create_cycle(&todos, 1, &[4]), None);
    assert_eq!(would_create_cycle(&todos, 4, &[3, 2]), None);
}

#[tokio::test]
async fn test_tool_definitions() {
    let toolset = TodoToolset::new();
    let names: Vec<String> = toolset
        .tool_definitions(&ctx())
        .await
        .into_iter()
        .map(|definition| definition.name)
        .collect();
    assert_eq!(
        names,
        vec!["list_todos", "create_todo", "update_todo", "complete_todo", "delete_todo"]
    );
}

#[tokio::test]
async fn test_create_todo() {
    let toolset = TodoToolset::new();
    assert_eq!(create(&toolset, "Write docs", &[]).await, "Created todo 1: Write docs");
    assert_eq!(create(&toolset, "Follow up", &[1]).await, "Created todo 2: Follow up");
    assert_eq!(
        call(&toolset, "list_todos", json!({})).await.unwrap(),
        "[ ] 1: Write docs\n[ ] 2: Follow up (blocked by: 1)"
    );
}

#[tokio::test]
async fn test_create_with_missing_dependency() {
    let toolset = TodoToolset::new();
    let result = call(
        &toolset,
        "create_todo",
        json!({ "content": "Orphan", "active_form": "Orphaning", "depends_on": [5] }),
    )
    .await;
    assert_retry(result, "Dependency todo 5 does not exist.");
    assert!(toolset.storage().await.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_changes_only_given_fields() {
    let toolset = TodoToolset::new();
    create(&toolset, "Draft", &[]).await;

    let result = call(
        &toolset,
        "update_todo",
        json!({ "todo_id": 1, "content": "Revised", "status": "in_progress" }),
    )
    .await
    .unwrap();
    assert_eq!(result, "Updated todo 1.");

    let updated = toolset.storage().await.get(1).await.unwrap().unwrap();
    assert_eq!(updated.content, "Revised");
    assert_eq!(updated.status, TodoStatus::InProgress);
    assert_eq!(updated.active_form, "Doing Draft");
}

#[tokio::test]
async fn test_update_rejections() {
    let toolset = TodoToolset::new();
    create(&toolset, "A", &[]).await;

    assert_retry(
        call(&toolset, "update_todo", json!({ "todo_id": 9, "content": "x" })).await,
        "Todo 9 not found.",
    );
    assert_retry(
        call(&toolset, "update_todo", json!({ "todo_id": 1, "depends_on": [1] })).await,
        "Todo 1 cannot depend on itself.",
    );
    assert_retry(
        call(&toolset, "update_todo", json!({ "todo_id": 1, "depends_on": [7] })).await,
        "Dependency todo 7 does not exist.",
    );
}

#[tokio::test]
async fn test_direct_cycle_rejected_without_mutation() {
    let toolset = TodoToolset::new();
    create(&toolset, "A", &[]).await;
    create(&toolset, "B", &[1]).await;

    assert_retry(
        call(
            &toolset,
            "update_todo",
            json!({ "todo_id": 1, "depends_on": [2], "content": "A2" }),
        )
        .await,
        "Adding dependency on todo 2 would create a cycle.",
    );

    let a = toolset.storage().await.get(1).await.unwrap().unwrap();
    assert!(a.depends_on.is_empty());
    assert_eq!(a.content, "A");
}

#[tokio::test]
async fn test_transitive_cycle_rejected() {
    let toolset = TodoToolset::new();
    create(&toolset, "A", &[]).await;
    create(&toolset, "B", &[1]).await;
    create(&toolset, "C", &[2]).await;

    assert_retry(
        call(&toolset, "update_todo", json!({ "todo_id": 1, "depends_on": [3] })).await,
        "Adding dependency on todo 3 would create a cycle.",
    );
}

#[tokio::test]
async fn test_complete_returns_full_list() {
    let toolset = TodoToolset::new();
    create(&toolset, "Task A", &[]).await;
    create(&toolset, "Task B", &[1]).await;

    let result = call(&toolset, "complete_todo", json!({ "todo_id": 1 })).await.unwrap();
    assert_eq!(result, "[x] 1: Task A\n[ ] 2: Task B");

    assert_retry(
        call(&toolset, "complete_todo", json!({ "todo_id": 3 })).await,
        "Todo 3 not found.",
    );
}

#[tokio::test]
async fn test_delete_cleans_dangling_dependencies() {
    let toolset = TodoToolset::new();
    create(&toolset, "A", &[]).await;
    create(&toolset, "B", &[1]).await;
    create(&toolset, "C", &[1, 2]).await;

    let result = call(&toolset, "delete_todo", json!({ "todo_id": 1 })).await.unwrap();
    assert_eq!(result, "Deleted todo 1.");

    let storage = toolset.storage().await;
    assert!(storage.get(1).await.unwrap().is_none());
    assert!(storage.get(2).await.unwrap().unwrap().depends_on.is_empty());
    assert_eq!(storage.get(3).await.unwrap().unwrap().depends_on, vec![2]);

    assert_retry(
        call(&toolset, "delete_todo", json!({ "todo_id": 1 })).await,
        "Todo 1 not found.",
    );
}

#[tokio::test]
async fn test_malformed_arguments() {
    let toolset = TodoToolset::new();
    let err = call(&toolset, "update_todo", json!({ "todo_id": "one" }))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::InvalidArguments);
    assert!(err.retry_prompt().is_some());
}

#[tokio::test]
async fn test_default_storage_fresh_per_run() {
    let toolset = TodoToolset::new();

    toolset.enter().await.unwrap();
    create(&toolset, "Run 1 task", &[]).await;
    assert!(
        call(&toolset, "list_todos", json!({}))
            .await
            .unwrap()
            .contains("Run 1 task")
    );
    toolset.exit().await.unwrap();

    toolset.enter().await.unwrap();
    assert_eq!(call(&toolset, "list_todos", json!({})).await.unwrap(), "No todos.");
    toolset.exit().await.unwrap();
}

#[tokio::test]
async fn test_custom_storage_shared_across_runs() {
    let storage: BoxedTodoStorage = Arc::new(InMemoryTodoStorage::new());

    let first = TodoToolset::with_storage(Arc::clone(&storage));
    first.enter().await.unwrap();
    create(&first, "Shared task", &[]).await;
    first.exit().await.unwrap();

    let second = TodoToolset::with_storage(Arc::clone(&storage));
    second.enter().await.unwrap();
    assert_eq!(
        call(&second, "list_todos", json!({})).await.unwrap(),
        "[ ] 1: Shared task"
    );
    second.exit().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_creates_get_unique_ids() {
    let storage: BoxedTodoStorage = Arc::new(InMemoryTodoStorage::new());
    let toolset = Arc::new(TodoToolset::with_storage(Arc::clone(&storage)));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let toolset = Arc::clone(&toolset);
            tokio::spawn(async move { create(&toolset, &format!("task {i}"), &[]).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let ids: Vec<u64> = storage
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|todo| todo.id)
        .collect();
    assert_eq!(ids, (1..=20).collect::<Vec<u64>>());
}

#[tokio::test]
async fn test_concurrent_mutual_dependencies_keep_graph_acyclic() {
    let storage: BoxedTodoStorage = Arc::new(InMemoryTodoStorage::new());
    let toolset = Arc::new(TodoToolset::with_storage(Arc::clone(&storage)));
    create(&toolset, "A", &[]).await;
    create(&toolset, "B", &[]).await;

    let first = {
        let toolset = Arc::clone(&toolset);
        tokio::spawn(async move {
            call(&toolset, "update_todo", json!({ "todo_id": 1, "depends_on": [2] })).await
        })
    };
    let second = {
        let toolset = Arc::clone(&toolset);
        tokio::spawn(async move {
            call(&toolset, "update_todo", json!({ "todo_id": 2, "depends_on": [1] })).await
        })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);

    let todos = storage.list().await.unwrap();
    let edges: usize = todos.iter().map(|todo| todo.depends_on.len()).sum();
    assert_eq!(edges, 1);
}
