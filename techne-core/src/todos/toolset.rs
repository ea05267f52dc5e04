use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;

use super::storage::{BoxedTodoStorage, InMemoryTodoStorage, TodoStorage};
use super::{Todo, TodoStatus, format_todo_list};
use crate::error::{Result, TechneError};
use crate::run::RunContext;
use crate::tools::{Tool, ToolDefinition, ToolError, Toolset, unknown_tool};

/// Storage currently backing the tools; swapped on enter and exit
type StorageSlot = Arc<RwLock<BoxedTodoStorage>>;

/// Structured task management tools
///
/// Without an explicit storage every run gets a fresh in-memory store, created
/// on [`enter`](Toolset::enter) and dropped on [`exit`](Toolset::exit). A
/// storage passed to [`with_storage`](TodoToolset::with_storage) is never
/// reset and is shared by every run using it.
pub struct TodoToolset {
    user_storage: Option<BoxedTodoStorage>,
    slot: StorageSlot,
    tools: Vec<TodoTool>,
}

impl TodoToolset {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_storage(storage: BoxedTodoStorage) -> Self {
        Self::build(Some(storage))
    }

    fn build(user_storage: Option<BoxedTodoStorage>) -> Self {
        let initial = user_storage
            .clone()
            .unwrap_or_else(|| Arc::new(InMemoryTodoStorage::new()));
        let slot: StorageSlot = Arc::new(RwLock::new(initial));
        let tools = TodoOp::ALL
            .into_iter()
            .map(|op| TodoTool {
                op,
                definition: op.definition(),
                slot: Arc::clone(&slot),
            })
            .collect();
        Self {
            user_storage,
            slot,
            tools,
        }
    }

    /// Storage the tools currently operate on
    pub async fn storage(&self) -> BoxedTodoStorage {
        Arc::clone(&*self.slot.read().await)
    }

    async fn reset_transient_storage(&self) {
        if self.user_storage.is_none() {
            *self.slot.write().await = Arc::new(InMemoryTodoStorage::new());
            tracing::debug!("reset run-scoped todo storage");
        }
    }
}

impl Default for TodoToolset {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Toolset for TodoToolset {
    async fn enter(&self) -> Result<()> {
        self.reset_transient_storage().await;
        Ok(())
    }

    async fn exit(&self) -> Result<()> {
        self.reset_transient_storage().await;
        Ok(())
    }

    async fn tool_definitions(&self, _ctx: &RunContext) -> Vec<ToolDefinition> {
        self.tools.iter().map(|tool| tool.definition.clone()).collect()
    }

    async fn call_tool(
        &self,
        ctx: &RunContext,
        name: &str,
        args: Map<String, Value>,
    ) -> std::result::Result<Value, ToolError> {
        match self.tools.iter().find(|tool| tool.definition.name == name) {
            Some(tool) => tool.call(ctx, args).await,
            None => Err(unknown_tool(name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TodoOp {
    List,
    Create,
    Update,
    Complete,
    Delete,
}

impl TodoOp {
    const ALL: [TodoOp; 5] = [
        TodoOp::List,
        TodoOp::Create,
        TodoOp::Update,
        TodoOp::Complete,
        TodoOp::Delete,
    ];

    fn definition(self) -> ToolDefinition {
        let todo_id = json!({ "type": "integer", "description": "The ID of the todo." });
        let id_list = json!({ "type": "array", "items": { "type": "integer" } });
        match self {
            TodoOp::List => ToolDefinition::new("list_todos")
                .with_description("List all todos with their status, dependencies, and blocked state."),
            TodoOp::Create => ToolDefinition::new("create_todo")
                .with_description("Create a new todo.")
                .with_parameters(json!({
                    "type": "object",
                    "properties": {
                        "content": { "type": "string", "description": "Task description." },
                        "active_form": {
                            "type": "string",
                            "description": "Present continuous form (e.g. \"Running tests\")."
                        },
                        "depends_on": id_list
                    },
                    "required": ["content", "active_form"],
                    "additionalProperties": false
                })),
            TodoOp::Update => ToolDefinition::new("update_todo")
                .with_description("Update an existing todo. Only provided fields are changed.")
                .with_parameters(json!({
                    "type": "object",
                    "properties": {
                        "todo_id": todo_id,
                        "content": { "type": "string" },
                        "active_form": { "type": "string" },
                        "status": { "enum": ["pending", "in_progress", "completed"] },
                        "depends_on": id_list
                    },
                    "required": ["todo_id"],
                    "additionalProperties": false
                })),
            TodoOp::Complete => ToolDefinition::new("complete_todo")
                .with_description("Mark a todo as completed and return the remaining task summary.")
                .with_parameters(id_only_schema(todo_id)),
            TodoOp::Delete => ToolDefinition::new("delete_todo")
                .with_description("Delete a todo and clean up dangling dependency references.")
                .with_parameters(id_only_schema(todo_id)),
        }
    }
}

fn id_only_schema(todo_id: Value) -> Value {
    json!({
        "type": "object",
        "properties": { "todo_id": todo_id },
        "required": ["todo_id"],
        "additionalProperties": false
    })
}

struct TodoTool {
    op: TodoOp,
    definition: ToolDefinition,
    slot: StorageSlot,
}

#[async_trait]
impl Tool for TodoTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn call(&self, _ctx: &RunContext, args: Map<String, Value>) -> std::result::Result<Value, ToolError> {
        let storage = Arc::clone(&*self.slot.read().await);
        let storage = storage.as_ref();
        let text = match self.op {
            TodoOp::List => list_todos(storage).await?,
            TodoOp::Create => create_todo(storage, parse_args(args)?).await?,
            TodoOp::Update => update_todo(storage, parse_args(args)?).await?,
            TodoOp::Complete => complete_todo(storage, parse_args::<TodoIdArgs>(args)?.todo_id).await?,
            TodoOp::Delete => delete_todo(storage, parse_args::<TodoIdArgs>(args)?.todo_id).await?,
        };
        Ok(Value::String(text))
    }
}

#[derive(Debug, Deserialize)]
struct CreateArgs {
    content: String,
    active_form: String,
    #[serde(default)]
    depends_on: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    todo_id: u64,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    active_form: Option<String>,
    #[serde(default)]
    status: Option<TodoStatus>,
    #[serde(default)]
    depends_on: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
struct TodoIdArgs {
    todo_id: u64,
}

fn parse_args<T: DeserializeOwned>(args: Map<String, Value>) -> std::result::Result<T, ToolError> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| ToolError::invalid_arguments(format!("Invalid arguments: {e}")))
}

fn storage_error(err: TechneError) -> ToolError {
    ToolError::internal(format!("Todo storage failed: {err}"))
}

fn not_found(id: u64) -> ToolError {
    ToolError::model_retry(format!("Todo {id} not found."))
}

async fn require_todo(storage: &dyn TodoStorage, id: u64) -> std::result::Result<Todo, ToolError> {
    storage
        .get(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| not_found(id))
}

async fn require_dependencies(
    storage: &dyn TodoStorage,
    depends_on: &[u64],
) -> std::result::Result<(), ToolError> {
    for dep_id in depends_on {
        if storage.get(*dep_id).await.map_err(storage_error)?.is_none() {
            return Err(ToolError::model_retry(format!(
                "Dependency todo {dep_id} does not exist."
            )));
        }
    }
    Ok(())
}

async fn list_todos(storage: &dyn TodoStorage) -> std::result::Result<String, ToolError> {
    let todos = storage.list().await.map_err(storage_error)?;
    Ok(format_todo_list(&todos))
}

async fn create_todo(storage: &dyn TodoStorage, args: CreateArgs) -> std::result::Result<String, ToolError> {
    let depends_on = args.depends_on.unwrap_or_default();
    let _guard = storage.write_lock().lock().await;

    require_dependencies(storage, &depends_on).await?;
    let todo = storage
        .create(args.content, args.active_form, depends_on)
        .await
        .map_err(storage_error)?;

    tracing::debug!(id = todo.id, depends_on = ?todo.depends_on, "created todo");
    Ok(format!("Created todo {}: {}", todo.id, todo.content))
}

async fn update_todo(storage: &dyn TodoStorage, args: UpdateArgs) -> std::result::Result<String, ToolError> {
    let _guard = storage.write_lock().lock().await;
    let mut todo = require_todo(storage, args.todo_id).await?;

    if let Some(depends_on) = args.depends_on {
        if depends_on.contains(&todo.id) {
            return Err(ToolError::model_retry(format!(
                "Todo {} cannot depend on itself.",
                todo.id
            )));
        }
        require_dependencies(storage, &depends_on).await?;

        let todos = storage.list().await.map_err(storage_error)?;
        if let Some(dep_id) = would_create_cycle(&todos, todo.id, &depends_on) {
            tracing::debug!(id = todo.id, dep_id, "rejected cyclic dependency");
            return Err(ToolError::model_retry(format!(
                "Adding dependency on todo {dep_id} would create a cycle."
            )));
        }
        todo.depends_on = depends_on;
    }
    if let Some(content) = args.content {
        todo.content = content;
    }
    if let Some(active_form) = args.active_form {
        todo.active_form = active_form;
    }
    if let Some(status) = args.status {
        todo.status = status;
    }

    let id = todo.id;
    storage.update(todo).await.map_err(storage_error)?;
    tracing::debug!(id, "updated todo");
    Ok(format!("Updated todo {id}."))
}

async fn complete_todo(storage: &dyn TodoStorage, id: u64) -> std::result::Result<String, ToolError> {
    let _guard = storage.write_lock().lock().await;
    let mut todo = require_todo(storage, id).await?;
    todo.status = TodoStatus::Completed;
    storage.update(todo).await.map_err(storage_error)?;
    tracing::debug!(id, "completed todo");

    let todos = storage.list().await.map_err(storage_error)?;
    Ok(format_todo_list(&todos))
}

async fn delete_todo(storage: &dyn TodoStorage, id: u64) -> std::result::Result<String, ToolError> {
    let _guard = storage.write_lock().lock().await;
    require_todo(storage, id).await?;
    storage.delete(id).await.map_err(storage_error)?;

    // drop references to the deleted todo
    for mut todo in storage.list().await.map_err(storage_error)? {
        if todo.depends_on.contains(&id) {
            todo.depends_on.retain(|dep_id| *dep_id != id);
            storage.update(todo).await.map_err(storage_error)?;
        }
    }

    tracing::debug!(id, "deleted todo");
    Ok(format!("Deleted todo {id}."))
}

/// First of `new_deps` from which `source_id` is reachable, if any
///
/// Breadth-first over the current `depends_on` edges, one search per
/// candidate.
pub(crate) fn would_create_cycle(todos: &[Todo], source_id: u64, new_deps: &[u64]) -> Option<u64> {
    let edges: HashMap<u64, &[u64]> = todos
        .iter()
        .map(|todo| (todo.id, todo.depends_on.as_slice()))
        .collect();

    new_deps.iter().copied().find(|&dep_id| {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([dep_id]);
        while let Some(current) = queue.pop_front() {
            if current == source_id {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(next) = edges.get(&current) {
                queue.extend(next.iter().copied());
            }
        }
        false
    })
}
