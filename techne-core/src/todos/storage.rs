use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::{Todo, TodoStatus};
use crate::error::Result;

/// Persistence backend for todos
///
/// Individual operations are atomic. Sequences that check and then mutate
/// hold [`write_lock`](TodoStorage::write_lock) so concurrent tool calls on a
/// shared storage cannot break the dependency invariants.
#[async_trait]
pub trait TodoStorage: Send + Sync {
    /// All todos in id order
    async fn list(&self) -> Result<Vec<Todo>>;

    async fn get(&self, id: u64) -> Result<Option<Todo>>;

    /// Store a new pending todo under the next id
    async fn create(&self, content: String, active_form: String, depends_on: Vec<u64>) -> Result<Todo>;

    /// Replace the todo with the same id
    async fn update(&self, todo: Todo) -> Result<()>;

    /// Remove a todo; a missing id is not an error
    async fn delete(&self, id: u64) -> Result<()>;

    /// Serializes multi-step mutations
    fn write_lock(&self) -> &Mutex<()>;
}

/// Shared storage handle
pub type BoxedTodoStorage = Arc<dyn TodoStorage>;

#[derive(Debug)]
struct Inner {
    todos: BTreeMap<u64, Todo>,
    next_id: u64,
}

/// In-memory storage with auto-incrementing ids
#[derive(Debug)]
pub struct InMemoryTodoStorage {
    inner: RwLock<Inner>,
    write_lock: Mutex<()>,
}

impl InMemoryTodoStorage {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                todos: BTreeMap::new(),
                next_id: 1,
            }),
            write_lock: Mutex::new(()),
        }
    }
}

impl Default for InMemoryTodoStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TodoStorage for InMemoryTodoStorage {
    async fn list(&self) -> Result<Vec<Todo>> {
        Ok(self.inner.read().await.todos.values().cloned().collect())
    }

    async fn get(&self, id: u64) -> Result<Option<Todo>> {
        Ok(self.inner.read().await.todos.get(&id).cloned())
    }

    async fn create(&self, content: String, active_form: String, depends_on: Vec<u64>) -> Result<Todo> {
        let mut inner = self.inner.write().await;
        let todo = Todo {
            id: inner.next_id,
            content,
            status: TodoStatus::Pending,
            active_form,
            depends_on,
        };
        inner.todos.insert(todo.id, todo.clone());
        inner.next_id += 1;
        Ok(todo)
    }

    async fn update(&self, todo: Todo) -> Result<()> {
        self.inner.write().await.todos.insert(todo.id, todo);
        Ok(())
    }

    async fn delete(&self, id: u64) -> Result<()> {
        self.inner.write().await.todos.remove(&id);
        Ok(())
    }

    fn write_lock(&self) -> &Mutex<()> {
        &self.write_lock
    }
}
