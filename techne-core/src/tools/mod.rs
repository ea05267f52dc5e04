//! Tool system for agent runs
//!
//! This module provides:
//! - The [`Tool`] trait and [`ToolDefinition`]s shown to the model
//! - [`Toolset`]s that group tools and own run-scoped state
//! - Glob-based permission rules evaluated before each call
//! - [`ToolManager`], which runs before/after hooks around every tool call
//!
//! # Example
//!
//! ```rust,ignore
//! use techne_core::tools::{permission_hook, default_permission_key, PermissionRule, ToolPermission, ToolManager};
//!
//! let manager = ToolManager::new(toolset, ctx)
//!     .await?
//!     .with_before_hook(permission_hook(
//!         vec![PermissionRule::allow("read_*"), PermissionRule::deny("*")],
//!         default_permission_key,
//!         ToolPermission::Ask,
//!     ));
//! let result = manager.handle_call(&call).await;
//! ```

mod hooks;
mod manager;
mod permission;
mod result;
mod tool;
mod toolset;

pub use hooks::{
    AfterHookFn, AfterToolCallHook, BeforeHookFn, BeforeToolCallHook, BoxedAfterHook,
    BoxedBeforeHook, after_hook_fn, before_hook_fn,
};
pub use manager::ToolManager;
pub use permission::{
    PermissionHook, PermissionKeyFn, PermissionRule, ToolPermission, default_permission_key,
    evaluate_permission, permission_hook,
};
pub use result::{ToolCallError, ToolError, ToolErrorKind};
pub use tool::{BoxedTool, FunctionTool, Tool, ToolDefinition};
pub use toolset::{BoxedToolset, CombinedToolset, FunctionToolset, RegistryError, Toolset};
pub(crate) use toolset::unknown_tool;
