//! Glob-based permission rules for tool calls
//!
//! Rules are evaluated in order and the first matching pattern decides.
//! [`permission_hook`] turns a rule list into a before-call hook that denies
//! or defers calls according to the decision.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::hooks::{BeforeToolCallHook, BoxedBeforeHook};
use super::result::ToolCallError;
use super::tool::ToolDefinition;
use crate::run::RunContext;

/// Decision for a permission rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolPermission {
    /// Let the call proceed
    Allow,
    /// Refuse the call
    Deny,
    /// Hold the call for an external approval decision
    #[default]
    Ask,
}

impl fmt::Display for ToolPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolPermission::Allow => write!(f, "allow"),
            ToolPermission::Deny => write!(f, "deny"),
            ToolPermission::Ask => write!(f, "ask"),
        }
    }
}

/// A glob pattern and the decision it produces
///
/// Serialized as `[pattern, decision]`; the `{pattern, decision}` table form
/// is accepted as well. The pattern is compiled once, when the rule is built.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RuleRepr")]
pub struct PermissionRule {
    pattern: String,
    decision: ToolPermission,
    compiled: Option<glob::Pattern>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleRepr {
    Pair(String, ToolPermission),
    Table {
        pattern: String,
        decision: ToolPermission,
    },
}

impl From<RuleRepr> for PermissionRule {
    fn from(repr: RuleRepr) -> Self {
        match repr {
            RuleRepr::Pair(pattern, decision) | RuleRepr::Table { pattern, decision } => {
                PermissionRule::new(pattern, decision)
            }
        }
    }
}

impl Serialize for PermissionRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.pattern, self.decision).serialize(serializer)
    }
}

impl PartialEq for PermissionRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.decision == other.decision
    }
}

impl Eq for PermissionRule {}

impl PermissionRule {
    pub fn new(pattern: impl Into<String>, decision: ToolPermission) -> Self {
        let pattern = pattern.into();
        let compiled = glob::Pattern::new(&shell_glob(&pattern)).ok();
        if compiled.is_none() {
            tracing::warn!(pattern = %pattern, "permission pattern matches literally");
        }
        Self {
            pattern,
            decision,
            compiled,
        }
    }

    pub fn allow(pattern: impl Into<String>) -> Self {
        Self::new(pattern, ToolPermission::Allow)
    }

    pub fn deny(pattern: impl Into<String>) -> Self {
        Self::new(pattern, ToolPermission::Deny)
    }

    pub fn ask(pattern: impl Into<String>) -> Self {
        Self::new(pattern, ToolPermission::Ask)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn decision(&self) -> ToolPermission {
        self.decision
    }

    /// Shell-style match: `*` any run, `?` one character, `[...]` a class
    ///
    /// `*` also matches `/`. A `[` without a closing `]` is a literal bracket.
    pub fn matches(&self, key: &str) -> bool {
        match &self.compiled {
            Some(pattern) => pattern.matches(key),
            None => self.pattern == key,
        }
    }
}

/// Rewrite a shell glob into the dialect `glob::Pattern` accepts
///
/// Runs of `*` collapse into one, and an unclosed `[` is escaped as `[[]`.
/// Character classes follow shell rules: a leading `!` negates and a `]`
/// right after `[` or `[!` belongs to the class.
fn shell_glob(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                out.push('*');
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
            }
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.extend(&chars[i..=end]);
                    i = end;
                }
                None => out.push_str("[[]"),
            },
            c => out.push(c),
        }
        i += 1;
    }
    out
}

/// Index of the `]` closing the class opened at `start`
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

/// Decision of the first rule matching `key`, or `default`
pub fn evaluate_permission(
    key: &str,
    rules: &[PermissionRule],
    default: ToolPermission,
) -> ToolPermission {
    rules
        .iter()
        .find(|rule| rule.matches(key))
        .map_or(default, |rule| rule.decision)
}

/// Derives the string that rules are matched against
pub type PermissionKeyFn = dyn Fn(&ToolDefinition, &Map<String, Value>) -> String + Send + Sync;

/// The tool name, ignoring arguments
pub fn default_permission_key(tool_def: &ToolDefinition, _args: &Map<String, Value>) -> String {
    tool_def.name.clone()
}

/// Before-call hook enforcing a rule list
pub struct PermissionHook {
    rules: Vec<PermissionRule>,
    key_fn: Arc<PermissionKeyFn>,
    default: ToolPermission,
}

impl PermissionHook {
    pub fn new(rules: Vec<PermissionRule>) -> Self {
        Self {
            rules,
            key_fn: Arc::new(default_permission_key),
            default: ToolPermission::Ask,
        }
    }

    pub fn with_key_fn<F>(mut self, key_fn: F) -> Self
    where
        F: Fn(&ToolDefinition, &Map<String, Value>) -> String + Send + Sync + 'static,
    {
        self.key_fn = Arc::new(key_fn);
        self
    }

    pub fn with_default(mut self, default: ToolPermission) -> Self {
        self.default = default;
        self
    }

    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }
}

#[async_trait]
impl BeforeToolCallHook for PermissionHook {
    async fn before_tool_call(
        &self,
        ctx: &RunContext,
        tool_def: &ToolDefinition,
        args: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, ToolCallError> {
        let key = (self.key_fn)(tool_def, args);
        let decision = evaluate_permission(&key, &self.rules, self.default);
        tracing::debug!(run_id = %ctx.run_id, tool = %tool_def.name, key = %key, %decision, "permission evaluated");

        match decision {
            ToolPermission::Allow => Ok(None),
            ToolPermission::Deny => {
                tracing::warn!(tool = %tool_def.name, key = %key, "tool call denied by permission rules");
                Err(ToolCallError::denied(
                    &tool_def.name,
                    format!("Tool call '{key}' denied by permission rules."),
                ))
            }
            ToolPermission::Ask => {
                tracing::info!(tool = %tool_def.name, key = %key, "tool call requires approval");
                Err(ToolCallError::approval_required(&tool_def.name, args.clone()))
            }
        }
    }
}

/// Build a before-call hook from rules, a key function and a fallback decision
pub fn permission_hook<F>(rules: Vec<PermissionRule>, key_fn: F, default: ToolPermission) -> BoxedBeforeHook
where
    F: Fn(&ToolDefinition, &Map<String, Value>) -> String + Send + Sync + 'static,
{
    Arc::new(
        PermissionHook::new(rules)
            .with_key_fn(key_fn)
            .with_default(default),
    )
}

#[cfg(test)]
mod permission_tests {
    use super::*;

    fn rules() -> Vec<PermissionRule> {
        vec![
            PermissionRule::allow("shell(git *)"),
            PermissionRule::deny("shell(*)"),
            PermissionRule::allow("*"),
        ]
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![PermissionRule::deny("read_*"), PermissionRule::allow("read_*")];
        assert_eq!(
            evaluate_permission("read_file", &rules, ToolPermission::Ask),
            ToolPermission::Deny
        );
    }

    #[test]
    fn test_empty_rules_use_default() {
        for default in [ToolPermission::Allow, ToolPermission::Deny, ToolPermission::Ask] {
            assert_eq!(evaluate_permission("anything", &[], default), default);
        }
    }

    #[test]
    fn test_shell_command_rules() {
        let rules = rules();
        assert_eq!(
            evaluate_permission("shell(git status)", &rules, ToolPermission::Ask),
            ToolPermission::Allow
        );
        assert_eq!(
            evaluate_permission("shell(rm -rf /)", &rules, ToolPermission::Ask),
            ToolPermission::Deny
        );
        assert_eq!(
            evaluate_permission("read_file", &rules, ToolPermission::Ask),
            ToolPermission::Allow
        );
    }

    #[test]
    fn test_glob_syntax() {
        let git = PermissionRule::allow("Shell(git *)");
        assert!(git.matches("Shell(git status)"));
        assert!(!git.matches("Shell(rm -rf /)"));

        let single = PermissionRule::allow("tool_?");
        assert!(single.matches("tool_a"));
        assert!(!single.matches("tool_ab"));

        let class = PermissionRule::allow("file_[rw]");
        assert!(class.matches("file_r"));
        assert!(!class.matches("file_x"));

        let dot = PermissionRule::allow("a.c");
        assert!(!dot.matches("abc"));
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        let rule = PermissionRule::deny("broken[");
        assert!(rule.matches("broken["));
        assert!(!rule.matches("broken"));

        let wildcard = PermissionRule::deny("tool[*");
        assert!(wildcard.matches("tool["));
        assert!(wildcard.matches("tool[x]"));
        assert!(!wildcard.matches("toolx"));

        let single = PermissionRule::deny("[?");
        assert!(single.matches("[a"));
        assert!(!single.matches("ab"));
    }

    #[test]
    fn test_star_runs_match_like_one_star() {
        let deny_all = PermissionRule::deny("shell(**)");
        assert!(deny_all.matches("shell(rm -rf /)"));
        assert!(deny_all.matches("shell()"));

        let prefix = PermissionRule::allow("read_**");
        assert!(prefix.matches("read_file"));
        assert!(!prefix.matches("write_file"));

        let infix = PermissionRule::allow("a**b");
        assert!(infix.matches("ab"));
        assert!(infix.matches("a/x/b"));
        assert!(!infix.matches("abc"));
    }

    #[test]
    fn test_double_star_deny_is_not_skipped() {
        let rules = vec![PermissionRule::deny("shell(**)"), PermissionRule::allow("*")];
        assert_eq!(
            evaluate_permission("shell(rm -rf /)", &rules, ToolPermission::Ask),
            ToolPermission::Deny
        );
    }

    #[test]
    fn test_class_edge_cases() {
        let negated = PermissionRule::allow("file_[!rw]");
        assert!(negated.matches("file_x"));
        assert!(!negated.matches("file_r"));

        let bracket_member = PermissionRule::allow("x[]a]");
        assert!(bracket_member.matches("x]"));
        assert!(bracket_member.matches("xa"));
        assert!(!bracket_member.matches("xb"));

        assert_eq!(shell_glob("a***b[c"), "a*b[[]c");
        assert_eq!(shell_glob("[!]x]"), "[!]x]");
    }

    #[test]
    fn test_rule_serde_forms() {
        let pair: PermissionRule = serde_json::from_str(r#"["shell(*)", "deny"]"#).unwrap();
        assert_eq!(pair, PermissionRule::deny("shell(*)"));

        let table: PermissionRule =
            serde_json::from_str(r#"{"pattern": "read_*", "decision": "allow"}"#).unwrap();
        assert_eq!(table, PermissionRule::allow("read_*"));

        assert_eq!(
            serde_json::to_string(&PermissionRule::ask("*")).unwrap(),
            r#"["*","ask"]"#
        );
    }
}
