/// Policy evaluation over persisted casbin-style rules
///
/// The rule set is re-read from storage before every decision, so an edit to
/// `casbin_rule` applies to the very next request. There is no cache.
///
/// # Matching
///
/// A request `(subject, object, action)` is allowed when some `p` rule
/// `(s, o, a)` satisfies all of:
///
/// - **subject**: `s` is the request subject or a role it reaches through
///   `g` rows (transitively)
/// - **object**: `o` matches the request path segment by segment, where a
///   `:name` segment matches any single non-empty segment and a final `*`
///   matches one or more remaining segments
/// - **action**: `a` is `*`, equals the method ignoring case, or lists it
///   among `|`-separated alternatives such as `GET|POST`
///
/// # Failure
///
/// A storage failure is an error, never an allow. Callers turn it into an
/// Unauthorized rejection.
///
/// # Example
///
/// ```
/// use stockroom_shared::auth::policy::Policy;
/// use stockroom_shared::models::policy::PolicyRule;
///
/// let policy = Policy::from_rules(vec![
///     PolicyRule::permission("team:member", "/teams/:team_id/products/*", "GET"),
///     PolicyRule::grouping("team:owner", "team:member"),
/// ]);
///
/// assert!(policy.enforce("team:owner", "/teams/4/products/9", "GET"));
/// assert!(!policy.enforce("team:owner", "/teams/4/products/9", "DELETE"));
/// ```

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::models::policy::PolicyRule;

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to load policy: {0}")]
    Load(#[from] sqlx::Error),
}

/// Source of the current rule set
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn load_rules(&self) -> Result<Vec<PolicyRule>, PolicyError>;
}

/// Rules stored in the `casbin_rule` table
#[derive(Debug, Clone)]
pub struct PgPolicyStore {
    pool: PgPool,
}

impl PgPolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PolicyStore for PgPolicyStore {
    async fn load_rules(&self) -> Result<Vec<PolicyRule>, PolicyError> {
        Ok(PolicyRule::load_all(&self.pool).await?)
    }
}

#[derive(Debug, Clone)]
struct Permission {
    subject: String,
    object: String,
    action: String,
}

/// Immutable snapshot of the rule set
#[derive(Debug, Clone, Default)]
pub struct Policy {
    permissions: Vec<Permission>,
    groupings: HashMap<String, Vec<String>>,
}

impl Policy {
    /// Builds a snapshot; rows with an unknown `ptype` are ignored
    pub fn from_rules(rules: Vec<PolicyRule>) -> Self {
        let mut policy = Policy::default();

        for rule in rules {
            match rule.ptype.as_str() {
                "p" => policy.permissions.push(Permission {
                    subject: rule.v0,
                    object: rule.v1,
                    action: rule.v2,
                }),
                "g" => policy.groupings.entry(rule.v0).or_default().push(rule.v1),
                _ => {}
            }
        }

        policy
    }

    /// The subject plus every role reachable from it
    pub fn subjects_for(&self, subject: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([subject.to_string()]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(roles) = self.groupings.get(&current) {
                queue.extend(roles.iter().cloned());
            }
        }

        seen
    }

    pub fn enforce(&self, subject: &str, object: &str, action: &str) -> bool {
        let subjects = self.subjects_for(subject);

        self.permissions.iter().any(|p| {
            subjects.contains(&p.subject) && key_match(object, &p.object) && action_match(action, &p.action)
        })
    }
}

/// Path matching with `:param` segments and a trailing `*`
pub fn key_match(path: &str, pattern: &str) -> bool {
    let path_segments: Vec<&str> = path.trim_end_matches('/').split('/').collect();
    let pattern_segments: Vec<&str> = pattern.trim_end_matches('/').split('/').collect();

    let mut path_iter = path_segments.iter();
    for (index, expected) in pattern_segments.iter().enumerate() {
        if *expected == "*" && index == pattern_segments.len() - 1 {
            return path_iter.next().is_some();
        }

        let Some(actual) = path_iter.next() else {
            return false;
        };

        let matches = if expected.starts_with(':') {
            !actual.is_empty()
        } else {
            expected == actual
        };

        if !matches {
            return false;
        }
    }

    path_iter.next().is_none()
}

fn action_match(action: &str, pattern: &str) -> bool {
    pattern == "*"
        || pattern
            .split('|')
            .map(|alt| alt.trim().trim_start_matches('(').trim_end_matches(')'))
            .any(|alt| alt.eq_ignore_ascii_case(action))
}

/// Reload-then-decide wrapper over a [`PolicyStore`]
#[derive(Clone)]
pub struct PolicyEnforcer {
    store: Arc<dyn PolicyStore>,
}

impl PolicyEnforcer {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    /// Loads the current rules and evaluates the request against them
    pub async fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, PolicyError> {
        let policy = Policy::from_rules(self.store.load_rules().await?);
        let allowed = policy.enforce(subject, object, action);

        debug!(subject, object, action, allowed, "Policy decision");
        Ok(allowed)
    }
}
