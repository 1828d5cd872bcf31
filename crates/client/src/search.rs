//! Task filtering and user lookup

use crate::types::{Priority, Project, Status, Task, User};
use serde_json::Value;
use std::fmt;

/// Maximum number of member suggestions returned for a query
pub const SUGGESTION_LIMIT: usize = 10;

/// Display name of a user-ish value
///
/// Accepts a bare string, `{username}`, `{name}` or `{user: {username}}`,
/// checked in that order.
pub fn name_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(object) => ["username", "name"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))
            .or_else(|| {
                object
                    .get("user")
                    .and_then(|u| u.get("username"))
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
            .map(str::to_string),
        _ => None,
    }
}

/// Id of a user-ish value
///
/// Accepts a bare number, `{id}`, `{pk}` or `{user: {id}}`, checked in that
/// order. Zero is treated as absent.
pub fn id_of(value: &Value) -> Option<i64> {
    let nonzero = |v: &Value| v.as_i64().filter(|&id| id != 0);
    match value {
        Value::Number(_) => nonzero(value),
        Value::Object(object) => object
            .get("id")
            .and_then(nonzero)
            .or_else(|| object.get("pk").and_then(nonzero))
            .or_else(|| object.get("user").and_then(|u| u.get("id")).and_then(nonzero)),
        _ => None,
    }
}

/// Outcome of resolving free-form assignee input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedUser {
    Id(i64),
    /// No local match; the server searches by this text
    Text(String),
}

impl fmt::Display for ResolvedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Locally cached user list, as returned by `GET /api/user/`
///
/// Entries are kept as raw JSON because the endpoint returns profile records
/// (`{id, user: {id, username}, role}`) rather than plain users.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDirectory {
    entries: Vec<Value>,
}

impl UserDirectory {
    pub const fn new(entries: Vec<Value>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Value] {
        &self.entries
    }

    /// Resolve assignee input to a user id where possible
    ///
    /// Precedence: an all-digit input is taken as an id; then the first
    /// case-insensitive exact username match; then the first case-insensitive
    /// prefix match; otherwise the trimmed input is passed through as text.
    /// Matching entries without an id are skipped.
    pub fn resolve(&self, input: &str) -> Option<ResolvedUser> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        if input.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = input.parse() {
                return Some(ResolvedUser::Id(id));
            }
        }

        let wanted = input.to_lowercase();
        let lowered = || {
            self.entries
                .iter()
                .map(|entry| (name_of(entry).unwrap_or_default().to_lowercase(), entry))
        };

        let exact = lowered()
            .filter(|(name, _)| *name == wanted)
            .find_map(|(_, entry)| id_of(entry));
        if let Some(id) = exact {
            return Some(ResolvedUser::Id(id));
        }

        let prefix = lowered()
            .filter(|(name, _)| name.starts_with(&wanted))
            .find_map(|(_, entry)| id_of(entry));
        if let Some(id) = prefix {
            return Some(ResolvedUser::Id(id));
        }

        Some(ResolvedUser::Text(input.to_string()))
    }

    /// Username for `id`, looked up in the directory, then in project members
    pub fn username_for(&self, id: i64, projects: &[Project]) -> Option<String> {
        if let Some(entry) = self.entries.iter().find(|e| id_of(e) == Some(id)) {
            return name_of(entry);
        }

        projects
            .iter()
            .flat_map(|p| p.members_user.iter())
            .find(|m| m.id == id)
            .map(|m| m.username.clone())
    }
}

/// Users whose name contains `query` (case-insensitive), at most
/// [`SUGGESTION_LIMIT`]
pub fn suggest_users(candidates: &[Value], query: &str) -> Vec<User> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }

    candidates
        .iter()
        .filter_map(|c| Some((id_of(c)?, name_of(c)?)))
        .filter(|(_, name)| name.to_lowercase().contains(&query))
        .take(SUGGESTION_LIMIT)
        .map(|(id, username)| User { id, username })
        .collect()
}

/// Dashboard task filter
///
/// The service accepts a single `search` parameter of space-separated tokens
/// and matches each against project id, priority, status and assignee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub project: Option<i64>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    /// Username or id; resolved against the user directory
    pub assignee: Option<String>,
    /// Free-form search text, appended last
    pub text: Option<String>,
}

impl TaskFilter {
    /// Search tokens in the order the service expects
    pub fn tokens(&self, directory: &UserDirectory) -> Vec<String> {
        let mut tokens = Vec::new();

        if let Some(project) = self.project {
            tokens.push(project.to_string());
        }
        if let Some(priority) = self.priority {
            tokens.push(priority.to_string());
        }
        if let Some(status) = self.status {
            tokens.push(status.to_string());
        }
        if let Some(user) = self.assignee.as_deref().and_then(|a| directory.resolve(a)) {
            tokens.push(user.to_string());
        }
        if let Some(text) = self.text.as_deref().filter(|t| !t.is_empty()) {
            tokens.push(text.to_string());
        }

        tokens
    }

    /// Value of the `search` parameter, `None` when nothing is filtered
    pub fn search_query(&self, directory: &UserDirectory) -> Option<String> {
        let joined = self.tokens(directory).join(" ");
        let joined = joined.trim();
        if joined.is_empty() {
            None
        } else {
            Some(joined.to_string())
        }
    }

    /// Query parameters for one page of the task listing
    pub fn query_params(&self, directory: &UserDirectory, page: u32) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(2);
        if let Some(search) = self.search_query(directory) {
            params.push(("search".to_string(), search));
        }
        params.push(("page".to_string(), page.to_string()));
        params
    }
}

/// Number of tasks awaiting approval
pub fn pending_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|t| t.is_pending()).count()
}

/// Tasks belonging to `project`
pub fn tasks_in_project(tasks: &[Task], project: i64) -> impl Iterator<Item = &Task> {
    tasks.iter().filter(move |t| t.project == Some(project))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn directory() -> UserDirectory {
        UserDirectory::new(vec![
            json!({"id": 10, "user": {"id": 1, "username": "alice"}, "role": "manager"}),
            json!({"id": 2, "username": "Albert"}),
            json!({"pk": 3, "name": "bob"}),
            json!({"username": "carol"}),
            json!({"id": 5, "username": "al"}),
        ])
    }

    #[test]
    fn test_name_and_id_extraction() {
        assert_eq!(name_of(&json!("zed")).as_deref(), Some("zed"));
        assert_eq!(name_of(&json!({"user": {"username": "u"}})).as_deref(), Some("u"));
        assert_eq!(name_of(&json!({"username": "", "name": "n"})).as_deref(), Some("n"));
        assert_eq!(name_of(&json!(7)), None);

        assert_eq!(id_of(&json!(7)), Some(7));
        assert_eq!(id_of(&json!({"id": 4, "pk": 5})), Some(4));
        assert_eq!(id_of(&json!({"pk": 5})), Some(5));
        assert_eq!(id_of(&json!({"user": {"id": 6}})), Some(6));
        assert_eq!(id_of(&json!({"id": 0})), None);
    }

    #[test]
    fn test_resolve_numeric_input() {
        assert_eq!(directory().resolve(" 42 "), Some(ResolvedUser::Id(42)));
    }

    #[test]
    fn test_resolve_exact_beats_earlier_prefix() {
        // "al" is a prefix of "alice" and "Albert", but the exact match wins
        assert_eq!(directory().resolve("AL"), Some(ResolvedUser::Id(5)));
    }

    #[test]
    fn test_resolve_prefix_uses_directory_order() {
        // profile records report their own id before the nested user id
        assert_eq!(directory().resolve("ali"), Some(ResolvedUser::Id(10)));
        assert_eq!(directory().resolve("alb"), Some(ResolvedUser::Id(2)));
        assert_eq!(directory().resolve("bo"), Some(ResolvedUser::Id(3)));
    }

    #[test]
    fn test_resolve_skips_entries_without_id_and_passes_text_through() {
        assert_eq!(
            directory().resolve("carol"),
            Some(ResolvedUser::Text("carol".into()))
        );
        assert_eq!(
            directory().resolve("  zoe "),
            Some(ResolvedUser::Text("zoe".into()))
        );
        assert_eq!(directory().resolve("   "), None);
    }

    #[test]
    fn test_username_for_falls_back_to_project_members() {
        let project: Project = serde_json::from_value(json!({
            "id": 1,
            "name": "P",
            "members_user": [{"id": 99, "username": "member"}]
        }))
        .unwrap();

        let dir = directory();
        assert_eq!(dir.username_for(2, &[]).as_deref(), Some("Albert"));
        assert_eq!(dir.username_for(99, &[project]).as_deref(), Some("member"));
        assert_eq!(dir.username_for(1234, &[]), None);
    }

    #[test]
    fn test_search_query_token_order() {
        let filter = TaskFilter {
            project: Some(4),
            priority: Some(Priority::High),
            status: Some(Status::Pending),
            assignee: Some("bob".into()),
            text: Some("report draft".into()),
        };
        assert_eq!(
            filter.search_query(&directory()).as_deref(),
            Some("4 high pending 3 report draft")
        );
    }

    #[test]
    fn test_empty_filter_only_sets_page() {
        let filter = TaskFilter::default();
        assert_eq!(filter.search_query(&directory()), None);
        assert_eq!(
            filter.query_params(&directory(), 2),
            vec![("page".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn test_suggest_users() {
        let candidates = vec![
            json!({"id": 1, "username": "alice"}),
            json!({"id": 2, "username": "malik"}),
            json!({"id": 3, "username": "bob"}),
            json!({"username": "no-id-ali"}),
        ];
        let found = suggest_users(&candidates, "ALI");
        assert_eq!(
            found,
            vec![
                User { id: 1, username: "alice".into() },
                User { id: 2, username: "malik".into() },
            ]
        );
        assert!(suggest_users(&candidates, "").is_empty());
    }

    #[test]
    fn test_pending_count() {
        let tasks: Vec<Task> = serde_json::from_value(json!([
            {"id": 1, "name": "a", "status": "pending", "project": 1},
            {"id": 2, "name": "b", "status": "todo", "project": 1},
            {"id": 3, "name": "c", "status": "pending", "project": 2},
        ]))
        .unwrap();
        assert_eq!(pending_count(&tasks), 2);
        assert_eq!(tasks_in_project(&tasks, 1).count(), 2);
    }
}
