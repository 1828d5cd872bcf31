//! Combined dashboard snapshot

use crate::error::ClientError;
use crate::gateway::Gateway;
use crate::listing::{DEFAULT_PAGE_SIZE, Page};
use crate::search::{TaskFilter, UserDirectory, pending_count};
use crate::types::{CurrentUser, Project, Task};
use tracing::debug;

/// Everything the dashboard shows at once
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub current_user: CurrentUser,
    pub projects: Vec<Project>,
    pub users: UserDirectory,
    pub tasks: Page<Task>,
    pub pending: usize,
}

impl Dashboard {
    /// Project that should be shown first: the requested one, else the first
    pub fn selected_project(&self, requested: Option<i64>) -> Option<&Project> {
        match requested {
            Some(id) => self.projects.iter().find(|p| p.id == id),
            None => self.projects.first(),
        }
    }
}

impl Gateway {
    /// Load role, projects, users and one page of tasks
    ///
    /// Projects, users and tasks are fetched concurrently; if the access
    /// token has expired they share a single refresh. The user directory
    /// used for resolving the assignee filter is the one cached in
    /// `directory`, since the fresh one is still in flight.
    pub async fn load_dashboard(
        &self,
        filter: &TaskFilter,
        directory: &UserDirectory,
        page: u32,
    ) -> Result<Dashboard, ClientError> {
        let current_user = match self.current_user().await {
            Ok(user) => user,
            Err(e) if e.is_auth_expired() => return Err(e),
            Err(e) => {
                debug!("Could not fetch current user role: {e}");
                CurrentUser::default()
            }
        };

        let (projects, users, tasks) = futures::try_join!(
            self.list_projects(),
            self.list_users(),
            self.list_tasks(filter, directory, page, DEFAULT_PAGE_SIZE),
        )?;

        let pending = pending_count(&tasks.items);
        Ok(Dashboard {
            current_user,
            projects,
            users,
            tasks,
            pending,
        })
    }
}
