//! CLI commands

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use taskboard_client::{
    Gateway, NewProject, NewTask, Priority, ResolvedUser, Role, SessionState, SignupRequest,
    Status, TaskFilter, TaskUpdate, UserDirectory,
};
use tracing::info;

use crate::config::{self, Context};
use crate::output;

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the token pair
    Login {
        username: String,

        /// Password; prompted on stdin when omitted
        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Signup {
        username: String,

        #[arg(long)]
        email: String,

        #[arg(long, value_parser = parse_role, default_value = "employee")]
        role: Role,

        /// Password; prompted on stdin when omitted
        #[arg(long, env = "TASKBOARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored tokens
    Logout,

    /// Show session state and the signed-in user
    Status,

    /// Projects, users and one page of tasks at once
    Dashboard {
        #[command(flatten)]
        filter: FilterArgs,

        /// Project to highlight
        #[arg(long)]
        select: Option<i64>,
    },

    /// Project operations
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Task operations
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// User lookup
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Configuration file management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List visible projects
    List,

    /// Create a project
    Create {
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Member ids or usernames; repeat or separate with commas
        #[arg(long = "member", value_delimiter = ',')]
        members: Vec<String>,
    },

    /// Soft-delete a project
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// List tasks matching the filters
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Create a task
    ///
    /// Employees' tasks are filed as pending until a manager approves them.
    Create {
        #[arg(long)]
        project: i64,

        name: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, value_parser = parse_priority, default_value = "medium")]
        priority: Priority,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        eta: Option<NaiveDate>,

        /// Assignee id or username (managers only)
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Change fields of a task
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_parser = parse_status)]
        status: Option<Status>,

        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        eta: Option<NaiveDate>,

        /// Assignee id or username
        #[arg(long, conflicts_with = "unassign")]
        assignee: Option<String>,

        #[arg(long)]
        unassign: bool,
    },

    /// Delete a task
    Delete { id: i64 },

    /// Approve a pending task
    Approve { id: i64 },

    /// Reject a pending task
    Reject { id: i64 },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// List user profiles
    List,

    /// Suggest members whose name contains QUERY
    Suggest { query: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate a configuration file
    Init {
        /// Output file path (defaults to config.toml in the data directory)
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

/// Task filters shared by `tasks list` and `dashboard`
#[derive(Args, Clone, Default)]
pub struct FilterArgs {
    #[arg(long)]
    project: Option<i64>,

    #[arg(long, value_parser = parse_priority)]
    priority: Option<Priority>,

    #[arg(long, value_parser = parse_status)]
    status: Option<Status>,

    /// Username, username prefix or id
    #[arg(long)]
    assignee: Option<String>,

    /// Free-form search text
    #[arg(long)]
    search: Option<String>,

    #[arg(long, default_value_t = 1)]
    page: u32,
}

impl FilterArgs {
    fn task_filter(&self) -> TaskFilter {
        TaskFilter {
            project: self.project,
            priority: self.priority,
            status: self.status,
            assignee: self.assignee.clone(),
            text: self.search.clone(),
        }
    }

    fn needs_directory(&self) -> bool {
        self.assignee.is_some()
    }
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse()
}

fn parse_priority(s: &str) -> Result<Priority, String> {
    s.parse()
}

fn parse_status(s: &str) -> Result<Status, String> {
    s.parse()
}

impl Commands {
    pub async fn execute(self, context: Context) -> Result<()> {
        match self {
            Self::Login { username, password } => {
                let password = password_or_prompt(password)?;
                let gateway = context.gateway()?;
                gateway.login(&username, &password).await?;
                println!("Logged in as {}", username.trim());
                Ok(())
            }
            Self::Signup {
                username,
                email,
                role,
                password,
            } => {
                let password = password_or_prompt(password)?;
                let gateway = context.gateway()?;
                gateway
                    .signup(&SignupRequest {
                        username: username.trim().to_string(),
                        email,
                        password,
                        role,
                    })
                    .await?;
                println!("Account created, run `taskboard login {}`", username.trim());
                Ok(())
            }
            Self::Logout => {
                context.gateway()?.logout()?;
                println!("Logged out");
                Ok(())
            }
            Self::Status => show_status(&context).await,
            Self::Dashboard { filter, select } => {
                let gateway = context.gateway()?;
                let directory = directory_for(&gateway, &filter).await?;
                let dashboard = gateway
                    .load_dashboard(&filter.task_filter(), &directory, filter.page)
                    .await?;
                output::print_dashboard(&dashboard, select);
                Ok(())
            }
            Self::Projects { command } => command.execute(&context.gateway()?).await,
            Self::Tasks { command } => command.execute(&context.gateway()?).await,
            Self::Users { command } => command.execute(&context.gateway()?).await,
            Self::Config { command } => command.execute(&context),
        }
    }
}

impl ProjectCommands {
    pub async fn execute(self, gateway: &Gateway) -> Result<()> {
        match self {
            Self::List => {
                let projects = gateway.list_projects().await?;
                output::print_projects(&projects);
                Ok(())
            }
            Self::Create {
                name,
                description,
                members,
            } => {
                let members = if members.is_empty() {
                    Vec::new()
                } else {
                    let directory = gateway.list_users().await?;
                    members
                        .iter()
                        .map(|m| resolve_id(&directory, m))
                        .collect::<Result<Vec<_>>>()?
                };
                let created = gateway
                    .create_project(&NewProject {
                        name,
                        description,
                        members,
                    })
                    .await?;
                output::print_created("Project", &created);
                Ok(())
            }
            Self::Delete { id } => {
                gateway.delete_project(id).await?;
                println!("Project {id} deleted");
                Ok(())
            }
        }
    }
}

impl TaskCommands {
    pub async fn execute(self, gateway: &Gateway) -> Result<()> {
        match self {
            Self::List { filter } => {
                let directory = directory_for(gateway, &filter).await?;
                let page = gateway
                    .list_tasks(
                        &filter.task_filter(),
                        &directory,
                        filter.page,
                        taskboard_client::listing::DEFAULT_PAGE_SIZE,
                    )
                    .await?;
                output::print_task_page(&page);
                Ok(())
            }
            Self::Create {
                project,
                name,
                description,
                priority,
                eta,
                assignee,
            } => {
                let me = gateway.current_user().await?;
                let assigned_to = match assignee {
                    Some(assignee) if me.role != Some(Role::Employee) => {
                        let directory = gateway.list_users().await?;
                        Some(resolve_id(&directory, &assignee)?)
                    }
                    Some(_) => {
                        info!("Ignoring assignee, employee tasks are assigned to their creator");
                        None
                    }
                    None => None,
                };
                let created = gateway
                    .create_task(
                        me.role,
                        &NewTask {
                            project,
                            name,
                            description,
                            priority,
                            eta,
                            assigned_to,
                            status: None,
                        },
                    )
                    .await?;
                output::print_created("Task", &created);
                Ok(())
            }
            Self::Update {
                id,
                name,
                description,
                status,
                priority,
                eta,
                assignee,
                unassign,
            } => {
                let assigned_to = if unassign {
                    Some(None)
                } else if let Some(assignee) = assignee {
                    let directory = gateway.list_users().await?;
                    Some(Some(resolve_id(&directory, &assignee)?))
                } else {
                    None
                };
                let update = TaskUpdate {
                    name,
                    description,
                    status,
                    priority,
                    assigned_to,
                    eta,
                };
                if update == TaskUpdate::default() {
                    bail!("Nothing to update");
                }
                gateway.update_task(id, &update).await?;
                println!("Task {id} updated");
                Ok(())
            }
            Self::Delete { id } => {
                gateway.delete_task(id).await?;
                println!("Task {id} deleted");
                Ok(())
            }
            Self::Approve { id } => {
                let response = gateway.approve_task(id).await?;
                output::print_message(&response, &format!("Task {id} approved"));
                Ok(())
            }
            Self::Reject { id } => {
                let response = gateway.reject_task(id).await?;
                output::print_message(&response, &format!("Task {id} rejected"));
                Ok(())
            }
        }
    }
}

impl UserCommands {
    pub async fn execute(self, gateway: &Gateway) -> Result<()> {
        match self {
            Self::List => {
                let directory = gateway.list_users().await?;
                output::print_directory(&directory);
                Ok(())
            }
            Self::Suggest { query } => {
                let users = gateway.suggest_members(&query).await?;
                output::print_users(&users);
                Ok(())
            }
        }
    }
}

impl ConfigCommands {
    pub fn execute(self, context: &Context) -> Result<()> {
        match self {
            Self::Init { output, force } => {
                let config_path = output.unwrap_or_else(|| context.config_path.clone());
                if config_path.exists() && !force {
                    bail!(
                        "{} already exists, pass --force to overwrite",
                        config_path.display()
                    );
                }

                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                config::generate_default_config(
                    &config_path,
                    Some(context.config.base_url.clone()),
                )?;
                println!("Generated configuration at: {}", config_path.display());
                Ok(())
            }
            Self::Show => {
                println!("# data directory: {}", context.data_dir.display());
                print!("{}", toml::to_string_pretty(&context.config)?);
                Ok(())
            }
        }
    }
}

async fn show_status(context: &Context) -> Result<()> {
    let gateway = context.gateway()?;
    let session = gateway.session();
    println!("Service:     {}", gateway.base_url());
    println!("Credentials: {}", context.token_store()?.path().display());

    if session.state() == SessionState::Anonymous {
        println!("Session:     signed out");
        return Ok(());
    }

    let me = gateway.current_user().await?;
    println!("Session:     signed in");
    if let Some(username) = &me.username {
        println!("User:        {username}");
    }
    if let Some(role) = me.role {
        println!("Role:        {role}");
    }
    Ok(())
}

/// Directory for resolving the assignee filter; only fetched when needed
async fn directory_for(gateway: &Gateway, filter: &FilterArgs) -> Result<UserDirectory> {
    if filter.needs_directory() {
        Ok(gateway.list_users().await?)
    } else {
        Ok(UserDirectory::default())
    }
}

fn resolve_id(directory: &UserDirectory, input: &str) -> Result<i64> {
    match directory.resolve(input) {
        Some(ResolvedUser::Id(id)) => Ok(id),
        Some(ResolvedUser::Text(text)) => bail!("No user matches '{text}'"),
        None => bail!("Empty user reference"),
    }
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_id_requires_a_match() {
        let directory = UserDirectory::new(vec![json!({"id": 3, "username": "dana"})]);
        assert_eq!(resolve_id(&directory, "da").unwrap(), 3);
        assert_eq!(resolve_id(&directory, "17").unwrap(), 17);
        assert!(resolve_id(&directory, "zoe").is_err());
        assert!(resolve_id(&directory, " ").is_err());
    }

    #[test]
    fn test_filter_args_map_to_task_filter() {
        let args = FilterArgs {
            project: Some(2),
            status: Some(Status::Pending),
            search: Some("report".into()),
            ..FilterArgs::default()
        };
        let filter = args.task_filter();
        assert_eq!(
            filter.search_query(&UserDirectory::default()).as_deref(),
            Some("2 pending report")
        );
        assert!(!args.needs_directory());
    }
}
