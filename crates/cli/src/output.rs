//! Terminal rendering of service records

use serde_json::Value;
use taskboard_client::search::{id_of, name_of};
use taskboard_client::{Dashboard, Page, Project, Task, User, UserDirectory};

pub fn print_projects(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects");
        return;
    }
    for project in projects {
        let members: Vec<&str> = project
            .members_user
            .iter()
            .map(|m| m.username.as_str())
            .collect();
        println!("{:>5}  {}", project.id, project.name);
        if !project.description.is_empty() {
            println!("       {}", project.description);
        }
        if !members.is_empty() {
            println!("       members: {}", members.join(", "));
        }
    }
}

fn task_line(task: &Task) -> String {
    let mut line = format!(
        "{:>5}  [{:<9}] {:<6} {}",
        task.id,
        task.status.as_str(),
        task.priority.as_str(),
        task.name
    );
    if let Some(assignee) = task.assignee_name() {
        line.push_str(&format!("  @{assignee}"));
    }
    if let Some(eta) = task.eta {
        line.push_str(&format!("  due {eta}"));
    }
    if task.delay_status {
        if let Some(days) = task.delayed_days {
            line.push_str(&format!("  ({days}d late)"));
        }
    }
    line
}

pub fn print_task_page(page: &Page<Task>) {
    if page.items.is_empty() {
        println!("No tasks");
    }
    for task in &page.items {
        println!("{}", task_line(task));
    }

    let info = &page.info;
    let mut footer = format!("page {} ({} total)", info.current_page, info.count);
    if info.has_previous() {
        footer.push_str(", --page N-1 for previous");
    }
    if info.has_next() {
        footer.push_str(", --page N+1 for next");
    }
    println!("-- {footer}");
}

pub fn print_dashboard(dashboard: &Dashboard, select: Option<i64>) {
    match (&dashboard.current_user.username, dashboard.current_user.role) {
        (Some(name), Some(role)) => println!("Signed in as {name} ({role})"),
        (Some(name), None) => println!("Signed in as {name}"),
        _ => {}
    }
    if dashboard.current_user.is_manager() && dashboard.pending > 0 {
        println!("{} task(s) awaiting approval", dashboard.pending);
    }
    println!();

    println!("Projects");
    let selected = dashboard.selected_project(select).map(|p| p.id);
    for project in &dashboard.projects {
        let marker = if Some(project.id) == selected { '*' } else { ' ' };
        println!("{marker}{:>4}  {}", project.id, project.name);
    }
    println!();

    println!("Tasks");
    print_task_page(&dashboard.tasks);
}

pub fn print_directory(directory: &UserDirectory) {
    if directory.is_empty() {
        println!("No users");
        return;
    }
    for entry in directory.entries() {
        let id = id_of(entry).map_or_else(|| "-".to_string(), |id| id.to_string());
        let name = name_of(entry).unwrap_or_default();
        match entry.get("role").and_then(Value::as_str) {
            Some(role) => println!("{id:>5}  {name} ({role})"),
            None => println!("{id:>5}  {name}"),
        }
    }
}

pub fn print_users(users: &[User]) {
    if users.is_empty() {
        println!("No matching users");
    }
    for user in users {
        println!("{:>5}  {}", user.id, user.username);
    }
}

/// Confirmation for a create call; the service answers with the record or a
/// `msg`
pub fn print_created(kind: &str, response: &Value) {
    match id_of(response) {
        Some(id) => println!("{kind} {id} created"),
        None => print_message(response, &format!("{kind} created")),
    }
}

pub fn print_message(response: &Value, fallback: &str) {
    let message = response
        .get("msg")
        .or_else(|| response.get("detail"))
        .and_then(Value::as_str)
        .unwrap_or(fallback);
    println!("{message}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_line() {
        let task: Task = serde_json::from_value(json!({
            "id": 12,
            "name": "Write report",
            "status": "doing",
            "priority": "high",
            "eta": "2026-03-01",
            "assigned_to_user": {"id": 3, "username": "dana"},
            "delay_status": true,
            "delayed_days": 2
        }))
        .unwrap();

        let line = task_line(&task);
        assert!(line.contains("Write report"));
        assert!(line.contains("@dana"));
        assert!(line.contains("due 2026-03-01"));
        assert!(line.contains("(2d late)"));
    }
}
