use std::collections::BTreeSet;

use super::Outcome;
use crate::models::{TaskCommand, TaskStatus, TasksState};

pub(super) fn set_commands(tasks: &mut TasksState, commands: &[TaskCommand]) {
    let mut seen = BTreeSet::new();
    tasks.commands = commands
        .iter()
        .filter(|c| seen.insert(c.name.clone()))
        .cloned()
        .collect();
    let known: BTreeSet<&str> = tasks.commands.iter().map(|c| c.name.as_str()).collect();
    tasks
        .task_statuses
        .retain(|name, _| known.contains(name.as_str()));
    if tasks
        .active_command
        .as_deref()
        .is_some_and(|name| !known.contains(name))
    {
        tasks.active_command = None;
    }
}

pub(super) fn set_active_command(tasks: &mut TasksState, name: Option<&str>) -> Outcome {
    match name {
        Some(name) if !tasks.has_command(name) => Err(format!("Unknown command: {name}")),
        _ => {
            tasks.active_command = name.map(str::to_string);
            Ok(())
        }
    }
}

pub(super) fn set_task_status(tasks: &mut TasksState, name: &str, status: TaskStatus) -> Outcome {
    if !tasks.has_command(name) {
        return Err(format!("Unknown command: {name}"));
    }
    tasks.task_statuses.insert(name.to_string(), status);
    Ok(())
}

pub(super) fn run_command(tasks: &mut TasksState, name: &str) -> Outcome {
    let command = tasks
        .command(name)
        .ok_or_else(|| format!("Unknown command: {name}"))?
        .command
        .clone();
    if let Some(running) = tasks.running_command() {
        return Err(format!("{running} is already running"));
    }
    tasks
        .task_statuses
        .insert(name.to_string(), TaskStatus::Running);
    tasks.active_command = Some(name.to_string());
    append_output(tasks, &format!("$ {command}\n"));
    Ok(())
}

pub(super) fn stop_command(tasks: &mut TasksState) -> Outcome {
    let running = tasks
        .running_command()
        .map(str::to_string)
        .ok_or_else(|| "No command is running".to_string())?;
    tasks.task_statuses.insert(running, TaskStatus::Stopped);
    Ok(())
}

/// Output only grows at the end. `ClearTaskOutput` is the only way to shrink it.
pub(super) fn append_output(tasks: &mut TasksState, chunk: &str) {
    tasks.output.push_str(chunk);
}

/// Settles a command's status. A command the user already stopped stays
/// stopped; results for commands that no longer exist are dropped.
pub(super) fn command_finished(
    tasks: &mut TasksState,
    name: &str,
    exit_code: Option<i32>,
    error: Option<&str>,
) {
    if !tasks.has_command(name) || tasks.status_of(name) != TaskStatus::Running {
        return;
    }
    let status = match (exit_code, error) {
        (Some(0), None) => TaskStatus::Succeeded,
        _ => TaskStatus::Failed,
    };
    tasks.task_statuses.insert(name.to_string(), status);
    let trailer = match exit_code {
        Some(code) => format!("[{name} exited with code {code}]\n"),
        None => format!("[{name} terminated]\n"),
    };
    append_output(tasks, &trailer);
    if let Some(error) = error {
        tasks.error = Some(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks() -> TasksState {
        let mut tasks = TasksState::default();
        set_commands(
            &mut tasks,
            &[
                TaskCommand {
                    name: "build".to_string(),
                    command: "cargo build".to_string(),
                    description: None,
                },
                TaskCommand {
                    name: "test".to_string(),
                    command: "cargo test".to_string(),
                    description: None,
                },
                TaskCommand {
                    name: "build".to_string(),
                    command: "make".to_string(),
                    description: None,
                },
            ],
        );
        tasks
    }

    #[test]
    fn duplicate_command_names_keep_first() {
        let tasks = tasks();
        assert_eq!(tasks.commands.len(), 2);
        assert_eq!(tasks.command("build").unwrap().command, "cargo build");
    }

    #[test]
    fn replacing_commands_prunes_statuses() {
        let mut tasks = tasks();
        set_task_status(&mut tasks, "test", TaskStatus::Failed).unwrap();
        set_active_command(&mut tasks, Some("test")).unwrap();
        let first = tasks.commands[0].clone();
        set_commands(&mut tasks, &[first]);
        assert!(!tasks.task_statuses.contains_key("test"));
        assert!(tasks.active_command.is_none());
    }

    #[test]
    fn only_one_command_runs_at_a_time() {
        let mut tasks = tasks();
        run_command(&mut tasks, "build").unwrap();
        assert_eq!(tasks.status_of("build"), TaskStatus::Running);
        assert!(tasks.output.starts_with("$ cargo build"));
        let err = run_command(&mut tasks, "test").unwrap_err();
        assert!(err.contains("already running"));
    }

    #[test]
    fn finish_maps_exit_code() {
        let mut tasks = tasks();
        run_command(&mut tasks, "build").unwrap();
        command_finished(&mut tasks, "build", Some(0), None);
        assert_eq!(tasks.status_of("build"), TaskStatus::Succeeded);

        run_command(&mut tasks, "test").unwrap();
        command_finished(&mut tasks, "test", Some(101), None);
        assert_eq!(tasks.status_of("test"), TaskStatus::Failed);
    }

    #[test]
    fn stopped_command_stays_stopped() {
        let mut tasks = tasks();
        run_command(&mut tasks, "build").unwrap();
        stop_command(&mut tasks).unwrap();
        command_finished(&mut tasks, "build", None, None);
        assert_eq!(tasks.status_of("build"), TaskStatus::Stopped);
        assert!(stop_command(&mut tasks).is_err());
    }

    #[test]
    fn output_keeps_every_line() {
        let mut tasks = tasks();
        run_command(&mut tasks, "build").unwrap();
        let line = "x".repeat(1000);
        for _ in 0..200 {
            append_output(&mut tasks, &line);
        }
        command_finished(&mut tasks, "build", Some(0), None);
        assert!(tasks.output.starts_with("$ cargo build\n"));
        assert!(tasks.output.ends_with("[build exited with code 0]\n"));
        assert!(tasks.output.len() > 200_000);
    }
}
