use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::models::AppState;
use crate::services::group_services;
use crate::store::{invariants, persistence, SessionFormat};
use crate::utils::truncate_str;

#[derive(ClapArgs)]
pub struct Args {
    /// Session file to inspect
    pub file: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ProjectSummary {
    id: String,
    name: String,
    path: String,
    worktrees: usize,
    changes: usize,
    terminals: usize,
}

#[derive(Debug, Serialize)]
struct ServiceGroup {
    group: Option<String>,
    services: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Report {
    file: String,
    format: String,
    version: u32,
    projects: Vec<ProjectSummary>,
    services: usize,
    service_groups: Vec<ServiceGroup>,
    review_sessions: usize,
    unresolved_comments: usize,
    violations: Vec<String>,
}

fn build_report(path: &Path, state: &AppState) -> Report {
    let projects = state
        .projects
        .iter()
        .map(|p| ProjectSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            path: p.path.clone(),
            worktrees: p.worktrees.len(),
            changes: p.worktrees.iter().map(|w| w.changes.changes.len()).sum(),
            terminals: p.worktrees.iter().map(|w| w.terminal.sessions.len()).sum(),
        })
        .collect();

    let service_groups = group_services(&state.docker)
        .into_iter()
        .map(|(group, services)| ServiceGroup {
            group: group.map(str::to_string),
            services: services.iter().map(|s| s.name.clone()).collect(),
        })
        .collect();

    Report {
        file: path.display().to_string(),
        format: SessionFormat::from_path(path).to_string(),
        version: state.version,
        projects,
        services: state.docker.services.len(),
        service_groups,
        review_sessions: state.review.sessions.len(),
        unresolved_comments: state
            .review
            .sessions
            .iter()
            .map(|s| s.unresolved_count())
            .sum(),
        violations: invariants::check(state)
            .iter()
            .map(ToString::to_string)
            .collect(),
    }
}

pub async fn execute(args: Args) -> Result<()> {
    let state = persistence::load(&args.file)
        .with_context(|| format!("Failed to load session file: {:?}", args.file))?;
    let report = build_report(&args.file, &state);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Session: {} ({})", report.file, report.format);
    println!("Version: {}", report.version);
    println!("Services: {}", report.services);
    for group in &report.service_groups {
        println!(
            "  {:<16} {}",
            truncate_str(group.group.as_deref().unwrap_or("(ungrouped)"), 16),
            group.services.join(", ")
        );
    }
    println!(
        "Review sessions: {} ({} unresolved comment(s))",
        report.review_sessions, report.unresolved_comments
    );
    println!("\nProjects:");
    if report.projects.is_empty() {
        println!("  (none)");
    }
    for project in &report.projects {
        println!(
            "  {:<10} {:<16} {:<40} {} worktree(s), {} change(s), {} terminal(s)",
            project.id,
            truncate_str(&project.name, 16),
            truncate_str(&project.path, 40),
            project.worktrees,
            project.changes,
            project.terminals
        );
    }

    if report.violations.is_empty() {
        println!("\nNo invariant violations.");
    } else {
        println!("\nViolations ({}):", report.violations.len());
        for violation in &report.violations {
            println!("  - {}", violation);
        }
    }

    Ok(())
}
