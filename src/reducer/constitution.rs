use super::Outcome;
use crate::models::TasksState;
use crate::workflow::{ConstitutionStatus, ConstitutionWorkflow, WorkflowError};

fn workflow(tasks: &mut TasksState) -> Result<&mut ConstitutionWorkflow, String> {
    tasks
        .constitution_workflow
        .as_mut()
        .ok_or_else(|| "No constitution workflow has been started".to_string())
}

pub(super) fn start(tasks: &mut TasksState, use_claude_md_reference: bool) -> Outcome {
    if tasks
        .constitution_workflow
        .as_ref()
        .is_some_and(|wf| wf.status == ConstitutionStatus::Generating)
    {
        return Err("A constitution is being generated".to_string());
    }
    tasks.constitution_workflow = Some(ConstitutionWorkflow::new(use_claude_md_reference));
    Ok(())
}

/// Answers the current question, starting a workflow first if none exists.
pub(super) fn answer(tasks: &mut TasksState, answer: &str, question_count: usize) -> Outcome {
    let wf = tasks
        .constitution_workflow
        .get_or_insert_with(ConstitutionWorkflow::default);
    wf.answer(answer, question_count).map_err(|e| e.to_string())
}

pub(super) fn previous(tasks: &mut TasksState) -> Outcome {
    workflow(tasks)?.previous().map_err(|e| e.to_string())
}

pub(super) fn set_use_claude_md(tasks: &mut TasksState, enabled: bool) -> Outcome {
    let wf = workflow(tasks)?;
    if wf.status == ConstitutionStatus::Generating {
        return Err("Cannot change the CLAUDE.md reference while generating".to_string());
    }
    wf.use_claude_md_reference = enabled;
    Ok(())
}

pub(super) fn generate(tasks: &mut TasksState, question_count: usize) -> Outcome {
    workflow(tasks)?
        .begin_generation(question_count)
        .map_err(|e| e.to_string())
}

/// Chunks that arrive after a reset or failure are dropped.
pub(super) fn append_output(tasks: &mut TasksState, chunk: &str) {
    if let Some(wf) = tasks.constitution_workflow.as_mut() {
        let _ = wf.append_output(chunk);
    }
}

/// Completing with no output is turned into a failed generation.
pub(super) fn complete(tasks: &mut TasksState) -> Outcome {
    let wf = workflow(tasks)?;
    match wf.complete() {
        Ok(()) => {
            tasks.constitution_exists = Some(true);
            Ok(())
        }
        Err(WorkflowError::EmptyOutput) => {
            wf.fail("Constitution generation produced no output")
                .map_err(|e| e.to_string())?;
            Err(WorkflowError::EmptyOutput.to_string())
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Failures reported after a reset are dropped like late chunks.
pub(super) fn failed(tasks: &mut TasksState, error: &str) {
    if let Some(wf) = tasks.constitution_workflow.as_mut() {
        if wf.status == ConstitutionStatus::Generating {
            let _ = wf.fail(error);
        }
    }
}

/// Back to a fresh collecting workflow, keeping the CLAUDE.md preference.
pub(super) fn reset(tasks: &mut TasksState) {
    if let Some(wf) = tasks.constitution_workflow.as_mut() {
        *wf = ConstitutionWorkflow::new(wf.use_claude_md_reference);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answering_auto_starts_workflow() {
        let mut tasks = TasksState::default();
        answer(&mut tasks, "A CLI", 4).unwrap();
        let wf = tasks.constitution_workflow.as_ref().unwrap();
        assert_eq!(wf.current_question, 1);
        assert_eq!(wf.status, ConstitutionStatus::Collecting);
    }

    #[test]
    fn restart_refused_while_generating() {
        let mut tasks = TasksState::default();
        answer(&mut tasks, "only", 1).unwrap();
        generate(&mut tasks, 1).unwrap();
        assert!(start(&mut tasks, true).is_err());
        assert_eq!(
            tasks.constitution_workflow.as_ref().unwrap().status,
            ConstitutionStatus::Generating
        );
    }

    #[test]
    fn empty_completion_fails_workflow() {
        let mut tasks = TasksState::default();
        answer(&mut tasks, "only", 1).unwrap();
        generate(&mut tasks, 1).unwrap();
        assert!(complete(&mut tasks).is_err());
        let wf = tasks.constitution_workflow.as_ref().unwrap();
        assert_eq!(wf.status, ConstitutionStatus::Error);
        assert!(wf.error.is_some());
        assert_ne!(tasks.constitution_exists, Some(true));
    }

    #[test]
    fn completion_marks_constitution_present() {
        let mut tasks = TasksState::default();
        answer(&mut tasks, "only", 1).unwrap();
        generate(&mut tasks, 1).unwrap();
        append_output(&mut tasks, "# Constitution");
        complete(&mut tasks).unwrap();
        assert_eq!(tasks.constitution_exists, Some(true));
    }

    #[test]
    fn late_chunks_after_reset_are_dropped() {
        let mut tasks = TasksState::default();
        start(&mut tasks, true).unwrap();
        reset(&mut tasks);
        append_output(&mut tasks, "late");
        let wf = tasks.constitution_workflow.as_ref().unwrap();
        assert!(wf.output.is_empty());
        assert!(wf.use_claude_md_reference);
    }
}
