//! Single task pipeline: research, plan, execute, debug.

use crate::agents::frontend_feedback::write_screenshot_code;
use crate::agents::graph::{interrupted, GraphError};
use crate::agents::{AgentContext, Debugger, DocHarvester, Executor, Planner, Researcher};
use crate::human::is_approval;

pub const TEST_APP_PROMPT: &str =
    "Please test app and provide commentary if debugging/additional refinement is needed. ";

/// How a pipeline run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub plan: String,
    /// Files the executor and debugger worked on.
    pub files: Vec<String>,
    pub debugged: bool,
}

/// Run one task through every agent. Edits made before a failure are kept.
pub async fn run_clean_coder_pipeline(
    ctx: &AgentContext,
    task: &str,
    doc_harvest: bool,
) -> Result<PipelineOutcome, GraphError> {
    tracing::info!(doc_harvest, "Starting pipeline");
    let research = Researcher::new(ctx.clone()).research_task(task).await?;

    let documentation = if doc_harvest {
        DocHarvester::new(ctx.clone()).find_documentation(task).await?
    } else {
        None
    };

    let plan = Planner::new(ctx.clone())
        .plan(task, &research.files, &research.image_paths, documentation.as_deref())
        .await?;

    let executor = Executor::new(ctx.clone());
    let (execution, screenshot_code) = if ctx.frontend_url.is_some() {
        let (execution, screenshot) = tokio::join!(
            executor.do_task(task, &plan, &research.files),
            write_screenshot_code(ctx, task, &plan)
        );
        let screenshot = screenshot.unwrap_or_else(|e| {
            tracing::warn!("Writing screenshot code failed: {}", e);
            None
        });
        (execution?, screenshot)
    } else {
        (executor.do_task(task, &plan, &research.files).await?, None)
    };
    let mut files = execution.filenames();

    if !execution.test_instruction.is_empty() {
        println!("Instruction for testing:\n{}\n", execution.test_instruction);
    }
    let human_message = ctx.human.ask(TEST_APP_PROMPT).await.map_err(interrupted)?;
    if is_approval(&human_message) {
        return Ok(PipelineOutcome {
            plan,
            files,
            debugged: false,
        });
    }

    let debugged = Debugger::new(ctx.clone())
        .do_task(
            task,
            &plan,
            &files,
            &human_message,
            &research.image_paths,
            screenshot_code.is_some(),
        )
        .await?;
    files = debugged.into_iter().map(|f| f.filename).collect();

    Ok(PipelineOutcome {
        plan,
        files,
        debugged: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::context::testing::context;
    use crate::human::ScriptedInput;
    use crate::llm::testing::ScriptedLlm;
    use std::sync::Arc;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "print('hi')\n").unwrap();
        dir
    }

    fn script_until_execution(llm: &ScriptedLlm) {
        llm.push_call(
            "final_response_researcher",
            r#"{"reasoning": "entry point", "files_for_executor": ["app.py"]}"#,
        );
        llm.push_text("1. Replace the greeting in app.py");
        llm.push_call(
            "replace_code",
            r#"{"filename": "app.py", "start_line": 1, "end_line": 1, "code": "print('cześć')"}"#,
        );
        llm.push_call("final_response_executor", r#"{"test_instruction": "python app.py"}"#);
    }

    #[tokio::test]
    async fn test_pipeline_ends_when_human_accepts() {
        let dir = project();
        let llm = Arc::new(ScriptedLlm::new("llm"));
        script_until_execution(&llm);
        let human = Arc::new(ScriptedInput::new(["ok", "o", "ok"]));
        let ctx = context(dir.path(), &llm, &human);

        let outcome = run_clean_coder_pipeline(&ctx, "Greet in Polish", false).await.unwrap();
        assert!(!outcome.debugged);
        assert_eq!(outcome.files, vec!["app.py"]);
        assert_eq!(outcome.plan, "1. Replace the greeting in app.py");
        assert_eq!(human.prompts().last().map(String::as_str), Some(TEST_APP_PROMPT));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app.py")).unwrap(),
            "print('cześć')\n"
        );
    }

    #[tokio::test]
    async fn test_pipeline_runs_debugger_on_feedback() {
        let dir = project();
        let llm = Arc::new(ScriptedLlm::new("llm"));
        script_until_execution(&llm);
        llm.push_call("final_response_debugger", r#"{"test_instruction": "python app.py"}"#);
        let human = Arc::new(ScriptedInput::new(["ok", "o", "prints nothing", "ok"]));
        let ctx = context(dir.path(), &llm, &human);

        let outcome = run_clean_coder_pipeline(&ctx, "Greet in Polish", false).await.unwrap();
        assert!(outcome.debugged);
        assert_eq!(human.remaining(), 0);
        let debugger_request = llm.requests().pop().unwrap();
        assert!(debugger_request
            .iter()
            .any(|m| m.text_content().map_or(false, |t| t.contains("prints nothing"))));
    }

    #[tokio::test]
    async fn test_pipeline_stops_when_input_closes() {
        let dir = project();
        let llm = Arc::new(ScriptedLlm::new("llm"));
        script_until_execution(&llm);
        let human = Arc::new(ScriptedInput::new(["ok"]));
        let ctx = context(dir.path(), &llm, &human);
        let err = run_clean_coder_pipeline(&ctx, "Greet in Polish", false)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::Interrupted));
    }

    /// Needs provider keys and WORK_DIR pointing at a scratch project.
    #[tokio::test]
    #[ignore]
    async fn test_live_pipeline() {
        use crate::config::Config;
        use crate::human::ConsoleInput;
        use crate::llm::LlmTiers;

        let config = Config::from_env().unwrap();
        let llms = LlmTiers::from_config(&config).unwrap();
        let ctx = AgentContext::from_config(&config, llms, Arc::new(ConsoleInput::new()))
            .await
            .unwrap();
        run_clean_coder_pipeline(&ctx, "Add a README.md describing the project", false)
            .await
            .unwrap();
    }
}
