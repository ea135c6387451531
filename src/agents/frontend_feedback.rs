//! Screenshots of the frontend for the debugger.
//!
//! While the executor works, the LLM writes Playwright code that brings the
//! app into the state worth looking at. The code is wrapped in a script
//! stored in `.clean_coder/`; the debugger runs it with `python3` and shows
//! the screenshot to the model.

use std::path::Path;

use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;

use super::AgentContext;
use crate::llm::{structured_tool, ChatMessage, ContentPart};
use crate::prompts::{fill, DEFAULT_FRONTEND_STORY, FRONTEND_FEEDBACK};
use crate::workdir::DotDir;

pub const NO_SCREENSHOT_NEEDED: &str = "No screenshot needed";

const PYTHON: &str = "python3";

const PLAYWRIGHT_START: &str = "\
import sys
from playwright.sync_api import sync_playwright

p = sync_playwright().start()
browser = p.chromium.launch(headless=False)
page = browser.new_page()
try:
";

const PLAYWRIGHT_END: &str = "
    page.screenshot(path=sys.argv[1])
except Exception as e:
    print(f\"{type(e).__name__}: {e}\")
browser.close()
p.stop()
";

#[derive(Debug, Deserialize)]
struct ScreenshotCoding {
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    questions: Option<String>,
    screenshot_code: String,
}

/// Story describing how to use the frontend, created from the default
/// template on first use. `{frontend_url}` is filled in.
pub fn read_frontend_feedback_story(work_dir: &Path, frontend_url: &str) -> anyhow::Result<String> {
    let path = DotDir::new(work_dir).frontend_feedback_story();
    if !path.exists() {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, DEFAULT_FRONTEND_STORY)?;
        println!(
            "Describe how to use your frontend in {} to get better screenshots.",
            path.display()
        );
    }
    let story = std::fs::read_to_string(&path)?;
    Ok(story.replace("{frontend_url}", frontend_url))
}

fn indent(code: &str, prefix: &str) -> String {
    code.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect()
}

/// Full Playwright script around the navigation `code`. The screenshot path
/// is the script's first argument.
pub fn playwright_script(code: &str) -> String {
    format!(
        "{}{}{}",
        PLAYWRIGHT_START,
        indent(code.trim_end(), "    "),
        PLAYWRIGHT_END
    )
}

/// Ask the LLM for screenshot code and store the script. `None` when no
/// screenshot is useful for the task or no frontend is configured.
pub async fn write_screenshot_code(
    ctx: &AgentContext,
    task: &str,
    plan: &str,
) -> anyhow::Result<Option<String>> {
    let Some(frontend_url) = &ctx.frontend_url else {
        return Ok(None);
    };
    let story = read_frontend_feedback_story(&ctx.work_dir, frontend_url)?;
    let prompt = fill(
        FRONTEND_FEEDBACK,
        &[("task", task), ("plan", plan), ("story", &story)],
    );
    let tool = structured_tool(
        "screenshot_coding",
        "Playwright code for a screenshot of the frontend.",
        json!({
            "type": "object",
            "properties": {
                "analysis": {
                    "type": "string",
                    "description": "Think which frontend page needed to be sought in order to provide programmer with valuable feedback (if any)."
                },
                "questions": {
                    "type": "string",
                    "description": "If you have missing info about some endpoint/selector/other important element name, ask about it here."
                },
                "screenshot_code": {
                    "type": "string",
                    "description": "Playwright code for a screenshot. If screenshot is not needed for that task write exactly \"No screenshot needed\"."
                }
            },
            "required": ["analysis", "screenshot_code"]
        }),
    );

    let llm = ctx.llms.mid.named("Frontend Feedback");
    let response: ScreenshotCoding = llm
        .invoke_structured(&[ChatMessage::user(prompt)], &tool)
        .await?;
    tracing::debug!(analysis = %response.analysis, questions = ?response.questions, "Screenshot code written");

    if response.screenshot_code.trim() == NO_SCREENSHOT_NEEDED {
        return Ok(None);
    }

    let script = playwright_script(&response.screenshot_code);
    let path = DotDir::new(&ctx.work_dir).screenshot_script();
    tokio::fs::write(&path, &script).await?;
    tracing::info!("Screenshot script saved to {}", path.display());
    Ok(Some(script))
}

/// Run the screenshot script and turn its result into a user message.
pub async fn execute_screenshot_code(script: &Path) -> ChatMessage {
    run_screenshot_script(PYTHON, script).await
}

async fn run_screenshot_script(interpreter: &str, script: &Path) -> ChatMessage {
    let output_path = script.with_extension("png");
    let _ = tokio::fs::remove_file(&output_path).await;

    let output = Command::new(interpreter)
        .arg(script)
        .arg(&output_path)
        .output()
        .await;
    let output = match output {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!("Could not run screenshot script: {}", e);
            return ChatMessage::user(format!("Screenshot could not be taken: {}", e));
        }
    };

    match tokio::fs::read(&output_path).await {
        Ok(bytes) => ChatMessage::user_parts(vec![
            ContentPart::text("Screenshot of current app state:"),
            ContentPart::image_bytes("image/png", &bytes),
        ]),
        Err(_) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            ChatMessage::user(format!(
                "Screenshot could not be taken: {}{}",
                stdout.trim(),
                stderr.trim()
            ))
        }
    }
}
