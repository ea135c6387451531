//! Human-in-the-loop input.
//!
//! Every approval gate in the agents goes through [`HumanInput`], so tests can
//! script the human while the binaries read from the terminal.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// The human closed the console (Ctrl-C or end of input).
#[derive(Debug, thiserror::Error)]
#[error("Input closed by user")]
pub struct InputClosed;

/// Source of human answers.
#[async_trait]
pub trait HumanInput: Send + Sync {
    /// Show `prompt` and wait for one answer.
    async fn ask(&self, prompt: &str) -> anyhow::Result<String>;

    /// Let the human pick one of `options`; returns its index.
    async fn choose(&self, prompt: &str, options: &[&str]) -> anyhow::Result<usize> {
        let mut menu = format!("{}\n", prompt);
        for (i, option) in options.iter().enumerate() {
            menu.push_str(&format!("  {}) {}\n", i + 1, option));
        }
        menu.push_str("Number (default 1): ");
        loop {
            let answer = self.ask(&menu).await?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(0);
            }
            match answer.parse::<usize>() {
                Ok(n) if n >= 1 && n <= options.len() => return Ok(n - 1),
                _ => println!("Please type a number between 1 and {}.", options.len()),
            }
        }
    }
}

/// True for the answers that accept a proposal.
pub fn is_approval(answer: &str) -> bool {
    matches!(answer.trim(), "o" | "ok")
}

/// Terminal input with line editing. A trailing `\` continues the answer on
/// the next line.
#[derive(Debug, Default)]
pub struct ConsoleInput;

impl ConsoleInput {
    pub fn new() -> Self {
        Self
    }

    fn read_blocking(prompt: String) -> anyhow::Result<String> {
        let mut rl = DefaultEditor::new()?;
        println!("{}", prompt);

        let mut buffer = String::new();
        loop {
            let marker = if buffer.is_empty() { "> " } else { "... > " };
            match rl.readline(marker) {
                Ok(line) => {
                    let trimmed = line.trim_end();
                    if let Some(without_backslash) = trimmed.strip_suffix('\\') {
                        buffer.push_str(without_backslash);
                        buffer.push('\n');
                        continue;
                    }
                    buffer.push_str(&line);
                    return Ok(buffer.trim().to_string());
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    return Err(InputClosed.into());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl HumanInput for ConsoleInput {
    async fn ask(&self, prompt: &str) -> anyhow::Result<String> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || Self::read_blocking(prompt)).await?
    }
}

/// Pre-recorded answers, returned in order.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or(0)
    }
}

#[async_trait]
impl HumanInput for ScriptedInput {
    async fn ask(&self, prompt: &str) -> anyhow::Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.answers
            .lock()
            .map_err(|_| anyhow::anyhow!("Scripted input poisoned"))?
            .pop_front()
            .ok_or_else(|| {
                anyhow::Error::new(InputClosed)
                    .context(format!("No scripted answer left for prompt: {}", prompt))
            })
    }
}
