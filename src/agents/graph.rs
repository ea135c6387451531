//! The agent loop shared by every agent.
//!
//! An agent graph has four nodes: `Agent` calls the LLM, `Tool` runs the
//! requested tools, `Corrector` answers malformed responses with a
//! clarifying instruction and `Human` reviews a final answer. The edge taken
//! after `Agent` depends only on the shape of the model's response, see
//! [`route_response`].

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::human::InputClosed;
use crate::llm::{ChatMessage, ChatResponse, LlmChain, ToolCall, ToolDefinition};
use crate::prompts::{BAD_ARGUMENTS_MSG, MIXED_FINAL_MSG, NO_TOOL_CALL_MSG};
use crate::tools::ToolRegistry;
use crate::tracker::TOOL_NOT_EXECUTED_WORD;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("{graph}: recursion limit of {limit} steps reached")]
    RecursionLimit { graph: String, limit: usize },

    #[error("{graph}: LLM call failed: {message}")]
    Llm { graph: String, message: String },

    #[error("Input closed by user")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Nodes of an agent graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Agent,
    Tool,
    Corrector,
    Human,
    End,
}

/// Why a response is sent back to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    NoToolCall,
    BadArguments,
    MixedFinal,
}

impl Correction {
    pub fn message(self) -> &'static str {
        match self {
            Correction::NoToolCall => NO_TOOL_CALL_MSG,
            Correction::BadArguments => BAD_ARGUMENTS_MSG,
            Correction::MixedFinal => MIXED_FINAL_MSG,
        }
    }
}

/// Classified model response.
#[derive(Debug, Clone)]
pub enum Route {
    /// A final-answer call, with its parsed arguments.
    Final(ToolCall, Value),
    /// Tool calls to execute, in order, with parsed arguments.
    Tools(Vec<(ToolCall, Value)>),
    Correct(Correction),
}

impl Route {
    /// Node the graph moves to from `Agent`.
    pub fn target(&self, reviewed: bool) -> Node {
        match self {
            Route::Final(..) if reviewed => Node::Human,
            Route::Final(..) => Node::End,
            Route::Tools(_) => Node::Tool,
            Route::Correct(_) => Node::Corrector,
        }
    }
}

/// Classify `response`. When several final calls come alone the first one
/// wins.
pub fn route_response(response: &ChatResponse, final_tools: &[String]) -> Route {
    let calls = response.calls();
    if calls.is_empty() {
        return Route::Correct(Correction::NoToolCall);
    }

    let mut parsed = Vec::with_capacity(calls.len());
    for call in calls {
        match call.parsed_arguments() {
            Ok(args) => parsed.push((call.clone(), args)),
            Err(_) => return Route::Correct(Correction::BadArguments),
        }
    }

    let is_final = |call: &ToolCall| final_tools.iter().any(|f| f == call.name());
    let finals = parsed.iter().filter(|(call, _)| is_final(call)).count();
    if finals == 0 {
        return Route::Tools(parsed);
    }
    if finals < parsed.len() {
        return Route::Correct(Correction::MixedFinal);
    }
    let (call, args) = parsed.swap_remove(0);
    Route::Final(call, args)
}

/// Counts node executions against a fixed limit.
#[derive(Debug, Clone)]
pub struct StepBudget {
    graph: String,
    limit: usize,
    used: usize,
}

impl StepBudget {
    pub fn new(graph: impl Into<String>, limit: usize) -> Self {
        Self {
            graph: graph.into(),
            limit,
            used: 0,
        }
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Account for one more node execution.
    pub fn step(&mut self) -> Result<(), GraphError> {
        if self.used >= self.limit {
            return Err(GraphError::RecursionLimit {
                graph: self.graph.clone(),
                limit: self.limit,
            });
        }
        self.used += 1;
        Ok(())
    }
}

/// Agent-specific behaviour plugged into the shared loop.
#[async_trait]
pub trait GraphHooks: Send + Sync {
    async fn before_agent(&self, _messages: &[ChatMessage]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_agent(&self, messages: Vec<ChatMessage>) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(messages)
    }

    /// Called once per executed tool call.
    fn on_tool_result(&self, _call: &ToolCall, _args: &Value, _result: &str) {}

    async fn after_tools(&self, messages: Vec<ChatMessage>) -> anyhow::Result<Vec<ChatMessage>> {
        Ok(messages)
    }

    /// True when final answers go through [`review_final`](Self::review_final).
    fn reviews_final(&self) -> bool {
        false
    }

    /// `None` accepts the final answer; `Some(feedback)` sends the agent
    /// back to work with the feedback.
    async fn review_final(&self, _call: &ToolCall, _args: &Value) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Hooks that change nothing.
pub struct NoHooks;

impl GraphHooks for NoHooks {}

/// Static description of an agent graph.
#[derive(Clone)]
pub struct AgentGraph {
    name: String,
    llm: LlmChain,
    tools: ToolRegistry,
    final_tools: Vec<String>,
    work_dir: PathBuf,
    step_limit: usize,
}

impl AgentGraph {
    pub fn new(
        name: impl Into<String>,
        llm: LlmChain,
        tools: ToolRegistry,
        work_dir: impl Into<PathBuf>,
        step_limit: usize,
    ) -> Self {
        Self {
            name: name.into(),
            llm,
            tools,
            final_tools: Vec::new(),
            work_dir: work_dir.into(),
            step_limit,
        }
    }

    /// Mark `name` as a final-answer tool that ends the loop.
    pub fn with_final_tool(mut self, name: impl Into<String>) -> Self {
        self.final_tools.push(name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}

/// Final answer of a finished graph.
#[derive(Debug, Clone)]
pub struct FinalCall {
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone)]
pub struct GraphOutcome {
    pub messages: Vec<ChatMessage>,
    pub final_call: FinalCall,
}

fn answer_calls(messages: &mut Vec<ChatMessage>, calls: &[ToolCall], text: &str) {
    for call in calls {
        messages.push(ChatMessage::tool_result(call.id.clone(), text));
    }
}

/// Run `graph` from `messages` until a final answer is accepted.
pub async fn run_graph(
    graph: &AgentGraph,
    mut messages: Vec<ChatMessage>,
    hooks: &dyn GraphHooks,
) -> Result<GraphOutcome, GraphError> {
    let mut budget = StepBudget::new(graph.name.clone(), graph.step_limit);
    let schemas: Vec<ToolDefinition> = graph.tools.get_tool_schemas();

    loop {
        // ==================== Agent ====================
        budget.step()?;
        hooks.before_agent(&messages).await?;
        let response = graph
            .llm
            .invoke(&messages, Some(&schemas))
            .await
            .map_err(|e| GraphError::Llm {
                graph: graph.name.clone(),
                message: e.to_string(),
            })?;
        messages.push(ChatMessage::from_response(&response));
        messages = hooks.after_agent(messages).await?;

        let route = route_response(&response, &graph.final_tools);
        tracing::debug!(graph = %graph.name, step = budget.used(), next = ?route.target(hooks.reviews_final()));

        match route {
            // ==================== Human / End ====================
            Route::Final(call, arguments) => {
                if hooks.reviews_final() {
                    budget.step()?;
                    if let Some(feedback) = hooks.review_final(&call, &arguments).await.map_err(interrupted)? {
                        answer_calls(&mut messages, response.calls(), &format!("Human: {}", feedback));
                        continue;
                    }
                }
                answer_calls(&mut messages, response.calls(), "Accepted.");
                return Ok(GraphOutcome {
                    messages,
                    final_call: FinalCall {
                        name: call.name().to_string(),
                        arguments,
                    },
                });
            }

            // ==================== Tool ====================
            Route::Tools(calls) => {
                budget.step()?;
                for (call, args) in calls {
                    tracing::info!(graph = %graph.name, tool = call.name(), "Calling tool");
                    let result = match graph
                        .tools
                        .execute(call.name(), args.clone(), &graph.work_dir)
                        .await
                    {
                        Ok(output) => output,
                        Err(e) if e.downcast_ref::<InputClosed>().is_some() => {
                            return Err(GraphError::Interrupted)
                        }
                        Err(e) => format!("Error: {}", e),
                    };
                    hooks.on_tool_result(&call, &args, &result);
                    messages.push(ChatMessage::tool_result(call.id.clone(), result));
                }
                messages = hooks.after_tools(messages).await?;
            }

            // ==================== Corrector ====================
            Route::Correct(correction) => {
                budget.step()?;
                tracing::warn!(graph = %graph.name, "Correcting model response: {:?}", correction);
                answer_calls(
                    &mut messages,
                    response.calls(),
                    &format!("{}{}", TOOL_NOT_EXECUTED_WORD, correction.message()),
                );
                messages.push(ChatMessage::user(correction.message()));
            }
        }
    }
}

/// Map a human-input failure, keeping a closed input distinct.
pub(crate) fn interrupted(e: anyhow::Error) -> GraphError {
    if e.downcast_ref::<InputClosed>().is_some() {
        GraphError::Interrupted
    } else {
        GraphError::Other(e)
    }
}
