use crate::llm::{LLMClient, LLMClientFactory, ModelRole, ToolCallingConfig, ToolCoordinator};
use crate::research::decomposer::TaskDecomposer;
use crate::research::planner::PlanGenerator;
use crate::research::prompts::{render, COORDINATOR_PROMPT_TEMPLATE};
use crate::research::worker::{ReportLedger, SpawnSubagentTool, WorkerSpawner};
use crate::tools::mcp::{NoopSessionFactory, ToolSession, ToolSessionFactory};
use crate::tools::registry::{Tool, ToolRegistry};
use crate::tools::search::{
    DuckDuckGoSearch, FetchPageTool, SearchBackend, SerpApiSearch, WebSearchTool,
    DEFAULT_RESULT_COUNT,
};
use crate::types::{
    AppError, FinalReport, ResearchPlan, ResearchQuery, Result, SharedContext, SubtaskList,
};
use crate::utils::progress::{SharedSink, TracingSink};
use crate::utils::toml_config::{DeepdiveConfig, LimitsConfig, McpConfig, SearchBackendKind};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// End-to-end research pipeline: plan, decompose, dispatch, synthesize.
///
/// Each call to [`run`](Self::run) is independent. The tool session is opened
/// after decomposition succeeds and is closed exactly once when the run ends,
/// whether it succeeded or not.
pub struct ResearchCoordinator {
    planner: PlanGenerator,
    decomposer: TaskDecomposer,
    dispatcher: Arc<dyn LLMClient>,
    spawner: Arc<WorkerSpawner>,
    search: Arc<dyn SearchBackend>,
    search_results: usize,
    local_tools: Vec<Arc<dyn Tool>>,
    sessions: Arc<dyn ToolSessionFactory>,
    limits: LimitsConfig,
    sink: SharedSink,
}

impl ResearchCoordinator {
    pub fn builder() -> ResearchCoordinatorBuilder {
        ResearchCoordinatorBuilder::default()
    }

    /// Wire every stage from configuration
    pub fn from_config(config: &DeepdiveConfig, sink: SharedSink) -> Result<Self> {
        let factory = LLMClientFactory::new(Arc::new(config.clone()));

        let search: Arc<dyn SearchBackend> = match config.search.backend {
            SearchBackendKind::SerpApi => {
                let key = config.search_api_key()?.ok_or_else(|| {
                    AppError::Config("search.api_key_env is not configured".to_string())
                })?;
                Arc::new(SerpApiSearch::new(key)?)
            }
            SearchBackendKind::DuckDuckGo => Arc::new(DuckDuckGoSearch),
        };

        let mut builder = Self::builder()
            .planner(factory.create_for(ModelRole::Planner)?)
            .decomposer(factory.create_for(ModelRole::Decomposer)?)
            .dispatcher(factory.create_for(ModelRole::Coordinator)?)
            .subagent(factory.create_for(ModelRole::Subagent)?)
            .search(search)
            .search_results(config.search.num_results)
            .stream_plan(config.planner.stream)
            .limits(config.limits.clone())
            .sessions(session_factory(&config.mcp)?)
            .sink(sink.clone());

        // Without a scraping server workers still need a way to read pages
        if !config.mcp.enabled {
            builder = builder.local_tool(Arc::new(FetchPageTool::new(sink)));
        }

        builder.build()
    }

    /// Run the whole pipeline for one query.
    pub async fn run(&self, query: &str) -> Result<FinalReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("research", %run_id);
        self.run_inner(run_id, query).instrument(span).await
    }

    async fn run_inner(&self, run_id: Uuid, query: &str) -> Result<FinalReport> {
        let started = Instant::now();
        let query = ResearchQuery::new(query)?;
        self.sink.line("Running the deep research...");

        let plan = self.planner.generate_plan(&query).await?;
        let subtasks = self.decomposer.decompose(&plan).await?;

        self.sink.line(&format!(
            "Opening tool session ({})",
            self.sessions.describe()
        ));
        let session = self.sessions.open().await.map_err(|e| match e {
            AppError::ResourceAcquisition(_) => e,
            other => AppError::ResourceAcquisition(other.to_string()),
        })?;
        let mut session = SessionGuard::new(session);

        let outcome = self
            .dispatch(query, plan, &subtasks, session.tools())
            .await;
        session.close().await;

        let (content, ledger) = outcome?;
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            workers = ledger.spawned(),
            subtasks = subtasks.len(),
            duration_ms,
            "research run finished"
        );

        Ok(FinalReport {
            run_id,
            content,
            worker_reports: ledger.reports(),
            subtask_count: subtasks.len(),
            generated_at: Utc::now(),
            duration_ms,
        })
    }

    async fn dispatch(
        &self,
        query: ResearchQuery,
        plan: ResearchPlan,
        subtasks: &SubtaskList,
        remote_tools: Vec<Arc<dyn Tool>>,
    ) -> Result<(String, Arc<ReportLedger>)> {
        let worker_tools = Arc::new(self.worker_tools(remote_tools));
        info!(tools = ?worker_tools.tool_names(), "worker capability table ready");

        let subtasks_json = serde_json::to_string_pretty(&subtasks.subtasks)
            .map_err(|e| AppError::Internal(format!("Failed to encode subtasks: {}", e)))?;
        let prompt = render(
            COORDINATOR_PROMPT_TEMPLATE,
            &[
                ("user_query", query.as_str()),
                ("research_plan", plan.as_str()),
                ("subtasks_json", &subtasks_json),
            ],
        );

        let ledger = Arc::new(ReportLedger::new());
        let spawn_tool = SpawnSubagentTool::new(
            Arc::clone(&self.spawner),
            Arc::new(SharedContext { query, plan }),
            worker_tools,
            Arc::clone(&ledger),
            Arc::clone(&self.sink),
        )
        .with_max_workers(self.limits.max_workers);

        let mut dispatch_tools = ToolRegistry::new();
        dispatch_tools.register(Arc::new(spawn_tool));

        self.sink.line("Initializing Coordinator");
        self.sink
            .line(&format!("Coordinator Model: {}", self.dispatcher.model_name()));

        let agent = ToolCoordinator::new(
            Arc::clone(&self.dispatcher),
            Arc::new(dispatch_tools),
            ToolCallingConfig {
                max_iterations: self.limits.dispatch_max_iterations,
                parallel_execution: self.limits.parallel_workers,
                tool_timeout: None,
                stop_on_error: false,
            },
        );

        let result = agent
            .execute(None, &prompt)
            .await
            .map_err(|e| AppError::LLM(format!("Dispatch agent failed: {}", e)))?;

        if result.content.trim().is_empty() {
            warn!("dispatch agent returned an empty report");
        }
        Ok((result.content, ledger))
    }

    /// Local tools first; a remote tool with the same name replaces the local one
    fn worker_tools(&self, remote_tools: Vec<Arc<dyn Tool>>) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(
            WebSearchTool::new(Arc::clone(&self.search), Arc::clone(&self.sink))
                .with_default_count(self.search_results),
        ));
        registry.extend(self.local_tools.iter().cloned());
        for tool in remote_tools {
            if registry.has_tool(tool.name()) {
                warn!(tool = tool.name(), "remote tool shadows a local tool");
            }
            registry.register(tool);
        }
        registry
    }
}

#[cfg(feature = "mcp")]
fn session_factory(config: &McpConfig) -> Result<Arc<dyn ToolSessionFactory>> {
    if config.enabled {
        Ok(Arc::new(crate::tools::mcp::McpSessionFactory::new(
            config.url.clone(),
        )))
    } else {
        Ok(Arc::new(NoopSessionFactory))
    }
}

#[cfg(not(feature = "mcp"))]
fn session_factory(config: &McpConfig) -> Result<Arc<dyn ToolSessionFactory>> {
    if config.enabled {
        Err(AppError::Config(
            "mcp.enabled is set but deepdive was built without the 'mcp' feature".to_string(),
        ))
    } else {
        Ok(Arc::new(NoopSessionFactory))
    }
}

/// Owns an open session until it is closed.
///
/// If the run is dropped before [`close`](Self::close) (caller cancellation),
/// the session is closed on a background task instead.
struct SessionGuard {
    session: Option<Box<dyn ToolSession>>,
}

impl SessionGuard {
    fn new(session: Box<dyn ToolSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        self.session
            .as_ref()
            .map(|s| s.tools())
            .unwrap_or_default()
    }

    async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!(error = %e, "failed to close tool session");
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!(error = %e, "failed to close tool session after cancellation");
                    }
                });
            }
        }
    }
}

/// Assembles a [`ResearchCoordinator`] from individual parts.
pub struct ResearchCoordinatorBuilder {
    planner: Option<Arc<dyn LLMClient>>,
    decomposer: Option<Arc<dyn LLMClient>>,
    dispatcher: Option<Arc<dyn LLMClient>>,
    subagent: Option<Arc<dyn LLMClient>>,
    search: Option<Arc<dyn SearchBackend>>,
    search_results: usize,
    local_tools: Vec<Arc<dyn Tool>>,
    sessions: Arc<dyn ToolSessionFactory>,
    limits: LimitsConfig,
    stream_plan: bool,
    sink: SharedSink,
}

impl Default for ResearchCoordinatorBuilder {
    fn default() -> Self {
        Self {
            planner: None,
            decomposer: None,
            dispatcher: None,
            subagent: None,
            search: None,
            search_results: DEFAULT_RESULT_COUNT,
            local_tools: Vec::new(),
            sessions: Arc::new(NoopSessionFactory),
            limits: LimitsConfig::default(),
            stream_plan: true,
            sink: Arc::new(TracingSink),
        }
    }
}

impl ResearchCoordinatorBuilder {
    pub fn planner(mut self, client: Arc<dyn LLMClient>) -> Self {
        self.planner = Some(client);
        self
    }

    pub fn decomposer(mut self, client: Arc<dyn LLMClient>) -> Self {
        self.decomposer = Some(client);
        self
    }

    /// Model driving the dispatch agent
    pub fn dispatcher(mut self, client: Arc<dyn LLMClient>) -> Self {
        self.dispatcher = Some(client);
        self
    }

    pub fn subagent(mut self, client: Arc<dyn LLMClient>) -> Self {
        self.subagent = Some(client);
        self
    }

    /// Use one client for every stage
    pub fn all_stages(self, client: Arc<dyn LLMClient>) -> Self {
        self.planner(Arc::clone(&client))
            .decomposer(Arc::clone(&client))
            .dispatcher(Arc::clone(&client))
            .subagent(client)
    }

    pub fn search(mut self, backend: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(backend);
        self
    }

    pub fn search_results(mut self, count: usize) -> Self {
        self.search_results = count;
        self
    }

    /// Extra worker tool, alongside `search_web` and the session's tools
    pub fn local_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.local_tools.push(tool);
        self
    }

    pub fn sessions(mut self, factory: Arc<dyn ToolSessionFactory>) -> Self {
        self.sessions = factory;
        self
    }

    pub fn limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn stream_plan(mut self, stream: bool) -> Self {
        self.stream_plan = stream;
        self
    }

    pub fn sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Result<ResearchCoordinator> {
        fn required<T>(value: Option<T>, what: &str) -> Result<T> {
            value.ok_or_else(|| AppError::Config(format!("No {} configured", what)))
        }

        let planner = required(self.planner, "planner model")?;
        let decomposer = required(self.decomposer, "decomposer model")?;
        let dispatcher = required(self.dispatcher, "coordinator model")?;
        let subagent = required(self.subagent, "subagent model")?;
        let search = required(self.search, "search backend")?;

        let worker_config = ToolCallingConfig {
            max_iterations: self.limits.worker_max_iterations,
            parallel_execution: false,
            tool_timeout: Some(self.limits.tool_timeout()),
            stop_on_error: false,
        };

        Ok(ResearchCoordinator {
            planner: PlanGenerator::new(planner, Arc::clone(&self.sink))
                .with_streaming(self.stream_plan),
            decomposer: TaskDecomposer::new(decomposer, Arc::clone(&self.sink)),
            dispatcher,
            spawner: Arc::new(WorkerSpawner::new(subagent, worker_config)),
            search,
            search_results: self.search_results,
            local_tools: self.local_tools,
            sessions: self.sessions,
            limits: self.limits,
            sink: self.sink,
        })
    }
}
