// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task planning.
//!
//! Turns a natural-language goal plus a codebase analysis into a
//! dependency-ordered [`TaskPlan`]: classify the goal, decompose it into
//! language-aware tasks, order them with Kahn's algorithm, and estimate
//! durations. Created plans register with the status manager for live
//! progress tracking.

use crate::error::PlannerError;
use crate::status::StatusManager;
use sbx_core::{
    Analysis, Clock, CodebaseContext, IdGen, PlanId, Subtask, Task, TaskId, TaskPlan,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

/// Goal classification used to pick a decomposition template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Implementation,
    Refactoring,
    Debugging,
    Testing,
    Generic,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Implementation => write!(f, "implementation"),
            TaskType::Refactoring => write!(f, "refactoring"),
            TaskType::Debugging => write!(f, "debugging"),
            TaskType::Testing => write!(f, "testing"),
            TaskType::Generic => write!(f, "generic"),
        }
    }
}

/// Estimated goal complexity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Complexity::Low => write!(f, "low"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::High => write!(f, "high"),
        }
    }
}

/// Planner configuration.
#[derive(Debug, Clone, Default)]
pub struct PlannerConfig {
    /// Cap on tasks generated by a full-workflow decomposition over
    /// multi-language repos; `None` keeps every generated task.
    pub max_workflow_tasks: Option<usize>,
}

// Classification keyword tables
const IMPLEMENTATION_PATTERNS: &[&str] = &["implement", "create", "build", "develop", "add"];
const REFACTORING_PATTERNS: &[&str] = &["refactor", "restructure", "reorganize", "optimize"];
const DEBUGGING_PATTERNS: &[&str] = &["fix", "debug", "resolve", "troubleshoot"];
const TESTING_PATTERNS: &[&str] = &["test", "validate", "verify"];

const HIGH_COMPLEXITY: &[&str] = &["architecture", "framework", "migration", "integration", "security"];
const MEDIUM_COMPLEXITY: &[&str] = &["refactor", "optimize", "enhance", "extend"];
const LOW_COMPLEXITY: &[&str] = &["fix", "update", "modify", "adjust"];

// Decomposition intents
const WORKFLOW_KEYWORDS: &[&str] = &["workflow", "pipeline", "complete", "full"];
const SETUP_KEYWORDS: &[&str] = &["install", "setup", "dependencies", "environment"];
const TEST_KEYWORDS: &[&str] = &["test", "testing", "validate", "verify"];
const BUILD_KEYWORDS: &[&str] = &["build", "compile", "package", "bundle"];

const COMPLEX_FRAMEWORKS: &[&str] = &["react", "angular", "vue", "django", "spring", "rails"];
const COMPLEX_LANGUAGES: &[&str] = &["c++", "rust", "haskell", "scala"];

struct LanguageTemplate {
    setup: &'static [&'static str],
    test: &'static [&'static str],
    build: &'static [&'static str],
}

fn language_template(language: &str) -> Option<&'static LanguageTemplate> {
    const PYTHON: LanguageTemplate = LanguageTemplate {
        setup: &[
            "Create virtual environment (python -m venv venv)",
            "Install dependencies (pip install -r requirements.txt)",
            "Install development dependencies (pip install -e .[dev])",
        ],
        test: &[
            "Run unit tests (python -m pytest)",
            "Run tests with coverage (pytest --cov=.)",
            "Run linting (flake8 .)",
            "Run type checking (mypy .)",
        ],
        build: &[
            "Build package (python -m build)",
            "Install package locally (pip install -e .)",
        ],
    };
    const JAVASCRIPT: LanguageTemplate = LanguageTemplate {
        setup: &[
            "Install Node.js dependencies (npm install)",
            "Verify package.json configuration",
        ],
        test: &[
            "Run unit tests (npm test)",
            "Run linting (npm run lint)",
        ],
        build: &[
            "Build application (npm run build)",
        ],
    };
    const JAVA: LanguageTemplate = LanguageTemplate {
        setup: &[
            "Download Maven dependencies (mvn dependency:resolve)",
            "Compile source code (mvn compile)",
        ],
        test: &[
            "Run unit tests (mvn test)",
            "Run integration tests (mvn verify)",
        ],
        build: &[
            "Compile and package (mvn package)",
        ],
    };
    const RUST: LanguageTemplate = LanguageTemplate {
        setup: &[
            "Check Rust toolchain (rustc --version)",
            "Build dependencies (cargo build)",
        ],
        test: &[
            "Run unit tests (cargo test)",
            "Check code formatting (cargo fmt --check)",
        ],
        build: &[
            "Build in release mode (cargo build --release)",
        ],
    };
    const GO: LanguageTemplate = LanguageTemplate {
        setup: &[
            "Download dependencies (go mod download)",
            "Tidy up dependencies (go mod tidy)",
        ],
        test: &[
            "Run unit tests (go test ./...)",
            "Run race condition tests (go test -race ./...)",
        ],
        build: &[
            "Build application (go build)",
        ],
    };

    match language {
        "python" => Some(&PYTHON),
        "javascript" => Some(&JAVASCRIPT),
        "java" => Some(&JAVA),
        "rust" => Some(&RUST),
        "go" => Some(&GO),
        _ => None,
    }
}

fn framework_setup_tasks(frameworks: &[String]) -> Vec<String> {
    let mut tasks = Vec::new();
    for framework in frameworks {
        match framework.as_str() {
            "react" => tasks.push("Verify React development environment".to_string()),
            "vue" => tasks.push("Verify Vue development environment".to_string()),
            "angular" => tasks.push("Verify Angular CLI setup".to_string()),
            "django" => {
                tasks.push("Run Django migrations (python manage.py migrate)".to_string())
            }
            "flask" => tasks.push("Initialize Flask application configuration".to_string()),
            "express" => tasks.push("Configure Express middleware".to_string()),
            "spring" => tasks.push("Verify Spring Boot configuration".to_string()),
            "docker" => tasks.push("Build Docker images (docker build -t app .)".to_string()),
            _ => {}
        }
    }
    tasks
}

/// Generic decomposition templates by task type.
fn generic_template(task_type: TaskType) -> &'static [&'static str] {
    match task_type {
        TaskType::Implementation => &[
            "Analyze requirements and design approach",
            "Set up necessary infrastructure and dependencies",
            "Implement core functionality",
            "Add error handling and validation",
            "Write unit tests",
            "Integration testing",
            "Documentation updates",
        ],
        TaskType::Refactoring => &[
            "Analyze current implementation",
            "Identify refactoring opportunities",
            "Create refactoring plan",
            "Implement changes incrementally",
            "Update tests",
            "Verify functionality unchanged",
        ],
        TaskType::Debugging => &[
            "Reproduce the issue",
            "Analyze error logs and stack traces",
            "Identify root cause",
            "Implement fix",
            "Test fix thoroughly",
            "Add regression tests",
        ],
        TaskType::Testing => &[
            "Analyze testing requirements",
            "Set up test environment",
            "Write test cases",
            "Execute tests and analyze results",
            "Update test documentation",
        ],
        TaskType::Generic => &[],
    }
}

/// Derives task plans from goal descriptions and codebase analyses.
pub struct TaskPlanner<C: Clock, G: IdGen> {
    clock: C,
    id_gen: G,
    config: PlannerConfig,
    status: Arc<StatusManager<C>>,
    plans: Mutex<HashMap<PlanId, TaskPlan>>,
}

impl<C: Clock, G: IdGen> TaskPlanner<C, G> {
    pub fn new(clock: C, id_gen: G, status: Arc<StatusManager<C>>) -> Self {
        Self {
            clock,
            id_gen,
            config: PlannerConfig::default(),
            status,
            plans: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn status_manager(&self) -> Arc<StatusManager<C>> {
        Arc::clone(&self.status)
    }

    /// Create a plan from a goal description and an analysis snapshot.
    pub fn create_plan(
        &self,
        description: &str,
        analysis: &Analysis,
        workspace_path: &Path,
    ) -> Result<TaskPlan, PlannerError> {
        if description.trim().is_empty() {
            return Err(PlannerError::InvalidPlan(
                "empty task description".to_string(),
            ));
        }

        let context = CodebaseContext {
            workspace_path: workspace_path.to_path_buf(),
            languages: analysis.languages.clone(),
            frameworks: analysis.frameworks.clone(),
            lines_of_code: analysis.metrics.lines_of_code,
            summary: analysis.summary.clone(),
        };

        let task_type = self.classify(description);
        let complexity = self.estimate_complexity(description, &context);
        let tasks = self.decompose(description, &context, task_type);
        let (mut ordered, cycle) = resolve_dependencies(tasks);

        for task in &mut ordered {
            task.estimated_duration_min = Some(self.estimate_duration(task, &context));
        }
        let total_estimate: u64 = ordered
            .iter()
            .map(|t| t.estimated_duration_min.unwrap_or(0) as u64)
            .sum();

        let mut plan = TaskPlan::new(
            PlanId::new(self.id_gen.next()),
            description,
            self.clock.epoch_ms(),
        );
        plan.tasks = ordered;
        plan.context = context;
        plan.metadata
            .insert("task_type".to_string(), task_type.to_string());
        plan.metadata
            .insert("complexity".to_string(), complexity.to_string());
        plan.metadata.insert(
            "estimated_total_duration".to_string(),
            total_estimate.to_string(),
        );
        if cycle {
            plan.metadata
                .insert("invalid".to_string(), "circular_dependencies".to_string());
        }

        tracing::info!(
            plan = %plan.id,
            tasks = plan.tasks.len(),
            task_type = %task_type,
            %complexity,
            "plan created"
        );

        self.status.register_plan(&plan);
        self.plans.lock().insert(plan.id.clone(), plan.clone());
        Ok(plan)
    }

    /// Stored plan by id.
    pub fn plan(&self, id: &PlanId) -> Option<TaskPlan> {
        self.plans.lock().get(id).cloned()
    }

    /// Store back a mutated plan (e.g. after execution or approval).
    pub fn store_plan(&self, plan: TaskPlan) {
        self.plans.lock().insert(plan.id.clone(), plan);
    }

    pub fn plans(&self) -> Vec<TaskPlan> {
        let mut plans: Vec<TaskPlan> = self.plans.lock().values().cloned().collect();
        plans.sort_by(|a, b| a.created_at_ms.cmp(&b.created_at_ms));
        plans
    }

    fn classify(&self, description: &str) -> TaskType {
        let desc = description.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| desc.contains(p));
        if matches(IMPLEMENTATION_PATTERNS) {
            TaskType::Implementation
        } else if matches(REFACTORING_PATTERNS) {
            TaskType::Refactoring
        } else if matches(DEBUGGING_PATTERNS) {
            TaskType::Debugging
        } else if matches(TESTING_PATTERNS) {
            TaskType::Testing
        } else {
            TaskType::Generic
        }
    }

    fn estimate_complexity(&self, description: &str, context: &CodebaseContext) -> Complexity {
        let desc = description.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|p| desc.contains(p));
        if matches(HIGH_COMPLEXITY) {
            return Complexity::High;
        }
        if matches(MEDIUM_COMPLEXITY) {
            return Complexity::Medium;
        }
        if matches(LOW_COMPLEXITY) {
            return Complexity::Low;
        }
        if context.lines_of_code > 50_000 {
            Complexity::High
        } else if context.lines_of_code > 10_000 {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }

    fn decompose(
        &self,
        description: &str,
        context: &CodebaseContext,
        task_type: TaskType,
    ) -> Vec<Task> {
        let language_tasks = self.language_specific_tasks(description, context);
        if !language_tasks.is_empty() {
            return language_tasks;
        }

        let template = generic_template(task_type);
        if template.is_empty() {
            return vec![Task::new(TaskId::new(self.id_gen.next()), description)];
        }

        let mut tasks: Vec<Task> = Vec::with_capacity(template.len());
        for (order, step) in template.iter().enumerate() {
            let enhanced = enhance_description(step, description, context);
            let mut task = Task::new(TaskId::new(self.id_gen.next()), enhanced)
                .with_metadata("template_type", task_type.to_string())
                .with_metadata("order", order.to_string());
            if let Some(previous) = tasks.last() {
                task.dependencies.push(previous.id.clone());
            }
            tasks.push(task);
        }
        tasks
    }

    fn language_specific_tasks(&self, description: &str, context: &CodebaseContext) -> Vec<Task> {
        let desc = description.to_lowercase();
        let matches = |patterns: &[&str]| patterns.iter().any(|k| desc.contains(k));

        if matches(WORKFLOW_KEYWORDS) {
            return self.full_workflow_tasks(description, context);
        }
        if matches(SETUP_KEYWORDS) {
            return self.phase_tasks(description, context, Phase::Setup);
        }
        if matches(TEST_KEYWORDS) {
            return self.phase_tasks(description, context, Phase::Test);
        }
        if matches(BUILD_KEYWORDS) {
            return self.phase_tasks(description, context, Phase::Build);
        }
        Vec::new()
    }

    fn phase_tasks(
        &self,
        description: &str,
        context: &CodebaseContext,
        phase: Phase,
    ) -> Vec<Task> {
        let mut tasks = Vec::new();
        for language in &context.languages {
            let Some(template) = language_template(language) else {
                continue;
            };
            let steps = match phase {
                Phase::Setup => template.setup,
                Phase::Test => template.test,
                Phase::Build => template.build,
            };
            for step in steps {
                tasks.push(
                    Task::new(
                        TaskId::new(self.id_gen.next()),
                        format!("[{}] {}", language.to_uppercase(), step),
                    )
                    .with_metadata("language", language.clone())
                    .with_metadata("task_type", phase.to_string())
                    .with_metadata("original_description", description.to_string()),
                );
            }
        }

        if phase == Phase::Setup {
            for step in framework_setup_tasks(&context.frameworks) {
                tasks.push(
                    Task::new(TaskId::new(self.id_gen.next()), step)
                        .with_metadata("task_type", "framework_setup".to_string())
                        .with_metadata("original_description", description.to_string()),
                );
            }
        }
        tasks
    }

    /// Setup -> test -> build across every detected language, with
    /// inter-phase dependencies.
    fn full_workflow_tasks(&self, description: &str, context: &CodebaseContext) -> Vec<Task> {
        let setup = self.phase_tasks(description, context, Phase::Setup);
        let mut test = self.phase_tasks(description, context, Phase::Test);
        let mut build = self.phase_tasks(description, context, Phase::Build);

        let setup_ids: Vec<TaskId> = setup.iter().map(|t| t.id.clone()).collect();
        let test_ids: Vec<TaskId> = test.iter().map(|t| t.id.clone()).collect();

        for task in &mut test {
            task.dependencies.extend(setup_ids.iter().cloned());
        }
        let build_deps = if test_ids.is_empty() { &setup_ids } else { &test_ids };
        for task in &mut build {
            task.dependencies.extend(build_deps.iter().cloned());
        }

        let mut tasks = setup;
        tasks.extend(test);
        tasks.extend(build);

        if let Some(cap) = self.config.max_workflow_tasks {
            if tasks.len() > cap {
                tracing::warn!(
                    generated = tasks.len(),
                    cap,
                    "workflow decomposition capped"
                );
                let kept: BTreeSet<TaskId> =
                    tasks.iter().take(cap).map(|t| t.id.clone()).collect();
                tasks.truncate(cap);
                for task in &mut tasks {
                    task.dependencies.retain(|d| kept.contains(d));
                }
            }
        }
        tasks
    }

    /// Break a task into linearly chained subtasks by keyword, adding
    /// testing and documentation follow-ups for implementation work.
    pub fn break_down_task(&self, task: &Task, _context: &CodebaseContext) -> Vec<Subtask> {
        let desc = task.description.to_lowercase();
        let base = task.id.as_str();

        let steps: &[(&str, &str)] = if desc.contains("implement") || desc.contains("create") {
            &[
                ("analysis", "Analyze requirements and design approach"),
                ("setup", "Set up necessary infrastructure and dependencies"),
                ("core", "Implement core functionality"),
                ("validation", "Add error handling and validation"),
            ]
        } else if desc.contains("refactor") || desc.contains("modify") {
            &[
                ("analyze", "Analyze current implementation"),
                ("plan", "Create refactoring plan"),
                ("refactor", "Implement refactoring changes"),
            ]
        } else if desc.contains("fix") || desc.contains("debug") {
            &[
                ("reproduce", "Reproduce the issue"),
                ("diagnose", "Analyze and identify root cause"),
                ("fix", "Implement fix"),
            ]
        } else if desc.contains("test") {
            &[
                ("test_plan", "Analyze testing requirements and create test plan"),
                ("test_impl", "Implement test cases"),
            ]
        } else {
            &[
                ("prepare", "Prepare and analyze task requirements"),
                ("execute", "Execute main task implementation"),
            ]
        };

        let mut subtasks: Vec<Subtask> = Vec::with_capacity(steps.len() + 2);
        for (suffix, step) in steps {
            let mut subtask = Subtask::new(format!("{}_{}", base, suffix), *step);
            if let Some(previous) = subtasks.last() {
                subtask.dependencies.push(previous.id.clone());
            }
            subtasks.push(subtask);
        }

        let is_implementation = desc.contains("implement") || desc.contains("create");
        if is_implementation && !desc.contains("test") {
            let dep = subtasks
                .last()
                .map(|s| s.id.clone())
                .unwrap_or_else(|| task.id.clone());
            subtasks.push(
                Subtask::new(
                    format!("{}_testing", base),
                    format!("Write tests for: {}", task.description),
                )
                .with_dependency(dep),
            );
        }
        if is_implementation {
            let dep = subtasks
                .last()
                .map(|s| s.id.clone())
                .unwrap_or_else(|| task.id.clone());
            subtasks.push(
                Subtask::new(
                    format!("{}_docs", base),
                    format!("Update documentation for: {}", task.description),
                )
                .with_dependency(dep),
            );
        }

        subtasks
    }

    /// Estimate a task's duration in minutes.
    pub fn estimate_duration(&self, task: &Task, context: &CodebaseContext) -> u32 {
        let desc = task.description.to_lowercase();
        let mut duration = 30.0f64;

        if ["implement", "create", "build"].iter().any(|k| desc.contains(k)) {
            duration *= 2.0;
        } else if ["refactor", "restructure"].iter().any(|k| desc.contains(k)) {
            duration *= 1.8;
        } else if ["fix", "debug", "resolve"].iter().any(|k| desc.contains(k)) {
            duration *= 1.5;
        } else if ["test", "validate"].iter().any(|k| desc.contains(k)) {
            duration *= 1.2;
        }

        if context.lines_of_code > 50_000 {
            duration *= 2.0;
        } else if context.lines_of_code > 10_000 {
            duration *= 1.5;
        }

        if context
            .frameworks
            .iter()
            .any(|f| COMPLEX_FRAMEWORKS.contains(&f.as_str()))
        {
            duration *= 1.3;
        }
        if context
            .languages
            .iter()
            .any(|l| COMPLEX_LANGUAGES.contains(&l.as_str()))
        {
            duration *= 1.4;
        }

        let floor = 15 * task.subtasks.len() as u32;
        (duration as u32).max(floor)
    }

    /// Validate plan structure: non-empty, unique ids, resolvable acyclic
    /// dependencies at both task and subtask level.
    pub fn validate_plan(&self, plan: &TaskPlan) -> Result<(), PlannerError> {
        if plan.tasks.is_empty() {
            return Err(PlannerError::InvalidPlan("plan has no tasks".to_string()));
        }
        if plan.metadata.contains_key("invalid") {
            return Err(PlannerError::InvalidPlan(
                "plan was flagged invalid at creation".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for task in &plan.tasks {
            if !seen.insert(task.id.clone()) {
                return Err(PlannerError::InvalidPlan(format!(
                    "duplicate task id: {}",
                    task.id
                )));
            }
            let mut sub_seen = BTreeSet::new();
            for subtask in &task.subtasks {
                if !sub_seen.insert(subtask.id.clone()) {
                    return Err(PlannerError::InvalidPlan(format!(
                        "duplicate subtask id: {}",
                        subtask.id
                    )));
                }
            }
        }

        for task in &plan.tasks {
            for dep in &task.dependencies {
                if !seen.contains(dep) {
                    return Err(PlannerError::InvalidPlan(format!(
                        "task {} depends on unknown task {}",
                        task.id, dep
                    )));
                }
            }
            let sibling_ids: BTreeSet<&TaskId> = task.subtasks.iter().map(|s| &s.id).collect();
            for subtask in &task.subtasks {
                for dep in &subtask.dependencies {
                    if !sibling_ids.contains(dep) && dep != &task.id {
                        return Err(PlannerError::InvalidPlan(format!(
                            "subtask {} depends on unknown sibling {}",
                            subtask.id, dep
                        )));
                    }
                }
            }
        }

        let (_, cycle) = resolve_dependencies(plan.tasks.clone());
        if cycle {
            return Err(PlannerError::InvalidPlan(
                "circular task dependencies".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Setup,
    Test,
    Build,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => write!(f, "setup"),
            Phase::Test => write!(f, "testing"),
            Phase::Build => write!(f, "build"),
        }
    }
}

/// Append language-specific command hints to generic template steps.
fn enhance_description(step: &str, original: &str, context: &CodebaseContext) -> String {
    let step_lower = step.to_lowercase();

    if step_lower.contains("dependencies") && !context.languages.is_empty() {
        let examples: Vec<&str> = context
            .languages
            .iter()
            .take(2)
            .filter_map(|lang| match lang.as_str() {
                "python" => Some("pip install -r requirements.txt"),
                "javascript" => Some("npm install"),
                "java" => Some("mvn dependency:resolve"),
                "rust" => Some("cargo build"),
                _ => None,
            })
            .collect();
        if !examples.is_empty() {
            return format!("{} ({})", step, examples.join(", "));
        }
    }

    if step_lower.contains("test") && !context.languages.is_empty() {
        let examples: Vec<&str> = context
            .languages
            .iter()
            .take(2)
            .filter_map(|lang| match lang.as_str() {
                "python" => Some("pytest"),
                "javascript" => Some("npm test"),
                "java" => Some("mvn test"),
                "rust" => Some("cargo test"),
                _ => None,
            })
            .collect();
        if !examples.is_empty() {
            return format!("{} ({})", step, examples.join(", "));
        }
    }

    format!("{} for: {}", step, original)
}

/// Order tasks with Kahn's algorithm; ties break by declaration order.
///
/// Returns the ordered tasks and whether a cycle was found (in which case
/// the original order is kept, for the caller to flag).
pub fn resolve_dependencies(tasks: Vec<Task>) -> (Vec<Task>, bool) {
    if tasks.is_empty() {
        return (tasks, false);
    }

    let index_of: HashMap<TaskId, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.clone(), i))
        .collect();

    let mut in_degree = vec![0usize; tasks.len()];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (index, task) in tasks.iter().enumerate() {
        for dep in &task.dependencies {
            if let Some(&dep_index) = index_of.get(dep) {
                outgoing[dep_index].push(index);
                in_degree[index] += 1;
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..tasks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order: Vec<usize> = Vec::with_capacity(tasks.len());
    while let Some(index) = ready.pop_front() {
        order.push(index);
        for &next in &outgoing[index] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push_back(next);
            }
        }
    }

    if order.len() != tasks.len() {
        return (tasks, true);
    }

    let mut by_index: HashMap<usize, Task> =
        tasks.into_iter().enumerate().collect();
    let ordered = order
        .into_iter()
        .filter_map(|i| by_index.remove(&i))
        .collect();
    (ordered, false)
}

#[cfg(test)]
#[path = "planner_tests.rs"]
mod tests;
