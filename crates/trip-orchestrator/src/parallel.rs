//! Parallel orchestration: coarse task grouping and the fan-out variant of
//! the orchestrator.
//!
//! Grouping is deliberately imprecise keyword binning; the planner is
//! trusted to embed enough context (e.g. the destination) in each task
//! description for groups to run independently.

use crate::node::NodeServices;
use crate::orchestrator::{Orchestrator, PlannedTask};
use genai_client::LanguageModel;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskCategory {
    Flights,
    Hotels,
    Cars,
    Other,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::Flights => "flights",
            TaskCategory::Hotels => "hotels",
            TaskCategory::Cars => "cars",
            TaskCategory::Other => "other",
        }
    }

    fn of(description: &str) -> Self {
        let lowered = description.to_lowercase();
        if lowered.contains("flight") {
            TaskCategory::Flights
        } else if lowered.contains("hotel") {
            TaskCategory::Hotels
        } else if lowered.contains("car") || lowered.contains("rent") {
            TaskCategory::Cars
        } else {
            TaskCategory::Other
        }
    }
}

/// Bin planned tasks into coarse resource groups by keyword match.
///
/// Every category is present in the result (possibly empty); values are
/// indices into `tasks`, preserving plan order.
pub fn analyze_task_dependencies(tasks: &[PlannedTask]) -> BTreeMap<TaskCategory, Vec<usize>> {
    let mut groups: BTreeMap<TaskCategory, Vec<usize>> = [
        TaskCategory::Flights,
        TaskCategory::Hotels,
        TaskCategory::Cars,
        TaskCategory::Other,
    ]
    .into_iter()
    .map(|category| (category, Vec::new()))
    .collect();

    for (index, task) in tasks.iter().enumerate() {
        let category = TaskCategory::of(&task.description);
        groups.entry(category).or_default().push(index);
    }
    groups
}

/// Orchestrator variant that fans planner tasks out into sibling groups and
/// executes levels meeting the threshold concurrently. Every phase other
/// than expansion is shared with the sequential orchestrator.
pub fn parallel_orchestrator(
    services: NodeServices,
    llm: Arc<dyn LanguageModel>,
    parallel_threshold: usize,
) -> Orchestrator {
    Orchestrator::with_options(
        services,
        llm,
        true,
        parallel_threshold,
        "Parallel Orchestrator Agent",
    )
}
