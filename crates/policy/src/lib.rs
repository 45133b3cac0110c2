//! Admission decisions for candidate links discovered during a crawl.
//! Checks run in a fixed order so rejection-counter attribution is well
//! defined: duplicate, then cross-domain, then robots, then depth.

use crawler_core::normalize::{normalize_url, same_domain};
use crawler_core::{TaskId, TaskPolicy, UrlRecord, WorkItem};
use crawler_frontier::{compute_priority, Frontier};
use crawler_robots::RobotsCache;

#[derive(Debug)]
pub enum Decision {
    RejectDuplicate,
    RejectCrossDomain,
    /// Robots rejection also persists a `robots_blocked` `UrlRecord`.
    RejectRobots(UrlRecord),
    RejectDepth,
    Admitted(WorkItem),
}

pub struct AdmissionPolicy;

impl AdmissionPolicy {
    /// Evaluate `candidate` discovered on a page at `parent_depth`, for
    /// `task_id` governed by `policy`. On admission this also performs the
    /// Frontier insertion (admit is atomic with the duplicate check).
    pub async fn evaluate(
        task_id: TaskId,
        candidate: &str,
        parent_depth: u32,
        policy: &TaskPolicy,
        frontier: &Frontier,
        robots: &RobotsCache,
    ) -> Decision {
        let Ok(normalized) = normalize_url(candidate) else {
            return Decision::RejectDuplicate;
        };

        if frontier.contains(&normalized).await {
            return Decision::RejectDuplicate;
        }

        if !policy.allow_cross_domain && !same_domain(&normalized, &policy.seed_url) {
            tracing::debug!(task_id, url = %normalized, "blocked by cross-domain policy");
            return Decision::RejectCrossDomain;
        }

        if !robots.is_allowed(&normalized, policy.respect_robots).await {
            tracing::info!(task_id, url = %normalized, "blocked by robots.txt");
            let record = UrlRecord::robots_blocked(task_id, normalized, parent_depth + 1);
            return Decision::RejectRobots(record);
        }

        let next_depth = parent_depth + 1;
        if next_depth > policy.max_depth {
            tracing::debug!(task_id, url = %normalized, next_depth, "blocked by depth limit");
            return Decision::RejectDepth;
        }

        let priority = compute_priority(policy.strategy, &normalized, next_depth);
        if !frontier.admit(normalized.clone(), next_depth, priority).await {
            // Lost a race with a concurrent admission of the same URL.
            return Decision::RejectDuplicate;
        }

        Decision::Admitted(WorkItem {
            url: normalized,
            depth: next_depth,
            priority,
        })
    }
}
