use std::collections::{HashSet, VecDeque};

use crawler_core::TaskAggregates;

const RESPONSE_TIME_WINDOW: usize = 100;

/// State mutated once per processed URL, by the single worker that owns
/// that pop.
pub struct EngineState {
    pub visited: HashSet<String>,
    pub aggregates: TaskAggregates,
    response_times: VecDeque<f64>,
}

impl EngineState {
    pub fn new(aggregates: TaskAggregates) -> Self {
        Self {
            visited: HashSet::new(),
            aggregates,
            response_times: VecDeque::with_capacity(RESPONSE_TIME_WINDOW),
        }
    }

    /// True if newly inserted (i.e. processing had not yet begun for `url`).
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    pub fn record_response_time(&mut self, seconds: f64) {
        if self.response_times.len() == RESPONSE_TIME_WINDOW {
            self.response_times.pop_front();
        }
        self.response_times.push_back(seconds);
        self.aggregates.avg_response_time =
            self.response_times.iter().sum::<f64>() / self.response_times.len() as f64;
    }

    pub fn record_completed(&mut self, bytes: u64, response_seconds: f64) {
        self.aggregates.completed_urls += 1;
        self.aggregates.total_bytes += bytes;
        self.aggregates.recompute_success_rate();
        self.record_response_time(response_seconds);
    }

    pub fn record_failed(&mut self) {
        self.aggregates.failed_urls += 1;
        self.aggregates.recompute_success_rate();
    }

    pub fn record_admitted(&mut self) {
        self.aggregates.total_urls += 1;
    }

    pub fn record_rejection(&mut self, decision: &crawler_policy::Decision) {
        match decision {
            crawler_policy::Decision::RejectDuplicate => self.aggregates.duplicate += 1,
            crawler_policy::Decision::RejectCrossDomain => {
                self.aggregates.cross_domain_blocked += 1
            }
            crawler_policy::Decision::RejectRobots(_) => self.aggregates.robots_blocked += 1,
            crawler_policy::Decision::RejectDepth => self.aggregates.depth_blocked += 1,
            crawler_policy::Decision::Admitted(_) => {}
        }
    }
}
