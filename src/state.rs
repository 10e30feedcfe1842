use std::sync::Arc;
use std::time::{Instant, SystemTime};

use chrono::FixedOffset;

use crate::db::DatabaseProxy;
use crate::services::grading::Grader;
use crate::services::scheduler::IntervalPolicy;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    db_proxy: Arc<DatabaseProxy>,
    grader: Arc<dyn Grader>,
    policy: Arc<IntervalPolicy>,
    ranking_zone: FixedOffset,
}

impl AppState {
    pub fn new(db_proxy: Arc<DatabaseProxy>, grader: Arc<dyn Grader>, ranking_zone: FixedOffset) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            db_proxy,
            grader,
            policy: Arc::new(IntervalPolicy::default()),
            ranking_zone,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db_proxy(&self) -> &DatabaseProxy {
        &self.db_proxy
    }

    pub fn grader(&self) -> &dyn Grader {
        self.grader.as_ref()
    }

    pub fn policy(&self) -> &IntervalPolicy {
        &self.policy
    }

    pub fn ranking_zone(&self) -> FixedOffset {
        self.ranking_zone
    }
}
