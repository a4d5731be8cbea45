pub mod amortization;
pub mod driver;
pub mod error;
pub mod generator;
pub mod lifecycle;
pub mod repository;
pub mod schedule;
pub mod summary;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use driver::SchedulerDriver;
use generator::OccurrenceGenerator;
use lifecycle::RuleLifecycleManager;
use repository::RuleRepository;

/// The engine's components wired over one repository.
pub struct RecurrenceEngine {
    pub lifecycle: RuleLifecycleManager,
    pub generator: Arc<OccurrenceGenerator>,
    pub driver: SchedulerDriver,
}

/// Returns a default pre-configured engine instance that will be used most
/// of the time: lifecycle manager, occurrence generator and scheduler
/// driver sharing the given repository.
pub fn default_engine(repo: Arc<dyn RuleRepository>) -> RecurrenceEngine {
    let generator = Arc::new(OccurrenceGenerator::new(repo.clone()));

    RecurrenceEngine {
        lifecycle: RuleLifecycleManager::new(repo.clone()),
        driver: SchedulerDriver::new(repo.clone(), generator.clone()),
        generator,
    }
}
