pub mod ab_evaluator;
pub mod advisor_chain;
pub mod engine;
pub mod prioritizer;
pub mod safety_validator;
pub mod scheduler;

pub use ab_evaluator::AbEvaluator;
pub use advisor_chain::AdvisorChain;
pub use engine::{CycleReport, TuningEngine};
pub use prioritizer::TestPrioritizer;
pub use safety_validator::{SafetyValidator, Verdict};
pub use scheduler::{PredictiveScheduler, ShortHorizonFeedback};
