pub mod classifier;
pub mod delta;

pub use classifier::{classify, Category, DiagnosisResult, Expectation};
pub use delta::{compute, CountsDelta, StateDelta};
