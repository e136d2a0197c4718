pub mod achievement;
pub mod lifecycle;
pub mod period;
pub mod quality;

pub use period::Period;
pub use quality::{QualityContext, QualityReport, Severity};
