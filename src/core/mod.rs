pub mod danger;
pub mod drivers;
pub mod normalizer;
pub mod stance;

pub use danger::{DangerWindow, DangerWindowCalculator};
pub use drivers::top_drivers;
pub use normalizer::normalize;
pub use stance::{KeywordTables, ReleaseCategory, StanceClassifier};
