mod analysis;
mod result;

pub use analysis::AnalysisRecord;
pub use result::{EdgeOpacity, MaturityLabel, VmsResult};
