pub mod brand;
pub mod topic;

pub use brand::BrandTracker;
pub use topic::{AggregateReport, TopicAggregator};
