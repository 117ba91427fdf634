pub mod aggregate_use_case;
pub mod query_use_case;

pub use aggregate_use_case::{AggregateOutcome, AggregateUseCase, DataOrigin, SourceReport};
pub use query_use_case::{QueryResult, QueryUseCase};
