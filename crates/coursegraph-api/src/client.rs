use crate::dto::{AggregateRow, AggregationRequest};
use crate::errors::FetchError;
use std::future::Future;

/// Read-only source of child-level counts for an ancestor filter.
///
/// Implementations return the rows in display order. A failure is reported
/// as a single error; there is no partial result.
pub trait AggregationClient {
    fn aggregate(
        &self,
        request: &AggregationRequest,
    ) -> impl Future<Output = Result<Vec<AggregateRow>, FetchError>> + Send;
}
