mod client;
mod dto;
mod errors;
mod http;
mod links;
mod memory;

pub use client::AggregationClient;
pub use dto::{
    AggregateRow, AggregationRequest, ErrorBody, ResponseEnvelope, decode_body, decode_rows,
};
pub use errors::FetchError;
pub use http::{DEFAULT_AGGREGATION_PATH, HttpAggregationClient};
pub use links::resource_list_url;
pub use memory::{
    CatalogFixture, CourseFixture, GroupFixture, MajorFixture, MemoryAggregationClient,
    TypeFixture,
};
