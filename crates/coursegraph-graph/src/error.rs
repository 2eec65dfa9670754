use coursegraph_api::FetchError;
use coursegraph_core::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavigatorError {
    #[error("node {0} is not part of the graph")]
    UnknownNode(NodeId),
    #[error("failed to load resource groups: {0}")]
    RootLoad(#[source] FetchError),
    #[error("graph has not been loaded yet")]
    NotLoaded,
    #[error("node {0} has no surviving parent")]
    Orphan(NodeId),
}
