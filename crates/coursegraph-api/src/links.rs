use coursegraph_core::ResourceQuery;
use reqwest::Url;

/// Build the resource-list link for `query` on top of `base`, replacing any
/// query string `base` already carries.
pub fn resource_list_url(base: &Url, query: &ResourceQuery) -> Url {
    let mut url = base.clone();
    if query.is_empty() {
        url.set_query(None);
        return url;
    }

    url.query_pairs_mut()
        .clear()
        .extend_pairs(query.to_query_pairs());
    url
}
