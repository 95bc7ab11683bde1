use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::headers::HeaderSet;
use crate::pipeline::{Enricher, RequestMetadata};

/// Enrich every request and expose the record to handlers
///
/// The [`EnrichmentRecord`](crate::pipeline::EnrichmentRecord) is inserted
/// into the request extensions before the handler runs and into the response
/// extensions afterwards. When the enricher has a recorder, the handler's
/// latency is recorded for trackable routes.
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(middleware::from_fn_with_state(enricher, enrich_request));
/// ```
pub async fn enrich_request(
    State(enricher): State<Arc<Enricher>>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let metadata = RequestMetadata {
        headers: HeaderSet::from(request.headers()),
        remote_addr: request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip()),
        path: request
            .uri()
            .path_and_query()
            .map_or_else(|| request.uri().path().to_string(), |pq| pq.to_string()),
        duration_ms: None,
    };

    let record = enricher.enrich(&metadata);
    let trackable = record.route.trackable;
    request.extensions_mut().insert(record.clone());

    let mut response = next.run(request).await;

    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    if let Some(recorder) = enricher.recorder().filter(|_| trackable) {
        recorder.record(&metadata.path, elapsed_ms);
    }

    response.extensions_mut().insert(record);
    response
}
