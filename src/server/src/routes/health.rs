use warp::{Filter, Rejection, Reply};

#[derive(Debug, serde::Serialize)]
struct HealthResponse {
    status: String,
    timestamp: u64,
    version: String,
}

async fn health_check() -> Result<impl Reply, Rejection> {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: crate::types::now_secs(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Ok(warp::reply::json(&response))
}

pub fn routes() -> warp::filters::BoxedFilter<(impl Reply,)> {
    warp::path!("health")
        .and(warp::get())
        .and_then(|| async { health_check().await })
        .boxed()
}
