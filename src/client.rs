use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response};

use crate::config::ServicesConfig;
use crate::error::FetchError;

pub type Limiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

pub fn build_http_client(services: &ServicesConfig) -> Result<Client, FetchError> {
    let mut builder = Client::builder().user_agent(services.user_agent.clone());
    if let Some(secs) = services.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

pub fn geocode_limiter(requests_per_second: u32) -> Limiter {
    let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::direct(Quota::per_second(per_second)))
}

/// Reads the body, turning non-2xx statuses into `FetchError::Status`.
pub async fn read_body(response: Response) -> Result<String, FetchError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
