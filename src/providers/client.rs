use std::sync::LazyLock;
use std::time::Duration;

/// Global HTTP client instance shared by all push providers.
///
/// Initialized lazily on first access and reused for connection pooling
/// and DNS caching. Per-send deadlines are enforced by the provider
/// manager with `tokio::time::timeout`; the client-level timeout is a
/// backstop.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        // Timeouts
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        // Connection pooling
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        // HTTP/2 settings
        .http2_adaptive_window(true)
        .http2_keep_alive_interval(Duration::from_secs(10))
        .http2_keep_alive_timeout(Duration::from_secs(20))
        // Compression
        .gzip(true)
        .deflate(true)
        .use_rustls_tls()
        .user_agent(concat!("courier-rs/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to build HTTP client")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_initialization() {
        // Access the client to ensure it initializes without panicking
        let _ = &*HTTP_CLIENT;
    }
}
