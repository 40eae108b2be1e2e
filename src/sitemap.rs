//! Sitemap submission — pings search engines with the public sitemap URL.
//! The scheduler treats this as an opaque job; only the returned error
//! matters to it.

use anyhow::{Result, bail};
use sitepulse_core::SitemapConfig;

/// Ping endpoints enabled by the config, as (engine, endpoint) pairs.
pub fn ping_endpoints(config: &SitemapConfig) -> Vec<(&'static str, &'static str)> {
    let mut endpoints = Vec::new();
    if config.ping_google {
        endpoints.push(("google", "https://www.google.com/ping"));
    }
    if config.ping_bing {
        endpoints.push(("bing", "https://www.bing.com/ping"));
    }
    endpoints
}

/// Submit the sitemap to every configured engine.
/// Fails only when no engine accepted the ping, so one flaky engine does not
/// mark the whole attempt failed.
pub async fn submit_sitemap(client: &reqwest::Client, config: &SitemapConfig) -> Result<()> {
    let targets = ping_endpoints(config);
    if targets.is_empty() {
        tracing::warn!("⚠️ No search engines configured for sitemap submission");
        return Ok(());
    }

    let sitemap_url = config.sitemap_url();
    tracing::info!("🗺️ Submitting sitemap {sitemap_url}");

    let mut accepted = 0;
    for (engine, endpoint) in &targets {
        let result = client
            .get(*endpoint)
            .query(&[("sitemap", sitemap_url.as_str())])
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("✅ Sitemap accepted by {engine}");
                accepted += 1;
            }
            Ok(resp) => {
                tracing::warn!("⚠️ {engine} rejected sitemap ping: {}", resp.status());
            }
            Err(e) => {
                tracing::warn!("⚠️ {engine} ping failed: {e}");
            }
        }
    }

    if accepted == 0 {
        bail!("sitemap ping rejected by all {} engines", targets.len());
    }
    Ok(())
}
