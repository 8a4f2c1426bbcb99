mod client;
mod dispatcher;
mod dto;
mod entity;
mod error;
mod link;
mod listener;
mod number;
mod platform;
mod sensor;
// Private module - allowed by clippy.toml allow-private-module-inception
#[allow(clippy::module_inception)]
mod bang_olufsen;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
pub use bang_olufsen::BangOlufsenDevice;
pub use bang_olufsen::BangOlufsenIntegration;
use linkme::distributed_slice;

use crate::engine;

/// Integration domain, also the namespace of device identifiers
pub const DOMAIN: &str = "bang_olufsen";

#[distributed_slice(engine::INTEGRATION_REGISTRY)]
fn init_bang_olufsen(ctx: &engine::IntegrationContext) -> engine::IntegrationFactoryResult {
    let configured = &ctx.config.integrations.bang_olufsen;
    if configured.is_empty() {
        return Ok(None);
    }

    let mut devices = Vec::with_capacity(configured.len());
    for (entry, config) in configured {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = client::HttpMozartClient::new(&config.host, timeout)
            .with_context(|| format!("Failed to create Mozart client for {}", entry))?;

        devices.push(BangOlufsenDevice {
            config: config.clone(),
            client: Arc::new(client),
            listener: Some(listener::WebSocketListener::new(config)),
        });
    }

    Ok(Some(Box::new(BangOlufsenIntegration::new(
        DOMAIN.to_string(),
        devices,
    ))))
}

#[cfg(test)]
pub(crate) fn test_device_config() -> crate::config::BangOlufsenDeviceConfig {
    crate::config::BangOlufsenDeviceConfig {
        host: "192.0.2.10".to_string(),
        serial: "1234".to_string(),
        name: "Kitchen".to_string(),
        model: Some("Beosound A1 2nd Gen".to_string()),
        battery: false,
        websocket_port: 9339,
        reconnect_interval_secs: 10,
        request_timeout_secs: 10,
    }
}
