use std::sync::{Arc, LazyLock};

use tokio::sync::broadcast;

use crate::{
    config::RelayConfig,
    error::ConfigError,
    internal,
    listener::Listener,
    provider::{DeliveryClient, HttpDeliveryClient},
};

#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
    Finalised,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let _ = tokio::signal::ctrl_c().await;
    internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

/// Owns the process-wide pieces: the configuration, the provider client and
/// the SMTP listener.
pub struct Controller {
    config: Arc<RelayConfig>,
    client: Arc<dyn DeliveryClient>,
}

impl Controller {
    /// Construct the controller and its delivery client.
    ///
    /// # Errors
    ///
    /// Fails when the provider endpoint configuration is unusable.
    pub fn new(config: RelayConfig) -> Result<Self, ConfigError> {
        let client = HttpDeliveryClient::new(&config.endpoint, &config.api_key)?;

        Ok(Self {
            config: Arc::new(config),
            client: Arc::new(client),
        })
    }

    /// Run this controller, and everything it controls.
    ///
    /// # Errors
    ///
    /// This function will return an error if the listener fails to bind or
    /// dies irrecoverably.
    pub async fn run(self) -> anyhow::Result<()> {
        internal!("Controller running");

        let listener = Listener::new(Arc::clone(&self.config), Arc::clone(&self.client));

        tokio::select! {
            result = listener.serve(SHUTDOWN_BROADCAST.subscribe()) => result?,
            _ = shutdown() => {}
        };

        internal!(level = INFO, "Shutting down...");

        Ok(())
    }
}
