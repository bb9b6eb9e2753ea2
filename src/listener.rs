use std::sync::Arc;

use futures_util::future::join_all;
use tokio::net::TcpListener;

use crate::{
    config::RelayConfig,
    controller::Signal,
    internal,
    provider::DeliveryClient,
    smtp::session::Session,
};

/// Accepts SMTP connections and runs one session task per connection.
pub struct Listener {
    config: Arc<RelayConfig>,
    client: Arc<dyn DeliveryClient>,
}

impl Listener {
    #[must_use]
    pub fn new(config: Arc<RelayConfig>, client: Arc<dyn DeliveryClient>) -> Self {
        Self { config, client }
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// # Errors
    ///
    /// Fails when the socket cannot be bound or accepting fails
    /// irrecoverably.
    pub async fn serve(
        &self,
        shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        self.serve_with(listener, shutdown).await
    }

    /// Serve on an already-bound listener. Split out so tests can bind an
    /// ephemeral port and learn it first.
    pub async fn serve_with(
        &self,
        listener: TcpListener,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> anyhow::Result<()> {
        let socket = listener.local_addr()?;
        internal!(level = INFO, "Listening on {socket}");

        let mut sessions = Vec::default();

        loop {
            tokio::select! {
                sig = shutdown.recv() => {
                    if matches!(sig, Ok(Signal::Shutdown)) {
                        internal!(level = INFO, "SMTP Listener {} received shutdown signal, finishing sessions ...", socket);
                        join_all(sessions).await;
                        break;
                    }
                }

                connection = listener.accept() => {
                    let (stream, peer) = connection?;
                    tracing::debug!("Connection received from {peer}");

                    let session = Session::create(
                        stream,
                        peer,
                        Arc::clone(&self.config),
                        Arc::clone(&self.client),
                    );

                    sessions.push(tokio::spawn(async move {
                        if let Err(err) = session.run().await {
                            internal!(level = ERROR, "Session error: {err}");
                        }
                    }));
                }
            }
        }

        Ok(())
    }
}
