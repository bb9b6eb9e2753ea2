use mailbridge::{config, config::RelayConfig, controller::Controller, internal, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env()?;

    logging::init(&config.log_level);

    internal!(level = INFO, "SMTP-to-HTTP mail relay");
    internal!(level = INFO, "Listen address: {}", config.listen_addr);
    internal!(level = INFO, "Domain: {}", config.domain);
    internal!(level = INFO, "Log level: {}", config.log_level);
    if config.allowed_senders.is_empty() {
        internal!(level = INFO, "Allowed senders: all");
    } else {
        internal!(level = INFO, "Allowed senders: {:?}", config.allowed_senders);
    }
    internal!(level = INFO, "Max message size: {} bytes", config::MAX_MESSAGE_SIZE);

    Controller::new(config)?.run().await
}
