use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    config::{self, RelayConfig},
    error::SessionError,
    incoming, internal, outgoing,
    provider::DeliveryClient,
    relay::RelayHandler,
    smtp::{
        command::Command, connection::Connection, context::ValidationContext,
        extensions::Extension, handler::TransactionHandler, status::Status, State,
    },
};

#[derive(PartialEq, Eq, Debug)]
pub enum Event {
    ConnectionClose,
    ConnectionKeepAlive,
}

#[derive(Debug, Default)]
pub struct Context {
    pub state: State,
    pub message: Vec<u8>,
    pub sent: bool,
}

pub type Response = (Option<Vec<String>>, Event);

/// One SMTP session, owning the connection and the relay handler for its
/// lifetime. A session may carry several sequential transactions.
pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    peer: SocketAddr,
    banner: Arc<str>,
    context: Context,
    extensions: Vec<Extension>,
    connection: Connection<Stream>,
    handler: RelayHandler,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Session<Stream> {
    pub(crate) fn create(
        stream: Stream,
        peer: SocketAddr,
        config: Arc<RelayConfig>,
        client: Arc<dyn DeliveryClient>,
    ) -> Self {
        let banner: Arc<str> = if config.domain.is_empty() {
            "localhost".into()
        } else {
            config.domain.as_str().into()
        };

        Self {
            peer,
            banner,
            context: Context::default(),
            extensions: vec![
                Extension::Size(config::MAX_MESSAGE_SIZE),
                Extension::AuthPlain,
            ],
            connection: Connection::new(stream),
            handler: RelayHandler::new(config, client, peer),
        }
    }

    pub(crate) async fn run(mut self) -> Result<(), SessionError> {
        internal!("Connected to {}", self.peer);

        let mut ctx = ValidationContext::default();
        let result = self.run_inner(&mut ctx).await;

        self.handler.on_logout(&mut ctx);
        internal!("Connection closed");

        result
    }

    async fn run_inner(&mut self, ctx: &mut ValidationContext) -> Result<(), SessionError> {
        loop {
            let (response, ev) = self.response(ctx).await;
            self.context.sent = true;

            for response in response.unwrap_or_default() {
                outgoing!("{response}");

                self.connection.send(&response).await.map_err(|err| {
                    internal!(level = ERROR, "{err}");
                    err
                })?;
            }

            if Event::ConnectionClose == ev {
                return Ok(());
            }

            let timeout = Duration::from_secs(config::COMMAND_TIMEOUT_SECS);
            match tokio::time::timeout(timeout, self.receive(ctx)).await {
                Ok(closed) => {
                    if closed? {
                        return Ok(());
                    }
                }
                Err(_) => {
                    tracing::warn!(
                        peer = %self.peer,
                        timeout_secs = config::COMMAND_TIMEOUT_SECS,
                        "Client connection timed out"
                    );
                    return Err(SessionError::Timeout(config::COMMAND_TIMEOUT_SECS));
                }
            }
        }
    }

    /// Generate the response(s) that should be sent back to the client
    /// depending on the session state.
    ///
    /// Handler work for a freshly entered state happens here, so a reply the
    /// handler sets always wins over the state's default reply.
    async fn response(&mut self, ctx: &mut ValidationContext) -> Response {
        if self.context.sent {
            return (None, Event::ConnectionKeepAlive);
        }

        if ctx.response.is_none() {
            self.emit(ctx).await;
        }

        if let Some((status, message)) = ctx.response.take() {
            let event = if matches!(self.context.state, State::Reject) {
                Event::ConnectionClose
            } else {
                Event::ConnectionKeepAlive
            };

            return (Some(vec![format!("{status} {message}")]), event);
        }

        if matches!(self.context.state, State::Data) {
            self.context.state = State::Reading;
            return (
                Some(vec![format!(
                    "{} End data with <CR><LF>.<CR><LF>",
                    Status::StartMailInput
                )]),
                Event::ConnectionKeepAlive,
            );
        }

        match &self.context.state {
            State::Connect => (
                Some(vec![format!("{} {}", Status::ServiceReady, self.banner)]),
                Event::ConnectionKeepAlive,
            ),
            State::Helo => (
                Some(vec![format!("{} Hello {}", Status::Ok, ctx.id)]),
                Event::ConnectionKeepAlive,
            ),
            State::Ehlo => {
                let response = vec![format!(
                    "{}{}Hello {}",
                    Status::Ok,
                    if self.extensions.is_empty() { ' ' } else { '-' },
                    ctx.id
                )];

                (
                    Some(self.extensions.iter().enumerate().fold(
                        response,
                        |mut response, (idx, extension)| {
                            response.push(format!(
                                "{}{}{}",
                                Status::Ok,
                                if idx == self.extensions.len() - 1 {
                                    ' '
                                } else {
                                    '-'
                                },
                                extension
                            ));

                            response
                        },
                    )),
                    Event::ConnectionKeepAlive,
                )
            }
            State::MailFrom(_) | State::RcptTo(_) => (
                Some(vec![format!("{} Ok", Status::Ok)]),
                Event::ConnectionKeepAlive,
            ),
            State::Quit => (
                Some(vec![format!("{} Bye", Status::GoodBye)]),
                Event::ConnectionClose,
            ),
            State::InvalidCommandSequence => (
                Some(vec![format!(
                    "{} {}",
                    Status::InvalidCommandSequence,
                    self.context.state
                )]),
                Event::ConnectionClose,
            ),
            State::Reject => (
                Some(vec![format!("{} Unavailable", Status::Unavailable)]),
                Event::ConnectionClose,
            ),
            State::Data | State::Reading | State::PostDot | State::Close => {
                (None, Event::ConnectionKeepAlive)
            }
        }
    }

    /// Run the handler callback for a freshly entered state and settle the
    /// follow-up state.
    async fn emit(&mut self, ctx: &mut ValidationContext) {
        let valid = match &self.context.state {
            State::MailFrom(from) => {
                let from = from.clone();
                self.handler.on_mail(ctx, &from).await
            }
            State::RcptTo(to) => {
                let to = to.clone();
                self.handler.on_rcpt(ctx, &to).await
            }
            State::Data => {
                // DATA is only reachable from RcptTo, but every recipient may
                // have been individually rejected.
                if ctx.envelope.recipient_count() == 0 {
                    ctx.response = Some((
                        Status::InvalidCommandSequence,
                        "no valid recipients".to_string(),
                    ));
                    false
                } else {
                    true
                }
            }
            State::PostDot => self.handler.on_data(ctx).await,
            _ => return,
        };

        if matches!(self.context.state, State::PostDot) {
            // The transaction is finished either way; the next one on this
            // connection starts clean.
            self.handler.on_reset(ctx);
            self.context.state = State::idle_for(ctx);
        } else if !valid && matches!(self.context.state, State::MailFrom(_) | State::Data) {
            self.context.state = State::idle_for(ctx);
        }
    }

    async fn receive(&mut self, ctx: &mut ValidationContext) -> Result<bool, SessionError> {
        let mut received_data = [0; 4096];

        match self.connection.receive(&mut received_data).await {
            // Consider any errors received here to be fatal
            Err(err) => {
                internal!("Error: {err}");
                Err(err.into())
            }
            Ok(0) => {
                // Reading 0 bytes means the other side has closed the
                // connection or is done writing, then so are we.
                Ok(true)
            }
            Ok(bytes_read) => {
                let received = &received_data[..bytes_read];

                if matches!(self.context.state, State::Reading) {
                    self.receive_data(received, ctx);
                } else {
                    self.receive_command(received, ctx);
                }

                Ok(false)
            }
        }
    }

    fn receive_data(&mut self, received: &[u8], ctx: &mut ValidationContext) {
        self.context.message.extend_from_slice(received);

        if self.context.message.len() > config::MAX_MESSAGE_SIZE {
            internal!(
                level = WARN,
                "Message from {} exceeds the maximum message size",
                self.peer
            );
            ctx.response = Some((
                Status::ExceededStorage,
                "message size exceeds fixed maximum message size".to_string(),
            ));
            self.context.state = State::Reject;
            self.context.sent = false;
            return;
        }

        let ended = self.context.message.ends_with(b"\r\n.\r\n")
            || self.context.message.as_slice() == b".\r\n";

        if ended {
            let mut message = std::mem::take(&mut self.context.message);
            message.truncate(message.len().saturating_sub(5));

            ctx.data = Some(message);
            self.context.state = State::PostDot;
            self.context.sent = false;
        }
    }

    fn receive_command(&mut self, received: &[u8], ctx: &mut ValidationContext) {
        let command = Command::try_from(received).map_or_else(|e| e, |c| c);

        incoming!("{command}");

        match command {
            // AUTH and NOOP reply without disturbing the transaction state
            Command::Auth(mechanism) => {
                self.handler.on_auth_plain(ctx, &mechanism);
                self.context.sent = false;
            }
            Command::Noop => {
                ctx.response = Some((Status::Ok, "Ok".to_string()));
                self.context.sent = false;
            }
            Command::Rset => {
                self.handler.on_reset(ctx);
                ctx.response = Some((Status::Ok, "Ok".to_string()));
                self.context = Context {
                    state: State::idle_for(ctx),
                    message: Vec::new(),
                    sent: false,
                };
            }
            command => {
                let message = command.inner().into_bytes();
                let state = std::mem::take(&mut self.context.state);

                self.context = Context {
                    state: state.transition(command, ctx),
                    message,
                    sent: false,
                };

                tracing::debug!("Transitioned to {:?}", self.context.state);
            }
        }
    }
}
