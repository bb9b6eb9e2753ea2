pub mod command;
pub mod connection;
pub mod context;
pub mod envelope;
pub mod extensions;
pub mod handler;
pub mod session;
pub mod status;

use core::fmt::{self, Display, Formatter};

use self::{
    command::{Command, HeloVariant},
    context::ValidationContext,
};

/// Protocol state of one SMTP session.
///
/// `MailFrom` and `RcptTo` carry the raw address of the command that moved
/// the session into them; the transaction handler decides whether it enters
/// the envelope.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Default)]
pub enum State {
    #[default]
    Connect,
    Ehlo,
    Helo,
    MailFrom(String),
    RcptTo(String),
    Data,
    Reading,
    PostDot,
    Quit,
    InvalidCommandSequence,
    Reject,
    Close,
}

impl State {
    /// The state a session idles in between transactions: greeted but with
    /// no envelope in progress.
    pub(crate) fn idle_for(ctx: &ValidationContext) -> Self {
        if ctx.id.is_empty() {
            Self::Connect
        } else if ctx.extended {
            Self::Ehlo
        } else {
            Self::Helo
        }
    }

    pub(crate) fn transition(self, command: Command, ctx: &mut ValidationContext) -> Self {
        match (self, command) {
            (Self::Connect, Command::Helo(HeloVariant::Ehlo(id))) => {
                ctx.id = id;
                ctx.extended = true;
                Self::Ehlo
            }
            (Self::Connect, Command::Helo(HeloVariant::Helo(id))) => {
                ctx.id = id;
                ctx.extended = false;
                Self::Helo
            }
            (Self::Ehlo | Self::Helo, Command::MailFrom(from)) => Self::MailFrom(from),
            (Self::MailFrom(_) | Self::RcptTo(_), Command::RcptTo(to)) => Self::RcptTo(to),
            (Self::RcptTo(_), Command::Data) => Self::Data,
            (_, Command::Quit) => Self::Quit,
            _ => Self::InvalidCommandSequence,
        }
    }
}

impl Display for State {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        fmt.write_str(match self {
            Self::Reading | Self::PostDot => "",
            Self::Connect => "Connect",
            Self::Close => "Close",
            Self::Ehlo => "EHLO",
            Self::Helo => "HELO",
            Self::MailFrom(_) => "MAIL",
            Self::RcptTo(_) => "RCPT",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
            Self::InvalidCommandSequence => "Invalid Command Sequence",
            Self::Reject => "Rejected",
        })
    }
}
