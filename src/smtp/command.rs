use core::fmt::{self, Display, Formatter};

#[derive(PartialEq, PartialOrd, Eq, Hash, Debug)]
pub enum HeloVariant {
    Ehlo(String),
    Helo(String),
}

impl Display for HeloVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ehlo(_) => "EHLO",
            Self::Helo(_) => "HELO",
        })
    }
}

/// A single SMTP command line.
///
/// Envelope addresses are carried as the raw path text the client sent:
/// a plain `<path>` wrapper is stripped, anything unusual (display names,
/// missing brackets) is preserved verbatim so downstream checks can see it.
#[derive(Eq, PartialEq, Debug)]
pub enum Command {
    Helo(HeloVariant),
    MailFrom(String),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Auth(String),
    Quit,
    Invalid(String),
}

impl Command {
    #[must_use]
    pub fn inner(&self) -> String {
        match self {
            Self::MailFrom(from) => from.clone(),
            Self::RcptTo(to) => to.clone(),
            Self::Invalid(command) => command.clone(),
            Self::Helo(HeloVariant::Ehlo(id) | HeloVariant::Helo(id)) => id.clone(),
            Self::Auth(mechanism) => mechanism.clone(),
            _ => String::default(),
        }
    }
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(v) => fmt.write_fmt(format_args!("{} {}", v, self.inner())),
            Self::MailFrom(from) => fmt.write_fmt(format_args!("MAIL FROM:{from}")),
            Self::RcptTo(to) => fmt.write_fmt(format_args!("RCPT TO:{to}")),
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Auth(_) => fmt.write_str("AUTH"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(s) => fmt.write_str(s),
        }
    }
}

/// Extract the path from an envelope argument, stripping a simple `<path>`
/// wrapper. Arguments with whitespace (header-style addresses with display
/// names) are kept as-is.
fn parse_path(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.starts_with('<') && raw.ends_with('>') && !raw.contains(char::is_whitespace) {
        Some(raw[1..raw.len() - 1].to_string())
    } else {
        Some(raw.to_string())
    }
}

impl TryFrom<&str> for Command {
    type Error = Self;

    fn try_from(command: &str) -> Result<Self, Self::Error> {
        let trimmed = command.trim();

        if trimmed.len() >= 10 && trimmed[..10].eq_ignore_ascii_case("MAIL FROM:") {
            parse_path(&trimmed[10..]).map_or_else(
                || Err(Self::Invalid(command.to_owned())),
                |from| Ok(Self::MailFrom(from)),
            )
        } else if trimmed.len() >= 8 && trimmed[..8].eq_ignore_ascii_case("RCPT TO:") {
            parse_path(&trimmed[8..]).map_or_else(
                || Err(Self::Invalid(command.to_owned())),
                |to| Ok(Self::RcptTo(to)),
            )
        } else if trimmed.len() >= 4 {
            let prefix = &trimmed[..4];
            if prefix.eq_ignore_ascii_case("EHLO") || prefix.eq_ignore_ascii_case("HELO") {
                match trimmed.split_once(' ') {
                    None => Err(Self::Invalid(format!("Expected hostname in {trimmed}"))),
                    Some((cmd, host)) if cmd.eq_ignore_ascii_case("HELO") => {
                        Ok(Self::Helo(HeloVariant::Helo(host.trim().to_string())))
                    }
                    Some((_, host)) => Ok(Self::Helo(HeloVariant::Ehlo(host.trim().to_string()))),
                }
            } else if trimmed.eq_ignore_ascii_case("DATA") {
                Ok(Self::Data)
            } else if trimmed.eq_ignore_ascii_case("RSET") {
                Ok(Self::Rset)
            } else if trimmed.eq_ignore_ascii_case("NOOP") {
                Ok(Self::Noop)
            } else if trimmed.eq_ignore_ascii_case("QUIT") {
                Ok(Self::Quit)
            } else if prefix.eq_ignore_ascii_case("AUTH") {
                Ok(Self::Auth(trimmed[4..].trim().to_string()))
            } else {
                Err(Self::Invalid(command.to_owned()))
            }
        } else {
            Err(Self::Invalid(command.to_owned()))
        }
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = Self;

    fn try_from(command: &[u8]) -> Result<Self, Self::Error> {
        std::str::from_utf8(command).map_or(
            Err(Self::Invalid("Unable to interpret command".to_string())),
            Self::try_from,
        )
    }
}
