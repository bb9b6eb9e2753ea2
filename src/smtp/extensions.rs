use core::fmt::{self, Display};

#[derive(Clone, Copy, Debug)]
pub enum Extension {
    Size(usize),
    AuthPlain,
}

impl Display for Extension {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Self::Size(limit) => fmt.write_fmt(format_args!("SIZE {limit}")),
            Self::AuthPlain => fmt.write_str("AUTH PLAIN"),
        }
    }
}
