//! RFC 5322 / MIME decoding of one received message.

use mailparse::{body::Body, parse_mail, MailHeaderMap, ParsedMail};

use crate::relay::error::{MultipartError, RelayError};

/// The deliverable pieces of one parsed message. Lives only for the DATA
/// call that produced it.
#[derive(Debug)]
pub struct DecodedMessage {
    /// RFC 2047 decoded subject. Malformed encoded words fall back to the
    /// raw header value.
    pub subject: String,
    /// Raw `From` header value.
    pub from: String,
    /// Raw `Content-Type` header value.
    pub content_type: String,
    /// Body bytes, verbatim: transfer encoding is the provider's problem.
    pub body: Vec<u8>,
}

/// Text and html candidates extracted from a multipart body.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MimeParts {
    pub text: Option<String>,
    pub html: Option<String>,
}

/// Parse the raw DATA bytes into headers and body.
///
/// # Errors
///
/// A message that does not parse as RFC 5322 fails the transaction; there
/// is no partial delivery.
pub fn decode(raw: &[u8]) -> Result<DecodedMessage, RelayError> {
    let parsed = parse_mail(raw)?;

    let subject = parsed.headers.get_first_value("Subject").unwrap_or_default();
    let from = parsed.headers.get_first_value("From").unwrap_or_default();
    let content_type = parsed
        .headers
        .get_first_value("Content-Type")
        .unwrap_or_default();

    tracing::debug!("Subject: {subject}");
    tracing::debug!("From header: {from}");
    tracing::debug!("Content-Type: {content_type}");

    Ok(DecodedMessage {
        subject,
        from,
        content_type,
        body: raw_body(&parsed),
    })
}

fn raw_body(parsed: &ParsedMail<'_>) -> Vec<u8> {
    match parsed.get_body_encoded() {
        Body::Base64(body) | Body::QuotedPrintable(body) => body.get_raw().to_vec(),
        Body::SevenBit(body) | Body::EightBit(body) => body.get_raw().to_vec(),
        Body::Binary(body) => body.get_raw().to_vec(),
    }
}

/// Walk a multipart message and pick out its `text/plain` and `text/html`
/// parts. When a part type occurs more than once, the last occurrence wins.
/// Parts that fail to read are skipped.
///
/// # Errors
///
/// Fails when the message is not multipart, has no boundary parameter, or
/// contains neither a text nor an html part. The caller decides whether
/// that is fatal.
pub fn multipart_candidates(raw: &[u8]) -> Result<MimeParts, MultipartError> {
    let parsed = parse_mail(raw)?;

    if !parsed.ctype.mimetype.starts_with("multipart/") {
        return Err(MultipartError::NotMultipart);
    }

    if !parsed.ctype.params.contains_key("boundary") {
        return Err(MultipartError::MissingBoundary);
    }

    let mut parts = MimeParts::default();

    for part in &parsed.subparts {
        let mimetype = &part.ctype.mimetype;

        if mimetype.contains("text/plain") {
            match part.get_body() {
                Ok(body) => parts.text = Some(body),
                Err(err) => tracing::debug!("Skipping unreadable part: {err}"),
            }
        } else if mimetype.contains("text/html") {
            match part.get_body() {
                Ok(body) => parts.html = Some(body),
                Err(err) => tracing::debug!("Skipping unreadable part: {err}"),
            }
        }
    }

    if parts.text.is_none() && parts.html.is_none() {
        return Err(MultipartError::NoContent);
    }

    Ok(parts)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{decode, multipart_candidates};
    use crate::relay::error::MultipartError;

    #[test]
    fn plain_message() {
        let decoded = decode(
            b"Subject: Hi\r\nFrom: a@b.com\r\nContent-Type: text/plain\r\n\r\nhello",
        )
        .unwrap();

        assert_eq!(decoded.subject, "Hi");
        assert_eq!(decoded.from, "a@b.com");
        assert_eq!(decoded.content_type, "text/plain");
        assert_eq!(decoded.body, b"hello");
    }

    #[test]
    fn missing_headers_decode_to_empty_values() {
        let decoded = decode(b"X-Other: value\r\n\r\nbody").unwrap();

        assert_eq!(decoded.subject, "");
        assert_eq!(decoded.from, "");
        assert_eq!(decoded.content_type, "");
        assert_eq!(decoded.body, b"body");
    }

    #[test]
    fn encoded_word_subject_is_decoded() {
        let decoded =
            decode(b"Subject: =?utf-8?q?hello=20world?=\r\n\r\nbody").unwrap();

        assert_eq!(decoded.subject, "hello world");
    }

    fn multipart_fixture() -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"Subject: Hi\r\n");
        raw.extend_from_slice(b"Content-Type: multipart/alternative; boundary=\"sep\"\r\n\r\n");
        raw.extend_from_slice(b"--sep\r\nContent-Type: text/plain\r\n\r\nplain body\r\n");
        raw.extend_from_slice(b"--sep\r\nContent-Type: text/html\r\n\r\n<p>html body</p>\r\n");
        raw.extend_from_slice(b"--sep--\r\n");
        raw
    }

    #[test]
    fn multipart_text_and_html() {
        let parts = multipart_candidates(&multipart_fixture()).unwrap();

        assert_eq!(parts.text.unwrap().trim_end(), "plain body");
        assert_eq!(parts.html.unwrap().trim_end(), "<p>html body</p>");
    }

    #[test]
    fn last_occurrence_wins() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"Content-Type: multipart/mixed; boundary=\"sep\"\r\n\r\n");
        raw.extend_from_slice(b"--sep\r\nContent-Type: text/plain\r\n\r\nfirst\r\n");
        raw.extend_from_slice(b"--sep\r\nContent-Type: text/plain\r\n\r\nsecond\r\n");
        raw.extend_from_slice(b"--sep--\r\n");

        let parts = multipart_candidates(&raw).unwrap();
        assert_eq!(parts.text.unwrap().trim_end(), "second");
        assert_eq!(parts.html, None);
    }

    #[test]
    fn missing_boundary_is_an_error() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\nwhatever";

        assert!(matches!(
            multipart_candidates(raw),
            Err(MultipartError::MissingBoundary)
        ));
    }

    #[test]
    fn non_multipart_is_an_error() {
        let raw = b"Content-Type: text/plain\r\n\r\nhello";

        assert!(matches!(
            multipart_candidates(raw),
            Err(MultipartError::NotMultipart)
        ));
    }

    #[test]
    fn no_text_or_html_content() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"Content-Type: multipart/mixed; boundary=\"sep\"\r\n\r\n");
        raw.extend_from_slice(b"--sep\r\nContent-Type: application/json\r\n\r\n{}\r\n");
        raw.extend_from_slice(b"--sep--\r\n");

        assert!(matches!(
            multipart_candidates(&raw),
            Err(MultipartError::NoContent)
        ));
    }
}
