//! Translation of a decoded message into a provider send request.

use mailparse::MailAddr;

use crate::{
    provider::{Content, DeliveryError, EmailAddress, ProviderResponse, SendRequest},
    relay::decoder::{self, DecodedMessage},
};

/// Parse a raw address into name and address parts.
///
/// Unparseable input degrades to a best-effort record: the raw string with
/// angle brackets stripped and no display name.
pub fn parse_address(raw: &str) -> EmailAddress {
    if let Ok(addresses) = mailparse::addrparse(raw) {
        for address in addresses.iter() {
            if let MailAddr::Single(single) = address {
                return EmailAddress::new(single.display_name.clone(), single.addr.clone());
            }
        }
    }

    EmailAddress::new(
        None,
        raw.trim().trim_matches(|c| c == '<' || c == '>').to_string(),
    )
}

/// Build the outbound send request for one message.
///
/// `from` and `subject` come from the message headers; the recipient list
/// is the SMTP envelope. A recipient that fails to parse never aborts the
/// others.
pub fn build_request(
    decoded: &DecodedMessage,
    raw: &[u8],
    recipients: &[String],
) -> SendRequest {
    SendRequest {
        from: parse_address(&decoded.from),
        to: recipients
            .iter()
            .map(|recipient| parse_address(recipient))
            .collect(),
        subject: decoded.subject.clone(),
        content: resolve_content(decoded, raw),
    }
}

/// Pick the content blocks for the outbound request.
///
/// Multipart messages carry their html part first, then the plain part. A
/// multipart body that cannot be decoded for any reason is relayed whole as
/// plain text instead of failing the transaction, so the result is never
/// empty.
fn resolve_content(decoded: &DecodedMessage, raw: &[u8]) -> Vec<Content> {
    let body = String::from_utf8_lossy(&decoded.body).into_owned();

    if decoded.content_type.contains("multipart/") {
        match decoder::multipart_candidates(raw) {
            Ok(parts) => {
                let mut content = Vec::new();
                if let Some(html) = parts.html {
                    content.push(Content::html(html));
                }
                if let Some(text) = parts.text {
                    content.push(Content::plain(text));
                }
                content
            }
            Err(err) => {
                tracing::warn!("Failed to parse multipart, sending as plain text: {err}");
                vec![Content::plain(body)]
            }
        }
    } else if decoded.content_type.contains("text/html") {
        vec![Content::html(body)]
    } else {
        vec![Content::plain(body)]
    }
}

/// Interpret the provider's answer: any status below 400 is a success.
///
/// # Errors
///
/// Statuses of 400 and above fail the transaction, carrying the provider's
/// response body for diagnosis.
pub fn interpret(response: &ProviderResponse) -> Result<(), DeliveryError> {
    if response.status >= 400 {
        tracing::error!(
            "Provider returned error: status={} body={}",
            response.status,
            response.body
        );
        return Err(DeliveryError::Rejected {
            status: response.status,
            body: response.body.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::{build_request, interpret, parse_address};
    use crate::{
        provider::{DeliveryError, EmailAddress, ProviderResponse},
        relay::decoder,
    };

    #[test]
    fn structured_address() {
        assert_eq!(
            parse_address("John Doe <j@d.com>"),
            EmailAddress::new(Some("John Doe".to_string()), "j@d.com")
        );
        assert_eq!(parse_address("a@b.com"), EmailAddress::new(None, "a@b.com"));
    }

    #[test]
    fn unparseable_address_falls_back_to_the_raw_string() {
        let address = parse_address("<");
        assert_eq!(address.name, None);
        assert_eq!(address.address, "");
    }

    fn recipients(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn plain_text_message_yields_one_plain_block() {
        let raw = b"Subject: Hi\r\nFrom: a@b.com\r\nContent-Type: text/plain\r\n\r\nhello";
        let decoded = decoder::decode(raw).unwrap();

        let request = build_request(&decoded, raw, &recipients(&["c@d.com"]));

        assert_eq!(request.from, EmailAddress::new(None, "a@b.com"));
        assert_eq!(request.to, vec![EmailAddress::new(None, "c@d.com")]);
        assert_eq!(request.subject, "Hi");
        assert_eq!(request.content.len(), 1);
        assert_eq!(request.content[0].mime_type, "text/plain");
        assert_eq!(request.content[0].body, "hello");
    }

    #[test]
    fn unknown_content_type_defaults_to_plain_text() {
        let raw = b"From: a@b.com\r\nContent-Type: application/json\r\n\r\n{\"k\":1}";
        let decoded = decoder::decode(raw).unwrap();

        let request = build_request(&decoded, raw, &recipients(&["c@d.com"]));

        assert_eq!(request.content.len(), 1);
        assert_eq!(request.content[0].mime_type, "text/plain");
        assert_eq!(request.content[0].body, "{\"k\":1}");
    }

    #[test]
    fn html_message_yields_one_html_block() {
        let raw = b"From: a@b.com\r\nContent-Type: text/html; charset=utf-8\r\n\r\n<p>hi</p>";
        let decoded = decoder::decode(raw).unwrap();

        let request = build_request(&decoded, raw, &recipients(&["c@d.com"]));

        assert_eq!(request.content.len(), 1);
        assert_eq!(request.content[0].mime_type, "text/html");
        assert_eq!(request.content[0].body, "<p>hi</p>");
    }

    #[test]
    fn multipart_message_yields_html_then_text() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"From: a@b.com\r\nSubject: Hi\r\n");
        raw.extend_from_slice(b"Content-Type: multipart/alternative; boundary=\"sep\"\r\n\r\n");
        raw.extend_from_slice(b"--sep\r\nContent-Type: text/plain\r\n\r\nplain body\r\n");
        raw.extend_from_slice(b"--sep\r\nContent-Type: text/html\r\n\r\n<p>html body</p>\r\n");
        raw.extend_from_slice(b"--sep--\r\n");

        let decoded = decoder::decode(&raw).unwrap();
        let parts = decoder::multipart_candidates(&raw).unwrap();
        let request = build_request(&decoded, &raw, &recipients(&["c@d.com"]));

        assert_eq!(request.content.len(), 2);
        assert_eq!(request.content[0].mime_type, "text/html");
        assert_eq!(Some(&request.content[0].body), parts.html.as_ref());
        assert_eq!(request.content[1].mime_type, "text/plain");
        assert_eq!(Some(&request.content[1].body), parts.text.as_ref());
    }

    #[test]
    fn broken_multipart_falls_back_to_the_whole_raw_body() {
        // multipart content type without a boundary parameter
        let raw = b"From: a@b.com\r\nContent-Type: multipart/mixed\r\n\r\nnot really multipart";
        let decoded = decoder::decode(raw).unwrap();

        let request = build_request(&decoded, raw, &recipients(&["c@d.com"]));

        assert_eq!(request.content.len(), 1);
        assert_eq!(request.content[0].mime_type, "text/plain");
        assert_eq!(request.content[0].body, "not really multipart");
    }

    #[test]
    fn one_bad_recipient_does_not_abort_the_others() {
        let raw = b"From: a@b.com\r\n\r\nhello";
        let decoded = decoder::decode(raw).unwrap();

        let request = build_request(&decoded, raw, &recipients(&["<", "c@d.com"]));

        assert_eq!(request.to.len(), 2);
        assert_eq!(request.to[0].address, "");
        assert_eq!(request.to[1].address, "c@d.com");
    }

    #[test]
    fn statuses_below_400_succeed() {
        for status in [200, 202, 250, 399] {
            assert!(interpret(&ProviderResponse {
                status,
                body: String::new(),
            })
            .is_ok());
        }
    }

    #[test]
    fn statuses_of_400_and_above_fail_with_context() {
        let result = interpret(&ProviderResponse {
            status: 500,
            body: "rate limited".to_string(),
        });

        match result {
            Err(DeliveryError::Rejected { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "rate limited");
            }
            other => panic!("expected a rejection, got {other:?}"),
        }
    }
}
