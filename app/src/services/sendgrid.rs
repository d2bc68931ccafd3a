//! SendGrid mail delivery.

use super::http::RemoteEndpoint;
use super::{Email, Mailer};
use reel_core::Promise;
use reqwest::Method;
use serde::Serialize;

const SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Sender shown on every outgoing message.
pub const FROM_ADDRESS: &str = "support@reel.video";

/// Live mailer.
#[derive(Debug, Clone)]
pub struct SendGridMailer {
    endpoint: RemoteEndpoint,
    api_key: String,
}

impl SendGridMailer {
    #[must_use]
    pub fn new(endpoint: RemoteEndpoint, api_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'static>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

impl<'a> From<&'a Email> for Message<'a> {
    fn from(email: &'a Email) -> Self {
        Self {
            personalizations: [Personalization {
                to: [Address { email: &email.to }],
            }],
            from: Address {
                email: FROM_ADDRESS,
            },
            subject: &email.subject,
            content: [Content {
                kind: "text/plain",
                value: &email.text,
            }],
        }
    }
}

impl Mailer for SendGridMailer {
    fn send(&self, email: Email) -> Promise<Option<()>> {
        let request = self
            .endpoint
            .request(Method::POST, SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&Message::from(&email));
        self.endpoint
            .send(format!("send {:?} to {}", email.subject, email.to), request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_shape() {
        let email = Email {
            to: "giftee@example.com".to_owned(),
            subject: "Your gift".to_owned(),
            text: "Enjoy".to_owned(),
        };

        let json = serde_json::to_value(Message::from(&email)).unwrap_or_default();

        assert_eq!(json["personalizations"][0]["to"][0]["email"], "giftee@example.com");
        assert_eq!(json["content"][0]["type"], "text/plain");
        assert_eq!(json["from"]["email"], FROM_ADDRESS);
    }
}
