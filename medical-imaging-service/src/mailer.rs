use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::models::ContactRequest;

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Delivers contact form submissions.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_contact(&self, contact: &ContactRequest) -> anyhow::Result<()>;
}

pub struct SendGridMailer {
    client: Client,
    api_key: String,
    recipient: String,
    sender: String,
}

impl SendGridMailer {
    pub fn new(api_key: String, recipient: String, sender: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            recipient,
            sender,
        }
    }
}

fn text_body(contact: &ContactRequest) -> String {
    format!(
        "Name: {}\nEmail: {}\nSubject: {}\n\nMessage:\n{}\n",
        contact.name, contact.email, contact.subject, contact.message
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_body(contact: &ContactRequest) -> String {
    format!(
        "<h3>New Contact Form Submission</h3>\
         <p><strong>Name:</strong> {}</p>\
         <p><strong>Email:</strong> {}</p>\
         <p><strong>Subject:</strong> {}</p>\
         <p><strong>Message:</strong></p>\
         <p>{}</p>",
        escape_html(&contact.name),
        escape_html(&contact.email),
        escape_html(&contact.subject),
        escape_html(&contact.message).replace('\n', "<br>"),
    )
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send_contact(&self, contact: &ContactRequest) -> anyhow::Result<()> {
        let payload = json!({
            "personalizations": [{ "to": [{ "email": self.recipient }] }],
            "from": { "email": self.sender },
            "reply_to": { "email": contact.email, "name": contact.name },
            "subject": format!("Contact Form: {}", contact.subject),
            "content": [
                { "type": "text/plain", "value": text_body(contact) },
                { "type": "text/html", "value": html_body(contact) }
            ]
        });

        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("SendGrid request failed: {}", response.status()));
        }
        info!(subject = %contact.subject, "Contact email sent");
        Ok(())
    }
}

/// Used when no SendGrid key is configured: logs the submission and succeeds.
pub struct DemoMailer {
    delay: Duration,
}

impl DemoMailer {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_secs(1),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for DemoMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mailer for DemoMailer {
    async fn send_contact(&self, contact: &ContactRequest) -> anyhow::Result<()> {
        info!(
            name = %contact.name,
            email = %contact.email,
            subject = %contact.subject,
            "Demo mode: contact form submitted"
        );
        sleep(self.delay).await;
        Ok(())
    }
}
