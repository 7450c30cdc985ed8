//! Mailer that drops every message into an outbox directory.

use std::path::PathBuf;

use async_trait::async_trait;
use time::{OffsetDateTime, format_description::well_known::Rfc2822};
use tracing::info;
use uuid::Uuid;

use crate::application::mail::{MailError, Mailer, OutgoingMail};

#[derive(Debug, Clone)]
pub struct FileMailer {
    outbox: PathBuf,
    from_address: String,
}

impl FileMailer {
    pub fn new(outbox: PathBuf, from_address: impl Into<String>) -> Self {
        Self {
            outbox,
            from_address: from_address.into(),
        }
    }

    fn render(&self, mail: &OutgoingMail, sent_at: OffsetDateTime) -> String {
        let date = sent_at
            .format(&Rfc2822)
            .unwrap_or_else(|_| sent_at.to_string());
        format!(
            "From: {from}\r\nTo: {to}\r\nSubject: {subject}\r\nDate: {date}\r\n\
             Content-Type: text/plain; charset=\"utf-8\"\r\n\r\n{body}",
            from = self.from_address,
            to = mail.to,
            subject = mail.subject,
            body = mail.body,
        )
    }
}

#[async_trait]
impl Mailer for FileMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        tokio::fs::create_dir_all(&self.outbox)
            .await
            .map_err(|err| MailError::Delivery(err.to_string()))?;

        let sent_at = OffsetDateTime::now_utc();
        let name = format!(
            "{}-{}.log",
            sent_at.unix_timestamp(),
            Uuid::new_v4().simple()
        );
        let path = self.outbox.join(name);
        tokio::fs::write(&path, self.render(&mail, sent_at))
            .await
            .map_err(|err| MailError::Delivery(err.to_string()))?;

        info!(
            target = "infra::mail::send",
            to = %mail.to,
            path = %path.display(),
            "mail written to outbox"
        );
        Ok(())
    }
}
