//! Mail relay client over HTTP.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::Client as ReqwestClient;
use url::Url;
// self
use crate::{
	_prelude::*,
	mailer::{MailError, MailFuture, MailTemplate, Mailer},
};

/// Delivery attempts per message.
pub const MAIL_ATTEMPTS: u32 = 3;
/// Pause between attempts.
pub const MAIL_RETRY_DELAY: StdDuration = StdDuration::from_millis(500);
/// Per-attempt request timeout.
pub const MAIL_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(5);

#[derive(Serialize)]
struct RelayMessage<'a> {
	from: &'a str,
	to: &'a str,
	template: MailTemplate,
	data: &'a serde_json::Value,
}

/// Posts each message as JSON to a relay endpoint, retrying transient failures.
#[derive(Clone, Debug)]
pub struct HttpMailer {
	client: ReqwestClient,
	endpoint: Url,
	sender: String,
	retry_delay: StdDuration,
}
impl HttpMailer {
	/// Builds a mailer posting to `endpoint` with `sender` as the from-address.
	pub fn new(endpoint: Url, sender: impl Into<String>) -> Result<Self, MailError> {
		let client = ReqwestClient::builder()
			.timeout(MAIL_REQUEST_TIMEOUT)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(|e| MailError::Transport { message: e.to_string() })?;

		Ok(Self { client, endpoint, sender: sender.into(), retry_delay: MAIL_RETRY_DELAY })
	}

	/// Overrides the pause between attempts.
	pub fn with_retry_delay(mut self, delay: StdDuration) -> Self {
		self.retry_delay = delay;

		self
	}

	async fn attempt(&self, message: &RelayMessage<'_>) -> Result<(), MailError> {
		let response = self
			.client
			.post(self.endpoint.clone())
			.json(message)
			.send()
			.await
			.map_err(|e| MailError::Transport { message: e.to_string() })?;
		let status = response.status();

		if status.is_success() { Ok(()) } else { Err(MailError::Rejected { status: status.as_u16() }) }
	}
}
impl Mailer for HttpMailer {
	fn send<'a>(
		&'a self,
		recipient: &'a str,
		template: MailTemplate,
		data: serde_json::Value,
	) -> MailFuture<'a> {
		Box::pin(async move {
			let message = RelayMessage { from: &self.sender, to: recipient, template, data: &data };
			let mut attempt = 1;

			loop {
				match self.attempt(&message).await {
					Ok(()) => return Ok(()),
					Err(e) if attempt >= MAIL_ATTEMPTS => return Err(e),
					Err(e) => {
						tracing::debug!(attempt, error = %e, "mail attempt failed; retrying");

						attempt += 1;

						tokio::time::sleep(self.retry_delay).await;
					},
				}
			}
		})
	}
}
