//! Outbound mail dispatch.
//!
//! The crate only decides *which* message goes to *whom* with *what* data; rendering and
//! delivery belong to the [`Mailer`] implementation. [`LogMailer`] records messages in
//! memory and in the log, while `HttpMailer` (feature `reqwest`, on by default) hands them
//! to an HTTP mail relay.

#[cfg(feature = "reqwest")] mod http;
#[cfg(feature = "reqwest")] pub use http::*;

// self
use crate::_prelude::*;

/// Boxed future returned by [`Mailer::send`].
pub type MailFuture<'a> = Pin<Box<dyn Future<Output = Result<(), MailError>> + 'a + Send>>;

/// Messages the service sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailTemplate {
	/// Sent after registration; carries the first activation token.
	UserWelcome,
	/// Sent when a user asks for a fresh activation token.
	TokenActivation,
}
impl MailTemplate {
	/// Stable template name understood by the relay.
	pub const fn as_str(self) -> &'static str {
		match self {
			MailTemplate::UserWelcome => "user_welcome",
			MailTemplate::TokenActivation => "token_activation",
		}
	}
}
impl Display for MailTemplate {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Mail delivery failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum MailError {
	/// The relay could not be reached.
	#[error("Mail transport failed: {message}.")]
	Transport {
		/// Human-readable error payload.
		message: String,
	},
	/// The relay answered with a non-success status.
	#[error("Mail relay rejected the message with status {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
	},
}

/// Sends templated mail.
pub trait Mailer
where
	Self: Send + Sync,
{
	/// Delivers `template` rendered with `data` to `recipient`.
	fn send<'a>(
		&'a self,
		recipient: &'a str,
		template: MailTemplate,
		data: serde_json::Value,
	) -> MailFuture<'a>;
}

/// A message accepted by [`LogMailer`].
#[derive(Clone, Debug, PartialEq)]
pub struct SentMail {
	/// Destination address.
	pub recipient: String,
	/// Template name.
	pub template: MailTemplate,
	/// Template data.
	pub data: serde_json::Value,
}

/// Mailer that logs each message and keeps it for inspection.
#[derive(Debug, Default)]
pub struct LogMailer {
	sent: Mutex<Vec<SentMail>>,
}
impl LogMailer {
	/// Messages accepted so far, oldest first.
	pub fn sent(&self) -> Vec<SentMail> {
		self.sent.lock().clone()
	}

	/// Most recent message to `recipient`, if any.
	pub fn last_to(&self, recipient: &str) -> Option<SentMail> {
		self.sent.lock().iter().rev().find(|mail| mail.recipient == recipient).cloned()
	}
}
impl Mailer for LogMailer {
	fn send<'a>(
		&'a self,
		recipient: &'a str,
		template: MailTemplate,
		data: serde_json::Value,
	) -> MailFuture<'a> {
		Box::pin(async move {
			tracing::info!(recipient, template = template.as_str(), "mail queued");

			self.sent.lock().push(SentMail { recipient: recipient.to_owned(), template, data });

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn log_mailer_keeps_messages_in_order() {
		let mailer = LogMailer::default();

		mailer
			.send("a@example.com", MailTemplate::UserWelcome, serde_json::json!({ "userID": 1 }))
			.await
			.expect("Log mailer should accept messages.");
		mailer
			.send("a@example.com", MailTemplate::TokenActivation, serde_json::json!({}))
			.await
			.expect("Log mailer should accept messages.");

		assert_eq!(mailer.sent().len(), 2);
		assert_eq!(
			mailer.last_to("a@example.com").map(|mail| mail.template),
			Some(MailTemplate::TokenActivation)
		);
		assert!(mailer.last_to("b@example.com").is_none());
	}
}
