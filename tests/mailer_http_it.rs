#![cfg(feature = "reqwest")]

// std
use std::time::Duration as StdDuration;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use greenlight::{
	mailer::{HttpMailer, MAIL_ATTEMPTS, MailError, MailTemplate, Mailer},
	url::Url,
};

fn mailer(server: &MockServer) -> HttpMailer {
	let endpoint = Url::parse(&server.url("/send")).expect("Mock relay URL should parse.");

	HttpMailer::new(endpoint, "Greenlight <no-reply@greenlight.test>")
		.expect("HTTP mailer should build.")
		.with_retry_delay(StdDuration::from_millis(10))
}

#[tokio::test]
async fn delivers_message_as_json() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/send").json_body(json!({
				"from": "Greenlight <no-reply@greenlight.test>",
				"to": "alice@example.com",
				"template": "user_welcome",
				"data": { "activationToken": "ABC", "userID": 1 },
			}));
			then.status(202);
		})
		.await;

	mailer(&server)
		.send(
			"alice@example.com",
			MailTemplate::UserWelcome,
			json!({ "activationToken": "ABC", "userID": 1 }),
		)
		.await
		.expect("Relay accepting the message should succeed.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn gives_up_after_the_last_attempt() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/send");
			then.status(503);
		})
		.await;
	let err = mailer(&server)
		.send("bob@example.com", MailTemplate::TokenActivation, json!({}))
		.await
		.expect_err("A relay that always fails should surface an error.");

	assert_eq!(err, MailError::Rejected { status: 503 });

	mock.assert_calls_async(MAIL_ATTEMPTS as usize).await;
}
