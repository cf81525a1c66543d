// std
use std::sync::Arc;
// crates.io
use time::{Duration, macros};
// self
use greenlight::{
	accounts::Registration,
	app::App,
	clock::ManualClock,
	config::Config,
	error::Error,
	mailer::{LogMailer, MailTemplate},
	models::{MOVIES_READ, MOVIES_WRITE},
};

fn app() -> (App, Arc<ManualClock>, Arc<LogMailer>) {
	let clock = Arc::new(ManualClock::new(macros::datetime!(2025-07-01 10:00 UTC)));
	let mailer = Arc::new(LogMailer::default());
	let app = App::in_memory(Arc::new(Config::default()), clock.clone(), mailer.clone());

	(app, clock, mailer)
}

fn registration(email: &str) -> Registration {
	Registration { name: "Faith Smith".into(), email: email.into(), password: "pa55word".into() }
}

async fn activation_token(app: &App, mailer: &LogMailer, email: &str) -> String {
	app.background.wait_idle().await;

	let mail = mailer.last_to(email).expect("An activation mail should have been sent.");

	mail.data["activationToken"]
		.as_str()
		.expect("Mail data should carry the activation token.")
		.to_owned()
}

#[tokio::test]
async fn register_activate_authenticate() {
	let (app, _, mailer) = app();
	let user = app
		.accounts
		.register(registration("faith@example.com"))
		.await
		.expect("Registration should succeed.");

	assert!(!user.data.activated);
	assert_eq!(user.version, 1);
	assert!(user.data.password.plaintext().is_none(), "Plaintext must not be kept.");
	assert!(matches!(
		app.accounts.authorize(Some(&user), MOVIES_READ).await,
		Err(Error::InactiveAccount)
	));

	let token = activation_token(&app, &mailer, "faith@example.com").await;
	let welcome = mailer.last_to("faith@example.com").expect("Welcome mail should exist.");

	assert_eq!(welcome.template, MailTemplate::UserWelcome);
	assert_eq!(welcome.data["userID"], user.id.get());

	let activated = app.accounts.activate(&token).await.expect("Activation should succeed.");

	assert!(activated.data.activated);
	assert_eq!(activated.version, 2);
	assert!(
		app.accounts.activate(&token).await.is_err(),
		"Activation tokens are revoked once used."
	);

	let auth = app
		.accounts
		.authenticate("FAITH@example.com", "pa55word")
		.await
		.expect("Authentication should succeed.");
	let current = app
		.accounts
		.authenticated_user(auth.plaintext.expose())
		.await
		.expect("Authentication token should resolve.");

	assert_eq!(current.id, user.id);
	assert!(app.accounts.authorize(Some(&current), MOVIES_READ).await.is_ok());
	assert!(matches!(
		app.accounts.authorize(Some(&current), MOVIES_WRITE).await,
		Err(Error::NotPermitted)
	));
	assert!(matches!(
		app.accounts.authorize(None, MOVIES_READ).await,
		Err(Error::AuthenticationRequired)
	));
}

#[tokio::test]
async fn registration_rejects_bad_input_and_duplicates() {
	let (app, _, _) = app();
	let err = app
		.accounts
		.register(Registration {
			name: String::new(),
			email: "not-an-email".into(),
			password: "short".into(),
		})
		.await
		.expect_err("Invalid registration must fail.");
	let errors = match err {
		Error::Validation(errors) => errors,
		other => panic!("Expected a validation error, got {other:?}."),
	};

	assert_eq!(errors.get("name"), Some("must be provided"));
	assert_eq!(errors.get("email"), Some("must be a valid email address"));
	assert_eq!(errors.get("password"), Some("must be at least 8 bytes long"));

	app.accounts
		.register(registration("dup@example.com"))
		.await
		.expect("First registration should succeed.");

	assert!(matches!(
		app.accounts.register(registration("DUP@example.com")).await,
		Err(Error::DuplicateEmail)
	));
}

#[tokio::test]
async fn authentication_failures_are_indistinguishable() {
	let (app, _, _) = app();

	app.accounts
		.register(registration("grace@example.com"))
		.await
		.expect("Registration should succeed.");

	assert!(matches!(
		app.accounts.authenticate("grace@example.com", "wrong-password").await,
		Err(Error::InvalidCredentials)
	));
	assert!(matches!(
		app.accounts.authenticate("nobody@example.com", "pa55word").await,
		Err(Error::InvalidCredentials)
	));
	assert!(matches!(
		app.accounts.authenticated_user("ABCDEFGHIJKLMNOPQRSTUVWXYZ").await,
		Err(Error::InvalidToken)
	));
}

#[tokio::test]
async fn expired_activation_token_is_a_validation_error() {
	let (app, clock, mailer) = app();

	app.accounts
		.register(registration("late@example.com"))
		.await
		.expect("Registration should succeed.");

	let token = activation_token(&app, &mailer, "late@example.com").await;

	clock.advance(Duration::days(3));

	let Err(Error::Validation(errors)) = app.accounts.activate(&token).await else {
		panic!("Expired activation token must fail validation.");
	};

	assert_eq!(errors.get("token"), Some("invalid or expired activation token"));
}

#[tokio::test]
async fn activation_token_can_be_reissued_until_activated() {
	let (app, _, mailer) = app();

	app.accounts
		.register(registration("again@example.com"))
		.await
		.expect("Registration should succeed.");
	app.accounts
		.request_activation_token("again@example.com")
		.await
		.expect("Reissue for an inactive user should succeed.");

	let token = activation_token(&app, &mailer, "again@example.com").await;
	let reissued = mailer.last_to("again@example.com").expect("Reissue mail should exist.");

	assert_eq!(reissued.template, MailTemplate::TokenActivation);
	assert_eq!(mailer.sent().len(), 2);

	app.accounts.activate(&token).await.expect("Reissued token should activate.");

	let Err(Error::Validation(errors)) =
		app.accounts.request_activation_token("again@example.com").await
	else {
		panic!("Reissue for an active user must fail validation.");
	};

	assert_eq!(errors.get("email"), Some("user has already been activated"));

	let Err(Error::Validation(errors)) =
		app.accounts.request_activation_token("ghost@example.com").await
	else {
		panic!("Reissue for an unknown address must fail validation.");
	};

	assert_eq!(errors.get("email"), Some("no matching email address found"));
}
