//! Account flows: registration, activation, authentication, and activation token re-issue.

// crates.io
use serde_json::json;
// self
use crate::{
	_prelude::*,
	background::Background,
	credentials::{Password, Token, TokenScope, Tokens},
	mailer::{MailTemplate, Mailer},
	models::{
		MOVIES_READ, PermissionStore, User, ValidationErrors, Validator, Users, validate_email,
		validate_name, validate_password_plaintext,
	},
	store::Versioned,
};

/// Lifetime of an activation token.
pub const ACTIVATION_TTL: Duration = Duration::days(3);
/// Lifetime of an authentication token.
pub const AUTHENTICATION_TTL: Duration = Duration::hours(24);

/// Sign-up payload.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Registration {
	/// Display name.
	#[serde(default)]
	pub name: String,
	/// Login address.
	#[serde(default)]
	pub email: String,
	/// Plaintext password.
	#[serde(default)]
	pub password: String,
}
impl Debug for Registration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Registration")
			.field("name", &self.name)
			.field("email", &self.email)
			.finish_non_exhaustive()
	}
}

/// Orchestrates users, tokens, permissions, and mail for the account lifecycle.
#[derive(Clone)]
pub struct Accounts {
	users: Users,
	tokens: Tokens,
	permissions: PermissionStore,
	mailer: Arc<dyn Mailer>,
	background: Background,
}
impl Accounts {
	/// Wires the collaborators together.
	pub fn new(
		users: Users,
		tokens: Tokens,
		permissions: PermissionStore,
		mailer: Arc<dyn Mailer>,
		background: Background,
	) -> Self {
		Self { users, tokens, permissions, mailer, background }
	}

	/// Creates an inactive user with `movies:read`, issues an activation token, and mails it
	/// in the background.
	pub async fn register(&self, input: Registration) -> Result<Versioned<User>> {
		let mut v = Validator::new();

		validate_name(&mut v, &input.name);
		validate_email(&mut v, &input.email);
		validate_password_plaintext(&mut v, &input.password);
		v.finish()?;

		let password = hash_password(input.password).await?;
		let user = User { name: input.name, email: input.email, password, activated: false };
		let mut v = Validator::new();

		user.validate(&mut v)?;
		v.finish()?;

		let created = self.users.insert(user).await?;

		self.permissions.add_for_user(created.id, &[MOVIES_READ]).await?;

		let token = self.tokens.issue(created.id, ACTIVATION_TTL, TokenScope::Activation).await?;

		self.send_in_background(
			"mail.user_welcome",
			created.data.email.clone(),
			MailTemplate::UserWelcome,
			json!({
				"activationToken": token.plaintext.expose(),
				"userID": created.id.get(),
			}),
		);

		tracing::info!(user_id = %created.id, "user registered");

		Ok(created)
	}

	/// Activates the owner of an activation token and revokes all of their activation tokens.
	pub async fn activate(&self, plaintext: &str) -> Result<Versioned<User>> {
		let mut v = Validator::new();

		Tokens::validate_plaintext(&mut v, plaintext);
		v.finish()?;

		let user = match self.users.get_for_token(TokenScope::Activation, plaintext).await {
			Ok(user) => user,
			Err(Error::NotFound) =>
				return Err(ValidationErrors::single("token", "invalid or expired activation token")
					.into()),
			Err(e) => return Err(e),
		};
		let mut data = user.data.clone();

		data.activated = true;

		let activated = self.users.update(user.id, user.version, data).await?;

		self.tokens.revoke_all(TokenScope::Activation, user.id).await?;

		tracing::info!(user_id = %user.id, "user activated");

		Ok(activated)
	}

	/// Exchanges an email/password pair for a 24 hour authentication token.
	pub async fn authenticate(&self, email: &str, password: &str) -> Result<Token> {
		let mut v = Validator::new();

		validate_email(&mut v, email);
		validate_password_plaintext(&mut v, password);
		v.finish()?;

		let user = match self.users.get_by_email(email).await {
			Ok(user) => user,
			Err(Error::NotFound) => return Err(Error::InvalidCredentials),
			Err(e) => return Err(e),
		};

		if !verify_password(user.data.password.clone(), password.to_owned()).await? {
			return Err(Error::InvalidCredentials);
		}

		self.tokens.issue(user.id, AUTHENTICATION_TTL, TokenScope::Authentication).await
	}

	/// Issues a fresh activation token for a not-yet-activated user and mails it.
	pub async fn request_activation_token(&self, email: &str) -> Result<()> {
		let mut v = Validator::new();

		validate_email(&mut v, email);
		v.finish()?;

		let user = match self.users.get_by_email(email).await {
			Ok(user) => user,
			Err(Error::NotFound) =>
				return Err(ValidationErrors::single("email", "no matching email address found")
					.into()),
			Err(e) => return Err(e),
		};

		if user.data.activated {
			return Err(ValidationErrors::single("email", "user has already been activated").into());
		}

		let token = self.tokens.issue(user.id, ACTIVATION_TTL, TokenScope::Activation).await?;

		self.send_in_background(
			"mail.token_activation",
			user.data.email,
			MailTemplate::TokenActivation,
			json!({ "activationToken": token.plaintext.expose() }),
		);

		Ok(())
	}

	/// Resolves a bearer token to its user.
	///
	/// Any lookup miss is reported as [`Error::InvalidToken`].
	pub async fn authenticated_user(&self, plaintext: &str) -> Result<Versioned<User>> {
		match self.users.get_for_token(TokenScope::Authentication, plaintext).await {
			Ok(user) => Ok(user),
			Err(Error::NotFound) => Err(Error::InvalidToken),
			Err(e) => Err(e),
		}
	}

	/// Checks that `user` is present, activated, and holds `code`.
	pub async fn authorize(&self, user: Option<&Versioned<User>>, code: &str) -> Result<()> {
		let user = user.ok_or(Error::AuthenticationRequired)?;

		if !user.data.activated {
			return Err(Error::InactiveAccount);
		}

		let permissions = self.permissions.get_all_for_user(user.id).await?;

		if permissions.include(code) { Ok(()) } else { Err(Error::NotPermitted) }
	}

	fn send_in_background(
		&self,
		job: &'static str,
		recipient: String,
		template: MailTemplate,
		data: serde_json::Value,
	) {
		let mailer = self.mailer.clone();

		self.background.spawn(job, async move {
			mailer.send(&recipient, template, data).await?;

			Ok(())
		});
	}
}
impl Debug for Accounts {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Accounts").finish_non_exhaustive()
	}
}

async fn hash_password(plaintext: String) -> Result<Password> {
	tokio::task::spawn_blocking(move || Password::from_plaintext(&plaintext))
		.await
		.map_err(|e| Error::internal(format!("password hashing task failed: {e}")))?
		.map_err(Into::into)
}

async fn verify_password(password: Password, plaintext: String) -> Result<bool> {
	tokio::task::spawn_blocking(move || password.matches(&plaintext))
		.await
		.map_err(|e| Error::internal(format!("password verification task failed: {e}")))?
		.map_err(Into::into)
}
