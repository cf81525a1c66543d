// std
use std::{env, process, sync::Arc};
// crates.io
use time::{Duration, OffsetDateTime, macros};
// self
use greenlight::{
	clock::ManualClock,
	credentials::{FileTokenStore, MemoryTokenStore, TOKEN_PLAINTEXT_LEN, TokenScope, Tokens},
	error::Error,
	models::Validator,
	store::RecordId,
};

fn tokens() -> (Tokens, Arc<ManualClock>, MemoryTokenStore) {
	let clock = Arc::new(ManualClock::new(macros::datetime!(2025-05-05 08:00 UTC)));
	let store = MemoryTokenStore::default();

	(Tokens::new(Arc::new(store.clone()), clock.clone(), Duration::seconds(3)), clock, store)
}

fn user_id(raw: i64) -> RecordId {
	RecordId::new(raw).expect("User id fixture should be positive.")
}

#[tokio::test]
async fn issued_token_resolves_until_it_expires() {
	let (tokens, clock, _) = tokens();
	let token = tokens
		.issue(user_id(7), Duration::hours(24), TokenScope::Authentication)
		.await
		.expect("Issuing a token should succeed.");

	assert_eq!(token.plaintext.expose().len(), TOKEN_PLAINTEXT_LEN);
	assert_eq!(token.expires_at, macros::datetime!(2025-05-06 08:00 UTC));
	assert_eq!(
		tokens
			.resolve(TokenScope::Authentication, token.plaintext.expose())
			.await
			.expect("Fresh token should resolve."),
		user_id(7)
	);

	clock.advance(Duration::hours(24));

	assert!(matches!(
		tokens.resolve(TokenScope::Authentication, token.plaintext.expose()).await,
		Err(Error::NotFound)
	));
}

#[tokio::test]
async fn zero_ttl_token_never_resolves() {
	let (tokens, _, _) = tokens();
	let token = tokens
		.issue(user_id(1), Duration::ZERO, TokenScope::Activation)
		.await
		.expect("Issuing a token should succeed.");

	assert!(matches!(
		tokens.resolve(TokenScope::Activation, token.plaintext.expose()).await,
		Err(Error::NotFound)
	));
}

#[tokio::test]
async fn altered_plaintext_does_not_resolve() {
	let (tokens, _, _) = tokens();
	let token = tokens
		.issue(user_id(3), Duration::hours(1), TokenScope::Authentication)
		.await
		.expect("Issuing a token should succeed.");
	let original = token.plaintext.expose();
	let first = original.chars().next().expect("Plaintext should not be empty.");
	let swapped = if first == 'A' { 'B' } else { 'A' };
	let altered = format!("{swapped}{}", &original[1..]);

	assert!(matches!(
		tokens.resolve(TokenScope::Authentication, &altered).await,
		Err(Error::NotFound)
	));
}

#[tokio::test]
async fn plaintexts_are_unique_and_never_stored() {
	let (tokens, _, store) = tokens();
	let mut seen = std::collections::HashSet::new();

	for _ in 0..64 {
		let token = tokens
			.issue(user_id(1), Duration::hours(1), TokenScope::Authentication)
			.await
			.expect("Issuing a token should succeed.");

		assert!(seen.insert(token.plaintext.expose().to_owned()));
		assert!(!format!("{store:?}").contains(token.plaintext.expose()));
	}

	assert_eq!(store.len(), 64);
}

#[test]
fn plaintext_shape_validation() {
	let mut v = Validator::new();

	Tokens::validate_plaintext(&mut v, "");

	let errors = v.finish().expect_err("Empty plaintext must fail.");

	assert_eq!(errors.get("token"), Some("must be provided"));

	let mut v = Validator::new();

	Tokens::validate_plaintext(&mut v, "short");

	let errors = v.finish().expect_err("Short plaintext must fail.");

	assert_eq!(errors.get("token"), Some("must be 26 bytes long"));

	let mut v = Validator::new();

	Tokens::validate_plaintext(&mut v, &"A".repeat(TOKEN_PLAINTEXT_LEN));

	assert!(v.finish().is_ok());
}

#[tokio::test]
async fn file_backed_tokens_survive_a_reopen() {
	let dir = env::temp_dir().join(format!(
		"greenlight-tokens-{}-{}",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos()
	));
	let path = dir.join("tokens.json");
	let clock = Arc::new(ManualClock::new(macros::datetime!(2025-05-05 08:00 UTC)));
	let open = |clock: Arc<ManualClock>| {
		let store = FileTokenStore::open(&path).expect("Token snapshot should open.");

		(Tokens::new(Arc::new(store.clone()), clock, Duration::seconds(3)), store)
	};
	let (tokens, _) = open(clock.clone());
	let session = tokens
		.issue(user_id(3), Duration::hours(24), TokenScope::Authentication)
		.await
		.expect("Issuing a session token should succeed.");
	let activation = tokens
		.issue(user_id(3), Duration::days(3), TokenScope::Activation)
		.await
		.expect("Issuing an activation token should succeed.");

	tokens
		.revoke_all(TokenScope::Activation, user_id(3))
		.await
		.expect("Revocation should succeed.");

	drop(tokens);

	let (tokens, store) = open(clock.clone());

	assert_eq!(store.len(), 1, "Only the unrevoked token should be on disk.");
	assert_eq!(
		tokens
			.resolve(TokenScope::Authentication, session.plaintext.expose())
			.await
			.expect("Session token should resolve after reopening."),
		user_id(3)
	);
	assert!(matches!(
		tokens.resolve(TokenScope::Activation, activation.plaintext.expose()).await,
		Err(Error::NotFound)
	));

	clock.advance(Duration::hours(24));

	assert_eq!(tokens.purge_expired().await.ok(), Some(1));
	assert!(FileTokenStore::open(&path).expect("Token snapshot should reopen.").is_empty());

	let _ = std::fs::remove_dir_all(&dir);
}
