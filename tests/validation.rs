use jose_compact::{
    AuthenticatedEncryptionProvider, CryptoProviderFactory, DefaultCryptoProviderFactory, Error,
    HeaderCache, InMemoryReplayCache, KeyWrapProvider, SecurityKey, SignatureProvider,
    SigningCredentials, TokenBuilder, TokenReader, TokenValidator, ValidationParameters,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_secs() as i64
}

fn fresh_builder() -> TokenBuilder {
    TokenBuilder::new().with_header_cache(Arc::new(HeaderCache::new()))
}

fn signed_token(claims: serde_json::Value, key_bytes: &[u8], kid: Option<&str>) -> String {
    let mut key = SecurityKey::symmetric(key_bytes.to_vec());
    if let Some(kid) = kid {
        key = key.with_key_id(kid);
    }
    let credentials = SigningCredentials::new(key, "HS256");
    fresh_builder()
        .build(&claims, Some(&credentials), None)
        .expect("build")
}

#[test]
fn kid_mismatch_raises_signature_key_not_found() {
    let token = signed_token(json!({"sub": "a"}), &[7u8; 32], Some("A"));
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![8u8; 32]).with_key_id("B"));
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("kid mismatch");
    match err {
        Error::SignatureKeyNotFound(kid) => assert_eq!(kid, "A"),
        other => panic!("expected SignatureKeyNotFound, got {other:?}"),
    }
}

#[test]
fn multi_key_trial_returns_the_key_that_verified() {
    // No kid on the token, so resolution degenerates to trying all keys.
    let token = signed_token(json!({"sub": "a"}), &[2u8; 32], None);
    let wrong = SecurityKey::symmetric(vec![1u8; 32]).with_key_id("first");
    let right = SecurityKey::symmetric(vec![2u8; 32]).with_key_id("second");
    let params = ValidationParameters::new().with_issuer_signing_keys([wrong, right]);
    let validated = TokenValidator::new().validate(&token, &params).expect("validate");
    assert_eq!(
        validated.signing_key.as_ref().and_then(|k| k.key_id()),
        Some("second")
    );
}

#[test]
fn kid_match_with_bad_signature_reports_invalid_signature() {
    // The configured key carries the token's kid but different material.
    let token = signed_token(json!({"sub": "a"}), &[7u8; 32], Some("k"));
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![9u8; 32]).with_key_id("k"));
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("bad signature");
    assert!(matches!(err, Error::InvalidSignature(_)));
}

#[test]
fn no_configured_keys_reports_invalid_signature() {
    let token = signed_token(json!({"sub": "a"}), &[7u8; 32], None);
    let err = TokenValidator::new()
        .validate(&token, &ValidationParameters::new())
        .expect_err("no keys");
    match err {
        Error::InvalidSignature(message) => assert!(message.contains("no signing keys")),
        other => panic!("expected InvalidSignature, got {other:?}"),
    }
}

struct CountingFactory {
    inner: DefaultCryptoProviderFactory,
    verifier_count: AtomicUsize,
}

impl CountingFactory {
    fn new() -> Self {
        Self {
            inner: DefaultCryptoProviderFactory,
            verifier_count: AtomicUsize::new(0),
        }
    }
}

impl CryptoProviderFactory for CountingFactory {
    fn is_supported_algorithm(&self, algorithm: &str, key: &SecurityKey) -> bool {
        self.inner.is_supported_algorithm(algorithm, key)
    }

    fn create_signing_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn SignatureProvider>, Error> {
        self.inner.create_signing_provider(key, algorithm)
    }

    fn create_verifying_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn SignatureProvider>, Error> {
        self.verifier_count.fetch_add(1, Ordering::SeqCst);
        self.inner.create_verifying_provider(key, algorithm)
    }

    fn create_authenticated_encryption_provider(
        &self,
        key: &[u8],
        algorithm: &str,
    ) -> Result<Box<dyn AuthenticatedEncryptionProvider>, Error> {
        self.inner
            .create_authenticated_encryption_provider(key, algorithm)
    }

    fn create_key_wrap_provider(
        &self,
        key: &SecurityKey,
        algorithm: &str,
    ) -> Result<Box<dyn KeyWrapProvider>, Error> {
        self.inner.create_key_wrap_provider(key, algorithm)
    }
}

#[test]
fn every_candidate_key_is_tried_at_most_once() {
    let token = signed_token(json!({"sub": "a"}), &[7u8; 32], None);
    let factory = Arc::new(CountingFactory::new());
    let params = ValidationParameters::new()
        .with_issuer_signing_keys([
            SecurityKey::symmetric(vec![1u8; 32]),
            SecurityKey::symmetric(vec![2u8; 32]),
            SecurityKey::symmetric(vec![3u8; 32]),
        ])
        .with_crypto_provider_factory(Arc::clone(&factory) as Arc<dyn CryptoProviderFactory>);
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("none verify");
    assert!(matches!(err, Error::InvalidSignature(_)));
    assert_eq!(factory.verifier_count.load(Ordering::SeqCst), 3);
}

#[test]
fn expired_token_is_rejected_without_skew() {
    let token = signed_token(json!({"sub": "a", "exp": now() - 100}), &[7u8; 32], None);
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]))
        .with_clock_skew(Duration::ZERO);
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("expired");
    assert!(matches!(err, Error::InvalidLifetime(_)));
}

#[test]
fn clock_skew_tolerates_recent_expiry() {
    let token = signed_token(json!({"sub": "a", "exp": now() - 100}), &[7u8; 32], None);
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]))
        .with_clock_skew(Duration::from_secs(300));
    TokenValidator::new().validate(&token, &params).expect("within skew");
}

#[test]
fn token_not_yet_valid_is_rejected() {
    let token = signed_token(json!({"sub": "a", "nbf": now() + 4000}), &[7u8; 32], None);
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]));
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("not yet valid");
    assert!(matches!(err, Error::InvalidLifetime(_)));
}

#[test]
fn nbf_after_exp_is_rejected() {
    let token = signed_token(
        json!({"sub": "a", "nbf": now() + 50, "exp": now() - 50}),
        &[7u8; 32],
        None,
    );
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]));
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("inverted lifetime");
    assert!(matches!(err, Error::InvalidLifetime(_)));
}

#[test]
fn audience_must_overlap_when_configured() {
    let key = SecurityKey::symmetric(vec![7u8; 32]);
    let accepted = ValidationParameters::new()
        .with_issuer_signing_key(key.clone())
        .with_valid_audience("api");
    let rejected = ValidationParameters::new()
        .with_issuer_signing_key(key)
        .with_valid_audience("elsewhere");

    let single = signed_token(json!({"aud": "api"}), &[7u8; 32], None);
    TokenValidator::new().validate(&single, &accepted).expect("single aud");
    assert!(matches!(
        TokenValidator::new().validate(&single, &rejected),
        Err(Error::InvalidAudience(_))
    ));

    let multiple = signed_token(json!({"aud": ["web", "api"]}), &[7u8; 32], None);
    TokenValidator::new().validate(&multiple, &accepted).expect("array aud");

    let missing = signed_token(json!({"sub": "a"}), &[7u8; 32], None);
    assert!(matches!(
        TokenValidator::new().validate(&missing, &accepted),
        Err(Error::InvalidAudience(_))
    ));
}

#[test]
fn audience_is_skipped_when_unconfigured() {
    let token = signed_token(json!({"aud": "anything"}), &[7u8; 32], None);
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]));
    TokenValidator::new().validate(&token, &params).expect("no aud policy");
}

#[test]
fn issuer_is_validated_and_reported() {
    let key = SecurityKey::symmetric(vec![7u8; 32]);
    let token = signed_token(json!({"iss": "trusted"}), &[7u8; 32], None);

    let accepted = ValidationParameters::new()
        .with_issuer_signing_key(key.clone())
        .with_valid_issuer("trusted");
    let validated = TokenValidator::new().validate(&token, &accepted).expect("issuer");
    assert_eq!(validated.issuer.as_deref(), Some("trusted"));

    let rejected = ValidationParameters::new()
        .with_issuer_signing_key(key.clone())
        .with_valid_issuer("somebody-else");
    assert!(matches!(
        TokenValidator::new().validate(&token, &rejected),
        Err(Error::InvalidIssuer(_))
    ));

    let missing = signed_token(json!({"sub": "a"}), &[7u8; 32], None);
    let requires_iss = ValidationParameters::new()
        .with_issuer_signing_key(key)
        .with_valid_issuer("trusted");
    assert!(matches!(
        TokenValidator::new().validate(&missing, &requires_iss),
        Err(Error::InvalidIssuer(_))
    ));
}

#[test]
fn replay_cache_rejects_second_presentation() {
    let token = signed_token(json!({"sub": "a", "exp": now() + 600}), &[7u8; 32], None);
    let cache = Arc::new(InMemoryReplayCache::new());
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]))
        .with_token_replay_cache(cache);

    TokenValidator::new().validate(&token, &params).expect("first presentation");
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("replay");
    assert!(matches!(err, Error::TokenReplay(_)));
}

#[test]
fn replay_detection_requires_an_expiry() {
    let token = signed_token(json!({"sub": "a"}), &[7u8; 32], None);
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]))
        .with_token_replay_cache(Arc::new(InMemoryReplayCache::new()));
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("no exp");
    assert!(matches!(err, Error::TokenReplay(_)));
}

#[test]
fn actor_chain_is_validated_recursively() {
    let actor_token = signed_token(json!({"sub": "service"}), &[9u8; 32], None);
    let token = signed_token(
        json!({"sub": "user", "act": actor_token}),
        &[7u8; 32],
        None,
    );

    let actor_params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![9u8; 32]));
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]))
        .with_validate_actor(true)
        .with_actor_validation_parameters(actor_params);
    TokenValidator::new().validate(&token, &params).expect("actor chain");
}

#[test]
fn invalid_actor_token_fails_the_outer_validation() {
    let actor_token = signed_token(json!({"sub": "service"}), &[9u8; 32], None);
    let token = signed_token(
        json!({"sub": "user", "act": actor_token}),
        &[7u8; 32],
        None,
    );

    // Without dedicated actor parameters the same key set applies, and the
    // actor token was signed with a different key.
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]))
        .with_validate_actor(true);
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("actor signed elsewhere");
    assert!(matches!(err, Error::InvalidSignature(_)));
}

#[test]
fn actor_is_ignored_when_validation_is_disabled() {
    let token = signed_token(
        json!({"sub": "user", "act": "not-even-a-token"}),
        &[7u8; 32],
        None,
    );
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]));
    TokenValidator::new().validate(&token, &params).expect("actor ignored");
}

#[test]
fn resolver_override_feeds_the_trial() {
    let token = signed_token(json!({"sub": "a"}), &[7u8; 32], Some("opaque"));
    let resolver_key = SecurityKey::symmetric(vec![7u8; 32]).with_key_id("resolved");
    let params = ValidationParameters::new().with_issuer_signing_key_resolver(Arc::new(
        move |_token, _params| vec![resolver_key.clone()],
    ));
    let validated = TokenValidator::new().validate(&token, &params).expect("resolver");
    assert_eq!(
        validated.signing_key.as_ref().and_then(|k| k.key_id()),
        Some("resolved")
    );
}

#[test]
fn issuer_key_binding_rejects_unconfigured_keys() {
    let token = signed_token(json!({"sub": "a"}), &[7u8; 32], None);
    let outside_key = SecurityKey::symmetric(vec![7u8; 32]).with_key_id("outside");
    let params = ValidationParameters::new()
        .with_issuer_signing_key_resolver(Arc::new(move |_token, _params| {
            vec![outside_key.clone()]
        }))
        .with_validate_issuer_signing_key(true);
    let err = TokenValidator::new()
        .validate(&token, &params)
        .expect_err("unbound key");
    assert!(matches!(err, Error::InvalidSigningKey(_)));
}

#[test]
fn signature_validator_override_replaces_builtin_logic() {
    let token = signed_token(json!({"sub": "a"}), &[7u8; 32], None);
    let reads = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&reads);
    let params = ValidationParameters::new().with_signature_validator(Arc::new(
        move |raw: &str, _params: &ValidationParameters| {
            observed.fetch_add(1, Ordering::SeqCst);
            TokenReader::new().read(raw)
        },
    ));
    let validated = TokenValidator::new().validate(&token, &params).expect("override");
    assert!(validated.signing_key.is_none());
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn token_reader_override_is_consulted() {
    let token = signed_token(json!({"sub": "a"}), &[7u8; 32], None);
    let reads = Arc::new(AtomicUsize::new(0));
    let observed = Arc::clone(&reads);
    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]))
        .with_token_reader(Arc::new(move |raw: &str| {
            observed.fetch_add(1, Ordering::SeqCst);
            TokenReader::new().read(raw)
        }));
    TokenValidator::new().validate(&token, &params).expect("reader override");
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn kid_scan_selects_from_the_key_list() {
    let token = signed_token(json!({"sub": "a"}), &[4u8; 32], Some("match"));
    let params = ValidationParameters::new()
        .with_issuer_signing_keys([
            SecurityKey::symmetric(vec![1u8; 32]).with_key_id("other"),
            SecurityKey::symmetric(vec![4u8; 32]).with_key_id("match"),
        ]);
    let validated = TokenValidator::new().validate(&token, &params).expect("kid scan");
    assert_eq!(
        validated.signing_key.as_ref().and_then(|k| k.key_id()),
        Some("match")
    );
}

#[test]
fn x5t_hint_resolves_against_the_primary_key_id() {
    let credentials = SigningCredentials::new(SecurityKey::symmetric(vec![7u8; 32]), "HS256");
    let header = encode_segment(r#"{"alg":"HS256","typ":"JWT","x5t":"thumb"}"#);
    let token = fresh_builder()
        .build_with_encoded_header(&header, &json!({"sub": "a"}), Some(&credentials), None)
        .expect("build");

    let params = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![7u8; 32]).with_key_id("thumb"));
    let validated = TokenValidator::new().validate(&token, &params).expect("x5t");
    assert_eq!(
        validated.signing_key.as_ref().and_then(|k| k.key_id()),
        Some("thumb")
    );
}

fn encode_segment(data: &str) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    URL_SAFE_NO_PAD.encode(data)
}

#[test]
fn oversize_tokens_are_rejected() {
    let reader = TokenReader::new().with_maximum_token_size(32);
    let token = format!("{}.{}.{}", "a".repeat(20), "b".repeat(20), "c".repeat(20));
    assert!(!reader.can_read(&token));
    assert!(matches!(reader.read(&token), Err(Error::InvalidArgument(_))));

    let validator = TokenValidator::new().with_reader(reader);
    assert!(matches!(
        validator.validate(&token, &ValidationParameters::new()),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn seven_segment_input_is_rejected() {
    let reader = TokenReader::new();
    assert!(!reader.can_read("a.b.c.d.e.f.g"));
}

#[test]
fn empty_token_is_an_invalid_argument() {
    let validator = TokenValidator::new();
    assert!(matches!(
        validator.validate("", &ValidationParameters::new()),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        validator.validate("   ", &ValidationParameters::new()),
        Err(Error::InvalidArgument(_))
    ));
}
