#![cfg(feature = "async-validate")]

use jose_compact::{
    EncryptingCredentials, Error, HeaderCache, SecurityKey, SigningCredentials, TokenBuilder,
    TokenValidator, ValidationParameters,
};
use serde_json::json;
use std::sync::Arc;

fn fresh_builder() -> TokenBuilder {
    TokenBuilder::new().with_header_cache(Arc::new(HeaderCache::new()))
}

#[tokio::test]
async fn async_build_and_validate_round_trip() {
    let builder = fresh_builder();
    let credentials =
        SigningCredentials::new(SecurityKey::symmetric(vec![7u8; 32]).with_key_id("k1"), "HS256");
    let token = builder
        .build_async(&json!({"sub": "a"}), Some(&credentials), None)
        .await
        .expect("build");

    let params =
        ValidationParameters::new().with_issuer_signing_key(credentials.key().clone());
    let validated = TokenValidator::new()
        .validate_async(&token, &params)
        .await
        .expect("validate");
    assert_eq!(
        validated.signing_key.as_ref().and_then(|k| k.key_id()),
        Some("k1")
    );
}

#[tokio::test]
async fn async_and_sync_agree_on_rejection() {
    let builder = fresh_builder();
    let credentials = SigningCredentials::new(SecurityKey::symmetric(vec![7u8; 32]), "HS256");
    let token = builder
        .build(&json!({"sub": "a"}), Some(&credentials), None)
        .expect("build");

    let wrong = ValidationParameters::new()
        .with_issuer_signing_key(SecurityKey::symmetric(vec![9u8; 32]));
    let validator = TokenValidator::new();
    let sync_err = validator.validate(&token, &wrong).expect_err("sync");
    let async_err = validator
        .validate_async(&token, &wrong)
        .await
        .expect_err("async");
    assert!(matches!(sync_err, Error::InvalidSignature(_)));
    assert!(matches!(async_err, Error::InvalidSignature(_)));
}

#[tokio::test]
async fn async_validation_decrypts_jwe() {
    let builder = fresh_builder();
    let signing = SigningCredentials::new(SecurityKey::symmetric(vec![7u8; 32]), "HS256");
    let kek = SecurityKey::symmetric(vec![5u8; 16]).with_key_id("kek");
    let encrypting = EncryptingCredentials::new(kek.clone(), "A128KW", "A128CBC-HS256");
    let token = builder
        .build(&json!({"sub": "a"}), Some(&signing), Some(&encrypting))
        .expect("build");

    let params = ValidationParameters::new()
        .with_issuer_signing_key(signing.key().clone())
        .with_token_decryption_key(kek);
    let validated = TokenValidator::new()
        .validate_async(&token, &params)
        .await
        .expect("validate");
    assert_eq!(
        validated.token.claims().and_then(|c| c.get("sub")).and_then(|v| v.as_str()),
        Some("a")
    );
}

#[tokio::test]
async fn async_actor_chain_is_validated() {
    let builder = fresh_builder();
    let actor_credentials =
        SigningCredentials::new(SecurityKey::symmetric(vec![9u8; 32]), "HS256");
    let actor_token = builder
        .build(&json!({"sub": "service"}), Some(&actor_credentials), None)
        .expect("build actor");
    let credentials = SigningCredentials::new(SecurityKey::symmetric(vec![7u8; 32]), "HS256");
    let token = builder
        .build(
            &json!({"sub": "user", "act": actor_token}),
            Some(&credentials),
            None,
        )
        .expect("build");

    let actor_params = ValidationParameters::new()
        .with_issuer_signing_key(actor_credentials.key().clone());
    let params = ValidationParameters::new()
        .with_issuer_signing_key(credentials.key().clone())
        .with_validate_actor(true)
        .with_actor_validation_parameters(actor_params);
    TokenValidator::new()
        .validate_async(&token, &params)
        .await
        .expect("actor chain");
}
