//! End-to-end flows a keystore client runs, from key creation through a
//! completed session.

use crate::test_utils::{params, test_service, TestAuthenticator};
use keystore_access::{SecureSignHeader, SECURE_SIGN_HEADER_LEN};
use keystore_core::{
    AuthAccessType, Algorithm, BlockMode, ChallengeType, Digest, Error, Padding, Param, ParamSet,
    Purpose, SecureSignType, Tag, UserAuthType, MAX_CACHED_DATA,
};
use keystore_service::KeystoreService;

const SECURE_UID: u64 = 0x5EC0_0001;

fn session_run(service: &KeystoreService, alias: &[u8], init: &ParamSet, chunks: &[&[u8]]) -> Vec<u8> {
    let handle = service.init(alias, init).unwrap().handle;
    let mut out = Vec::new();
    let (last, body) = chunks.split_last().unwrap();
    for chunk in body {
        out.extend_from_slice(&service.update(handle, &ParamSet::new(), chunk).unwrap());
    }
    out.extend_from_slice(&service.finish(handle, &ParamSet::new(), last).unwrap());
    out
}

#[test]
fn test_aes_gcm_session_roundtrip() {
    let service = test_service();
    service
        .generate_key(
            b"aes",
            &params(vec![
                Param::uint32(Tag::ALGORITHM, Algorithm::Aes.value()),
                Param::uint32(Tag::KEY_SIZE, 256),
                Param::uint32(Tag::PURPOSE, (Purpose::ENCRYPT | Purpose::DECRYPT).bits()),
                Param::uint32(Tag::BLOCK_MODE, BlockMode::Gcm.value()),
                Param::uint32(Tag::PADDING, Padding::None.value()),
            ]),
        )
        .unwrap();

    let usage = |purpose: Purpose| {
        params(vec![
            Param::uint32(Tag::PURPOSE, purpose.bits()),
            Param::bytes(Tag::NONCE, vec![0x42; 12]),
            Param::bytes(Tag::ASSOCIATED_DATA, b"header".to_vec()),
        ])
    };

    let sealed = session_run(&service, b"aes", &usage(Purpose::ENCRYPT), &[&b"hel"[..], &b"lo"[..]]);
    assert_eq!(sealed.len(), 5 + 16);
    assert_ne!(&sealed[..5], b"hello");

    let opened = session_run(
        &service,
        b"aes",
        &usage(Purpose::DECRYPT),
        &[&sealed[..7], &sealed[7..]],
    );
    assert_eq!(opened, b"hello");

    let mut tampered = sealed.clone();
    tampered[0] ^= 0x80;
    let handle = service.init(b"aes", &usage(Purpose::DECRYPT)).unwrap().handle;
    assert!(service.finish(handle, &ParamSet::new(), &tampered).is_err());
    assert_eq!(service.live_sessions(), 0);
}

#[test]
fn test_gcm_session_input_is_bounded() {
    let service = test_service();
    service
        .generate_key(
            b"aes-bulk",
            &params(vec![
                Param::uint32(Tag::ALGORITHM, Algorithm::Aes.value()),
                Param::uint32(Tag::KEY_SIZE, 256),
                Param::uint32(Tag::PURPOSE, Purpose::ENCRYPT.bits()),
                Param::uint32(Tag::BLOCK_MODE, BlockMode::Gcm.value()),
                Param::uint32(Tag::PADDING, Padding::None.value()),
            ]),
        )
        .unwrap();
    let init = service
        .init(
            b"aes-bulk",
            &params(vec![
                Param::uint32(Tag::PURPOSE, Purpose::ENCRYPT.bits()),
                Param::bytes(Tag::NONCE, vec![7; 12]),
            ]),
        )
        .unwrap();

    let chunk = vec![0u8; 1024 * 1024];
    for _ in 0..MAX_CACHED_DATA / chunk.len() {
        service.update(init.handle, &ParamSet::new(), &chunk).unwrap();
    }
    assert_eq!(
        service.update(init.handle, &ParamSet::new(), b"one byte too many").err(),
        Some(Error::InvalidArgument)
    );
    // The rejected update leaves the buffered message intact.
    let sealed = service.finish(init.handle, &ParamSet::new(), b"").unwrap();
    assert_eq!(sealed.len(), MAX_CACHED_DATA + 16);
}

fn pin_bound_rsa(service: &KeystoreService, alias: &[u8], extra: Vec<Param>) {
    let mut entries = vec![
        Param::uint32(Tag::ALGORITHM, Algorithm::Rsa.value()),
        Param::uint32(Tag::KEY_SIZE, 2048),
        Param::uint32(Tag::PURPOSE, (Purpose::SIGN | Purpose::VERIFY).bits()),
        Param::uint32(Tag::DIGEST, Digest::Sha256.value()),
        Param::uint32(Tag::PADDING, Padding::Pss.value()),
        Param::uint32(Tag::USER_AUTH_TYPE, UserAuthType::PIN.bits()),
        Param::uint32(Tag::CHALLENGE_TYPE, ChallengeType::Normal.value()),
        Param::uint32(
            Tag::KEY_AUTH_ACCESS_TYPE,
            AuthAccessType::INVALID_CLEAR_PASSWORD.bits(),
        ),
        Param::bytes(Tag::USER_AUTH_SECURE_UID, SECURE_UID.to_le_bytes().to_vec()),
        Param::uint32(
            Tag::KEY_SECURE_SIGN_TYPE,
            SecureSignType::WithAuthInfo.value(),
        ),
    ];
    entries.extend(extra);
    service.generate_key(alias, &params(entries)).unwrap();
}

#[test]
fn test_pin_bound_rsa_secure_sign() {
    let service = test_service();
    pin_bound_rsa(&service, b"rsa", vec![]);
    let pin = TestAuthenticator::new(&service, UserAuthType::PIN);
    let sign = params(vec![Param::uint32(Tag::PURPOSE, Purpose::SIGN.bits())]);

    let init = service.init(b"rsa", &sign).unwrap();
    assert_eq!(init.challenge.len(), 32);
    let token = pin.token(&init.challenge, 0);
    let auth = params(vec![Param::bytes(Tag::AUTH_TOKEN, token.to_bytes().to_vec())]);
    let head = service.update(init.handle, &auth, b"transfer ").unwrap();
    assert!(head.is_empty());
    let signed = service
        .finish(init.handle, &ParamSet::new(), b"100 to alice")
        .unwrap();

    let expected = SecureSignHeader::from_token(&token).to_bytes();
    assert_eq!(&signed[..SECURE_SIGN_HEADER_LEN], &expected[..]);
    assert_eq!(signed.len(), SECURE_SIGN_HEADER_LEN + 256);

    let verify = params(vec![Param::uint32(Tag::PURPOSE, Purpose::VERIFY.bits())]);
    let init = service.init(b"rsa", &verify).unwrap();
    service
        .update(init.handle, &pin.token_params(&init.challenge, 0), b"transfer 100 to alice")
        .unwrap();
    service.finish(init.handle, &ParamSet::new(), &signed).unwrap();
}

#[test]
fn test_stale_token_times_out() {
    let service = test_service();
    pin_bound_rsa(&service, b"rsa-timeout", vec![Param::uint32(Tag::AUTH_TIMEOUT, 60)]);
    let pin = TestAuthenticator::new(&service, UserAuthType::PIN);

    let init = service
        .init(
            b"rsa-timeout",
            &params(vec![Param::uint32(Tag::PURPOSE, Purpose::SIGN.bits())]),
        )
        .unwrap();
    let stale = pin.token_params(&init.challenge, 120_000);
    assert_eq!(
        service.update(init.handle, &stale, b"late").err(),
        Some(Error::KeyAuthTimeOut)
    );
    // The failure sticks even once a fresh token shows up.
    let fresh = pin.token_params(&init.challenge, 0);
    assert_eq!(
        service.finish(init.handle, &fresh, b"").err(),
        Some(Error::KeyAuthFailed)
    );
}

#[test]
fn test_cleared_password_invalidates_key() {
    let service = test_service();
    pin_bound_rsa(&service, b"rsa-reset", vec![]);
    let mut pin = TestAuthenticator::new(&service, UserAuthType::PIN);
    pin.secure_uid = SECURE_UID + 1;

    let init = service
        .init(
            b"rsa-reset",
            &params(vec![Param::uint32(Tag::PURPOSE, Purpose::SIGN.bits())]),
        )
        .unwrap();
    assert_eq!(
        service
            .update(init.handle, &pin.token_params(&init.challenge, 0), b"x")
            .err(),
        Some(Error::KeyAuthPermanentlyInvalidated)
    );
}

#[test]
fn test_corrupted_param_set_rejected() {
    let set = params(vec![
        Param::uint32(Tag::ALGORITHM, Algorithm::Hmac.value()),
        Param::bytes(Tag::KEY_ALIAS, b"alias".to_vec()),
        Param::bytes(Tag::ASSOCIATED_DATA, vec![1, 2, 3]),
    ]);
    let bytes = set.to_bytes();
    let size = bytes.len() as u32;
    ParamSet::check_set_validity(&bytes, size).unwrap();
    assert_eq!(ParamSet::copy(&bytes, size).unwrap().params(), set.params());

    let mut bad_count = bytes.clone();
    bad_count[4..8].copy_from_slice(&2u32.to_le_bytes());
    assert_eq!(
        ParamSet::check_set_validity(&bad_count, size),
        Err(Error::InvalidArgument)
    );

    let mut bad_size = bytes.clone();
    bad_size[0..4].copy_from_slice(&(size + 4).to_le_bytes());
    assert_eq!(
        ParamSet::check_set_validity(&bad_size, size),
        Err(Error::InvalidArgument)
    );

    let mut truncated = bytes.clone();
    truncated.truncate(bytes.len() - 1);
    assert!(ParamSet::check_set_validity(&truncated, size).is_err());
    assert!(ParamSet::copy(&truncated, size - 1).is_err());
}

#[test]
fn test_dispatched_session() {
    use keystore_core::ExternalCode;
    use keystore_service::Dispatcher;

    let dispatcher = Dispatcher::spawn(test_service()).unwrap();
    let create = params(vec![
        Param::uint32(Tag::ALGORITHM, Algorithm::Hmac.value()),
        Param::uint32(Tag::KEY_SIZE, 256),
        Param::uint32(Tag::PURPOSE, Purpose::MAC.bits()),
        Param::uint32(Tag::DIGEST, Digest::Sha256.value()),
    ]);
    assert!(dispatcher.call(move |s| s.generate_key(b"mac", &create)).is_success());

    let mac = params(vec![Param::uint32(Tag::PURPOSE, Purpose::MAC.bits())]);
    let init = dispatcher.call(move |s| s.init(b"mac", &mac)).output.unwrap();
    let handle = init.handle;
    assert!(dispatcher
        .call(move |s| s.update(handle, &ParamSet::new(), b"part one "))
        .is_success());
    let tag = dispatcher
        .call(move |s| s.finish(handle, &ParamSet::new(), b"part two"))
        .output
        .unwrap();
    assert_eq!(tag.len(), 32);

    let again = dispatcher.call(move |s| s.finish(handle, &ParamSet::new(), b""));
    assert_eq!(again.result.code, ExternalCode::ItemNotExist);
}
