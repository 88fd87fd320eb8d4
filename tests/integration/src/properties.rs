//! Properties that must hold for any input: session handles, token checks,
//! registry start-up, the rendezvous and the parameter-set wire form.

use crate::test_utils::{params, test_service, test_service_with_sessions, TestAuthenticator};
use keystore_access::encode_enroll_id_info;
use keystore_core::{
    AuthAccessType, Algorithm, ChallengeType, Digest, Error, Param, ParamSet, Purpose, Rendezvous,
    Tag, UserAuthType,
};
use keystore_crypto::{init_all, OperationKind, Registry};
use keystore_service::KeystoreService;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn mac_key(service: &KeystoreService, alias: &[u8]) {
    service
        .generate_key(
            alias,
            &params(vec![
                Param::uint32(Tag::ALGORITHM, Algorithm::Hmac.value()),
                Param::uint32(Tag::KEY_SIZE, 256),
                Param::uint32(Tag::PURPOSE, Purpose::MAC.bits()),
                Param::uint32(Tag::DIGEST, Digest::Sha256.value()),
            ]),
        )
        .unwrap();
}

fn mac_init() -> ParamSet {
    params(vec![Param::uint32(Tag::PURPOSE, Purpose::MAC.bits())])
}

fn face_key(service: &KeystoreService, alias: &[u8], challenge: ChallengeType, timeout: Option<u32>) {
    let mut entries = vec![
        Param::uint32(Tag::ALGORITHM, Algorithm::Ed25519.value()),
        Param::uint32(Tag::KEY_SIZE, 256),
        Param::uint32(Tag::PURPOSE, Purpose::SIGN.bits()),
        Param::uint32(Tag::USER_AUTH_TYPE, UserAuthType::FACE.bits()),
        Param::uint32(Tag::CHALLENGE_TYPE, challenge.value()),
        Param::uint32(
            Tag::KEY_AUTH_ACCESS_TYPE,
            AuthAccessType::INVALID_NEW_BIO_ENROLL.bits(),
        ),
        Param::bytes(
            Tag::USER_AUTH_ENROLL_ID_INFO,
            encode_enroll_id_info(&[(UserAuthType::FACE.bits(), 0xE1)]),
        ),
    ];
    if let Some(t) = timeout {
        entries.push(Param::uint32(Tag::AUTH_TIMEOUT, t));
    }
    service.generate_key(alias, &params(entries)).unwrap();
}

fn sign_init() -> ParamSet {
    params(vec![Param::uint32(Tag::PURPOSE, Purpose::SIGN.bits())])
}

#[test]
fn test_unknown_handles_are_not_found() {
    let service = test_service();
    for handle in [0u64, 1, 42, u64::MAX] {
        assert_eq!(
            service.update(handle, &ParamSet::new(), b"x").err(),
            Some(Error::NotExist)
        );
        assert_eq!(
            service.finish(handle, &ParamSet::new(), b"x").err(),
            Some(Error::NotExist)
        );
        assert_eq!(service.abort(handle, &ParamSet::new()).err(), Some(Error::NotExist));
    }
}

#[test]
fn test_aborted_handle_is_gone() {
    let service = test_service();
    mac_key(&service, b"mac");
    let init = service.init(b"mac", &mac_init()).unwrap();
    service.update(init.handle, &ParamSet::new(), b"x").unwrap();
    service.abort(init.handle, &ParamSet::new()).unwrap();
    assert_eq!(
        service.update(init.handle, &ParamSet::new(), b"x").err(),
        Some(Error::NotExist)
    );
    assert_eq!(service.live_sessions(), 0);
}

#[test]
fn test_limit_leaves_existing_sessions_usable() {
    let service = test_service_with_sessions(3);
    mac_key(&service, b"mac");
    let handles: Vec<u64> = (0..3)
        .map(|_| service.init(b"mac", &mac_init()).unwrap().handle)
        .collect();
    assert_eq!(
        service.init(b"mac", &mac_init()).err(),
        Some(Error::SessionReachedLimit)
    );
    for handle in &handles {
        service.update(*handle, &ParamSet::new(), b"data").unwrap();
    }
    let tags: Vec<_> = handles
        .iter()
        .map(|h| service.finish(*h, &ParamSet::new(), b"").unwrap())
        .collect();
    assert!(tags.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(service.live_sessions(), 0);
}

#[test]
fn test_forged_token_fails() {
    let service = test_service();
    face_key(&service, b"face", ChallengeType::Normal, None);
    let face = TestAuthenticator::new(&service, UserAuthType::FACE);

    let init = service.init(b"face", &sign_init()).unwrap();
    let mut token = face.token(&init.challenge, 0);
    token.sign[0] ^= 1;
    let forged = params(vec![Param::bytes(Tag::AUTH_TOKEN, token.to_bytes().to_vec())]);
    assert!(service.update(init.handle, &forged, b"x").is_err());
    assert_eq!(
        service
            .update(init.handle, &face.token_params(&init.challenge, 0), b"x")
            .err(),
        Some(Error::KeyAuthFailed)
    );
}

#[test]
fn test_wrong_challenge_fails() {
    let service = test_service();
    face_key(&service, b"face", ChallengeType::Normal, None);
    let face = TestAuthenticator::new(&service, UserAuthType::FACE);

    let init = service.init(b"face", &sign_init()).unwrap();
    let mut other = init.challenge.to_vec();
    other[31] ^= 0xFF;
    assert_eq!(
        service
            .update(init.handle, &face.token_params(&other, 0), b"x")
            .err(),
        Some(Error::KeyAuthFailed)
    );
}

#[test]
fn test_timeout_without_challenge() {
    let service = test_service();
    face_key(&service, b"face", ChallengeType::None, Some(30));
    let face = TestAuthenticator::new(&service, UserAuthType::FACE);

    // No challenge binding: any session accepts a recent token.
    let init = service.init(b"face", &sign_init()).unwrap();
    service
        .update(init.handle, &face.token_params(&[0u8; 32], 1_000), b"x")
        .unwrap();
    service.finish(init.handle, &ParamSet::new(), b"y").unwrap();

    let init = service.init(b"face", &sign_init()).unwrap();
    assert_eq!(
        service
            .update(init.handle, &face.token_params(&[0u8; 32], 31_000), b"x")
            .err(),
        Some(Error::KeyAuthTimeOut)
    );
}

fn slot_init(pos: u32) -> ParamSet {
    params(vec![
        Param::uint32(Tag::PURPOSE, Purpose::SIGN.bits()),
        Param::uint32(Tag::CHALLENGE_POS, pos),
    ])
}

#[test]
fn test_one_token_serves_custom_slots() {
    let service = test_service();
    face_key(&service, b"face-slots", ChallengeType::Custom, None);
    let face = TestAuthenticator::new(&service, UserAuthType::FACE);

    let first = service.init(b"face-slots", &slot_init(0)).unwrap();
    let second = service.init(b"face-slots", &slot_init(1)).unwrap();
    assert_eq!(first.challenge.len(), 32);

    let mut combined = [0u8; 32];
    combined[..8].copy_from_slice(&first.challenge[..8]);
    combined[8..16].copy_from_slice(&second.challenge[8..16]);
    let token = face.token_params(&combined, 0);
    for init in [&first, &second] {
        service.update(init.handle, &token, b"shared ").unwrap();
        let signature = service.finish(init.handle, &ParamSet::new(), b"approval").unwrap();
        assert_eq!(signature.len(), 64);
    }

    // Right bytes, wrong slot.
    let third = service.init(b"face-slots", &slot_init(0)).unwrap();
    let mut shifted = [0u8; 32];
    shifted[8..16].copy_from_slice(&third.challenge[..8]);
    assert_eq!(
        service
            .update(third.handle, &face.token_params(&shifted, 0), b"x")
            .err(),
        Some(Error::KeyAuthFailed)
    );

    assert_eq!(
        service.init(b"face-slots", &sign_init()).err(),
        Some(Error::InvalidArgument)
    );
    assert_eq!(
        service.init(b"face-slots", &slot_init(4)).err(),
        Some(Error::InvalidArgument)
    );
}

#[test]
fn test_registry_initialises_once() {
    let first = init_all();
    let second = init_all();
    assert!(std::ptr::eq(first, second));
    assert_eq!(first.len(), second.len());
    assert!(!first.is_empty());

    let threads: Vec<_> = (0..4)
        .map(|_| thread::spawn(|| init_all() as *const Registry as usize))
        .collect();
    for t in threads {
        assert_eq!(t.join().unwrap(), first as *const Registry as usize);
    }
    assert!(first.lookup_alg(OperationKind::Sign, Algorithm::Ed25519).is_some());
    assert!(first.lookup(OperationKind::Sign, 0xDEAD).is_none());
}

#[test]
fn test_rendezvous_either_order() {
    let early = Rendezvous::new();
    early.notify();
    early.wait();

    let late = Arc::new(Rendezvous::new());
    let waker = {
        let late = Arc::clone(&late);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            late.notify();
        })
    };
    assert!(late.wait_timeout(Duration::from_secs(5)));
    waker.join().unwrap();
    assert!(!late.wait_timeout(Duration::from_millis(10)));
}

fn arb_param() -> impl Strategy<Value = Param> {
    prop_oneof![
        any::<u32>().prop_map(|v| Param::uint32(Tag::ALGORITHM, v)),
        any::<u32>().prop_map(|v| Param::uint32(Tag::KEY_SIZE, v)),
        any::<u64>().prop_map(|v| Param::uint64(Tag::CREATION_DATETIME, v)),
        any::<bool>().prop_map(|v| Param::boolean(Tag::NO_AUTH_REQUIRED, v)),
        any::<i32>().prop_map(|v| Param::int32(Tag::KEY_AUTH_RESULT, v)),
        prop::collection::vec(any::<u8>(), 1..64).prop_map(|v| Param::bytes(Tag::NONCE, v)),
        prop::collection::vec(any::<u8>(), 1..64).prop_map(|v| Param::bytes(Tag::KEY_ALIAS, v)),
    ]
}

fn arb_set() -> impl Strategy<Value = Vec<Param>> {
    prop::collection::vec(arb_param(), 0..7).prop_map(|mut entries| {
        let mut seen = Vec::new();
        entries.retain(|p| {
            let fresh = !seen.contains(&p.tag);
            seen.push(p.tag);
            fresh
        });
        entries
    })
}

proptest! {
    #[test]
    fn prop_param_set_wire_form_is_stable(entries in arb_set()) {
        let set = ParamSet::from_params(entries).unwrap();
        let bytes = set.to_bytes();
        prop_assert_eq!(bytes.len(), set.total_size() as usize);
        prop_assert!(ParamSet::check_set_validity(&bytes, bytes.len() as u32).is_ok());
        let copy = ParamSet::copy(&bytes, bytes.len() as u32).unwrap();
        prop_assert_eq!(copy.to_bytes(), bytes);
    }

    #[test]
    fn prop_claimed_size_must_match(entries in arb_set(), delta in 1u32..64) {
        let set = ParamSet::from_params(entries).unwrap();
        let bytes = set.to_bytes();
        let size = bytes.len() as u32;
        prop_assert!(ParamSet::check_set_validity(&bytes, size + delta).is_err());
        prop_assert!(ParamSet::check_set_validity(&bytes, size.saturating_sub(delta)).is_err());
    }

    #[test]
    fn prop_merge_prefers_extra(base in arb_set(), extra in arb_set()) {
        let base = ParamSet::from_params(base).unwrap();
        let extra = ParamSet::from_params(extra).unwrap();
        let merged = ParamSet::merge(&base, &extra).unwrap();
        for p in extra.iter() {
            prop_assert_eq!(merged.get(p.tag).unwrap(), p);
        }
        for p in base.iter().filter(|p| !extra.contains(p.tag)) {
            prop_assert_eq!(merged.get(p.tag).unwrap(), p);
        }
    }
}
