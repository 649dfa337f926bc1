//! Integration tests for the mutual authentication handshake

use std::time::{Duration, Instant};

use common::crypto::{ChallengeCrypto, Ed25519Challenge, SecretKey};
use common::handshake::{Handshake, HandshakeOutcome, CHALLENGE_LEN};
use common::testkit;
use common::wire::{read_chunk, write_chunk, write_public_key, Deadline};

const BUDGET: Duration = Duration::from_secs(1);

#[tokio::test]
async fn test_honest_peers_authenticate_each_other() {
    let ours = SecretKey::generate();
    let theirs = SecretKey::generate();

    let (outcome_a, outcome_b) = testkit::handshake_pair(&ours, &theirs, BUDGET).await;

    // each side recovers the other's correct public key
    assert_eq!(
        outcome_a.unwrap(),
        HandshakeOutcome::Authenticated(theirs.public())
    );
    assert_eq!(
        outcome_b.unwrap(),
        HandshakeOutcome::Authenticated(ours.public())
    );
}

#[tokio::test]
async fn test_silent_peer_times_out_within_budget() {
    let ours = SecretKey::generate();
    let (mut stream, other_end) = testkit::link();

    let started = Instant::now();
    let outcome = Handshake::new(Ed25519Challenge)
        .authenticate(&mut stream, &ours, BUDGET)
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));
    drop(other_end);
}

#[tokio::test]
async fn test_peer_that_never_sends_proof_times_out() {
    let ours = SecretKey::generate();
    let theirs = SecretKey::generate();
    let (mut stream, mut peer_end) = testkit::link();

    // the peer announces itself and then goes quiet before the proof step
    let peer = tokio::spawn(async move {
        write_public_key(&mut peer_end, &theirs.public())
            .await
            .unwrap();
        write_chunk(&mut peer_end, &[0xaa; CHALLENGE_LEN]).await.unwrap();
        // drain what the honest side sent, then stall
        let _ = read_chunk(&mut peer_end).await;
        let _ = read_chunk(&mut peer_end).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(peer_end);
    });

    let started = Instant::now();
    let outcome = Handshake::new(Ed25519Challenge)
        .authenticate(&mut stream, &ours, BUDGET)
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(5));
    peer.abort();
}

#[tokio::test]
async fn test_tampered_proof_is_rejected_not_errored() {
    let ours = SecretKey::generate();
    let theirs = SecretKey::generate();
    let (mut stream, mut peer_end) = testkit::link();

    // a peer that signs something other than the XOR of both challenges
    let peer = tokio::spawn(async move {
        let crypto = Ed25519Challenge;
        let my_challenge = [0xbb; CHALLENGE_LEN];
        write_public_key(&mut peer_end, &theirs.public())
            .await
            .unwrap();
        write_chunk(&mut peer_end, &my_challenge).await.unwrap();

        let _their_key = read_chunk(&mut peer_end).await.unwrap();
        let _their_challenge = read_chunk(&mut peer_end).await.unwrap();

        // signs only its own challenge, not the mixed value
        let bogus_proof = crypto.sign(&my_challenge, &theirs);
        write_chunk(&mut peer_end, &bogus_proof).await.unwrap();
    });

    let outcome = Handshake::new(Ed25519Challenge)
        .authenticate(&mut stream, &ours, BUDGET)
        .await
        .unwrap();

    assert_eq!(outcome, HandshakeOutcome::Rejected);
    peer.await.unwrap();
}

#[tokio::test]
async fn test_replayed_transcript_is_rejected() {
    let ours = SecretKey::generate();
    let theirs = SecretKey::generate();
    let crypto = Ed25519Challenge;

    // session 1: capture the victim's announcement and proof
    let captured_challenge = [0xcc; CHALLENGE_LEN];
    let session_one_peer_challenge = [0xdd; CHALLENGE_LEN];
    let mixed_one: Vec<u8> = captured_challenge
        .iter()
        .zip(&session_one_peer_challenge)
        .map(|(a, b)| a ^ b)
        .collect();
    let captured_proof = crypto.sign(&mixed_one, &theirs);

    // session 2: an attacker replays key, challenge, and proof verbatim
    let (mut stream, mut attacker_end) = testkit::link();
    let attacker = tokio::spawn(async move {
        write_public_key(&mut attacker_end, &theirs.public())
            .await
            .unwrap();
        write_chunk(&mut attacker_end, &captured_challenge)
            .await
            .unwrap();

        let _key = read_chunk(&mut attacker_end).await.unwrap();
        let _fresh_challenge = read_chunk(&mut attacker_end).await.unwrap();
        write_chunk(&mut attacker_end, &captured_proof).await.unwrap();
    });

    let outcome = Handshake::new(Ed25519Challenge)
        .authenticate(&mut stream, &ours, BUDGET)
        .await
        .unwrap();

    // the honest side mixed in a fresh nonce, so the stale proof cannot hold
    assert_eq!(outcome, HandshakeOutcome::Rejected);
    attacker.await.unwrap();
}

#[tokio::test]
async fn test_mismatched_challenge_length_is_a_protocol_error() {
    let ours = SecretKey::generate();
    let theirs = SecretKey::generate();
    let (mut stream, mut peer_end) = testkit::link();

    let peer = tokio::spawn(async move {
        write_public_key(&mut peer_end, &theirs.public())
            .await
            .unwrap();
        write_chunk(&mut peer_end, &[0xee; CHALLENGE_LEN / 2])
            .await
            .unwrap();
        let _ = read_chunk(&mut peer_end).await;
        let _ = read_chunk(&mut peer_end).await;
    });

    let result = Handshake::new(Ed25519Challenge)
        .authenticate(&mut stream, &ours, BUDGET)
        .await;

    assert!(result.is_err(), "length mismatch is a fault, not an outcome");
    peer.await.unwrap();
}

#[tokio::test]
async fn test_step_methods_compose_manually() {
    // drive the four protocol steps by hand on both sides
    let key_a = SecretKey::generate();
    let key_b = SecretKey::generate();
    let (mut stream_a, mut stream_b) = testkit::link();
    let handshake = Handshake::new(Ed25519Challenge);

    let challenge_a = [0x01; CHALLENGE_LEN];
    let challenge_b = [0x02; CHALLENGE_LEN];

    handshake
        .send_challenge(&mut stream_a, &key_a.public(), &challenge_a)
        .await
        .unwrap();
    handshake
        .send_challenge(&mut stream_b, &key_b.public(), &challenge_b)
        .await
        .unwrap();

    let deadline = Deadline::after(BUDGET);
    let (seen_b, challenge_from_b) = handshake
        .receive_challenge(&mut stream_a, &deadline)
        .await
        .unwrap()
        .unwrap();
    let (seen_a, challenge_from_a) = handshake
        .receive_challenge(&mut stream_b, &deadline)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen_b, key_b.public());
    assert_eq!(seen_a, key_a.public());

    handshake
        .send_challenge_response(&mut stream_a, &key_a, &challenge_a, &challenge_from_b)
        .await
        .unwrap();
    handshake
        .send_challenge_response(&mut stream_b, &key_b, &challenge_b, &challenge_from_a)
        .await
        .unwrap();

    let valid_on_a = handshake
        .receive_challenge_response(&mut stream_a, &challenge_a, &challenge_from_b, &seen_b, &deadline)
        .await
        .unwrap();
    let valid_on_b = handshake
        .receive_challenge_response(&mut stream_b, &challenge_b, &challenge_from_a, &seen_a, &deadline)
        .await
        .unwrap();
    assert_eq!(valid_on_a, Some(true));
    assert_eq!(valid_on_b, Some(true));
}
