//! # Hybrid Encryption Demo
//!
//! Alice and Bob set up an encrypted conversation over a channel they do not
//! trust, each with their own key store.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example hybrid_demo
//! ```

use securechat_core::{Error, KeyStore, MemoryRecordStore, PublicKey, WrappedSessionKey};

const CONVERSATION: &str = "123";

fn main() {
    println!("=== SecureChat Core: Hybrid Encryption Demo ===\n");

    let alice = KeyStore::with_defaults(MemoryRecordStore::new());
    let bob = KeyStore::with_defaults(MemoryRecordStore::new());

    // Step 1: Bob creates his identity keypair and shares the public half
    println!("Step 1: Bob generates a 2048-bit RSA keypair...");
    let bob_keys = bob
        .create_identity("bob", false)
        .expect("Failed to create Bob's keypair");
    let bob_pem = bob
        .export_public_key("bob")
        .expect("Failed to export Bob's public key");
    println!(
        "  Bob's fingerprint: {}",
        bob_keys.public().fingerprint().expect("fingerprint")
    );
    println!("  Bob sends his public key to Alice:\n");
    for line in bob_pem.lines().take(3) {
        println!("    {}", line);
    }
    println!("    ...\n");

    // Step 2: Alice imports it and creates the session key
    println!("Step 2: Alice creates a session key and wraps it for Bob...");
    let bob_public = PublicKey::from_pem(&bob_pem).expect("Alice could not import Bob's key");
    let (_, wrapped) = alice
        .create_and_wrap_session(CONVERSATION, &bob_public, false)
        .expect("Failed to create session");
    let blob = wrapped.to_base64();
    println!(
        "  Wrapped key ({} bytes): {}...\n",
        wrapped.as_bytes().len(),
        &blob[..32]
    );

    // Step 3: Bob unwraps with his private key
    println!("Step 3: Bob unwraps the session key with his private key...");
    let received = WrappedSessionKey::from_base64(&blob).expect("Invalid blob");
    bob.accept_session(CONVERSATION, "bob", &received, false)
        .expect("Bob could not unwrap the session key");
    println!("  Session ready on both sides\n");

    // Step 4: Messages
    println!("Step 4: Alice sends an encrypted message...");
    let envelope = alice
        .encrypt_outgoing(CONVERSATION, b"Hello, Bob!")
        .expect("Encryption failed");
    println!("  Envelope: {}", envelope.to_base64());

    let plaintext = bob
        .decrypt_incoming(CONVERSATION, &envelope)
        .expect("Decryption failed");
    println!("  Bob reads: {}\n", String::from_utf8_lossy(&plaintext));

    // Step 5: Tampering is detected
    println!("Step 5: An attacker flips one bit in transit...");
    let mut tampered = envelope.clone();
    if let Some(byte) = tampered.ciphertext.first_mut() {
        *byte ^= 0x01;
    }
    match bob.decrypt_incoming(CONVERSATION, &tampered) {
        Err(Error::Decryption(reason)) => println!("  Rejected: {}\n", reason),
        other => println!("  Unexpected result: {:?}\n", other),
    }

    // Step 6: Regenerating requires confirmation
    println!("Step 6: Alice tries to regenerate the session key...");
    match alice.create_and_wrap_session(CONVERSATION, &bob_public, false) {
        Err(e @ Error::OverwriteRefused(_)) => println!("  {}", e),
        other => println!("  Unexpected result: {:?}", other.map(|_| ())),
    }

    println!("\n=== Demo Complete ===");
}
