//! SecureChat terminal host
//!
//! Runs the key lifecycle against a file-backed record store. The chat
//! transport is the user: wrapped keys and envelopes are printed as text (or
//! written to files) to be sent through whatever channel the conversation
//! uses.
//!
//! ```text
//! alice$ securechat -u alice -c 123 create-session --recipient-key bob.pem --out 123.key
//!   bob$ securechat -u bob   -c 123 accept-session --wrapped 123.key
//! alice$ securechat -u alice -c 123 encrypt "hello"      # prints envelope
//!   bob$ securechat -u bob   -c 123 decrypt <envelope>   # prints "hello"
//! ```

mod store;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::Serialize;

use securechat_core::crypto::DEFAULT_MODULUS_BITS;
use securechat_core::{
    ChatContext, CiphertextEnvelope, KeyStore, KeyStoreConfig, PublicKey, StaticContext,
    WrappedSessionKey,
};
use store::FileRecordStore;

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "securechat", version, about = "Hybrid RSA / AES-GCM key exchange for chat")]
struct Args {
    /// Directory holding the key records
    #[arg(long, global = true, env = "SECURECHAT_HOME")]
    home: Option<PathBuf>,

    /// Local user id
    #[arg(short, long, global = true, default_value = "me", env = "SECURECHAT_USER")]
    user: String,

    /// Conversation id
    #[arg(short, long, global = true, env = "SECURECHAT_CONVERSATION")]
    conversation: Option<String>,

    /// RSA modulus size for new keypairs
    #[arg(
        long,
        global = true,
        default_value_t = DEFAULT_MODULUS_BITS,
        env = "SECURECHAT_MODULUS_BITS"
    )]
    modulus_bits: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an identity keypair for the current user
    Keygen {
        /// Modulus size, overriding --modulus-bits
        #[arg(long)]
        bits: Option<usize>,
        /// Replace an existing keypair
        #[arg(long)]
        force: bool,
    },
    /// Print the current user's public key
    ExportPublic {
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the SHA-256 fingerprint of a public key
    Fingerprint {
        /// Public key PEM file (defaults to the current user's key)
        #[arg(long)]
        key: Option<PathBuf>,
    },
    /// Create a session key for the conversation, wrapped for the recipient
    CreateSession {
        /// Recipient's public key PEM file
        #[arg(long)]
        recipient_key: PathBuf,
        /// Write the wrapped key to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Replace an existing session key
        #[arg(long)]
        force: bool,
    },
    /// Unwrap a received session key with the current user's private key
    AcceptSession {
        /// File containing the wrapped key (base64)
        #[arg(long)]
        wrapped: PathBuf,
        /// Replace an existing session key
        #[arg(long)]
        force: bool,
    },
    /// Show which keys exist for the current user and conversation
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Encrypt a message for the conversation
    Encrypt {
        /// Message text
        text: String,
        /// Print the envelope as JSON instead of base64
        #[arg(long)]
        json: bool,
    },
    /// Decrypt a message received in the conversation
    Decrypt {
        /// Envelope, as base64 or JSON
        envelope: String,
    },
}

#[derive(Serialize)]
struct StatusReport {
    user_id: String,
    has_identity: bool,
    fingerprint: Option<String>,
    conversation_id: Option<String>,
    has_plaintext_session: bool,
    has_wrapped_session: bool,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "securechat=info,securechat_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    run(args)
}

fn run(args: Args) -> Result<()> {
    let home = match args.home.clone() {
        Some(home) => home,
        None => dirs::data_dir()
            .map(|dir| dir.join("securechat"))
            .ok_or_else(|| eyre!("no data directory found; set SECURECHAT_HOME"))?,
    };

    let modulus_bits = match &args.command {
        Command::Keygen { bits: Some(bits), .. } => *bits,
        _ => args.modulus_bits,
    };
    let config = KeyStoreConfig::default().with_modulus_bits(modulus_bits);

    let store = FileRecordStore::open(&home)
        .wrap_err_with(|| format!("Failed to open key directory {}", home.display()))?;
    tracing::debug!(home = %store.root().display(), "Opened record store");
    let keystore = KeyStore::new(store, config)?;

    let user_id = args.user.clone();

    match args.command {
        Command::Keygen { force, .. } => {
            let keypair = keystore
                .create_identity(&user_id, force)
                .wrap_err("Key generation failed (use --force to replace an existing key)")?;
            println!("{}", keypair.public().fingerprint()?);
        }

        Command::ExportPublic { out } => {
            let pem = keystore.export_public_key(&user_id)?;
            emit(&pem, out.as_deref())?;
        }

        Command::Fingerprint { key } => {
            let public_key = match key {
                Some(path) => PublicKey::from_pem(&read_text(&path)?)
                    .wrap_err_with(|| format!("Invalid public key in {}", path.display()))?,
                None => PublicKey::from_pem(&keystore.export_public_key(&user_id)?)?,
            };
            println!("{}", public_key.fingerprint()?);
        }

        Command::CreateSession {
            recipient_key,
            out,
            force,
        } => {
            let ctx = context(args.conversation, user_id)?;
            let recipient = PublicKey::from_pem(&read_text(&recipient_key)?)
                .wrap_err_with(|| format!("Invalid public key in {}", recipient_key.display()))?;

            let (_, wrapped) = keystore
                .create_and_wrap_session(&ctx.current_conversation_id(), &recipient, force)
                .wrap_err("Could not create session (use --force to replace it)")?;
            emit(&format!("{}\n", wrapped.to_base64()), out.as_deref())?;
        }

        Command::AcceptSession { wrapped, force } => {
            let ctx = context(args.conversation, user_id)?;
            let blob = WrappedSessionKey::from_base64(&read_text(&wrapped)?)?;

            keystore
                .accept_session(
                    &ctx.current_conversation_id(),
                    &ctx.current_user_id(),
                    &blob,
                    force,
                )
                .wrap_err("Could not accept session key")?;
            tracing::info!(
                conversation_id = ctx.current_conversation_id().as_str(),
                "Session ready"
            );
        }

        Command::Status { json } => {
            let has_identity = keystore.has_identity(&user_id)?;
            let fingerprint = if has_identity {
                let pem = keystore.export_public_key(&user_id)?;
                Some(PublicKey::from_pem(&pem)?.fingerprint()?)
            } else {
                None
            };
            let session = match &args.conversation {
                Some(conversation_id) => keystore.session_status(conversation_id)?,
                None => Default::default(),
            };

            let report = StatusReport {
                user_id,
                has_identity,
                fingerprint,
                conversation_id: args.conversation,
                has_plaintext_session: session.has_plaintext,
                has_wrapped_session: session.has_wrapped,
            };
            print_status(&report, json)?;
        }

        Command::Encrypt { text, json } => {
            let ctx = context(args.conversation, user_id)?;
            let envelope = keystore.encrypt_outgoing(&ctx.current_conversation_id(), text.as_bytes())?;
            if json {
                println!("{}", envelope.to_json()?);
            } else {
                println!("{}", envelope.to_base64());
            }
        }

        Command::Decrypt { envelope } => {
            let ctx = context(args.conversation, user_id)?;
            let envelope = parse_envelope(&envelope)?;
            let plaintext = keystore.decrypt_incoming(&ctx.current_conversation_id(), &envelope)?;
            let text = String::from_utf8(plaintext)
                .map_err(|_| eyre!("Decrypted message is not valid UTF-8"))?;
            println!("{}", text);
        }
    }

    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn context(conversation: Option<String>, user_id: String) -> Result<StaticContext> {
    let conversation_id = conversation
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| eyre!("no conversation selected; pass --conversation or set SECURECHAT_CONVERSATION"))?;
    Ok(StaticContext::new(conversation_id, user_id))
}

fn parse_envelope(text: &str) -> Result<CiphertextEnvelope> {
    let text = text.trim();
    let envelope = if text.starts_with('{') {
        CiphertextEnvelope::from_json(text)?
    } else {
        CiphertextEnvelope::from_base64(text)?
    };
    Ok(envelope)
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read {}", path.display()))
}

fn emit(text: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text)
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Wrote output");
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn print_status(report: &StatusReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("user:          {}", report.user_id);
    println!("identity:      {}", yes_no(report.has_identity));
    if let Some(fp) = &report.fingerprint {
        println!("fingerprint:   {}", fp);
    }
    match &report.conversation_id {
        Some(id) => {
            println!("conversation:  {}", id);
            println!("session key:   {}", yes_no(report.has_plaintext_session));
            println!("wrapped key:   {}", yes_no(report.has_wrapped_session));
        }
        None => println!("conversation:  (none selected)"),
    }
    Ok(())
}
