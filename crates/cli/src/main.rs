use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use sigil_envelope::{pack, unpack};
use sigil_wallet::keys::create_key;
use sigil_wallet::{StorageConfig, Wallet, WalletConfig};

/// Demonstration CLI for the sigil wallet and envelope APIs. Deliberately
/// thin: it wires public-API calls together for a human to watch run, and
/// grows no protocol or agent logic of its own.
#[derive(Parser, Debug)]
#[command(
    name = "sigil",
    about = "Demonstrates the sigil wallet and envelope APIs end to end"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pack and unpack a message between two fresh in-memory wallets.
    Demo {
        /// Message text to seal. Defaults to a friendly greeting.
        #[arg(short, long, default_value = "oh hey there!")]
        message: String,
        /// Use anoncrypt (hides the sender) instead of authcrypt.
        #[arg(long)]
        anonymous: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo { message, anonymous } => run_demo(&message, anonymous),
    }
}

fn run_demo(message: &str, anonymous: bool) -> Result<()> {
    let alice = Wallet::open(WalletConfig {
        passphrase: "alice-demo-passphrase".into(),
        storage: StorageConfig::Memory,
        master_salt: None,
        salt_path: None,
        wrapper_handle: None,
    })
    .map_err(|e| eyre!(e))?;
    let bob = Wallet::open(WalletConfig {
        passphrase: "bob-demo-passphrase".into(),
        storage: StorageConfig::Memory,
        master_salt: None,
        salt_path: None,
        wrapper_handle: None,
    })
    .map_err(|e| eyre!(e))?;

    let alice_kid = create_key(&alice).map_err(|e| eyre!(e))?;
    let bob_kid = create_key(&bob).map_err(|e| eyre!(e))?;
    tracing::info!(alice = %alice_kid, bob = %bob_kid, "generated keys");

    let sender_kid = if anonymous { None } else { Some(alice_kid.as_str()) };
    let envelope = pack(&alice, sender_kid, &[bob_kid], message.as_bytes()).map_err(|e| eyre!(e))?;
    println!("packed envelope:\n{}", serde_json::to_string_pretty(&envelope)?);

    let (plaintext, sender) = unpack(&bob, &envelope).map_err(|e| eyre!(e))?;
    println!("unpacked message: {}", String::from_utf8_lossy(&plaintext));
    match sender {
        Some(kid) => println!("sender verified as: {kid}"),
        None => println!("sender: anonymous"),
    }

    Ok(())
}
