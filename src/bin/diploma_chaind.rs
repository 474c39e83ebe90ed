use std::sync::Arc;

use colored::Colorize;
use diploma_chain::chain::GenesisMaterial;
use diploma_chain::config;
use diploma_chain::crypto::keys;
use diploma_chain::diploma::DiplomaRecord;
use diploma_chain::state::ServerState;

fn banner() {
    println!(
        "{}",
        r#"
  ____  _       _                          ____ _           _
 |  _ \(_)_ __ | | ___  _ __ ___   __ _   / ___| |__   __ _(_)_ __
 | | | | | '_ \| |/ _ \| '_ ` _ \ / _` | | |   | '_ \ / _` | | '_ \
 | |_| | | |_) | | (_) | | | | | | (_| | | |___| | | | (_| | | | | |
 |____/|_| .__/|_|\___/|_| |_| |_|\__,_|  \____|_| |_|\__,_|_|_| |_|
         |_|
"#
        .bright_cyan()
    );
}

/// Placeholder genesis diploma, minted only when the chain directory is
/// empty and no operator-supplied genesis exists. MUST NOT be mistaken for a
/// real institutional record — it exists purely to seed block 0's hash link.
fn placeholder_genesis() -> std::io::Result<GenesisMaterial> {
    let (private_key, public_key) = keys::generate_keypair()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let mut diploma = DiplomaRecord {
        institution: "Genesis Authority".to_string(),
        full_name: "Genesis Block".to_string(),
        program: "N/A".to_string(),
        qualification: "N/A".to_string(),
        specialty: "N/A".to_string(),
        issue_date: "1970-01-01".to_string(),
        reg_number: "GENESIS-0".to_string(),
        rector_name: "N/A".to_string(),
        secretary_name: "N/A".to_string(),
        signature: String::new(),
    };
    diploma.sign(&private_key).map_err(|e| std::io::Error::other(e.to_string()))?;
    let public_key_pem = keys::public_key_to_pem(&public_key).map_err(|e| std::io::Error::other(e.to_string()))?;

    Ok(GenesisMaterial {
        diploma_data: diploma,
        public_key_pem,
        difficulty: config::difficulty(),
    })
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    banner();

    let bind_address = config::bind_address();
    let data_dir = config::data_dir();
    let nonce_range_size = config::nonce_range_size();

    println!("{} data directory: {}", "[init]".bright_blue().bold(), data_dir.display());
    std::fs::create_dir_all(&data_dir)?;

    let needs_genesis = std::fs::read_dir(&data_dir)?.filter_map(|e| e.ok()).all(|e| {
        !e.file_name().to_string_lossy().starts_with("Block_")
    });
    let genesis = if needs_genesis {
        println!("{} chain directory is empty, minting placeholder genesis block", "[init]".bright_blue().bold());
        Some(placeholder_genesis()?)
    } else {
        None
    };

    let state = ServerState::open(data_dir, genesis, nonce_range_size)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    println!("{} blockchain loaded", "[chain]".bright_green().bold());

    let state = Arc::new(state);
    diploma_chain::server::run(&bind_address, state).await
}
