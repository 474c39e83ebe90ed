/// Default bind address for the diploma-chain TCP server.
pub const BIND_ADDRESS_DEFAULT: &str = "127.0.0.1:65432";

/// Default mining difficulty (number of leading hex-zero characters a block hash must have).
pub const DIFFICULTY_DEFAULT: u32 = 4;

/// Default size of a miner's nonce-range allocation.
pub const NONCE_RANGE_SIZE_DEFAULT: u64 = 200_000;

/// Lower/upper bound a configured nonce-range size must stay within.
pub const NONCE_RANGE_SIZE_MIN: u64 = 100_000;
pub const NONCE_RANGE_SIZE_MAX: u64 = 400_000;

/// Data directory name (block files, users.json, rewards.json) under HOME.
pub const DATA_DIR: &str = ".diploma-chain/data";

pub struct ServerConfig {
    pub bind_address: String,
    pub data_dir: std::path::PathBuf,
    pub difficulty: u32,
    pub nonce_range_size: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        ServerConfig {
            bind_address: bind_address(),
            data_dir: data_dir(),
            difficulty: difficulty(),
            nonce_range_size: nonce_range_size(),
        }
    }
}

pub fn bind_address() -> String {
    let v = std::env::var("DIPLOMA_CHAIN_BIND").unwrap_or_else(|_| BIND_ADDRESS_DEFAULT.to_string());
    if v.trim().is_empty() {
        BIND_ADDRESS_DEFAULT.to_string()
    } else {
        v
    }
}

pub fn data_dir() -> std::path::PathBuf {
    match std::env::var("DIPLOMA_CHAIN_DATA_DIR") {
        Ok(v) if !v.trim().is_empty() => std::path::PathBuf::from(v),
        _ => std::path::PathBuf::from(resolve_home_dir()).join(DATA_DIR),
    }
}

pub fn difficulty() -> u32 {
    std::env::var("DIPLOMA_CHAIN_DIFFICULTY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DIFFICULTY_DEFAULT)
}

pub fn nonce_range_size() -> u64 {
    let size = std::env::var("DIPLOMA_CHAIN_RANGE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(NONCE_RANGE_SIZE_DEFAULT);
    size.clamp(NONCE_RANGE_SIZE_MIN, NONCE_RANGE_SIZE_MAX)
}

fn resolve_home_dir() -> String {
    if let Ok(home) = std::env::var("HOME") {
        if !home.trim().is_empty() {
            return home;
        }
    }
    #[cfg(windows)]
    {
        if let Ok(home) = std::env::var("USERPROFILE") {
            if !home.trim().is_empty() {
                return home;
            }
        }
        let drive = std::env::var("HOMEDRIVE").unwrap_or_default();
        let path = std::env::var("HOMEPATH").unwrap_or_default();
        if !drive.is_empty() || !path.is_empty() {
            return format!("{drive}{path}");
        }
    }
    ".".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_range_size_clamps_low() {
        unsafe { std::env::set_var("DIPLOMA_CHAIN_RANGE_SIZE", "10") };
        assert_eq!(nonce_range_size(), NONCE_RANGE_SIZE_MIN);
        unsafe { std::env::remove_var("DIPLOMA_CHAIN_RANGE_SIZE") };
    }

    #[test]
    fn default_bind_address_is_loopback() {
        unsafe { std::env::remove_var("DIPLOMA_CHAIN_BIND") };
        assert_eq!(bind_address(), BIND_ADDRESS_DEFAULT);
    }
}
