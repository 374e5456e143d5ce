//! Node configuration
//!
//! Loaded once at startup from the environment (a `.env` file is read
//! first if present):
//!
//! | Variable            | Default                  | Meaning                          |
//! |---------------------|--------------------------|----------------------------------|
//! | `MARKET_DATA_DIR`   | `/var/lib/marketd`       | redb database location           |
//! | `MARKET_ID`         | `DEFAULT`                | market the node participates in  |
//! | `MARKET_ADDRESS`    | —                        | this node's profile address      |
//! | `MARKET_PEER_ADDRESS` | —                      | counterparty address for stdin traffic |
//! | `WALLET_RPC_URL`    | `http://localhost:8332`  | wallet daemon JSON-RPC endpoint  |
//! | `WALLET_RPC_USER`   | `rpc`                    | JSON-RPC basic auth user         |
//! | `WALLET_RPC_PASSWORD` | empty                  | JSON-RPC basic auth password     |

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: String,
    pub market: String,
    pub address: String,
    pub peer_address: String,
    pub wallet_rpc_url: String,
    pub wallet_rpc_user: String,
    pub wallet_rpc_password: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("MARKET_DATA_DIR")
                .unwrap_or_else(|_| "/var/lib/marketd".into()),
            market: std::env::var("MARKET_ID").unwrap_or_else(|_| "DEFAULT".into()),
            address: std::env::var("MARKET_ADDRESS").unwrap_or_default(),
            peer_address: std::env::var("MARKET_PEER_ADDRESS").unwrap_or_default(),
            wallet_rpc_url: std::env::var("WALLET_RPC_URL")
                .unwrap_or_else(|_| "http://localhost:8332".into()),
            wallet_rpc_user: std::env::var("WALLET_RPC_USER").unwrap_or_else(|_| "rpc".into()),
            wallet_rpc_password: std::env::var("WALLET_RPC_PASSWORD").unwrap_or_default(),
        }
    }

    /// Create a config with custom overrides
    pub fn with_overrides(data_dir: impl Into<String>, address: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.data_dir = data_dir.into();
        config.address = address.into();
        config
    }

    /// Path of the redb database file inside the data directory
    pub fn db_path(&self) -> std::path::PathBuf {
        std::path::Path::new(&self.data_dir).join("market.redb")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
