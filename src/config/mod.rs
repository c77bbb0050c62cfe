pub mod loader;
pub mod schema;

pub use loader::{get_config_path, get_opsrelay_home, load_config, save_config};
pub use schema::{ChatConfig, Config, FtpConfig, GatewayConfig, LogSinkConfig};
