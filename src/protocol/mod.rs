/// Wire protocol spoken with the daemon.
///
/// This module defines the JSON message envelope and the logical service
/// names used for routing.
mod message;

pub use message::Message;

/// Logical service names used in `origin`/`destination`.
pub mod service_names {
    /// The daemon itself; destination of `register_service` and service management.
    pub const DAEMON: &str = "daemon";
    /// Default name a UI client registers under.
    pub const WALLET_UI: &str = "wallet_ui";
    pub const FULL_NODE: &str = "chia_full_node";
    pub const WALLET: &str = "chia_wallet";
    pub const FARMER: &str = "chia_farmer";
    pub const HARVESTER: &str = "chia_harvester";
    pub const TIMELORD: &str = "chia_timelord";
    pub const CRAWLER: &str = "chia_crawler";
    pub const DATA_LAYER: &str = "chia_data_layer";
    pub const PLOTTER: &str = "chia_plotter";
}
