//! Farmer proxy: reward targets and the farmer's push events.
//!
//! The farmer pushes `new_signage_point` whenever it receives a signage
//! point from the full node, and `new_farming_info` after its harvesters
//! answer one.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ServiceProxy;
use crate::protocol::service_names;
use crate::{ClientHandle, Result, SubscriptionHandle};

pub const NEW_SIGNAGE_POINT: &str = "new_signage_point";
pub const NEW_FARMING_INFO: &str = "new_farming_info";

/// Signage point as reported by the farmer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SignagePoint {
    pub challenge_hash: String,
    pub challenge_chain_sp: String,
    pub reward_chain_sp: String,
    pub difficulty: u64,
    pub sub_slot_iters: u64,
    pub signage_point_index: u32,
    #[serde(default)]
    pub peak_height: Option<u32>,
}

/// Payload of `new_signage_point`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewSignagePoint {
    pub signage_point: SignagePoint,
    #[serde(default)]
    pub proofs: Vec<Value>,
}

/// Harvester results for one signage point.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FarmingInfo {
    pub challenge_hash: String,
    pub signage_point: String,
    pub passed_filter: u32,
    pub proofs: u32,
    pub total_plots: u32,
    pub timestamp: u64,
    #[serde(default)]
    pub node_id: Option<String>,
    #[serde(default)]
    pub lookup_time: Option<f64>,
}

/// Payload of `new_farming_info`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewFarmingInfo {
    pub farming_info: FarmingInfo,
}

/// Answer to `get_reward_targets`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RewardTargets {
    pub farmer_target: String,
    pub pool_target: String,
    /// Only present when the private-key search was requested.
    #[serde(default)]
    pub have_farmer_sk: Option<bool>,
    #[serde(default)]
    pub have_pool_sk: Option<bool>,
}

#[derive(Serialize)]
struct RewardTargetsRequest {
    search_for_private_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_ph_to_search: Option<u32>,
}

/// Proxy for the farmer service, reached through the daemon.
#[derive(Clone)]
pub struct FarmerProxy {
    proxy: ServiceProxy,
}

impl FarmerProxy {
    // ---

    pub fn new(handle: ClientHandle) -> Self {
        Self {
            proxy: ServiceProxy::new(handle, service_names::FARMER),
        }
    }

    pub fn proxy(&self) -> &ServiceProxy {
        &self.proxy
    }

    /// Current farmer and pool reward addresses.
    ///
    /// With `search_for_private_key` the farmer also reports whether it holds
    /// the keys for those addresses, searching up to `max_ph_to_search`
    /// derivations.
    pub async fn get_reward_targets(
        &self,
        search_for_private_key: bool,
        max_ph_to_search: Option<u32>,
    ) -> Result<RewardTargets> {
        // ---
        let request = RewardTargetsRequest {
            search_for_private_key,
            max_ph_to_search,
        };
        self.proxy.call("get_reward_targets", &request).await
    }

    pub fn on_new_signage_point<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(NewSignagePoint) + Send + Sync + 'static,
    {
        self.proxy.on(NEW_SIGNAGE_POINT, callback)
    }

    pub fn on_new_farming_info<F>(&self, callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(NewFarmingInfo) + Send + Sync + 'static,
    {
        self.proxy.on(NEW_FARMING_INFO, callback)
    }

    pub fn off(&self, subscription: &SubscriptionHandle) -> bool {
        self.proxy.off(subscription)
    }
}
