//! Shared application state for the gateway

use amicale_auth::SessionDirectory;
use amicale_config::RealtimeConfig;
use amicale_realtime::RealtimeCore;

/// Everything a connection handler needs: the serialized realtime core, the
/// session directory fed by the portal's auth component, and the tunables.
#[derive(Clone)]
pub struct GatewayState {
    pub core: RealtimeCore,
    pub sessions: SessionDirectory,
    pub realtime: RealtimeConfig,
}

impl GatewayState {
    pub fn new(core: RealtimeCore, sessions: SessionDirectory, realtime: RealtimeConfig) -> Self {
        Self {
            core,
            sessions,
            realtime,
        }
    }
}
