use std::sync::Arc;

use crate::accounts::AccountSources;
use crate::keepalive::probe::PlatformProbe;
use crate::store::StatusStore;

/// Shared handler state. Account sources are captured once at startup and
/// re-resolved per request, so every trigger sees the same registry a
/// scheduled run would. The probe and store arrive fully configured; no
/// handler needs the raw settings.
#[derive(Clone)]
pub struct AppState {
    pub sources: AccountSources,
    pub probe: Arc<dyn PlatformProbe>,
    pub store: StatusStore,
}
