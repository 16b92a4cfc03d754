//! Small shared pieces that every other crate in the workspace leans on.
//!
//! Right now that's just the log targets and the subscriber setup, but anything
//! that needs to be agreed upon workspace-wide belongs here.

pub mod logger;

/// Log targets that we route `tracing` events through.
///
/// Usage mirrors any other target string:
///
/// ```no_run
/// use awbw_integrations::Log;
///
/// tracing::info!(target: Log::Catalog, "Scanning replay folder");
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Log;

#[allow(non_upper_case_globals)]
impl Log {
    /// Anything related to the HTTP client.
    pub const Api: &'static str = "awbw::api";

    /// Replay store scanning, ingestion, and index persistence.
    pub const Catalog: &'static str = "awbw::catalog";

    /// Background username resolution.
    pub const Enrichment: &'static str = "awbw::enrichment";

    /// Driving actions against game state.
    pub const Playback: &'static str = "awbw::playback";

    /// Container parsing and action decoding.
    pub const Replay: &'static str = "awbw::replay";

    /// Every target we know about, in a stable order.
    pub const ALL: [&'static str; 5] = [Self::Api, Self::Catalog, Self::Enrichment, Self::Playback, Self::Replay];
}
