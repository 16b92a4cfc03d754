//! Filling in player usernames from the site.
//!
//! Replays only carry site user ids. Names are looked up one player at a time,
//! cached across replays, and retried a bounded number of times per run.

use std::collections::VecDeque;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use awbw_api::UsernameLookup;
use awbw_config::AwbwConfig;
use awbw_integrations::Log;
use awbw_replay::ReplayInfo;

use crate::{CatalogEvent, CatalogState, EnrichmentError, UsernameCache};

/// How hard a single enrichment run tries before giving up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// A run aborts once this many lookups have failed.
    pub max_failures: u32,

    /// Pause after a failed lookup.
    pub retry_delay: Duration,

    /// Pause after a successful lookup when more remain.
    pub lookup_spacing: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AwbwConfig) -> Self {
        Self {
            max_failures: config.max_lookup_failures(),
            retry_delay: config.lookup_retry_delay(),
            lookup_spacing: config.lookup_spacing(),
        }
    }

    /// No waiting at all; for tests and hosts that rate limit elsewhere.
    pub fn immediate(max_failures: u32) -> Self {
        Self {
            max_failures,
            retry_delay: Duration::ZERO,
            lookup_spacing: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_failures: awbw_config::DEFAULT_MAX_LOOKUP_FAILURES,
            retry_delay: Duration::from_millis(awbw_config::DEFAULT_LOOKUP_RETRY_DELAY_MS),
            lookup_spacing: Duration::from_millis(awbw_config::DEFAULT_LOOKUP_SPACING_MS),
        }
    }
}

/// What a successful run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    /// Calls made to the lookup service.
    pub lookups: usize,

    /// Players whose username went from unknown to known.
    pub resolved: usize,
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        sleep(duration);
    }
}

/// Resolves every unknown username in `info`, consulting `cache` first.
///
/// Players that already have a name seed the cache. Names found by the lookup
/// are cached and written into `info` immediately, so on failure `info` still
/// holds whatever was resolved before the run gave up.
pub fn resolve_usernames(
    info: &mut ReplayInfo,
    cache: &UsernameCache,
    lookup: &dyn UsernameLookup,
    policy: &RetryPolicy,
) -> Result<EnrichmentReport, EnrichmentError> {
    let mut queue = VecDeque::new();

    for (player_id, player) in info.players.iter() {
        match &player.username {
            Some(name) => cache.insert(player.user_id, name.clone(), false),
            None => queue.push_back(*player_id),
        }
    }

    let mut report = EnrichmentReport::default();
    let mut failures = 0;

    while let Some(player_id) = queue.pop_front() {
        let Some(player) = info.players.get_mut(&player_id) else {
            continue;
        };

        let user_id = player.user_id;

        // Another player in this replay may share the account.
        if let Some(name) = cache.get(user_id) {
            player.username = Some(name);
            report.resolved += 1;
            continue;
        }

        report.lookups += 1;

        let failure = match lookup.lookup_username(user_id) {
            Ok(Some(name)) => {
                tracing::info!(target: Log::Enrichment, ?user_id, ?name, "Resolved username");

                cache.insert(user_id, name.clone(), true);
                player.username = Some(name);
                report.resolved += 1;

                if !queue.is_empty() {
                    pause(policy.lookup_spacing);
                }

                continue;
            },

            Ok(None) => None,
            Err(error) => Some(error),
        };

        failures += 1;

        tracing::warn!(
            target: Log::Enrichment,
            error = ?failure,
            ?user_id,
            failures,
            "Username lookup failed"
        );

        if failures >= policy.max_failures {
            return Err(EnrichmentError::TooManyFailures {
                replay_id: info.id,
                failures,
                resolved: report.resolved,
            });
        }

        queue.push_back(player_id);
        pause(policy.retry_delay);
    }

    Ok(report)
}

/// Work items for the enrichment thread.
#[derive(Clone, Copy, Debug)]
pub(crate) enum EnrichmentJob {
    Enrich(i64),
    Shutdown,
}

/// The body of the enrichment thread. Runs are processed strictly one at a time
/// in the order they were queued.
pub(crate) fn run(
    state: Arc<CatalogState>,
    lookup: Arc<dyn UsernameLookup>,
    policy: RetryPolicy,
    receiver: Receiver<EnrichmentJob>,
) {
    loop {
        match receiver.recv() {
            Ok(EnrichmentJob::Enrich(replay_id)) => {
                enrich_replay(&state, lookup.as_ref(), &policy, replay_id);
            },

            Ok(EnrichmentJob::Shutdown) => {
                tracing::info!(target: Log::Enrichment, "Enrichment thread shutting down");
                return;
            },

            Err(error) => {
                tracing::warn!(target: Log::Enrichment, ?error, "Enrichment channel closed");
                return;
            },
        }
    }
}

fn enrich_replay(state: &CatalogState, lookup: &dyn UsernameLookup, policy: &RetryPolicy, replay_id: i64) {
    // It may have been removed, or resolved by an earlier run, since it was queued.
    let Some(mut info) = state.replays.get(replay_id) else {
        return;
    };

    if !info.has_unresolved_usernames() {
        return;
    }

    let resolved = match resolve_usernames(&mut info, &state.usernames, lookup, policy) {
        Ok(report) => {
            tracing::info!(
                target: Log::Enrichment,
                ?replay_id,
                lookups = report.lookups,
                resolved = report.resolved,
                "Finished username enrichment"
            );

            report.resolved
        },

        Err(error) => {
            tracing::error!(target: Log::Enrichment, ?error, "Giving up on usernames for now");
            error.resolved()
        },
    };

    if resolved == 0 {
        return;
    }

    let Some(merged) = state.replays.merge_usernames(&info) else {
        return;
    };

    state.persist();
    state.subscribers.notify(CatalogEvent::Changed(merged));
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use awbw_api::LookupError;
    use awbw_replay::{date_parser, ReplayUser};

    use super::*;

    /// Answers from a fixed table and counts calls. Users missing from the table
    /// fail with an error.
    #[derive(Default)]
    struct TableLookup {
        names: BTreeMap<i64, Option<String>>,
        calls: Mutex<Vec<i64>>,
    }

    impl TableLookup {
        fn with(entries: &[(i64, Option<&str>)]) -> Self {
            Self {
                names: entries
                    .iter()
                    .map(|(id, name)| (*id, name.map(str::to_string)))
                    .collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<i64> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl UsernameLookup for TableLookup {
        fn lookup_username(&self, user_id: i64) -> Result<Option<String>, LookupError> {
            self.calls.lock().unwrap().push(user_id);

            match self.names.get(&user_id) {
                Some(name) => Ok(name.clone()),
                None => Err(LookupError::IO(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"))),
            }
        }
    }

    fn replay(players: &[(i64, i64, Option<&str>)]) -> ReplayInfo {
        ReplayInfo {
            id: 42,
            name: "Enrichment".into(),
            start_date: date_parser::parse_str("2023-01-01 00:00:00").unwrap(),
            end_date: None,
            league_match: false,
            players: players
                .iter()
                .map(|(id, user_id, name)| {
                    let user = ReplayUser {
                        id: *id,
                        user_id: *user_id,
                        username: name.map(str::to_string),
                        team: id.to_string(),
                    };
                    (*id, user)
                })
                .collect(),
            winners: Vec::new(),
            turn_count: 0,
        }
    }

    #[test]
    fn cached_users_need_no_lookups() {
        let cache = UsernameCache::default();
        cache.insert(77, "Hellraider".into(), false);
        cache.insert(78, "Grit".into(), false);

        let lookup = TableLookup::default();
        let mut info = replay(&[(1001, 77, None), (1002, 78, None)]);

        let report = resolve_usernames(&mut info, &cache, &lookup, &RetryPolicy::immediate(3)).unwrap();

        assert_eq!(report, EnrichmentReport { lookups: 0, resolved: 2 });
        assert!(lookup.calls().is_empty());
        assert!(!info.has_unresolved_usernames());
    }

    #[test]
    fn known_names_seed_the_cache() {
        let cache = UsernameCache::default();
        let lookup = TableLookup::default();
        let mut info = replay(&[(1001, 77, Some("Hellraider")), (1002, 77, None)]);

        let report = resolve_usernames(&mut info, &cache, &lookup, &RetryPolicy::immediate(3)).unwrap();

        assert_eq!(report.lookups, 0);
        assert_eq!(info.players[&1002].username.as_deref(), Some("Hellraider"));
        assert_eq!(cache.get(77).as_deref(), Some("Hellraider"));
    }

    #[test]
    fn aborts_after_exactly_max_failures() {
        let cache = UsernameCache::default();
        let lookup = TableLookup::with(&[(77, Some("Hellraider"))]);
        let mut info = replay(&[(1001, 77, None), (1002, 78, None)]);

        let error = resolve_usernames(&mut info, &cache, &lookup, &RetryPolicy::immediate(3)).unwrap_err();

        assert!(matches!(
            error,
            EnrichmentError::TooManyFailures {
                replay_id: 42,
                failures: 3,
                resolved: 1
            }
        ));

        // One success, then three failed attempts at the same user.
        assert_eq!(lookup.calls(), vec![77, 78, 78, 78]);
        assert_eq!(info.players[&1001].username.as_deref(), Some("Hellraider"));
        assert_eq!(info.players[&1002].username, None);
        assert_eq!(cache.get(77).as_deref(), Some("Hellraider"));
    }

    #[test]
    fn not_found_counts_as_a_failure_and_is_retried() {
        let cache = UsernameCache::default();
        let lookup = TableLookup::with(&[(78, None)]);
        let mut info = replay(&[(1002, 78, None)]);

        assert!(resolve_usernames(&mut info, &cache, &lookup, &RetryPolicy::immediate(2)).is_err());
        assert_eq!(lookup.calls(), vec![78, 78]);
    }

    #[test]
    fn default_policy_matches_configuration_defaults() {
        let policy = RetryPolicy::default();

        assert_eq!(policy, RetryPolicy::from_config(&AwbwConfig::default()));
        assert_eq!(policy.max_failures, 3);
        assert_eq!(policy.retry_delay, Duration::from_millis(1000));
        assert_eq!(policy.lookup_spacing, Duration::from_millis(150));
    }
}
