use slugscan_core::{LookupOutcome, MembershipIndex, ScanError, TierLabel};

/// How much of the configured tab set a fetch cycle actually delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Ready,
    PartialFailure,
    TotalFailure,
}

/// Per-tab results of one fetch cycle, already parsed and header-stripped.
/// A malformed payload counts as a failed tab; the others stay usable.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub tables: Vec<(TierLabel, Result<Vec<Vec<String>>, ScanError>)>,
}

impl FetchReport {
    pub fn state(&self) -> LoadState {
        let failed = self.tables.iter().filter(|(_, r)| r.is_err()).count();
        if failed == 0 {
            LoadState::Ready
        } else if failed == self.tables.len() {
            LoadState::TotalFailure
        } else {
            LoadState::PartialFailure
        }
    }

    pub fn failures(&self) -> Vec<(&TierLabel, &ScanError)> {
        self.tables
            .iter()
            .filter_map(|(tier, result)| result.as_ref().err().map(|err| (tier, err)))
            .collect()
    }

    fn into_tables(self) -> Vec<(TierLabel, Vec<Vec<String>>)> {
        self.tables
            .into_iter()
            .filter_map(|(tier, result)| result.ok().map(|rows| (tier, rows)))
            .collect()
    }
}

/// Outcome handed to the rendering boundary. Fetch failure is distinct from
/// not-found; an empty index from a dead data source must never read as
/// "this slug has no membership".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Found(Vec<TierLabel>),
    NotFound,
    EmptyQuery,
    FetchFailed(String),
}

/// One lookup session: current index, busy flag, generation counter.
///
/// Re-entrant triggers are debounced by the busy flag (`try_begin` returns
/// `None` while a cycle is in flight). When a newer query supersedes an
/// in-flight one, the generation counter makes sure the slow old result is
/// discarded instead of overwriting the newer index.
#[derive(Debug, Default)]
pub struct LookupSession {
    index: Option<MembershipIndex>,
    load_state: Option<LoadState>,
    last_error: Option<String>,
    generation: u64,
    busy: bool,
}

impl LookupSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fetch cycle; `None` while another is in flight.
    pub fn try_begin(&mut self) -> Option<u64> {
        if self.busy {
            return None;
        }
        self.busy = true;
        self.generation += 1;
        Some(self.generation)
    }

    /// Start a fetch cycle that replaces any in-flight one. The superseded
    /// cycle's eventual `complete` call becomes a stale no-op.
    #[allow(dead_code)]
    pub fn supersede(&mut self) -> u64 {
        self.busy = true;
        self.generation += 1;
        self.generation
    }

    /// Install a finished fetch cycle. Returns false (and changes nothing)
    /// when `generation` is stale.
    pub fn complete(&mut self, generation: u64, report: FetchReport) -> bool {
        if generation != self.generation {
            return false;
        }
        self.busy = false;
        let state = report.state();
        self.last_error = report
            .failures()
            .first()
            .map(|(tier, err)| format!("{tier}: {err}"));
        self.load_state = Some(state);
        // old index is dropped either way; a dead fetch leaves no data behind
        self.index = match state {
            LoadState::TotalFailure => None,
            _ => Some(MembershipIndex::build(report.into_tables())),
        };
        true
    }

    #[allow(dead_code)]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn load_state(&self) -> Option<LoadState> {
        self.load_state
    }

    pub fn lookup(&self, raw_query: &str) -> SessionOutcome {
        match self.load_state {
            Some(LoadState::TotalFailure) | None => {
                let reason = self
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "no table could be loaded".to_string());
                return SessionOutcome::FetchFailed(reason);
            }
            _ => {}
        }
        let Some(index) = &self.index else {
            return SessionOutcome::FetchFailed("no table could be loaded".to_string());
        };
        match index.lookup(raw_query) {
            LookupOutcome::Found(labels) => SessionOutcome::Found(labels),
            LookupOutcome::NotFound => SessionOutcome::NotFound,
            LookupOutcome::EmptyQuery => SessionOutcome::EmptyQuery,
        }
    }
}
