use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Result};

use slugscan_core::{normalize, parse_table, strip_header_row, ScanError, TierLabel};
use slugscan_sheets::SheetsClient;

use crate::config::RunConfig;
use crate::logging;
use crate::session::{FetchReport, LoadState, LookupSession, SessionOutcome};

pub fn lookup(slug: String, config_path: String) -> Result<()> {
    let cfg = RunConfig::load(&config_path)?;
    let client = SheetsClient::new(cfg.client_options()?)?;
    let tabs = cfg.tabs();
    let mut session = LookupSession::new();

    let outcome = run_cycle(&mut session, &tabs, &slug, |tabs| {
        client.fetch_all_blocking(tabs)
    })?;
    if outcome == SessionOutcome::EmptyQuery {
        return Err(anyhow!("empty query: nothing to look up"));
    }
    render(&slug, &outcome, session.load_state());
    match outcome {
        SessionOutcome::FetchFailed(reason) => Err(anyhow!("lookup failed: {reason}")),
        _ => Ok(()),
    }
}

pub fn watch(config_path: String) -> Result<()> {
    let cfg = RunConfig::load(&config_path)?;
    let client = SheetsClient::new(cfg.client_options()?)?;
    let tabs = cfg.tabs();
    let mut session = LookupSession::new();

    logging::info("enter a slug per line (ctrl-d to quit)");
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        let outcome = run_cycle(&mut session, &tabs, query, |tabs| {
            client.fetch_all_blocking(tabs)
        })?;
        render(query, &outcome, session.load_state());
        io::stdout().flush()?;
    }
    Ok(())
}

pub fn tabs(config_path: String) -> Result<()> {
    let cfg = RunConfig::load(&config_path)?;
    for (tier, sheet) in cfg.tabs() {
        println!("[{}] {} <- sheet {:?}", tier.category().as_str(), tier, sheet);
    }
    Ok(())
}

/// One full lookup cycle: guard the query, fetch every tab, parse, rebuild
/// the index, probe. The fetch step is injected so the cycle is testable
/// without a network.
fn run_cycle<F>(
    session: &mut LookupSession,
    tabs: &[(TierLabel, String)],
    query: &str,
    fetch: F,
) -> Result<SessionOutcome>
where
    F: FnOnce(&[(TierLabel, String)]) -> slugscan_core::Result<Vec<(TierLabel, slugscan_core::Result<String>)>>,
{
    // an empty normal form never reaches the network
    if normalize(query).is_empty() {
        return Ok(SessionOutcome::EmptyQuery);
    }
    let Some(generation) = session.try_begin() else {
        logging::verbose("lookup already in flight; trigger ignored");
        return Ok(session.lookup(query));
    };
    logging::verbose(format!("fetching {} tabs", tabs.len()));
    // a runtime-level fetch error still ends the cycle, or the session would
    // stay busy and debounce every later trigger
    let raw = match fetch(tabs) {
        Ok(raw) => raw,
        Err(err) => {
            session.complete(generation, failed_report(tabs, &err));
            return Err(anyhow!("fetch runtime error: {err}"));
        }
    };
    let report = build_report(raw);
    for (tier, err) in report.failures() {
        logging::warn(format!("table {tier} unavailable: {err}"));
    }
    session.complete(generation, report);
    Ok(session.lookup(query))
}

/// Report for a cycle where the fetch never produced per-table results: every
/// tab is marked failed with the same reason.
fn failed_report(tabs: &[(TierLabel, String)], err: &ScanError) -> FetchReport {
    let tables = tabs
        .iter()
        .map(|(tier, _)| (tier.clone(), Err(ScanError::Other(err.to_string()))))
        .collect();
    FetchReport { tables }
}

/// Parse each tab's payload; a malformed table becomes a failed entry so the
/// load state reflects it, while the other tabs stay usable.
fn build_report(raw: Vec<(TierLabel, slugscan_core::Result<String>)>) -> FetchReport {
    let tables = raw
        .into_iter()
        .map(|(tier, result)| {
            let parsed: Result<Vec<Vec<String>>, ScanError> =
                result.and_then(|text| parse_table(&text)).map(strip_header_row);
            (tier, parsed)
        })
        .collect();
    FetchReport { tables }
}

fn render(query: &str, outcome: &SessionOutcome, load_state: Option<LoadState>) {
    if load_state == Some(LoadState::PartialFailure) {
        logging::warn("some tables failed to load; results may be incomplete");
    }
    match outcome {
        SessionOutcome::Found(labels) => {
            println!("query: {query}");
            for label in labels {
                println!("  [{}] {}", label.category().as_str(), label);
            }
        }
        SessionOutcome::NotFound => {
            println!("query: {query}");
            println!("  no membership found (check the slug)");
        }
        SessionOutcome::EmptyQuery => {
            println!("empty query");
        }
        SessionOutcome::FetchFailed(reason) => {
            logging::info(format!("data source unavailable: {reason}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn tab(tier: &str, sheet: &str) -> (TierLabel, String) {
        (TierLabel::new(tier), sheet.to_string())
    }

    #[test]
    fn empty_query_never_fetches() {
        let mut session = LookupSession::new();
        let calls = Cell::new(0u32);
        let outcome = run_cycle(&mut session, &[tab("NFT確定", "NFT確定")], "  @ ", |_| {
            calls.set(calls.get() + 1);
            Ok(Vec::new())
        })
        .unwrap();
        assert_eq!(outcome, SessionOutcome::EmptyQuery);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn partial_failure_still_reports_membership() {
        let mut session = LookupSession::new();
        let tabs = vec![tab("Charge Tier1", "t1"), tab("Charge Tier2", "t2")];
        let outcome = run_cycle(&mut session, &tabs, "dave", |tabs| {
            Ok(tabs
                .iter()
                .map(|(tier, sheet)| {
                    if sheet == "t1" {
                        (
                            tier.clone(),
                            Err(ScanError::Fetch {
                                table: sheet.clone(),
                                reason: "http status 500".into(),
                            }),
                        )
                    } else {
                        (tier.clone(), Ok("slug\ndave\n".to_string()))
                    }
                })
                .collect())
        })
        .unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Found(vec![TierLabel::new("Charge Tier2")])
        );
        assert_eq!(session.load_state(), Some(LoadState::PartialFailure));
    }

    #[test]
    fn malformed_payload_counts_as_failed_tab() {
        let mut session = LookupSession::new();
        let tabs = vec![tab("Charge Tier1", "t1"), tab("Charge Tier2", "t2")];
        let outcome = run_cycle(&mut session, &tabs, "carol", |tabs| {
            Ok(tabs
                .iter()
                .map(|(tier, sheet)| {
                    if sheet == "t1" {
                        (tier.clone(), Ok("carol,\"unterminated\n".to_string()))
                    } else {
                        (tier.clone(), Ok("carol\n".to_string()))
                    }
                })
                .collect())
        })
        .unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Found(vec![TierLabel::new("Charge Tier2")])
        );
        assert_eq!(session.load_state(), Some(LoadState::PartialFailure));
    }

    #[test]
    fn total_failure_is_a_fetch_error_not_not_found() {
        let mut session = LookupSession::new();
        let tabs = vec![tab("Charge Tier1", "t1")];
        let outcome = run_cycle(&mut session, &tabs, "anyone", |tabs| {
            Ok(tabs
                .iter()
                .map(|(tier, sheet)| {
                    (
                        tier.clone(),
                        Err(ScanError::Fetch {
                            table: sheet.clone(),
                            reason: "http status 503".into(),
                        }),
                    )
                })
                .collect())
        })
        .unwrap();
        assert!(matches!(outcome, SessionOutcome::FetchFailed(_)));
    }

    #[test]
    fn fetch_runtime_error_releases_the_session() {
        let mut session = LookupSession::new();
        let tabs = vec![tab("Charge Tier1", "t1")];
        let err = run_cycle(&mut session, &tabs, "alice", |_| {
            Err(ScanError::Io(io::Error::other("runtime gone")))
        })
        .unwrap_err();
        assert!(err.to_string().contains("fetch runtime error"));
        assert_eq!(session.load_state(), Some(LoadState::TotalFailure));
        assert!(matches!(
            session.lookup("alice"),
            SessionOutcome::FetchFailed(_)
        ));

        // the session is not stuck busy; a later cycle runs and recovers
        let outcome = run_cycle(&mut session, &tabs, "alice", |tabs| {
            Ok(tabs
                .iter()
                .map(|(tier, _)| (tier.clone(), Ok("alice\n".to_string())))
                .collect())
        })
        .unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Found(vec![TierLabel::new("Charge Tier1")])
        );
    }

    #[test]
    fn end_to_end_charge_tiers() {
        let mut session = LookupSession::new();
        let tabs = vec![tab("Charge Tier1", "Charge-Tier1"), tab("Charge Tier2", "Charge-Tier2")];
        let fetch = |tabs: &[(TierLabel, String)]| {
            Ok(tabs
                .iter()
                .map(|(tier, sheet)| {
                    let body = if sheet == "Charge-Tier1" {
                        "slug\ncarol\n"
                    } else {
                        "dave\n"
                    };
                    (tier.clone(), Ok(body.to_string()))
                })
                .collect::<Vec<_>>())
        };
        let outcome = run_cycle(&mut session, &tabs, "Carol", fetch).unwrap();
        assert_eq!(
            outcome,
            SessionOutcome::Found(vec![TierLabel::new("Charge Tier1")])
        );
        let outcome = run_cycle(&mut session, &tabs, "eve", fetch).unwrap();
        assert_eq!(outcome, SessionOutcome::NotFound);
    }
}
