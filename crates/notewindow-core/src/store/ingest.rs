use anyhow::Result;
use nostr_sdk::prelude::*;
use nostrdb::{Ndb, Transaction};
use std::time::Duration;
use tracing::{debug, error};

/// Feed signed events to nostrdb. Write path only: never call this from the UI loop.
///
/// Ephemeral kinds are skipped. Ingestion is asynchronous inside nostrdb, so the
/// returned count says how many events were accepted, not how many are queryable yet.
pub fn ingest_events(ndb: &Ndb, events: &[Event]) -> Result<usize> {
    const MAX_ATTEMPTS: usize = 8;
    let mut ingested = 0;

    for event in events {
        if event.kind.is_ephemeral() {
            continue;
        }

        // nostrdb expects relay format: ["EVENT", "subid", {...}]
        let relay_json = format!(r#"["EVENT","notewindow",{}]"#, event.as_json());

        let mut handled = false;
        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if note_exists(ndb, event) {
                handled = true;
                break;
            }

            match ndb.process_event(&relay_json) {
                Ok(()) => {
                    ingested += 1;
                    handled = true;
                    break;
                }
                Err(err) => {
                    debug!(
                        "ingest attempt {} failed for {}: {}",
                        attempt + 1,
                        event.id.to_hex(),
                        err
                    );
                    last_error = Some(err.to_string());
                }
            }

            // Writes can fail transiently under contention
            if attempt + 1 < MAX_ATTEMPTS {
                std::thread::sleep(Duration::from_millis(5 * (attempt as u64 + 1)));
            }
        }

        if !handled && !note_exists(ndb, event) {
            let err_text = last_error.unwrap_or_else(|| "unknown ingest failure".to_string());
            error!(
                "ingest_events exhausted retries id={} kind={} err={}",
                event.id.to_hex(),
                event.kind.as_u16(),
                err_text
            );
            return Err(anyhow::anyhow!(
                "failed to ingest id={} kind={} after {} attempts: {}",
                event.id.to_hex(),
                event.kind.as_u16(),
                MAX_ATTEMPTS,
                err_text
            ));
        }
    }

    Ok(ingested)
}

fn note_exists(ndb: &Ndb, event: &Event) -> bool {
    let Ok(txn) = Transaction::new(ndb) else {
        return false;
    };
    ndb.get_notekey_by_id(&txn, event.id.as_bytes()).is_ok()
}

/// Wait until nostrdb returns at least `expected` notes for `filter` (for tests)
#[cfg(test)]
pub fn wait_for_notes(ndb: &Ndb, filter: nostrdb::Filter, expected: usize, max_wait_ms: u64) -> bool {
    use std::time::Instant;

    let start = Instant::now();
    let timeout = Duration::from_millis(max_wait_ms);

    loop {
        if let Ok(txn) = Transaction::new(ndb) {
            if let Ok(results) = ndb.query(&txn, std::slice::from_ref(&filter), expected as i32 + 1) {
                if results.len() >= expected {
                    return true;
                }
            }
        }

        if start.elapsed() >= timeout {
            return false;
        }

        std::thread::sleep(Duration::from_millis(10));
    }
}
