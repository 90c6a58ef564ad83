const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_MAX_MS: u64 = 30_000;

#[derive(Debug, Default)]
struct BackoffState {
    consecutive_failures: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The device was offline or another drain was already in flight.
    Skipped,
    Completed { applied: u64 },
}

/// Drains the outbox against the remote authority. All drain state lives on
/// the instance, so independent engines (e.g. in tests) never interfere.
pub struct SyncEngine<R: RemoteApi, C: Connectivity> {
    remote: R,
    connectivity: C,
    draining: AtomicBool,
    backoff: Mutex<BackoffState>,
    signal_tx: Mutex<Option<mpsc::Sender<SyncSignal>>>,
}

impl<R: RemoteApi, C: Connectivity> SyncEngine<R, C> {
    pub fn new(remote: R, connectivity: C) -> Self {
        Self {
            remote,
            connectivity,
            draining: AtomicBool::new(false),
            backoff: Mutex::new(BackoffState::default()),
            signal_tx: Mutex::new(None),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Delay before the next retry, or `None` when no retry is pending.
    /// Starts at 1s, doubles per consecutive failure, caps at 30s.
    pub fn retry_delay(&self) -> Option<Duration> {
        let failures = match self.backoff.lock() {
            Ok(backoff) => backoff.consecutive_failures,
            Err(_) => return None,
        };
        if failures == 0 {
            return None;
        }
        let exp = failures.saturating_sub(1).min(5);
        Some(Duration::from_millis(
            (BACKOFF_BASE_MS << exp).min(BACKOFF_MAX_MS),
        ))
    }

    pub fn reset_backoff(&self) {
        if let Ok(mut backoff) = self.backoff.lock() {
            backoff.consecutive_failures = 0;
        }
    }

    pub(crate) fn attach_signal_sender(&self, tx: mpsc::Sender<SyncSignal>) {
        if let Ok(mut slot) = self.signal_tx.lock() {
            *slot = Some(tx);
        }
    }

    /// Best-effort trigger. A no-op when no drain loop is attached; tests
    /// drive [`SyncEngine::drain`] directly instead.
    pub fn signal(&self, signal: SyncSignal) {
        if let Ok(slot) = self.signal_tx.lock() {
            if let Some(tx) = slot.as_ref() {
                let _ = tx.send(signal);
            }
        }
    }

    /// One attempt to deliver all current outbox entries. A no-op when the
    /// device is offline or another drain is already in flight; re-drains
    /// before returning if entries arrived mid-pass.
    pub fn drain(&self, conn: &Connection) -> Result<DrainOutcome> {
        if !self.connectivity.is_online() {
            return Ok(DrainOutcome::Skipped);
        }
        if self.draining.swap(true, Ordering::SeqCst) {
            return Ok(DrainOutcome::Skipped);
        }

        let result = self.drain_exclusive(conn);
        self.draining.store(false, Ordering::SeqCst);
        result
    }

    fn drain_exclusive(&self, conn: &Connection) -> Result<DrainOutcome> {
        let mut applied_total = 0u64;

        loop {
            let entries = db::list_outbox(conn)?;
            if entries.is_empty() {
                break;
            }

            match self.drain_pass(conn, &entries) {
                Ok(applied) => {
                    applied_total += applied;
                    self.reset_backoff();
                }
                Err(e) => {
                    if e.is::<AuthError>() {
                        tracing::warn!("sync drain halted, re-authentication required: {e}");
                    } else {
                        let failures = match self.backoff.lock() {
                            Ok(mut backoff) => {
                                backoff.consecutive_failures =
                                    backoff.consecutive_failures.saturating_add(1);
                                backoff.consecutive_failures
                            }
                            Err(_) => 0,
                        };
                        tracing::warn!("sync drain failed (consecutive failures: {failures}): {e:#}");
                    }
                    return Err(e);
                }
            }
        }

        Ok(DrainOutcome::Completed {
            applied: applied_total,
        })
    }

    /// One pass over a snapshot of the outbox: batchable task upserts go out
    /// as a single bulk call, everything else strictly one at a time in
    /// enqueue order. Entries are only removed after the remote confirmed
    /// them, so a failure anywhere loses nothing.
    fn drain_pass(&self, conn: &Connection, entries: &[db::OutboxEntry]) -> Result<u64> {
        let mut applied = 0u64;

        let (batchable, singular): (Vec<&db::OutboxEntry>, Vec<&db::OutboxEntry>) =
            entries.iter().partition(|entry| {
                matches!(
                    entry.action,
                    db::OutboxAction::Create | db::OutboxAction::Update
                )
            });

        if !batchable.is_empty() {
            let items: Vec<Value> = batchable.iter().map(|entry| entry.payload.clone()).collect();
            let summary = self.remote.upsert_tasks(&items)?;
            tracing::debug!(
                "bulk upsert confirmed: modified={} upserted={}",
                summary.modified,
                summary.upserted
            );

            for entry in &batchable {
                db::remove_outbox_entry(conn, entry.seq)?;
                db::mark_task_synced(conn, &entry.record_id)?;
                applied += 1;
            }
        }

        for entry in &singular {
            self.apply_singular(conn, entry)?;
            db::remove_outbox_entry(conn, entry.seq)?;
            applied += 1;
        }

        Ok(applied)
    }

    fn apply_singular(&self, conn: &Connection, entry: &db::OutboxEntry) -> Result<()> {
        match entry.action {
            db::OutboxAction::Delete => {
                match self.remote.delete_task(&entry.record_id) {
                    Ok(()) => {}
                    // Already gone remotely counts as confirmed.
                    Err(e) if e.is::<RemoteNotFound>() => {}
                    Err(e) => return Err(e),
                }
                db::purge_task(conn, &entry.record_id)?;
            }
            db::OutboxAction::CreateWorkspace => {
                self.remote.create_workspace(&entry.payload)?;
                db::mark_workspace_synced(conn, &entry.record_id)?;
            }
            db::OutboxAction::DeleteWorkspace => {
                match self.remote.delete_workspace(&entry.record_id) {
                    Ok(()) => {}
                    Err(e) if e.is::<RemoteNotFound>() => {}
                    Err(e) => return Err(e),
                }
                db::purge_workspace(conn, &entry.record_id)?;
            }
            db::OutboxAction::CreateArchive => {
                self.remote.create_archive(&entry.payload)?;
            }
            db::OutboxAction::DeleteArchive => {
                match self.remote.delete_archive(&entry.record_id) {
                    Ok(()) => {}
                    Err(e) if e.is::<RemoteNotFound>() => {}
                    Err(e) => return Err(e),
                }
            }
            db::OutboxAction::Create | db::OutboxAction::Update => {
                return Err(anyhow!("batchable entry routed to the singular path"));
            }
        }
        Ok(())
    }
}
