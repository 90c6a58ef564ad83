/// External events the engine reacts to. The core never assumes a specific
/// event-loop API; the embedding application forwards its own connectivity
/// and focus notifications as signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncSignal {
    /// Connectivity restored. Resets backoff before draining.
    Online,
    /// Window/tab regained focus; catches missed connectivity events.
    Focus,
    /// A repository call appended an outbox entry.
    Enqueued,
    Shutdown,
}

/// Wires a signal channel to the engine and starts the drain loop thread.
/// The returned sender is for the application's connectivity/focus events;
/// repository calls signal through the engine itself.
pub fn start_sync_loop<R, C>(
    engine: Arc<SyncEngine<R, C>>,
    app_dir: &Path,
) -> (mpsc::Sender<SyncSignal>, thread::JoinHandle<()>)
where
    R: RemoteApi + 'static,
    C: Connectivity + 'static,
{
    let (tx, rx) = mpsc::channel();
    engine.attach_signal_sender(tx.clone());
    let handle = spawn_drain_loop(engine, app_dir.to_path_buf(), rx);
    (tx, handle)
}

/// The drain loop owns its own connection and is the only place network
/// retries are scheduled: while backoff is armed it waits at most the
/// retry delay for the next signal, then retries on timeout.
pub fn spawn_drain_loop<R, C>(
    engine: Arc<SyncEngine<R, C>>,
    app_dir: PathBuf,
    signals: mpsc::Receiver<SyncSignal>,
) -> thread::JoinHandle<()>
where
    R: RemoteApi + 'static,
    C: Connectivity + 'static,
{
    thread::spawn(move || {
        let conn = match db::open(&app_dir) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("drain loop could not open the local store: {e:#}");
                return;
            }
        };

        // Once unconditionally at start, catching entries left over from the
        // previous run.
        if engine.is_online() {
            run_drain(&engine, &conn);
        }

        loop {
            let signal = match engine.retry_delay() {
                Some(delay) => match signals.recv_timeout(delay) {
                    Ok(signal) => Some(signal),
                    Err(mpsc::RecvTimeoutError::Timeout) => None,
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                },
                None => match signals.recv() {
                    Ok(signal) => Some(signal),
                    Err(_) => break,
                },
            };

            match signal {
                Some(SyncSignal::Shutdown) => break,
                Some(SyncSignal::Online) => {
                    engine.reset_backoff();
                    run_drain(&engine, &conn);
                }
                Some(SyncSignal::Focus) | Some(SyncSignal::Enqueued) | None => {
                    run_drain(&engine, &conn);
                }
            }
        }
    })
}

fn run_drain<R: RemoteApi, C: Connectivity>(engine: &SyncEngine<R, C>, conn: &Connection) {
    match engine.drain(conn) {
        Ok(_) => {}
        Err(e) if e.is::<AuthError>() => {
            tracing::warn!("drain needs re-authentication, waiting for a fresh credential: {e}");
        }
        Err(e) => {
            tracing::debug!("drain attempt failed, backoff armed: {e:#}");
        }
    }
}
