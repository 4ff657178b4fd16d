use crate::uci::{format_uci_move, parse_uci_message, UciMessage};
use crate::{EngineConfig, EngineError, EngineEvent, EngineInfo, SearchLimits};
use cozy_chess::Move;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::mpsc;

/// How long to wait for a late `bestmove` after sending `stop`.
const STOP_GRACE: Duration = Duration::from_secs(1);

/// A running UCI engine process.
///
/// Both [`set_position`](Self::set_position) and [`best_move`](Self::best_move)
/// take `&mut self`; callers sharing one engine across tasks must hold a lock
/// around the pair.
///
/// Every `go` owes exactly one `bestmove`. Searches whose answer was never
/// read (timed out, or the caller's future was dropped) are counted in
/// `pending_bestmoves` and settled before the next search starts, so a late
/// answer is never returned for a different position.
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    event_rx: mpsc::Receiver<EngineEvent>,
    limits: SearchLimits,
    search_timeout: Duration,
    pending_bestmoves: usize,
    unusable: bool,
}

impl StockfishEngine {
    /// Spawn the engine at `config.path` and complete the UCI handshake.
    #[tracing::instrument(level = "info", skip(config), fields(path = %config.path.display()))]
    pub async fn spawn(config: EngineConfig) -> Result<Self, EngineError> {
        tracing::info!("Starting engine spawn (config: {:?})", config);
        let path = resolve_engine_path(&config.path)?;
        tracing::info!("Using engine at: {:?}", path);

        let mut process = tokio::process::Command::new(&path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                EngineError::Spawn(e)
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Handshake("engine has no stdin".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::Handshake("engine has no stdout".into()))?;

        let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(64);
        tokio::spawn(read_engine_output(stdout, event_tx));

        let mut engine = Self {
            process,
            stdin,
            event_rx,
            limits: config.limits,
            search_timeout: config.search_timeout,
            pending_bestmoves: 0,
            unusable: false,
        };

        engine.send_line("uci").await?;
        engine
            .wait_for(config.handshake_timeout, |event| {
                matches!(event, EngineEvent::UciOk).then_some(())
            })
            .await
            .map_err(|e| handshake_error("uciok", e))?;
        tracing::debug!("Received uciok");

        if let Some(level) = config.skill_level {
            let level = level.min(20);
            tracing::info!("Setting skill level to {}", level);
            engine.set_option("Skill Level", level).await?;
        }
        if let Some(threads) = config.threads {
            let threads = threads.clamp(1, 16);
            tracing::info!("Setting Threads to {}", threads);
            engine.set_option("Threads", threads).await?;
        }
        if let Some(hash_mb) = config.hash_mb {
            let hash_mb = hash_mb.clamp(1, 2048);
            tracing::info!("Setting Hash to {} MB", hash_mb);
            engine.set_option("Hash", hash_mb).await?;
        }

        engine.send_line("isready").await?;
        engine
            .wait_for(config.handshake_timeout, |event| {
                matches!(event, EngineEvent::ReadyOk).then_some(())
            })
            .await
            .map_err(|e| handshake_error("readyok", e))?;

        tracing::info!("Engine spawned and initialized successfully");
        Ok(engine)
    }

    /// Replace the engine's current position. The FEN is forwarded as-is apart
    /// from whitespace normalisation, so it can never span more than one UCI line.
    pub async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        self.ensure_usable()?;
        let fen = fen.split_whitespace().collect::<Vec<_>>().join(" ");
        tracing::info!("Setting position: FEN={}", fen);
        self.send_line(&format!("position fen {}", fen)).await
    }

    /// Search the current position. `Ok(None)` means the engine found no move.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn best_move(&mut self) -> Result<Option<Move>, EngineError> {
        self.ensure_usable()?;
        self.settle_pending().await?;
        self.drain_stale_events();

        let go = self.limits.go_command();
        tracing::info!("Starting engine calculation: {}", go);
        // Counted before the write: once `go` may have reached the engine,
        // its answer is owed even if this future is dropped.
        self.pending_bestmoves += 1;
        self.send_line(&go).await?;

        let timeout = self.search_timeout;
        let mut last_info: Option<EngineInfo> = None;
        let result = self
            .wait_for(timeout, |event| match event {
                EngineEvent::BestMove(mv) => Some(mv),
                EngineEvent::Info(info) => {
                    if info.depth.is_some() {
                        last_info = Some(info);
                    }
                    None
                }
                _ => None,
            })
            .await;

        match result {
            Ok(mv) => {
                self.pending_bestmoves -= 1;
                log_search_result(mv.as_ref(), last_info.as_ref());
                Ok(mv)
            }
            Err(EngineError::Timeout(elapsed)) => {
                tracing::warn!("Search exceeded {:?}, sending stop", elapsed);
                self.send_line("stop").await?;
                // The late bestmove belongs to the abandoned search.
                match self.wait_for(STOP_GRACE, take_best_move).await {
                    Ok(_) => self.pending_bestmoves -= 1,
                    Err(_) => tracing::warn!("Engine has not answered stop yet"),
                }
                Err(EngineError::Timeout(elapsed))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Shutdown the engine
    pub async fn shutdown(mut self) {
        tracing::info!("Sending quit command to engine");
        let _ = self.send_line("quit").await;
        let _ = tokio::time::timeout(Duration::from_secs(1), self.process.wait()).await;
        let _ = self.process.kill().await;
    }

    /// Consume the answers of searches nobody waited for. An engine that owes
    /// a `bestmove` and does not deliver it within the search timeout is
    /// retired, since its next answer could belong to any position.
    async fn settle_pending(&mut self) -> Result<(), EngineError> {
        if self.pending_bestmoves == 0 {
            return Ok(());
        }

        tracing::debug!(
            pending = self.pending_bestmoves,
            "Stopping abandoned search before a new one"
        );
        self.send_line("stop").await?;

        let timeout = self.search_timeout;
        while self.pending_bestmoves > 0 {
            match self.wait_for(timeout, take_best_move).await {
                Ok(stale) => {
                    self.pending_bestmoves -= 1;
                    tracing::debug!("Discarded answer of abandoned search: {:?}", stale);
                }
                Err(e) => {
                    tracing::error!("Abandoned search never answered: {}", e);
                    return Err(self.fail(EngineError::Closed));
                }
            }
        }
        Ok(())
    }

    fn ensure_usable(&self) -> Result<(), EngineError> {
        if self.unusable {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    /// Retire the engine after an error that leaves the protocol out of sync.
    fn fail(&mut self, err: EngineError) -> EngineError {
        if matches!(err, EngineError::Closed) {
            self.unusable = true;
        }
        err
    }

    async fn set_option(
        &mut self,
        name: &str,
        value: impl std::fmt::Display,
    ) -> Result<(), EngineError> {
        self.send_line(&format!("setoption name {} value {}", name, value))
            .await
    }

    async fn send_line(&mut self, line: &str) -> Result<(), EngineError> {
        tracing::trace!("UCI >> {}", line);
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        if let Err(e) = self.stdin.write_all(&bytes).await {
            return Err(self.fail(write_error(e)));
        }
        self.stdin
            .flush()
            .await
            .map_err(|e| self.fail(write_error(e)))
    }

    /// Wait until `pick` accepts an event, the engine closes, or `timeout` elapses.
    async fn wait_for<T>(
        &mut self,
        timeout: Duration,
        mut pick: impl FnMut(EngineEvent) -> Option<T>,
    ) -> Result<T, EngineError> {
        let rx = &mut self.event_rx;
        tokio::time::timeout(timeout, async {
            while let Some(event) = rx.recv().await {
                if let Some(value) = pick(event) {
                    return Ok(value);
                }
            }
            Err(EngineError::Closed)
        })
        .await
        .map_err(|_| EngineError::Timeout(timeout))?
    }

    fn drain_stale_events(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            tracing::trace!("Discarding stale event: {:?}", event);
        }
    }
}

fn take_best_move(event: EngineEvent) -> Option<Option<Move>> {
    match event {
        EngineEvent::BestMove(mv) => Some(mv),
        _ => None,
    }
}

fn log_search_result(mv: Option<&Move>, info: Option<&EngineInfo>) {
    let mv = mv.map(format_uci_move);
    match info {
        Some(info) => tracing::info!(
            best_move = ?mv,
            depth = ?info.depth,
            seldepth = ?info.seldepth,
            score = ?info.score,
            nodes = ?info.nodes,
            nps = ?info.nps,
            time_ms = ?info.time_ms,
            pv = %info.pv.iter().map(format_uci_move).collect::<Vec<_>>().join(" "),
            "Received bestmove"
        ),
        None => tracing::info!(best_move = ?mv, "Received bestmove"),
    }
}

fn handshake_error(expected: &str, err: EngineError) -> EngineError {
    match err {
        EngineError::Timeout(t) => {
            EngineError::Handshake(format!("no {} within {}ms", expected, t.as_millis()))
        }
        EngineError::Closed => {
            EngineError::Handshake(format!("engine exited before {}", expected))
        }
        other => other,
    }
}

fn write_error(e: std::io::Error) -> EngineError {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        EngineError::Closed
    } else {
        EngineError::Io(e)
    }
}

/// Decode engine stdout into events until EOF. Dropping `event_tx` on exit
/// is what signals [`EngineError::Closed`] to waiters.
async fn read_engine_output(stdout: ChildStdout, event_tx: mpsc::Sender<EngineEvent>) {
    let mut reader = BufReader::new(stdout);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                tracing::warn!("Engine stdout EOF - engine closed");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                tracing::trace!("UCI << {}", trimmed);

                let event = match parse_uci_message(trimmed) {
                    Ok(UciMessage::UciOk) => EngineEvent::UciOk,
                    Ok(UciMessage::ReadyOk) => EngineEvent::ReadyOk,
                    Ok(UciMessage::BestMove { mv, ponder }) => {
                        if let Some(ponder) = ponder {
                            tracing::debug!("Engine expects reply {}", format_uci_move(&ponder));
                        }
                        EngineEvent::BestMove(mv)
                    }
                    Ok(UciMessage::Info(info)) => EngineEvent::Info(info),
                    Ok(UciMessage::Id { name, value }) => {
                        tracing::debug!("Engine id {}: {}", name, value);
                        continue;
                    }
                    Err(e) => {
                        tracing::trace!("Ignoring engine output: {}", e);
                        continue;
                    }
                };

                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!("Error reading from engine stdout: {}", e);
                break;
            }
        }
    }
    tracing::debug!("Output reader task exiting");
}

/// Resolve the configured engine path. Bare names (`stockfish`) are looked up
/// on `PATH`; anything else must be an existing executable file.
pub fn resolve_engine_path(path: &Path) -> Result<PathBuf, EngineError> {
    let is_bare_name = path.components().count() == 1 && !path.is_absolute();
    if is_bare_name && !path.exists() {
        let found = std::env::var_os("PATH").and_then(|dirs| {
            std::env::split_paths(&dirs)
                .map(|dir| dir.join(path))
                .find(|candidate| check_executable(candidate).is_ok())
        });
        return found.ok_or_else(|| EngineError::NotFound(path.to_path_buf()));
    }

    check_executable(path)?;
    Ok(path.to_path_buf())
}

fn check_executable(path: &Path) -> Result<(), EngineError> {
    let metadata =
        std::fs::metadata(path).map_err(|_| EngineError::NotFound(path.to_path_buf()))?;
    if !metadata.is_file() {
        return Err(EngineError::NotExecutable(path.to_path_buf()));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(EngineError::NotExecutable(path.to_path_buf()));
        }
    }

    Ok(())
}
