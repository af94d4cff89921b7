use crate::protocol::{profile_strings, Request, Response, StatusSnapshot};
use crate::resolve::resolve_command;
use crate::store::TimeSeriesStore;
use ssvep_core::{DisplayError, Result, Task};
use ssvep_engine::EngineContext;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Builder for the control listener. The listener runs on its own thread with
/// its own tokio runtime so the render loop never touches the network.
pub struct ControlServer {
    ctx: Arc<EngineContext>,
    store: Arc<dyn TimeSeriesStore>,
    ctrl_c: bool,
}

impl ControlServer {
    pub fn new(ctx: Arc<EngineContext>, store: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            ctx,
            store,
            ctrl_c: true,
        }
    }

    /// Whether Ctrl-C requests a display shutdown. Tests turn this off.
    pub fn with_ctrl_c(mut self, enabled: bool) -> Self {
        self.ctrl_c = enabled;
        self
    }

    /// Binds `addr` synchronously, so bind failures surface to the caller,
    /// then serves connections on a background thread.
    pub fn spawn(self, addr: impl ToSocketAddrs) -> Result<ControlHandle> {
        let listener = std::net::TcpListener::bind(addr)
            .map_err(|e| DisplayError::Connection(format!("cannot bind control socket: {e}")))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| DisplayError::Connection(format!("cannot configure control socket: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| DisplayError::Connection(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        let thread = std::thread::Builder::new()
            .name("ssvep-control".into())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .thread_name("ssvep-control-io")
                    .enable_all()
                    .build();
                match runtime {
                    Ok(rt) => rt.block_on(serve(listener, self, rx)),
                    Err(e) => error!("control runtime failed to start: {}", e),
                }
            })
            .map_err(|e| DisplayError::Connection(format!("cannot start control thread: {e}")))?;

        info!("Control channel listening on {}", local_addr);
        Ok(ControlHandle {
            local_addr,
            shutdown: Some(tx),
            thread: Some(thread),
        })
    }
}

/// Owner of the running listener. Dropping it stops the control thread.
pub struct ControlHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl ControlHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, drops open connections and joins the thread. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            // receiver is gone if the loop already exited on Ctrl-C
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("control thread panicked");
            }
            info!("Control channel stopped");
        }
    }
}

impl Drop for ControlHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Accept loop
// ═══════════════════════════════════════════════════════════════════════════

async fn serve(
    listener: std::net::TcpListener,
    server: ControlServer,
    mut shutdown: oneshot::Receiver<()>,
) {
    let listener = match TcpListener::from_std(listener) {
        Ok(l) => l,
        Err(e) => {
            error!("control socket unusable: {}", e);
            return;
        }
    };

    let watch_ctrl_c = server.ctrl_c;
    let ctrl_c = async move {
        if watch_ctrl_c {
            match tokio::signal::ctrl_c().await {
                Ok(()) => return,
                Err(e) => warn!("cannot listen for Ctrl-C: {}", e),
            }
        }
        std::future::pending::<()>().await
    };
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = &mut ctrl_c => {
                info!("Ctrl-C received, shutting down");
                server.ctx.request_shutdown();
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    info!("Client connected: {}", addr);
                    let ctx = Arc::clone(&server.ctx);
                    let store = Arc::clone(&server.store);
                    tokio::spawn(async move {
                        match handle_client(stream, ctx, store).await {
                            Ok(()) => info!("Client disconnected: {}", addr),
                            Err(e) => error!("Client {} failed: {}", addr, e),
                        }
                    });
                }
                Err(e) => warn!("accept failed: {}", e),
            },
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Client Handler
// ═══════════════════════════════════════════════════════════════════════════

async fn handle_client(
    stream: TcpStream,
    ctx: Arc<EngineContext>,
    store: Arc<dyn TimeSeriesStore>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await.map_err(io_error)? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                let err = DisplayError::Connection(format!("malformed message: {e}"));
                reply(&mut writer, &Response::error(&err)).await?;
                return Err(err);
            }
        };

        let response = dispatch(request, &ctx, &store).await;
        reply(&mut writer, &response).await?;
    }
    Ok(())
}

async fn dispatch(
    request: Request,
    ctx: &EngineContext,
    store: &Arc<dyn TimeSeriesStore>,
) -> Response {
    debug!(kind = request.kind(), "request");
    match request {
        Request::StartSsvep(cmd) => {
            let store = Arc::clone(store);
            let resolved = tokio::task::spawn_blocking(move || resolve_command(cmd, store.as_ref()))
                .await
                .unwrap_or_else(|e| Err(DisplayError::command(format!("resolver failed: {e}"))));
            match resolved {
                Ok(cmd) => {
                    ctx.tasks.push(Task::StartSsvep(Box::new(cmd)));
                    Response::ok()
                }
                Err(e) => {
                    warn!("StartSSVEP rejected: {}", e);
                    Response::error(&e)
                }
            }
        }
        Request::SetUserProfile { profile } => {
            ctx.profile.post(profile_strings(profile));
            Response::ok()
        }
        Request::CheckoutDisplayStatus => Response::Status(StatusSnapshot::capture(ctx)),
        Request::SetPrompt { prompt } => {
            ctx.prompt.post(prompt);
            Response::ok()
        }
    }
}

async fn reply(writer: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| DisplayError::Connection(format!("cannot encode reply: {e}")))?;
    writer.write_all(json.as_bytes()).await.map_err(io_error)?;
    writer.write_all(b"\n").await.map_err(io_error)?;
    Ok(())
}

fn io_error(e: std::io::Error) -> DisplayError {
    DisplayError::Connection(e.to_string())
}
