//! `RealmServer` builder, accept loop, and world loop.
//!
//! Two long-running tasks make up a server:
//!
//! - the **accept loop** spawns a handler task per connection;
//! - the **world loop** owns the [`SessionRegistry`]. It admits
//!   authenticated connections as they arrive and runs the world tick.
//!
//! Handlers hand connections to the world loop over a channel, so the
//! registry is only ever touched from one task.

use std::sync::{Arc, Weak};
use std::time::Duration;

use realmkeep_protocol::{Codec, Envelope, JsonCodec};
use realmkeep_region::RegionManager;
use realmkeep_session::{
    AuthenticatedAccount, Authenticator, Database, OpcodeTable, Services, SessionInbox, Socket,
    World,
};
use realmkeep_tick::TickLoop;
use realmkeep_transport::{Transport, WebSocketTransport};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::bridge::SocketBridge;
use crate::handler::handle_connection;
use crate::{RealmkeepError, ServerConfig, SessionRegistry};

/// An authenticated connection waiting to be bound to a session.
pub(crate) struct Admission {
    pub(crate) account: AuthenticatedAccount,
    pub(crate) socket: Arc<SocketBridge>,
    /// The auth session envelope, read cursor past the token.
    pub(crate) auth: Envelope,
    /// Dropped unanswered when the connection is refused.
    pub(crate) reply: oneshot::Sender<Weak<SessionInbox>>,
}

/// State shared by every connection handler task.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) auth: A,
    pub(crate) codec: C,
    pub(crate) admissions: mpsc::Sender<Admission>,
    pub(crate) handshake_timeout: Duration,
    pub(crate) opcode_history: usize,
}

/// Builder for a [`RealmServer`].
///
/// # Example
///
/// ```rust,ignore
/// use realmkeep::prelude::*;
///
/// let server = RealmServerBuilder::new()
///     .config(ServerConfig::default().bind("0.0.0.0:8085"))
///     .world(my_world)
///     .login_db(login_db)
///     .character_db(character_db)
///     .build(my_auth)
///     .await?;
/// server.run().await
/// ```
pub struct RealmServerBuilder {
    config: ServerConfig,
    world: Option<Arc<dyn World>>,
    login_db: Option<Arc<dyn Database>>,
    character_db: Option<Arc<dyn Database>>,
    opcodes: Option<OpcodeTable>,
}

impl RealmServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            world: None,
            login_db: None,
            character_db: None,
            opcodes: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    pub fn world(mut self, world: Arc<dyn World>) -> Self {
        self.world = Some(world);
        self
    }

    pub fn login_db(mut self, db: Arc<dyn Database>) -> Self {
        self.login_db = Some(db);
        self
    }

    pub fn character_db(mut self, db: Arc<dyn Database>) -> Self {
        self.character_db = Some(db);
        self
    }

    /// Replaces the opcode table. Defaults to
    /// [`OpcodeTable::with_core_handlers`].
    pub fn opcodes(mut self, opcodes: OpcodeTable) -> Self {
        self.opcodes = Some(opcodes);
        self
    }

    /// Binds the listener and starts the region pool. Frames are JSON.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<RealmServer<A, JsonCodec>, RealmkeepError> {
        let world = self
            .world
            .ok_or(RealmkeepError::MissingCollaborator("world"))?;
        let login_db = self
            .login_db
            .ok_or(RealmkeepError::MissingCollaborator("login database"))?;
        let character_db = self
            .character_db
            .ok_or(RealmkeepError::MissingCollaborator("character database"))?;
        let opcodes = match self.opcodes {
            Some(opcodes) => opcodes,
            None => OpcodeTable::with_core_handlers()?,
        };

        let services = Services {
            world,
            login_db,
            character_db,
            opcodes: Arc::new(opcodes),
            config: Arc::new(self.config.session.clone()),
        };

        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let regions = RegionManager::start(self.config.regions.clone());
        let registry =
            SessionRegistry::new(services, self.config.max_active_sessions, regions);

        let (admissions_tx, admissions_rx) =
            mpsc::channel(self.config.admission_channel_size.max(1));
        let state = Arc::new(ServerState {
            auth,
            codec: JsonCodec,
            admissions: admissions_tx,
            handshake_timeout: self.config.handshake_timeout(),
            opcode_history: self.config.opcode_history,
        });

        Ok(RealmServer {
            transport,
            state,
            world: WorldLoop {
                registry,
                admissions: admissions_rx,
                ticks: TickLoop::new(self.config.world_tick.clone()),
            },
        })
    }
}

impl Default for RealmServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound realm server. Call [`run`](Self::run) to start serving.
pub struct RealmServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
    world: WorldLoop,
}

impl<A, C> RealmServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Starts the world loop and runs the accept loop. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), RealmkeepError> {
        info!(addr = ?self.local_addr().ok(), "realm server running");
        tokio::spawn(self.world.run());

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(err) = handle_connection(conn, state).await {
                            debug!(%err, "connection ended with error");
                        }
                    });
                }
                Err(err) => error!(%err, "accept failed"),
            }
        }
    }
}

/// The world tick task.
struct WorldLoop {
    registry: SessionRegistry,
    admissions: mpsc::Receiver<Admission>,
    ticks: TickLoop,
}

impl WorldLoop {
    async fn run(mut self) {
        info!(rate = self.ticks.rate_hz(), "world loop started");

        loop {
            tokio::select! {
                admission = self.admissions.recv() => match admission {
                    Some(admission) => self.admit(admission),
                    None => break,
                },
                tick = self.ticks.next_tick() => {
                    let removed = self.registry.update_sessions(tick.at).await;
                    if removed > 0 {
                        debug!(tick = tick.number, removed, sessions = self.registry.len(), "sessions removed");
                    }
                    self.ticks.finish_tick();
                }
            }
        }

        self.registry.shutdown().await;
        info!("world loop stopped");
    }

    fn admit(&mut self, admission: Admission) {
        let Admission {
            account,
            socket,
            mut auth,
            reply,
        } = admission;
        let account_id = account.account_id;
        let now = tokio::time::Instant::now().into_std();

        let socket: Arc<dyn Socket> = socket;
        match self
            .registry
            .add_session(account, Arc::clone(&socket), &mut auth, now)
        {
            Ok(inbox) => {
                let _ = reply.send(Arc::downgrade(&inbox));
            }
            Err(err) => {
                warn!(account = %account_id, %err, "login refused");
                socket.close();
            }
        }
    }
}
