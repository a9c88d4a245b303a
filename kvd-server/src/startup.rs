//! Process startup: raft node, gateway, bootstrap or join.

use crate::api::{ApiServer, AppState, ServerConfig};
use crate::config::NodeConfig;
use crate::diagnostics::{LEADER_LOG_INTERVAL, spawn_leader_logger};
use anyhow::{Context, Result, anyhow};
use kvd_cluster::{
    BootstrapOutcome, ClusterError, ClusterResult, Coordinator, HttpJoinClient, JoinOutcome,
    JoinPolicy, KvNode,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};

/// Time a join request may take beyond the peer's own admit deadline.
const JOIN_REQUEST_SLACK: Duration = Duration::from_secs(5);

/// A running kvd process: raft node, HTTP gateway and background tasks.
pub struct Node {
    name: String,
    kv: Arc<KvNode>,
    http_addr: SocketAddr,
    gateway: Option<JoinHandle<std::io::Result<()>>>,
    gateway_stop: Option<oneshot::Sender<()>>,
    join_task: Option<JoinHandle<ClusterResult<JoinOutcome>>>,
    leader_logger: JoinHandle<()>,
}

enum Event {
    Fatal(ClusterError),
    GatewayStopped(Result<std::io::Result<()>, JoinError>),
    Joined(Result<ClusterResult<JoinOutcome>, JoinError>),
}

impl Node {
    /// Start the raft node and the gateway, then bootstrap or begin joining.
    ///
    /// Bootstrapping completes before this returns. Joining runs in the
    /// background; its failure is reported by [`Node::wait`].
    pub async fn start(config: NodeConfig) -> Result<Self> {
        let cluster_config = config.cluster_config()?;
        tracing::info!(
            node_id = config.id,
            raft_addr = %cluster_config.listen_addr,
            data_dir = %cluster_config.data_dir.display(),
            "starting raft node"
        );

        let kv = Arc::new(
            KvNode::start(cluster_config.clone())
                .await
                .context("failed to start raft node")?,
        );

        let coordinator = Arc::new(Coordinator::new(
            Arc::clone(&kv),
            HttpJoinClient::new(cluster_config.admit_timeout() + JOIN_REQUEST_SLACK),
            JoinPolicy::from(&cluster_config.join),
            cluster_config.admit_timeout(),
        ));

        let state = Arc::new(AppState::new(
            config.name.clone(),
            Arc::clone(&kv),
            Arc::clone(&coordinator),
        ));
        let server = ApiServer::bind(&ServerConfig::new(&config.host, config.port), state)
            .await
            .with_context(|| format!("failed to bind HTTP gateway on {}", config.http_addr()))?;
        let http_addr = server.local_addr();

        let (gateway_stop, stop_rx) = oneshot::channel();
        let gateway = tokio::spawn(server.run(async move {
            let _ = stop_rx.await;
        }));

        if config.bootstrap {
            match coordinator
                .bootstrap()
                .await
                .context("failed to bootstrap cluster")?
            {
                BootstrapOutcome::Bootstrapped => tracing::info!("cluster bootstrapped"),
                BootstrapOutcome::AlreadyBootstrapped => {
                    tracing::info!("cluster is already bootstrapped")
                }
            }
        }

        let join_task = config.join_target().map(|peer| {
            let coordinator = Arc::clone(&coordinator);
            let peer = peer.to_string();
            tokio::spawn(async move { coordinator.join(&peer).await })
        });

        let leader_logger = spawn_leader_logger(Arc::clone(&kv), LEADER_LOG_INTERVAL);

        tracing::info!(addr = %http_addr, "node started");

        Ok(Self {
            name: config.name,
            kv,
            http_addr,
            gateway: Some(gateway),
            gateway_stop: Some(gateway_stop),
            join_task,
            leader_logger,
        })
    }

    /// Node name from the configuration file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The local cluster node.
    pub fn kv(&self) -> &Arc<KvNode> {
        &self.kv
    }

    /// Address the HTTP gateway is bound to.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Run until a fatal condition occurs.
    ///
    /// Fatal conditions are the raft core or its RPC server stopping, the
    /// gateway failing, and every join attempt failing. A successful join is logged and waiting
    /// continues.
    pub async fn wait(&mut self) -> Result<()> {
        loop {
            let event = tokio::select! {
                fatal = self.kv.wait_fatal() => Event::Fatal(fatal),
                served = wait_task(&mut self.gateway) => Event::GatewayStopped(served),
                joined = wait_task(&mut self.join_task) => Event::Joined(joined),
            };

            match event {
                Event::Fatal(e) => return Err(anyhow::Error::new(e)),
                Event::GatewayStopped(served) => {
                    self.gateway = None;
                    return match served {
                        Ok(Ok(())) => Err(anyhow!("HTTP gateway stopped")),
                        Ok(Err(e)) => Err(anyhow::Error::new(e).context("HTTP gateway failed")),
                        Err(e) => Err(anyhow::Error::new(e).context("HTTP gateway task failed")),
                    };
                }
                Event::Joined(joined) => {
                    self.join_task = None;
                    match joined {
                        Ok(Ok(JoinOutcome::AlreadyMember)) => {
                            tracing::info!("node is already a cluster member")
                        }
                        Ok(Ok(JoinOutcome::Joined { attempts })) => {
                            tracing::info!(attempts, "joined cluster")
                        }
                        Ok(Err(e)) => {
                            return Err(anyhow::Error::new(e).context("failed to join cluster"));
                        }
                        Err(e) => return Err(anyhow::Error::new(e).context("join task failed")),
                    }
                }
            }
        }
    }

    /// Stop the gateway and background tasks, then shut the raft node down.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(stop) = self.gateway_stop.take() {
            let _ = stop.send(());
        }
        if let Some(gateway) = self.gateway.take() {
            match gateway.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "HTTP gateway stopped with error"),
                Err(e) => tracing::warn!(error = %e, "HTTP gateway task failed"),
            }
        }
        if let Some(join) = self.join_task.take() {
            join.abort();
        }
        self.leader_logger.abort();

        self.kv
            .shutdown()
            .await
            .context("failed to shut down raft node")?;
        tracing::info!("node stopped");
        Ok(())
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if let Some(stop) = self.gateway_stop.take() {
            let _ = stop.send(());
        }
        if let Some(join) = self.join_task.take() {
            join.abort();
        }
        self.leader_logger.abort();
    }
}

/// Await a task, or never resolve when there is none.
async fn wait_task<T>(task: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Run a node until Ctrl-C or a fatal error.
pub async fn run(config: NodeConfig) -> Result<()> {
    let mut node = Node::start(config).await?;

    let outcome = tokio::select! {
        result = node.wait() => result,
        signal = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            signal.context("failed to listen for Ctrl-C")
        }
    };

    if let Err(e) = &outcome {
        tracing::error!(error = %format!("{:#}", e), "node stopping on fatal error");
    }

    node.shutdown().await?;
    outcome
}
