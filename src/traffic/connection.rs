//! Client/server traffic connection lifecycle
//!
//! A [`Connection`] pairs a server and a client endpoint. Opening it starts
//! the server, then the client, and verifies both are alive; releasing it
//! stops the client, then the server, each only if still running.
//!
//! Targets must not be shared by two connections issuing conflicting
//! start/stop commands at the same time. Nothing here locks against that.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use tracing::{info, warn};

use super::endpoint::TrafficEndpoint;
use super::error::TrafficError;
use super::executor::RemoteTarget;
use super::settings::TrafficSettings;

/// An unopened server/client pair
#[derive(Clone, Debug)]
pub struct Connection {
    server: TrafficEndpoint,
    client: TrafficEndpoint,
}

impl Connection {
    pub fn new(server: TrafficEndpoint, client: TrafficEndpoint) -> Self {
        Self { server, client }
    }

    pub fn server(&self) -> &TrafficEndpoint {
        &self.server
    }

    pub fn client(&self) -> &TrafficEndpoint {
        &self.client
    }

    /// Point-in-time check that both endpoints are running
    pub async fn is_active(&self) -> bool {
        is_active(&self.server, &self.client).await
    }

    /// Start server then client and verify both are alive.
    ///
    /// When the client fails to start or the verification fails, whatever
    /// did start is stopped before the error is returned.
    pub async fn open(self) -> Result<ActiveConnection, TrafficError> {
        info!(
            "Opening connection {} ({}) -> {} ({})",
            self.client.name(),
            self.client.target_name(),
            self.server.name(),
            self.server.target_name()
        );

        self.server.start().await?;

        if let Err(e) = self.client.start().await {
            self.rollback().await;
            return Err(e.into());
        }

        let server_running = self.server.is_running().await;
        let client_running = server_running && self.client.is_running().await;
        if !(server_running && client_running) {
            self.rollback().await;
            return Err(TrafficError::ConnectionSetup {
                server: self.server.name().to_string(),
                client: self.client.name().to_string(),
                server_running,
                client_running,
            });
        }

        info!("Connection {} -> {} is active", self.client.name(), self.server.name());
        Ok(ActiveConnection {
            server: self.server,
            client: self.client,
            released: false,
        })
    }

    /// Open the connection, run `body`, and release on every exit path.
    ///
    /// A panic inside `body` is resumed after the release attempt.
    pub async fn scope<F, T>(self, body: F) -> Result<T, TrafficError>
    where
        F: for<'a> FnOnce(&'a ActiveConnection) -> BoxFuture<'a, T>,
    {
        let mut active = self.open().await?;
        let outcome = AssertUnwindSafe(body(&active)).catch_unwind().await;
        let released = active.release().await;

        match outcome {
            Ok(value) => released.map(|()| value),
            Err(panic) => {
                if let Err(e) = released {
                    warn!("Release after panic failed: {}", e);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    async fn rollback(&self) {
        warn!(
            "Rolling back connection {} -> {}",
            self.client.name(),
            self.server.name()
        );
        if let Err(e) = teardown(&self.server, &self.client).await {
            warn!("Rollback incomplete: {}", e);
        }
    }
}

/// An opened connection; both endpoints were observed running on entry
#[derive(Debug)]
pub struct ActiveConnection {
    server: TrafficEndpoint,
    client: TrafficEndpoint,
    released: bool,
}

impl ActiveConnection {
    pub fn server(&self) -> &TrafficEndpoint {
        &self.server
    }

    pub fn client(&self) -> &TrafficEndpoint {
        &self.client
    }

    /// Point-in-time check that both endpoints are running
    pub async fn is_active(&self) -> bool {
        is_active(&self.server, &self.client).await
    }

    /// Stop client then server, each only if running.
    ///
    /// Safe to call repeatedly. Every stop is attempted even if an earlier
    /// one fails; failures are reported together.
    pub async fn release(&mut self) -> Result<(), TrafficError> {
        self.released = true;
        teardown(&self.server, &self.client).await
    }

    /// Release and consume
    pub async fn close(mut self) -> Result<(), TrafficError> {
        self.release().await
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        warn!(
            "Connection {} -> {} dropped without release",
            self.client.name(),
            self.server.name()
        );
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let server = self.server.clone();
                let client = self.client.clone();
                handle.spawn(async move {
                    if let Err(e) = teardown(&server, &client).await {
                        warn!("Background teardown failed: {}", e);
                    }
                });
            }
            Err(_) => warn!("No runtime available, endpoints left running"),
        }
    }
}

async fn is_active(server: &TrafficEndpoint, client: &TrafficEndpoint) -> bool {
    server.is_running().await && client.is_running().await
}

async fn teardown(server: &TrafficEndpoint, client: &TrafficEndpoint) -> Result<(), TrafficError> {
    let mut failures = Vec::new();

    for endpoint in [client, server] {
        if endpoint.is_running().await {
            if let Err(e) = endpoint.stop().await {
                warn!("Failed to stop {} {}: {}", endpoint.role(), endpoint.name(), e);
                failures.push(e);
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(TrafficError::Teardown(failures))
    }
}

/// Build an unopened connection with default settings
pub fn connection(
    server_name: impl Into<String>,
    client_name: impl Into<String>,
    server_target: RemoteTarget,
    client_target: RemoteTarget,
    server_ip: IpAddr,
    server_port: u16,
) -> Connection {
    connection_with_settings(
        &TrafficSettings::default(),
        server_name,
        client_name,
        server_target,
        client_target,
        server_ip,
        server_port,
    )
}

/// Build an unopened connection
pub fn connection_with_settings(
    settings: &TrafficSettings,
    server_name: impl Into<String>,
    client_name: impl Into<String>,
    server_target: RemoteTarget,
    client_target: RemoteTarget,
    server_ip: IpAddr,
    server_port: u16,
) -> Connection {
    Connection::new(
        TrafficEndpoint::server(server_name, server_target, server_port, settings),
        TrafficEndpoint::client(client_name, client_target, server_ip, server_port, settings),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traffic::testing::{FakeTarget, Journal};
    use std::sync::Arc;
    use std::time::Duration;

    struct Pair {
        journal: Journal,
        vma: Arc<FakeTarget>,
        vmb: Arc<FakeTarget>,
    }

    impl Pair {
        fn new() -> Self {
            let journal = Journal::default();
            Self {
                vma: FakeTarget::with_journal("vma", &journal),
                vmb: FakeTarget::with_journal("vmb", &journal),
                journal,
            }
        }

        // vmb serves, vma connects
        fn connection(&self) -> Connection {
            connection(
                "vmb",
                "vma",
                self.vmb.clone(),
                self.vma.clone(),
                "10.10.0.5".parse().unwrap(),
                5201,
            )
        }

        fn position(&self, target: &str, prefix: &str) -> Option<usize> {
            self.journal
                .lock()
                .unwrap()
                .iter()
                .position(|(t, c)| t == target && c.starts_with(prefix))
        }
    }

    #[tokio::test]
    async fn test_open_starts_server_before_client() {
        let pair = Pair::new();
        let mut active = pair.connection().open().await.unwrap();

        let server_start = pair.position("vmb", "iperf3 --server").unwrap();
        let client_start = pair.position("vma", "nohup iperf3 --client").unwrap();
        assert!(server_start < client_start);
        assert!(active.is_active().await);

        active.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_scenario_server_start_failure() {
        let pair = Pair::new();
        pair.vmb.fail_on("iperf3 --server");

        let err = pair.connection().open().await.unwrap_err();
        assert!(matches!(err, TrafficError::Command(_)));
        assert_eq!(pair.vma.count("nohup"), 0);
        assert!(pair.vma.processes().is_empty());
    }

    #[tokio::test]
    async fn test_client_start_failure_rolls_back_server() {
        let pair = Pair::new();
        pair.vma.fail_on("nohup");

        let err = pair.connection().open().await.unwrap_err();
        assert!(matches!(err, TrafficError::Command(_)));
        assert!(pair.vmb.processes().is_empty());
        assert_eq!(pair.vmb.count("pkill"), 1);
    }

    #[tokio::test]
    async fn test_setup_error_when_client_never_comes_up() {
        let pair = Pair::new();
        pair.vma.launches_die(true);

        match pair.connection().open().await {
            Err(TrafficError::ConnectionSetup {
                server_running,
                client_running,
                ..
            }) => {
                assert!(server_running);
                assert!(!client_running);
            }
            other => panic!("expected setup error, got {other:?}"),
        }
        assert!(pair.vmb.processes().is_empty());
    }

    #[tokio::test]
    async fn test_server_death_makes_connection_inactive() {
        let pair = Pair::new();
        let mut active = pair.connection().open().await.unwrap();

        pair.vmb.kill_all();
        assert!(!active.is_active().await);

        active.release().await.unwrap();
        assert_eq!(pair.vmb.count("pkill"), 0);
        assert_eq!(pair.vma.count("pkill"), 1);
        assert!(pair.vma.processes().is_empty());
    }

    #[tokio::test]
    async fn test_release_stops_client_before_server() {
        let pair = Pair::new();
        let active = pair.connection().open().await.unwrap();
        active.close().await.unwrap();

        let client_stop = pair.position("vma", "pkill").unwrap();
        let server_stop = pair.position("vmb", "pkill").unwrap();
        assert!(client_stop < server_stop);
        assert!(pair.vma.processes().is_empty());
        assert!(pair.vmb.processes().is_empty());
    }

    #[tokio::test]
    async fn test_second_release_issues_no_stop() {
        let pair = Pair::new();
        let mut active = pair.connection().open().await.unwrap();

        active.release().await.unwrap();
        let stops = pair.vma.count("pkill") + pair.vmb.count("pkill");

        active.release().await.unwrap();
        assert_eq!(pair.vma.count("pkill") + pair.vmb.count("pkill"), stops);
    }

    #[tokio::test]
    async fn test_failed_client_stop_still_stops_server() {
        let pair = Pair::new();
        let mut active = pair.connection().open().await.unwrap();
        pair.vma.fail_on("pkill");

        match active.release().await {
            Err(TrafficError::Teardown(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].target(), "vma");
            }
            other => panic!("expected teardown error, got {other:?}"),
        }
        assert!(pair.vmb.processes().is_empty());
    }

    #[tokio::test]
    async fn test_both_stops_fail_and_are_reported_in_order() {
        let pair = Pair::new();
        let mut active = pair.connection().open().await.unwrap();
        pair.vma.fail_on("pkill");
        pair.vmb.fail_on("pkill");

        match active.release().await {
            Err(TrafficError::Teardown(failures)) => {
                assert_eq!(failures.len(), 2);
                assert_eq!(failures[0].target(), "vma");
                assert_eq!(failures[1].target(), "vmb");
            }
            other => panic!("expected teardown error, got {other:?}"),
        }

        let client_stop = pair.position("vma", "pkill").unwrap();
        let server_stop = pair.position("vmb", "pkill").unwrap();
        assert!(client_stop < server_stop);

        // Processes are still up, so a later release retries both stops
        pair.vma.clear_failures();
        pair.vmb.clear_failures();
        active.release().await.unwrap();
        assert!(pair.vma.processes().is_empty());
        assert!(pair.vmb.processes().is_empty());
    }

    #[tokio::test]
    async fn test_configured_timeout_reaches_every_command() {
        let pair = Pair::new();
        let settings = TrafficSettings::default().timeout(3);
        let conn = connection_with_settings(
            &settings,
            "vmb",
            "vma",
            pair.vmb.clone(),
            pair.vma.clone(),
            "10.10.0.5".parse().unwrap(),
            5201,
        );

        let active = conn.open().await.unwrap();
        active.close().await.unwrap();

        let timeouts: Vec<_> = pair
            .vma
            .timeouts()
            .into_iter()
            .chain(pair.vmb.timeouts())
            .collect();
        assert_eq!(
            timeouts.len(),
            pair.vma.commands().len() + pair.vmb.commands().len()
        );
        assert_eq!(pair.vmb.count("iperf3 --server"), 1);
        assert_eq!(pair.vma.count("pgrep"), 2);
        assert_eq!(pair.vma.count("pkill"), 1);
        assert!(timeouts.iter().all(|t| *t == Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_scope_releases_after_body() {
        let pair = Pair::new();

        let active = pair
            .connection()
            .scope(|conn| async move { conn.is_active().await }.boxed())
            .await
            .unwrap();

        assert!(active);
        assert!(pair.vma.processes().is_empty());
        assert!(pair.vmb.processes().is_empty());
    }

    #[tokio::test]
    async fn test_scope_releases_after_panic() {
        let pair = Pair::new();
        let connection = pair.connection();

        let outcome: Result<Result<(), TrafficError>, _> = AssertUnwindSafe(connection.scope(|_| {
            async move {
                panic!("assertion inside scope");
            }
            .boxed()
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert!(pair.vma.processes().is_empty());
        assert!(pair.vmb.processes().is_empty());
    }

    #[tokio::test]
    async fn test_scope_does_not_run_body_on_setup_failure() {
        let pair = Pair::new();
        pair.vmb.launches_die(true);

        let result: Result<(), TrafficError> = pair
            .connection()
            .scope(|_| async move { unreachable!("body must not run") }.boxed())
            .await;

        assert!(matches!(result, Err(TrafficError::ConnectionSetup { .. })));
    }

    #[tokio::test]
    async fn test_unopened_connection_is_inactive() {
        let pair = Pair::new();
        assert!(!pair.connection().is_active().await);
        assert_eq!(pair.vma.count("pgrep"), 0);
        assert_eq!(pair.vmb.count("pgrep"), 1);
    }

    #[tokio::test]
    async fn test_drop_without_release_tears_down() {
        let pair = Pair::new();
        let active = pair.connection().open().await.unwrap();
        drop(active);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(pair.vma.processes().is_empty());
        assert!(pair.vmb.processes().is_empty());
    }
}
