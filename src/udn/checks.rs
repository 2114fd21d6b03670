//! Network checks for VMs attached to a primary UDN
//!
//! Each check returns a [`CheckResult`] rather than an error so a run can
//! report every outcome.

use futures::FutureExt;
use std::future::Future;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use super::subnet::Subnet;
use crate::models::{CheckKind, CheckResult};
use crate::traffic::{ActiveConnection, Connection, RemoteExecutor};

/// Number of echo requests sent by ping checks
pub const PING_COUNT: u32 = 3;

/// Liveness samples taken while holding a connection open
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HoldReport {
    pub samples: usize,
    pub inactive: usize,
}

impl HoldReport {
    pub fn all_active(&self) -> bool {
        self.samples > 0 && self.inactive == 0
    }
}

/// The VM address lies in one of the UDN subnets
pub fn check_ip_in_subnets(ip: IpAddr, subnets: &[Subnet]) -> CheckResult {
    let listed = subnets
        .iter()
        .map(Subnet::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    match subnets.iter().find(|s| s.contains(ip)) {
        Some(subnet) => CheckResult::pass(CheckKind::SubnetMembership, format!("{ip} in {subnet}")),
        None => CheckResult::fail(
            CheckKind::SubnetMembership,
            format!("{ip} is not in the UDN subnets ({listed})"),
        ),
    }
}

/// The VM kept its address across a live migration
pub fn check_ip_preserved(before: IpAddr, after: IpAddr) -> CheckResult {
    if before == after {
        CheckResult::pass(
            CheckKind::IpPreservedAfterMigration,
            format!("{before} preserved"),
        )
    } else {
        CheckResult::fail(
            CheckKind::IpPreservedAfterMigration,
            format!("IP {before} was not preserved during live migration, IP after migration: {after}"),
        )
    }
}

/// `ping` `destination` from `target`
pub async fn check_ping(
    kind: CheckKind,
    target: &dyn RemoteExecutor,
    destination: IpAddr,
    timeout: Duration,
) -> CheckResult {
    let start = Instant::now();
    let command = format!("ping -c {PING_COUNT} {destination}");
    info!("Pinging {} from {}", destination, target.name());

    let result = match target.execute(&[command], timeout).await {
        Ok(()) => CheckResult::pass(
            kind,
            format!("{} reached {destination}", target.name()),
        ),
        Err(e) => CheckResult::fail(kind, e.to_string()),
    };
    result.with_duration_ms(start.elapsed().as_millis() as u64)
}

/// Sample `is_active` every `interval` until `hold` has elapsed
pub async fn hold_connection(
    active: &ActiveConnection,
    hold: Duration,
    interval: Duration,
) -> HoldReport {
    let start = Instant::now();
    let mut report = HoldReport::default();

    loop {
        report.samples += 1;
        if !active.is_active().await {
            warn!(
                "Connection {} -> {} inactive after {:?}",
                active.client().name(),
                active.server().name(),
                start.elapsed()
            );
            report.inactive += 1;
        }

        if start.elapsed() >= hold {
            return report;
        }
        sleep(interval).await;
    }
}

/// Open `connection`, keep it up for `hold`, and tear it down
pub async fn check_traffic(
    connection: Connection,
    hold: Duration,
    interval: Duration,
) -> CheckResult {
    let start = Instant::now();
    let outcome = connection
        .scope(|active| hold_connection(active, hold, interval).boxed())
        .await;

    let result = match outcome {
        Ok(report) if report.all_active() => CheckResult::pass(
            CheckKind::TrafficConnection,
            format!("active in all {} samples", report.samples),
        ),
        Ok(report) => CheckResult::fail(
            CheckKind::TrafficConnection,
            format!("inactive in {} of {} samples", report.inactive, report.samples),
        ),
        Err(e) => CheckResult::error(CheckKind::TrafficConnection, e.to_string()),
    };
    result.with_duration_ms(start.elapsed().as_millis() as u64)
}

/// Open `connection`, run `during` (typically a wait for live migration),
/// and check the connection is still active afterwards
pub async fn check_traffic_survives<F>(connection: Connection, during: F) -> CheckResult
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let start = Instant::now();
    let outcome = connection
        .scope(|active| {
            async move {
                during.await?;
                Ok::<_, anyhow::Error>(active.is_active().await)
            }
            .boxed()
        })
        .await;

    let result = match outcome {
        Ok(Ok(true)) => CheckResult::pass(
            CheckKind::TrafficAfterMigration,
            "connection still active",
        ),
        Ok(Ok(false)) => CheckResult::fail(
            CheckKind::TrafficAfterMigration,
            "connection is no longer active",
        ),
        Ok(Err(e)) => CheckResult::error(CheckKind::TrafficAfterMigration, format!("{e:#}")),
        Err(e) => CheckResult::error(CheckKind::TrafficAfterMigration, e.to_string()),
    };
    result.with_duration_ms(start.elapsed().as_millis() as u64)
}
