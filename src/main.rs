//! udn-nettest - Network checks for KubeVirt VMs on a primary UDN
//!
//! A CLI tool that verifies connectivity of virtual machines attached to an
//! OVN-Kubernetes primary UserDefinedNetwork, including TCP traffic that
//! must survive a live migration.
//!
//! ## Usage
//!
//! ```bash
//! # Keep an iperf3 connection open between two VMs for 30 seconds
//! udn-nettest connect --server-vm vmb-udn --client-vm vma-udn --hold 30
//!
//! # Check the VM address lies within the UDN subnets
//! udn-nettest subnet --vm vma-udn --udn layer2-udn
//!
//! # Egress and VM-to-VM reachability
//! udn-nettest egress --vm vma-udn
//! udn-nettest ping --from vma-udn --to vmb-udn
//!
//! # Wait for the next live migration of vma-udn with traffic from vmb-udn
//! udn-nettest migration --vm vma-udn --peer-vm vmb-udn
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use udn_nettest::cli::{self, Args, Command};
use udn_nettest::config::{print_env_help, AppConfig, ConfigFile, EnvConfig};
use udn_nettest::k8s::K8sClient;
use udn_nettest::kubevirt::{SshRoute, SshTarget, VmiManager};
use udn_nettest::models::{CheckKind, CheckResult, CheckStatus};
use udn_nettest::output::{CheckSummary, OutputFormat, ResultFormatter};
use udn_nettest::traffic::{connection_with_settings, RemoteTarget};
use udn_nettest::udn::{
    check_ip_in_subnets, check_ip_preserved, check_ping, check_traffic, check_traffic_survives,
    UdnManager,
};
use udn_nettest::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    let verbose = args.verbose || env.verbose.unwrap_or(false);
    init_logger(if verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    let config = load_config(&args, &env)?;

    let format_name = match (&env.format, args.format.as_str()) {
        (Some(from_env), "table") => from_env.clone(),
        _ => args.format.clone(),
    };
    let format = OutputFormat::from_str(&format_name)
        .ok_or_else(|| anyhow::anyhow!("Unknown output format: {format_name}"))?;

    let results = match args.command {
        Command::Config(config_args) => return manage_config(config_args, &config, &env),
        Command::Connect(connect_args) => {
            let cluster = Cluster::connect(config).await?;
            vec![run_connect(&cluster, connect_args).await?]
        }
        Command::Subnet(subnet_args) => {
            let cluster = Cluster::connect(config).await?;
            vec![run_subnet(&cluster, subnet_args).await?]
        }
        Command::Egress(egress_args) => {
            let cluster = Cluster::connect(config).await?;
            vec![run_egress(&cluster, egress_args).await?]
        }
        Command::Ping(ping_args) => {
            let cluster = Cluster::connect(config).await?;
            vec![run_ping(&cluster, ping_args).await?]
        }
        Command::Migration(migration_args) => {
            let cluster = Cluster::connect(config).await?;
            run_migration(&cluster, migration_args).await?
        }
    };

    let formatter = ResultFormatter::new(format);
    println!("{}", formatter.format_results(&results));

    if !CheckSummary::from_results(&results).all_passed() {
        std::process::exit(1);
    }

    Ok(())
}

/// Config file, then `UDN_NETTEST_*` variables, then command-line flags
fn load_config(args: &Args, env: &EnvConfig) -> Result<AppConfig> {
    let path = args.config.as_ref().or(env.config_file.as_ref());
    let file = match path {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };

    let mut config = file.app;
    config.apply_env(env);
    if let Some(namespace) = &args.namespace {
        config.namespace = namespace.clone();
    }
    config.expand_paths();
    Ok(config)
}

/// Cluster handles shared by the check commands
struct Cluster {
    config: AppConfig,
    client: K8sClient,
    vmis: VmiManager,
}

impl Cluster {
    async fn connect(config: AppConfig) -> Result<Self> {
        let client = K8sClient::new(config.namespace.clone()).await?;
        if !client.preflight().await? {
            warn!("Required CRDs are missing; lookups will likely fail");
        }

        Ok(Self {
            vmis: VmiManager::new(client.clone()),
            client,
            config,
        })
    }

    fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Executor running commands inside `vm`
    async fn target(&self, vm: &str) -> Result<RemoteTarget> {
        let mut target = SshTarget::new(vm, self.namespace(), self.config.ssh.clone());
        if self.config.ssh.route == SshRoute::Direct {
            target = target.with_address(self.primary_ip(vm).await?.to_string());
        }
        Ok(Arc::new(target))
    }

    async fn primary_ip(&self, vm: &str) -> Result<IpAddr> {
        self.vmis.primary_ip(vm, self.namespace()).await
    }
}

async fn run_connect(cluster: &Cluster, args: cli::ConnectArgs) -> Result<CheckResult> {
    let server_ip = cluster.primary_ip(&args.server_vm).await?;
    info!(
        "Connecting {} -> {} ({}:{}) for {}s",
        args.client_vm, args.server_vm, server_ip, args.port, args.hold
    );

    let conn = connection_with_settings(
        &cluster.config.traffic,
        args.server_vm.as_str(),
        args.client_vm.as_str(),
        cluster.target(&args.server_vm).await?,
        cluster.target(&args.client_vm).await?,
        server_ip,
        args.port,
    );

    Ok(check_traffic(
        conn,
        Duration::from_secs(args.hold),
        Duration::from_secs(args.interval.max(1)),
    )
    .await)
}

async fn run_subnet(cluster: &Cluster, args: cli::SubnetArgs) -> Result<CheckResult> {
    let config = &cluster.config;
    let name = args.udn.unwrap_or_else(|| config.udn.name.clone());

    let udn = UdnManager::new(cluster.client.clone())
        .wait_ready(
            &name,
            cluster.namespace(),
            config.udn.ready_timeout_secs,
            config.poll_interval(),
        )
        .await?;
    if !udn.is_primary() {
        warn!("UserDefinedNetwork {} is not a primary network", name);
    }

    let subnets = udn
        .subnets()
        .with_context(|| format!("Invalid subnets on UserDefinedNetwork {name}"))?;
    let ip = cluster.primary_ip(&args.vm).await?;

    Ok(check_ip_in_subnets(ip, &subnets))
}

async fn run_egress(cluster: &Cluster, args: cli::EgressArgs) -> Result<CheckResult> {
    let destination = args
        .destination
        .unwrap_or(cluster.config.egress_destination);
    let target = cluster.target(&args.vm).await?;

    Ok(check_ping(
        CheckKind::EgressConnectivity,
        &*target,
        destination,
        cluster.config.ping_timeout(),
    )
    .await)
}

async fn run_ping(cluster: &Cluster, args: cli::PingArgs) -> Result<CheckResult> {
    let destination = cluster.primary_ip(&args.to).await?;
    let target = cluster.target(&args.from).await?;

    Ok(check_ping(
        CheckKind::VmConnectivity,
        &*target,
        destination,
        cluster.config.ping_timeout(),
    )
    .await)
}

async fn run_migration(cluster: &Cluster, args: cli::MigrationArgs) -> Result<Vec<CheckResult>> {
    let namespace = cluster.namespace().to_string();
    let timeout_secs = args
        .timeout
        .unwrap_or(cluster.config.migration_timeout_secs);

    if !cluster.vmis.is_running(&args.vm, &namespace).await? {
        anyhow::bail!("VMI {namespace}/{} is not running", args.vm);
    }

    let before = cluster.primary_ip(&args.vm).await?;
    let source_node = cluster.vmis.get_node(&args.vm, &namespace).await?;
    let previous = cluster.vmis.migration_state(&args.vm, &namespace).await?;
    info!(
        "VMI {}/{} has IP {} on {:?}; waiting for its next live migration (e.g. virtctl migrate {})",
        namespace, args.vm, before, source_node, args.vm
    );

    let wait = {
        let vmis = VmiManager::new(cluster.client.clone());
        let vm = args.vm.clone();
        let namespace = namespace.clone();
        let interval = cluster.config.poll_interval();
        async move {
            vmis.wait_for_migration(&vm, &namespace, previous.as_ref(), timeout_secs, interval)
                .await
                .map(|_| ())
        }
    };

    let mut results = Vec::new();
    match &args.peer_vm {
        Some(peer) => {
            let peer_ip = cluster.primary_ip(peer).await?;
            let conn = connection_with_settings(
                &cluster.config.traffic,
                peer.as_str(),
                args.vm.as_str(),
                cluster.target(peer).await?,
                cluster.target(&args.vm).await?,
                peer_ip,
                args.port,
            );

            let traffic = check_traffic_survives(conn, wait).await;
            let migrated = traffic.status != CheckStatus::Error;
            results.push(traffic);
            if !migrated {
                return Ok(results);
            }
        }
        None => {
            if let Err(e) = wait.await {
                results.push(CheckResult::error(
                    CheckKind::IpPreservedAfterMigration,
                    format!("{e:#}"),
                ));
                return Ok(results);
            }
        }
    }

    let after = cluster.primary_ip(&args.vm).await?;
    let target_node = cluster.vmis.get_node(&args.vm, &namespace).await?;
    info!(
        "VMI {}/{} now on {:?} with IP {}",
        namespace, args.vm, target_node, after
    );
    results.push(check_ip_preserved(before, after));
    Ok(results)
}

fn manage_config(args: cli::ConfigArgs, config: &AppConfig, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { path, force } => {
            if Path::new(&path).exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {path}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(&path)?;
            println!("✓ Configuration file created: {path}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show => {
            let effective = ConfigFile {
                app: config.clone(),
                ..ConfigFile::default()
            };
            println!("# Effective configuration (file, environment and flags merged)");
            println!("{}", serde_yaml::to_string(&effective)?);
        }

        cli::ConfigAction::Env => {
            print_env_help();
            if env.has_any() {
                println!();
                env.print_summary();
            }
        }
    }

    Ok(())
}
