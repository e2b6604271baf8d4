// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process entrypoint: wires the event bus, the five managers, the broker
//! bridge, and the background workers together, then runs until signaled
//! to stop.

use std::sync::Arc;
use std::time::Duration;

use kegcore_backend::{Backend, HttpBackend, HttpBackendConfig, RetryConfig};
use kegcore_broker::{NoopHooks, OutboundBridge};
use kegcore_bus::{EventHub, Subscriber};
use kegcore_config::Config;
use kegcore_events::Event;
use kegcore_managers::{AuthenticationManager, DrinkManager, FlowManager, TapManager, ThermoManager};
use kegcore_model::SystemClock;
use kegcore_sched::{drive, HeartbeatWorker, SupervisedWorker, SyncWorker, WatchdogWorker};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DISPATCH_POLL_INTERVAL: Duration = Duration::from_millis(200);
const BROKER_RECONNECT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const BROKER_RECONNECT_MAX_RETRIES: u32 = 6;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            // tracing isn't initialized yet; this is the one message that
            // has to go straight to stderr.
            eprintln!("fatal: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();
    info!(broker_url = %config.broker_url, api_url = %config.api_url, "starting");

    let backend = match build_backend(&config) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "failed to construct backend client");
            std::process::exit(1);
        }
    };

    let hub = Arc::new(EventHub::new());
    let clock = Arc::new(SystemClock) as Arc<dyn kegcore_model::Clock>;

    let taps = Arc::new(TapManager::new(backend.clone()));
    let flows = Arc::new(FlowManager::new(hub.clone(), taps.clone(), clock.clone()));
    let auth = Arc::new(AuthenticationManager::new(
        backend.clone(),
        flows.clone(),
        taps.clone(),
    ));
    let drinks = Arc::new(DrinkManager::new(backend.clone(), hub.clone()));
    let thermo = Arc::new(ThermoManager::new(backend.clone(), clock.clone()));

    register_managers(&hub, &taps, &flows, &auth, &drinks, &thermo).await;

    let outbound = match OutboundBridge::connect(&config.broker_url, config.broker_channel.clone()).await {
        Ok(bridge) => Arc::new(bridge),
        Err(e) => {
            error!(error = %e, "failed to connect outbound broker bridge");
            std::process::exit(1);
        }
    };
    for kind in kegcore_broker::OUTBOUND_KINDS.iter().copied() {
        hub.subscribe(kind, outbound.clone() as Arc<dyn Subscriber>).await;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    hub.subscribe("QuitEvent", Arc::new(QuitListener { tx: shutdown_tx.clone() })).await;

    let dispatch_handle = spawn_dispatch_loop(hub.clone(), shutdown_rx.clone());
    let heartbeat_handle = tokio::spawn(drive(HeartbeatWorker::new(hub.clone()), shutdown_rx.clone()));
    let sync_handle = tokio::spawn(drive(
        SyncWorker::new(backend.clone(), hub.clone()),
        shutdown_rx.clone(),
    ));
    let broker_handle = tokio::spawn(kegcore_broker::run_inbound(
        config.broker_url.clone(),
        config.broker_channel.clone(),
        hub.clone(),
        Arc::new(NoopHooks),
        RetryConfig::new()
            .initial_delay(BROKER_RECONNECT_INITIAL_DELAY)
            .max_retries(BROKER_RECONNECT_MAX_RETRIES),
        shutdown_rx.clone(),
    ));

    let watchdog = WatchdogWorker::new(
        hub.clone(),
        vec![
            SupervisedWorker {
                name: "dispatch",
                handle: dispatch_handle,
            },
            SupervisedWorker {
                name: "heartbeat",
                handle: heartbeat_handle,
            },
            SupervisedWorker {
                name: "sync",
                handle: sync_handle,
            },
            SupervisedWorker {
                name: "broker",
                handle: broker_handle,
            },
        ],
        shutdown_rx.clone(),
    );
    let watchdog_handle = tokio::spawn(drive(watchdog, shutdown_rx.clone()));

    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    }

    let _ = watchdog_handle.await;
}

fn build_backend(config: &Config) -> Result<Arc<dyn Backend>, kegcore_backend::BackendError> {
    let mut http_config = HttpBackendConfig::new(config.api_url.clone()).timeout(config.request_timeout);
    if let Some(api_key) = &config.api_key {
        http_config = http_config.api_key(api_key.clone());
    }
    Ok(Arc::new(HttpBackend::new(http_config)?))
}

async fn register_managers(
    hub: &Arc<EventHub>,
    taps: &Arc<TapManager>,
    flows: &Arc<FlowManager>,
    auth: &Arc<AuthenticationManager>,
    drinks: &Arc<DrinkManager>,
    thermo: &Arc<ThermoManager>,
) {
    hub.subscribe("SyncEvent", taps.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("ControllerConnectedEvent", taps.clone() as Arc<dyn Subscriber>).await;

    hub.subscribe("MeterUpdate", flows.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("HeartbeatSecondEvent", flows.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("FlowRequest", flows.clone() as Arc<dyn Subscriber>).await;

    hub.subscribe("TokenAuthEvent", auth.clone() as Arc<dyn Subscriber>).await;

    hub.subscribe("FlowUpdate", drinks.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("HeartbeatMinuteEvent", drinks.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("TokenAuthEvent", drinks.clone() as Arc<dyn Subscriber>).await;

    hub.subscribe("ThermoEvent", thermo.clone() as Arc<dyn Subscriber>).await;
    hub.subscribe("HeartbeatMinuteEvent", thermo.clone() as Arc<dyn Subscriber>).await;
}

fn spawn_dispatch_loop(hub: Arc<EventHub>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *shutdown.borrow() {
                return;
            }
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = hub.dispatch_next(DISPATCH_POLL_INTERVAL) => {}
            }
        }
    })
}

/// Bridges a published `QuitEvent` to the shutdown watch channel every
/// other worker observes, so any subscriber (the watchdog included) can
/// trigger a coordinated stop just by publishing the event.
struct QuitListener {
    tx: watch::Sender<bool>,
}

#[async_trait::async_trait]
impl Subscriber for QuitListener {
    async fn handle(&self, _event: &Event) {
        let _ = self.tx.send(true);
    }
}
