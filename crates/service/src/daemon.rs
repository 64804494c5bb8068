//! Device discovery and the attach map.
//!
//! [`DeviceManager`] is synchronous: attach runs the warm-up burst and detach joins
//! a thread, so both block. [`Daemon`] drives it from tokio, moving the manager into
//! `spawn_blocking` for every scan and for the final detach.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use anyhow::{Context, Result};
use fx3pps_errors::AttachError;
use fx3pps_pps::{LogSink, PpsSink, Receiver, ReceiverSnapshot};
use fx3pps_scheduler::{Generator, GeneratorSnapshot};
use fx3pps_transport::{DeviceInfo, DeviceKey, DeviceRole};
use serde::Serialize;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::backend::DeviceBackend;
use crate::config::ServiceConfig;

/// A board with its worker running.
#[derive(Debug)]
pub enum AttachedDevice {
    Generator(Generator),
    Receiver(Receiver),
}

/// Status of one attached board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DeviceStatus {
    Generator(GeneratorSnapshot),
    Receiver(ReceiverSnapshot),
}

impl AttachedDevice {
    pub fn role(&self) -> DeviceRole {
        match self {
            AttachedDevice::Generator(_) => DeviceRole::Generator,
            AttachedDevice::Receiver(_) => DeviceRole::Receiver,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        match self {
            AttachedDevice::Generator(g) => DeviceStatus::Generator(g.snapshot()),
            AttachedDevice::Receiver(r) => DeviceStatus::Receiver(r.snapshot()),
        }
    }

    /// Stop the worker and wait for it.
    pub fn detach(self) -> DeviceStatus {
        match self {
            AttachedDevice::Generator(g) => DeviceStatus::Generator(g.detach()),
            AttachedDevice::Receiver(r) => DeviceStatus::Receiver(r.detach()),
        }
    }
}

/// What one scan changed.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub attached: Vec<DeviceKey>,
    pub detached: Vec<DeviceKey>,
    pub failed: Vec<(DeviceKey, AttachError)>,
}

impl ScanReport {
    pub fn is_quiet(&self) -> bool {
        self.attached.is_empty() && self.detached.is_empty() && self.failed.is_empty()
    }
}

/// The attach map, keyed by bus position.
pub struct DeviceManager<B> {
    backend: B,
    config: ServiceConfig,
    devices: BTreeMap<DeviceKey, AttachedDevice>,
}

impl<B: DeviceBackend> DeviceManager<B> {
    pub fn new(backend: B, config: ServiceConfig) -> Self {
        Self {
            backend,
            config,
            devices: BTreeMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, key: DeviceKey) -> bool {
        self.devices.contains_key(&key)
    }

    pub fn get(&self, key: DeviceKey) -> Option<&AttachedDevice> {
        self.devices.get(&key)
    }

    /// Detach boards that vanished, then attach new boards of enabled roles.
    ///
    /// A failed attach is logged and retried on the next scan.
    pub fn scan(&mut self) -> ScanReport {
        let mut report = ScanReport::default();
        let present = match self.backend.enumerate() {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "Device scan failed");
                return report;
            }
        };

        let present_keys: BTreeSet<DeviceKey> = present.iter().map(|info| info.key).collect();
        let gone: Vec<DeviceKey> = self
            .devices
            .keys()
            .filter(|key| !present_keys.contains(key))
            .copied()
            .collect();
        for key in gone {
            if self.detach(key).is_some() {
                report.detached.push(key);
            }
        }

        for info in present {
            if self.devices.contains_key(&info.key) || !self.config.role_enabled(info.role) {
                continue;
            }
            let key = info.key;
            match self.attach(&info) {
                Ok(device) => {
                    self.devices.insert(key, device);
                    report.attached.push(key);
                }
                Err(e) => {
                    log_attach_failure(&info, &e);
                    report.failed.push((key, e));
                }
            }
        }

        if !report.is_quiet() {
            info!(
                attached = report.attached.len(),
                detached = report.detached.len(),
                failed = report.failed.len(),
                total = self.devices.len(),
                "Device scan"
            );
        }
        report
    }

    /// Detach one board, returning its final status.
    pub fn detach(&mut self, key: DeviceKey) -> Option<DeviceStatus> {
        let device = self.devices.remove(&key)?;
        info!(device = %key, role = %device.role(), "Detaching");
        Some(device.detach())
    }

    /// Detach every board.
    pub fn detach_all(&mut self) -> Vec<(DeviceKey, DeviceStatus)> {
        let devices = std::mem::take(&mut self.devices);
        devices
            .into_iter()
            .map(|(key, device)| {
                info!(device = %key, role = %device.role(), "Detaching");
                (key, device.detach())
            })
            .collect()
    }

    pub fn status(&self) -> Vec<(DeviceKey, DeviceStatus)> {
        self.devices
            .iter()
            .map(|(key, device)| (*key, device.status()))
            .collect()
    }

    pub fn log_status(&self) {
        if self.devices.is_empty() {
            debug!("No devices attached");
        }
        for (key, status) in self.status() {
            match status {
                DeviceStatus::Generator(s) => info!(
                    device = %key,
                    write_time_ns = s.write_time_ns,
                    timer_error_ns = s.timer_error_ns,
                    cycles = s.cycles,
                    completed = s.completed,
                    late = s.late,
                    transport_failures = s.transport_failures,
                    window_exceeded = s.window_exceeded,
                    p50_delta_ns = s.p50_delta_ns,
                    p99_delta_ns = s.p99_delta_ns,
                    max_delta_ns = s.max_delta_ns,
                    "Generator status"
                ),
                DeviceStatus::Receiver(s) => info!(
                    device = %key,
                    asserts = s.asserts,
                    clears = s.clears,
                    skipped = s.skipped,
                    timeouts = s.timeouts,
                    errors = s.errors,
                    publish_failures = s.publish_failures,
                    "Receiver status"
                ),
            }
        }
    }

    fn attach(&self, info: &DeviceInfo) -> Result<AttachedDevice, AttachError> {
        debug!(device = %info.display_name(), "Attaching");
        let port = self.backend.open(info)?;
        match info.role {
            DeviceRole::Generator => Generator::attach(
                port,
                self.backend.clock(),
                self.backend.timer(),
                self.config.generator.clone(),
            )
            .map(AttachedDevice::Generator),
            DeviceRole::Receiver => Receiver::attach(
                port,
                self.sink()?,
                self.backend.clock(),
                self.config.receiver,
            )
            .map(AttachedDevice::Receiver),
        }
    }

    fn sink(&self) -> Result<Box<dyn PpsSink>, AttachError> {
        match &self.config.chrony_socket {
            #[cfg(unix)]
            Some(path) => Ok(Box::new(fx3pps_pps::ChronySockSink::connect(path)?)),
            #[cfg(not(unix))]
            Some(path) => {
                warn!(path = %path.display(), "chrony SOCK refclock needs a unix host, logging events instead");
                Ok(Box::new(LogSink::new()))
            }
            None => Ok(Box::new(LogSink::new())),
        }
    }
}

impl<B> Drop for DeviceManager<B> {
    fn drop(&mut self) {
        for (key, device) in std::mem::take(&mut self.devices) {
            debug!(device = %key, "Detaching on drop");
            device.detach();
        }
    }
}

fn log_attach_failure(info: &DeviceInfo, err: &AttachError) {
    let severity = err.severity();
    if err.is_retryable() {
        warn!(device = %info.display_name(), %severity, error = %err, "Attach failed, retrying on next scan");
    } else {
        error!(device = %info.display_name(), %severity, error = %err, "Attach failed");
    }
}

/// The long-running service: periodic scan and status until shutdown.
pub struct Daemon<B> {
    manager: DeviceManager<B>,
}

impl<B: DeviceBackend> Daemon<B> {
    pub fn new(backend: B, config: ServiceConfig) -> Self {
        Self {
            manager: DeviceManager::new(backend, config),
        }
    }

    /// Scan and report until `shutdown` resolves, then detach everything.
    ///
    /// Returns the final status of every board that was still attached.
    ///
    /// # Errors
    ///
    /// Fails only if a blocking device task panicked.
    pub async fn run<F>(self, shutdown: F) -> Result<Vec<(DeviceKey, DeviceStatus)>>
    where
        F: Future<Output = ()>,
    {
        let mut manager = self.manager;
        let mut scan = interval(manager.config().scan_interval());
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut status = interval(manager.config().status_interval());
        status.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick of an interval is immediate; status starts one period in.
        status.reset();

        info!(
            roles = ?manager.config().roles,
            scan_interval_ms = manager.config().scan_interval_ms,
            "Daemon running"
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = scan.tick() => {
                    let (returned, _report) = blocking(manager, DeviceManager::scan).await?;
                    manager = returned;
                }
                _ = status.tick() => manager.log_status(),
            }
        }

        info!(devices = manager.len(), "Shutting down");
        let (_manager, detached) = blocking(manager, DeviceManager::detach_all).await?;
        Ok(detached)
    }
}

async fn blocking<B, R, F>(mut manager: DeviceManager<B>, f: F) -> Result<(DeviceManager<B>, R)>
where
    B: DeviceBackend,
    R: Send + 'static,
    F: FnOnce(&mut DeviceManager<B>) -> R + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let result = f(&mut manager);
        (manager, result)
    })
    .await
    .context("Device task failed")
}

/// Resolves on Ctrl-C, or on SIGTERM on unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C"),
        Err(e) => error!(error = %e, "Cannot listen for Ctrl-C"),
    }
}
