//! Continuous location sampling.
//!
//! The platform provider pushes locations into a [`FixSender`] from its own
//! callback thread. Locations travel through a bounded channel to a tokio
//! task that validates them and appends them to the caller's [`FixSink`].
//! Stopping closes a gate that the delivery task must hold while appending,
//! so once [`GeoSampler::stop`] has closed it no further append can happen,
//! even for locations that were already queued.

use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{CycleMapError, Result};
use crate::options::{CoreConfig, SamplingPolicy};
use crate::track::{Fix, FixSink};

/// A location as reported by the platform, before validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp_millis: i64,
}

impl RawLocation {
    pub fn new(latitude: f64, longitude: f64, timestamp_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            speed: None,
            timestamp_millis,
        }
    }

    /// `None` for coordinates that cannot be a real position.
    fn into_fix(self) -> Option<Fix> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);
        if !lat_ok || !lon_ok {
            return None;
        }
        Some(Fix {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude.filter(|v| v.is_finite()),
            timestamp_millis: self.timestamp_millis,
            speed: self.speed.filter(|v| v.is_finite()),
        })
    }
}

/// Platform location source.
///
/// Implementations forward every delivered location to the [`FixSender`]
/// they were given until [`LocationProvider::remove_updates`] is called.
pub trait LocationProvider: Send + Sync {
    fn has_permission(&self) -> bool;

    fn request_updates(&self, policy: SamplingPolicy, sender: FixSender) -> Result<()>;

    fn remove_updates(&self);
}

#[derive(Debug)]
struct Gate {
    open: Mutex<bool>,
}

impl Gate {
    fn new() -> Self {
        Self {
            open: Mutex::new(true),
        }
    }

    fn is_open(&self) -> bool {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` while holding the gate, only if it is still open.
    fn run_if_open(&self, f: impl FnOnce()) -> bool {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            f();
        }
        *open
    }

    /// Blocks until any in-progress append has finished.
    fn close(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

/// Callback handle given to the [`LocationProvider`]. Cheap to clone and
/// safe to call from any thread; never blocks.
#[derive(Debug, Clone)]
pub struct FixSender {
    tx: mpsc::Sender<RawLocation>,
    gate: Arc<Gate>,
}

impl FixSender {
    /// Hand over the latest location. `None` stands for a provider that had
    /// no last-known location. Returns whether the location was queued.
    pub fn on_fix(&self, location: Option<RawLocation>) -> bool {
        if !self.gate.is_open() {
            debug!("[sampler] ignoring location delivered after stop");
            return false;
        }
        let Some(location) = location else {
            debug!("[sampler] provider delivered no location");
            return false;
        };
        match self.tx.try_send(location) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("[sampler] fix queue full, dropping fix at {}", location.timestamp_millis);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

struct Session {
    gate: Arc<Gate>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the subscription to a [`LocationProvider`] and feeds a [`FixSink`].
pub struct GeoSampler<P: LocationProvider> {
    provider: Arc<P>,
    channel_capacity: usize,
    session: Option<Session>,
}

impl<P: LocationProvider> GeoSampler<P> {
    pub fn new(provider: Arc<P>, channel_capacity: usize) -> Self {
        Self {
            provider,
            channel_capacity: channel_capacity.max(1),
            session: None,
        }
    }

    pub fn from_config(provider: Arc<P>, config: &CoreConfig) -> Self {
        Self::new(provider, config.channel_capacity)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Subscribe to the provider and start appending fixes to `sink`.
    ///
    /// Fails with [`CycleMapError::PermissionDenied`] when the provider has
    /// no permission, and with [`CycleMapError::SubscriptionFailed`] when
    /// called outside a tokio runtime; the sampler then stays idle.
    pub fn start<S: FixSink>(&mut self, policy: SamplingPolicy, sink: Arc<S>) -> Result<()> {
        if self.session.is_some() {
            return Err(CycleMapError::AlreadySampling);
        }
        if !self.provider.has_permission() {
            warn!("[sampler] location permission denied, staying idle");
            return Err(CycleMapError::PermissionDenied);
        }

        let runtime = Handle::try_current().map_err(|e| {
            warn!("[sampler] no async runtime to deliver fixes on: {e}");
            CycleMapError::SubscriptionFailed {
                message: e.to_string(),
            }
        })?;

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let gate = Arc::new(Gate::new());
        let handle = runtime.spawn(deliver_fixes(rx, shutdown_rx, Arc::clone(&gate), sink));

        let sender = FixSender {
            tx,
            gate: Arc::clone(&gate),
        };
        if let Err(e) = self.provider.request_updates(policy, sender) {
            gate.close();
            let _ = shutdown_tx.send(true);
            handle.abort();
            warn!("[sampler] subscription failed: {e}");
            return Err(match e {
                CycleMapError::PermissionDenied => CycleMapError::PermissionDenied,
                other => CycleMapError::SubscriptionFailed {
                    message: other.to_string(),
                },
            });
        }

        info!(
            "[sampler] started (interval {} ms, displacement {} m)",
            policy.min_interval_millis, policy.min_displacement_meters
        );
        self.session = Some(Session {
            gate,
            shutdown: shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Cancel the subscription. No append reaches the sink after this
    /// returns. Stopping an idle sampler is a no-op.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.gate.close();
        self.provider.remove_updates();
        let _ = session.shutdown.send(true);
        if let Err(e) = session.handle.await {
            error!("[sampler] delivery task failed: {e}");
        }
        info!("[sampler] stopped");
    }
}

impl<P: LocationProvider> Drop for GeoSampler<P> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.gate.close();
            self.provider.remove_updates();
            let _ = session.shutdown.send(true);
        }
    }
}

async fn deliver_fixes<S: FixSink>(
    mut rx: mpsc::Receiver<RawLocation>,
    mut shutdown: watch::Receiver<bool>,
    gate: Arc<Gate>,
    sink: Arc<S>,
) {
    let mut last_timestamp: Option<i64> = None;

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(raw) = received else { break };
                let Some(fix) = raw.into_fix() else {
                    debug!("[sampler] skipping invalid location {raw:?}");
                    continue;
                };
                if last_timestamp.is_some_and(|last| fix.timestamp_millis < last) {
                    debug!("[sampler] skipping out-of-order fix at {}", fix.timestamp_millis);
                    continue;
                }
                if !gate.run_if_open(|| sink.append(fix)) {
                    break;
                }
                last_timestamp = Some(fix.timestamp_millis);
            }
            _ = shutdown.changed() => break,
        }
    }
}
