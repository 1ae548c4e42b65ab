#![forbid(unsafe_code)]

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use lookout_core::{DetailsError, DetailsResult, ResourceDescriptor, ResourceKind};
use metrics::{counter, histogram};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::model::{Applied, Generation, LoadMode, LoadOperation, LoadPhase, LoadUpdate};
use crate::protocol::OutboundMessage;
use crate::DetailsController;

fn progress(
    tx: &UnboundedSender<LoadUpdate>,
    generation: Generation,
    kind: ResourceKind,
    descriptor: &Arc<ResourceDescriptor>,
    phase: LoadPhase,
) {
    let _ = tx.send(LoadUpdate::Progress { generation, kind, descriptor: descriptor.clone(), phase });
}

impl DetailsController {
    /// Validate, then hand the cache check and provider call to a task.
    pub(crate) fn start_load(
        &mut self,
        generation: Generation,
        kind: ResourceKind,
        descriptor: Arc<ResourceDescriptor>,
        mode: LoadMode,
    ) {
        self.load = LoadOperation { generation, mode, phase: LoadPhase::Validating };
        if let Err(err) = descriptor.validate() {
            warn!(kind = %kind, name = %descriptor.name, generation, error = %err, "load: rejected descriptor");
            self.complete(generation, kind, &descriptor, Err(err), false);
            return;
        }

        let key = descriptor.cache_key();
        let provider = self.providers.provider(kind);
        let cache = self.cache.clone();
        let tx = self.updates_tx.clone();
        self.in_flight += 1;
        debug!(kind = %kind, key = %key, generation, mode = ?mode, "load: start");

        tokio::spawn(async move {
            let t0 = Instant::now();
            let body = async {
                let cached = match mode {
                    LoadMode::Refresh => {
                        cache.invalidate(&key).await;
                        None
                    }
                    LoadMode::Show => cache.get(&key).await,
                };
                if let Some(data) = cached {
                    counter!("details_cache_hits_total", 1u64);
                    progress(&tx, generation, kind, &descriptor, LoadPhase::CacheHit);
                    return (Ok(data), true);
                }
                counter!("details_cache_misses_total", 1u64);
                progress(&tx, generation, kind, &descriptor, LoadPhase::CacheMiss);
                progress(&tx, generation, kind, &descriptor, LoadPhase::Fetching);
                (provider.fetch_details(&descriptor).await, false)
            };
            // a panic anywhere in the body still reports, so the load cannot stay in Fetching
            let (result, from_cache): (DetailsResult<Value>, bool) = match AssertUnwindSafe(body).catch_unwind().await {
                Ok(out) => out,
                Err(_) => {
                    error!(kind = %kind, name = %descriptor.name, "load: task panicked");
                    let err = DetailsError::PrimaryFetchFailed { target: descriptor.title(), message: "load panicked".into() };
                    (Err(err), false)
                }
            };
            histogram!("details_load_ms", t0.elapsed().as_secs_f64() * 1000.0);
            debug!(kind = %kind, generation, ok = result.is_ok(), from_cache, took_ms = %t0.elapsed().as_millis(), "load: finished");
            let _ = tx.send(LoadUpdate::Finished { generation, kind, descriptor, result, from_cache });
        });
    }

    /// Apply a task report if its generation is still current and the panel is live.
    /// Fresh results are cached only here, so a superseded fetch never overwrites the
    /// entry of a newer one.
    pub async fn apply_update(&mut self, update: LoadUpdate) -> Applied {
        match update {
            LoadUpdate::Progress { generation, kind, descriptor, phase } => {
                if self.is_live(kind, &descriptor, generation) {
                    self.load.phase = phase;
                    Applied::Progress
                } else {
                    Applied::Stale
                }
            }
            LoadUpdate::Finished { generation, kind, descriptor, result, from_cache } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                let fresh = match (&result, from_cache) {
                    (Ok(data), false) => Some(data.clone()),
                    _ => None,
                };
                let applied = self.complete(generation, kind, &descriptor, result, from_cache);
                if let (Applied::Displayed, Some(data)) = (applied, fresh) {
                    self.cache.set(&descriptor.cache_key(), data, self.ttl.ttl_for(kind)).await;
                }
                applied
            }
        }
    }

    /// Wait for the next task report and apply it.
    pub async fn next_update(&mut self) -> Option<Applied> {
        let update = self.updates_rx.recv().await?;
        Some(self.apply_update(update).await)
    }

    /// Apply task reports until no load is in flight.
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            if self.next_update().await.is_none() {
                break;
            }
        }
    }

    fn is_live(&self, kind: ResourceKind, descriptor: &ResourceDescriptor, generation: Generation) -> bool {
        self.live_panel_id().is_some() && self.active.is_current(kind, descriptor, generation)
    }

    fn complete(
        &mut self,
        generation: Generation,
        kind: ResourceKind,
        descriptor: &ResourceDescriptor,
        result: DetailsResult<Value>,
        from_cache: bool,
    ) -> Applied {
        if !self.is_live(kind, descriptor, generation) {
            counter!("details_stale_results_total", 1u64);
            debug!(
                kind = %kind,
                name = %descriptor.name,
                generation,
                current = self.active.generation(),
                "load: dropping stale result"
            );
            return Applied::Stale;
        }
        match result {
            Ok(data) => {
                self.push(OutboundMessage::data(kind, data));
                self.load.phase = LoadPhase::Displayed;
                info!(kind = %kind, name = %descriptor.name, generation, from_cache, "load: displayed");
                Applied::Displayed
            }
            Err(err) => {
                warn!(kind = %kind, name = %descriptor.name, generation, error = %err, "load: errored");
                let message = if err.is_user_visible() {
                    err.to_string()
                } else {
                    format!("failed to load {}", descriptor.title())
                };
                self.push(OutboundMessage::error(message));
                self.load.phase = LoadPhase::Errored;
                Applied::Errored
            }
        }
    }

    fn push(&self, message: OutboundMessage) {
        if let Some(id) = self.live_panel_id() {
            if let Err(e) = self.host.post_message(id, &message) {
                warn!(panel = %id, command = %message.command, error = %format!("{:#}", e), "panel: post failed");
            }
        }
    }
}
