//! Delivery of stored pictures to the matrix controller.
//!
//! At most one delivery job runs at a time. A second apply request while a
//! job is sending is rejected with [`MatrixError::Busy`], never queued.
//! Fragments are sent strictly one after another, because delta fragments
//! are only valid on top of the frame the controller already shows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::codec::{Fragment, WireFragment};
use crate::controller::MatrixController;
use crate::error::{MatrixError, MatrixResult};
use crate::events::{DeliveryEvent, EventEmitter};
use crate::services::settings::{SettingValue, SettingsGuard};
use crate::store::{PictureRecord, PictureStore, StoreError};
use crate::utils::now_millis;

/// Process-wide "one job at a time" flag.
#[derive(Debug, Default)]
pub struct SingleFlight {
    busy: AtomicBool,
}

impl SingleFlight {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the flag, or returns `None` if another job holds it.
    pub fn try_acquire(&self) -> Option<FlightPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| FlightPermit { flight: self })
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

/// Held for the duration of one job. Dropping it releases the flag on every
/// exit path.
#[derive(Debug)]
pub struct FlightPermit<'a> {
    flight: &'a SingleFlight,
}

impl Drop for FlightPermit<'_> {
    fn drop(&mut self) {
        self.flight.busy.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum JobState {
    Sending,
    Completed,
    Failed,
}

/// Snapshot of the current or most recent delivery job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryJob {
    pub target_id: String,
    pub state: JobState,
    /// Last fragment attempted, `None` before the first send.
    pub current_fragment_index: Option<usize>,
    pub total: usize,
}

/// One fragment handed to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub index: usize,
    pub total: usize,
}

/// Optional setting overrides applied before the first fragment.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    pub brightness: Option<SettingValue>,
    pub speed: Option<SettingValue>,
}

/// Result of a completed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySummary {
    pub total: usize,
}

/// Streams stored pictures to the controller.
pub struct DeliveryService {
    store: Arc<dyn PictureStore>,
    controller: Arc<dyn MatrixController>,
    settings: Arc<SettingsGuard>,
    emitter: Arc<dyn EventEmitter>,
    flight: SingleFlight,
    last_job: RwLock<Option<DeliveryJob>>,
}

impl DeliveryService {
    pub fn new(
        store: Arc<dyn PictureStore>,
        controller: Arc<dyn MatrixController>,
        settings: Arc<SettingsGuard>,
        emitter: Arc<dyn EventEmitter>,
    ) -> Self {
        Self {
            store,
            controller,
            settings,
            emitter,
            flight: SingleFlight::new(),
            last_job: RwLock::new(None),
        }
    }

    /// Current or most recent job.
    #[must_use]
    pub fn last_job(&self) -> Option<DeliveryJob> {
        self.last_job.read().clone()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.flight.is_busy()
    }

    /// Sends picture `id` to the controller.
    ///
    /// A [`Progress`] is sent on `progress` after every fragment the
    /// controller accepted, and once more for the fragment that failed.
    /// Sending never waits on the receiver, and a dropped receiver does not
    /// stop the job.
    ///
    /// # Errors
    /// - [`MatrixError::Busy`] if another job is sending
    /// - [`MatrixError::NotFound`] if no record has this id
    /// - [`MatrixError::InvalidInput`] for a non-numeric override
    /// - [`MatrixError::Delivery`] if the controller rejects a call
    pub async fn apply(
        &self,
        id: &str,
        options: ApplyOptions,
        progress: mpsc::UnboundedSender<Progress>,
    ) -> MatrixResult<DeliverySummary> {
        let Some(_permit) = self.flight.try_acquire() else {
            log::info!("[Delivery] Rejected {id}: another job is sending");
            self.emitter.emit_delivery(DeliveryEvent::Rejected {
                picture_id: id.to_string(),
                timestamp: now_millis(),
            });
            return Err(MatrixError::Busy);
        };

        self.set_job(id, JobState::Sending, None, 0);

        let result = self.run(id, options, &progress).await;

        match &result {
            Ok(summary) => {
                log::info!("[Delivery] {id}: {} fragment(s) delivered", summary.total);
                self.finish_job(JobState::Completed);
                self.emitter.emit_delivery(DeliveryEvent::Completed {
                    picture_id: id.to_string(),
                    total: summary.total,
                    timestamp: now_millis(),
                });
            }
            Err(e) => {
                log::error!("[Delivery] {id} failed: {e}");
                let index = self.finish_job(JobState::Failed);
                self.emitter.emit_delivery(DeliveryEvent::Failed {
                    picture_id: id.to_string(),
                    index,
                    message: e.to_string(),
                    timestamp: now_millis(),
                });
            }
        }

        result
    }

    async fn run(
        &self,
        id: &str,
        options: ApplyOptions,
        progress: &mpsc::UnboundedSender<Progress>,
    ) -> MatrixResult<DeliverySummary> {
        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| MatrixError::NotFound(id.to_string()))?;
        let fragments = record
            .decode_fragments()
            .map_err(StoreError::Serialization)?;
        let total = fragments.len();

        self.set_job(id, JobState::Sending, None, total);
        self.emitter.emit_delivery(DeliveryEvent::Started {
            picture_id: id.to_string(),
            total,
            timestamp: now_millis(),
        });
        log::info!(
            "[Delivery] Applying {id} ({}, {total} fragment(s))",
            if record.animated { "animated" } else { "static" }
        );

        self.push_settings(options).await?;

        let delay = self.settings.current().frame_delay();
        for (index, fragment) in fragments.into_iter().enumerate() {
            let wire = render(&record, fragment.with_delay(delay))?;
            self.set_index(index);

            let sent = self.controller.send_fragment(&wire).await;
            log::debug!("[Delivery] {id}: fragment {index} of {total}: {sent:?}");

            let update = Progress { index, total };
            self.emitter.emit_delivery(DeliveryEvent::Progress {
                picture_id: id.to_string(),
                index,
                total,
            });
            if progress.send(update).is_err() {
                log::trace!("[Delivery] Progress receiver for {id} is gone");
            }

            sent?;
        }

        Ok(DeliverySummary { total })
    }

    /// Applies overrides through the guard. Without a brightness override
    /// the remembered brightness is pushed instead.
    async fn push_settings(&self, options: ApplyOptions) -> MatrixResult<()> {
        match &options.brightness {
            Some(brightness) => {
                self.settings.set_brightness(brightness).await?;
            }
            None => self.settings.push_brightness().await?,
        }
        if let Some(speed) = &options.speed {
            self.settings.set_speed(speed).await?;
        }
        Ok(())
    }

    fn set_job(&self, id: &str, state: JobState, index: Option<usize>, total: usize) {
        *self.last_job.write() = Some(DeliveryJob {
            target_id: id.to_string(),
            state,
            current_fragment_index: index,
            total,
        });
    }

    fn set_index(&self, index: usize) {
        if let Some(job) = self.last_job.write().as_mut() {
            job.current_fragment_index = Some(index);
        }
    }

    /// Marks the job finished and returns its last attempted index.
    fn finish_job(&self, state: JobState) -> Option<usize> {
        self.last_job.write().as_mut().and_then(|job| {
            job.state = state;
            job.current_fragment_index
        })
    }
}

fn render(record: &PictureRecord, fragment: Fragment) -> MatrixResult<WireFragment> {
    if record.animated {
        Ok(WireFragment::animation(&fragment)?)
    } else {
        Ok(WireFragment::picture(&fragment))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::codec::{assemble, PixelGrid};
    use crate::controller::mock::{Call, MockController};
    use crate::events::{NoopEventEmitter, RecordingEventEmitter};
    use crate::store::MemoryPictureStore;

    struct Harness {
        service: Arc<DeliveryService>,
        controller: Arc<MockController>,
        store: Arc<MemoryPictureStore>,
        settings: Arc<SettingsGuard>,
    }

    fn harness(controller: Arc<MockController>) -> Harness {
        let store = Arc::new(MemoryPictureStore::new());
        let settings = Arc::new(SettingsGuard::new(
            controller.clone(),
            Arc::new(NoopEventEmitter),
        ));
        let service = Arc::new(DeliveryService::new(
            store.clone(),
            controller.clone(),
            settings.clone(),
            Arc::new(NoopEventEmitter),
        ));
        Harness {
            service,
            controller,
            store,
            settings,
        }
    }

    /// Animation of `frames` frames; `frames + 1` fragments at this size.
    async fn save_animation(store: &MemoryPictureStore, id: &str, frames: u32) {
        let grids: Vec<PixelGrid> = (0..frames)
            .map(|i| {
                let samples: Vec<[u8; 4]> = (0..4)
                    .map(|p| if p == i % 4 { [255, 255, 255, 255] } else { [0, 0, 0, 255] })
                    .collect();
                PixelGrid::from_samples(2, 2, &samples)
            })
            .collect();
        let encoded = assemble(&grids, 256).unwrap();
        let record = PictureRecord::from_encoded(id, format!("{id}.gif"), &encoded).unwrap();
        store.save(record).await.unwrap();
    }

    async fn save_still(store: &MemoryPictureStore, id: &str) {
        let grid = PixelGrid::from_samples(2, 1, &[[1, 2, 3, 255], [4, 5, 6, 0]]);
        let encoded = assemble(&[grid], 256).unwrap();
        let record = PictureRecord::from_encoded(id, format!("{id}.png"), &encoded).unwrap();
        store.save(record).await.unwrap();
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Progress>) -> Vec<usize> {
        let mut seen = Vec::new();
        while let Ok(p) = rx.try_recv() {
            seen.push(p.index);
        }
        seen
    }

    #[tokio::test]
    async fn static_picture_pushes_brightness_then_seg_body() {
        let h = harness(MockController::new());
        save_still(&h.store, "still").await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let summary = h
            .service
            .apply("still", ApplyOptions::default(), tx)
            .await
            .unwrap();

        assert_eq!(summary.total, 1);
        assert_eq!(drain(&mut rx), vec![0]);

        let calls = h.controller.calls.lock();
        assert_eq!(calls[0], Call::Brightness(20));
        match &calls[1] {
            Call::Fragment(f) => {
                assert_eq!(f.endpoint(), "/setPicture");
                assert_eq!(f.body(), &json!({"seg": {"i": [0, "010203", "000000"]}}));
            }
            other => panic!("expected fragment, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn animation_delays_come_from_current_speed() {
        let h = harness(MockController::new());
        save_animation(&h.store, "anim", 3).await;
        h.settings.set_speed(&125i64.into()).await.unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        h.service
            .apply("anim", ApplyOptions::default(), tx)
            .await
            .unwrap();

        let fragments = h.controller.fragments();
        assert_eq!(fragments.len(), 4);
        for (ordinal, f) in fragments.iter().enumerate() {
            assert_eq!(f.endpoint(), "/setAnimationFragment");
            assert_eq!(f.body()["frameDelay"], 125);
            assert_eq!(f.body()["frameCount"], 3);
            assert_eq!(f.body()["frameFragment"], ordinal as u64);
        }
    }

    #[tokio::test]
    async fn overrides_go_through_the_guard() {
        let h = harness(MockController::new());
        save_animation(&h.store, "anim", 2).await;

        let options = ApplyOptions {
            brightness: Some("400".into()),
            speed: Some(80i64.into()),
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        h.service.apply("anim", options, tx).await.unwrap();

        let calls = h.controller.calls.lock();
        assert_eq!(calls[0], Call::Brightness(255));
        assert_eq!(calls[1], Call::Speed(80));
        assert_eq!(h.settings.current().brightness, 255);
        drop(calls);
        assert!(h
            .controller
            .fragments()
            .iter()
            .all(|f| f.body()["frameDelay"] == 80));
    }

    #[tokio::test]
    async fn speed_override_alone_still_pushes_brightness() {
        let h = harness(MockController::new());
        save_animation(&h.store, "anim", 2).await;

        let options = ApplyOptions {
            brightness: None,
            speed: Some(80i64.into()),
        };
        let (tx, _rx) = mpsc::unbounded_channel();
        h.service.apply("anim", options, tx).await.unwrap();

        let calls = h.controller.calls.lock();
        assert_eq!(calls[0], Call::Brightness(20));
        assert_eq!(calls[1], Call::Speed(80));
        assert!(matches!(calls[2], Call::Fragment(_)));
    }

    #[tokio::test]
    async fn failure_at_fragment_three_of_seven_stops_the_stream() {
        let h = harness(MockController::failing_at(3));
        // 6 frames -> 7 transitions, one fragment each at this size
        save_animation(&h.store, "anim", 6).await;
        let emitter = Arc::new(RecordingEventEmitter::default());
        let service = DeliveryService::new(
            h.store.clone(),
            h.controller.clone(),
            h.settings.clone(),
            emitter.clone(),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let err = service
            .apply("anim", ApplyOptions::default(), tx)
            .await
            .unwrap_err();

        assert!(matches!(err, MatrixError::Delivery(_)));
        assert_eq!(drain(&mut rx), vec![0, 1, 2, 3]);
        assert_eq!(h.controller.fragments().len(), 3);

        let job = service.last_job().unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.current_fragment_index, Some(3));
        assert_eq!(job.total, 7);
        assert!(!service.is_busy());

        let events = emitter.delivery.lock();
        assert!(matches!(
            events.last(),
            Some(DeliveryEvent::Failed { index: Some(3), .. })
        ));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_and_releases_the_guard() {
        let h = harness(MockController::new());
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = h
            .service
            .apply("missing", ApplyOptions::default(), tx)
            .await
            .unwrap_err();

        assert!(matches!(err, MatrixError::NotFound(_)));
        assert!(!h.service.is_busy());
        assert!(h.controller.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn concurrent_apply_is_busy_until_the_first_finishes() {
        let h = harness(MockController::gated());
        save_still(&h.store, "first").await;
        save_still(&h.store, "second").await;

        let first = {
            let service = h.service.clone();
            tokio::spawn(async move {
                let (tx, _rx) = mpsc::unbounded_channel();
                service.apply("first", ApplyOptions::default(), tx).await
            })
        };
        h.controller.entered.notified().await;

        let (tx, _rx) = mpsc::unbounded_channel();
        let err = h
            .service
            .apply("second", ApplyOptions::default(), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, MatrixError::Busy));
        assert_eq!(h.service.last_job().unwrap().target_id, "first");

        h.controller.open();
        first.await.unwrap().unwrap();

        let (tx, _rx) = mpsc::unbounded_channel();
        h.service
            .apply("second", ApplyOptions::default(), tx)
            .await
            .unwrap();
        assert_eq!(h.service.last_job().unwrap().state, JobState::Completed);
    }

    #[tokio::test]
    async fn dropped_progress_receiver_does_not_abort() {
        let h = harness(MockController::new());
        save_animation(&h.store, "anim", 2).await;
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let summary = h
            .service
            .apply("anim", ApplyOptions::default(), tx)
            .await
            .unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(h.controller.fragments().len(), 3);
    }

    #[tokio::test]
    async fn unread_progress_does_not_stall_the_job() {
        let h = harness(MockController::new());
        save_animation(&h.store, "long", 120).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let summary = tokio::time::timeout(
            Duration::from_secs(5),
            h.service.apply("long", ApplyOptions::default(), tx),
        )
        .await
        .expect("delivery waited on the progress reader")
        .unwrap();

        assert_eq!(summary.total, 121);
        assert!(!h.service.is_busy());
        assert_eq!(drain(&mut rx).len(), 121);
    }

    #[test]
    fn permit_releases_on_drop() {
        let flight = SingleFlight::new();
        let permit = flight.try_acquire().unwrap();
        assert!(flight.try_acquire().is_none());
        drop(permit);
        assert!(flight.try_acquire().is_some());
    }
}
