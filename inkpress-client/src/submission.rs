//! Order submission session.
//!
//! One [`OrderSubmission`] shepherds one order from edited images to a
//! platform receipt: render, upload, then `POST /print`. The asset
//! upload can be preempted while the customer is still checking out;
//! the submission picks up whatever the preempted task finished.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::try_join_all;
use shared::{Order, UploadableImage};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::http::ApiClient;
use crate::imaging::ImageRenderer;
use crate::submit::SubmitOrderRequest;
use crate::upload::{AssetUploadRequest, UploadProgress};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Progress and outcome notifications for one submission attempt.
///
/// Exactly one terminal event is sent per attempt, and none at all
/// after the attempt is cancelled.
#[derive(Debug, Clone)]
pub enum SubmissionEvent {
    Progress {
        /// Images fully uploaded, as a share of the batch
        items_percent: u8,
        /// Bytes of the image currently in flight
        bytes_percent: u8,
    },
    Completed {
        receipt: String,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug)]
struct SessionState {
    order: Order,
    upload_task: Option<JoinHandle<Result<(), Error>>>,
    upload_in_progress: bool,
    notified_terminal: bool,
    /// The deduplicated batch handed to the uploader, kept to verify
    /// the results against before back-filling the order
    expected_uploads: Vec<UploadableImage>,
    attempt_token: CancellationToken,
}

/// A single order's path to the printer
#[derive(Debug)]
pub struct OrderSubmission {
    api: ApiClient,
    renderer: Arc<dyn ImageRenderer>,
    locale: String,
    state: Arc<Mutex<SessionState>>,
    events: broadcast::Sender<SubmissionEvent>,
}

impl OrderSubmission {
    pub(crate) fn new(
        api: ApiClient,
        renderer: Arc<dyn ImageRenderer>,
        locale: String,
        order: Order,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        OrderSubmission {
            api,
            renderer,
            locale,
            state: Arc::new(Mutex::new(SessionState {
                order,
                upload_task: None,
                upload_in_progress: false,
                notified_terminal: false,
                expected_uploads: Vec::new(),
                attempt_token: CancellationToken::new(),
            })),
            events,
        }
    }

    /// Watch submission progress. Safe to subscribe before or during
    /// an attempt; each subscriber sees events from subscription on.
    pub fn subscribe(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the order as the session currently sees it
    pub fn order(&self) -> Order {
        self.state.lock().unwrap().order.clone()
    }

    /// Take the order back out of a finished session
    pub fn into_order(self) -> Order {
        match Arc::try_unwrap(self.state) {
            Ok(mutex) => mutex.into_inner().unwrap().order,
            Err(state) => state.lock().unwrap().order.clone(),
        }
    }

    pub fn receipt(&self) -> Option<String> {
        self.state.lock().unwrap().order.receipt().map(str::to_owned)
    }

    pub fn is_printed(&self) -> bool {
        self.state.lock().unwrap().order.is_printed()
    }

    /// The platform reported this order failed after acceptance. Clears
    /// the receipt so the order can be corrected and resubmitted.
    pub fn set_error(&self, message: impl Into<String>) {
        self.state.lock().unwrap().order.set_error(message);
    }

    /// Start uploading assets in the background while the customer is
    /// still checking out. Does nothing if an upload already ran or is
    /// running. Failures are discarded quietly; the next submission
    /// simply uploads again.
    pub fn preempt_asset_upload(&self) {
        let mut state = self.state.lock().unwrap();
        if state.upload_in_progress || state.order.asset_upload_complete() {
            return;
        }
        if state.attempt_token.is_cancelled() {
            state.attempt_token = CancellationToken::new();
        }
        state.upload_in_progress = true;

        // spawned under the lock so the handle is stored before the
        // task can observe any state
        let handle = tokio::spawn(Self::run_upload(
            self.state.clone(),
            self.api.clone(),
            self.renderer.clone(),
            self.events.clone(),
            state.attempt_token.clone(),
        ));
        state.upload_task = Some(handle);
    }

    /// Upload anything still pending, then submit the order for
    /// printing. Returns the platform receipt.
    ///
    /// A printed order will not submit again, and neither will one
    /// whose previous attempt is still in flight.
    pub async fn submit_for_printing(&self) -> Result<String, Error> {
        {
            let mut state = self.state.lock().unwrap();
            if state.order.is_printed() {
                return Err(Error::IllegalState(
                    "order has already been successfully printed".to_string(),
                ));
            }
            if state.order.is_submitted() {
                return Err(Error::IllegalState(
                    "order has already been submitted".to_string(),
                ));
            }
            if state.attempt_token.is_cancelled() {
                state.attempt_token = CancellationToken::new();
            }
            state.notified_terminal = false;
            state.order.begin_submission(Utc::now());
            Self::emit_progress(&state, &self.events, 0, 0);
        }

        match self.run_submission().await {
            Ok(receipt) => {
                let mut state = self.state.lock().unwrap();
                state.order.complete_submission(receipt.clone());
                Self::emit_terminal(
                    &mut state,
                    &self.events,
                    SubmissionEvent::Completed {
                        receipt: receipt.clone(),
                    },
                );
                Ok(receipt)
            }
            Err(err) if err.is_cancelled() => {
                // cancelled attempts end silently
                self.state.lock().unwrap().order.reset_submission();
                Err(err)
            }
            Err(err) => {
                let message = err.to_string();
                let mut state = self.state.lock().unwrap();
                state.order.fail_submission(message.clone());
                Self::emit_terminal(
                    &mut state,
                    &self.events,
                    SubmissionEvent::Failed { message },
                );
                Err(err)
            }
        }
    }

    /// Stop whatever this session is doing, whether a submission or a
    /// preempted upload. No events arrive after this returns.
    pub fn cancel_submission_or_preempted_asset_upload(&self) {
        let mut state = self.state.lock().unwrap();
        state.attempt_token.cancel();
        state.order.reset_submission();
    }

    async fn run_submission(&self) -> Result<String, Error> {
        let token = self.state.lock().unwrap().attempt_token.clone();

        self.ensure_assets_uploaded(token.clone()).await?;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let order = self.state.lock().unwrap().order.clone();
        SubmitOrderRequest::with_cancellation(self.api.clone(), token)
            .submit(&order, &self.locale)
            .await
    }

    /// Reuse the preempted upload when there is one, otherwise run the
    /// pipeline here
    async fn ensure_assets_uploaded(&self, token: CancellationToken) -> Result<(), Error> {
        let pending = {
            let mut state = self.state.lock().unwrap();
            if state.order.asset_upload_complete() {
                return Ok(());
            }
            match state.upload_task.take() {
                Some(handle) => Some(handle),
                None => {
                    state.upload_in_progress = true;
                    None
                }
            }
        };

        if let Some(handle) = pending {
            let joined = handle
                .await
                .map_err(|e| Error::IllegalState(format!("upload task aborted: {e}")))?;
            match joined {
                // the preempted upload was cancelled before this
                // attempt began; run a fresh one under our token
                Err(Error::Cancelled) if !token.is_cancelled() => {
                    self.state.lock().unwrap().upload_in_progress = true;
                }
                other => return other,
            }
        }

        Self::run_upload(
            self.state.clone(),
            self.api.clone(),
            self.renderer.clone(),
            self.events.clone(),
            token,
        )
        .await
    }

    async fn run_upload(
        state: Arc<Mutex<SessionState>>,
        api: ApiClient,
        renderer: Arc<dyn ImageRenderer>,
        events: broadcast::Sender<SubmissionEvent>,
        token: CancellationToken,
    ) -> Result<(), Error> {
        let result = Self::upload_pipeline(&state, &api, renderer, &events, &token).await;

        let mut locked = state.lock().unwrap();
        locked.upload_in_progress = false;
        match &result {
            Ok(()) => {
                locked.order.set_asset_upload_complete(true);
            }
            Err(err) => {
                locked.expected_uploads.clear();
                if !locked.order.is_submitted() {
                    // nobody is waiting on this preempted upload; drop
                    // the failure and let the next submission upload
                    // from scratch
                    tracing::warn!(error = %err, "preempted asset upload failed");
                    locked.upload_task = None;
                }
            }
        }
        result
    }

    async fn upload_pipeline(
        state: &Arc<Mutex<SessionState>>,
        api: &ApiClient,
        renderer: Arc<dyn ImageRenderer>,
        events: &broadcast::Sender<SubmissionEvent>,
        token: &CancellationToken,
    ) -> Result<(), Error> {
        // Render edited fragments first, writing results back into the
        // order, so identical edits keep collapsing to one upload.
        let fragments = state.lock().unwrap().order.fragments_needing_render();
        if !fragments.is_empty() {
            tracing::info!(count = fragments.len(), "rendering edited images");
            let renders = fragments.iter().map(|fragment| {
                let renderer = renderer.clone();
                async move {
                    match token.run_until_cancelled(renderer.render(fragment)).await {
                        Some(result) => result,
                        None => Err(Error::Cancelled),
                    }
                }
            });
            let rendered = try_join_all(renders).await?;

            let mut locked = state.lock().unwrap();
            for (fragment, asset) in fragments.iter().zip(&rendered) {
                locked.order.apply_rendered_asset(fragment, asset);
            }
        }

        let images = {
            let mut locked = state.lock().unwrap();
            let images = locked.order.images_to_upload();
            locked.expected_uploads = images.clone();
            images
        };
        if images.is_empty() {
            return Ok(());
        }

        let request = AssetUploadRequest::with_cancellation(api.clone(), token.clone());
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let upload = request.upload_assets(images, progress_tx);
        tokio::pin!(upload);

        let uploaded = loop {
            tokio::select! {
                result = &mut upload => break result?,
                Some(progress) = progress_rx.recv() => {
                    let locked = state.lock().unwrap();
                    Self::emit_upload_progress(&locked, events, progress);
                }
            }
        };
        // snapshots from the final PUT may still be queued
        while let Ok(progress) = progress_rx.try_recv() {
            let locked = state.lock().unwrap();
            Self::emit_upload_progress(&locked, events, progress);
        }

        let mut locked = state.lock().unwrap();
        for image in &uploaded {
            if !locked.expected_uploads.contains(image) {
                return Err(Error::IllegalState(
                    "an image has been uploaded that shouldn't have been".to_string(),
                ));
            }
        }
        locked.order.back_fill_upload_state(&uploaded);
        if !locked.order.all_images_uploaded() {
            return Err(Error::IllegalState(
                "an image that should have been uploaded, hasn't been".to_string(),
            ));
        }
        Ok(())
    }

    /// Progress only flows while a submission is live. Preempted
    /// uploads run silently.
    fn emit_progress(
        state: &SessionState,
        events: &broadcast::Sender<SubmissionEvent>,
        items_percent: u8,
        bytes_percent: u8,
    ) {
        if !state.order.is_submitted()
            || state.attempt_token.is_cancelled()
            || state.notified_terminal
        {
            return;
        }
        let _ = events.send(SubmissionEvent::Progress {
            items_percent,
            bytes_percent,
        });
    }

    fn emit_upload_progress(
        state: &SessionState,
        events: &broadcast::Sender<SubmissionEvent>,
        progress: UploadProgress,
    ) {
        Self::emit_progress(
            state,
            events,
            percentage(progress.assets_uploaded as u64, progress.assets_total as u64),
            percentage(progress.bytes_written, progress.bytes_expected),
        );
    }

    fn emit_terminal(
        state: &mut SessionState,
        events: &broadcast::Sender<SubmissionEvent>,
        event: SubmissionEvent,
    ) {
        if state.attempt_token.is_cancelled() || state.notified_terminal {
            return;
        }
        state.notified_terminal = true;
        let _ = events.send(event);
    }
}

fn percentage(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_rounds_and_clamps() {
        assert_eq!(percentage(0, 3), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(3, 3), 100);
        // counts past the expected total stay at 100
        assert_eq!(percentage(5, 3), 100);
    }

    #[test]
    fn percentage_of_nothing_is_zero() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(7, 0), 0);
    }
}
