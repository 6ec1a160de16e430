use std::path::PathBuf;
use std::time::Duration;

use tokio::select;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Configuration;
use crate::display::FrameDisplay;
use crate::error::Result;
use crate::events::{CycleOutcome, FrameState};
use crate::fetch;
use crate::immich::AssetSource;
use crate::select as selector;

/// How long to wait in each loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub rotation_interval: Duration,
    pub retry_backoff: Duration,
}

impl FrameTiming {
    pub fn from_config(cfg: &Configuration) -> Self {
        Self {
            rotation_interval: cfg.rotation_interval(),
            retry_backoff: cfg.retry_backoff,
        }
    }

    pub fn wait_for(&self, state: FrameState) -> Duration {
        match state {
            FrameState::Running => self.rotation_interval,
            FrameState::Backoff => self.retry_backoff,
        }
    }
}

/// The fetch, filter, download and display pipeline for one picture frame.
pub struct Frame<S, D> {
    source: S,
    display: D,
    image_path: PathBuf,
    batch_size: usize,
    timing: FrameTiming,
}

impl<S, D> Frame<S, D>
where
    S: AssetSource + Sync,
    D: FrameDisplay + Sync,
{
    pub fn new(source: S, display: D, cfg: &Configuration) -> Self {
        Self {
            source,
            display,
            image_path: cfg.image_path.clone(),
            batch_size: cfg.asset_batch_size,
            timing: FrameTiming::from_config(cfg),
        }
    }

    pub fn timing(&self) -> FrameTiming {
        self.timing
    }

    /// One full attempt: select a photo, store it, hand it to the display.
    ///
    /// An empty or all-video batch is `Ok(NoSuitableAsset)` and leaves the
    /// image file and the panel untouched.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        info!("fetching random photo from Immich");
        let Some(asset) = selector::pick_random_photo(&self.source, self.batch_size).await? else {
            return Ok(CycleOutcome::NoSuitableAsset);
        };
        info!(
            file = %asset.original_file_name,
            id = %asset.id,
            "selected photo"
        );

        let written = fetch::download_to(&self.source, &asset.id, &self.image_path).await?;
        info!(path = %self.image_path.display(), bytes = written, "image saved");

        self.display.show(&self.image_path).await.into_result()?;
        info!("display updated successfully");

        Ok(CycleOutcome::Displayed {
            asset_id: asset.id,
            path: self.image_path.clone(),
        })
    }

    /// Runs one cycle inside the failure boundary and returns the next state.
    pub async fn step(&self) -> FrameState {
        match self.run_cycle().await {
            Ok(_) => FrameState::Running,
            Err(err) => {
                let err = anyhow::Error::new(err);
                error!(error = format!("{err:#}"), "display cycle failed");
                FrameState::Backoff
            }
        }
    }

    /// Cycles until `cancel` fires. Failures never end the loop.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let state = select! {
                _ = cancel.cancelled() => break,
                state = self.step() => state,
            };

            let wait = self.timing.wait_for(state);
            match state {
                FrameState::Running => info!(
                    wait = %humantime::format_duration(wait),
                    "waiting for next image"
                ),
                FrameState::Backoff => warn!(
                    wait = %humantime::format_duration(wait),
                    "retrying after backoff"
                ),
            }

            select! {
                _ = cancel.cancelled() => break,
                _ = sleep(wait) => {}
            }
        }
        info!("frame loop stopped");
    }
}
