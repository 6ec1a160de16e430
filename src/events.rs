use std::path::PathBuf;

/// How a cycle ended when nothing went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A photo was downloaded to `path` and the display program accepted it.
    Displayed { asset_id: String, path: PathBuf },
    /// The server returned no photo the frame can show.
    NoSuitableAsset,
}

/// Where the frame loop is between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Last cycle succeeded or found nothing; wait the rotation interval.
    Running,
    /// Last cycle failed; wait the retry backoff.
    Backoff,
}
