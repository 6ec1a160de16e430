use tracing::info;

use crate::error::Result;
use crate::immich::{Asset, AssetSource};

const MOVIE_EXTENSION: &str = ".mov";
const VIDEO_TYPE: &str = "VIDEO";

/// Whether the frame can show this asset: not a `.mov` file and not a video.
///
/// Both comparisons ignore ASCII case.
pub fn is_displayable(asset: &Asset) -> bool {
    !ends_with_ignore_case(&asset.original_file_name, MOVIE_EXTENSION)
        && !asset.asset_type.eq_ignore_ascii_case(VIDEO_TYPE)
}

fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name
            .get(name.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

/// First displayable asset in received order.
pub fn select_photo(assets: Vec<Asset>) -> Option<Asset> {
    assets.into_iter().find(is_displayable)
}

/// Requests a batch of random assets and picks the first photo.
///
/// `Ok(None)` means the server answered but nothing suitable came back.
pub async fn pick_random_photo<S>(source: &S, count: usize) -> Result<Option<Asset>>
where
    S: AssetSource + Sync,
{
    let assets = source.random_assets(count).await?;
    if assets.is_empty() {
        info!("no photos returned by Immich");
        return Ok(None);
    }

    let candidates = assets.len();
    let selected = select_photo(assets);
    if selected.is_none() {
        info!(
            candidates,
            "no suitable photo found (all were videos or .mov files)"
        );
    }
    Ok(selected)
}
