/*!
    Probing functionality for extracting media metadata.
*/

use av_core::{InputContext, MediaSource, NativeLibrary};
use av_types::{MediaInfo, Result};

/**
    Probe a container for its streams and duration without keeping it open.

    This reads just enough of the source to describe it; the container is
    closed before returning.

    # Example

    ```ignore
    let info = probe(&lib, MediaSource::path("video.mp4"))?;
    if let Some(video) = info.video() {
        println!("Video codec: {}", video.codec_id());
    }
    ```
*/
pub fn probe<L: NativeLibrary>(lib: &L, source: MediaSource) -> Result<MediaInfo> {
    let description = source.describe();
    let input = InputContext::open(lib, source).map_err(|e| e.within(&description))?;
    let info = extract_media_info(&input);
    tracing::debug!(
        source = %description,
        format = %info.format_name,
        streams = info.streams.len(),
        duration = ?info.duration,
        "Probed media source"
    );
    Ok(info)
}

/**
    Extract [`MediaInfo`] from an already-opened input context.

    The container duration wins; otherwise the longest stream duration is used.
*/
fn extract_media_info<L: NativeLibrary>(input: &InputContext<L>) -> MediaInfo {
    let duration = input
        .duration()
        .or_else(|| input.streams().iter().filter_map(|s| s.duration).max());
    MediaInfo {
        format_name: input.format_name().to_string(),
        duration,
        streams: input.streams().to_vec(),
    }
}
