/*!
    Demux, decode, encode and mux orchestration for the av crate ecosystem.

    A [`Pipeline`] reads every packet from a source and routes it by stream:
    transcoded streams go through a decoder, an optional [`FrameTransform`]
    and an encoder; copied streams go straight to the muxer; dropped streams
    are discarded. When the input runs out, decoders and encoders are drained
    and the output is finalized.

    ```ignore
    use av_pipeline::{Pipeline, PipelineConfig, StreamAction};

    let config = PipelineConfig::default().with_action(2, StreamAction::Copy);
    let report = Pipeline::new(&lib, config)
        .transform(0, |mut frame: Frame<_>| -> Result<Frame<_>> {
            frame.set_key(false);
            Ok(frame)
        })
        .run(MediaSource::path("in.mkv"), MediaSink::path("out.mkv"))?;
    println!("{} packets written", report.packets_out());
    ```

    [`Scaler`] resizes and converts video frames, and an `av_core::FilterGraph`
    can be set as a transform directly. The encoder of a transformed stream is
    configured from the transform's output parameters.

    Any hard error stops the run and is returned as is. Output written up to
    that point is left in place.
*/

mod batch;
mod config;
mod pipeline;
mod report;
mod transform;

pub use av_core::{MediaSink, MediaSource};
pub use batch::{decode_all, encode_all};
pub use config::{EncoderOverrides, PipelineConfig, StreamAction, StreamSettings};
pub use pipeline::{Pipeline, run};
pub use report::{PipelineReport, StreamReport};
pub use transform::{FrameTransform, Passthrough, Scaler};
