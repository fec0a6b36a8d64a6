/*!
    Media encoding for the av crate ecosystem.

    This crate transforms raw frames into compressed packets. It's the inverse
    of decode: frames go into an [`Encoder`], packets stamped with the encoder
    time base come out, ready for the muxer.

    # Encoding

    ```ignore
    use av_encode::{Encoder, EncoderConfig, EncoderPreset};
    use av_types::Rational;

    // H.264 encoder at 1080p 30fps
    let config = EncoderConfig::h264(1920, 1080, Rational::new(30, 1))
        .with_crf(23)
        .with_preset(EncoderPreset::Fast);

    let mut encoder = Encoder::open(&lib, config)?;

    for frame in video_frames {
        for packet in encoder.encode(&frame)? {
            // Write to muxer
        }
    }

    // Flush remaining packets
    let final_packets = encoder.drain()?;
    ```

    # Re-encoding a stream

    [`EncoderConfig::matching`] copies codec, geometry or sample layout, time
    base and bitrate from a stream, so frames decoded from it can be fed back
    unchanged:

    ```ignore
    let encoder = Encoder::open(&lib, EncoderConfig::matching(&streams[0]))?;
    ```

    # Rate Control

    - **CRF (Constant Rate Factor)**: Target constant quality, variable bitrate.
      Lower values = higher quality. 18-28 is typical range.
    - **CBR (Constant Bitrate)**: Fixed bitrate throughout. Required for some
      streaming protocols.
    - **VBR (Variable Bitrate)**: Target average bitrate with quality variation.

    ```ignore
    config.with_crf(23)
    config.with_bitrate(5_000_000)
    config.with_rate_control(RateControl::Vbr(5_000_000))
    ```

    # Global headers

    Some containers want codec headers once in the stream parameters instead
    of in every keyframe. Set [`EncoderConfig::with_global_header`] from the
    muxer's output format and pass [`Encoder::output_stream`] to the muxer.
*/

mod config;
mod encoder;

pub use config::{EncoderConfig, EncoderPreset, RateControl};
pub use encoder::{EncodeState, Encoder};
