/*!
    One-shot helpers running a codec over a whole sequence.
*/

use av_core::{Frame, NativeLibrary, Packet};
use av_decode::Decoder;
use av_encode::Encoder;
use av_types::Result;

/**
    Decode every packet, then flush the decoder and collect what it held back.

    The decoder ends in the flushed state; call [`Decoder::reset`] to reuse it.
*/
pub fn decode_all<L, I>(decoder: &mut Decoder<L>, packets: I) -> Result<Vec<Frame<L>>>
where
    L: NativeLibrary,
    I: IntoIterator<Item = Packet<L>>,
{
    let mut frames = Vec::new();
    for packet in packets {
        frames.extend(decoder.decode(&packet)?);
    }
    frames.extend(decoder.drain()?);
    Ok(frames)
}

/**
    Encode every frame, then flush the encoder and collect the tail.
*/
pub fn encode_all<L, I>(encoder: &mut Encoder<L>, frames: I) -> Result<Vec<Packet<L>>>
where
    L: NativeLibrary,
    I: IntoIterator<Item = Frame<L>>,
{
    let mut packets = Vec::new();
    for frame in frames {
        packets.extend(encoder.encode(&frame)?);
    }
    packets.extend(encoder.drain()?);
    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use av_encode::EncoderConfig;
    use av_source::Demuxer;
    use av_synthetic::{Fixture, SyntheticLibrary};
    use av_types::CodecId;

    #[test]
    fn delayed_codec_round_trip() {
        let lib = SyntheticLibrary::new();
        let fixture = Fixture::new()
            .video(CodecId::Mpeg4, 8, 8, 25)
            .packets_per_stream(6);
        let mut demuxer = Demuxer::open(&lib, fixture.source().unwrap()).unwrap();
        let stream = demuxer.streams()[0].clone();
        let packets: Vec<_> = (&mut demuxer).collect::<Result<_>>().unwrap();

        let mut decoder = Decoder::open(&lib, &stream).unwrap();
        let frames = decode_all(&mut decoder, packets).unwrap();
        assert_eq!(frames.len(), 6);

        let mut encoder = Encoder::open(&lib, EncoderConfig::matching(&stream)).unwrap();
        let encoded = encode_all(&mut encoder, frames).unwrap();
        assert_eq!(encoded.len(), 6);
        assert!(encoded[0].is_key());

        assert!(decode_all(&mut decoder, Vec::new()).unwrap().is_empty());
        drop((encoded, decoder, encoder, demuxer));
        assert!(lib.ledger().is_balanced());
    }
}
