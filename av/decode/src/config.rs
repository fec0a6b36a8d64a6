/*!
    Decoder configuration.
*/

use av_core::CodecOptions;

/**
    Configuration for opening a decoder.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Codec private options, applied by name when the decoder is opened.
    pub options: Vec<(String, String)>,
}

impl DecoderConfig {
    /**
        Add a codec private option.
    */
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    pub(crate) fn codec_options(&self) -> CodecOptions {
        CodecOptions {
            extra: self.options.clone(),
            ..CodecOptions::default()
        }
    }
}
