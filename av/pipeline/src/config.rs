/*!
    Pipeline configuration.
*/

use std::collections::BTreeMap;

use av_encode::{EncoderConfig, EncoderPreset, RateControl};
use av_types::{CodecId, Error, MediaKind, Result, StreamDescriptor};
use serde::{Deserialize, Serialize};

/**
    What a pipeline does with one input stream.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamAction {
    /// Decode, transform and re-encode.
    Transcode,
    /// Pass packets to the muxer unchanged.
    Copy,
    /// Leave the stream out of the output.
    Drop,
}

impl StreamAction {
    /**
        Audio and video are transcoded, everything else is dropped.
    */
    pub fn default_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video | MediaKind::Audio => Self::Transcode,
            MediaKind::Subtitle | MediaKind::Other => Self::Drop,
        }
    }
}

/**
    Encoder settings applied on top of the input stream's own parameters.

    Frame geometry and sample layout always come from the decoded stream.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderOverrides {
    #[serde(default)]
    pub codec: Option<CodecId>,
    #[serde(default)]
    pub rate_control: Option<RateControl>,
    #[serde(default)]
    pub preset: Option<EncoderPreset>,
    #[serde(default)]
    pub keyframe_interval: Option<u32>,
    /// Codec private options, passed through as given.
    #[serde(default)]
    pub options: Vec<(String, String)>,
}

impl EncoderOverrides {
    pub fn with_codec(mut self, codec: CodecId) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_rate_control(mut self, rate_control: RateControl) -> Self {
        self.rate_control = Some(rate_control);
        self
    }

    pub fn with_preset(mut self, preset: EncoderPreset) -> Self {
        self.preset = Some(preset);
        self
    }

    pub fn with_keyframe_interval(mut self, frames: u32) -> Self {
        self.keyframe_interval = Some(frames);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    /**
        Apply the overrides to an encoder configuration.
    */
    pub fn apply(&self, mut config: EncoderConfig) -> EncoderConfig {
        if let Some(codec) = self.codec {
            config.codec = codec;
        }
        if let Some(rate_control) = self.rate_control {
            config = config.with_rate_control(rate_control);
        }
        if let Some(preset) = self.preset {
            config = config.with_preset(preset);
        }
        if let Some(frames) = self.keyframe_interval {
            config = config.with_keyframe_interval(frames);
        }
        for (key, value) in &self.options {
            config = config.with_option(key.clone(), value.clone());
        }
        config
    }
}

/**
    Settings for one input stream.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    /// Overrides the default action for the stream's media kind.
    #[serde(default)]
    pub action: Option<StreamAction>,
    #[serde(default)]
    pub encoder: EncoderOverrides,
}

/**
    Configuration for a [`Pipeline`](crate::Pipeline) run.

    Streams are keyed by input stream index. Streams without an entry get
    [`StreamAction::default_for`] their media kind and the input stream's own
    encoder parameters.

    ```
    use av_pipeline::{PipelineConfig, StreamAction};

    let config = PipelineConfig::from_json(r#"{
        "streams": {
            "0": { "encoder": { "keyframe_interval": 25 } },
            "1": { "action": "copy" }
        }
    }"#).unwrap();
    assert_eq!(config.streams[&1].action, Some(StreamAction::Copy));
    ```
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub streams: BTreeMap<usize, StreamSettings>,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Load a configuration from JSON. Malformed input is `InvalidArgument`.
    */
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::invalid_argument(format!("pipeline config: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::invalid_argument(format!("pipeline config: {e}")))
    }

    /**
        Set the action for input stream `index`.
    */
    pub fn with_action(mut self, index: usize, action: StreamAction) -> Self {
        self.streams.entry(index).or_default().action = Some(action);
        self
    }

    /**
        Set encoder overrides for input stream `index`.
    */
    pub fn with_encoder(mut self, index: usize, encoder: EncoderOverrides) -> Self {
        self.streams.entry(index).or_default().encoder = encoder;
        self
    }

    /**
        The action taken for `stream`.
    */
    pub fn action_for(&self, stream: &StreamDescriptor) -> StreamAction {
        self.streams
            .get(&stream.index)
            .and_then(|s| s.action)
            .unwrap_or_else(|| StreamAction::default_for(stream.kind))
    }

    /**
        Encoder configuration for transcoding `stream`.
    */
    pub fn encoder_for(&self, stream: &StreamDescriptor) -> EncoderConfig {
        let config = EncoderConfig::matching(stream);
        match self.streams.get(&stream.index) {
            Some(settings) => settings.encoder.apply(config),
            None => config,
        }
    }
}
