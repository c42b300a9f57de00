//! Declarative description of a short vertical video.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Default scene length when neither narration audio nor an explicit
/// duration is available.
pub const DEFAULT_SCENE_DURATION_SECS: f64 = 5.0;

/// One word of narration with its timing relative to the scene start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WordTiming {
    pub word: String,
    /// Start in seconds
    pub start: f64,
    /// End in seconds
    pub end: f64,
}

impl WordTiming {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.word.trim().is_empty() {
            return Err("word must not be empty".to_string());
        }
        if !self.start.is_finite() || self.start < 0.0 {
            return Err(format!("word '{}': start must be >= 0", self.word));
        }
        if !self.end.is_finite() || self.end <= self.start {
            return Err(format!("word '{}': end must be after start", self.word));
        }
        Ok(())
    }
}

/// One scene of the video.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Still image; ignored when `video_url` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Video clip; its own audio track is discarded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Narration audio; its duration wins over `duration`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    /// Explicit duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Narration text (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,

    /// Per-word timings used for captions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_timings: Option<Vec<WordTiming>>,
}

impl Scene {
    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_video(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    pub fn with_audio(mut self, url: impl Into<String>) -> Self {
        self.audio_url = Some(url.into());
        self
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs);
        self
    }

    pub fn with_word_timings(mut self, timings: Vec<WordTiming>) -> Self {
        self.word_timings = Some(timings);
        self
    }

    /// The visual source to use, video taking precedence over image.
    pub fn visual(&self) -> Visual<'_> {
        match (&self.video_url, &self.image_url) {
            (Some(v), _) => Visual::Video(v),
            (None, Some(i)) => Visual::Image(i),
            (None, None) => Visual::Blank,
        }
    }

    /// Duration to use when narration audio is absent or unusable.
    pub fn fallback_duration(&self, default_secs: f64) -> f64 {
        self.duration.unwrap_or(default_secs)
    }

    /// Word timings, empty when none were supplied.
    pub fn words(&self) -> &[WordTiming] {
        self.word_timings.as_deref().unwrap_or(&[])
    }

    fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("imageUrl", &self.image_url),
            ("videoUrl", &self.video_url),
            ("audioUrl", &self.audio_url),
        ] {
            if let Some(url) = value {
                validate_http_url(url).map_err(|e| format!("{}: {}", field, e))?;
            }
        }

        if let Some(d) = self.duration {
            if !d.is_finite() || d <= 0.0 {
                return Err(format!("duration must be > 0, got {}", d));
            }
        }

        for timing in self.words() {
            timing.validate()?;
        }

        Ok(())
    }
}

/// Resolved visual source of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visual<'a> {
    Video(&'a str),
    Image(&'a str),
    Blank,
}

/// Full render request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderSpec {
    pub project_id: String,

    /// Scenes in playback order
    pub scenes: Vec<Scene>,

    /// Background music mixed under the whole timeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_music_url: Option<String>,
}

impl RenderSpec {
    pub fn new(project_id: impl Into<String>, scenes: Vec<Scene>) -> Self {
        Self {
            project_id: project_id.into(),
            scenes,
            bg_music_url: None,
        }
    }

    pub fn with_bg_music(mut self, url: impl Into<String>) -> Self {
        self.bg_music_url = Some(url.into());
        self
    }

    /// Validate the payload at ingestion.
    pub fn validate(&self) -> Result<(), String> {
        if self.project_id.trim().is_empty() {
            return Err("projectId must not be empty".to_string());
        }
        if self.scenes.is_empty() {
            return Err("scenes must not be empty".to_string());
        }
        for (idx, scene) in self.scenes.iter().enumerate() {
            scene
                .validate()
                .map_err(|e| format!("scene {}: {}", idx, e))?;
        }
        if let Some(url) = &self.bg_music_url {
            validate_http_url(url).map_err(|e| format!("bgMusicUrl: {}", e))?;
        }
        Ok(())
    }
}

fn validate_http_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid URL '{}': {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("unsupported URL scheme '{}'", other)),
    }
}
