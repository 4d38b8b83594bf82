pub mod audio_probe;
pub mod tts;

pub use audio_probe::probe_audio_duration;
pub use tts::{
    AttemptOutcome, ElevenLabsProvider, GoogleTranslateProvider, ProviderChain, ProviderFailure,
    SpeechAudio, SpeechProvider, SynthesisAttempt, VoiceoverTrack,
};
