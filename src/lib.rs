pub mod audio;
pub mod config;
pub mod cover;
pub mod error;
pub mod library;
pub mod metadata;
pub mod model;
pub mod player;
pub mod progress;

pub use audio::{AudioEngine, BackendEvent, NullAudioEngine, RodioAudioEngine, event_channel};
pub use config::Settings;
pub use error::PlayerError;
pub use library::LibraryScanner;
pub use model::{CatalogItem, NowPlaying, PlaybackState, ProgressSnapshot, format_time};
pub use player::Player;
pub use progress::{ProgressReporter, ProgressTicker};
