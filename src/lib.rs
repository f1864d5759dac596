pub mod comments;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod logging;
pub mod markup;
pub mod render;
pub mod session;
pub mod state;
pub mod store;
pub mod viewport;

pub use error::{EngineError, EngineResult};
pub use session::{AnnotationSession, SessionEvent};

use markup::ImageRef;

/// Opens a session for `image` with logging and the user's config in place.
pub fn open(image: ImageRef) -> AnnotationSession {
    logging::init();
    let config = config::load_engine_config();
    tracing::info!(image = %image.id, "starting markup-canvas session");
    AnnotationSession::new(image, config)
}
