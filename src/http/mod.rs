//! Local HTTP control API for the host shell
//!
//! The shell (the interview UI) drives the session and forwards window
//! events through these routes:
//! - POST /session/start - Enter fullscreen and begin the first question
//! - POST /session/advance - Submit the answer and move on
//! - POST /session/toggle - Pause or resume dictation
//! - POST /session/response - Replace the answer with typed text
//! - POST /session/window-event - Report blur, cursor exit, fullscreen exit
//! - GET /session/status - Query session status
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
