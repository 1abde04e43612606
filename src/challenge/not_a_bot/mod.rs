mod render;
mod submit;
mod token;
mod types;

pub(crate) use render::render_not_a_bot;
pub(crate) use submit::{handle_not_a_bot_submit_with_outcome, serve_not_a_bot_page};
pub(crate) use token::has_valid_marker;
pub(crate) use types::{NotABotDecision, NotABotSubmitOutcome, NotABotSubmitResult};
