pub mod commands;
pub mod output;
pub mod repl;
pub mod spinner;

pub use commands::{help_text, Command};
pub use output::{
    format_stats, print_banner, print_error, print_info, print_success, render_response,
    RenderOptions,
};
pub use repl::{LoopState, Repl, PROMPT};
pub use spinner::Spinner;
