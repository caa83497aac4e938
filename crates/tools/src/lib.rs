//! Tool layer for Tessera.
//!
//! - `registry`: the fixed tool set and its two wire schemas
//! - `executor`: the execution boundary every provider's tool calls go through
//! - `validator`, `shell`, `preview`, `fetch`: the external collaborators
//!   the executor delegates to

pub mod executor;
pub mod fetch;
pub mod preview;
pub mod registry;
pub mod shell;
pub mod validator;

pub use executor::ToolExecutor;
pub use fetch::{HttpFetcher, UrlFetcher};
pub use preview::{FilePreview, PreviewRenderer};
pub use registry::{ToolName, definitions, gemini_function_declarations, openai_tools};
pub use shell::{ProcessShell, SessionRun, ShellExecutor, ShellOutput, ShellSession};
pub use validator::{TreeSitterValidator, SyntaxValidator};
