mod command;
mod output;
mod prompt;
mod spawner;
mod traits;

pub use command::{build_command_args, CommandGenerator};
pub use output::CommandOutput;
pub use prompt::Prompt;
pub use spawner::ProcessSpawner;
pub use traits::{CommandConfig, GenerationError, GenerationRequest, Generator};
