mod assistant_panel;
mod command_input;
mod input;
mod key_result;
mod notice;
mod picker;
mod prompt;

pub use assistant_panel::AssistantPanel;
pub use command_input::{CommandEvent, CommandInput};
pub use key_result::KeyResult;
pub use notice::Notice;
pub use picker::{Picker, PickerEvent};
pub use prompt::{Prompt, PromptEvent};
