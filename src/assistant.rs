//! Conversational assistant panel state.
//!
//! The panel keeps an append-only message log for the life of the process.
//! It talks to the agent service directly and never touches the query cache.

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tracing::debug;

use crate::gateway::recipes::CodeBlock;
use crate::gateway::{Gateway, GatewayResult};

/// Open/minimized/closed tri-state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PanelState {
  #[default]
  Closed,
  Minimized,
  Open,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssistantMode {
  #[default]
  Chat,
  /// Answers with the selected project files as context
  Code,
}

impl AssistantMode {
  pub fn label(self) -> &'static str {
    match self {
      Self::Chat => "CHAT",
      Self::Code => "CODE",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
  User,
  Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
  pub role: Role,
  pub content: String,
  pub timestamp: DateTime<Local>,
  /// Files attached to a code-mode question
  pub files: Option<Vec<String>>,
  pub code_blocks: Vec<CodeBlock>,
}

impl Message {
  fn user(content: String, files: Option<Vec<String>>) -> Self {
    Self {
      role: Role::User,
      content,
      timestamp: Local::now(),
      files,
      code_blocks: Vec::new(),
    }
  }

  fn assistant(content: String, code_blocks: Vec<CodeBlock>) -> Self {
    Self {
      role: Role::Assistant,
      content,
      timestamp: Local::now(),
      files: None,
      code_blocks,
    }
  }
}

/// What the agent answered, normalized across modes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
  pub response: String,
  pub code_blocks: Vec<CodeBlock>,
}

enum Pending {
  Reply(GatewayResult<Reply>),
  Structure(GatewayResult<String>),
}

pub struct Assistant {
  gateway: Gateway,
  pub panel: PanelState,
  pub mode: AssistantMode,
  messages: Vec<Message>,
  selected_files: Vec<String>,
  file_structure: Option<String>,
  tx: mpsc::UnboundedSender<Pending>,
  rx: mpsc::UnboundedReceiver<Pending>,
  in_flight: usize,
}

impl Assistant {
  pub fn new(gateway: Gateway) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      gateway,
      panel: PanelState::Closed,
      mode: AssistantMode::Chat,
      messages: Vec::new(),
      selected_files: Vec::new(),
      file_structure: None,
      tx,
      rx,
      in_flight: 0,
    }
  }

  pub fn messages(&self) -> &[Message] {
    &self.messages
  }

  pub fn is_loading(&self) -> bool {
    self.in_flight > 0
  }

  pub fn selected_files(&self) -> &[String] {
    &self.selected_files
  }

  pub fn file_structure(&self) -> Option<&str> {
    self.file_structure.as_deref()
  }

  /// Ctrl-A: closed opens, anything else closes.
  pub fn toggle(&mut self) {
    self.panel = match self.panel {
      PanelState::Closed => PanelState::Open,
      PanelState::Minimized | PanelState::Open => PanelState::Closed,
    };
  }

  pub fn minimize(&mut self) {
    if self.panel == PanelState::Open {
      self.panel = PanelState::Minimized;
    }
  }

  pub fn restore(&mut self) {
    if self.panel == PanelState::Minimized {
      self.panel = PanelState::Open;
    }
  }

  /// Switch modes. Entering code mode loads the project file listing.
  pub fn set_mode(&mut self, mode: AssistantMode) {
    if self.mode == mode {
      return;
    }
    self.mode = mode;
    if mode == AssistantMode::Code && self.file_structure.is_none() {
      self.load_file_structure();
    }
  }

  pub fn toggle_mode(&mut self) {
    let next = match self.mode {
      AssistantMode::Chat => AssistantMode::Code,
      AssistantMode::Code => AssistantMode::Chat,
    };
    self.set_mode(next);
  }

  /// Add a file to the code-mode context, or remove it if already selected.
  pub fn toggle_file(&mut self, path: &str) {
    let path = path.trim();
    if path.is_empty() {
      return;
    }
    if let Some(pos) = self.selected_files.iter().position(|f| f == path) {
      self.selected_files.remove(pos);
    } else {
      self.selected_files.push(path.to_string());
    }
  }

  fn load_file_structure(&mut self) {
    let gateway = self.gateway.clone();
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let result = gateway.list_project_files().await.map(|reply| {
        reply
          .structure
          .filter(|s| !s.is_empty())
          .unwrap_or(reply.response)
      });
      let _ = tx.send(Pending::Structure(result));
    });
  }

  /// Send the user's text. The user message is logged immediately; the reply
  /// (or an error) is logged by a later `poll`. Blank input is ignored.
  /// Returns whether a request was started.
  pub fn send(&mut self, input: &str) -> bool {
    let Some(files) = self.begin_send(input) else {
      return false;
    };
    let gateway = self.gateway.clone();
    let tx = self.tx.clone();
    let message = input.to_string();
    let mode = self.mode;
    tokio::spawn(async move {
      let result = match mode {
        AssistantMode::Chat => gateway.chat(&message).await.map(|r| Reply {
          response: r.response,
          code_blocks: Vec::new(),
        }),
        AssistantMode::Code => {
          gateway
            .code_assist(&message, &files)
            .await
            .map(|r| Reply {
              response: r.response,
              code_blocks: r.code_blocks,
            })
        }
      };
      let _ = tx.send(Pending::Reply(result));
    });
    true
  }

  /// Log the user message and count the request as in flight. Returns the
  /// files attached to it, or `None` for blank input.
  fn begin_send(&mut self, input: &str) -> Option<Vec<String>> {
    if input.trim().is_empty() {
      return None;
    }
    let files = match self.mode {
      AssistantMode::Code => Some(self.selected_files.clone()),
      AssistantMode::Chat => None,
    };
    self
      .messages
      .push(Message::user(input.to_string(), files.clone()));
    self.in_flight += 1;
    debug!(mode = ?self.mode, "assistant message sent");
    Some(files.unwrap_or_default())
  }

  /// Log exactly one assistant message for a settled request.
  fn settle(&mut self, result: GatewayResult<Reply>) {
    self.in_flight = self.in_flight.saturating_sub(1);
    let message = match result {
      Ok(reply) if reply.response.is_empty() => {
        Message::assistant("No response received.".to_string(), reply.code_blocks)
      }
      Ok(reply) => Message::assistant(reply.response, reply.code_blocks),
      Err(e) => Message::assistant(format!("Error: {}", e), Vec::new()),
    };
    self.messages.push(message);
  }

  /// Drain settled requests. Returns true if anything changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;
    while let Ok(pending) = self.rx.try_recv() {
      match pending {
        Pending::Reply(result) => self.settle(result),
        Pending::Structure(Ok(structure)) => self.file_structure = Some(structure),
        // The listing is optional; a failure leaves the browser empty
        Pending::Structure(Err(e)) => debug!(error = %e, "file listing failed"),
      }
      changed = true;
    }
    changed
  }
}
