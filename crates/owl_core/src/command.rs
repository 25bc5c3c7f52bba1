//! Text commands and the name-keyed command map.

use crate::component::Component;
use crate::error::OwlError;
use crate::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command did what was asked
    pub success: bool,
    /// Text shown to whoever ran the command
    pub message: String,
}

impl CommandResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// A command is a component whose id is the name it is invoked by.
pub trait Command: Component {
    fn execute(&self, params: &[&str]) -> CommandResult;

    fn can_execute(&self, _params: &[&str]) -> bool {
        true
    }

    fn usage(&self) -> &str;

    fn description(&self) -> &str;

    /// Suggestions for the argument being typed.
    fn tab_completions(&self, _current_input: &str) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct CommandMap {
    commands: RwLock<HashMap<String, Arc<dyn Command>>>,
}

impl CommandMap {
    /// Create an empty command map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the command's id, case-insensitively. Replaces any
    /// command already using that name.
    pub fn register(&self, command: Arc<dyn Command>) {
        let name = command.id().to_lowercase();
        if self
            .commands
            .write()
            .insert(name.clone(), command)
            .is_some()
        {
            warn!("Command '{}' re-registered; previous handler replaced", name);
        } else {
            info!("⌨️ Command registered: /{}", name);
        }
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.write().remove(&name.to_lowercase())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.read().get(&name.to_lowercase()).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a command line such as `/greet Steve`. Arguments the command
    /// refuses yield a failure carrying its usage.
    pub fn dispatch(&self, line: &str) -> Result<CommandResult> {
        let mut words = line.trim().trim_start_matches('/').split_whitespace();
        let name = words.next().unwrap_or_default();
        let params: Vec<&str> = words.collect();

        let command = self
            .get(name)
            .ok_or_else(|| OwlError::CommandNotFound(name.to_string()))?;
        debug!("Dispatching /{} with {} argument(s)", name, params.len());

        if !command.can_execute(&params) {
            return Ok(CommandResult::failure(format!("Usage: {}", command.usage())));
        }
        Ok(command.execute(&params))
    }

    /// Completions for a partial line: command names while the first word
    /// is being typed, the command's own suggestions afterwards.
    pub fn complete(&self, line: &str) -> Vec<String> {
        let line = line.trim_start().trim_start_matches('/');
        match line.split_once(char::is_whitespace) {
            None => {
                let prefix = line.to_lowercase();
                self.names()
                    .into_iter()
                    .filter(|name| name.starts_with(&prefix))
                    .collect()
            }
            Some((name, rest)) => self
                .get(name)
                .map(|command| command.tab_completions(rest.trim_start()))
                .unwrap_or_default(),
        }
    }

    pub fn clear(&self) {
        self.commands.write().clear();
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }
}
