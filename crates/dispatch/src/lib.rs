use std::collections::HashMap;

use serde_json::{Map, Value};
use shared::{error::DispatchError, protocol::Reply};
use thiserror::Error;

/// Operation-specific parameters: the request's `opts` object. `None` is the
/// explicit no-options sentinel, distinguishable from an empty object.
pub type Opts = Map<String, Value>;

/// A named operation. An `Ok` reply is passed back to the transport verbatim.
pub type Handler = Box<dyn Fn(Option<&Opts>) -> anyhow::Result<Reply> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate command name: {0}")]
    DuplicateCommand(String),
}

/// Command-name -> handler mapping, built once at startup and read-only for
/// the life of the process. Lookups are exact string match, case-sensitive.
pub struct HandlerRegistry {
    handlers: HashMap<String, Handler>,
}

impl HandlerRegistry {
    /// Builds the registry from an explicit registration table. Two entries
    /// with the same command name fail construction; nothing is silently
    /// overwritten.
    pub fn build<I>(entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (&'static str, Handler)>,
    {
        let mut handlers = HashMap::new();
        for (cmd, handler) in entries {
            if handlers.insert(cmd.to_string(), handler).is_some() {
                return Err(RegistryError::DuplicateCommand(cmd.to_string()));
            }
        }
        Ok(Self { handlers })
    }

    pub fn lookup(&self, cmd: &str) -> Option<&Handler> {
        self.handlers.get(cmd)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered command names, in no particular order.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

/// Stateless per-request pipeline over an immutable registry. An explicit
/// value, not a process-wide singleton.
pub struct Dispatcher {
    registry: HandlerRegistry,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Validates the request, routes it, invokes the handler, and always
    /// returns a reply; no failure escapes to the transport. A handler `Err`
    /// is converted to an Error reply rather than aborting the request cycle.
    pub fn dispatch(&self, msg: &Value) -> Reply {
        let (cmd, opts) = match validate(msg) {
            Ok(parts) => parts,
            Err(err) => return err.into(),
        };

        let Some(handler) = self.registry.lookup(cmd) else {
            return DispatchError::UnknownCommand(cmd.to_string()).into();
        };

        match handler(opts) {
            Ok(reply) => reply,
            Err(err) => Reply::error(format!("Handler '{cmd}' failed: {err}")),
        }
    }
}

/// Enforces the request contract: the payload must be a JSON object, `cmd`
/// must be a string, and `opts`, when present, must be an object. Other
/// top-level keys are ignored.
fn validate(msg: &Value) -> Result<(&str, Option<&Opts>), DispatchError> {
    let Some(fields) = msg.as_object() else {
        return Err(DispatchError::MalformedMessage);
    };

    let cmd = match fields.get("cmd") {
        None => return Err(DispatchError::MissingCommand),
        Some(value) => value.as_str().ok_or(DispatchError::InvalidCommandType)?,
    };

    let opts = match fields.get("opts") {
        None => None,
        Some(value) => Some(value.as_object().ok_or(DispatchError::InvalidOptionsType)?),
    };

    Ok((cmd, opts))
}
