//! Cross-window messaging (`postMessage`)
//!
//! Posting has a synchronous phase (target origin resolution and
//! serialization, both of which can fail the call) and a deferred phase: one
//! "posted-message" task per call that checks the target origin, deserializes
//! the payload in the target and fires the event.

use std::rc::Rc;

use tracing::{debug, trace};

use super::events::{event_types, MessageEvent};
use super::Window;
use crate::error::{messages, Error, Result};
use crate::event_loop::TaskSource;
use crate::origin::{self, Origin};
use crate::runtime::{SerializedRecord, Value};

/// Resolved `targetOrigin` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOrigin {
    /// "*": deliver regardless of the target's origin
    Any,
    /// "/": the sender's origin, captured when the message was posted
    SenderOriginAtCallTime(Origin),
    /// An explicit origin
    Specific(Origin),
}

impl TargetOrigin {
    /// Resolve a `targetOrigin` string on behalf of `sender`
    pub fn resolve(target_origin: &str, sender: &Window) -> Result<Self> {
        match target_origin {
            "/" => Ok(TargetOrigin::SenderOriginAtCallTime(sender.origin())),
            "*" => Ok(TargetOrigin::Any),
            other => sender
                .url_resolver()
                .parse_url(other, None)
                .map(|url| TargetOrigin::Specific(url.origin()))
                .ok_or_else(|| Error::syntax_error(messages::invalid_target_origin(other))),
        }
    }

    /// Whether a document with `origin` may receive the message
    pub fn allows(&self, origin: &Origin) -> bool {
        match self {
            TargetOrigin::Any => true,
            TargetOrigin::SenderOriginAtCallTime(expected) | TargetOrigin::Specific(expected) => {
                origin::is_same_origin(expected, origin)
            }
        }
    }
}

/// Options form of `postMessage`
#[derive(Debug, Clone)]
pub struct WindowPostMessageOptions {
    pub target_origin: String,
    pub transfer: Vec<Value>,
}

impl Default for WindowPostMessageOptions {
    fn default() -> Self {
        Self {
            target_origin: "/".to_string(),
            transfer: Vec::new(),
        }
    }
}

struct PendingMessage {
    record: SerializedRecord,
    target_origin: TargetOrigin,
    origin: String,
    source: Rc<Window>,
    target: Rc<Window>,
}

impl Window {
    /// Post `message` from `sender` to this window.
    ///
    /// Fails with a SyntaxError if `target_origin` is not "*", "/" or a
    /// valid URL, or if the message cannot be serialized. Objects in
    /// `transfer` are detached on success.
    pub fn post_message(
        self: &Rc<Self>,
        sender: &Rc<Window>,
        message: &Value,
        target_origin: &str,
        transfer: &[Value],
    ) -> Result<()> {
        let target_origin = TargetOrigin::resolve(target_origin, sender)?;

        let record = sender
            .codec()
            .serialize_with_transfer(message, transfer)
            .map_err(|e| Error::syntax_error_from_clone(messages::UNSERIALIZABLE_MESSAGE, e))?;

        let pending = PendingMessage {
            record,
            target_origin,
            origin: origin::serialize_origin(&sender.origin()),
            source: sender.clone(),
            target: self.clone(),
        };

        let task = self
            .event_loop()
            .queue_task(TaskSource::PostedMessage, move || deliver(pending));
        trace!(
            target: "skylight::message",
            task,
            from = sender.id(),
            to = self.id(),
            "queued message"
        );
        Ok(())
    }

    /// Options form of [`Window::post_message`]
    pub fn post_message_with_options(
        self: &Rc<Self>,
        sender: &Rc<Window>,
        message: &Value,
        options: &WindowPostMessageOptions,
    ) -> Result<()> {
        self.post_message(sender, message, &options.target_origin, &options.transfer)
    }
}

fn deliver(message: PendingMessage) {
    let PendingMessage {
        record,
        target_origin,
        origin,
        source,
        target,
    } = message;

    if !target_origin.allows(&target.origin()) {
        debug!(
            target: "skylight::message",
            to = target.id(),
            target_origin = ?target_origin,
            "dropped message for mismatched origin"
        );
        return;
    }

    let event = match target.codec().deserialize_with_transfer(&record) {
        Ok(deserialized) => MessageEvent {
            event_type: event_types::MESSAGE,
            origin,
            source: Some(source),
            data: deserialized.deserialized,
            ports: deserialized
                .transferred_values
                .into_iter()
                .filter(Value::is_message_port)
                .collect(),
        },
        Err(error) => {
            debug!(
                target: "skylight::message",
                to = target.id(),
                %error,
                "message could not be deserialized"
            );
            MessageEvent {
                event_type: event_types::MESSAGE_ERROR,
                origin,
                source: Some(source),
                data: Value::Undefined,
                ports: Vec::new(),
            }
        }
    };

    target.dispatch_event(&event);
}
