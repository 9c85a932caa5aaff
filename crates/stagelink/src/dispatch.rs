//! Handler registry: who gets told about what.
//!
//! Three kinds of subscription with two different policies:
//!
//! - **Commands** have exactly one active handler. Installing a second
//!   one replaces the first — UIs re-run their setup on hot reload and
//!   scene changes, and stacking handlers would deliver every command
//!   twice.
//! - **Peer messages** and **lifecycle hooks** accumulate; every
//!   subscriber fires, in subscription order.
//!
//! The registry performs no filtering and no payload validation: peer
//! messages are delivered even when `from` is the installation itself
//! (receivers self-filter), and command payloads mean whatever the
//! handler says they mean.

use stagelink_protocol::{Command, PeerMessage};

/// Handler for operator commands.
pub type CommandHandler = Box<dyn FnMut(Command) + Send>;

/// Handler for peer broadcasts.
pub type MessageHandler = Box<dyn FnMut(PeerMessage) + Send>;

/// Hook fired on connection lifecycle edges.
pub type LifecycleHook = Box<dyn FnMut() + Send>;

/// All installed handlers, owned by the supervisor task.
#[derive(Default)]
pub(crate) struct Handlers {
    command: Option<CommandHandler>,
    messages: Vec<MessageHandler>,
    connect: Vec<LifecycleHook>,
    disconnect: Vec<LifecycleHook>,
}

impl Handlers {
    /// Installs the command handler, replacing any previous one.
    pub(crate) fn set_command(&mut self, handler: CommandHandler) {
        if self.command.is_some() {
            tracing::debug!("command handler replaced");
        }
        self.command = Some(handler);
    }

    /// Adds a peer-message subscriber.
    pub(crate) fn add_message(&mut self, handler: MessageHandler) {
        self.messages.push(handler);
    }

    /// Adds a connect hook.
    pub(crate) fn add_connect(&mut self, hook: LifecycleHook) {
        self.connect.push(hook);
    }

    /// Adds a disconnect hook.
    pub(crate) fn add_disconnect(&mut self, hook: LifecycleHook) {
        self.disconnect.push(hook);
    }

    /// Delivers a command to the active handler, if any.
    pub(crate) fn dispatch_command(&mut self, command: Command) {
        match &mut self.command {
            Some(handler) => handler(command),
            None => {
                tracing::debug!(
                    action = %command.action,
                    "command dropped: no handler installed"
                );
            }
        }
    }

    /// Delivers a peer message to every subscriber, in order.
    pub(crate) fn dispatch_message(&mut self, message: PeerMessage) {
        for handler in &mut self.messages {
            handler(message.clone());
        }
    }

    /// Fires every connect hook, in subscription order.
    pub(crate) fn fire_connect(&mut self) {
        for hook in &mut self.connect {
            hook();
        }
    }

    /// Fires every disconnect hook, in subscription order.
    pub(crate) fn fire_disconnect(&mut self) {
        for hook in &mut self.disconnect {
            hook();
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
