//! Dispatch actions
//!
//! A [`DispatchAction`] is one primary disposition (send, queue or destroy)
//! optionally combined with a notification back to the message's sender.
//! Actions are parsed once from their token form, e.g. `"queue|notifySender"`,
//! and never change afterwards.

use std::fmt;
use std::str::FromStr;

use crate::RuleError;

pub const SEND_TOKEN: &str = "send";
pub const QUEUE_TOKEN: &str = "queue";
pub const DESTROY_TOKEN: &str = "destroy";
pub const NOTIFY_SENDER_TOKEN: &str = "notifySender";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchAction {
    send: bool,
    queue: bool,
    destroy: bool,
    notify_sender: bool,
}

impl DispatchAction {
    pub const SEND: DispatchAction = DispatchAction {
        send: true,
        queue: false,
        destroy: false,
        notify_sender: false,
    };

    pub const QUEUE: DispatchAction = DispatchAction {
        send: false,
        queue: true,
        destroy: false,
        notify_sender: false,
    };

    pub const DESTROY: DispatchAction = DispatchAction {
        send: false,
        queue: false,
        destroy: true,
        notify_sender: false,
    };

    /// Splits on `|`, `,` or whitespace. Tokens are matched case insensitive.
    pub fn parse(tokens: &str) -> Result<Self, RuleError> {
        let mut action = DispatchAction {
            send: false,
            queue: false,
            destroy: false,
            notify_sender: false,
        };

        let mut seen = 0usize;
        for token in tokens
            .split(|c: char| c == '|' || c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            seen += 1;
            if token.eq_ignore_ascii_case(SEND_TOKEN) {
                action.send = true;
            } else if token.eq_ignore_ascii_case(QUEUE_TOKEN) {
                action.queue = true;
            } else if token.eq_ignore_ascii_case(DESTROY_TOKEN) {
                action.destroy = true;
            } else if token.eq_ignore_ascii_case(NOTIFY_SENDER_TOKEN) {
                action.notify_sender = true;
            } else {
                return Err(RuleError::UnknownActionToken {
                    token: token.to_string(),
                    input: tokens.to_string(),
                });
            }
        }

        if seen == 0 {
            return Err(RuleError::EmptyAction);
        }

        let dispositions = [action.send, action.queue, action.destroy]
            .iter()
            .filter(|f| **f)
            .count();
        if dispositions > 1 {
            return Err(RuleError::ConflictingActions {
                input: tokens.to_string(),
            });
        }

        Ok(action)
    }

    pub fn do_send(&self) -> bool {
        self.send
    }

    pub fn do_queue(&self) -> bool {
        self.queue
    }

    pub fn do_destroy(&self) -> bool {
        self.destroy
    }

    pub fn do_notify_sender(&self) -> bool {
        self.notify_sender
    }

    /// Plain pass-through: send and nothing else
    pub fn default_action_only(&self) -> bool {
        self.send && !self.notify_sender
    }

    /// Canonical token string, e.g. `"queue|notifySender"`
    pub fn to_token_string(&self) -> String {
        let mut tokens = Vec::with_capacity(2);
        if self.send {
            tokens.push(SEND_TOKEN);
        }
        if self.queue {
            tokens.push(QUEUE_TOKEN);
        }
        if self.destroy {
            tokens.push(DESTROY_TOKEN);
        }
        if self.notify_sender {
            tokens.push(NOTIFY_SENDER_TOKEN);
        }
        tokens.join("|")
    }
}

impl FromStr for DispatchAction {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DispatchAction::parse(s)
    }
}

impl fmt::Display for DispatchAction {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.to_token_string())
    }
}
