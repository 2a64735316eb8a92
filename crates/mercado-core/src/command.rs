//! Commands accepted by the bounded contexts.
//!
//! Every command carries the correlation ID its events inherit. Command
//! handlers put all three trait values on their tracing span, so a request can be
//! followed from the HTTP layer through the outbox into the consumers.

use uuid::Uuid;

/// A request to change one aggregate.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Stable dotted name, `<context>.<verb>`.
    fn command_type(&self) -> &'static str;

    /// Correlation ID copied into the metadata of every resulting event.
    fn correlation_id(&self) -> Uuid;

    /// The context half of [`command_type`](Self::command_type).
    fn context(&self) -> &'static str {
        let command_type = self.command_type();
        command_type
            .split_once('.')
            .map_or(command_type, |(context, _)| context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping(Uuid);

    impl Command for Ping {
        fn command_type(&self) -> &'static str {
            "health.ping"
        }

        fn correlation_id(&self) -> Uuid {
            self.0
        }
    }

    #[test]
    fn test_context_is_the_prefix_of_the_command_type() {
        let command = Ping(Uuid::nil());

        assert_eq!(command.context(), "health");
        assert_eq!(command.correlation_id(), Uuid::nil());
    }
}
