use tracing::info;

/// Outbound summaries back to the chat collaborator. The transport and the
/// presentation format live behind this seam; the core only hands over a
/// scope, its configured channel reference, and plain text.
pub trait Notifier: Send + Sync {
    fn notify(&self, guild_id: i64, channel_id: Option<i64>, message: &str);
}

/// Default sink: structured log lines. Useful standalone and as the fallback
/// when no chat transport is wired up.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, guild_id: i64, channel_id: Option<i64>, message: &str) {
        info!(guild_id, channel_id, "{message}");
    }
}

#[cfg(test)]
pub mod testing {
    use super::Notifier;
    use std::sync::Mutex;

    /// Captures messages for assertions.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub messages: Mutex<Vec<(i64, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, guild_id: i64, _channel_id: Option<i64>, message: &str) {
            self.messages.lock().unwrap().push((guild_id, message.to_string()));
        }
    }
}
