//! Formatting layers for console and file output

use tracing::Subscriber;
use tracing_subscriber::fmt::{
    self, MakeWriter,
    format::{DefaultFields, Format, Json, JsonFields},
};
use tracing_subscriber::registry::LookupSpan;

use crate::config::JsonlConfig;

/// Create a JSONL formatting layer
///
/// Used for both JSONL console output and log files, so the two carry the
/// same fields.
pub fn jsonl_layer<S, W>(writer: W, config: &JsonlConfig) -> fmt::Layer<S, JsonFields, Format<Json>, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fmt::layer()
        .json()
        .with_writer(writer)
        .with_current_span(config.include_current_span)
        .with_span_list(config.include_spans)
        .flatten_event(config.flatten_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_info)
        .with_thread_names(config.include_thread_info)
}

/// Create a human-readable layer
pub fn pretty_layer<S, W>(writer: W, ansi: bool) -> fmt::Layer<S, DefaultFields, Format, W>
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::{Registry, layer::SubscriberExt};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    #[test]
    fn test_jsonl_layer_flattens_fields_and_records_span() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = Registry::default()
            .with(jsonl_layer(move || writer.clone(), &JsonlConfig::default()));

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("sync_client", client = "den");
            let _entered = span.enter();
            tracing::info!(save_id = 3u64, "Push saved");
        });

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "Push saved");
        assert_eq!(lines[0]["save_id"], 3);
        assert_eq!(lines[0]["span"]["client"], "den");
    }

    #[test]
    fn test_jsonl_layer_without_location() {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let config = JsonlConfig {
            include_location: false,
            ..JsonlConfig::default()
        };
        let subscriber = Registry::default().with(jsonl_layer(move || writer.clone(), &config));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("Store subscription ended");
        });

        let lines = buffer.lines();
        assert!(lines[0].get("filename").is_none());
        assert_eq!(lines[0]["level"], "WARN");
    }
}
