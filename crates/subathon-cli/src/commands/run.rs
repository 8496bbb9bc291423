use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use serde_json::Value;
use subathon_core::storage::{Config, SnapshotStore, SqliteStore};
use subathon_core::widget::{Frame, HostMessage, RenderSink, Widget, WidgetDriver};
use subathon_core::Feedback;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Args)]
pub struct RunArgs {
    /// Ignore config.toml and wait for a widget-load line on stdin
    /// (falls back to defaults after the bootstrap grace period)
    #[arg(long)]
    pub wait_for_load: bool,
}

/// Prints a line whenever the displayed clock changes.
#[derive(Default)]
struct StdoutSink {
    last: Option<Frame>,
}

impl RenderSink for StdoutSink {
    fn render(&mut self, frame: &Frame) {
        if self.last.as_ref() == Some(frame) {
            return;
        }
        let paused = if frame.is_running { "" } else { " [paused]" };
        match &frame.label {
            Some(label) => println!("{label}: {}{paused}", frame.time),
            None => println!("{}{paused}", frame.time),
        }
        self.last = Some(frame.clone());
    }

    fn feedback(&mut self, feedback: &Feedback) {
        println!("> {}", feedback.text);
    }
}

/// Map one stdin line to a host message.
///
/// `{"listener":"widget-load","fieldData":{...}}` loads configuration; any
/// other JSON object is an inbound event envelope.
fn host_message(line: &str) -> Option<HostMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("skipping line that is not JSON: {e}");
            return None;
        }
    };
    match value.get("listener").and_then(Value::as_str) {
        Some("widget-load" | "onWidgetLoad") => {
            let fields = value
                .get("fieldData")
                .or_else(|| value.pointer("/detail/fieldData"))
                .cloned()
                .unwrap_or(Value::Null);
            Some(HostMessage::Load(Config::from_field_data(&fields)))
        }
        _ => Some(HostMessage::Event(value)),
    }
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(serve(args));
    // A pending stdin read would otherwise hold shutdown open.
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}

async fn serve(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default();
    let store: Arc<dyn SnapshotStore> = Arc::new(SqliteStore::open()?);

    let mut driver = WidgetDriver::new();
    let tx = driver
        .start(
            Widget::new(store, StdoutSink::default()),
            config.runtime.bootstrap_grace(),
        )
        .await;
    if !args.wait_for_load {
        tx.send(HostMessage::Load(config)).await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Some(msg) = host_message(&line) {
                        if tx.send(msg).await.is_err() {
                            break;
                        }
                    }
                }
                None => break,
            },
            _ = &mut ctrl_c => {
                tracing::info!("interrupted, shutting down");
                break;
            }
        }
    }

    // The loop may already be gone if it failed; nothing left to flush then.
    let _ = tx.send(HostMessage::Shutdown).await;
    driver.join().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_line_reads_field_data() {
        let msg = host_message(r#"{"listener":"widget-load","fieldData":{"startSeconds":42}}"#);
        match msg {
            Some(HostMessage::Load(config)) => assert_eq!(config.timer.start_seconds, 42),
            other => panic!("Expected Load, got {other:?}"),
        }
    }

    #[test]
    fn other_json_is_an_event() {
        let msg = host_message(r#"{"listener":"tip-latest","event":{"type":"tip","amount":5}}"#);
        assert!(matches!(msg, Some(HostMessage::Event(_))));
    }

    #[test]
    fn blank_and_invalid_lines_are_skipped() {
        assert!(host_message("   ").is_none());
        assert!(host_message("!addtime 5m").is_none());
    }

    #[test]
    fn sink_prints_only_changes() {
        let mut sink = StdoutSink::default();
        let frame = Frame {
            label: None,
            time: "0:00:05".into(),
            is_running: true,
        };
        sink.render(&frame);
        sink.render(&frame);
        assert_eq!(sink.last.as_ref(), Some(&frame));
    }
}
