// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::event::{EventPayload, LifecycleEvent};
use chrono::Utc;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// 单个任务的事件出口
///
/// 为事件打上数据源和任务标识并分配递增序号。发送不会阻塞，
/// 接收端关闭后事件被丢弃，任务照常运行。
pub struct EventSink {
    source_id: String,
    job_id: Uuid,
    sequence: u64,
    sender: UnboundedSender<LifecycleEvent>,
}

impl EventSink {
    pub fn new(
        source_id: impl Into<String>,
        job_id: Uuid,
        sender: UnboundedSender<LifecycleEvent>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            job_id,
            sequence: 0,
            sender,
        }
    }

    pub fn emit(&mut self, payload: EventPayload) {
        let event = LifecycleEvent {
            source_id: self.source_id.clone(),
            job_id: self.job_id,
            sequence: self.sequence,
            emitted_at: Utc::now(),
            payload,
        };
        self.sequence += 1;
        if self.sender.send(event).is_err() {
            tracing::trace!(job_id = %self.job_id, "Event receiver dropped");
        }
    }

    /// 已发出的事件数
    pub fn emitted(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::event::EventKind;
    use tokio::sync::mpsc;

    #[test]
    fn test_sequence_increments_and_tags() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let job_id = Uuid::new_v4();
        let mut sink = EventSink::new("ke", job_id, tx);

        sink.emit(EventPayload::Blocked {
            url: "https://www.ke.com/captcha".to_string(),
        });
        sink.emit(EventPayload::Blocked {
            url: "https://www.ke.com/captcha".to_string(),
        });

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.sequence, 0);
        assert_eq!(second.sequence, 1);
        assert_eq!(first.source_id, "ke");
        assert_eq!(first.job_id, job_id);
        assert_eq!(first.kind(), EventKind::Blocked);
        assert_eq!(sink.emitted(), 2);
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut sink = EventSink::new("ali", Uuid::new_v4(), tx);
        sink.emit(EventPayload::Blocked {
            url: "https://safe.ali.com/".to_string(),
        });
        assert_eq!(sink.emitted(), 1);
    }
}
