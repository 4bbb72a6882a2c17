//! Client runtime against a scripted service on the other end of a socket
//! pair.

use std::os::unix::net::UnixStream as StdUnixStream;
use std::sync::Arc;
use std::time::Duration;

use mmi_client::application::handler_manager::InputEventConsumer;
use mmi_client::application::sender::ClientError;
use mmi_client::infrastructure::config::ClientConfig;
use mmi_client::ClientContext;
use mmi_core::domain::{AnrEventType, DeviceTags, EventTypeMask, HandlerType, KeyOption};
use mmi_core::protocol::StreamBuffer;
use mmi_core::{
    current_time_us, decode_message, encode_message, KeyCode, KeyEvent, MessageId, MmiMessage, PointerEvent,
    SourceType,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;

const STEP_TIMEOUT: Duration = Duration::from_secs(2);

/// The service side of the session.
struct ScriptedService {
    stream: UnixStream,
    buf: StreamBuffer,
}

impl ScriptedService {
    async fn recv(&mut self) -> MmiMessage {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(pkt) = self.buf.next_packet().expect("stream") {
                return decode_message(pkt).expect("decode");
            }
            let n = tokio::time::timeout(STEP_TIMEOUT, self.stream.read(&mut chunk))
                .await
                .expect("client went quiet")
                .expect("read");
            assert!(n > 0, "client closed");
            self.buf.extend(&chunk[..n]);
        }
    }

    async fn send(&mut self, msg: &MmiMessage) {
        let bytes = encode_message(msg).make_data().expect("frame");
        self.stream.write_all(&bytes).await.expect("write");
    }

    async fn reply(&mut self, request: MessageId, code: i32) {
        self.send(&MmiMessage::RequestResult { request, code }).await;
    }
}

fn session() -> (ClientContext, ScriptedService) {
    let (client, service) = StdUnixStream::pair().expect("pair");
    let ctx = ClientContext::attach(client, &ClientConfig::default()).expect("attach");
    service.set_nonblocking(true).expect("nonblocking");
    let service = ScriptedService {
        stream: UnixStream::from_std(service).expect("service end"),
        buf: StreamBuffer::new(),
    };
    (ctx, service)
}

/// Forwards pointer events to a channel.
struct ChannelConsumer(mpsc::UnboundedSender<PointerEvent>);

impl InputEventConsumer for ChannelConsumer {
    fn on_pointer_event(&self, event: &PointerEvent) {
        let _ = self.0.send(event.clone());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_monitor_receives_reports_and_acknowledges_them() {
    // Arrange
    let (ctx, mut service) = session();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = Arc::clone(&ctx.manager);
    let registration = tokio::spawn(async move {
        manager
            .handlers()
            .add_monitor(
                EventTypeMask(EventTypeMask::TOUCH),
                DeviceTags(DeviceTags::ALL),
                Arc::new(ChannelConsumer(tx)),
            )
            .await
    });
    match service.recv().await {
        MmiMessage::AddInputHandler(req) => {
            assert_eq!(req.handler_type, HandlerType::Monitor);
            assert_eq!(req.event_types, EventTypeMask(EventTypeMask::TOUCH));
        }
        other => panic!("expected AddInputHandler, got {other:?}"),
    }
    service.reply(MessageId::AddInputHandler, 0).await;
    registration.await.expect("join").expect("monitor");

    // Act: an event old enough that the acknowledgement is due at once.
    let mut event = PointerEvent::new(SourceType::TouchScreen);
    event.id = 77;
    event.action_time = current_time_us() - 10_000_000;
    service
        .send(&MmiMessage::ReportPointerEvent {
            handler_type: HandlerType::Monitor,
            event,
        })
        .await;

    // Assert
    let received = tokio::time::timeout(STEP_TIMEOUT, rx.recv())
        .await
        .expect("no report")
        .expect("channel");
    assert_eq!(received.id, 77);
    assert_eq!(
        service.recv().await,
        MmiMessage::MarkProcessed {
            anr_type: AnrEventType::Monitor,
            event_id: 77
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hot_key_subscription_delivers_callback() {
    // Arrange
    let (ctx, mut service) = session();
    let (tx, mut rx) = mpsc::unbounded_channel::<i32>();
    let option = KeyOption {
        pre_keys: [KeyCode::CtrlLeft.code()].into_iter().collect(),
        final_key: KeyCode::C.code(),
        final_key_down: true,
    };
    let manager = Arc::clone(&ctx.manager);
    let subscription = tokio::spawn(async move {
        manager
            .key_subscriptions()
            .subscribe(
                option,
                Arc::new(move |event: &KeyEvent| {
                    let _ = tx.send(event.id);
                }),
            )
            .await
    });
    let subscribe_id = match service.recv().await {
        MmiMessage::SubscribeKeyEvent { subscribe_id, option } => {
            assert_eq!(option.final_key, KeyCode::C.code());
            subscribe_id
        }
        other => panic!("expected SubscribeKeyEvent, got {other:?}"),
    };
    service.reply(MessageId::SubscribeKeyEvent, 0).await;
    assert_eq!(subscription.await.expect("join").expect("subscribe"), subscribe_id);

    // Act
    let mut event = KeyEvent::new();
    event.id = 5;
    service
        .send(&MmiMessage::OnSubscribeKeyEvent { subscribe_id, event })
        .await;

    // Assert
    let hit = tokio::time::timeout(STEP_TIMEOUT, rx.recv())
        .await
        .expect("no callback")
        .expect("channel");
    assert_eq!(hit, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_interceptor_is_not_kept() {
    // Arrange
    let (ctx, mut service) = session();
    let manager = Arc::clone(&ctx.manager);
    let registration = tokio::spawn(async move {
        manager
            .handlers()
            .add_interceptor(
                EventTypeMask(EventTypeMask::KEY),
                10,
                DeviceTags(DeviceTags::ALL),
                Arc::new(ChannelConsumer(mpsc::unbounded_channel().0)),
            )
            .await
    });

    // Act
    assert!(matches!(service.recv().await, MmiMessage::AddInputHandler(_)));
    service.reply(MessageId::AddInputHandler, -1).await;

    // Assert
    let result = registration.await.expect("join");
    assert!(matches!(
        result,
        Err(ClientError::Rejected {
            request: MessageId::AddInputHandler,
            code: -1
        })
    ));
    assert_eq!(ctx.manager.handlers().len(HandlerType::Interceptor), 0);
}
