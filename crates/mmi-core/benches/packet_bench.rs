//! Criterion benchmarks for the MMI packet codec.
//!
//! Measures encode and decode latency of the messages on the event hot path:
//! dispatched pointer and key events, monitor reports, and acknowledgements.
//!
//! Run with:
//! ```bash
//! cargo bench --package mmi-core --bench packet_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mmi_core::domain::{AnrEventType, AxisType, HandlerType, KeyItem, ToolType};
use mmi_core::{
    decode_message, encode_message, KeyAction, KeyEvent, MmiMessage, NetPacket, PointerAction,
    PointerEvent, PointerItem, SourceType,
};

// ── Message fixtures ──────────────────────────────────────────────────────────

fn make_touch(contacts: i32) -> PointerEvent {
    let mut event = PointerEvent::new(SourceType::TouchScreen);
    event.id = 1;
    event.pointer_action = PointerAction::Move;
    event.pointer_id = 0;
    for id in 0..contacts {
        let mut item = PointerItem::new(id);
        item.pressed = true;
        item.display_x = 100 * id;
        item.display_y = 400;
        item.pressure = 0.7;
        item.tool_type = ToolType::Finger;
        event.add_pointer_item(item);
    }
    event
}

fn make_mouse_axis() -> PointerEvent {
    let mut event = PointerEvent::new(SourceType::Mouse);
    event.pointer_action = PointerAction::AxisUpdate;
    event.pointer_id = 0;
    event.set_axis_value(AxisType::ScrollVertical, 15.0);
    event.add_pointer_item(PointerItem::new(0));
    event
}

fn make_key() -> KeyEvent {
    let mut event = KeyEvent::new();
    event.key_code = 2017;
    event.key_action = KeyAction::Down;
    event.update_key_item(KeyItem {
        key_code: 2017,
        down_time: 1,
        pressed: true,
        device_id: 1,
    });
    event
}

fn hot_path_messages() -> Vec<(&'static str, MmiMessage)> {
    vec![
        ("OnPointerEvent(1)", MmiMessage::OnPointerEvent(make_touch(1))),
        ("OnPointerEvent(5)", MmiMessage::OnPointerEvent(make_touch(5))),
        ("OnPointerEvent(axis)", MmiMessage::OnPointerEvent(make_mouse_axis())),
        (
            "ReportPointerEvent",
            MmiMessage::ReportPointerEvent {
                handler_type: HandlerType::Monitor,
                event: make_touch(2),
            },
        ),
        ("OnKeyEvent", MmiMessage::OnKeyEvent(make_key())),
        (
            "MarkProcessed",
            MmiMessage::MarkProcessed {
                anr_type: AnrEventType::Dispatch,
                event_id: 1,
            },
        ),
    ]
}

// ── Benchmark groups ──────────────────────────────────────────────────────────

/// Benchmarks building the full frame for each message.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_message");
    for (name, msg) in hot_path_messages() {
        group.bench_with_input(BenchmarkId::new("msg", name), &msg, |b, msg| {
            b.iter(|| {
                encode_message(black_box(msg))
                    .make_data()
                    .expect("encode must succeed")
            })
        });
    }
    group.finish();
}

/// Benchmarks parsing a pre-built frame back into a typed message.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_message");
    for (name, msg) in hot_path_messages() {
        let frame = encode_message(&msg)
            .make_data()
            .expect("encode must succeed for benchmark setup");
        group.bench_with_input(BenchmarkId::new("msg", name), &frame, |b, frame| {
            b.iter(|| {
                let (pkt, _) = NetPacket::decode_frame(black_box(frame)).expect("frame");
                decode_message(pkt).expect("decode must succeed")
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
