//! Service wiring.
//!
//! [`ServerContext`] builds every registry and handler once, from the
//! configuration, and connects them.  Nothing in the service is a global:
//! components receive what they need through their constructors, and the
//! binary owns the one context.
//!
//! ```text
//! input source ─► EventNormalizeHandler ─► InputPipeline ─► DispatchHandler
//!                                              │                 │
//!                           Interceptor/Monitor/KeySubscriber    │
//!                                              └────► UdsServer ◄┘
//! clients ─► UdsServer ─► ServerMsgHandler ─► registries / pipeline
//! ```
//!
//! Device arrival and removal also go from `EventNormalizeHandler` to the
//! `StandardizedRegistry`, which notifies the registered windows.

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::application::anr::{AnrManager, LoggingAnrObserver};
use crate::application::devices::{DeviceRegistry, DisplayState};
use crate::application::dispatch::DispatchHandler;
use crate::application::interceptor::InterceptorRegistry;
use crate::application::key_subscriber::KeySubscriberRegistry;
use crate::application::monitor::MonitorRegistry;
use crate::application::msg_handler::ServerMsgHandler;
use crate::application::normalize::{run_reader, EventNormalizeHandler};
use crate::application::pipeline::InputPipeline;
use crate::application::session::{PacketHandler, SessionLostListener, SessionTransmitter};
use crate::application::standardized::StandardizedRegistry;
use crate::infrastructure::input_source::RawInputEvent;
use crate::infrastructure::plugin::load_knuckle_classifier;
use crate::infrastructure::render::{LoggingRenderNotifier, RenderNotifier};
use crate::infrastructure::storage::config::ServerConfig;
use crate::infrastructure::transport::UdsServer;
use crate::transform::KnuckleClassifier;

pub struct ServerContext {
    pub config: ServerConfig,
    pub transport: Arc<UdsServer>,
    pub anr: Arc<AnrManager>,
    pub displays: Arc<DisplayState>,
    pub devices: Arc<DeviceRegistry>,
    pub interceptors: Arc<InterceptorRegistry>,
    pub monitors: Arc<MonitorRegistry>,
    pub key_subscribers: Arc<KeySubscriberRegistry>,
    pub pipeline: Arc<InputPipeline>,
    pub standardized: Arc<StandardizedRegistry>,
    pub msg_handler: Arc<ServerMsgHandler>,
    pub knuckle: Arc<dyn KnuckleClassifier>,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_render(config, Arc::new(LoggingRenderNotifier))
    }

    pub fn with_render(config: ServerConfig, render: Arc<dyn RenderNotifier>) -> Self {
        let transport = UdsServer::new(config.transport.clone());
        let tx: Arc<dyn SessionTransmitter> = Arc::clone(&transport) as Arc<dyn SessionTransmitter>;

        let anr = Arc::new(AnrManager::new(
            Duration::from_millis(config.anr.ui_timeout_ms),
            Arc::new(LoggingAnrObserver),
        ));
        let displays = Arc::new(DisplayState::default());
        let devices = Arc::new(DeviceRegistry::new());
        let interceptors = Arc::new(InterceptorRegistry::new(
            config.handlers.max_interceptors,
            Arc::clone(&tx),
        ));
        let monitors = Arc::new(MonitorRegistry::new(
            config.handlers.max_monitors,
            Arc::clone(&tx),
            Arc::clone(&anr),
        ));
        let key_subscribers = Arc::new(KeySubscriberRegistry::new(Arc::clone(&tx)));
        let standardized = Arc::new(StandardizedRegistry::new(Arc::clone(&tx)));
        let dispatch = Arc::new(DispatchHandler::new(Arc::clone(&tx), Arc::clone(&anr), render));
        let pipeline = Arc::new(InputPipeline::new(
            Arc::clone(&displays),
            Arc::clone(&devices),
            Arc::clone(&interceptors),
            Arc::clone(&monitors),
            Arc::clone(&key_subscribers),
            dispatch,
        ));
        let msg_handler = Arc::new(ServerMsgHandler::new(
            Arc::clone(&tx),
            Arc::clone(&interceptors),
            Arc::clone(&monitors),
            Arc::clone(&key_subscribers),
            Arc::clone(&anr),
            Arc::clone(&displays),
            Arc::clone(&pipeline),
            Arc::clone(&standardized),
        ));

        transport.set_packet_handler(Arc::clone(&msg_handler) as Arc<dyn PacketHandler>);
        let listeners: [Arc<dyn SessionLostListener>; 5] = [
            Arc::clone(&interceptors) as Arc<dyn SessionLostListener>,
            Arc::clone(&monitors) as Arc<dyn SessionLostListener>,
            Arc::clone(&key_subscribers) as Arc<dyn SessionLostListener>,
            Arc::clone(&anr) as Arc<dyn SessionLostListener>,
            Arc::clone(&standardized) as Arc<dyn SessionLostListener>,
        ];
        for listener in listeners {
            transport.add_session_lost_listener(listener);
        }

        let knuckle = load_knuckle_classifier(config.plugin.knuckle_classifier.as_deref());

        Self {
            config,
            transport,
            anr,
            displays,
            devices,
            interceptors,
            monitors,
            key_subscribers,
            pipeline,
            standardized,
            msg_handler,
            knuckle,
        }
    }

    /// A normalization handler feeding this context's pipeline.
    pub fn normalize_handler(&self) -> EventNormalizeHandler {
        EventNormalizeHandler::new(
            self.config.pointer.to_settings(),
            Arc::clone(&self.knuckle),
            Arc::clone(&self.displays),
            Arc::clone(&self.devices),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.standardized),
        )
    }

    /// Starts the input-reader thread draining `rx`.
    pub fn spawn_reader(&self, rx: Receiver<RawInputEvent>) -> std::io::Result<JoinHandle<()>> {
        let handler = self.normalize_handler();
        std::thread::Builder::new()
            .name("mmi-input-reader".to_string())
            .spawn(move || run_reader(handler, rx))
    }
}
