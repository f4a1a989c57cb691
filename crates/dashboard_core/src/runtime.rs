//! The dashboard session: one task that owns the view-model and serializes
//! transport messages, timer ticks and commands, rendering after each.

use std::{future::Future, sync::Arc, time::Duration};

use shared::{
    domain::RecipeStep,
    protocol::{
        AlertLevel, ChannelMessage, FileListing, LogMessage, SystemAlert, LOG_MESSAGE,
        MATERIAL_CHANGE_LOG, PRINTER_FILES_RESPONSE, STATUS_UPDATE, SYSTEM_ALERT, SYSTEM_STATUS,
    },
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    api::ControllerApi,
    clock::{Clock, SystemClock},
    config::Settings,
    error::{ClientError, ConfigError},
    files::FileRequests,
    normalizer::{self, Outcome},
    render::{self, DashboardView, UiSink},
    store::ViewModelStore,
    timer::{Scheduler, TimerKind, TokioScheduler},
    transport::{ChannelConnector, ConnectionState, Endpoints, Transport, TransportEvent},
};

const COMMAND_CAPACITY: usize = 32;
const TRANSPORT_CAPACITY: usize = 256;
const MATERIAL_CHANGE_COMPONENT: &str = "MATERIAL_CHANGE";

#[derive(Debug)]
pub enum Command {
    /// Forward an event to the controller over the channel.
    Emit(ChannelMessage),
    RequestFiles {
        reply: oneshot::Sender<Result<FileListing, ClientError>>,
    },
    RestartController,
    RefreshRecipe,
    Shutdown,
}

/// Results of work spawned off the loop, fed back in as messages.
enum Internal {
    Recipe(Vec<RecipeStep>),
    Notice(AlertLevel, String),
    RequestFailed(&'static str, ClientError),
    TaskCrashed(&'static str, String),
}

#[derive(Clone)]
pub struct DashboardHandle {
    commands: mpsc::Sender<Command>,
    views: watch::Receiver<DashboardView>,
}

impl DashboardHandle {
    pub fn views(&self) -> watch::Receiver<DashboardView> {
        self.views.clone()
    }

    pub async fn emit(&self, message: ChannelMessage) -> Result<(), ClientError> {
        self.send(Command::Emit(message)).await
    }

    /// Asks for the printer file listing over the channel and waits for the
    /// correlated reply.
    pub async fn request_files(&self) -> Result<FileListing, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RequestFiles { reply }).await?;
        rx.await
            .map_err(|_| ClientError::Channel("dashboard stopped".into()))?
    }

    pub async fn restart_controller(&self) -> Result<(), ClientError> {
        self.send(Command::RestartController).await
    }

    pub async fn refresh_recipe(&self) -> Result<(), ClientError> {
        self.send(Command::RefreshRecipe).await
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Channel("dashboard stopped".into()))
    }
}

/// Everything a [`Dashboard`] is wired to. Tests substitute channels and
/// clocks; [`Dashboard::connect`] builds the real ones.
pub struct Wiring {
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn Scheduler>,
    pub ticks: mpsc::UnboundedReceiver<TimerKind>,
    pub transport_events: mpsc::Receiver<TransportEvent>,
    pub outbound: mpsc::Sender<ChannelMessage>,
    pub api: Option<ControllerApi>,
    pub file_timeout: Duration,
    pub debug_mode: bool,
}

pub struct Dashboard<S: UiSink> {
    store: ViewModelStore,
    sink: S,
    api: Option<ControllerApi>,
    files: FileRequests,
    file_timeout: Duration,
    debug_mode: bool,
    ticks: mpsc::UnboundedReceiver<TimerKind>,
    transport_events: mpsc::Receiver<TransportEvent>,
    outbound: mpsc::Sender<ChannelMessage>,
    commands: mpsc::Receiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    views: watch::Sender<DashboardView>,
    transport_task: Option<JoinHandle<()>>,
}

impl<S: UiSink> Dashboard<S> {
    pub fn new(sink: S, wiring: Wiring) -> (Self, DashboardHandle) {
        let store = ViewModelStore::new(wiring.clock, wiring.scheduler);
        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (views, views_rx) = watch::channel(render::project(store.state()));
        let dashboard = Self {
            store,
            sink,
            api: wiring.api,
            files: FileRequests::new(),
            file_timeout: wiring.file_timeout,
            debug_mode: wiring.debug_mode,
            ticks: wiring.ticks,
            transport_events: wiring.transport_events,
            outbound: wiring.outbound,
            commands,
            internal_tx,
            internal_rx,
            views,
            transport_task: None,
        };
        let handle = DashboardHandle {
            commands: commands_tx,
            views: views_rx,
        };
        (dashboard, handle)
    }

    /// Builds the REST client, the reconnecting transport and the tokio timer
    /// scheduler from `settings`, and starts the transport.
    pub fn connect(sink: S, settings: &Settings) -> Result<(Self, DashboardHandle), ConfigError> {
        let server_url = settings.server_url()?;
        let http = reqwest::Client::new();
        let endpoints = Endpoints::from_server(&server_url, &settings.channel_path).map_err(|err| {
            ConfigError::ServerUrl {
                value: settings.server_url.clone(),
                reason: err.to_string(),
            }
        })?;
        let connector = ChannelConnector::new(http.clone(), endpoints, settings.poll_interval());

        let (events_tx, transport_events) = mpsc::channel(TRANSPORT_CAPACITY);
        let (outbound, outbound_rx) = mpsc::channel(COMMAND_CAPACITY);
        let transport = Transport::new(
            Arc::new(connector),
            settings.reconnect_policy(),
            events_tx,
            outbound_rx,
        );
        let (scheduler, ticks) = TokioScheduler::new();

        let wiring = Wiring {
            clock: Arc::new(SystemClock),
            scheduler: Arc::new(scheduler),
            ticks,
            transport_events,
            outbound,
            api: Some(ControllerApi::new(http, &server_url)),
            file_timeout: settings.file_request_timeout(),
            debug_mode: settings.debug_mode,
        };
        let (mut dashboard, handle) = Self::new(sink, wiring);
        dashboard.transport_task = Some(transport.spawn());
        info!(server_url = %server_url, "dashboard: started");
        Ok((dashboard, handle))
    }

    pub fn store(&self) -> &ViewModelStore {
        &self.store
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs until shutdown is requested or every handle is dropped, then
    /// hands back the sink. Inbound events already queued are applied before
    /// the next command.
    pub async fn run(mut self) -> S {
        self.render();
        loop {
            tokio::select! {
                biased;
                Some(event) = self.transport_events.recv() => self.on_transport(event),
                Some(kind) = self.ticks.recv() => self.store.tick(kind),
                Some(internal) = self.internal_rx.recv() => self.on_internal(internal),
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
            }
            self.render();
        }
        if let Some(task) = self.transport_task.take() {
            task.abort();
        }
        info!("dashboard: stopped");
        self.sink
    }

    fn render(&mut self) {
        let view = render::project(self.store.state());
        render::render(&view, &mut self.sink);
        self.views.send_replace(view);
    }

    fn notify(&mut self, level: AlertLevel, message: impl Into<String>) {
        let notice = self.store.push_notice(level, message);
        self.sink.notify(&notice);
    }

    pub(crate) fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::State(link) => {
                let was_connected = self.store.state().link.state == ConnectionState::Connected;
                self.store.set_link(link);
                if link.state == ConnectionState::Connected && !was_connected {
                    self.fetch_recipe();
                }
            }
            TransportEvent::Message(message) => self.on_message(message),
        }
    }

    fn on_message(&mut self, message: ChannelMessage) {
        match message.event.as_str() {
            STATUS_UPDATE => {
                if let Outcome::Ignored = normalizer::apply_status_update(&mut self.store, &message.data)
                {
                    debug!("dashboard: status update ignored");
                }
            }
            SYSTEM_STATUS => normalizer::apply_system_status(&mut self.store, &message.data),
            SYSTEM_ALERT => match serde_json::from_value::<SystemAlert>(message.data) {
                Ok(alert) => self.notify(alert.level, alert.message),
                Err(err) => debug!(error = %err, "dashboard: malformed system alert"),
            },
            LOG_MESSAGE => match serde_json::from_value::<LogMessage>(message.data) {
                Ok(line) => self.store.push_log(line),
                Err(err) => debug!(error = %err, "dashboard: malformed log message"),
            },
            MATERIAL_CHANGE_LOG => match serde_json::from_value::<LogMessage>(message.data) {
                Ok(line) => self.store.push_log(material_change_line(line)),
                Err(err) => debug!(error = %err, "dashboard: malformed material change log"),
            },
            PRINTER_FILES_RESPONSE => {
                self.files.handle_response(&message.data);
            }
            other => debug!(event = other, "dashboard: ignoring event"),
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Emit(message) => self.emit(message),
            Command::RequestFiles { reply } => {
                let pending = self.files.register();
                if let Err(err) = self.outbound.try_send(pending.request_message()) {
                    self.files.forget(&pending.request_id);
                    let _ = reply.send(Err(ClientError::Channel(err.to_string())));
                    return;
                }
                let files = self.files.clone();
                let timeout = self.file_timeout;
                tokio::spawn(async move {
                    let _ = reply.send(files.wait(pending, timeout).await);
                });
            }
            Command::RestartController => {
                let Some(api) = self.api.clone() else {
                    self.notify(AlertLevel::Warning, "controller API not configured");
                    return;
                };
                self.spawn_request("restart controller", async move {
                    let reply = api.restart_controller().await?;
                    Ok(Internal::Notice(
                        AlertLevel::Success,
                        reply
                            .message
                            .unwrap_or_else(|| "Controller restart requested".to_string()),
                    ))
                });
            }
            Command::RefreshRecipe => self.fetch_recipe(),
            Command::Shutdown => {}
        }
    }

    fn on_internal(&mut self, internal: Internal) {
        match internal {
            Internal::Recipe(steps) => {
                debug!(steps = steps.len(), "dashboard: recipe loaded");
                self.store.set_recipe(steps);
            }
            Internal::Notice(level, message) => self.notify(level, message),
            Internal::RequestFailed(what, err) => {
                warn!(task = what, error = %err, "dashboard: request failed");
                self.notify(AlertLevel::Danger, format!("{what}: {}", err.user_message()));
            }
            Internal::TaskCrashed(what, message) => {
                error!(task = what, %message, "dashboard: background task failed");
                if self.debug_mode {
                    self.notify(AlertLevel::Danger, format!("[debug] {what} failed: {message}"));
                }
            }
        }
    }

    fn emit(&mut self, message: ChannelMessage) {
        if let Err(err) = self.outbound.try_send(message) {
            warn!(error = %err, "dashboard: outbound event dropped");
        }
    }

    fn fetch_recipe(&mut self) {
        let Some(api) = self.api.clone() else {
            return;
        };
        self.spawn_request("load recipe", async move { Ok(Internal::Recipe(api.recipe().await?)) });
    }

    /// Spawns `work` and reports its outcome back into the loop. A panic in
    /// the task is caught here and reported as a crash.
    fn spawn_request<F>(&self, what: &'static str, work: F)
    where
        F: Future<Output = Result<Internal, ClientError>> + Send + 'static,
    {
        let internal = self.internal_tx.clone();
        let task = tokio::spawn(work);
        tokio::spawn(async move {
            let message = match task.await {
                Ok(Ok(message)) => message,
                Ok(Err(err)) => Internal::RequestFailed(what, err),
                Err(join_err) => Internal::TaskCrashed(what, join_err.to_string()),
            };
            let _ = internal.send(message);
        });
    }
}

/// Sequence output arrives as a bare `{message}`; tag it so the log tail shows
/// where it came from.
fn material_change_line(mut line: LogMessage) -> LogMessage {
    if line.level.is_empty() {
        line.level = "INFO".to_string();
    }
    line.component.get_or_insert_with(|| MATERIAL_CHANGE_COMPONENT.to_string());
    line
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
