use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use adapter::{
    ApsDataConfirm, ApsDataIndication, ApsDataRequest, Connector, Destination, DeviceState,
    Platform, Request, Response, SerialConnector, ShortAddress, Version,
};
use futures::Stream;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::config::Config;
use crate::engine::{Command, Engine, Event};
use crate::network::NetworkConfiguration;
use crate::node::{Node, NodeStore};
use crate::zdo::{self, MgmtLqiRequest, MgmtPermitJoiningRequest, Neighbor};
use crate::{Error, ErrorKind, Result};

const BROADCAST_ROUTERS: ShortAddress = 0xFFFC;

/// Handle to a running coordinator. Cheap to clone; the engine stops once every handle is gone.
#[derive(Clone)]
pub struct Coordinator {
    commands: mpsc::Sender<Command>,
    configuration: watch::Receiver<Option<NetworkConfiguration>>,
}

impl Coordinator {
    /// Opens the serial adapter named in `config` and starts the engine.
    pub fn open(config: Config, store: Box<dyn NodeStore>) -> (Self, Events) {
        let connector = SerialConnector::new(config.serial.path.clone()).baud(config.serial.baud);
        Self::spawn(config, connector, store)
    }

    /// Starts the engine on a task of its own, talking to whatever `connector` opens.
    pub fn spawn<C>(config: Config, connector: C, store: Box<dyn NodeStore>) -> (Self, Events)
    where
        C: Connector,
    {
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (configuration_tx, configuration_rx) = watch::channel(None);

        let task = Task {
            engine: Engine::new(&config, store),
            connector,
            commands: commands_rx,
            events: events_tx,
            configuration: configuration_tx,
            reconnect_delay: config.policy.reconnect_delay(),
        };
        tokio::spawn(task.run());

        let coordinator = Self {
            commands: commands_tx,
            configuration: configuration_rx,
        };
        (coordinator, Events { rx: events_rx })
    }

    async fn request<T, F>(&self, make: F) -> Result<T>
    where
        F: FnOnce(oneshot::Sender<Result<T>>) -> Command,
    {
        let (sender, receiver) = oneshot::channel();
        self.commands.send(make(sender)).await?;
        receiver.await?
    }

    /// Sends an APS frame, resolving once the adapter confirms delivery.
    pub async fn send_aps_data(&self, request: ApsDataRequest) -> Result<ApsDataConfirm> {
        self.request(|sender| Command::SendApsData { request, sender })
            .await
    }

    /// Sends a ZDO request and waits for the matching response.
    pub async fn zdo_request<R>(&self, destination: Destination, request: R) -> Result<R::Response>
    where
        R: zdo::Request,
    {
        // The engine fills in the transaction ID.
        let address_of_interest = request.address_of_interest();
        let aps_data_request = zdo::aps_request(destination, 0, &request)?;

        let indication: ApsDataIndication = self
            .request(|sender| Command::Zdo {
                request: aps_data_request,
                address_of_interest,
                sender,
            })
            .await?;

        zdo::parse_response(&indication)
    }

    /// Opens the network for `duration` (0 closes it), either everywhere or on a single router.
    pub async fn set_permit_joining(
        &self,
        duration: Duration,
        address: Option<ShortAddress>,
    ) -> Result<()> {
        // 0xFF would mean "forever".
        let permit_duration = u8::try_from(duration.as_secs()).unwrap_or(0xFE).min(0xFE);
        let request = MgmtPermitJoiningRequest {
            permit_duration,
            trust_center_significance: true,
        };
        info!("permit joining for {}s ({:?})", permit_duration, address);

        match address {
            Some(address) => {
                self.zdo_request(Destination::Nwk(address, zdo::ENDPOINT), request)
                    .await?;
            }
            None => {
                let destination = Destination::Nwk(BROADCAST_ROUTERS, zdo::ENDPOINT);
                self.send_aps_data(zdo::aps_request(destination, 0, &request)?)
                    .await?;
            }
        }
        Ok(())
    }

    /// Walks the neighbour table of `destination`.
    pub async fn get_neighbors(&self, destination: Destination) -> Result<Vec<Neighbor>> {
        let mut start_index = 0;
        let mut neighbors = Vec::new();

        loop {
            let response = self
                .zdo_request(destination, MgmtLqiRequest { start_index })
                .await?;
            let total = usize::from(response.neighbor_table_entries);
            let count = response.neighbor_table_list.len();

            neighbors.extend(response.neighbor_table_list);

            if neighbors.len() >= total || count == 0 {
                return Ok(neighbors);
            }

            start_index = start_index.wrapping_add(count as u8);
        }
    }

    pub async fn start_network(&self) -> Result<()> {
        self.request(Command::StartNetwork).await
    }

    pub async fn stop_network(&self) -> Result<()> {
        self.request(Command::StopNetwork).await
    }

    /// Reopens the adapter and brings the network up again.
    pub async fn reset_controller(&self) -> Result<()> {
        self.request(Command::ResetController).await
    }

    /// Forgets every node and the stored network, then commissions the adapter afresh.
    pub async fn factory_reset(&self) -> Result<()> {
        self.request(Command::FactoryReset).await
    }

    pub async fn version(&self) -> Result<(Version, Platform)> {
        match self.adapter_request(Request::Version).await? {
            Response::Version { version, platform } => Ok((version, platform)),
            response => Err(unexpected(&response)),
        }
    }

    pub async fn device_state(&self) -> Result<DeviceState> {
        match self.adapter_request(Request::DeviceState).await? {
            Response::DeviceState(device_state) => Ok(device_state),
            response => Err(unexpected(&response)),
        }
    }

    async fn adapter_request(&self, request: Request) -> Result<Response> {
        self.request(|sender| Command::Adapter { request, sender })
            .await
    }

    pub async fn nodes(&self) -> Result<Vec<Node>> {
        let (sender, receiver) = oneshot::channel();
        self.commands.send(Command::Nodes(sender)).await?;
        Ok(receiver.await?)
    }

    /// The running network, if any.
    pub fn configuration(&self) -> Option<NetworkConfiguration> {
        self.configuration.borrow().clone()
    }

    /// Resolves the next time the network configuration changes.
    pub async fn configuration_changed(&mut self) -> Result<Option<NetworkConfiguration>> {
        self.configuration
            .changed()
            .await
            .map_err(|_| ErrorKind::ChannelError)?;
        Ok(self.configuration.borrow().clone())
    }
}

fn unexpected(response: &Response) -> Error {
    adapter::Error::from(adapter::ErrorKind::UnexpectedResponse(response.command_id())).into()
}

/// Stream of `Event`s from the engine.
pub struct Events {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Events {
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

impl Stream for Events {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

enum Exit {
    Reconnect,
    Closed,
}

/// The single task that owns the engine and the adapter connection.
struct Task<C> {
    engine: Engine,
    connector: C,
    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<Event>,
    configuration: watch::Sender<Option<NetworkConfiguration>>,
    reconnect_delay: Duration,
}

impl<C> Task<C>
where
    C: Connector,
{
    async fn run(mut self) {
        loop {
            let exit = match self.connector.connect() {
                Ok(stream) => {
                    self.engine.transport_available(true, Instant::now());
                    let exit = self.drive(stream).await;
                    self.engine.transport_available(false, Instant::now());
                    self.publish();
                    exit
                }
                Err(error) => {
                    error!("connecting to adapter: {}", error);
                    Exit::Reconnect
                }
            };

            match exit {
                Exit::Closed => break,
                Exit::Reconnect => {
                    if let Exit::Closed = self.wait(self.reconnect_delay).await {
                        break;
                    }
                }
            }
        }

        info!("coordinator stopped");
    }

    async fn drive(&mut self, stream: C::Stream) -> Exit {
        let (mut reader, mut writer) = tokio::io::split(stream);
        let mut buffer = [0u8; 512];

        loop {
            while let Some(bytes) = self.engine.poll_transmit(Instant::now()) {
                if let Err(error) = writer.write_all(&bytes).await {
                    error!("writing to adapter: {}", error);
                    return Exit::Reconnect;
                }
            }
            self.publish();

            if self.engine.take_reconnect() {
                return Exit::Reconnect;
            }

            let deadline = self.engine.next_deadline();
            tokio::select! {
                read = reader.read(&mut buffer) => match read {
                    Ok(0) => {
                        warn!("adapter closed the connection");
                        return Exit::Reconnect;
                    }
                    Ok(n) => self.engine.handle_bytes(&buffer[..n], Instant::now()),
                    Err(error) => {
                        error!("reading from adapter: {}", error);
                        return Exit::Reconnect;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(command) => self.engine.handle_command(command, Instant::now()),
                    None => return Exit::Closed,
                },
                _ = sleep_until(deadline) => self.engine.handle_timers(Instant::now()),
            }
        }
    }

    /// Sits out the reconnect delay, failing any commands that arrive meanwhile.
    async fn wait(&mut self, delay: Duration) -> Exit {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Exit::Reconnect,
                command = self.commands.recv() => match command {
                    Some(command) => {
                        self.engine.handle_command(command, Instant::now());
                        self.publish();
                    }
                    None => return Exit::Closed,
                },
            }
        }
    }

    fn publish(&mut self) {
        while let Some(event) = self.engine.poll_event() {
            // Nobody listening is fine.
            let _ = self.events.send(event);
        }

        let current = self.engine.configuration().cloned();
        self.configuration.send_if_modified(|configuration| {
            if *configuration == current {
                return false;
            }
            *configuration = current;
            true
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => futures::future::pending().await,
    }
}
