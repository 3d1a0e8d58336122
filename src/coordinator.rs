//! Classifies inbound gateway messages into semantic per-endpoint events
// (c) 2026 OpenNetty contributors
//!
//! The Coordinator holds no mutable per-endpoint state: it is pure routing
//! from `(protocol, address)` to the registered endpoint name, and from a
//! decoded [`Message`] to one of the event kinds in spec.md §6. Consumers
//! that need last-known-state tracking keep their own cache.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, trace};

use crate::config::EndpointConfig;
use crate::protocol::message::{Command, Dimension};
use crate::protocol::{Address, Message, Protocol};
use crate::worker::GatewayWorker;

/// A semantic event derived from an inbound message, tagged with the
/// endpoint it was reported for. Names follow the taxonomy in spec.md §6.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// `SwitchStateReported`
    SwitchStateReported { endpoint: String, on: bool },
    /// `BrightnessReported`
    BrightnessReported { endpoint: String, level: u8 },
    /// `DimmingStepReported`. `step` is positive for a step up, negative for
    /// a step down.
    DimmingStepReported { endpoint: String, step: i8 },
    /// `OnOffScenarioReported`
    OnOffScenarioReported { endpoint: String, on: bool },
    /// `BasicScenarioReported`
    BasicScenarioReported { endpoint: String, scenario: u16 },
    /// `ToggleScenarioReported`
    ToggleScenarioReported { endpoint: String, scenario: u16 },
    /// `TimedScenarioReported`
    TimedScenarioReported { endpoint: String, scenario: u16 },
    /// `ProgressiveScenarioReported`
    ProgressiveScenarioReported { endpoint: String, scenario: u16 },
    /// `BatteryLevelReported`
    BatteryLevelReported { endpoint: String, values: Vec<String> },
    /// `PilotWireSetpointModeReported`
    PilotWireSetpointModeReported { endpoint: String, values: Vec<String> },
    /// `PilotWireDerogationModeReported`
    PilotWireDerogationModeReported { endpoint: String, values: Vec<String> },
    /// `SmartMeterIndexesReported`
    SmartMeterIndexesReported { endpoint: String, values: Vec<String> },
    /// `SmartMeterRateTypeReported`
    SmartMeterRateTypeReported { endpoint: String, values: Vec<String> },
    /// `SmartMeterPowerCutModeReported`
    SmartMeterPowerCutModeReported { endpoint: String, values: Vec<String> },
    /// `WaterHeaterStateReported`
    WaterHeaterStateReported { endpoint: String, values: Vec<String> },
    /// `WaterHeaterSetpointModeReported`
    WaterHeaterSetpointModeReported { endpoint: String, values: Vec<String> },
    /// `WirelessBurglarAlarmStateReported`
    WirelessBurglarAlarmStateReported { endpoint: String, values: Vec<String> },
}

/// Read-mostly `(protocol, address) -> endpoint name` index, built once at
/// construction and consulted on every inbound message.
struct EndpointIndex {
    by_address: HashMap<(Protocol, Address), String>,
}

impl EndpointIndex {
    fn build(endpoints: &[EndpointConfig]) -> Self {
        let by_address = endpoints
            .iter()
            .map(|e| ((e.address.protocol(), e.address), e.name.clone()))
            .collect();
        Self { by_address }
    }

    fn resolve(&self, protocol: Protocol, address: &Address) -> Option<&str> {
        self.by_address.get(&(protocol, *address)).map(String::as_str)
    }
}

/// Subscribes to every gateway's inbound stream and republishes classified
/// [`Event`]s on a single broadcast channel.
pub struct Coordinator {
    index: EndpointIndex,
    events: broadcast::Sender<Event>,
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator").field("endpoints", &self.index.by_address.len()).finish()
    }
}

/// Event channel depth: bounded per the same drop-oldest policy as gateway
/// publish channels.
const EVENT_CHANNEL_DEPTH: usize = 256;

impl Coordinator {
    /// Builds a coordinator over `endpoints` and spawns one subscription
    /// task per worker in `workers`.
    #[must_use]
    pub fn spawn(endpoints: &[EndpointConfig], workers: &[Arc<GatewayWorker>], cancel: CancellationToken) -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_DEPTH);
        let coordinator = Arc::new(Self { index: EndpointIndex::build(endpoints), events: events_tx.clone() });

        for worker in workers {
            let rx = worker.subscribe();
            let protocol = worker.endpoint().protocol;
            let coordinator = coordinator.clone();
            let events_tx = events_tx.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                coordinator.run_subscription(protocol, rx, events_tx, cancel).await;
            });
        }

        coordinator
    }

    #[instrument(skip(self, rx, events_tx, cancel), fields(protocol = %protocol))]
    async fn run_subscription(
        &self,
        protocol: Protocol,
        mut rx: broadcast::Receiver<Message>,
        events_tx: broadcast::Sender<Event>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                result = rx.recv() => {
                    match result {
                        Ok(message) => {
                            if let Some(event) = self.classify(protocol, &message) {
                                let _ = events_tx.send(event);
                            } else {
                                trace!("message did not resolve to a registered endpoint or known event kind");
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "coordinator subscription lagged, some events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    }
                }
            }
        }
    }

    fn classify(&self, protocol: Protocol, message: &Message) -> Option<Event> {
        let address = message.address()?;
        let endpoint = self.index.resolve(protocol, address)?.to_owned();

        match message {
            Message::BusCommand { command, .. } => match command {
                Command::LightingOn => Some(Event::SwitchStateReported { endpoint, on: true }),
                Command::LightingOff => Some(Event::SwitchStateReported { endpoint, on: false }),
                Command::DimTo(level) => Some(Event::BrightnessReported { endpoint, level: *level }),
                Command::DimStep(up) => {
                    Some(Event::DimmingStepReported { endpoint, step: if *up { 1 } else { -1 } })
                }
                Command::Scenario(n) => Some(Event::BasicScenarioReported { endpoint, scenario: *n }),
                Command::OnOffScenario(on) => Some(Event::OnOffScenarioReported { endpoint, on: *on }),
                Command::ToggleScenario(n) => Some(Event::ToggleScenarioReported { endpoint, scenario: *n }),
                Command::TimedScenario(n) => Some(Event::TimedScenarioReported { endpoint, scenario: *n }),
                Command::ProgressiveScenario(n) => {
                    Some(Event::ProgressiveScenarioReported { endpoint, scenario: *n })
                }
                Command::Raw(_) => None,
            },
            Message::DimensionRead { dimension, values, .. } => {
                Self::classify_dimension(endpoint, dimension, values.clone())
            }
            _ => None,
        }
    }

    fn classify_dimension(endpoint: String, dimension: &Dimension, values: Vec<String>) -> Option<Event> {
        match dimension {
            Dimension::Brightness => values.first().and_then(|v| v.parse::<u8>().ok()).map(|level| {
                Event::BrightnessReported { endpoint, level }
            }),
            Dimension::PilotWireSetpointMode => Some(Event::PilotWireSetpointModeReported { endpoint, values }),
            Dimension::PilotWireDerogationMode => Some(Event::PilotWireDerogationModeReported { endpoint, values }),
            Dimension::SmartMeterIndexes => Some(Event::SmartMeterIndexesReported { endpoint, values }),
            Dimension::SmartMeterRateType => Some(Event::SmartMeterRateTypeReported { endpoint, values }),
            Dimension::SmartMeterPowerCutMode => Some(Event::SmartMeterPowerCutModeReported { endpoint, values }),
            Dimension::WaterHeaterState => Some(Event::WaterHeaterStateReported { endpoint, values }),
            Dimension::WaterHeaterSetpointMode => Some(Event::WaterHeaterSetpointModeReported { endpoint, values }),
            Dimension::BatteryLevel => Some(Event::BatteryLevelReported { endpoint, values }),
            Dimension::BurglarAlarmState => Some(Event::WirelessBurglarAlarmStateReported { endpoint, values }),
            Dimension::PilotWireConfiguration | Dimension::Raw(_) => None,
        }
    }

    /// Subscribes to this coordinator's classified event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::address::ScsAddress;
    use std::collections::HashSet;

    fn endpoint(name: &str, addr: ScsAddress) -> EndpointConfig {
        EndpointConfig {
            name: name.to_owned(),
            gateway: "scs-main".to_owned(),
            address: Address::Scs(addr),
            capabilities: HashSet::new(),
        }
    }

    #[test]
    fn classifies_switch_on_for_registered_endpoint() {
        let endpoints = vec![endpoint("kitchen_light", ScsAddress::point_to_point(1, 3).unwrap())];
        let coordinator =
            Coordinator { index: EndpointIndex::build(&endpoints), events: broadcast::channel(4).0 };
        let msg = Message::BusCommand {
            protocol: Protocol::Scs,
            who: "1".to_owned(),
            command: Command::LightingOn,
            address: Address::Scs(ScsAddress::point_to_point(1, 3).unwrap()),
            medium: None,
            mode: None,
        };
        let event = coordinator.classify(Protocol::Scs, &msg).unwrap();
        assert_eq!(event, Event::SwitchStateReported { endpoint: "kitchen_light".to_owned(), on: true });
    }

    #[test]
    fn classifies_on_off_and_toggle_scenario_dispatches() {
        let endpoints = vec![endpoint("scene_point", ScsAddress::point_to_point(1, 9).unwrap())];
        let coordinator =
            Coordinator { index: EndpointIndex::build(&endpoints), events: broadcast::channel(4).0 };

        let on_off = Message::BusCommand {
            protocol: Protocol::Scs,
            who: "9".to_owned(),
            command: Command::OnOffScenario(true),
            address: Address::Scs(ScsAddress::point_to_point(1, 9).unwrap()),
            medium: None,
            mode: None,
        };
        assert_eq!(
            coordinator.classify(Protocol::Scs, &on_off).unwrap(),
            Event::OnOffScenarioReported { endpoint: "scene_point".to_owned(), on: true }
        );

        let toggle = Message::BusCommand {
            protocol: Protocol::Scs,
            who: "17".to_owned(),
            command: Command::ToggleScenario(7),
            address: Address::Scs(ScsAddress::point_to_point(1, 9).unwrap()),
            medium: None,
            mode: None,
        };
        assert_eq!(
            coordinator.classify(Protocol::Scs, &toggle).unwrap(),
            Event::ToggleScenarioReported { endpoint: "scene_point".to_owned(), scenario: 7 }
        );
    }

    #[test]
    fn classifies_dim_step_and_burglar_alarm_dimension() {
        let endpoints = vec![endpoint("hallway_dimmer", ScsAddress::point_to_point(2, 1).unwrap())];
        let coordinator =
            Coordinator { index: EndpointIndex::build(&endpoints), events: broadcast::channel(4).0 };

        let step = Message::BusCommand {
            protocol: Protocol::Scs,
            who: "1".to_owned(),
            command: Command::DimStep(false),
            address: Address::Scs(ScsAddress::point_to_point(2, 1).unwrap()),
            medium: None,
            mode: None,
        };
        assert_eq!(
            coordinator.classify(Protocol::Scs, &step).unwrap(),
            Event::DimmingStepReported { endpoint: "hallway_dimmer".to_owned(), step: -1 }
        );

        let alarm = Message::DimensionRead {
            protocol: Protocol::Scs,
            who: "5".to_owned(),
            address: Address::Scs(ScsAddress::point_to_point(2, 1).unwrap()),
            dimension: Dimension::BurglarAlarmState,
            values: vec!["1".to_owned()],
        };
        assert_eq!(
            coordinator.classify(Protocol::Scs, &alarm).unwrap(),
            Event::WirelessBurglarAlarmStateReported {
                endpoint: "hallway_dimmer".to_owned(),
                values: vec!["1".to_owned()]
            }
        );
    }

    #[test]
    fn unregistered_address_yields_no_event() {
        let coordinator = Coordinator { index: EndpointIndex::build(&[]), events: broadcast::channel(4).0 };
        let msg = Message::BusCommand {
            protocol: Protocol::Scs,
            who: "1".to_owned(),
            command: Command::LightingOn,
            address: Address::Scs(ScsAddress::point_to_point(2, 2).unwrap()),
            medium: None,
            mode: None,
        };
        assert!(coordinator.classify(Protocol::Scs, &msg).is_none());
    }
}
