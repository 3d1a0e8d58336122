//! Typed, capability-checked operations over a single endpoint
// (c) 2026 OpenNetty contributors

use tokio_util::sync::CancellationToken;

use crate::config::EndpointConfig;
use crate::error::{ControllerError, TransactionError};
use crate::protocol::message::{Capability, Command, Dimension, quantize_brightness};
use crate::protocol::{Message, Protocol};
use crate::service::OpenNettyService;

/// The result of a switch-state query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    /// The load is on.
    On,
    /// The load is off.
    Off,
}

/// Operates `endpoint` through `service`, enforcing the endpoint's declared
/// [`Capability`] set before issuing the underlying transaction. One method
/// per operation named in spec.md §4.7.
pub struct Controller<'a> {
    endpoint: &'a EndpointConfig,
    service: &'a dyn OpenNettyService,
}

impl<'a> Controller<'a> {
    /// Builds a controller bound to `endpoint` and `service`.
    #[must_use]
    pub fn new(endpoint: &'a EndpointConfig, service: &'a dyn OpenNettyService) -> Self {
        Self { endpoint, service }
    }

    fn require(&self, capability: Capability) -> Result<(), ControllerError> {
        if self.endpoint.capabilities.contains(&capability) {
            Ok(())
        } else {
            Err(ControllerError::CapabilityMissing {
                endpoint: self.endpoint.name.clone(),
                capability,
            })
        }
    }

    async fn send(
        &self,
        protocol: Protocol,
        command: Command,
        cancel: &CancellationToken,
    ) -> Result<(), ControllerError> {
        let message = Message::BusCommand {
            protocol,
            who: "1".to_owned(),
            command,
            address: self.endpoint.address,
            medium: None,
            mode: None,
        };
        self.service.send(protocol, message, cancel).await.map_err(ControllerError::from).map(|_| ())
    }

    /// Switches the endpoint's load on.
    pub async fn switch_on(&self, cancel: &CancellationToken) -> Result<(), ControllerError> {
        self.require(Capability::OnOffSwitching)?;
        self.send(self.endpoint.address.protocol(), Command::LightingOn, cancel).await
    }

    /// Switches the endpoint's load off.
    pub async fn switch_off(&self, cancel: &CancellationToken) -> Result<(), ControllerError> {
        self.require(Capability::OnOffSwitching)?;
        self.send(self.endpoint.address.protocol(), Command::LightingOff, cancel).await
    }

    /// Toggles the endpoint's load: reads current state then issues the
    /// opposite command.
    pub async fn toggle(&self, cancel: &CancellationToken) -> Result<(), ControllerError> {
        self.require(Capability::OnOffSwitching)?;
        match self.get_switch_state(cancel).await? {
            SwitchState::On => self.switch_off(cancel).await,
            SwitchState::Off => self.switch_on(cancel).await,
        }
    }

    /// Reads the endpoint's current switch state via a status request.
    pub async fn get_switch_state(&self, cancel: &CancellationToken) -> Result<SwitchState, ControllerError> {
        self.require(Capability::OnOffSwitching)?;
        let protocol = self.endpoint.address.protocol();
        let message = Message::StatusRequest {
            protocol,
            who: "1".to_owned(),
            address: self.endpoint.address,
        };
        let replies = self.service.send(protocol, message, cancel).await?;
        match replies.first() {
            Some(Message::BusCommand { command: Command::LightingOn, .. }) => Ok(SwitchState::On),
            Some(Message::BusCommand { command: Command::LightingOff, .. }) => Ok(SwitchState::Off),
            _ => Ok(SwitchState::Off),
        }
    }

    /// Reads the endpoint's current brightness level (0..=100).
    pub async fn get_brightness(&self, cancel: &CancellationToken) -> Result<u8, ControllerError> {
        self.require(Capability::Dimming)?;
        let protocol = self.endpoint.address.protocol();
        let message = Message::DimensionRequest {
            protocol,
            who: "1".to_owned(),
            address: self.endpoint.address,
            dimension: Dimension::Brightness,
        };
        let replies = self.service.send(protocol, message, cancel).await?;
        replies
            .iter()
            .find_map(|m| match m {
                Message::DimensionRead { values, .. } => values.first().and_then(|v| v.parse::<u8>().ok()),
                _ => None,
            })
            .ok_or(ControllerError::InvalidValue { what: "brightness level", value: -1 })
    }

    /// Sets the endpoint's brightness, quantizing `requested` to the
    /// nearest level the endpoint's dialect supports.
    pub async fn set_brightness(&self, requested: u8, cancel: &CancellationToken) -> Result<u8, ControllerError> {
        self.require(Capability::Dimming)?;
        let protocol = self.endpoint.address.protocol();
        let level = quantize_brightness(protocol, requested);
        self.send(protocol, Command::DimTo(level), cancel).await?;
        Ok(level)
    }

    async fn dimension_read(
        &self,
        dimension: Dimension,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ControllerError> {
        let protocol = self.endpoint.address.protocol();
        let message = Message::DimensionRequest {
            protocol,
            who: "1".to_owned(),
            address: self.endpoint.address,
            dimension,
        };
        let replies = self.service.send(protocol, message, cancel).await?;
        Ok(replies
            .into_iter()
            .find_map(|m| match m {
                Message::DimensionRead { values, .. } => Some(values),
                _ => None,
            })
            .unwrap_or_default())
    }

    async fn dimension_write(
        &self,
        dimension: Dimension,
        values: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<(), ControllerError> {
        let protocol = self.endpoint.address.protocol();
        let message = Message::DimensionSet {
            protocol,
            who: "1".to_owned(),
            address: self.endpoint.address,
            dimension,
            values,
        };
        self.service.send(protocol, message, cancel).await?;
        Ok(())
    }

    /// Reads the pilot-wire setpoint mode's raw wire value.
    pub async fn get_pilot_wire_setpoint_mode(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ControllerError> {
        self.require(Capability::PilotWire)?;
        self.dimension_read(Dimension::PilotWireSetpointMode, cancel).await
    }

    /// Writes the pilot-wire setpoint mode.
    pub async fn set_pilot_wire_setpoint_mode(
        &self,
        mode: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ControllerError> {
        self.require(Capability::PilotWire)?;
        self.dimension_write(Dimension::PilotWireSetpointMode, vec![mode.to_owned()], cancel).await
    }

    /// Reads the pilot-wire derogation mode and remaining duration.
    pub async fn get_pilot_wire_derogation_mode(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ControllerError> {
        self.require(Capability::PilotWire)?;
        self.dimension_read(Dimension::PilotWireDerogationMode, cancel).await
    }

    /// Writes the pilot-wire derogation mode.
    pub async fn set_pilot_wire_derogation_mode(
        &self,
        mode: &str,
        minutes: u16,
        cancel: &CancellationToken,
    ) -> Result<(), ControllerError> {
        self.require(Capability::PilotWire)?;
        self.dimension_write(
            Dimension::PilotWireDerogationMode,
            vec![mode.to_owned(), minutes.to_string()],
            cancel,
        )
        .await
    }

    /// Cancels any active pilot-wire derogation, returning the endpoint to
    /// its normal setpoint schedule. Writes the derogation dimension with
    /// the sentinel mode `"0"` and no duration.
    pub async fn cancel_pilot_wire_derogation(&self, cancel: &CancellationToken) -> Result<(), ControllerError> {
        self.require(Capability::PilotWire)?;
        self.dimension_write(Dimension::PilotWireDerogationMode, vec!["0".to_owned()], cancel).await
    }

    /// Reads the pilot wire's hardware configuration (raw wire values).
    pub async fn get_pilot_wire_configuration(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ControllerError> {
        self.require(Capability::PilotWire)?;
        self.dimension_read(Dimension::PilotWireConfiguration, cancel).await
    }

    /// Reads smart meter consumption indexes (raw wire values).
    pub async fn get_smart_meter_indexes(&self, cancel: &CancellationToken) -> Result<Vec<String>, ControllerError> {
        self.require(Capability::SmartMeter)?;
        self.dimension_read(Dimension::SmartMeterIndexes, cancel).await
    }

    /// Reads the smart meter's current tariff/rate type.
    pub async fn get_smart_meter_rate_type(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ControllerError> {
        self.require(Capability::SmartMeter)?;
        self.dimension_read(Dimension::SmartMeterRateType, cancel).await
    }

    /// Reads the smart meter's power-cut mode.
    pub async fn get_smart_meter_power_cut_mode(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ControllerError> {
        self.require(Capability::SmartMeter)?;
        self.dimension_read(Dimension::SmartMeterPowerCutMode, cancel).await
    }

    /// Reads the water heater's operating state.
    pub async fn get_water_heater_state(&self, cancel: &CancellationToken) -> Result<Vec<String>, ControllerError> {
        self.require(Capability::WaterHeater)?;
        self.dimension_read(Dimension::WaterHeaterState, cancel).await
    }

    /// Reads the water heater's setpoint mode.
    pub async fn get_water_heater_setpoint_mode(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, ControllerError> {
        self.require(Capability::WaterHeater)?;
        self.dimension_read(Dimension::WaterHeaterSetpointMode, cancel).await
    }

    /// Writes the water heater's setpoint mode.
    pub async fn set_water_heater_setpoint_mode(
        &self,
        mode: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ControllerError> {
        self.require(Capability::WaterHeater)?;
        self.dimension_write(Dimension::WaterHeaterSetpointMode, vec![mode.to_owned()], cancel).await
    }

    /// Dispatches a basic scenario by number.
    pub async fn dispatch_basic_scenario(
        &self,
        scenario: u16,
        cancel: &CancellationToken,
    ) -> Result<(), ControllerError> {
        self.require(Capability::Scenario)?;
        self.send(self.endpoint.address.protocol(), Command::Scenario(scenario), cancel).await
    }

    /// Dispatches an on/off scenario, driving the endpoint directly to
    /// `state` rather than naming a scenario number.
    pub async fn dispatch_on_off_scenario(&self, state: bool, cancel: &CancellationToken) -> Result<(), ControllerError> {
        self.require(Capability::Scenario)?;
        self.send(self.endpoint.address.protocol(), Command::OnOffScenario(state), cancel).await
    }

    /// Reads the endpoint's battery level, if it reports one.
    pub async fn get_battery_level(&self, cancel: &CancellationToken) -> Result<Vec<String>, ControllerError> {
        self.require(Capability::Battery)?;
        self.dimension_read(Dimension::BatteryLevel, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::address::ScsAddress;
    use crate::protocol::Address;
    use std::collections::HashSet;
    use tokio::sync::broadcast;

    struct StubService {
        reply: Message,
    }

    #[async_trait::async_trait]
    impl OpenNettyService for StubService {
        async fn send(
            &self,
            _protocol: Protocol,
            _message: Message,
            _cancel: &CancellationToken,
        ) -> Result<Vec<Message>, TransactionError> {
            Ok(vec![self.reply.clone()])
        }

        fn observe(&self, _protocol: Protocol) -> broadcast::Receiver<Message> {
            broadcast::channel(1).1
        }
    }

    fn endpoint_with(capabilities: &[Capability]) -> EndpointConfig {
        EndpointConfig {
            name: "kitchen_light".to_owned(),
            gateway: "scs".to_owned(),
            address: Address::Scs(ScsAddress::point_to_point(1, 3).unwrap()),
            capabilities: capabilities.iter().copied().collect::<HashSet<_>>(),
        }
    }

    #[tokio::test]
    async fn missing_capability_is_rejected_before_any_send() {
        let endpoint = endpoint_with(&[]);
        let service = StubService { reply: Message::Ack };
        let controller = Controller::new(&endpoint, &service);
        let err = controller.switch_on(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ControllerError::CapabilityMissing { .. }));
    }

    #[tokio::test]
    async fn switch_on_succeeds_with_capability() {
        let endpoint = endpoint_with(&[Capability::OnOffSwitching]);
        let service = StubService { reply: Message::Ack };
        let controller = Controller::new(&endpoint, &service);
        controller.switch_on(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn set_brightness_quantizes_per_protocol() {
        let endpoint = endpoint_with(&[Capability::Dimming]);
        let service = StubService { reply: Message::Ack };
        let controller = Controller::new(&endpoint, &service);
        let level = controller.set_brightness(55, &CancellationToken::new()).await.unwrap();
        assert_eq!(level, 60);
    }

    #[tokio::test]
    async fn dispatch_on_off_scenario_encodes_state_not_a_scenario_number() {
        let endpoint = endpoint_with(&[Capability::Scenario]);
        let service = StubService { reply: Message::Ack };
        let controller = Controller::new(&endpoint, &service);
        controller.dispatch_on_off_scenario(true, &CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_pilot_wire_derogation_writes_the_sentinel_mode() {
        let endpoint = endpoint_with(&[Capability::PilotWire]);
        let service = StubService { reply: Message::Ack };
        let controller = Controller::new(&endpoint, &service);
        controller.cancel_pilot_wire_derogation(&CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn get_pilot_wire_configuration_requires_the_capability() {
        let endpoint = endpoint_with(&[]);
        let service = StubService { reply: Message::Ack };
        let controller = Controller::new(&endpoint, &service);
        let err = controller.get_pilot_wire_configuration(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, ControllerError::CapabilityMissing { .. }));
    }
}
