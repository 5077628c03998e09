use crate::{DeviceState, Dialect, Frame, NetworkState};

/// One of the adapter's queues that needs draining.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Drain {
    Indication,
    Confirm,
}

/// Follow-up work derived from the adapter's device state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    NetworkStateChanged {
        from: Option<NetworkState>,
        to: NetworkState,
    },
    /// Enqueue a read of the given queue at high priority.
    Read(Drain),
    /// The adapter has room for another APS data request.
    ResumeSends,
    PauseSends,
    ConfigurationChanged,
}

/// Turns device-state flags into reads, send gating and network-state notifications.
///
/// At most one read of each kind is outstanding; the owner reports back with `on_read_finished`
/// and then feeds the device state carried in the read's response, which schedules another read if
/// the adapter still has data queued.
#[derive(Debug, Default)]
pub struct Dispatcher {
    device_state: Option<DeviceState>,
    reading_indication: bool,
    reading_confirm: bool,
    sends_open: bool,
}

impl Dispatcher {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn device_state(&self) -> Option<DeviceState> {
        self.device_state
    }

    pub fn network_state(&self) -> Option<NetworkState> {
        self.device_state.map(|state| state.network_state)
    }

    pub fn sends_open(&self) -> bool {
        self.sends_open
    }

    pub fn is_reading(&self, read: Drain) -> bool {
        match read {
            Drain::Indication => self.reading_indication,
            Drain::Confirm => self.reading_confirm,
        }
    }

    pub fn on_device_state_changed(&mut self, state: DeviceState) -> Vec<Action> {
        let mut actions = Vec::new();
        let previous = self.device_state.replace(state);

        let from = previous.map(|previous| previous.network_state);
        if from != Some(state.network_state) {
            info!("network state {:?} -> {:?}", from, state.network_state);
            actions.push(Action::NetworkStateChanged {
                from,
                to: state.network_state,
            });
        }

        let was_changed = previous.map_or(false, |previous| previous.configuration_changed);
        if state.configuration_changed && !was_changed {
            actions.push(Action::ConfigurationChanged);
        }

        if state.connected() {
            // Indications first: a confirm may refer to a request whose response is still queued.
            if state.data_indication && !self.reading_indication {
                self.reading_indication = true;
                actions.push(Action::Read(Drain::Indication));
            }
            if state.data_confirm && !self.reading_confirm {
                self.reading_confirm = true;
                actions.push(Action::Read(Drain::Confirm));
            }
        }

        match (self.sends_open, state.data_request_free_slots) {
            (false, true) => {
                self.sends_open = true;
                actions.push(Action::ResumeSends);
            }
            (true, false) => {
                self.sends_open = false;
                actions.push(Action::PauseSends);
            }
            _ => {}
        }

        actions
    }

    pub fn on_read_finished(&mut self, read: Drain) {
        match read {
            Drain::Indication => self.reading_indication = false,
            Drain::Confirm => self.reading_confirm = false,
        }
    }

    /// Closes the send gate after an APS data request went out; the next device state with free
    /// slots opens it again.
    pub fn on_request_sent(&mut self) {
        self.sends_open = false;
    }

    /// Handles a frame the sequencer could not match to the command in flight.
    pub fn on_unsolicited_frame(&mut self, frame: &Frame, dialect: &dyn Dialect) -> Vec<Action> {
        let response = match dialect.decode_response(frame) {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    "dropping unsolicited frame {:#04x} (seq {}): {}",
                    frame.command, frame.sequence_id, err
                );
                return Vec::new();
            }
        };

        if response.solicited() {
            debug!(
                "late or unmatched {} (seq {})",
                response.command_id(),
                frame.sequence_id
            );
        }

        match response.device_state() {
            Some(state) => self.on_device_state_changed(state),
            None => {
                debug!("ignoring unsolicited {:?}", response);
                Vec::new()
            }
        }
    }

    /// Forgets everything; used when the transport goes away.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeconzDialect, Response};

    fn connected(byte: u8) -> DeviceState {
        DeviceState::from_byte(0x02 | byte)
    }

    #[test]
    fn reports_network_state_transitions() {
        let mut dispatcher = Dispatcher::new();
        let actions = dispatcher.on_device_state_changed(DeviceState::from_byte(0x00));
        assert_eq!(
            actions,
            vec![Action::NetworkStateChanged {
                from: None,
                to: NetworkState::Offline
            }]
        );

        let actions = dispatcher.on_device_state_changed(connected(0));
        assert_eq!(
            actions,
            vec![Action::NetworkStateChanged {
                from: Some(NetworkState::Offline),
                to: NetworkState::Connected
            }]
        );

        assert!(dispatcher.on_device_state_changed(connected(0)).is_empty());
    }

    #[test]
    fn indication_read_before_confirm_read() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.on_device_state_changed(connected(0));

        let actions = dispatcher.on_device_state_changed(connected(0b1100));
        assert_eq!(
            actions,
            vec![Action::Read(Drain::Indication), Action::Read(Drain::Confirm)]
        );
    }

    #[test]
    fn latches_prevent_duplicate_reads() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.on_device_state_changed(connected(0b1000));
        assert!(dispatcher.is_reading(Drain::Indication));
        assert!(dispatcher.on_device_state_changed(connected(0b1000)).is_empty());

        dispatcher.on_read_finished(Drain::Indication);
        assert_eq!(
            dispatcher.on_device_state_changed(connected(0b1000)),
            vec![Action::Read(Drain::Indication)]
        );
    }

    #[test]
    fn no_reads_while_offline() {
        let mut dispatcher = Dispatcher::new();
        let actions = dispatcher.on_device_state_changed(DeviceState::from_byte(0b1100));
        assert!(!actions.contains(&Action::Read(Drain::Indication)));
        assert!(!actions.contains(&Action::Read(Drain::Confirm)));
    }

    #[test]
    fn free_slots_gate_sends() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.on_device_state_changed(connected(0));
        assert!(!dispatcher.sends_open());

        let actions = dispatcher.on_device_state_changed(connected(0b10_0000));
        assert_eq!(actions, vec![Action::ResumeSends]);

        dispatcher.on_request_sent();
        let actions = dispatcher.on_device_state_changed(connected(0b10_0000));
        assert_eq!(actions, vec![Action::ResumeSends]);

        let actions = dispatcher.on_device_state_changed(connected(0));
        assert_eq!(actions, vec![Action::PauseSends]);
    }

    #[test]
    fn unsolicited_device_state_changed() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.on_device_state_changed(connected(0));

        let (command, payload) = DeconzDialect
            .encode_response(&Response::DeviceStateChanged(connected(0b0100)))
            .unwrap();
        let frame = Frame::new(command, 0x30, payload);

        let actions = dispatcher.on_unsolicited_frame(&frame, &DeconzDialect);
        assert_eq!(actions, vec![Action::Read(Drain::Confirm)]);
    }

    #[test]
    fn garbage_is_dropped() {
        let mut dispatcher = Dispatcher::new();
        let frame = Frame::new(0x99, 0, vec![]);
        assert!(dispatcher
            .on_unsolicited_frame(&frame, &DeconzDialect)
            .is_empty());
    }
}
