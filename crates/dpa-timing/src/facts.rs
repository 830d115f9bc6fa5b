//! Timing facts learned from observed traffic.
//!
//! Some successful responses reveal properties of the mesh that drive response
//! deadlines: the coordinator reports how many nodes are bonded, peripheral
//! enumeration reports the RF mode, and an accepted FRC params request fixes the
//! FRC response time. Facts are kept per peripheral number and combined into an
//! [`FrcTimingParams`] snapshot when an FRC request is timed.

use std::collections::HashMap;

use dpa_protocol::*;
use tracing::{debug, warn};

use crate::mode::{FrcResponseTime, RfMode};

/// Number of bitmap bytes in a bonded-devices response.
const BONDED_BITMAP_LENGTH: usize = 32;

/// Facts known about one peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingFacts {
    /// Learned from coordinator bonding traffic.
    Coordinator {
        /// Number of bonded nodes.
        bonded_nodes: u16,
    },
    /// Learned from peripheral enumeration.
    PeripheralInfo {
        /// RF mode reported by the device.
        rf_mode: RfMode,
    },
    /// Learned from FRC params requests.
    Frc {
        /// Configured FRC response time.
        response_time: FrcResponseTime,
    },
}

/// Compute the facts that hold for `request.peripheral` after a successful
/// exchange.
///
/// Returns `current` when the exchange reveals nothing, including when the
/// response is too short to carry the expected value.
pub fn updated_facts(
    current: Option<TimingFacts>,
    request: &Request,
    response: &Response,
) -> Option<TimingFacts> {
    let data = &response.payload;

    let learned = match (request.peripheral, request.command) {
        (PNUM_COORDINATOR, CMD_COORDINATOR_BONDED_DEVICES) => {
            if data.len() < BONDED_BITMAP_LENGTH {
                return missing(current, request, BONDED_BITMAP_LENGTH, data.len());
            }
            let bonded_nodes = data[..BONDED_BITMAP_LENGTH]
                .iter()
                .map(|b| b.count_ones() as u16)
                .sum();
            TimingFacts::Coordinator { bonded_nodes }
        }
        (PNUM_COORDINATOR, CMD_COORDINATOR_CLEAR_ALL_BONDS) => {
            TimingFacts::Coordinator { bonded_nodes: 0 }
        }
        (PNUM_COORDINATOR, CMD_COORDINATOR_BOND_NODE) => match data.get(1) {
            Some(count) => TimingFacts::Coordinator {
                bonded_nodes: *count as u16,
            },
            None => return missing(current, request, 2, data.len()),
        },
        (PNUM_COORDINATOR, CMD_COORDINATOR_REMOVE_BOND | CMD_COORDINATOR_REBOND_NODE) => {
            match data.first() {
                Some(count) => TimingFacts::Coordinator {
                    bonded_nodes: *count as u16,
                },
                None => return missing(current, request, 1, data.len()),
            }
        }
        (PNUM_DEVICE_EXPLORATION, CMD_GET_PER_INFO) => match data.get(PER_INFO_FLAGS_INDEX) {
            Some(flags) => {
                let rf_mode = if flags & PER_INFO_FLAG_STD_MODE != 0 {
                    RfMode::Std
                } else {
                    RfMode::Lp
                };
                TimingFacts::PeripheralInfo { rf_mode }
            }
            None => return missing(current, request, PER_INFO_FLAGS_INDEX + 1, data.len()),
        },
        (PNUM_FRC, CMD_FRC_SET_PARAMS) => match request.payload.first() {
            Some(params) => TimingFacts::Frc {
                response_time: FrcResponseTime::from_params_byte(*params),
            },
            None => {
                warn!("FRC params request without data, keeping current FRC timing");
                return current;
            }
        },
        _ => return current,
    };

    Some(learned)
}

fn missing(
    current: Option<TimingFacts>,
    request: &Request,
    needed: usize,
    actual: usize,
) -> Option<TimingFacts> {
    warn!(
        "Response to pnum 0x{:02x} pcmd 0x{:02x} too short to update timing: need {} bytes, got {}",
        request.peripheral, request.command, needed, actual
    );
    current
}

/// Inputs of the FRC response deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrcTimingParams {
    /// Number of bonded nodes.
    pub bonded_nodes: u16,
    /// RF mode of the mesh.
    pub rf_mode: RfMode,
    /// Coordinator FRC response time.
    pub response_time: FrcResponseTime,
}

/// Facts known before any traffic is observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialSettings {
    /// Bonded node count.
    pub bonded_nodes: Option<u16>,
    /// RF mode.
    pub rf_mode: Option<RfMode>,
}

/// Per-peripheral facts with a cached FRC snapshot.
#[derive(Debug, Clone)]
pub struct FactsStore {
    facts: HashMap<u8, TimingFacts>,
    default_rf_mode: RfMode,
    frc_params: Option<FrcTimingParams>,
}

impl FactsStore {
    /// Create a store. `default_rf_mode` stands in until enumeration reports one.
    pub fn new(default_rf_mode: RfMode, initial: InitialSettings) -> Self {
        let mut facts = HashMap::new();
        if let Some(bonded_nodes) = initial.bonded_nodes {
            facts.insert(PNUM_COORDINATOR, TimingFacts::Coordinator { bonded_nodes });
        }
        if let Some(rf_mode) = initial.rf_mode {
            facts.insert(PNUM_DEVICE_EXPLORATION, TimingFacts::PeripheralInfo { rf_mode });
        }

        FactsStore {
            facts,
            default_rf_mode,
            frc_params: None,
        }
    }

    /// Facts known for a peripheral.
    pub fn get(&self, peripheral: u8) -> Option<&TimingFacts> {
        self.facts.get(&peripheral)
    }

    /// Bonded node count, if known.
    pub fn bonded_nodes(&self) -> Option<u16> {
        match self.facts.get(&PNUM_COORDINATOR) {
            Some(TimingFacts::Coordinator { bonded_nodes }) => Some(*bonded_nodes),
            _ => None,
        }
    }

    /// Learn from a successful exchange. Returns true if a fact changed.
    pub fn observe(&mut self, request: &Request, response: &Response) -> bool {
        let current = self.facts.get(&request.peripheral).copied();
        let updated = updated_facts(current, request, response);

        match updated {
            Some(facts) if updated != current => {
                debug!(
                    "Timing facts for pnum 0x{:02x}: {:?} -> {:?}",
                    request.peripheral, current, facts
                );
                self.facts.insert(request.peripheral, facts);
                self.frc_params = None;
                true
            }
            _ => false,
        }
    }

    /// FRC snapshot, rebuilt only after a fact changed.
    pub fn frc_params(&mut self) -> FrcTimingParams {
        if let Some(params) = self.frc_params {
            return params;
        }

        let mut params = FrcTimingParams {
            bonded_nodes: 0,
            rf_mode: self.default_rf_mode,
            response_time: FrcResponseTime::default(),
        };
        for facts in self.facts.values() {
            match *facts {
                TimingFacts::Coordinator { bonded_nodes } => params.bonded_nodes = bonded_nodes,
                TimingFacts::PeripheralInfo { rf_mode } => params.rf_mode = rf_mode,
                TimingFacts::Frc { response_time } => params.response_time = response_time,
            }
        }

        self.frc_params = Some(params);
        params
    }

    #[cfg(test)]
    fn is_snapshot_cached(&self) -> bool {
        self.frc_params.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_response(request: &Request, payload: Vec<u8>) -> Response {
        Response::for_request(request, ResponseCode::NoError, 0, payload)
    }

    fn coordinator(command: u8) -> Request {
        Request::new(COORDINATOR_ADDRESS, PNUM_COORDINATOR, command)
    }

    #[test]
    fn test_bond_node_sets_bonded_count() {
        let mut store = FactsStore::new(RfMode::Std, InitialSettings::default());
        let request = coordinator(CMD_COORDINATOR_BOND_NODE);

        assert!(store.observe(&request, &ok_response(&request, vec![0x07, 0x05])));
        assert_eq!(
            store.get(PNUM_COORDINATOR),
            Some(&TimingFacts::Coordinator { bonded_nodes: 5 })
        );
        assert_eq!(store.get(PNUM_FRC), None);
        assert_eq!(store.get(PNUM_DEVICE_EXPLORATION), None);
    }

    #[test]
    fn test_bonded_devices_counts_bits() {
        let request = coordinator(CMD_COORDINATOR_BONDED_DEVICES);
        let mut bitmap = vec![0u8; 32];
        bitmap[0] = 0b0000_0110;
        bitmap[1] = 0xFF;
        bitmap[31] = 0x80;

        let facts = updated_facts(None, &request, &ok_response(&request, bitmap));
        assert_eq!(facts, Some(TimingFacts::Coordinator { bonded_nodes: 11 }));
    }

    #[test]
    fn test_clear_remove_rebond() {
        let seeded = Some(TimingFacts::Coordinator { bonded_nodes: 9 });

        let request = coordinator(CMD_COORDINATOR_CLEAR_ALL_BONDS);
        assert_eq!(
            updated_facts(seeded, &request, &ok_response(&request, vec![])),
            Some(TimingFacts::Coordinator { bonded_nodes: 0 })
        );

        let request = coordinator(CMD_COORDINATOR_REMOVE_BOND);
        assert_eq!(
            updated_facts(seeded, &request, &ok_response(&request, vec![8])),
            Some(TimingFacts::Coordinator { bonded_nodes: 8 })
        );

        let request = coordinator(CMD_COORDINATOR_REBOND_NODE);
        assert_eq!(
            updated_facts(seeded, &request, &ok_response(&request, vec![10])),
            Some(TimingFacts::Coordinator { bonded_nodes: 10 })
        );
    }

    #[test]
    fn test_short_payload_keeps_facts() {
        let seeded = Some(TimingFacts::Coordinator { bonded_nodes: 3 });

        let request = coordinator(CMD_COORDINATOR_BOND_NODE);
        assert_eq!(updated_facts(seeded, &request, &ok_response(&request, vec![1])), seeded);

        let request = coordinator(CMD_COORDINATOR_BONDED_DEVICES);
        assert_eq!(
            updated_facts(seeded, &request, &ok_response(&request, vec![0xFF; 31])),
            seeded
        );

        let request = coordinator(CMD_COORDINATOR_REMOVE_BOND);
        assert_eq!(updated_facts(None, &request, &ok_response(&request, vec![])), None);
    }

    #[test]
    fn test_peripheral_enumeration_rf_mode() {
        let request = Request::new(0x01, PNUM_DEVICE_EXPLORATION, CMD_GET_PER_INFO);

        let mut data = vec![0u8; 12];
        data[PER_INFO_FLAGS_INDEX] = 0x01;
        assert_eq!(
            updated_facts(None, &request, &ok_response(&request, data.clone())),
            Some(TimingFacts::PeripheralInfo { rf_mode: RfMode::Std })
        );

        data[PER_INFO_FLAGS_INDEX] = 0x02;
        assert_eq!(
            updated_facts(None, &request, &ok_response(&request, data)),
            Some(TimingFacts::PeripheralInfo { rf_mode: RfMode::Lp })
        );
    }

    #[test]
    fn test_frc_params_response_time() {
        let request = Request::new(COORDINATOR_ADDRESS, PNUM_FRC, CMD_FRC_SET_PARAMS)
            .with_payload(vec![0x20])
            .unwrap();

        assert_eq!(
            updated_facts(None, &request, &ok_response(&request, vec![0x00])),
            Some(TimingFacts::Frc {
                response_time: FrcResponseTime::Ms640
            })
        );
    }

    #[test]
    fn test_unrelated_command_keeps_facts() {
        let request = coordinator(CMD_COORDINATOR_ADDR_INFO);
        assert_eq!(updated_facts(None, &request, &ok_response(&request, vec![4, 0])), None);

        let request = Request::new(0x02, PNUM_LEDR, CMD_LED_PULSE);
        assert_eq!(updated_facts(None, &request, &ok_response(&request, vec![])), None);
    }

    #[test]
    fn test_initial_settings_seed_snapshot() {
        let mut store = FactsStore::new(
            RfMode::Std,
            InitialSettings {
                bonded_nodes: Some(12),
                rf_mode: Some(RfMode::Lp),
            },
        );

        assert_eq!(store.bonded_nodes(), Some(12));
        assert_eq!(
            store.frc_params(),
            FrcTimingParams {
                bonded_nodes: 12,
                rf_mode: RfMode::Lp,
                response_time: FrcResponseTime::Ms40,
            }
        );
    }

    #[test]
    fn test_snapshot_invalidated_only_on_change() {
        let mut store = FactsStore::new(RfMode::Std, InitialSettings::default());
        assert_eq!(store.frc_params().bonded_nodes, 0);
        assert!(store.is_snapshot_cached());

        let request = coordinator(CMD_COORDINATOR_BOND_NODE);
        assert!(store.observe(&request, &ok_response(&request, vec![1, 4])));
        assert!(!store.is_snapshot_cached());
        assert_eq!(store.frc_params().bonded_nodes, 4);

        assert!(!store.observe(&request, &ok_response(&request, vec![1, 4])));
        assert!(store.is_snapshot_cached());
    }
}
