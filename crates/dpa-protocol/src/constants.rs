//! Protocol constants
//!
//! Frame layout offsets and the catalog of peripheral numbers, command codes and
//! node addresses used by the DPA byte-level protocol.
//!
//! ```text
//! +------+------+------+------+-------+-------+---------------------------+
//! | NADR lo/hi  | PNUM | PCMD | HWPID lo/hi   | PDATA / response tail     |
//! +------+------+------+------+-------+-------+---------------------------+
//!    0      1      2      3      4       5       6 ..
//! ```

// ============================================================================
// Frame Layout
// ============================================================================

/// Offset of the node address (little-endian, 2 bytes).
pub const NADR_START: usize = 0;
/// Length of the node address.
pub const NADR_LENGTH: usize = 2;
/// Offset of the peripheral number.
pub const PNUM_POS: usize = 2;
/// Offset of the peripheral command.
pub const PCMD_POS: usize = 3;
/// Offset of the hardware profile id (little-endian, 2 bytes).
pub const HWPID_START: usize = 4;
/// Length of the hardware profile id.
pub const HWPID_LENGTH: usize = 2;
/// Length of the NADR/PNUM/PCMD/HWPID header shared by every frame.
pub const FOURSOME_LENGTH: usize = HWPID_START + HWPID_LENGTH;

/// Offset of the request payload.
pub const PDATA_START_POS: usize = FOURSOME_LENGTH;
/// Maximum payload length of a request or response.
pub const PDATA_MAX_LENGTH: usize = 56;

/// Offset of the response code in confirmations and responses.
pub const RESPONSE_CODE_POS: usize = FOURSOME_LENGTH;
/// Offset of the DPA value in confirmations and responses.
pub const DPA_VALUE_POS: usize = FOURSOME_LENGTH + 1;

/// Offset of the request hop count in a confirmation.
pub const HOPS_POS: usize = FOURSOME_LENGTH + 2;
/// Offset of the timeslot length in a confirmation.
pub const TIMESLOT_LENGTH_POS: usize = FOURSOME_LENGTH + 3;
/// Offset of the response hop count in a confirmation.
pub const HOPS_RESPONSE_POS: usize = FOURSOME_LENGTH + 4;
/// Exact length of a confirmation frame.
pub const CONFIRMATION_LENGTH: usize = HOPS_RESPONSE_POS + 1;

/// Offset of the response payload.
pub const RESPONSE_PDATA_START_POS: usize = DPA_VALUE_POS + 1;
/// Minimum length of a response frame (header, code and DPA value).
pub const RESPONSE_MIN_LENGTH: usize = DPA_VALUE_POS + 1;
/// Maximum length of a response frame.
pub const RESPONSE_MAX_LENGTH: usize = RESPONSE_MIN_LENGTH + PDATA_MAX_LENGTH;
/// Maximum length of a request frame.
pub const REQUEST_MAX_LENGTH: usize = PDATA_START_POS + PDATA_MAX_LENGTH;

/// Bit of the command byte set by the firmware on responses.
pub const RESPONSE_FLAG: u8 = 0x80;

// ============================================================================
// Response Codes
// ============================================================================

/// No error.
pub const STATUS_NO_ERROR: u8 = 0x00;
/// General failure.
pub const ERROR_FAIL: u8 = 0x01;
/// Incorrect PCMD.
pub const ERROR_PCMD: u8 = 0x02;
/// Incorrect PNUM or PCMD.
pub const ERROR_PNUM: u8 = 0x03;
/// Incorrect address value.
pub const ERROR_ADDR: u8 = 0x04;
/// Incorrect data length.
pub const ERROR_DATA_LEN: u8 = 0x05;
/// Incorrect data.
pub const ERROR_DATA: u8 = 0x06;
/// Incorrect HWPID used.
pub const ERROR_HWPID: u8 = 0x07;
/// Incorrect NADR.
pub const ERROR_NADR: u8 = 0x08;
/// IFACE data consumed by the custom DPA handler.
pub const ERROR_IFACE_CUSTOM_HANDLER: u8 = 0x09;
/// Custom DPA handler is missing.
pub const ERROR_MISSING_CUSTOM_DPA_HANDLER: u8 = 0x0A;
/// First user-defined error code.
pub const ERROR_USER_FROM: u8 = 0x80;
/// Last user-defined error code.
pub const ERROR_USER_TO: u8 = 0xFE;
/// Response code marking a confirmation frame.
pub const STATUS_CONFIRMATION: u8 = 0xFF;

// ============================================================================
// Node Addresses
// ============================================================================

/// Address of the mesh coordinator.
pub const COORDINATOR_ADDRESS: u16 = 0x00;
/// Lowest node address.
pub const NODE_ADDRESS_MIN: u16 = 0x01;
/// Highest node address.
pub const NODE_ADDRESS_MAX: u16 = 0xEF;
/// Address of the locally attached device, whatever its mesh role.
pub const LOCAL_DEVICE_ADDRESS: u16 = 0xFC;
/// Temporary address used while bonding.
pub const TEMPORARY_ADDRESS: u16 = 0xFE;
/// Broadcast address.
pub const BROADCAST_ADDRESS: u16 = 0xFF;

/// Returns true if the address lies in one of the reserved ranges.
pub fn is_reserved_address(nadr: u16) -> bool {
    (0xF0..=0xFB).contains(&nadr) || nadr == 0xFD || nadr >= 0x100
}

// ============================================================================
// Peripheral Numbers
// ============================================================================

/// Coordinator peripheral.
pub const PNUM_COORDINATOR: u8 = 0x00;
/// Node peripheral.
pub const PNUM_NODE: u8 = 0x01;
/// OS peripheral.
pub const PNUM_OS: u8 = 0x02;
/// EEPROM peripheral.
pub const PNUM_EEPROM: u8 = 0x03;
/// External EEPROM peripheral.
pub const PNUM_EEEPROM: u8 = 0x04;
/// RAM peripheral.
pub const PNUM_RAM: u8 = 0x05;
/// Red LED peripheral.
pub const PNUM_LEDR: u8 = 0x06;
/// Green LED peripheral.
pub const PNUM_LEDG: u8 = 0x07;
/// SPI peripheral.
pub const PNUM_SPI: u8 = 0x08;
/// IO peripheral.
pub const PNUM_IO: u8 = 0x09;
/// Thermometer peripheral.
pub const PNUM_THERMOMETER: u8 = 0x0A;
/// PWM peripheral.
pub const PNUM_PWM: u8 = 0x0B;
/// UART peripheral.
pub const PNUM_UART: u8 = 0x0C;
/// FRC peripheral.
pub const PNUM_FRC: u8 = 0x0D;
/// First user peripheral.
pub const PNUM_USER_START: u8 = 0x20;
/// Last user peripheral.
pub const PNUM_USER_END: u8 = 0x6F;
/// Device exploration pseudo-peripheral.
pub const PNUM_DEVICE_EXPLORATION: u8 = 0xFF;

// ============================================================================
// Coordinator Commands
// ============================================================================

/// Get addressing information.
pub const CMD_COORDINATOR_ADDR_INFO: u8 = 0x00;
/// Get the bitmap of discovered nodes.
pub const CMD_COORDINATOR_DISCOVERED_DEVICES: u8 = 0x01;
/// Get the bitmap of bonded nodes.
pub const CMD_COORDINATOR_BONDED_DEVICES: u8 = 0x02;
/// Clear all bonds.
pub const CMD_COORDINATOR_CLEAR_ALL_BONDS: u8 = 0x03;
/// Bond a node. Long-lasting.
pub const CMD_COORDINATOR_BOND_NODE: u8 = 0x04;
/// Remove a bonded node.
pub const CMD_COORDINATOR_REMOVE_BOND: u8 = 0x05;
/// Rebond a node.
pub const CMD_COORDINATOR_REBOND_NODE: u8 = 0x06;
/// Run discovery. Long-lasting.
pub const CMD_COORDINATOR_DISCOVERY: u8 = 0x07;
/// Set the DPA param byte.
pub const CMD_COORDINATOR_SET_DPAPARAMS: u8 = 0x08;
/// Set request/response hops.
pub const CMD_COORDINATOR_SET_HOPS: u8 = 0x09;
/// Read discovery data.
pub const CMD_COORDINATOR_DISCOVERY_DATA: u8 = 0x0A;
/// Backup.
pub const CMD_COORDINATOR_BACKUP: u8 = 0x0B;
/// Restore.
pub const CMD_COORDINATOR_RESTORE: u8 = 0x0C;
/// Authorize a bond.
pub const CMD_COORDINATOR_AUTHORIZE_BOND: u8 = 0x0D;
/// Bridge.
pub const CMD_COORDINATOR_BRIDGE: u8 = 0x0E;
/// Read the remotely bonded module id.
pub const CMD_COORDINATOR_READ_REMOTELY_BONDED_MID: u8 = 0x0F;
/// Clear the remotely bonded module id.
pub const CMD_COORDINATOR_CLEAR_REMOTELY_BONDED_MID: u8 = 0x10;
/// Enable remote bonding.
pub const CMD_COORDINATOR_ENABLE_REMOTE_BONDING: u8 = 0x11;

// ============================================================================
// OS Commands
// ============================================================================

/// Read OS information.
pub const CMD_OS_READ: u8 = 0x00;
/// Reset the device.
pub const CMD_OS_RESET: u8 = 0x01;
/// Read the HWP configuration.
pub const CMD_OS_READ_CFG: u8 = 0x02;
/// Run RFPGM.
pub const CMD_OS_RFPGM: u8 = 0x03;
/// Sleep.
pub const CMD_OS_SLEEP: u8 = 0x04;
/// Batch of requests.
pub const CMD_OS_BATCH: u8 = 0x05;
/// Set the user security code.
pub const CMD_OS_SET_USEC: u8 = 0x06;
/// Set the module id.
pub const CMD_OS_SET_MID: u8 = 0x07;
/// Restart.
pub const CMD_OS_RESTART: u8 = 0x08;
/// Write one HWP configuration byte.
pub const CMD_OS_WRITE_CFG_BYTE: u8 = 0x09;
/// Load code.
pub const CMD_OS_LOAD_CODE: u8 = 0x0A;
/// Write the HWP configuration.
pub const CMD_OS_WRITE_CFG: u8 = 0x0F;

// ============================================================================
// LED Commands
// ============================================================================

/// LED off.
pub const CMD_LED_SET_OFF: u8 = 0x00;
/// LED on.
pub const CMD_LED_SET_ON: u8 = 0x01;
/// Get the LED state.
pub const CMD_LED_GET: u8 = 0x02;
/// Single LED pulse.
pub const CMD_LED_PULSE: u8 = 0x03;

// ============================================================================
// Thermometer Commands
// ============================================================================

/// Read the temperature.
pub const CMD_THERMOMETER_READ: u8 = 0x00;

// ============================================================================
// UART Commands
// ============================================================================

/// Open the UART.
pub const CMD_UART_OPEN: u8 = 0x00;
/// Close the UART.
pub const CMD_UART_CLOSE: u8 = 0x01;
/// Write data, then read for `timeout * 10` ms.
pub const CMD_UART_WRITE_READ: u8 = 0x02;
/// UART read timeout value meaning "write only, do not read".
pub const UART_TIMEOUT_NO_READ: u8 = 0xFF;

// ============================================================================
// FRC Commands
// ============================================================================

/// Send an FRC command to all nodes.
pub const CMD_FRC_SEND: u8 = 0x00;
/// Collect the remaining FRC data.
pub const CMD_FRC_EXTRARESULT: u8 = 0x01;
/// Send an FRC command to selected nodes.
pub const CMD_FRC_SEND_SELECTIVE: u8 = 0x02;
/// Set the FRC params byte.
pub const CMD_FRC_SET_PARAMS: u8 = 0x03;

// ============================================================================
// Device Exploration Commands
// ============================================================================

/// Peripheral enumeration.
pub const CMD_GET_PER_INFO: u8 = 0x3F;
/// Index of the flags byte within a peripheral enumeration response.
pub const PER_INFO_FLAGS_INDEX: usize = 11;
/// Bit of the enumeration flags set when the device runs in STD RF mode.
pub const PER_INFO_FLAG_STD_MODE: u8 = 0x01;

/// Hardware profile id matching any profile.
pub const HWPID_DO_NOT_CHECK: u16 = 0xFFFF;
