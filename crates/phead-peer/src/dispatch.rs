//! Category/subcommand dispatch.
//!
//! Each request runs through the same checks in a fixed order:
//!
//! 1. ping short-circuits with `OK 00`
//! 2. the payload must hold a category and a subcommand
//! 3. the `(category, subcommand)` pair must be in the handler table
//! 4. the argument length must match the handler's shape
//! 5. argument values must be in range
//! 6. the handler's device-mode precondition must hold
//! 7. the effect runs and its payload is returned as `OK`
//!
//! Any failed check becomes an `ERROR` response; dispatch itself never
//! fails.

use std::sync::LazyLock;

use bytes::Bytes;
use phead_frame::category::{battery, calibration, general, print, temperature, uv_light};
use phead_frame::{category_name, Category, Command, ErrorCode, Response};
use tracing::debug;

use crate::profile::{Descriptor, DeviceProfile};
use crate::state::{DeviceState, MAX_VOLUME};

/// Accepted argument lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// No arguments.
    Empty,
    /// Exactly this many bytes.
    Exactly(usize),
    /// Any of these lengths.
    OneOf(&'static [usize]),
}

impl ArgShape {
    pub fn accepts(self, len: usize) -> bool {
        match self {
            ArgShape::Empty => len == 0,
            ArgShape::Exactly(n) => len == n,
            ArgShape::OneOf(lens) => lens.contains(&len),
        }
    }
}

/// Device-mode condition a handler needs before it may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    None,
    /// `power_mode == Battery`, else `NO_BATTERY`.
    OnBattery,
    /// Temperature subsystem enabled, else `TEMP_DISABLED`.
    TemperatureEnabled,
    /// UV subsystem enabled, else `UV_DISABLED`.
    UvEnabled,
}

impl Precondition {
    pub fn check(self, state: &DeviceState) -> Result<(), ErrorCode> {
        match self {
            Precondition::None => Ok(()),
            Precondition::OnBattery if !state.on_battery() => Err(ErrorCode::NoBattery),
            Precondition::TemperatureEnabled if !state.temperature_enabled => {
                Err(ErrorCode::TempDisabled)
            }
            Precondition::UvEnabled if !state.uv_enabled => Err(ErrorCode::UvDisabled),
            _ => Ok(()),
        }
    }
}

type RangeCheck = fn(&[u8]) -> Result<(), ErrorCode>;
type Effect = fn(&Dispatcher, &[u8], &mut DeviceState) -> Bytes;

/// One row of the dispatch table.
pub struct Handler {
    pub category: Category,
    pub subcommand: u8,
    pub name: &'static str,
    pub args: ArgShape,
    pub precondition: Precondition,
    range: RangeCheck,
    effect: Effect,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("category", &self.category)
            .field("subcommand", &self.subcommand)
            .field("name", &self.name)
            .field("args", &self.args)
            .field("precondition", &self.precondition)
            .finish()
    }
}

const fn handler(
    category: Category,
    subcommand: u8,
    name: &'static str,
    args: ArgShape,
    precondition: Precondition,
    range: RangeCheck,
    effect: Effect,
) -> Handler {
    Handler {
        category,
        subcommand,
        name,
        args,
        precondition,
        range,
        effect,
    }
}

#[rustfmt::skip]
static HANDLERS: [Handler; 16] = [
    handler(Category::General, general::INIT, "init", ArgShape::OneOf(&[0, 4]), Precondition::None, any, init),
    handler(Category::General, general::SHUTDOWN, "shutdown", ArgShape::Empty, Precondition::None, any, ack),
    handler(Category::General, general::DESCRIPTION, "description", ArgShape::Empty, Precondition::None, any, describe),
    handler(Category::General, general::STATE_LED, "state_led", ArgShape::Empty, Precondition::None, any, ack),
    handler(Category::Calibration, calibration::CALIBRATE, "calibrate", ArgShape::Exactly(1), Precondition::None, volume_range, calibrate),
    handler(Category::Battery, battery::READ, "read_battery", ArgShape::Empty, Precondition::OnBattery, any, read_battery),
    handler(Category::Print, print::START, "start_print", ArgShape::Exactly(2), Precondition::None, any, start_print),
    handler(Category::Print, print::STOP, "stop_print", ArgShape::Empty, Precondition::None, any, stop_print),
    handler(Category::Print, print::SET_SPEED, "set_speed", ArgShape::Exactly(2), Precondition::None, any, set_speed),
    handler(Category::Print, print::REFILL, "refill", ArgShape::Empty, Precondition::None, any, ack),
    handler(Category::Temperature, temperature::READ, "read_temperature", ArgShape::Empty, Precondition::TemperatureEnabled, any, read_temperature),
    handler(Category::Temperature, temperature::SET, "set_temperature", ArgShape::Exactly(1), Precondition::TemperatureEnabled, any, set_temperature),
    handler(Category::UvLight, uv_light::READ, "read_uv", ArgShape::Empty, Precondition::UvEnabled, any, read_uv),
    handler(Category::UvLight, uv_light::TURN_OFF, "turn_off_uv", ArgShape::Empty, Precondition::UvEnabled, any, ack),
    handler(Category::UvLight, uv_light::SET_INTENSITY, "set_uv_intensity", ArgShape::Exactly(1), Precondition::UvEnabled, any, set_uv_intensity),
    handler(Category::UvLight, uv_light::SET_MAP, "set_uv_map", ArgShape::Exactly(1), Precondition::UvEnabled, uv_map_range, set_uv_map),
];

/// The whole dispatch table, in wire order.
pub fn handlers() -> &'static [Handler] {
    &HANDLERS
}

/// Find the handler for a `(category, subcommand)` pair.
pub fn lookup(category: u8, subcommand: u8) -> Option<&'static Handler> {
    HANDLERS
        .iter()
        .find(|h| h.category.code() == category && h.subcommand == subcommand)
}

const ACK: Bytes = Bytes::from_static(&[0x00]);

fn any(_args: &[u8]) -> Result<(), ErrorCode> {
    Ok(())
}

fn volume_range(args: &[u8]) -> Result<(), ErrorCode> {
    match args.first() {
        Some(&volume) if volume > MAX_VOLUME => Err(ErrorCode::InvalidArg),
        _ => Ok(()),
    }
}

fn uv_map_range(args: &[u8]) -> Result<(), ErrorCode> {
    match args.first() {
        Some(0) => Err(ErrorCode::BadUvMap),
        _ => Ok(()),
    }
}

fn le_u16(args: &[u8]) -> u16 {
    match args {
        [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
        _ => 0,
    }
}

fn ack(_: &Dispatcher, _: &[u8], _: &mut DeviceState) -> Bytes {
    ACK
}

/// Always resets; an out-of-range volume keeps the power-on value.
fn init(dispatcher: &Dispatcher, args: &[u8], state: &mut DeviceState) -> Bytes {
    *state = dispatcher.power_on.clone();
    if let [volume, speed_lo, speed_hi, temperature] = *args {
        if volume != 0 && volume <= MAX_VOLUME {
            state.volume = volume;
        }
        let speed = u16::from_le_bytes([speed_lo, speed_hi]);
        if speed != 0 {
            state.speed = speed;
        }
        if temperature != 0 {
            state.temperature = temperature;
        }
    }
    ACK
}

fn describe(dispatcher: &Dispatcher, _: &[u8], _: &mut DeviceState) -> Bytes {
    dispatcher.descriptor.to_bytes()
}

fn calibrate(_: &Dispatcher, args: &[u8], state: &mut DeviceState) -> Bytes {
    state.volume = args[0];
    ACK
}

fn read_battery(_: &Dispatcher, _: &[u8], state: &mut DeviceState) -> Bytes {
    Bytes::copy_from_slice(&state.battery_level.to_le_bytes())
}

fn start_print(_: &Dispatcher, args: &[u8], state: &mut DeviceState) -> Bytes {
    let speed = le_u16(args);
    if speed != 0 {
        state.speed = speed;
    }
    state.printing = true;
    ACK
}

fn stop_print(_: &Dispatcher, _: &[u8], state: &mut DeviceState) -> Bytes {
    state.printing = false;
    ACK
}

fn set_speed(_: &Dispatcher, args: &[u8], state: &mut DeviceState) -> Bytes {
    let speed = le_u16(args);
    if speed != 0 {
        state.speed = speed;
    }
    ACK
}

fn read_temperature(_: &Dispatcher, _: &[u8], state: &mut DeviceState) -> Bytes {
    Bytes::copy_from_slice(&[state.temperature])
}

fn set_temperature(_: &Dispatcher, args: &[u8], state: &mut DeviceState) -> Bytes {
    if args[0] != 0 {
        state.temperature = args[0];
    }
    ACK
}

fn read_uv(_: &Dispatcher, _: &[u8], state: &mut DeviceState) -> Bytes {
    Bytes::copy_from_slice(&[state.uv_intensity])
}

fn set_uv_intensity(_: &Dispatcher, args: &[u8], state: &mut DeviceState) -> Bytes {
    state.uv_intensity = args[0];
    ACK
}

fn set_uv_map(_: &Dispatcher, args: &[u8], state: &mut DeviceState) -> Bytes {
    state.uv_map = args[0];
    ACK
}

/// Turns commands into responses for one kind of device.
///
/// Holds what the device reports about itself and the state `init` returns
/// to; the per-connection [`DeviceState`] is passed in on every call.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    descriptor: Descriptor,
    power_on: DeviceState,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(Descriptor::default(), DeviceState::default())
    }
}

impl Dispatcher {
    pub fn new(descriptor: Descriptor, power_on: DeviceState) -> Self {
        Self {
            descriptor,
            power_on,
        }
    }

    pub fn from_profile(profile: &DeviceProfile) -> Self {
        Self::new(profile.descriptor(), profile.power_on_state())
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The state a new connection starts in.
    pub fn initial_state(&self) -> DeviceState {
        self.power_on.clone()
    }

    /// Produce the response to `command`, mutating `state` as the handler
    /// requires.
    pub fn dispatch(&self, command: &Command, state: &mut DeviceState) -> Response {
        let payload = match command {
            Command::Ping => return Response::ack(),
            Command::Request(payload) => payload,
        };

        let [category, subcommand, args @ ..] = &payload[..] else {
            debug!(len = payload.len(), "request too short for category and subcommand");
            return Response::error(ErrorCode::BadCommand);
        };
        let (category, subcommand) = (*category, *subcommand);

        if Category::from_code(category).is_none() {
            debug!(category, "unknown category");
            return Response::error(ErrorCode::BadCommand);
        }

        let Some(handler) = lookup(category, subcommand) else {
            debug!(
                category = category_name(category),
                subcommand, "unknown subcommand"
            );
            return Response::error(ErrorCode::BadCommand);
        };

        if !handler.args.accepts(args.len()) {
            debug!(handler = handler.name, len = args.len(), "bad argument length");
            return Response::error(ErrorCode::BadCommand);
        }

        if let Err(code) = (handler.range)(args) {
            debug!(handler = handler.name, %code, "argument out of range");
            return Response::error(code);
        }

        if let Err(code) = handler.precondition.check(state) {
            debug!(handler = handler.name, %code, "precondition not met");
            return Response::error(code);
        }

        Response::Ok((handler.effect)(self, args, state))
    }
}

static DEFAULT_DISPATCHER: LazyLock<Dispatcher> = LazyLock::new(Dispatcher::default);

/// Dispatch against the reference head (`SD-PHEAD-1`, default power-on
/// state).
pub fn dispatch(command: &Command, state: &mut DeviceState) -> Response {
    DEFAULT_DISPATCHER.dispatch(command, state)
}
