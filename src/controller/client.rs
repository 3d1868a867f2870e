use serde_json::{json, Value};

use super::transport::Transport;
use super::types::{parse_preview_ports, Channel, CompositeMode, ControllerError, PreviewPort};

/// Typed client for the server's remote-control interface.
pub struct Controller<T> {
    transport: T,
}

impl<T: Transport> Controller<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn get_compose_port(&self) -> Result<i64, ControllerError> {
        self.call_int("get_compose_port", &[])
    }

    pub fn get_encode_port(&self) -> Result<i64, ControllerError> {
        self.call_int("get_encode_port", &[])
    }

    pub fn get_audio_port(&self) -> Result<i64, ControllerError> {
        self.call_int("get_audio_port", &[])
    }

    pub fn get_preview_ports(&self) -> Result<Vec<PreviewPort>, ControllerError> {
        let reply = self.transport.call("get_preview_ports", &[])?;
        parse_preview_ports(&reply).ok_or_else(|| unexpected("get_preview_ports", reply))
    }

    /// Switch `channel` to the source on `port`.
    pub fn switch(&self, channel: Channel, port: i64) -> Result<bool, ControllerError> {
        validate_port(port)?;
        self.call_bool("switch", &[json!(channel.code()), json!(port)])
    }

    /// Returns whether the mode actually changed.
    pub fn set_composite_mode(&self, mode: CompositeMode) -> Result<bool, ControllerError> {
        self.call_bool("set_composite_mode", &[json!(mode.code())])
    }

    pub fn get_composite_mode(&self) -> Result<CompositeMode, ControllerError> {
        let code = self.call_int("get_composite_mode", &[])?;
        CompositeMode::try_from(code)
            .map_err(|_| unexpected("get_composite_mode", json!(code)))
    }

    pub fn set_encode_mode(&self, channel: i64) -> Result<bool, ControllerError> {
        self.call_bool("set_encode_mode", &[json!(channel)])
    }

    /// Move and resize the picture-in-picture window by the given deltas.
    pub fn adjust_pip(&self, dx: i64, dy: i64, dw: i64, dh: i64) -> Result<u32, ControllerError> {
        let reply = self.transport.call(
            "adjust_pip",
            &[json!(dx), json!(dy), json!(dw), json!(dh)],
        )?;
        reply
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| unexpected("adjust_pip", reply))
    }

    /// Start a new recording segment.
    pub fn new_record(&self) -> Result<bool, ControllerError> {
        self.call_bool("new_record", &[])
    }

    pub fn click_video(&self, x: i64, y: i64, fw: i64, fh: i64) -> Result<bool, ControllerError> {
        if fw <= 0 || fh <= 0 {
            return Err(ControllerError::InvalidArgument(format!(
                "frame size must be positive, got {}x{}",
                fw, fh
            )));
        }
        self.call_bool("click_video", &[json!(x), json!(y), json!(fw), json!(fh)])
    }

    pub fn on_new_mode_online<F>(&self, callback: F) -> Result<(), ControllerError>
    where
        F: Fn(CompositeMode) + Send + Sync + 'static,
    {
        self.transport.subscribe(
            "new_mode_online",
            Box::new(move |args: &[Value]| {
                match args.first().and_then(Value::as_i64).map(CompositeMode::try_from) {
                    Some(Ok(mode)) => callback(mode),
                    _ => tracing::warn!("ignoring malformed new_mode_online signal: {:?}", args),
                }
            }),
        )
    }

    pub fn on_preview_port_added<F>(&self, callback: F) -> Result<(), ControllerError>
    where
        F: Fn(PreviewPort) + Send + Sync + 'static,
    {
        self.subscribe_preview("preview_port_added", callback)
    }

    pub fn on_preview_port_removed<F>(&self, callback: F) -> Result<(), ControllerError>
    where
        F: Fn(PreviewPort) + Send + Sync + 'static,
    {
        self.subscribe_preview("preview_port_removed", callback)
    }

    fn subscribe_preview<F>(&self, signal: &'static str, callback: F) -> Result<(), ControllerError>
    where
        F: Fn(PreviewPort) + Send + Sync + 'static,
    {
        self.transport.subscribe(
            signal,
            Box::new(move |args: &[Value]| match PreviewPort::from_args(args) {
                Some(port) => callback(port),
                None => tracing::warn!("ignoring malformed {} signal: {:?}", signal, args),
            }),
        )
    }

    fn call_int(&self, method: &str, args: &[Value]) -> Result<i64, ControllerError> {
        let reply = self.transport.call(method, args)?;
        reply.as_i64().ok_or_else(|| unexpected(method, reply))
    }

    fn call_bool(&self, method: &str, args: &[Value]) -> Result<bool, ControllerError> {
        let reply = self.transport.call(method, args)?;
        reply.as_bool().ok_or_else(|| unexpected(method, reply))
    }
}

fn unexpected(method: &str, reply: Value) -> ControllerError {
    ControllerError::UnexpectedReply {
        method: method.to_string(),
        reply,
    }
}

fn validate_port(port: i64) -> Result<(), ControllerError> {
    if !(1..=65535).contains(&port) {
        return Err(ControllerError::InvalidArgument(format!(
            "port must be in range 1 to 65535, got {}",
            port
        )));
    }
    Ok(())
}
