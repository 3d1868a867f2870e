use serde_json::Value;

use super::types::ControllerError;

/// Callback for a server-pushed signal; receives the signal arguments.
pub type SignalHandler = Box<dyn Fn(&[Value]) + Send + Sync>;

/// Remote procedure channel to a running server.
///
/// The wire protocol lives behind this trait; the facade only needs named
/// calls with positional arguments and signal subscriptions.
pub trait Transport {
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, ControllerError>;

    fn subscribe(&self, signal: &str, handler: SignalHandler) -> Result<(), ControllerError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, ControllerError> {
        (**self).call(method, args)
    }

    fn subscribe(&self, signal: &str, handler: SignalHandler) -> Result<(), ControllerError> {
        (**self).subscribe(signal, handler)
    }
}
