use super::*;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct FakeTransport {
    replies: HashMap<&'static str, Value>,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    handlers: Mutex<HashMap<String, Vec<SignalHandler>>>,
}

impl FakeTransport {
    fn with_reply(mut self, method: &'static str, reply: Value) -> Self {
        self.replies.insert(method, reply);
        self
    }

    fn emit(&self, signal: &str, args: &[Value]) {
        if let Some(handlers) = self.handlers.lock().get(signal) {
            for handler in handlers {
                handler(args);
            }
        }
    }

    fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }
}

impl Transport for FakeTransport {
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, ControllerError> {
        self.calls.lock().push((method.to_string(), args.to_vec()));
        self.replies
            .get(method)
            .cloned()
            .ok_or_else(|| ControllerError::Transport(format!("no such method {}", method)))
    }

    fn subscribe(&self, signal: &str, handler: SignalHandler) -> Result<(), ControllerError> {
        self.handlers
            .lock()
            .entry(signal.to_string())
            .or_default()
            .push(handler);
        Ok(())
    }
}

#[test]
fn port_getters_return_integers() {
    let transport = FakeTransport::default()
        .with_reply("get_compose_port", json!(3001))
        .with_reply("get_encode_port", json!(3002))
        .with_reply("get_audio_port", json!(4000));
    let controller = Controller::new(transport);

    assert_eq!(controller.get_compose_port().unwrap(), 3001);
    assert_eq!(controller.get_encode_port().unwrap(), 3002);
    assert_eq!(controller.get_audio_port().unwrap(), 4000);
}

#[test]
fn non_integer_reply_is_unexpected() {
    let transport = FakeTransport::default().with_reply("get_compose_port", json!("3001"));
    let err = Controller::new(transport).get_compose_port().unwrap_err();
    assert!(matches!(err, ControllerError::UnexpectedReply { ref method, .. } if method == "get_compose_port"));
}

#[test]
fn preview_ports_are_parsed_from_server_string() {
    let transport = FakeTransport::default()
        .with_reply("get_preview_ports", json!("[(3003, 1, 7), (3004, 1, 8)]"));
    let ports = Controller::new(transport).get_preview_ports().unwrap();
    assert_eq!(
        ports,
        vec![
            PreviewPort { port: 3003, serve: 1, kind: 7 },
            PreviewPort { port: 3004, serve: 1, kind: 8 },
        ]
    );
}

#[test]
fn preview_ports_accept_json_triples_and_reject_garbage() {
    assert_eq!(
        parse_preview_ports(&json!([[3003, 2, 9]])),
        Some(vec![PreviewPort { port: 3003, serve: 2, kind: 9 }])
    );
    assert_eq!(parse_preview_ports(&json!("[]")), Some(vec![]));
    assert_eq!(parse_preview_ports(&json!("[(3003, 1)]")), None);
    assert_eq!(parse_preview_ports(&json!(42)), None);
}

#[test]
fn switch_sends_channel_code_and_port() {
    let transport = FakeTransport::default().with_reply("switch", json!(true));
    let controller = Controller::new(transport);

    assert!(controller.switch(Channel::VideoA, 3004).unwrap());
    assert!(controller.switch(Channel::Audio, 4001).unwrap());
    assert_eq!(
        controller.transport().calls(),
        vec![
            ("switch".to_string(), vec![json!(65), json!(3004)]),
            ("switch".to_string(), vec![json!(97), json!(4001)]),
        ]
    );
}

#[test]
fn switch_rejects_invalid_port_without_calling() {
    let controller = Controller::new(FakeTransport::default());
    assert!(matches!(
        controller.switch(Channel::VideoB, 0),
        Err(ControllerError::InvalidArgument(_))
    ));
    assert!(controller.transport().calls().is_empty());
}

#[test]
fn set_composite_mode_reports_change() {
    let transport = FakeTransport::default().with_reply("set_composite_mode", json!(false));
    let controller = Controller::new(transport);
    assert!(!controller.set_composite_mode(CompositeMode::DualEqual).unwrap());
    assert_eq!(controller.transport().calls()[0].1, vec![json!(3)]);
}

#[test]
fn composite_mode_names_and_codes() {
    assert_eq!("PIP".parse::<CompositeMode>().unwrap(), CompositeMode::Pip);
    assert_eq!("preview".parse::<CompositeMode>().unwrap(), CompositeMode::DualPreview);
    assert_eq!("equal".parse::<CompositeMode>().unwrap(), CompositeMode::DualEqual);
    assert!("tiles".parse::<CompositeMode>().is_err());
    assert_eq!(CompositeMode::try_from(0).unwrap(), CompositeMode::None);
    assert!(CompositeMode::try_from(4).is_err());
    for mode in CompositeMode::ALL {
        assert_eq!(mode.to_string().parse::<CompositeMode>().unwrap(), mode);
    }
}

#[test]
fn unknown_composite_mode_reply_is_unexpected() {
    let transport = FakeTransport::default().with_reply("get_composite_mode", json!(9));
    assert!(matches!(
        Controller::new(transport).get_composite_mode(),
        Err(ControllerError::UnexpectedReply { .. })
    ));
}

#[test]
fn adjust_pip_returns_result_flags() {
    let transport = FakeTransport::default().with_reply("adjust_pip", json!(15));
    let controller = Controller::new(transport);
    assert_eq!(controller.adjust_pip(10, 20, -5, -5).unwrap(), 15);
    assert_eq!(
        controller.transport().calls()[0].1,
        vec![json!(10), json!(20), json!(-5), json!(-5)]
    );
}

#[test]
fn new_record_and_click_video() {
    let transport = FakeTransport::default()
        .with_reply("new_record", json!(true))
        .with_reply("click_video", json!(true));
    let controller = Controller::new(transport);
    assert!(controller.new_record().unwrap());
    assert!(controller.click_video(10, 10, 300, 200).unwrap());
    assert!(controller.click_video(10, 10, 0, 200).is_err());
}

#[test]
fn transport_errors_propagate() {
    let controller = Controller::new(FakeTransport::default());
    assert!(matches!(
        controller.new_record(),
        Err(ControllerError::Transport(_))
    ));
}

#[test]
fn mode_signal_invokes_callback() {
    let transport = FakeTransport::default();
    let controller = Controller::new(&transport);
    let seen = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&seen);
    controller
        .on_new_mode_online(move |mode| sink.lock().push(mode))
        .unwrap();

    transport.emit("new_mode_online", &[json!(1)]);
    transport.emit("new_mode_online", &[json!(42)]);
    transport.emit("new_mode_online", &[]);

    assert_eq!(*seen.lock(), vec![CompositeMode::Pip]);
}

#[test]
fn preview_port_signals_invoke_callbacks() {
    let transport = FakeTransport::default();
    let controller = Controller::new(&transport);
    let added = Arc::new(Mutex::new(Vec::new()));
    let removed = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&added);
    controller
        .on_preview_port_added(move |port| sink.lock().push(port))
        .unwrap();
    let sink = Arc::clone(&removed);
    controller
        .on_preview_port_removed(move |port| sink.lock().push(port))
        .unwrap();

    transport.emit("preview_port_added", &[json!(3003), json!(1), json!(7)]);
    transport.emit("preview_port_removed", &[json!(3003), json!(1), json!(7)]);
    transport.emit("preview_port_added", &[json!("bogus")]);

    let expected = PreviewPort { port: 3003, serve: 1, kind: 7 };
    assert_eq!(*added.lock(), vec![expected]);
    assert_eq!(*removed.lock(), vec![expected]);
}

#[test]
fn channel_names() {
    assert_eq!("video-A".parse::<Channel>().unwrap(), Channel::VideoA);
    assert_eq!("video-b".parse::<Channel>().unwrap().code(), 66);
    assert!("video-c".parse::<Channel>().is_err());
}
