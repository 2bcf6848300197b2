//! Typed packet model and its mapping to the codec's value tree.
//!
//! A [`Packet`] is the root dictionary of every frame.  Only populated fields
//! are written; an absent field never appears on the wire as a null marker.
//! Fields are written in the order they are declared here.

use tracing::trace;

use crate::protocol::codec::{ProtocolError, Value};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Default TCP port of the remote server.
pub const DEFAULT_PORT: u16 = 9512;

/// `Action` code of a heartbeat packet.
pub const ACTION_KEEP_ALIVE: u8 = 0;

/// `Action` code of an authentication packet.
pub const ACTION_AUTHENTICATE: u8 = 1;

/// `Action` code used to run an ad-hoc remote action.
pub const ACTION_RUN: u8 = 7;

/// Control type code of the synthetic envelope control.
///
/// The server only dispatches actions that arrive attached to a control, so
/// every ad-hoc action is wrapped in a single control of this type.
pub const SYNTHETIC_CONTROL_TYPE: u8 = 8;

mod field {
    pub const ACTION: &str = "Action";
    pub const REQUEST: &str = "Request";
    pub const RESPONSE: &str = "Response";
    pub const KEEP_ALIVE: &str = "KeepAlive";
    pub const RUN: &str = "Run";
    pub const SESSION: &str = "Session";
    pub const SOURCE: &str = "Source";
    pub const DESTINATION: &str = "Destination";
    pub const VERSION: &str = "Version";
    pub const PASSWORD: &str = "Password";
    pub const ID: &str = "ID";
    pub const LAYOUT: &str = "Layout";

    pub const NAME: &str = "Name";
    pub const TARGET: &str = "Target";
    pub const EXTRAS: &str = "Extras";
    pub const KEY: &str = "Key";
    pub const VALUE: &str = "Value";

    pub const CONTROLS: &str = "Controls";
    pub const TYPE: &str = "Type";
    pub const ON_ACTION: &str = "OnAction";
    pub const CHILDREN: &str = "Children";
}

// ── Packet ────────────────────────────────────────────────────────────────────

/// Root dictionary of a frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    pub action: Option<u8>,
    pub request: Option<u8>,
    pub response: Option<u8>,
    pub keep_alive: Option<bool>,
    /// Action to execute on the server.
    pub run: Option<Action>,
    pub session: Option<String>,
    pub source: Option<String>,
    /// Optional target device id when the server relays to another device.
    pub destination: Option<String>,
    pub version: Option<i32>,
    pub password: Option<String>,
    /// Remote/plugin identifier.
    pub id: Option<String>,
    pub layout: Option<Layout>,
}

impl Packet {
    /// Builds a heartbeat packet.
    pub fn keep_alive() -> Self {
        Self {
            action: Some(ACTION_KEEP_ALIVE),
            keep_alive: Some(true),
            ..Default::default()
        }
    }

    /// Builds a packet that runs `action` on the server.
    ///
    /// The action is carried both in `Run` and inside the synthetic layout
    /// envelope the server dispatches on.
    pub fn run(action: Action) -> Self {
        Self {
            action: Some(ACTION_RUN),
            request: Some(ACTION_RUN),
            layout: Some(Layout::synthetic(action.clone())),
            run: Some(action),
            ..Default::default()
        }
    }

    /// Sets the `Source` field.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the `Destination` field.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Returns `true` if this packet is a heartbeat (request or echo).
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive == Some(true)
    }

    /// Converts the populated fields into dictionary entries in declared order.
    pub fn to_entries(&self) -> Vec<(String, Value)> {
        let mut out = Vec::new();
        push_opt(&mut out, field::ACTION, self.action.map(Value::Byte));
        push_opt(&mut out, field::REQUEST, self.request.map(Value::Byte));
        push_opt(&mut out, field::RESPONSE, self.response.map(Value::Byte));
        push_opt(&mut out, field::KEEP_ALIVE, self.keep_alive.map(Value::Boolean));
        push_opt(&mut out, field::RUN, self.run.as_ref().map(Action::to_value));
        push_opt(&mut out, field::SESSION, self.session.clone().map(Value::String));
        push_opt(&mut out, field::SOURCE, self.source.clone().map(Value::String));
        push_opt(
            &mut out,
            field::DESTINATION,
            self.destination.clone().map(Value::String),
        );
        push_opt(&mut out, field::VERSION, self.version.map(Value::Integer));
        push_opt(&mut out, field::PASSWORD, self.password.clone().map(Value::String));
        push_opt(&mut out, field::ID, self.id.clone().map(Value::String));
        push_opt(&mut out, field::LAYOUT, self.layout.as_ref().map(Layout::to_value));
        out
    }

    /// Builds a packet from root dictionary entries.
    ///
    /// Unknown fields are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FieldType`] when a known field has the wrong type.
    pub fn from_entries(entries: Vec<(String, Value)>) -> Result<Self, ProtocolError> {
        let mut packet = Packet::default();
        for (name, value) in entries {
            match name.as_str() {
                field::ACTION => packet.action = Some(expect_byte(&name, value)?),
                field::REQUEST => packet.request = Some(expect_byte(&name, value)?),
                field::RESPONSE => packet.response = Some(expect_byte(&name, value)?),
                field::KEEP_ALIVE => packet.keep_alive = Some(expect_bool(&name, value)?),
                field::RUN => packet.run = Some(Action::from_value(&name, value)?),
                field::SESSION => packet.session = Some(expect_string(&name, value)?),
                field::SOURCE => packet.source = Some(expect_string(&name, value)?),
                field::DESTINATION => packet.destination = Some(expect_string(&name, value)?),
                field::VERSION => packet.version = Some(expect_int(&name, value)?),
                field::PASSWORD => packet.password = Some(expect_string(&name, value)?),
                field::ID => packet.id = Some(expect_string(&name, value)?),
                field::LAYOUT => packet.layout = Some(Layout::from_value(&name, value)?),
                _ => trace!(field = %name, "skipping unknown packet field"),
            }
        }
        Ok(packet)
    }
}

// ── Action ────────────────────────────────────────────────────────────────────

/// A server-side action selected by `name` + `target`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Action {
    /// Action name, e.g. `"Stroke"`.
    pub name: String,
    /// Namespace, e.g. `"Core.Input"`.
    pub target: String,
    pub extras: Extras,
}

impl Action {
    /// Creates an action with no extras.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            extras: Extras::default(),
        }
    }

    /// Appends a positional (empty-key) extra.
    pub fn arg(mut self, value: impl Into<ExtraValue>) -> Self {
        self.extras.push_positional(value);
        self
    }

    /// Appends a named extra.
    pub fn named(mut self, key: impl Into<String>, value: impl Into<ExtraValue>) -> Self {
        self.extras.push(key, value);
        self
    }

    fn to_value(&self) -> Value {
        let mut entries = vec![
            (field::NAME.to_string(), Value::String(self.name.clone())),
            (field::TARGET.to_string(), Value::String(self.target.clone())),
        ];
        if !self.extras.is_empty() {
            entries.push((field::EXTRAS.to_string(), self.extras.to_value()));
        }
        Value::Dictionary(entries)
    }

    fn from_value(name: &str, value: Value) -> Result<Self, ProtocolError> {
        let mut action = Action::default();
        for (key, value) in expect_dictionary(name, value)? {
            match key.as_str() {
                field::NAME => action.name = expect_string(&key, value)?,
                field::TARGET => action.target = expect_string(&key, value)?,
                field::EXTRAS => action.extras = Extras::from_value(&key, value)?,
                _ => trace!(field = %key, "skipping unknown action field"),
            }
        }
        Ok(action)
    }
}

// ── Extras ────────────────────────────────────────────────────────────────────

/// A scalar value carried in [`Extras`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraValue {
    String(String),
    Integer(i32),
    Boolean(bool),
    Byte(u8),
    Binary(Vec<u8>),
    Number(f64),
}

impl ExtraValue {
    fn to_value(&self) -> Value {
        match self {
            ExtraValue::String(s) => Value::String(s.clone()),
            ExtraValue::Integer(i) => Value::Integer(*i),
            ExtraValue::Boolean(b) => Value::Boolean(*b),
            ExtraValue::Byte(b) => Value::Byte(*b),
            ExtraValue::Binary(b) => Value::Binary(b.clone()),
            ExtraValue::Number(n) => Value::Number(*n),
        }
    }

    fn from_value(name: &str, value: Value) -> Result<Self, ProtocolError> {
        match value {
            Value::String(s) => Ok(ExtraValue::String(s)),
            Value::Integer(i) => Ok(ExtraValue::Integer(i)),
            Value::Boolean(b) => Ok(ExtraValue::Boolean(b)),
            Value::Byte(b) => Ok(ExtraValue::Byte(b)),
            Value::Binary(b) => Ok(ExtraValue::Binary(b)),
            Value::Number(n) => Ok(ExtraValue::Number(n)),
            other => Err(type_error(name, &other)),
        }
    }

    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtraValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for ExtraValue {
    fn from(s: &str) -> Self {
        ExtraValue::String(s.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(s: String) -> Self {
        ExtraValue::String(s)
    }
}

impl From<i32> for ExtraValue {
    fn from(i: i32) -> Self {
        ExtraValue::Integer(i)
    }
}

impl From<bool> for ExtraValue {
    fn from(b: bool) -> Self {
        ExtraValue::Boolean(b)
    }
}

impl From<u8> for ExtraValue {
    fn from(b: u8) -> Self {
        ExtraValue::Byte(b)
    }
}

impl From<Vec<u8>> for ExtraValue {
    fn from(b: Vec<u8>) -> Self {
        ExtraValue::Binary(b)
    }
}

impl From<f64> for ExtraValue {
    fn from(n: f64) -> Self {
        ExtraValue::Number(n)
    }
}

/// Ordered key/value list attached to an [`Action`].
///
/// An empty key means "append to the positional list"; positional entries
/// keep their insertion order on the wire, which is how multi-key strokes
/// encode press order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extras(Vec<(String, ExtraValue)>);

impl Extras {
    /// Appends a named entry.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<ExtraValue>) {
        self.0.push((key.into(), value.into()));
    }

    /// Appends a positional entry (empty key).
    pub fn push_positional(&mut self, value: impl Into<ExtraValue>) {
        self.0.push((String::new(), value.into()));
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&ExtraValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterates over positional values in insertion order.
    pub fn positional(&self) -> impl Iterator<Item = &ExtraValue> {
        self.0.iter().filter(|(k, _)| k.is_empty()).map(|(_, v)| v)
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExtraValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn to_value(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|(k, v)| {
                    Value::Dictionary(vec![
                        (field::KEY.to_string(), Value::String(k.clone())),
                        (field::VALUE.to_string(), v.to_value()),
                    ])
                })
                .collect(),
        )
    }

    fn from_value(name: &str, value: Value) -> Result<Self, ProtocolError> {
        let mut extras = Extras::default();
        for item in expect_array(name, value)? {
            let mut key = None;
            let mut val = None;
            for (k, v) in expect_dictionary(name, item)? {
                match k.as_str() {
                    field::KEY => key = Some(expect_string(&k, v)?),
                    field::VALUE => val = Some(ExtraValue::from_value(&k, v)?),
                    _ => trace!(field = %k, "skipping unknown extras field"),
                }
            }
            let val = val.ok_or(ProtocolError::MissingField(field::VALUE))?;
            extras.0.push((key.unwrap_or_default(), val));
        }
        Ok(extras)
    }
}

// ── Layout / Control ──────────────────────────────────────────────────────────

/// Control tree envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub controls: Vec<Control>,
}

impl Layout {
    /// Wraps `action` in a single control of [`SYNTHETIC_CONTROL_TYPE`].
    pub fn synthetic(action: Action) -> Self {
        Self {
            controls: vec![Control {
                control_type: SYNTHETIC_CONTROL_TYPE,
                on_action: Some(action),
                children: Vec::new(),
            }],
        }
    }

    fn to_value(&self) -> Value {
        Value::Dictionary(vec![(
            field::CONTROLS.to_string(),
            Value::Array(self.controls.iter().map(Control::to_value).collect()),
        )])
    }

    fn from_value(name: &str, value: Value) -> Result<Self, ProtocolError> {
        let mut layout = Layout::default();
        for (key, value) in expect_dictionary(name, value)? {
            if key == field::CONTROLS {
                layout.controls = expect_array(&key, value)?
                    .into_iter()
                    .map(|c| Control::from_value(field::CONTROLS, c))
                    .collect::<Result<_, _>>()?;
            }
        }
        Ok(layout)
    }
}

/// A control node: a type discriminator plus the action it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub control_type: u8,
    pub on_action: Option<Action>,
    pub children: Vec<Control>,
}

impl Control {
    fn to_value(&self) -> Value {
        let mut entries = vec![(field::TYPE.to_string(), Value::Byte(self.control_type))];
        if let Some(action) = &self.on_action {
            entries.push((field::ON_ACTION.to_string(), action.to_value()));
        }
        if !self.children.is_empty() {
            entries.push((
                field::CHILDREN.to_string(),
                Value::Array(self.children.iter().map(Control::to_value).collect()),
            ));
        }
        Value::Dictionary(entries)
    }

    fn from_value(name: &str, value: Value) -> Result<Self, ProtocolError> {
        let mut control_type = None;
        let mut on_action = None;
        let mut children = Vec::new();
        for (key, value) in expect_dictionary(name, value)? {
            match key.as_str() {
                field::TYPE => control_type = Some(expect_byte(&key, value)?),
                field::ON_ACTION => on_action = Some(Action::from_value(&key, value)?),
                field::CHILDREN => {
                    children = expect_array(&key, value)?
                        .into_iter()
                        .map(|c| Control::from_value(field::CHILDREN, c))
                        .collect::<Result<_, _>>()?;
                }
                _ => trace!(field = %key, "skipping unknown control field"),
            }
        }
        Ok(Control {
            control_type: control_type.ok_or(ProtocolError::MissingField(field::TYPE))?,
            on_action,
            children,
        })
    }
}

// ── Typed accessors ───────────────────────────────────────────────────────────

fn push_opt(out: &mut Vec<(String, Value)>, name: &str, value: Option<Value>) {
    if let Some(value) = value {
        out.push((name.to_string(), value));
    }
}

fn type_error(name: &str, value: &Value) -> ProtocolError {
    ProtocolError::FieldType {
        field: name.to_string(),
        tag: value.tag(),
    }
}

fn expect_byte(name: &str, value: Value) -> Result<u8, ProtocolError> {
    match value {
        Value::Byte(b) => Ok(b),
        other => Err(type_error(name, &other)),
    }
}

fn expect_bool(name: &str, value: Value) -> Result<bool, ProtocolError> {
    match value {
        Value::Boolean(b) => Ok(b),
        other => Err(type_error(name, &other)),
    }
}

fn expect_int(name: &str, value: Value) -> Result<i32, ProtocolError> {
    match value {
        Value::Integer(i) => Ok(i),
        other => Err(type_error(name, &other)),
    }
}

fn expect_string(name: &str, value: Value) -> Result<String, ProtocolError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(type_error(name, &other)),
    }
}

fn expect_dictionary(name: &str, value: Value) -> Result<Vec<(String, Value)>, ProtocolError> {
    match value {
        Value::Dictionary(entries) => Ok(entries),
        other => Err(type_error(name, &other)),
    }
}

fn expect_array(name: &str, value: Value) -> Result<Vec<Value>, ProtocolError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(type_error(name, &other)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::codec::{decode_packet, encode_packet, tag};

    fn round_trip(packet: &Packet) -> Packet {
        let bytes = encode_packet(packet).expect("encode failed");
        decode_packet(&bytes).expect("decode failed")
    }

    #[test]
    fn test_empty_packet_encodes_to_bare_root() {
        let bytes = encode_packet(&Packet::default()).unwrap();
        assert_eq!(bytes, vec![tag::ROOT, tag::END]);
    }

    #[test]
    fn test_keep_alive_wire_form_is_exact() {
        // Arrange
        let mut expected = vec![tag::ROOT, tag::BYTE];
        expected.extend_from_slice(b"Action\0");
        expected.push(ACTION_KEEP_ALIVE);
        expected.push(tag::BOOLEAN);
        expected.extend_from_slice(b"KeepAlive\0");
        expected.push(1);
        expected.push(tag::END);

        // Act
        let bytes = encode_packet(&Packet::keep_alive()).unwrap();

        // Assert
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_unset_fields_are_omitted() {
        let packet = Packet {
            version: Some(3),
            ..Default::default()
        };
        let entries = packet.to_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "Version");
    }

    #[test]
    fn test_fields_are_written_in_declared_order() {
        // Arrange: populate fields out of declaration order
        let packet = Packet {
            id: Some("Relmtech.Basic Input".into()),
            action: Some(ACTION_RUN),
            password: Some("secret".into()),
            keep_alive: Some(false),
            ..Default::default()
        };

        // Act
        let names: Vec<String> = packet.to_entries().into_iter().map(|(n, _)| n).collect();

        // Assert
        assert_eq!(names, vec!["Action", "KeepAlive", "Password", "ID"]);
    }

    #[test]
    fn test_full_packet_round_trip() {
        let action = Action::new("Stroke", "Core.Input")
            .arg("CTRL")
            .arg("C")
            .named("count", 2)
            .named("flag", true)
            .named("raw", vec![1u8, 2, 3])
            .named("ratio", 0.5)
            .named("b", 9u8);
        let packet = Packet {
            response: Some(2),
            session: Some("session-1".into()),
            version: Some(10),
            password: Some("pw".into()),
            id: Some("remote".into()),
            ..Packet::run(action)
        }
        .with_source("android-client")
        .with_destination("device-7");

        assert_eq!(round_trip(&packet), packet);
    }

    #[test]
    fn test_run_packet_wraps_action_in_synthetic_control() {
        // Arrange
        let action = Action::new("Text", "Core.Input").arg("hi");

        // Act
        let packet = Packet::run(action.clone());

        // Assert
        assert_eq!(packet.action, Some(ACTION_RUN));
        assert_eq!(packet.request, Some(ACTION_RUN));
        assert_eq!(packet.run.as_ref(), Some(&action));
        let layout = packet.layout.expect("layout must be set");
        assert_eq!(layout.controls.len(), 1);
        assert_eq!(layout.controls[0].control_type, SYNTHETIC_CONTROL_TYPE);
        assert_eq!(layout.controls[0].on_action.as_ref(), Some(&action));
    }

    #[test]
    fn test_nested_control_children_round_trip() {
        let packet = Packet {
            layout: Some(Layout {
                controls: vec![Control {
                    control_type: 1,
                    on_action: None,
                    children: vec![Control {
                        control_type: 2,
                        on_action: Some(Action::new("Click", "Core.Input").arg("left")),
                        children: Vec::new(),
                    }],
                }],
            }),
            ..Default::default()
        };
        assert_eq!(round_trip(&packet), packet);
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        // Arrange: a known field surrounded by unknown nested structures
        let entries = vec![
            (
                "Future".to_string(),
                Value::Dictionary(vec![(
                    "Deep".to_string(),
                    Value::Array(vec![Value::Number(1.0), Value::Binary(vec![0, 0])]),
                )]),
            ),
            ("Version".to_string(), Value::Integer(4)),
            ("Capabilities".to_string(), Value::Byte(0xFF)),
        ];
        let bytes = crate::protocol::codec::encode_root(&entries).unwrap();

        // Act
        let packet = decode_packet(&bytes).unwrap();

        // Assert
        assert_eq!(
            packet,
            Packet {
                version: Some(4),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_known_field_with_wrong_type_is_rejected() {
        let bytes = crate::protocol::codec::encode_root(&[(
            "KeepAlive".to_string(),
            Value::String("yes".into()),
        )])
        .unwrap();
        assert_eq!(
            decode_packet(&bytes),
            Err(ProtocolError::FieldType {
                field: "KeepAlive".into(),
                tag: tag::STRING
            })
        );
    }

    #[test]
    fn test_extras_preserve_positional_order() {
        // Arrange
        let action = Action::new("Stroke", "Core.Input")
            .arg("SHIFT")
            .arg("CTRL")
            .arg("ESCAPE");

        // Act
        let decoded = round_trip(&Packet::run(action)).run.unwrap();
        let keys: Vec<&str> = decoded
            .extras
            .positional()
            .filter_map(ExtraValue::as_str)
            .collect();

        // Assert
        assert_eq!(keys, vec!["SHIFT", "CTRL", "ESCAPE"]);
    }

    #[test]
    fn test_extras_entry_without_value_is_rejected() {
        let bytes = crate::protocol::codec::encode_root(&[(
            "Run".to_string(),
            Value::Dictionary(vec![(
                "Extras".to_string(),
                Value::Array(vec![Value::Dictionary(vec![(
                    "Key".to_string(),
                    Value::String("x".into()),
                )])]),
            )]),
        )])
        .unwrap();
        assert_eq!(
            decode_packet(&bytes),
            Err(ProtocolError::MissingField("Value"))
        );
    }

    #[test]
    fn test_extras_get_returns_first_named_value() {
        let mut extras = Extras::default();
        extras.push("k", 1);
        extras.push("k", 2);
        assert_eq!(extras.get("k"), Some(&ExtraValue::Integer(1)));
        assert_eq!(extras.get("missing"), None);
    }

    #[test]
    fn test_is_keep_alive() {
        assert!(Packet::keep_alive().is_keep_alive());
        assert!(!Packet::default().is_keep_alive());
    }
}
