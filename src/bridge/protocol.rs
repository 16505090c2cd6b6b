//! JSON messages exchanged over the terminal WebSocket.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value};

/// Messages from WebSocket clients
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Attach this connection to a session, replacing any current PTY
    #[serde(rename = "attach")]
    Attach {
        session: String,
        #[serde(default, deserialize_with = "window_ref")]
        window: Option<String>,
        #[serde(default, deserialize_with = "dimension")]
        cols: Option<u16>,
        #[serde(default, deserialize_with = "dimension")]
        rows: Option<u16>,
    },

    /// Keyboard input for the PTY
    #[serde(rename = "input")]
    Input { data: String },

    /// Terminal size change
    #[serde(rename = "resize")]
    Resize {
        #[serde(default, deserialize_with = "dimension")]
        cols: Option<u16>,
        #[serde(default, deserialize_with = "dimension")]
        rows: Option<u16>,
    },
}

impl ClientMessage {
    /// Decodes a text frame. Anything that is not a known message is `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Events sent to WebSocket clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Terminal output data
    #[serde(rename = "output")]
    Output { data: String },

    /// PTY process exited
    #[serde(rename = "exit")]
    Exit { exit_code: Option<u32> },

    /// Error message
    #[serde(rename = "error")]
    Error { message: String },
}

/// Browsers send the window either as a number or as a string.
fn window_ref<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(name)) => Some(name),
        Some(Value::Number(number)) => Some(match whole_float(&number) {
            Some(f) => format!("{f:.0}"),
            None => number.to_string(),
        }),
        _ => None,
    })
}

/// A terminal size. Anything that is not an integer in `u16` range reads as
/// absent, so the default size applies.
fn dimension<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => match number.as_u64() {
            Some(n) => u16::try_from(n).ok(),
            None => whole_float(&number)
                .filter(|f| (0.0..=f64::from(u16::MAX)).contains(f))
                .map(|f| f as u16),
        },
        _ => None,
    })
}

/// `2.0` and friends, which JavaScript clients may send for integers.
fn whole_float(number: &Number) -> Option<f64> {
    number
        .as_f64()
        .filter(|f| number.is_f64() && f.fract() == 0.0)
}
