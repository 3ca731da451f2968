use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Ok,
    Info,
    Warning,
    Error,
}

/// Client instruction embedded in a response body, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Message {
    Notify {
        title: String,
        #[serde(rename = "msg")]
        message: String,
        level: NotificationLevel,
    },
    Reload {
        delay: u32,
    },
}

impl Message {
    pub fn notify(title: impl Into<String>, message: impl Into<String>, level: NotificationLevel) -> Self {
        Message::Notify {
            title: title.into(),
            message: message.into(),
            level,
        }
    }

    pub fn reload() -> Self {
        Message::Reload { delay: 0 }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
