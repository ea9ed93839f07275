//! Outbound host events

use serde::Serialize;

/// Event sent to the host over the method channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "payload")]
pub enum HostEvent {
    /// First successful session start
    #[serde(rename = "recognitionStarted")]
    RecognitionStarted,
    /// Session paused
    #[serde(rename = "recognitionPaused")]
    RecognitionPaused,
    /// First successful reset after a pause
    #[serde(rename = "recognitionResumed")]
    RecognitionResumed,
    /// An overlay was created for a recognized marker
    #[serde(rename = "onImageDetected", rename_all = "camelCase")]
    ImageDetected { image_name: String },
    /// A tap hit a rendered overlay
    #[serde(rename = "onDetectedImageTapped", rename_all = "camelCase")]
    ImageTapped { image_name: String },
}

impl HostEvent {
    /// Method name used when invoking the host
    pub fn method_name(&self) -> &'static str {
        match self {
            HostEvent::RecognitionStarted => "recognitionStarted",
            HostEvent::RecognitionPaused => "recognitionPaused",
            HostEvent::RecognitionResumed => "recognitionResumed",
            HostEvent::ImageDetected { .. } => "onImageDetected",
            HostEvent::ImageTapped { .. } => "onDetectedImageTapped",
        }
    }

    /// Marker name carried by detection and tap events
    pub fn image_name(&self) -> Option<&str> {
        match self {
            HostEvent::ImageDetected { image_name } | HostEvent::ImageTapped { image_name } => {
                Some(image_name)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let started = serde_json::to_value(HostEvent::RecognitionStarted).unwrap();
        assert_eq!(started, json!({ "event": "recognitionStarted" }));

        let detected = serde_json::to_value(HostEvent::ImageDetected {
            image_name: "poster.png".into(),
        })
        .unwrap();
        assert_eq!(
            detected,
            json!({ "event": "onImageDetected", "payload": { "imageName": "poster.png" } })
        );
    }

    #[test]
    fn test_method_name_matches_wire_tag() {
        let events = [
            HostEvent::RecognitionStarted,
            HostEvent::RecognitionPaused,
            HostEvent::RecognitionResumed,
            HostEvent::ImageDetected { image_name: "a".into() },
            HostEvent::ImageTapped { image_name: "a".into() },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.method_name());
        }
    }
}
