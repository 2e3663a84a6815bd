use serde::{Deserialize, Serialize};

/// The three agent status labels the lifecycle engine reacts to. Every other
/// label the desk reports is opaque.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct StatusLabels {
    pub ready: String,
    pub talking: String,
    pub wrap_up: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            ready: "Готов".into(),
            talking: "Разговор".into(),
            wrap_up: "Завершение".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Ready,
    Talking,
    WrapUp,
    Other,
}

impl StatusLabels {
    pub fn kind_of(&self, label: &str) -> StatusKind {
        if label == self.talking {
            StatusKind::Talking
        } else if label == self.wrap_up {
            StatusKind::WrapUp
        } else if label == self.ready {
            StatusKind::Ready
        } else {
            StatusKind::Other
        }
    }

    pub fn kind_of_opt(&self, label: Option<&str>) -> StatusKind {
        label.map_or(StatusKind::Other, |label| self.kind_of(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_configured_labels_are_special() {
        let labels = StatusLabels::default();
        assert_eq!(labels.kind_of("Разговор"), StatusKind::Talking);
        assert_eq!(labels.kind_of("Завершение"), StatusKind::WrapUp);
        assert_eq!(labels.kind_of("Готов"), StatusKind::Ready);
        assert_eq!(labels.kind_of("Перерыв"), StatusKind::Other);
        assert_eq!(labels.kind_of_opt(None), StatusKind::Other);
    }
}
