//! Typed calendar view of the USOS timetable.
//!
//! `tt/user` returns a flat list of activities. Each one is classified
//! into an event kind and placed on one of two system layers: regular
//! classes or exams and tests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Layer for lectures, labs and other regular classes.
pub(crate) const CLASS_LAYER: &str = "usos-class";
/// Layer for exams, tests and entry quizzes.
pub(crate) const EXAM_LAYER: &str = "usos-exam";

/// Localized USOS string.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub(crate) struct LangDict {
    pub(crate) pl: Option<String>,
    pub(crate) en: Option<String>,
}

impl LangDict {
    fn polish(&self) -> &str {
        self.pl.as_deref().unwrap_or_default()
    }
}

/// One `tt/user` activity. USOS omits or nulls fields freely.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Activity {
    start_time: String,
    end_time: String,
    name: Option<LangDict>,
    #[serde(rename = "type")]
    kind: Option<String>,
    course_id: Option<String>,
    course_name: Option<LangDict>,
    classtype_name: Option<LangDict>,
    room_number: Option<String>,
    building_name: Option<LangDict>,
}

/// Event kind shown by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum EventKind {
    Lecture,
    Lab,
    Colloquium,
    Class,
}

/// Calendar event derived from an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CalendarEvent {
    pub(crate) id: String,
    pub(crate) layer_id: &'static str,
    #[serde(rename = "type")]
    pub(crate) kind: EventKind,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) room_number: Option<String>,
    pub(crate) building_name: Option<LangDict>,
    pub(crate) course_name: Option<LangDict>,
    pub(crate) classtype_name: Option<LangDict>,
}

/// Layer metadata for the legend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct LayerDefinition {
    pub(crate) id: &'static str,
    pub(crate) name: &'static str,
    pub(crate) color: &'static str,
    pub(crate) is_system: bool,
}

/// Body of GET /api/calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct Calendar {
    pub(crate) events: Vec<CalendarEvent>,
    pub(crate) layers: BTreeMap<&'static str, LayerDefinition>,
}

impl Calendar {
    /// Build the calendar from `tt/user` activities, keeping their order.
    pub(crate) fn from_activities(activities: Vec<Activity>) -> Self {
        Self {
            events: activities.into_iter().map(CalendarEvent::from).collect(),
            layers: system_layers(),
        }
    }
}

fn system_layers() -> BTreeMap<&'static str, LayerDefinition> {
    [
        LayerDefinition {
            id: CLASS_LAYER,
            name: "Zajęcia Dydaktyczne USOS",
            color: "#005846",
            is_system: true,
        },
        LayerDefinition {
            id: EXAM_LAYER,
            name: "Egzaminy/Kolokwia USOS",
            color: "#D32F2F",
            is_system: true,
        },
    ]
    .into_iter()
    .map(|layer| (layer.id, layer))
    .collect()
}

/// Pick the layer and kind for an activity.
///
/// The class type names the kind when USOS sends one; otherwise the raw
/// activity type stands in for it. Exams are recognized by type or by
/// keywords in the activity name.
pub(crate) fn classify(activity: &Activity) -> (&'static str, EventKind) {
    let name = activity
        .name
        .as_ref()
        .map(|n| n.polish().to_lowercase())
        .unwrap_or_default();
    let kind = activity.kind.as_deref().unwrap_or_default().to_lowercase();
    let classtype = activity
        .classtype_name
        .as_ref()
        .map(|c| c.polish().to_lowercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| kind.clone());

    if classtype.contains("wykład") {
        (CLASS_LAYER, EventKind::Lecture)
    } else if classtype.contains("laboratorium") || classtype.contains("projekt") {
        (CLASS_LAYER, EventKind::Lab)
    } else if kind == "exam"
        || ["kolokwium", "egzamin", "wejściówka"]
            .iter()
            .any(|word| name.contains(word))
    {
        (EXAM_LAYER, EventKind::Colloquium)
    } else {
        (CLASS_LAYER, EventKind::Class)
    }
}

impl From<Activity> for CalendarEvent {
    fn from(activity: Activity) -> Self {
        let (layer_id, kind) = classify(&activity);
        let title = activity
            .name
            .as_ref()
            .map(|n| n.polish().to_owned())
            .unwrap_or_default();
        let description = activity
            .course_name
            .as_ref()
            .map(|n| n.polish().to_owned())
            .unwrap_or_default();
        let id = format!(
            "{}{}",
            activity.start_time,
            activity.course_id.as_deref().unwrap_or(&title)
        );

        Self {
            id,
            layer_id,
            kind,
            start_time: activity.start_time,
            end_time: activity.end_time,
            title,
            description,
            room_number: activity.room_number,
            building_name: activity.building_name,
            course_name: activity.course_name,
            classtype_name: activity.classtype_name,
        }
    }
}
