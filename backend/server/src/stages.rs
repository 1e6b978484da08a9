//! Project stages: the progress ladder a project climbs, with what each rung
//! requires of the project page.
use serde::Serialize;

use crate::models::Project;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Summary,
    Description,
    Image,
    SourceLink,
    WebpageLink,
    ContactLink,
    Nothing,
}

impl Requirement {
    pub fn is_met(self, project: &Project) -> bool {
        let filled =
            |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        match self {
            Self::Summary => project
                .summary
                .as_deref()
                .is_some_and(|s| s.trim().chars().count() >= 10),
            Self::Description => project.longtext.trim().chars().count() >= 50,
            Self::Image => filled(&project.image_url),
            Self::SourceLink => filled(&project.source_url),
            Self::WebpageLink => filled(&project.webpage_url),
            Self::ContactLink => filled(&project.contact_url),
            Self::Nothing => true,
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Self::Summary => "Write a short summary of at least 10 characters.",
            Self::Description => "Describe the project in at least 50 characters.",
            Self::Image => "Add an image or logo.",
            Self::SourceLink => "Link to the source code.",
            Self::WebpageLink => "Link to a demo or project page.",
            Self::ContactLink => "Add a way to contact the team.",
            Self::Nothing => "",
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Stage {
    pub id: i64,
    pub name: &'static str,
    pub description: &'static str,
    pub requirement: Requirement,
}

pub const STAGES: &[Stage] = &[
    Stage {
        id: -1,
        name: "Challenge",
        description: "A problem statement looking for a team.",
        requirement: Requirement::Summary,
    },
    Stage {
        id: 5,
        name: "Researching",
        description: "The team is getting to know the problem.",
        requirement: Requirement::Description,
    },
    Stage {
        id: 10,
        name: "Sketching",
        description: "Ideas are taking shape.",
        requirement: Requirement::Image,
    },
    Stage {
        id: 20,
        name: "Prototyping",
        description: "Something runs.",
        requirement: Requirement::SourceLink,
    },
    Stage {
        id: 30,
        name: "Releasing",
        description: "Others can try it out.",
        requirement: Requirement::WebpageLink,
    },
    Stage {
        id: 50,
        name: "Launching",
        description: "Ready for the world.",
        requirement: Requirement::ContactLink,
    },
    Stage {
        id: 100,
        name: "Finished",
        description: "Done for this event.",
        requirement: Requirement::Nothing,
    },
];

pub fn stage_by_id(id: i64) -> Option<&'static Stage> {
    STAGES.iter().find(|s| s.id == id)
}

/// The project's stage, or the first stage when its progress matches none,
/// and whether the stage requirement holds.
pub fn validate_project_data(project: &Project) -> (&'static Stage, bool) {
    let stage = project
        .progress
        .and_then(stage_by_id)
        .unwrap_or(&STAGES[0]);
    (stage, stage.requirement.is_met(project))
}

/// Stage to promote to, if the current requirements hold and there is one.
/// Unknown or non-positive progress counts as the first stage.
pub fn next_stage(project: &Project) -> Option<&'static Stage> {
    let current = project
        .progress
        .filter(|p| *p > 0)
        .and_then(|p| STAGES.iter().position(|s| s.id == p))
        .unwrap_or(0);

    if !STAGES[current].requirement.is_met(project) {
        return None;
    }
    STAGES.get(current + 1)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn project(progress: Option<i64>) -> Project {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        Project {
            id: 1,
            name: "Robot".to_string(),
            summary: None,
            image_url: None,
            source_url: None,
            webpage_url: None,
            is_webembed: false,
            contact_url: None,
            autotext_url: None,
            is_autoupdate: false,
            autotext: None,
            longtext: String::new(),
            hashtag: None,
            logo_color: None,
            logo_icon: None,
            created_at: at,
            updated_at: at,
            is_hidden: false,
            user_id: None,
            event_id: None,
            category_id: None,
            progress,
            score: None,
        }
    }

    #[test]
    fn test_stage_ids_are_ordered() {
        assert!(STAGES.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_validate_unknown_progress() {
        let p = project(Some(7));
        let (stage, valid) = validate_project_data(&p);
        assert_eq!(stage.name, "Challenge");
        assert!(!valid);
    }

    #[test]
    fn test_promotion_requires_data() {
        let mut p = project(Some(5));
        assert!(next_stage(&p).is_none());

        p.longtext = "x".repeat(60);
        assert_eq!(next_stage(&p).map(|s| s.id), Some(10));

        let (stage, valid) = validate_project_data(&p);
        assert_eq!(stage.name, "Researching");
        assert!(valid);
    }

    #[test]
    fn test_challenge_and_last_stage() {
        let mut p = project(Some(-1));
        p.summary = Some("Needs a team to build it".to_string());
        assert_eq!(next_stage(&p).map(|s| s.id), Some(5));

        let p = project(Some(100));
        assert!(next_stage(&p).is_none());
    }
}
