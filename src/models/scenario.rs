//! Scenario domain types and the import manifest format.
//!
//! A manifest is a JSON array of [`ScenarioDefinition`] records in
//! camelCase, either uploaded to the content store ahead of time or
//! supplied inline at batch creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Difficulty rating of a training scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioDifficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for ScenarioDifficulty {
    fn default() -> Self {
        Self::Easy
    }
}

/// Ground-truth label for a scenario's media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioOutcome {
    Real,
    Fake,
}

impl Default for ScenarioOutcome {
    fn default() -> Self {
        Self::Fake
    }
}

/// Scenario lifecycle status in the CRUD domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Draft,
    ReadyForReview,
    Published,
    Archived,
}

/// One record of an import manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: ScenarioDifficulty,
    #[serde(default)]
    pub correct_outcome: ScenarioOutcome,
    /// Content-store reference of the media asset backing this scenario.
    pub media_ref: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
}

/// A created training scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub difficulty: ScenarioDifficulty,
    pub correct_outcome: ScenarioOutcome,
    pub status: ScenarioStatus,
    pub media_asset_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub external_reference: Option<String>,
    pub tags: Vec<String>,
}

/// Input to the scenario-writer collaborator. New scenarios always start
/// in Draft.
#[derive(Debug, Clone)]
pub struct NewScenario {
    pub title: String,
    pub description: String,
    pub difficulty: ScenarioDifficulty,
    pub correct_outcome: ScenarioOutcome,
    pub media_asset_id: Uuid,
    pub created_by: Uuid,
    pub external_reference: Option<String>,
    pub tags: Vec<String>,
}

impl NewScenario {
    pub fn from_definition(
        definition: &ScenarioDefinition,
        media_asset_id: Uuid,
        created_by: Uuid,
    ) -> Self {
        Self {
            title: definition.title.clone(),
            description: definition.description.clone(),
            difficulty: definition.difficulty,
            correct_outcome: definition.correct_outcome,
            media_asset_id,
            created_by,
            external_reference: definition.external_reference.clone(),
            tags: definition.tags.clone(),
        }
    }
}

/// System roles. Only Admin matters to this core (rate-limit bypass).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Trainer,
    Learner,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_uses_camel_case() {
        let definition = ScenarioDefinition {
            title: "Interview clip".into(),
            description: "Altered voice track".into(),
            difficulty: ScenarioDifficulty::Hard,
            correct_outcome: ScenarioOutcome::Fake,
            media_ref: "uploads/2024/03/01/abc/clip.mp4".into(),
            tags: vec!["audio".into()],
            external_reference: Some("case-119".into()),
        };
        let json = serde_json::to_string(&definition).unwrap();
        assert!(json.contains("\"mediaRef\""));
        assert!(json.contains("\"correctOutcome\":\"fake\""));
        assert!(json.contains("\"externalReference\":\"case-119\""));
        assert!(!json.contains("media_ref"));
    }

    #[test]
    fn test_manifest_defaults() {
        let json = r#"{"title":"Street photo","mediaRef":"uploads/a.png"}"#;
        let definition: ScenarioDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(definition.difficulty, ScenarioDifficulty::Easy);
        assert_eq!(definition.correct_outcome, ScenarioOutcome::Fake);
        assert!(definition.tags.is_empty());
        assert!(definition.description.is_empty());
        assert!(definition.external_reference.is_none());
    }

    #[test]
    fn test_new_scenario_from_definition() {
        let definition = ScenarioDefinition {
            title: "Press briefing".into(),
            description: String::new(),
            difficulty: ScenarioDifficulty::Medium,
            correct_outcome: ScenarioOutcome::Real,
            media_ref: "uploads/b.png".into(),
            tags: vec!["video".into(), "politics".into()],
            external_reference: None,
        };
        let media_id = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let scenario = NewScenario::from_definition(&definition, media_id, actor);
        assert_eq!(scenario.title, "Press briefing");
        assert_eq!(scenario.media_asset_id, media_id);
        assert_eq!(scenario.created_by, actor);
        assert_eq!(scenario.tags.len(), 2);
    }
}
