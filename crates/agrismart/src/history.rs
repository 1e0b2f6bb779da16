//! Typed history records on top of a [`DocumentStore`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use advisor::{CropRecommendationInput, CropRecommendationOutput, PlantDiseaseOutput};

use crate::errors::{StoreError, StoreResult};
use crate::store::{Document, DocumentStore};

/// History sub-collections under `users/{uid}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HistoryCollection {
    CropRecommendations,
    DiseaseDetections,
}

impl HistoryCollection {
    pub const ALL: [Self; 2] = [Self::CropRecommendations, Self::DiseaseDetections];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CropRecommendations => "cropRecommendations",
            Self::DiseaseDetections => "diseaseDetections",
        }
    }
}

impl fmt::Display for HistoryCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryCollection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cropRecommendations" | "crop-recommendations" => Ok(Self::CropRecommendations),
            "diseaseDetections" | "disease-detections" => Ok(Self::DiseaseDetections),
            other => Err(other.to_string()),
        }
    }
}

/// A stored crop recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropRecommendationRecord {
    pub id: String,
    pub user_id: String,
    pub inputs: CropRecommendationInput,
    pub output: CropRecommendationOutput,
    pub created_at: DateTime<Utc>,
}

/// A stored plant disease diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseDetectionRecord {
    pub id: String,
    pub user_id: String,
    pub photo_data_uri: String,
    pub output: PlantDiseaseOutput,
    pub created_at: DateTime<Utc>,
}

/// Both collections for one user, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub crop_recommendations: Vec<CropRecommendationRecord>,
    pub disease_detections: Vec<DiseaseDetectionRecord>,
}

/// Per-user history of successful advisor results.
#[derive(Clone)]
pub struct History {
    store: Arc<dyn DocumentStore>,
}

impl History {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub async fn record_crop_recommendation(
        &self,
        uid: &str,
        inputs: &CropRecommendationInput,
        output: &CropRecommendationOutput,
    ) -> StoreResult<CropRecommendationRecord> {
        let data = json!({ "userId": uid, "inputs": inputs, "output": output });
        let document = self
            .store
            .add_document(uid, HistoryCollection::CropRecommendations.as_str(), data)
            .await?;
        info!(uid, id = %document.id, "Crop recommendation saved");
        from_document(&document)
    }

    pub async fn record_disease_detection(
        &self,
        uid: &str,
        photo_data_uri: &str,
        output: &PlantDiseaseOutput,
    ) -> StoreResult<DiseaseDetectionRecord> {
        let data = json!({ "userId": uid, "photoDataUri": photo_data_uri, "output": output });
        let document = self
            .store
            .add_document(uid, HistoryCollection::DiseaseDetections.as_str(), data)
            .await?;
        info!(uid, id = %document.id, "Disease detection saved");
        from_document(&document)
    }

    pub async fn list_crop_recommendations(
        &self,
        uid: &str,
    ) -> StoreResult<Vec<CropRecommendationRecord>> {
        self.list(uid, HistoryCollection::CropRecommendations).await
    }

    pub async fn list_disease_detections(&self, uid: &str) -> StoreResult<Vec<DiseaseDetectionRecord>> {
        self.list(uid, HistoryCollection::DiseaseDetections).await
    }

    pub async fn list_all(&self, uid: &str) -> StoreResult<HistoryView> {
        Ok(HistoryView {
            crop_recommendations: self.list_crop_recommendations(uid).await?,
            disease_detections: self.list_disease_detections(uid).await?,
        })
    }

    /// Delete one record owned by `uid`.
    pub async fn delete(&self, uid: &str, collection: HistoryCollection, id: &str) -> StoreResult<()> {
        self.store
            .delete_document(uid, collection.as_str(), id)
            .await?;
        info!(uid, %collection, id, "History record deleted");
        Ok(())
    }

    /// Records that no longer match the expected shape are skipped.
    async fn list<T: DeserializeOwned>(
        &self,
        uid: &str,
        collection: HistoryCollection,
    ) -> StoreResult<Vec<T>> {
        let documents = self.store.list_documents(uid, collection.as_str()).await?;
        Ok(documents
            .iter()
            .filter_map(|document| match from_document(document) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(uid, %collection, id = %document.id, error = %e, "Skipping malformed record");
                    None
                }
            })
            .collect())
    }
}

fn from_document<T: DeserializeOwned>(document: &Document) -> StoreResult<T> {
    serde_json::from_value(document.to_value()?).map_err(StoreError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn history() -> History {
        History::new(Arc::new(MemoryStore::new()))
    }

    fn inputs() -> CropRecommendationInput {
        CropRecommendationInput {
            nitrogen: 70.0,
            phosphorus: 75.0,
            potassium: 105.0,
            temperature: 25.0,
            humidity: 50.0,
            ph: 7.0,
            rainfall: 160.0,
        }
    }

    fn crop_output() -> CropRecommendationOutput {
        CropRecommendationOutput {
            recommended_crop: "Chickpea".to_string(),
            fertilizer: "DAP".to_string(),
            tips: "* Sow after the rains".to_string(),
        }
    }

    #[tokio::test]
    async fn test_record_and_list_crop_recommendations() {
        let history = history();
        let first = history
            .record_crop_recommendation("u1", &inputs(), &crop_output())
            .await
            .unwrap();
        let second = history
            .record_crop_recommendation("u1", &inputs(), &crop_output())
            .await
            .unwrap();

        assert_ne!(first.id, second.id);
        assert!(second.created_at > first.created_at);
        assert_eq!(first.user_id, "u1");
        assert_eq!(first.inputs, inputs());

        let listed = history.list_crop_recommendations("u1").await.unwrap();
        assert_eq!(listed, vec![second, first]);
    }

    #[tokio::test]
    async fn test_delete_removes_record() {
        let history = history();
        let record = history
            .record_disease_detection(
                "u1",
                "data:image/png;base64,iVBORw0KGgo=",
                &PlantDiseaseOutput {
                    disease: "Leaf Rust".to_string(),
                    confidence: "90%".to_string(),
                    cure_instructions: "Apply fungicide".to_string(),
                    prevention_tips: "Plant resistant varieties".to_string(),
                },
            )
            .await
            .unwrap();

        let view = history.list_all("u1").await.unwrap();
        assert_eq!(view.disease_detections.len(), 1);
        assert!(view.crop_recommendations.is_empty());

        history
            .delete("u1", HistoryCollection::DiseaseDetections, &record.id)
            .await
            .unwrap();
        assert!(history.list_disease_detections("u1").await.unwrap().is_empty());
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(
            "cropRecommendations".parse::<HistoryCollection>(),
            Ok(HistoryCollection::CropRecommendations)
        );
        assert_eq!(
            "disease-detections".parse::<HistoryCollection>(),
            Ok(HistoryCollection::DiseaseDetections)
        );
        assert!("tasks".parse::<HistoryCollection>().is_err());
        assert_eq!(HistoryCollection::DiseaseDetections.to_string(), "diseaseDetections");
    }
}
