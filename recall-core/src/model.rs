use serde::{Deserialize, Serialize};

/// Body of `POST /chat/generate`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<String>,
}

/// Body of `PUT /chat/slides/{id}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SlideUpdate {
    pub content: String,
}

/// Body of `PUT /presentations/{id}` when confirming a new slide order.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub slide_order: Vec<String>,
}

/// A saved presentation as listed by the service.
///
/// Only the fields the client reads are typed; anything else is ignored.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Presentation {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slides: Vec<crate::slide::RawSlide>,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Body of `POST /presentations`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewPresentation {
    pub title: String,
    #[serde(default)]
    pub slides: Vec<crate::slide::RawSlide>,
}
