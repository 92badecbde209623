use serde::{Deserialize, Serialize};

/// A project as returned by the remote API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A photo or video entity as created/listed by the remote API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMedia {
    pub id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_tolerates_missing_fields() {
        let media: RemoteMedia = serde_json::from_str(r#"{"id":"m1","projectId":"p1"}"#).unwrap();
        assert_eq!(media.id, "m1");
        assert_eq!(media.project_id.as_deref(), Some("p1"));
        assert!(media.url.is_none());
    }
}
