use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;

use crate::error::ApiError;
use crate::store::{ProfileStore, SeriesOrder, SeriesStore};
use crate::types::{Chapter, Profile, Role, Series, SeriesStatus};

pub fn table_name() -> String {
    std::env::var("TABLE_NAME").unwrap_or_else(|_| "manhwa".to_string())
}

fn series_pk(id: &str) -> String {
    format!("SERIES#{}", id)
}

fn profile_pk(id: &str) -> String {
    format!("PROFILE#{}", id)
}

fn required_s(item: &HashMap<String, AttributeValue>, field: &str) -> Result<String, ApiError> {
    item.get(field)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| ApiError::Storage(format!("item is missing required field `{}`", field)))
}

fn optional_s(item: &HashMap<String, AttributeValue>, field: &str) -> String {
    item.get(field)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Validate a raw item into a typed Series. External data is never trusted
/// uninspected: missing identity/title/version or an unparseable chapters
/// document is a storage error, not a silent default.
fn parse_series_item(item: &HashMap<String, AttributeValue>) -> Result<Series, ApiError> {
    let pk = required_s(item, "PK")?;
    let id = pk
        .strip_prefix("SERIES#")
        .ok_or_else(|| ApiError::Storage(format!("unexpected series key `{}`", pk)))?
        .to_string();

    let status_raw = required_s(item, "status")?;
    let status = SeriesStatus::parse(&status_raw)
        .ok_or_else(|| ApiError::Storage(format!("unknown series status `{}`", status_raw)))?;

    let chapters_raw = required_s(item, "chapters")?;
    let chapters: Vec<Chapter> = serde_json::from_str(&chapters_raw)
        .map_err(|e| ApiError::Storage(format!("malformed chapters document: {}", e)))?;

    let version = item
        .get("version")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| ApiError::Storage("item is missing a numeric `version`".to_string()))?;

    Ok(Series {
        id,
        title: required_s(item, "title")?,
        description: optional_s(item, "description"),
        status,
        cover_url: optional_s(item, "cover_url"),
        chapters,
        version,
        created_at: required_s(item, "created_at")?,
        updated_at: required_s(item, "updated_at")?,
    })
}

fn parse_profile_item(item: &HashMap<String, AttributeValue>) -> Result<Profile, ApiError> {
    let pk = required_s(item, "PK")?;
    let id = pk
        .strip_prefix("PROFILE#")
        .ok_or_else(|| ApiError::Storage(format!("unexpected profile key `{}`", pk)))?
        .to_string();

    let role_raw = required_s(item, "role")?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| ApiError::Storage(format!("unknown role `{}`", role_raw)))?;

    Ok(Profile {
        id,
        username: required_s(item, "username")?,
        email: required_s(item, "email")?,
        role,
        created_at: required_s(item, "created_at")?,
    })
}

fn series_item(series: &Series) -> Result<HashMap<String, AttributeValue>, ApiError> {
    let pk = series_pk(&series.id);
    let chapters = serde_json::to_string(&series.chapters)
        .map_err(|e| ApiError::Storage(format!("failed to encode chapters: {}", e)))?;

    let mut item = HashMap::new();
    item.insert("PK".to_string(), AttributeValue::S(pk.clone()));
    item.insert("SK".to_string(), AttributeValue::S(pk));
    item.insert("title".to_string(), AttributeValue::S(series.title.clone()));
    item.insert(
        "description".to_string(),
        AttributeValue::S(series.description.clone()),
    );
    item.insert(
        "status".to_string(),
        AttributeValue::S(series.status.as_str().to_string()),
    );
    item.insert(
        "cover_url".to_string(),
        AttributeValue::S(series.cover_url.clone()),
    );
    item.insert("chapters".to_string(), AttributeValue::S(chapters));
    item.insert(
        "version".to_string(),
        AttributeValue::N(series.version.to_string()),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(series.created_at.clone()),
    );
    item.insert(
        "updated_at".to_string(),
        AttributeValue::S(series.updated_at.clone()),
    );
    Ok(item)
}

/// Series rows in the single table, PK=SK=SERIES#{id}. The embedded chapter
/// list is a JSON string attribute; every mutation rewrites the whole row
/// under a conditional expression on `version`.
pub struct DynamoSeriesStore {
    client: DynamoClient,
    table: String,
}

impl DynamoSeriesStore {
    pub fn new(client: DynamoClient) -> Self {
        Self {
            client,
            table: table_name(),
        }
    }
}

impl SeriesStore for DynamoSeriesStore {
    async fn insert(&self, series: &Series) -> Result<(), ApiError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(series_item(series)?))
            .condition_expression("attribute_not_exists(PK)")
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("failed to insert series: {}", e)))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Series>, ApiError> {
        let pk = series_pk(id);
        let result = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("failed to load series: {}", e)))?;

        match result.item() {
            Some(item) => Ok(Some(parse_series_item(item)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, order: SeriesOrder) -> Result<Vec<Series>, ApiError> {
        let mut all = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let mut req = self
                .client
                .scan()
                .table_name(&self.table)
                .filter_expression("begins_with(PK, :prefix) AND PK = SK")
                .expression_attribute_values(":prefix", AttributeValue::S("SERIES#".to_string()));
            if let Some(key) = start_key.take() {
                req = req.set_exclusive_start_key(Some(key));
            }
            let resp = req
                .send()
                .await
                .map_err(|e| ApiError::Storage(format!("failed to list series: {}", e)))?;

            for item in resp.items() {
                all.push(parse_series_item(item)?);
            }

            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        order.sort(&mut all);
        Ok(all)
    }

    async fn put(&self, series: &Series, expected_version: u64) -> Result<(), ApiError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(series_item(series)?))
            .condition_expression("attribute_exists(PK) AND version = :expected")
            .expression_attribute_values(
                ":expected",
                AttributeValue::N(expected_version.to_string()),
            )
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                let message = format!("{:?}", e);
                if message.contains("ConditionalCheckFailedException") {
                    // Either a concurrent writer bumped the version or the
                    // row is gone; a re-read tells the caller which.
                    match self.get(&series.id).await? {
                        Some(_) => Err(ApiError::Conflict),
                        None => Err(ApiError::NotFound("series")),
                    }
                } else {
                    Err(ApiError::Storage(format!("failed to update series: {}", e)))
                }
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let pk = series_pk(id);
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("failed to delete series: {}", e)))?;
        Ok(())
    }
}

/// Profile rows, PK=SK=PROFILE#{cognito sub}.
pub struct DynamoProfileStore {
    client: DynamoClient,
    table: String,
}

impl DynamoProfileStore {
    pub fn new(client: DynamoClient) -> Self {
        Self {
            client,
            table: table_name(),
        }
    }
}

impl ProfileStore for DynamoProfileStore {
    async fn insert(&self, profile: &Profile) -> Result<(), ApiError> {
        let pk = profile_pk(&profile.id);
        self.client
            .put_item()
            .table_name(&self.table)
            .item("PK", AttributeValue::S(pk.clone()))
            .item("SK", AttributeValue::S(pk))
            .item("username", AttributeValue::S(profile.username.clone()))
            .item("email", AttributeValue::S(profile.email.clone()))
            .item(
                "role",
                AttributeValue::S(profile.role.as_str().to_string()),
            )
            .item("created_at", AttributeValue::S(profile.created_at.clone()))
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("failed to insert profile: {}", e)))?;
        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Option<Profile>, ApiError> {
        let pk = profile_pk(user_id);
        let result = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("failed to load profile: {}", e)))?;

        match result.item() {
            Some(item) => Ok(Some(parse_profile_item(item)?)),
            None => Ok(None),
        }
    }

    async fn set_username(&self, user_id: &str, username: &str) -> Result<(), ApiError> {
        let pk = profile_pk(user_id);
        self.client
            .update_item()
            .table_name(&self.table)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .condition_expression("attribute_exists(PK)")
            .update_expression("SET username = :username")
            .expression_attribute_values(":username", AttributeValue::S(username.to_string()))
            .send()
            .await
            .map_err(|e| {
                let message = format!("{:?}", e);
                if message.contains("ConditionalCheckFailedException") {
                    ApiError::NotFound("profile")
                } else {
                    ApiError::Storage(format!("failed to update profile: {}", e))
                }
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_item() -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("PK".into(), AttributeValue::S("SERIES#s1".into()));
        item.insert("SK".into(), AttributeValue::S("SERIES#s1".into()));
        item.insert("title".into(), AttributeValue::S("Tower".into()));
        item.insert("description".into(), AttributeValue::S("".into()));
        item.insert("status".into(), AttributeValue::S("ongoing".into()));
        item.insert("cover_url".into(), AttributeValue::S("".into()));
        item.insert("chapters".into(), AttributeValue::S("[]".into()));
        item.insert("version".into(), AttributeValue::N("3".into()));
        item.insert(
            "created_at".into(),
            AttributeValue::S("2026-01-01T00:00:00Z".into()),
        );
        item.insert(
            "updated_at".into(),
            AttributeValue::S("2026-01-02T00:00:00Z".into()),
        );
        item
    }

    #[test]
    fn parses_well_formed_series_item() {
        let series = parse_series_item(&base_item()).unwrap();
        assert_eq!(series.id, "s1");
        assert_eq!(series.title, "Tower");
        assert_eq!(series.status, SeriesStatus::Ongoing);
        assert_eq!(series.version, 3);
        assert!(series.chapters.is_empty());
    }

    #[test]
    fn rejects_missing_title() {
        let mut item = base_item();
        item.remove("title");
        assert!(matches!(
            parse_series_item(&item),
            Err(ApiError::Storage(_))
        ));
    }

    #[test]
    fn rejects_unknown_status() {
        let mut item = base_item();
        item.insert("status".into(), AttributeValue::S("cancelled".into()));
        assert!(matches!(
            parse_series_item(&item),
            Err(ApiError::Storage(_))
        ));
    }

    #[test]
    fn rejects_malformed_chapters_document() {
        let mut item = base_item();
        item.insert("chapters".into(), AttributeValue::S("{not json".into()));
        assert!(matches!(
            parse_series_item(&item),
            Err(ApiError::Storage(_))
        ));
    }

    #[test]
    fn round_trips_chapters_through_the_item() {
        let series = Series {
            id: "s1".into(),
            title: "Tower".into(),
            description: "desc".into(),
            status: SeriesStatus::Hiatus,
            cover_url: "https://manhwa-covers.s3.amazonaws.com/covers/s1/c.jpg".into(),
            chapters: vec![Chapter {
                number: 1,
                title: "Chapter 1".into(),
                uploaded_at: "2026-01-01T00:00:00Z".into(),
                pages: vec!["https://manhwa-chapters.s3.amazonaws.com/p.png".into()],
                page_count: 1,
            }],
            version: 7,
            created_at: "2026-01-01T00:00:00Z".into(),
            updated_at: "2026-01-02T00:00:00Z".into(),
        };

        let item = series_item(&series).unwrap();
        let parsed = parse_series_item(&item).unwrap();
        assert_eq!(parsed.status, SeriesStatus::Hiatus);
        assert_eq!(parsed.chapters, series.chapters);
        assert_eq!(parsed.version, 7);
    }
}
