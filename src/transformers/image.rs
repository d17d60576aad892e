use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::{html_escape, wanted, Relationships, Transformers};
use crate::models::Image;
use crate::services::distinct;
use crate::Result;

pub const IMAGE_INCLUDES: &[&str] = &["user", "question", "article", "answer"];

#[derive(Debug, Clone, Serialize)]
pub struct ImageResponse {
    /// Storage key with `.` replaced by `_`, so API urls never end in an
    /// image extension.
    pub key: String,
    pub filename: String,
    pub width: i32,
    pub height: i32,
    pub create_time: i64,
    pub item_type: Option<String>,
    pub item_id: i64,
    pub user_id: i64,
    pub urls: BTreeMap<String, String>,
    pub relationships: Relationships,
}

/// Reverses the `.` to `_` substitution made for API keys.
pub fn key_from_api(key: &str) -> String {
    key.replace('_', ".")
}

impl Transformers {
    pub fn format_image(&self, image: Image) -> ImageResponse {
        ImageResponse {
            urls: self.images.get_urls(&image.key, image.create_time),
            key: image.key.replace('.', "_"),
            filename: html_escape(&image.filename),
            width: image.width,
            height: image.height,
            create_time: image.create_time,
            item_type: image.item_type,
            item_id: image.item_id,
            user_id: image.user_id,
            relationships: Relationships::default(),
        }
    }

    pub async fn images(&self, items: Vec<Image>, includes: &[String]) -> Result<Vec<ImageResponse>> {
        let includes = wanted(includes, IMAGE_INCLUDES);

        let targets_of = |item_type: &str| {
            distinct(
                items
                    .iter()
                    .filter(|image| image.item_type.as_deref() == Some(item_type))
                    .map(|image| image.item_id),
            )
        };

        let users = if includes.contains(&"user") {
            self.users
                .get_in_relationship(&distinct(items.iter().map(|image| image.user_id)))
                .await?
        } else {
            HashMap::new()
        };
        let questions = if includes.contains(&"question") {
            self.question_briefs(&targets_of("question")).await?
        } else {
            HashMap::new()
        };
        let articles = if includes.contains(&"article") {
            self.article_briefs(&targets_of("article")).await?
        } else {
            HashMap::new()
        };
        let answers = if includes.contains(&"answer") {
            self.answer_briefs(&targets_of("answer")).await?
        } else {
            HashMap::new()
        };

        Ok(items
            .into_iter()
            .map(|image| {
                let mut relationships = Relationships {
                    user: users.get(&image.user_id).cloned(),
                    ..Default::default()
                };
                match image.item_type.as_deref() {
                    Some("question") => relationships.question = questions.get(&image.item_id).cloned(),
                    Some("article") => relationships.article = articles.get(&image.item_id).cloned(),
                    Some("answer") => relationships.answer = answers.get(&image.item_id).cloned(),
                    _ => {}
                }

                let mut response = self.format_image(image);
                response.relationships = relationships;
                response
            })
            .collect())
    }
}
