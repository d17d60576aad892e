use std::collections::HashMap;

use super::{wanted, Relationships, Transformed, Transformers};
use crate::models::{Answer, Article, Comment, Question, ResourceKind, SoftDelete, Topic};
use crate::services::distinct;
use crate::Result;

pub const QUESTION_INCLUDES: &[&str] = &["user", "voting"];
pub const ARTICLE_INCLUDES: &[&str] = &["user", "voting"];
pub const ANSWER_INCLUDES: &[&str] = &["user", "question", "voting"];
pub const COMMENT_INCLUDES: &[&str] = &["user", "voting"];
pub const TOPIC_INCLUDES: &[&str] = &["user"];

impl Transformers {
    /// Embeds `user` and `voting`, the includes every content type shares.
    async fn with_common<T: SoftDelete>(
        &self,
        items: Vec<T>,
        kind: ResourceKind,
        includes: &[&str],
        viewer: Option<i64>,
    ) -> Result<Vec<Transformed<T>>> {
        let users = if includes.contains(&"user") {
            self.users
                .get_in_relationship(&distinct(items.iter().map(SoftDelete::owner_id)))
                .await?
        } else {
            HashMap::new()
        };

        let with_voting = includes.contains(&"voting");
        let votings = if with_voting {
            let ids: Vec<i64> = items.iter().map(SoftDelete::id).collect();
            self.votes.get_in_relationship(viewer, kind, &ids).await?
        } else {
            HashMap::new()
        };

        Ok(items
            .into_iter()
            .map(|item| {
                let relationships = Relationships {
                    user: users.get(&item.owner_id()).cloned(),
                    voting: with_voting.then(|| votings.get(&item.id()).cloned().unwrap_or_default()),
                    ..Default::default()
                };
                Transformed { item, relationships }
            })
            .collect())
    }

    pub async fn questions(&self, items: Vec<Question>, includes: &[String], viewer: Option<i64>) -> Result<Vec<Transformed<Question>>> {
        let includes = wanted(includes, QUESTION_INCLUDES);
        self.with_common(items, ResourceKind::Question, &includes, viewer).await
    }

    pub async fn articles(&self, items: Vec<Article>, includes: &[String], viewer: Option<i64>) -> Result<Vec<Transformed<Article>>> {
        let includes = wanted(includes, ARTICLE_INCLUDES);
        self.with_common(items, ResourceKind::Article, &includes, viewer).await
    }

    pub async fn answers(&self, items: Vec<Answer>, includes: &[String], viewer: Option<i64>) -> Result<Vec<Transformed<Answer>>> {
        let includes = wanted(includes, ANSWER_INCLUDES);
        let question_ids = distinct(items.iter().map(|answer| answer.question_id));
        let mut transformed = self.with_common(items, ResourceKind::Answer, &includes, viewer).await?;

        if includes.contains(&"question") {
            let questions = self.question_briefs(&question_ids).await?;
            for answer in &mut transformed {
                answer.relationships.question = questions.get(&answer.item.question_id).cloned();
            }
        }
        Ok(transformed)
    }

    pub async fn comments(&self, items: Vec<Comment>, includes: &[String], viewer: Option<i64>) -> Result<Vec<Transformed<Comment>>> {
        let includes = wanted(includes, COMMENT_INCLUDES);
        self.with_common(items, ResourceKind::Comment, &includes, viewer).await
    }

    pub async fn topics(&self, items: Vec<Topic>, includes: &[String]) -> Result<Vec<Transformed<Topic>>> {
        let includes = wanted(includes, TOPIC_INCLUDES);
        self.with_common(items, ResourceKind::Topic, &includes, None).await
    }
}
