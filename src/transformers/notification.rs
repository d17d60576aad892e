use std::collections::HashMap;

use super::{Relationships, Transformed, Transformers};
use crate::models::{Inbox, Notification};
use crate::services::distinct;
use crate::Result;

fn ids_of(items: &[Notification], pick: impl Fn(&Notification) -> Option<i64>) -> Vec<i64> {
    distinct(items.iter().filter_map(pick))
}

impl Transformers {
    /// Notifications always carry their sender and the content they point at.
    pub async fn notifications(&self, items: Vec<Notification>) -> Result<Vec<Transformed<Notification>>> {
        let senders = self
            .users
            .get_in_relationship(&ids_of(&items, |n| n.sender_id))
            .await?;
        let questions = self.question_briefs(&ids_of(&items, |n| n.question_id)).await?;
        let articles = self.article_briefs(&ids_of(&items, |n| n.article_id)).await?;
        let answers = self.answer_briefs(&ids_of(&items, |n| n.answer_id)).await?;
        let comments = self.comment_briefs(&ids_of(&items, |n| n.comment_id)).await?;

        fn lookup<T: Clone>(map: &HashMap<i64, T>, id: Option<i64>) -> Option<T> {
            id.and_then(|id| map.get(&id).cloned())
        }

        Ok(items
            .into_iter()
            .map(|item| {
                let relationships = Relationships {
                    sender: lookup(&senders, item.sender_id),
                    question: lookup(&questions, item.question_id),
                    article: lookup(&articles, item.article_id),
                    answer: lookup(&answers, item.answer_id),
                    comment: lookup(&comments, item.comment_id),
                    ..Default::default()
                };
                Transformed { item, relationships }
            })
            .collect())
    }

    pub async fn inbox(&self, items: Vec<Inbox>) -> Result<Vec<Transformed<Inbox>>> {
        let users = self
            .users
            .get_in_relationship(&distinct(items.iter().map(|m| m.sender_id)))
            .await?;

        Ok(items
            .into_iter()
            .map(|item| {
                let relationships = Relationships {
                    sender: users.get(&item.sender_id).cloned(),
                    ..Default::default()
                };
                Transformed { item, relationships }
            })
            .collect())
    }
}
