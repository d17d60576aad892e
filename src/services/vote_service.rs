use std::collections::HashMap;
use std::sync::Arc;

use crate::db::repository::{RecordRepository, TrashScope, VoteRepository};
use crate::models::{now, Answer, Article, Comment, Question, ResourceKind, Vote, VoteType};
use crate::{AppError, Result};

/// Up/down votes on questions, answers, articles and comments
pub struct VoteService {
    vote_repo: Arc<dyn VoteRepository>,
    questions: Arc<dyn RecordRepository<Question>>,
    answers: Arc<dyn RecordRepository<Answer>>,
    articles: Arc<dyn RecordRepository<Article>>,
    comments: Arc<dyn RecordRepository<Comment>>,
}

impl VoteService {
    pub fn new(
        vote_repo: Arc<dyn VoteRepository>,
        questions: Arc<dyn RecordRepository<Question>>,
        answers: Arc<dyn RecordRepository<Answer>>,
        articles: Arc<dyn RecordRepository<Article>>,
        comments: Arc<dyn RecordRepository<Comment>>,
    ) -> Self {
        Self {
            vote_repo,
            questions,
            answers,
            articles,
            comments,
        }
    }

    async fn ensure_target(&self, kind: ResourceKind, id: i64) -> Result<()> {
        let exists = match kind {
            ResourceKind::Question => self.questions.find(id, TrashScope::Active).await?.is_some(),
            ResourceKind::Answer => self.answers.find(id, TrashScope::Active).await?.is_some(),
            ResourceKind::Article => self.articles.find(id, TrashScope::Active).await?.is_some(),
            ResourceKind::Comment => self.comments.find(id, TrashScope::Active).await?.is_some(),
            ResourceKind::Topic => {
                return Err(AppError::ValidationError("Topics cannot be voted on".to_string()))
            }
        };
        if !exists {
            return Err(AppError::NotFound(format!("{} {} not found", kind, id)));
        }
        Ok(())
    }

    /// Casts or changes the user's vote; one vote per user and target.
    pub async fn cast_vote(&self, user_id: i64, kind: ResourceKind, votable_id: i64, vote_type: VoteType) -> Result<Vote> {
        self.ensure_target(kind, votable_id).await?;

        let vote = Vote {
            user_id,
            votable_id,
            votable_type: kind.as_str().to_string(),
            vote_type: vote_type.as_str().to_string(),
            create_time: now(),
        };
        self.vote_repo.upsert(&vote).await
    }

    pub async fn remove_vote(&self, user_id: i64, kind: ResourceKind, votable_id: i64) -> Result<()> {
        self.vote_repo.remove(user_id, kind.as_str(), votable_id).await
    }

    /// The viewer's vote per target id: `up`, `down`, or empty when the
    /// viewer has not voted or is anonymous.
    pub async fn get_in_relationship(&self, viewer: Option<i64>, kind: ResourceKind, target_ids: &[i64]) -> Result<HashMap<i64, String>> {
        let mut votings: HashMap<i64, String> = target_ids.iter().map(|id| (*id, String::new())).collect();

        let Some(user_id) = viewer else {
            return Ok(votings);
        };
        if target_ids.is_empty() {
            return Ok(votings);
        }

        for vote in self.vote_repo.find_for_user(user_id, kind.as_str(), target_ids).await? {
            votings.insert(vote.votable_id, vote.vote_type);
        }
        Ok(votings)
    }

    pub async fn delete_for_targets(&self, kind: ResourceKind, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.vote_repo.delete_for_targets(kind.as_str(), ids).await
    }
}
