use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("database error: {0}")]
    Db(#[from] sift_db::DbError),

    /// Comments reference a post that was not supplied alongside them.
    #[error("post {post_id} has {comment_count} comment(s) but no post record")]
    MissingPost { post_id: String, comment_count: usize },

    #[error("invalid comment {comment_id}: {reason}")]
    InvalidComment { comment_id: String, reason: String },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
