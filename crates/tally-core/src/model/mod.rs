pub mod comment;
pub mod ids;
pub mod issue;
pub mod label;
pub mod team;

pub use comment::Comment;
pub use ids::{CommentId, IssueId, LabelId, TeamId, WorkspaceId};
pub use issue::{Issue, NewIssue, Priority, Status};
pub use label::Label;
pub use team::{Team, Workspace};
