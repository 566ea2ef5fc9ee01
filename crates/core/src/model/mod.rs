mod answer;
mod ids;
mod question;
mod result;
mod session;

pub use ids::{QuestionId, SessionId, TestId, UserId};

pub use answer::{Answer, AnswerError};
pub use question::{Question, QuestionError, QuestionKind};
pub use result::{QuestionResult, ResultError, TestResult};
pub use session::{Session, SessionDataError};
