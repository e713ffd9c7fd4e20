pub mod article;
pub mod diagnostics;
pub mod loaders;
pub mod request;
pub mod scored;
pub mod stage;
pub mod survey_question;

pub use article::Article;
pub use diagnostics::Diagnostics;
pub use loaders::{load_all_request_files, load_request_file, LoadedRequest};
pub use request::{RecordDefect, RequestRecord, Settings, DEFAULT_RELEVANCE_THRESHOLD};
pub use scored::ScoredItem;
pub use stage::Stage;
pub use survey_question::{AnswerKind, AnswerOptions, SurveyQuestion};
