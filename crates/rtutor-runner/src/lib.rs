mod checker;
mod lesson_loader;
mod rscript;
mod session;
mod setup;
#[cfg(test)]
mod testing;

pub use checker::{wrap_submission, CheckStatus, Checker, Feedback, Submission};
pub use lesson_loader::{load_all_lessons, load_lesson, LessonLoaderError};
pub use rscript::RscriptInterpreter;
pub use session::{capture_scoped, Interpreter, Result, SessionError, Shelter};
pub use setup::{library_calls, prepare_session, SetupScript, DATASETS};

// Re-export core types so front ends can depend on the runner alone
pub use rtutor_core::{
    CaptureOptions, CaptureResult, Lesson, PackageTable, PngCanvas, TutorConfig,
};
